//! Human-like pauses around page actions.

use rand::Rng;
use std::time::Duration;

/// Pause in seconds, as an inclusive range.
pub type DelayRange = (f64, f64);

/// Per-character pause while typing.
pub const TYPING_DELAY: DelayRange = (0.05, 0.2);

/// Pause before an action starts.
pub fn pre_delay(action: &str) -> Option<DelayRange> {
    match action {
        "click" | "conditional_click" => Some((0.1, 0.5)),
        _ => None,
    }
}

/// Pause after an action completes.
pub fn post_delay(action: &str) -> Option<DelayRange> {
    match action {
        "navigate" | "login" => Some((1.0, 3.0)),
        "click" | "conditional_click" => Some((0.5, 2.0)),
        "scroll" => Some((0.5, 1.5)),
        _ => None,
    }
}

/// Sample a duration from `range`.
pub fn sample<R: Rng + ?Sized>(rng: &mut R, range: DelayRange) -> Duration {
    let (low, high) = range;
    let secs = if high > low {
        rng.gen_range(low..=high)
    } else {
        low
    };
    Duration::from_secs_f64(secs.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_delay_table() {
        assert_eq!(post_delay("navigate"), Some((1.0, 3.0)));
        assert_eq!(pre_delay("navigate"), None);
        assert_eq!(pre_delay("click"), Some((0.1, 0.5)));
        assert_eq!(post_delay("click"), Some((0.5, 2.0)));
        assert_eq!(pre_delay("input_text"), None);
        assert_eq!(post_delay("extract"), None);
    }

    #[test]
    fn test_sample_within_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let d = sample(&mut rng, TYPING_DELAY).as_secs_f64();
            assert!((0.05..=0.2).contains(&d));
        }
        assert_eq!(sample(&mut rng, (0.3, 0.3)), Duration::from_secs_f64(0.3));
    }
}
