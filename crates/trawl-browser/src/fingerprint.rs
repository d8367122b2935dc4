use rand::seq::SliceRandom;
use rand::Rng;

/// Common desktop user agents
const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36 Edg/123.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
];

/// Common viewport sizes
const VIEWPORTS: [(u32, u32); 5] = [(1920, 1080), (1366, 768), (1536, 864), (1440, 900), (1680, 1050)];

const TIMEZONES: [&str; 4] = [
    "America/New_York",
    "America/Chicago",
    "America/Denver",
    "America/Los_Angeles",
];

/// Fingerprint configuration for anti-detection
#[derive(Debug, Clone)]
pub struct FingerprintConfig {
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub timezone: String,
}

impl FingerprintConfig {
    /// Generate a randomized fingerprint configuration
    pub fn randomized() -> Self {
        Self::randomized_with(&mut rand::thread_rng())
    }

    /// Generate a randomized fingerprint from the given RNG
    pub fn randomized_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let user_agent = USER_AGENTS.choose(rng).copied().unwrap_or(USER_AGENTS[0]);
        let (width, height) = VIEWPORTS[rng.gen_range(0..VIEWPORTS.len())];
        let timezone = TIMEZONES.choose(rng).copied().unwrap_or(TIMEZONES[0]);

        Self {
            user_agent: user_agent.to_string(),
            viewport_width: width,
            viewport_height: height,
            timezone: timezone.to_string(),
        }
    }

    /// Pin the viewport, keeping the rest of the fingerprint
    #[must_use]
    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_randomized_fingerprint() {
        let config = FingerprintConfig::randomized();
        assert!(!config.user_agent.is_empty());
        assert!(config.viewport_width > 0);
        assert!(config.viewport_height > 0);
        assert!(!config.timezone.is_empty());
    }

    #[test]
    fn test_fingerprint_variation() {
        let mut rng = StdRng::seed_from_u64(7);
        let configs: Vec<_> = (0..20)
            .map(|_| FingerprintConfig::randomized_with(&mut rng))
            .collect();

        let first_ua = &configs[0].user_agent;
        let all_same = configs.iter().all(|c| &c.user_agent == first_ua);
        assert!(!all_same, "Expected variation in user agents");
    }

    #[test]
    fn test_with_viewport() {
        let config = FingerprintConfig::randomized().with_viewport(800, 600);
        assert_eq!((config.viewport_width, config.viewport_height), (800, 600));
    }
}
