//! Built-in workflow actions.

mod auth;
mod control;
mod extraction;
mod interaction;
mod navigation;
mod stealth;

pub use auth::Login;
pub use control::{CheckNoResults, ConditionalClick, ConditionalSkip, MatchMode, Verify};
pub use extraction::{
    parse_weight, process_images, Extract, ExtractFromJson, ExtractMode, ParseWeight,
    ProcessImages, UpgradeRule,
};
pub use interaction::{Click, InputText};
pub use navigation::{Navigate, Scroll, WaitFor};
pub use stealth::{DetectCaptcha, HandleBlocking, RateLimit, RotateSession, SimulateHuman};

use crate::registry::ActionHandler;
use std::sync::Arc;

/// Every built-in handler.
pub fn builtin() -> Vec<Arc<dyn ActionHandler>> {
    vec![
        Arc::new(Navigate),
        Arc::new(WaitFor),
        Arc::new(Scroll),
        Arc::new(Click),
        Arc::new(InputText),
        Arc::new(Extract::new(ExtractMode::Declared)),
        Arc::new(Extract::new(ExtractMode::Single)),
        Arc::new(Extract::new(ExtractMode::Multiple)),
        Arc::new(ExtractFromJson),
        Arc::new(ParseWeight),
        Arc::new(ProcessImages),
        Arc::new(CheckNoResults),
        Arc::new(ConditionalSkip),
        Arc::new(ConditionalClick),
        Arc::new(Verify),
        Arc::new(Login),
        Arc::new(DetectCaptcha),
        Arc::new(HandleBlocking),
        Arc::new(RateLimit),
        Arc::new(SimulateHuman),
        Arc::new(RotateSession),
    ]
}
