//! Anti-detection for scraping sessions.
//!
//! Paces requests, adds human-like pauses, detects CAPTCHA and blocking
//! pages, runs the blocking recovery ladder and rotates browser sessions.
//! All state lives in an [`AntiDetectionManager`] owned by a single run.

pub mod detection;
pub mod error;
pub mod human;
pub mod manager;
pub mod rate_limit;

pub use error::{DetectionError, Result};
pub use manager::{AntiDetectionManager, HookOutcome, NoProxyRotator, ProxyRotator, SessionState};
pub use rate_limit::RateLimiter;
