use thiserror::Error;
use trawl_browser::BrowserError;

/// Detections that survived their recovery attempts.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("CAPTCHA still present after {attempts} re-checks (matched '{selector}')")]
    CaptchaDetected { selector: String, attempts: u32 },

    #[error("blocking page not recovered (indicator: {indicator})")]
    BlockingDetected { indicator: String },

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

pub type Result<T> = std::result::Result<T, DetectionError>;
