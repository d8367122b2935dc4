use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("stale element handle: {0}")]
    StaleElement(u64),

    #[error("script error: {0}")]
    ScriptError(String),

    #[error("no active browser session")]
    NoSession,
}

impl BrowserError {
    /// Whether the failure concerns locating page content (missing element,
    /// expired wait) rather than the browser itself.
    #[must_use]
    pub fn is_selector_failure(&self) -> bool {
        matches!(
            self,
            Self::SelectorNotFound(_) | Self::Timeout(_) | Self::StaleElement(_)
        )
    }
}
