//! Step and workflow errors.

use thiserror::Error;
use trawl_browser::BrowserError;
use trawl_recipe::ConfigError;
use trawl_stealth::DetectionError;

/// Why a single step failed.
#[derive(Error, Debug)]
pub enum StepError {
    /// Element missing or wait timed out; retried
    #[error("selector failure: {0}")]
    Selector(String),

    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("detection: {0}")]
    Detection(#[from] DetectionError),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("verification of '{field}' failed: expected '{expected}', got '{actual}'")]
    Verification {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("script payload: {0}")]
    Payload(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl StepError {
    /// Selector and timeout failures are retried; everything else surfaces.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Selector(_) => true,
            Self::Browser(e) => e.is_selector_failure(),
            _ => false,
        }
    }
}

/// Failure of a workflow or batch.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The recipe is unusable; nothing ran
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A step failed after its retries and recovery attempts
    #[error("step {index} ({step}) failed: {source}")]
    Execution {
        step: String,
        index: usize,
        #[source]
        source: StepError,
    },
}

impl WorkflowError {
    /// Name of the failing step, for execution errors
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::Execution { step, .. } => Some(step),
            Self::Config(_) => None,
        }
    }
}

pub type StepResult<T> = std::result::Result<T, StepError>;
pub type Result<T> = std::result::Result<T, WorkflowError>;
