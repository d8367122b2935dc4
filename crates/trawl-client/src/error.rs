use std::time::Duration;
use thiserror::Error;
use trawl_core::RunId;
use trawl_workflow::WorkflowError;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Failures talking to the remote job platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("platform rejected credentials: {0}")]
    Auth(String),

    #[error("run {run_id} did not finish within {waited:?}")]
    Timeout { run_id: String, waited: Duration },

    #[error("run {run_id} ended with status {status}")]
    Job { run_id: String, status: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid platform URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl From<serde_json::Error> for PlatformError {
    fn from(err: serde_json::Error) -> Self {
        PlatformError::Parse(err.to_string())
    }
}

/// Errors from the execution client facade.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("unknown run {0}")]
    UnknownRun(RunId),

    #[error("run {run_id} has not finished (status {status})")]
    NotFinished { run_id: RunId, status: String },

    #[error("run {run_id} failed: {message}")]
    RunFailed { run_id: RunId, message: String },

    #[error("run {run_id} was cancelled")]
    Cancelled { run_id: RunId },

    #[error("run {run_id} did not finish within {waited:?}")]
    Timeout { run_id: RunId, waited: Duration },
}
