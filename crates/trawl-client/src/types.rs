//! Run status and the platform's wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use trawl_recipe::ScraperConfig;

/// Lifecycle of a run, shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Whether the run will not change status again
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Map a platform status string (`READY`, `RUNNING`, `SUCCEEDED`, ...).
    pub fn from_platform(status: &str) -> Self {
        match status {
            "READY" => Self::Pending,
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" | "TIMED-OUT" => Self::Failed,
            "ABORTING" | "ABORTED" => Self::Cancelled,
            _ => Self::Running,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Input posted to the remote actor: the recipe and the keys to look up.
#[derive(Debug, Clone, Serialize)]
pub struct RunInput<'a> {
    pub recipe: &'a ScraperConfig,
    pub keys: &'a [String],
}

/// Envelope the platform wraps single objects in.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// A remote run as reported by the platform.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformRun {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl PlatformRun {
    pub fn run_status(&self) -> RunStatus {
        RunStatus::from_platform(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_status_mapping() {
        assert_eq!(RunStatus::from_platform("READY"), RunStatus::Pending);
        assert_eq!(RunStatus::from_platform("TIMING-OUT"), RunStatus::Running);
        assert_eq!(RunStatus::from_platform("TIMED-OUT"), RunStatus::Failed);
        assert_eq!(RunStatus::from_platform("ABORTED"), RunStatus::Cancelled);
        assert!(RunStatus::Succeeded.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn test_platform_run_parses() {
        let run: ApiResponse<PlatformRun> = serde_json::from_str(
            r#"{"data":{"id":"r1","status":"SUCCEEDED","defaultDatasetId":"d1",
                "startedAt":"2026-01-02T03:04:05Z","finishedAt":null}}"#,
        )
        .unwrap();
        assert_eq!(run.data.run_status(), RunStatus::Succeeded);
        assert_eq!(run.data.default_dataset_id, "d1");
        assert!(run.data.finished_at.is_none());
    }
}
