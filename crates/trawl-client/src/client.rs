//! The facade every backend implements.

use crate::error::{ClientError, Result};
use crate::types::RunStatus;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use trawl_core::{Record, RunId};
use trawl_recipe::ScraperConfig;

/// Starts batches and collects their records, wherever they run.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// Start a run of `keys` through `config`. Returns immediately.
    async fn run(&self, config: Arc<ScraperConfig>, keys: Vec<String>) -> Result<RunId>;

    async fn status(&self, run_id: &RunId) -> Result<RunStatus>;

    /// Request cancellation. `false` when the run had already finished.
    async fn cancel(&self, run_id: &RunId) -> Result<bool>;

    /// Records of a finished run, one per key in input order for local runs.
    async fn fetch_results(&self, run_id: &RunId) -> Result<Vec<Record>>;

    /// Interval between status checks in [`ExecutionClient::run_and_wait`]
    fn poll_interval(&self) -> Duration {
        Duration::from_secs(1)
    }

    /// Start a run, wait for it to finish within `timeout` and fetch its
    /// records. A run still going at the deadline is cancelled.
    async fn run_and_wait(
        &self,
        config: Arc<ScraperConfig>,
        keys: Vec<String>,
        timeout: Duration,
    ) -> Result<Vec<Record>> {
        let run_id = self.run(config, keys).await?;
        let deadline = Instant::now() + timeout;
        loop {
            let status = self.status(&run_id).await?;
            debug!(run_id = %run_id, status = %status, "polled run");
            match status {
                RunStatus::Succeeded => break,
                RunStatus::Failed => {
                    // Backends report the cause from fetch_results.
                    self.fetch_results(&run_id).await?;
                    return Err(ClientError::RunFailed {
                        run_id,
                        message: "run reported failure".to_string(),
                    })
                }
                RunStatus::Cancelled => return Err(ClientError::Cancelled { run_id }),
                RunStatus::Pending | RunStatus::Running => {}
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(run_id = %run_id, ?timeout, "run timed out; cancelling");
                if let Err(e) = self.cancel(&run_id).await {
                    warn!(run_id = %run_id, error = %e, "cancel after timeout failed");
                }
                return Err(ClientError::Timeout {
                    run_id,
                    waited: timeout,
                });
            }
            tokio::time::sleep(self.poll_interval().min(deadline - now)).await;
        }

        let records = self.fetch_results(&run_id).await?;
        info!(run_id = %run_id, records = records.len(), "run finished");
        Ok(records)
    }
}
