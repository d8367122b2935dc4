//! Remote backend: runs execute as actor runs on a hosted job platform.

use crate::client::ExecutionClient;
use crate::error::{ClientError, PlatformError, Result};
use crate::types::{ApiResponse, PlatformRun, RunInput, RunStatus};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use trawl_core::{PlatformSettings, Record, RunId};
use trawl_recipe::ScraperConfig;
use url::Url;

/// Longest single long-poll the platform accepts, in seconds.
const MAX_WAIT_SECS: u64 = 60;

/// REST client for actor runs.
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: String,
    actor_id: String,
    token: String,
    wait_secs: u64,
    run_timeout: Duration,
}

impl PlatformClient {
    pub fn new(
        base_url: &str,
        actor_id: impl Into<String>,
        token: impl Into<String>,
    ) -> std::result::Result<Self, PlatformError> {
        let parsed = Url::parse(base_url).map_err(|e| PlatformError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PlatformError::InvalidUrl {
                url: base_url.to_string(),
                reason: "scheme must be http or https".to_string(),
            });
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            actor_id: actor_id.into(),
            token: token.into(),
            wait_secs: MAX_WAIT_SECS,
            run_timeout: PlatformSettings::default().run_timeout(),
        })
    }

    /// Build from engine settings; a missing token is an auth failure.
    pub fn from_settings(settings: &PlatformSettings) -> std::result::Result<Self, PlatformError> {
        let token = settings
            .token
            .clone()
            .ok_or_else(|| PlatformError::Auth("no platform token configured".to_string()))?;
        Ok(Self::new(&settings.base_url, settings.actor_id.clone(), token)?
            .with_run_timeout(settings.run_timeout()))
    }

    /// Deadline used by [`PlatformClient::run_to_completion`].
    #[must_use]
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn run_timeout(&self) -> Duration {
        self.run_timeout
    }

    /// Cap each status long-poll at `secs` (at most 60).
    #[must_use]
    pub fn with_wait_secs(mut self, secs: u64) -> Self {
        self.wait_secs = secs.min(MAX_WAIT_SECS);
        self
    }

    async fn check(resp: Response) -> std::result::Result<Response, PlatformError> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = resp.text().await.unwrap_or_default();
            return Err(PlatformError::Auth(format!("{status}: {body}")));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PlatformError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(resp)
    }

    /// Start an actor run. Returns immediately with run metadata.
    pub async fn start_run(
        &self,
        config: &ScraperConfig,
        keys: &[String],
    ) -> std::result::Result<PlatformRun, PlatformError> {
        let url = format!("{}/acts/{}/runs", self.base_url, self.actor_id);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&RunInput { recipe: config, keys })
            .send()
            .await?;
        let api: ApiResponse<PlatformRun> = Self::check(resp).await?.json().await?;
        Ok(api.data)
    }

    /// Current run state, long-polling up to `wait_secs` for it to finish.
    pub async fn get_run(
        &self,
        run_id: &str,
        wait_secs: u64,
    ) -> std::result::Result<PlatformRun, PlatformError> {
        let url = format!("{}/actor-runs/{}", self.base_url, run_id);
        let resp = self
            .http
            .get(&url)
            .query(&[("waitForFinish", wait_secs)])
            .bearer_auth(&self.token)
            .send()
            .await?;
        let api: ApiResponse<PlatformRun> = Self::check(resp).await?.json().await?;
        Ok(api.data)
    }

    pub async fn abort_run(&self, run_id: &str) -> std::result::Result<PlatformRun, PlatformError> {
        let url = format!("{}/actor-runs/{}/abort", self.base_url, run_id);
        let resp = self.http.post(&url).bearer_auth(&self.token).send().await?;
        let api: ApiResponse<PlatformRun> = Self::check(resp).await?.json().await?;
        Ok(api.data)
    }

    /// Items of a run's dataset.
    pub async fn dataset_items(
        &self,
        dataset_id: &str,
    ) -> std::result::Result<Vec<Record>, PlatformError> {
        let url = format!("{}/datasets/{}/items", self.base_url, dataset_id);
        let resp = self
            .http
            .get(&url)
            .query(&[("format", "json")])
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Poll until the run succeeds, bounded by `timeout`.
    ///
    /// Terminal failure statuses become [`PlatformError::Job`]; a run still
    /// going at the deadline becomes [`PlatformError::Timeout`].
    pub async fn wait_for_run(
        &self,
        run_id: &str,
        timeout: Duration,
    ) -> std::result::Result<PlatformRun, PlatformError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let run = self
                .get_run(run_id, remaining.as_secs().min(self.wait_secs))
                .await?;
            let status = run.status.clone();
            match status.as_str() {
                "SUCCEEDED" => return Ok(run),
                "FAILED" | "ABORTED" | "TIMED-OUT" => {
                    return Err(PlatformError::Job {
                        run_id: run.id,
                        status,
                    })
                }
                _ => debug!(run_id, status = %status, "run still in progress"),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PlatformError::Timeout {
                    run_id: run_id.to_string(),
                    waited: timeout,
                });
            }
            tokio::time::sleep(Duration::from_secs(1).min(deadline - now)).await;
        }
    }
}

impl PlatformClient {
    /// [`ExecutionClient::run_and_wait`] bounded by the configured run timeout.
    pub async fn run_to_completion(
        &self,
        config: Arc<ScraperConfig>,
        keys: Vec<String>,
    ) -> Result<Vec<Record>> {
        self.run_and_wait(config, keys, self.run_timeout).await
    }
}

fn remote_id(id: String) -> Result<RunId> {
    RunId::remote(id).map_err(|e| ClientError::Platform(PlatformError::Parse(e.to_string())))
}

#[async_trait]
impl ExecutionClient for PlatformClient {
    async fn run(&self, config: Arc<ScraperConfig>, keys: Vec<String>) -> Result<RunId> {
        let run = self.start_run(&config, &keys).await?;
        info!(run_id = %run.id, site = %config.name, keys = keys.len(), "platform run started");
        remote_id(run.id)
    }

    async fn status(&self, run_id: &RunId) -> Result<RunStatus> {
        Ok(self.get_run(run_id.as_str(), 0).await?.run_status())
    }

    async fn cancel(&self, run_id: &RunId) -> Result<bool> {
        if self.status(run_id).await?.is_terminal() {
            return Ok(false);
        }
        info!(run_id = %run_id, "aborting platform run");
        self.abort_run(run_id.as_str()).await?;
        Ok(true)
    }

    async fn fetch_results(&self, run_id: &RunId) -> Result<Vec<Record>> {
        let run = self.get_run(run_id.as_str(), 0).await?;
        match run.run_status() {
            RunStatus::Succeeded | RunStatus::Cancelled => {
                Ok(self.dataset_items(&run.default_dataset_id).await?)
            }
            RunStatus::Failed => Err(PlatformError::Job {
                run_id: run.id,
                status: run.status,
            }
            .into()),
            status => Err(ClientError::NotFinished {
                run_id: run_id.clone(),
                status: status.to_string(),
            }),
        }
    }

    /// Long-polls the platform instead of sleeping between status checks.
    /// A run still going at the deadline is aborted.
    async fn run_and_wait(
        &self,
        config: Arc<ScraperConfig>,
        keys: Vec<String>,
        timeout: Duration,
    ) -> Result<Vec<Record>> {
        let run = self.start_run(&config, &keys).await?;
        info!(run_id = %run.id, site = %config.name, keys = keys.len(), "platform run started");
        let finished = match self.wait_for_run(&run.id, timeout).await {
            Ok(finished) => finished,
            Err(e @ PlatformError::Timeout { .. }) => {
                warn!(run_id = %run.id, ?timeout, "platform run timed out; aborting");
                if let Err(abort) = self.abort_run(&run.id).await {
                    warn!(run_id = %run.id, error = %abort, "abort after timeout failed");
                }
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };
        let records = self.dataset_items(&finished.default_dataset_id).await?;
        info!(run_id = %finished.id, records = records.len(), "platform run finished");
        Ok(records)
    }
}
