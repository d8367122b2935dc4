//! In-process backend: batches run as tasks on the current tokio runtime.

use crate::client::ExecutionClient;
use crate::error::{ClientError, Result};
use crate::types::RunStatus;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use trawl_browser::BrowserFactory;
use trawl_core::{EventBus, ExecutionSettings, Record, RunId};
use trawl_recipe::ScraperConfig;
use trawl_workflow::{ActionRegistry, BatchRunner, KeyResult};

struct LocalRun {
    status: RunStatus,
    cancel: CancellationToken,
    results: Vec<KeyResult>,
    error: Option<String>,
}

/// Runs batches in this process.
#[derive(Clone)]
pub struct LocalClient {
    registry: Arc<ActionRegistry>,
    factory: Arc<dyn BrowserFactory>,
    events: EventBus,
    settings: ExecutionSettings,
    params: HashMap<String, String>,
    score: bool,
    runs: Arc<Mutex<HashMap<RunId, LocalRun>>>,
}

impl LocalClient {
    pub fn new(registry: Arc<ActionRegistry>, factory: Arc<dyn BrowserFactory>) -> Self {
        Self {
            registry,
            factory,
            events: EventBus::default(),
            settings: ExecutionSettings::default(),
            params: HashMap::new(),
            score: false,
            runs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Publish every run's progress on `events`.
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Engine settings for every run. Replaces the event bus with one sized
    /// by the settings, so call this before [`LocalClient::with_events`].
    #[must_use]
    pub fn with_settings(mut self, settings: &ExecutionSettings) -> Self {
        self.events = EventBus::from_settings(settings);
        self.settings = settings.clone();
        self
    }

    /// Run parameters (such as login credentials) passed to every run.
    #[must_use]
    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// Score records against each recipe's quality contract.
    #[must_use]
    pub fn with_quality_scoring(mut self) -> Self {
        self.score = true;
        self
    }

    /// Per-key outcomes of a finished run, including status and quality.
    pub fn key_results(&self, run_id: &RunId) -> Result<Vec<KeyResult>> {
        let runs = self.runs.lock().expect("acquire runs lock");
        let run = runs
            .get(run_id)
            .ok_or_else(|| ClientError::UnknownRun(run_id.clone()))?;
        finished(run_id, run)?;
        Ok(run.results.clone())
    }

    fn update(&self, run_id: &RunId, f: impl FnOnce(&mut LocalRun)) {
        let mut runs = self.runs.lock().expect("acquire runs lock");
        if let Some(run) = runs.get_mut(run_id) {
            f(run);
        }
    }
}

fn finished(run_id: &RunId, run: &LocalRun) -> Result<()> {
    match run.status {
        RunStatus::Succeeded | RunStatus::Cancelled => Ok(()),
        RunStatus::Failed => Err(ClientError::RunFailed {
            run_id: run_id.clone(),
            message: run.error.clone().unwrap_or_default(),
        }),
        status => Err(ClientError::NotFinished {
            run_id: run_id.clone(),
            status: status.to_string(),
        }),
    }
}

#[async_trait]
impl ExecutionClient for LocalClient {
    async fn run(&self, config: Arc<ScraperConfig>, keys: Vec<String>) -> Result<RunId> {
        let run_id = RunId::generate();
        let cancel = CancellationToken::new();
        self.runs.lock().expect("acquire runs lock").insert(
            run_id.clone(),
            LocalRun {
                status: RunStatus::Pending,
                cancel: cancel.clone(),
                results: Vec::new(),
                error: None,
            },
        );

        let mut runner = BatchRunner::new(config, Arc::clone(&self.registry), Arc::clone(&self.factory))
            .with_settings(&self.settings)
            .with_events(self.events.clone())
            .with_cancellation(cancel.clone())
            .with_params(self.params.clone());
        if self.score {
            runner = runner.with_recipe_quality();
        }

        info!(run_id = %run_id, site = %runner.config().name, keys = keys.len(), "local run started");
        let client = self.clone();
        let id = run_id.clone();
        tokio::spawn(async move {
            client.update(&id, |run| run.status = RunStatus::Running);
            // The batch runs in its own task so a panic surfaces as a JoinError.
            let outcome = tokio::spawn(async move { runner.run(&keys).await })
                .await
                .map_err(|e| format!("run task panicked: {e}"))
                .and_then(|result| result.map_err(|e| e.to_string()));
            client.update(&id, |run| match outcome {
                Ok(results) => {
                    run.status = if cancel.is_cancelled() {
                        RunStatus::Cancelled
                    } else {
                        RunStatus::Succeeded
                    };
                    run.results = results;
                }
                Err(message) => {
                    error!(run_id = %id, error = %message, "local run failed");
                    run.status = RunStatus::Failed;
                    run.error = Some(message);
                }
            });
        });

        Ok(run_id)
    }

    async fn status(&self, run_id: &RunId) -> Result<RunStatus> {
        self.runs
            .lock()
            .expect("acquire runs lock")
            .get(run_id)
            .map(|run| run.status)
            .ok_or_else(|| ClientError::UnknownRun(run_id.clone()))
    }

    async fn cancel(&self, run_id: &RunId) -> Result<bool> {
        let runs = self.runs.lock().expect("acquire runs lock");
        let run = runs
            .get(run_id)
            .ok_or_else(|| ClientError::UnknownRun(run_id.clone()))?;
        if run.status.is_terminal() {
            return Ok(false);
        }
        info!(run_id = %run_id, "cancelling local run");
        run.cancel.cancel();
        Ok(true)
    }

    async fn fetch_results(&self, run_id: &RunId) -> Result<Vec<Record>> {
        Ok(self
            .key_results(run_id)?
            .into_iter()
            .map(|result| result.record)
            .collect())
    }

    fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(100)
    }
}
