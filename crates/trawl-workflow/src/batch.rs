//! Batches of keys against one site, and several sites in parallel.

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::executor::WorkflowExecutor;
use crate::registry::ActionRegistry;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use trawl_browser::BrowserFactory;
use trawl_core::{EventBus, ExecutionSettings, KeyStatus, Record};
use trawl_quality::{QualityContract, QualityReport};
use trawl_recipe::ScraperConfig;
use trawl_stealth::{AntiDetectionManager, ProxyRotator};

/// Outcome for one lookup key.
#[derive(Debug, Clone, Serialize)]
pub struct KeyResult {
    pub key: String,
    pub status: KeyStatus,
    /// Fields extracted before the run ended; partial on skip or failure
    pub record: Record,
    /// Present for succeeded keys when the runner scores records
    pub quality: Option<QualityReport>,
    /// Whether the quality report clears the runner's threshold
    pub accepted: Option<bool>,
    pub error: Option<String>,
}

/// Runs a list of keys through one recipe in a single browser session.
#[derive(Clone)]
pub struct BatchRunner {
    config: Arc<ScraperConfig>,
    registry: Arc<ActionRegistry>,
    factory: Arc<dyn BrowserFactory>,
    events: EventBus,
    cancel: CancellationToken,
    contract: Option<QualityContract>,
    quality_threshold: f64,
    run_params: HashMap<String, String>,
    proxy: Option<Arc<dyn ProxyRotator>>,
    seed: Option<u64>,
    key_field: String,
}

impl BatchRunner {
    pub fn new(
        config: Arc<ScraperConfig>,
        registry: Arc<ActionRegistry>,
        factory: Arc<dyn BrowserFactory>,
    ) -> Self {
        Self {
            config,
            registry,
            factory,
            events: EventBus::default(),
            cancel: CancellationToken::new(),
            contract: None,
            quality_threshold: ExecutionSettings::default().quality_threshold,
            run_params: HashMap::new(),
            proxy: None,
            seed: None,
            key_field: "sku".to_string(),
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Apply engine settings: event buffer size and quality threshold.
    #[must_use]
    pub fn with_settings(mut self, settings: &ExecutionSettings) -> Self {
        self.events = EventBus::from_settings(settings);
        self.quality_threshold = settings.quality_threshold;
        self
    }

    /// Score succeeded records against `contract`.
    #[must_use]
    pub fn with_quality(mut self, contract: QualityContract) -> Self {
        self.contract = Some(contract);
        self
    }

    /// Score with the product contract adjusted by the recipe's overrides.
    #[must_use]
    pub fn with_recipe_quality(self) -> Self {
        let contract = QualityContract::for_validation(&self.config.validation);
        self.with_quality(contract)
    }

    /// Extra template parameters for every key, such as `username` and `password`.
    #[must_use]
    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.run_params = params;
        self
    }

    #[must_use]
    pub fn with_proxy_rotator(mut self, proxy: Arc<dyn ProxyRotator>) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Seed the anti-detection randomness.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Record field that receives the lookup key when the workflow did not
    /// extract one. Defaults to `sku`.
    #[must_use]
    pub fn with_key_field(mut self, field: impl Into<String>) -> Self {
        self.key_field = field.into();
        self
    }

    pub fn config(&self) -> &Arc<ScraperConfig> {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn executor(&self) -> WorkflowExecutor {
        let stealth = match self.seed {
            Some(seed) => AntiDetectionManager::with_rng(self.config.anti_detection.clone(), seed),
            None => AntiDetectionManager::new(self.config.anti_detection.clone()),
        };
        let stealth = match &self.proxy {
            Some(proxy) => stealth.with_proxy_rotator(Arc::clone(proxy)),
            None => stealth,
        };
        WorkflowExecutor::new(
            Arc::clone(&self.config),
            Arc::clone(&self.registry),
            Arc::clone(&self.factory),
        )
        .with_events(self.events.clone())
        .with_stealth(stealth)
        .with_cancellation(self.cancel.clone())
    }

    /// Run every key. One result per key, in input order.
    ///
    /// A recipe defect aborts before any browser work; a failing key is
    /// recorded and the batch moves on.
    pub async fn run(&self, keys: &[String]) -> Result<Vec<KeyResult>> {
        let mut executor = self.executor();
        executor.preflight()?;
        info!(site = %self.config.name, keys = keys.len(), "batch started");

        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            if self.cancel.is_cancelled() {
                results.push(KeyResult {
                    key: key.clone(),
                    status: KeyStatus::Cancelled,
                    record: Record::new(),
                    quality: None,
                    accepted: None,
                    error: None,
                });
                continue;
            }

            let mut ctx = ExecutionContext::new(key.clone(), &self.config.base_url)
                .with_params(self.run_params.clone());
            let (status, error) = match executor.run_key(&mut ctx).await {
                Ok(status) => (status, None),
                Err(e) => {
                    error!(site = %self.config.name, key = %key, error = %e, "key failed");
                    (KeyStatus::Failed, Some(e.to_string()))
                }
            };

            let mut record = ctx.results;
            let quality = match (&self.contract, status) {
                (Some(contract), KeyStatus::Succeeded) => {
                    record
                        .entry(self.key_field.clone())
                        .or_insert_with(|| key.clone().into());
                    Some(trawl_quality::score(&record, contract))
                }
                _ => None,
            };
            let accepted = quality
                .as_ref()
                .map(|report| report.is_acceptable(self.quality_threshold));
            if accepted == Some(false) {
                if let Some(report) = &quality {
                    warn!(
                        key = %key,
                        score = report.score,
                        threshold = self.quality_threshold,
                        errors = report.errors.len(),
                        "record below quality threshold"
                    );
                }
            }
            results.push(KeyResult {
                key: key.clone(),
                status,
                record,
                quality,
                accepted,
                error,
            });
        }

        executor.finish().await;
        let failed = results.iter().filter(|r| r.status == KeyStatus::Failed).count();
        info!(site = %self.config.name, keys = results.len(), failed, "batch finished");
        Ok(results)
    }
}

/// Keys to run through one site's recipe.
pub struct SiteJob {
    pub runner: BatchRunner,
    pub keys: Vec<String>,
}

/// Per-site outcome of [`run_sites`].
#[derive(Debug)]
pub struct SiteResult {
    pub site: String,
    pub results: Result<Vec<KeyResult>>,
}

/// Run independent sites in parallel, at most `max_concurrent` at a time.
/// Each site keeps its own browser session and anti-detection state.
/// Results arrive in completion order.
pub async fn run_sites(jobs: Vec<SiteJob>, max_concurrent: usize) -> Vec<SiteResult> {
    let max_concurrent = max_concurrent.max(1);
    let mut pending = FuturesUnordered::new();
    let mut finished = Vec::with_capacity(jobs.len());

    for job in jobs {
        pending.push(async move {
            let site = job.runner.config().name.clone();
            let results = job.runner.run(&job.keys).await;
            SiteResult { site, results }
        });

        while pending.len() >= max_concurrent {
            if let Some(result) = pending.next().await {
                finished.push(result);
            }
        }
    }

    while let Some(result) = pending.next().await {
        finished.push(result);
    }
    finished
}

/// [`run_sites`] bounded by [`ExecutionSettings::max_concurrent_sites`].
pub async fn run_sites_with_settings(
    jobs: Vec<SiteJob>,
    settings: &ExecutionSettings,
) -> Vec<SiteResult> {
    run_sites(jobs, settings.max_concurrent_sites).await
}
