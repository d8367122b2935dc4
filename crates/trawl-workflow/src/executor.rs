//! Runs a recipe's workflow for one key at a time.
//!
//! Steps run strictly in order. Page actions are wrapped in the
//! anti-detection hooks; selector and timeout failures are retried up to the
//! recipe's `retries`; a blocking page the recovery ladder clears earns the
//! step exactly one more run.

use crate::context::ExecutionContext;
use crate::error::{Result, StepError, StepResult, WorkflowError};
use crate::registry::{ActionHandler, ActionRegistry, StepEffect};
use crate::scope::StepScope;
use crate::template;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trawl_browser::{BrowserFactory, BrowserSession};
use trawl_core::{EventBus, KeyStatus, WorkflowEvent};
use trawl_recipe::{ConfigError, ScraperConfig, StepParams};
use trawl_stealth::{AntiDetectionManager, HookOutcome};

/// Interprets one recipe against one browser session.
///
/// Keys run sequentially; session and anti-detection state carry over from
/// one key to the next.
pub struct WorkflowExecutor {
    config: Arc<ScraperConfig>,
    registry: Arc<ActionRegistry>,
    session: BrowserSession,
    stealth: AntiDetectionManager,
    events: EventBus,
    cancel: CancellationToken,
}

impl WorkflowExecutor {
    pub fn new(
        config: Arc<ScraperConfig>,
        registry: Arc<ActionRegistry>,
        factory: Arc<dyn BrowserFactory>,
    ) -> Self {
        let events = EventBus::default();
        let stealth =
            AntiDetectionManager::new(config.anti_detection.clone()).with_events(events.clone());
        Self {
            config,
            registry,
            session: BrowserSession::new(factory),
            stealth,
            events,
            cancel: CancellationToken::new(),
        }
    }

    /// Publish progress on `events`. Also rewires the anti-detection manager.
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.stealth = self.stealth.with_events(events.clone());
        self.events = events;
        self
    }

    /// Replace the anti-detection manager, e.g. with a seeded one.
    #[must_use]
    pub fn with_stealth(mut self, stealth: AntiDetectionManager) -> Self {
        self.stealth = stealth.with_events(self.events.clone());
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub fn session(&self) -> &BrowserSession {
        &self.session
    }

    pub fn stealth(&self) -> &AntiDetectionManager {
        &self.stealth
    }

    /// Check the recipe against the registry before any browser work.
    pub fn preflight(&self) -> Result<()> {
        self.registry.check_config(&self.config)?;
        Ok(())
    }

    /// Run the workflow for `ctx.key`. Extracted fields land in `ctx.results`
    /// whatever the outcome.
    ///
    /// Returns `Succeeded`, `Skipped` or `Cancelled`; failures are errors.
    pub async fn run_key(&mut self, ctx: &mut ExecutionContext) -> Result<KeyStatus> {
        let key = ctx.key.clone();
        info!(site = %self.config.name, key = %key, "key started");
        self.events.emit(WorkflowEvent::KeyStarted { key: key.clone() });

        let outcome = self.run_steps(ctx).await;
        let status = match &outcome {
            Ok(status) => *status,
            Err(_) => KeyStatus::Failed,
        };
        self.events.emit(WorkflowEvent::KeyFinished {
            key: key.clone(),
            status,
        });
        info!(key = %key, status = %status, fields = ctx.results.len(), "key finished");
        outcome
    }

    async fn run_steps(&mut self, ctx: &mut ExecutionContext) -> Result<KeyStatus> {
        let config = Arc::clone(&self.config);
        for (index, step) in config.workflow.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(key = %ctx.key, index, "cancelled; releasing browser session");
                if let Err(e) = self.session.release().await {
                    warn!(error = %e, "releasing session after cancellation failed");
                }
                return Ok(KeyStatus::Cancelled);
            }

            let handler = self
                .registry
                .get(&step.action)
                .ok_or_else(|| ConfigError::UnknownAction {
                    index,
                    action: step.action.clone(),
                })?;
            let params = template::resolve_params(&step.params, ctx);

            self.events.emit(WorkflowEvent::StepStarted {
                key: ctx.key.clone(),
                index,
                action: step.action.clone(),
            });
            debug!(key = %ctx.key, index, step = %step.action, "step started");

            match self.run_step(index, handler.as_ref(), &params, ctx).await {
                Ok(effect) => {
                    self.events.emit(WorkflowEvent::StepSucceeded {
                        key: ctx.key.clone(),
                        index,
                        action: step.action.clone(),
                    });
                    if let StepEffect::SkipRemaining { reason } = effect {
                        info!(key = %ctx.key, index, reason = %reason, "skipping remaining steps");
                        self.events.emit(WorkflowEvent::KeySkipped {
                            key: ctx.key.clone(),
                            index,
                            reason,
                        });
                        return Ok(KeyStatus::Skipped);
                    }
                }
                Err(source) => {
                    warn!(key = %ctx.key, index, step = %step.action, error = %source, "step failed");
                    self.events.emit(WorkflowEvent::StepFailed {
                        key: ctx.key.clone(),
                        index,
                        action: step.action.clone(),
                        error: source.to_string(),
                    });
                    return Err(match source {
                        StepError::Config(e) => WorkflowError::Config(e),
                        source => WorkflowError::Execution {
                            step: step.action.clone(),
                            index,
                            source,
                        },
                    });
                }
            }
        }
        Ok(KeyStatus::Succeeded)
    }

    async fn run_step(
        &mut self,
        index: usize,
        handler: &dyn ActionHandler,
        params: &StepParams,
        ctx: &mut ExecutionContext,
    ) -> StepResult<StepEffect> {
        let action = handler.name();
        let page = handler.touches_page();
        let mut attempt: u32 = 0;
        let mut recovery_used = false;

        loop {
            attempt += 1;
            if page {
                self.stealth.pre_step(&mut self.session, action).await?;
            }
            handler.validate(params).map_err(StepError::InvalidParams)?;

            let result = {
                let mut scope = StepScope {
                    config: &self.config,
                    session: &mut self.session,
                    stealth: &mut self.stealth,
                    ctx: &mut *ctx,
                };
                handler.execute(&mut scope, params).await
            };

            if page {
                // CAPTCHA and blocking checks run here, after the step.
                let outcome = self
                    .stealth
                    .post_step(
                        &mut self.session,
                        action,
                        handler.counts_as_request(),
                        result.is_ok(),
                    )
                    .await?;
                if outcome == HookOutcome::Recovered && !recovery_used {
                    recovery_used = true;
                    info!(key = %ctx.key, index, step = action, "blocking cleared; retrying step once");
                    continue;
                }
            }

            match result {
                Ok(effect) => return Ok(effect),
                Err(e) if e.is_retryable() && attempt <= self.config.retries => {
                    warn!(key = %ctx.key, index, step = action, attempt, error = %e, "retrying step");
                    self.events.emit(WorkflowEvent::StepRetrying {
                        key: ctx.key.clone(),
                        index,
                        action: action.to_string(),
                        attempt,
                        error: e.to_string(),
                    });
                    if !(page && self.stealth.config().enable_rate_limiting) {
                        self.stealth.rate_limit().await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Release the browser session.
    pub async fn finish(mut self) {
        if let Err(e) = self.session.release().await {
            warn!(error = %e, "releasing browser session failed");
        }
    }
}
