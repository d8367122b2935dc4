//! Per-session anti-detection state and the hooks wrapped around each step.
//!
//! One [`AntiDetectionManager`] belongs to exactly one browser session. The
//! workflow executor calls [`AntiDetectionManager::pre_step`] before a page
//! action and [`AntiDetectionManager::post_step`] after it:
//!
//! rate-limit wait → human pre-delay → step → human post-delay →
//! blocking check → CAPTCHA check → outcome update and request accounting.

use crate::detection;
use crate::error::{DetectionError, Result};
use crate::human;
use crate::rate_limit::RateLimiter;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use trawl_browser::BrowserSession;
use trawl_core::{EventBus, WorkflowEvent};
use trawl_recipe::AntiDetectionConfig;

/// External proxy service asked to change the exit IP when a block
/// survives both the extended wait and a session rotation.
#[async_trait]
pub trait ProxyRotator: Send + Sync {
    /// Switch to a new proxy. Returns whether the proxy actually changed.
    async fn rotate(&self) -> bool;
}

/// Rotator used when no proxy service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProxyRotator;

#[async_trait]
impl ProxyRotator for NoProxyRotator {
    async fn rotate(&self) -> bool {
        false
    }
}

/// Snapshot of the session counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub request_count: u32,
    pub session_age: Duration,
    pub consecutive_failures: u32,
    pub rotations: u32,
}

/// Result of a successful post-step hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// Nothing suspicious on the page
    Clear,
    /// A blocking page was found and recovered from; the step should run once more
    Recovered,
}

pub struct AntiDetectionManager {
    config: AntiDetectionConfig,
    limiter: RateLimiter,
    rng: StdRng,
    request_count: u32,
    session_started: Instant,
    rotations: u32,
    events: Option<EventBus>,
    proxy: Arc<dyn ProxyRotator>,
}

impl AntiDetectionManager {
    pub fn new(config: AntiDetectionConfig) -> Self {
        Self::build(config, StdRng::from_entropy())
    }

    /// Deterministic delays for tests.
    pub fn with_rng(config: AntiDetectionConfig, seed: u64) -> Self {
        Self::build(config, StdRng::seed_from_u64(seed))
    }

    fn build(config: AntiDetectionConfig, rng: StdRng) -> Self {
        Self {
            limiter: RateLimiter::from_config(&config),
            config,
            rng,
            request_count: 0,
            session_started: Instant::now(),
            rotations: 0,
            events: None,
            proxy: Arc::new(NoProxyRotator),
        }
    }

    /// Publish detections and rotations on `events`.
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn with_proxy_rotator(mut self, proxy: Arc<dyn ProxyRotator>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn config(&self) -> &AntiDetectionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            request_count: self.request_count,
            session_age: self.session_started.elapsed(),
            consecutive_failures: self.limiter.consecutive_failures(),
            rotations: self.rotations,
        }
    }

    fn emit(&self, event: WorkflowEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }

    /// Delay the rate limiter would apply now.
    pub fn next_rate_limit_delay(&mut self) -> Duration {
        self.limiter.next_delay(&mut self.rng)
    }

    /// Block for the rate-limit delay.
    pub async fn rate_limit(&mut self) {
        let delay = self.next_rate_limit_delay();
        debug!(
            delay_ms = delay.as_millis() as u64,
            failures = self.limiter.consecutive_failures(),
            "rate limit wait"
        );
        tokio::time::sleep(delay).await;
    }

    /// Sleep for a random duration within `[min, max]` seconds.
    pub async fn pause(&mut self, min: f64, max: f64) {
        let delay = human::sample(&mut self.rng, (min, max));
        tokio::time::sleep(delay).await;
    }

    /// Pause before typing one character, when human simulation is on.
    pub async fn typing_pause(&mut self) {
        if self.config.enable_human_simulation {
            let (low, high) = human::TYPING_DELAY;
            self.pause(low, high).await;
        }
    }

    /// Whether text input should be typed one character at a time
    pub fn types_per_character(&self) -> bool {
        self.config.enable_human_simulation
    }

    /// The human-simulation pause for `action` before or after it runs.
    pub async fn simulate_human(&mut self, action: &str, before: bool) {
        let range = if before {
            human::pre_delay(action)
        } else {
            human::post_delay(action)
        };
        if let Some((low, high)) = range {
            self.pause(low, high).await;
        }
    }

    /// Hook run before a page action.
    pub async fn pre_step(&mut self, session: &mut BrowserSession, action: &str) -> Result<()> {
        if self.config.enable_session_rotation
            && session.is_active()
            && self.session_started.elapsed().as_secs_f64() > self.config.max_session_age
        {
            self.rotate(session, "max session age").await?;
        }
        if self.config.enable_rate_limiting {
            self.rate_limit().await;
        }
        if self.config.enable_human_simulation {
            self.simulate_human(action, true).await;
        }
        Ok(())
    }

    /// Hook run after a page action.
    ///
    /// CAPTCHA detection happens here, after the step, so it inspects the
    /// page the step produced. A failed step only updates the rate limiter. A successful step is
    /// followed by the blocking and CAPTCHA checks; a block that the recovery
    /// ladder clears yields [`HookOutcome::Recovered`].
    pub async fn post_step(
        &mut self,
        session: &mut BrowserSession,
        action: &str,
        counts_as_request: bool,
        succeeded: bool,
    ) -> Result<HookOutcome> {
        if !succeeded {
            self.limiter.record_failure();
            return Ok(HookOutcome::Clear);
        }

        if self.config.enable_human_simulation {
            self.simulate_human(action, false).await;
        }

        if self.config.enable_blocking_handling {
            if let Some(indicator) = self.check_blocking(session).await? {
                self.limiter.record_failure();
                if self.recover_from_blocking(session).await? {
                    return Ok(HookOutcome::Recovered);
                }
                return Err(DetectionError::BlockingDetected { indicator });
            }
        }

        if self.config.enable_captcha_detection {
            if let Err(e) = self.handle_captcha(session).await {
                self.limiter.record_failure();
                return Err(e);
            }
        }

        self.limiter.record_success();
        if counts_as_request {
            self.record_request(session).await?;
        }
        Ok(HookOutcome::Clear)
    }

    /// Count one request and rotate once the interval is reached.
    pub async fn record_request(&mut self, session: &mut BrowserSession) -> Result<()> {
        self.request_count += 1;
        if self.config.enable_session_rotation
            && self.request_count >= self.config.session_rotation_interval
        {
            self.rotate(session, "request interval reached").await?;
        }
        Ok(())
    }

    /// Replace the browser and reset the session counters.
    pub async fn rotate(&mut self, session: &mut BrowserSession, reason: &str) -> Result<()> {
        let requests = self.request_count;
        if session.is_active() {
            session.rotate().await?;
        }
        self.request_count = 0;
        self.session_started = Instant::now();
        self.rotations += 1;
        info!(reason, requests, rotations = self.rotations, "session rotated");
        self.emit(WorkflowEvent::SessionRotated {
            reason: reason.to_string(),
            requests,
        });
        Ok(())
    }

    /// Scan the current page for a CAPTCHA without waiting.
    pub async fn detect_captcha(&mut self, session: &mut BrowserSession) -> Result<Option<String>> {
        if !session.is_active() {
            return Ok(None);
        }
        Ok(detection::find_captcha(session.browser()?, &self.config.captcha_selectors).await?)
    }

    /// Wait out a CAPTCHA, re-checking up to `max_retries_on_detection` times.
    pub async fn handle_captcha(&mut self, session: &mut BrowserSession) -> Result<()> {
        let Some(mut selector) = self.detect_captcha(session).await? else {
            return Ok(());
        };
        let wait = Duration::from_secs_f64(self.config.detection_wait);
        for attempt in 1..=self.config.max_retries_on_detection {
            warn!(selector = %selector, attempt, "CAPTCHA detected, waiting");
            self.emit(WorkflowEvent::CaptchaDetected {
                selector: selector.clone(),
                attempt,
            });
            tokio::time::sleep(wait).await;
            match self.detect_captcha(session).await? {
                Some(again) => selector = again,
                None => {
                    info!(attempt, "CAPTCHA cleared");
                    return Ok(());
                }
            }
        }
        Err(DetectionError::CaptchaDetected {
            selector,
            attempts: self.config.max_retries_on_detection,
        })
    }

    /// Scan the current page for a blocking indicator.
    pub async fn check_blocking(&mut self, session: &mut BrowserSession) -> Result<Option<String>> {
        if !session.is_active() {
            return Ok(None);
        }
        let found = detection::find_blocking(
            session.browser()?,
            &self.config.blocking_selectors,
            &self.config.blocking_text_patterns,
        )
        .await?;
        if let Some(indicator) = &found {
            warn!(indicator = %indicator, "blocking page detected");
            self.emit(WorkflowEvent::BlockingDetected {
                indicator: indicator.clone(),
            });
        }
        Ok(found)
    }

    async fn still_blocked(&mut self, session: &mut BrowserSession) -> Result<bool> {
        if !session.is_active() {
            return Ok(false);
        }
        let found = detection::find_blocking(
            session.browser()?,
            &self.config.blocking_selectors,
            &self.config.blocking_text_patterns,
        )
        .await?;
        Ok(found.is_some())
    }

    /// Recovery ladder: extended wait, then session rotation, then an
    /// external proxy rotation. Returns whether the page is clear afterwards.
    pub async fn recover_from_blocking(&mut self, session: &mut BrowserSession) -> Result<bool> {
        let wait = Duration::from_secs_f64(self.config.blocking_wait);
        info!(wait_secs = wait.as_secs_f64(), "blocking recovery: waiting");
        tokio::time::sleep(wait).await;
        session.reload().await?;
        if !self.still_blocked(session).await? {
            return Ok(true);
        }

        info!("blocking recovery: rotating session");
        self.rotate(session, "blocking detected").await?;
        if !self.still_blocked(session).await? {
            return Ok(true);
        }

        info!("blocking recovery: requesting proxy rotation");
        self.emit(WorkflowEvent::ProxyRotationRequested);
        if self.proxy.rotate().await {
            self.rotate(session, "proxy rotated").await?;
            if !self.still_blocked(session).await? {
                return Ok(true);
            }
        }

        warn!("blocking recovery exhausted");
        Ok(false)
    }

    #[cfg(test)]
    pub(crate) fn set_failures(&mut self, failures: u32) {
        self.limiter.set_failures(failures);
    }
}
