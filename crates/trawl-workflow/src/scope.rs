//! What a handler sees while it runs.

use crate::context::ExecutionContext;
use crate::error::{StepError, StepResult};
use std::time::Duration;
use trawl_browser::{BrowserActions, BrowserError, BrowserSession, ElementRef};
use trawl_recipe::{split_fallbacks, ScraperConfig};
use trawl_stealth::AntiDetectionManager;

/// Mutable view of one run handed to an action handler.
pub struct StepScope<'a> {
    pub config: &'a ScraperConfig,
    pub session: &'a mut BrowserSession,
    pub stealth: &'a mut AntiDetectionManager,
    pub ctx: &'a mut ExecutionContext,
}

impl StepScope<'_> {
    /// The live browser. Page actions before any navigation fail here.
    pub fn browser(&mut self) -> StepResult<&mut dyn BrowserActions> {
        Ok(self.session.browser()?)
    }

    /// Recipe-wide bound for waits.
    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    /// Candidate expressions for `selector`: a declared selector's fallbacks
    /// when the name matches one, otherwise the raw expression split on
    /// top-level commas.
    pub fn candidates(&self, selector: &str) -> Vec<String> {
        match self.config.selector(selector) {
            Some(declared) => declared.candidates(),
            None => split_fallbacks(selector),
        }
    }

    /// Wait for the first candidate that matches, bounded by `timeout`.
    pub async fn wait_for(
        &mut self,
        candidates: &[String],
        timeout: Duration,
    ) -> StepResult<Vec<ElementRef>> {
        match self.session.wait_for_any(candidates, timeout).await {
            Ok((_, found)) => Ok(found),
            Err(BrowserError::Timeout(msg)) => Err(StepError::Selector(msg)),
            Err(e) => Err(e.into()),
        }
    }

    /// Elements for the first candidate that matches right now.
    pub async fn find_now(&mut self, candidates: &[String]) -> StepResult<Vec<ElementRef>> {
        Ok(self
            .session
            .find_first(candidates)
            .await?
            .map(|(_, found)| found)
            .unwrap_or_default())
    }
}
