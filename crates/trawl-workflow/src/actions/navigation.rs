use crate::error::{StepError, StepResult};
use crate::params::{expect_one_of, expect_str, required_str, secs_param, str_param, string_list, usize_param};
use crate::registry::{ActionHandler, StepEffect};
use crate::scope::StepScope;
use async_trait::async_trait;
use trawl_recipe::StepParams;

/// `navigate { url }`
pub struct Navigate;

#[async_trait]
impl ActionHandler for Navigate {
    fn name(&self) -> &'static str {
        "navigate"
    }

    fn validate(&self, params: &StepParams) -> Result<(), String> {
        expect_str(params, "url")
    }

    fn counts_as_request(&self) -> bool {
        true
    }

    async fn execute(&self, scope: &mut StepScope<'_>, params: &StepParams) -> StepResult<StepEffect> {
        let url = required_str(params, "url")?;
        tracing::debug!(url, "navigating");
        scope.session.navigate(url).await?;
        Ok(StepEffect::Continue)
    }
}

/// `wait_for { selector | selectors, timeout? }`: block until any selector appears.
pub struct WaitFor;

fn wait_targets(params: &StepParams) -> Vec<String> {
    string_list(params, "selectors")
        .or_else(|| string_list(params, "selector"))
        .unwrap_or_default()
}

#[async_trait]
impl ActionHandler for WaitFor {
    fn name(&self) -> &'static str {
        "wait_for"
    }

    fn validate(&self, params: &StepParams) -> Result<(), String> {
        if wait_targets(params).iter().all(|s| s.trim().is_empty()) {
            return Err("'selector' or 'selectors' is required".to_string());
        }
        Ok(())
    }

    async fn execute(&self, scope: &mut StepScope<'_>, params: &StepParams) -> StepResult<StepEffect> {
        let candidates: Vec<String> = wait_targets(params)
            .iter()
            .flat_map(|s| scope.candidates(s))
            .collect();
        let timeout = secs_param(params, "timeout").unwrap_or_else(|| scope.timeout());
        scope.wait_for(&candidates, timeout).await?;
        Ok(StepEffect::Continue)
    }
}

/// `scroll { selector }` or `scroll { direction, amount? }`
pub struct Scroll;

const DIRECTIONS: &[&str] = &["down", "up", "top", "bottom"];

#[async_trait]
impl ActionHandler for Scroll {
    fn name(&self) -> &'static str {
        "scroll"
    }

    fn validate(&self, params: &StepParams) -> Result<(), String> {
        if str_param(params, "selector").is_none() && str_param(params, "direction").is_none() {
            return Err("'selector' or 'direction' is required".to_string());
        }
        expect_one_of(params, "direction", DIRECTIONS)
    }

    async fn execute(&self, scope: &mut StepScope<'_>, params: &StepParams) -> StepResult<StepEffect> {
        if let Some(selector) = str_param(params, "selector") {
            let candidates = scope.candidates(selector);
            let timeout = scope.timeout();
            let found = scope.wait_for(&candidates, timeout).await?;
            let first = *found
                .first()
                .ok_or_else(|| StepError::Selector(selector.to_string()))?;
            scope.browser()?.scroll_into_view(first).await?;
            return Ok(StepEffect::Continue);
        }

        let amount = usize_param(params, "amount", 500);
        let script = match str_param(params, "direction").unwrap_or("down") {
            "up" => format!("window.scrollBy(0, -{amount})"),
            "top" => "window.scrollTo(0, 0)".to_string(),
            "bottom" => "window.scrollTo(0, document.body.scrollHeight)".to_string(),
            _ => format!("window.scrollBy(0, {amount})"),
        };
        scope.browser()?.execute_script(&script).await?;
        Ok(StepEffect::Continue)
    }
}
