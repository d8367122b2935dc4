use crate::error::{StepError, StepResult};
use crate::params::{bool_param, expect_str, required_str, str_param, usize_param};
use crate::registry::{ActionHandler, StepEffect};
use crate::scope::StepScope;
use async_trait::async_trait;
use regex::Regex;
use trawl_recipe::StepParams;

/// `click { selector, index?, exclude_text? }`
///
/// `exclude_text` is a regex; candidates whose text matches it are dropped
/// before `index` (default 0) picks one, so a recipe can click the first
/// non-sponsored result.
pub struct Click;

#[async_trait]
impl ActionHandler for Click {
    fn name(&self) -> &'static str {
        "click"
    }

    fn validate(&self, params: &StepParams) -> Result<(), String> {
        expect_str(params, "selector")?;
        if let Some(pattern) = str_param(params, "exclude_text") {
            Regex::new(pattern).map_err(|e| format!("'exclude_text' is not a valid regex: {e}"))?;
        }
        Ok(())
    }

    fn counts_as_request(&self) -> bool {
        true
    }

    async fn execute(&self, scope: &mut StepScope<'_>, params: &StepParams) -> StepResult<StepEffect> {
        let selector = required_str(params, "selector")?;
        let index = usize_param(params, "index", 0);
        let exclude = str_param(params, "exclude_text")
            .map(Regex::new)
            .transpose()
            .map_err(|e| StepError::InvalidParams(e.to_string()))?;

        let candidates = scope.candidates(selector);
        let timeout = scope.timeout();
        let found = scope.wait_for(&candidates, timeout).await?;

        let browser = scope.browser()?;
        let mut eligible = Vec::with_capacity(found.len());
        for element in found {
            if let Some(re) = &exclude {
                let text = browser.read_attribute(element, "text").await?.unwrap_or_default();
                if re.is_match(&text) {
                    continue;
                }
            }
            eligible.push(element);
        }

        let target = eligible.get(index).copied().ok_or_else(|| {
            StepError::Selector(format!(
                "{selector}: no eligible element at index {index} ({} eligible)",
                eligible.len()
            ))
        })?;
        browser.click(target).await?;
        Ok(StepEffect::Continue)
    }
}

/// `input_text { selector, text, clear? }`
pub struct InputText;

#[async_trait]
impl ActionHandler for InputText {
    fn name(&self) -> &'static str {
        "input_text"
    }

    fn validate(&self, params: &StepParams) -> Result<(), String> {
        expect_str(params, "selector")?;
        match params.get("text") {
            Some(serde_json::Value::String(_)) => Ok(()),
            _ => Err("'text' is required".to_string()),
        }
    }

    async fn execute(&self, scope: &mut StepScope<'_>, params: &StepParams) -> StepResult<StepEffect> {
        let selector = required_str(params, "selector")?;
        let text = str_param(params, "text").unwrap_or_default();
        let candidates = scope.candidates(selector);
        let timeout = scope.timeout();
        let found = scope.wait_for(&candidates, timeout).await?;
        let field = *found
            .first()
            .ok_or_else(|| StepError::Selector(selector.to_string()))?;

        if bool_param(params, "clear", true) {
            scope.browser()?.clear(field).await?;
        }
        type_into(scope, field, text).await?;
        Ok(StepEffect::Continue)
    }
}

/// Type `text`, one character at a time with pauses when human simulation is on.
pub(crate) async fn type_into(
    scope: &mut StepScope<'_>,
    field: trawl_browser::ElementRef,
    text: &str,
) -> StepResult<()> {
    if !scope.stealth.types_per_character() {
        scope.browser()?.type_text(field, text).await?;
        return Ok(());
    }
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        scope.stealth.typing_pause().await;
        scope.browser()?.type_text(field, ch.encode_utf8(&mut buf)).await?;
    }
    Ok(())
}
