use crate::context::ContextFlag;
use crate::error::{StepError, StepResult};
use crate::params::{expect_one_of, expect_str, required_str, secs_param, str_param, string_list};
use crate::registry::{ActionHandler, StepEffect};
use crate::scope::StepScope;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};
use trawl_recipe::StepParams;

/// `check_no_results { selectors?, patterns? }`
///
/// Sets `no_results_found` when any no-results selector is present or the
/// page text contains any pattern, ignoring case. Defaults come from the
/// recipe's `[validation]` section.
pub struct CheckNoResults;

#[async_trait]
impl ActionHandler for CheckNoResults {
    fn name(&self) -> &'static str {
        "check_no_results"
    }

    fn validate(&self, _params: &StepParams) -> Result<(), String> {
        Ok(())
    }

    async fn execute(&self, scope: &mut StepScope<'_>, params: &StepParams) -> StepResult<StepEffect> {
        let selectors = string_list(params, "selectors")
            .unwrap_or_else(|| scope.config.validation.no_results_selectors.clone());
        let patterns: Vec<String> = string_list(params, "patterns")
            .unwrap_or_else(|| scope.config.validation.no_results_text_patterns.clone())
            .into_iter()
            .map(|p| p.to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        let browser = scope.browser()?;
        let mut found = None;
        for selector in &selectors {
            if !browser.find_all(selector).await?.is_empty() {
                found = Some(selector.clone());
                break;
            }
        }
        if found.is_none() && !patterns.is_empty() {
            let text = browser.page_text().await?.to_lowercase();
            found = patterns.into_iter().find(|p| text.contains(p.as_str()));
        }

        scope.ctx.no_results_found = found.is_some();
        match found {
            Some(indicator) => info!(key = %scope.ctx.key, indicator = %indicator, "no results page"),
            None => debug!(key = %scope.ctx.key, "results present"),
        }
        Ok(StepEffect::Continue)
    }
}

/// `conditional_skip { if_flag }`: end the key as a skip when the flag is set.
pub struct ConditionalSkip;

#[async_trait]
impl ActionHandler for ConditionalSkip {
    fn name(&self) -> &'static str {
        "conditional_skip"
    }

    fn validate(&self, params: &StepParams) -> Result<(), String> {
        expect_str(params, "if_flag")?;
        str_param(params, "if_flag")
            .unwrap_or_default()
            .parse::<ContextFlag>()
            .map(|_| ())
    }

    fn touches_page(&self) -> bool {
        false
    }

    async fn execute(&self, scope: &mut StepScope<'_>, params: &StepParams) -> StepResult<StepEffect> {
        let flag: ContextFlag = required_str(params, "if_flag")?
            .parse()
            .map_err(StepError::InvalidParams)?;
        if scope.ctx.flag(flag) {
            return Ok(StepEffect::SkipRemaining {
                reason: flag.to_string(),
            });
        }
        Ok(StepEffect::Continue)
    }
}

/// `conditional_click { selector, timeout? }`: click if the element shows up
/// within the wait (default 3s), otherwise do nothing.
pub struct ConditionalClick;

const CONDITIONAL_WAIT: Duration = Duration::from_secs(3);

#[async_trait]
impl ActionHandler for ConditionalClick {
    fn name(&self) -> &'static str {
        "conditional_click"
    }

    fn validate(&self, params: &StepParams) -> Result<(), String> {
        expect_str(params, "selector")
    }

    fn counts_as_request(&self) -> bool {
        true
    }

    async fn execute(&self, scope: &mut StepScope<'_>, params: &StepParams) -> StepResult<StepEffect> {
        let selector = required_str(params, "selector")?;
        let candidates = scope.candidates(selector);
        let timeout = secs_param(params, "timeout").unwrap_or(CONDITIONAL_WAIT);
        match scope.wait_for(&candidates, timeout).await {
            Ok(found) => {
                if let Some(first) = found.first().copied() {
                    scope.browser()?.click(first).await?;
                }
            }
            Err(StepError::Selector(_)) => debug!(selector, "conditional click target absent"),
            Err(e) => return Err(e),
        }
        Ok(StepEffect::Continue)
    }
}

/// How `verify` compares values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    /// Case-insensitive substring
    Contains,
    /// Equality of the digits only
    FuzzyNumber,
}

impl MatchMode {
    fn parse(s: Option<&str>) -> Self {
        match s {
            Some("contains") => Self::Contains,
            Some("fuzzy_number") => Self::FuzzyNumber,
            _ => Self::Exact,
        }
    }

    pub fn matches(self, expected: &str, actual: &str) -> bool {
        match self {
            Self::Exact => expected.trim() == actual.trim(),
            Self::Contains => actual.to_lowercase().contains(&expected.trim().to_lowercase()),
            Self::FuzzyNumber => {
                let digits = |s: &str| s.chars().filter(char::is_ascii_digit).collect::<String>();
                let expected = digits(expected);
                !expected.is_empty() && expected == digits(actual)
            }
        }
    }
}

/// `verify { field, expected, match_mode?, on_failure? }`
pub struct Verify;

#[async_trait]
impl ActionHandler for Verify {
    fn name(&self) -> &'static str {
        "verify"
    }

    fn validate(&self, params: &StepParams) -> Result<(), String> {
        expect_str(params, "field")?;
        expect_str(params, "expected")?;
        expect_one_of(params, "match_mode", &["exact", "contains", "fuzzy_number"])?;
        expect_one_of(params, "on_failure", &["fail_workflow", "log_warning"])
    }

    fn touches_page(&self) -> bool {
        false
    }

    async fn execute(&self, scope: &mut StepScope<'_>, params: &StepParams) -> StepResult<StepEffect> {
        let field = required_str(params, "field")?;
        let expected = required_str(params, "expected")?;
        let mode = MatchMode::parse(str_param(params, "match_mode"));
        let actual = scope.ctx.text(field).unwrap_or_default();

        if mode.matches(expected, &actual) {
            return Ok(StepEffect::Continue);
        }

        if str_param(params, "on_failure") == Some("log_warning") {
            warn!(key = %scope.ctx.key, field, expected, actual = %actual, "verification failed");
            scope.ctx.verification_failed = true;
            return Ok(StepEffect::Continue);
        }
        Err(StepError::Verification {
            field: field.to_string(),
            expected: expected.to_string(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuzzy_number_ignores_formatting() {
        assert!(MatchMode::FuzzyNumber.matches("035-585-499741", "035585499741"));
        assert!(!MatchMode::FuzzyNumber.matches("035-585-499742", "035585499741"));
        assert!(!MatchMode::FuzzyNumber.matches("n/a", ""));
    }

    #[test]
    fn test_exact_and_contains() {
        assert!(MatchMode::Exact.matches(" Drill ", "Drill"));
        assert!(!MatchMode::Exact.matches("drill", "Drill"));
        assert!(MatchMode::Contains.matches("drill", "Cordless DRILL Kit"));
    }

    #[test]
    fn test_match_mode_parse_defaults_to_exact() {
        assert_eq!(MatchMode::parse(None), MatchMode::Exact);
        assert_eq!(MatchMode::parse(Some("fuzzy_number")), MatchMode::FuzzyNumber);
    }
}
