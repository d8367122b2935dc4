//! Explicit anti-detection steps. They call the manager directly and are not
//! wrapped in the automatic hooks.

use crate::error::{StepError, StepResult};
use crate::params::{f64_param, str_param};
use crate::registry::{ActionHandler, StepEffect};
use crate::scope::StepScope;
use async_trait::async_trait;
use trawl_recipe::StepParams;
use trawl_stealth::DetectionError;

/// `detect_captcha`
pub struct DetectCaptcha;

#[async_trait]
impl ActionHandler for DetectCaptcha {
    fn name(&self) -> &'static str {
        "detect_captcha"
    }

    fn validate(&self, _params: &StepParams) -> Result<(), String> {
        Ok(())
    }

    fn touches_page(&self) -> bool {
        false
    }

    async fn execute(&self, scope: &mut StepScope<'_>, _params: &StepParams) -> StepResult<StepEffect> {
        scope.stealth.handle_captcha(scope.session).await?;
        Ok(StepEffect::Continue)
    }
}

/// `handle_blocking`
pub struct HandleBlocking;

#[async_trait]
impl ActionHandler for HandleBlocking {
    fn name(&self) -> &'static str {
        "handle_blocking"
    }

    fn validate(&self, _params: &StepParams) -> Result<(), String> {
        Ok(())
    }

    fn touches_page(&self) -> bool {
        false
    }

    async fn execute(&self, scope: &mut StepScope<'_>, _params: &StepParams) -> StepResult<StepEffect> {
        if let Some(indicator) = scope.stealth.check_blocking(scope.session).await? {
            if !scope.stealth.recover_from_blocking(scope.session).await? {
                return Err(StepError::Detection(DetectionError::BlockingDetected { indicator }));
            }
        }
        Ok(StepEffect::Continue)
    }
}

/// `rate_limit`
pub struct RateLimit;

#[async_trait]
impl ActionHandler for RateLimit {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn validate(&self, _params: &StepParams) -> Result<(), String> {
        Ok(())
    }

    fn touches_page(&self) -> bool {
        false
    }

    async fn execute(&self, scope: &mut StepScope<'_>, _params: &StepParams) -> StepResult<StepEffect> {
        scope.stealth.rate_limit().await;
        Ok(StepEffect::Continue)
    }
}

/// `simulate_human { action? } | { min, max }`: one human-like pause.
pub struct SimulateHuman;

#[async_trait]
impl ActionHandler for SimulateHuman {
    fn name(&self) -> &'static str {
        "simulate_human"
    }

    fn validate(&self, params: &StepParams) -> Result<(), String> {
        match (f64_param(params, "min"), f64_param(params, "max")) {
            (Some(min), Some(max)) if min < 0.0 || min > max => {
                Err(format!("'min' ({min}) must be between 0 and 'max' ({max})"))
            }
            (Some(_), None) | (None, Some(_)) => Err("'min' and 'max' go together".to_string()),
            _ => Ok(()),
        }
    }

    fn touches_page(&self) -> bool {
        false
    }

    async fn execute(&self, scope: &mut StepScope<'_>, params: &StepParams) -> StepResult<StepEffect> {
        match (f64_param(params, "min"), f64_param(params, "max")) {
            (Some(min), Some(max)) => scope.stealth.pause(min, max).await,
            _ => {
                let action = str_param(params, "action").unwrap_or("click");
                scope.stealth.simulate_human(action, false).await;
            }
        }
        Ok(StepEffect::Continue)
    }
}

/// `rotate_session`
pub struct RotateSession;

#[async_trait]
impl ActionHandler for RotateSession {
    fn name(&self) -> &'static str {
        "rotate_session"
    }

    fn validate(&self, _params: &StepParams) -> Result<(), String> {
        Ok(())
    }

    fn touches_page(&self) -> bool {
        false
    }

    async fn execute(&self, scope: &mut StepScope<'_>, _params: &StepParams) -> StepResult<StepEffect> {
        scope.stealth.rotate(scope.session, "workflow step").await?;
        Ok(StepEffect::Continue)
    }
}
