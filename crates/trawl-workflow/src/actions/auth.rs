use crate::actions::interaction::type_into;
use crate::error::{StepError, StepResult};
use crate::registry::{ActionHandler, StepEffect};
use crate::scope::StepScope;
use crate::template;
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;
use trawl_recipe::{ConfigError, ScraperConfig, StepParams};

/// `login`: drive the recipe's `[login]` section with the run's
/// `username` and `password` parameters.
pub struct Login;

#[async_trait]
impl ActionHandler for Login {
    fn name(&self) -> &'static str {
        "login"
    }

    fn validate(&self, _params: &StepParams) -> Result<(), String> {
        Ok(())
    }

    fn counts_as_request(&self) -> bool {
        true
    }

    fn check_recipe(
        &self,
        index: usize,
        _params: &StepParams,
        config: &ScraperConfig,
    ) -> Result<(), ConfigError> {
        if config.login.is_none() {
            return Err(ConfigError::MissingLogin { index });
        }
        Ok(())
    }

    async fn execute(&self, scope: &mut StepScope<'_>, _params: &StepParams) -> StepResult<StepEffect> {
        let login = scope
            .config
            .login
            .clone()
            .ok_or(StepError::Config(ConfigError::MissingLogin { index: 0 }))?;
        let credential = |name: &str| {
            scope
                .ctx
                .params
                .get(name)
                .cloned()
                .ok_or_else(|| StepError::InvalidParams(format!("login requires a '{name}' run parameter")))
        };
        let username = credential("username")?;
        let password = credential("password")?;

        let url = template::resolve(&login.url, &*scope.ctx);
        scope.session.navigate(&url).await?;
        let timeout = login.timeout.map_or_else(|| scope.timeout(), Duration::from_secs);

        for (selector, value) in [
            (&login.username_selector, &username),
            (&login.password_selector, &password),
        ] {
            let candidates = scope.candidates(selector);
            let input = *scope
                .wait_for(&candidates, timeout)
                .await?
                .first()
                .ok_or_else(|| StepError::Selector(selector.clone()))?;
            scope.browser()?.clear(input).await?;
            type_into(scope, input, value).await?;
        }

        let candidates = scope.candidates(&login.submit_selector);
        let submit = *scope
            .wait_for(&candidates, timeout)
            .await?
            .first()
            .ok_or_else(|| StepError::Selector(login.submit_selector.clone()))?;
        scope.browser()?.click(submit).await?;

        if let Some(success) = &login.success_selector {
            let candidates = scope.candidates(success);
            scope.wait_for(&candidates, timeout).await?;
        }
        info!(site = %scope.config.name, "logged in");
        Ok(StepEffect::Continue)
    }
}
