use crate::actions::{is_xpath, BrowserActions, BrowserFactory, ElementRef};
use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use trawl_core::BrowserSettings;

const PAGE_TEXT_SCRIPT: &str = "document.body ? document.body.innerText : ''";

/// Options applied to every Chromium launch
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub viewport: Option<(u32, u32)>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            viewport: None,
        }
    }
}

impl From<&BrowserSettings> for LaunchOptions {
    fn from(settings: &BrowserSettings) -> Self {
        let viewport = match (settings.window_width, settings.window_height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => None,
        };
        Self {
            headless: settings.headless,
            executable: settings.executable.clone(),
            viewport,
        }
    }
}

/// Browser automation engine backed by headless Chromium
pub struct BrowserEngine {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    fingerprint: FingerprintConfig,
    elements: HashMap<u64, Element>,
    next_element_id: u64,
    closed: bool,
}

impl BrowserEngine {
    /// Create a new browser engine with default configuration
    pub async fn new() -> Result<Self> {
        Self::launch(&LaunchOptions::default(), FingerprintConfig::randomized()).await
    }

    /// Launch Chromium with the given options and fingerprint
    pub async fn launch(options: &LaunchOptions, fingerprint: FingerprintConfig) -> Result<Self> {
        let fingerprint = match options.viewport {
            Some((w, h)) => fingerprint.with_viewport(w, h),
            None => fingerprint,
        };

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(fingerprint.viewport_width, fingerprint.viewport_height)
            .arg(format!("--user-agent={}", fingerprint.user_agent))
            .arg("--disable-blink-features=AutomationControlled");
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &options.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        // Spawn browser handler
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        if let Err(e) = page
            .execute(SetTimezoneOverrideParams::new(fingerprint.timezone.clone()))
            .await
        {
            tracing::debug!(error = %e, timezone = %fingerprint.timezone, "timezone override rejected");
        }

        tracing::debug!(
            user_agent = %fingerprint.user_agent,
            width = fingerprint.viewport_width,
            height = fingerprint.viewport_height,
            "launched chromium"
        );

        Ok(Self {
            browser,
            page,
            handler_task,
            fingerprint,
            elements: HashMap::new(),
            next_element_id: 0,
            closed: false,
        })
    }

    /// Fingerprint this browser was launched with
    pub fn fingerprint(&self) -> &FingerprintConfig {
        &self.fingerprint
    }

    fn element(&self, element: ElementRef) -> Result<&Element> {
        self.elements
            .get(&element.id())
            .ok_or(BrowserError::StaleElement(element.id()))
    }

    fn register(&mut self, found: Vec<Element>) -> Vec<ElementRef> {
        found
            .into_iter()
            .map(|el| {
                self.next_element_id += 1;
                self.elements.insert(self.next_element_id, el);
                ElementRef::new(self.next_element_id)
            })
            .collect()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(BrowserError::NoSession)
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl BrowserActions for BrowserEngine {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.ensure_open()?;
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationError(format!("{url}: {e}")))?;
        self.elements.clear();
        Ok(())
    }

    async fn find_all(&mut self, selector: &str) -> Result<Vec<ElementRef>> {
        self.ensure_open()?;
        let found = if is_xpath(selector) {
            // An XPath search with no hits surfaces as a protocol error
            self.page.find_xpaths(selector).await.unwrap_or_default()
        } else {
            self.page
                .find_elements(selector)
                .await
                .map_err(|e| BrowserError::InvalidSelector(format!("{selector}: {e}")))?
        };
        Ok(self.register(found))
    }

    async fn click(&mut self, element: ElementRef) -> Result<()> {
        self.element(element)?
            .click()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        Ok(())
    }

    async fn type_text(&mut self, element: ElementRef, text: &str) -> Result<()> {
        let el = self.element(element)?;
        el.click()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        el.type_str(text)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        Ok(())
    }

    async fn clear(&mut self, element: ElementRef) -> Result<()> {
        self.element(element)?
            .call_js_fn(
                "function() { this.value = ''; this.dispatchEvent(new Event('input', { bubbles: true })); }",
                false,
            )
            .await
            .map_err(|e| BrowserError::ScriptError(e.to_string()))?;
        Ok(())
    }

    async fn scroll_into_view(&mut self, element: ElementRef) -> Result<()> {
        self.element(element)?
            .scroll_into_view()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        Ok(())
    }

    async fn read_attribute(&mut self, element: ElementRef, name: &str) -> Result<Option<String>> {
        let el = self.element(element)?;
        let value = match name {
            "text" => el.inner_text().await,
            "html" => el.inner_html().await,
            "value" => el.property("value").await.map(|v| {
                v.and_then(|v| v.as_str().map(ToString::to_string))
            }),
            other => el.attribute(other).await,
        };
        value.map_err(|e| BrowserError::ChromiumError(e.to_string()))
    }

    async fn execute_script(&mut self, script: &str) -> Result<serde_json::Value> {
        self.ensure_open()?;
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::ScriptError(e.to_string()))?;
        Ok(result.into_value().unwrap_or(serde_json::Value::Null))
    }

    async fn page_text(&mut self) -> Result<String> {
        self.ensure_open()?;
        let result = self
            .page
            .evaluate(PAGE_TEXT_SCRIPT)
            .await
            .map_err(|e| BrowserError::ScriptError(e.to_string()))?;
        Ok(result.into_value::<String>().unwrap_or_default())
    }

    async fn page_title(&mut self) -> Result<String> {
        self.ensure_open()?;
        let title = self
            .page
            .get_title()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        Ok(title.unwrap_or_default())
    }

    async fn current_url(&mut self) -> Result<Option<String>> {
        self.ensure_open()?;
        self.page
            .url()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.elements.clear();
        let closed = self
            .browser
            .close()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()));
        if let Err(e) = self.browser.wait().await {
            tracing::debug!(error = %e, "chromium process did not exit cleanly");
        }
        self.handler_task.abort();
        closed.map(|_| ())
    }
}

/// Launches a freshly fingerprinted [`BrowserEngine`] per session
#[derive(Debug, Clone, Default)]
pub struct ChromiumFactory {
    options: LaunchOptions,
}

impl ChromiumFactory {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }
}

#[async_trait::async_trait]
impl BrowserFactory for ChromiumFactory {
    async fn launch(&self) -> Result<Box<dyn BrowserActions>> {
        let engine = BrowserEngine::launch(&self.options, FingerprintConfig::randomized()).await?;
        Ok(Box::new(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_options_from_settings() {
        let settings = BrowserSettings {
            headless: false,
            window_width: Some(1280),
            window_height: Some(720),
            executable: None,
        };
        let options = LaunchOptions::from(&settings);
        assert!(!options.headless);
        assert_eq!(options.viewport, Some((1280, 720)));
    }

    #[test]
    fn test_partial_viewport_is_ignored() {
        let settings = BrowserSettings {
            window_width: Some(1280),
            ..BrowserSettings::default()
        };
        assert_eq!(LaunchOptions::from(&settings).viewport, None);
    }
}
