//! Static HTML backend.
//!
//! A [`FixtureBrowser`] serves pages registered on a [`FixtureSite`] and
//! evaluates CSS selectors with `scraper`. Links are followed on click,
//! typed input is remembered per element, and scripts return canned values.
//! A page can serve different HTML on its first visit, which is how a
//! transient block is modeled.
//! It is the offline backend used to exercise workflows without Chromium.

use crate::actions::{is_xpath, resolve_url, BrowserActions, BrowserFactory, ElementRef};
use crate::error::{BrowserError, Result};
use scraper::{ElementRef as HtmlElement, Html, Node, Selector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Pages and canned behaviors served by fixture browsers.
#[derive(Debug, Clone, Default)]
pub struct FixtureSite {
    pages: HashMap<String, String>,
    first_visits: HashMap<String, String>,
    fallback: Option<String>,
    click_targets: Vec<(String, String)>,
    scripts: Vec<(String, serde_json::Value)>,
}

impl FixtureSite {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` at exactly `url` (a query string is ignored when no
    /// page matches the full URL)
    #[must_use]
    pub fn page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// Serve `html` instead of the regular page the first time `url` is loaded
    #[must_use]
    pub fn first_visit(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.first_visits.insert(url.into(), html.into());
        self
    }

    /// Serve `html` for any URL without a registered page
    #[must_use]
    pub fn fallback(mut self, html: impl Into<String>) -> Self {
        self.fallback = Some(html.into());
        self
    }

    /// Navigate to `url` when an element matching `selector` is clicked
    #[must_use]
    pub fn on_click(mut self, selector: impl Into<String>, url: impl Into<String>) -> Self {
        self.click_targets.push((selector.into(), url.into()));
        self
    }

    /// Return `value` from any script containing `needle`
    #[must_use]
    pub fn script(mut self, needle: impl Into<String>, value: serde_json::Value) -> Self {
        self.scripts.push((needle.into(), value));
        self
    }

    fn lookup(&self, url: &str) -> Option<&String> {
        self.pages
            .get(url)
            .or_else(|| {
                url.split_once('?')
                    .and_then(|(without_query, _)| self.pages.get(without_query))
            })
            .or(self.fallback.as_ref())
    }
}

/// Shared counters and logs for every browser a factory launched.
#[derive(Debug, Default)]
struct FixtureLog {
    launches: AtomicU32,
    closes: AtomicU32,
    visits: Mutex<Vec<String>>,
    clicks: Mutex<Vec<String>>,
    typed: Mutex<Vec<String>>,
    scripts: Mutex<Vec<String>>,
}

/// Launches [`FixtureBrowser`]s over one [`FixtureSite`].
#[derive(Debug, Clone)]
pub struct FixtureFactory {
    site: Arc<FixtureSite>,
    log: Arc<FixtureLog>,
}

impl FixtureFactory {
    #[must_use]
    pub fn new(site: FixtureSite) -> Self {
        Self {
            site: Arc::new(site),
            log: Arc::new(FixtureLog::default()),
        }
    }

    /// Browsers launched so far
    pub fn launches(&self) -> u32 {
        self.log.launches.load(Ordering::SeqCst)
    }

    /// Browsers closed so far
    pub fn closes(&self) -> u32 {
        self.log.closes.load(Ordering::SeqCst)
    }

    /// Every URL navigated to, in order, across all browsers
    pub fn visits(&self) -> Vec<String> {
        self.log.visits.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Text of every clicked element, in order, across all browsers
    pub fn clicks(&self) -> Vec<String> {
        self.log.clicks.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Every chunk passed to `type_text`, in order
    pub fn typed(&self) -> Vec<String> {
        self.log.typed.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Every script evaluated, in order
    pub fn scripts(&self) -> Vec<String> {
        self.log.scripts.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl BrowserFactory for FixtureFactory {
    async fn launch(&self) -> Result<Box<dyn BrowserActions>> {
        self.log.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FixtureBrowser {
            site: Arc::clone(&self.site),
            log: Arc::clone(&self.log),
            current_url: None,
            html: String::new(),
            elements: Vec::new(),
            typed: HashMap::new(),
            closed: false,
        }))
    }
}

/// Element handle bookkeeping: the selector that found it and its position.
#[derive(Debug, Clone)]
struct FoundElement {
    selector: String,
    index: usize,
}

/// Browser over static HTML documents.
pub struct FixtureBrowser {
    site: Arc<FixtureSite>,
    log: Arc<FixtureLog>,
    current_url: Option<String>,
    html: String,
    elements: Vec<FoundElement>,
    typed: HashMap<u64, String>,
    closed: bool,
}

impl FixtureBrowser {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(BrowserError::NoSession)
        } else {
            Ok(())
        }
    }

    fn found(&self, element: ElementRef) -> Result<&FoundElement> {
        usize::try_from(element.id())
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.elements.get(i))
            .ok_or(BrowserError::StaleElement(element.id()))
    }

    fn load(&mut self, url: &str) -> Result<()> {
        let mut visits = self
            .log
            .visits
            .lock()
            .map_err(|_| BrowserError::NavigationError("visit log poisoned".to_string()))?;
        let first = !visits.iter().any(|v| v == url);
        let html = first
            .then(|| self.site.first_visits.get(url))
            .flatten()
            .or_else(|| self.site.lookup(url))
            .ok_or_else(|| BrowserError::NavigationError(format!("no fixture page for {url}")))?
            .clone();
        visits.push(url.to_string());
        drop(visits);

        self.html = html;
        self.current_url = Some(url.to_string());
        self.elements.clear();
        self.typed.clear();
        Ok(())
    }

    /// Run `f` against the element behind `element` in a freshly parsed document.
    fn with_element<T>(
        &self,
        element: ElementRef,
        f: impl FnOnce(&Html, HtmlElement<'_>) -> T,
    ) -> Result<T> {
        let found = self.found(element)?;
        let document = Html::parse_document(&self.html);
        let selector = parse_selector(&found.selector)?;
        let el = document
            .select(&selector)
            .nth(found.index)
            .ok_or(BrowserError::StaleElement(element.id()))?;
        Ok(f(&document, el))
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    if is_xpath(selector) {
        return Err(BrowserError::InvalidSelector(format!(
            "{selector}: XPath is not supported by fixture pages"
        )));
    }
    Selector::parse(selector).map_err(|e| BrowserError::InvalidSelector(format!("{selector}: {e}")))
}

/// Whitespace-normalized text below `root`, ignoring script and style bodies.
fn visible_text(root: HtmlElement<'_>) -> String {
    let mut parts = Vec::new();
    for node in root.descendants() {
        if let Node::Text(text) = node.value() {
            let hidden = node
                .parent()
                .and_then(|p| p.value().as_element())
                .is_some_and(|p| matches!(p.name(), "script" | "style" | "noscript"));
            if !hidden {
                parts.push(text.to_string());
            }
        }
    }
    parts
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait::async_trait]
impl BrowserActions for FixtureBrowser {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.ensure_open()?;
        self.load(url)
    }

    async fn find_all(&mut self, selector: &str) -> Result<Vec<ElementRef>> {
        self.ensure_open()?;
        let parsed = parse_selector(selector)?;
        let count = Html::parse_document(&self.html).select(&parsed).count();
        let mut refs = Vec::with_capacity(count);
        for index in 0..count {
            self.elements.push(FoundElement {
                selector: selector.to_string(),
                index,
            });
            refs.push(ElementRef::new(self.elements.len() as u64));
        }
        Ok(refs)
    }

    async fn click(&mut self, element: ElementRef) -> Result<()> {
        self.ensure_open()?;
        let site = Arc::clone(&self.site);
        let (label, target) = self.with_element(element, |document, el| {
            let label = visible_text(el);
            let scripted = site.click_targets.iter().find_map(|(css, url)| {
                let css = Selector::parse(css).ok()?;
                document
                    .select(&css)
                    .any(|candidate| candidate.id() == el.id())
                    .then(|| url.clone())
            });
            let href = (el.value().name() == "a")
                .then(|| el.value().attr("href").map(ToString::to_string))
                .flatten();
            (label, scripted.or(href))
        })?;

        if let Ok(mut clicks) = self.log.clicks.lock() {
            clicks.push(label);
        }
        if let Some(target) = target {
            let url = resolve_url(self.current_url.as_deref(), &target);
            self.load(&url)?;
        }
        Ok(())
    }

    async fn type_text(&mut self, element: ElementRef, text: &str) -> Result<()> {
        self.ensure_open()?;
        self.found(element)?;
        self.typed.entry(element.id()).or_default().push_str(text);
        if let Ok(mut typed) = self.log.typed.lock() {
            typed.push(text.to_string());
        }
        Ok(())
    }

    async fn clear(&mut self, element: ElementRef) -> Result<()> {
        self.ensure_open()?;
        self.found(element)?;
        self.typed.insert(element.id(), String::new());
        Ok(())
    }

    async fn scroll_into_view(&mut self, element: ElementRef) -> Result<()> {
        self.ensure_open()?;
        self.found(element).map(|_| ())
    }

    async fn read_attribute(&mut self, element: ElementRef, name: &str) -> Result<Option<String>> {
        self.ensure_open()?;
        if name == "value" {
            if let Some(typed) = self.typed.get(&element.id()) {
                return Ok(Some(typed.clone()));
            }
        }
        self.with_element(element, |_, el| match name {
            "text" => Some(visible_text(el)),
            "html" => Some(el.inner_html()),
            other => el.value().attr(other).map(ToString::to_string),
        })
    }

    async fn execute_script(&mut self, script: &str) -> Result<serde_json::Value> {
        self.ensure_open()?;
        if let Ok(mut scripts) = self.log.scripts.lock() {
            scripts.push(script.to_string());
        }
        Ok(self
            .site
            .scripts
            .iter()
            .find(|(needle, _)| script.contains(needle.as_str()))
            .map_or(serde_json::Value::Null, |(_, value)| value.clone()))
    }

    async fn page_text(&mut self) -> Result<String> {
        self.ensure_open()?;
        let document = Html::parse_document(&self.html);
        let body = Selector::parse("body").map_err(|e| BrowserError::InvalidSelector(e.to_string()))?;
        let text = document
            .select(&body)
            .next()
            .map_or_else(|| visible_text(document.root_element()), visible_text);
        Ok(text)
    }

    async fn page_title(&mut self) -> Result<String> {
        self.ensure_open()?;
        let document = Html::parse_document(&self.html);
        let title = Selector::parse("title").map_err(|e| BrowserError::InvalidSelector(e.to_string()))?;
        Ok(document
            .select(&title)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .unwrap_or_default())
    }

    async fn current_url(&mut self) -> Result<Option<String>> {
        self.ensure_open()?;
        Ok(self.current_url.clone())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.log.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
