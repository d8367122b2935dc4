//! Scoped browser ownership.
//!
//! A [`BrowserSession`] holds at most one live browser. It launches one on
//! the first navigation, resumes a rotated session on whatever page the old
//! browser was showing, and closes the browser on
//! [`BrowserSession::release`]. Dropping a session with a live browser drops
//! the backend, which tears the browser process down.

use crate::actions::{BrowserActions, BrowserFactory, ElementRef};
use crate::error::{BrowserError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Interval between selector polls while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Lazily acquired, explicitly released browser.
pub struct BrowserSession {
    factory: Arc<dyn BrowserFactory>,
    browser: Option<Box<dyn BrowserActions>>,
    last_url: Option<String>,
    launches: u32,
}

impl BrowserSession {
    /// Create a session that launches browsers from `factory` on demand.
    pub fn new(factory: Arc<dyn BrowserFactory>) -> Self {
        Self {
            factory,
            browser: None,
            last_url: None,
            launches: 0,
        }
    }

    /// Whether a browser is currently held
    pub fn is_active(&self) -> bool {
        self.browser.is_some()
    }

    /// Browsers launched over the session's lifetime
    pub fn launches(&self) -> u32 {
        self.launches
    }

    /// Page a rotated session resumes on
    pub fn last_url(&self) -> Option<&str> {
        self.last_url.as_deref()
    }

    /// The live browser, or [`BrowserError::NoSession`] before the first navigation
    pub fn browser(&mut self) -> Result<&mut dyn BrowserActions> {
        match self.browser.as_deref_mut() {
            Some(browser) => Ok(browser),
            None => Err(BrowserError::NoSession),
        }
    }

    async fn acquire(&mut self) -> Result<&mut dyn BrowserActions> {
        if self.browser.is_none() {
            let browser = self.factory.launch().await?;
            self.launches += 1;
            debug!(launches = self.launches, "browser session acquired");
            self.browser = Some(browser);
        }
        self.browser()
    }

    /// Navigate, launching a browser first if none is held.
    pub async fn navigate(&mut self, url: &str) -> Result<()> {
        self.acquire().await?.navigate(url).await?;
        self.last_url = Some(url.to_string());
        Ok(())
    }

    /// Close the held browser, if any. The next navigation launches a new one.
    pub async fn release(&mut self) -> Result<()> {
        if let Some(mut browser) = self.browser.take() {
            debug!("releasing browser session");
            browser.close().await?;
        }
        Ok(())
    }

    /// Load the page the browser is showing again.
    ///
    /// Does nothing while no browser is held or nothing has been visited.
    pub async fn reload(&mut self) -> Result<()> {
        let Some(browser) = self.browser.as_deref_mut() else {
            return Ok(());
        };
        let url = match browser.current_url().await? {
            Some(url) => url,
            None => match self.last_url.clone() {
                Some(url) => url,
                None => return Ok(()),
            },
        };
        debug!(url = %url, "reloading page");
        self.navigate(&url).await
    }

    /// Replace the held browser with a fresh one and return to the page the
    /// old browser was on.
    ///
    /// Clicks and form submits can move the page without going through
    /// [`BrowserSession::navigate`], so the old browser's current URL wins
    /// over the last navigated one. A failure to close the old browser is
    /// logged and does not prevent the new one from being acquired.
    pub async fn rotate(&mut self) -> Result<()> {
        if let Some(browser) = self.browser.as_deref_mut() {
            match browser.current_url().await {
                Ok(Some(url)) => self.last_url = Some(url),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "reading page before rotation failed"),
            }
        }
        if let Err(e) = self.release().await {
            warn!(error = %e, "closing rotated browser failed");
        }
        self.acquire().await?;
        if let Some(url) = self.last_url.clone() {
            info!(url = %url, "resuming page after session rotation");
            self.browser()?.navigate(&url).await?;
        }
        Ok(())
    }

    /// Return the first selector (in order) that currently matches, with its elements.
    pub async fn find_first(
        &mut self,
        selectors: &[String],
    ) -> Result<Option<(usize, Vec<ElementRef>)>> {
        let browser = self.browser()?;
        for (index, selector) in selectors.iter().enumerate() {
            let found = browser.find_all(selector).await?;
            if !found.is_empty() {
                return Ok(Some((index, found)));
            }
        }
        Ok(None)
    }

    /// Poll until any of `selectors` matches, bounded by `timeout`.
    ///
    /// Returns the index of the matching selector and its elements, or
    /// [`BrowserError::Timeout`] once the deadline passes.
    pub async fn wait_for_any(
        &mut self,
        selectors: &[String],
        timeout: Duration,
    ) -> Result<(usize, Vec<ElementRef>)> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(found) = self.find_first(selectors).await? {
                return Ok(found);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(BrowserError::Timeout(format!(
                    "none of [{}] appeared within {:?}",
                    selectors.join(", "),
                    timeout
                )));
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            debug!("browser session dropped while active; backend will tear down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{FixtureFactory, FixtureSite};

    fn session(site: FixtureSite) -> (FixtureFactory, BrowserSession) {
        let factory = FixtureFactory::new(site);
        let session = BrowserSession::new(Arc::new(factory.clone()));
        (factory, session)
    }

    #[tokio::test]
    async fn test_lazy_acquire_on_navigate() {
        let (factory, mut session) = session(FixtureSite::new().fallback("<p>ok</p>"));
        assert!(!session.is_active());
        assert!(matches!(session.browser(), Err(BrowserError::NoSession)));
        assert_eq!(factory.launches(), 0);

        session.navigate("https://a.test/").await.unwrap();
        session.navigate("https://a.test/2").await.unwrap();
        assert!(session.is_active());
        assert_eq!(factory.launches(), 1);
        assert_eq!(session.last_url(), Some("https://a.test/2"));
    }

    #[tokio::test]
    async fn test_release_closes_browser() {
        let (factory, mut session) = session(FixtureSite::new().fallback("<p>ok</p>"));
        session.navigate("https://a.test/").await.unwrap();
        session.release().await.unwrap();
        session.release().await.unwrap();
        assert!(!session.is_active());
        assert_eq!(factory.closes(), 1);
    }

    #[tokio::test]
    async fn test_rotate_resumes_last_page() {
        let (factory, mut session) = session(FixtureSite::new().fallback("<p>ok</p>"));
        session.navigate("https://a.test/item").await.unwrap();
        session.rotate().await.unwrap();

        assert_eq!(factory.launches(), 2);
        assert_eq!(factory.closes(), 1);
        assert_eq!(
            factory.visits(),
            vec!["https://a.test/item".to_string(), "https://a.test/item".to_string()]
        );
        assert_eq!(session.launches(), 2);
    }

    #[tokio::test]
    async fn test_rotate_resumes_page_reached_by_click() {
        let (factory, mut session) = session(
            FixtureSite::new()
                .page("https://a.test/search", r#"<a class="hit" href="/p/7">Drill</a>"#)
                .page("https://a.test/p/7", "<h1>Drill</h1>"),
        );
        session.navigate("https://a.test/search").await.unwrap();
        let browser = session.browser().unwrap();
        let hit = browser.find_all("a.hit").await.unwrap()[0];
        browser.click(hit).await.unwrap();

        session.rotate().await.unwrap();

        assert_eq!(session.last_url(), Some("https://a.test/p/7"));
        assert_eq!(factory.visits().last().map(String::as_str), Some("https://a.test/p/7"));
        let browser = session.browser().unwrap();
        assert_eq!(browser.find_all("h1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reload_revisits_current_page() {
        let (factory, mut session) = session(FixtureSite::new().fallback("<p>ok</p>"));
        session.reload().await.unwrap();
        assert!(factory.visits().is_empty());

        session.navigate("https://a.test/item").await.unwrap();
        session.reload().await.unwrap();
        assert_eq!(factory.visits().len(), 2);
        assert_eq!(factory.launches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_any_picks_first_present() {
        let (_, mut session) = session(
            FixtureSite::new().fallback(r#"<div class="b">B</div><div class="c">C</div>"#),
        );
        session.navigate("https://a.test/").await.unwrap();

        let selectors = vec![".a".to_string(), ".c".to_string(), ".b".to_string()];
        let (index, found) = session
            .wait_for_any(&selectors, Duration::from_secs(5))
            .await
            .expect("one selector matches");
        assert_eq!(index, 1);
        assert_eq!(found.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_any_times_out() {
        let (_, mut session) = session(FixtureSite::new().fallback("<p>empty</p>"));
        session.navigate("https://a.test/").await.unwrap();

        let started = Instant::now();
        let result = session
            .wait_for_any(&[".missing".to_string()], Duration::from_secs(3))
            .await;
        assert!(matches!(result, Err(BrowserError::Timeout(_))));
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
