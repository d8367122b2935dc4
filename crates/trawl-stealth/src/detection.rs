//! Heuristic scans for challenge and access-denied pages.

use trawl_browser::{BrowserActions, Result};

/// First CAPTCHA selector present on the page.
pub async fn find_captcha(
    browser: &mut dyn BrowserActions,
    selectors: &[String],
) -> Result<Option<String>> {
    first_present(browser, selectors).await
}

/// First blocking indicator on the page: a selector, then a pattern found in
/// the title, then a pattern found in the body text. Patterns match
/// case-insensitively.
pub async fn find_blocking(
    browser: &mut dyn BrowserActions,
    selectors: &[String],
    patterns: &[String],
) -> Result<Option<String>> {
    if let Some(selector) = first_present(browser, selectors).await? {
        return Ok(Some(selector));
    }
    if patterns.is_empty() {
        return Ok(None);
    }

    let title = browser.page_title().await?;
    if let Some(pattern) = first_match(&title, patterns) {
        return Ok(Some(format!("title: {pattern}")));
    }
    let text = browser.page_text().await?;
    Ok(first_match(&text, patterns).map(|p| format!("text: {p}")))
}

/// First pattern contained in `haystack`, ignoring case.
pub fn first_match<'a>(haystack: &str, patterns: &'a [String]) -> Option<&'a str> {
    let haystack = haystack.to_lowercase();
    patterns
        .iter()
        .find(|p| !p.is_empty() && haystack.contains(&p.to_lowercase()))
        .map(String::as_str)
}

async fn first_present(
    browser: &mut dyn BrowserActions,
    selectors: &[String],
) -> Result<Option<String>> {
    for selector in selectors {
        if !browser.find_all(selector).await?.is_empty() {
            return Ok(Some(selector.clone()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trawl_browser::{BrowserFactory, FixtureFactory, FixtureSite};

    async fn open(html: &str) -> Box<dyn BrowserActions> {
        let factory = FixtureFactory::new(FixtureSite::new().fallback(html));
        let mut browser = factory.launch().await.unwrap();
        browser.navigate("https://shop.test/").await.unwrap();
        browser
    }

    #[test]
    fn test_first_match_ignores_case() {
        let patterns = vec!["access denied".to_string()];
        assert_eq!(first_match("ACCESS Denied - ref 42", &patterns), Some("access denied"));
        assert_eq!(first_match("welcome", &patterns), None);
    }

    #[tokio::test]
    async fn test_captcha_selector_hit() {
        let mut browser = open(r#"<div class="g-recaptcha"></div>"#).await;
        let selectors = vec!["#captcha".to_string(), ".g-recaptcha".to_string()];
        let hit = find_captcha(browser.as_mut(), &selectors).await.unwrap();
        assert_eq!(hit.as_deref(), Some(".g-recaptcha"));
    }

    #[tokio::test]
    async fn test_blocking_from_title_and_text() {
        let patterns = vec!["too many requests".to_string()];
        let mut browser =
            open("<html><head><title>Too Many Requests</title></head><body>x</body></html>").await;
        let hit = find_blocking(browser.as_mut(), &[], &patterns).await.unwrap();
        assert_eq!(hit.as_deref(), Some("title: too many requests"));

        let mut browser = open("<p>Sorry, too many requests from your network</p>").await;
        let hit = find_blocking(browser.as_mut(), &[], &patterns).await.unwrap();
        assert_eq!(hit.as_deref(), Some("text: too many requests"));

        let mut browser = open("<p>Product page</p>").await;
        assert!(find_blocking(browser.as_mut(), &["#challenge-form".to_string()], &patterns)
            .await
            .unwrap()
            .is_none());
    }
}
