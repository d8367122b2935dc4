use crate::error::Result;

/// Opaque handle to an element found on the current page.
///
/// Handles are only valid until the next navigation; using one afterwards
/// yields [`crate::BrowserError::StaleElement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef(u64);

impl ElementRef {
    /// Wrap a backend-assigned element id.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Backend-assigned element id.
    #[must_use]
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Browser actions for automation.
///
/// All operations act on the single page owned by the implementation.
#[async_trait::async_trait]
pub trait BrowserActions: Send {
    /// Navigate to a URL and wait for the load to finish
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Find every element matching a CSS selector, or XPath when the
    /// selector starts with `/` or `(`
    async fn find_all(&mut self, selector: &str) -> Result<Vec<ElementRef>>;

    /// Click an element
    async fn click(&mut self, element: ElementRef) -> Result<()>;

    /// Type text into an element
    async fn type_text(&mut self, element: ElementRef, text: &str) -> Result<()>;

    /// Clear an input element's value
    async fn clear(&mut self, element: ElementRef) -> Result<()>;

    /// Scroll an element into the viewport
    async fn scroll_into_view(&mut self, element: ElementRef) -> Result<()>;

    /// Read an attribute. The pseudo-attributes `text`, `html` and `value`
    /// return the rendered text, inner HTML and current input value.
    async fn read_attribute(&mut self, element: ElementRef, name: &str) -> Result<Option<String>>;

    /// Evaluate JavaScript in the page and return its JSON result
    async fn execute_script(&mut self, script: &str) -> Result<serde_json::Value>;

    /// Visible text of the whole page
    async fn page_text(&mut self) -> Result<String>;

    /// Document title
    async fn page_title(&mut self) -> Result<String>;

    /// URL of the current page, if any
    async fn current_url(&mut self) -> Result<Option<String>>;

    /// Release the browser and its resources
    async fn close(&mut self) -> Result<()>;
}

/// Launches fresh browsers for a [`crate::BrowserSession`].
#[async_trait::async_trait]
pub trait BrowserFactory: Send + Sync {
    /// Start a new, independent browser
    async fn launch(&self) -> Result<Box<dyn BrowserActions>>;
}

/// Whether a selector should be evaluated as XPath.
#[must_use]
pub fn is_xpath(selector: &str) -> bool {
    let trimmed = selector.trim_start();
    trimmed.starts_with('/') || trimmed.starts_with('(')
}

/// Resolve a possibly relative link against the page it was found on.
///
/// Returns the input unchanged when either side cannot be parsed.
#[must_use]
pub fn resolve_url(base: Option<&str>, link: &str) -> String {
    if link.starts_with("http://") || link.starts_with("https://") || link.starts_with("data:") {
        return link.to_string();
    }
    base.and_then(|b| url::Url::parse(b).ok())
        .and_then(|b| b.join(link).ok())
        .map_or_else(|| link.to_string(), |u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_xpath() {
        assert!(is_xpath("//div[@class='price']"));
        assert!(is_xpath("(//a)[1]"));
        assert!(!is_xpath("div.price > span"));
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url(Some("https://shop.test/search?q=1"), "/img/a.jpg"),
            "https://shop.test/img/a.jpg"
        );
        assert_eq!(
            resolve_url(Some("https://shop.test/p/1"), "https://cdn.test/b.jpg"),
            "https://cdn.test/b.jpg"
        );
        assert_eq!(resolve_url(None, "/relative"), "/relative");
    }
}
