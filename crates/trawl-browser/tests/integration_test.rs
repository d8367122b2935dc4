use std::sync::Arc;
use trawl_browser::{
    BrowserActions, BrowserEngine, BrowserSession, ChromiumFactory, LaunchOptions,
};

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_browser_engine_creation() {
    let engine = BrowserEngine::new().await;
    assert!(engine.is_ok(), "Failed to create browser engine");
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_navigation() {
    let mut engine = BrowserEngine::new().await.unwrap();

    let result = engine.navigate("https://example.com").await;
    assert!(result.is_ok(), "Navigation failed");

    let title = engine.page_title().await.unwrap();
    assert!(title.contains("Example"));
    engine.close().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_session_rotation_relaunches_chromium() {
    let factory = Arc::new(ChromiumFactory::new(LaunchOptions::default()));
    let mut session = BrowserSession::new(factory);

    session.navigate("https://example.com").await.unwrap();
    session.rotate().await.unwrap();
    assert_eq!(session.launches(), 2);

    let headings = session.browser().unwrap().find_all("h1").await.unwrap();
    assert!(!headings.is_empty());
    session.release().await.unwrap();
}
