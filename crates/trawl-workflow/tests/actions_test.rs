//! Individual actions driven through the executor against scripted pages.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use trawl_browser::{FixtureFactory, FixtureSite};
use trawl_core::{EventBus, KeyStatus, WorkflowEvent};
use trawl_recipe::{parse_toml, AntiDetectionConfig, ScraperConfig};
use trawl_stealth::AntiDetectionManager;
use trawl_workflow::{ActionRegistry, ExecutionContext, StepError, WorkflowError, WorkflowExecutor};

fn recipe(body: &str, anti_detection: AntiDetectionConfig) -> Arc<ScraperConfig> {
    let mut config = parse_toml(&format!(
        "name = \"hardware\"\nbase_url = \"https://hw.test\"\ntimeout = 5\nretries = 0\n{body}"
    ))
    .expect("valid recipe");
    config.anti_detection = anti_detection;
    Arc::new(config)
}

struct Run {
    factory: FixtureFactory,
    ctx: ExecutionContext,
    outcome: trawl_workflow::Result<KeyStatus>,
    events: Vec<WorkflowEvent>,
}

async fn run(config: Arc<ScraperConfig>, site: FixtureSite, key: &str) -> Run {
    let factory = FixtureFactory::new(site);
    let bus = EventBus::new(256);
    let mut rx = bus.subscribe();
    let mut executor = WorkflowExecutor::new(
        Arc::clone(&config),
        Arc::new(ActionRegistry::with_defaults()),
        Arc::new(factory.clone()),
    )
    .with_stealth(AntiDetectionManager::with_rng(config.anti_detection.clone(), 5))
    .with_events(bus);

    let mut ctx = ExecutionContext::new(key, "https://hw.test");
    let outcome = executor.run_key(&mut ctx).await;
    executor.finish().await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    Run {
        factory,
        ctx,
        outcome,
        events,
    }
}

const SEARCH_PAGE: &str = r#"
<html><head><title>Search results</title></head><body>
  <h1>Search results</h1>
  <div class="result"><a href="/p/9">Sponsored - Drill Bit Set</a></div>
  <div class="result"><a href="/p/1">Cordless Drill</a></div>
  <div class="result"><a href="/p/2">Hammer Drill</a></div>
</body></html>
"#;

fn store() -> FixtureSite {
    FixtureSite::new()
        .page("https://hw.test/search", SEARCH_PAGE)
        .page("https://hw.test/p/1", "<h1>Cordless Drill</h1>")
        .page("https://hw.test/p/2", "<h1>Hammer Drill</h1>")
        .page("https://hw.test/p/9", "<h1>Drill Bit Set</h1>")
}

fn click_recipe(click_params: &str) -> Arc<ScraperConfig> {
    recipe(
        &format!(
            r#"
[[selectors]]
name = "name"
selector = "h1"

[[workflow]]
action = "navigate"
params = {{ url = "{{base_url}}/search" }}

[[workflow]]
action = "click"
params = {click_params}

[[workflow]]
action = "extract_single"
params = {{ field = "name" }}
"#
        ),
        AntiDetectionConfig::disabled(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_rotation_after_click_resumes_clicked_page() {
    let config = recipe(
        r#"
[[selectors]]
name = "name"
selector = "h1"

[[workflow]]
action = "navigate"
params = { url = "{base_url}/search" }

[[workflow]]
action = "click"
params = { selector = ".result a", index = 1 }

[[workflow]]
action = "extract_single"
params = { field = "name" }
"#,
        AntiDetectionConfig {
            enable_session_rotation: true,
            session_rotation_interval: 2,
            ..AntiDetectionConfig::disabled()
        },
    );

    let run = run(config, store(), "1").await;

    assert_eq!(run.outcome.unwrap(), KeyStatus::Succeeded);
    assert_eq!(run.ctx.results["name"], json!("Cordless Drill"));
    assert_eq!(
        run.factory.visits(),
        vec![
            "https://hw.test/search".to_string(),
            "https://hw.test/p/1".to_string(),
            "https://hw.test/p/1".to_string(),
        ]
    );
    assert_eq!(run.factory.launches(), 2);
    assert_eq!(
        run.events
            .iter()
            .filter(|e| matches!(e, WorkflowEvent::SessionRotated { requests: 2, .. }))
            .count(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_click_skips_excluded_text_before_index() {
    let first = run(
        click_recipe(r#"{ selector = ".result a", exclude_text = "(?i)sponsored" }"#),
        store(),
        "1",
    )
    .await;
    assert_eq!(first.outcome.unwrap(), KeyStatus::Succeeded);
    assert_eq!(first.ctx.results["name"], json!("Cordless Drill"));
    assert_eq!(first.factory.clicks(), vec!["Cordless Drill".to_string()]);

    let second = run(
        click_recipe(r#"{ selector = ".result a", exclude_text = "(?i)sponsored", index = 1 }"#),
        store(),
        "1",
    )
    .await;
    assert_eq!(second.ctx.results["name"], json!("Hammer Drill"));

    let unfiltered = run(click_recipe(r#"{ selector = ".result a" }"#), store(), "1").await;
    assert_eq!(unfiltered.ctx.results["name"], json!("Drill Bit Set"));
}

#[tokio::test(start_paused = true)]
async fn test_click_index_past_eligible_fails() {
    let run = run(
        click_recipe(r#"{ selector = ".result a", exclude_text = "(?i)sponsored", index = 2 }"#),
        store(),
        "1",
    )
    .await;
    match run.outcome.unwrap_err() {
        WorkflowError::Execution { step, source, .. } => {
            assert_eq!(step, "click");
            assert!(matches!(source, StepError::Selector(ref msg) if msg.contains("2 eligible")));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(run.factory.clicks().is_empty());
}

const SEARCH_FORM: &str = r##"
[[workflow]]
action = "navigate"
params = { url = "{base_url}/" }

[[workflow]]
action = "input_text"
params = { selector = "#q", text = "{sku}" }
"##;

fn form_site() -> FixtureSite {
    FixtureSite::new().page("https://hw.test/", r#"<input id="q" value="old"><button>Go</button>"#)
}

#[tokio::test(start_paused = true)]
async fn test_input_text_types_whole_value() {
    let run = run(recipe(SEARCH_FORM, AntiDetectionConfig::disabled()), form_site(), "drill").await;
    assert_eq!(run.outcome.unwrap(), KeyStatus::Succeeded);
    assert_eq!(run.factory.typed(), vec!["drill".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_input_text_types_per_character_when_human() {
    let human = AntiDetectionConfig {
        enable_human_simulation: true,
        ..AntiDetectionConfig::disabled()
    };
    let started = Instant::now();
    let run = run(recipe(SEARCH_FORM, human), form_site(), "drill").await;

    assert_eq!(run.outcome.unwrap(), KeyStatus::Succeeded);
    assert_eq!(run.factory.typed(), vec!["d", "r", "i", "l", "l"]);
    assert!(started.elapsed() > Duration::ZERO);
}

fn consent_recipe() -> Arc<ScraperConfig> {
    recipe(
        r##"
[[selectors]]
name = "name"
selector = "h1"

[[workflow]]
action = "navigate"
params = { url = "{base_url}/p/{sku}" }

[[workflow]]
action = "conditional_click"
params = { selector = "#accept-cookies" }

[[workflow]]
action = "extract_single"
params = { field = "name" }
"##,
        AntiDetectionConfig::disabled(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_conditional_click_present() {
    let site = FixtureSite::new().page(
        "https://hw.test/p/1",
        r#"<button id="accept-cookies">Accept all</button><h1>Cordless Drill</h1>"#,
    );
    let started = Instant::now();
    let run = run(consent_recipe(), site, "1").await;

    assert_eq!(run.outcome.unwrap(), KeyStatus::Succeeded);
    assert_eq!(run.factory.clicks(), vec!["Accept all".to_string()]);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_conditional_click_absent_waits_then_continues() {
    let site = FixtureSite::new().page("https://hw.test/p/1", "<h1>Cordless Drill</h1>");
    let started = Instant::now();
    let run = run(consent_recipe(), site, "1").await;

    assert_eq!(run.outcome.unwrap(), KeyStatus::Succeeded);
    assert!(run.factory.clicks().is_empty());
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(run.ctx.results["name"], json!("Cordless Drill"));
}

const PRODUCT_JSON: &str = r#"
<h1>Cordless Drill</h1>
<script type="application/ld+json">{ not json</script>
<script type="application/ld+json">
  {"name": "Cordless Drill", "offers": [{"price": 129.99, "priceCurrency": "USD"}]}
</script>
"#;

#[tokio::test(start_paused = true)]
async fn test_extract_from_json_follows_dot_path() {
    let config = recipe(
        r#"
[[workflow]]
action = "navigate"
params = { url = "{base_url}/p/{sku}" }

[[workflow]]
action = "extract_from_json"
params = { field = "price", path = "offers.0.price" }

[[workflow]]
action = "extract_from_json"
params = { field = "currency", path = "offers.0.priceCurrency" }
"#,
        AntiDetectionConfig::disabled(),
    );
    let site = FixtureSite::new().page("https://hw.test/p/1", PRODUCT_JSON);
    let run = run(config, site, "1").await;

    assert_eq!(run.outcome.unwrap(), KeyStatus::Succeeded);
    assert_eq!(run.ctx.results["price"], json!("129.99"));
    assert_eq!(run.ctx.results["currency"], json!("USD"));
}

#[tokio::test(start_paused = true)]
async fn test_extract_from_json_missing_path_fails() {
    let config = recipe(
        r#"
[[workflow]]
action = "navigate"
params = { url = "{base_url}/p/{sku}" }

[[workflow]]
action = "extract_from_json"
params = { field = "gtin", path = "offers.0.gtin13" }
"#,
        AntiDetectionConfig::disabled(),
    );
    let site = FixtureSite::new().page("https://hw.test/p/1", PRODUCT_JSON);
    let run = run(config, site, "1").await;

    let err = run.outcome.unwrap_err();
    assert_eq!(err.step(), Some("extract_from_json"));
    assert!(matches!(
        err,
        WorkflowError::Execution { source: StepError::Payload(ref msg), .. } if msg.contains("1 unparsable")
    ));
    assert!(!run.ctx.results.contains_key("gtin"));
}

#[tokio::test(start_paused = true)]
async fn test_extract_multiple_empty_and_resolved() {
    let config = recipe(
        r#"
[[selectors]]
name = "image_urls"
selector = "img.gallery"
attribute = "src"

[[workflow]]
action = "navigate"
params = { url = "{base_url}/p/{sku}" }

[[workflow]]
action = "extract_multiple"
params = { field = "image_urls" }
"#,
        AntiDetectionConfig::disabled(),
    );
    let site = FixtureSite::new()
        .page("https://hw.test/p/1", "<h1>No pictures</h1>")
        .page(
            "https://hw.test/p/2",
            r#"<img class="gallery" src="/img/2a.jpg"><img class="gallery" src="https://cdn.test/2b.jpg">"#,
        );

    let empty = run(Arc::clone(&config), site.clone(), "1").await;
    assert_eq!(empty.outcome.unwrap(), KeyStatus::Succeeded);
    assert_eq!(empty.ctx.results["image_urls"], json!([]));

    let found = run(config, site, "2").await;
    assert_eq!(
        found.ctx.results["image_urls"],
        json!(["https://hw.test/img/2a.jpg", "https://cdn.test/2b.jpg"])
    );
}

#[tokio::test(start_paused = true)]
async fn test_scroll_by_direction_and_to_element() {
    let config = recipe(
        r##"
[[workflow]]
action = "navigate"
params = { url = "{base_url}/p/{sku}" }

[[workflow]]
action = "scroll"
params = { direction = "bottom" }

[[workflow]]
action = "scroll"
params = { direction = "up", amount = 200 }

[[workflow]]
action = "scroll"
params = { selector = "#reviews" }
"##,
        AntiDetectionConfig::disabled(),
    );
    let site = FixtureSite::new().page("https://hw.test/p/1", r#"<div id="reviews">4.5 stars</div>"#);
    let run = run(config, site, "1").await;

    assert_eq!(run.outcome.unwrap(), KeyStatus::Succeeded);
    assert_eq!(
        run.factory.scripts(),
        vec![
            "window.scrollTo(0, document.body.scrollHeight)".to_string(),
            "window.scrollBy(0, -200)".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_scroll_to_missing_element_fails() {
    let config = recipe(
        r##"
[[workflow]]
action = "navigate"
params = { url = "{base_url}/p/{sku}" }

[[workflow]]
action = "scroll"
params = { selector = "#reviews" }
"##,
        AntiDetectionConfig::disabled(),
    );
    let site = FixtureSite::new().page("https://hw.test/p/1", "<h1>Drill</h1>");
    let run = run(config, site, "1").await;

    assert!(matches!(
        run.outcome.unwrap_err(),
        WorkflowError::Execution { source: StepError::Selector(_), index: 1, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_cleared_block_reruns_step_once() {
    let config = recipe(
        r#"
[[selectors]]
name = "name"
selector = "h1"

[[workflow]]
action = "navigate"
params = { url = "{base_url}/p/{sku}" }

[[workflow]]
action = "extract_single"
params = { field = "name" }
"#,
        AntiDetectionConfig {
            enable_blocking_handling: true,
            blocking_wait: 30.0,
            ..AntiDetectionConfig::disabled()
        },
    );
    let site = FixtureSite::new()
        .page("https://hw.test/p/1", "<h1>Cordless Drill</h1>")
        .first_visit("https://hw.test/p/1", "<h1>Access Denied</h1>");

    let started = Instant::now();
    let run = run(config, site, "1").await;

    assert_eq!(run.outcome.unwrap(), KeyStatus::Succeeded);
    assert_eq!(run.ctx.results["name"], json!("Cordless Drill"));
    assert!(started.elapsed() >= Duration::from_secs(30));
    // Blocked load, recovery reload, then the one rerun of the step.
    assert_eq!(run.factory.visits(), vec!["https://hw.test/p/1".to_string(); 3]);
    assert_eq!(run.factory.launches(), 1);

    let count = |pred: fn(&WorkflowEvent) -> bool| run.events.iter().filter(|e| pred(e)).count();
    assert_eq!(count(|e| matches!(e, WorkflowEvent::BlockingDetected { .. })), 1);
    assert_eq!(count(|e| matches!(e, WorkflowEvent::StepStarted { index: 0, .. })), 1);
    assert_eq!(count(|e| matches!(e, WorkflowEvent::StepSucceeded { index: 0, .. })), 1);
    assert_eq!(count(|e| matches!(e, WorkflowEvent::SessionRotated { .. })), 0);
}
