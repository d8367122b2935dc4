//! Browser capability layer for trawl workflows.
//!
//! Defines the operations a workflow may perform against a page
//! ([`BrowserActions`]), a scoped [`BrowserSession`] that acquires a browser
//! lazily and guarantees its release, and two backends: headless Chromium
//! with randomized fingerprints ([`BrowserEngine`]) and static HTML fixtures
//! ([`FixtureBrowser`]).

pub mod actions;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod fixture;
pub mod session;

pub use actions::{BrowserActions, BrowserFactory, ElementRef};
pub use engine::{BrowserEngine, ChromiumFactory, LaunchOptions};
pub use error::{BrowserError, Result};
pub use fingerprint::FingerprintConfig;
pub use fixture::{FixtureBrowser, FixtureFactory, FixtureSite};
pub use session::BrowserSession;
