//! Trawl Core - Foundation crate for the trawl scraping engine.
//!
//! This crate provides shared types, the typed workflow event stream,
//! engine configuration and logging bootstrap that all other trawl crates
//! depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based engine configuration with XDG paths
//! - [`types`] - Shared newtypes and aliases (`RunId`, `Record`, `KeyStatus`)
//! - [`events`] - Typed event stream for workflow progress
//! - [`logging`] - `tracing-subscriber` initialization
//!
//! # Example
//!
//! ```rust
//! use trawl_core::{AppConfig, EventBus, WorkflowEvent};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert!(config.browser.headless);
//!
//! let bus = EventBus::new(64);
//! let mut events = bus.subscribe();
//! bus.emit(WorkflowEvent::KeyStarted { key: "035585499741".to_string() });
//! assert!(matches!(events.try_recv()?, WorkflowEvent::KeyStarted { .. }));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, BrowserSettings, ExecutionSettings, LoggingConfig, PlatformSettings};
pub use error::{ConfigFileError, ConfigFileResult, CoreError, Result};
pub use events::{EventBus, WorkflowEvent};
pub use logging::init_logging;
pub use types::{KeyStatus, Record, RunId};
