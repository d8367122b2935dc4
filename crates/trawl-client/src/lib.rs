//! Execution client facade.
//!
//! [`ExecutionClient`] starts a batch of keys through a recipe and collects
//! the records, the same way whether the batch runs in this process
//! ([`LocalClient`]) or as an actor run on a remote job platform
//! ([`PlatformClient`]).

pub mod client;
pub mod error;
pub mod local;
pub mod platform;
pub mod types;

pub use client::ExecutionClient;
pub use error::{ClientError, PlatformError, Result};
pub use local::LocalClient;
pub use platform::PlatformClient;
pub use types::{PlatformRun, RunStatus};
