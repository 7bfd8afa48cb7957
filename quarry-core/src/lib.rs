//! Quarry Core - Shared infrastructure for the research pipeline
//!
//! Configuration, error types, logging and async helpers used by every other
//! crate in the workspace.

pub mod async_utils;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use async_utils::*;
pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tokio;
pub use tokio_util::sync::CancellationToken;
pub use tracing;
