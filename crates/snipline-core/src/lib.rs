//! Shared domain model for Snipline.
//!
//! Holds the history record types, the runtime settings types, the
//! application configuration, the template renderer, and the default
//! settings seeded on first run.

pub mod config;
pub mod defaults;
pub mod error;
pub mod template;
pub mod types;

pub use config::SniplineConfig;
pub use error::{Result, SniplineError};
pub use types::*;
