//! Action engine for Snipline.
//!
//! Runs AI prompt completions and webhooks against captured text, chains a
//! webhook off a prompt result, and records every outcome on the history
//! ledger.

pub mod capture;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod provider;
pub mod resolver;
pub mod run;
pub mod types;
pub mod webhook;

pub use capture::{CaptureOutcome, CaptureService, SearchOutcome};
pub use dispatcher::Dispatcher;
pub use error::ActionError;
pub use provider::{ProviderClient, ProviderRegistry};
pub use resolver::SettingsResolver;
pub use run::{ActionKind, ActionRun, RunState};
pub use types::{ActionCatalog, ActionRequest, ActionResponse};
pub use webhook::WebhookClient;
