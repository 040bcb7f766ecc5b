//! Error types for the action engine.

use snipline_core::error::SniplineError;

use crate::run::RunState;

/// Errors from resolving, executing, or recording an action.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// A prompt, provider, webhook, or record reference could not be resolved.
    #[error("{0}")]
    Config(String),
    #[error("Missing API key for {0}")]
    MissingCredential(String),
    #[error("Request failed: {0}")]
    Transport(String),
    /// Non-2xx status or an error reported in the provider's response body.
    #[error("{0}")]
    Provider(String),
    #[error("Unrecognized {provider} response: {detail}")]
    UnparsableResponse { provider: String, detail: String },
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Invalid state transition: {0} -> {1}")]
    InvalidTransition(RunState, RunState),
    #[error("Storage error: {0}")]
    Storage(#[from] SniplineError),
}

impl From<reqwest::Error> for ActionError {
    fn from(err: reqwest::Error) -> Self {
        ActionError::Transport(err.to_string())
    }
}

impl ActionError {
    pub fn config(message: impl Into<String>) -> Self {
        ActionError::Config(message.into())
    }
}
