//! Shared outbound HTTP client.

use std::time::Duration;

use snipline_core::config::HttpConfig;

use crate::error::ActionError;

/// Build the client shared by every provider adapter and the webhook client.
pub fn build_client(config: &HttpConfig) -> Result<reqwest::Client, ActionError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| ActionError::config(format!("Failed to build HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_from_defaults() {
        assert!(build_client(&HttpConfig::default()).is_ok());
    }
}
