use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SniplineError};

/// Top-level configuration for the Snipline application.
///
/// Loaded from `~/.snipline/config.toml` by default. Runtime settings that
/// the user edits (providers, prompts, webhooks, search engines, history
/// limit) are not part of this file; they live in the key-value store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SniplineConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl SniplineConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SniplineConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SniplineError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite settings and history database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.snipline/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP API server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3040,
        }
    }
}

/// Outbound HTTP client settings shared by provider and webhook calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// User-Agent header sent with every outbound request.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            user_agent: format!("snipline/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// History ledger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Record cap used when the store holds no explicit limit yet.
    pub default_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { default_limit: 10 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = SniplineConfig::default();
        assert_eq!(config.general.data_dir, "~/.snipline/data");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3040);
        assert_eq!(config.http.timeout_secs, 60);
        assert!(config.http.user_agent.starts_with("snipline/"));
        assert_eq!(config.history.default_limit, 10);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/custom/data"
log_level = "debug"

[server]
host = "0.0.0.0"
port = 8080

[http]
timeout_secs = 5
user_agent = "test-agent"

[history]
default_limit = 50
"#;
        let file = create_temp_config(content);
        let config = SniplineConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/custom/data");
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.http.user_agent, "test-agent");
        assert_eq!(config.history.default_limit, 50);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
log_level = "warn"
"#;
        let file = create_temp_config(content);
        let config = SniplineConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.data_dir, "~/.snipline/data");
        assert_eq!(config.server.port, 3040);
        assert_eq!(config.history.default_limit, 10);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = SniplineConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.snipline/data");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(SniplineConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = SniplineConfig::default();
        config.server.port = 4000;
        config.save(&path).unwrap();

        assert!(path.exists());
        let reloaded = SniplineConfig::load(&path).unwrap();
        assert_eq!(reloaded.server.port, 4000);
        assert_eq!(reloaded.general.log_level, "info");
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = SniplineConfig::load(file.path()).unwrap();
        assert_eq!(config.server.port, 3040);
        assert_eq!(config.http.timeout_secs, 60);
    }
}
