use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Status of one prompt or webhook attempt against a history record.
///
/// `Unexecuted` is only ever reported for a missing entry; it is never
/// written to the ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Unexecuted,
    Processing,
    Success,
    Error,
}

impl ExecutionStatus {
    /// Returns true for `Success` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Success | ExecutionStatus::Error)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Unexecuted => "unexecuted",
            ExecutionStatus::Processing => "processing",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// HTTP method a webhook is sent with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Only POST and PUT carry a request body.
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AI completion back-end family.
///
/// Serialized as its display name (`"OpenAI"`, `"Custom(OpenAI)"`, ...).
/// Unknown names parse as `Custom`, which speaks the OpenAI wire format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    OpenAI,
    Groq,
    Grok,
    Anthropic,
    Gemini,
    Ollama,
    Custom,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 7] = [
        ProviderKind::OpenAI,
        ProviderKind::Groq,
        ProviderKind::Grok,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
        ProviderKind::Ollama,
        ProviderKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OpenAI",
            ProviderKind::Groq => "Groq",
            ProviderKind::Grok => "Grok",
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::Gemini => "Gemini",
            ProviderKind::Ollama => "Ollama",
            ProviderKind::Custom => "Custom(OpenAI)",
        }
    }

    /// Whether an API key must be configured before calling this provider.
    /// Ollama is self-hosted and accepts requests without one.
    pub fn requires_key(&self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let kind = ProviderKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .unwrap_or(ProviderKind::Custom);
        Ok(kind)
    }
}

impl Serialize for ProviderKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProviderKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().unwrap_or(ProviderKind::Custom))
    }
}

// =============================================================================
// Newtype Wrappers
// =============================================================================

/// Unique identifier for a history record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unix timestamp in milliseconds since epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0).unwrap_or_default()
    }
}

// =============================================================================
// History
// =============================================================================

/// State of one webhook attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookExecution {
    pub id: Uuid,
    pub webhook_id: String,
    /// Webhook name at dispatch time.
    pub webhook_name: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub result: String,
}

impl WebhookExecution {
    /// A fresh attempt in the processing state.
    pub fn processing(webhook: &WebhookConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            webhook_id: webhook.id.clone(),
            webhook_name: webhook.name.clone(),
            status: ExecutionStatus::Processing,
            result: String::new(),
        }
    }

    /// Moves to a terminal state, keeping the attempt id.
    pub fn finish(mut self, status: ExecutionStatus, result: impl Into<String>) -> Self {
        self.status = status;
        self.result = result.into();
        self
    }
}

/// State of one AI prompt attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptExecution {
    pub id: Uuid,
    pub prompt_name: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chained_webhook: Option<WebhookExecution>,
}

impl PromptExecution {
    pub fn processing(prompt_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt_name: prompt_name.into(),
            status: ExecutionStatus::Processing,
            result: String::new(),
            chained_webhook: None,
        }
    }

    pub fn finish(mut self, status: ExecutionStatus, result: impl Into<String>) -> Self {
        self.status = status;
        self.result = result.into();
        self
    }
}

/// One captured-text event and the outcome of every action run against it.
///
/// Everything except `prompt_results` and `webhook_results` is fixed at
/// capture time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: RecordId,
    pub text: String,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Keyed by prompt name.
    #[serde(default)]
    pub prompt_results: HashMap<String, PromptExecution>,
    /// Keyed by webhook id.
    #[serde(default)]
    pub webhook_results: HashMap<String, Vec<WebhookExecution>>,
}

impl HistoryRecord {
    pub fn new(text: impl Into<String>, source_url: Option<String>) -> Self {
        Self {
            id: RecordId::new(),
            text: text.into(),
            timestamp: Timestamp::now(),
            source_url,
            prompt_results: HashMap::new(),
            webhook_results: HashMap::new(),
        }
    }

    pub fn prompt_status(&self, prompt_name: &str) -> ExecutionStatus {
        self.prompt_results
            .get(prompt_name)
            .map(|p| p.status)
            .unwrap_or_default()
    }

    /// Status of the most recent attempt for `webhook_id`.
    pub fn webhook_status(&self, webhook_id: &str) -> ExecutionStatus {
        self.webhook_results
            .get(webhook_id)
            .and_then(|runs| runs.last())
            .map(|w| w.status)
            .unwrap_or_default()
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Connection details for one AI back-end.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub id: String,
    pub provider: ProviderKind,
    pub model: String,
    pub api_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ProviderConfig {
    /// The configured key, treating an empty string as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// True when the provider needs a key and none is configured.
    pub fn is_missing_credential(&self) -> bool {
        self.provider.requires_key() && self.api_key().is_none()
    }
}

/// A named prompt template bound to a provider config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptConfig {
    pub id: String,
    /// Lookup key; unique across prompts.
    pub name: String,
    pub provider_config_id: String,
    pub template: String,
    /// JSON schema for structured output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Webhook to chain after a successful completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
}

impl PromptConfig {
    pub fn has_schema(&self) -> bool {
        self.response_schema
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

/// A declarative HTTP call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    pub id: String,
    pub name: String,
    /// May contain `{{text}}`.
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Body template for POST/PUT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// A web search shortcut. `%s` in `url` receives the encoded query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEngine {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_template: Option<String>,
}

/// Feature toggles. All off until the user opts in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeatureSettings {
    pub webhook: bool,
    pub ai_assistant: bool,
    pub context_menu_parent: bool,
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Tests
// =============================================================================
