//! Action message contract and catalog types.

use serde::{Deserialize, Serialize};

use snipline_core::types::{HttpMethod, RecordId};

use crate::error::ActionError;

/// Payload of `EXECUTE_PROMPT`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptAction {
    pub record_id: RecordId,
    pub prompt_name: String,
    pub text: String,
}

/// Payload of `EXECUTE_WEBHOOK`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAction {
    pub record_id: RecordId,
    pub webhook_id: String,
    pub text: String,
}

/// Payload of `EXECUTE_PROMPT_WEBHOOK`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptWebhookAction {
    pub record_id: RecordId,
    pub prompt_name: String,
    pub webhook_id: String,
    pub text: String,
}

/// An action message: `{"type": "EXECUTE_PROMPT", "data": {...}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionRequest {
    ExecutePrompt(PromptAction),
    ExecuteWebhook(WebhookAction),
    ExecutePromptWebhook(PromptWebhookAction),
}

impl ActionRequest {
    pub fn record_id(&self) -> RecordId {
        match self {
            ActionRequest::ExecutePrompt(a) => a.record_id,
            ActionRequest::ExecuteWebhook(a) => a.record_id,
            ActionRequest::ExecutePromptWebhook(a) => a.record_id,
        }
    }
}

/// `{"success": true}` or `{"error": "..."}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionResponse {
    Success { success: bool },
    Error { error: String },
}

impl ActionResponse {
    pub fn success() -> Self {
        ActionResponse::Success { success: true }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ActionResponse::Error {
            error: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionResponse::Success { success: true })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ActionResponse::Error { error } => Some(error),
            ActionResponse::Success { .. } => None,
        }
    }
}

impl From<Result<(), ActionError>> for ActionResponse {
    fn from(result: Result<(), ActionError>) -> Self {
        match result {
            Ok(()) => ActionResponse::success(),
            Err(e) => ActionResponse::error(e.to_string()),
        }
    }
}

/// Actions that can be offered for a piece of selected text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCatalog {
    /// Group every entry under one parent menu.
    pub grouped: bool,
    pub search_engines: Vec<CatalogEntry>,
    pub prompts: Vec<PromptEntry>,
    pub webhooks: Vec<WebhookEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptEntry {
    pub name: String,
    pub provider_config_id: String,
    /// The bound provider needs a key that is not configured.
    pub missing_credential: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEntry {
    pub id: String,
    pub name: String,
    pub method: HttpMethod,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let id = RecordId::new();
        let raw = json!({
            "type": "EXECUTE_PROMPT_WEBHOOK",
            "data": {
                "recordId": id.to_string(),
                "promptName": "Summarize",
                "webhookId": "hook",
                "text": "hello"
            }
        });
        let req: ActionRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(req.record_id(), id);
        match req {
            ActionRequest::ExecutePromptWebhook(a) => {
                assert_eq!(a.prompt_name, "Summarize");
                assert_eq!(a.webhook_id, "hook");
            }
            other => panic!("unexpected request: {other:?}"),
        }

        let req = ActionRequest::ExecuteWebhook(WebhookAction {
            record_id: id,
            webhook_id: "hook".to_string(),
            text: "t".to_string(),
        });
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["type"], "EXECUTE_WEBHOOK");
        assert_eq!(value["data"]["webhookId"], "hook");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let raw = json!({"type": "EXECUTE_SOMETHING", "data": {}});
        assert!(serde_json::from_value::<ActionRequest>(raw).is_err());
    }

    #[test]
    fn test_response_wire_format() {
        assert_eq!(
            serde_json::to_value(ActionResponse::success()).unwrap(),
            json!({"success": true})
        );
        assert_eq!(
            serde_json::to_value(ActionResponse::error("boom")).unwrap(),
            json!({"error": "boom"})
        );
        let parsed: ActionResponse = serde_json::from_value(json!({"error": "x"})).unwrap();
        assert_eq!(parsed.error_message(), Some("x"));
        assert!(!parsed.is_success());
    }

    #[test]
    fn test_response_from_result() {
        assert!(ActionResponse::from(Ok(())).is_success());
        let resp = ActionResponse::from(Err(ActionError::config("Webhook not found: x")));
        assert_eq!(resp.error_message(), Some("Webhook not found: x"));
    }
}
