//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path parameters or a JSON body via axum extractors,
//! calls into the capture service, dispatcher, ledger, or settings store, and
//! returns JSON.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, info};

use snipline_action::{
    ActionCatalog, ActionRequest, ActionResponse, CaptureOutcome, SearchOutcome,
};
use snipline_core::types::{
    FeatureSettings, HistoryRecord, PromptConfig, ProviderConfig, RecordId, SearchEngine,
    WebhookConfig,
};
use snipline_storage::KeyValueStore;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub text: String,
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptCaptureRequest {
    pub prompt_name: String,
    pub text: String,
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookCaptureRequest {
    pub webhook_id: String,
    pub text: String,
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCaptureRequest {
    pub engine_id: String,
    pub text: String,
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryLimitBody {
    pub limit: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryLimitResponse {
    pub limit: usize,
    /// Records dropped by the new limit.
    pub dropped: usize,
}

// =============================================================================
// Health
// =============================================================================

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

// =============================================================================
// Actions and captures
// =============================================================================

/// POST /actions - the action message contract.
///
/// Always answers 200; malformed messages come back as `{error}` like any
/// other action failure.
pub async fn execute_action(
    State(state): State<AppState>,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> Json<ActionResponse> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "Rejected action message");
            return Json(ActionResponse::error(rejection.body_text()));
        }
    };
    Json(state.dispatcher().dispatch(request).await)
}

/// POST /captures - save selected text as a history record.
pub async fn capture(
    State(state): State<AppState>,
    Json(body): Json<CaptureRequest>,
) -> Result<Json<HistoryRecord>, ApiError> {
    let record = state.capture.save_text(&body.text, body.source_url).await?;
    Ok(Json(record))
}

/// POST /captures/prompt - save text and run a prompt against it.
pub async fn capture_prompt(
    State(state): State<AppState>,
    Json(body): Json<PromptCaptureRequest>,
) -> Result<Json<CaptureOutcome>, ApiError> {
    let outcome = state
        .capture
        .capture_and_prompt(&body.prompt_name, &body.text, body.source_url)
        .await?;
    Ok(Json(outcome))
}

/// POST /captures/webhook - save text and send it to a webhook.
pub async fn capture_webhook(
    State(state): State<AppState>,
    Json(body): Json<WebhookCaptureRequest>,
) -> Result<Json<CaptureOutcome>, ApiError> {
    let outcome = state
        .capture
        .capture_and_webhook(&body.webhook_id, &body.text, body.source_url)
        .await?;
    Ok(Json(outcome))
}

/// POST /captures/search - save text and build the search URL.
pub async fn capture_search(
    State(state): State<AppState>,
    Json(body): Json<SearchCaptureRequest>,
) -> Result<Json<SearchOutcome>, ApiError> {
    let outcome = state
        .capture
        .search(&body.engine_id, &body.text, body.source_url)
        .await?;
    Ok(Json(outcome))
}

/// GET /catalog - actions currently offered for selected text.
pub async fn catalog(State(state): State<AppState>) -> Result<Json<ActionCatalog>, ApiError> {
    Ok(Json(state.capture.catalog()?))
}

// =============================================================================
// History
// =============================================================================

/// GET /history - all records, newest first.
pub async fn list_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<HistoryRecord>>, ApiError> {
    Ok(Json(state.ledger().list().await?))
}

/// GET /history/{id} - one record.
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryRecord>, ApiError> {
    let id: RecordId = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid record id: {}", id)))?;
    state
        .ledger()
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("History record not found: {}", id)))
}

// =============================================================================
// Settings
// =============================================================================

/// GET /settings/history-limit
pub async fn get_history_limit(
    State(state): State<AppState>,
) -> Result<Json<HistoryLimitBody>, ApiError> {
    Ok(Json(HistoryLimitBody {
        limit: state.settings().history_limit()?,
    }))
}

/// PUT /settings/history-limit - truncate at once, then store the new limit.
///
/// The ledger already holds the new cap when the store change reaches it.
pub async fn put_history_limit(
    State(state): State<AppState>,
    Json(body): Json<HistoryLimitBody>,
) -> Result<Json<HistoryLimitResponse>, ApiError> {
    let dropped = state.ledger().truncate(body.limit).await?;
    state.settings().set_history_limit(body.limit)?;
    info!(limit = body.limit, dropped, "History limit updated");
    Ok(Json(HistoryLimitResponse {
        limit: body.limit,
        dropped,
    }))
}

/// GET /settings/providers
pub async fn get_providers(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProviderConfig>>, ApiError> {
    Ok(Json(state.settings().providers()?))
}

/// PUT /settings/providers
pub async fn put_providers(
    State(state): State<AppState>,
    Json(body): Json<Vec<ProviderConfig>>,
) -> Result<Json<Vec<ProviderConfig>>, ApiError> {
    state.settings().set_providers(&body)?;
    Ok(Json(body))
}

/// GET /settings/prompts
pub async fn get_prompts(
    State(state): State<AppState>,
) -> Result<Json<Vec<PromptConfig>>, ApiError> {
    Ok(Json(state.settings().prompts()?))
}

/// PUT /settings/prompts - names must be unique.
pub async fn put_prompts(
    State(state): State<AppState>,
    Json(body): Json<Vec<PromptConfig>>,
) -> Result<Json<Vec<PromptConfig>>, ApiError> {
    state.settings().set_prompts(&body)?;
    Ok(Json(body))
}

/// GET /settings/webhooks
pub async fn get_webhooks(
    State(state): State<AppState>,
) -> Result<Json<Vec<WebhookConfig>>, ApiError> {
    Ok(Json(state.settings().webhooks()?))
}

/// PUT /settings/webhooks - ids must be unique.
pub async fn put_webhooks(
    State(state): State<AppState>,
    Json(body): Json<Vec<WebhookConfig>>,
) -> Result<Json<Vec<WebhookConfig>>, ApiError> {
    state.settings().set_webhooks(&body)?;
    Ok(Json(body))
}

/// GET /settings/search-engines
pub async fn get_search_engines(
    State(state): State<AppState>,
) -> Result<Json<Vec<SearchEngine>>, ApiError> {
    Ok(Json(state.settings().search_engines()?))
}

/// PUT /settings/search-engines
pub async fn put_search_engines(
    State(state): State<AppState>,
    Json(body): Json<Vec<SearchEngine>>,
) -> Result<Json<Vec<SearchEngine>>, ApiError> {
    state.settings().set_search_engines(&body)?;
    Ok(Json(body))
}

/// GET /settings/features
pub async fn get_features(
    State(state): State<AppState>,
) -> Result<Json<FeatureSettings>, ApiError> {
    Ok(Json(state.settings().features()?))
}

/// PUT /settings/features
pub async fn put_features(
    State(state): State<AppState>,
    Json(body): Json<FeatureSettings>,
) -> Result<Json<FeatureSettings>, ApiError> {
    state.settings().set_features(&body)?;
    Ok(Json(body))
}

// =============================================================================
// Stream
// =============================================================================

/// GET /stream - SSE stream of store key changes.
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send> {
    let rx = state.settings().store().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(change) => {
            let data = serde_json::to_string(&change).unwrap_or_default();
            Some(Ok(Event::default().event("change").data(data)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
