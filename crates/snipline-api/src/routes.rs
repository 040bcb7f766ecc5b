//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use snipline_core::config::SniplineConfig;
use snipline_core::error::SniplineError;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Browser clients served from the API's own origin.
    let port = state.config.server.port;
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", port),
        format!("http://localhost:{}", port),
    ]
    .iter()
    .filter_map(|origin| origin.parse().ok())
    .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let settings_routes = Router::new()
        .route(
            "/history-limit",
            get(handlers::get_history_limit).put(handlers::put_history_limit),
        )
        .route(
            "/providers",
            get(handlers::get_providers).put(handlers::put_providers),
        )
        .route(
            "/prompts",
            get(handlers::get_prompts).put(handlers::put_prompts),
        )
        .route(
            "/webhooks",
            get(handlers::get_webhooks).put(handlers::put_webhooks),
        )
        .route(
            "/search-engines",
            get(handlers::get_search_engines).put(handlers::put_search_engines),
        )
        .route(
            "/features",
            get(handlers::get_features).put(handlers::put_features),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .route("/actions", post(handlers::execute_action))
        .route("/captures", post(handlers::capture))
        .route("/captures/prompt", post(handlers::capture_prompt))
        .route("/captures/webhook", post(handlers::capture_webhook))
        .route("/captures/search", post(handlers::capture_search))
        .route("/catalog", get(handlers::catalog))
        .route("/history", get(handlers::list_history))
        .route("/history/{id}", get(handlers::get_history))
        .route("/stream", get(handlers::stream))
        .nest("/settings", settings_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind to the configured host and port and serve until the process exits.
pub async fn start_server(config: &SniplineConfig, state: AppState) -> Result<(), SniplineError> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
