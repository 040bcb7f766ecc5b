//! Snipline application binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Initialize tracing
//! 3. Open the SQLite store and seed default settings on first run
//! 4. Start the history ledger and build the action services
//! 5. Start the axum API server

mod cli;

use std::sync::Arc;

use clap::Parser;

use snipline_action::{
    http, CaptureService, Dispatcher, ProviderRegistry, SettingsResolver, WebhookClient,
};
use snipline_api::{start_server, AppState};
use snipline_core::config::SniplineConfig;
use snipline_storage::{
    keys, Database, HistoryLedger, KeyValueStore, SettingsStore, SqliteStore,
};

use cli::{expand_home, CliArgs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = SniplineConfig::load_or_default(&config_file);
    config.server.port = args.resolve_port(config.server.port);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.log_level.clone() {
        config.general.log_level = level;
    }

    // Tracing. RUST_LOG overrides the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Snipline v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Storage.
    let data_dir = expand_home(&config.general.data_dir);
    let db_path = data_dir.join("snipline.db");
    let db = Arc::new(Database::new(&db_path)?);
    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::new(db));
    let settings = SettingsStore::new(Arc::clone(&store), config.history.default_limit);

    let first_run = store.get(keys::PROVIDERS)?.is_none();
    if args.seed_defaults || first_run {
        let seeded = settings.seed_defaults()?;
        tracing::info!(keys = ?seeded, first_run, "Default settings seeded");
    }

    // Ledger and action services.
    let history_limit = settings.history_limit()?;
    let ledger = HistoryLedger::spawn(Arc::clone(&store), history_limit)?;
    tracing::info!(limit = history_limit, "History ledger started");

    let client = http::build_client(&config.http)?;
    let dispatcher = Dispatcher::new(
        ledger,
        SettingsResolver::new(settings),
        ProviderRegistry::with_defaults(client.clone()),
        WebhookClient::new(client),
    );
    let capture = CaptureService::new(dispatcher);

    // API server.
    let state = AppState::new(config.clone(), capture);
    if let Err(e) = start_server(&config, state).await {
        tracing::error!(
            host = %config.server.host,
            port = config.server.port,
            error = %e,
            "API server stopped - is another instance running?"
        );
        return Err(e.into());
    }

    Ok(())
}
