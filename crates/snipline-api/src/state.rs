//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use snipline_action::{CaptureService, Dispatcher};
use snipline_core::config::SniplineConfig;
use snipline_storage::{HistoryLedger, SettingsStore};

/// Shared application state, passed to handlers via axum's State extractor.
///
/// Every service handle is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SniplineConfig>,
    pub capture: CaptureService,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: SniplineConfig, capture: CaptureService) -> Self {
        Self {
            config: Arc::new(config),
            capture,
            start_time: Instant::now(),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        self.capture.dispatcher()
    }

    pub fn ledger(&self) -> &HistoryLedger {
        self.dispatcher().ledger()
    }

    pub fn settings(&self) -> &SettingsStore {
        self.dispatcher().resolver().settings()
    }
}
