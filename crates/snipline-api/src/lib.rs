//! Snipline API crate - axum HTTP server, route handlers, SSE streaming.
//!
//! Carries the action message contract, capture entry points, history and
//! settings endpoints, and a live stream of store changes.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
