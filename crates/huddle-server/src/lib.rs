// ABOUTME: HTTP server for huddle, exposing chat turns over SSE plus history and agent APIs.
// ABOUTME: Uses Axum with shared state, bearer-token identities, and an in-memory mention status board.

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod providers;
pub mod routes;
pub mod status_board;

pub use app_state::{AppState, SharedState};
pub use auth::{AuthLayer, Identity};
pub use config::{ConfigError, HuddleConfig};
pub use providers::ProviderStatus;
pub use routes::create_router;
pub use status_board::StatusBoard;
