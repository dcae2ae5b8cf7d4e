// ABOUTME: API module containing all HTTP handler functions for the huddle REST API.
// ABOUTME: Organized into sub-modules for chat turns and history, the agent directory, and errors.

pub mod agents;
pub mod chat;
pub mod error;

pub use error::ApiError;
