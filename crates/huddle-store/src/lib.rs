// ABOUTME: Persistence layer for huddle, storing chats, messages, agents, and usage records.
// ABOUTME: Exposes the ChatStore trait consumed by the agent pipeline and a SQLite implementation.

pub mod seed;
pub mod sqlite;
pub mod store;

pub use seed::{SeedError, load_agents_file, new_agent_id, parse_agents, seed_agents};
pub use sqlite::SqliteStore;
pub use store::{ChatStore, StoreError};
