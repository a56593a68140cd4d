//! Database layer for AidaEon
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations and the secondary index catalog
//! - Per-entity handlers implemented on [`Database`]

pub mod repo;
pub mod schema;

mod assistants;
mod conversations;
mod messages;
mod users;

pub use assistants::{DEFAULT_ASSISTANT_LIMIT, DEFAULT_TOP_ASSISTANTS};
pub use conversations::{DEFAULT_CONVERSATION_LIMIT, DEFAULT_RECENT_LIMIT};
pub use messages::{DEFAULT_CONTEXT_LIMIT, DEFAULT_FILTERED_MESSAGE_LIMIT, DEFAULT_MESSAGE_LIMIT};
pub use repo::Database;
pub use users::DEFAULT_USER_LIMIT;
