//! Error types for aidaeon-core

use thiserror::Error;

/// Main error type for the aidaeon-core library
#[derive(Error, Debug)]
pub enum Error {
    /// The referenced document id does not resolve
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A user with this email already exists
    #[error("a user with email {0} already exists")]
    DuplicateEmail(String),

    /// Message creation against a conversation that does not exist
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// Assistant deletion while it still has active conversations
    #[error("assistant {0} has active conversations")]
    HasActiveConversations(String),

    /// Malformed request envelope or arguments
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "NotFound",
            Error::DuplicateEmail(_) => "DuplicateEmail",
            Error::ConversationNotFound(_) => "ConversationNotFound",
            Error::HasActiveConversations(_) => "HasActiveConversations",
            Error::InvalidRequest(_) => "InvalidRequest",
            Error::Database(_) => "Database",
            Error::Io(_) => "Io",
            Error::Json(_) => "Json",
            Error::Config(_) => "Config",
        }
    }
}

/// Result type alias for aidaeon-core
pub type Result<T> = std::result::Result<T, Error>;
