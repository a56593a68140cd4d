//! # aidaeon-core
//!
//! Data-access core for AidaEon, a platform for AI customer-service
//! assistants running on messaging channels.
//!
//! This library provides:
//! - Domain types for users, assistants, conversations and messages
//! - Database storage layer with SQLite, one collection per entity
//! - Handlers for lookups, listings, mutations and statistics
//! - A JSON request envelope naming every handler
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Consistency
//!
//! Each handler call writes single documents. Operations that touch more
//! than one document (creating a conversation or message bumps assistant
//! counters, marking a conversation read updates each message) issue
//! independent writes without a transaction. See
//! [`config::CounterMode`] for the opt-in atomic counter bump.
//!
//! ## Example
//!
//! ```rust,no_run
//! use aidaeon_core::{Config, Database, NewUser, UserRole};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::from_config(&config).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let id = db
//!     .create_user(&NewUser {
//!         email: "ana@example.com".to_string(),
//!         name: "Ana".to_string(),
//!         role: UserRole::Admin,
//!         phone: None,
//!         company: None,
//!     })
//!     .expect("failed to create user");
//! ```

// Re-export commonly used items at the crate root
pub use api::Request;
pub use config::{Config, CounterMode};
pub use db::Database;
pub use error::{Error, Result};
pub use types::*;

// Public modules
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod types;
