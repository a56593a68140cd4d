//! Database handle and shared row helpers
//!
//! Entity handlers live in sibling modules as `impl Database` blocks. Every
//! store call takes the connection lock for one statement; operations that
//! touch several documents are sequences of such calls with no enclosing
//! transaction.

use crate::config::{Config, CounterMode};
use crate::error::Result;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Database handle with a single shared connection
pub struct Database {
    conn: Mutex<Connection>,
    counter_mode: CounterMode,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;

        tracing::debug!(path = %path.display(), "Opened database");

        Ok(Self {
            conn: Mutex::new(conn),
            counter_mode: CounterMode::default(),
        })
    }

    /// Open the database configured in `config`, with its counter mode
    pub fn from_config(config: &Config) -> Result<Self> {
        let db = Self::open(&config.resolved_database_path())?;
        Ok(db.with_counter_mode(config.store.counter_mode))
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            counter_mode: CounterMode::default(),
        })
    }

    /// Select how assistant counters are bumped by dependent writes
    pub fn with_counter_mode(mut self, mode: CounterMode) -> Self {
        self.counter_mode = mode;
        self
    }

    pub fn counter_mode(&self) -> CounterMode {
        self.counter_mode
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.connection();
        super::schema::run_migrations(&conn)
    }

    /// Current schema version
    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.connection();
        super::schema::get_schema_version(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Document count per collection, in catalog order
    pub fn collection_counts(&self) -> Result<Vec<(&'static str, i64)>> {
        let conn = self.connection();
        super::schema::COLLECTIONS
            .iter()
            .map(|name| {
                let count: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {}", name), [], |r| {
                        r.get(0)
                    })?;
                Ok((*name, count))
            })
            .collect()
    }

    // ============================================
    // Shared counter bump
    // ============================================

    /// Add one to an assistant counter and stamp `metrics.lastActivity`.
    ///
    /// In [`CounterMode::ReadModifyWrite`] this is a read followed by a
    /// separate write, so two concurrent bumps can both observe the same value
    /// and one increment is lost. [`CounterMode::Atomic`] performs the bump in
    /// a single statement. Returns `false` when the assistant does not exist.
    pub(crate) fn bump_assistant_counter(
        &self,
        assistant_id: &str,
        counter: AssistantCounter,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        match self.counter_mode {
            CounterMode::ReadModifyWrite => {
                let Some(mut assistant) = self.get_assistant(assistant_id)? else {
                    return Ok(false);
                };
                match counter {
                    AssistantCounter::Conversations => assistant.metrics.total_conversations += 1,
                    AssistantCounter::Messages => assistant.metrics.total_messages += 1,
                }
                assistant.metrics.last_activity = Some(now);
                self.save_assistant(&assistant)?;
                Ok(true)
            }
            CounterMode::Atomic => {
                let path = counter.json_path();
                let sql = format!(
                    "UPDATE assistants SET metrics = json_set(metrics, '{path}', \
                     COALESCE(json_extract(metrics, '{path}'), 0) + 1, \
                     '$.lastActivity', ?2) WHERE id = ?1"
                );
                let stamp = serde_json::to_value(now)?;
                let conn = self.connection();
                let changed = conn.execute(&sql, params![assistant_id, stamp.as_str()])?;
                Ok(changed > 0)
            }
        }
    }
}

/// Assistant counters advanced by conversation and message creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssistantCounter {
    Conversations,
    Messages,
}

impl AssistantCounter {
    fn json_path(&self) -> &'static str {
        match self {
            AssistantCounter::Conversations => "$.totalConversations",
            AssistantCounter::Messages => "$.totalMessages",
        }
    }
}

// ============================================
// Row helpers
// ============================================

/// Current time at the precision the store keeps (milliseconds)
pub(crate) fn store_now() -> DateTime<Utc> {
    from_millis(Utc::now().timestamp_millis()).unwrap_or_else(Utc::now)
}

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

fn conversion_error(row: &Row, column: &str, message: String) -> rusqlite::Error {
    let index = row.as_ref().column_index(column).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, message.into())
}

pub(crate) fn get_ts(row: &Row, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(column)?;
    from_millis(ms)
        .ok_or_else(|| conversion_error(row, column, format!("timestamp out of range: {}", ms)))
}

pub(crate) fn get_opt_ts(row: &Row, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let ms: Option<i64> = row.get(column)?;
    ms.map(|ms| {
        from_millis(ms)
            .ok_or_else(|| conversion_error(row, column, format!("timestamp out of range: {}", ms)))
    })
    .transpose()
}

pub(crate) fn get_enum<T>(row: &Row, column: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let value: String = row.get(column)?;
    value
        .parse()
        .map_err(|e: String| conversion_error(row, column, e))
}

pub(crate) fn get_json<T: DeserializeOwned>(row: &Row, column: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(row, column, e.to_string()))
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}
