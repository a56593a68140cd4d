//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.
//! Each collection is one table: indexed attributes are plain columns, nested
//! objects are JSON columns. Identifiers are references only, no table
//! declares a foreign key.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Every collection in the store
pub const COLLECTIONS: &[&str] = &[
    "users",
    "assistants",
    "conversations",
    "messages",
    "automations",
    "automation_logs",
    "knowledge_base",
    "settings",
    "integrations",
];

/// A declared secondary index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDef {
    pub collection: &'static str,
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

impl IndexDef {
    /// Name of the SQLite index backing this definition
    pub fn sql_name(&self) -> String {
        format!("idx_{}_{}", self.collection, self.name)
    }
}

const fn index(
    collection: &'static str,
    name: &'static str,
    columns: &'static [&'static str],
) -> IndexDef {
    IndexDef {
        collection,
        name,
        columns,
    }
}

/// Index catalog. Every lookup path a handler uses is listed here and
/// created by the migrations below.
pub const INDEX_CATALOG: &[IndexDef] = &[
    index("users", "by_email", &["email"]),
    index("users", "by_role", &["role"]),
    index("users", "by_status", &["status"]),
    index("assistants", "by_status", &["status"]),
    index("assistants", "by_type", &["assistant_type"]),
    index("assistants", "by_created_by", &["created_by"]),
    index("conversations", "by_assistant", &["assistant_id"]),
    index("conversations", "by_user", &["user_id"]),
    index(
        "conversations",
        "by_external_user",
        &["external_user_id", "platform"],
    ),
    index("conversations", "by_platform", &["platform"]),
    index("conversations", "by_status", &["status"]),
    index("conversations", "by_last_activity", &["last_activity"]),
    index("messages", "by_conversation", &["conversation_id", "timestamp"]),
    index("messages", "by_timestamp", &["timestamp"]),
    index("automations", "by_assistant", &["assistant_id"]),
    index("automations", "by_status", &["status"]),
    index("automation_logs", "by_automation", &["automation_id"]),
    index("automation_logs", "by_executed_at", &["executed_at"]),
    index("knowledge_base", "by_assistant", &["assistant_id"]),
    index("settings", "by_key", &["setting_key"]),
    index("integrations", "by_assistant", &["assistant_id"]),
    index("integrations", "by_platform", &["platform"]),
];

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: initial collections
    r#"
    -- ============================================
    -- Core entities
    -- ============================================

    CREATE TABLE IF NOT EXISTS users (
        id               TEXT PRIMARY KEY,
        creation_time    INTEGER NOT NULL,   -- epoch ms
        email            TEXT NOT NULL,      -- unique by handler check, not by constraint
        name             TEXT NOT NULL,
        role             TEXT NOT NULL,      -- 'admin', 'user', 'agent'
        status           TEXT NOT NULL,      -- 'active', 'inactive', 'suspended'
        phone            TEXT,
        company          TEXT,
        preferences      JSON NOT NULL,
        metadata         JSON NOT NULL       -- lastLogin, createdAt, updatedAt
    );

    CREATE INDEX IF NOT EXISTS idx_users_by_email ON users(email);
    CREATE INDEX IF NOT EXISTS idx_users_by_role ON users(role);
    CREATE INDEX IF NOT EXISTS idx_users_by_status ON users(status);

    CREATE TABLE IF NOT EXISTS assistants (
        id               TEXT PRIMARY KEY,
        creation_time    INTEGER NOT NULL,
        name             TEXT NOT NULL,
        description      TEXT NOT NULL,
        status           TEXT NOT NULL,      -- 'active', 'inactive', 'training'
        assistant_type   TEXT NOT NULL,
        configuration    JSON NOT NULL,
        integrations     JSON NOT NULL,
        metrics          JSON NOT NULL,
        created_by       TEXT NOT NULL,      -- user id
        created_at       INTEGER NOT NULL,
        updated_at       INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_assistants_by_status ON assistants(status);
    CREATE INDEX IF NOT EXISTS idx_assistants_by_type ON assistants(assistant_type);
    CREATE INDEX IF NOT EXISTS idx_assistants_by_created_by ON assistants(created_by);

    CREATE TABLE IF NOT EXISTS conversations (
        id               TEXT PRIMARY KEY,
        creation_time    INTEGER NOT NULL,
        assistant_id     TEXT NOT NULL,
        user_id          TEXT,
        external_user_id TEXT,               -- channel identity for non-platform users
        platform         TEXT NOT NULL,
        status           TEXT NOT NULL,
        priority         TEXT NOT NULL,
        tags             JSON NOT NULL,
        metadata         JSON NOT NULL,
        started_at       INTEGER NOT NULL,
        last_activity    INTEGER NOT NULL,
        ended_at         INTEGER
    );

    CREATE INDEX IF NOT EXISTS idx_conversations_by_assistant ON conversations(assistant_id);
    CREATE INDEX IF NOT EXISTS idx_conversations_by_user ON conversations(user_id);
    CREATE INDEX IF NOT EXISTS idx_conversations_by_external_user
        ON conversations(external_user_id, platform);
    CREATE INDEX IF NOT EXISTS idx_conversations_by_platform ON conversations(platform);
    CREATE INDEX IF NOT EXISTS idx_conversations_by_status ON conversations(status);
    CREATE INDEX IF NOT EXISTS idx_conversations_by_last_activity
        ON conversations(last_activity);

    CREATE TABLE IF NOT EXISTS messages (
        id               TEXT PRIMARY KEY,
        creation_time    INTEGER NOT NULL,
        conversation_id  TEXT NOT NULL,
        sender           TEXT NOT NULL,      -- 'user', 'assistant', 'system'
        content_type     TEXT NOT NULL,
        content          TEXT NOT NULL,
        metadata         JSON NOT NULL,
        reply_to         TEXT,               -- message id
        timestamp        INTEGER NOT NULL,
        status           TEXT NOT NULL,      -- 'sent', 'delivered', 'read', 'failed'
        delivered_at     INTEGER,
        read_at          INTEGER
    );

    CREATE INDEX IF NOT EXISTS idx_messages_by_conversation
        ON messages(conversation_id, timestamp);
    CREATE INDEX IF NOT EXISTS idx_messages_by_timestamp ON messages(timestamp);

    -- ============================================
    -- Dashboard collections (no handlers in this crate)
    -- ============================================

    CREATE TABLE IF NOT EXISTS automations (
        id               TEXT PRIMARY KEY,
        creation_time    INTEGER NOT NULL,
        assistant_id     TEXT NOT NULL,
        name             TEXT NOT NULL,
        trigger_config   JSON NOT NULL,
        actions          JSON NOT NULL,
        status           TEXT NOT NULL,
        created_at       INTEGER NOT NULL,
        updated_at       INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_automations_by_assistant ON automations(assistant_id);
    CREATE INDEX IF NOT EXISTS idx_automations_by_status ON automations(status);

    CREATE TABLE IF NOT EXISTS automation_logs (
        id               TEXT PRIMARY KEY,
        creation_time    INTEGER NOT NULL,
        automation_id    TEXT NOT NULL,
        status           TEXT NOT NULL,
        executed_at      INTEGER NOT NULL,
        details          JSON
    );

    CREATE INDEX IF NOT EXISTS idx_automation_logs_by_automation
        ON automation_logs(automation_id);
    CREATE INDEX IF NOT EXISTS idx_automation_logs_by_executed_at
        ON automation_logs(executed_at);

    CREATE TABLE IF NOT EXISTS knowledge_base (
        id               TEXT PRIMARY KEY,
        creation_time    INTEGER NOT NULL,
        assistant_id     TEXT NOT NULL,
        title            TEXT NOT NULL,
        content          TEXT NOT NULL,
        kind             TEXT NOT NULL,      -- 'faq', 'document', 'url'
        metadata         JSON,
        created_at       INTEGER NOT NULL,
        updated_at       INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_knowledge_base_by_assistant
        ON knowledge_base(assistant_id);

    CREATE TABLE IF NOT EXISTS settings (
        id               TEXT PRIMARY KEY,
        creation_time    INTEGER NOT NULL,
        setting_key      TEXT NOT NULL,
        value            JSON NOT NULL,
        updated_at       INTEGER NOT NULL
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_settings_by_key ON settings(setting_key);

    CREATE TABLE IF NOT EXISTS integrations (
        id               TEXT PRIMARY KEY,
        creation_time    INTEGER NOT NULL,
        assistant_id     TEXT NOT NULL,
        platform         TEXT NOT NULL,
        config           JSON NOT NULL,
        status           TEXT NOT NULL,
        created_at       INTEGER NOT NULL,
        updated_at       INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_integrations_by_assistant ON integrations(assistant_id);
    CREATE INDEX IF NOT EXISTS idx_integrations_by_platform ON integrations(platform);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        assert_eq!(MIGRATIONS.len() as i32, SCHEMA_VERSION);
    }

    #[test]
    fn test_collections_created() {
        let conn = migrated();

        for table in COLLECTIONS {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_index_catalog_matches_schema() {
        let conn = migrated();

        for def in INDEX_CATALOG {
            assert!(
                COLLECTIONS.contains(&def.collection),
                "{} indexes an undeclared collection",
                def.sql_name()
            );

            let table: String = conn
                .query_row(
                    "SELECT tbl_name FROM sqlite_master WHERE type='index' AND name=?",
                    [def.sql_name()],
                    |r| r.get(0),
                )
                .unwrap_or_else(|_| panic!("index {} should exist", def.sql_name()));
            assert_eq!(table, def.collection);

            let columns: Vec<String> = conn
                .prepare(&format!("PRAGMA index_info({})", def.sql_name()))
                .unwrap()
                .query_map([], |row| row.get::<_, String>(2))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect();
            assert_eq!(columns, def.columns, "columns of {}", def.sql_name());
        }
    }

    #[test]
    fn test_no_foreign_keys_declared() {
        let conn = migrated();

        for table in COLLECTIONS {
            let fk_count = conn
                .prepare(&format!("PRAGMA foreign_key_list({})", table))
                .unwrap()
                .query_map([], |_| Ok(()))
                .unwrap()
                .count();
            assert_eq!(fk_count, 0, "{} should not declare foreign keys", table);
        }
    }

    #[test]
    fn test_email_lookup_uses_index() {
        let conn = migrated();

        let plan: Vec<String> = conn
            .prepare("EXPLAIN QUERY PLAN SELECT * FROM users WHERE email = ?1")
            .unwrap()
            .query_map(["a@x.com"], |row| row.get::<_, String>(3))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();
        assert!(
            plan.iter().any(|step| step.contains("idx_users_by_email")),
            "unexpected plan: {:?}",
            plan
        );
    }
}
