//! Assistant handlers

use super::repo::{get_enum, get_json, get_ts, store_now, to_json, to_millis, Database};
use crate::error::{Error, Result};
use crate::types::*;
use rusqlite::{params, OptionalExtension, Row};

/// Default page size for [`Database::list_assistants`]
pub const DEFAULT_ASSISTANT_LIMIT: usize = 50;

/// Default size of [`Database::top_assistants`]
pub const DEFAULT_TOP_ASSISTANTS: usize = 10;

impl Database {
    /// Get an assistant by ID
    pub fn get_assistant(&self, id: &str) -> Result<Option<Assistant>> {
        let conn = self.connection();
        conn.query_row(
            "SELECT * FROM assistants WHERE id = ?1",
            [id],
            Self::row_to_assistant,
        )
        .optional()
        .map_err(Error::from)
    }

    /// List assistants, newest first. The first present of `status`,
    /// `assistant_type`, `created_by` drives the scan; the others are ignored.
    pub fn list_assistants(&self, filter: &AssistantFilter, limit: usize) -> Result<Vec<Assistant>> {
        let conn = self.connection();

        let (sql, value) = if let Some(status) = filter.status {
            ("SELECT * FROM assistants WHERE status = ?1", Some(status.as_str()))
        } else if let Some(kind) = filter.assistant_type {
            (
                "SELECT * FROM assistants WHERE assistant_type = ?1",
                Some(kind.as_str()),
            )
        } else if let Some(created_by) = filter.created_by.as_deref() {
            ("SELECT * FROM assistants WHERE created_by = ?1", Some(created_by))
        } else {
            ("SELECT * FROM assistants", None)
        };
        let sql = format!("{sql} ORDER BY creation_time DESC, rowid DESC LIMIT {limit}");

        let mut stmt = conn.prepare(&sql)?;
        let assistants = match value {
            Some(value) => stmt.query_map([value], Self::row_to_assistant)?,
            None => stmt.query_map([], Self::row_to_assistant)?,
        }
        .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(assistants)
    }

    /// Create an assistant.
    ///
    /// The stored status is always [`AssistantStatus::Inactive`]; assistants
    /// are activated with a later [`Database::update_assistant`].
    pub fn create_assistant(&self, input: &NewAssistant) -> Result<String> {
        if let Some(requested) = input.status.filter(|s| *s != AssistantStatus::Inactive) {
            tracing::debug!(requested = %requested, "Ignoring requested assistant status");
        }

        let now = store_now();
        let assistant = Assistant {
            id: new_id(),
            creation_time: now,
            name: input.name.clone(),
            description: input.description.clone(),
            status: AssistantStatus::Inactive,
            assistant_type: input.assistant_type,
            configuration: input.configuration.clone(),
            integrations: input.integrations.clone().unwrap_or_default(),
            metrics: AssistantMetrics::default(),
            created_by: input.created_by.clone(),
            created_at: now,
            updated_at: now,
        };

        let conn = self.connection();
        conn.execute(
            r#"
            INSERT INTO assistants (id, creation_time, name, description, status, assistant_type,
                                    configuration, integrations, metrics, created_by,
                                    created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                assistant.id,
                to_millis(assistant.creation_time),
                assistant.name,
                assistant.description,
                assistant.status.as_str(),
                assistant.assistant_type.as_str(),
                to_json(&assistant.configuration)?,
                to_json(&assistant.integrations)?,
                to_json(&assistant.metrics)?,
                assistant.created_by,
                to_millis(assistant.created_at),
                to_millis(assistant.updated_at),
            ],
        )?;

        tracing::info!(
            assistant_id = %assistant.id,
            assistant_type = %assistant.assistant_type,
            model = %assistant.configuration.model,
            "Created assistant"
        );
        Ok(assistant.id)
    }

    /// Merge `patch` into the assistant and stamp `updatedAt`
    pub fn update_assistant(&self, id: &str, patch: &AssistantPatch) -> Result<String> {
        let mut assistant = self.require_assistant(id)?;

        if let Some(name) = &patch.name {
            assistant.name = name.clone();
        }
        if let Some(description) = &patch.description {
            assistant.description = description.clone();
        }
        if let Some(status) = patch.status {
            assistant.status = status;
        }
        if let Some(kind) = patch.assistant_type {
            assistant.assistant_type = kind;
        }
        if let Some(configuration) = &patch.configuration {
            assistant.configuration = configuration.clone();
        }
        if let Some(integrations) = &patch.integrations {
            assistant.integrations = integrations.clone();
        }
        assistant.updated_at = store_now();

        self.save_assistant(&assistant)?;
        tracing::info!(assistant_id = %id, status = %assistant.status, "Updated assistant");
        Ok(assistant.id)
    }

    /// Overwrite the supplied metric fields with the given absolute values
    pub fn update_assistant_metrics(&self, id: &str, update: &MetricsUpdate) -> Result<String> {
        let mut assistant = self.require_assistant(id)?;

        let now = store_now();
        assistant.metrics.merge(update, now);
        assistant.updated_at = now;

        self.save_assistant(&assistant)?;
        tracing::debug!(assistant_id = %id, "Updated assistant metrics");
        Ok(assistant.id)
    }

    /// Physically delete an assistant that has no active conversation
    pub fn delete_assistant(&self, id: &str) -> Result<String> {
        let assistant = self.require_assistant(id)?;

        let conn = self.connection();
        let active: Option<String> = conn
            .query_row(
                "SELECT id FROM conversations WHERE assistant_id = ?1 AND status = ?2 LIMIT 1",
                params![id, ConversationStatus::Active.as_str()],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(conversation_id) = active {
            tracing::info!(
                assistant_id = %id,
                conversation_id = %conversation_id,
                "Refused to delete assistant with active conversations"
            );
            return Err(Error::HasActiveConversations(assistant.id));
        }

        conn.execute("DELETE FROM assistants WHERE id = ?1", [id])?;
        tracing::info!(assistant_id = %id, "Deleted assistant");
        Ok(assistant.id)
    }

    /// Aggregates over every assistant
    pub fn assistant_stats(&self) -> Result<AssistantStats> {
        let assistants = self.all_assistants()?;
        let mut stats = AssistantStats::default();

        let mut success_rate_sum = 0.0;
        let mut response_time_sum = 0.0;
        for assistant in &assistants {
            stats.total += 1;
            match assistant.status {
                AssistantStatus::Active => stats.active += 1,
                AssistantStatus::Inactive => stats.inactive += 1,
                AssistantStatus::Training => stats.training += 1,
            }
            match assistant.assistant_type {
                AssistantType::CustomerService => stats.by_type.customer_service += 1,
                AssistantType::Sales => stats.by_type.sales += 1,
                AssistantType::Support => stats.by_type.support += 1,
                AssistantType::General => stats.by_type.general += 1,
            }
            stats.total_conversations += assistant.metrics.total_conversations;
            stats.total_messages += assistant.metrics.total_messages;
            success_rate_sum += assistant.metrics.success_rate;
            response_time_sum += assistant.metrics.average_response_time;
        }

        if stats.total > 0 {
            stats.average_success_rate = success_rate_sum / stats.total as f64;
            stats.average_response_time = response_time_sum / stats.total as f64;
        }

        Ok(stats)
    }

    /// Active assistants with the most conversations
    pub fn top_assistants(&self, limit: usize) -> Result<Vec<Assistant>> {
        let mut active: Vec<Assistant> = self
            .all_assistants()?
            .into_iter()
            .filter(|a| a.status == AssistantStatus::Active)
            .collect();

        active.sort_by(|a, b| {
            b.metrics
                .total_conversations
                .cmp(&a.metrics.total_conversations)
        });
        active.truncate(limit);
        Ok(active)
    }

    fn all_assistants(&self) -> Result<Vec<Assistant>> {
        let conn = self.connection();
        let mut stmt = conn.prepare("SELECT * FROM assistants ORDER BY creation_time, rowid")?;
        let assistants = stmt
            .query_map([], Self::row_to_assistant)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(assistants)
    }

    fn require_assistant(&self, id: &str) -> Result<Assistant> {
        self.get_assistant(id)?
            .ok_or_else(|| Error::not_found("assistant", id))
    }

    pub(crate) fn save_assistant(&self, assistant: &Assistant) -> Result<()> {
        let conn = self.connection();
        conn.execute(
            r#"
            UPDATE assistants SET name = ?2, description = ?3, status = ?4, assistant_type = ?5,
                                  configuration = ?6, integrations = ?7, metrics = ?8,
                                  updated_at = ?9
            WHERE id = ?1
            "#,
            params![
                assistant.id,
                assistant.name,
                assistant.description,
                assistant.status.as_str(),
                assistant.assistant_type.as_str(),
                to_json(&assistant.configuration)?,
                to_json(&assistant.integrations)?,
                to_json(&assistant.metrics)?,
                to_millis(assistant.updated_at),
            ],
        )?;
        Ok(())
    }

    fn row_to_assistant(row: &Row) -> rusqlite::Result<Assistant> {
        Ok(Assistant {
            id: row.get("id")?,
            creation_time: get_ts(row, "creation_time")?,
            name: row.get("name")?,
            description: row.get("description")?,
            status: get_enum(row, "status")?,
            assistant_type: get_enum(row, "assistant_type")?,
            configuration: get_json(row, "configuration")?,
            integrations: get_json(row, "integrations")?,
            metrics: get_json(row, "metrics")?,
            created_by: row.get("created_by")?,
            created_at: get_ts(row, "created_at")?,
            updated_at: get_ts(row, "updated_at")?,
        })
    }
}
