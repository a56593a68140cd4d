//! Conversation handlers

use super::repo::{
    get_enum, get_json, get_opt_ts, get_ts, store_now, to_json, to_millis, AssistantCounter,
    Database,
};
use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

/// Default page size for [`Database::list_conversations`]
pub const DEFAULT_CONVERSATION_LIMIT: usize = 50;

/// Default size of [`Database::recent_conversations`]
pub const DEFAULT_RECENT_LIMIT: usize = 20;

impl Database {
    /// Get a conversation by ID
    pub fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        let conn = self.connection();
        conn.query_row(
            "SELECT * FROM conversations WHERE id = ?1",
            [id],
            Self::row_to_conversation,
        )
        .optional()
        .map_err(Error::from)
    }

    /// List conversations, newest first.
    ///
    /// One index drives the scan, picked in the order `assistant_id`,
    /// `user_id`, `platform`, `status`. Any further filter fields, `priority`
    /// included, are not applied.
    pub fn list_conversations(
        &self,
        filter: &ConversationFilter,
        limit: usize,
    ) -> Result<Vec<Conversation>> {
        let conn = self.connection();

        let (sql, value) = if let Some(assistant_id) = filter.assistant_id.as_deref() {
            (
                "SELECT * FROM conversations WHERE assistant_id = ?1",
                Some(assistant_id),
            )
        } else if let Some(user_id) = filter.user_id.as_deref() {
            ("SELECT * FROM conversations WHERE user_id = ?1", Some(user_id))
        } else if let Some(platform) = filter.platform {
            (
                "SELECT * FROM conversations WHERE platform = ?1",
                Some(platform.as_str()),
            )
        } else if let Some(status) = filter.status {
            (
                "SELECT * FROM conversations WHERE status = ?1",
                Some(status.as_str()),
            )
        } else {
            ("SELECT * FROM conversations", None)
        };
        let sql = format!("{sql} ORDER BY creation_time DESC, rowid DESC LIMIT {limit}");

        let mut stmt = conn.prepare(&sql)?;
        let conversations = match value {
            Some(value) => stmt.query_map([value], Self::row_to_conversation)?,
            None => stmt.query_map([], Self::row_to_conversation)?,
        }
        .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(conversations)
    }

    /// Find the conversation of an external contact on a platform.
    ///
    /// Prefers the most recently started active conversation and falls back
    /// to the most recently started one of any status.
    pub fn get_conversation_by_external_user(
        &self,
        external_user_id: &str,
        platform: Platform,
        assistant_id: Option<&str>,
    ) -> Result<Option<Conversation>> {
        let candidates = {
            let conn = self.connection();
            let mut stmt = conn.prepare(
                r#"
                SELECT * FROM conversations
                WHERE external_user_id = ?1 AND platform = ?2
                ORDER BY started_at DESC, rowid DESC
                "#,
            )?;
            let rows = stmt
                .query_map(
                    params![external_user_id, platform.as_str()],
                    Self::row_to_conversation,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let mut candidates: Vec<Conversation> = candidates
            .into_iter()
            .filter(|c| assistant_id.map_or(true, |id| c.assistant_id == id))
            .collect();

        let chosen = match candidates
            .iter()
            .position(|c| c.status == ConversationStatus::Active)
        {
            Some(index) => Some(candidates.swap_remove(index)),
            None => candidates.into_iter().next(),
        };
        Ok(chosen)
    }

    /// Start a conversation and count it on the owning assistant.
    ///
    /// The assistant counter bump is a dependent write: when it fails the
    /// conversation stays created and the failure is only logged.
    pub fn create_conversation(&self, input: &NewConversation) -> Result<String> {
        let now = store_now();
        let conversation = Conversation {
            id: new_id(),
            creation_time: now,
            assistant_id: input.assistant_id.clone(),
            user_id: input.user_id.clone(),
            external_user_id: input.external_user_id.clone(),
            platform: input.platform,
            status: ConversationStatus::Active,
            priority: input.priority,
            tags: input.tags.clone(),
            metadata: input.metadata.clone(),
            started_at: now,
            last_activity: now,
            ended_at: None,
        };

        {
            let conn = self.connection();
            conn.execute(
                r#"
                INSERT INTO conversations (id, creation_time, assistant_id, user_id,
                                           external_user_id, platform, status, priority, tags,
                                           metadata, started_at, last_activity, ended_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
                params![
                    conversation.id,
                    to_millis(conversation.creation_time),
                    conversation.assistant_id,
                    conversation.user_id,
                    conversation.external_user_id,
                    conversation.platform.as_str(),
                    conversation.status.as_str(),
                    conversation.priority.as_str(),
                    to_json(&conversation.tags)?,
                    to_json(&conversation.metadata)?,
                    to_millis(conversation.started_at),
                    to_millis(conversation.last_activity),
                    Option::<i64>::None,
                ],
            )?;
        }

        tracing::info!(
            conversation_id = %conversation.id,
            assistant_id = %conversation.assistant_id,
            platform = %conversation.platform,
            "Created conversation"
        );

        match self.bump_assistant_counter(
            &conversation.assistant_id,
            AssistantCounter::Conversations,
            now,
        ) {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                assistant_id = %conversation.assistant_id,
                "Conversation references an unknown assistant; metrics not updated"
            ),
            Err(e) => tracing::warn!(
                assistant_id = %conversation.assistant_id,
                error = %e,
                "Failed to update assistant conversation count"
            ),
        }

        Ok(conversation.id)
    }

    /// Merge `patch`, refresh `lastActivity` and stamp `endedAt` when the
    /// conversation leaves the active state for the first time.
    pub fn update_conversation(&self, id: &str, patch: &ConversationPatch) -> Result<String> {
        let mut conversation = self.require_conversation(id)?;
        let previous_status = conversation.status;

        if let Some(status) = patch.status {
            conversation.status = status;
        }
        if let Some(priority) = patch.priority {
            conversation.priority = priority;
        }
        if let Some(user_id) = &patch.user_id {
            conversation.user_id = Some(user_id.clone());
        }
        if let Some(tags) = &patch.tags {
            conversation.tags = tags.clone();
        }
        if let Some(metadata) = &patch.metadata {
            conversation.metadata = metadata.clone();
        }

        let now = store_now();
        conversation.last_activity = now;
        if previous_status == ConversationStatus::Active
            && conversation.status != ConversationStatus::Active
            && conversation.ended_at.is_none()
        {
            conversation.ended_at = Some(now);
            tracing::info!(
                conversation_id = %id,
                status = %conversation.status,
                "Conversation ended"
            );
        }

        self.save_conversation(&conversation)?;
        Ok(conversation.id)
    }

    /// Refresh `lastActivity` only
    pub fn touch_conversation(&self, id: &str) -> Result<String> {
        if !self.set_conversation_activity(id, store_now())? {
            return Err(Error::not_found("conversation", id));
        }
        Ok(id.to_string())
    }

    /// Counts over all conversations or one assistant's, bucketed on
    /// `startedAt`
    pub fn conversation_stats(
        &self,
        assistant_id: Option<&str>,
        range: TimeRange,
    ) -> Result<ConversationStats> {
        let conversations = match assistant_id {
            Some(assistant_id) => self.conversations_for_assistant(assistant_id)?,
            None => self.all_conversations()?,
        };

        let now = store_now();
        let mut stats = ConversationStats::default();
        let mut ended = 0u64;
        let mut total_duration_ms = 0i64;

        for conversation in conversations
            .iter()
            .filter(|c| range.contains(c.started_at, now))
        {
            stats.total += 1;
            match conversation.status {
                ConversationStatus::Active => stats.active += 1,
                ConversationStatus::Completed => stats.completed += 1,
                ConversationStatus::Abandoned => stats.abandoned += 1,
                ConversationStatus::Transferred => stats.transferred += 1,
            }
            match conversation.platform {
                Platform::WhatsApp => stats.by_platform.whatsapp += 1,
                Platform::Telegram => stats.by_platform.telegram += 1,
                Platform::Webchat => stats.by_platform.webchat += 1,
                Platform::Api => stats.by_platform.api += 1,
            }
            match conversation.priority {
                Priority::Low => stats.by_priority.low += 1,
                Priority::Medium => stats.by_priority.medium += 1,
                Priority::High => stats.by_priority.high += 1,
                Priority::Urgent => stats.by_priority.urgent += 1,
            }
            if conversation.metadata.is_resolved() {
                stats.resolved += 1;
            }
            if let Some(duration) = conversation.duration() {
                ended += 1;
                total_duration_ms += duration.num_milliseconds();
            }
        }

        stats.average_duration = total_duration_ms as f64 / ended.max(1) as f64;
        Ok(stats)
    }

    /// Most recently active conversations, optionally for one assistant
    pub fn recent_conversations(
        &self,
        limit: usize,
        assistant_id: Option<&str>,
    ) -> Result<Vec<Conversation>> {
        let conn = self.connection();
        let conversations = match assistant_id {
            Some(assistant_id) => {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT * FROM conversations WHERE assistant_id = ?1
                    ORDER BY last_activity DESC, rowid DESC LIMIT ?2
                    "#,
                )?;
                let rows = stmt
                    .query_map(params![assistant_id, limit as i64], Self::row_to_conversation)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM conversations ORDER BY last_activity DESC, rowid DESC LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map([limit as i64], Self::row_to_conversation)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(conversations)
    }

    /// All conversations of an assistant through the assistant index
    pub(crate) fn conversations_for_assistant(
        &self,
        assistant_id: &str,
    ) -> Result<Vec<Conversation>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(
            "SELECT * FROM conversations WHERE assistant_id = ?1 ORDER BY creation_time, rowid",
        )?;
        let conversations = stmt
            .query_map([assistant_id], Self::row_to_conversation)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(conversations)
    }

    fn all_conversations(&self) -> Result<Vec<Conversation>> {
        let conn = self.connection();
        let mut stmt = conn.prepare("SELECT * FROM conversations ORDER BY creation_time, rowid")?;
        let conversations = stmt
            .query_map([], Self::row_to_conversation)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(conversations)
    }

    /// Set `lastActivity` to `at`. Returns `false` when no such conversation.
    pub(crate) fn set_conversation_activity(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let conn = self.connection();
        let changed = conn.execute(
            "UPDATE conversations SET last_activity = ?2 WHERE id = ?1",
            params![id, to_millis(at)],
        )?;
        Ok(changed > 0)
    }

    fn require_conversation(&self, id: &str) -> Result<Conversation> {
        self.get_conversation(id)?
            .ok_or_else(|| Error::not_found("conversation", id))
    }

    fn save_conversation(&self, conversation: &Conversation) -> Result<()> {
        let conn = self.connection();
        conn.execute(
            r#"
            UPDATE conversations SET user_id = ?2, status = ?3, priority = ?4, tags = ?5,
                                     metadata = ?6, last_activity = ?7, ended_at = ?8
            WHERE id = ?1
            "#,
            params![
                conversation.id,
                conversation.user_id,
                conversation.status.as_str(),
                conversation.priority.as_str(),
                to_json(&conversation.tags)?,
                to_json(&conversation.metadata)?,
                to_millis(conversation.last_activity),
                conversation.ended_at.map(to_millis),
            ],
        )?;
        Ok(())
    }

    fn row_to_conversation(row: &Row) -> rusqlite::Result<Conversation> {
        Ok(Conversation {
            id: row.get("id")?,
            creation_time: get_ts(row, "creation_time")?,
            assistant_id: row.get("assistant_id")?,
            user_id: row.get("user_id")?,
            external_user_id: row.get("external_user_id")?,
            platform: get_enum(row, "platform")?,
            status: get_enum(row, "status")?,
            priority: get_enum(row, "priority")?,
            tags: get_json(row, "tags")?,
            metadata: get_json(row, "metadata")?,
            started_at: get_ts(row, "started_at")?,
            last_activity: get_ts(row, "last_activity")?,
            ended_at: get_opt_ts(row, "ended_at")?,
        })
    }
}
