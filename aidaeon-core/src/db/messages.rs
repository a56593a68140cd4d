//! Message handlers
//!
//! Listings scan the `(conversation_id, timestamp)` index. Filters on content
//! type, sender and text are applied in memory after the scan.

use super::repo::{
    get_enum, get_json, get_opt_ts, get_ts, store_now, to_json, to_millis, AssistantCounter,
    Database,
};
use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::BTreeMap;

/// Default page size for [`Database::list_messages`]
pub const DEFAULT_MESSAGE_LIMIT: usize = 100;

/// Default page size for filtered listings and search
pub const DEFAULT_FILTERED_MESSAGE_LIMIT: usize = 50;

/// Default window for [`Database::message_context`]
pub const DEFAULT_CONTEXT_LIMIT: usize = 20;

impl Database {
    /// Get a message by ID
    pub fn get_message(&self, id: &str) -> Result<Option<Message>> {
        let conn = self.connection();
        conn.query_row(
            "SELECT * FROM messages WHERE id = ?1",
            [id],
            Self::row_to_message,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Messages of a conversation ordered by timestamp
    pub fn list_messages(
        &self,
        conversation_id: &str,
        limit: usize,
        order: SortOrder,
    ) -> Result<Vec<Message>> {
        let conn = self.connection();
        let sql = format!(
            "SELECT * FROM messages WHERE conversation_id = ?1 \
             ORDER BY timestamp {order}, rowid {order} LIMIT ?2",
            order = order.sql()
        );
        let mut stmt = conn.prepare(&sql)?;
        let messages = stmt
            .query_map(params![conversation_id, limit as i64], Self::row_to_message)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    /// Newest messages of one content type
    pub fn list_messages_by_type(
        &self,
        conversation_id: &str,
        content_type: ContentType,
        limit: usize,
    ) -> Result<Vec<Message>> {
        Ok(self
            .conversation_messages(conversation_id, SortOrder::Desc)?
            .into_iter()
            .filter(|m| m.content_type == content_type)
            .take(limit)
            .collect())
    }

    /// Newest messages from one sender
    pub fn list_messages_by_sender(
        &self,
        conversation_id: &str,
        sender: MessageSender,
        limit: usize,
    ) -> Result<Vec<Message>> {
        Ok(self
            .conversation_messages(conversation_id, SortOrder::Desc)?
            .into_iter()
            .filter(|m| m.sender == sender)
            .take(limit)
            .collect())
    }

    /// Append a message to a conversation.
    ///
    /// After the insert the conversation's `lastActivity` is moved to the
    /// message timestamp and, for assistant messages, the assistant's
    /// `totalMessages` counter is bumped. Both are dependent writes whose
    /// failures are logged and otherwise ignored.
    pub fn create_message(&self, input: &NewMessage) -> Result<String> {
        let Some(conversation) = self.get_conversation(&input.conversation_id)? else {
            return Err(Error::ConversationNotFound(input.conversation_id.clone()));
        };

        let now = store_now();
        let message = Message {
            id: new_id(),
            creation_time: now,
            conversation_id: conversation.id.clone(),
            sender: input.sender,
            content_type: input.content_type,
            content: input.content.clone(),
            metadata: input.metadata.clone().unwrap_or_default(),
            reply_to: input.reply_to.clone(),
            timestamp: now,
            status: MessageStatus::Sent,
            delivered_at: None,
            read_at: None,
        };

        {
            let conn = self.connection();
            conn.execute(
                r#"
                INSERT INTO messages (id, creation_time, conversation_id, sender, content_type,
                                      content, metadata, reply_to, timestamp, status,
                                      delivered_at, read_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL, NULL)
                "#,
                params![
                    message.id,
                    to_millis(message.creation_time),
                    message.conversation_id,
                    message.sender.as_str(),
                    message.content_type.as_str(),
                    message.content,
                    to_json(&message.metadata)?,
                    message.reply_to,
                    to_millis(message.timestamp),
                    message.status.as_str(),
                ],
            )?;
        }

        tracing::debug!(
            message_id = %message.id,
            conversation_id = %message.conversation_id,
            sender = %message.sender,
            content_type = %message.content_type,
            "Created message"
        );

        if let Err(e) = self.set_conversation_activity(&conversation.id, message.timestamp) {
            tracing::warn!(
                conversation_id = %conversation.id,
                error = %e,
                "Failed to refresh conversation activity"
            );
        }

        if message.sender == MessageSender::Assistant {
            match self.bump_assistant_counter(
                &conversation.assistant_id,
                AssistantCounter::Messages,
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
                    "Failed to update assistant message count"
                ),
            }
        }

        Ok(message.id)
    }

    /// Record a delivery report.
    ///
    /// No transition is refused; a step backwards on the delivery ladder is
    /// only logged. `deliveredAt` and `readAt` are stamped on every call that
    /// names their status.
    pub fn update_message_status(
        &self,
        id: &str,
        status: MessageStatus,
        error: Option<&str>,
        external_id: Option<&str>,
    ) -> Result<String> {
        let mut message = self.require_message(id)?;
        if !message.status.is_forward(status) {
            tracing::warn!(
                message_id = %id,
                from = %message.status,
                to = %status,
                "Message status moved backwards"
            );
        }
        apply_status(&mut message, status, error, external_id, store_now());
        self.save_message(&message)?;
        Ok(message.id)
    }

    /// Mark every unread message of a conversation as read, optionally only
    /// up to and including the timestamp of `up_to_message_id`.
    ///
    /// Each message is written separately. If one write fails the error is
    /// returned and the messages already written stay read.
    pub fn mark_all_read(
        &self,
        conversation_id: &str,
        up_to_message_id: Option<&str>,
    ) -> Result<usize> {
        let messages = self.conversation_messages(conversation_id, SortOrder::Asc)?;

        let bound = match up_to_message_id {
            Some(up_to) => Some(
                messages
                    .iter()
                    .find(|m| m.id == up_to)
                    .map(|m| m.timestamp)
                    .ok_or_else(|| Error::not_found("message", up_to))?,
            ),
            None => None,
        };

        let now = store_now();
        let mut updated = 0;
        for mut message in messages
            .into_iter()
            .filter(|m| m.status != MessageStatus::Read)
            .filter(|m| bound.map_or(true, |bound| m.timestamp <= bound))
        {
            apply_status(&mut message, MessageStatus::Read, None, None, now);
            self.save_message(&message)?;
            updated += 1;
        }

        tracing::info!(conversation_id = %conversation_id, updated, "Marked messages read");
        Ok(updated)
    }

    /// Delete a message. Without `delete_for_everyone` the document stays and
    /// its content is replaced by a placeholder.
    pub fn delete_message(&self, id: &str, delete_for_everyone: bool) -> Result<String> {
        let mut message = self.require_message(id)?;

        if delete_for_everyone {
            let conn = self.connection();
            conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            tracing::info!(message_id = %id, "Removed message");
            return Ok(message.id);
        }

        message.content = DELETED_MESSAGE_PLACEHOLDER.to_string();
        message.metadata.deleted = true;
        message.metadata.deleted_at = Some(store_now());
        self.save_message(&message)?;
        tracing::info!(message_id = %id, "Soft-deleted message");
        Ok(message.id)
    }

    /// Counts over one conversation, one assistant's conversations, or
    /// everything, bucketed on message timestamp
    pub fn message_stats(
        &self,
        conversation_id: Option<&str>,
        assistant_id: Option<&str>,
        range: TimeRange,
    ) -> Result<MessageStats> {
        let messages = match (conversation_id, assistant_id) {
            (Some(conversation_id), _) => {
                self.conversation_messages(conversation_id, SortOrder::Asc)?
            }
            (None, Some(assistant_id)) => {
                let mut messages = Vec::new();
                for conversation in self.conversations_for_assistant(assistant_id)? {
                    messages.extend(self.conversation_messages(&conversation.id, SortOrder::Asc)?);
                }
                messages
            }
            (None, None) => self.all_messages()?,
        };

        let now = store_now();
        let messages: Vec<Message> = messages
            .into_iter()
            .filter(|m| range.contains(m.timestamp, now))
            .collect();

        let mut stats = MessageStats {
            total: messages.len() as u64,
            ..Default::default()
        };
        for message in &messages {
            match message.sender {
                MessageSender::User => stats.by_sender.user += 1,
                MessageSender::Assistant => stats.by_sender.assistant += 1,
                MessageSender::System => stats.by_sender.system += 1,
            }
            *stats.by_type.entry(message.content_type).or_insert(0) += 1;
            match message.status {
                MessageStatus::Sent => stats.by_status.sent += 1,
                MessageStatus::Delivered => stats.by_status.delivered += 1,
                MessageStatus::Read => stats.by_status.read += 1,
                MessageStatus::Failed => stats.by_status.failed += 1,
            }
        }
        stats.average_response_time = average_response_time(&messages);

        Ok(stats)
    }

    /// Case-insensitive substring search over message content, newest first
    pub fn search_messages(
        &self,
        conversation_id: Option<&str>,
        term: &str,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let messages = match conversation_id {
            Some(conversation_id) => self.conversation_messages(conversation_id, SortOrder::Desc)?,
            None => {
                let mut all = self.all_messages()?;
                all.reverse();
                all
            }
        };

        let needle = term.to_lowercase();
        Ok(messages
            .into_iter()
            .filter(|m| m.content.to_lowercase().contains(&needle))
            .take(limit)
            .collect())
    }

    /// The latest `limit` messages of a conversation in chronological order,
    /// for building a prompt
    pub fn message_context(
        &self,
        conversation_id: &str,
        limit: usize,
        include_system: bool,
    ) -> Result<Vec<Message>> {
        let mut context: Vec<Message> = self
            .conversation_messages(conversation_id, SortOrder::Desc)?
            .into_iter()
            .filter(|m| include_system || m.sender != MessageSender::System)
            .take(limit)
            .collect();
        context.reverse();
        Ok(context)
    }

    fn conversation_messages(&self, conversation_id: &str, order: SortOrder) -> Result<Vec<Message>> {
        let conn = self.connection();
        let sql = format!(
            "SELECT * FROM messages WHERE conversation_id = ?1 \
             ORDER BY timestamp {order}, rowid {order}",
            order = order.sql()
        );
        let mut stmt = conn.prepare(&sql)?;
        let messages = stmt
            .query_map([conversation_id], Self::row_to_message)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    fn all_messages(&self) -> Result<Vec<Message>> {
        let conn = self.connection();
        let mut stmt = conn.prepare("SELECT * FROM messages ORDER BY timestamp, rowid")?;
        let messages = stmt
            .query_map([], Self::row_to_message)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    fn require_message(&self, id: &str) -> Result<Message> {
        self.get_message(id)?
            .ok_or_else(|| Error::not_found("message", id))
    }

    fn save_message(&self, message: &Message) -> Result<()> {
        let conn = self.connection();
        conn.execute(
            r#"
            UPDATE messages SET content = ?2, metadata = ?3, status = ?4,
                                delivered_at = ?5, read_at = ?6
            WHERE id = ?1
            "#,
            params![
                message.id,
                message.content,
                to_json(&message.metadata)?,
                message.status.as_str(),
                message.delivered_at.map(to_millis),
                message.read_at.map(to_millis),
            ],
        )?;
        Ok(())
    }

    fn row_to_message(row: &Row) -> rusqlite::Result<Message> {
        Ok(Message {
            id: row.get("id")?,
            creation_time: get_ts(row, "creation_time")?,
            conversation_id: row.get("conversation_id")?,
            sender: get_enum(row, "sender")?,
            content_type: get_enum(row, "content_type")?,
            content: row.get("content")?,
            metadata: get_json(row, "metadata")?,
            reply_to: row.get("reply_to")?,
            timestamp: get_ts(row, "timestamp")?,
            status: get_enum(row, "status")?,
            delivered_at: get_opt_ts(row, "delivered_at")?,
            read_at: get_opt_ts(row, "read_at")?,
        })
    }
}

/// Set the status, merge the delivery report into metadata and stamp the
/// matching timestamp
fn apply_status(
    message: &mut Message,
    status: MessageStatus,
    error: Option<&str>,
    external_id: Option<&str>,
    now: DateTime<Utc>,
) {
    message.status = status;
    message.metadata.delivery = Some(DeliveryInfo {
        status,
        error: error.map(str::to_string),
        external_id: external_id.map(str::to_string),
        updated_at: now,
    });
    match status {
        MessageStatus::Delivered => message.delivered_at = Some(now),
        MessageStatus::Read => message.read_at = Some(now),
        MessageStatus::Sent | MessageStatus::Failed => {}
    }
}

/// Mean milliseconds between each user message and the first later
/// assistant message of the same conversation. Unanswered messages are
/// skipped; `0.0` when there is no pair at all.
fn average_response_time(messages: &[Message]) -> f64 {
    let mut by_conversation: BTreeMap<&str, Vec<&Message>> = BTreeMap::new();
    for message in messages {
        by_conversation
            .entry(message.conversation_id.as_str())
            .or_default()
            .push(message);
    }

    let mut total_ms = 0i64;
    let mut pairs = 0u64;
    for thread in by_conversation.values_mut() {
        thread.sort_by_key(|m| m.timestamp);
        for (i, question) in thread.iter().enumerate() {
            if question.sender != MessageSender::User {
                continue;
            }
            let reply = thread[i + 1..].iter().find(|m| {
                m.sender == MessageSender::Assistant && m.timestamp >= question.timestamp
            });
            if let Some(reply) = reply {
                total_ms += (reply.timestamp - question.timestamp).num_milliseconds();
                pairs += 1;
            }
        }
    }

    if pairs == 0 {
        0.0
    } else {
        total_ms as f64 / pairs as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn setup(db: &Database) -> (String, String) {
        let assistant_id = db
            .create_assistant(&NewAssistant {
                name: "Ana".to_string(),
                description: String::new(),
                assistant_type: AssistantType::Sales,
                configuration: AssistantConfiguration::default(),
                integrations: None,
                created_by: "user-1".to_string(),
                status: None,
            })
            .unwrap();
        let conversation_id = db
            .create_conversation(&NewConversation::new(&assistant_id, Platform::WhatsApp))
            .unwrap();
        (assistant_id, conversation_id)
    }

    fn send(db: &Database, conversation_id: &str, sender: MessageSender, text: &str) -> String {
        db.create_message(&NewMessage::text(conversation_id, sender, text))
            .unwrap()
    }

    fn set_timestamp(db: &Database, id: &str, ts: DateTime<Utc>) {
        db.connection()
            .execute(
                "UPDATE messages SET timestamp = ?2 WHERE id = ?1",
                params![id, to_millis(ts)],
            )
            .unwrap();
    }

    fn message_at(conversation_id: &str, sender: MessageSender, ms: i64) -> Message {
        let ts = Utc.timestamp_millis_opt(ms).unwrap();
        Message {
            id: new_id(),
            creation_time: ts,
            conversation_id: conversation_id.to_string(),
            sender,
            content_type: ContentType::Text,
            content: String::new(),
            metadata: MessageMetadata::default(),
            reply_to: None,
            timestamp: ts,
            status: MessageStatus::Sent,
            delivered_at: None,
            read_at: None,
        }
    }

    #[test]
    fn test_create_touches_conversation_and_counts() {
        let db = test_db();
        let (assistant_id, conversation_id) = setup(&db);

        let user_msg = send(&db, &conversation_id, MessageSender::User, "oi");
        let metrics = db.get_assistant(&assistant_id).unwrap().unwrap().metrics;
        assert_eq!(metrics.total_messages, 0);

        let reply = send(&db, &conversation_id, MessageSender::Assistant, "Olá!");
        let reply = db.get_message(&reply).unwrap().unwrap();
        assert_eq!(reply.status, MessageStatus::Sent);
        assert_eq!(reply.content_type, ContentType::Text);

        let conversation = db.get_conversation(&conversation_id).unwrap().unwrap();
        assert_eq!(conversation.last_activity, reply.timestamp);

        let metrics = db.get_assistant(&assistant_id).unwrap().unwrap().metrics;
        assert_eq!(metrics.total_messages, 1);
        assert!(db.get_message(&user_msg).unwrap().is_some());
    }

    #[test]
    fn test_create_requires_conversation() {
        let db = test_db();
        let result = db.create_message(&NewMessage::text("nope", MessageSender::User, "hi"));
        assert!(matches!(result, Err(Error::ConversationNotFound(id)) if id == "nope"));

        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_update_status_merges_delivery() {
        let db = test_db();
        let (_, conversation_id) = setup(&db);
        let id = db
            .create_message(&NewMessage {
                metadata: Some(MessageMetadata {
                    ai: Some(AiGeneration {
                        model: "gpt-4".to_string(),
                        tokens_used: 42,
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..NewMessage::text(&conversation_id, MessageSender::Assistant, "pronto")
            })
            .unwrap();

        db.update_message_status(&id, MessageStatus::Delivered, None, Some("wamid.1"))
            .unwrap();
        let delivered = db.get_message(&id).unwrap().unwrap();
        assert_eq!(delivered.status, MessageStatus::Delivered);
        assert!(delivered.delivered_at.is_some());
        assert!(delivered.read_at.is_none());
        let delivery = delivered.metadata.delivery.clone().unwrap();
        assert_eq!(delivery.external_id.as_deref(), Some("wamid.1"));
        assert_eq!(delivered.metadata.ai.as_ref().unwrap().tokens_used, 42);

        db.update_message_status(&id, MessageStatus::Read, None, None)
            .unwrap();
        let first = db.get_message(&id).unwrap().unwrap().read_at.unwrap();
        db.update_message_status(&id, MessageStatus::Read, None, None)
            .unwrap();
        let second = db.get_message(&id).unwrap().unwrap();
        assert!(second.read_at.unwrap() >= first);
        assert_eq!(second.delivered_at, delivered.delivered_at);

        assert!(matches!(
            db.update_message_status("missing", MessageStatus::Read, None, None),
            Err(Error::NotFound { entity: "message", .. })
        ));
    }

    #[test]
    fn test_read_without_delivered_is_allowed() {
        let db = test_db();
        let (_, conversation_id) = setup(&db);
        let id = send(&db, &conversation_id, MessageSender::User, "hi");

        db.update_message_status(&id, MessageStatus::Read, None, None)
            .unwrap();
        let message = db.get_message(&id).unwrap().unwrap();
        assert!(message.read_at.is_some());
        assert!(message.delivered_at.is_none());

        db.update_message_status(&id, MessageStatus::Failed, Some("timeout"), None)
            .unwrap();
        let message = db.get_message(&id).unwrap().unwrap();
        assert_eq!(message.status, MessageStatus::Failed);
        assert_eq!(
            message.metadata.delivery.unwrap().error.as_deref(),
            Some("timeout")
        );
    }

    #[test]
    fn test_mark_all_read_with_bound() {
        let db = test_db();
        let (_, conversation_id) = setup(&db);
        let base = store_now() - Duration::minutes(10);

        let ids: Vec<String> = (0..4)
            .map(|i| {
                let id = send(&db, &conversation_id, MessageSender::User, "msg");
                set_timestamp(&db, &id, base + Duration::minutes(i));
                id
            })
            .collect();
        db.update_message_status(&ids[0], MessageStatus::Read, None, None)
            .unwrap();

        let updated = db.mark_all_read(&conversation_id, Some(&ids[2])).unwrap();
        assert_eq!(updated, 2);
        assert_eq!(
            db.get_message(&ids[3]).unwrap().unwrap().status,
            MessageStatus::Sent
        );
        assert!(db.get_message(&ids[2]).unwrap().unwrap().read_at.is_some());

        assert_eq!(db.mark_all_read(&conversation_id, None).unwrap(), 1);
        assert_eq!(db.mark_all_read(&conversation_id, None).unwrap(), 0);

        assert!(matches!(
            db.mark_all_read(&conversation_id, Some("elsewhere")),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_soft_and_hard_delete() {
        let db = test_db();
        let (_, conversation_id) = setup(&db);
        let soft = send(&db, &conversation_id, MessageSender::User, "segredo");
        let hard = send(&db, &conversation_id, MessageSender::User, "oops");

        db.delete_message(&soft, false).unwrap();
        let message = db.get_message(&soft).unwrap().unwrap();
        assert_eq!(message.content, DELETED_MESSAGE_PLACEHOLDER);
        assert!(message.metadata.deleted);
        assert!(message.metadata.deleted_at.is_some());

        db.delete_message(&hard, true).unwrap();
        assert!(db.get_message(&hard).unwrap().is_none());

        assert!(matches!(
            db.delete_message(&hard, true),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_listings_filter_after_scan() {
        let db = test_db();
        let (_, conversation_id) = setup(&db);
        let base = store_now() - Duration::minutes(5);

        let senders = [
            MessageSender::System,
            MessageSender::User,
            MessageSender::Assistant,
            MessageSender::User,
        ];
        let ids: Vec<String> = senders
            .iter()
            .enumerate()
            .map(|(i, sender)| {
                let id = send(&db, &conversation_id, *sender, &format!("m{i}"));
                set_timestamp(&db, &id, base + Duration::seconds(i as i64));
                id
            })
            .collect();
        let image = db
            .create_message(&NewMessage {
                content_type: ContentType::Image,
                ..NewMessage::text(&conversation_id, MessageSender::User, "foto")
            })
            .unwrap();

        let asc = db
            .list_messages(&conversation_id, DEFAULT_MESSAGE_LIMIT, SortOrder::Asc)
            .unwrap();
        assert_eq!(asc.first().unwrap().id, ids[0]);
        assert_eq!(asc.last().unwrap().id, image);
        let desc = db
            .list_messages(&conversation_id, 2, SortOrder::Desc)
            .unwrap();
        assert_eq!(desc.len(), 2);
        assert_eq!(desc[0].id, image);

        let users = db
            .list_messages_by_sender(&conversation_id, MessageSender::User, 2)
            .unwrap();
        let user_ids: Vec<_> = users.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(user_ids, vec![image.as_str(), ids[3].as_str()]);

        let images = db
            .list_messages_by_type(&conversation_id, ContentType::Image, 50)
            .unwrap();
        assert_eq!(images.len(), 1);

        let context = db.message_context(&conversation_id, 3, false).unwrap();
        let context_ids: Vec<_> = context.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(
            context_ids,
            vec![ids[2].as_str(), ids[3].as_str(), image.as_str()]
        );
        let with_system = db.message_context(&conversation_id, 10, true).unwrap();
        assert_eq!(with_system.len(), 5);
        assert_eq!(with_system[0].id, ids[0]);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let db = test_db();
        let (assistant_id, conversation_id) = setup(&db);
        let other = db
            .create_conversation(&NewConversation::new(&assistant_id, Platform::Telegram))
            .unwrap();
        send(&db, &conversation_id, MessageSender::User, "Quero um PEDIDO");
        send(&db, &other, MessageSender::User, "status do pedido?");
        send(&db, &other, MessageSender::Assistant, "Olá");

        let everywhere = db.search_messages(None, "pedido", 50).unwrap();
        assert_eq!(everywhere.len(), 2);
        assert!(everywhere[0].timestamp >= everywhere[1].timestamp);

        let scoped = db.search_messages(Some(other.as_str()), "PEDIDO", 50).unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].content, "status do pedido?");

        assert_eq!(db.search_messages(None, "pedido", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_stats_scopes() {
        let db = test_db();
        let (assistant_id, conversation_id) = setup(&db);
        let other = db
            .create_conversation(&NewConversation::new("other-assistant", Platform::Api))
            .unwrap();
        send(&db, &conversation_id, MessageSender::User, "a");
        send(&db, &conversation_id, MessageSender::Assistant, "b");
        let old = send(&db, &other, MessageSender::User, "c");
        set_timestamp(&db, &old, store_now() - Duration::days(3));

        let by_conversation = db
            .message_stats(Some(conversation_id.as_str()), Some("ignored"), TimeRange::All)
            .unwrap();
        assert_eq!(by_conversation.total, 2);
        assert_eq!(by_conversation.by_sender.assistant, 1);
        assert_eq!(by_conversation.by_type.get(&ContentType::Text), Some(&2));
        assert_eq!(by_conversation.by_status.sent, 2);

        let by_assistant = db
            .message_stats(None, Some(assistant_id.as_str()), TimeRange::All)
            .unwrap();
        assert_eq!(by_assistant.total, 2);

        assert_eq!(db.message_stats(None, None, TimeRange::All).unwrap().total, 3);
        assert_eq!(
            db.message_stats(None, None, TimeRange::Today).unwrap().total,
            2
        );
    }

    #[test]
    fn test_response_time_pairs_first_later_reply() {
        let messages = vec![
            message_at("c1", MessageSender::User, 1_000),
            message_at("c1", MessageSender::User, 2_000),
            message_at("c1", MessageSender::Assistant, 5_000),
            message_at("c1", MessageSender::User, 9_000),
            // different conversation; must not answer c1
            message_at("c2", MessageSender::Assistant, 9_500),
            message_at("c2", MessageSender::User, 10_000),
        ];

        // pairs: 1000->5000 and 2000->5000; later user messages are unanswered
        assert_eq!(average_response_time(&messages), 3_500.0);
        assert_eq!(average_response_time(&[]), 0.0);
    }
}
