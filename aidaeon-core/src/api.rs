//! Named handler envelope
//!
//! Every handler is reachable as `{"handler": "<collection>:<op>", "args":
//! {...}}` with camelCase argument names. [`Database::dispatch`] runs a
//! decoded [`Request`] and returns the handler result as JSON: an entity or
//! `null`, an array, an id, a count, or a statistics object.

use crate::db::{
    Database, DEFAULT_ASSISTANT_LIMIT, DEFAULT_CONTEXT_LIMIT, DEFAULT_CONVERSATION_LIMIT,
    DEFAULT_FILTERED_MESSAGE_LIMIT, DEFAULT_MESSAGE_LIMIT, DEFAULT_RECENT_LIMIT,
    DEFAULT_TOP_ASSISTANTS, DEFAULT_USER_LIMIT,
};
use crate::error::{Error, Result};
use crate::types::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every handler name accepted by [`Request::parse`]
pub const HANDLERS: &[&str] = &[
    "users:getByEmail",
    "users:getById",
    "users:list",
    "users:create",
    "users:update",
    "users:updateLastLogin",
    "users:softDelete",
    "users:stats",
    "assistants:getById",
    "assistants:list",
    "assistants:create",
    "assistants:update",
    "assistants:updateMetrics",
    "assistants:delete",
    "assistants:stats",
    "assistants:topAssistants",
    "conversations:getById",
    "conversations:list",
    "conversations:getByExternalUser",
    "conversations:create",
    "conversations:update",
    "conversations:touchActivity",
    "conversations:stats",
    "conversations:recent",
    "messages:getById",
    "messages:listByConversation",
    "messages:listByType",
    "messages:listBySender",
    "messages:create",
    "messages:updateStatus",
    "messages:markAllRead",
    "messages:delete",
    "messages:stats",
    "messages:search",
    "messages:getContext",
];

/// A decoded handler call
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "handler", content = "args")]
pub enum Request {
    #[serde(rename = "users:getByEmail")]
    UsersGetByEmail(EmailArgs),
    #[serde(rename = "users:getById")]
    UsersGetById(IdArgs),
    #[serde(rename = "users:list")]
    UsersList(ListUsersArgs),
    #[serde(rename = "users:create")]
    UsersCreate(NewUser),
    #[serde(rename = "users:update")]
    UsersUpdate(UpdateUserArgs),
    #[serde(rename = "users:updateLastLogin")]
    UsersUpdateLastLogin(IdArgs),
    #[serde(rename = "users:softDelete")]
    UsersSoftDelete(IdArgs),
    #[serde(rename = "users:stats")]
    UsersStats(NoArgs),

    #[serde(rename = "assistants:getById")]
    AssistantsGetById(IdArgs),
    #[serde(rename = "assistants:list")]
    AssistantsList(ListAssistantsArgs),
    #[serde(rename = "assistants:create")]
    AssistantsCreate(NewAssistant),
    #[serde(rename = "assistants:update")]
    AssistantsUpdate(UpdateAssistantArgs),
    #[serde(rename = "assistants:updateMetrics")]
    AssistantsUpdateMetrics(UpdateMetricsArgs),
    #[serde(rename = "assistants:delete")]
    AssistantsDelete(IdArgs),
    #[serde(rename = "assistants:stats")]
    AssistantsStats(NoArgs),
    #[serde(rename = "assistants:topAssistants")]
    AssistantsTop(TopAssistantsArgs),

    #[serde(rename = "conversations:getById")]
    ConversationsGetById(IdArgs),
    #[serde(rename = "conversations:list")]
    ConversationsList(ListConversationsArgs),
    #[serde(rename = "conversations:getByExternalUser")]
    ConversationsGetByExternalUser(ExternalUserArgs),
    #[serde(rename = "conversations:create")]
    ConversationsCreate(NewConversation),
    #[serde(rename = "conversations:update")]
    ConversationsUpdate(UpdateConversationArgs),
    #[serde(rename = "conversations:touchActivity")]
    ConversationsTouchActivity(IdArgs),
    #[serde(rename = "conversations:stats")]
    ConversationsStats(ConversationStatsArgs),
    #[serde(rename = "conversations:recent")]
    ConversationsRecent(RecentConversationsArgs),

    #[serde(rename = "messages:getById")]
    MessagesGetById(IdArgs),
    #[serde(rename = "messages:listByConversation")]
    MessagesListByConversation(ListMessagesArgs),
    #[serde(rename = "messages:listByType")]
    MessagesListByType(ListByTypeArgs),
    #[serde(rename = "messages:listBySender")]
    MessagesListBySender(ListBySenderArgs),
    #[serde(rename = "messages:create")]
    MessagesCreate(NewMessage),
    #[serde(rename = "messages:updateStatus")]
    MessagesUpdateStatus(UpdateStatusArgs),
    #[serde(rename = "messages:markAllRead")]
    MessagesMarkAllRead(MarkAllReadArgs),
    #[serde(rename = "messages:delete")]
    MessagesDelete(DeleteMessageArgs),
    #[serde(rename = "messages:stats")]
    MessagesStats(MessageStatsArgs),
    #[serde(rename = "messages:search")]
    MessagesSearch(SearchArgs),
    #[serde(rename = "messages:getContext")]
    MessagesGetContext(ContextArgs),
}

impl Request {
    /// Decode a handler name and its argument object
    pub fn parse(handler: &str, args: Value) -> Result<Self> {
        let args = if args.is_null() {
            Value::Object(Default::default())
        } else {
            args
        };
        let envelope = serde_json::json!({ "handler": handler, "args": args });
        serde_json::from_value(envelope).map_err(|e| Error::InvalidRequest(format!("{handler}: {e}")))
    }

    /// Decode a full `{"handler": ..., "args": ...}` document
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::InvalidRequest(e.to_string()))
    }
}

// ============================================
// Argument objects
// ============================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoArgs {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdArgs {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailArgs {
    pub email: String,
}

fn default_user_limit() -> usize {
    DEFAULT_USER_LIMIT
}

fn default_assistant_limit() -> usize {
    DEFAULT_ASSISTANT_LIMIT
}

fn default_top_assistants() -> usize {
    DEFAULT_TOP_ASSISTANTS
}

fn default_conversation_limit() -> usize {
    DEFAULT_CONVERSATION_LIMIT
}

fn default_recent_limit() -> usize {
    DEFAULT_RECENT_LIMIT
}

fn default_message_limit() -> usize {
    DEFAULT_MESSAGE_LIMIT
}

fn default_filtered_message_limit() -> usize {
    DEFAULT_FILTERED_MESSAGE_LIMIT
}

fn default_context_limit() -> usize {
    DEFAULT_CONTEXT_LIMIT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListUsersArgs {
    #[serde(flatten)]
    pub filter: UserFilter,
    #[serde(default = "default_user_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserArgs {
    pub id: String,
    #[serde(flatten)]
    pub patch: UserPatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListAssistantsArgs {
    #[serde(flatten)]
    pub filter: AssistantFilter,
    #[serde(default = "default_assistant_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAssistantArgs {
    pub id: String,
    #[serde(flatten)]
    pub patch: AssistantPatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMetricsArgs {
    pub id: String,
    pub metrics: MetricsUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopAssistantsArgs {
    #[serde(default = "default_top_assistants")]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListConversationsArgs {
    #[serde(flatten)]
    pub filter: ConversationFilter,
    #[serde(default = "default_conversation_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalUserArgs {
    pub external_user_id: String,
    pub platform: Platform,
    #[serde(default)]
    pub assistant_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConversationArgs {
    pub id: String,
    #[serde(flatten)]
    pub patch: ConversationPatch,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationStatsArgs {
    pub assistant_id: Option<String>,
    pub time_range: TimeRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentConversationsArgs {
    #[serde(default = "default_recent_limit")]
    pub limit: usize,
    #[serde(default)]
    pub assistant_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesArgs {
    pub conversation_id: String,
    #[serde(default = "default_message_limit")]
    pub limit: usize,
    #[serde(default)]
    pub order: SortOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListByTypeArgs {
    pub conversation_id: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    #[serde(default = "default_filtered_message_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBySenderArgs {
    pub conversation_id: String,
    pub sender: MessageSender,
    #[serde(default = "default_filtered_message_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusArgs {
    pub id: String,
    pub status: MessageStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadArgs {
    pub conversation_id: String,
    #[serde(default)]
    pub up_to_message_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessageArgs {
    pub id: String,
    #[serde(default)]
    pub delete_for_everyone: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageStatsArgs {
    pub conversation_id: Option<String>,
    pub assistant_id: Option<String>,
    pub time_range: TimeRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchArgs {
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub search_term: String,
    #[serde(default = "default_filtered_message_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextArgs {
    pub conversation_id: String,
    #[serde(default = "default_context_limit")]
    pub limit: usize,
    #[serde(default)]
    pub include_system: bool,
}

// ============================================
// Dispatch
// ============================================

impl Database {
    /// Run one handler call and return its result as JSON
    pub fn dispatch(&self, request: Request) -> Result<Value> {
        tracing::debug!(?request, "Dispatching handler");

        let value = match request {
            Request::UsersGetByEmail(a) => json(self.get_user_by_email(&a.email)?)?,
            Request::UsersGetById(a) => json(self.get_user(&a.id)?)?,
            Request::UsersList(a) => json(self.list_users(&a.filter, a.limit)?)?,
            Request::UsersCreate(input) => json(self.create_user(&input)?)?,
            Request::UsersUpdate(a) => json(self.update_user(&a.id, &a.patch)?)?,
            Request::UsersUpdateLastLogin(a) => json(self.update_last_login(&a.id)?)?,
            Request::UsersSoftDelete(a) => json(self.soft_delete_user(&a.id)?)?,
            Request::UsersStats(_) => json(self.user_stats()?)?,

            Request::AssistantsGetById(a) => json(self.get_assistant(&a.id)?)?,
            Request::AssistantsList(a) => json(self.list_assistants(&a.filter, a.limit)?)?,
            Request::AssistantsCreate(input) => json(self.create_assistant(&input)?)?,
            Request::AssistantsUpdate(a) => json(self.update_assistant(&a.id, &a.patch)?)?,
            Request::AssistantsUpdateMetrics(a) => {
                json(self.update_assistant_metrics(&a.id, &a.metrics)?)?
            }
            Request::AssistantsDelete(a) => json(self.delete_assistant(&a.id)?)?,
            Request::AssistantsStats(_) => json(self.assistant_stats()?)?,
            Request::AssistantsTop(a) => json(self.top_assistants(a.limit)?)?,

            Request::ConversationsGetById(a) => json(self.get_conversation(&a.id)?)?,
            Request::ConversationsList(a) => json(self.list_conversations(&a.filter, a.limit)?)?,
            Request::ConversationsGetByExternalUser(a) => json(self.get_conversation_by_external_user(
                &a.external_user_id,
                a.platform,
                a.assistant_id.as_deref(),
            )?)?,
            Request::ConversationsCreate(input) => json(self.create_conversation(&input)?)?,
            Request::ConversationsUpdate(a) => json(self.update_conversation(&a.id, &a.patch)?)?,
            Request::ConversationsTouchActivity(a) => json(self.touch_conversation(&a.id)?)?,
            Request::ConversationsStats(a) => {
                json(self.conversation_stats(a.assistant_id.as_deref(), a.time_range)?)?
            }
            Request::ConversationsRecent(a) => {
                json(self.recent_conversations(a.limit, a.assistant_id.as_deref())?)?
            }

            Request::MessagesGetById(a) => json(self.get_message(&a.id)?)?,
            Request::MessagesListByConversation(a) => {
                json(self.list_messages(&a.conversation_id, a.limit, a.order)?)?
            }
            Request::MessagesListByType(a) => {
                json(self.list_messages_by_type(&a.conversation_id, a.content_type, a.limit)?)?
            }
            Request::MessagesListBySender(a) => {
                json(self.list_messages_by_sender(&a.conversation_id, a.sender, a.limit)?)?
            }
            Request::MessagesCreate(input) => json(self.create_message(&input)?)?,
            Request::MessagesUpdateStatus(a) => json(self.update_message_status(
                &a.id,
                a.status,
                a.error.as_deref(),
                a.external_id.as_deref(),
            )?)?,
            Request::MessagesMarkAllRead(a) => json(
                self.mark_all_read(&a.conversation_id, a.up_to_message_id.as_deref())?,
            )?,
            Request::MessagesDelete(a) => json(self.delete_message(&a.id, a.delete_for_everyone)?)?,
            Request::MessagesStats(a) => json(self.message_stats(
                a.conversation_id.as_deref(),
                a.assistant_id.as_deref(),
                a.time_range,
            )?)?,
            Request::MessagesSearch(a) => json(self.search_messages(
                a.conversation_id.as_deref(),
                &a.search_term,
                a.limit,
            )?)?,
            Request::MessagesGetContext(a) => {
                json(self.message_context(&a.conversation_id, a.limit, a.include_system)?)?
            }
        };

        Ok(value)
    }
}

fn json<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}
