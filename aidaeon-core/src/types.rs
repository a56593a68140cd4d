//! Core domain types for aidaeon
//!
//! These types describe the documents held in the store and the argument,
//! patch and statistics objects the handlers exchange with callers.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **User** | A platform account (admin, regular user or human agent) |
//! | **Assistant** | A configured AI assistant serving one or more channels |
//! | **Conversation** | An exchange between an assistant and a user or external contact on one platform |
//! | **Message** | A single entry in a conversation |
//! | **External user** | A contact known only by a channel identifier (WhatsApp number, Telegram id) |
//!
//! Field names serialize in camelCase, which is also the argument naming used
//! by the [`crate::api`] request envelope.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Language assigned to new users.
pub const DEFAULT_LANGUAGE: &str = "pt-BR";

/// Content that replaces a message body when it is deleted only for the sender.
pub const DELETED_MESSAGE_PLACEHOLDER: &str = "Esta mensagem foi apagada";

/// Window used by [`UserStats::recent_logins`].
pub const RECENT_LOGIN_WINDOW_DAYS: i64 = 7;

/// Declares a closed set of string-valued states with the storage/wire
/// identifier of each variant.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($kind:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $s:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $s)] $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the identifier used in storage and on the wire
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $s ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $s => Ok($name::$variant), )+
                    _ => Err(format!(concat!("unknown ", $kind, ": {}"), s)),
                }
            }
        }
    };
}

// ============================================
// Shared
// ============================================

string_enum! {
    /// Relative window used to bucket statistics queries
    pub enum TimeRange ("time range") {
        /// Last 24 hours
        Today => "today",
        /// Last 7 days
        Week => "week",
        /// Last 30 days
        Month => "month",
        /// No filter
        All => "all",
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        TimeRange::All
    }
}

impl TimeRange {
    /// Earliest instant included in the window, or `None` for [`TimeRange::All`]
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeRange::Today => Some(now - Duration::hours(24)),
            TimeRange::Week => Some(now - Duration::days(7)),
            TimeRange::Month => Some(now - Duration::days(30)),
            TimeRange::All => None,
        }
    }

    /// Whether `ts` falls inside the window ending at `now`
    pub fn contains(&self, ts: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.cutoff(now).map_or(true, |cutoff| ts >= cutoff)
    }
}

string_enum! {
    /// Ordering for timestamp range scans
    pub enum SortOrder ("sort order") {
        Asc => "asc",
        Desc => "desc",
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Asc
    }
}

impl SortOrder {
    pub(crate) fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Generates a new document identifier
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================
// Users
// ============================================

string_enum! {
    pub enum UserRole ("user role") {
        Admin => "admin",
        User => "user",
        Agent => "agent",
    }
}

string_enum! {
    /// Account state. `Inactive` doubles as the soft-deleted state.
    pub enum UserStatus ("user status") {
        Active => "active",
        Inactive => "inactive",
        Suspended => "suspended",
    }
}

string_enum! {
    pub enum Theme ("theme") {
        Light => "light",
        Dark => "dark",
        System => "system",
    }
}

/// Per-channel notification switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub email: bool,
    pub push: bool,
    pub sms: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: true,
            push: true,
            sms: false,
        }
    }
}

/// User-facing preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub theme: Theme,
    pub notifications: NotificationPreferences,
    pub language: String,
}

impl Default for UserPreferences {
    /// Preferences assigned to every new user
    fn default() -> Self {
        Self {
            theme: Theme::System,
            notifications: NotificationPreferences::default(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// Bookkeeping timestamps of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserMetadata {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A platform account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub creation_time: DateTime<Utc>,
    /// Unique business key, checked by the handler before insert
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub preferences: UserPreferences,
    pub metadata: UserMetadata,
}

/// Arguments for creating a user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: UserRole,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

/// Partial update of a user. Email is the business key and cannot be patched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub preferences: Option<UserPreferences>,
}

/// Listing filter for users. Only one dimension drives the scan, see
/// [`crate::Database::list_users`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCounts {
    pub admin: u64,
    pub user: u64,
    pub agent: u64,
}

/// Aggregates over every user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub suspended: u64,
    pub by_role: RoleCounts,
    /// Users whose last login is within [`RECENT_LOGIN_WINDOW_DAYS`]
    pub recent_logins: u64,
}

// ============================================
// Assistants
// ============================================

string_enum! {
    pub enum AssistantStatus ("assistant status") {
        Active => "active",
        Inactive => "inactive",
        Training => "training",
    }
}

string_enum! {
    pub enum AssistantType ("assistant type") {
        CustomerService => "customer_service",
        Sales => "sales",
        Support => "support",
        General => "general",
    }
}

/// Model and behaviour settings of an assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssistantConfiguration {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub system_prompt: String,
    /// Knowledge base document ids
    pub knowledge_base: Vec<String>,
    pub capabilities: Vec<String>,
}

impl Default for AssistantConfiguration {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            system_prompt: String::new(),
            knowledge_base: Vec::new(),
            capabilities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppIntegration {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramIntegration {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebchatIntegration {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_id: Option<String>,
}

/// Channel integrations. The default has every channel disabled, which is
/// what new assistants get when the caller supplies none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Integrations {
    pub whatsapp: WhatsAppIntegration,
    pub telegram: TelegramIntegration,
    pub webchat: WebchatIntegration,
}

/// Usage counters of an assistant. Starts zeroed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssistantMetrics {
    pub total_conversations: u64,
    pub total_messages: u64,
    pub active_users: u64,
    pub success_rate: f64,
    /// Milliseconds
    pub average_response_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
}

/// Absolute metric values to merge over the stored ones
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsUpdate {
    pub total_conversations: Option<u64>,
    pub total_messages: Option<u64>,
    pub active_users: Option<u64>,
    pub success_rate: Option<f64>,
    pub average_response_time: Option<f64>,
}

impl AssistantMetrics {
    /// Overwrite the supplied fields and stamp `last_activity`
    pub fn merge(&mut self, update: &MetricsUpdate, now: DateTime<Utc>) {
        if let Some(v) = update.total_conversations {
            self.total_conversations = v;
        }
        if let Some(v) = update.total_messages {
            self.total_messages = v;
        }
        if let Some(v) = update.active_users {
            self.active_users = v;
        }
        if let Some(v) = update.success_rate {
            self.success_rate = v;
        }
        if let Some(v) = update.average_response_time {
            self.average_response_time = v;
        }
        self.last_activity = Some(now);
    }
}

/// A configured AI assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assistant {
    pub id: String,
    pub creation_time: DateTime<Utc>,
    pub name: String,
    pub description: String,
    pub status: AssistantStatus,
    #[serde(rename = "type")]
    pub assistant_type: AssistantType,
    pub configuration: AssistantConfiguration,
    pub integrations: Integrations,
    pub metrics: AssistantMetrics,
    /// User id of the creator
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Arguments for creating an assistant.
///
/// `status` is accepted for payload compatibility but never honoured: new
/// assistants are always stored as [`AssistantStatus::Inactive`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssistant {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub assistant_type: AssistantType,
    #[serde(default)]
    pub configuration: AssistantConfiguration,
    #[serde(default)]
    pub integrations: Option<Integrations>,
    pub created_by: String,
    #[serde(default)]
    pub status: Option<AssistantStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssistantPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<AssistantStatus>,
    #[serde(rename = "type")]
    pub assistant_type: Option<AssistantType>,
    pub configuration: Option<AssistantConfiguration>,
    pub integrations: Option<Integrations>,
}

/// Listing filter for assistants (status, then type, then creator)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssistantFilter {
    pub status: Option<AssistantStatus>,
    #[serde(rename = "type")]
    pub assistant_type: Option<AssistantType>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantTypeCounts {
    pub customer_service: u64,
    pub sales: u64,
    pub support: u64,
    pub general: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantStats {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub training: u64,
    pub by_type: AssistantTypeCounts,
    pub total_conversations: u64,
    pub total_messages: u64,
    /// Mean of `metrics.successRate` over all assistants
    pub average_success_rate: f64,
    /// Mean of `metrics.averageResponseTime` over all assistants
    pub average_response_time: f64,
}

// ============================================
// Conversations
// ============================================

string_enum! {
    pub enum Platform ("platform") {
        WhatsApp => "whatsapp",
        Telegram => "telegram",
        Webchat => "webchat",
        Api => "api",
    }
}

string_enum! {
    /// Conversation lifecycle. Everything except `Active` is terminal.
    pub enum ConversationStatus ("conversation status") {
        Active => "active",
        Completed => "completed",
        Abandoned => "abandoned",
        Transferred => "transferred",
    }
}

string_enum! {
    pub enum Priority ("priority") {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// Contact details captured from the channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// How the contact reached the assistant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Acquisition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

/// Outcome recorded when a conversation is closed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resolution {
    pub resolved: bool,
    /// 1-5 rating
    #[serde(skip_serializing_if = "Option::is_none")]
    pub satisfaction: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquisition: Option<Acquisition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

impl ConversationMetadata {
    pub fn is_resolved(&self) -> bool {
        self.resolution.as_ref().map_or(false, |r| r.resolved)
    }
}

/// An exchange between an assistant and one contact on one platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub creation_time: DateTime<Utc>,
    pub assistant_id: String,
    pub user_id: Option<String>,
    pub external_user_id: Option<String>,
    pub platform: Platform,
    pub status: ConversationStatus,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub metadata: ConversationMetadata,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Set once, when the status first leaves `active`
    pub ended_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// Elapsed time between start and end, for ended conversations
    pub fn duration(&self) -> Option<Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConversation {
    pub assistant_id: String,
    pub platform: Platform,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub external_user_id: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: ConversationMetadata,
}

impl NewConversation {
    pub fn new(assistant_id: impl Into<String>, platform: Platform) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            platform,
            user_id: None,
            external_user_id: None,
            priority: Priority::default(),
            tags: Vec::new(),
            metadata: ConversationMetadata::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationPatch {
    pub status: Option<ConversationStatus>,
    pub priority: Option<Priority>,
    pub user_id: Option<String>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<ConversationMetadata>,
}

/// Listing filter for conversations.
///
/// Precedence for the driving index: `assistant_id`, `user_id`, `platform`,
/// `status`. The remaining fields, `priority` included, are not applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationFilter {
    pub assistant_id: Option<String>,
    pub user_id: Option<String>,
    pub platform: Option<Platform>,
    pub status: Option<ConversationStatus>,
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCounts {
    pub whatsapp: u64,
    pub telegram: u64,
    pub webchat: u64,
    pub api: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityCounts {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub urgent: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStats {
    pub total: u64,
    pub active: u64,
    pub completed: u64,
    pub abandoned: u64,
    pub transferred: u64,
    pub by_platform: PlatformCounts,
    pub by_priority: PriorityCounts,
    /// Conversations whose resolution is marked resolved
    pub resolved: u64,
    /// Mean `endedAt - startedAt` in milliseconds over ended conversations
    pub average_duration: f64,
}

// ============================================
// Messages
// ============================================

string_enum! {
    pub enum MessageSender ("message sender") {
        User => "user",
        Assistant => "assistant",
        System => "system",
    }
}

string_enum! {
    pub enum ContentType ("content type") {
        Text => "text",
        Image => "image",
        Audio => "audio",
        Video => "video",
        Document => "document",
        Location => "location",
        Contact => "contact",
        System => "system",
    }
}

string_enum! {
    /// Delivery ladder: sent, delivered, read. `Failed` branches off `Sent`.
    pub enum MessageStatus ("message status") {
        Sent => "sent",
        Delivered => "delivered",
        Read => "read",
        Failed => "failed",
    }
}

impl MessageStatus {
    /// Whether moving from `self` to `next` follows the delivery ladder
    pub fn is_forward(&self, next: MessageStatus) -> bool {
        use MessageStatus::*;
        matches!(
            (self, next),
            (Sent, Delivered) | (Sent, Read) | (Sent, Failed) | (Delivered, Read)
        ) || *self == next
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaInfo {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Seconds, for audio and video
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactCard {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Generation statistics for assistant-authored messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiGeneration {
    pub model: String,
    pub tokens_used: u64,
    pub processing_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Last delivery report from the channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryInfo {
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<ContactCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai: Option<AiGeneration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryInfo>,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A single entry in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub creation_time: DateTime<Utc>,
    pub conversation_id: String,
    pub sender: MessageSender,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub content: String,
    pub metadata: MessageMetadata,
    pub reply_to: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub conversation_id: String,
    pub sender: MessageSender,
    #[serde(rename = "type", default = "default_content_type")]
    pub content_type: ContentType,
    pub content: String,
    #[serde(default)]
    pub metadata: Option<MessageMetadata>,
    #[serde(default)]
    pub reply_to: Option<String>,
}

fn default_content_type() -> ContentType {
    ContentType::Text
}

impl NewMessage {
    /// A plain text message
    pub fn text(
        conversation_id: impl Into<String>,
        sender: MessageSender,
        content: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            sender,
            content_type: ContentType::Text,
            content: content.into(),
            metadata: None,
            reply_to: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderCounts {
    pub user: u64,
    pub assistant: u64,
    pub system: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub sent: u64,
    pub delivered: u64,
    pub read: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStats {
    pub total: u64,
    pub by_sender: SenderCounts,
    pub by_type: BTreeMap<ContentType, u64>,
    pub by_status: StatusCounts,
    /// Mean delay in milliseconds between a user message and the next
    /// assistant reply in the same conversation
    pub average_response_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_enum_round_trip_names() {
        assert_eq!(AssistantType::CustomerService.as_str(), "customer_service");
        assert_eq!(
            "customer_service".parse::<AssistantType>().unwrap(),
            AssistantType::CustomerService
        );
        assert_eq!(Platform::WhatsApp.to_string(), "whatsapp");
        assert!("fax".parse::<Platform>().is_err());
        assert_eq!(
            serde_json::to_value(ConversationStatus::Transferred).unwrap(),
            serde_json::json!("transferred")
        );
    }

    #[test]
    fn test_default_user_preferences() {
        let prefs = UserPreferences::default();
        assert_eq!(prefs.theme, Theme::System);
        assert!(prefs.notifications.email);
        assert!(prefs.notifications.push);
        assert!(!prefs.notifications.sms);
        assert_eq!(prefs.language, "pt-BR");
    }

    #[test]
    fn test_default_integrations_disabled() {
        let integrations = Integrations::default();
        assert!(!integrations.whatsapp.enabled);
        assert!(!integrations.telegram.enabled);
        assert!(!integrations.webchat.enabled);
        assert_eq!(
            serde_json::to_value(&integrations).unwrap(),
            serde_json::json!({
                "whatsapp": {"enabled": false},
                "telegram": {"enabled": false},
                "webchat": {"enabled": false},
            })
        );
    }

    #[test]
    fn test_metrics_merge_is_partial() {
        let mut metrics = AssistantMetrics {
            total_conversations: 4,
            total_messages: 10,
            success_rate: 0.5,
            ..Default::default()
        };
        let now = Utc::now();
        metrics.merge(
            &MetricsUpdate {
                success_rate: Some(0.9),
                ..Default::default()
            },
            now,
        );
        assert_eq!(metrics.total_conversations, 4);
        assert_eq!(metrics.total_messages, 10);
        assert_eq!(metrics.success_rate, 0.9);
        assert_eq!(metrics.last_activity, Some(now));
    }

    #[test]
    fn test_time_range_cutoff() {
        let now = Utc::now();
        assert!(TimeRange::Today.contains(now - Duration::hours(23), now));
        assert!(!TimeRange::Today.contains(now - Duration::hours(48), now));
        assert!(TimeRange::Week.contains(now - Duration::days(6), now));
        assert!(!TimeRange::Month.contains(now - Duration::days(31), now));
        assert!(TimeRange::All.contains(now - Duration::days(3650), now));
    }

    #[test]
    fn test_message_status_ladder() {
        assert!(MessageStatus::Sent.is_forward(MessageStatus::Delivered));
        assert!(MessageStatus::Delivered.is_forward(MessageStatus::Read));
        assert!(MessageStatus::Sent.is_forward(MessageStatus::Failed));
        assert!(!MessageStatus::Read.is_forward(MessageStatus::Delivered));
        assert!(!MessageStatus::Delivered.is_forward(MessageStatus::Failed));
    }

    #[test]
    fn test_new_assistant_accepts_partial_configuration() {
        let input: NewAssistant = serde_json::from_value(serde_json::json!({
            "name": "Ana",
            "type": "sales",
            "createdBy": "user-1",
            "configuration": {"model": "gpt-4o"},
        }))
        .unwrap();
        assert_eq!(input.configuration.model, "gpt-4o");
        assert_eq!(input.configuration.max_tokens, 1000);
        assert!(input.integrations.is_none());
        assert!(input.status.is_none());
    }
}
