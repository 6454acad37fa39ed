// ABOUTME: Core data models for users, conversations, messages and audit entries
// ABOUTME: Shared by the store, the relay and the HTTP layer with camelCase JSON shapes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Data Models
//!
//! Records persisted by the [`crate::database`] layer and returned by the
//! HTTP routes. JSON field names follow the mobile client's camelCase
//! convention.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::constants::defaults;
use crate::errors::AppError;
use crate::llm::catalog;

// ============================================================================
// Ownership
// ============================================================================

/// Who owns a conversation.
///
/// Anonymous conversations have no owner to query by, so they can never be
/// listed; they stay reachable only through the id the client holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// A registered user
    Authenticated(Uuid),
    /// An unauthenticated caller
    Anonymous,
}

impl Owner {
    /// The owning user id, if any
    #[must_use]
    pub const fn user_id(self) -> Option<Uuid> {
        match self {
            Self::Authenticated(id) => Some(id),
            Self::Anonymous => None,
        }
    }

    /// Whether the caller holds an authenticated session
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Rebuild an owner from the nullable storage column
    #[must_use]
    pub const fn from_user_id(user_id: Option<Uuid>) -> Self {
        match user_id {
            Some(id) => Self::Authenticated(id),
            None => Self::Anonymous,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticated(id) => write!(f, "{id}"),
            Self::Anonymous => f.write_str("anonymous"),
        }
    }
}

impl Serialize for Owner {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.user_id().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Owner {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<Uuid>::deserialize(deserializer).map(Self::from_user_id)
    }
}

// ============================================================================
// Users
// ============================================================================

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular account
    #[default]
    User,
    /// Moderator with access to the admin routes
    Admin,
}

impl UserRole {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(AppError::invalid_input(format!("Unknown role: {other}"))),
        }
    }
}

/// Registered account
#[derive(Debug, Clone)]
pub struct User {
    /// Unique identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Lowercased, unique email
    pub email: String,
    /// bcrypt hash of the password
    pub password_hash: String,
    /// Avatar URL
    pub avatar: Option<String>,
    /// Account role
    pub role: UserRole,
    /// Moderation flag; banned users cannot authenticate
    pub is_banned: bool,
    /// Model preselected for new conversations
    pub preferred_model: String,
    /// Last successful login
    pub last_login: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last profile change
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a fresh account; `email` must already be normalized
    #[must_use]
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            avatar: None,
            role: UserRole::User,
            is_banned: false,
            preferred_model: catalog::DEFAULT_MODEL.to_owned(),
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the account may use the admin routes
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Public view of a user (never carries the password hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Unique identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Email
    pub email: String,
    /// Avatar URL
    pub avatar: Option<String>,
    /// Account role
    pub role: UserRole,
    /// Preferred model id
    pub preferred_model: String,
    /// Moderation flag
    pub is_banned: bool,
    /// Last successful login
    pub last_login: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last profile change
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
            role: user.role,
            preferred_model: user.preferred_model.clone(),
            is_banned: user.is_banned,
            last_login: user.last_login,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Fields a user may change on their own profile
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    /// New display name
    pub name: Option<String>,
    /// New avatar URL; an empty string clears it
    pub avatar: Option<String>,
    /// New preferred model
    pub preferred_model: Option<String>,
}

// ============================================================================
// Conversations & messages
// ============================================================================

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction
    System,
    /// Human turn
    User,
    /// Model turn
    Assistant,
}

impl MessageRole {
    /// Storage and wire representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl FromStr for MessageRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(AppError::database(format!("Unknown message role: {other}"))),
        }
    }
}

/// Advisory token bookkeeping for a message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    /// Prompt tokens
    pub prompt: u32,
    /// Completion tokens
    pub completion: u32,
}

/// A titled thread of messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique identifier
    pub id: Uuid,
    /// Owner (`null` in JSON for anonymous threads)
    #[serde(rename = "user")]
    pub owner: Owner,
    /// Title; starts as the placeholder until title inference replaces it
    pub title: String,
    /// Selected model id
    pub model: String,
    /// Denormalized number of persisted messages
    pub message_count: i64,
    /// Time of the last appended message
    pub last_message_at: DateTime<Utc>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last change to any field
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Build a new empty conversation
    #[must_use]
    pub fn new(owner: Owner, model: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner,
            title: defaults::CHAT_TITLE.to_owned(),
            model,
            message_count: 0,
            last_message_at: now,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One immutable entry in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique identifier
    pub id: Uuid,
    /// Parent conversation
    #[serde(rename = "chat")]
    pub conversation_id: Uuid,
    /// Author
    pub role: MessageRole,
    /// Text content
    pub content: String,
    /// Model that produced the message; set only for assistant messages
    pub model: Option<String>,
    /// Token bookkeeping
    pub tokens: TokenCounts,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Conversation with its ordered history, as returned by `GET /api/chat/:id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationWithMessages {
    /// The conversation itself
    #[serde(flatten)]
    pub conversation: Conversation,
    /// Messages in creation order
    pub messages: Vec<Message>,
}

// ============================================================================
// Audit
// ============================================================================

/// Audited account actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    /// Account created
    Register,
    /// Successful login
    Login,
    /// Password changed
    PasswordChange,
    /// Profile fields changed
    ProfileUpdate,
    /// Moderator changed ban flag or role
    ModerationUpdate,
}

impl ActivityAction {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Login => "login",
            Self::PasswordChange => "password_change",
            Self::ProfileUpdate => "profile_update",
            Self::ModerationUpdate => "moderation_update",
        }
    }
}

impl FromStr for ActivityAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "register" => Ok(Self::Register),
            "login" => Ok(Self::Login),
            "password_change" => Ok(Self::PasswordChange),
            "profile_update" => Ok(Self::ProfileUpdate),
            "moderation_update" => Ok(Self::ModerationUpdate),
            other => Err(AppError::database(format!("Unknown activity action: {other}"))),
        }
    }
}

/// Where a request came from, for the audit trail
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    /// Caller address, taken from `x-forwarded-for` when present
    pub ip_address: Option<String>,
    /// `User-Agent` header
    pub user_agent: Option<String>,
}

/// Append-only audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    /// Unique identifier
    pub id: Uuid,
    /// Acting user
    pub user_id: Option<Uuid>,
    /// What happened
    pub action: ActivityAction,
    /// Free-form details
    pub details: serde_json::Value,
    /// Caller address
    pub ip_address: Option<String>,
    /// Caller user agent
    pub user_agent: Option<String>,
    /// When it happened
    pub created_at: DateTime<Utc>,
}
