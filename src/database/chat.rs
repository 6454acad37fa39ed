// ABOUTME: Conversation store for chat threads and their messages
// ABOUTME: Every read and delete is scoped by owner, with anonymous threads addressable only by id
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};
use crate::constants::{limits, messages};
use crate::errors::{AppError, AppResult};
use crate::models::{Conversation, Message, MessageRole, Owner, TokenCounts};

const CONVERSATION_COLUMNS: &str =
    "id, user_id, title, model, message_count, last_message_at, created_at, updated_at";

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, role, content, model, prompt_tokens, completion_tokens, created_at";

/// Pagination for conversation listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    /// Page size, clamped to `1..=MAX_CHAT_LIST_LIMIT`
    pub limit: u32,
    /// Rows to skip
    pub offset: u32,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: limits::DEFAULT_CHAT_LIST_LIMIT,
            offset: 0,
        }
    }
}

impl ListOptions {
    /// Build options from optional query values
    #[must_use]
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit
                .unwrap_or(limits::DEFAULT_CHAT_LIST_LIMIT)
                .clamp(1, limits::MAX_CHAT_LIST_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

// ============================================================================
// Chat Manager
// ============================================================================

/// Chat database operations manager
#[derive(Clone)]
pub struct ChatManager {
    pool: SqlitePool,
}

impl ChatManager {
    /// Create a new chat manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Conversation Operations
    // ========================================================================

    /// Create a new conversation with the placeholder title and no messages
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn create(&self, owner: Owner, model: &str) -> AppResult<Conversation> {
        let conversation = Conversation::new(owner, model.to_owned());

        sqlx::query(
            r"
            INSERT INTO chat_conversations
                (id, user_id, title, model, message_count, last_message_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 0, $5, $6, $7)
            ",
        )
        .bind(conversation.id.to_string())
        .bind(owner.user_id().map(|id| id.to_string()))
        .bind(&conversation.title)
        .bind(&conversation.model)
        .bind(format_timestamp(conversation.last_message_at))
        .bind(format_timestamp(conversation.created_at))
        .bind(format_timestamp(conversation.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversation: {e}")))?;

        debug!(conversation_id = %conversation.id, %owner, "Created conversation");
        Ok(conversation)
    }

    /// List an owner's conversations, most recently active first
    ///
    /// Anonymous callers always get an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn list(&self, owner: Owner, options: ListOptions) -> AppResult<Vec<Conversation>> {
        let Owner::Authenticated(user_id) = owner else {
            return Ok(Vec::new());
        };

        let query = format!(
            r"
            SELECT {CONVERSATION_COLUMNS} FROM chat_conversations
            WHERE user_id = $1
            ORDER BY last_message_at DESC, created_at DESC
            LIMIT $2 OFFSET $3
            "
        );

        let rows = sqlx::query(&query)
            .bind(user_id.to_string())
            .bind(i64::from(options.limit))
            .bind(i64::from(options.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list conversations: {e}")))?;

        rows.iter().map(Self::row_to_conversation).collect()
    }

    /// Get a conversation under a strict ownership match
    ///
    /// An authenticated caller never sees an anonymous conversation and an
    /// anonymous caller never sees an owned one.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn get(
        &self,
        conversation_id: Uuid,
        owner: Owner,
    ) -> AppResult<Option<Conversation>> {
        let row = match owner {
            Owner::Authenticated(user_id) => {
                let query = format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM chat_conversations WHERE id = $1 AND user_id = $2"
                );
                sqlx::query(&query)
                    .bind(conversation_id.to_string())
                    .bind(user_id.to_string())
                    .fetch_optional(&self.pool)
                    .await
            }
            Owner::Anonymous => {
                let query = format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM chat_conversations WHERE id = $1 AND user_id IS NULL"
                );
                sqlx::query(&query)
                    .bind(conversation_id.to_string())
                    .fetch_optional(&self.pool)
                    .await
            }
        }
        .map_err(|e| AppError::database(format!("Failed to get conversation: {e}")))?;

        row.as_ref().map(Self::row_to_conversation).transpose()
    }

    /// Replace the conversation title, truncated to the maximum length
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn update_title(&self, conversation_id: Uuid, title: &str) -> AppResult<bool> {
        let title: String = title.chars().take(limits::TITLE_MAX_CHARS).collect();

        let result =
            sqlx::query("UPDATE chat_conversations SET title = $2, updated_at = $3 WHERE id = $1")
                .bind(conversation_id.to_string())
                .bind(&title)
                .bind(format_timestamp(Utc::now()))
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to update title: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a conversation after deleting all of its messages
    ///
    /// Returns false if the conversation does not exist for this owner.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn delete(&self, conversation_id: Uuid, owner: Owner) -> AppResult<bool> {
        if self.get(conversation_id, owner).await?.is_none() {
            return Ok(false);
        }

        let id = conversation_id.to_string();
        sqlx::query("DELETE FROM chat_messages WHERE conversation_id = $1")
            .bind(&id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete messages: {e}")))?;

        let result = sqlx::query("DELETE FROM chat_conversations WHERE id = $1")
            .bind(&id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete conversation: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every conversation of a user with their messages
    ///
    /// Returns the number of conversations removed.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn clear_all(&self, user_id: Uuid) -> AppResult<u64> {
        let id = user_id.to_string();

        sqlx::query(
            r"
            DELETE FROM chat_messages WHERE conversation_id IN
                (SELECT id FROM chat_conversations WHERE user_id = $1)
            ",
        )
        .bind(&id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to delete messages: {e}")))?;

        let result = sqlx::query("DELETE FROM chat_conversations WHERE user_id = $1")
            .bind(&id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete conversations: {e}")))?;

        Ok(result.rows_affected())
    }

    // ========================================================================
    // Message Operations
    // ========================================================================

    /// Append a message, then bump the conversation's counter and activity time
    ///
    /// The two writes are not wrapped in a transaction; the counter is
    /// advisory and a crash between them only leaves it one short.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the conversation does not exist, or a
    /// database error if either write fails
    pub async fn append_message(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
        model: Option<&str>,
        tokens: TokenCounts,
    ) -> AppResult<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            role,
            content: content.to_owned(),
            model: model.map(ToOwned::to_owned),
            tokens,
            created_at: Utc::now(),
        };
        let created_at = format_timestamp(message.created_at);

        let inserted = sqlx::query(
            r"
            INSERT INTO chat_messages
                (id, conversation_id, role, content, model, prompt_tokens, completion_tokens, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(message.id.to_string())
        .bind(conversation_id.to_string())
        .bind(role.as_str())
        .bind(&message.content)
        .bind(&message.model)
        .bind(i64::from(tokens.prompt))
        .bind(i64::from(tokens.completion))
        .bind(&created_at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
                return Err(AppError::not_found(messages::CHAT_NOT_FOUND));
            }
            Err(e) => return Err(AppError::database(format!("Failed to add message: {e}"))),
        }

        sqlx::query(
            r"
            UPDATE chat_conversations
            SET message_count = message_count + 1, last_message_at = $2, updated_at = $2
            WHERE id = $1
            ",
        )
        .bind(conversation_id.to_string())
        .bind(&created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update conversation counters: {e}")))?;

        Ok(message)
    }

    /// Get the full ordered history of a conversation
    ///
    /// Sorted by creation time ascending with insertion order as tie-break.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn get_messages(&self, conversation_id: Uuid) -> AppResult<Vec<Message>> {
        let query = format!(
            r"
            SELECT {MESSAGE_COLUMNS} FROM chat_messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC, rowid ASC
            "
        );

        let rows = sqlx::query(&query)
            .bind(conversation_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get messages: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    /// Get the newest `limit` messages of a conversation, oldest first
    ///
    /// Used to bound the prompt sent upstream; the latest message is always
    /// the last element.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn recent_messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<Message>> {
        let query = format!(
            r"
            SELECT {MESSAGE_COLUMNS} FROM chat_messages
            WHERE conversation_id = $1
            ORDER BY created_at DESC, rowid DESC
            LIMIT $2
            "
        );

        let rows = sqlx::query(&query)
            .bind(conversation_id.to_string())
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get recent messages: {e}")))?;

        let mut messages = rows
            .iter()
            .map(Self::row_to_message)
            .collect::<AppResult<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    /// Count persisted messages of a conversation
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn count_messages(&self, conversation_id: Uuid) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages WHERE conversation_id = $1")
            .bind(conversation_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count messages: {e}")))
    }

    // ========================================================================
    // Row mapping
    // ========================================================================

    fn row_to_conversation(row: &SqliteRow) -> AppResult<Conversation> {
        let id: String = row.get("id");
        let user_id: Option<String> = row.get("user_id");
        let last_message_at: String = row.get("last_message_at");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");

        Ok(Conversation {
            id: parse_uuid(&id)?,
            owner: Owner::from_user_id(user_id.as_deref().map(parse_uuid).transpose()?),
            title: row.get("title"),
            model: row.get("model"),
            message_count: row.get("message_count"),
            last_message_at: parse_timestamp(&last_message_at)?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    fn row_to_message(row: &SqliteRow) -> AppResult<Message> {
        let id: String = row.get("id");
        let conversation_id: String = row.get("conversation_id");
        let role: String = row.get("role");
        let prompt_tokens: i64 = row.get("prompt_tokens");
        let completion_tokens: i64 = row.get("completion_tokens");
        let created_at: String = row.get("created_at");

        Ok(Message {
            id: parse_uuid(&id)?,
            conversation_id: parse_uuid(&conversation_id)?,
            role: role.parse()?,
            content: row.get("content"),
            model: row.get("model"),
            tokens: TokenCounts {
                prompt: parse_token_count(prompt_tokens)?,
                completion: parse_token_count(completion_tokens)?,
            },
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

fn parse_token_count(value: i64) -> AppResult<u32> {
    u32::try_from(value)
        .map_err(|e| AppError::database(format!("Invalid token count {value}: {e}")))
}
