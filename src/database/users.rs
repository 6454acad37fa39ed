// ABOUTME: User account database operations
// ABOUTME: Handles registration storage, lookups, profile and moderation updates and account deletion
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid, Database};
use crate::constants::messages;
use crate::errors::{AppError, AppResult};
use crate::models::{User, UserRole};

const USER_COLUMNS: &str = "id, name, email, password_hash, avatar, role, is_banned, \
                            preferred_model, last_login, created_at, updated_at";

impl Database {
    /// Create the users table
    ///
    /// # Errors
    ///
    /// Returns an error if table or index creation fails
    pub(super) async fn migrate_users(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                avatar TEXT,
                role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
                is_banned INTEGER NOT NULL DEFAULT 0,
                preferred_model TEXT NOT NULL,
                last_login TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create users table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to create users index: {e}")))?;

        Ok(())
    }

    /// Insert a new user
    ///
    /// # Errors
    ///
    /// Returns `ResourceAlreadyExists` if the email is taken, or a database
    /// error if the insert fails for another reason
    pub async fn create_user(&self, user: &User) -> AppResult<()> {
        let result = sqlx::query(
            r"
            INSERT INTO users (id, name, email, password_hash, avatar, role, is_banned,
                               preferred_model, last_login, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.avatar)
        .bind(user.role.as_str())
        .bind(user.is_banned)
        .bind(&user.preferred_model)
        .bind(user.last_login.map(format_timestamp))
        .bind(format_timestamp(user.created_at))
        .bind(format_timestamp(user.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(AppError::already_exists(messages::EMAIL_TAKEN))
            }
            Err(e) => Err(AppError::database(format!("Failed to create user: {e}"))),
        }
    }

    /// Get a user by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        self.get_user_impl("id", &user_id.to_string()).await
    }

    /// Get a user by (already normalized) email
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.get_user_impl("email", email).await
    }

    async fn get_user_impl(&self, field: &str, value: &str) -> AppResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {field} = $1");

        let row = sqlx::query(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get user: {e}")))?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    fn row_to_user(row: &SqliteRow) -> AppResult<User> {
        let id: String = row.get("id");
        let role: String = row.get("role");
        let last_login: Option<String> = row.get("last_login");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");

        Ok(User {
            id: parse_uuid(&id)?,
            name: row.get("name"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            avatar: row.get("avatar"),
            role: role.parse()?,
            is_banned: row.get("is_banned"),
            preferred_model: row.get("preferred_model"),
            last_login: last_login.as_deref().map(parse_timestamp).transpose()?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    /// Record a successful login
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn update_last_login(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(user_id.to_string())
            .bind(format_timestamp(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to update last login: {e}")))?;
        Ok(())
    }

    /// Persist profile fields of `user` (name, avatar, preferred model)
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the user no longer exists, or a
    /// database error if the update fails
    pub async fn update_user_profile(&self, user: &User) -> AppResult<()> {
        let result = sqlx::query(
            r"
            UPDATE users SET name = $2, avatar = $3, preferred_model = $4, updated_at = $5
            WHERE id = $1
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.avatar)
        .bind(&user.preferred_model)
        .bind(format_timestamp(user.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update profile: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(messages::USER_NOT_FOUND));
        }
        Ok(())
    }

    /// Replace a user's password hash
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(user_id.to_string())
            .bind(password_hash)
            .bind(format_timestamp(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to update password: {e}")))?;
        Ok(())
    }

    /// Apply a moderation change; fields left as `None` are kept
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn update_user_moderation(
        &self,
        user_id: Uuid,
        is_banned: Option<bool>,
        role: Option<UserRole>,
    ) -> AppResult<Option<User>> {
        sqlx::query(
            r"
            UPDATE users SET
                is_banned = COALESCE($2, is_banned),
                role = COALESCE($3, role),
                updated_at = $4
            WHERE id = $1
            ",
        )
        .bind(user_id.to_string())
        .bind(is_banned)
        .bind(role.map(UserRole::as_str))
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update user moderation: {e}")))?;

        self.get_user(user_id).await
    }

    /// Delete a user together with their conversations and messages
    ///
    /// Returns false if the user did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the deletes fail; the deletion is
    /// transactional so a failure leaves the account intact
    pub async fn delete_user(&self, user_id: Uuid) -> AppResult<bool> {
        let id = user_id.to_string();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        sqlx::query(
            r"
            DELETE FROM chat_messages WHERE conversation_id IN
                (SELECT id FROM chat_conversations WHERE user_id = $1)
            ",
        )
        .bind(&id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to delete user messages: {e}")))?;

        sqlx::query("DELETE FROM chat_conversations WHERE user_id = $1")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete user chats: {e}")))?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete user: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit user deletion: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}
