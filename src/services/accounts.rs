// ABOUTME: Account lifecycle service: registration, login, profile, password and moderation
// ABOUTME: Normalizes credentials, hashes passwords and writes audit entries for account actions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{hash_password, verify_password, AuthManager};
use crate::constants::{limits, messages};
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::llm::catalog;
use crate::models::{
    ActivityAction, ActivityLogEntry, ClientInfo, ProfileUpdate, User, UserProfile, UserRole,
};

/// Registration payload
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Email, any case
    #[serde(default)]
    pub email: String,
    /// Plain-text password
    #[serde(default)]
    pub password: String,
}

/// Login payload
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Email, any case
    #[serde(default)]
    pub email: String,
    /// Plain-text password
    #[serde(default)]
    pub password: String,
}

/// Password change payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    /// Password currently on file
    #[serde(default)]
    pub current_password: String,
    /// Replacement password
    #[serde(default)]
    pub new_password: String,
}

/// Moderator changes to an account
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationUpdate {
    /// Ban or unban
    pub is_banned: Option<bool>,
    /// Promote or demote
    pub role: Option<UserRole>,
}

/// Session issued on registration or login
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    /// The account
    pub user: UserProfile,
    /// Bearer token
    pub token: String,
}

/// Trim and lowercase an email for storage and lookup
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Account operations shared by the auth, user and admin routes
#[derive(Clone)]
pub struct AccountService {
    database: Arc<Database>,
    auth_manager: Arc<AuthManager>,
}

impl AccountService {
    /// Create the service
    #[must_use]
    pub const fn new(database: Arc<Database>, auth_manager: Arc<AuthManager>) -> Self {
        Self {
            database,
            auth_manager,
        }
    }

    /// Create an account and sign it in
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for missing or malformed fields and
    /// `ResourceAlreadyExists` if the email is taken in any letter case
    #[instrument(skip(self, request, client))]
    pub async fn register(
        &self,
        request: RegisterRequest,
        client: &ClientInfo,
    ) -> AppResult<AuthSession> {
        let name = request.name.trim();
        let email = normalize_email(&request.email);
        if name.is_empty() || email.is_empty() || request.password.is_empty() {
            return Err(AppError::invalid_input(
                "Please provide name, email and password",
            ));
        }
        if !email.contains('@') {
            return Err(AppError::invalid_input("Please provide a valid email"));
        }
        validate_password_length(&request.password, "Password")?;

        if self.database.get_user_by_email(&email).await?.is_some() {
            return Err(AppError::already_exists(messages::EMAIL_TAKEN));
        }

        let password_hash = hash_password(request.password).await?;
        let user = User::new(name.to_owned(), email, password_hash);
        self.database.create_user(&user).await?;

        self.audit(user.id, ActivityAction::Register, json!({}), client)
            .await;
        info!(user_id = %user.id, "User registered");

        self.session_for(&user)
    }

    /// Verify credentials and issue a session
    ///
    /// Unknown email and wrong password fail identically. A banned account
    /// is only reported after its password checks out.
    ///
    /// # Errors
    ///
    /// Returns `AuthInvalid` with a uniform message for bad credentials and
    /// `AccountBanned` for banned accounts
    #[instrument(skip(self, request, client))]
    pub async fn login(&self, request: LoginRequest, client: &ClientInfo) -> AppResult<AuthSession> {
        let email = normalize_email(&request.email);
        if email.is_empty() || request.password.is_empty() {
            return Err(AppError::invalid_input("Please provide email and password"));
        }

        let Some(mut user) = self.database.get_user_by_email(&email).await? else {
            return Err(AppError::auth_invalid(messages::INVALID_CREDENTIALS));
        };

        if !verify_password(request.password, user.password_hash.clone()).await? {
            return Err(AppError::auth_invalid(messages::INVALID_CREDENTIALS));
        }

        if user.is_banned {
            warn!(user_id = %user.id, "Login attempt on banned account");
            return Err(AppError::account_banned().with_user_id(user.id));
        }

        self.database.update_last_login(user.id).await?;
        user.last_login = Some(Utc::now());
        self.audit(user.id, ActivityAction::Login, json!({}), client)
            .await;

        self.session_for(&user)
    }

    fn session_for(&self, user: &User) -> AppResult<AuthSession> {
        Ok(AuthSession {
            user: UserProfile::from(user),
            token: self.auth_manager.generate_token(user)?,
        })
    }

    /// Apply profile changes
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an unknown preferred model
    pub async fn update_profile(
        &self,
        user: &User,
        update: ProfileUpdate,
        client: &ClientInfo,
    ) -> AppResult<UserProfile> {
        let mut updated = user.clone();
        if let Some(name) = update.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            name.clone_into(&mut updated.name);
        }
        if let Some(avatar) = update.avatar {
            updated.avatar = Some(avatar).filter(|a| !a.is_empty());
        }
        if let Some(model) = update.preferred_model.filter(|m| !m.is_empty()) {
            catalog::validate_model(&model)?;
            updated.preferred_model = model;
        }
        updated.updated_at = Utc::now();

        self.database.update_user_profile(&updated).await?;
        self.audit(user.id, ActivityAction::ProfileUpdate, json!({}), client)
            .await;
        Ok(UserProfile::from(&updated))
    }

    /// Replace the password after checking the current one
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for missing or short passwords and
    /// `AuthInvalid` if the current password is wrong
    pub async fn change_password(
        &self,
        user: &User,
        change: PasswordChange,
        client: &ClientInfo,
    ) -> AppResult<()> {
        if change.current_password.is_empty() || change.new_password.is_empty() {
            return Err(AppError::invalid_input(
                "Please provide current and new password",
            ));
        }
        validate_password_length(&change.new_password, "New password")?;

        if !verify_password(change.current_password, user.password_hash.clone()).await? {
            return Err(AppError::auth_invalid("Current password is incorrect"));
        }

        let password_hash = hash_password(change.new_password).await?;
        self.database
            .update_password_hash(user.id, &password_hash)
            .await?;
        self.audit(user.id, ActivityAction::PasswordChange, json!({}), client)
            .await;
        Ok(())
    }

    /// Delete the account with its conversations and messages
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the account is already gone
    pub async fn delete_account(&self, user_id: Uuid) -> AppResult<()> {
        if !self.database.delete_user(user_id).await? {
            return Err(AppError::not_found(messages::USER_NOT_FOUND));
        }
        info!(user_id = %user_id, "Account deleted");
        Ok(())
    }

    /// Ban, unban, promote or demote an account
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty update and `ResourceNotFound` for
    /// an unknown user
    pub async fn moderate(
        &self,
        moderator: &User,
        user_id: Uuid,
        update: ModerationUpdate,
        client: &ClientInfo,
    ) -> AppResult<UserProfile> {
        if update.is_banned.is_none() && update.role.is_none() {
            return Err(AppError::invalid_input("Nothing to update"));
        }

        let user = self
            .database
            .update_user_moderation(user_id, update.is_banned, update.role)
            .await?
            .ok_or_else(|| AppError::not_found(messages::USER_NOT_FOUND))?;

        info!(
            moderator = %moderator.id,
            user_id = %user_id,
            is_banned = ?update.is_banned,
            role = ?update.role,
            "User moderated"
        );
        self.audit(
            moderator.id,
            ActivityAction::ModerationUpdate,
            json!({
                "target": user_id,
                "isBanned": update.is_banned,
                "role": update.role,
            }),
            client,
        )
        .await;

        Ok(UserProfile::from(&user))
    }

    /// Recent audit entries of a user, newest first
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown user
    pub async fn user_activity(&self, user_id: Uuid) -> AppResult<Vec<ActivityLogEntry>> {
        if self.database.get_user(user_id).await?.is_none() {
            return Err(AppError::not_found(messages::USER_NOT_FOUND));
        }
        self.database
            .list_user_activity(user_id, limits::ACTIVITY_LOG_LIMIT)
            .await
    }

    /// Audit failures never fail the action being audited
    async fn audit(
        &self,
        user_id: Uuid,
        action: ActivityAction,
        details: Value,
        client: &ClientInfo,
    ) {
        if let Err(e) = self
            .database
            .record_activity(Some(user_id), action, details, client)
            .await
        {
            warn!(action = action.as_str(), "Failed to record activity: {}", e);
        }
    }
}

fn validate_password_length(password: &str, label: &str) -> AppResult<()> {
    if password.chars().count() < limits::MIN_PASSWORD_LENGTH {
        return Err(AppError::invalid_input(format!(
            "{label} must be at least {} characters",
            limits::MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}
