// ABOUTME: User profile route handlers for the signed-in account
// ABOUTME: Profile read/update, password change and account deletion
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, put},
    Json, Router,
};
use serde_json::json;

use crate::errors::AppError;
use crate::middleware::require_auth;
use crate::models::{ProfileUpdate, UserProfile};
use crate::resources::ServerResources;
use crate::services::accounts::PasswordChange;

/// Profile routes for the current user
pub struct UserRoutes;

impl UserRoutes {
    /// Create all user routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/user/profile",
                get(Self::handle_get_profile).put(Self::handle_update_profile),
            )
            .route("/api/user/password", put(Self::handle_change_password))
            .route("/api/user/account", delete(Self::handle_delete_account))
            .with_state(resources)
    }

    async fn handle_get_profile(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let ctx = require_auth(&headers, &resources).await?;
        let profile = UserProfile::from(ctx.require_user()?);

        Ok((StatusCode::OK, Json(json!({ "success": true, "data": profile }))).into_response())
    }

    async fn handle_update_profile(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(update): Json<ProfileUpdate>,
    ) -> Result<Response, AppError> {
        let ctx = require_auth(&headers, &resources).await?;
        let profile = resources
            .accounts
            .update_profile(ctx.require_user()?, update, &ctx.client)
            .await
            .map_err(|e| ctx.tag(e))?;

        Ok((StatusCode::OK, Json(json!({ "success": true, "data": profile }))).into_response())
    }

    async fn handle_change_password(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(change): Json<PasswordChange>,
    ) -> Result<Response, AppError> {
        let ctx = require_auth(&headers, &resources).await?;
        resources
            .accounts
            .change_password(ctx.require_user()?, change, &ctx.client)
            .await
            .map_err(|e| ctx.tag(e))?;

        Ok((
            StatusCode::OK,
            Json(json!({ "success": true, "message": "Password updated successfully" })),
        )
            .into_response())
    }

    async fn handle_delete_account(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let ctx = require_auth(&headers, &resources).await?;
        resources
            .accounts
            .delete_account(ctx.require_user_id()?)
            .await
            .map_err(|e| ctx.tag(e))?;

        Ok((
            StatusCode::OK,
            Json(json!({ "success": true, "message": "Account deleted successfully" })),
        )
            .into_response())
    }
}
