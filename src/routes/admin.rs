// ABOUTME: Admin moderation route handlers
// ABOUTME: Ban, unban and role changes plus per-user activity history
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;

use crate::errors::AppError;
use crate::middleware::require_admin;
use crate::resources::ServerResources;
use crate::services::accounts::ModerationUpdate;

/// Admin routes; every handler requires the admin role
pub struct AdminRoutes;

impl AdminRoutes {
    /// Create all admin routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/admin/users/:id", patch(Self::handle_moderate_user))
            .route(
                "/api/admin/users/:id/activity",
                get(Self::handle_user_activity),
            )
            .with_state(resources)
    }

    async fn handle_moderate_user(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(user_id): Path<Uuid>,
        Json(update): Json<ModerationUpdate>,
    ) -> Result<Response, AppError> {
        let ctx = require_admin(&headers, &resources).await?;
        let user = resources
            .accounts
            .moderate(ctx.require_user()?, user_id, update, &ctx.client)
            .await
            .map_err(|e| ctx.tag(e))?;

        Ok((StatusCode::OK, Json(json!({ "success": true, "data": user }))).into_response())
    }

    async fn handle_user_activity(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(user_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let ctx = require_admin(&headers, &resources).await?;
        let entries = resources
            .accounts
            .user_activity(user_id)
            .await
            .map_err(|e| ctx.tag(e))?;

        Ok((
            StatusCode::OK,
            Json(json!({ "success": true, "count": entries.len(), "data": entries })),
        )
            .into_response())
    }
}
