// ABOUTME: Authentication route handlers for registration, login and session lookup
// ABOUTME: Issues bearer tokens; logout is acknowledged without server-side state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Authentication routes
//!
//! Tokens are stateless. Logging out only tells the client to discard its
//! token, which stays valid until it expires.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::errors::AppError;
use crate::middleware::{client_info, require_auth};
use crate::models::UserProfile;
use crate::resources::ServerResources;
use crate::services::accounts::{LoginRequest, RegisterRequest};

/// Authentication routes
pub struct AuthRoutes;

impl AuthRoutes {
    /// Create all authentication routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/auth/register", post(Self::handle_register))
            .route("/api/auth/login", post(Self::handle_login))
            .route("/api/auth/me", get(Self::handle_me))
            .route("/api/auth/logout", post(Self::handle_logout))
            .with_state(resources)
    }

    async fn handle_register(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<RegisterRequest>,
    ) -> Result<Response, AppError> {
        let session = resources
            .accounts
            .register(request, &client_info(&headers))
            .await?;

        Ok((
            StatusCode::CREATED,
            Json(json!({ "success": true, "data": session })),
        )
            .into_response())
    }

    async fn handle_login(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<LoginRequest>,
    ) -> Result<Response, AppError> {
        let session = resources
            .accounts
            .login(request, &client_info(&headers))
            .await?;

        Ok((StatusCode::OK, Json(json!({ "success": true, "data": session }))).into_response())
    }

    async fn handle_me(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let ctx = require_auth(&headers, &resources).await?;
        let user = UserProfile::from(ctx.require_user()?);

        Ok((
            StatusCode::OK,
            Json(json!({ "success": true, "data": { "user": user } })),
        )
            .into_response())
    }

    async fn handle_logout(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        require_auth(&headers, &resources).await?;

        Ok((
            StatusCode::OK,
            Json(json!({ "success": true, "message": "Logged out successfully" })),
        )
            .into_response())
    }
}
