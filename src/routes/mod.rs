// ABOUTME: Route module organization for the DevGPT HTTP endpoints
// ABOUTME: Assembles domain routers and the request-id, tracing, CORS and body-limit layers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Route module for the DevGPT server
//!
//! Each domain module holds route definitions and thin handlers that
//! delegate to the service layer.

use std::sync::Arc;

use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::constants::limits;
use crate::middleware::{create_request_span, setup_cors, MakeRequestUuid};
use crate::resources::ServerResources;

/// Admin moderation routes
pub mod admin;
/// Registration, login and session routes
pub mod auth;
/// Conversation and streaming message routes
pub mod chat;
/// Health, readiness and API index routes
pub mod health;
/// Model catalog routes
pub mod models;
/// Current-user profile routes
pub mod user;

pub use admin::AdminRoutes;
pub use auth::AuthRoutes;
pub use chat::ChatRoutes;
pub use health::HealthRoutes;
pub use models::ModelRoutes;
pub use user::UserRoutes;

/// Build the complete application router
///
/// Layers run outside-in: a request id is assigned first so the trace span
/// and every error body can carry it, then it is echoed on the response.
pub fn build_router(resources: Arc<ServerResources>) -> Router {
    let cors = setup_cors(&resources.config);

    Router::new()
        .merge(HealthRoutes::routes(resources.clone()))
        .merge(AuthRoutes::routes(resources.clone()))
        .merge(UserRoutes::routes(resources.clone()))
        .merge(ChatRoutes::routes(resources.clone()))
        .merge(ModelRoutes::routes())
        .merge(AdminRoutes::routes(resources))
        .layer(RequestBodyLimitLayer::new(limits::MAX_REQUEST_BODY_BYTES))
        .layer(cors)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(create_request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
