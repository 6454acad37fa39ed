// ABOUTME: Health check route handlers for service monitoring and status endpoints
// ABOUTME: Provides liveness, database readiness and the API index
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Health check routes
//!
//! `/api/health` never touches the database; `/api/ready` does.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::constants::{routes, service_names};
use crate::llm::LlmCapabilities;
use crate::resources::ServerResources;

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create all health check routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/", get(Self::handle_index))
            .route(routes::HEALTH, get(Self::handle_health))
            .route(routes::READY, get(Self::handle_ready))
            .with_state(resources)
    }

    async fn handle_index() -> Json<Value> {
        Json(json!({
            "name": service_names::API_DISPLAY_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "description": "AI Coding Assistant Backend",
            "endpoints": {
                "health": routes::HEALTH,
                "auth": routes::AUTH,
                "user": routes::USER,
                "chat": routes::CHAT,
                "models": routes::MODELS,
            },
        }))
    }

    async fn handle_health() -> Json<Value> {
        Json(json!({
            "success": true,
            "message": "DevGPT API is running",
            "timestamp": Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION"),
        }))
    }

    async fn handle_ready(State(resources): State<Arc<ServerResources>>) -> Response {
        let provider = &resources.llm_provider;
        let capabilities = provider.capabilities();
        match resources.database.health_check().await {
            Ok(()) => Json(json!({
                "status": "ready",
                "database": "ok",
                "llmProvider": provider.name(),
                "llmProviderName": provider.display_name(),
                "llmCapabilities": {
                    "streaming": capabilities.supports_streaming(),
                    "systemMessages": capabilities.supports_system_messages(),
                    "jsonMode": capabilities.contains(LlmCapabilities::JSON_MODE),
                },
                "timestamp": Utc::now().to_rfc3339(),
            }))
            .into_response(),
            Err(e) => {
                warn!("Readiness check failed: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({
                        "status": "unavailable",
                        "database": "error",
                        "timestamp": Utc::now().to_rfc3339(),
                    })),
                )
                    .into_response()
            }
        }
    }
}
