// ABOUTME: Model catalog route handlers
// ABOUTME: Lists the selectable models and looks one up by id
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use axum::{extract::Path, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::constants::messages;
use crate::errors::AppError;
use crate::llm::{catalog, AI_MODELS, DEFAULT_MODEL};

/// Model catalog routes
pub struct ModelRoutes;

impl ModelRoutes {
    /// Create all model catalog routes
    pub fn routes() -> Router {
        Router::new()
            .route("/api/models", get(Self::handle_list))
            .route("/api/models/:id", get(Self::handle_get))
    }

    async fn handle_list() -> Json<Value> {
        Json(json!({
            "success": true,
            "data": {
                "models": AI_MODELS,
                "defaultModel": DEFAULT_MODEL,
            },
        }))
    }

    async fn handle_get(Path(model_id): Path<String>) -> Result<Json<Value>, AppError> {
        let model = catalog::find_model(&model_id)
            .ok_or_else(|| AppError::not_found(messages::MODEL_NOT_FOUND))?;
        Ok(Json(json!({ "success": true, "data": model })))
    }
}
