// ABOUTME: Chat route handlers for conversation management and streamed replies
// ABOUTME: Owner-scoped CRUD over conversations plus the SSE message-send endpoint
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Chat routes
//!
//! Creating, reading and messaging a conversation work for anonymous
//! callers; listing and deleting need a session. Every lookup is scoped by
//! the caller's [`Owner`](crate::models::Owner), so a foreign conversation
//! is indistinguishable from a missing one.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::constants::messages;
use crate::database::ListOptions;
use crate::errors::AppError;
use crate::llm::catalog;
use crate::middleware::{optional_auth, require_auth};
use crate::models::ConversationWithMessages;
use crate::resources::ServerResources;
use crate::services::SendMessage;

// ============================================================================
// Request Types
// ============================================================================

/// Request to create a conversation
#[derive(Debug, Default, Deserialize)]
pub struct CreateChatRequest {
    /// Model id; defaults to the catalog default
    #[serde(default)]
    pub model: Option<String>,
}

/// Pagination query for listing conversations
#[derive(Debug, Default, Deserialize)]
pub struct ListChatsQuery {
    /// Page size
    pub limit: Option<u32>,
    /// Rows to skip
    pub offset: Option<u32>,
}

/// Request to send a message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Message text
    #[serde(default)]
    pub content: String,
    /// Model override for this send
    #[serde(default)]
    pub model: Option<String>,
}

// ============================================================================
// Routes
// ============================================================================

/// Chat routes
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create all chat routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/chat",
                post(Self::handle_create)
                    .get(Self::handle_list)
                    .delete(Self::handle_clear_all),
            )
            .route(
                "/api/chat/:id",
                get(Self::handle_get).delete(Self::handle_delete),
            )
            .route("/api/chat/:id/message", post(Self::handle_send_message))
            .with_state(resources)
    }

    async fn handle_create(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        request: Option<Json<CreateChatRequest>>,
    ) -> Result<Response, AppError> {
        let ctx = optional_auth(&headers, &resources).await?;
        let Json(request) = request.unwrap_or_default();

        let model = catalog::resolve_model(request.model.as_deref(), None);
        let model = catalog::validate_model(model).map_err(|e| ctx.tag(e))?;

        let conversation = resources.chats().create(ctx.owner, model.id).await?;
        info!(
            conversation_id = %conversation.id,
            owner = %ctx.owner,
            model = model.id,
            "Conversation created"
        );

        Ok((
            StatusCode::CREATED,
            Json(json!({ "success": true, "data": conversation })),
        )
            .into_response())
    }

    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<ListChatsQuery>,
    ) -> Result<Response, AppError> {
        let ctx = require_auth(&headers, &resources).await?;
        let conversations = resources
            .chats()
            .list(ctx.owner, ListOptions::new(query.limit, query.offset))
            .await?;

        Ok((
            StatusCode::OK,
            Json(json!({
                "success": true,
                "count": conversations.len(),
                "data": conversations,
            })),
        )
            .into_response())
    }

    async fn handle_get(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let ctx = optional_auth(&headers, &resources).await?;
        let chats = resources.chats();

        let conversation = chats
            .get(conversation_id, ctx.owner)
            .await?
            .ok_or_else(|| ctx.tag(AppError::not_found(messages::CHAT_NOT_FOUND)))?;
        let messages = chats.get_messages(conversation_id).await?;

        let data = ConversationWithMessages {
            conversation,
            messages,
        };
        Ok((StatusCode::OK, Json(json!({ "success": true, "data": data }))).into_response())
    }

    /// Stream the reply as `data: <json>` frames
    ///
    /// Errors before the stream opens are plain JSON responses. After that,
    /// failures arrive as a final `{ "error": ... }` frame.
    async fn handle_send_message(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<Uuid>,
        Json(request): Json<SendMessageRequest>,
    ) -> Result<Response, AppError> {
        let ctx = optional_auth(&headers, &resources).await?;

        let session = resources
            .relay
            .send(
                &ctx,
                conversation_id,
                SendMessage {
                    content: request.content,
                    model: request.model,
                },
            )
            .await
            .map_err(|e| ctx.tag(e))?;

        let stream = session
            .events
            .map(|event| Event::default().json_data(event));

        Ok((
            // Keeps nginx-style proxies from buffering the event stream
            [(
                HeaderName::from_static("x-accel-buffering"),
                HeaderValue::from_static("no"),
            )],
            Sse::new(stream).keep_alive(KeepAlive::default()),
        )
            .into_response())
    }

    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let ctx = require_auth(&headers, &resources).await?;

        if !resources.chats().delete(conversation_id, ctx.owner).await? {
            return Err(ctx.tag(AppError::not_found(messages::CHAT_NOT_FOUND)));
        }

        Ok((
            StatusCode::OK,
            Json(json!({ "success": true, "message": "Chat deleted successfully" })),
        )
            .into_response())
    }

    async fn handle_clear_all(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let ctx = require_auth(&headers, &resources).await?;
        let deleted = resources.chats().clear_all(ctx.require_user_id()?).await?;

        Ok((
            StatusCode::OK,
            Json(json!({
                "success": true,
                "deletedCount": deleted,
                "message": format!("Deleted {deleted} chats"),
            })),
        )
            .into_response())
    }
}
