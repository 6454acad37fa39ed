// ABOUTME: Detached title inference for conversations after their first exchange
// ABOUTME: Asks the model for a short title and stores it; failures only reach the debug log
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, Instrument};
use uuid::Uuid;

use crate::constants::{limits, llm};
use crate::database::ChatManager;
use crate::errors::{AppError, AppResult};
use crate::llm::{ChatMessage, ChatRequest, LlmProvider, TITLE_PROMPT};

/// Upper bound on tokens requested for a title
const TITLE_MAX_TOKENS: u32 = 32;

/// Derives conversation titles in the background
#[derive(Clone)]
pub struct TitleService {
    chats: ChatManager,
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl TitleService {
    /// Create a title service
    #[must_use]
    pub fn new(chats: ChatManager, provider: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self {
            chats,
            provider,
            timeout,
        }
    }

    /// Infer and store a title without blocking the caller
    ///
    /// The returned handle never yields an error: any failure leaves the
    /// placeholder title in place.
    pub fn spawn(&self, conversation_id: Uuid, first_message: String, model: String) -> JoinHandle<()> {
        let service = self.clone();
        let span = tracing::debug_span!("title_inference", conversation_id = %conversation_id);

        tokio::spawn(
            async move {
                match service.apply(conversation_id, &first_message, &model).await {
                    Ok(Some(title)) => debug!(%title, "Conversation title updated"),
                    Ok(None) => debug!("Model returned no usable title"),
                    Err(e) => debug!("Title inference failed: {}", e),
                }
            }
            .instrument(span),
        )
    }

    async fn apply(
        &self,
        conversation_id: Uuid,
        first_message: &str,
        model: &str,
    ) -> AppResult<Option<String>> {
        let Some(title) = self.infer_title(first_message, model).await? else {
            return Ok(None);
        };
        self.chats.update_title(conversation_id, &title).await?;
        Ok(Some(title))
    }

    /// Ask the model for a title for a conversation opening with `first_message`
    ///
    /// # Errors
    ///
    /// Returns the provider error, or `ExternalServiceUnavailable` on timeout
    pub async fn infer_title(&self, first_message: &str, model: &str) -> AppResult<Option<String>> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(TITLE_PROMPT),
            ChatMessage::user(first_message),
        ])
        .with_model(model)
        .with_temperature(llm::TEMPERATURE)
        .with_max_tokens(TITLE_MAX_TOKENS);

        let response = tokio::time::timeout(self.timeout, self.provider.complete(&request))
            .await
            .map_err(|_| AppError::external_unavailable("Groq", "Title inference timed out"))??;

        Ok(normalize_title(&response.content))
    }
}

/// Trim whitespace and wrapping quotes, cap the length, drop empty results
#[must_use]
pub fn normalize_title(raw: &str) -> Option<String> {
    let trimmed = raw
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '\u{201c}' | '\u{201d}'))
        .trim();

    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(limits::TITLE_MAX_CHARS).collect())
}
