// ABOUTME: Groq LLM provider implementation with streaming support
// ABOUTME: Talks to the OpenAI-compatible chat completions endpoint for Llama, Mixtral and Gemma models
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Groq Provider
//!
//! Implementation of the `LlmProvider` trait for Groq's LPU-accelerated inference.
//!
//! The API key comes from `GROQ_API_KEY`. A provider without a key still
//! starts; every completion then fails as an upstream configuration error,
//! which the relay reports in-band.
//!
//! ## Example
//!
//! ```rust,no_run
//! use devgpt_server::llm::{ChatMessage, ChatRequest, GroqConfig, GroqProvider, LlmProvider};
//! use devgpt_server::errors::AppError;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AppError> {
//!     let provider = GroqProvider::new(GroqConfig::from_env())?;
//!     let request = ChatRequest::new(vec![ChatMessage::user("What is a borrow checker?")]);
//!     let response = provider.complete(&request).await?;
//!     println!("{}", response.content);
//!     Ok(())
//! }
//! ```

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use super::sse_parser::create_sse_stream;
use super::{
    ChatMessage, ChatRequest, ChatResponse, ChatStream, LlmCapabilities, LlmProvider, StreamChunk,
    TokenUsage, DEFAULT_MODEL,
};
use crate::constants::llm;
use crate::errors::AppError;

const PROVIDER_NAME: &str = "Groq";

// ============================================================================
// Configuration
// ============================================================================

/// Connection settings for the Groq API
#[derive(Debug, Clone)]
pub struct GroqConfig {
    /// Bearer key; `None` makes every call fail upstream
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    /// TCP connect timeout
    pub connect_timeout: Duration,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: llm::GROQ_API_BASE_URL.to_owned(),
            connect_timeout: Duration::from_secs(llm::CONNECT_TIMEOUT_SECS),
        }
    }
}

impl GroqConfig {
    /// Read `GROQ_API_KEY` and `GROQ_BASE_URL`
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("GROQ_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            base_url: env::var("GROQ_BASE_URL")
                .unwrap_or_else(|_| llm::GROQ_API_BASE_URL.to_owned()),
            ..Self::default()
        }
    }
}

// ============================================================================
// API Request/Response Types (OpenAI-compatible format)
// ============================================================================

#[derive(Debug, Serialize)]
struct GroqRequest<'a> {
    model: &'a str,
    messages: Vec<GroqMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct GroqMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a ChatMessage> for GroqMessage<'a> {
    fn from(msg: &'a ChatMessage) -> Self {
        Self {
            role: msg.role.as_str(),
            content: &msg.content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GroqResponse {
    choices: Vec<GroqChoice>,
    #[serde(default)]
    usage: Option<GroqUsage>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct GroqChoice {
    message: GroqResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroqResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroqUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GroqStreamChunk {
    choices: Vec<GroqStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct GroqStreamChoice {
    delta: GroqDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroqDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroqErrorResponse {
    error: GroqErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GroqErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Groq LLM provider
pub struct GroqProvider {
    client: Client,
    config: GroqConfig,
}

impl GroqProvider {
    /// Create a provider from explicit settings
    ///
    /// # Errors
    ///
    /// Returns a config error if the HTTP client cannot be built
    pub fn new(config: GroqConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| AppError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Whether an API key is configured
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.config.base_url.trim_end_matches('/'))
    }

    fn api_key(&self) -> Result<&str, AppError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::external_unavailable(PROVIDER_NAME, "API key is not configured"))
    }

    async fn post_completion(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response, AppError> {
        let body = GroqRequest {
            model: request.model.as_deref().unwrap_or(DEFAULT_MODEL),
            messages: request.messages.iter().map(GroqMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        };

        let response = self
            .client
            .post(self.api_url("chat/completions"))
            .bearer_auth(self.api_key()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send request to Groq API: {}", e);
                AppError::external_service(PROVIDER_NAME, format!("Failed to connect: {e}"))
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Self::parse_error_response(status, &body))
    }

    /// Map a non-2xx Groq response to an upstream error carrying the provider's message
    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> AppError {
        let Ok(error_response) = serde_json::from_str::<GroqErrorResponse>(body) else {
            return AppError::external_service(
                PROVIDER_NAME,
                format!(
                    "API error ({status}): {}",
                    body.chars().take(200).collect::<String>()
                ),
            );
        };

        let detail = error_response.error;
        match status.as_u16() {
            401 => AppError::external_service(
                PROVIDER_NAME,
                format!("Authentication failed: {}", detail.message),
            ),
            429 => AppError::external_service(
                PROVIDER_NAME,
                format!("Rate limit exceeded: {}", detail.message),
            ),
            _ => AppError::external_service(
                PROVIDER_NAME,
                format!(
                    "{} - {}",
                    detail.error_type.as_deref().unwrap_or("unknown"),
                    detail.message
                ),
            ),
        }
    }

    fn parse_stream_data(json_str: &str) -> Option<Result<StreamChunk, AppError>> {
        match serde_json::from_str::<GroqStreamChunk>(json_str) {
            Ok(chunk) => chunk.choices.into_iter().next().map(|choice| {
                Ok(StreamChunk {
                    delta: choice.delta.content.unwrap_or_default(),
                    is_final: choice.finish_reason.is_some(),
                    finish_reason: choice.finish_reason,
                })
            }),
            Err(e) => {
                warn!("Failed to parse Groq stream chunk: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl LlmProvider for GroqProvider {
    fn name(&self) -> &'static str {
        "groq"
    }

    fn display_name(&self) -> &'static str {
        "Groq (Llama/Mixtral/Gemma)"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::text_only() | LlmCapabilities::JSON_MODE
    }

    #[instrument(skip(self, request), fields(model = %request.model.as_deref().unwrap_or(DEFAULT_MODEL)))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        debug!("Sending chat completion request to Groq");

        let response = self.post_completion(request, false).await?;
        let groq_response: GroqResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Groq API response: {}", e);
            AppError::external_service(PROVIDER_NAME, format!("Failed to parse response: {e}"))
        })?;

        let choice = groq_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::external_service(PROVIDER_NAME, "API returned no choices"))?;

        let content = choice.message.content.unwrap_or_default();
        debug!(
            chars = content.len(),
            finish_reason = ?choice.finish_reason,
            "Received response from Groq"
        );

        Ok(ChatResponse {
            content,
            model: groq_response.model,
            usage: groq_response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice.finish_reason,
        })
    }

    #[instrument(skip(self, request), fields(model = %request.model.as_deref().unwrap_or(DEFAULT_MODEL)))]
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        debug!("Sending streaming chat completion request to Groq");

        let response = self.post_completion(request, true).await?;
        Ok(create_sse_stream(
            response.bytes_stream(),
            Self::parse_stream_data,
            PROVIDER_NAME,
        ))
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<bool, AppError> {
        let response = self
            .client
            .get(self.api_url("models"))
            .bearer_auth(self.api_key()?)
            .send()
            .await
            .map_err(|e| {
                AppError::external_service(PROVIDER_NAME, format!("Health check failed: {e}"))
            })?;

        let healthy = response.status().is_success();
        if !healthy {
            warn!("Groq API health check failed with status: {}", response.status());
        }
        Ok(healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stream_data_content_and_finish() {
        let chunk = GroqProvider::parse_stream_data(
            r#"{"choices":[{"delta":{"content":"Hi"},"finish_reason":null}]}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(chunk, StreamChunk::delta("Hi"));

        let last = GroqProvider::parse_stream_data(
            r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
        )
        .unwrap()
        .unwrap();
        assert!(last.is_final);
        assert!(last.delta.is_empty());
    }

    #[test]
    fn test_parse_stream_data_skips_garbage() {
        assert!(GroqProvider::parse_stream_data("not json").is_none());
        assert!(GroqProvider::parse_stream_data(r#"{"choices":[]}"#).is_none());
    }

    #[test]
    fn test_error_response_carries_provider_message() {
        let err = GroqProvider::parse_error_response(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"slow down","type":"rate_limit"}}"#,
        );
        assert_eq!(err.http_status(), 502);
        assert!(err.message.contains("slow down"));
    }

    #[test]
    fn test_missing_key_is_reported() {
        let provider = GroqProvider::new(GroqConfig::default()).unwrap();
        assert!(!provider.is_configured());
        assert_eq!(provider.api_key().unwrap_err().http_status(), 503);
        assert_eq!(
            provider.api_url("models"),
            format!("{}/models", llm::GROQ_API_BASE_URL)
        );
    }
}
