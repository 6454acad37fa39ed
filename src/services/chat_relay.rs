// ABOUTME: Streaming completion relay between a conversation and the upstream model
// ABOUTME: Saves the user turn, forwards fragments over a bounded channel and persists only complete replies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Completion Relay
//!
//! One send walks `Idle -> UserMessageSaved -> Streaming -> Finalizing`
//! and ends `Completed` or `Failed`.
//!
//! Validation (blank content, unknown conversation, unknown model, a provider
//! that cannot stream) happens before anything is written and fails the
//! request synchronously. Once the
//! user message is saved, every failure is reported in-band as a single
//! terminal [`RelayEvent::Error`].
//!
//! A producer task reads the upstream stream and pushes events into a
//! bounded channel; the HTTP body drains it through [`RelayStream`].
//! Dropping the stream cancels the producer, which aborts the upstream call
//! and persists nothing.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use super::titles::TitleService;
use crate::constants::{defaults, limits, llm, messages};
use crate::context::RequestContext;
use crate::database::ChatManager;
use crate::errors::{AppError, AppResult};
use crate::llm::{catalog, get_devgpt_system_prompt, ChatMessage, ChatRequest, LlmProvider};
use crate::models::{Message, MessageRole, TokenCounts};

// ============================================================================
// Configuration
// ============================================================================

/// Limits applied to every relay invocation
#[derive(Debug, Clone, Copy)]
pub struct RelayConfig {
    /// Maximum wall time of one streaming call
    pub stream_timeout: Duration,
    /// Capacity of the producer to writer channel
    pub channel_capacity: usize,
    /// Maximum wall time of one title inference
    pub title_timeout: Duration,
    /// Sampling temperature sent upstream
    pub temperature: f32,
    /// Completion token cap sent upstream
    pub max_tokens: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            stream_timeout: Duration::from_secs(defaults::STREAM_TIMEOUT_SECS),
            channel_capacity: defaults::RELAY_CHANNEL_CAPACITY,
            title_timeout: Duration::from_secs(defaults::TITLE_TIMEOUT_SECS),
            temperature: llm::TEMPERATURE,
            max_tokens: llm::MAX_TOKENS,
        }
    }
}

// ============================================================================
// Events and states
// ============================================================================

/// One item of the streamed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// A model fragment, in upstream order
    Content(String),
    /// Terminal success
    Done,
    /// Terminal failure with a human-readable reason
    Error(String),
}

impl RelayEvent {
    /// Whether no event may follow this one
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }
}

impl Serialize for RelayEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::Content(content) => map.serialize_entry("content", content)?,
            Self::Done => map.serialize_entry("done", &true)?,
            Self::Error(error) => map.serialize_entry("error", error)?,
        }
        map.end()
    }
}

/// Relay lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Request received, nothing written
    Idle,
    /// User message persisted
    UserMessageSaved,
    /// Forwarding upstream fragments
    Streaming,
    /// Persisting the assistant message
    Finalizing,
    /// Reply persisted and `done` sent
    Completed,
    /// Terminated without persisting a reply
    Failed,
}

/// Why a relay ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The provider refused or broke off the stream
    Upstream(String),
    /// The stream exceeded the configured timeout
    TimedOut,
    /// The caller went away
    Disconnected,
    /// The assistant message could not be stored
    PersistFailed(String),
}

/// Final result of the producer task
#[derive(Debug)]
pub enum RelayOutcome {
    /// The reply was stored
    Completed {
        /// The persisted assistant message
        message: Message,
        /// Background title inference, when this was the first exchange
        title_task: Option<JoinHandle<()>>,
    },
    /// Nothing was stored
    Failed(FailureReason),
}

/// Caller input for one send
#[derive(Debug, Clone)]
pub struct SendMessage {
    /// Message text
    pub content: String,
    /// Requested model; falls back to the conversation's model
    pub model: Option<String>,
}

/// A relay in flight: the event stream plus the producer's outcome
pub struct RelaySession {
    /// Events for the caller
    pub events: RelayStream,
    /// Resolves once the producer has finished
    pub outcome: JoinHandle<RelayOutcome>,
}

// ============================================================================
// Outbound stream
// ============================================================================

/// Receiving half of the relay channel
///
/// Yields at most one terminal event and nothing after it. If the producer
/// vanishes without a terminal event the stream ends with an error event.
/// Dropping it cancels the producer.
pub struct RelayStream {
    receiver: mpsc::Receiver<RelayEvent>,
    finished: bool,
    _cancel_on_drop: DropGuard,
}

impl RelayStream {
    fn new(receiver: mpsc::Receiver<RelayEvent>, cancel: CancellationToken) -> Self {
        Self {
            receiver,
            finished: false,
            _cancel_on_drop: cancel.drop_guard(),
        }
    }
}

impl Stream for RelayStream {
    type Item = RelayEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        let event = ready!(self.receiver.poll_recv(cx)).unwrap_or_else(|| {
            RelayEvent::Error(messages::STREAM_ENDED_UNEXPECTEDLY.to_owned())
        });
        if event.is_terminal() {
            self.finished = true;
            self.receiver.close();
        }
        Poll::Ready(Some(event))
    }
}

// ============================================================================
// Relay
// ============================================================================

/// Drives sends from validation through persistence
#[derive(Clone)]
pub struct ChatRelay {
    chats: ChatManager,
    provider: Arc<dyn LlmProvider>,
    titles: TitleService,
    config: RelayConfig,
}

impl ChatRelay {
    /// Create a relay
    #[must_use]
    pub fn new(chats: ChatManager, provider: Arc<dyn LlmProvider>, config: RelayConfig) -> Self {
        let titles = TitleService::new(chats.clone(), Arc::clone(&provider), config.title_timeout);
        Self {
            chats,
            provider,
            titles,
            config,
        }
    }

    /// Active limits
    #[must_use]
    pub const fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Validate, save the user message and start streaming
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for blank content or an unknown model,
    /// `ResourceNotFound` if the conversation is not visible to the caller,
    /// `ExternalServiceUnavailable` if the provider cannot stream,
    /// or a database error if saving the user message or loading history
    /// fails. Later failures arrive as an in-band error event.
    pub async fn send(
        &self,
        ctx: &RequestContext,
        conversation_id: Uuid,
        request: SendMessage,
    ) -> AppResult<RelaySession> {
        if request.content.trim().is_empty() {
            return Err(AppError::invalid_input(messages::CONTENT_REQUIRED));
        }

        let conversation = self
            .chats
            .get(conversation_id, ctx.owner)
            .await?
            .ok_or_else(|| AppError::not_found(messages::CHAT_NOT_FOUND))?;

        let model =
            catalog::resolve_model(request.model.as_deref(), Some(conversation.model.as_str()));
        let model = catalog::validate_model(model)?.id;

        let capabilities = self.provider.capabilities();
        if !capabilities.supports_streaming() {
            return Err(AppError::external_unavailable(
                self.provider.display_name(),
                "Streaming completions are not supported",
            ));
        }

        self.chats
            .append_message(
                conversation_id,
                MessageRole::User,
                &request.content,
                None,
                TokenCounts::default(),
            )
            .await?;
        transition(RelayState::Idle, RelayState::UserMessageSaved);

        let history = self
            .chats
            .recent_messages(conversation_id, limits::MAX_HISTORY_MESSAGES)
            .await?;
        let first_exchange = history.len() <= 1;

        let mut messages = Vec::with_capacity(history.len() + 1);
        if capabilities.supports_system_messages() {
            messages.push(ChatMessage::system(get_devgpt_system_prompt()));
        }
        messages.extend(
            history
                .into_iter()
                .map(|m| ChatMessage::new(m.role, m.content)),
        );

        let upstream = ChatRequest::new(messages)
            .with_model(model)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
            .with_streaming();

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let cancel = ctx.cancellation.child_token();

        let producer = Producer {
            chats: self.chats.clone(),
            provider: Arc::clone(&self.provider),
            titles: self.titles.clone(),
            tx,
            cancel: cancel.clone(),
            deadline: Instant::now() + self.config.stream_timeout,
            conversation_id,
            model: model.to_owned(),
            first_message: first_exchange.then_some(request.content),
        };

        let span = tracing::debug_span!(
            "chat_relay",
            request_id = %ctx.request_id,
            conversation_id = %conversation_id,
            model = %model,
        );
        let outcome = tokio::spawn(producer.run(upstream).instrument(span));

        Ok(RelaySession {
            events: RelayStream::new(rx, cancel),
            outcome,
        })
    }
}

fn transition(from: RelayState, to: RelayState) {
    debug!(from = ?from, to = ?to, "relay state transition");
}

// ============================================================================
// Producer task
// ============================================================================

struct Producer {
    chats: ChatManager,
    provider: Arc<dyn LlmProvider>,
    titles: TitleService,
    tx: mpsc::Sender<RelayEvent>,
    cancel: CancellationToken,
    deadline: Instant,
    conversation_id: Uuid,
    model: String,
    first_message: Option<String>,
}

impl Producer {
    async fn run(self, request: ChatRequest) -> RelayOutcome {
        transition(RelayState::UserMessageSaved, RelayState::Streaming);

        match self.stream_completion(&request).await {
            Ok(reply) => self.finalize(reply).await,
            Err(reason) => self.fail(RelayState::Streaming, reason).await,
        }
    }

    /// Forward upstream fragments and return the accumulated reply
    async fn stream_completion(&self, request: &ChatRequest) -> Result<String, FailureReason> {
        let opened = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(FailureReason::Disconnected),
            () = self.tx.closed() => return Err(FailureReason::Disconnected),
            () = sleep_until(self.deadline) => return Err(FailureReason::TimedOut),
            result = self.provider.complete_stream(request) => result,
        };
        let mut upstream = opened.map_err(|e| FailureReason::Upstream(upstream_message(&e)))?;

        let mut reply = String::new();
        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(FailureReason::Disconnected),
                () = self.tx.closed() => return Err(FailureReason::Disconnected),
                () = sleep_until(self.deadline) => return Err(FailureReason::TimedOut),
                item = upstream.next() => item,
            };

            match next {
                Some(Ok(chunk)) => {
                    if !chunk.delta.is_empty() {
                        reply.push_str(&chunk.delta);
                        self.forward(RelayEvent::Content(chunk.delta)).await?;
                    }
                    if chunk.is_final {
                        return Ok(reply);
                    }
                }
                Some(Err(e)) => return Err(FailureReason::Upstream(upstream_message(&e))),
                // Only a final chunk completes a reply
                None => {
                    return Err(FailureReason::Upstream(
                        messages::STREAM_ENDED_UNEXPECTEDLY.to_owned(),
                    ))
                }
            }
        }
    }

    /// Send one event, waiting for channel capacity at most until the deadline
    async fn forward(&self, event: RelayEvent) -> Result<(), FailureReason> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(FailureReason::Disconnected),
            () = sleep_until(self.deadline) => Err(FailureReason::TimedOut),
            sent = self.tx.send(event) => sent.map_err(|_| FailureReason::Disconnected),
        }
    }

    async fn finalize(self, reply: String) -> RelayOutcome {
        transition(RelayState::Streaming, RelayState::Finalizing);

        if self.cancel.is_cancelled() || self.tx.is_closed() {
            return self.fail(RelayState::Finalizing, FailureReason::Disconnected).await;
        }

        let message = match self
            .chats
            .append_message(
                self.conversation_id,
                MessageRole::Assistant,
                &reply,
                Some(&self.model),
                TokenCounts::default(),
            )
            .await
        {
            Ok(message) => message,
            Err(e) => {
                return self
                    .fail(RelayState::Finalizing, FailureReason::PersistFailed(e.to_string()))
                    .await
            }
        };

        let title_task = self.first_message.as_ref().map(|first| {
            self.titles
                .spawn(self.conversation_id, first.clone(), self.model.clone())
        });

        if self.tx.send(RelayEvent::Done).await.is_err() {
            debug!("Caller left after the reply was stored");
        }
        transition(RelayState::Finalizing, RelayState::Completed);

        RelayOutcome::Completed {
            message,
            title_task,
        }
    }

    async fn fail(&self, state: RelayState, reason: FailureReason) -> RelayOutcome {
        let client_message = match &reason {
            FailureReason::Upstream(message) => Some(message.clone()),
            FailureReason::TimedOut => Some(messages::STREAM_TIMED_OUT.to_owned()),
            FailureReason::PersistFailed(_) => Some("Failed to save message".to_owned()),
            FailureReason::Disconnected => None,
        };

        warn!(reason = ?reason, "Relay failed; partial reply discarded");
        if let Some(message) = client_message {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {}
                sent = self.tx.send(RelayEvent::Error(message)) => {
                    if sent.is_err() {
                        debug!("Caller left before the error event was delivered");
                    }
                }
            }
        }
        transition(state, RelayState::Failed);
        RelayOutcome::Failed(reason)
    }
}

fn upstream_message(error: &AppError) -> String {
    error.client_message(crate::errors::expose_internal_details())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        assert_eq!(
            serde_json::to_value(RelayEvent::Content("Hel".to_owned())).unwrap(),
            serde_json::json!({ "content": "Hel" })
        );
        assert_eq!(
            serde_json::to_value(RelayEvent::Done).unwrap(),
            serde_json::json!({ "done": true })
        );
        assert_eq!(
            serde_json::to_value(RelayEvent::Error("boom".to_owned())).unwrap(),
            serde_json::json!({ "error": "boom" })
        );
    }

    #[tokio::test]
    async fn test_stream_stops_after_terminal_event() {
        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let mut stream = RelayStream::new(rx, cancel.clone());

        tx.send(RelayEvent::Content("a".to_owned())).await.unwrap();
        tx.send(RelayEvent::Done).await.unwrap();
        assert!(tx.send(RelayEvent::Content("late".to_owned())).await.is_ok());

        assert_eq!(stream.next().await, Some(RelayEvent::Content("a".to_owned())));
        assert_eq!(stream.next().await, Some(RelayEvent::Done));
        assert_eq!(stream.next().await, None);

        drop(stream);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_vanished_producer_yields_error() {
        let (tx, rx) = mpsc::channel(1);
        let mut stream = RelayStream::new(rx, CancellationToken::new());
        drop(tx);

        assert_eq!(
            stream.next().await,
            Some(RelayEvent::Error(messages::STREAM_ENDED_UNEXPECTEDLY.to_owned()))
        );
        assert_eq!(stream.next().await, None);
    }
}
