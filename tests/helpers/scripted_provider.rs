// ABOUTME: Scripted LLM provider for relay and route tests without network access
// ABOUTME: Replays fixed fragments, fails or hangs on demand and records every request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Mutex;

use async_trait::async_trait;
use devgpt_server::errors::AppError;
use devgpt_server::llm::{
    ChatRequest, ChatResponse, ChatStream, LlmCapabilities, LlmProvider, StreamChunk,
};

/// What the streaming call does
#[derive(Debug, Clone)]
pub enum StreamScript {
    /// Emit each fragment, then finish
    Fragments(Vec<String>),
    /// Emit the fragments, then fail with the message
    FailAfter(Vec<String>, String),
    /// Refuse to open the stream
    RefuseToOpen(String),
    /// Emit the fragments, then never produce another item
    HangAfter(Vec<String>),
    /// Emit the fragments, then end without a final chunk
    EndAfter(Vec<String>),
}

/// Provider whose behavior is fixed at construction
///
/// # Examples
///
/// ```rust,no_run
/// # mod helpers { pub mod scripted_provider { pub struct ScriptedProvider; } }
/// let provider = ScriptedProvider::fragments(&["Hel", "lo"]);
/// ```
pub struct ScriptedProvider {
    streams: Vec<StreamScript>,
    title: Result<String, String>,
    capabilities: LlmCapabilities,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    /// Stream the given fragments and title conversations "Scripted Title"
    #[must_use]
    pub fn fragments(fragments: &[&str]) -> Self {
        Self::new(StreamScript::Fragments(to_owned_all(fragments)))
    }

    /// Stream the fragments, then fail with `message`
    #[must_use]
    pub fn failing_after(fragments: &[&str], message: &str) -> Self {
        Self::new(StreamScript::FailAfter(
            to_owned_all(fragments),
            message.to_owned(),
        ))
    }

    /// Fail when the stream is opened
    #[must_use]
    pub fn refusing(message: &str) -> Self {
        Self::new(StreamScript::RefuseToOpen(message.to_owned()))
    }

    /// Stream the fragments, then stall forever
    #[must_use]
    pub fn hanging_after(fragments: &[&str]) -> Self {
        Self::new(StreamScript::HangAfter(to_owned_all(fragments)))
    }

    /// Stream the fragments, then close without signalling completion
    #[must_use]
    pub fn ending_after(fragments: &[&str]) -> Self {
        Self::new(StreamScript::EndAfter(to_owned_all(fragments)))
    }

    fn new(stream: StreamScript) -> Self {
        Self {
            streams: vec![stream],
            title: Ok("Scripted Title".to_owned()),
            capabilities: LlmCapabilities::text_only(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Stream these fragments on the next streaming call instead
    ///
    /// The last script repeats once every earlier one has been used.
    #[must_use]
    pub fn then_fragments(mut self, fragments: &[&str]) -> Self {
        self.streams.push(StreamScript::Fragments(to_owned_all(fragments)));
        self
    }

    /// Advertise a different capability set
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: LlmCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Reply to non-streaming calls with `title`
    #[must_use]
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Ok(title.to_owned());
        self
    }

    /// Fail non-streaming calls
    #[must_use]
    pub fn with_failing_title(mut self) -> Self {
        self.title = Err("title model unavailable".to_owned());
        self
    }

    /// Every request seen so far, streaming and not
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Streaming requests seen so far
    pub fn stream_requests(&self) -> Vec<ChatRequest> {
        self.requests().into_iter().filter(|r| r.stream).collect()
    }

    fn record(&self, request: &ChatRequest) {
        self.requests.lock().unwrap().push(request.clone());
    }
}

fn to_owned_all(fragments: &[&str]) -> Vec<String> {
    fragments.iter().map(|f| (*f).to_owned()).collect()
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn display_name(&self) -> &'static str {
        "Scripted Provider"
    }

    fn capabilities(&self) -> LlmCapabilities {
        self.capabilities
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        self.record(request);
        match &self.title {
            Ok(title) => Ok(ChatResponse {
                content: title.clone(),
                model: request.model.clone().unwrap_or_default(),
                usage: None,
                finish_reason: Some("stop".to_owned()),
            }),
            Err(message) => Err(AppError::external_service("Scripted", message.clone())),
        }
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        let call = self.stream_requests().len();
        self.record(request);
        let script = self.streams[call.min(self.streams.len() - 1)].clone();

        if let StreamScript::RefuseToOpen(message) = script {
            return Err(AppError::external_service("Scripted", message));
        }

        let stream = async_stream::stream! {
            match script {
                StreamScript::Fragments(fragments) => {
                    for fragment in fragments {
                        yield Ok(StreamChunk::delta(fragment));
                    }
                    yield Ok(StreamChunk::done());
                }
                StreamScript::FailAfter(fragments, message) => {
                    for fragment in fragments {
                        yield Ok(StreamChunk::delta(fragment));
                    }
                    yield Err(AppError::external_service("Scripted", message));
                }
                StreamScript::HangAfter(fragments) => {
                    for fragment in fragments {
                        yield Ok(StreamChunk::delta(fragment));
                    }
                    std::future::pending::<()>().await;
                }
                StreamScript::EndAfter(fragments) => {
                    for fragment in fragments {
                        yield Ok(StreamChunk::delta(fragment));
                    }
                }
                StreamScript::RefuseToOpen(_) => {}
            }
        };
        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        Ok(true)
    }
}
