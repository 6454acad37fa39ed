// ABOUTME: Line-buffering Server-Sent Events parser for upstream completion streams
// ABOUTME: Handles partial lines across TCP boundaries and multiple events per chunk
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # SSE Stream Parser
//!
//! Upstream completion APIs stream `data:` lines terminated by `data: [DONE]`.
//! TCP does not align network chunks with SSE lines, so this parser:
//!
//! 1. emits every event contained in one `bytes_stream()` chunk, and
//! 2. buffers a JSON payload split across two chunks until its newline arrives.
//!
//! Lines are buffered as raw bytes and decoded only once complete, so a
//! multi-byte UTF-8 character split between chunks survives intact.
//!
//! The provider supplies a `parse_data` closure turning one JSON payload into
//! a `StreamChunk`; framing and `[DONE]` detection live here.

use std::collections::VecDeque;
use std::mem;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::stream::unfold;
use futures_util::{future, Stream, StreamExt};

use super::{ChatStream, StreamChunk};
use crate::errors::AppError;

const DONE_LINE: &str = "data: [DONE]";

/// A parsed SSE event from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A `data:` payload with the JSON string (prefix stripped)
    Data(String),
    /// The `[DONE]` termination signal
    Done,
}

/// Line-buffering SSE parser
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    /// Create a new empty line buffer
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed raw bytes, returning the events completed by them
    ///
    /// A trailing partial line stays buffered for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            if let Some(event) = parse_line(&String::from_utf8_lossy(&self.buffer[start..end])) {
                events.push(event);
            }
            start = end + 1;
        }
        self.buffer.drain(..start);
        events
    }

    /// Parse whatever is left once the byte stream has ended
    pub fn flush(&mut self) -> Option<SseEvent> {
        let remaining = mem::take(&mut self.buffer);
        parse_line(&String::from_utf8_lossy(&remaining))
    }
}

fn parse_line(line: &str) -> Option<SseEvent> {
    let trimmed = line.trim();
    if trimmed == DONE_LINE {
        return Some(SseEvent::Done);
    }
    // event:, id:, retry: and `:` comments carry nothing we relay
    trimmed
        .strip_prefix("data:")
        .map(str::trim_start)
        .filter(|data| !data.trim().is_empty())
        .map(|data| SseEvent::Data(data.to_owned()))
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

struct SseStreamState<F> {
    bytes: ByteStream,
    parser: SseLineBuffer,
    pending: VecDeque<Result<StreamChunk, AppError>>,
    parse_data: F,
    provider_name: &'static str,
    stream_ended: bool,
}

impl<F> SseStreamState<F>
where
    F: Fn(&str) -> Option<Result<StreamChunk, AppError>>,
{
    fn enqueue(&mut self, event: SseEvent) {
        match event {
            SseEvent::Data(json_str) => {
                if let Some(result) = (self.parse_data)(&json_str) {
                    self.pending.push_back(result);
                }
            }
            SseEvent::Done => self.pending.push_back(Ok(StreamChunk::done())),
        }
    }
}

/// Wrap a raw byte stream into an ordered `ChatStream`
///
/// `parse_data` returns `None` for payloads that produce no output (role-only
/// deltas, usage frames). Empty non-final deltas are filtered out.
pub fn create_sse_stream<S, F>(
    byte_stream: S,
    parse_data: F,
    provider_name: &'static str,
) -> ChatStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    F: Fn(&str) -> Option<Result<StreamChunk, AppError>> + Send + 'static,
{
    let state = SseStreamState {
        bytes: Box::pin(byte_stream),
        parser: SseLineBuffer::new(),
        pending: VecDeque::new(),
        parse_data,
        provider_name,
        stream_ended: false,
    };

    let stream = unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.stream_ended {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    for event in state.parser.feed(&bytes) {
                        state.enqueue(event);
                    }
                }
                Some(Err(e)) => {
                    state.stream_ended = true;
                    let err = AppError::external_service(
                        state.provider_name,
                        format!("Stream read error: {e}"),
                    );
                    return Some((Err(err), state));
                }
                None => {
                    state.stream_ended = true;
                    if let Some(event) = state.parser.flush() {
                        state.enqueue(event);
                    }
                }
            }
        }
    });

    let filtered = stream.filter(|result| {
        future::ready(
            result
                .as_ref()
                .map_or(true, |chunk| !chunk.delta.is_empty() || chunk.is_final),
        )
    });

    Box::pin(filtered)
}
