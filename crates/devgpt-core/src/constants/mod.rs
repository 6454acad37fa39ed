// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Pure data constants for limits, defaults, upstream parameters and client messages
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Constants are grouped by domain rather than kept in one flat list.

/// Service identity
pub mod service_names {
    /// Name used in logs and the root endpoint
    pub const DEVGPT_SERVER: &str = "devgpt-server";
    /// Human-facing API name
    pub const API_DISPLAY_NAME: &str = "DevGPT API";
}

/// API route paths
pub mod routes {
    /// API base path
    pub const API_BASE: &str = "/api";
    /// Health route
    pub const HEALTH: &str = "/api/health";
    /// Readiness route
    pub const READY: &str = "/api/ready";
    /// Authentication routes prefix
    pub const AUTH: &str = "/api/auth";
    /// User profile routes prefix
    pub const USER: &str = "/api/user";
    /// Chat routes prefix
    pub const CHAT: &str = "/api/chat";
    /// Model catalog routes prefix
    pub const MODELS: &str = "/api/models";
    /// Admin moderation routes prefix
    pub const ADMIN: &str = "/api/admin";
}

/// Default limits
pub mod limits {
    /// Default page size when listing conversations
    pub const DEFAULT_CHAT_LIST_LIMIT: u32 = 50;
    /// Largest page size accepted when listing conversations
    pub const MAX_CHAT_LIST_LIMIT: u32 = 100;
    /// Most messages loaded as one conversation's history
    pub const MAX_HISTORY_MESSAGES: i64 = 1000;
    /// Maximum conversation title length in characters
    pub const TITLE_MAX_CHARS: usize = 100;
    /// Minimum password length
    pub const MIN_PASSWORD_LENGTH: usize = 6;
    /// Free completions allowed to an anonymous client
    pub const TRIAL_LIMIT: u32 = 5;
    /// Activity entries returned per user
    pub const ACTIVITY_LOG_LIMIT: i64 = 50;
    /// Request body limit in bytes
    pub const MAX_REQUEST_BODY_BYTES: usize = 10 * 1024 * 1024;
}

/// Default values for configuration and new records
pub mod defaults {
    /// Title given to a conversation before title inference runs
    pub const CHAT_TITLE: &str = "New Chat";
    /// Default HTTP port
    pub const HTTP_PORT: u16 = 3001;
    /// Default bind address
    pub const HOST: &str = "0.0.0.0";
    /// Default database location
    pub const DATABASE_URL: &str = "sqlite:./data/devgpt.db";
    /// Default token lifetime (seven days)
    pub const JWT_EXPIRY_HOURS: i64 = 168;
    /// Max duration of one streaming completion
    pub const STREAM_TIMEOUT_SECS: u64 = 120;
    /// Capacity of the relay channel between upstream reader and SSE writer
    pub const RELAY_CHANNEL_CAPACITY: usize = 32;
    /// Max duration of one title inference
    pub const TITLE_TIMEOUT_SECS: u64 = 30;
}

/// Upstream model parameters
pub mod llm {
    /// Groq OpenAI-compatible API base
    pub const GROQ_API_BASE_URL: &str = "https://api.groq.com/openai/v1";
    /// Sampling temperature for chat completions
    pub const TEMPERATURE: f32 = 0.7;
    /// Completion token cap
    pub const MAX_TOKENS: u32 = 4096;
    /// Connect timeout for the upstream HTTP client
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
}

/// Caller-facing messages shared between layers and tests
pub mod messages {
    /// Unknown or foreign conversation
    pub const CHAT_NOT_FOUND: &str = "Chat not found";
    /// Blank message content
    pub const CONTENT_REQUIRED: &str = "Message content is required";
    /// Uniform login failure
    pub const INVALID_CREDENTIALS: &str = "Invalid credentials";
    /// Duplicate registration
    pub const EMAIL_TAKEN: &str = "Email already registered";
    /// Unknown catalog entry
    pub const MODEL_NOT_FOUND: &str = "Model not found";
    /// Streaming call exceeded its deadline
    pub const STREAM_TIMED_OUT: &str = "Response timed out";
    /// Relay task ended without a terminal event
    pub const STREAM_ENDED_UNEXPECTEDLY: &str = "Stream ended unexpectedly";
    /// Unknown user
    pub const USER_NOT_FOUND: &str = "User not found";
}
