// ABOUTME: Main library entry point for the DevGPT chat relay server
// ABOUTME: Accounts, owner-scoped conversations and streamed model replies over HTTP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # `DevGPT` Server
//!
//! Backend for a coding assistant chat. Callers register or stay anonymous,
//! open conversations and receive model replies as server-sent events while
//! the server persists complete exchanges.
//!
//! ## Architecture
//!
//! - **Routes**: thin axum handlers that resolve the caller
//! - **Services**: accounts, the completion relay and title inference
//! - **Database**: `SQLite` stores for users, conversations and the audit trail
//! - **LLM**: the provider trait and the Groq streaming client
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use devgpt_server::config::ServerConfig;
//! use devgpt_server::errors::AppResult;
//!
//! fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("DevGPT server configured on port {}", config.http_port);
//!     Ok(())
//! }
//! ```

// ── Public API ──────────────────────────────────────────────────────────
// Used by the server binary and the integration tests under tests/.

/// Token issue and validation, password hashing
pub mod auth;

/// Environment-driven server configuration
pub mod config;

/// Per-request identity, request id and cancellation
pub mod context;

/// `SQLite` persistence for users, conversations and activity
pub mod database;

/// LLM provider abstraction, Groq client and model catalog
pub mod llm;

/// Structured logging setup
pub mod logging;

/// Request tracing, CORS and caller resolution
pub mod middleware;

/// Domain data types
pub mod models;

/// Advisory anonymous trial counter
pub mod quota;

/// Shared resources handed to route handlers
pub mod resources;

/// HTTP routes and router assembly
pub mod routes;

/// Domain service layer
pub mod services;

/// Unified error handling, re-exported from the core crate
pub use devgpt_core::errors;

/// Application constants, re-exported from the core crate
pub use devgpt_core::constants;
