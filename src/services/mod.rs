// ABOUTME: Domain service layer for business logic extracted from route handlers
// ABOUTME: Hosts account management, the completion relay and title inference
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Domain service layer
//!
//! Route handlers stay thin: they resolve the caller and hand a
//! [`crate::context::RequestContext`] to these services.

/// Registration, login, profile, password and moderation
pub mod accounts;

/// Streaming completion relay
pub mod chat_relay;

/// Background conversation titles
pub mod titles;

pub use accounts::AccountService;
pub use chat_relay::{ChatRelay, RelayConfig, RelayEvent, RelayOutcome, RelaySession, SendMessage};
pub use titles::TitleService;
