// ABOUTME: HTTP middleware for request tracing, authentication, and CORS
// ABOUTME: Provides request ID generation, span creation and caller resolution
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Bearer-token caller resolution
pub mod auth;
/// CORS layer
pub mod cors;
/// Request ids and spans
pub mod tracing;

pub use auth::{client_info, extract_bearer_token, optional_auth, require_admin, require_auth};
pub use cors::setup_cors;
pub use tracing::{create_request_span, request_id_from_headers, MakeRequestUuid, REQUEST_ID_HEADER};
