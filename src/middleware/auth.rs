// ABOUTME: Bearer-token authentication helpers used by the route handlers
// ABOUTME: Resolves required, optional and admin callers into a RequestContext
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Three flavours of caller resolution:
//!
//! - [`require_auth`]: a valid token for an existing, non-banned user
//! - [`optional_auth`]: like `require_auth`, but a missing or unusable token
//!   yields an anonymous caller; a banned account is still refused
//! - [`require_admin`]: `require_auth` plus the admin role

use http::header::{AUTHORIZATION, USER_AGENT};
use http::HeaderMap;
use tracing::{debug, Span};

use super::tracing::request_id_from_headers;
use crate::context::RequestContext;
use crate::errors::{AppError, AppResult};
use crate::models::{ClientInfo, User};
use crate::resources::ServerResources;

/// Extract the token from `Authorization: Bearer <token>`
#[must_use]
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Caller address and user agent for the audit trail
#[must_use]
pub fn client_info(headers: &HeaderMap) -> ClientInfo {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned);

    ClientInfo {
        ip_address,
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned),
    }
}

/// Verify `token` and load its user
async fn resolve_user(token: &str, resources: &ServerResources) -> AppResult<User> {
    let claims = resources.auth_manager.validate_token(token)?;
    let user = resources
        .database
        .get_user(claims.user_id()?)
        .await?
        .ok_or_else(|| AppError::auth_invalid("Not authorized, user not found"))?;

    if user.is_banned {
        return Err(AppError::account_banned().with_user_id(user.id));
    }
    Ok(user)
}

fn authenticated_context(headers: &HeaderMap, user: User) -> RequestContext {
    Span::current().record("user_id", tracing::field::display(user.id));
    RequestContext::authenticated(request_id_from_headers(headers), client_info(headers), user)
}

/// Resolve a caller that must be signed in
///
/// # Errors
///
/// Returns 401 for a missing, invalid or expired token or an unknown user,
/// and 403 for a banned account
pub async fn require_auth(
    headers: &HeaderMap,
    resources: &ServerResources,
) -> AppResult<RequestContext> {
    let request_id = request_id_from_headers(headers);
    let token = extract_bearer_token(headers)
        .ok_or_else(|| AppError::auth_required().with_request_id(request_id.clone()))?;

    let user = resolve_user(token, resources)
        .await
        .map_err(|e| e.with_request_id(request_id))?;
    Ok(authenticated_context(headers, user))
}

/// Resolve a caller that may be anonymous
///
/// # Errors
///
/// Returns 403 if the token belongs to a banned account, or a server error
/// if the user lookup fails
pub async fn optional_auth(
    headers: &HeaderMap,
    resources: &ServerResources,
) -> AppResult<RequestContext> {
    let request_id = request_id_from_headers(headers);
    let anonymous = || RequestContext::anonymous(request_id.clone(), client_info(headers));

    let Some(token) = extract_bearer_token(headers) else {
        return Ok(anonymous());
    };

    match resolve_user(token, resources).await {
        Ok(user) => Ok(authenticated_context(headers, user)),
        Err(e) if e.http_status() == 401 => {
            debug!("Ignoring unusable token on optional-auth route: {}", e.message);
            Ok(anonymous())
        }
        Err(e) => Err(e.with_request_id(request_id)),
    }
}

/// Resolve a caller that must hold the admin role
///
/// # Errors
///
/// Returns the errors of [`require_auth`], or 403 for non-admin users
pub async fn require_admin(
    headers: &HeaderMap,
    resources: &ServerResources,
) -> AppResult<RequestContext> {
    let ctx = require_auth(headers, resources).await?;
    if ctx.user.as_ref().is_some_and(User::is_admin) {
        Ok(ctx)
    } else {
        Err(ctx.tag(AppError::permission_denied("Admin access required")))
    }
}
