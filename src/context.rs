// ABOUTME: Per-request identity and lifecycle context passed from routes into services
// ABOUTME: Carries the request id, resolved owner, caller info and a cancellation token
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
pub use crate::models::Owner;
use crate::models::{ClientInfo, User};

/// Request context that flows through the entire request lifecycle
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id, echoed in `x-request-id`
    pub request_id: String,
    /// Who owns the resources this request touches
    pub owner: Owner,
    /// The authenticated account, if any
    pub user: Option<User>,
    /// Caller address and user agent
    pub client: ClientInfo,
    /// Fires when the request is abandoned
    pub cancellation: CancellationToken,
}

impl RequestContext {
    /// Context for a caller without a session
    #[must_use]
    pub fn anonymous(request_id: impl Into<String>, client: ClientInfo) -> Self {
        Self {
            request_id: request_id.into(),
            owner: Owner::Anonymous,
            user: None,
            client,
            cancellation: CancellationToken::new(),
        }
    }

    /// Context for a verified, non-banned user
    #[must_use]
    pub fn authenticated(request_id: impl Into<String>, client: ClientInfo, user: User) -> Self {
        Self {
            request_id: request_id.into(),
            owner: Owner::Authenticated(user.id),
            user: Some(user),
            client,
            cancellation: CancellationToken::new(),
        }
    }

    /// The authenticated user
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired` for anonymous callers
    pub fn require_user(&self) -> AppResult<&User> {
        self.user.as_ref().ok_or_else(AppError::auth_required)
    }

    /// The authenticated user's id
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired` for anonymous callers
    pub fn require_user_id(&self) -> AppResult<Uuid> {
        self.owner.user_id().ok_or_else(AppError::auth_required)
    }

    /// Attach this request's id to an error
    #[must_use]
    pub fn tag(&self, error: AppError) -> AppError {
        error.with_request_id(self.request_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_context_has_no_user() {
        let ctx = RequestContext::anonymous("req_1", ClientInfo::default());
        assert_eq!(ctx.owner, Owner::Anonymous);
        assert_eq!(ctx.require_user_id().unwrap_err().http_status(), 401);
        assert!(!ctx.cancellation.is_cancelled());
    }

    #[test]
    fn test_authenticated_context_owner_matches_user() {
        let user = User::new("Lin".to_owned(), "lin@example.com".to_owned(), "h".to_owned());
        let id = user.id;
        let ctx = RequestContext::authenticated("req_2", ClientInfo::default(), user);
        assert_eq!(ctx.owner, Owner::Authenticated(id));
        assert_eq!(ctx.require_user().unwrap().id, id);

        let err = ctx.tag(AppError::not_found("Chat not found"));
        assert_eq!(err.context.request_id.as_deref(), Some("req_2"));
    }
}
