// ABOUTME: Advisory trial counter for anonymous completions
// ABOUTME: Authenticated callers are never limited; the count resets when the caller signs in
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Anonymous trial usage
//!
//! This counter belongs to the client. The relay never consults it, so an
//! anonymous caller that ignores it is not stopped by the server.

use serde::{Deserialize, Serialize};

use crate::constants::limits::TRIAL_LIMIT;
use crate::models::Owner;

/// Free completions used by one anonymous device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialUsage {
    /// Completions used so far
    pub used: u32,
    /// Completions allowed before sign-in is required
    pub limit: u32,
}

impl Default for TrialUsage {
    fn default() -> Self {
        Self::with_limit(TRIAL_LIMIT)
    }
}

impl TrialUsage {
    /// A fresh counter with a custom limit
    #[must_use]
    pub const fn with_limit(limit: u32) -> Self {
        Self { used: 0, limit }
    }

    /// Whether `owner` may send another message
    #[must_use]
    pub const fn can_use(&self, owner: Owner) -> bool {
        owner.is_authenticated() || self.used < self.limit
    }

    /// Count one anonymous completion
    ///
    /// Returns `false` without counting once the limit is reached.
    /// Authenticated callers are not counted.
    pub fn increment(&mut self, owner: Owner) -> bool {
        if owner.is_authenticated() {
            return true;
        }
        if self.used >= self.limit {
            return false;
        }
        self.used += 1;
        true
    }

    /// Clear the count after a successful sign-in
    pub fn reset(&mut self) {
        self.used = 0;
    }

    /// Anonymous completions left
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }
}
