// ABOUTME: Centralized resource container shared by every route handler
// ABOUTME: Builds the database, auth manager, model provider and services once at startup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Server Resources
//!
// NOTE: `.clone()` calls in this file only copy `Arc` handles.
//!
//! Expensive objects are created once and handed to handlers through axum
//! state instead of being rebuilt per request.

use std::sync::Arc;

use crate::auth::AuthManager;
use crate::config::ServerConfig;
use crate::database::{ChatManager, Database};
use crate::llm::LlmProvider;
use crate::services::{AccountService, ChatRelay};

/// Centralized resource container for dependency injection
#[derive(Clone)]
pub struct ServerResources {
    /// Users, conversations and audit trail
    pub database: Arc<Database>,
    /// JWT issue and validation
    pub auth_manager: Arc<AuthManager>,
    /// Upstream model provider
    pub llm_provider: Arc<dyn LlmProvider>,
    /// Account operations
    pub accounts: AccountService,
    /// Streaming completion relay
    pub relay: ChatRelay,
    /// Startup configuration
    pub config: Arc<ServerConfig>,
}

impl ServerResources {
    /// Wire the shared resources together
    #[must_use]
    pub fn new(
        database: Database,
        auth_manager: AuthManager,
        llm_provider: Arc<dyn LlmProvider>,
        config: Arc<ServerConfig>,
    ) -> Self {
        let database = Arc::new(database);
        let auth_manager = Arc::new(auth_manager);

        let accounts = AccountService::new(database.clone(), auth_manager.clone());
        let relay = ChatRelay::new(database.chat(), llm_provider.clone(), config.relay);

        Self {
            database,
            auth_manager,
            llm_provider,
            accounts,
            relay,
            config,
        }
    }

    /// Conversation store
    #[must_use]
    pub fn chats(&self) -> ChatManager {
        self.database.chat()
    }
}
