// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides in-memory databases, wired server resources and user fixtures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `devgpt_server`

use std::sync::{Arc, Once};
use std::time::Duration;

use anyhow::Result;
use devgpt_server::{
    auth::{hash_password, AuthManager},
    config::{DatabaseUrl, ServerConfig},
    database::Database,
    llm::LlmProvider,
    models::{User, UserRole},
    resources::ServerResources,
    services::RelayConfig,
};

static INIT_LOGGER: Once = Once::new();

/// Secret shared by every test `AuthManager`
pub const TEST_JWT_SECRET: &[u8] = b"devgpt-test-secret-devgpt-test-secret";

/// Password given to fixture users
pub const TEST_PASSWORD: &str = "hunter22";

/// Initialize quiet logging once per test binary
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        let _ = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init();
    });
}

/// Fresh in-memory database with migrations applied
pub async fn create_test_database() -> Result<Database> {
    init_test_logging();
    Ok(Database::new("sqlite::memory:").await?)
}

/// Relay limits short enough for tests that exercise timeouts
pub fn fast_relay_config() -> RelayConfig {
    RelayConfig {
        stream_timeout: Duration::from_secs(5),
        title_timeout: Duration::from_secs(2),
        ..RelayConfig::default()
    }
}

/// Server resources over an in-memory database and the given provider
pub async fn create_test_server_resources(
    provider: Arc<dyn LlmProvider>,
) -> Result<Arc<ServerResources>> {
    create_test_server_resources_with(provider, fast_relay_config()).await
}

/// Like [`create_test_server_resources`] with explicit relay limits
pub async fn create_test_server_resources_with(
    provider: Arc<dyn LlmProvider>,
    relay: RelayConfig,
) -> Result<Arc<ServerResources>> {
    let database = create_test_database().await?;
    let config = ServerConfig {
        database: DatabaseUrl::Memory,
        relay,
        ..ServerConfig::default()
    };

    Ok(Arc::new(ServerResources::new(
        database,
        AuthManager::new(TEST_JWT_SECRET, 24),
        provider,
        Arc::new(config),
    )))
}

/// Insert a user with [`TEST_PASSWORD`]
pub async fn create_test_user(database: &Database, email: &str) -> Result<User> {
    let user = User::new(
        "Test User".to_owned(),
        email.to_owned(),
        hash_password(TEST_PASSWORD.to_owned()).await?,
    );
    database.create_user(&user).await?;
    Ok(user)
}

/// Insert an admin user with [`TEST_PASSWORD`]
pub async fn create_test_admin(database: &Database, email: &str) -> Result<User> {
    let user = create_test_user(database, email).await?;
    let admin = database
        .update_user_moderation(user.id, None, Some(UserRole::Admin))
        .await?
        .ok_or_else(|| anyhow::anyhow!("admin fixture vanished"))?;
    Ok(admin)
}

/// `Authorization` header value for `user`
pub fn bearer_for(resources: &ServerResources, user: &User) -> Result<String> {
    let token = resources.auth_manager.generate_token(user)?;
    Ok(format!("Bearer {token}"))
}
