// ABOUTME: Server binary for the DevGPT chat relay
// ABOUTME: Loads configuration, opens the database and serves the HTTP API until shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # `DevGPT` Server Binary
//!
//! Starts the HTTP API with user authentication, conversation storage and
//! streamed completions.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use devgpt_server::{
    auth::{generate_jwt_secret, AuthManager},
    config::{DatabaseUrl, ServerConfig},
    database::Database,
    errors::set_expose_internal_details,
    llm::GroqProvider,
    logging,
    resources::ServerResources,
    routes::build_router,
};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "devgpt-server")]
#[command(about = "DevGPT - AI coding assistant chat relay")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override database URL (`sqlite:<path>` or `sqlite::memory:`)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(database_url) = args.database_url {
        config.database = DatabaseUrl::parse_url(&database_url)?;
    }

    set_expose_internal_details(!config.environment.is_production());
    info!("{}", config.summary());

    let database = Database::new(&config.database.to_connection_string()).await?;

    let auth_manager = match &config.auth.jwt_secret {
        Some(secret) => AuthManager::new(secret.as_bytes(), config.auth.jwt_expiry_hours),
        None => {
            warn!("JWT_SECRET not set; tokens will not survive a restart");
            AuthManager::new(&generate_jwt_secret()?, config.auth.jwt_expiry_hours)
        }
    };

    let provider = GroqProvider::new(config.groq.clone())?;
    if !provider.is_configured() {
        warn!("Groq provider has no API key; message sends will report an upstream error");
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.http_port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.http_port))?;

    let resources = Arc::new(ServerResources::new(
        database,
        auth_manager,
        Arc::new(provider),
        Arc::new(config),
    ));
    let app = build_router(resources);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("DevGPT server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("DevGPT server stopped");
    Ok(())
}

/// Resolve on Ctrl-C or, on unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => warn!("Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received, draining connections");
}
