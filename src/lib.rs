//! # LMS API
//!
//! Learning management system backend exposing users, courses and
//! enrollments over HTTP:
//!
//! - **Uniform envelope**: every response, success or failure, is an `ApiResponse`
//! - **Typed pipeline**: each operation is a request with a static response type,
//!   normalized into the envelope on its way out
//! - **Storage**: file-backed JSON documents or `PostgreSQL`, committed through a unit of work
//! - **Auth**: argon2 password hashes and HS256 bearer tokens
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                             LMS API                                  │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌────────────┐ │
//! │  │   API Layer │  │  Pipeline + │  │   Storage   │  │  Domain    │ │
//! │  │  (Axum)     │→ │  Services   │→ │   Layer     │  │  Models    │ │
//! │  └─────────────┘  └─────────────┘  └─────────────┘  └────────────┘ │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod service;
pub mod storage;
pub mod telemetry;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use crate::api::create_router;
use crate::api::state::AppState;
use crate::config::AppConfig;
use crate::service::AppServices;
use crate::storage::create_storage;

/// Build the application router from configuration.
///
/// Initializes storage, seeds the bootstrap admin when configured and wires
/// the services into the router.
///
/// # Errors
///
/// Returns an error if the storage backend or the services fail to initialize.
pub async fn build_app(config: AppConfig) -> anyhow::Result<Router> {
    let storage = create_storage(&config.storage).await?;
    let services = AppServices::new(&config, storage)?;

    if let Some(admin) = &config.auth.bootstrap_admin {
        services.seed_admin(admin).await?;
    }

    let metrics = telemetry::metrics_handle(&config.observability);
    let state = AppState::new(Arc::new(config), services, metrics);

    Ok(create_router(state))
}

/// Run the LMS API service.
///
/// This function:
/// 1. Loads configuration from `.env`, files and environment
/// 2. Initializes logging and metrics
/// 3. Builds storage, services and the router
/// 4. Starts the HTTP server
/// 5. Handles graceful shutdown
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded
/// - Storage backend fails to initialize
/// - HTTP server fails to bind
pub async fn run() -> anyhow::Result<()> {
    if let Err(err) = dotenvy::dotenv()
        && !err.not_found()
    {
        return Err(err.into());
    }

    let config = AppConfig::load()?;

    telemetry::init_logging(&config.observability);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting LMS API");

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let app = build_app(config).await?;

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown");
        }
        () = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
