//! REST surface of the dashboard: dataset queries and the remark workflow.

pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub use auth::AuthenticatedActor;
pub use error::{ApiError, ErrorBody};
pub use extract::{ApiJson, ApiPath, ApiQuery};

use crate::access::{RolePolicy, TokenAuthenticator};
use crate::app::Services;
use crate::config::DashboardConfig;
use crate::records::TableRecordStore;
use crate::shutdown::{shutdown_signal, ShutdownCoordinator};
use crate::workflows::WorkflowEngine;

/// Shared state handed to every handler.
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub records: Arc<TableRecordStore>,
    pub authenticator: TokenAuthenticator,
    pub default_limit: usize,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/stages", get(handlers::stages))
        .route("/api/stats", get(handlers::stats))
        .route("/api/stats/detailed", get(handlers::detailed))
        .route("/api/data", get(handlers::data))
        .route("/api/columns/{column}/values", get(handlers::column_values))
        .route("/api/refresh", post(handlers::refresh))
        .route(
            "/api/records/{id}/remark",
            get(handlers::get_remark).post(handlers::apply_transition),
        )
        .route("/api/records/{id}/remark/history", get(handlers::get_history))
        .with_state(state)
}

/// Run the HTTP server until SIGINT/SIGTERM, then shut down gracefully.
pub async fn serve(config: &DashboardConfig) -> Result<()> {
    let policy = Arc::new(RolePolicy::from_config(&config.access));
    let services = Services::build(config, policy).await?;

    let state = Arc::new(AppState {
        engine: services.engine.clone(),
        records: services.records.clone(),
        authenticator: TokenAuthenticator::from_config(&config.access),
        default_limit: config.server.default_limit,
    });

    let address = config.server.bind_address;
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    ShutdownCoordinator::new(services.repository)
        .shutdown_all_services()
        .await
}
