//! Application state, router and server loop

use crate::auth::ActorResolver;
use crate::routes;
use async_trait::async_trait;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use taskhook_foundation::{Error, Result, TaskSigner};
use taskhook_provider::{HealthReport, OllamaClient};
use taskhook_task::TaskService;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Prefix every route is mounted under
pub const API_PREFIX: &str = "/api/v1";

/// Downstream health check behind `GET /health/`
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> HealthReport;
}

#[async_trait]
impl HealthProbe for OllamaClient {
    async fn check(&self) -> HealthReport {
        self.health().await
    }
}

/// Shared state handed to every handler
pub struct AppState {
    pub service: TaskService,
    pub signer: Arc<TaskSigner>,
    pub auth: Arc<dyn ActorResolver>,
    pub health: Arc<dyn HealthProbe>,
}

impl AppState {
    pub fn new(
        service: TaskService,
        signer: Arc<TaskSigner>,
        auth: Arc<dyn ActorResolver>,
        health: Arc<dyn HealthProbe>,
    ) -> Self {
        Self {
            service,
            signer,
            auth,
            health,
        }
    }
}

/// Full router, routes nested under [`API_PREFIX`]
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest(API_PREFIX, routes::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` resolves
pub async fn serve<F>(addr: &str, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("Invalid bind address {}: {}", addr, e)))?;
    let listener = TcpListener::bind(addr).await?;

    serve_listener(listener, state, shutdown).await
}

/// Serve on an already-bound listener
pub async fn serve_listener<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "Starting Taskhook API server");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("API server stopped");
    Ok(())
}
