//! HTTP API.
//!
//! # Routes
//!
//! | Method & path | Behavior |
//! |---|---|
//! | `POST /tiles/download` | submit a polling job, `202 {"jobId"}` |
//! | `GET /tiles/download` | run a job bound to the connection, server-sent events |
//! | `GET /tiles/jobs` | list polling jobs |
//! | `GET /tiles/jobs/:id` | job snapshot |
//! | `DELETE /tiles/jobs/:id` | cancel a job, `202` |
//! | `GET /tiles/status` | stored tile counts per layer |
//! | `GET /tiles/blocked?layer=` | stored placeholder audit |
//! | `GET /tiles/:layer/:z/:x/:y.png` | stored tile bytes |
//!
//! Errors are JSON `{"error": message}` with status 400, 404 or 500.

mod error;
mod handlers;

pub use error::{ApiError, ServerError};
pub use handlers::{BlockedResponse, StatusResponse, StreamQuery, SubmitResponse};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::default_bind;
use crate::jobs::JobManager;
use crate::orchestrator::DEFAULT_PROGRESS_BUFFER;
use crate::provider::AsyncHttpClient;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Event queue capacity of each streaming job.
    pub progress_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            progress_buffer: DEFAULT_PROGRESS_BUFFER,
        }
    }
}

/// Shared handler state.
pub struct AppState<C: AsyncHttpClient + 'static> {
    pub manager: Arc<JobManager<C>>,
}

impl<C: AsyncHttpClient + 'static> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
        }
    }
}

/// Builds the API router.
pub fn router<C: AsyncHttpClient + 'static>(manager: Arc<JobManager<C>>) -> Router {
    let state = AppState { manager };

    Router::new()
        .route(
            "/tiles/download",
            get(handlers::stream_download::<C>).post(handlers::submit_download::<C>),
        )
        .route("/tiles/jobs", get(handlers::list_jobs::<C>))
        .route(
            "/tiles/jobs/:id",
            get(handlers::get_job::<C>).delete(handlers::cancel_job::<C>),
        )
        .route("/tiles/status", get(handlers::status::<C>))
        .route("/tiles/blocked", get(handlers::blocked_tiles::<C>))
        .route("/tiles/:layer/:z/:x/:file", get(handlers::serve_tile::<C>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API until `shutdown` resolves, then cancels running jobs.
pub async fn serve<C, F>(
    config: &ServerConfig,
    manager: Arc<JobManager<C>>,
    shutdown: F,
) -> Result<(), ServerError>
where
    C: AsyncHttpClient + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.bind,
            source,
        })?;

    info!(addr = %config.bind, "Tile API listening");

    axum::serve(listener, router(Arc::clone(&manager)))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)?;

    info!("Tile API stopped, cancelling running jobs");
    manager.shutdown().await;
    Ok(())
}
