//! Application bootstrap implementation.
//!
//! Wires the fetch client, tile store, orchestrator and job manager from a
//! loaded [`ConfigFile`] so the CLI commands and the HTTP server share one
//! construction path.

use std::sync::Arc;

use tracing::info;

use super::error::AppError;
use crate::config::ConfigFile;
use crate::fetch::FetchClient;
use crate::jobs::JobManager;
use crate::orchestrator::DownloadOrchestrator;
use crate::provider::{AsyncHttpClient, ReqwestClient};
use crate::store::TileStore;

/// A configured relieftiles instance.
///
/// # Example
///
/// ```ignore
/// use relieftiles::app::ReliefTilesApp;
/// use relieftiles::config::ConfigFile;
///
/// let app = ReliefTilesApp::start(ConfigFile::load()?)?;
/// let id = app.manager().submit(&request).await?;
///
/// // Later: cancel running jobs and wait for them
/// app.shutdown().await;
/// ```
pub struct ReliefTilesApp<C: AsyncHttpClient + 'static = ReqwestClient> {
    config: ConfigFile,
    manager: Arc<JobManager<C>>,
}

impl ReliefTilesApp<ReqwestClient> {
    /// Start the application with an HTTP client built from `[fetch]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration has no layers or the HTTP
    /// client cannot be built.
    pub fn start(config: ConfigFile) -> Result<Self, AppError> {
        let client = config.fetch_config().http_client()?;
        Self::with_client(config, client)
    }
}

impl<C: AsyncHttpClient + 'static> ReliefTilesApp<C> {
    /// Start the application with a caller-supplied HTTP client.
    pub fn with_client(config: ConfigFile, client: C) -> Result<Self, AppError> {
        if config.layers.is_empty() {
            return Err(AppError::Config("no layers configured".to_string()));
        }

        let fetch_config = config.fetch_config();
        let store = TileStore::new(config.store_config());
        let layers = config.layer_set();

        info!(
            base_dir = %store.base_dir().display(),
            layers = ?layers.names(),
            min_delay_secs = fetch_config.min_delay.as_secs_f64(),
            max_delay_secs = fetch_config.max_delay.as_secs_f64(),
            "Tile engine configured"
        );

        let orchestrator =
            DownloadOrchestrator::new(FetchClient::new(client, fetch_config), store, layers);
        let manager = Arc::new(
            JobManager::new(orchestrator, config.server.progress_buffer)
                .with_job_retention(config.server.job_retention),
        );

        Ok(Self { config, manager })
    }

    /// The configuration this instance was started with.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// The job manager.
    pub fn manager(&self) -> &Arc<JobManager<C>> {
        &self.manager
    }

    /// The tile store.
    pub fn store(&self) -> &TileStore {
        self.manager.orchestrator().store()
    }

    /// Cancel running jobs and wait for them to stop.
    pub async fn shutdown(&self) {
        info!("Shutting down");
        self.manager.shutdown().await;
    }
}
