//! Application bootstrap and lifecycle management.
//!
//! ```text
//! ConfigFile ──► FetchClient (pacing, blocked detection)
//!            ──► TileStore (on-disk tree)
//!            ──► LayerSet
//!                    │
//!                    ▼
//!            DownloadOrchestrator ──► JobManager ──► CLI / HTTP API
//! ```

mod bootstrap;
mod error;

pub use bootstrap::ReliefTilesApp;
pub use error::AppError;
