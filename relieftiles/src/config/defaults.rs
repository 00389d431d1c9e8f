//! Default values and paths.

use std::net::SocketAddr;
use std::path::PathBuf;

pub use crate::fetch::{DEFAULT_BLOCKED_TILE_SIZE, DEFAULT_MAX_DELAY_SECS, DEFAULT_MIN_DELAY_SECS};
pub use crate::jobs::DEFAULT_JOB_RETENTION;
pub use crate::logging::DEFAULT_LOG_FILE;
pub use crate::orchestrator::DEFAULT_PROGRESS_BUFFER;
pub use crate::provider::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};

/// Name of the per-user configuration directory under `$HOME`.
pub const CONFIG_DIR_NAME: &str = ".relieftiles";

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Get the path to the config directory (~/.relieftiles).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Get the path to the config file (~/.relieftiles/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

/// Default tile tree (~/.relieftiles/tiles).
pub fn default_tiles_dir() -> PathBuf {
    config_directory().join("tiles")
}

/// Default log directory (~/.relieftiles/logs).
pub fn default_log_dir() -> PathBuf {
    config_directory().join("logs")
}

/// Default listen address, 127.0.0.1:8003.
pub fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8003))
}
