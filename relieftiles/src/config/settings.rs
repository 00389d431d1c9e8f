//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use super::defaults::*;
use crate::fetch::FetchConfig;
use crate::provider::{LayerConfig, LayerSet};
use crate::region::{RegionPreset, RegionSet};
use crate::server::ServerConfig;
use crate::store::StoreConfig;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Tile storage settings
    pub storage: StorageSettings,
    /// Request pacing and identification
    pub fetch: FetchSettings,
    /// HTTP API settings
    pub server: ServerSettings,
    /// Log file settings
    pub logging: LoggingSettings,
    /// Known layers, built-ins first, in declaration order
    pub layers: Vec<LayerConfig>,
    /// Named areas, built-ins first, in declaration order
    pub regions: Vec<RegionPreset>,
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageSettings {
    /// Root of the tile tree
    pub directory: PathBuf,
    /// Byte length of the throttling placeholder image
    pub blocked_tile_size: u64,
}

/// `[fetch]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    /// Minimum pre-request delay in seconds
    pub min_delay: f64,
    /// Maximum pre-request delay in seconds
    pub max_delay: f64,
    /// Request timeout in seconds
    pub timeout: u64,
    /// User-Agent header
    pub user_agent: String,
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub bind: SocketAddr,
    /// Event queue capacity per streaming job
    pub progress_buffer: usize,
    /// Finished polling jobs kept for lookup
    pub job_retention: usize,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            storage: StorageSettings {
                directory: default_tiles_dir(),
                blocked_tile_size: DEFAULT_BLOCKED_TILE_SIZE,
            },
            fetch: FetchSettings {
                min_delay: DEFAULT_MIN_DELAY_SECS,
                max_delay: DEFAULT_MAX_DELAY_SECS,
                timeout: DEFAULT_TIMEOUT_SECS,
                user_agent: DEFAULT_USER_AGENT.to_string(),
            },
            server: ServerSettings {
                bind: default_bind(),
                progress_buffer: DEFAULT_PROGRESS_BUFFER,
                job_retention: DEFAULT_JOB_RETENTION,
            },
            logging: LoggingSettings {
                directory: default_log_dir(),
                file: DEFAULT_LOG_FILE.to_string(),
            },
            layers: vec![LayerConfig::osm(), LayerConfig::satellite()],
            regions: vec![
                RegionPreset::london(),
                RegionPreset::uk(),
                RegionPreset::abingdon(),
            ],
        }
    }
}

impl ConfigFile {
    /// Settings for the fetch client.
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            min_delay: Duration::from_secs_f64(self.fetch.min_delay),
            max_delay: Duration::from_secs_f64(self.fetch.max_delay),
            timeout: Duration::from_secs(self.fetch.timeout),
            blocked_tile_size: self.storage.blocked_tile_size,
            user_agent: self.fetch.user_agent.clone(),
        }
    }

    /// Settings for the tile store.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            base_dir: self.storage.directory.clone(),
            blocked_tile_size: self.storage.blocked_tile_size,
        }
    }

    /// The configured layers.
    pub fn layer_set(&self) -> LayerSet {
        let mut set = LayerSet::empty();
        for layer in &self.layers {
            set.insert(layer.clone());
        }
        set
    }

    /// The configured regions.
    pub fn region_set(&self) -> RegionSet {
        let mut set = RegionSet::empty();
        for region in &self.regions {
            set.insert(region.clone());
        }
        set
    }

    /// Settings for the HTTP API.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind: self.server.bind,
            progress_buffer: self.server.progress_buffer,
        }
    }

    /// Adds a layer or replaces the one with the same name.
    pub fn upsert_layer(&mut self, layer: LayerConfig) {
        match self.layers.iter_mut().find(|l| l.name() == layer.name()) {
            Some(existing) => *existing = layer,
            None => self.layers.push(layer),
        }
    }

    /// Adds a region or replaces the one with the same name.
    pub fn upsert_region(&mut self, region: RegionPreset) {
        match self.regions.iter_mut().find(|r| r.name() == region.name()) {
            Some(existing) => *existing = region,
            None => self.regions.push(region),
        }
    }
}
