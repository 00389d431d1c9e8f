//! Configuration management.
//!
//! Settings are read from `~/.relieftiles/config.ini`. Missing keys fall
//! back to the defaults in [`defaults`]; a missing file is the same as an
//! empty one.
//!
//! ```ini
//! [storage]
//! directory = ~/.relieftiles/tiles
//! blocked_tile_size = 7412
//!
//! [fetch]
//! min_delay = 3
//! max_delay = 5
//!
//! [layer.topo]
//! url = https://{s}.tile.opentopomap.org/{z}/{x}/{y}.png
//! servers = a,b,c
//! max_zoom = 17
//!
//! [region.oxford]
//! lat = 51.752
//! lon = -1.2577
//! radius_miles = 3
//! min_zoom = 12
//! max_zoom = 15
//! layers = osm,topo
//! ```

pub mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{
    config_directory, config_file_path, default_bind, default_log_dir, default_tiles_dir,
};
pub use file::ConfigFileError;
pub use settings::{ConfigFile, FetchSettings, LoggingSettings, ServerSettings, StorageSettings};
