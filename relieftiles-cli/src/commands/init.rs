//! Init command - write the default configuration file.

use std::path::Path;

use relieftiles::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Run the init command.
///
/// Writes a commented config file with default values to `path`, or to
/// `~/.relieftiles/config.ini` when no path is given. An existing file is
/// kept unless `force` is set.
pub fn run(path: Option<&Path>, force: bool) -> Result<(), CliError> {
    let written = match (path, force) {
        (Some(path), true) => {
            ConfigFile::default().save_to(path)?;
            true
        }
        (Some(path), false) => ConfigFile::ensure_exists_at(path)?,
        (None, true) => {
            ConfigFile::default().save()?;
            true
        }
        (None, false) => ConfigFile::ensure_exists()?,
    };
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_file_path);

    if !written {
        println!("Configuration file already exists: {}", path.display());
        println!("Use --force to replace it with defaults.");
        return Ok(());
    }

    let config = ConfigFile::default();
    println!("Configuration file: {}", path.display());
    println!("  Tiles: {}", config.storage.directory.display());
    println!("  Logs:  {}", config.logging.directory.display());
    println!();
    println!("Edit this file to add layers or regions, or to change request pacing.");
    Ok(())
}
