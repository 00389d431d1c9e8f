//! Audit command - list stored throttling placeholders.

use clap::Args;
use relieftiles::config::ConfigFile;
use relieftiles::store::TileStore;

use super::common::runtime;
use crate::error::CliError;

/// Arguments for the audit command.
#[derive(Debug, Clone, Args)]
pub struct AuditArgs {
    /// Only audit this layer
    #[arg(long)]
    pub layer: Option<String>,
}

/// Run the audit command.
pub fn run(args: AuditArgs, config: &ConfigFile) -> Result<(), CliError> {
    let store = TileStore::new(config.store_config());
    let blocked = runtime()?.block_on(store.find_blocked(args.layer.as_deref()))?;

    if blocked.is_empty() {
        println!(
            "No placeholder tiles ({} bytes) under {}",
            store.blocked_tile_size(),
            store.base_dir().display()
        );
        return Ok(());
    }

    for key in &blocked {
        println!("{}", store.path(key).display());
    }
    println!();
    println!(
        "{} placeholder tile(s). Re-run download with --redownload-blocked to fetch them again.",
        blocked.len()
    );
    Ok(())
}
