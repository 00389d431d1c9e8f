//! Status command - stored tile counts per layer.

use relieftiles::config::ConfigFile;
use relieftiles::store::TileStore;

use super::common::runtime;
use crate::error::CliError;

/// Run the status command.
pub fn run(config: &ConfigFile) -> Result<(), CliError> {
    let store = TileStore::new(config.store_config());
    let summary = runtime()?.block_on(store.summary())?;

    println!("Tile store: {}", store.base_dir().display());
    println!();

    if summary.is_empty() {
        println!("No tiles stored yet.");
        return Ok(());
    }

    println!(
        "{:<16} {:>10} {:>10} {:>14}",
        "Layer", "Good", "Blocked", "Size (bytes)"
    );
    for layer in &summary {
        println!(
            "{:<16} {:>10} {:>10} {:>14}",
            layer.layer, layer.good, layer.blocked, layer.bytes
        );
    }
    Ok(())
}
