//! Filesystem tile store.
//!
//! Tiles are stored verbatim (placeholders included, for later audit) at:
//!
//! ```text
//! {base_dir}/{layer}/{zoom}/{x}/{y}.png
//! ```
//!
//! Writes go to a uniquely named hidden temp file in the destination
//! directory, are synced, then renamed over the final path, so readers see
//! either the old file or the complete new one. Concurrent writers of the
//! same key are last-writer-wins.
//!
//! Public methods are async and run the filesystem work on Tokio's blocking
//! pool via `spawn_blocking`.

mod types;

pub use types::{LayerSummary, StoreConfig, StoreError};

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::provider::is_valid_layer_name;
use crate::tile::{TileKey, TileState};

const TILE_EXTENSION: &str = "png";
const TEMP_PREFIX: &str = ".tile-";
const TEMP_SUFFIX: &str = ".part";

/// Persistent tile storage keyed by `(layer, zoom, x, y)`.
#[derive(Debug, Clone)]
pub struct TileStore {
    base_dir: PathBuf,
    blocked_tile_size: u64,
}

impl TileStore {
    /// Creates a store rooted at `config.base_dir`.
    ///
    /// The directory is created lazily on first write.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            base_dir: config.base_dir,
            blocked_tile_size: config.blocked_tile_size,
        }
    }

    /// Returns the root directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the placeholder size used for classification.
    pub fn blocked_tile_size(&self) -> u64 {
        self.blocked_tile_size
    }

    /// Constructs the path for a tile file.
    pub fn path(&self, key: &TileKey) -> PathBuf {
        self.base_dir
            .join(key.layer())
            .join(key.zoom().to_string())
            .join(key.x().to_string())
            .join(format!("{}.{}", key.y(), TILE_EXTENSION))
    }

    /// Classifies what is stored for a tile.
    ///
    /// `Blocked` iff the file length equals the placeholder size exactly.
    pub async fn classify(&self, key: &TileKey) -> Result<TileState, StoreError> {
        let path = self.path(key);
        let blocked = self.blocked_tile_size;
        run_blocking(move || classify_path(&path, blocked)).await
    }

    /// Atomically writes a tile.
    pub async fn write(
        &self,
        key: &TileKey,
        bytes: impl AsRef<[u8]> + Send + 'static,
    ) -> Result<(), StoreError> {
        let path = self.path(key);
        trace!(tile = %key, bytes = bytes.as_ref().len(), "Writing tile");
        run_blocking(move || write_atomic(&path, bytes.as_ref())).await
    }

    /// Reads a stored tile, or `None` if absent.
    pub async fn read(&self, key: &TileKey) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path(key);
        run_blocking(move || match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        })
        .await
    }

    /// Counts stored tiles for one layer.
    pub async fn layer_summary(&self, layer: &str) -> Result<LayerSummary, StoreError> {
        let store = self.clone();
        let layer = layer.to_string();
        run_blocking(move || store.scan_layer_summary(&layer)).await
    }

    /// Counts stored tiles for every layer directory present on disk.
    pub async fn summary(&self) -> Result<Vec<LayerSummary>, StoreError> {
        let store = self.clone();
        run_blocking(move || {
            store
                .layer_dirs()?
                .iter()
                .map(|layer| store.scan_layer_summary(layer))
                .collect()
        })
        .await
    }

    /// Lists every stored placeholder, optionally limited to one layer.
    ///
    /// Keys are sorted by layer, zoom, column, then row.
    pub async fn find_blocked(&self, layer: Option<&str>) -> Result<Vec<TileKey>, StoreError> {
        let store = self.clone();
        let layer = layer.map(str::to_string);
        run_blocking(move || {
            let layers = match layer {
                Some(layer) => vec![layer],
                None => store.layer_dirs()?,
            };
            let mut blocked = Vec::new();
            for layer in &layers {
                store.scan_layer(layer, |key, len| {
                    if len == store.blocked_tile_size {
                        blocked.push(key);
                    }
                })?;
            }
            blocked.sort();
            debug!(count = blocked.len(), "Blocked tile audit complete");
            Ok(blocked)
        })
        .await
    }

    // =========================================================================
    // Directory scanning
    // =========================================================================

    /// Names of layer directories under the base directory, sorted.
    fn layer_dirs(&self) -> Result<Vec<String>, StoreError> {
        let mut layers: Vec<String> = read_dir_entries(&self.base_dir)?
            .into_iter()
            .filter(|(_, is_dir)| *is_dir)
            .map(|(name, _)| name)
            .filter(|name| is_valid_layer_name(name))
            .collect();
        layers.sort();
        Ok(layers)
    }

    fn scan_layer_summary(&self, layer: &str) -> Result<LayerSummary, StoreError> {
        let mut summary = LayerSummary {
            layer: layer.to_string(),
            ..LayerSummary::default()
        };
        self.scan_layer(layer, |_, len| {
            if len == self.blocked_tile_size {
                summary.blocked += 1;
            } else {
                summary.good += 1;
            }
            summary.bytes += len;
        })?;
        Ok(summary)
    }

    /// Visits every `{zoom}/{x}/{y}.png` file of a layer with its length.
    ///
    /// Temp files and anything not matching the layout are skipped.
    fn scan_layer(
        &self,
        layer: &str,
        mut visit: impl FnMut(TileKey, u64),
    ) -> Result<(), StoreError> {
        let layer_dir = self.base_dir.join(layer);

        for (zoom_name, is_dir) in read_dir_entries(&layer_dir)? {
            let Some(zoom) = is_dir.then(|| zoom_name.parse::<u8>().ok()).flatten() else {
                continue;
            };
            let zoom_dir = layer_dir.join(&zoom_name);

            for (x_name, is_dir) in read_dir_entries(&zoom_dir)? {
                let Some(x) = is_dir.then(|| x_name.parse::<u32>().ok()).flatten() else {
                    continue;
                };
                let x_dir = zoom_dir.join(&x_name);

                for (file_name, is_dir) in read_dir_entries(&x_dir)? {
                    if is_dir {
                        continue;
                    }
                    let Some(y) = parse_tile_file_name(&file_name) else {
                        continue;
                    };
                    let path = x_dir.join(&file_name);
                    let len = fs::metadata(&path)
                        .map_err(|e| StoreError::io(&path, e))?
                        .len();
                    visit(TileKey::new(layer, zoom, x, y), len);
                }
            }
        }

        Ok(())
    }
}

/// Runs blocking filesystem work off the async runtime.
async fn run_blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}

fn classify_path(path: &Path, blocked_tile_size: u64) -> Result<TileState, StoreError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => {
            if meta.len() == blocked_tile_size {
                Ok(TileState::Blocked)
            } else {
                Ok(TileState::Good)
            }
        }
        Ok(_) => Ok(TileState::Missing),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(TileState::Missing),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let parent = path
        .parent()
        .ok_or_else(|| StoreError::io(path, std::io::Error::other("tile path has no parent")))?;
    fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;

    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(parent)
        .map_err(|e| StoreError::io(parent, e))?;

    temp.write_all(bytes)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| StoreError::io(temp.path(), e))?;

    temp.persist(path)
        .map_err(|e| StoreError::io(path, e.error))?;

    Ok(())
}

/// Parses `{y}.png`, rejecting temp files and other names.
fn parse_tile_file_name(name: &str) -> Option<u32> {
    name.strip_suffix(".png")?.parse().ok()
}

/// Lists `(name, is_dir)` for a directory; a missing directory is empty.
fn read_dir_entries(dir: &Path) -> Result<Vec<(String, bool)>, StoreError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(dir, e)),
    };

    let mut result = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(dir, e))?;
        let is_dir = entry
            .file_type()
            .map_err(|e| StoreError::io(entry.path(), e))?
            .is_dir();
        if let Some(name) = entry.file_name().to_str() {
            result.push((name.to_string(), is_dir));
        }
    }
    Ok(result)
}
