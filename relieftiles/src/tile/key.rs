//! Tile identity.
//!
//! Provides the `TileKey` type that names one raster tile of one layer,
//! independent of where it is stored or which server it comes from.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coord::TileCoord;

/// Unique identifier of one raster tile.
///
/// Keys are immutable once computed. The `x`/`y` values are unsigned tile
/// indices in the Web Mercator grid:
/// - `x` increases eastward (0 to 2^zoom - 1)
/// - `y` increases southward (0 to 2^zoom - 1)
///
/// # Example
///
/// ```
/// use relieftiles::tile::TileKey;
///
/// let key = TileKey::new("osm", 14, 8133, 5448);
/// assert_eq!(key.layer(), "osm");
/// assert_eq!(key.to_string(), "osm/14/8133/5448");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    layer: String,
    zoom: u8,
    x: u32,
    y: u32,
}

impl TileKey {
    /// Create a new tile key.
    pub fn new(layer: impl Into<String>, zoom: u8, x: u32, y: u32) -> Self {
        Self {
            layer: layer.into(),
            zoom,
            x,
            y,
        }
    }

    /// Create a key for a grid position in the given layer.
    pub fn from_coord(layer: impl Into<String>, coord: TileCoord) -> Self {
        Self::new(layer, coord.zoom, coord.x, coord.y)
    }

    /// Layer name.
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Zoom level.
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Tile column.
    pub fn x(&self) -> u32 {
        self.x
    }

    /// Tile row.
    pub fn y(&self) -> u32 {
        self.y
    }

    /// Grid position without the layer.
    pub fn coord(&self) -> TileCoord {
        TileCoord::new(self.x, self.y, self.zoom)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.layer, self.zoom, self.x, self.y)
    }
}
