//! Tile layer definitions.
//!
//! A layer is one raster source: a URL template plus an optional pool of
//! mirror hosts substituted for `{s}`.
//!
//! # URL Templates
//!
//! | Placeholder | Value |
//! |---|---|
//! | `{z}` | zoom level |
//! | `{x}` | tile column |
//! | `{y}` | tile row |
//! | `{s}` | server picked uniformly at random from the pool, per request |
//!
//! # Built-in Layers
//!
//! - `osm`: `https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png`, mirrors
//!   `a`, `b`, `c`, zoom 0 to 19
//! - `satellite`: ArcGIS World Imagery,
//!   `https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}`,
//!   zoom 0 to 19. Note the row-before-column order.

use std::collections::BTreeMap;

use rand::Rng;

use super::types::ProviderError;
use crate::coord::MAX_ZOOM;
use crate::tile::TileKey;

/// Name of the built-in OpenStreetMap layer.
pub const OSM_LAYER: &str = "osm";

/// Name of the built-in ArcGIS satellite layer.
pub const SATELLITE_LAYER: &str = "satellite";

const OSM_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
const OSM_SERVERS: [&str; 3] = ["a", "b", "c"];
const OSM_MAX_ZOOM: u8 = 19;

const ARCGIS_URL: &str =
    "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}";
const ARCGIS_MAX_ZOOM: u8 = 19;

/// Returns true if `name` can be used as a layer (and directory) name.
pub fn is_valid_layer_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Static description of one tile source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerConfig {
    name: String,
    url_template: String,
    server_pool: Vec<String>,
    max_zoom: u8,
}

impl LayerConfig {
    /// Creates a layer definition.
    ///
    /// # Errors
    ///
    /// Fails if the name is not path-safe, the template uses `{s}` without
    /// a server pool, or `max_zoom` exceeds the global maximum.
    pub fn new(
        name: impl Into<String>,
        url_template: impl Into<String>,
        server_pool: Vec<String>,
        max_zoom: u8,
    ) -> Result<Self, ProviderError> {
        let name = name.into();
        let url_template = url_template.into();

        if !is_valid_layer_name(&name) {
            return Err(ProviderError::InvalidLayer(format!(
                "name '{}' must contain only letters, digits, '_' or '-'",
                name
            )));
        }
        if url_template.contains("{s}") && server_pool.is_empty() {
            return Err(ProviderError::InvalidLayer(format!(
                "layer '{}' uses {{s}} but has no servers",
                name
            )));
        }
        if max_zoom > MAX_ZOOM {
            return Err(ProviderError::InvalidLayer(format!(
                "layer '{}' max zoom {} exceeds {}",
                name, max_zoom, MAX_ZOOM
            )));
        }

        Ok(Self {
            name,
            url_template,
            server_pool,
            max_zoom,
        })
    }

    /// The OpenStreetMap standard layer.
    pub fn osm() -> Self {
        Self {
            name: OSM_LAYER.to_string(),
            url_template: OSM_URL.to_string(),
            server_pool: OSM_SERVERS.iter().map(|s| s.to_string()).collect(),
            max_zoom: OSM_MAX_ZOOM,
        }
    }

    /// The ArcGIS World Imagery layer.
    pub fn satellite() -> Self {
        Self {
            name: SATELLITE_LAYER.to_string(),
            url_template: ARCGIS_URL.to_string(),
            server_pool: Vec::new(),
            max_zoom: ARCGIS_MAX_ZOOM,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url_template(&self) -> &str {
        &self.url_template
    }

    pub fn server_pool(&self) -> &[String] {
        &self.server_pool
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    /// Checks if this layer serves the given zoom level.
    pub fn supports_zoom(&self, zoom: u8) -> bool {
        zoom <= self.max_zoom
    }

    /// Picks a mirror uniformly at random, or `None` for an empty pool.
    pub fn choose_server(&self) -> Option<&str> {
        if self.server_pool.is_empty() {
            return None;
        }
        let index = rand::rng().random_range(0..self.server_pool.len());
        Some(self.server_pool[index].as_str())
    }

    /// Builds the URL for a tile using the given mirror.
    pub fn build_url_with_server(&self, key: &TileKey, server: Option<&str>) -> String {
        let mut url = self
            .url_template
            .replace("{z}", &key.zoom().to_string())
            .replace("{x}", &key.x().to_string())
            .replace("{y}", &key.y().to_string());
        if let Some(server) = server {
            url = url.replace("{s}", server);
        }
        url
    }

    /// Builds the URL for a tile, choosing a fresh mirror for `{s}`.
    pub fn build_url(&self, key: &TileKey) -> String {
        self.build_url_with_server(key, self.choose_server())
    }
}

/// The set of layers known to the engine, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSet {
    layers: BTreeMap<String, LayerConfig>,
}

impl LayerSet {
    /// Creates an empty set.
    pub fn empty() -> Self {
        Self {
            layers: BTreeMap::new(),
        }
    }

    /// Creates a set holding the built-in `osm` and `satellite` layers.
    pub fn builtin() -> Self {
        let mut set = Self::empty();
        set.insert(LayerConfig::osm());
        set.insert(LayerConfig::satellite());
        set
    }

    /// Adds a layer, replacing any existing layer with the same name.
    pub fn insert(&mut self, layer: LayerConfig) {
        self.layers.insert(layer.name.clone(), layer);
    }

    /// Looks up a layer by name.
    pub fn get(&self, name: &str) -> Option<&LayerConfig> {
        self.layers.get(name)
    }

    /// Layer names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.layers.keys().map(String::as_str).collect()
    }

    /// Iterates layers in name order.
    pub fn iter(&self) -> impl Iterator<Item = &LayerConfig> {
        self.layers.values()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Default for LayerSet {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_osm_url_uses_pool_server() {
        let layer = LayerConfig::osm();
        let key = TileKey::new(OSM_LAYER, 14, 8133, 5448);

        let url = layer.build_url_with_server(&key, Some("b"));
        assert_eq!(url, "https://b.tile.openstreetmap.org/14/8133/5448.png");

        for _ in 0..20 {
            let url = layer.build_url(&key);
            let host = url
                .strip_prefix("https://")
                .and_then(|s| s.split('.').next())
                .unwrap();
            assert!(["a", "b", "c"].contains(&host), "unexpected server in {}", url);
        }
    }

    #[test]
    fn test_satellite_url_is_row_then_column() {
        let layer = LayerConfig::satellite();
        let key = TileKey::new(SATELLITE_LAYER, 12, 2030, 1361);

        assert_eq!(
            layer.build_url(&key),
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/12/1361/2030"
        );
        assert_eq!(layer.choose_server(), None);
    }

    #[test]
    fn test_every_server_eventually_chosen() {
        let layer = LayerConfig::osm();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(layer.choose_server().unwrap().to_string());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_layer_name_validation() {
        assert!(is_valid_layer_name("osm"));
        assert!(is_valid_layer_name("topo_v2-hd"));
        assert!(!is_valid_layer_name(""));
        assert!(!is_valid_layer_name("../etc"));
        assert!(!is_valid_layer_name("a/b"));
        assert!(!is_valid_layer_name("with space"));
    }

    #[test]
    fn test_new_rejects_bad_layers() {
        assert!(LayerConfig::new("topo", "http://t/{z}/{x}/{y}.png", vec![], 17).is_ok());
        assert!(matches!(
            LayerConfig::new("bad/name", "http://t/{z}/{x}/{y}.png", vec![], 17),
            Err(ProviderError::InvalidLayer(_))
        ));
        assert!(matches!(
            LayerConfig::new("topo", "http://{s}.t/{z}/{x}/{y}.png", vec![], 17),
            Err(ProviderError::InvalidLayer(_))
        ));
        assert!(matches!(
            LayerConfig::new("topo", "http://t/{z}/{x}/{y}.png", vec![], 23),
            Err(ProviderError::InvalidLayer(_))
        ));
    }

    #[test]
    fn test_builtin_set() {
        let set = LayerSet::builtin();
        assert_eq!(set.names(), vec!["osm", "satellite"]);
        assert_eq!(set.get("osm").map(|l| l.max_zoom()), Some(19));
        assert!(set.get("terrain").is_none());
        assert!(set.get("osm").unwrap().supports_zoom(19));
        assert!(!set.get("osm").unwrap().supports_zoom(20));
    }
}
