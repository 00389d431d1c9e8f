//! Named area presets.
//!
//! A region bundles an area with the zoom range and layers usually fetched
//! for it, so a download can be started by name. Built-in regions can be
//! overridden and new ones declared in `[region.NAME]` config sections.
//!
//! # Built-in Regions
//!
//! | Name | Area | Zoom | Layers |
//! |---|---|---|---|
//! | `london` | 51.3°N to 51.7°N, 0.5°W to 0.3°E | 10 to 16 | osm |
//! | `uk` | 49.9°N to 60.9°N, 8.2°W to 1.8°E | 8 to 12 | osm, satellite |
//! | `abingdon` | 5 mi around 51.6707°N, 1.2879°W | 11 to 15 | osm, satellite |

use std::collections::BTreeMap;

use thiserror::Error;

use crate::coord::{AreaSpec, CoordError, MAX_ZOOM};
use crate::orchestrator::JobRequest;
use crate::provider::{is_valid_layer_name, OSM_LAYER, SATELLITE_LAYER};

/// Errors raised when defining a region.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegionError {
    #[error("region name '{0}' must contain only letters, digits, '_' or '-'")]
    InvalidName(String),

    #[error("invalid area: {0}")]
    InvalidArea(#[from] CoordError),

    #[error("zoom range {min}..={max} is empty or exceeds {MAX_ZOOM}")]
    InvalidZoomRange { min: u8, max: u8 },

    #[error("invalid layer list: {0}")]
    InvalidLayers(String),
}

/// An area with its default zoom range and layers.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionPreset {
    name: String,
    area: AreaSpec,
    min_zoom: u8,
    max_zoom: u8,
    layers: Vec<String>,
}

impl RegionPreset {
    /// Creates a region.
    ///
    /// # Errors
    ///
    /// Fails if the name is not path-safe, the area is not projectable, the
    /// zoom range is inverted or beyond [`MAX_ZOOM`], or the layer list is
    /// empty or holds an invalid name. Layers are checked against the
    /// configured set only when a job is submitted.
    pub fn new<I, S>(
        name: impl Into<String>,
        area: AreaSpec,
        min_zoom: u8,
        max_zoom: u8,
        layers: I,
    ) -> Result<Self, RegionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        if !is_valid_layer_name(&name) {
            return Err(RegionError::InvalidName(name));
        }
        area.validate()?;
        if min_zoom > max_zoom || max_zoom > MAX_ZOOM {
            return Err(RegionError::InvalidZoomRange {
                min: min_zoom,
                max: max_zoom,
            });
        }

        let layers: Vec<String> = layers.into_iter().map(Into::into).collect();
        if layers.is_empty() {
            return Err(RegionError::InvalidLayers("at least one layer is required".into()));
        }
        if let Some(bad) = layers.iter().find(|l| !is_valid_layer_name(l)) {
            return Err(RegionError::InvalidLayers(format!("'{}' is not a layer name", bad)));
        }

        Ok(Self {
            name,
            area,
            min_zoom,
            max_zoom,
            layers,
        })
    }

    /// Greater London.
    pub fn london() -> Self {
        Self {
            name: "london".to_string(),
            area: AreaSpec::bounding_box(51.7, 51.3, 0.3, -0.5),
            min_zoom: 10,
            max_zoom: 16,
            layers: vec![OSM_LAYER.to_string()],
        }
    }

    /// Base coverage of the United Kingdom.
    pub fn uk() -> Self {
        Self {
            name: "uk".to_string(),
            area: AreaSpec::bounding_box(60.9, 49.9, 1.8, -8.2),
            min_zoom: 8,
            max_zoom: 12,
            layers: vec![OSM_LAYER.to_string(), SATELLITE_LAYER.to_string()],
        }
    }

    /// Five miles around Abingdon-on-Thames.
    pub fn abingdon() -> Self {
        Self {
            name: "abingdon".to_string(),
            area: AreaSpec::circle(51.6707, -1.2879, 5.0),
            min_zoom: 11,
            max_zoom: 15,
            layers: vec![OSM_LAYER.to_string(), SATELLITE_LAYER.to_string()],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn area(&self) -> &AreaSpec {
        &self.area
    }

    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    /// Every zoom level of the default range, ascending.
    pub fn zoom_levels(&self) -> Vec<u8> {
        (self.min_zoom..=self.max_zoom).collect()
    }

    /// A request covering the region with its defaults.
    pub fn request(&self) -> JobRequest {
        JobRequest::new(self.area, self.zoom_levels()).with_layers(self.layers.iter().cloned())
    }
}

/// The regions known by name.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSet {
    regions: BTreeMap<String, RegionPreset>,
}

impl RegionSet {
    pub fn empty() -> Self {
        Self {
            regions: BTreeMap::new(),
        }
    }

    /// Creates a set holding the built-in regions.
    pub fn builtin() -> Self {
        let mut set = Self::empty();
        set.insert(RegionPreset::london());
        set.insert(RegionPreset::uk());
        set.insert(RegionPreset::abingdon());
        set
    }

    /// Adds a region, replacing any existing region with the same name.
    pub fn insert(&mut self, region: RegionPreset) {
        self.regions.insert(region.name.clone(), region);
    }

    pub fn get(&self, name: &str) -> Option<&RegionPreset> {
        self.regions.get(name)
    }

    /// Region names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.regions.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionPreset> {
        self.regions.values()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl Default for RegionSet {
    fn default() -> Self {
        Self::builtin()
    }
}
