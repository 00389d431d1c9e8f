//! Coordinate types and validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum latitude representable in Web Mercator.
pub const MAX_LAT: f64 = 85.05112878;

/// Minimum latitude representable in Web Mercator.
pub const MIN_LAT: f64 = -85.05112878;

/// Minimum longitude.
pub const MIN_LON: f64 = -180.0;

/// Maximum longitude.
pub const MAX_LON: f64 = 180.0;

/// Highest zoom level accepted anywhere in the system.
pub const MAX_ZOOM: u8 = 22;

/// Miles per degree of latitude (and of longitude at the equator).
pub const MILES_PER_DEGREE: f64 = 69.0;

/// Mean Earth radius in miles, used for haversine distances.
pub const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Errors produced when validating geographic input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude outside the Web Mercator range.
    #[error("latitude {0} is outside [{MIN_LAT}, {MAX_LAT}]")]
    InvalidLatitude(f64),

    /// Longitude outside [-180, 180].
    #[error("longitude {0} is outside [{MIN_LON}, {MAX_LON}]")]
    InvalidLongitude(f64),

    /// Radius is zero, negative or not finite.
    #[error("radius {0} miles must be a positive finite number")]
    InvalidRadius(f64),

    /// Bounding box whose south edge lies north of its north edge.
    #[error("bounding box south edge {south} lies north of north edge {north}")]
    InvertedBounds { north: f64, south: f64 },
}

/// A tile position on the slippy-map grid at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    /// Column, west to east.
    pub x: u32,
    /// Row, north to south.
    pub y: u32,
    /// Zoom level.
    pub zoom: u8,
}

impl TileCoord {
    /// Creates a new tile coordinate.
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }
}

/// Geographic area a download job covers.
///
/// Serialized with a `type` tag so HTTP callers can send either shape:
///
/// ```json
/// {"type": "circle", "centerLat": 51.67, "centerLon": -1.28, "radiusMiles": 5.0}
/// {"type": "bounding_box", "north": 51.7, "south": 51.3, "east": 0.3, "west": -0.5}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AreaSpec {
    /// Every tile whose center lies within `radius_miles` of the center point.
    #[serde(rename_all = "camelCase")]
    Circle {
        center_lat: f64,
        center_lon: f64,
        radius_miles: f64,
    },
    /// Every tile intersecting the box.
    BoundingBox {
        north: f64,
        south: f64,
        east: f64,
        west: f64,
    },
}

impl AreaSpec {
    /// Creates a circular area.
    pub fn circle(center_lat: f64, center_lon: f64, radius_miles: f64) -> Self {
        Self::Circle {
            center_lat,
            center_lon,
            radius_miles,
        }
    }

    /// Creates a bounding-box area.
    pub fn bounding_box(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self::BoundingBox {
            north,
            south,
            east,
            west,
        }
    }

    /// Checks that every coordinate is inside the projectable range.
    ///
    /// The projection functions assume valid input; jobs call this once at
    /// submission so enumeration never sees out-of-range values.
    pub fn validate(&self) -> Result<(), CoordError> {
        match *self {
            AreaSpec::Circle {
                center_lat,
                center_lon,
                radius_miles,
            } => {
                check_lat(center_lat)?;
                check_lon(center_lon)?;
                if !radius_miles.is_finite() || radius_miles <= 0.0 {
                    return Err(CoordError::InvalidRadius(radius_miles));
                }
                Ok(())
            }
            AreaSpec::BoundingBox {
                north,
                south,
                east,
                west,
            } => {
                check_lat(north)?;
                check_lat(south)?;
                check_lon(east)?;
                check_lon(west)?;
                if south > north {
                    return Err(CoordError::InvertedBounds { north, south });
                }
                Ok(())
            }
        }
    }
}

fn check_lat(lat: f64) -> Result<(), CoordError> {
    if (MIN_LAT..=MAX_LAT).contains(&lat) {
        Ok(())
    } else {
        Err(CoordError::InvalidLatitude(lat))
    }
}

fn check_lon(lon: f64) -> Result<(), CoordError> {
    if (MIN_LON..=MAX_LON).contains(&lon) {
        Ok(())
    } else {
        Err(CoordError::InvalidLongitude(lon))
    }
}
