//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (latitude/longitude)
//! and Web Mercator slippy-map tile coordinates, and enumerates the tiles
//! covering a circular or rectangular area at a given zoom level.
//!
//! Enumeration is always row-major by column: `x` ascending, then `y`
//! ascending. Re-running the same area visits tiles in the same order.

mod types;

pub use types::{
    AreaSpec, CoordError, TileCoord, EARTH_RADIUS_MILES, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT,
    MIN_LON, MILES_PER_DEGREE,
};

use std::f64::consts::PI;

/// Converts geographic coordinates to tile coordinates.
///
/// Uses the standard slippy-map formula. Inputs are expected to be inside
/// the Web Mercator range (see [`AreaSpec::validate`]); results are clamped
/// to the grid so edge values such as `lon = 180.0` map to the last column.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 22)
#[inline]
pub fn lon_lat_to_tile(lat: f64, lon: f64, zoom: u8) -> TileCoord {
    debug_assert!(zoom <= MAX_ZOOM, "zoom {} exceeds {}", zoom, MAX_ZOOM);

    let n = 2.0_f64.powi(zoom as i32);
    let max_index = n - 1.0;

    let x = ((lon + 180.0) / 360.0 * n).floor();

    let lat_rad = lat.to_radians();
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor();

    TileCoord {
        x: x.clamp(0.0, max_index) as u32,
        y: y.clamp(0.0, max_index) as u32,
        zoom,
    }
}

/// Converts (possibly fractional) tile coordinates back to latitude/longitude.
///
/// Integer inputs give the tile's northwest corner; `x + 0.5, y + 0.5` gives
/// its center.
#[inline]
pub fn tile_to_lon_lat(x: f64, y: f64, zoom: u8) -> (f64, f64) {
    let n = 2.0_f64.powi(zoom as i32);

    let lon = x / n * 360.0 - 180.0;

    let lat_rad = (PI * (1.0 - 2.0 * y / n)).sinh().atan();
    let lat = lat_rad.to_degrees();

    (lat, lon)
}

/// Returns the latitude/longitude of a tile's center point.
#[inline]
pub fn tile_center(tile: &TileCoord) -> (f64, f64) {
    tile_to_lon_lat(tile.x as f64 + 0.5, tile.y as f64 + 0.5, tile.zoom)
}

/// Great-circle distance in miles between two points.
pub fn haversine_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_MILES * c
}

/// Inclusive rectangle of tiles at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
    pub zoom: u8,
}

impl TileRange {
    /// Computes the tile rectangle covering a bounding box.
    ///
    /// All four corners are projected and the min/max taken, so the range
    /// is complete regardless of how the caller ordered the edges.
    pub fn for_bounding_box(north: f64, south: f64, east: f64, west: f64, zoom: u8) -> Self {
        let corners = [
            lon_lat_to_tile(north, west, zoom),
            lon_lat_to_tile(north, east, zoom),
            lon_lat_to_tile(south, west, zoom),
            lon_lat_to_tile(south, east, zoom),
        ];

        let min_x = corners.iter().map(|t| t.x).min().unwrap_or(0);
        let max_x = corners.iter().map(|t| t.x).max().unwrap_or(0);
        let min_y = corners.iter().map(|t| t.y).min().unwrap_or(0);
        let max_y = corners.iter().map(|t| t.y).max().unwrap_or(0);

        Self {
            min_x,
            max_x,
            min_y,
            max_y,
            zoom,
        }
    }

    /// Number of tiles in the rectangle.
    pub fn len(&self) -> u64 {
        (self.max_x - self.min_x + 1) as u64 * (self.max_y - self.min_y + 1) as u64
    }

    /// A range always holds at least one tile.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterates the rectangle, `x` ascending then `y` ascending.
    pub fn iter(&self) -> TileRangeIter {
        TileRangeIter {
            range: *self,
            next_x: self.min_x,
            next_y: self.min_y,
            done: false,
        }
    }
}

/// Row-major iterator over a [`TileRange`].
#[derive(Debug, Clone)]
pub struct TileRangeIter {
    range: TileRange,
    next_x: u32,
    next_y: u32,
    done: bool,
}

impl Iterator for TileRangeIter {
    type Item = TileCoord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let tile = TileCoord::new(self.next_x, self.next_y, self.range.zoom);

        if self.next_y < self.range.max_y {
            self.next_y += 1;
        } else if self.next_x < self.range.max_x {
            self.next_x += 1;
            self.next_y = self.range.min_y;
        } else {
            self.done = true;
        }

        Some(tile)
    }
}

/// Returns all tiles intersecting a bounding box, in row-major order.
pub fn tiles_for_bounding_box(
    north: f64,
    south: f64,
    east: f64,
    west: f64,
    zoom: u8,
) -> Vec<TileCoord> {
    TileRange::for_bounding_box(north, south, east, west, zoom)
        .iter()
        .collect()
}

/// Computes the candidate rectangle for a circle.
///
/// Converts the radius to degrees with a latitude-corrected longitude scale
/// (1° latitude ≈ 69 mi, 1° longitude ≈ 69·cos(lat) mi).
fn circle_candidates(center_lat: f64, center_lon: f64, radius_miles: f64, zoom: u8) -> TileRange {
    let lat_delta = radius_miles / MILES_PER_DEGREE;
    let lon_scale = MILES_PER_DEGREE * center_lat.to_radians().cos();
    let lon_delta = if lon_scale > f64::EPSILON {
        (radius_miles / lon_scale).min(180.0)
    } else {
        180.0
    };

    let north = (center_lat + lat_delta).min(MAX_LAT);
    let south = (center_lat - lat_delta).max(MIN_LAT);
    let east = (center_lon + lon_delta).min(MAX_LON);
    let west = (center_lon - lon_delta).max(MIN_LON);

    TileRange::for_bounding_box(north, south, east, west, zoom)
}

/// Iterates the tiles of a circle whose centers are within the radius.
fn circle_tiles(
    center_lat: f64,
    center_lon: f64,
    radius_miles: f64,
    zoom: u8,
) -> impl Iterator<Item = TileCoord> {
    circle_candidates(center_lat, center_lon, radius_miles, zoom)
        .iter()
        .filter(move |tile| {
            let (lat, lon) = tile_center(tile);
            haversine_miles(center_lat, center_lon, lat, lon) <= radius_miles
        })
}

/// Returns the tiles whose center point lies within `radius_miles` of the
/// center, in row-major order.
///
/// Tiles that merely intersect the circle's bounding box but whose centers
/// fall outside the radius (the box corners) are excluded.
pub fn tiles_for_circle(
    center_lat: f64,
    center_lon: f64,
    radius_miles: f64,
    zoom: u8,
) -> Vec<TileCoord> {
    circle_tiles(center_lat, center_lon, radius_miles, zoom).collect()
}

/// Returns the ordered tile set of an area at one zoom level.
pub fn tiles_for_area(area: &AreaSpec, zoom: u8) -> Vec<TileCoord> {
    match *area {
        AreaSpec::Circle {
            center_lat,
            center_lon,
            radius_miles,
        } => tiles_for_circle(center_lat, center_lon, radius_miles, zoom),
        AreaSpec::BoundingBox {
            north,
            south,
            east,
            west,
        } => tiles_for_bounding_box(north, south, east, west, zoom),
    }
}

/// Returns the candidate rectangle scanned for an area at one zoom level.
///
/// For a bounding box every tile in the range belongs to the area; for a
/// circle the range is filtered by [`tiles_in_column`].
pub fn area_range(area: &AreaSpec, zoom: u8) -> TileRange {
    match *area {
        AreaSpec::Circle {
            center_lat,
            center_lon,
            radius_miles,
        } => circle_candidates(center_lat, center_lon, radius_miles, zoom),
        AreaSpec::BoundingBox {
            north,
            south,
            east,
            west,
        } => TileRange::for_bounding_box(north, south, east, west, zoom),
    }
}

/// Returns the area's tiles in column `x` of `range`, `y` ascending.
///
/// `range` must come from [`area_range`] for the same area. Visiting the
/// columns from `min_x` to `max_x` yields the same sequence as
/// [`tiles_for_area`] while holding one column at a time.
pub fn tiles_in_column(area: &AreaSpec, range: &TileRange, x: u32) -> Vec<TileCoord> {
    if x < range.min_x || x > range.max_x {
        return Vec::new();
    }

    let column = (range.min_y..=range.max_y).map(move |y| TileCoord::new(x, y, range.zoom));
    match *area {
        AreaSpec::Circle {
            center_lat,
            center_lon,
            radius_miles,
        } => column
            .filter(|tile| {
                let (lat, lon) = tile_center(tile);
                haversine_miles(center_lat, center_lon, lat, lon) <= radius_miles
            })
            .collect(),
        AreaSpec::BoundingBox { .. } => column.collect(),
    }
}

/// Counts the tiles of an area at one zoom level without keeping them.
pub fn count_tiles(area: &AreaSpec, zoom: u8) -> u64 {
    match *area {
        AreaSpec::Circle {
            center_lat,
            center_lon,
            radius_miles,
        } => circle_tiles(center_lat, center_lon, radius_miles, zoom).count() as u64,
        AreaSpec::BoundingBox {
            north,
            south,
            east,
            west,
        } => TileRange::for_bounding_box(north, south, east, west, zoom).len(),
    }
}
