//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::coord::{AreaSpec, MAX_ZOOM};
use crate::provider::{is_valid_layer_name, LayerConfig, OSM_LAYER};
use crate::region::{RegionError, RegionPreset};

/// Prefix of per-layer sections, e.g. `[layer.osm]`.
pub(super) const LAYER_SECTION_PREFIX: &str = "layer.";

/// Prefix of per-region sections, e.g. `[region.london]`.
pub(super) const REGION_SECTION_PREFIX: &str = "region.";

const CIRCLE_KEYS: [&str; 3] = ["lat", "lon", "radius_miles"];
const BOX_KEYS: [&str; 4] = ["north", "south", "east", "west"];

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parses a key with `FromStr`, reporting `reason` on failure.
fn parse_value<T: FromStr>(
    section: &str,
    props: &Properties,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    match props.get(key) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(section, key, v, reason)),
        None => Ok(None),
    }
}

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [storage] section
    if let Some(section) = ini.section(Some("storage")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.storage.directory = expand_tilde(v);
            }
        }
        if let Some(size) = parse_value::<u64>(
            "storage",
            section,
            "blocked_tile_size",
            "must be a positive integer (bytes)",
        )? {
            if size == 0 {
                return Err(invalid(
                    "storage",
                    "blocked_tile_size",
                    "0",
                    "must be a positive integer (bytes)",
                ));
            }
            config.storage.blocked_tile_size = size;
        }
    }

    // [fetch] section
    if let Some(section) = ini.section(Some("fetch")) {
        for (key, target) in [
            ("min_delay", &mut config.fetch.min_delay),
            ("max_delay", &mut config.fetch.max_delay),
        ] {
            if let Some(delay) = parse_value::<f64>(
                "fetch",
                section,
                key,
                "must be a non-negative number (seconds)",
            )? {
                if !delay.is_finite() || delay < 0.0 {
                    return Err(invalid(
                        "fetch",
                        key,
                        &delay.to_string(),
                        "must be a non-negative number (seconds)",
                    ));
                }
                *target = delay;
            }
        }
        if let Some(timeout) = parse_value::<u64>(
            "fetch",
            section,
            "timeout",
            "must be a positive integer (seconds)",
        )? {
            if timeout == 0 {
                return Err(invalid(
                    "fetch",
                    "timeout",
                    "0",
                    "must be a positive integer (seconds)",
                ));
            }
            config.fetch.timeout = timeout;
        }
        if let Some(v) = section.get("user_agent") {
            let v = v.trim();
            if v.is_empty() {
                return Err(invalid(
                    "fetch",
                    "user_agent",
                    v,
                    "must identify the application",
                ));
            }
            config.fetch.user_agent = v.to_string();
        }
    }
    if config.fetch.max_delay < config.fetch.min_delay {
        return Err(invalid(
            "fetch",
            "max_delay",
            &config.fetch.max_delay.to_string(),
            "must not be less than min_delay",
        ));
    }

    // [server] section
    if let Some(section) = ini.section(Some("server")) {
        if let Some(bind) = parse_value::<SocketAddr>(
            "server",
            section,
            "bind",
            "must be an address like 127.0.0.1:8003",
        )? {
            config.server.bind = bind;
        }
        if let Some(buffer) = parse_value::<usize>(
            "server",
            section,
            "progress_buffer",
            "must be a positive integer",
        )? {
            if buffer == 0 {
                return Err(invalid(
                    "server",
                    "progress_buffer",
                    "0",
                    "must be a positive integer",
                ));
            }
            config.server.progress_buffer = buffer;
        }
        if let Some(retention) = parse_value::<usize>(
            "server",
            section,
            "job_retention",
            "must be a non-negative integer",
        )? {
            config.server.job_retention = retention;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if v.is_empty() || v.contains('/') {
                return Err(invalid("logging", "file", v, "must be a plain file name"));
            }
            config.logging.file = v.to_string();
        }
    }

    // [layer.NAME] sections
    for (name, section) in ini.iter() {
        let Some(layer_name) = name.and_then(|n| n.strip_prefix(LAYER_SECTION_PREFIX)) else {
            continue;
        };
        let layer = parse_layer(layer_name, section, &config)?;
        config.upsert_layer(layer);
    }

    // [region.NAME] sections
    for (name, section) in ini.iter() {
        let Some(region_name) = name.and_then(|n| n.strip_prefix(REGION_SECTION_PREFIX)) else {
            continue;
        };
        let region = parse_region(region_name, section, &config)?;
        config.upsert_region(region);
    }

    Ok(config)
}

/// Parses one `[layer.NAME]` section.
///
/// Sections naming a built-in layer override only the keys they set; new
/// layers must provide `url`.
fn parse_layer(
    name: &str,
    props: &Properties,
    config: &ConfigFile,
) -> Result<LayerConfig, ConfigFileError> {
    let section = format!("{}{}", LAYER_SECTION_PREFIX, name);

    if !is_valid_layer_name(name) {
        return Err(invalid(
            &section,
            "name",
            name,
            "must contain only letters, digits, '_' or '-'",
        ));
    }

    let existing = config.layers.iter().find(|l| l.name() == name);

    let url = match (props.get("url").map(str::trim), existing) {
        (Some(url), _) if !url.is_empty() => url.to_string(),
        (_, Some(layer)) => layer.url_template().to_string(),
        (value, None) => {
            return Err(invalid(
                &section,
                "url",
                value.unwrap_or_default(),
                "is required for a new layer",
            ))
        }
    };

    let servers = match props.get("servers") {
        Some(v) => v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => existing
            .map(|l| l.server_pool().to_vec())
            .unwrap_or_default(),
    };

    let zoom_reason = format!("must be an integer from 0 to {}", MAX_ZOOM);
    let max_zoom = match parse_value::<u8>(&section, props, "max_zoom", &zoom_reason)? {
        Some(zoom) if zoom > MAX_ZOOM => {
            return Err(invalid(&section, "max_zoom", &zoom.to_string(), &zoom_reason))
        }
        Some(zoom) => zoom,
        None => existing.map(|l| l.max_zoom()).unwrap_or(MAX_ZOOM),
    };

    LayerConfig::new(name, url.clone(), servers, max_zoom)
        .map_err(|e| invalid(&section, "url", &url, &e.to_string()))
}

/// Parses one `[region.NAME]` section.
///
/// The area is given either as `lat`, `lon`, `radius_miles` or as `north`,
/// `south`, `east`, `west`. Sections naming an existing region override only
/// the keys they set; new regions must provide an area and both zoom keys.
fn parse_region(
    name: &str,
    props: &Properties,
    config: &ConfigFile,
) -> Result<RegionPreset, ConfigFileError> {
    let section = format!("{}{}", REGION_SECTION_PREFIX, name);

    if !is_valid_layer_name(name) {
        return Err(invalid(
            &section,
            "name",
            name,
            "must contain only letters, digits, '_' or '-'",
        ));
    }

    let existing = config.regions.iter().find(|r| r.name() == name);

    let coord_reason = "must be a number (decimal degrees or miles)";
    let mut circle = Vec::with_capacity(CIRCLE_KEYS.len());
    for key in CIRCLE_KEYS {
        circle.push(parse_value::<f64>(&section, props, key, coord_reason)?);
    }
    let mut bbox = Vec::with_capacity(BOX_KEYS.len());
    for key in BOX_KEYS {
        bbox.push(parse_value::<f64>(&section, props, key, coord_reason)?);
    }

    let area_reason = "give either lat, lon, radius_miles or north, south, east, west";
    let area = match (circle.as_slice(), bbox.as_slice()) {
        ([Some(lat), Some(lon), Some(radius)], [None, None, None, None]) => {
            AreaSpec::circle(*lat, *lon, *radius)
        }
        ([None, None, None], [Some(north), Some(south), Some(east), Some(west)]) => {
            AreaSpec::bounding_box(*north, *south, *east, *west)
        }
        ([None, None, None], [None, None, None, None]) => match existing {
            Some(region) => *region.area(),
            None => return Err(invalid(&section, "area", "", area_reason)),
        },
        _ => return Err(invalid(&section, "area", "", area_reason)),
    };

    let zoom_reason = format!("must be an integer from 0 to {}", MAX_ZOOM);
    let mut zooms = [0u8; 2];
    for (slot, key) in zooms.iter_mut().zip(["min_zoom", "max_zoom"]) {
        *slot = match parse_value::<u8>(&section, props, key, &zoom_reason)? {
            Some(zoom) => zoom,
            None => match existing {
                Some(region) if key == "min_zoom" => region.min_zoom(),
                Some(region) => region.max_zoom(),
                None => return Err(invalid(&section, key, "", "is required for a new region")),
            },
        };
    }
    let [min_zoom, max_zoom] = zooms;

    let layers: Vec<String> = match props.get("layers") {
        Some(v) => v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => existing
            .map(|r| r.layers().to_vec())
            .unwrap_or_else(|| vec![OSM_LAYER.to_string()]),
    };
    let layers_value = layers.join(",");

    RegionPreset::new(name, area, min_zoom, max_zoom, layers).map_err(|e| {
        let (key, value) = match &e {
            RegionError::InvalidName(name) => ("name", name.clone()),
            RegionError::InvalidArea(_) => ("area", String::new()),
            RegionError::InvalidZoomRange { min, max } => {
                ("max_zoom", format!("{}..={}", min, max))
            }
            RegionError::InvalidLayers(_) => ("layers", layers_value),
        };
        invalid(&section, key, &value, &e.to_string())
    })
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
