//! Serialization of `ConfigFile` → INI text.
//!
//! Uses a template with comments for user-friendly output.

use std::path::Path;

use super::parser::{LAYER_SECTION_PREFIX, REGION_SECTION_PREFIX};
use super::settings::ConfigFile;
use crate::coord::AreaSpec;

/// Render a `ConfigFile` as commented INI text.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let mut text = format!(
        r#"; relieftiles configuration
; Paths may start with ~/ for the home directory.

[storage]
; Root of the tile tree, laid out as {{layer}}/{{z}}/{{x}}/{{y}}.png
directory = {storage_dir}
; Byte length of the placeholder image a server returns when throttling
blocked_tile_size = {blocked_tile_size}

[fetch]
; Random pause before every request, in seconds
min_delay = {min_delay}
max_delay = {max_delay}
; Request timeout in seconds
timeout = {timeout}
user_agent = {user_agent}

[server]
bind = {bind}
; Events buffered per streaming job before the oldest are dropped
progress_buffer = {progress_buffer}
; Finished jobs kept for GET /tiles/jobs, oldest dropped first
job_retention = {job_retention}

[logging]
directory = {log_dir}
file = {log_file}
"#,
        storage_dir = path_to_string(&config.storage.directory),
        blocked_tile_size = config.storage.blocked_tile_size,
        min_delay = config.fetch.min_delay,
        max_delay = config.fetch.max_delay,
        timeout = config.fetch.timeout,
        user_agent = config.fetch.user_agent,
        bind = config.server.bind,
        progress_buffer = config.server.progress_buffer,
        job_retention = config.server.job_retention,
        log_dir = path_to_string(&config.logging.directory),
        log_file = config.logging.file,
    );

    for layer in &config.layers {
        text.push_str(&format!(
            "\n[{}{}]\nurl = {}\n",
            LAYER_SECTION_PREFIX,
            layer.name(),
            layer.url_template()
        ));
        if !layer.server_pool().is_empty() {
            text.push_str(&format!("servers = {}\n", layer.server_pool().join(",")));
        }
        text.push_str(&format!("max_zoom = {}\n", layer.max_zoom()));
    }

    for region in &config.regions {
        text.push_str(&format!("\n[{}{}]\n", REGION_SECTION_PREFIX, region.name()));
        match *region.area() {
            AreaSpec::Circle {
                center_lat,
                center_lon,
                radius_miles,
            } => text.push_str(&format!(
                "lat = {}\nlon = {}\nradius_miles = {}\n",
                center_lat, center_lon, radius_miles
            )),
            AreaSpec::BoundingBox {
                north,
                south,
                east,
                west,
            } => text.push_str(&format!(
                "north = {}\nsouth = {}\neast = {}\nwest = {}\n",
                north, south, east, west
            )),
        }
        text.push_str(&format!(
            "min_zoom = {}\nmax_zoom = {}\nlayers = {}\n",
            region.min_zoom(),
            region.max_zoom(),
            region.layers().join(",")
        ));
    }

    text
}

/// Convert a path to a string, replacing the home directory with `~`.
pub(super) fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(relative) = path.strip_prefix(&home) {
            return format!("~/{}", relative.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_string_has_all_sections() {
        let text = to_config_string(&ConfigFile::default());
        for section in [
            "[storage]",
            "[fetch]",
            "[server]",
            "[logging]",
            "[layer.osm]",
            "[layer.satellite]",
            "[region.london]",
            "[region.uk]",
            "[region.abingdon]",
        ] {
            assert!(text.contains(section), "missing {}", section);
        }
        assert!(text.contains("blocked_tile_size = 7412"));
        assert!(text.contains("servers = a,b,c"));
        assert!(text.contains("radius_miles = 5\n"));
        assert!(text.contains("layers = osm,satellite\n"));
    }

    #[test]
    fn test_path_to_string() {
        assert_eq!(path_to_string(&PathBuf::from("/srv/tiles")), "/srv/tiles");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(path_to_string(&home.join("tiles")), "~/tiles");
        }
    }
}
