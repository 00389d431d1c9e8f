//! Common types and utilities shared across CLI commands.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use relieftiles::config::ConfigFile;
use relieftiles::coord::AreaSpec;
use relieftiles::logging::{init_logging, LoggingGuard};
use relieftiles::orchestrator::JobRequest;
use tokio::runtime::Runtime;
use tokio::sync::Notify;

use crate::error::CliError;

/// Area selection: a named region, a circle around a point or a bounding box.
#[derive(Debug, Clone, Args)]
pub struct AreaArgs {
    /// Named region (built-in: london, uk, abingdon; more via [region.NAME])
    #[arg(
        long,
        conflicts_with_all = ["lat", "lon", "radius_miles", "north", "south", "east", "west"]
    )]
    pub region: Option<String>,

    /// Center latitude in decimal degrees
    #[arg(
        long,
        allow_negative_numbers = true,
        requires_all = ["lon", "radius_miles"],
        conflicts_with_all = ["north", "south", "east", "west"]
    )]
    pub lat: Option<f64>,

    /// Center longitude in decimal degrees
    #[arg(long, allow_negative_numbers = true, requires = "lat")]
    pub lon: Option<f64>,

    /// Radius around the center in miles
    #[arg(long, requires = "lat")]
    pub radius_miles: Option<f64>,

    /// Northern edge of the bounding box
    #[arg(long, allow_negative_numbers = true, requires_all = ["south", "east", "west"])]
    pub north: Option<f64>,

    /// Southern edge of the bounding box
    #[arg(long, allow_negative_numbers = true, requires = "north")]
    pub south: Option<f64>,

    /// Eastern edge of the bounding box
    #[arg(long, allow_negative_numbers = true, requires = "north")]
    pub east: Option<f64>,

    /// Western edge of the bounding box
    #[arg(long, allow_negative_numbers = true, requires = "north")]
    pub west: Option<f64>,
}

impl AreaArgs {
    /// The selected area.
    pub fn to_area(&self) -> Result<AreaSpec, CliError> {
        match (
            (self.lat, self.lon, self.radius_miles),
            (self.north, self.south, self.east, self.west),
        ) {
            ((Some(lat), Some(lon), Some(radius)), (None, None, None, None)) => {
                Ok(AreaSpec::circle(lat, lon, radius))
            }
            ((None, None, None), (Some(north), Some(south), Some(east), Some(west))) => {
                Ok(AreaSpec::bounding_box(north, south, east, west))
            }
            _ => Err(CliError::Config(
                "specify --region, --lat/--lon/--radius-miles or --north/--south/--east/--west"
                    .to_string(),
            )),
        }
    }
}

/// Zoom range selection.
#[derive(Debug, Clone, Args)]
pub struct ZoomArgs {
    /// Lowest zoom level to download (defaults to the region's)
    #[arg(long)]
    pub min_zoom: Option<u8>,

    /// Highest zoom level to download (defaults to the region's)
    #[arg(long)]
    pub max_zoom: Option<u8>,
}

impl ZoomArgs {
    /// Every zoom level in the range, ascending.
    ///
    /// Both bounds are required.
    pub fn levels(&self) -> Result<Vec<u8>, CliError> {
        match (self.min_zoom, self.max_zoom) {
            (Some(min), Some(max)) => zoom_range(min, max),
            _ => Err(CliError::Config(
                "--min-zoom and --max-zoom are required without --region".to_string(),
            )),
        }
    }

    /// Every zoom level in the range, filling missing bounds from defaults.
    pub fn levels_or(&self, min_zoom: u8, max_zoom: u8) -> Result<Vec<u8>, CliError> {
        zoom_range(
            self.min_zoom.unwrap_or(min_zoom),
            self.max_zoom.unwrap_or(max_zoom),
        )
    }
}

fn zoom_range(min_zoom: u8, max_zoom: u8) -> Result<Vec<u8>, CliError> {
    if min_zoom > max_zoom {
        return Err(CliError::Config(format!(
            "--min-zoom {} is greater than --max-zoom {}",
            min_zoom, max_zoom
        )));
    }
    Ok((min_zoom..=max_zoom).collect())
}

/// Builds the job request described by area, zoom and layer arguments.
///
/// A region supplies the area, and also the zoom range and layers wherever
/// the arguments leave them out.
pub fn resolve_request(
    area: &AreaArgs,
    zoom: &ZoomArgs,
    layers: &[String],
    config: &ConfigFile,
) -> Result<JobRequest, CliError> {
    let mut request = match &area.region {
        Some(name) => {
            let regions = config.region_set();
            let region = regions.get(name).ok_or_else(|| {
                CliError::Config(format!(
                    "unknown region '{}' (available: {})",
                    name,
                    regions.names().join(", ")
                ))
            })?;
            let levels = zoom.levels_or(region.min_zoom(), region.max_zoom())?;
            JobRequest::new(*region.area(), levels).with_layers(region.layers().iter().cloned())
        }
        None => JobRequest::new(area.to_area()?, zoom.levels()?),
    };
    if !layers.is_empty() {
        request = request.with_layers(layers.iter().cloned());
    }
    Ok(request)
}

/// Load configuration from `path`, or the default location.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    Ok(config)
}

/// Start logging into the configured directory.
pub fn start_logging(
    config: &ConfigFile,
    stdout: bool,
    debug: bool,
) -> Result<LoggingGuard, CliError> {
    init_logging(
        &config.logging.directory,
        &config.logging.file,
        stdout,
        debug,
    )
    .map_err(|e| CliError::LoggingInit(e.to_string()))
}

/// Create the multi-threaded runtime the async commands run on.
pub fn runtime() -> Result<Runtime, CliError> {
    Runtime::new().map_err(|e| CliError::Runtime(e.to_string()))
}

/// Install a Ctrl-C handler that wakes the returned `Notify`.
pub fn interrupt_signal() -> Result<Arc<Notify>, CliError> {
    let notify = Arc::new(Notify::new());
    let handler_notify = Arc::clone(&notify);
    ctrlc::set_handler(move || handler_notify.notify_one())
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;
    Ok(notify)
}

/// Render a duration as `2h 05m`, `3m 20s` or `12s`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
