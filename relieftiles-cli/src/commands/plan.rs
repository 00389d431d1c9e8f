//! Plan command - tile counts and time estimate for a download.

use clap::Args;
use relieftiles::config::ConfigFile;
use relieftiles::coord::count_tiles;
use relieftiles::orchestrator::JobRequest;

use super::common::{format_duration, resolve_request, AreaArgs, ZoomArgs};
use crate::error::CliError;

/// Arguments for the plan command.
#[derive(Debug, Clone, Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub area: AreaArgs,

    #[command(flatten)]
    pub zoom: ZoomArgs,

    /// Layer to plan for (repeatable, defaults to the region's or osm)
    #[arg(long = "layer")]
    pub layers: Vec<String>,
}

/// Tile counts for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// `(zoom, tiles per layer)` in request order
    pub per_zoom: Vec<(u8, u64)>,
    pub layers: Vec<String>,
}

impl Plan {
    /// Builds the plan for a request after validating it.
    pub fn for_request(request: &JobRequest, config: &ConfigFile) -> Result<Self, CliError> {
        let request = request.validate(&config.layer_set())?;
        let per_zoom = request
            .zoom_levels
            .iter()
            .map(|&zoom| (zoom, count_tiles(&request.area, zoom)))
            .collect();
        Ok(Self {
            per_zoom,
            layers: request.layers,
        })
    }

    /// Tiles across every zoom level and layer.
    pub fn total(&self) -> u64 {
        let per_layer: u64 = self.per_zoom.iter().map(|(_, count)| count).sum();
        per_layer * self.layers.len() as u64
    }
}

/// Run the plan command.
pub fn run(args: PlanArgs, config: &ConfigFile) -> Result<(), CliError> {
    let request = resolve_request(&args.area, &args.zoom, &args.layers, config)?;
    let plan = Plan::for_request(&request, config)?;

    println!("{:>6}  {:>12}", "Zoom", "Tiles/layer");
    for (zoom, count) in &plan.per_zoom {
        println!("{:>6}  {:>12}", zoom, count);
    }
    println!();
    println!(
        "Total: {} tiles across {} layer(s) ({})",
        plan.total(),
        plan.layers.len(),
        plan.layers.join(", ")
    );

    let per_request = config.fetch_config().mean_delay();
    let estimate = per_request * u32::try_from(plan.total()).unwrap_or(u32::MAX);
    println!(
        "Estimated time if nothing is stored yet: {} at {:.1}s per request",
        format_duration(estimate),
        per_request.as_secs_f64()
    );
    println!("Tiles already stored are skipped without a request.");
    Ok(())
}
