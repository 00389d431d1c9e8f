//! Download command - run one job in the foreground.

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use relieftiles::app::ReliefTilesApp;
use relieftiles::config::ConfigFile;
use relieftiles::orchestrator::{DownloadJob, JobEvent, JobRequest, JobState};
use relieftiles::tile::TileOutcome;
use tracing::info;

use super::common::{interrupt_signal, resolve_request, runtime, AreaArgs, ZoomArgs};
use crate::error::CliError;

/// Arguments for the download command.
#[derive(Debug, Clone, Args)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub area: AreaArgs,

    #[command(flatten)]
    pub zoom: ZoomArgs,

    /// Layer to download (repeatable, defaults to the region's or osm)
    #[arg(long = "layer")]
    pub layers: Vec<String>,

    /// Fetch tiles again whose stored copy is a throttling placeholder
    #[arg(long)]
    pub redownload_blocked: bool,
}

impl DownloadArgs {
    /// The job request these arguments describe.
    pub fn request(&self, config: &ConfigFile) -> Result<JobRequest, CliError> {
        let request = resolve_request(&self.area, &self.zoom, &self.layers, config)?;
        Ok(request.with_redownload_blocked(self.redownload_blocked))
    }
}

enum Step {
    Event(Option<JobEvent>),
    Interrupt,
}

/// Run the download command.
pub fn run(args: DownloadArgs, config: ConfigFile) -> Result<(), CliError> {
    let request = args.request(&config)?;
    runtime()?.block_on(download(request, config))
}

async fn download(request: JobRequest, config: ConfigFile) -> Result<(), CliError> {
    let app = ReliefTilesApp::start(config)?;
    let mut stream = app.manager().stream(&request).await?;
    let snapshot = stream.snapshot();

    println!("Downloading {} tiles", snapshot.total);
    println!("  Layers:  {}", snapshot.request.layers.join(", "));
    println!(
        "  Zoom:    {}",
        snapshot
            .request
            .zoom_levels
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Storage: {}", app.store().base_dir().display());
    println!();
    println!("Press Ctrl+C to stop after the current tile");
    println!();

    let interrupt = interrupt_signal()?;
    let bar = progress_bar(snapshot.total);
    let mut cancelling = false;

    loop {
        let step = tokio::select! {
            event = stream.next() => Step::Event(event),
            _ = interrupt.notified(), if !cancelling => Step::Interrupt,
        };

        match step {
            Step::Event(Some(JobEvent::Progress(progress))) => {
                bar.set_position(progress.completed);
                bar.set_message(format!(
                    "ok {} skip {} blocked {}",
                    progress.stats.success,
                    progress.stats.skipped_good + progress.stats.skipped_blocked,
                    progress.stats.blocked
                ));
                if progress.outcome.is_problem() {
                    bar.println(format!("  {} {}", progress.outcome, progress.key));
                }
            }
            Step::Event(Some(JobEvent::Lagged { skipped })) => {
                info!(skipped, "Progress display skipped events");
            }
            Step::Event(Some(JobEvent::Complete { .. })) => {}
            Step::Event(None) => break,
            Step::Interrupt => {
                cancelling = true;
                bar.println("Cancelling after the current tile...");
                stream.cancel();
            }
        }
    }

    bar.finish_and_clear();
    let job = stream.snapshot();
    drop(stream);
    app.shutdown().await;

    print_summary(&job);

    if job.state == JobState::Completed && job.stats.is_clean() {
        Ok(())
    } else {
        Err(CliError::Incomplete {
            state: job.state,
            problems: job.stats.problems(),
        })
    }
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    )
    .map(|style| style.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

fn print_summary(job: &DownloadJob) {
    println!("Job {} {}", job.id, job.state);
    println!(
        "  Processed: {}/{} ({:.1}%)",
        job.completed,
        job.total,
        job.progress_percent()
    );
    for outcome in TileOutcome::ALL {
        let count = job.stats.get(outcome);
        if count > 0 {
            println!("  {:<16} {}", outcome.as_str(), count);
        }
    }
    if let Some(error) = &job.error {
        println!("  Error: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relieftiles::coord::AreaSpec;

    fn args(layers: Vec<String>) -> DownloadArgs {
        DownloadArgs {
            area: AreaArgs {
                region: None,
                lat: Some(51.67),
                lon: Some(-1.28),
                radius_miles: Some(2.0),
                north: None,
                south: None,
                east: None,
                west: None,
            },
            zoom: ZoomArgs {
                min_zoom: Some(12),
                max_zoom: Some(14),
            },
            layers,
            redownload_blocked: true,
        }
    }

    #[test]
    fn test_request_defaults_to_osm() {
        let request = args(Vec::new())
            .request(&ConfigFile::default())
            .unwrap();
        assert_eq!(request.area, AreaSpec::circle(51.67, -1.28, 2.0));
        assert_eq!(request.zoom_levels, vec![12, 13, 14]);
        assert_eq!(request.layers, vec!["osm".to_string()]);
        assert!(request.redownload_blocked);
    }

    #[test]
    fn test_request_uses_given_layers() {
        let request = args(vec!["satellite".into(), "osm".into()])
            .request(&ConfigFile::default())
            .unwrap();
        assert_eq!(request.layers, vec!["satellite".to_string(), "osm".to_string()]);
    }

    #[test]
    fn test_region_request_keeps_redownload_flag() {
        let mut region = args(Vec::new());
        region.area = AreaArgs {
            region: Some("abingdon".into()),
            lat: None,
            lon: None,
            radius_miles: None,
            north: None,
            south: None,
            east: None,
            west: None,
        };
        region.zoom = ZoomArgs {
            min_zoom: None,
            max_zoom: None,
        };

        let request = region.request(&ConfigFile::default()).unwrap();
        assert_eq!(request.area, AreaSpec::circle(51.6707, -1.2879, 5.0));
        assert_eq!(request.zoom_levels, vec![11, 12, 13, 14, 15]);
        assert_eq!(request.layers, vec!["osm", "satellite"]);
        assert!(request.redownload_blocked);
    }
}
