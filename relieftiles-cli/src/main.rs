//! relieftiles CLI - offline map tile acquisition
//!
//! This binary provides a command-line interface to the relieftiles library.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{audit, common, download, init, plan, serve, status};
use error::CliError;

#[derive(Parser)]
#[command(name = "relieftiles")]
#[command(version, about = "Download map tiles for offline disaster relief mapping", long_about = None)]
struct Cli {
    /// Config file (default: ~/.relieftiles/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level when RUST_LOG is unset
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API until Ctrl-C
    Serve(serve::ServeArgs),
    /// Download tiles for an area in the foreground
    Download(download::DownloadArgs),
    /// Show tile counts and an estimated duration without downloading
    Plan(plan::PlanArgs),
    /// List stored tiles that are throttling placeholders
    Audit(audit::AuditArgs),
    /// Show stored tile counts per layer
    Status,
    /// Write the default configuration file
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::Init { force } = cli.command {
        return init::run(cli.config.as_deref(), force);
    }

    let config = common::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve(args) => {
            let _logging = common::start_logging(&config, true, cli.debug)?;
            serve::run(args, config)
        }
        Commands::Download(args) => {
            let _logging = common::start_logging(&config, false, cli.debug)?;
            download::run(args, config)
        }
        Commands::Plan(args) => plan::run(args, &config),
        Commands::Audit(args) => audit::run(args, &config),
        Commands::Status => status::run(&config),
        Commands::Init { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use relieftiles::config::ConfigFile;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_download_with_negative_longitude() {
        let cli = Cli::try_parse_from([
            "relieftiles",
            "download",
            "--lat",
            "51.67",
            "--lon",
            "-1.28",
            "--radius-miles",
            "5",
            "--min-zoom",
            "10",
            "--max-zoom",
            "12",
            "--layer",
            "osm",
            "--layer",
            "satellite",
        ])
        .unwrap();

        match cli.command {
            Commands::Download(args) => {
                let request = args.request(&ConfigFile::default()).unwrap();
                assert_eq!(request.zoom_levels, vec![10, 11, 12]);
                assert_eq!(request.layers, vec!["osm", "satellite"]);
            }
            _ => panic!("expected download"),
        }
    }

    #[test]
    fn test_circle_and_box_conflict() {
        let result = Cli::try_parse_from([
            "relieftiles",
            "plan",
            "--lat",
            "51.67",
            "--lon",
            "-1.28",
            "--radius-miles",
            "5",
            "--north",
            "52",
            "--south",
            "51",
            "--east",
            "0",
            "--west",
            "-1",
            "--min-zoom",
            "10",
            "--max-zoom",
            "12",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_region_without_zoom() {
        let cli = Cli::try_parse_from(["relieftiles", "download", "--region", "uk"]).unwrap();

        match cli.command {
            Commands::Download(args) => {
                let request = args.request(&ConfigFile::default()).unwrap();
                assert_eq!(request.zoom_levels, vec![8, 9, 10, 11, 12]);
                assert_eq!(request.layers, vec!["osm", "satellite"]);
            }
            _ => panic!("expected download"),
        }
    }

    #[test]
    fn test_region_conflicts_with_manual_area() {
        let result = Cli::try_parse_from([
            "relieftiles",
            "plan",
            "--region",
            "london",
            "--north",
            "52",
            "--south",
            "51",
            "--east",
            "0",
            "--west",
            "-1",
        ]);
        assert!(result.is_err());

        let result = Cli::try_parse_from([
            "relieftiles",
            "download",
            "--region",
            "abingdon",
            "--lat",
            "51.67",
            "--lon",
            "-1.28",
            "--radius-miles",
            "5",
        ]);
        assert!(result.is_err());
    }
}
