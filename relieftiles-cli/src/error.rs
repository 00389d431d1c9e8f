//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use relieftiles::app::AppError;
use relieftiles::config::ConfigFileError;
use relieftiles::orchestrator::{JobError, JobState};
use relieftiles::server::ServerError;
use relieftiles::store::StoreError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to wire up the tile engine
    App(AppError),
    /// Job request rejected
    Job(JobError),
    /// HTTP API error
    Serve(ServerError),
    /// Failed to read the tile tree
    Store(StoreError),
    /// Failed to create the Tokio runtime
    Runtime(String),
    /// The job finished with problem tiles or did not finish
    Incomplete { state: JobState, problems: u64 },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Serve(ServerError::Bind { .. }) => {
                eprintln!();
                eprintln!("Another process may be using the address.");
                eprintln!("Choose a different one with --bind or [server] bind in config.ini.");
            }
            CliError::Incomplete { .. } => {
                eprintln!();
                eprintln!("Run the same command again to retry; stored tiles are skipped.");
                eprintln!("Add --redownload-blocked to retry throttled tiles as well.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::App(e) => write!(f, "{}", e),
            CliError::Job(e) => write!(f, "Invalid download request: {}", e),
            CliError::Serve(e) => write!(f, "Server error: {}", e),
            CliError::Store(e) => write!(f, "Tile store error: {}", e),
            CliError::Runtime(msg) => write!(f, "Failed to create Tokio runtime: {}", msg),
            CliError::Incomplete { state, problems } => {
                write!(f, "Job {} with {} problem tile(s)", state, problems)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::App(e) => Some(e),
            CliError::Job(e) => Some(e),
            CliError::Serve(e) => Some(e),
            CliError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<AppError> for CliError {
    fn from(e: AppError) -> Self {
        CliError::App(e)
    }
}

impl From<JobError> for CliError {
    fn from(e: JobError) -> Self {
        CliError::Job(e)
    }
}

impl From<ServerError> for CliError {
    fn from(e: ServerError) -> Self {
        CliError::Serve(e)
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e)
    }
}
