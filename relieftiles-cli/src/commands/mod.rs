//! CLI command implementations.
//!
//! # Command Modules
//!
//! - [`audit`] - List stored placeholder tiles
//! - [`download`] - Run one download job in the foreground
//! - [`init`] - Configuration initialization
//! - [`plan`] - Tile counts and time estimate
//! - [`serve`] - HTTP API
//! - [`status`] - Stored tile counts

pub mod audit;
pub mod common;
pub mod download;
pub mod init;
pub mod plan;
pub mod serve;
pub mod status;
