//! relieftiles - offline map tile acquisition for disaster relief teams
//!
//! Downloads slippy-map tiles (`{layer}/{z}/{x}/{y}.png`) for an area around a
//! point into a local tile tree that field laptops can serve without network
//! access. Servers are treated politely: requests are serialized with a
//! randomized pause, identify the application, and throttling placeholder
//! images are detected and kept apart from real tiles so a later run can
//! retry them.
//!
//! # Modules
//!
//! - [`coord`] - Web Mercator math and area enumeration
//! - [`tile`] - Tile identity and per-tile outcomes
//! - [`provider`] - HTTP client abstraction and layer definitions
//! - [`fetch`] - Paced single-tile fetching with placeholder detection
//! - [`store`] - The on-disk tile tree
//! - [`orchestrator`] - Runs one download job over an area
//! - [`region`] - Named area presets
//! - [`jobs`] - Background and streaming job management
//! - [`server`] - JSON/SSE HTTP API
//! - [`config`] - `~/.relieftiles/config.ini`
//! - [`logging`] - Tracing subscriber setup
//! - [`app`] - Wiring everything from a configuration

pub mod app;
pub mod config;
pub mod coord;
pub mod fetch;
pub mod jobs;
pub mod logging;
pub mod orchestrator;
pub mod provider;
pub mod region;
pub mod server;
pub mod store;
pub mod tile;
