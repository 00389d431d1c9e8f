//! Tile server access
//!
//! This module provides the HTTP client abstraction used to talk to public
//! tile servers and the layer definitions that turn a [`TileKey`] into a
//! request URL.
//!
//! [`TileKey`]: crate::tile::TileKey

mod http;
mod layer;
mod types;

pub use http::{AsyncHttpClient, ReqwestClient, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
pub use layer::{is_valid_layer_name, LayerConfig, LayerSet, OSM_LAYER, SATELLITE_LAYER};
pub use types::{HttpResponse, ProviderError};

#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;
