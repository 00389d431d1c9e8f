//! Tile identity and per-tile results.
//!
//! A [`TileKey`] names one raster tile of one layer. Processing a key within a
//! job yields exactly one [`TileOutcome`]; the store classifies what is on
//! disk as a [`TileState`].

mod key;
mod outcome;

pub use key::TileKey;
pub use outcome::{TileOutcome, TileState};
