//! OpenStreetMap service access
//!
//! Structure:
//! - `client.rs`: HTTP client for Nominatim, Overpass and tile servers
//! - `overpass.rs`: network filters, query building, graph construction
//! - `tiles.rs`: slippy-map tile addressing
//! - `cache.rs`: on-disk JSON response cache
//! - `error.rs`: Error types

pub mod cache;
pub mod client;
pub mod error;
pub mod overpass;
pub mod tiles;

// Re-exports for convenience
pub use client::{NetworkQuery, NetworkSource, OsmClient, OsmSettings, TileServer};
pub use error::{OsmError, Result};
pub use overpass::NetworkType;
pub use tiles::TileSource;
