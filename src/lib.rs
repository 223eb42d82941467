//! Street network graph plotter
//!
//! Downloads the street network around an address, draws its nodes with their
//! identifiers over a map, highlights two nodes and optionally a route, and
//! saves the figure as PNG.
//!
//! Module organization:
//! - `descriptor`: JSON input files
//! - `osm`: OpenStreetMap services (geocoding, Overpass, tiles)
//! - `graph`: directed street graph and its simplification
//! - `render`: figure drawing
//! - `pipeline`: plot and store routines
//! - `config` / `properties`: plot configuration

pub mod config;
pub mod descriptor;
pub mod error;
pub mod geo;
pub mod graph;
pub mod osm;
pub mod pipeline;
pub mod properties;
pub mod render;

pub use error::{PlotError, Result};
