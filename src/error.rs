use crate::graph::NodeId;
use crate::osm::OsmError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while plotting or storing a network graph
#[derive(Debug, Error)]
pub enum PlotError {
    /// Descriptor file could not be read
    #[error("Failed to read descriptor '{path}': {source}")]
    DescriptorIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Descriptor is not valid JSON or misses a required field
    #[error("Failed to parse descriptor '{path}': {source}")]
    DescriptorParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Descriptor parsed but holds an unusable value
    #[error("Invalid descriptor '{path}': {reason}")]
    InvalidDescriptor { path: PathBuf, reason: String },

    /// Configuration file could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network retrieval or basemap error
    #[error(transparent)]
    Osm(#[from] OsmError),

    /// The fetched network has no nodes left to draw
    #[error("No street network found around '{0}'")]
    EmptyNetwork(String),

    /// Route references a node the network does not contain
    #[error("Route node {0} is not in the network graph")]
    UnknownRouteNode(NodeId),

    /// Two consecutive route nodes are not joined by an edge
    #[error("Route has no edge from node {from} to node {to}")]
    MissingRouteEdge { from: NodeId, to: NodeId },

    /// Drawing failed
    #[error("Render error: {0}")]
    Render(String),

    /// PNG encoding or decoding failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Output could not be written
    #[error("Failed to write '{path}': {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The image viewer could not be started
    #[error("Failed to open viewer for '{path}': {source}")]
    Viewer {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for Results using PlotError
pub type Result<T> = std::result::Result<T, PlotError>;
