//! Graph descriptor loading
//!
//! A descriptor is a small JSON file naming a place, a search radius in meters
//! and the two node ids to highlight:
//!
//! ```json
//! { "address": "Plaça de Catalunya, Barcelona", "distance": 300,
//!   "initial": 30239183, "final": 21638939 }
//! ```

use crate::error::{PlotError, Result};
use crate::graph::NodeId;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Descriptor {
    /// Geocodable location the network is centered on
    pub address: String,
    /// Search radius in meters
    pub distance: f64,
    /// Node drawn in the start color
    pub initial: NodeId,
    /// Node drawn in the end color
    #[serde(rename = "final")]
    pub final_node: NodeId,
}

impl Descriptor {
    /// Read, parse and validate a descriptor file
    ///
    /// Fails on a missing file, malformed JSON, a missing required field or a
    /// distance that is not a positive finite number.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| PlotError::DescriptorIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&json, path)
    }

    /// Parse descriptor JSON; `path` is only used in error messages
    pub fn parse(json: &str, path: &Path) -> Result<Self> {
        let descriptor: Descriptor =
            serde_json::from_str(json).map_err(|source| PlotError::DescriptorParse {
                path: path.to_path_buf(),
                source,
            })?;

        if !descriptor.distance.is_finite() || descriptor.distance <= 0.0 {
            return Err(PlotError::InvalidDescriptor {
                path: path.to_path_buf(),
                reason: format!(
                    "distance must be a positive number of meters, got {}",
                    descriptor.distance
                ),
            });
        }

        if descriptor.address.trim().is_empty() {
            return Err(PlotError::InvalidDescriptor {
                path: path.to_path_buf(),
                reason: "address is empty".to_string(),
            });
        }

        Ok(descriptor)
    }
}
