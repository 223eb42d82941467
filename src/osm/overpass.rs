//! Overpass queries and street graph construction
//!
//! Street filters and one-way rules follow the conventions of the usual
//! OpenStreetMap network tooling, so a `drive` network here matches what
//! those tools call a drivable network.

use super::error::{OsmError, Result};
use crate::geo::BBox;
use crate::graph::{NetworkGraph, NodeId};
use serde::Deserialize;
use std::collections::HashMap;

/// Which kind of street network to download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkType {
    /// Public streets cars can drive on, without service roads
    #[default]
    Drive,
    /// Drivable streets including service roads
    DriveService,
    /// Streets and paths pedestrians can use
    Walk,
    /// Streets and paths cyclists can use
    Bike,
    /// Every non-private street and path
    All,
}

impl NetworkType {
    /// Parse from property value; validation happens in PropertyReader.get_enum()
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "drive_service" => Self::DriveService,
            "walk" => Self::Walk,
            "bike" => Self::Bike,
            "all" => Self::All,
            _ => Self::Drive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drive => "drive",
            Self::DriveService => "drive_service",
            Self::Walk => "walk",
            Self::Bike => "bike",
            Self::All => "all",
        }
    }

    /// Overpass way filter, private access always excluded
    pub fn filter(&self) -> &'static str {
        match self {
            Self::Drive => concat!(
                r#"["highway"]["area"!~"yes"]["access"!~"private"]"#,
                r#"["highway"!~"abandoned|bridleway|bus_guideway|construction|corridor|cycleway|elevator|escalator|footway|no|path|pedestrian|planned|platform|proposed|raceway|razed|service|steps|track"]"#,
                r#"["motor_vehicle"!~"no"]["motorcar"!~"no"]"#,
                r#"["service"!~"alley|driveway|emergency_access|parking|parking_aisle|private"]"#,
            ),
            Self::DriveService => concat!(
                r#"["highway"]["area"!~"yes"]["access"!~"private"]"#,
                r#"["highway"!~"abandoned|bridleway|bus_guideway|construction|corridor|cycleway|elevator|escalator|footway|no|path|pedestrian|planned|platform|proposed|raceway|razed|steps|track"]"#,
                r#"["motor_vehicle"!~"no"]["motorcar"!~"no"]"#,
                r#"["service"!~"emergency_access|parking|parking_aisle|private"]"#,
            ),
            Self::Walk => concat!(
                r#"["highway"]["area"!~"yes"]["access"!~"private"]"#,
                r#"["highway"!~"abandoned|bus_guideway|construction|cycleway|motor|no|planned|platform|proposed|raceway|razed"]"#,
                r#"["foot"!~"no"]["service"!~"private"]"#,
            ),
            Self::Bike => concat!(
                r#"["highway"]["area"!~"yes"]["access"!~"private"]"#,
                r#"["highway"!~"abandoned|bus_guideway|construction|corridor|elevator|escalator|footway|motor|no|planned|platform|proposed|raceway|razed|steps"]"#,
                r#"["bicycle"!~"no"]["service"!~"private"]"#,
            ),
            Self::All => concat!(
                r#"["highway"]["area"!~"yes"]["access"!~"private"]"#,
                r#"["highway"!~"abandoned|construction|no|planned|platform|proposed|raceway|razed"]"#,
                r#"["service"!~"private"]"#,
            ),
        }
    }

    /// Pedestrians may walk one-way streets in both directions
    pub fn is_bidirectional(&self) -> bool {
        matches!(self, Self::Walk)
    }
}

/// Build the Overpass QL query for all matching ways inside `bbox`
pub fn build_query(bbox: &BBox, network_type: NetworkType, timeout_secs: u64) -> String {
    format!(
        "[out:json][timeout:{}];(way{}({:.7},{:.7},{:.7},{:.7});>;);out;",
        timeout_secs,
        network_type.filter(),
        bbox.south,
        bbox.west,
        bbox.north,
        bbox.east
    )
}

/// Raw Overpass JSON response
#[derive(Debug, Clone, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<Element>,
    /// Set by the server on timeouts and runtime errors
    #[serde(default)]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
    },
    Way {
        id: i64,
        #[serde(default)]
        nodes: Vec<i64>,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
    #[serde(other)]
    Other,
}

/// Decode an Overpass response
///
/// A response without elements but with a server remark is an error: Overpass
/// reports timeouts that way instead of with an HTTP status.
pub fn parse_response(value: serde_json::Value) -> Result<OverpassResponse> {
    let response: OverpassResponse =
        serde_json::from_value(value).map_err(|e| OsmError::InvalidResponse {
            service: "Overpass",
            reason: e.to_string(),
        })?;

    if response.elements.is_empty() {
        if let Some(remark) = &response.remark {
            return Err(OsmError::InvalidResponse {
                service: "Overpass",
                reason: remark.clone(),
            });
        }
    }

    Ok(response)
}

/// Travel direction allowed along a way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Both,
    Forward,
    Reverse,
}

fn way_direction(tags: &HashMap<String, String>, network_type: NetworkType) -> Direction {
    if network_type.is_bidirectional() {
        return Direction::Both;
    }

    match tags.get("oneway").map(|v| v.to_lowercase()).as_deref() {
        Some("yes") | Some("true") | Some("1") => return Direction::Forward,
        Some("-1") | Some("reverse") => return Direction::Reverse,
        _ => {}
    }

    if tags.get("junction").map(String::as_str) == Some("roundabout") {
        return Direction::Forward;
    }

    Direction::Both
}

/// Build the unsimplified directed graph of a response
///
/// Ways referencing nodes missing from the response are kept for the node
/// pairs that are present.
pub fn build_graph(response: &OverpassResponse, network_type: NetworkType) -> NetworkGraph {
    let mut coords: HashMap<i64, (f64, f64)> = HashMap::new();
    for element in &response.elements {
        if let Element::Node { id, lat, lon } = element {
            coords.insert(*id, (*lon, *lat));
        }
    }

    let mut graph = NetworkGraph::new();
    for element in &response.elements {
        let Element::Way { id, nodes, tags } = element else {
            continue;
        };

        for node in nodes {
            if let Some(&(lon, lat)) = coords.get(node) {
                graph.add_node(NodeId(*node), lon, lat);
            }
        }

        let direction = way_direction(tags, network_type);
        for pair in nodes.windows(2) {
            let (a, b) = (NodeId(pair[0]), NodeId(pair[1]));
            if a == b {
                continue;
            }
            match direction {
                Direction::Forward => {
                    graph.add_edge(a, b, *id);
                }
                Direction::Reverse => {
                    graph.add_edge(b, a, *id);
                }
                Direction::Both => {
                    graph.add_edge(a, b, *id);
                    graph.add_edge(b, a, *id);
                }
            }
        }
    }

    graph
}

/// Shape a downloaded graph into the plotted network
///
/// Simplifies, cuts back to the unbuffered search box and keeps the largest
/// weakly connected component.
pub fn shape_network(mut graph: NetworkGraph, bbox: &BBox) -> NetworkGraph {
    let raw = (graph.node_count(), graph.edge_count());
    graph.simplify();
    graph.truncate(bbox);
    graph.retain_largest_component();
    tracing::debug!(
        "Network shaped from {} nodes/{} edges to {} nodes/{} edges",
        raw.0,
        raw.1,
        graph.node_count(),
        graph.edge_count()
    );
    graph
}
