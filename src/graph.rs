//! Street network graph model
//!
//! A directed multigraph keyed by OpenStreetMap node ids. Construction from raw
//! ways happens in `osm::overpass`; this module holds the graph operations that
//! shape the downloaded network into what gets plotted:
//! - `simplify`: collapse interstitial nodes into single edges with geometry
//! - `truncate`: drop nodes outside a bounding box
//! - `retain_largest_component`: keep the largest weakly connected component

use crate::geo::{great_circle_distance, BBox};
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

/// OpenStreetMap node identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NodeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(NodeId)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Accept both `123` and `"123"`
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(id) => Ok(NodeId(id)),
            Raw::Text(text) => text.parse().map_err(|_| {
                serde::de::Error::custom(format!("invalid node identifier '{}'", text))
            }),
        }
    }
}

/// A graph node positioned in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub lon: f64,
    pub lat: f64,
}

impl Node {
    pub fn coords(&self) -> (f64, f64) {
        (self.lon, self.lat)
    }
}

/// A directed edge between two nodes
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    /// Source way id
    pub way: i64,
    /// Length in meters
    pub length: f64,
    /// Full polyline `(lon, lat)`, including both endpoints
    pub geometry: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkGraph {
    nodes: BTreeMap<NodeId, Node>,
    edges: Vec<Edge>,
}

impl NetworkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: NodeId, lon: f64, lat: f64) {
        self.nodes.insert(id, Node { lon, lat });
    }

    /// Add a straight edge; both endpoints must already exist
    ///
    /// Returns `false` (and adds nothing) when an endpoint is unknown.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, way: i64) -> bool {
        let (Some(a), Some(b)) = (self.nodes.get(&from), self.nodes.get(&to)) else {
            return false;
        };
        let geometry = vec![a.coords(), b.coords()];
        let length = great_circle_distance(a.coords(), b.coords());
        self.edges.push(Edge {
            from,
            to,
            way,
            length,
            geometry,
        });
        true
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Nodes in ascending id order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Extent of all node coordinates
    pub fn bounds(&self) -> Option<BBox> {
        BBox::from_points(self.nodes.values().map(Node::coords))
    }

    /// Shortest edge from `from` to `to`, if any
    pub fn shortest_edge(&self, from: NodeId, to: NodeId) -> Option<&Edge> {
        self.edges
            .iter()
            .filter(|e| e.from == from && e.to == to)
            .min_by(|a, b| a.length.total_cmp(&b.length))
    }

    /// Successor lists (with multiplicity) for every node
    fn successors(&self) -> HashMap<NodeId, Vec<NodeId>> {
        let mut succ: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for edge in &self.edges {
            succ.entry(edge.from).or_default().push(edge.to);
        }
        succ
    }

    /// Predecessor lists (with multiplicity) for every node
    fn predecessors(&self) -> HashMap<NodeId, Vec<NodeId>> {
        let mut pred: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for edge in &self.edges {
            pred.entry(edge.to).or_default().push(edge.from);
        }
        pred
    }

    /// Nodes that must survive simplification
    ///
    /// A node is kept when it has a self loop, lacks incoming or outgoing
    /// edges, or is not a plain pass-through: exactly two distinct neighbours
    /// with degree 2 (one-way street) or 4 (two-way street).
    fn endpoints(&self) -> HashSet<NodeId> {
        let succ = self.successors();
        let pred = self.predecessors();
        let empty = Vec::new();

        self.nodes
            .keys()
            .copied()
            .filter(|id| {
                let out = succ.get(id).unwrap_or(&empty);
                let inc = pred.get(id).unwrap_or(&empty);
                let neighbours: HashSet<NodeId> = out.iter().chain(inc.iter()).copied().collect();
                let degree = out.len() + inc.len();

                neighbours.contains(id)
                    || out.is_empty()
                    || inc.is_empty()
                    || !(neighbours.len() == 2 && (degree == 2 || degree == 4))
            })
            .collect()
    }

    /// Collapse chains of interstitial nodes into single edges
    ///
    /// Every merged edge keeps the concatenated geometry and summed length of
    /// the edges it replaces and the way id of the first one. A ring made only
    /// of interstitial nodes becomes a self loop at its smallest node id.
    pub fn simplify(&mut self) {
        let endpoints = self.endpoints();

        // Outgoing edge indices per node
        let mut outgoing: HashMap<NodeId, Vec<usize>> = HashMap::new();
        for (idx, edge) in self.edges.iter().enumerate() {
            outgoing.entry(edge.from).or_default().push(idx);
        }

        let mut merged: Vec<Edge> = Vec::new();
        let mut consumed = vec![false; self.edges.len()];

        let mut starts: Vec<NodeId> = endpoints.iter().copied().collect();
        starts.sort();

        for start in starts {
            let Some(first_edges) = outgoing.get(&start) else {
                continue;
            };
            for &first in first_edges {
                if consumed[first] || endpoints.contains(&self.edges[first].to) {
                    continue;
                }
                let path = self.walk(first, &outgoing, &mut consumed, |node| {
                    endpoints.contains(&node)
                });
                merged.push(self.merge_path(&path));
            }
        }

        // Whatever still leaves an interstitial node lies on a ring
        let mut ring_nodes: Vec<NodeId> = self
            .edges
            .iter()
            .enumerate()
            .filter(|(idx, edge)| !consumed[*idx] && !endpoints.contains(&edge.from))
            .map(|(_, edge)| edge.from)
            .collect();
        ring_nodes.sort();
        ring_nodes.dedup();

        for start in ring_nodes {
            let Some(first_edges) = outgoing.get(&start) else {
                continue;
            };
            for &first in first_edges {
                if consumed[first] {
                    continue;
                }
                let path = self.walk(first, &outgoing, &mut consumed, |node| node == start);
                merged.push(self.merge_path(&path));
            }
        }

        // Edges between endpoints stay as is
        for (idx, edge) in self.edges.iter().enumerate() {
            if !consumed[idx] {
                merged.push(edge.clone());
            }
        }

        let referenced: HashSet<NodeId> = merged.iter().flat_map(|e| [e.from, e.to]).collect();
        self.nodes
            .retain(|id, _| endpoints.contains(id) || referenced.contains(id));
        self.edges = merged;
    }

    /// Follow unconsumed edges from `first` until `stop` holds for the node
    /// reached, avoiding an immediate turn back where possible
    fn walk(
        &self,
        first: usize,
        outgoing: &HashMap<NodeId, Vec<usize>>,
        consumed: &mut [bool],
        stop: impl Fn(NodeId) -> bool,
    ) -> Vec<usize> {
        let mut path = vec![first];
        consumed[first] = true;
        let mut previous = self.edges[first].from;
        let mut current = self.edges[first].to;

        while !stop(current) {
            let next = outgoing.get(&current).and_then(|candidates| {
                candidates
                    .iter()
                    .copied()
                    .find(|&i| !consumed[i] && self.edges[i].to != previous)
                    .or_else(|| candidates.iter().copied().find(|&i| !consumed[i]))
            });
            let Some(next) = next else {
                break;
            };
            consumed[next] = true;
            path.push(next);
            previous = current;
            current = self.edges[next].to;
        }
        path
    }

    fn merge_path(&self, path: &[usize]) -> Edge {
        let first = &self.edges[path[0]];
        let last = &self.edges[path[path.len() - 1]];

        let mut geometry = first.geometry.clone();
        let mut length = first.length;
        for &idx in &path[1..] {
            let edge = &self.edges[idx];
            geometry.extend(edge.geometry.iter().skip(1).copied());
            length += edge.length;
        }

        Edge {
            from: first.from,
            to: last.to,
            way: first.way,
            length,
            geometry,
        }
    }

    /// Remove every node outside `bbox` and the edges touching it
    pub fn truncate(&mut self, bbox: &BBox) {
        self.nodes
            .retain(|_, node| bbox.contains(node.lon, node.lat));
        let nodes = &self.nodes;
        self.edges
            .retain(|e| nodes.contains_key(&e.from) && nodes.contains_key(&e.to));
    }

    /// Weakly connected components, largest first (ties by smallest node id)
    pub fn weak_components(&self) -> Vec<BTreeSet<NodeId>> {
        let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for edge in &self.edges {
            adjacency.entry(edge.from).or_default().push(edge.to);
            adjacency.entry(edge.to).or_default().push(edge.from);
        }

        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut components = Vec::new();
        for &start in self.nodes.keys() {
            if !seen.insert(start) {
                continue;
            }
            let mut component = BTreeSet::new();
            let mut stack = vec![start];
            while let Some(node) = stack.pop() {
                component.insert(node);
                for &next in adjacency.get(&node).into_iter().flatten() {
                    if seen.insert(next) {
                        stack.push(next);
                    }
                }
            }
            components.push(component);
        }

        components.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.first().cmp(&b.first())));
        components
    }

    /// Drop everything but the largest weakly connected component
    pub fn retain_largest_component(&mut self) {
        let Some(largest) = self.weak_components().into_iter().next() else {
            return;
        };
        self.nodes.retain(|id, _| largest.contains(id));
        self.edges
            .retain(|e| largest.contains(&e.from) && largest.contains(&e.to));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a graph from `(id, lon, lat)` nodes and `(from, to)` edges
    fn graph(nodes: &[(i64, f64, f64)], edges: &[(i64, i64)]) -> NetworkGraph {
        let mut g = NetworkGraph::new();
        for &(id, lon, lat) in nodes {
            g.add_node(NodeId(id), lon, lat);
        }
        for &(from, to) in edges {
            assert!(g.add_edge(NodeId(from), NodeId(to), 1));
        }
        g
    }

    fn two_way(pairs: &[(i64, i64)]) -> Vec<(i64, i64)> {
        pairs.iter().flat_map(|&(a, b)| [(a, b), (b, a)]).collect()
    }

    #[test]
    fn test_node_id_deserialize() {
        let id: NodeId = serde_json::from_str("30239183").unwrap();
        assert_eq!(id, NodeId(30239183));
        let id: NodeId = serde_json::from_str("\"30239183\"").unwrap();
        assert_eq!(id, NodeId(30239183));
        assert!(serde_json::from_str::<NodeId>("\"abc\"").is_err());
        assert!(serde_json::from_str::<NodeId>("1.5").is_err());
    }

    #[test]
    fn test_add_edge_unknown_endpoint() {
        let mut g = graph(&[(1, 0.0, 0.0)], &[]);
        assert!(!g.add_edge(NodeId(1), NodeId(2), 7));
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_simplify_two_way_chain() {
        // 1 - 2 - 3 - 4 with 5 hanging off 3: node 2 is interstitial
        let nodes = [
            (1, 0.0, 0.0),
            (2, 0.001, 0.0),
            (3, 0.002, 0.0),
            (4, 0.003, 0.0),
            (5, 0.002, 0.001),
        ];
        let mut g = graph(&nodes, &two_way(&[(1, 2), (2, 3), (3, 4), (3, 5)]));
        let total: f64 = g.edges().iter().map(|e| e.length).sum();

        g.simplify();

        assert!(!g.contains(NodeId(2)));
        assert_eq!(g.node_count(), 4);
        // 1<->3 merged, 3<->4 and 3<->5 unchanged
        assert_eq!(g.edge_count(), 6);

        let merged = g.shortest_edge(NodeId(1), NodeId(3)).unwrap();
        assert_eq!(merged.geometry.len(), 3);
        assert_eq!(merged.geometry[1], (0.001, 0.0));
        let back = g.shortest_edge(NodeId(3), NodeId(1)).unwrap();
        assert_eq!(back.geometry[1], (0.001, 0.0));

        // Lengths are preserved
        let after: f64 = g.edges().iter().map(|e| e.length).sum();
        assert!((total - after).abs() < 1e-6);
    }

    #[test]
    fn test_simplify_one_way_chain() {
        let nodes = [(1, 0.0, 0.0), (2, 0.001, 0.0), (3, 0.002, 0.0), (4, 0.003, 0.0)];
        let mut g = graph(&nodes, &[(1, 2), (2, 3), (3, 4)]);

        g.simplify();

        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 1);
        let edge = &g.edges()[0];
        assert_eq!((edge.from, edge.to), (NodeId(1), NodeId(4)));
        assert_eq!(edge.geometry.len(), 4);
    }

    #[test]
    fn test_simplify_keeps_intersections() {
        // A plus-shaped crossing: nothing to simplify
        let nodes = [
            (1, 0.0, 0.0),
            (2, -0.001, 0.0),
            (3, 0.001, 0.0),
            (4, 0.0, 0.001),
            (5, 0.0, -0.001),
        ];
        let mut g = graph(&nodes, &two_way(&[(1, 2), (1, 3), (1, 4), (1, 5)]));
        g.simplify();
        assert_eq!(g.node_count(), 5);
        assert_eq!(g.edge_count(), 8);
    }

    #[test]
    fn test_simplify_collapses_ring() {
        // Closed two-way loop where every node has exactly two neighbours
        let nodes = [
            (7, 0.0, 0.0),
            (3, 0.001, 0.0),
            (9, 0.001, 0.001),
            (5, 0.0, 0.001),
        ];
        let mut g = graph(&nodes, &two_way(&[(7, 3), (3, 9), (9, 5), (5, 7)]));
        let total: f64 = g.edges().iter().map(|e| e.length).sum();

        g.simplify();

        assert_eq!(g.node_count(), 1);
        assert!(g.contains(NodeId(3)));
        // One loop per direction, each going all the way round
        assert_eq!(g.edge_count(), 2);
        for edge in g.edges() {
            assert_eq!((edge.from, edge.to), (NodeId(3), NodeId(3)));
            assert_eq!(edge.geometry.len(), 5);
            assert_eq!(edge.geometry.first(), edge.geometry.last());
        }
        let after: f64 = g.edges().iter().map(|e| e.length).sum();
        assert!((total - after).abs() < 1e-6);
    }

    #[test]
    fn test_simplify_one_way_ring() {
        let nodes = [(1, 0.0, 0.0), (2, 0.001, 0.0), (3, 0.0005, 0.001)];
        let mut g = graph(&nodes, &[(1, 2), (2, 3), (3, 1)]);
        g.simplify();
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.edges()[0].geometry.len(), 4);
    }

    #[test]
    fn test_truncate() {
        let nodes = [(1, 0.0, 0.0), (2, 0.5, 0.5), (3, 2.0, 2.0)];
        let mut g = graph(&nodes, &two_way(&[(1, 2), (2, 3)]));
        g.truncate(&BBox::new(-1.0, -1.0, 1.0, 1.0));
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 2);
        assert!(!g.contains(NodeId(3)));
    }

    #[test]
    fn test_retain_largest_component() {
        let nodes = [
            (1, 0.0, 0.0),
            (2, 0.1, 0.0),
            (3, 0.2, 0.0),
            (10, 1.0, 1.0),
            (11, 1.1, 1.0),
            (20, 5.0, 5.0),
        ];
        // One-way edges still join a weak component
        let mut g = graph(&nodes, &[(1, 2), (3, 2), (10, 11)]);
        let components = g.weak_components();
        assert_eq!(components.len(), 3);
        assert_eq!(components[0].len(), 3);

        g.retain_largest_component();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
        assert!(g.contains(NodeId(3)));
        assert!(!g.contains(NodeId(20)));
    }

    #[test]
    fn test_shortest_edge_picks_minimum() {
        let mut g = graph(&[(1, 0.0, 0.0), (2, 0.001, 0.0)], &[(1, 2)]);
        g.edges.push(Edge {
            from: NodeId(1),
            to: NodeId(2),
            way: 9,
            length: 1.0,
            geometry: vec![(0.0, 0.0), (0.001, 0.0)],
        });
        assert_eq!(g.shortest_edge(NodeId(1), NodeId(2)).unwrap().way, 9);
        assert!(g.shortest_edge(NodeId(2), NodeId(1)).is_none());
    }
}
