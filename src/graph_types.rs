// ===========================================================================
// Street graph records (nodes = junctions, edges = road segments)
// ===========================================================================
use crate::error::GraphError;
use crate::geometry_utils::polyline_length;
use ahash::AHashMap;
use geo_types::{Coord, LineString};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Node and cluster ids share one id space; clusters are allocated above the largest node id.
pub type NodeId = i64;
pub type EdgeId = i64;
pub type ClusterId = i64;

/// Properties carried through the simplification untouched.
pub type Attributes = Map<String, Value>;

/// Which end of an edge a search starts from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    U,
    V,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub position: Coord<f64>,
    /// Set by the cluster builder, cleared once the node is folded into a centroid.
    pub cluster: Option<ClusterId>,
    pub attributes: Attributes,
}

impl Node {
    pub fn new(id: NodeId, x: f64, y: f64) -> Self {
        Self {
            id,
            position: Coord { x, y },
            cluster: None,
            attributes: Attributes::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub u: NodeId,
    pub v: NodeId,
    /// First coordinate sits on `u`, last on `v`.
    pub geometry: LineString<f64>,
    pub name: Option<String>,
    pub length: f64,
    pub pedestrian: bool,
    pub attributes: Attributes,

    // Derived by the cluster builder. A direct cluster and a reachable
    // cluster are never both set for the same endpoint.
    pub clus_u: Option<ClusterId>,
    pub clus_v: Option<ClusterId>,
    pub clus_u_reach: Option<ClusterId>,
    pub clus_v_reach: Option<ClusterId>,
    pub forced_cluster: bool,
    /// Geometry was replaced by a computed centerline.
    pub new_geo: bool,
}

impl Edge {
    pub fn new(id: EdgeId, u: NodeId, v: NodeId, geometry: LineString<f64>) -> Self {
        let length = polyline_length(&geometry);
        Self {
            id,
            u,
            v,
            geometry,
            name: None,
            length,
            pedestrian: false,
            attributes: Attributes::new(),
            clus_u: None,
            clus_v: None,
            clus_u_reach: None,
            clus_v_reach: None,
            forced_cluster: false,
            new_geo: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.length = length;
        self
    }

    pub fn with_pedestrian(mut self, pedestrian: bool) -> Self {
        self.pedestrian = pedestrian;
        self
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.u == node || self.v == node
    }

    pub fn other_node(&self, node: NodeId) -> NodeId {
        if self.u == node { self.v } else { self.u }
    }

    pub fn clear_cluster_fields(&mut self) {
        self.clus_u = None;
        self.clus_v = None;
        self.clus_u_reach = None;
        self.clus_v_reach = None;
        self.forced_cluster = false;
    }
}

/// One snapshot of the street network. Ordered maps keep every pass deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreetGraph {
    pub nodes: BTreeMap<NodeId, Node>,
    pub edges: BTreeMap<EdgeId, Edge>,
}

impl StreetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateId {
                table: "node",
                id: node.id,
            });
        }
        self.nodes.insert(node.id, node);
        Ok(())
    }

    /// Adds an edge after checking that both endpoints exist.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        if self.edges.contains_key(&edge.id) {
            return Err(GraphError::DuplicateId {
                table: "edge",
                id: edge.id,
            });
        }
        for node in [edge.u, edge.v] {
            if !self.nodes.contains_key(&node) {
                return Err(GraphError::UnknownNode {
                    edge: edge.id,
                    node,
                });
            }
        }
        if edge.geometry.0.len() < 2 {
            return Err(GraphError::InvalidGeometry {
                table: "edge",
                id: edge.id,
                reason: "a road segment needs at least two coordinates".to_string(),
            });
        }
        self.edges.insert(edge.id, edge);
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(&id)
    }

    pub fn position(&self, id: NodeId) -> Option<Coord<f64>> {
        self.nodes.get(&id).map(|n| n.position)
    }

    pub fn cluster_of(&self, id: NodeId) -> Option<ClusterId> {
        self.nodes.get(&id).and_then(|n| n.cluster)
    }

    pub fn max_node_id(&self) -> Option<NodeId> {
        self.nodes.keys().next_back().copied()
    }

    pub fn next_edge_id(&self) -> EdgeId {
        self.edges.keys().next_back().map(|id| id + 1).unwrap_or(0)
    }

    pub fn remove_edges<'a>(&mut self, ids: impl IntoIterator<Item = &'a EdgeId>) -> usize {
        ids.into_iter()
            .filter(|id| self.edges.remove(id).is_some())
            .count()
    }

    /// Every edge must reference existing nodes.
    pub fn validate(&self) -> Result<(), GraphError> {
        for edge in self.edges.values() {
            for node in [edge.u, edge.v] {
                if !self.nodes.contains_key(&node) {
                    return Err(GraphError::UnknownNode {
                        edge: edge.id,
                        node,
                    });
                }
            }
        }
        Ok(())
    }

    /// Incident edge ids per node, in ascending edge id.
    pub fn incidence(&self) -> AHashMap<NodeId, Vec<EdgeId>> {
        let mut incidence: AHashMap<NodeId, Vec<EdgeId>> = AHashMap::new();
        for edge in self.edges.values() {
            incidence.entry(edge.u).or_default().push(edge.id);
            if edge.v != edge.u {
                incidence.entry(edge.v).or_default().push(edge.id);
            }
        }
        incidence
    }
}
