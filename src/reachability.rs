use crate::clustering::ClusterTable;
use crate::geometry_utils::{append_path, distance, reversed};
use crate::graph_types::{ClusterId, Edge, EdgeId, Endpoint, NodeId, StreetGraph};
use crate::predicates::Predicates;
use ahash::AHashMap;
use geo_types::{Coord, LineString};

/// Read-only view a walk runs against.
pub struct GraphView<'a> {
    pub graph: &'a StreetGraph,
    pub clusters: &'a ClusterTable,
    pub incidence: &'a AHashMap<NodeId, Vec<EdgeId>>,
    pub predicates: Predicates,
}

impl GraphView<'_> {
    fn incident(&self, node: NodeId) -> &[EdgeId] {
        self.incidence.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    fn position(&self, node: NodeId) -> Option<Coord<f64>> {
        self.graph.position(node)
    }
}

/// Result of a successful walk towards a cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Reach {
    pub cluster: ClusterId,
    /// Starting edge followed by every traversed edge, oriented along the walk.
    pub merged_line: LineString<f64>,
    pub lines_traversed: Vec<EdgeId>,
    /// Intermediate nodes the walk passed through, in order.
    pub nodes_traversed: Vec<NodeId>,
    /// Node where the cluster was found.
    pub last_node: NodeId,
    pub clusters_traversed: Vec<ClusterId>,
}

/// Walk away from one end of `edge` along continuing edges until a clustered
/// node is reached.
///
/// With a `target` only that cluster ends the walk; other clusters met on the
/// way are recorded and passed through, and the walk gives up as soon as it
/// ends a step further from the target centroid than where it started.
///
/// Each step takes the straightest candidate passing the continuation test.
/// The walk fails instead of revisiting a node or moving back towards the
/// far end of the starting edge; both guards bound it.
pub fn indirect_cluster(
    view: &GraphView,
    edge: EdgeId,
    from: Endpoint,
    target: Option<ClusterId>,
) -> Option<Reach> {
    let start = view.graph.edge(edge)?;
    let (mut coming_from, other_node, mut path) = match from {
        Endpoint::V => (start.v, start.u, start.geometry.0.clone()),
        Endpoint::U => (start.u, start.v, reversed(&start.geometry).0),
    };
    let other_position = view.position(other_node)?;

    let target_centroid = match target {
        Some(id) => Some(view.clusters.centroid(id)?),
        None => None,
    };
    let distance_start = match target_centroid {
        Some(centroid) => distance(centroid, view.position(coming_from)?),
        None => 0.0,
    };

    let mut last_line: &Edge = start;
    let mut lines_traversed = Vec::new();
    let mut nodes_traversed: Vec<NodeId> = Vec::new();
    let mut clusters_traversed = Vec::new();

    loop {
        if let Some(centroid) = target_centroid {
            if distance(centroid, view.position(coming_from)?) > distance_start {
                return None;
            }
        }

        let mut candidates: Vec<(f64, &Edge)> = view
            .incident(coming_from)
            .iter()
            .filter(|id| **id != last_line.id)
            .filter_map(|id| view.graph.edge(*id))
            .filter_map(|e| {
                let deflection = view.predicates.deflection_at(last_line, e, coming_from)?;
                Some((deflection, e))
            })
            .collect();
        if candidates.is_empty() {
            return None;
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.id.cmp(&b.1.id)));

        let (_, next_line) = candidates
            .into_iter()
            .find(|(_, e)| view.predicates.continues_at(last_line, e, coming_from))?;

        let previous = coming_from;
        let next = next_line.other_node(previous);
        let previous_position = view.position(previous)?;
        let next_position = view.position(next)?;
        if nodes_traversed.contains(&next)
            || distance(next_position, other_position) < distance(previous_position, other_position)
        {
            return None;
        }

        lines_traversed.push(next_line.id);
        nodes_traversed.push(previous);
        if next_line.u == previous {
            append_path(&mut path, &next_line.geometry.0);
        } else {
            append_path(&mut path, &reversed(&next_line.geometry).0);
        }

        let cluster = view.graph.cluster_of(next);
        match (cluster, target) {
            (Some(found), None) => {
                return Some(Reach {
                    cluster: found,
                    merged_line: LineString::new(path),
                    lines_traversed,
                    nodes_traversed,
                    last_node: next,
                    clusters_traversed,
                });
            }
            (Some(found), Some(wanted)) if found == wanted => {
                if clusters_traversed.is_empty() {
                    clusters_traversed = nodes_traversed
                        .iter()
                        .filter_map(|n| view.graph.cluster_of(*n))
                        .collect();
                }
                return Some(Reach {
                    cluster: found,
                    merged_line: LineString::new(path),
                    lines_traversed,
                    nodes_traversed,
                    last_node: next,
                    clusters_traversed,
                });
            }
            (Some(other), Some(_)) => clusters_traversed.push(other),
            (None, _) => {}
        }

        last_line = next_line;
        coming_from = next;
    }
}
