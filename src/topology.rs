// ===========================================================================
// Topology repair: dead ends, islands, duplicate u-v pairs, self-loops
// ===========================================================================
use crate::config::CleanOptions;
use crate::error::GraphError;
use crate::geometry_utils::{polyline_length, same_coord};
use crate::graph_types::{EdgeId, NodeId, StreetGraph};
use ahash::{AHashMap, AHashSet};
use log::{debug, info, warn};

/// Disjoint-set over dense indices.
pub(crate) struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    pub(crate) fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    pub(crate) fn union(&mut self, x: usize, y: usize) {
        let px = self.find(x);
        let py = self.find(y);
        if px != py {
            match self.rank[px].cmp(&self.rank[py]) {
                std::cmp::Ordering::Less => self.parent[px] = py,
                std::cmp::Ordering::Greater => self.parent[py] = px,
                std::cmp::Ordering::Equal => {
                    self.parent[py] = px;
                    self.rank[px] += 1;
                }
            }
        }
    }
}

/// Number of incident edges per node. A self-loop counts twice.
pub fn degrees(graph: &StreetGraph) -> AHashMap<NodeId, usize> {
    let mut degrees: AHashMap<NodeId, usize> = graph.nodes.keys().map(|id| (*id, 0)).collect();
    for edge in graph.edges.values() {
        *degrees.entry(edge.u).or_default() += 1;
        *degrees.entry(edge.v).or_default() += 1;
    }
    degrees
}

/// Snap every edge's end coordinates onto its node positions and refresh its length.
pub fn correct_edges(graph: &mut StreetGraph) -> Result<(), GraphError> {
    let StreetGraph { nodes, edges } = graph;
    for edge in edges.values_mut() {
        let u = nodes.get(&edge.u).ok_or(GraphError::UnknownNode {
            edge: edge.id,
            node: edge.u,
        })?;
        let v = nodes.get(&edge.v).ok_or(GraphError::UnknownNode {
            edge: edge.id,
            node: edge.v,
        })?;
        let coords = &mut edge.geometry.0;
        if coords.len() < 2 {
            *coords = vec![u.position, v.position];
        } else {
            coords[0] = u.position;
            let last = coords.len() - 1;
            coords[last] = v.position;
        }
        edge.length = polyline_length(&edge.geometry);
    }
    Ok(())
}

/// Snap only the edges whose ends are off their node positions. Lengths of
/// aligned edges are left as loaded. Returns the number of edges moved.
pub fn snap_misaligned_ends(graph: &mut StreetGraph) -> Result<usize, GraphError> {
    let StreetGraph { nodes, edges } = graph;
    let mut snapped = 0;
    for edge in edges.values_mut() {
        let u = nodes.get(&edge.u).ok_or(GraphError::UnknownNode {
            edge: edge.id,
            node: edge.u,
        })?;
        let v = nodes.get(&edge.v).ok_or(GraphError::UnknownNode {
            edge: edge.id,
            node: edge.v,
        })?;
        let coords = &mut edge.geometry.0;
        let aligned = match (coords.first(), coords.last()) {
            (Some(first), Some(last)) if coords.len() >= 2 => {
                same_coord(*first, u.position) && same_coord(*last, v.position)
            }
            _ => false,
        };
        if aligned {
            continue;
        }
        if coords.len() < 2 {
            *coords = vec![u.position, v.position];
        } else {
            coords[0] = u.position;
            let last = coords.len() - 1;
            coords[last] = v.position;
        }
        edge.length = polyline_length(&edge.geometry);
        snapped += 1;
    }
    if snapped > 0 {
        warn!("Snapped {} edges whose ends were off their node positions", snapped);
    }
    Ok(snapped)
}

fn drop_self_loops(graph: &mut StreetGraph) -> usize {
    let before = graph.edges.len();
    graph.edges.retain(|_, e| e.u != e.v);
    before - graph.edges.len()
}

/// Keep one edge per unordered node pair: the shortest, lowest id on ties.
fn collapse_same_uv(graph: &mut StreetGraph) -> usize {
    let mut groups: AHashMap<(NodeId, NodeId), Vec<EdgeId>> = AHashMap::new();
    for edge in graph.edges.values() {
        let key = (edge.u.min(edge.v), edge.u.max(edge.v));
        groups.entry(key).or_default().push(edge.id);
    }

    let mut removed = 0;
    for ids in groups.into_values().filter(|ids| ids.len() > 1) {
        let Some(keep) = ids
            .iter()
            .filter_map(|id| graph.edges.get(id))
            .min_by(|a, b| a.length.total_cmp(&b.length).then(a.id.cmp(&b.id)))
            .map(|e| e.id)
        else {
            continue;
        };
        let mut pedestrian = false;
        for id in ids.iter().filter(|id| **id != keep) {
            if let Some(edge) = graph.edges.remove(id) {
                pedestrian |= edge.pedestrian;
                removed += 1;
            }
        }
        if let Some(edge) = graph.edges.get_mut(&keep) {
            edge.pedestrian |= pedestrian;
        }
    }
    removed
}

fn drop_dead_ends(graph: &mut StreetGraph) -> usize {
    let degrees = degrees(graph);
    let before = graph.edges.len();
    graph
        .edges
        .retain(|_, e| degrees.get(&e.u) != Some(&1) && degrees.get(&e.v) != Some(&1));
    before - graph.edges.len()
}

fn drop_orphan_nodes(graph: &mut StreetGraph) -> usize {
    let used: AHashSet<NodeId> = graph.edges.values().flat_map(|e| [e.u, e.v]).collect();
    let before = graph.nodes.len();
    graph.nodes.retain(|id, _| used.contains(id));
    before - graph.nodes.len()
}

/// Keep the largest connected component, by node count. Ties go to the component
/// holding the smallest node id.
fn keep_largest_component(graph: &mut StreetGraph) -> usize {
    if graph.nodes.is_empty() {
        return 0;
    }
    let index: AHashMap<NodeId, usize> = graph
        .nodes
        .keys()
        .enumerate()
        .map(|(i, id)| (*id, i))
        .collect();
    let mut uf = UnionFind::new(index.len());
    for edge in graph.edges.values() {
        if let (Some(a), Some(b)) = (index.get(&edge.u), index.get(&edge.v)) {
            uf.union(*a, *b);
        }
    }

    // node keys are ascending, so the first root seen for a size wins ties
    let mut sizes: AHashMap<usize, usize> = AHashMap::new();
    let mut order: Vec<usize> = Vec::new();
    for i in 0..index.len() {
        let root = uf.find(i);
        let size = sizes.entry(root).or_insert(0);
        if *size == 0 {
            order.push(root);
        }
        *size += 1;
    }
    let Some(best) = order
        .iter()
        .copied()
        .reduce(|best, root| if sizes[&root] > sizes[&best] { root } else { best })
    else {
        return 0;
    };

    let keep: AHashSet<NodeId> = graph
        .nodes
        .keys()
        .filter(|id| uf.find(index[*id]) == best)
        .copied()
        .collect();
    let before = graph.edges.len();
    graph.nodes.retain(|id, _| keep.contains(id));
    graph
        .edges
        .retain(|_, e| keep.contains(&e.u) && keep.contains(&e.v));
    before - graph.edges.len()
}

/// Repeats the enabled repairs until nothing changes, then optionally drops islands.
pub fn clean_network(
    mut graph: StreetGraph,
    options: &CleanOptions,
) -> Result<StreetGraph, GraphError> {
    graph.validate()?;
    let edges_before = graph.edges.len();
    let nodes_before = graph.nodes.len();

    loop {
        let mut changed = 0;
        if options.self_loops {
            changed += drop_self_loops(&mut graph);
        }
        if options.same_uv_edges {
            changed += collapse_same_uv(&mut graph);
        }
        if options.dead_ends {
            changed += drop_dead_ends(&mut graph);
        }
        changed += drop_orphan_nodes(&mut graph);
        if changed == 0 {
            break;
        }
        debug!("clean_network pass removed {} items", changed);
    }

    if options.remove_disconnected_islands {
        let removed = keep_largest_component(&mut graph);
        if removed > 0 {
            debug!("Dropped {} edges outside the main component", removed);
        }
    }

    info!(
        "clean_network: {} -> {} nodes, {} -> {} edges",
        nodes_before,
        graph.nodes.len(),
        edges_before,
        graph.edges.len()
    );
    Ok(graph)
}
