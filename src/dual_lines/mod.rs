// ===========================================================================
// Dual carriageway dissolution
// ===========================================================================
//
// Two passes share one bundle pipeline:
//   1. Cluster pass: bundles share an anchor cluster and run to a goal cluster.
//   2. Node pass: bundles share a plain anchor node and run to a goal cluster.
//
// Bundles are built from a snapshot taken at the start of the pass. Geometry
// edits go to the working graph, removals are collected and applied once the
// pass is over.

use crate::centerline::center_line_between;
use crate::clustering::{ClusterTable, assign_cluster_edges};
use crate::config::SimplifyConfig;
use crate::error::GraphError;
use crate::geometry_utils::{
    distance, midpoint, polyline_length, project, reversed, same_coord, split_at_distance,
};
use crate::graph_types::{ClusterId, Edge, EdgeId, Endpoint, NodeId, StreetGraph};
use crate::predicates::{Predicates, names_compatible, shared_node};
use crate::reachability::{GraphView, indirect_cluster};
use crate::reassign::reassign_edges;
use ahash::{AHashMap, AHashSet};
use geo_types::{Coord, LineString};
use itertools::Itertools;
use log::{debug, info};
use std::collections::BTreeSet;

#[cfg(test)]
mod dual_lines_tests;

/// What a bundle is resolved around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Cluster(ClusterId),
    Node(NodeId),
}

impl Anchor {
    fn is_cluster(&self) -> bool {
        matches!(self, Anchor::Cluster(_))
    }
}

/// One committed dissolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    pub anchor: Anchor,
    pub goal: ClusterId,
    pub survivor: EdgeId,
    pub removed: Vec<EdgeId>,
    /// The merged line was grafted through intermediate nodes.
    pub interpolated: bool,
}

#[derive(Debug, Clone)]
pub struct ClusterPassOutput {
    pub graph: StreetGraph,
    pub clusters: ClusterTable,
    pub merges: Vec<Merge>,
}

#[derive(Debug, Clone)]
pub struct NodePassOutput {
    pub graph: StreetGraph,
    pub merges: Vec<Merge>,
}

/// A bundle candidate, oriented so that `u` sits on the anchor side.
#[derive(Debug, Clone)]
struct Member {
    edge: EdgeId,
    u: NodeId,
    geometry: LineString<f64>,
    name: Option<String>,
    clus_v: Option<ClusterId>,
    clus_v_reach: Option<ClusterId>,
    /// Stored end the far side corresponds to: `V` unless the edge was flipped.
    far_end: Endpoint,
    forced: bool,
    lines_traversed: Vec<EdgeId>,
    nodes_traversed: Vec<NodeId>,
    clusters_traversed: Vec<ClusterId>,
    last_node: Option<NodeId>,
}

impl Member {
    fn oriented(edge: &Edge, anchor_at: Endpoint) -> Self {
        let (u, geometry, clus_v, clus_v_reach, far_end) = match anchor_at {
            Endpoint::U => (
                edge.u,
                edge.geometry.clone(),
                edge.clus_v,
                edge.clus_v_reach,
                Endpoint::V,
            ),
            Endpoint::V => (
                edge.v,
                reversed(&edge.geometry),
                edge.clus_u,
                edge.clus_u_reach,
                Endpoint::U,
            ),
        };
        Self {
            edge: edge.id,
            u,
            geometry,
            name: edge.name.clone(),
            clus_v,
            clus_v_reach,
            far_end,
            forced: false,
            lines_traversed: Vec::new(),
            nodes_traversed: Vec::new(),
            clusters_traversed: Vec::new(),
            last_node: None,
        }
    }

    fn goal(&self) -> Option<ClusterId> {
        self.clus_v.or(self.clus_v_reach)
    }

    fn was_flipped(&self) -> bool {
        self.far_end == Endpoint::U
    }

    fn length(&self) -> f64 {
        polyline_length(&self.geometry)
    }
}

#[derive(Debug)]
struct Bundle {
    anchor: Anchor,
    goal: ClusterId,
    /// `members[0]` is the edge that survives a merge.
    members: Vec<Member>,
}

impl Bundle {
    fn interpolates(&self) -> bool {
        self.members.iter().any(|m| !m.nodes_traversed.is_empty())
    }

    fn nodes_traversed(&self) -> Vec<NodeId> {
        self.members
            .iter()
            .flat_map(|m| m.nodes_traversed.iter().copied())
            .unique()
            .collect()
    }

    fn clusters_traversed(&self) -> Vec<ClusterId> {
        self.members
            .iter()
            .flat_map(|m| m.clusters_traversed.iter().copied())
            .unique()
            .collect()
    }

    fn last_node(&self) -> Option<NodeId> {
        self.members.iter().rev().find_map(|m| m.last_node)
    }
}

/// Read-only inputs of one pass.
struct PassContext<'a> {
    original: &'a StreetGraph,
    original_clusters: &'a ClusterTable,
    incidence: AHashMap<NodeId, Vec<EdgeId>>,
    predicates: Predicates,
    config: &'a SimplifyConfig,
}

impl<'a> PassContext<'a> {
    fn new(
        original: &'a StreetGraph,
        original_clusters: &'a ClusterTable,
        config: &'a SimplifyConfig,
    ) -> Self {
        Self {
            original,
            original_clusters,
            incidence: original.incidence(),
            predicates: Predicates::from(config),
            config,
        }
    }

    fn view(&self) -> GraphView<'_> {
        GraphView {
            graph: self.original,
            clusters: self.original_clusters,
            incidence: &self.incidence,
            predicates: self.predicates,
        }
    }
}

#[derive(Debug, Default)]
struct DissolveState {
    processed: AHashSet<EdgeId>,
    to_drop: BTreeSet<EdgeId>,
    merges: Vec<Merge>,
}

impl DissolveState {
    fn commit(&mut self, merge: Merge) {
        self.to_drop.extend(merge.removed.iter().copied());
        self.to_drop.remove(&merge.survivor);
        self.processed.insert(merge.survivor);
        self.processed.extend(merge.removed.iter().copied());
        self.merges.push(merge);
    }
}

// --- Bundle formation ---

/// Can `other` join a cluster-pass bundle led by `road`?
fn is_possible_dual(
    ctx: &PassContext,
    road: &Edge,
    other: &Edge,
    processed: &AHashSet<EdgeId>,
) -> bool {
    if processed.contains(&other.id) {
        return false;
    }
    if let Some(node) = shared_node(road, other) {
        if ctx.original.cluster_of(node).is_none() {
            return false;
        }
    }
    ctx.predicates.is_parallel(road, other)
}

/// Keep only members that reach `goal`, forcing a targeted search where the
/// default reachability points elsewhere.
fn conform_to_goal(ctx: &PassContext, members: &mut Vec<Member>, goal: ClusterId) {
    let view = ctx.view();
    let mut kept = Vec::with_capacity(members.len());
    for (i, mut member) in members.drain(..).enumerate() {
        if i == 0 || member.goal() == Some(goal) {
            kept.push(member);
            continue;
        }
        if indirect_cluster(&view, member.edge, member.far_end, Some(goal)).is_some() {
            member.forced = true;
            member.clus_v_reach = Some(goal);
            member.clus_v = None;
            kept.push(member);
        } else {
            debug!(
                "Edge {} cannot be steered towards cluster {}",
                member.edge, goal
            );
        }
    }
    *members = kept;
}

fn shares_end_coord(a: &LineString<f64>, b: &LineString<f64>) -> bool {
    let ends = |l: &LineString<f64>| [l.0.first().copied(), l.0.last().copied()];
    ends(a)
        .into_iter()
        .flatten()
        .any(|x| ends(b).into_iter().flatten().any(|y| same_coord(x, y)))
}

/// Index of the longer member in the first pair whose ends touch.
/// Pairs of equal length are left alone.
fn longer_touching(members: &[Member]) -> Option<usize> {
    (0..members.len()).tuple_combinations().find_map(|(i, j)| {
        if !shares_end_coord(&members[i].geometry, &members[j].geometry) {
            return None;
        }
        let (li, lj) = (members[i].length(), members[j].length());
        if li > lj {
            Some(i)
        } else if li < lj {
            Some(j)
        } else {
            None
        }
    })
}

fn traversals_overlap(a: &Member, b: &Member) -> bool {
    a.lines_traversed
        .iter()
        .any(|id| b.lines_traversed.contains(id))
}

/// Later member of the first pair whose walks share an edge.
fn later_overlapping(members: &[Member]) -> Option<usize> {
    (0..members.len())
        .tuple_combinations()
        .find(|(i, j)| traversals_overlap(&members[*i], &members[*j]))
        .map(|(_, j)| j)
}

/// Resolve members without a direct goal by walking to it.
/// `None` when the bundle cannot be completed.
fn complete_bundle(ctx: &PassContext, mut bundle: Bundle) -> Option<Bundle> {
    if bundle.members.iter().all(|m| m.clus_v.is_some()) {
        return Some(bundle);
    }

    let cluster_pass = bundle.anchor.is_cluster();
    if cluster_pass && bundle.members.len() > 2 {
        while let Some(k) = longer_touching(&bundle.members) {
            bundle.members.remove(k);
        }
    }
    if bundle.members.len() < 2 {
        return None;
    }

    let view = ctx.view();
    for member in bundle.members.iter_mut().filter(|m| m.clus_v.is_none()) {
        let target = if cluster_pass && member.forced {
            Some(bundle.goal)
        } else {
            None
        };
        let reach = indirect_cluster(&view, member.edge, member.far_end, target)?;
        member.geometry = reach.merged_line;
        member.lines_traversed = reach.lines_traversed;
        member.nodes_traversed = reach.nodes_traversed;
        member.clusters_traversed = reach.clusters_traversed;
        member.last_node = Some(reach.last_node);
    }

    if cluster_pass && bundle.members.len() > 2 {
        while let Some(j) = later_overlapping(&bundle.members) {
            bundle.members.remove(j);
        }
    }
    match bundle.members.len() {
        0 | 1 => None,
        2 if traversals_overlap(&bundle.members[0], &bundle.members[1]) => None,
        _ => Some(bundle),
    }
}

// --- Dissolution ---

/// Lines that start far apart and end close together (or the reverse) are not duals.
fn staggered(a: &LineString<f64>, b: &LineString<f64>, max_ratio: f64) -> bool {
    let (Some(a0), Some(a1), Some(b0), Some(b1)) =
        (a.0.first(), a.0.last(), b.0.first(), b.0.last())
    else {
        return true;
    };
    let (start_gap, end_gap) = if distance(*a0, *b0) > distance(*a0, *b1) {
        (distance(*a0, *b1), distance(*a1, *b0))
    } else {
        (distance(*a0, *b0), distance(*a1, *b1))
    };
    start_gap > end_gap * max_ratio || end_gap > start_gap * max_ratio
}

fn lengths_comparable(lines: &[&LineString<f64>], max_ratio: f64) -> bool {
    let lengths: Vec<f64> = lines.iter().map(|l| polyline_length(l)).collect();
    lengths
        .iter()
        .tuple_combinations()
        .all(|(a, b)| *a <= *b * max_ratio && *b <= *a * max_ratio)
}

/// Mean distance from each line's midpoint to the others', divided by the bundle size.
fn mean_midpoint_distances(lines: &[(usize, LineString<f64>)]) -> Vec<f64> {
    let mids: Vec<Option<Coord<f64>>> = lines.iter().map(|(_, l)| midpoint(l)).collect();
    let n = lines.len() as f64;
    mids.iter()
        .enumerate()
        .map(|(i, a)| {
            let total: f64 = mids
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, b)| match (a, b) {
                    (Some(a), Some(b)) => distance(*a, *b),
                    _ => 0.0,
                })
                .sum();
            total / n
        })
        .collect()
}

/// Repeatedly discard the two lines lying furthest from the rest until `target` remain.
fn reduce_to_core(
    mut lines: Vec<(usize, LineString<f64>)>,
    target: usize,
) -> Vec<(usize, LineString<f64>)> {
    while lines.len() > target {
        let means = mean_midpoint_distances(&lines);
        let order: Vec<usize> = (0..lines.len())
            .sorted_by(|a, b| means[*a].total_cmp(&means[*b]))
            .collect();
        let mut outliers = order[order.len() - 2..].to_vec();
        outliers.sort_unstable_by(|a, b| b.cmp(a));
        for i in outliers {
            lines.remove(i);
        }
    }
    lines
}

/// Of three lines, the one left over once the two furthest apart are set aside.
fn central_line(lines: &[(usize, LineString<f64>)]) -> Option<usize> {
    let mids: Vec<Coord<f64>> = lines
        .iter()
        .map(|(_, l)| midpoint(l))
        .collect::<Option<Vec<_>>>()?;
    let mut max_distance = 0.0;
    let mut secondary: Option<(usize, usize)> = None;
    for i in 0..mids.len() {
        for j in 0..mids.len() {
            if i == j {
                continue;
            }
            let d = distance(mids[i], mids[j]);
            if d > max_distance {
                max_distance = d;
                secondary = Some((i, j));
            }
        }
    }
    let (a, b) = secondary.unwrap_or((0, 1));
    (0..lines.len()).find(|i| *i != a && *i != b)
}

fn anchor_position(
    anchor: Anchor,
    graph: &StreetGraph,
    clusters: &ClusterTable,
) -> Option<Coord<f64>> {
    match anchor {
        Anchor::Cluster(c) => clusters.centroid(c),
        Anchor::Node(n) => graph.position(n),
    }
}

/// The merged geometry for a bundle, oriented from the anchor to the goal.
fn merged_geometry(
    bundle: &Bundle,
    graph: &StreetGraph,
    clusters: &ClusterTable,
    config: &SimplifyConfig,
) -> Option<LineString<f64>> {
    let cluster_pass = bundle.anchor.is_cluster();
    let members = &bundle.members;

    if cluster_pass
        && !members
            .iter()
            .map(|m| m.name.as_deref())
            .tuple_combinations()
            .all(|(a, b)| names_compatible(a, b))
    {
        return None;
    }
    let geometries: Vec<&LineString<f64>> = members.iter().map(|m| &m.geometry).collect();
    if !lengths_comparable(&geometries, config.max_length_ratio) {
        return None;
    }

    let from = anchor_position(bundle.anchor, graph, clusters)?;
    let to = clusters.centroid(bundle.goal)?;
    let pinned = |a: &LineString<f64>, b: &LineString<f64>| {
        center_line_between(a, b, from, to, config.max_centroid_separation)
    };

    if members.len() == 2 {
        let (a, b) = (&members[0].geometry, &members[1].geometry);
        if cluster_pass
            && !bundle.interpolates()
            && !shares_end_coord(a, b)
            && staggered(a, b, config.max_offset_ratio)
        {
            return None;
        }
        return pinned(a, b);
    }

    let lines: Vec<(usize, LineString<f64>)> = members
        .iter()
        .enumerate()
        .map(|(i, m)| (i, m.geometry.clone()))
        .collect();
    if lines.len() % 2 == 0 {
        let core = reduce_to_core(lines, 2);
        pinned(&core[0].1, &core[1].1)
    } else {
        let core = reduce_to_core(lines, 3);
        let central = central_line(&core)?;
        Some(core[central].1.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stop {
    Node(NodeId),
    Cluster(ClusterId),
}

/// Graft `center_line` through the nodes a walk passed.
///
/// Every traversed node moves onto the line and splits it, the survivor
/// covering the first piece and fresh edges the rest; traversed cluster
/// centroids are moved onto the line as well. Returns the ids of every piece.
#[allow(clippy::too_many_arguments)]
pub(crate) fn interpolate_on_center_line(
    graph: &mut StreetGraph,
    clusters: &mut ClusterTable,
    survivor: EdgeId,
    center_line: &LineString<f64>,
    first_node: NodeId,
    last_node: NodeId,
    nodes_traversed: &[NodeId],
    clusters_traversed: &[ClusterId],
) -> Option<Vec<EdgeId>> {
    let template = graph.edge(survivor)?.clone();

    let mut stops: Vec<(f64, Stop, Coord<f64>)> = Vec::new();
    for node in nodes_traversed.iter().unique() {
        let (along, _, on_line) = project(center_line, graph.position(*node)?)?;
        stops.push((along, Stop::Node(*node), on_line));
    }
    for cluster in clusters_traversed.iter().unique() {
        let Some(centroid) = clusters.centroid(*cluster) else {
            continue;
        };
        let (along, _, on_line) = project(center_line, centroid)?;
        stops.push((along, Stop::Cluster(*cluster), on_line));
    }
    stops.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut pieces = vec![survivor];
    let mut current = survivor;
    let mut from = first_node;
    let mut remaining = center_line.clone();
    let mut consumed = 0.0;
    let mut next_id = graph.next_edge_id();

    for (along, stop, on_line) in stops {
        let node = match stop {
            Stop::Cluster(c) => {
                if let Some(cluster) = clusters.get_mut(c) {
                    cluster.centroid = on_line;
                }
                continue;
            }
            Stop::Node(n) => n,
        };

        if let Some(n) = graph.node_mut(node) {
            n.position = on_line;
        }
        for edge in graph.edges.values_mut().filter(|e| e.id != current) {
            let coords = &mut edge.geometry.0;
            if coords.is_empty() {
                continue;
            }
            if edge.u == node {
                coords[0] = on_line;
            }
            if edge.v == node {
                let last = coords.len() - 1;
                coords[last] = on_line;
            }
        }

        let (head, tail) = split_at_distance(&remaining, along - consumed)?;
        let edge = graph.edge_mut(current)?;
        edge.u = from;
        edge.v = node;
        edge.length = polyline_length(&head);
        edge.geometry = head;
        edge.new_geo = true;

        let mut rest = template.clone();
        rest.id = next_id;
        rest.u = node;
        rest.v = last_node;
        rest.length = polyline_length(&tail);
        rest.geometry = tail.clone();
        rest.new_geo = true;
        graph.edges.insert(next_id, rest);
        pieces.push(next_id);

        current = next_id;
        next_id += 1;
        from = node;
        remaining = tail;
        consumed = along;
    }

    if pieces.len() == 1 {
        let edge = graph.edge_mut(survivor)?;
        edge.u = first_node;
        edge.v = last_node;
        edge.length = polyline_length(center_line);
        edge.geometry = center_line.clone();
        edge.new_geo = true;
    }
    Some(pieces)
}

/// Write the merged geometry into the working graph. Returns the edges now
/// carrying it, or `None` when a guard rejects the bundle.
fn dissolve_bundle(
    bundle: &Bundle,
    graph: &mut StreetGraph,
    clusters: &mut ClusterTable,
    config: &SimplifyConfig,
) -> Option<Vec<EdgeId>> {
    let merged = merged_geometry(bundle, graph, clusters, config)?;
    let survivor = &bundle.members[0];

    if bundle.interpolates() {
        let last_node = bundle.last_node()?;
        return interpolate_on_center_line(
            graph,
            clusters,
            survivor.edge,
            &merged,
            survivor.u,
            last_node,
            &bundle.nodes_traversed(),
            &bundle.clusters_traversed(),
        );
    }

    let geometry = if survivor.was_flipped() {
        reversed(&merged)
    } else {
        merged
    };
    let edge = graph.edge_mut(survivor.edge)?;
    edge.length = polyline_length(&geometry);
    edge.geometry = geometry;
    edge.new_geo = true;
    Some(vec![survivor.edge])
}

/// Snapshot edges a committed bundle makes redundant, survivor excluded.
fn removed_edges(ctx: &PassContext, bundle: &Bundle) -> Vec<EdgeId> {
    let traversed: AHashSet<NodeId> = bundle.nodes_traversed().into_iter().collect();
    let ends: Vec<ClusterId> = match bundle.anchor {
        Anchor::Cluster(c) => vec![c, bundle.goal],
        Anchor::Node(_) => Vec::new(),
    };
    let at_end = |c: Option<ClusterId>| c.is_some_and(|c| ends.contains(&c));

    let mut removed: BTreeSet<EdgeId> = BTreeSet::new();
    if !traversed.is_empty() {
        for e in ctx.original.edges.values() {
            let (u_in, v_in) = (traversed.contains(&e.u), traversed.contains(&e.v));
            let between = (u_in && v_in)
                || (at_end(e.clus_u) && v_in)
                || (at_end(e.clus_v) && u_in)
                || (at_end(e.clus_u_reach) && v_in)
                || (at_end(e.clus_v_reach) && u_in);
            if between {
                removed.insert(e.id);
            }
        }
    }
    for member in &bundle.members {
        removed.insert(member.edge);
        removed.extend(member.lines_traversed.iter().copied());
    }
    removed.remove(&bundle.members[0].edge);
    removed.into_iter().collect()
}

/// Run a completed bundle through dissolution and record it.
fn try_commit(
    ctx: &PassContext,
    bundle: Bundle,
    graph: &mut StreetGraph,
    clusters: &mut ClusterTable,
    state: &mut DissolveState,
) -> bool {
    let Some(pieces) = dissolve_bundle(&bundle, graph, clusters, ctx.config) else {
        debug!(
            "Bundle led by edge {} towards cluster {} rejected",
            bundle.members[0].edge, bundle.goal
        );
        return false;
    };

    let removed = removed_edges(ctx, &bundle);
    let pedestrian = bundle
        .members
        .iter()
        .flat_map(|m| std::iter::once(m.edge).chain(m.lines_traversed.iter().copied()))
        .filter_map(|id| ctx.original.edge(id))
        .any(|e| e.pedestrian);
    let forced = bundle.members[0].forced;
    for id in &pieces {
        if let Some(edge) = graph.edge_mut(*id) {
            edge.pedestrian |= pedestrian;
            edge.forced_cluster = forced;
        }
    }

    if let Anchor::Cluster(c) = bundle.anchor {
        clusters.set_keep(c);
    }
    clusters.set_keep(bundle.goal);

    debug!(
        "Dissolved {} lines into edge {} ({:?} -> cluster {}), dropping {:?}",
        bundle.members.len(),
        bundle.members[0].edge,
        bundle.anchor,
        bundle.goal,
        removed
    );
    state.commit(Merge {
        anchor: bundle.anchor,
        goal: bundle.goal,
        survivor: bundle.members[0].edge,
        removed,
        interpolated: bundle.interpolates(),
    });
    true
}

fn cluster_side(edge: &Edge, cluster: ClusterId) -> Endpoint {
    if edge.clus_v == Some(cluster) {
        Endpoint::V
    } else {
        Endpoint::U
    }
}

fn node_side(edge: &Edge, node: NodeId) -> Endpoint {
    if edge.u == node { Endpoint::U } else { Endpoint::V }
}

fn reset_pass_flags(graph: &mut StreetGraph, clusters: &mut ClusterTable) {
    clusters.reset_keep();
    for edge in graph.edges.values_mut() {
        edge.new_geo = false;
        edge.forced_cluster = false;
    }
}

// --- Passes ---

/// Dissolve dual lines running between pairs of clusters, most complex clusters first.
pub fn simplify_dual_lines(
    mut graph: StreetGraph,
    mut clusters: ClusterTable,
    config: &SimplifyConfig,
) -> Result<ClusterPassOutput, GraphError> {
    graph.validate()?;
    reset_pass_flags(&mut graph, &mut clusters);
    let original = graph.clone();
    let original_clusters = clusters.clone();
    let ctx = PassContext::new(&original, &original_clusters, config);
    let mut state = DissolveState::default();

    for cluster in original_clusters.ids_by_degree_desc() {
        let touching: Vec<&Edge> = original
            .edges
            .values()
            .filter(|e| {
                (e.clus_u == Some(cluster) || e.clus_v == Some(cluster)) && e.clus_u != e.clus_v
            })
            .sorted_by(|a, b| b.length.total_cmp(&a.length).then(a.id.cmp(&b.id)))
            .collect();
        if touching.len() <= 1 {
            continue;
        }

        for road in &touching {
            if state.processed.contains(&road.id) {
                continue;
            }
            let mut members = vec![Member::oriented(road, cluster_side(road, cluster))];
            members.extend(
                touching
                    .iter()
                    .filter(|e| e.id != road.id)
                    .filter(|e| is_possible_dual(&ctx, road, e, &state.processed))
                    .map(|e| Member::oriented(e, cluster_side(e, cluster))),
            );
            if members.len() < 2 {
                continue;
            }

            let Some(goal) = members[0].goal() else {
                continue;
            };
            if goal == cluster {
                continue;
            }
            conform_to_goal(&ctx, &mut members, goal);
            if members.len() < 2 {
                continue;
            }

            let bundle = Bundle {
                anchor: Anchor::Cluster(cluster),
                goal,
                members,
            };
            if let Some(bundle) = complete_bundle(&ctx, bundle) {
                try_commit(&ctx, bundle, &mut graph, &mut clusters, &mut state);
            }
        }
    }

    let dropped = graph.remove_edges(&state.to_drop);
    info!(
        "Dual lines between clusters: {} merges, {} edges dropped, {} clusters kept",
        state.merges.len(),
        dropped,
        clusters.kept().count()
    );
    let graph = reassign_edges(graph, &clusters, &config.reassign_clean)?;
    Ok(ClusterPassOutput {
        graph,
        clusters,
        merges: state.merges,
    })
}

/// Dissolve dual lines that fan out from one plain node towards the same cluster.
pub fn simplify_dual_lines_nodes_to_cluster(
    mut graph: StreetGraph,
    mut clusters: ClusterTable,
    config: &SimplifyConfig,
) -> Result<NodePassOutput, GraphError> {
    graph.validate()?;
    assign_cluster_edges(&mut graph, &clusters, Predicates::from(config));
    reset_pass_flags(&mut graph, &mut clusters);
    let original = graph.clone();
    let original_clusters = clusters.clone();
    let ctx = PassContext::new(&original, &original_clusters, config);
    let mut state = DissolveState::default();

    for node in original.nodes.keys().copied() {
        let own_cluster = original.cluster_of(node);
        let incident: Vec<&Edge> = ctx
            .incidence
            .get(&node)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| original.edge(*id))
                    .sorted_by(|a, b| b.length.total_cmp(&a.length).then(a.id.cmp(&b.id)))
                    .collect()
            })
            .unwrap_or_default();

        for road in incident.iter().filter(|e| e.u != e.v) {
            if state.processed.contains(&road.id) {
                continue;
            }
            let lead = Member::oriented(road, node_side(road, node));
            let Some(goal) = lead.goal() else {
                continue;
            };
            if own_cluster == Some(goal) {
                continue;
            }

            let mut members = vec![lead];
            members.extend(
                incident
                    .iter()
                    .filter(|e| e.id != road.id && e.u != e.v)
                    .filter(|e| !state.processed.contains(&e.id))
                    .filter(|e| {
                        [e.clus_u, e.clus_v, e.clus_u_reach, e.clus_v_reach].contains(&Some(goal))
                    })
                    .filter(|e| !ctx.predicates.is_continuation(road, e))
                    .map(|e| Member::oriented(e, node_side(e, node)))
                    .filter(|m| m.goal() == Some(goal)),
            );
            if members.len() < 2 {
                continue;
            }

            let bundle = Bundle {
                anchor: Anchor::Node(node),
                goal,
                members,
            };
            if let Some(bundle) = complete_bundle(&ctx, bundle) {
                try_commit(&ctx, bundle, &mut graph, &mut clusters, &mut state);
            }
        }
    }

    let dropped = graph.remove_edges(&state.to_drop);
    info!(
        "Dual lines from nodes to clusters: {} merges, {} edges dropped",
        state.merges.len(),
        dropped
    );
    let mut graph = reassign_edges(graph, &clusters, &config.reassign_clean)?;
    for node in graph.nodes.values_mut() {
        node.cluster = None;
    }
    Ok(NodePassOutput {
        graph,
        merges: state.merges,
    })
}
