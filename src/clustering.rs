use crate::config::SimplifyConfig;
use crate::geometry_utils::{distance, regular_disc};
use crate::graph_types::{ClusterId, EdgeId, Endpoint, NodeId, StreetGraph};
use crate::predicates::Predicates;
use crate::reachability::{GraphView, indirect_cluster};
use crate::topology::{UnionFind, degrees};
use ahash::AHashMap;
use geo::{Area, BooleanOps, BoundingRect, Centroid, Contains};
use geo_types::{Coord, MultiPolygon, Point, Polygon};
use itertools::Itertools;
use log::{debug, info};
use rstar::{AABB, RTree, RTreeObject};
use std::collections::BTreeMap;

/// A group of junctions close enough to be read as one intersection.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: ClusterId,
    pub polygon: Polygon<f64>,
    pub centroid: Coord<f64>,
    /// Number of nodes mapped to this cluster.
    pub degree: usize,
    /// Survives as a real junction once the round is over.
    pub keep: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ClusterTable {
    clusters: BTreeMap<ClusterId, Cluster>,
}

impl ClusterTable {
    pub fn get(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(&id)
    }

    pub fn get_mut(&mut self, id: ClusterId) -> Option<&mut Cluster> {
        self.clusters.get_mut(&id)
    }

    pub fn insert(&mut self, cluster: Cluster) {
        self.clusters.insert(cluster.id, cluster);
    }

    pub fn centroid(&self, id: ClusterId) -> Option<Coord<f64>> {
        self.clusters.get(&id).map(|c| c.centroid)
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.values()
    }

    /// Most complex junctions first; ties in ascending id.
    pub fn ids_by_degree_desc(&self) -> Vec<ClusterId> {
        self.clusters
            .values()
            .sorted_by(|a, b| b.degree.cmp(&a.degree).then(a.id.cmp(&b.id)))
            .map(|c| c.id)
            .collect()
    }

    pub fn set_keep(&mut self, id: ClusterId) {
        if let Some(c) = self.clusters.get_mut(&id) {
            c.keep = true;
        }
    }

    pub fn is_kept(&self, id: ClusterId) -> bool {
        self.clusters.get(&id).is_some_and(|c| c.keep)
    }

    pub fn reset_keep(&mut self) {
        for c in self.clusters.values_mut() {
            c.keep = false;
        }
    }

    pub fn kept(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.values().filter(|c| c.keep)
    }
}

struct SpatialNode {
    index: usize,
    position: Coord<f64>,
}

impl RTreeObject for SpatialNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.position.x, self.position.y])
    }
}

impl rstar::PointDistance for SpatialNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position.x - point[0];
        let dy = self.position.y - point[1];
        dx * dx + dy * dy
    }
}

/// Bounding box of a cluster polygon; exact containment is checked afterwards.
struct SpatialCluster {
    id: ClusterId,
    bbox: AABB<[f64; 2]>,
}

impl RTreeObject for SpatialCluster {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.bbox
    }
}

impl rstar::PointDistance for SpatialCluster {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.bbox.distance_2(point)
    }
}

/// Groups of eligible nodes whose buffers overlap (centres closer than two radii).
fn overlapping_groups(points: &[(NodeId, Coord<f64>)], radius: f64) -> Vec<Vec<usize>> {
    let tree = RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(index, (_, position))| SpatialNode {
                index,
                position: *position,
            })
            .collect(),
    );

    let reach = 2.0 * radius;
    let mut uf = UnionFind::new(points.len());
    for (i, (_, p)) in points.iter().enumerate() {
        for other in tree.locate_within_distance([p.x, p.y], reach * reach) {
            if other.index != i && distance(*p, other.position) < reach {
                uf.union(i, other.index);
            }
        }
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..points.len() {
        groups.entry(uf.find(i)).or_default().push(i);
    }
    // points are in ascending node id, so ordering by first member is deterministic
    groups
        .into_values()
        .sorted_by_key(|members| members[0])
        .collect()
}

fn buffer_union(centres: &[Coord<f64>], radius: f64, segments: usize) -> MultiPolygon<f64> {
    let mut discs = centres
        .iter()
        .map(|c| MultiPolygon::new(vec![regular_disc(*c, radius, segments)]));
    let Some(first) = discs.next() else {
        return MultiPolygon::new(vec![]);
    };
    discs.fold(first, |acc, disc| acc.union(&disc))
}

/// Build the cluster table and write each node's `cluster`.
///
/// Dead ends never join a cluster. Only union parts larger than a single
/// buffer disc qualify, so a lone junction never forms a cluster. Cluster ids
/// start above the largest node id. Edge cluster fields are derived at the end.
pub fn identify_clusters(
    graph: &mut StreetGraph,
    config: &SimplifyConfig,
) -> ClusterTable {
    let degree = degrees(graph);
    let is_dead_end = |id: &NodeId| degree.get(id).copied().unwrap_or(0) <= 1;

    let eligible: Vec<(NodeId, Coord<f64>)> = graph
        .nodes
        .values()
        .filter(|n| !is_dead_end(&n.id))
        .map(|n| (n.id, n.position))
        .collect();

    let single_disc_area = std::f64::consts::PI * config.radius * config.radius;
    let mut next_id = graph.max_node_id().map(|id| id + 1).unwrap_or(0);
    let mut clusters = ClusterTable::default();

    for group in overlapping_groups(&eligible, config.radius) {
        if group.len() < 2 {
            continue;
        }
        let centres: Vec<Coord<f64>> = group.iter().map(|i| eligible[*i].1).collect();
        let union = buffer_union(&centres, config.radius, config.buffer_segments);
        for polygon in union.0 {
            if polygon.unsigned_area() <= single_disc_area {
                continue;
            }
            let Some(centroid) = polygon.centroid() else {
                continue;
            };
            clusters.insert(Cluster {
                id: next_id,
                polygon,
                centroid: centroid.0,
                degree: 0,
                keep: false,
            });
            next_id += 1;
        }
    }

    let tree = RTree::bulk_load(
        clusters
            .iter()
            .filter_map(|c| {
                let rect = c.polygon.bounding_rect()?;
                Some(SpatialCluster {
                    id: c.id,
                    bbox: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect(),
    );

    let mut counts: AHashMap<ClusterId, usize> = AHashMap::new();
    for node in graph.nodes.values_mut() {
        node.cluster = None;
        if is_dead_end(&node.id) {
            continue;
        }
        let point = Point::from(node.position);
        node.cluster = tree
            .locate_within_distance([point.x(), point.y()], 0.0)
            .map(|candidate| candidate.id)
            .sorted()
            .find(|id| clusters.get(*id).is_some_and(|c| c.polygon.contains(&point)));
        if let Some(id) = node.cluster {
            *counts.entry(id).or_default() += 1;
        }
    }
    for (id, count) in counts {
        if let Some(c) = clusters.get_mut(id) {
            c.degree = count;
        }
    }

    info!(
        "Identified {} clusters from {} junction nodes (radius {})",
        clusters.len(),
        eligible.len(),
        config.radius
    );

    assign_cluster_edges(graph, &clusters, Predicates::from(config));
    clusters
}

/// Derive `clus_u`/`clus_v` from the endpoint nodes, then search the reachable
/// cluster for every endpoint that has no direct one.
pub fn assign_cluster_edges(
    graph: &mut StreetGraph,
    clusters: &ClusterTable,
    predicates: Predicates,
) {
    let node_cluster: AHashMap<NodeId, Option<ClusterId>> =
        graph.nodes.values().map(|n| (n.id, n.cluster)).collect();
    for edge in graph.edges.values_mut() {
        edge.clear_cluster_fields();
        edge.clus_u = node_cluster.get(&edge.u).copied().flatten();
        edge.clus_v = node_cluster.get(&edge.v).copied().flatten();
    }

    let incidence = graph.incidence();
    let view = GraphView {
        graph: &*graph,
        clusters,
        incidence: &incidence,
        predicates,
    };
    let mut reached: Vec<(EdgeId, Endpoint, ClusterId)> = Vec::new();
    for edge in graph.edges.values() {
        for (end, direct) in [(Endpoint::U, edge.clus_u), (Endpoint::V, edge.clus_v)] {
            if direct.is_some() {
                continue;
            }
            if let Some(reach) = indirect_cluster(&view, edge.id, end, None) {
                reached.push((edge.id, end, reach.cluster));
            }
        }
    }

    let count = reached.len();
    for (id, end, cluster) in reached {
        if let Some(edge) = graph.edges.get_mut(&id) {
            match end {
                Endpoint::U => edge.clus_u_reach = Some(cluster),
                Endpoint::V => edge.clus_v_reach = Some(cluster),
            }
        }
    }
    debug!("{} edge endpoints reach a cluster indirectly", count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_types::{Edge, Node};
    use geo_types::LineString;

    fn grid_graph(nodes: &[(i64, f64, f64)], edges: &[(i64, i64, i64)]) -> StreetGraph {
        let mut g = StreetGraph::new();
        for (id, x, y) in nodes {
            g.add_node(Node::new(*id, *x, *y)).unwrap();
        }
        for (id, u, v) in edges {
            let a = g.position(*u).unwrap();
            let b = g.position(*v).unwrap();
            g.add_edge(Edge::new(*id, *u, *v, LineString::new(vec![a, b])))
                .unwrap();
        }
        g
    }

    /// Two junction pairs 100 apart, joined by a square of streets, plus a dead end.
    fn two_junction_pairs() -> StreetGraph {
        grid_graph(
            &[
                (1, 0.0, 0.0),
                (2, 0.0, 8.0),
                (3, 100.0, 0.0),
                (4, 100.0, 8.0),
                (5, 3.0, -6.0),
            ],
            &[(1, 1, 2), (2, 1, 3), (3, 2, 4), (4, 3, 4), (5, 1, 5)],
        )
    }

    #[test]
    fn close_junctions_share_a_cluster() {
        let mut g = two_junction_pairs();
        let config = SimplifyConfig::default().with_radius(10.0);
        let clusters = identify_clusters(&mut g, &config);

        assert_eq!(clusters.len(), 2);
        let c1 = g.cluster_of(1).unwrap();
        assert_eq!(g.cluster_of(2), Some(c1));
        assert_eq!(c1, 6);
        let c2 = g.cluster_of(3).unwrap();
        assert_eq!(g.cluster_of(4), Some(c2));
        assert_ne!(c1, c2);

        // dead end sits inside the polygon but never joins
        assert_eq!(g.cluster_of(5), None);
        assert!(clusters.get(c1).unwrap().polygon.contains(&Point::new(3.0, -6.0)));

        let cluster = clusters.get(c1).unwrap();
        assert_eq!(cluster.degree, 2);
        assert!((cluster.centroid.x - 0.0).abs() < 1e-3);
        assert!((cluster.centroid.y - 4.0).abs() < 1e-3);

        let e = g.edge(2).unwrap();
        assert_eq!((e.clus_u, e.clus_v), (Some(c1), Some(c2)));
        assert_eq!(e.clus_u_reach, None);
    }

    #[test]
    fn lone_junction_is_not_a_cluster() {
        let mut g = grid_graph(
            &[(1, 0.0, 0.0), (2, 50.0, 0.0), (3, 25.0, 40.0)],
            &[(1, 1, 2), (2, 2, 3), (3, 3, 1)],
        );
        let clusters = identify_clusters(&mut g, &SimplifyConfig::default());
        assert!(clusters.is_empty());
        assert!(g.nodes.values().all(|n| n.cluster.is_none()));
    }

    #[test]
    fn degree_ordering() {
        let mut table = ClusterTable::default();
        for (id, degree) in [(10, 2), (11, 4), (12, 2)] {
            table.insert(Cluster {
                id,
                polygon: regular_disc(Coord { x: 0.0, y: 0.0 }, 1.0, 8),
                centroid: Coord { x: 0.0, y: 0.0 },
                degree,
                keep: false,
            });
        }
        assert_eq!(table.ids_by_degree_desc(), vec![11, 10, 12]);
        table.set_keep(12);
        assert_eq!(table.kept().map(|c| c.id).collect::<Vec<_>>(), vec![12]);
    }
}
