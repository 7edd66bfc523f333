use super::*;
use crate::clustering::identify_clusters;
use crate::config::CleanOptions;
use crate::graph_types::Node;

fn close(a: Coord<f64>, x: f64, y: f64) -> bool {
    (a.x - x).abs() < 1e-3 && (a.y - y).abs() < 1e-3
}

fn street_graph(nodes: &[(i64, f64, f64)], edges: &[(i64, i64, i64)]) -> StreetGraph {
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

fn keep_dead_ends(radius: f64) -> SimplifyConfig {
    SimplifyConfig {
        reassign_clean: CleanOptions {
            dead_ends: false,
            ..CleanOptions::after_reassignment()
        },
        ..SimplifyConfig::default().with_radius(radius)
    }
}

/// Two carriageways of Main St between junction pairs at x=0 and x=100, with
/// loops hanging off each pair so nothing is a dead end.
fn main_street(second_name: &str) -> StreetGraph {
    let mut g = street_graph(
        &[
            (1, 0.0, 0.0),
            (2, 0.0, 8.0),
            (3, 100.0, 4.0),
            (4, 100.0, 12.0),
            (5, 150.0, 12.0),
            (6, 150.0, 60.0),
            (7, -50.0, 0.0),
            (8, -50.0, -40.0),
        ],
        &[
            (3, 1, 2),
            (4, 3, 4),
            (5, 4, 5),
            (6, 5, 6),
            (7, 6, 4),
            (8, 1, 7),
            (9, 7, 8),
            (10, 8, 1),
        ],
    );
    let a = LineString::new(vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 100.0, y: 4.0 }]);
    let b = LineString::new(vec![Coord { x: 0.0, y: 8.0 }, Coord { x: 100.0, y: 4.0 }]);
    g.add_edge(
        Edge::new(1, 1, 3, a)
            .with_name(second_name)
            .with_length(98.0)
            .with_pedestrian(true),
    )
    .unwrap();
    g.add_edge(Edge::new(2, 2, 3, b).with_name("Main St").with_length(102.0))
        .unwrap();
    g
}

#[test]
fn parallel_carriageways_merge_between_clusters() {
    let mut g = main_street("Main St");
    let config = SimplifyConfig::default().with_radius(10.0);
    let clusters = identify_clusters(&mut g, &config);
    assert_eq!(clusters.len(), 2);
    let west = g.cluster_of(1).unwrap();
    let east = g.cluster_of(3).unwrap();

    let out = simplify_dual_lines(g, clusters, &config).unwrap();

    assert_eq!(out.merges.len(), 1);
    let merge = &out.merges[0];
    assert_eq!(merge.survivor, 2);
    assert_eq!(merge.removed, vec![1]);
    assert!(!merge.interpolated);

    let g = &out.graph;
    assert!(g.edge(1).is_none());
    let survivor = g.edge(2).unwrap();
    assert_eq!((survivor.u, survivor.v), (west, east));
    assert!(close(survivor.geometry.0[0], 0.0, 4.0));
    assert!(close(*survivor.geometry.0.last().unwrap(), 100.0, 8.0));
    assert!(survivor.pedestrian);
    assert!(survivor.new_geo);
    assert!(!survivor.forced_cluster);

    // both junction pairs collapsed onto their centroids
    let mut expected = vec![5, 6, 7, 8, west, east];
    expected.sort();
    assert_eq!(g.nodes.keys().copied().collect::<Vec<_>>(), expected);
    assert_eq!(g.edges.len(), 7);
    assert!(out.clusters.is_kept(west));
    assert!(out.clusters.is_kept(east));
}

#[test]
fn differently_named_carriageways_stay_apart() {
    let mut g = main_street("Elm St");
    let config = SimplifyConfig::default().with_radius(10.0);
    let clusters = identify_clusters(&mut g, &config);

    let out = simplify_dual_lines(g, clusters, &config).unwrap();

    assert!(out.merges.is_empty());
    assert!(out.graph.edge(1).is_some());
    assert!(out.graph.edge(2).is_some());
    assert_eq!(out.clusters.kept().count(), 0);
    assert_eq!(out.graph.edges.len(), 10);
}

#[test]
fn merged_line_is_grafted_through_intermediate_node() {
    let mut g = street_graph(
        &[
            (1, 0.0, 0.0),
            (2, 0.0, 8.0),
            (3, 100.0, 0.0),
            (4, 100.0, 8.0),
            (5, 50.0, 8.0),
        ],
        &[(1, 1, 3), (2, 2, 5), (3, 5, 4), (4, 1, 2), (5, 3, 4)],
    );
    let config = keep_dead_ends(10.0);
    let clusters = identify_clusters(&mut g, &config);
    let west = g.cluster_of(1).unwrap();
    let east = g.cluster_of(3).unwrap();
    assert_eq!(g.cluster_of(5), None);
    assert_eq!(g.edge(2).unwrap().clus_v_reach, Some(east));

    let out = simplify_dual_lines(g, clusters, &config).unwrap();

    assert_eq!(out.merges.len(), 1);
    assert!(out.merges[0].interpolated);
    assert_eq!(out.merges[0].removed, vec![2, 3]);

    let g = &out.graph;
    for gone in [2, 3, 4, 5] {
        assert!(g.edge(gone).is_none(), "edge {gone} should be gone");
    }
    let head = g.edge(1).unwrap();
    assert_eq!((head.u, head.v), (west, 5));
    assert!(close(head.geometry.0[0], 0.0, 4.0));
    assert!(close(*head.geometry.0.last().unwrap(), 50.0, 4.0));

    let tail = g.edge(6).unwrap();
    assert_eq!((tail.u, tail.v), (5, east));
    assert!(close(tail.geometry.0[0], 50.0, 4.0));
    assert!(close(*tail.geometry.0.last().unwrap(), 100.0, 4.0));
    assert!(tail.new_geo);

    assert!(close(g.position(5).unwrap(), 50.0, 4.0));
    assert_eq!(g.edges.len(), 2);
}

/// The upper carriageway meets a small junction pair at x=50 before it
/// reaches the east pair, so its direct cluster is the middle one.
fn through_middle_pair() -> StreetGraph {
    street_graph(
        &[
            (1, 0.0, 0.0),
            (2, 0.0, 6.0),
            (3, 100.0, 0.0),
            (4, 100.0, 6.0),
            (5, 50.0, 6.0),
            (6, 50.0, 12.0),
            (7, 50.0, 60.0),
        ],
        &[
            (1, 1, 3),
            (2, 2, 5),
            (3, 5, 4),
            (4, 1, 2),
            (5, 5, 6),
            (6, 6, 7),
            (7, 3, 4),
        ],
    )
}

#[test]
fn carriageway_is_steered_through_a_middle_cluster() {
    let mut g = through_middle_pair();
    let config = keep_dead_ends(5.0);
    let clusters = identify_clusters(&mut g, &config);
    assert_eq!(clusters.len(), 3);
    let west = g.cluster_of(1).unwrap();
    let middle = g.cluster_of(5).unwrap();
    let east = g.cluster_of(3).unwrap();
    assert_eq!(g.cluster_of(6), Some(middle));
    assert_eq!(g.edge(2).unwrap().clus_v, Some(middle));

    let out = simplify_dual_lines(g, clusters, &config).unwrap();

    assert_eq!(out.merges.len(), 1);
    let merge = &out.merges[0];
    assert_eq!(merge.survivor, 1);
    assert!(merge.interpolated);
    assert!(merge.removed.contains(&2));
    assert!(merge.removed.contains(&3));

    let g = &out.graph;
    assert!(close(g.position(5).unwrap(), 50.0, 3.0));
    // the middle pair is passed through, not kept
    assert!(!out.clusters.is_kept(middle));
    assert!(close(out.clusters.centroid(middle).unwrap(), 50.0, 3.0));

    let mut pieces: Vec<(NodeId, NodeId)> = g
        .edges
        .values()
        .filter(|e| e.new_geo)
        .map(|e| (e.u.min(e.v), e.u.max(e.v)))
        .collect();
    pieces.sort();
    let mut expected = vec![(5, west), (5, east)];
    expected.sort();
    assert_eq!(pieces, expected);

    // the spur up to node 7 is untouched
    assert_eq!(g.edge(5).map(|e| (e.u, e.v)), Some((5, 6)));
    assert!(g.edge(6).is_some());
}

#[test]
fn fork_from_plain_node_merges_towards_cluster() {
    let mut g = street_graph(
        &[(1, 0.0, 0.0), (2, 0.0, 8.0), (10, -50.0, 4.0)],
        &[(1, 10, 1), (2, 10, 2), (3, 1, 2)],
    );
    let config = keep_dead_ends(10.0);
    let clusters = identify_clusters(&mut g, &config);
    assert_eq!(clusters.len(), 1);
    let junction = g.cluster_of(1).unwrap();

    let out = simplify_dual_lines_nodes_to_cluster(g, clusters, &config).unwrap();

    assert_eq!(out.merges.len(), 1);
    let merge = &out.merges[0];
    assert_eq!(merge.anchor, Anchor::Node(10));
    assert_eq!(merge.goal, junction);
    assert_eq!(merge.survivor, 1);
    assert_eq!(merge.removed, vec![2]);

    let g = &out.graph;
    assert_eq!(g.edges.len(), 1);
    let survivor = g.edge(1).unwrap();
    assert_eq!((survivor.u, survivor.v), (10, junction));
    assert!(close(survivor.geometry.0[0], -50.0, 4.0));
    assert!(close(*survivor.geometry.0.last().unwrap(), 0.0, 4.0));
    assert!(g.nodes.values().all(|n| n.cluster.is_none()));
}

fn horizontal(y: f64) -> LineString<f64> {
    LineString::new(vec![Coord { x: 0.0, y }, Coord { x: 100.0, y }])
}

#[test]
fn odd_bundle_keeps_its_central_line() {
    let lines: Vec<(usize, LineString<f64>)> = [0.0, 2.0, 4.0, 6.0, 40.0]
        .into_iter()
        .map(horizontal)
        .enumerate()
        .collect();
    let core = reduce_to_core(lines, 3);
    assert_eq!(core.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![1, 2, 3]);
    let central = central_line(&core).unwrap();
    assert_eq!(core[central].0, 2);
}

#[test]
fn even_bundle_keeps_two_innermost_lines() {
    let lines: Vec<(usize, LineString<f64>)> = [0.0, 2.0, 4.0, 30.0]
        .into_iter()
        .map(horizontal)
        .enumerate()
        .collect();
    let core = reduce_to_core(lines, 2);
    assert_eq!(core.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn staggered_pair_is_detected() {
    let a = LineString::new(vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 100.0, y: 0.0 }]);
    let parallel = horizontal(8.0);
    let fanned = LineString::new(vec![Coord { x: 0.0, y: 2.0 }, Coord { x: 100.0, y: 30.0 }]);
    assert!(!staggered(&a, &parallel, 1.5));
    assert!(staggered(&a, &fanned, 1.5));
}

#[test]
fn members_that_cannot_reach_the_goal_are_dropped() {
    let mut g = main_street("Main St");
    let config = SimplifyConfig::default().with_radius(10.0);
    let clusters = identify_clusters(&mut g, &config);
    let east = g.cluster_of(3).unwrap();
    let ctx = PassContext::new(&g, &clusters, &config);

    // edge 8 is parallel but turns a right angle at node 7
    let mut members = vec![
        Member::oriented(g.edge(2).unwrap(), Endpoint::U),
        Member::oriented(g.edge(8).unwrap(), Endpoint::U),
    ];
    assert_eq!(members[1].goal(), None);
    conform_to_goal(&ctx, &mut members, east);
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].edge, 2);
}

#[test]
fn members_are_steered_past_other_clusters() {
    let mut g = through_middle_pair();
    let config = keep_dead_ends(5.0);
    let clusters = identify_clusters(&mut g, &config);
    let middle = g.cluster_of(5).unwrap();
    let east = g.cluster_of(3).unwrap();
    let ctx = PassContext::new(&g, &clusters, &config);

    let mut members = vec![
        Member::oriented(g.edge(1).unwrap(), Endpoint::U),
        Member::oriented(g.edge(2).unwrap(), Endpoint::U),
    ];
    assert_eq!(members[1].goal(), Some(middle));
    conform_to_goal(&ctx, &mut members, east);
    assert_eq!(members.len(), 2);
    let steered = &members[1];
    assert!(steered.forced);
    assert_eq!(steered.clus_v, None);
    assert_eq!(steered.goal(), Some(east));
}

#[test]
fn much_longer_carriageway_is_not_merged() {
    let mut g = main_street("Main St");
    g.edge_mut(1).unwrap().geometry = LineString::from(vec![
        (0.0, 0.0),
        (50.0, -70.0),
        (100.0, 4.0),
    ]);
    let config = SimplifyConfig::default().with_radius(10.0);
    let clusters = identify_clusters(&mut g, &config);

    let out = simplify_dual_lines(g, clusters, &config).unwrap();

    assert!(out.merges.is_empty());
    assert!(out.graph.edge(1).is_some());
    assert!(out.graph.edge(2).is_some());
}

#[test]
fn three_carriageways_keep_the_central_one() {
    let mut g = street_graph(
        &[
            (1, 0.0, 0.0),
            (2, 0.0, 6.0),
            (3, 0.0, 12.0),
            (4, 100.0, 0.0),
            (5, 100.0, 6.0),
            (6, 100.0, 12.0),
        ],
        &[
            (1, 1, 4),
            (2, 2, 5),
            (3, 3, 6),
            (4, 1, 2),
            (5, 2, 3),
            (6, 4, 5),
            (7, 5, 6),
        ],
    );
    let config = keep_dead_ends(10.0);
    let clusters = identify_clusters(&mut g, &config);
    assert_eq!(clusters.len(), 2);
    let west = g.cluster_of(1).unwrap();
    let east = g.cluster_of(4).unwrap();

    let out = simplify_dual_lines(g, clusters, &config).unwrap();

    assert_eq!(out.merges.len(), 1);
    let merge = &out.merges[0];
    assert_eq!(merge.survivor, 1);
    assert_eq!(merge.removed, vec![2, 3]);
    assert!(!merge.interpolated);

    let g = &out.graph;
    assert_eq!(g.edges.len(), 1);
    let survivor = g.edge(1).unwrap();
    assert_eq!((survivor.u, survivor.v), (west, east));
    assert!(survivor.geometry.0.iter().all(|c| (c.y - 6.0).abs() < 1e-3));
    assert!(close(*survivor.geometry.0.last().unwrap(), 100.0, 6.0));
}

#[test]
fn node_pass_grafts_through_plain_node() {
    let mut g = street_graph(
        &[(1, 0.0, 0.0), (2, 0.0, 8.0), (3, -30.0, 7.0), (4, -60.0, 4.0)],
        &[(1, 4, 1), (2, 4, 3), (3, 3, 2), (4, 1, 2)],
    );
    let config = keep_dead_ends(10.0);
    let clusters = identify_clusters(&mut g, &config);
    assert_eq!(clusters.len(), 1);
    let junction = g.cluster_of(1).unwrap();
    assert_eq!(g.cluster_of(3), None);
    assert_eq!(g.edge(2).unwrap().clus_v_reach, Some(junction));

    let out = simplify_dual_lines_nodes_to_cluster(g, clusters, &config).unwrap();

    assert_eq!(out.merges.len(), 1);
    let merge = &out.merges[0];
    assert_eq!(merge.anchor, Anchor::Node(4));
    assert_eq!(merge.survivor, 1);
    assert_eq!(merge.removed, vec![2, 3]);
    assert!(merge.interpolated);

    let g = &out.graph;
    assert_eq!(g.edges.len(), 2);
    let head = g.edge(1).unwrap();
    assert_eq!((head.u, head.v), (4, 3));
    let tail = g.edge(5).unwrap();
    assert_eq!((tail.u, tail.v), (3, junction));
    assert!(close(*tail.geometry.0.last().unwrap(), 0.0, 4.0));

    let moved = g.position(3).unwrap();
    assert!((moved.x + 30.0).abs() < 0.5);
    assert!((moved.y - 4.5).abs() < 0.1);
}

#[test]
fn longest_edge_leads_a_node_bundle() {
    let mut g = street_graph(
        &[(1, 0.0, 0.0), (2, 0.0, 8.0), (10, -50.0, 2.0)],
        &[(1, 10, 1), (2, 10, 2), (3, 1, 2)],
    );
    let config = keep_dead_ends(10.0);
    let clusters = identify_clusters(&mut g, &config);
    let junction = g.cluster_of(1).unwrap();
    assert!(g.edge(2).unwrap().length > g.edge(1).unwrap().length);

    let out = simplify_dual_lines_nodes_to_cluster(g, clusters, &config).unwrap();

    assert_eq!(out.merges.len(), 1);
    assert_eq!(out.merges[0].survivor, 2);
    assert_eq!(out.merges[0].removed, vec![1]);
    let survivor = out.graph.edge(2).unwrap();
    assert_eq!((survivor.u, survivor.v), (10, junction));
    assert!(out.graph.edge(1).is_none());
}
