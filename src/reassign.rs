use crate::clustering::ClusterTable;
use crate::config::CleanOptions;
use crate::error::GraphError;
use crate::graph_types::{Node, StreetGraph};
use crate::topology::{clean_network, correct_edges};
use log::info;

/// Move edge endpoints onto the centroids of kept clusters.
///
/// An endpoint whose node belongs to a kept cluster is renamed to the cluster
/// id and its coordinate snapped to the centroid. Edges collapsing onto a single
/// cluster are dropped, every kept cluster becomes a node, and the result goes
/// through `clean_network`.
pub fn reassign_edges(
    mut graph: StreetGraph,
    clusters: &ClusterTable,
    clean: &CleanOptions,
) -> Result<StreetGraph, GraphError> {
    let kept_cluster_of = |graph: &StreetGraph, node| {
        graph
            .cluster_of(node)
            .filter(|c| clusters.is_kept(*c))
            .and_then(|c| Some((c, clusters.centroid(c)?)))
    };

    let mut rewired = Vec::new();
    for edge in graph.edges.values() {
        let u = kept_cluster_of(&graph, edge.u);
        let v = kept_cluster_of(&graph, edge.v);
        if u.is_some() || v.is_some() {
            rewired.push((edge.id, u, v));
        }
    }

    let mut collapsed = Vec::new();
    for (id, u, v) in rewired {
        let Some(edge) = graph.edge_mut(id) else {
            continue;
        };
        let coords = &mut edge.geometry.0;
        if let Some((cluster, centroid)) = u {
            edge.u = cluster;
            if let Some(first) = coords.first_mut() {
                *first = centroid;
            }
        }
        if let Some((cluster, centroid)) = v {
            edge.v = cluster;
            if let Some(last) = coords.last_mut() {
                *last = centroid;
            }
        }
        if edge.u == edge.v {
            collapsed.push(id);
        }
    }
    graph.remove_edges(&collapsed);

    let mut promoted = 0;
    for cluster in clusters.kept() {
        let node = graph
            .nodes
            .entry(cluster.id)
            .or_insert_with(|| Node::new(cluster.id, cluster.centroid.x, cluster.centroid.y));
        node.position = cluster.centroid;
        node.cluster = None;
        promoted += 1;
    }
    for edge in graph.edges.values_mut() {
        edge.clear_cluster_fields();
    }

    info!(
        "Reassigned edges onto {} cluster centroids, {} edges collapsed",
        promoted,
        collapsed.len()
    );
    correct_edges(&mut graph)?;
    clean_network(graph, clean)
}
