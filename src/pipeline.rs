use crate::clustering::identify_clusters;
use crate::config::SimplifyConfig;
use crate::dual_lines::{Merge, simplify_dual_lines, simplify_dual_lines_nodes_to_cluster};
use crate::error::GraphError;
use crate::graph_types::StreetGraph;
use crate::topology::{clean_network, snap_misaligned_ends};
use log::info;

/// A junction-shape simplifier run before and after the dual-line passes
/// (triangular junctions, complex junctions, roundabouts).
pub trait JunctionSimplifier {
    fn name(&self) -> &str;
    fn simplify(&self, graph: StreetGraph) -> Result<StreetGraph, GraphError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimplifyReport {
    pub clusters: usize,
    pub cluster_pass_merges: Vec<Merge>,
    pub node_pass_merges: Vec<Merge>,
    pub nodes: usize,
    pub edges: usize,
}

impl SimplifyReport {
    pub fn total_merges(&self) -> usize {
        self.cluster_pass_merges.len() + self.node_pass_merges.len()
    }
}

/// Full simplification round over one graph snapshot.
pub struct SimplifyPipeline {
    config: SimplifyConfig,
    junction_simplifiers: Vec<Box<dyn JunctionSimplifier>>,
    roundabout_dissolver: Option<Box<dyn JunctionSimplifier>>,
}

impl SimplifyPipeline {
    pub fn new(config: SimplifyConfig) -> Self {
        Self {
            config,
            junction_simplifiers: Vec::new(),
            roundabout_dissolver: None,
        }
    }

    pub fn with_junction_simplifier(mut self, simplifier: Box<dyn JunctionSimplifier>) -> Self {
        self.junction_simplifiers.push(simplifier);
        self
    }

    pub fn with_roundabout_dissolver(mut self, dissolver: Box<dyn JunctionSimplifier>) -> Self {
        self.roundabout_dissolver = Some(dissolver);
        self
    }

    pub fn config(&self) -> &SimplifyConfig {
        &self.config
    }

    fn run_junction_simplifiers(&self, mut graph: StreetGraph) -> Result<StreetGraph, GraphError> {
        for simplifier in &self.junction_simplifiers {
            let before = graph.edges.len();
            graph = simplifier.simplify(graph)?;
            info!(
                "{}: {} -> {} edges",
                simplifier.name(),
                before,
                graph.edges.len()
            );
        }
        Ok(graph)
    }

    pub fn run(&self, graph: StreetGraph) -> Result<(StreetGraph, SimplifyReport), GraphError> {
        graph.validate()?;
        let mut graph = clean_network(graph, &self.config.initial_clean)?;
        snap_misaligned_ends(&mut graph)?;
        let mut graph = self.run_junction_simplifiers(graph)?;
        if let Some(dissolver) = &self.roundabout_dissolver {
            graph = dissolver.simplify(graph)?;
            info!("{}: {} edges", dissolver.name(), graph.edges.len());
        }

        let clusters = identify_clusters(&mut graph, &self.config);
        let cluster_count = clusters.len();

        let cluster_pass = simplify_dual_lines(graph, clusters, &self.config)?;
        let node_pass = simplify_dual_lines_nodes_to_cluster(
            cluster_pass.graph,
            cluster_pass.clusters,
            &self.config,
        )?;
        let graph = self.run_junction_simplifiers(node_pass.graph)?;

        let report = SimplifyReport {
            clusters: cluster_count,
            cluster_pass_merges: cluster_pass.merges,
            node_pass_merges: node_pass.merges,
            nodes: graph.nodes.len(),
            edges: graph.edges.len(),
        };
        info!(
            "Simplification done: {} clusters, {} + {} merges, {} nodes, {} edges",
            report.clusters,
            report.cluster_pass_merges.len(),
            report.node_pass_merges.len(),
            report.nodes,
            report.edges
        );
        Ok((graph, report))
    }
}

/// Run one round with no external junction simplifiers.
pub fn simplify_pipeline(
    graph: StreetGraph,
    config: &SimplifyConfig,
) -> Result<(StreetGraph, SimplifyReport), GraphError> {
    SimplifyPipeline::new(config.clone()).run(graph)
}
