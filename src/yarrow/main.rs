// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use streetweave::config::SimplifyConfig;
use streetweave::geojson_io::{load_graph, write_graph};
use streetweave::pipeline::SimplifyPipeline;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Node table (GeoJSON FeatureCollection of Points with a nodeID property)
    #[arg(long, env = "YARROW_NODES")]
    nodes: PathBuf,

    /// Edge table (GeoJSON FeatureCollection of LineStrings with edgeID, u, v)
    #[arg(long, env = "YARROW_EDGES")]
    edges: PathBuf,

    #[arg(long, env = "YARROW_OUT_NODES")]
    out_nodes: PathBuf,

    #[arg(long, env = "YARROW_OUT_EDGES")]
    out_edges: PathBuf,

    /// Junction clustering radius, in the units of the input coordinates.
    /// Overrides the value from --config.
    #[arg(long, env = "YARROW_RADIUS")]
    radius: Option<f64>,

    /// JSON file with simplification settings
    #[arg(long, env = "YARROW_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SimplifyConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SimplifyConfig::default(),
    };
    if let Some(radius) = args.radius {
        config = config.with_radius(radius);
    }

    let graph = load_graph(&args.nodes, &args.edges)?;
    info!(
        "Loaded {} nodes and {} edges",
        graph.nodes.len(),
        graph.edges.len()
    );

    let (graph, report) = SimplifyPipeline::new(config).run(graph)?;
    write_graph(&graph, &args.out_nodes, &args.out_edges)?;

    println!(
        "Simplified to {} nodes and {} edges ({} clusters, {} dual-line merges)",
        report.nodes,
        report.edges,
        report.clusters,
        report.total_merges()
    );
    Ok(())
}
