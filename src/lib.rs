// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::repeat_once,
    clippy::deref_addrof,
    clippy::suspicious_map,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::cmp_null,
    clippy::op_ref
)]

//! Street network simplification: junction clustering and dual carriageway
//! dissolution over a planar node/edge graph.

pub mod centerline;
pub mod clustering;
pub mod config;
pub mod dual_lines;
pub mod error;
pub mod geojson_io;
pub mod geometry_utils;
pub mod graph_types;
pub mod pipeline;
pub mod predicates;
pub mod reachability;
pub mod reassign;
pub mod topology;


pub use clustering::{Cluster, ClusterTable, identify_clusters};
pub use config::{CleanOptions, SimplifyConfig};
pub use error::GraphError;
pub use graph_types::{ClusterId, Edge, EdgeId, Endpoint, Node, NodeId, StreetGraph};
pub use pipeline::{JunctionSimplifier, SimplifyPipeline, SimplifyReport, simplify_pipeline};
