use crate::graph_types::{EdgeId, NodeId};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("{table} feature {index} is missing required column '{column}'")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
        index: usize,
    },
    #[error("edge {edge} references unknown node {node}")]
    UnknownNode { edge: EdgeId, node: NodeId },
    #[error("duplicate {table} id {id}")]
    DuplicateId { table: &'static str, id: i64 },
    #[error("invalid geometry for {table} {id}: {reason}")]
    InvalidGeometry {
        table: &'static str,
        id: i64,
        reason: String,
    },
    #[error("I/O error accessing path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

macro_rules! io_err {
    ($path:expr, $err:expr) => {
        $crate::error::GraphError::Io {
            path: $path.to_path_buf(),
            source: $err,
        }
    };
}

pub(crate) use io_err;
