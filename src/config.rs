use crate::error::{GraphError, io_err};
use serde::Deserialize;
use std::path::Path;

/// Switches for a `clean_network` run.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct CleanOptions {
    pub dead_ends: bool,
    pub remove_disconnected_islands: bool,
    pub same_uv_edges: bool,
    pub self_loops: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            dead_ends: true,
            remove_disconnected_islands: true,
            same_uv_edges: true,
            self_loops: true,
        }
    }
}

impl CleanOptions {
    /// What the reassignment step runs after every dual-line pass.
    pub fn after_reassignment() -> Self {
        Self {
            remove_disconnected_islands: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimplifyConfig {
    /// Buffer radius around each junction when looking for clusters.
    pub radius: f64,
    /// Vertices used to approximate each buffered disc.
    pub buffer_segments: usize,
    pub parallel_max_angle_deg: f64,
    pub continuation_max_deflection_deg: f64,
    // Applied instead of the above when both edges carry the same name
    pub named_continuation_max_deflection_deg: f64,
    pub max_length_ratio: f64,
    pub max_offset_ratio: f64,
    /// Two lines whose centroids are further apart than this are not the same street.
    pub max_centroid_separation: f64,
    pub initial_clean: CleanOptions,
    pub reassign_clean: CleanOptions,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        Self {
            radius: 12.0,
            buffer_segments: 64,
            parallel_max_angle_deg: 30.0,
            continuation_max_deflection_deg: 30.0,
            named_continuation_max_deflection_deg: 60.0,
            max_length_ratio: 1.5,
            max_offset_ratio: 1.5,
            max_centroid_separation: 100.0,
            initial_clean: CleanOptions::default(),
            reassign_clean: CleanOptions::after_reassignment(),
        }
    }
}

impl SimplifyConfig {
    pub fn from_json_str(text: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, GraphError> {
        let text = std::fs::read_to_string(path).map_err(|e| io_err!(path, e))?;
        Self::from_json_str(&text)
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let text = r#"{"radius": 10.0, "reassign_clean": {"dead_ends": false}}"#;
        let config = SimplifyConfig::from_json_str(text).unwrap();
        assert_eq!(config.radius, 10.0);
        assert_eq!(config.max_length_ratio, 1.5);
        assert!(!config.reassign_clean.dead_ends);
        // fields absent from the nested object fall back to CleanOptions::default
        assert!(config.reassign_clean.self_loops);
        assert!(config.initial_clean.remove_disconnected_islands);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            SimplifyConfig::from_json_str("{radius: 3"),
            Err(GraphError::Config(_))
        ));
    }
}
