use crate::config::SimplifyConfig;
use crate::geometry_utils::{axis_difference, bearing, bearing_difference, same_coord};
use crate::graph_types::{Edge, NodeId};
use geo_types::Coord;

/// Angle tests shared by the reachability walk and the dual-line passes.
#[derive(Debug, Clone, Copy)]
pub struct Predicates {
    pub parallel_max_angle_deg: f64,
    pub continuation_max_deflection_deg: f64,
    pub named_continuation_max_deflection_deg: f64,
}

impl From<&SimplifyConfig> for Predicates {
    fn from(config: &SimplifyConfig) -> Self {
        Self {
            parallel_max_angle_deg: config.parallel_max_angle_deg,
            continuation_max_deflection_deg: config.continuation_max_deflection_deg,
            named_continuation_max_deflection_deg: config.named_continuation_max_deflection_deg,
        }
    }
}

/// First segment of the edge pointing away from `node`.
fn leaving_segment(edge: &Edge, node: NodeId) -> Option<(Coord<f64>, Coord<f64>)> {
    let coords = &edge.geometry.0;
    if coords.len() < 2 {
        return None;
    }
    if edge.u == node {
        // skip zero-length leading segments
        let start = coords[0];
        let next = coords[1..].iter().find(|c| !same_coord(start, **c))?;
        Some((start, *next))
    } else if edge.v == node {
        let start = coords[coords.len() - 1];
        let next = coords[..coords.len() - 1]
            .iter()
            .rev()
            .find(|c| !same_coord(start, **c))?;
        Some((start, *next))
    } else {
        None
    }
}

pub fn shared_node(a: &Edge, b: &Edge) -> Option<NodeId> {
    [a.u, a.v].into_iter().find(|n| b.touches(*n))
}

pub fn same_name(a: &Edge, b: &Edge) -> bool {
    matches!((&a.name, &b.name), (Some(x), Some(y)) if x == y)
}

/// Names only block a merge when both are present and differ.
pub fn names_compatible(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    }
}

impl Predicates {
    /// Deflection in degrees when travelling along `a` into `node` and leaving on `b`.
    /// 0 is straight on, 180 a U-turn.
    pub fn deflection_at(&self, a: &Edge, b: &Edge, node: NodeId) -> Option<f64> {
        let (a_node, a_next) = leaving_segment(a, node)?;
        let (b_node, b_next) = leaving_segment(b, node)?;
        let arriving = bearing(a_next, a_node);
        let leaving = bearing(b_node, b_next);
        Some(bearing_difference(arriving, leaving))
    }

    pub fn continues_at(&self, a: &Edge, b: &Edge, node: NodeId) -> bool {
        let threshold = if same_name(a, b) {
            self.named_continuation_max_deflection_deg
        } else {
            self.continuation_max_deflection_deg
        };
        self.deflection_at(a, b, node)
            .is_some_and(|deflection| deflection <= threshold)
    }

    /// `b` carries on from `a` through a node they share.
    pub fn is_continuation(&self, a: &Edge, b: &Edge) -> bool {
        if a.id == b.id {
            return false;
        }
        [a.u, a.v]
            .into_iter()
            .filter(|n| b.touches(*n))
            .any(|n| self.continues_at(a, b, n))
    }

    pub fn is_parallel(&self, a: &Edge, b: &Edge) -> bool {
        axis_difference(&a.geometry, &b.geometry)
            .is_some_and(|diff| diff <= self.parallel_max_angle_deg)
    }
}
