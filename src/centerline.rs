use crate::geometry_utils::{
    distance, interpolate, line_centroid, midpoint_of, reversed, vertex_fractions,
};
use geo_types::{Coord, LineString};
use itertools::Itertools;

/// True when `b` runs against `a`, judged by which pairing of endpoints is closer.
fn runs_opposite(a: &LineString<f64>, b: &LineString<f64>) -> bool {
    match (a.0.first(), a.0.last(), b.0.first(), b.0.last()) {
        (Some(a0), Some(a1), Some(b0), Some(b1)) => {
            distance(*a0, *b0) + distance(*a1, *b1) > distance(*a0, *b1) + distance(*a1, *b0)
        }
        _ => false,
    }
}

/// Midpoints of the two lines sampled at the union of their vertex positions.
/// The result follows the direction of `a`.
pub fn center_line_coords(a: &LineString<f64>, b: &LineString<f64>) -> Vec<Coord<f64>> {
    let b = if runs_opposite(a, b) {
        reversed(b)
    } else {
        b.clone()
    };

    vertex_fractions(a)
        .into_iter()
        .chain(vertex_fractions(&b))
        .sorted_by(|x, y| x.total_cmp(y))
        .dedup_by(|x, y| (x - y).abs() < 1e-9)
        .filter_map(|f| Some(midpoint_of(interpolate(a, f)?, interpolate(&b, f)?)))
        .collect()
}

/// Centerline of two lines, pinned to `from` at its start and `to` at its end.
/// `None` when the two lines are too far apart to describe one street.
pub fn center_line_between(
    a: &LineString<f64>,
    b: &LineString<f64>,
    from: Coord<f64>,
    to: Coord<f64>,
    max_centroid_separation: f64,
) -> Option<LineString<f64>> {
    let separation = distance(line_centroid(a)?, line_centroid(b)?);
    if separation > max_centroid_separation {
        return None;
    }

    let mut coords = center_line_coords(a, b);
    if coords.len() < 2 {
        return None;
    }
    if distance(coords[0], from) > distance(coords[coords.len() - 1], from) {
        coords.reverse();
    }
    let last = coords.len() - 1;
    coords[0] = from;
    coords[last] = to;
    Some(LineString::new(coords))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(coords: &[(f64, f64)]) -> LineString<f64> {
        LineString::from(coords.to_vec())
    }

    #[test]
    fn centerline_of_opposed_lines() {
        let a = line(&[(0.0, 0.0), (100.0, 0.0)]);
        let b = line(&[(100.0, 10.0), (50.0, 10.0), (0.0, 10.0)]);
        let coords = center_line_coords(&a, &b);
        assert_eq!(coords.len(), 3);
        for c in &coords {
            assert!((c.y - 5.0).abs() < 1e-9);
        }
        assert!((coords[1].x - 50.0).abs() < 1e-9);
    }

    #[test]
    fn anchored_centerline_pins_ends() {
        let a = line(&[(0.0, 0.0), (100.0, 4.0)]);
        let b = line(&[(0.0, 8.0), (100.0, 12.0)]);
        let cl = center_line_between(
            &a,
            &b,
            Coord { x: 100.0, y: 8.0 },
            Coord { x: 0.0, y: 4.0 },
            100.0,
        )
        .unwrap();
        assert_eq!(cl.0.first().copied(), Some(Coord { x: 100.0, y: 8.0 }));
        assert_eq!(cl.0.last().copied(), Some(Coord { x: 0.0, y: 4.0 }));
    }

    #[test]
    fn distant_lines_have_no_centerline() {
        let a = line(&[(0.0, 0.0), (100.0, 0.0)]);
        let b = line(&[(0.0, 150.0), (100.0, 150.0)]);
        assert!(
            center_line_between(
                &a,
                &b,
                Coord { x: 0.0, y: 75.0 },
                Coord { x: 100.0, y: 75.0 },
                100.0
            )
            .is_none()
        );
    }
}
