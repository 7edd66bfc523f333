use geo::Centroid;
use geo_types::{Coord, LineString, Polygon};

/// Coordinates closer than this are treated as the same point.
pub const COORD_EPSILON: f64 = 1e-9;

// --- Points ---

pub fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}

pub fn same_coord(a: Coord<f64>, b: Coord<f64>) -> bool {
    distance(a, b) <= COORD_EPSILON
}

fn lerp(a: Coord<f64>, b: Coord<f64>, t: f64) -> Coord<f64> {
    Coord {
        x: a.x + (b.x - a.x) * t,
        y: a.y + (b.y - a.y) * t,
    }
}

pub fn midpoint_of(a: Coord<f64>, b: Coord<f64>) -> Coord<f64> {
    lerp(a, b, 0.5)
}

// --- Polylines ---

pub fn polyline_length(line: &LineString<f64>) -> f64 {
    line.0.windows(2).map(|w| distance(w[0], w[1])).sum()
}

pub fn reversed(line: &LineString<f64>) -> LineString<f64> {
    LineString::new(line.0.iter().rev().copied().collect())
}

pub fn first_coord(line: &LineString<f64>) -> Option<Coord<f64>> {
    line.0.first().copied()
}

pub fn last_coord(line: &LineString<f64>) -> Option<Coord<f64>> {
    line.0.last().copied()
}

/// Point at `fraction` (0..=1) of the polyline's length.
pub fn interpolate(line: &LineString<f64>, fraction: f64) -> Option<Coord<f64>> {
    let coords = &line.0;
    let first = *coords.first()?;
    let total = polyline_length(line);
    if total <= COORD_EPSILON {
        return Some(first);
    }
    let target = fraction.clamp(0.0, 1.0) * total;
    let mut walked = 0.0;
    for w in coords.windows(2) {
        let seg = distance(w[0], w[1]);
        if walked + seg >= target {
            if seg <= COORD_EPSILON {
                return Some(w[1]);
            }
            return Some(lerp(w[0], w[1], (target - walked) / seg));
        }
        walked += seg;
    }
    coords.last().copied()
}

pub fn midpoint(line: &LineString<f64>) -> Option<Coord<f64>> {
    interpolate(line, 0.5)
}

/// Centroid of the line as a 1-d shape, falling back to its first vertex when degenerate.
pub fn line_centroid(line: &LineString<f64>) -> Option<Coord<f64>> {
    line.centroid()
        .map(|p| p.0)
        .or_else(|| first_coord(line))
}

/// Normalised position of every vertex along the line.
pub fn vertex_fractions(line: &LineString<f64>) -> Vec<f64> {
    let total = polyline_length(line);
    if total <= COORD_EPSILON {
        return vec![0.0, 1.0];
    }
    let mut walked = 0.0;
    let mut out = Vec::with_capacity(line.0.len());
    out.push(0.0);
    for w in line.0.windows(2) {
        walked += distance(w[0], w[1]);
        out.push((walked / total).min(1.0));
    }
    out
}

/// Project a point onto the polyline.
/// Returns (distance_along_polyline, distance_from_polyline, projected_point).
pub fn project(line: &LineString<f64>, point: Coord<f64>) -> Option<(f64, f64, Coord<f64>)> {
    let coords = &line.0;
    if coords.len() == 1 {
        return Some((0.0, distance(point, coords[0]), coords[0]));
    }

    let mut best: Option<(f64, f64, Coord<f64>)> = None;
    let mut walked = 0.0;
    for w in coords.windows(2) {
        let (a, b) = (w[0], w[1]);
        let seg = distance(a, b);
        let t = if seg <= COORD_EPSILON {
            0.0
        } else {
            (((point.x - a.x) * (b.x - a.x) + (point.y - a.y) * (b.y - a.y)) / (seg * seg))
                .clamp(0.0, 1.0)
        };
        let proj = lerp(a, b, t);
        let off = distance(point, proj);
        if best.is_none_or(|(_, d, _)| off < d) {
            best = Some((walked + t * seg, off, proj));
        }
        walked += seg;
    }
    best
}

/// Cut the line at `along` units from its start. Both halves contain the cut point.
pub fn split_at_distance(
    line: &LineString<f64>,
    along: f64,
) -> Option<(LineString<f64>, LineString<f64>)> {
    let coords = &line.0;
    let first = *coords.first()?;
    let mut head = vec![first];
    let mut walked = 0.0;
    for (i, w) in coords.windows(2).enumerate() {
        let seg = distance(w[0], w[1]);
        if walked + seg >= along && seg > COORD_EPSILON {
            let cut = lerp(w[0], w[1], ((along - walked) / seg).clamp(0.0, 1.0));
            push_unique(&mut head, cut);
            let mut tail = vec![cut];
            for c in &coords[i + 1..] {
                push_unique(&mut tail, *c);
            }
            if tail.len() < 2 {
                tail.push(cut);
            }
            if head.len() < 2 {
                head.push(cut);
            }
            return Some((LineString::new(head), LineString::new(tail)));
        }
        push_unique(&mut head, w[1]);
        walked += seg;
    }
    let last = *coords.last()?;
    if head.len() < 2 {
        head.push(last);
    }
    Some((LineString::new(head), LineString::new(vec![last, last])))
}

fn push_unique(coords: &mut Vec<Coord<f64>>, c: Coord<f64>) {
    if coords.last().is_none_or(|last| !same_coord(*last, c)) {
        coords.push(c);
    }
}

/// Append `next` to `path`, dropping the joint vertex when both sides share it.
pub fn append_path(path: &mut Vec<Coord<f64>>, next: &[Coord<f64>]) {
    for c in next {
        push_unique(path, *c);
    }
}

// --- Angles ---

/// Bearing from a to b in degrees, counter-clockwise from +x, in (-180, 180].
pub fn bearing(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (b.y - a.y).atan2(b.x - a.x).to_degrees()
}

/// Smallest angle between two bearings, 0..=180.
pub fn bearing_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(360.0);
    if diff > 180.0 { 360.0 - diff } else { diff }
}

/// Difference between two overall line directions, ignoring which way each runs. 0..=90.
pub fn axis_difference(a: &LineString<f64>, b: &LineString<f64>) -> Option<f64> {
    let da = bearing(first_coord(a)?, last_coord(a)?);
    let db = bearing(first_coord(b)?, last_coord(b)?);
    let diff = bearing_difference(da, db);
    Some(if diff > 90.0 { 180.0 - diff } else { diff })
}

// --- Areas ---

/// Regular n-gon approximating a disc.
pub fn regular_disc(center: Coord<f64>, radius: f64, segments: usize) -> Polygon<f64> {
    let n = segments.max(8);
    let mut ring: Vec<Coord<f64>> = (0..n)
        .map(|i| {
            let theta = std::f64::consts::TAU * i as f64 / n as f64;
            Coord {
                x: center.x + radius * theta.cos(),
                y: center.y + radius * theta.sin(),
            }
        })
        .collect();
    ring.push(ring[0]);
    Polygon::new(LineString::new(ring), vec![])
}
