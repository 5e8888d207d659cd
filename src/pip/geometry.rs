//! Planar ray casting and boundary proximity over (lat, lng) pairs.
//!
//! Longitude is the ray axis (x) and latitude the perpendicular axis (y).
//! Nothing here is geodesic; coordinates are treated as a flat plane.
//!
//! Exact-boundary tie-break: the crossing test uses a strict `>` on latitude
//! and a strict `<` on the intersection longitude, which makes the ring
//! half-open. For an axis-aligned square, points lying on its minimum-latitude
//! or minimum-longitude edges are inside, points on its maximum edges are
//! outside. Callers that need a symmetric answer should combine
//! [`is_inside`] with [`is_near_boundary`].

use crate::models::{LatLng, MIN_POLYGON_POINTS};

/// Default boundary tolerance in degrees (roughly 11 m of latitude).
pub const DEFAULT_BOUNDARY_TOLERANCE: f64 = 0.0001;

/// Ray-casting point-in-polygon test.
///
/// Rings with fewer than three points are never inside anything.
pub fn is_inside(point: LatLng, ring: &[LatLng]) -> bool {
    if ring.len() < MIN_POLYGON_POINTS {
        return false;
    }

    let (x, y) = (point.lng, point.lat);
    let mut inside = false;
    let mut j = ring.len() - 1;

    for i in 0..ring.len() {
        let (xi, yi) = (ring[i].lng, ring[i].lat);
        let (xj, yj) = (ring[j].lng, ring[j].lat);

        if (yi > y) != (yj > y) {
            let x_cross = (xj - xi) * (y - yi) / (yj - yi) + xi;
            if x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }

    inside
}

/// Distance from `point` to the segment `a`-`b` in the (lat, lng) plane.
pub fn distance_to_segment(point: LatLng, a: LatLng, b: LatLng) -> f64 {
    let (dx, dy) = (b.lat - a.lat, b.lng - a.lng);
    let len_sq = dx * dx + dy * dy;

    // Zero-length edge: distance to the vertex
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((point.lat - a.lat) * dx + (point.lng - a.lng) * dy) / len_sq).clamp(0.0, 1.0)
    };

    let (px, py) = (a.lat + t * dx, a.lng + t * dy);
    ((point.lat - px).powi(2) + (point.lng - py).powi(2)).sqrt()
}

/// True when `point` lies within `tolerance` degrees of any edge,
/// including the closing edge from the last vertex back to the first.
pub fn is_near_boundary(point: LatLng, ring: &[LatLng], tolerance: f64) -> bool {
    if ring.len() < 2 {
        return false;
    }

    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        if distance_to_segment(point, ring[j], ring[i]) <= tolerance {
            return true;
        }
        j = i;
    }
    false
}

/// Inside, or close enough to the edge to be given the benefit of the doubt.
pub fn contains_with_tolerance(point: LatLng, ring: &[LatLng], tolerance: f64) -> bool {
    is_inside(point, ring) || is_near_boundary(point, ring, tolerance)
}
