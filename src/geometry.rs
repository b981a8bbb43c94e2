//! Great-circle distance and nearest-point-on-polyline queries.
//!
//! Pure functions over [`GeoPoint`]. Nothing here panics on out-of-range or
//! antimeridian-crossing input; the results are simply less meaningful.

use crate::types::GeoPoint;

/// Mean Earth radius used for all distances (meters)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters.
///
/// Symmetric, and exactly zero for identical points.
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    // Clamp guards the sqrt against rounding just above 1.0
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Distance to the closest vertex of `geometry`.
///
/// Returns `f64::INFINITY` for an empty polyline.
pub fn nearest_vertex_distance(p: GeoPoint, geometry: &[GeoPoint]) -> f64 {
    geometry
        .iter()
        .map(|v| distance_meters(p, *v))
        .fold(f64::INFINITY, f64::min)
}

/// Distance from `p` to the closest point on `geometry`.
///
/// Projects onto every segment rather than only testing vertices, so sparse
/// routing output (long straight streets) does not inflate the distance.
/// Never larger than [`nearest_vertex_distance`]. A single-vertex polyline
/// degrades to the vertex distance; an empty one yields `f64::INFINITY`.
pub fn nearest_distance_to_polyline(p: GeoPoint, geometry: &[GeoPoint]) -> f64 {
    match geometry {
        [] => f64::INFINITY,
        [only] => distance_meters(p, *only),
        _ => geometry
            .windows(2)
            .map(|w| distance_meters(p, project_onto_segment(p, w[0], w[1])))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Sum of haversine lengths of consecutive pairs (meters)
pub fn polyline_length(geometry: &[GeoPoint]) -> f64 {
    geometry
        .windows(2)
        .map(|w| distance_meters(w[0], w[1]))
        .sum()
}

/// Closest point to `p` on segment `a`-`b`.
///
/// Planar approximation scaled by the cosine of the mean latitude; accurate
/// for segments of a few kilometers, which covers walking routes.
fn project_onto_segment(p: GeoPoint, a: GeoPoint, b: GeoPoint) -> GeoPoint {
    let cos_lat = ((a.latitude + b.latitude) / 2.0).to_radians().cos();

    let dx = (b.longitude - a.longitude) * cos_lat;
    let dy = b.latitude - a.latitude;
    let px = (p.longitude - a.longitude) * cos_lat;
    let py = p.latitude - a.latitude;

    let seg_len_sq = dx * dx + dy * dy;
    if seg_len_sq < 1e-20 {
        return a;
    }

    let t = ((px * dx + py * dy) / seg_len_sq).clamp(0.0, 1.0);

    GeoPoint::new(
        a.latitude + t * (b.latitude - a.latitude),
        a.longitude + t * (b.longitude - a.longitude),
    )
}
