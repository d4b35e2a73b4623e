//! Great-circle distance between two coordinates.

/// Mean Earth radius used by [`distance`], in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters between `(lat1, lng1)` and `(lat2, lng2)`,
/// all in decimal degrees.
///
/// Pure and symmetric; the distance from a point to itself is `0.0`.
///
/// ```rust
/// use waymark_throttle::geo::distance;
///
/// let d = distance(-23.5, -46.6, -22.9, -43.2);
/// assert!((350_000.0..380_000.0).contains(&d));
/// ```
pub fn distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` a hair past 1 for antipodal points.
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}
