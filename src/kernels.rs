//! Scalar scoring kernels over contiguous `f32` slices.
//!
//! All accumulation is in `f32`. These are the reference implementations
//! every index scores with; vectorized variants must stay bit-compatible
//! with them.

/// Mean Earth radius used by [`haversine`], in kilometres.
pub const EARTH_RADIUS_KM: f32 = 6371.0;

/// Dot product of two vectors.
#[inline]
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Squared L2 (Euclidean) distance between two vectors.
#[inline]
#[must_use]
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// L2 norm of a vector.
#[inline]
#[must_use]
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Normalize a vector to unit L2 norm, in place.
///
/// A zero-norm vector is left untouched: it has no direction to normalize
/// onto, and under the dot-product metric it scores 0 against everything.
#[inline]
pub fn normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm == 0.0 {
        return;
    }
    for x in v {
        *x /= norm;
    }
}

/// Great-circle distance in kilometres between two `[lat°, lon°]` points.
///
/// The haversine argument is clamped to `[0, 1]` so floating-point
/// excursions near antipodal points cannot push `asin` out of domain.
#[inline]
#[must_use]
pub fn haversine(a: &[f32], b: &[f32]) -> f32 {
    let lat1 = a[0].to_radians();
    let lon1 = a[1].to_radians();
    let lat2 = b[0].to_radians();
    let lon2 = b[1].to_radians();

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat * 0.5).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon * 0.5).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.clamp(0.0, 1.0).sqrt().asin()
}
