//! Per-vector symmetric 8-bit quantization.
//!
//! Each stored vector gets its own scale `max(|x|) / 127`; elements are
//! rounded to `[-127, 127]` and kept as `i8`. Queries stay in `f32` and
//! scoring dequantizes on the fly (asymmetric computation): nothing is
//! lost on the query side.
//!
//! Under Cosine with normalization the vector is normalized *before*
//! quantizing, so the dequantized norm is only approximately 1. That is
//! expected quantization error, not a defect.

/// Quantization scale for one vector: `max(|x|) / 127`, or 1.0 for an
/// all-zero vector (whose codes are all zero under any scale).
#[inline]
#[must_use]
pub fn compute_scale(v: &[f32]) -> f32 {
    let max_abs = v.iter().fold(0.0f32, |acc, x| acc.max(x.abs()));
    if max_abs == 0.0 {
        1.0
    } else {
        max_abs / 127.0
    }
}

/// Quantizes one vector, appending its codes and scale to shared arenas.
pub fn quantize_into(v: &[f32], codes: &mut Vec<i8>, scales: &mut Vec<f32>) {
    let scale = compute_scale(v);
    codes.extend(v.iter().map(|&x| (x / scale).round().clamp(-127.0, 127.0) as i8));
    scales.push(scale);
}

/// Dot product of an `f32` query against a dequantized stored row.
#[inline]
#[must_use]
pub fn dot_i8(query: &[f32], codes: &[i8], scale: f32) -> f32 {
    query
        .iter()
        .zip(codes.iter())
        .map(|(&q, &c)| q * (scale * f32::from(c)))
        .sum()
}

/// Negated squared L2 distance of an `f32` query against a dequantized
/// stored row.
#[inline]
#[must_use]
pub fn neg_l2_squared_i8(query: &[f32], codes: &[i8], scale: f32) -> f32 {
    let sum: f32 = query
        .iter()
        .zip(codes.iter())
        .map(|(&q, &c)| {
            let diff = scale * f32::from(c) - q;
            diff * diff
        })
        .sum();
    -sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_vector_gets_unit_scale() {
        assert_eq!(compute_scale(&[0.0, 0.0, 0.0]), 1.0);
        let mut codes = Vec::new();
        let mut scales = Vec::new();
        quantize_into(&[0.0, 0.0, 0.0], &mut codes, &mut scales);
        assert_eq!(codes, vec![0, 0, 0]);
        assert_eq!(scales, vec![1.0]);
    }

    #[test]
    fn max_element_maps_to_127() {
        let mut codes = Vec::new();
        let mut scales = Vec::new();
        quantize_into(&[0.5, -1.0, 0.25], &mut codes, &mut scales);
        assert_eq!(codes[1], -127);
        assert_eq!(codes[0], 64); // 0.5 / (1/127) rounds to 64
    }

    #[test]
    fn dequantized_dot_tracks_exact_dot() {
        let v = [0.3f32, -0.7, 0.2, 0.9];
        let q = [0.1f32, 0.4, -0.6, 0.8];
        let mut codes = Vec::new();
        let mut scales = Vec::new();
        quantize_into(&v, &mut codes, &mut scales);

        let exact: f32 = q.iter().zip(v.iter()).map(|(a, b)| a * b).sum();
        let approx = dot_i8(&q, &codes, scales[0]);
        assert!((exact - approx).abs() < 0.02, "exact {exact}, approx {approx}");
    }

    #[test]
    fn dequantized_l2_tracks_exact_l2() {
        let v = [1.0f32, 2.0, -3.0];
        let q = [0.5f32, 2.5, -2.0];
        let mut codes = Vec::new();
        let mut scales = Vec::new();
        quantize_into(&v, &mut codes, &mut scales);

        let exact: f32 = q.iter().zip(v.iter()).map(|(a, b)| (b - a) * (b - a)).sum();
        let approx = -neg_l2_squared_i8(&q, &codes, scales[0]);
        assert!((exact - approx).abs() < 0.1, "exact {exact}, approx {approx}");
    }
}
