//! Vector math used by every index strategy.
//!
//! All functions are pure. Accumulation happens in `f64` and the result is
//! narrowed once, so the same inputs always produce the same bits regardless
//! of which layer (SQLite scalar function or in-process rerank) evaluates them.

use crate::error::{CoreError, CoreResult};

/// Magnitude substituted for zero-length vectors during normalization.
pub const ZERO_MAGNITUDE_EPSILON: f32 = 1e-10;

/// L2 norm of `v`.
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt() as f32
}

/// Divide `v` by its magnitude.
///
/// Pass `magnitude` when it has already been computed. A zero magnitude is
/// replaced by [`ZERO_MAGNITUDE_EPSILON`].
pub fn normalize(v: &[f32], magnitude: Option<f32>) -> Vec<f32> {
    let m = magnitude.unwrap_or_else(|| self::magnitude(v));
    let m = if m == 0.0 { ZERO_MAGNITUDE_EPSILON } else { m };
    v.iter().map(|&x| x / m).collect()
}

/// Dot product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> CoreResult<f32> {
    dot_f64(a, b).map(|d| d as f32)
}

/// Dot product without narrowing the accumulator.
pub fn dot_f64(a: &[f32], b: &[f32]) -> CoreResult<f64> {
    check_same_len(a, b)?;
    Ok(a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum())
}

/// Cosine similarity of two equal-length vectors.
///
/// Returns 0 when either vector has zero magnitude.
pub fn cosim(a: &[f32], b: &[f32]) -> CoreResult<f32> {
    let d = dot_f64(a, b)?;
    let denom = f64::from(magnitude(a)) * f64::from(magnitude(b));
    if denom == 0.0 {
        return Ok(0.0);
    }
    Ok((d / denom) as f32)
}

/// Squared Euclidean distance between two equal-length vectors.
pub fn l2_squared(a: &[f32], b: &[f32]) -> CoreResult<f32> {
    check_same_len(a, b)?;
    Ok(a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum::<f64>() as f32)
}

/// Per-dimension admissibility box of half-width `threshold` around `v`.
///
/// Returns `(lower, upper)` with `lower[i] <= upper[i]` even for a negative
/// threshold.
pub fn bounding_box(v: &[f32], threshold: f32) -> (Vec<f32>, Vec<f32>) {
    v.iter()
        .map(|&x| {
            let (a, b) = (x - threshold, x + threshold);
            (a.min(b), a.max(b))
        })
        .unzip()
}

/// Whether every component of `v` lies inside `[lower, upper]`.
pub fn within_box(v: &[f32], lower: &[f32], upper: &[f32]) -> bool {
    v.len() == lower.len()
        && v.len() == upper.len()
        && v
            .iter()
            .zip(lower.iter().zip(upper.iter()))
            .all(|(&x, (&lo, &hi))| x >= lo && x <= hi)
}

/// Fail with [`CoreError::DimensionMismatch`] unless `v` has `expected` components.
pub fn check_dimension(v: &[f32], expected: usize) -> CoreResult<()> {
    if v.len() != expected {
        return Err(CoreError::DimensionMismatch {
            expected,
            actual: v.len(),
        });
    }
    Ok(())
}

fn check_same_len(a: &[f32], b: &[f32]) -> CoreResult<()> {
    check_dimension(b, a.len())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_dot() {
        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap(), 32.0);
        assert_eq!(dot(&[], &[]).unwrap(), 0.0);
    }

    #[test]
    fn test_dot_dimension_mismatch() {
        let err = dot(&[1.0, 2.0], &[1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(
            err,
            CoreError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(&[3.0, 4.0], None), vec![0.6, 0.8]);
        assert_eq!(normalize(&[3.0, 4.0], Some(5.0)), vec![0.6, 0.8]);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let n = normalize(&[0.0, 0.0, 0.0], None);
        assert_eq!(n, vec![0.0, 0.0, 0.0]);
        assert!(n.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_magnitude() {
        assert_eq!(magnitude(&[3.0, 4.0]), 5.0);
        assert_eq!(magnitude(&[]), 0.0);
    }

    #[test]
    fn test_cosim() {
        assert!((cosim(&[1.0, 0.0], &[2.0, 0.0]).unwrap() - 1.0).abs() < 1e-6);
        assert!(cosim(&[1.0, 0.0], &[0.0, 3.0]).unwrap().abs() < 1e-6);
        assert_eq!(cosim(&[0.0, 0.0], &[1.0, 1.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_bounding_box() {
        let (lower, upper) = bounding_box(&[0.5, -0.5], 0.25);
        assert_eq!(lower, vec![0.25, -0.75]);
        assert_eq!(upper, vec![0.75, -0.25]);

        // Negative threshold still yields an ordered box
        let (lower, upper) = bounding_box(&[0.0], -1.0);
        assert_eq!(lower, vec![-1.0]);
        assert_eq!(upper, vec![1.0]);

        assert!(within_box(&[0.3, -0.6], &[0.25, -0.75], &[0.75, -0.25]));
        assert!(!within_box(&[0.8, -0.6], &[0.25, -0.75], &[0.75, -0.25]));
    }

    #[test]
    fn test_l2_squared() {
        assert_eq!(l2_squared(&[0.0, 0.0], &[3.0, 4.0]).unwrap(), 25.0);
    }

    proptest! {
        #[test]
        fn prop_normalized_is_unit(v in prop::collection::vec(-100.0f32..100.0, 1..64)) {
            prop_assume!(magnitude(&v) > 1e-3);
            let n = normalize(&v, None);
            prop_assert!((magnitude(&n) - 1.0).abs() < 1e-4);
        }

        #[test]
        fn prop_dot_is_symmetric(
            pair in (1usize..32).prop_flat_map(|d| (
                prop::collection::vec(-10.0f32..10.0, d),
                prop::collection::vec(-10.0f32..10.0, d),
            ))
        ) {
            let (a, b) = pair;
            prop_assert_eq!(dot(&a, &b).unwrap(), dot(&b, &a).unwrap());
        }

        #[test]
        fn prop_vector_inside_own_box(
            v in prop::collection::vec(-1.0f32..1.0, 1..32),
            t in 0.0f32..1.0,
        ) {
            let (lower, upper) = bounding_box(&v, t);
            prop_assert!(within_box(&v, &lower, &upper));
        }
    }
}
