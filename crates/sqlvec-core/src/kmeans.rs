//! k-means clustering (Lloyd's algorithm).
//!
//! Used to turn a sample of stored, normalized vectors into the centroid set
//! of an IVF table. Initialization picks `k` distinct sample points; each
//! iteration assigns every point to its nearest centroid by Euclidean distance
//! and moves each centroid to the mean of its points. The returned centroids
//! are normalized so they can be compared to records with a dot product.

use crate::error::{CoreError, CoreResult};
use crate::math;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, trace};

/// Clustering parameters.
#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    max_iterations: usize,
    tolerance: f32,
    seed: Option<u64>,
}

/// Result of a clustering run.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    /// Normalized cluster means, `min(k, samples)` of them.
    pub centroids: Vec<Vec<f32>>,

    /// Lloyd iterations performed.
    pub iterations: usize,

    /// Whether the run stopped below the tolerance rather than at the cap.
    pub converged: bool,
}

impl KMeans {
    /// Create a clustering run for `k` clusters.
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            max_iterations: crate::config::DEFAULT_MAX_ITERATIONS,
            tolerance: crate::config::DEFAULT_CONVERGENCE_TOLERANCE,
            seed: None,
        }
    }

    /// Cap the number of Lloyd iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Stop once no centroid moves further than `tolerance`.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Configure a deterministic seed for initialization.
    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Cluster `samples`. All samples must share one dimension.
    pub fn fit(&self, samples: &[Vec<f32>]) -> CoreResult<KMeansFit> {
        let first = samples.first().ok_or(CoreError::EmptySample)?;
        let dimension = first.len();
        for s in samples {
            math::check_dimension(s, dimension)?;
        }

        let k = self.k.min(samples.len());
        let mut rng = seeded_rng(self.seed);
        let mut centroids: Vec<Vec<f32>> = rand::seq::index::sample(&mut rng, samples.len(), k)
            .into_iter()
            .map(|i| samples[i].clone())
            .collect();

        debug!(
            "k-means: {} samples, k={}, dimension={}",
            samples.len(),
            k,
            dimension
        );

        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.max_iterations {
            iterations += 1;

            let assignments: Vec<usize> = samples
                .par_iter()
                .map(|s| nearest_euclidean(s, &centroids))
                .collect();
            let updated = update_centroids(samples, &assignments, &centroids);

            let shift = centroids
                .iter()
                .zip(updated.iter())
                .map(|(old, new)| distance(old, new))
                .fold(0.0f32, f32::max);
            centroids = updated;

            trace!("k-means iteration {}: max shift {}", iterations, shift);
            if shift <= self.tolerance {
                converged = true;
                break;
            }
        }

        debug!(
            "k-means finished after {} iterations (converged: {})",
            iterations, converged
        );

        Ok(KMeansFit {
            centroids: centroids.iter().map(|c| math::normalize(c, None)).collect(),
            iterations,
            converged,
        })
    }
}

/// `k` normalized vectors with components drawn uniformly from `[-1, 1]`.
///
/// Placeholder centroids for a table that has never been clustered.
pub fn random_centroids(k: usize, dimension: usize, seed: Option<u64>) -> Vec<Vec<f32>> {
    let mut rng = seeded_rng(seed);
    (0..k)
        .map(|_| {
            let v: Vec<f32> = (0..dimension).map(|_| rng.gen_range(-1.0f32..=1.0)).collect();
            math::normalize(&v, None)
        })
        .collect()
}

/// Index of the centroid with the largest dot product against `v`.
///
/// Ties keep the earlier centroid. Returns `None` for an empty centroid list.
pub fn nearest_by_dot<C: AsRef<[f32]>>(v: &[f32], centroids: &[C]) -> Option<usize> {
    let mut best = None;
    let mut best_score = f64::NEG_INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        // Centroids of another dimension never match
        let Ok(score) = math::dot_f64(v, c.as_ref()) else {
            continue;
        };
        if best.is_none() || score > best_score {
            best = Some(i);
            best_score = score;
        }
    }
    best
}

/// RNG from `seed`, or from entropy when unset.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn nearest_euclidean(v: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = math::l2_squared(v, c).unwrap_or(f32::INFINITY);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

fn update_centroids(
    samples: &[Vec<f32>],
    assignments: &[usize],
    previous: &[Vec<f32>],
) -> Vec<Vec<f32>> {
    let dimension = previous.first().map(Vec::len).unwrap_or(0);
    let mut sums = vec![vec![0.0f64; dimension]; previous.len()];
    let mut counts = vec![0usize; previous.len()];

    for (s, &cluster) in samples.iter().zip(assignments.iter()) {
        counts[cluster] += 1;
        for (acc, &x) in sums[cluster].iter_mut().zip(s.iter()) {
            *acc += f64::from(x);
        }
    }

    sums.into_iter()
        .zip(counts)
        .zip(previous.iter())
        .map(|((sum, count), old)| {
            if count == 0 {
                // Empty cluster: keep old centroid
                old.clone()
            } else {
                sum.into_iter().map(|x| (x / count as f64) as f32).collect()
            }
        })
        .collect()
}

fn distance(a: &[f32], b: &[f32]) -> f32 {
    math::l2_squared(a, b).unwrap_or(f32::INFINITY).sqrt()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(center: &[f32], n: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
        (0..n)
            .map(|_| {
                let v: Vec<f32> = center
                    .iter()
                    .map(|c| c + rng.gen_range(-0.05f32..0.05))
                    .collect();
                math::normalize(&v, None)
            })
            .collect()
    }

    #[test]
    fn test_fit_separates_clusters() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut samples = blob(&[1.0, 0.0, 0.0], 50, &mut rng);
        samples.extend(blob(&[0.0, 1.0, 0.0], 50, &mut rng));
        samples.extend(blob(&[0.0, 0.0, 1.0], 50, &mut rng));

        let fit = KMeans::new(3).with_seed(Some(42)).fit(&samples).unwrap();
        assert_eq!(fit.centroids.len(), 3);

        // Every axis has a centroid pointing at it
        for axis in 0..3 {
            let mut target = vec![0.0f32; 3];
            target[axis] = 1.0;
            let best = fit
                .centroids
                .iter()
                .map(|c| math::dot(c, &target).unwrap())
                .fold(f32::MIN, f32::max);
            assert!(best > 0.95, "axis {} best {}", axis, best);
        }
        for c in &fit.centroids {
            assert!((math::magnitude(c) - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_fit_is_deterministic_with_seed() {
        let mut rng = StdRng::seed_from_u64(9);
        let samples = blob(&[0.3, -0.2, 0.9, 0.1], 80, &mut rng);
        let a = KMeans::new(4).with_seed(Some(5)).fit(&samples).unwrap();
        let b = KMeans::new(4).with_seed(Some(5)).fit(&samples).unwrap();
        assert_eq!(a.centroids, b.centroids);
        assert_eq!(a.iterations, b.iterations);
    }

    #[test]
    fn test_fit_clamps_k_to_samples() {
        let samples = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let fit = KMeans::new(10).with_seed(Some(1)).fit(&samples).unwrap();
        assert_eq!(fit.centroids.len(), 2);
        assert!(fit.converged);
    }

    #[test]
    fn test_fit_empty() {
        assert_eq!(
            KMeans::new(2).fit(&[]).unwrap_err(),
            CoreError::EmptySample
        );
    }

    #[test]
    fn test_fit_mixed_dimensions() {
        let samples = vec![vec![1.0, 0.0], vec![0.0, 1.0, 0.0]];
        assert!(matches!(
            KMeans::new(1).fit(&samples),
            Err(CoreError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_random_centroids() {
        let a = random_centroids(3, 8, Some(11));
        let b = random_centroids(3, 8, Some(11));
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        for c in &a {
            assert_eq!(c.len(), 8);
            assert!((math::magnitude(c) - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_nearest_by_dot() {
        let centroids = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.0, 1.0]];
        assert_eq!(nearest_by_dot(&[0.1, 0.9], &centroids), Some(1));
        assert_eq!(nearest_by_dot(&[0.9, 0.1], &centroids), Some(0));
        assert_eq!(nearest_by_dot::<Vec<f32>>(&[0.1, 0.9], &[]), None);
    }

    #[test]
    fn test_nearest_by_dot_borrowed_slices() {
        let a = [0.0f32, 1.0];
        let b = [1.0f32, 0.0];
        let centroids: [&[f32]; 2] = [&a, &b];
        assert_eq!(nearest_by_dot(&[0.8, 0.2], &centroids), Some(1));
    }

    #[test]
    fn test_nearest_by_dot_all_negative() {
        // The closest centroid wins even when every similarity is negative
        let centroids = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert_eq!(nearest_by_dot(&[-1.0, -0.2], &centroids), Some(1));
    }
}
