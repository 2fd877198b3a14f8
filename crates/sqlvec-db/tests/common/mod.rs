//! Shared helpers for sqlvec-db integration tests.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sqlvec_db::{TableConfig, VectorTable};
use tempfile::TempDir;

/// Open and initialize a table in a fresh temporary database.
///
/// The `TempDir` must outlive the table.
pub fn create_table(config: TableConfig) -> (TempDir, VectorTable) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut table =
        VectorTable::open(temp_dir.path().join("vectors.db"), config).expect("Failed to open table");
    table.initialize(true).expect("Failed to initialize table");
    (temp_dir, table)
}

/// `n` vectors of `dimension` components drawn uniformly from `[-1, 1]`.
pub fn random_vectors(rng: &mut StdRng, n: usize, dimension: usize) -> Vec<Vec<f32>> {
    (0..n)
        .map(|_| (0..dimension).map(|_| rng.gen_range(-1.0f32..=1.0)).collect())
        .collect()
}

/// Seeded RNG for reproducible data.
pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Assert two vectors agree component-wise within `tolerance`.
pub fn assert_close(actual: &[f32], expected: &[f32], tolerance: f32) {
    assert_eq!(actual.len(), expected.len(), "length differs");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tolerance,
            "component {} differs: {} vs {}",
            i,
            a,
            e
        );
    }
}
