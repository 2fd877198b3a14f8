//! Centroid (IVF) index.
//!
//! Records of an IVF table carry the id of their nearest centroid as index
//! key, and a query only scores the partition of its own nearest centroid.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized --seed--> Seeded --quantize--> Clustered
//!                                                 |  ^
//!                     centroids replaced elsewhere|  | reassign
//!                                                 v  |
//!                                                Stale
//! ```
//!
//! Seeding writes random placeholder centroids so writes get a valid key
//! before any clustering has run. `quantize` samples stored vectors, runs
//! k-means, swaps the centroid set and reassigns every record, all inside one
//! transaction on a dedicated session.
//!
//! ## Cache
//!
//! [`CentroidCache`] keeps the centroid set in process so assigning a key
//! does not cost a round-trip. It is filled on first use and replaced after a
//! clustering run in this process. Another process re-clustering the table
//! leaves it stale: keys then point at obsolete centroids and recall drops
//! until the cache is refreshed and the table reassigned, but no stored data
//! is wrong.

use crate::error::{DbError, DbResult};
use crate::store::Session;
use crate::types::{Centroid, IndexKey, QuantizeReport, VectorId};
use rayon::prelude::*;
use sqlvec_core::kmeans::{self, KMeans};
use sqlvec_core::TableConfig;
use std::sync::RwLock;
use tracing::{debug, info};

/// Records read per page while reassigning.
const REASSIGN_PAGE: usize = 1000;

// ============================================================================
// CentroidCache
// ============================================================================

/// Process-local copy of a table's centroids.
#[derive(Debug, Default)]
pub struct CentroidCache {
    entries: RwLock<Vec<Centroid>>,
}

impl CentroidCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached centroids, in id order.
    pub fn snapshot(&self) -> DbResult<Vec<Centroid>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))?;
        Ok(entries.clone())
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> DbResult<bool> {
        let entries = self
            .entries
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))?;
        Ok(entries.is_empty())
    }

    /// Replace the cached set.
    pub fn replace(&self, centroids: Vec<Centroid>) -> DbResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| DbError::internal(format!("Failed to acquire write lock: {}", e)))?;
        *entries = centroids;
        Ok(())
    }

    /// Drop everything; the next lookup reloads from storage.
    pub fn clear(&self) -> DbResult<()> {
        self.replace(Vec::new())
    }

    /// Reload from storage.
    pub fn refresh(&self, session: &Session<'_>) -> DbResult<usize> {
        let centroids = session.centroids()?;
        let n = centroids.len();
        self.replace(centroids)?;
        debug!("Centroid cache refreshed with {} centroids", n);
        Ok(n)
    }
}

// ============================================================================
// CentroidIndex
// ============================================================================

/// Assignment and clustering for an IVF table.
#[derive(Debug, Default)]
pub struct CentroidIndex {
    cache: CentroidCache,
}

impl CentroidIndex {
    /// Create an index with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-local cache.
    pub fn cache(&self) -> &CentroidCache {
        &self.cache
    }

    /// Write `k` random placeholder centroids if the table has none.
    ///
    /// Returns whether any were written.
    pub fn seed_if_empty(&self, session: &Session<'_>, config: &TableConfig) -> DbResult<bool> {
        if session.centroid_count()? > 0 {
            return Ok(false);
        }
        let seeds = kmeans::random_centroids(config.initial_centroids, config.dimension, config.seed);
        for c in &seeds {
            session.insert_centroid(c)?;
        }
        info!(
            "Seeded {} placeholder centroids for '{}'",
            seeds.len(),
            session.names().name
        );
        Ok(true)
    }

    /// Id of the centroid most similar to `normalized`.
    ///
    /// Loads the cache from `session` first if it is empty.
    pub fn nearest(&self, session: &Session<'_>, normalized: &[f32]) -> DbResult<i64> {
        if self.cache.is_empty()? {
            self.cache.refresh(session)?;
        }
        let centroids = self
            .cache
            .entries
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))?;
        nearest_in(&centroids, normalized)
    }

    /// Index key for `normalized` under the current centroids.
    pub fn assign(&self, session: &Session<'_>, normalized: &[f32]) -> DbResult<IndexKey> {
        self.nearest(session, normalized).map(IndexKey::Centroid)
    }

    /// Cluster a sample of stored vectors, replace the centroid set and
    /// reassign every record.
    ///
    /// `session` must be inside a write that the caller commits. The cache
    /// is left alone; install [`QuantizeOutcome::centroids`] after commit.
    pub fn quantize(&self, session: &Session<'_>, config: &TableConfig) -> DbResult<QuantizeOutcome> {
        let total = session.count()?;
        if total == 0 {
            return Err(DbError::inconsistent(format!(
                "cannot cluster '{}': the table has no vectors",
                session.names().name
            )));
        }

        let ids = session.ids()?;
        let sample_size = config.sample_size.min(ids.len());
        let mut rng = kmeans::seeded_rng(config.seed);
        let mut sample_ids: Vec<VectorId> = rand::seq::index::sample(&mut rng, ids.len(), sample_size)
            .into_iter()
            .map(|i| ids[i])
            .collect();
        sample_ids.sort();
        let samples = session.normalized_for(&sample_ids)?;

        let k = config.cluster_count(total);
        info!(
            "Clustering '{}': {} vectors, sample {}, k={}",
            session.names().name,
            total,
            samples.len(),
            k
        );

        let fit = KMeans::new(k)
            .with_max_iterations(config.max_iterations)
            .with_tolerance(config.convergence_tolerance)
            .with_seed(config.seed)
            .fit(&samples)?;

        let removed = session.clear_centroids()?;
        let mut centroids = Vec::with_capacity(fit.centroids.len());
        for vector in fit.centroids {
            let id = session.insert_centroid(&vector)?;
            centroids.push(Centroid { id, vector });
        }
        debug!("Replaced {} centroids with {}", removed, centroids.len());

        let reassigned = reassign_all(session, &centroids)?;

        Ok(QuantizeOutcome {
            report: QuantizeReport {
                sampled: samples.len(),
                clusters: centroids.len(),
                iterations: fit.iterations,
                converged: fit.converged,
                reassigned,
            },
            centroids,
        })
    }

    /// Recompute every record's key against the stored centroids.
    ///
    /// Same transaction contract as [`CentroidIndex::quantize`]. Returns the
    /// stored centroids alongside the number of records visited.
    pub fn reassign(&self, session: &Session<'_>) -> DbResult<(Vec<Centroid>, usize)> {
        let centroids = session.centroids()?;
        if centroids.is_empty() {
            return Err(DbError::inconsistent(format!(
                "cannot reassign '{}': no centroids stored",
                session.names().name
            )));
        }
        let n = reassign_all(session, &centroids)?;
        Ok((centroids, n))
    }
}

/// Result of [`CentroidIndex::quantize`].
#[derive(Debug, Clone)]
pub struct QuantizeOutcome {
    pub report: QuantizeReport,
    /// The new centroid set, for the cache.
    pub centroids: Vec<Centroid>,
}

/// Nearest centroid by dot product; ties go to the lower id.
pub fn nearest_in(centroids: &[Centroid], normalized: &[f32]) -> DbResult<i64> {
    match kmeans::nearest_by_dot(normalized, centroids) {
        Some(i) => Ok(centroids[i].id),
        None if centroids.is_empty() => Err(DbError::inconsistent(
            "no centroids available for assignment",
        )),
        None => Err(DbError::DimensionMismatch {
            expected: centroids[0].vector.len(),
            actual: normalized.len(),
        }),
    }
}

/// Walk every record in id order and store its nearest centroid.
fn reassign_all(session: &Session<'_>, centroids: &[Centroid]) -> DbResult<usize> {
    let mut after = None;
    let mut visited = 0;

    loop {
        let page = session.normalized_page(after, REASSIGN_PAGE)?;
        let Some((last, _)) = page.last() else {
            break;
        };
        after = Some(*last);

        let keys = page
            .par_iter()
            .map(|(id, v)| nearest_in(centroids, v).map(|c| (*id, c)))
            .collect::<DbResult<Vec<_>>>()?;
        for (id, centroid) in keys {
            session.set_index_key(id, &IndexKey::Centroid(centroid))?;
        }
        visited += page.len();
    }

    info!(
        "Reassigned {} vectors of '{}' across {} centroids",
        visited,
        session.names().name,
        centroids.len()
    );
    Ok(visited)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn centroid(id: i64, v: &[f32]) -> Centroid {
        Centroid {
            id,
            vector: v.to_vec(),
        }
    }

    #[test]
    fn test_nearest_in() {
        let centroids = vec![centroid(3, &[1.0, 0.0]), centroid(8, &[0.0, 1.0])];
        assert_eq!(nearest_in(&centroids, &[0.2, 0.9]).unwrap(), 8);
        assert_eq!(nearest_in(&centroids, &[0.9, 0.2]).unwrap(), 3);
    }

    #[test]
    fn test_nearest_in_tie_prefers_lower_id() {
        let centroids = vec![centroid(1, &[1.0, 0.0]), centroid(2, &[0.0, 1.0])];
        assert_eq!(nearest_in(&centroids, &[0.5, 0.5]).unwrap(), 1);
    }

    #[test]
    fn test_nearest_in_negative_similarities() {
        let centroids = vec![centroid(1, &[1.0, 0.0]), centroid(2, &[0.0, 1.0])];
        assert_eq!(nearest_in(&centroids, &[-0.9, -0.1]).unwrap(), 2);
    }

    #[test]
    fn test_nearest_in_empty() {
        assert!(matches!(
            nearest_in(&[], &[1.0]),
            Err(DbError::InconsistentIndexState { .. })
        ));
    }

    #[test]
    fn test_cache_replace_and_clear() {
        let cache = CentroidCache::new();
        assert!(cache.is_empty().unwrap());
        cache.replace(vec![centroid(1, &[1.0])]).unwrap();
        assert_eq!(cache.snapshot().unwrap().len(), 1);
        cache.clear().unwrap();
        assert!(cache.is_empty().unwrap());
    }
}
