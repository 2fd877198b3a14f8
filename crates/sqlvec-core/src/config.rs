//! Vector table configuration.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Constants
// ============================================================================

/// Default number of placeholder centroids seeded before the first clustering run.
pub const DEFAULT_INITIAL_CENTROIDS: usize = 1;

/// Default number of vectors sampled for k-means.
pub const DEFAULT_SAMPLE_SIZE: usize = 1000;

/// Default Lloyd iteration cap.
pub const DEFAULT_MAX_ITERATIONS: usize = 25;

/// Default convergence tolerance (largest centroid shift, Euclidean).
pub const DEFAULT_CONVERGENCE_TOLERANCE: f32 = 1e-4;

/// Default binary over-fetch factor.
pub const DEFAULT_OVERSAMPLE: usize = 10;

/// Default floor on binary candidates fetched for rerank.
pub const DEFAULT_MIN_CANDIDATES: usize = 100;

/// Default SQLite busy timeout in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

// ============================================================================
// IndexStrategy
// ============================================================================

/// How candidates are narrowed before exact scoring.
///
/// A table keeps one strategy for its whole lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStrategy {
    /// No index: every record is scored.
    None,

    /// Centroid partitioning; a query scans the partition of its nearest centroid.
    #[default]
    Ivf,

    /// Sign-bit codes; a query reranks the records with the closest codes.
    Binary,
}

impl IndexStrategy {
    /// Get the strategy name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Ivf => "ivf",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for IndexStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "flat" | "scan" => Ok(Self::None),
            "ivf" | "centroid" | "centroids" => Ok(Self::Ivf),
            "binary" | "lsh" | "bits" => Ok(Self::Binary),
            other => Err(CoreError::invalid_config(format!(
                "unknown index strategy '{}' (expected none, ivf or binary)",
                other
            ))),
        }
    }
}

// ============================================================================
// TableConfig
// ============================================================================

/// Configuration for creating or opening a vector table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    /// Logical table name; becomes the suffix of every physical table.
    pub name: String,

    /// Number of components in every vector.
    pub dimension: usize,

    /// Candidate generation strategy.
    #[serde(default)]
    pub strategy: IndexStrategy,

    /// Placeholder centroids created on first initialization.
    #[serde(default = "default_initial_centroids")]
    pub initial_centroids: usize,

    /// Vectors sampled per clustering run. Also divides the row count to
    /// pick the number of clusters.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Lloyd iteration cap.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Stop once no centroid moves further than this.
    #[serde(default = "default_convergence_tolerance")]
    pub convergence_tolerance: f32,

    /// Binary strategy fetches `oversample * n` candidates for rerank.
    #[serde(default = "default_oversample")]
    pub oversample: usize,

    /// Binary strategy never fetches fewer candidates than this.
    #[serde(default = "default_min_candidates")]
    pub min_candidates: usize,

    /// Optional per-dimension half-width around the normalized query.
    /// Candidates with a component outside the box are skipped before scoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<f32>,

    /// Seed for centroid seeding, sampling and k-means. Random when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// How long a session waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_initial_centroids() -> usize {
    DEFAULT_INITIAL_CENTROIDS
}

fn default_sample_size() -> usize {
    DEFAULT_SAMPLE_SIZE
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_convergence_tolerance() -> f32 {
    DEFAULT_CONVERGENCE_TOLERANCE
}

fn default_oversample() -> usize {
    DEFAULT_OVERSAMPLE
}

fn default_min_candidates() -> usize {
    DEFAULT_MIN_CANDIDATES
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl TableConfig {
    /// Create a new config with required fields.
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            strategy: IndexStrategy::default(),
            initial_centroids: DEFAULT_INITIAL_CENTROIDS,
            sample_size: DEFAULT_SAMPLE_SIZE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            convergence_tolerance: DEFAULT_CONVERGENCE_TOLERANCE,
            oversample: DEFAULT_OVERSAMPLE,
            min_candidates: DEFAULT_MIN_CANDIDATES,
            bounding_box: None,
            seed: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    /// Set the index strategy.
    pub fn with_strategy(mut self, strategy: IndexStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the number of seeded centroids.
    pub fn with_initial_centroids(mut self, k: usize) -> Self {
        self.initial_centroids = k;
        self
    }

    /// Set the k-means sample size.
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Set the Lloyd iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance.
    pub fn with_convergence_tolerance(mut self, tolerance: f32) -> Self {
        self.convergence_tolerance = tolerance;
        self
    }

    /// Set the binary over-fetch factor.
    pub fn with_oversample(mut self, oversample: usize) -> Self {
        self.oversample = oversample;
        self
    }

    /// Set the binary candidate floor.
    pub fn with_min_candidates(mut self, min_candidates: usize) -> Self {
        self.min_candidates = min_candidates;
        self
    }

    /// Enable the bounding-box pre-filter.
    pub fn with_bounding_box(mut self, threshold: f32) -> Self {
        self.bounding_box = Some(threshold);
        self
    }

    /// Fix the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the busy timeout.
    pub fn with_busy_timeout_ms(mut self, ms: u64) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    /// Number of candidates the binary strategy reranks for a top-`n` query.
    pub fn candidate_count(&self, n: usize) -> usize {
        n.saturating_mul(self.oversample).max(self.min_candidates).max(n)
    }

    /// Number of clusters a clustering run produces for `total` stored vectors.
    pub fn cluster_count(&self, total: usize) -> usize {
        (total / self.sample_size.max(1)).max(1)
    }

    /// Check every field. Called before a table is opened.
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() {
            return Err(CoreError::invalid_config("table name must not be empty"));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(CoreError::invalid_config(format!(
                "table name '{}' may only contain ASCII letters, digits and '_'",
                self.name
            )));
        }
        if self.dimension == 0 {
            return Err(CoreError::invalid_config("dimension must be greater than 0"));
        }
        if self.initial_centroids == 0 {
            return Err(CoreError::invalid_config(
                "initialCentroids must be greater than 0",
            ));
        }
        if self.sample_size == 0 {
            return Err(CoreError::invalid_config("sampleSize must be greater than 0"));
        }
        if self.max_iterations == 0 {
            return Err(CoreError::invalid_config(
                "maxIterations must be greater than 0",
            ));
        }
        if self.convergence_tolerance.is_nan() || self.convergence_tolerance < 0.0 {
            return Err(CoreError::invalid_config(
                "convergenceTolerance must be a non-negative number",
            ));
        }
        if self.oversample == 0 {
            return Err(CoreError::invalid_config("oversample must be at least 1"));
        }
        if let Some(t) = self.bounding_box {
            if t.is_nan() || t < 0.0 {
                return Err(CoreError::invalid_config(
                    "boundingBox must be a non-negative number",
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
