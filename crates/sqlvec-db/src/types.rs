//! Record, centroid and result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlvec_core::BinaryCode;
use std::fmt;

// ============================================================================
// VectorId
// ============================================================================

/// Identifier of a stored vector.
///
/// Assigned by the store on first insert and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorId(pub i64);

impl VectorId {
    /// Create a new vector ID.
    pub fn new(id: i64) -> Self {
        VectorId(id)
    }

    /// Get the underlying ID value.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for VectorId {
    fn from(id: i64) -> Self {
        VectorId(id)
    }
}

impl fmt::Display for VectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// IndexKey
// ============================================================================

/// Derived index column of a record. Which variant appears depends on the
/// table's strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum IndexKey {
    /// Strategy `none`.
    None,
    /// Strategy `ivf`: id of the nearest centroid at write time.
    Centroid(i64),
    /// Strategy `binary`: sign bits of the normalized vector.
    Code(BinaryCode),
}

impl IndexKey {
    /// Centroid id, if this is an IVF key.
    pub fn centroid(&self) -> Option<i64> {
        match self {
            IndexKey::Centroid(id) => Some(*id),
            _ => None,
        }
    }

    /// Binary code, if this is a binary key.
    pub fn code(&self) -> Option<&BinaryCode> {
        match self {
            IndexKey::Code(code) => Some(code),
            _ => None,
        }
    }
}

// ============================================================================
// VectorRecord
// ============================================================================

/// A stored vector with its derived fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorRecord {
    pub id: VectorId,

    /// Vector as written by the caller.
    pub raw: Vec<f32>,

    /// `raw` scaled to unit length.
    pub normalized: Vec<f32>,

    /// L2 norm of `raw`.
    pub magnitude: f32,

    pub index_key: IndexKey,

    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Centroid
// ============================================================================

/// One partition center of an IVF table. Stored normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub id: i64,
    pub vector: Vec<f32>,
}

impl AsRef<[f32]> for Centroid {
    fn as_ref(&self) -> &[f32] {
        &self.vector
    }
}

// ============================================================================
// SearchResult
// ============================================================================

/// A single result from a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Identifier of the matched vector.
    pub id: VectorId,

    /// Cosine similarity to the query (higher is better).
    pub score: f32,

    /// The stored raw vector.
    pub vector: Vec<f32>,
}

// ============================================================================
// IndexState
// ============================================================================

/// Lifecycle of a table's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    /// Schema or centroids missing.
    Uninitialized,
    /// Placeholder centroids only; no clustering run yet.
    Seeded,
    /// Every record points at a current centroid of a clustering run.
    Clustered,
    /// Some records reference centroids that no longer exist.
    Stale,
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndexState::Uninitialized => "uninitialized",
            IndexState::Seeded => "seeded",
            IndexState::Clustered => "clustered",
            IndexState::Stale => "stale",
        };
        f.write_str(s)
    }
}

// ============================================================================
// QuantizeReport
// ============================================================================

/// Outcome of a clustering run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantizeReport {
    /// Vectors sampled for k-means.
    pub sampled: usize,
    /// Centroids written.
    pub clusters: usize,
    /// Lloyd iterations run.
    pub iterations: usize,
    /// Whether k-means converged before the iteration cap.
    pub converged: bool,
    /// Records whose centroid was recomputed.
    pub reassigned: usize,
}

// ============================================================================
// Tests
// ============================================================================
