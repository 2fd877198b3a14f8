//! Logical schema and persisted table metadata.
//!
//! Every logical table `<name>` owns three physical tables:
//!
//! ```text
//! vectors_<name>      id, raw, normalized, magnitude, index_key, created_at
//! centroids_<name>    id, vector, created_at          (ivf strategy only)
//! vector_meta_<name>  key, value                      (JSON TableMeta)
//! ```
//!
//! `index_key` is declared without a numeric affinity so it can hold either an
//! integer centroid id or a binary code blob.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlvec_core::{IndexStrategy, TableConfig};

/// Key of the metadata row inside `vector_meta_<name>`.
pub const TABLE_META_KEY: &str = "table";

/// Current schema version written to new tables.
pub const SCHEMA_VERSION: u32 = 1;

// ============================================================================
// TableNames
// ============================================================================

/// Physical table names for one logical table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub name: String,
    pub vectors: String,
    pub centroids: String,
    pub meta: String,
}

impl TableNames {
    /// Derive the physical names. `name` must already be validated.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vectors: format!("vectors_{}", name),
            centroids: format!("centroids_{}", name),
            meta: format!("vector_meta_{}", name),
        }
    }

    /// DDL creating the schema, in execution order.
    pub fn create_statements(&self, if_not_exists: bool) -> Vec<String> {
        let ine = if if_not_exists { "IF NOT EXISTS " } else { "" };
        vec![
            format!(
                "CREATE TABLE {ine}{} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    raw BLOB NOT NULL,
                    normalized BLOB NOT NULL,
                    magnitude REAL NOT NULL,
                    index_key BLOB,
                    created_at TEXT NOT NULL
                )",
                self.vectors
            ),
            format!(
                "CREATE INDEX {ine}{}_index_key ON {} (index_key)",
                self.vectors, self.vectors
            ),
            format!(
                "CREATE TABLE {ine}{} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    vector BLOB NOT NULL,
                    created_at TEXT NOT NULL
                )",
                self.centroids
            ),
            format!(
                "CREATE TABLE {ine}{} (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                )",
                self.meta
            ),
        ]
    }

    /// DDL removing the schema.
    pub fn drop_statements(&self) -> Vec<String> {
        vec![
            format!("DROP TABLE IF EXISTS {}", self.vectors),
            format!("DROP TABLE IF EXISTS {}", self.centroids),
            format!("DROP TABLE IF EXISTS {}", self.meta),
        ]
    }
}

// ============================================================================
// TableMeta
// ============================================================================

/// Metadata persisted with a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMeta {
    /// Dimension of vectors.
    pub dimension: usize,

    /// Strategy fixed at creation.
    pub strategy: IndexStrategy,

    /// Schema version for future migrations.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Last successful clustering run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clustered_at: Option<DateTime<Utc>>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl TableMeta {
    /// Create metadata for a new table.
    pub fn new(config: &TableConfig) -> Self {
        let now = Utc::now();
        Self {
            dimension: config.dimension,
            strategy: config.strategy,
            schema_version: SCHEMA_VERSION,
            created_at: now,
            updated_at: now,
            clustered_at: None,
        }
    }

    /// Record a finished clustering run.
    pub fn mark_clustered(&mut self) {
        let now = Utc::now();
        self.clustered_at = Some(now);
        self.updated_at = now;
    }
}

// ============================================================================
// TableCompatibility
// ============================================================================

/// Result of comparing a config with what is already stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableCompatibility {
    /// Table exists and matches.
    Compatible,

    /// Table doesn't exist and should be created.
    NotFound,

    /// Table exists with another dimension.
    IncompatibleDimension { expected: usize, actual: usize },

    /// Table exists with another strategy.
    IncompatibleStrategy {
        expected: IndexStrategy,
        actual: IndexStrategy,
    },

    /// Tables exist but the metadata is missing or unreadable.
    Corrupted(String),
}

impl TableCompatibility {
    /// Check if the table is compatible.
    pub fn is_compatible(&self) -> bool {
        matches!(self, TableCompatibility::Compatible)
    }

    /// Check if the table doesn't exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TableCompatibility::NotFound)
    }

    /// Compare stored metadata with a config.
    pub fn check(stored: &TableMeta, config: &TableConfig) -> Self {
        if stored.dimension != config.dimension {
            return TableCompatibility::IncompatibleDimension {
                expected: config.dimension,
                actual: stored.dimension,
            };
        }
        if stored.strategy != config.strategy {
            return TableCompatibility::IncompatibleStrategy {
                expected: config.strategy,
                actual: stored.strategy,
            };
        }
        TableCompatibility::Compatible
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        let names = TableNames::new("test_table");
        assert_eq!(names.vectors, "vectors_test_table");
        assert_eq!(names.centroids, "centroids_test_table");
        assert_eq!(names.meta, "vector_meta_test_table");
    }

    #[test]
    fn test_create_statements() {
        let names = TableNames::new("docs");
        let stmts = names.create_statements(true);
        assert_eq!(stmts.len(), 4);
        assert!(stmts[0].starts_with("CREATE TABLE IF NOT EXISTS vectors_docs"));
        assert!(stmts[1].contains("vectors_docs_index_key ON vectors_docs"));

        let stmts = names.create_statements(false);
        assert!(stmts.iter().all(|s| !s.contains("IF NOT EXISTS")));
    }

    #[test]
    fn test_meta_serialization() {
        let config = TableConfig::new("docs", 384).with_strategy(IndexStrategy::Binary);
        let meta = TableMeta::new(&config);

        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"dimension\":384"));
        assert!(json.contains("\"strategy\":\"binary\""));
        assert!(!json.contains("clusteredAt"));

        let parsed: TableMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn test_compatibility() {
        let config = TableConfig::new("docs", 3);
        let meta = TableMeta::new(&config);
        assert!(TableCompatibility::check(&meta, &config).is_compatible());

        let other = TableConfig::new("docs", 4);
        assert_eq!(
            TableCompatibility::check(&meta, &other),
            TableCompatibility::IncompatibleDimension {
                expected: 4,
                actual: 3
            }
        );

        let other = TableConfig::new("docs", 3).with_strategy(IndexStrategy::None);
        assert_eq!(
            TableCompatibility::check(&meta, &other),
            TableCompatibility::IncompatibleStrategy {
                expected: IndexStrategy::None,
                actual: IndexStrategy::Ivf
            }
        );
    }

    #[test]
    fn test_mark_clustered() {
        let mut meta = TableMeta::new(&TableConfig::new("docs", 3));
        assert!(meta.clustered_at.is_none());
        meta.mark_clustered();
        assert!(meta.clustered_at.is_some());
    }
}
