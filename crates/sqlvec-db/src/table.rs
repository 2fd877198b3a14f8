//! The `VectorTable` facade.
//!
//! A [`VectorTable`] binds a [`TableConfig`] to its physical tables and hosts
//! the write path (`upsert`, `batch_insert`, `delete`) and the query path
//! (`search`). Candidate generation is delegated to the table's strategy:
//!
//! | Strategy | Index key          | Candidates                              |
//! |----------|--------------------|-----------------------------------------|
//! | `none`   | none               | every record                            |
//! | `ivf`    | nearest centroid   | the partition of the query's centroid   |
//! | `binary` | sign-bit code      | closest codes by Hamming distance       |
//!
//! Candidates are always scored exactly in the store and ranked by score
//! descending, ties by ascending id.

use crate::centroid::CentroidIndex;
use crate::error::{DbError, DbResult};
use crate::lsh;
use crate::schema::{TableCompatibility, TableMeta, TableNames};
use crate::store::{Candidates, NewRecord, Session, SqliteStore, StoreConfig};
use crate::types::{
    Centroid, IndexKey, IndexState, QuantizeReport, SearchResult, VectorId, VectorRecord,
};
use rayon::prelude::*;
use rusqlite::Connection;
use sqlvec_core::embed::{embed_checked, Embedder};
use sqlvec_core::{math, IndexStrategy, TableConfig};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// A vector value with its derived fields, ready to be written.
struct Prepared {
    raw: Vec<f32>,
    normalized: Vec<f32>,
    magnitude: f32,
}

impl Prepared {
    fn new(raw: &[f32]) -> Self {
        let magnitude = math::magnitude(raw);
        Self {
            raw: raw.to_vec(),
            normalized: math::normalize(raw, Some(magnitude)),
            magnitude,
        }
    }

    fn record<'a>(&'a self, index_key: &'a IndexKey) -> NewRecord<'a> {
        NewRecord {
            raw: &self.raw,
            normalized: &self.normalized,
            magnitude: self.magnitude,
            index_key,
        }
    }
}

// ============================================================================
// VectorTable
// ============================================================================

/// An approximate nearest-neighbor table stored in SQLite.
///
/// # Example
///
/// ```no_run
/// use sqlvec_core::{IndexStrategy, TableConfig};
/// use sqlvec_db::VectorTable;
///
/// let config = TableConfig::new("docs", 3).with_strategy(IndexStrategy::Binary);
/// let mut table = VectorTable::open("vectors.db", config)?;
/// table.initialize(true)?;
///
/// let id = table.upsert(&[1.0, 2.0, 3.0], None)?;
/// let hits = table.search(&[1.0, 2.0, 3.0], 1)?;
/// assert_eq!(hits[0].id, id);
/// # Ok::<(), sqlvec_db::DbError>(())
/// ```
pub struct VectorTable {
    config: TableConfig,
    store: SqliteStore,
    index: CentroidIndex,
}

impl VectorTable {
    /// Open a table in the SQLite database at `path`.
    ///
    /// Validates `config`. Does not touch the schema; call
    /// [`VectorTable::initialize`] before use.
    pub fn open(path: impl Into<PathBuf>, config: TableConfig) -> DbResult<Self> {
        let store_config =
            StoreConfig::new(path).with_busy_timeout_ms(config.busy_timeout_ms);
        Self::open_with(store_config, config)
    }

    /// Open a table with an explicit store configuration.
    pub fn open_with(store_config: StoreConfig, config: TableConfig) -> DbResult<Self> {
        config.validate()?;
        let store = SqliteStore::open(store_config, TableNames::new(&config.name))?;
        info!(
            "Opened vector table '{}' (dimension={}, strategy={})",
            config.name, config.dimension, config.strategy
        );
        Ok(Self {
            config,
            store,
            index: CentroidIndex::new(),
        })
    }

    /// Table configuration.
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Primary connection. Callers may open their own transaction on it;
    /// writes through this table nest inside it as savepoints.
    pub fn connection(&self) -> &Connection {
        self.store.connection()
    }

    // ------------------------------------------------------------------------
    // Schema
    // ------------------------------------------------------------------------

    /// Name of the vectors table.
    pub fn vectors_table(&self) -> &str {
        &self.store.names().vectors
    }

    /// Name of the centroids table.
    pub fn centroids_table(&self) -> &str {
        &self.store.names().centroids
    }

    /// Name of the metadata table.
    pub fn meta_table(&self) -> &str {
        &self.store.names().meta
    }

    /// DDL this table runs on initialization.
    pub fn create_statements(&self, if_not_exists: bool) -> Vec<String> {
        self.store.names().create_statements(if_not_exists)
    }

    /// Compare what is stored with this table's configuration.
    pub fn check_compatibility(&self) -> DbResult<TableCompatibility> {
        let session = self.store.session();
        if !session.schema_exists()? {
            return Ok(TableCompatibility::NotFound);
        }
        match session.load_meta() {
            Ok(Some(meta)) => Ok(TableCompatibility::check(&meta, &self.config)),
            Ok(None) => Ok(TableCompatibility::Corrupted(
                "metadata row is missing".to_string(),
            )),
            Err(DbError::Json(e)) => Ok(TableCompatibility::Corrupted(e.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Create the schema, persist metadata and, for IVF tables, seed
    /// placeholder centroids.
    ///
    /// With `if_not_exists`, an existing compatible table is reused. Without
    /// it, an existing table is a storage error. An existing table whose
    /// metadata disagrees with the configuration is always rejected.
    pub fn initialize(&mut self, if_not_exists: bool) -> DbResult<TableCompatibility> {
        let compatibility = self.check_compatibility()?;
        match &compatibility {
            TableCompatibility::Compatible | TableCompatibility::NotFound => {}
            TableCompatibility::IncompatibleDimension { expected, actual } => {
                return Err(DbError::incompatible(
                    &self.config.name,
                    format!("dimension {} is stored, {} requested", actual, expected),
                ));
            }
            TableCompatibility::IncompatibleStrategy { expected, actual } => {
                return Err(DbError::incompatible(
                    &self.config.name,
                    format!("strategy {} is stored, {} requested", actual, expected),
                ));
            }
            TableCompatibility::Corrupted(reason) => {
                return Err(DbError::incompatible(&self.config.name, reason.clone()));
            }
        }

        let guard = self.store.write()?;
        let session = guard.session();
        session.create_schema(if_not_exists)?;
        if compatibility.is_not_found() {
            session.write_meta(&TableMeta::new(&self.config))?;
        }
        if self.config.strategy == IndexStrategy::Ivf {
            self.index.seed_if_empty(&session, &self.config)?;
        }
        guard.commit()?;

        if self.config.strategy == IndexStrategy::Ivf {
            self.index.cache().refresh(&self.store.session())?;
        }
        debug!("Initialized '{}' ({:?})", self.config.name, compatibility);
        Ok(compatibility)
    }

    /// Drop every physical table of this table.
    pub fn drop_schema(&mut self) -> DbResult<()> {
        let guard = self.store.write()?;
        guard.session().drop_schema()?;
        guard.commit()?;
        self.index.cache().clear()?;
        info!("Dropped vector table '{}'", self.config.name);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------------

    /// Insert a vector, or overwrite the vector stored under `id`.
    ///
    /// Returns the record's id. Updating an id that does not exist is
    /// [`DbError::NotFound`]; ids are only ever assigned by the store.
    pub fn upsert(&mut self, raw: &[f32], id: Option<VectorId>) -> DbResult<VectorId> {
        math::check_dimension(raw, self.config.dimension)?;
        let prepared = Prepared::new(raw);
        let key = self.index_key(&self.store.session(), &prepared.normalized)?;

        let guard = self.store.write()?;
        let session = guard.session();
        let id = match id {
            None => session.insert(&prepared.record(&key))?,
            Some(id) => {
                if !session.update(id, &prepared.record(&key))? {
                    return Err(DbError::NotFound { id: id.value() });
                }
                id
            }
        };
        guard.commit()?;
        Ok(id)
    }

    /// Insert many vectors in one transaction on a dedicated connection.
    ///
    /// Every vector is validated before anything is written. Ids come back in
    /// input order.
    pub fn batch_insert(&self, raws: &[Vec<f32>]) -> DbResult<Vec<VectorId>> {
        for raw in raws {
            math::check_dimension(raw, self.config.dimension)?;
        }
        if raws.is_empty() {
            return Ok(Vec::new());
        }

        let prepared: Vec<Prepared> = raws.par_iter().map(|raw| Prepared::new(raw)).collect();
        let keys = self.index_keys(&prepared)?;

        let mut dedicated = self.store.dedicated()?;
        let guard = dedicated.write_immediate()?;
        let session = guard.session();
        let mut ids = Vec::with_capacity(prepared.len());
        for (p, key) in prepared.iter().zip(keys.iter()) {
            ids.push(session.insert(&p.record(key))?);
        }
        guard.commit()?;

        info!("Inserted {} vectors into '{}'", ids.len(), self.config.name);
        Ok(ids)
    }

    /// Delete a record. Returns whether it existed; deleting a missing id is
    /// not an error.
    pub fn delete(&mut self, id: VectorId) -> DbResult<bool> {
        let guard = self.store.write()?;
        let existed = guard.session().delete(id)?;
        guard.commit()?;
        Ok(existed)
    }

    /// Number of stored records.
    pub fn count(&self) -> DbResult<usize> {
        self.store.session().count()
    }

    fn index_key(&self, session: &Session<'_>, normalized: &[f32]) -> DbResult<IndexKey> {
        match self.config.strategy {
            IndexStrategy::None => Ok(IndexKey::None),
            IndexStrategy::Ivf => self.index.assign(session, normalized),
            IndexStrategy::Binary => Ok(lsh::assign(normalized)),
        }
    }

    fn index_keys(&self, prepared: &[Prepared]) -> DbResult<Vec<IndexKey>> {
        match self.config.strategy {
            IndexStrategy::None => Ok(vec![IndexKey::None; prepared.len()]),
            IndexStrategy::Ivf => {
                let centroids = self.cached_centroids()?;
                prepared
                    .par_iter()
                    .map(|p| {
                        crate::centroid::nearest_in(&centroids, &p.normalized)
                            .map(IndexKey::Centroid)
                    })
                    .collect()
            }
            IndexStrategy::Binary => Ok(prepared
                .par_iter()
                .map(|p| lsh::assign(&p.normalized))
                .collect()),
        }
    }

    fn cached_centroids(&self) -> DbResult<Vec<Centroid>> {
        let cache = self.index.cache();
        if cache.is_empty()? {
            cache.refresh(&self.store.session())?;
        }
        cache.snapshot()
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Fetch one record.
    pub fn get(&self, id: VectorId) -> DbResult<VectorRecord> {
        self.store
            .session()
            .get(id)?
            .ok_or(DbError::NotFound { id: id.value() })
    }

    /// Fetch records by id in ascending id order, skipping missing ids.
    pub fn select(&self, ids: &[VectorId]) -> DbResult<Vec<VectorRecord>> {
        self.store.session().select(ids)
    }

    /// Every record in ascending id order.
    pub fn select_all(&self) -> DbResult<Vec<VectorRecord>> {
        self.store.session().select_all()
    }

    /// Dot product of two stored raw vectors.
    pub fn dot_ids(&self, a: VectorId, b: VectorId) -> DbResult<f64> {
        let session = self.store.session();
        if let Some(d) = session.dot_stored(a, b)? {
            return Ok(d);
        }
        let missing = if session.get(a)?.is_none() { a } else { b };
        Err(DbError::NotFound {
            id: missing.value(),
        })
    }

    /// Dot product of a stored raw vector and `v`.
    pub fn dot_with(&self, id: VectorId, v: &[f32]) -> DbResult<f64> {
        math::check_dimension(v, self.config.dimension)?;
        self.store
            .session()
            .dot_with(id, v)?
            .ok_or(DbError::NotFound { id: id.value() })
    }

    // ------------------------------------------------------------------------
    // Query path
    // ------------------------------------------------------------------------

    /// The `n` stored vectors most similar to `query`, best first.
    pub fn search(&self, query: &[f32], n: usize) -> DbResult<Vec<SearchResult>> {
        math::check_dimension(query, self.config.dimension)?;
        if n == 0 {
            return Ok(Vec::new());
        }

        let session = self.store.session();
        let normalized = math::normalize(query, None);
        let candidates = match self.config.strategy {
            IndexStrategy::None => Candidates::All,
            IndexStrategy::Ivf => Candidates::Partition(self.index.nearest(&session, &normalized)?),
            IndexStrategy::Binary => lsh::candidates(&session, &self.config, &normalized, n)?,
        };

        let bounds = self
            .config
            .bounding_box
            .map(|t| math::bounding_box(&normalized, t));
        let bounds = bounds
            .as_ref()
            .map(|(lower, upper)| (lower.as_slice(), upper.as_slice()));

        let mut scores = session.score_against(&normalized, &candidates, bounds)?;
        debug!(
            "Scored {} candidates in '{}' for n={}",
            scores.len(),
            self.config.name,
            n
        );
        scores.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scores.truncate(n);

        let ids: Vec<VectorId> = scores.iter().map(|(id, _)| *id).collect();
        let mut raws: HashMap<VectorId, Vec<f32>> = session
            .select(&ids)?
            .into_iter()
            .map(|r| (r.id, r.raw))
            .collect();

        Ok(scores
            .into_iter()
            .filter_map(|(id, score)| {
                raws.remove(&id).map(|vector| SearchResult { id, score, vector })
            })
            .collect())
    }

    // ------------------------------------------------------------------------
    // Text
    // ------------------------------------------------------------------------

    /// Embed `texts` and insert them as one batch.
    pub fn insert_texts(&self, embedder: &dyn Embedder, texts: &[&str]) -> DbResult<Vec<VectorId>> {
        let vectors = embed_checked(embedder, texts, self.config.dimension)?;
        self.batch_insert(&vectors)
    }

    /// Embed `text` and search for it.
    pub fn search_text(
        &self,
        embedder: &dyn Embedder,
        text: &str,
        n: usize,
    ) -> DbResult<Vec<SearchResult>> {
        let mut vectors = embed_checked(embedder, &[text], self.config.dimension)?;
        let query = vectors
            .pop()
            .ok_or_else(|| DbError::Embedding {
                message: "embedder returned no vectors".to_string(),
            })?;
        self.search(&query, n)
    }

    // ------------------------------------------------------------------------
    // Index management
    // ------------------------------------------------------------------------

    /// Cluster the stored vectors and reassign every record.
    ///
    /// Runs in one transaction on a dedicated connection. Only IVF tables
    /// can be clustered.
    pub fn quantize(&self) -> DbResult<QuantizeReport> {
        self.require_ivf("quantize")?;

        let mut dedicated = self.store.dedicated()?;
        let guard = dedicated.write_immediate()?;
        let session = guard.session();
        let outcome = self.index.quantize(&session, &self.config)?;
        let mut meta = session.load_meta()?.ok_or_else(|| {
            DbError::inconsistent(format!("metadata for '{}' is missing", self.config.name))
        })?;
        meta.mark_clustered();
        session.write_meta(&meta)?;
        guard.commit()?;

        self.index.cache().replace(outcome.centroids)?;
        let report = outcome.report;
        if !report.converged {
            warn!(
                "Clustering '{}' stopped at the iteration cap ({})",
                self.config.name, report.iterations
            );
        }
        info!(
            "Clustered '{}' into {} centroids ({} vectors reassigned)",
            self.config.name, report.clusters, report.reassigned
        );
        Ok(report)
    }

    /// Recompute every record's centroid against the stored centroid set.
    pub fn reassign(&self) -> DbResult<usize> {
        self.require_ivf("reassign")?;

        let mut dedicated = self.store.dedicated()?;
        let guard = dedicated.write_immediate()?;
        let (centroids, n) = self.index.reassign(&guard.session())?;
        guard.commit()?;

        self.index.cache().replace(centroids)?;
        Ok(n)
    }

    /// Reload the centroid cache from storage. Returns the centroid count.
    pub fn refresh_centroids(&self) -> DbResult<usize> {
        self.index.cache().refresh(&self.store.session())
    }

    /// Stored centroids in id order.
    pub fn centroids(&self) -> DbResult<Vec<Centroid>> {
        self.store.session().centroids()
    }

    /// Where the table's index is in its lifecycle.
    pub fn index_state(&self) -> DbResult<IndexState> {
        let session = self.store.session();
        if !session.schema_exists()? {
            return Ok(IndexState::Uninitialized);
        }
        let Some(meta) = session.load_meta()? else {
            return Ok(IndexState::Uninitialized);
        };
        if self.config.strategy != IndexStrategy::Ivf {
            return Ok(IndexState::Clustered);
        }
        if session.centroid_count()? == 0 {
            return Ok(IndexState::Uninitialized);
        }
        if session.dangling_count()? > 0 {
            return Ok(IndexState::Stale);
        }
        Ok(if meta.clustered_at.is_some() {
            IndexState::Clustered
        } else {
            IndexState::Seeded
        })
    }

    fn require_ivf(&self, operation: &str) -> DbResult<()> {
        if self.config.strategy != IndexStrategy::Ivf {
            return Err(DbError::config(format!(
                "{} needs the ivf strategy, '{}' uses {}",
                operation, self.config.name, self.config.strategy
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for VectorTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorTable")
            .field("name", &self.config.name)
            .field("dimension", &self.config.dimension)
            .field("strategy", &self.config.strategy)
            .field("path", &self.store.path())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
