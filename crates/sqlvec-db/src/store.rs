//! SQLite storage adapter.
//!
//! A [`SqliteStore`] is one logical session: a single connection to the
//! database file, with the scoring functions registered on it. Long-running
//! jobs open a second store on the same file with [`SqliteStore::dedicated`]
//! so they never share a transaction with the caller's session.
//!
//! ## Scoring pushdown
//!
//! Three deterministic scalar functions are registered on every connection:
//!
//! - `vec_dot(a, b)`: dot product of two `f32` blobs (REAL)
//! - `vec_in_box(v, lower, upper)`: 1 when every component of `v` is inside
//!   the box (INTEGER)
//! - `hamming(a, b)`: differing bits between two binary codes (INTEGER)
//!
//! so candidate scoring and Hamming ranking run inside SQLite and only ids and
//! scores cross into the process.

use crate::codec::{decode_f32s, encode_f32s};
use crate::error::{DbError, DbResult};
use crate::schema::{TableMeta, TableNames, TABLE_META_KEY};
use crate::types::{Centroid, IndexKey, VectorId, VectorRecord};
use chrono::{DateTime, Utc};
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Savepoint, Transaction,
    TransactionBehavior,
};
use sqlvec_core::{math, BinaryCode};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};

/// Largest number of ids bound into a single `IN (...)` list.
const ID_CHUNK: usize = 500;

// ============================================================================
// StoreConfig
// ============================================================================

/// Where the database lives and how sessions wait on locks.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite database file.
    pub path: PathBuf,

    /// Busy timeout applied to every connection.
    pub busy_timeout_ms: u64,
}

impl StoreConfig {
    /// Create a new config for the database at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: sqlvec_core::config::DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    /// Set the busy timeout.
    pub fn with_busy_timeout_ms(mut self, ms: u64) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

// ============================================================================
// SqliteStore
// ============================================================================

/// One session against a table's physical storage.
pub struct SqliteStore {
    config: StoreConfig,
    names: TableNames,
    conn: Connection,
}

impl SqliteStore {
    /// Open a connection to the database file.
    pub fn open(config: StoreConfig, names: TableNames) -> DbResult<Self> {
        debug!("Opening SqliteStore at {:?} for '{}'", config.path, names.name);
        let conn = open_connection(&config.path, config.busy_timeout_ms)?;
        Ok(Self {
            config,
            names,
            conn,
        })
    }

    /// Open an independent session on the same database.
    pub fn dedicated(&self) -> DbResult<Self> {
        Self::open(self.config.clone(), self.names.clone())
    }

    /// Physical table names.
    pub fn names(&self) -> &TableNames {
        &self.names
    }

    /// Database file path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Underlying connection, for callers that manage their own transactions.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Read access outside any explicit transaction.
    pub fn session(&self) -> Session<'_> {
        Session {
            conn: &self.conn,
            names: &self.names,
        }
    }

    /// Start an atomic write.
    ///
    /// Uses a savepoint, so it nests inside a transaction the caller already
    /// opened on this connection.
    pub fn write(&mut self) -> DbResult<WriteGuard<'_>> {
        let sp = self.conn.savepoint()?;
        Ok(WriteGuard {
            inner: Guard::Savepoint(sp),
            names: &self.names,
        })
    }

    /// Start an immediate transaction. Meant for dedicated sessions running
    /// batch jobs: the write lock is taken up front so a read-then-write job
    /// cannot fail halfway on lock upgrade.
    pub fn write_immediate(&mut self) -> DbResult<WriteGuard<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(WriteGuard {
            inner: Guard::Transaction(tx),
            names: &self.names,
        })
    }
}

/// Open a connection with pragmas and scoring functions installed.
fn open_connection(path: &Path, busy_timeout_ms: u64) -> DbResult<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
    // WAL lets a dedicated writer run while other sessions read
    let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    register_functions(&conn)?;
    Ok(conn)
}

/// Register `vec_dot`, `vec_in_box` and `hamming` on `conn`.
pub fn register_functions(conn: &Connection) -> DbResult<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function("vec_dot", 2, flags, |ctx| {
        let a = blob_arg(ctx, 0)?;
        let b = blob_arg(ctx, 1)?;
        math::dot_f64(&a, &b).map_err(user_error)
    })?;

    conn.create_scalar_function("vec_in_box", 3, flags, |ctx| {
        let v = blob_arg(ctx, 0)?;
        let lower = blob_arg(ctx, 1)?;
        let upper = blob_arg(ctx, 2)?;
        Ok(math::within_box(&v, &lower, &upper))
    })?;

    conn.create_scalar_function("hamming", 2, flags, |ctx| {
        match (ctx.get_raw(0), ctx.get_raw(1)) {
            (ValueRef::Blob(a), ValueRef::Blob(b)) => {
                Ok(i64::from(sqlvec_core::binary::hamming_distance(a, b)))
            }
            // Rows without a code sort after every real candidate
            _ => Ok(i64::MAX),
        }
    })?;

    Ok(())
}

fn blob_arg(ctx: &Context<'_>, idx: usize) -> rusqlite::Result<Vec<f32>> {
    let bytes = ctx.get_raw(idx).as_blob().map_err(user_error)?;
    decode_f32s(bytes).map_err(user_error)
}

fn user_error<E>(err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::UserFunctionError(Box::new(err))
}

// ============================================================================
// WriteGuard
// ============================================================================

enum Guard<'a> {
    Savepoint(Savepoint<'a>),
    Transaction(Transaction<'a>),
}

/// An open atomic write. Rolls back on drop unless committed.
pub struct WriteGuard<'a> {
    inner: Guard<'a>,
    names: &'a TableNames,
}

impl WriteGuard<'_> {
    /// Statements running inside this write.
    pub fn session(&self) -> Session<'_> {
        Session {
            conn: self,
            names: self.names,
        }
    }

    /// Make the write durable.
    pub fn commit(self) -> DbResult<()> {
        match self.inner {
            Guard::Savepoint(sp) => sp.commit()?,
            Guard::Transaction(tx) => tx.commit()?,
        }
        Ok(())
    }
}

impl Deref for WriteGuard<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match &self.inner {
            Guard::Savepoint(sp) => &**sp,
            Guard::Transaction(tx) => &**tx,
        }
    }
}

// ============================================================================
// Candidates
// ============================================================================

/// Which records a query scores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidates {
    /// Every record.
    All,
    /// Records assigned to one centroid.
    Partition(i64),
    /// An explicit id list.
    Ids(Vec<VectorId>),
}

/// Fields written for one record.
#[derive(Debug, Clone)]
pub struct NewRecord<'a> {
    pub raw: &'a [f32],
    pub normalized: &'a [f32],
    pub magnitude: f32,
    pub index_key: &'a IndexKey,
}

// ============================================================================
// Session
// ============================================================================

/// Statements against one table, bound to a connection or open transaction.
#[derive(Clone, Copy)]
pub struct Session<'a> {
    conn: &'a Connection,
    names: &'a TableNames,
}

impl<'a> Session<'a> {
    /// Physical table names.
    pub fn names(&self) -> &TableNames {
        self.names
    }

    // ------------------------------------------------------------------------
    // Schema
    // ------------------------------------------------------------------------

    /// Run the DDL for this table.
    pub fn create_schema(&self, if_not_exists: bool) -> DbResult<()> {
        for stmt in self.names.create_statements(if_not_exists) {
            trace!("{}", stmt);
            self.conn.execute_batch(&stmt)?;
        }
        Ok(())
    }

    /// Drop every physical table.
    pub fn drop_schema(&self) -> DbResult<()> {
        for stmt in self.names.drop_statements() {
            self.conn.execute_batch(&stmt)?;
        }
        Ok(())
    }

    /// Whether the vectors table exists.
    pub fn schema_exists(&self) -> DbResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![self.names.vectors],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Whether the metadata table exists.
    fn meta_table_exists(&self) -> DbResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![self.names.meta],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Stored table metadata, if the table has been initialized.
    pub fn load_meta(&self) -> DbResult<Option<TableMeta>> {
        if !self.meta_table_exists()? {
            return Ok(None);
        }
        let sql = format!("SELECT value FROM {} WHERE key = ?1", self.names.meta);
        let json: Option<String> = self
            .conn
            .query_row(&sql, params![TABLE_META_KEY], |row| row.get(0))
            .optional()?;
        json.map(|j| serde_json::from_str(&j).map_err(DbError::from))
            .transpose()
    }

    /// Persist table metadata.
    pub fn write_meta(&self, meta: &TableMeta) -> DbResult<()> {
        let sql = format!(
            "INSERT INTO {} (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            self.names.meta
        );
        let json = serde_json::to_string(meta)?;
        self.conn.execute(&sql, params![TABLE_META_KEY, json])?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------------

    /// Number of stored records.
    pub fn count(&self) -> DbResult<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.names.vectors);
        let n: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Insert a record and return its new id.
    pub fn insert(&self, record: &NewRecord<'_>) -> DbResult<VectorId> {
        let sql = format!(
            "INSERT INTO {} (raw, normalized, magnitude, index_key, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            self.names.vectors
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        stmt.execute(params![
            encode_f32s(record.raw),
            encode_f32s(record.normalized),
            f64::from(record.magnitude),
            index_key_value(record.index_key),
            Utc::now(),
        ])?;
        Ok(VectorId(self.conn.last_insert_rowid()))
    }

    /// Overwrite an existing record. Returns false if `id` does not exist.
    pub fn update(&self, id: VectorId, record: &NewRecord<'_>) -> DbResult<bool> {
        let sql = format!(
            "UPDATE {} SET raw = ?1, normalized = ?2, magnitude = ?3, index_key = ?4
             WHERE id = ?5",
            self.names.vectors
        );
        let changed = self.conn.prepare_cached(&sql)?.execute(params![
            encode_f32s(record.raw),
            encode_f32s(record.normalized),
            f64::from(record.magnitude),
            index_key_value(record.index_key),
            id.value(),
        ])?;
        Ok(changed > 0)
    }

    /// Replace only the index key of a record.
    pub fn set_index_key(&self, id: VectorId, key: &IndexKey) -> DbResult<()> {
        let sql = format!(
            "UPDATE {} SET index_key = ?1 WHERE id = ?2",
            self.names.vectors
        );
        self.conn
            .prepare_cached(&sql)?
            .execute(params![index_key_value(key), id.value()])?;
        Ok(())
    }

    /// Delete a record. Returns whether it existed.
    pub fn delete(&self, id: VectorId) -> DbResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", self.names.vectors);
        let changed = self.conn.execute(&sql, params![id.value()])?;
        Ok(changed > 0)
    }

    /// Fetch one record.
    pub fn get(&self, id: VectorId) -> DbResult<Option<VectorRecord>> {
        let sql = format!(
            "SELECT id, raw, normalized, magnitude, index_key, created_at FROM {} WHERE id = ?1",
            self.names.vectors
        );
        let row = self
            .conn
            .query_row(&sql, params![id.value()], RawRecord::from_row)
            .optional()?;
        row.map(RawRecord::into_record).transpose()
    }

    /// Fetch records by id, ordered by id. Missing ids are skipped.
    pub fn select(&self, ids: &[VectorId]) -> DbResult<Vec<VectorRecord>> {
        let mut records = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(ID_CHUNK) {
            let sql = format!(
                "SELECT id, raw, normalized, magnitude, index_key, created_at FROM {}
                 WHERE id IN ({})",
                self.names.vectors,
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter().map(|id| id.value())), |row| {
                RawRecord::from_row(row)
            })?;
            for row in rows {
                records.push(row?.into_record()?);
            }
        }
        records.sort_by_key(|r| r.id);
        records.dedup_by_key(|r| r.id);
        Ok(records)
    }

    /// Every record, ordered by id.
    pub fn select_all(&self) -> DbResult<Vec<VectorRecord>> {
        let sql = format!(
            "SELECT id, raw, normalized, magnitude, index_key, created_at FROM {} ORDER BY id",
            self.names.vectors
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], RawRecord::from_row)?;
        let records = rows
            .map(|row| row?.into_record())
            .collect::<DbResult<Vec<_>>>()?;
        Ok(records)
    }

    /// Every record id, ascending.
    pub fn ids(&self) -> DbResult<Vec<VectorId>> {
        let sql = format!("SELECT id FROM {} ORDER BY id", self.names.vectors);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        let ids = rows
            .map(|r| r.map(VectorId).map_err(DbError::from))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(ids)
    }

    /// Normalized vectors for `ids`, in id order.
    pub fn normalized_for(&self, ids: &[VectorId]) -> DbResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(ID_CHUNK) {
            let sql = format!(
                "SELECT normalized FROM {} WHERE id IN ({}) ORDER BY id",
                self.names.vectors,
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter().map(|id| id.value())), |row| {
                row.get::<_, Vec<u8>>(0)
            })?;
            for blob in rows {
                out.push(decode_f32s(&blob?)?);
            }
        }
        Ok(out)
    }

    /// Up to `limit` `(id, normalized)` pairs with id greater than `after`.
    pub fn normalized_page(
        &self,
        after: Option<VectorId>,
        limit: usize,
    ) -> DbResult<Vec<(VectorId, Vec<f32>)>> {
        let sql = format!(
            "SELECT id, normalized FROM {} WHERE id > ?1 ORDER BY id LIMIT ?2",
            self.names.vectors
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let after = after.map(|id| id.value()).unwrap_or(i64::MIN);
        let rows = stmt.query_map(params![after, limit as i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;
        let page = rows
            .map(|r| {
                let (id, blob) = r?;
                Ok((VectorId(id), decode_f32s(&blob)?))
            })
            .collect::<DbResult<Vec<_>>>()?;
        Ok(page)
    }

    // ------------------------------------------------------------------------
    // Scoring
    // ------------------------------------------------------------------------

    /// Dot product of `query_normalized` with each candidate's normalized vector.
    ///
    /// With `bounds`, candidates whose normalized vector leaves the
    /// `(lower, upper)` box are skipped. Results come back in id order.
    pub fn score_against(
        &self,
        query_normalized: &[f32],
        candidates: &Candidates,
        bounds: Option<(&[f32], &[f32])>,
    ) -> DbResult<Vec<(VectorId, f32)>> {
        let mut base: Vec<Value> = vec![Value::Blob(encode_f32s(query_normalized))];
        let box_clause = match bounds {
            Some((lower, upper)) => {
                base.push(Value::Blob(encode_f32s(lower)));
                base.push(Value::Blob(encode_f32s(upper)));
                " AND vec_in_box(normalized, ?, ?)"
            }
            None => "",
        };

        let select = format!(
            "SELECT id, vec_dot(normalized, ?) FROM {}",
            self.names.vectors
        );

        match candidates {
            Candidates::All => {
                let sql = format!("{} WHERE 1 = 1{} ORDER BY id", select, box_clause);
                self.run_scores(&sql, base)
            }
            Candidates::Partition(centroid) => {
                let sql = format!(
                    "{} WHERE index_key = ?{} ORDER BY id",
                    select, box_clause
                );
                // Partition id binds between the query blob and the box
                let mut values = vec![base[0].clone(), Value::Integer(*centroid)];
                values.extend(base.into_iter().skip(1));
                self.run_scores(&sql, values)
            }
            Candidates::Ids(ids) => {
                let mut scores = Vec::with_capacity(ids.len());
                for chunk in ids.chunks(ID_CHUNK) {
                    let sql = format!(
                        "{} WHERE id IN ({}){} ORDER BY id",
                        select,
                        placeholders(chunk.len()),
                        box_clause
                    );
                    let mut values = vec![base[0].clone()];
                    values.extend(chunk.iter().map(|id| Value::Integer(id.value())));
                    values.extend(base.iter().skip(1).cloned());
                    scores.extend(self.run_scores(&sql, values)?);
                }
                scores.sort_by_key(|(id, _)| *id);
                scores.dedup_by_key(|(id, _)| *id);
                Ok(scores)
            }
        }
    }

    fn run_scores(&self, sql: &str, values: Vec<Value>) -> DbResult<Vec<(VectorId, f32)>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((VectorId(row.get(0)?), row.get::<_, f64>(1)? as f32))
        })?;
        let scores = rows
            .map(|r| r.map_err(DbError::from))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(scores)
    }

    /// The records whose codes are closest to `code`, in distance then id
    /// order.
    ///
    /// Takes the `limit` nearest, widened to every record tied with the last
    /// of them, so a record sharing the query's code is never cut off.
    pub fn hamming_candidates(&self, code: &BinaryCode, limit: usize) -> DbResult<Vec<VectorId>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let offset = i64::try_from(limit - 1).unwrap_or(i64::MAX);
        let cutoff_sql = format!(
            "SELECT hamming(index_key, ?1) AS d FROM {} ORDER BY d LIMIT 1 OFFSET ?2",
            self.names.vectors
        );
        let cutoff: Option<i64> = self
            .conn
            .prepare_cached(&cutoff_sql)?
            .query_row(params![code.as_bytes(), offset], |row| row.get(0))
            .optional()?;
        // Fewer than `limit` rows: all of them qualify
        let cutoff = cutoff.unwrap_or(i64::MAX);

        let sql = format!(
            "SELECT id, hamming(index_key, ?1) AS d FROM {} WHERE d <= ?2 ORDER BY d, id",
            self.names.vectors
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![code.as_bytes(), cutoff], |row| row.get::<_, i64>(0))?;
        let ids = rows
            .map(|r| r.map(VectorId).map_err(DbError::from))
            .collect::<DbResult<Vec<_>>>()?;
        trace!(
            "Hamming shortlist: {} rows within distance {} (limit {})",
            ids.len(),
            cutoff,
            limit
        );
        Ok(ids)
    }

    /// Dot product of two stored raw vectors, or `None` if either is missing.
    pub fn dot_stored(&self, a: VectorId, b: VectorId) -> DbResult<Option<f64>> {
        let sql = format!(
            "SELECT vec_dot(a.raw, b.raw) FROM {v} a, {v} b WHERE a.id = ?1 AND b.id = ?2",
            v = self.names.vectors
        );
        Ok(self
            .conn
            .query_row(&sql, params![a.value(), b.value()], |row| row.get(0))
            .optional()?)
    }

    /// Dot product of a stored raw vector and `v`, or `None` if missing.
    pub fn dot_with(&self, id: VectorId, v: &[f32]) -> DbResult<Option<f64>> {
        let sql = format!(
            "SELECT vec_dot(raw, ?2) FROM {} WHERE id = ?1",
            self.names.vectors
        );
        Ok(self
            .conn
            .query_row(&sql, params![id.value(), encode_f32s(v)], |row| row.get(0))
            .optional()?)
    }

    // ------------------------------------------------------------------------
    // Centroids
    // ------------------------------------------------------------------------

    /// Stored centroids in id order.
    pub fn centroids(&self) -> DbResult<Vec<Centroid>> {
        let sql = format!("SELECT id, vector FROM {} ORDER BY id", self.names.centroids);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;
        let centroids = rows
            .map(|r| {
                let (id, blob) = r?;
                Ok(Centroid {
                    id,
                    vector: decode_f32s(&blob)?,
                })
            })
            .collect::<DbResult<Vec<_>>>()?;
        Ok(centroids)
    }

    /// Number of stored centroids.
    pub fn centroid_count(&self) -> DbResult<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.names.centroids);
        let n: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Remove every centroid.
    pub fn clear_centroids(&self) -> DbResult<usize> {
        let sql = format!("DELETE FROM {}", self.names.centroids);
        Ok(self.conn.execute(&sql, [])?)
    }

    /// Insert a centroid and return its id.
    pub fn insert_centroid(&self, vector: &[f32]) -> DbResult<i64> {
        let sql = format!(
            "INSERT INTO {} (vector, created_at) VALUES (?1, ?2)",
            self.names.centroids
        );
        self.conn
            .prepare_cached(&sql)?
            .execute(params![encode_f32s(vector), Utc::now()])?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Records whose index key is not an existing centroid id.
    pub fn dangling_count(&self) -> DbResult<usize> {
        let sql = format!(
            "SELECT COUNT(*) FROM {v} WHERE index_key IS NULL
                OR index_key NOT IN (SELECT id FROM {c})",
            v = self.names.vectors,
            c = self.names.centroids
        );
        let n: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

// ============================================================================
// Row helpers
// ============================================================================

/// A record row before blob decoding.
struct RawRecord {
    id: i64,
    raw: Vec<u8>,
    normalized: Vec<u8>,
    magnitude: f64,
    index_key: Value,
    created_at: DateTime<Utc>,
}

impl RawRecord {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            raw: row.get(1)?,
            normalized: row.get(2)?,
            magnitude: row.get(3)?,
            index_key: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_record(self) -> DbResult<VectorRecord> {
        let index_key = match self.index_key {
            Value::Null => IndexKey::None,
            Value::Integer(id) => IndexKey::Centroid(id),
            Value::Blob(bytes) => IndexKey::Code(BinaryCode::from_bytes(bytes)),
            other => {
                return Err(DbError::storage(format!(
                    "vector {} has an unreadable index key: {:?}",
                    self.id, other
                )))
            }
        };
        Ok(VectorRecord {
            id: VectorId(self.id),
            raw: decode_f32s(&self.raw)?,
            normalized: decode_f32s(&self.normalized)?,
            magnitude: self.magnitude as f32,
            index_key,
            created_at: self.created_at,
        })
    }
}

fn index_key_value(key: &IndexKey) -> Value {
    match key {
        IndexKey::None => Value::Null,
        IndexKey::Centroid(id) => Value::Integer(*id),
        IndexKey::Code(code) => Value::Blob(code.as_bytes().to_vec()),
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

// ============================================================================
// Tests
// ============================================================================
