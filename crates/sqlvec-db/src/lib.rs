//! # sqlvec-db
//!
//! Approximate nearest-neighbor vector tables on SQLite.
//!
//! This crate owns everything that touches the database: the physical
//! schema, the scoring functions registered on each connection, the centroid
//! (IVF) and binary (LSH) indexes, and the [`VectorTable`] facade that ties
//! them to a [`TableConfig`].
//!
//! ## Architecture
//!
//! ```text
//! VectorTable (write path, query path, index management)
//!     ├── centroid  (IVF assignment, k-means clustering, centroid cache)
//!     ├── lsh       (sign-bit codes, Hamming prefilter)
//!     └── store     (SQLite sessions, DDL, vec_dot / vec_in_box / hamming)
//!            ↓
//!        sqlvec-core (math, codes, k-means, config)
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use sqlvec_db::{TableConfig, VectorTable};
//!
//! let mut table = VectorTable::open("vectors.db", TableConfig::new("docs", 3))?;
//! table.initialize(true)?;
//! table.batch_insert(&[vec![1.0, 2.0, 3.0], vec![3.0, 2.0, 1.0]])?;
//! table.quantize()?;
//!
//! for hit in table.search(&[1.0, 2.0, 3.0], 5)? {
//!     println!("{} {:.3}", hit.id, hit.score);
//! }
//! # Ok::<(), sqlvec_db::DbError>(())
//! ```

pub mod centroid;
pub mod codec;
pub mod error;
pub mod lsh;
pub mod schema;
pub mod store;
pub mod table;
pub mod types;

pub use centroid::{CentroidCache, CentroidIndex};
pub use error::{DbError, DbResult};
pub use schema::{TableCompatibility, TableMeta, TableNames};
pub use store::{SqliteStore, StoreConfig};
pub use table::VectorTable;
pub use types::{
    Centroid, IndexKey, IndexState, QuantizeReport, SearchResult, VectorId, VectorRecord,
};

pub use sqlvec_core::{math, BinaryCode, Embedder, IndexStrategy, TableConfig};
