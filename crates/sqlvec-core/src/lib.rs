//! # sqlvec-core
//!
//! Storage-independent building blocks for sqlvec vector tables.
//!
//! This crate holds everything that does not need a database connection, so
//! the math and clustering code can be tested (and benchmarked) without
//! SQLite in the loop:
//!
//! - `math`: magnitude, normalization, dot product, cosine, bounding boxes
//! - `binary`: sign-bit [`BinaryCode`]s and Hamming distance
//! - `kmeans`: Lloyd's algorithm over normalized samples
//! - `config`: the typed [`TableConfig`] and [`IndexStrategy`]
//! - `embed`: the [`Embedder`] boundary for text-to-vector models
//!
//! ## Architecture
//!
//! ```text
//! caller → sqlvec-db (VectorTable, SQLite adapter)
//!               ↓
//!          sqlvec-core (math, codes, k-means, config)
//! ```
//!
//! ## Usage
//!
//! ```
//! use sqlvec_core::math::{dot, normalize};
//!
//! assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap(), 32.0);
//! assert_eq!(normalize(&[3.0, 4.0], None), vec![0.6, 0.8]);
//! ```

pub mod binary;
pub mod config;
pub mod embed;
pub mod error;
pub mod kmeans;
pub mod math;

pub use binary::BinaryCode;
pub use config::{IndexStrategy, TableConfig};
pub use embed::Embedder;
pub use error::{CoreError, CoreResult};
pub use kmeans::{KMeans, KMeansFit};
