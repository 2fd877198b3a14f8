//! Integration tests for clustering, reassignment and index state.

mod common;

use common::{create_table, random_vectors, rng};
use sqlvec_db::{DbError, IndexState, IndexStrategy, TableConfig, VectorTable};
use std::collections::HashSet;
use tempfile::TempDir;

fn assert_no_dangling_keys(table: &VectorTable) {
    let centroids: HashSet<i64> = table.centroids().unwrap().iter().map(|c| c.id).collect();
    for record in table.select_all().unwrap() {
        let key = record
            .index_key
            .centroid()
            .expect("ivf record without centroid key");
        assert!(centroids.contains(&key), "record {} -> {}", record.id, key);
    }
}

#[test]
fn test_index_state_lifecycle() {
    let dir = TempDir::new().unwrap();
    let config = TableConfig::new("docs", 8).with_sample_size(50).with_seed(1);
    let mut table = VectorTable::open(dir.path().join("vectors.db"), config).unwrap();
    assert_eq!(table.index_state().unwrap(), IndexState::Uninitialized);

    table.initialize(true).unwrap();
    assert_eq!(table.index_state().unwrap(), IndexState::Seeded);

    table
        .batch_insert(&random_vectors(&mut rng(2), 200, 8))
        .unwrap();
    table.quantize().unwrap();
    assert_eq!(table.index_state().unwrap(), IndexState::Clustered);
}

#[test]
fn test_quantize_replaces_centroids_and_reassigns() {
    let config = TableConfig::new("docs", 8)
        .with_initial_centroids(2)
        .with_sample_size(100)
        .with_seed(3);
    let (_dir, table) = create_table(config);
    let seeded: Vec<i64> = table.centroids().unwrap().iter().map(|c| c.id).collect();

    table
        .batch_insert(&random_vectors(&mut rng(4), 1000, 8))
        .unwrap();
    let report = table.quantize().unwrap();

    assert_eq!(report.sampled, 100);
    assert_eq!(report.clusters, 10);
    assert_eq!(report.reassigned, 1000);
    assert!(report.iterations >= 1);

    let centroids = table.centroids().unwrap();
    assert_eq!(centroids.len(), 10);
    assert!(centroids.iter().all(|c| !seeded.contains(&c.id)));
    for c in &centroids {
        let norm: f32 = c.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
    assert_no_dangling_keys(&table);
}

#[test]
fn test_cluster_count_has_floor_of_one() {
    let (_dir, table) = create_table(TableConfig::new("docs", 4).with_seed(5));
    table
        .batch_insert(&random_vectors(&mut rng(6), 30, 4))
        .unwrap();
    let report = table.quantize().unwrap();
    assert_eq!(report.clusters, 1);
    assert_eq!(report.sampled, 30);
    assert_no_dangling_keys(&table);
}

#[test]
fn test_quantize_empty_table_keeps_centroids() {
    let (_dir, table) = create_table(TableConfig::new("docs", 4).with_initial_centroids(3));
    let before = table.centroids().unwrap();

    let err = table.quantize().unwrap_err();
    assert!(matches!(err, DbError::InconsistentIndexState { .. }));
    assert_eq!(table.centroids().unwrap(), before);
    assert_eq!(table.index_state().unwrap(), IndexState::Seeded);
}

#[test]
fn test_writes_after_quantize_use_new_centroids() {
    let (_dir, mut table) = create_table(
        TableConfig::new("docs", 8).with_sample_size(20).with_seed(7),
    );
    table
        .batch_insert(&random_vectors(&mut rng(8), 100, 8))
        .unwrap();
    table.quantize().unwrap();

    for v in random_vectors(&mut rng(9), 10, 8) {
        table.upsert(&v, None).unwrap();
    }
    assert_no_dangling_keys(&table);
    assert_eq!(table.index_state().unwrap(), IndexState::Clustered);
}

#[test]
fn test_reassign_repairs_stale_keys() {
    let (_dir, table) = create_table(
        TableConfig::new("docs", 8).with_sample_size(25).with_seed(10),
    );
    table
        .batch_insert(&random_vectors(&mut rng(11), 100, 8))
        .unwrap();
    table.quantize().unwrap();

    let sql = format!("UPDATE {} SET index_key = 999999", table.vectors_table());
    table.connection().execute(&sql, []).unwrap();
    assert_eq!(table.index_state().unwrap(), IndexState::Stale);

    assert_eq!(table.reassign().unwrap(), 100);
    assert_eq!(table.index_state().unwrap(), IndexState::Clustered);
    assert_no_dangling_keys(&table);
}

#[test]
fn test_refresh_centroids_reloads_cache() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vectors.db");
    let config = TableConfig::new("docs", 4).with_sample_size(10).with_seed(12);

    let mut writer = VectorTable::open(&path, config.clone()).unwrap();
    writer.initialize(true).unwrap();
    let mut reader = VectorTable::open(&path, config).unwrap();
    reader.initialize(true).unwrap();

    writer
        .batch_insert(&random_vectors(&mut rng(13), 40, 4))
        .unwrap();
    writer.quantize().unwrap();

    assert_eq!(reader.refresh_centroids().unwrap(), 4);
    let id = reader.upsert(&[0.5, -0.5, 0.5, -0.5], None).unwrap();
    let key = reader.get(id).unwrap().index_key.centroid().unwrap();
    assert!(reader.centroids().unwrap().iter().any(|c| c.id == key));
}

#[test]
fn test_non_ivf_tables_report_clustered() {
    for strategy in [IndexStrategy::None, IndexStrategy::Binary] {
        let (_dir, table) = create_table(TableConfig::new("docs", 4).with_strategy(strategy));
        assert_eq!(table.index_state().unwrap(), IndexState::Clustered);
        assert!(table.centroids().unwrap().is_empty());
    }
}
