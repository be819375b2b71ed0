//! Integration tests for file ingestion and the catalog.
//!
//! These tests drive the [`Engine`] end to end with files on disk:
//! - Species split into datasources and catalog registration
//! - Content-hash deduplication and overwrite
//! - Per-file failure isolation
//! - Recursive folder ingestion
//! - Source ranking and deletion

use alopex_aeris::ingest::hash_content;
use alopex_aeris::store::{keys, StoreResult};
use alopex_aeris::{
    AerisConfig, AerisError, Bucket, DataType, Daterange, Engine, IngestRequest, MemoryStore,
    ObjectStore, StoreError,
};
use chrono::{TimeZone, Utc};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const CRDS_248M: &str = "\
# Picarro G2401
time,co2,co2_stdev,ch4,ch4_stdev
2019-01-01T00:00:00,410.1,0.1,1950.1,0.5
2019-01-01T01:00:00,410.4,0.2,1950.9,0.4
2019-01-01T02:00:00,410.9,0.1,1951.3,nan
";

const CRDS_108M: &str = "\
time,co2,co2_stdev
2019-01-01T00:00:00,411.5,0.3
2019-01-01T01:00:00,411.8,0.3
";

fn engine() -> Engine {
    Engine::with_bucket(Bucket::in_memory("obs"), AerisConfig::default()).unwrap()
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn utc(y: i32, m: u32, d: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

// ============================================================================
// Ingestion
// ============================================================================

#[test]
fn test_ingest_splits_species_into_datasources() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(temp_dir.path(), "bsd.picarro.1minute.248m.dat", CRDS_248M);
    let mut engine = engine();

    let report = engine
        .read_file(&IngestRequest::new(DataType::Crds).with_path(&path))
        .unwrap();
    assert!(report.is_success());
    let species = &report.ingested["bsd.picarro.1minute.248m.dat"];
    assert_eq!(species.keys().collect::<Vec<_>>(), vec!["ch4", "co2"]);

    let co2 = species["co2"];
    assert_eq!(
        engine.catalog().datasource_id("bsd.picarro.1minute.248m_co2"),
        Some(co2)
    );
    assert_eq!(engine.catalog().ids_for_type(DataType::Crds).len(), 2);
    assert!(engine
        .catalog()
        .ingested_as(&hash_content(CRDS_248M.as_bytes()))
        .is_some());

    let ds = engine.datasource(&co2, false).unwrap();
    assert_eq!(ds.site(), "bsd");
    assert_eq!(ds.inlet(), Some("248m"));
    assert_eq!(ds.metadata().get("time_resolution"), Some("1_minute"));
    assert_eq!(ds.metadata().get("instrument"), Some("picarro"));
    let table = ds.segments().values().next().unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.column_count(), 2);
    assert!(table.column("ch4").is_none());
}

#[test]
fn test_catalog_survives_engine_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(temp_dir.path(), "bsd.picarro.1minute.248m.dat", CRDS_248M);
    let config = AerisConfig::default().with_local_store(temp_dir.path().join("store"));

    let id = {
        let mut engine = Engine::open(config.clone()).unwrap();
        let report = engine
            .read_file(&IngestRequest::new(DataType::Crds).with_path(&path))
            .unwrap();
        report.ingested["bsd.picarro.1minute.248m.dat"]["co2"]
    };

    let engine = Engine::open(config).unwrap();
    assert!(engine.catalog().contains(&id));
    assert_eq!(engine.datasource(&id, true).unwrap().species(), Some("co2"));
}

#[test]
fn test_duplicate_content_is_refused_unless_overwriting() {
    let temp_dir = TempDir::new().unwrap();
    let first = write(temp_dir.path(), "bsd.picarro.1minute.248m.dat", CRDS_248M);
    let renamed = write(temp_dir.path(), "copy.dat", CRDS_248M);
    let mut engine = engine();

    engine
        .read_file(&IngestRequest::new(DataType::Crds).with_path(&first))
        .unwrap();

    let hashes = engine.catalog().data().file_hashes.clone();
    assert_eq!(hashes.len(), 1);

    let report = engine
        .read_file(&IngestRequest::new(DataType::Crds).with_path(&renamed))
        .unwrap();
    assert!(report.ingested.is_empty());
    assert!(report.failed["copy.dat"].contains("bsd.picarro.1minute.248m.dat"));
    assert_eq!(engine.catalog().datasource_ids().count(), 2);
    assert_eq!(engine.catalog().data().file_hashes, hashes);

    let report = engine
        .read_file(
            &IngestRequest::new(DataType::Crds)
                .with_path(&first)
                .with_overwrite(true),
        )
        .unwrap();
    assert!(report.is_success());
    let co2 = report.ingested["bsd.picarro.1minute.248m.dat"]["co2"];
    let ds = engine.datasource(&co2, true).unwrap();
    assert_eq!(ds.versions().len(), 2);
    assert_eq!(engine.catalog().datasource_ids().count(), 2);
}

#[test]
fn test_failed_file_does_not_block_others() {
    let temp_dir = TempDir::new().unwrap();
    let bad = write(
        temp_dir.path(),
        "bsd.picarro.1minute.42m.dat",
        "time,co2\n2019-01-01T00:00:00,not-a-number\n",
    );
    let good = write(temp_dir.path(), "bsd.picarro.1minute.248m.dat", CRDS_248M);
    let missing = temp_dir.path().join("absent.dat");
    let mut engine = engine();

    let report = engine
        .read_file(&IngestRequest::new(DataType::Crds).with_paths([bad, good, missing]))
        .unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 2);
    assert!(report.failed.contains_key("bsd.picarro.1minute.42m.dat"));
    assert!(report.failed.contains_key("absent.dat"));
    assert_eq!(report.ingested.len(), 1);

    assert!(engine
        .catalog()
        .datasource_id("bsd.picarro.1minute.42m_co2")
        .is_none());
    let bad_hash = hash_content(b"time,co2\n2019-01-01T00:00:00,not-a-number\n");
    assert!(engine.catalog().ingested_as(&bad_hash).is_none());
}

#[test]
fn test_site_override_wins_over_filename() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(temp_dir.path(), "bsd.picarro.1minute.248m.dat", CRDS_108M);
    let mut engine = engine();

    let report = engine
        .read_file(
            &IngestRequest::new(DataType::Crds)
                .with_path(&path)
                .with_site("TAC")
                .with_network("DECC"),
        )
        .unwrap();
    let id = report.ingested["bsd.picarro.1minute.248m.dat"]["co2"];
    let ds = engine.datasource(&id, true).unwrap();
    assert_eq!(ds.site(), "tac");
    assert_eq!(ds.metadata().get("network"), Some("decc"));
}

#[test]
fn test_read_folder_walks_subdirectories() {
    let temp_dir = TempDir::new().unwrap();
    let nested = temp_dir.path().join("2019").join("jan");
    fs::create_dir_all(&nested).unwrap();
    write(temp_dir.path(), "bsd.picarro.1minute.248m.dat", CRDS_248M);
    write(&nested, "bsd.picarro.1minute.108m.dat", CRDS_108M);
    write(&nested, "notes.txt", "not data");
    let mut engine = engine();

    let report = engine
        .read_folder(temp_dir.path(), ".dat", &IngestRequest::new(DataType::Crds))
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.ingested.len(), 2);
    assert_eq!(engine.catalog().datasource_ids().count(), 3);

    let empty = TempDir::new().unwrap();
    let err = engine
        .read_folder(empty.path(), "dat", &IngestRequest::new(DataType::Crds))
        .unwrap_err();
    assert!(matches!(err, AerisError::NotFound { .. }));
}

// ============================================================================
// Ranking
// ============================================================================

fn two_inlets(engine: &mut Engine, dir: &Path) -> (uuid::Uuid, uuid::Uuid) {
    let high = write(dir, "bsd.picarro.1minute.248m.dat", CRDS_248M);
    let low = write(dir, "bsd.picarro.1minute.108m.dat", CRDS_108M);
    let report = engine
        .read_file(&IngestRequest::new(DataType::Crds).with_paths([high, low]))
        .unwrap();
    (
        report.ingested["bsd.picarro.1minute.248m.dat"]["co2"],
        report.ingested["bsd.picarro.1minute.108m.dat"]["co2"],
    )
}

#[test]
fn test_get_sources_keys_by_inlet() {
    let temp_dir = TempDir::new().unwrap();
    let mut engine = engine();
    let (high, low) = two_inlets(&mut engine, temp_dir.path());

    let sources = engine.get_sources("BSD", "CO2").unwrap();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources["bsd_co2_248m"].uuid, high);
    assert_eq!(sources["bsd_co2_108m"].uuid, low);
    assert_eq!(sources["bsd_co2_108m"].rank, None);

    assert!(engine.get_sources("bsd", "n2o").unwrap().is_empty());
    assert!(matches!(
        engine.get_sources("bs", "co2"),
        Err(AerisError::Validation(_))
    ));
}

#[test]
fn test_primary_source_follows_tiers() {
    let temp_dir = TempDir::new().unwrap();
    let mut engine = engine();
    let (high, low) = two_inlets(&mut engine, temp_dir.path());

    engine
        .set_rank(&high, 1, Daterange::new(utc(2019, 1, 1), utc(2019, 3, 1)).unwrap())
        .unwrap();
    engine
        .set_rank(&low, 2, Daterange::new(utc(2019, 1, 1), utc(2019, 12, 31)).unwrap())
        .unwrap();

    assert_eq!(
        engine.primary_source("bsd", "co2", utc(2019, 2, 1)).unwrap(),
        Some(high)
    );
    assert_eq!(
        engine.primary_source("bsd", "co2", utc(2019, 6, 1)).unwrap(),
        Some(low)
    );
    assert_eq!(
        engine.primary_source("bsd", "co2", utc(2021, 1, 1)).unwrap(),
        None
    );

    engine.reload_catalog().unwrap();
    assert_eq!(engine.get_sources("bsd", "co2").unwrap()["bsd_co2_248m"].rank, Some(1));
}

#[test]
fn test_set_rank_rejects_bad_input() {
    let temp_dir = TempDir::new().unwrap();
    let mut engine = engine();
    let (high, _) = two_inlets(&mut engine, temp_dir.path());
    let range = Daterange::new(utc(2019, 1, 1), utc(2019, 2, 1)).unwrap();

    assert!(matches!(
        engine.set_rank(&high, 0, range),
        Err(AerisError::Validation(_))
    ));
    assert!(matches!(
        engine.set_rank(&uuid::Uuid::new_v4(), 1, range),
        Err(AerisError::NotFound { .. })
    ));
    assert!(engine.catalog().rank_data(&high).is_none());
}

// ============================================================================
// Deletion
// ============================================================================

#[test]
fn test_delete_removes_datasource_and_catalog_entry() {
    let temp_dir = TempDir::new().unwrap();
    let mut engine = engine();
    let (high, low) = two_inlets(&mut engine, temp_dir.path());
    let keys = engine.datasource(&high, true).unwrap().data_keys();

    engine.delete(&high).unwrap();

    assert!(!engine.catalog().contains(&high));
    assert!(engine.catalog().contains(&low));
    assert!(matches!(
        engine.datasource(&high, true),
        Err(AerisError::NotFound { .. })
    ));
    for key in keys {
        assert!(!engine.bucket().exists(&key).unwrap());
    }
    assert!(matches!(engine.delete(&high), Err(AerisError::NotFound { .. })));
}

// ============================================================================
// Partial failure and retry
// ============================================================================

/// Memory store that refuses the n-th descriptor write, once.
#[derive(Debug)]
struct FailingDescriptorWrite {
    inner: MemoryStore,
    descriptor_writes: AtomicUsize,
    fail_on: usize,
}

impl FailingDescriptorWrite {
    fn new(fail_on: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            descriptor_writes: AtomicUsize::new(0),
            fail_on,
        }
    }
}

impl ObjectStore for FailingDescriptorWrite {
    fn exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        self.inner.exists(bucket, key)
    }

    fn get(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
        self.inner.get(bucket, key)
    }

    fn set(&self, bucket: &str, key: &str, data: &[u8]) -> StoreResult<()> {
        if key.starts_with(keys::DATASOURCE_PREFIX) {
            let n = self.descriptor_writes.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.fail_on {
                return Err(StoreError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    "transient",
                )));
            }
        }
        self.inner.set(bucket, key, data)
    }

    fn list_names(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<String>> {
        self.inner.list_names(bucket, prefix)
    }

    fn delete(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.inner.delete(bucket, key)
    }
}

fn flaky_engine(fail_on: usize) -> Engine {
    let store = Arc::new(FailingDescriptorWrite::new(fail_on));
    Engine::with_bucket(Bucket::new(store, "obs"), AerisConfig::default()).unwrap()
}

fn stored_keys(engine: &Engine) -> BTreeSet<String> {
    engine.bucket().list_names("").unwrap().into_iter().collect()
}

#[test]
fn test_file_failing_midway_can_be_retried() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(temp_dir.path(), "bsd.picarro.1minute.248m.dat", CRDS_248M);
    // Species run in name order: ch4 saves, then the co2 descriptor write fails.
    let mut engine = flaky_engine(2);
    let request = IngestRequest::new(DataType::Crds).with_path(&path);

    let report = engine.read_file(&request).unwrap();
    assert!(report.failed["bsd.picarro.1minute.248m.dat"].contains("transient"));
    assert!(stored_keys(&engine).is_empty());
    assert!(engine.catalog().data().file_hashes.is_empty());
    assert_eq!(engine.catalog().datasource_ids().count(), 0);

    let report = engine.read_file(&request).unwrap();
    assert!(report.is_success(), "{:?}", report.failed);
    let species = &report.ingested["bsd.picarro.1minute.248m.dat"];
    assert_eq!(engine.catalog().datasource_ids().count(), 2);

    let mut expected = BTreeSet::from([keys::catalog()]);
    for (name, id) in species {
        let ds = engine.datasource(id, true).unwrap();
        assert_eq!(ds.versions().len(), 1, "{name}");
        expected.insert(keys::datasource(id));
        expected.insert(keys::name_entry(ds.name(), id));
        expected.extend(ds.data_keys());
    }
    assert_eq!(stored_keys(&engine), expected);
}

#[test]
fn test_failed_update_restores_existing_datasources() {
    let temp_dir = TempDir::new().unwrap();
    let january = write(temp_dir.path(), "bsd.picarro.1minute.248m.dat", CRDS_248M);
    // Writes 1 and 2 are the first ingest; write 4 is the co2 update.
    let mut engine = flaky_engine(4);
    let first = engine
        .read_file(&IngestRequest::new(DataType::Crds).with_path(&january))
        .unwrap();
    let ch4 = first.ingested["bsd.picarro.1minute.248m.dat"]["ch4"];
    let before = stored_keys(&engine);

    let later = temp_dir.path().join("later");
    fs::create_dir_all(&later).unwrap();
    let march = write(
        &later,
        "bsd.picarro.1minute.248m.dat",
        "time,co2,co2_stdev,ch4,ch4_stdev\n2019-03-01T00:00:00,412.0,0.1,1960.2,0.4\n",
    );
    let request = IngestRequest::new(DataType::Crds).with_path(&march);

    let report = engine.read_file(&request).unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(stored_keys(&engine), before);
    assert_eq!(engine.datasource(&ch4, true).unwrap().versions().len(), 1);

    let report = engine.read_file(&request).unwrap();
    assert!(report.is_success(), "{:?}", report.failed);
    let ds = engine.datasource(&ch4, false).unwrap();
    assert_eq!(ds.versions().len(), 2);
    assert_eq!(ds.segments().len(), 2);
    assert_eq!(engine.catalog().data().file_hashes.len(), 2);
}
