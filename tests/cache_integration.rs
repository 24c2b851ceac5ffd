//! Tests for the tiered database cache: tier selection, derived files and
//! single-flight loading.

use pirdb::{
    lookup, CacheConfig, DatabaseCache, DirectRetrieval, Error, FsStorage, LoadTier, Storage,
};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;

/// Filesystem storage that counts opens and can refuse writes.
#[derive(Default)]
struct CountingStorage {
    opens: AtomicUsize,
    fail_writes: bool,
}

impl CountingStorage {
    fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl Storage for CountingStorage {
    fn exists(&self, path: &Path) -> bool {
        FsStorage.exists(path)
    }

    fn open(&self, path: &Path) -> io::Result<File> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        FsStorage.open(path)
    }

    fn create(&self, path: &Path) -> io::Result<File> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
        }
        FsStorage.create(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        FsStorage.rename(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        FsStorage.remove(path)
    }
}

fn write_source(dir: &Path) -> PathBuf {
    let path = dir.join("products.csv");
    fs::write(&path, "code\tname\n1\tApple\n2\tBanana\n").unwrap();
    path
}

#[test]
fn test_tier_progression() {
    let dir = tempdir().unwrap();
    let config = CacheConfig::for_source(write_source(dir.path()));
    let paths = config.paths();

    // First run: source, writes the full binary only
    let db = DatabaseCache::new(config.clone()).get().unwrap();
    assert_eq!(db.tier(), LoadTier::Source);
    assert_eq!(db.keys(), &[1, 2]);
    assert!(paths.full.exists());
    assert!(!paths.keys_only.exists());

    // Second run: full binary, writes the keys-only cache
    let db = DatabaseCache::new(config.clone()).get().unwrap();
    assert_eq!(db.tier(), LoadTier::FullBinary);
    assert_eq!(db.keys(), &[1, 2]);
    assert_eq!(db.records().unwrap()[0].get("name"), Some("Apple"));
    assert!(paths.keys_only.exists());

    // Third run: keys-only, field data comes from disk on demand
    let db = DatabaseCache::new(config).get().unwrap();
    assert_eq!(db.tier(), LoadTier::KeysOnly);
    assert_eq!(db.keys(), &[1, 2]);
    assert_eq!(db.record_bits(), 8);
    assert_eq!(db.columns(), &["code", "name"]);
    assert!(db.records().is_none());
    assert_eq!(db.record(1).unwrap().get("name"), Some("Banana"));
}

#[test]
fn test_keys_only_preferred_over_source() {
    let dir = tempdir().unwrap();
    let config = CacheConfig::for_source(write_source(dir.path()));
    DatabaseCache::new(config.clone()).get().unwrap();
    DatabaseCache::new(config.clone()).get().unwrap();

    // The source is no longer needed once both derived files exist
    fs::remove_file(&config.source_path).unwrap();
    let db = DatabaseCache::new(config).get().unwrap();
    assert_eq!(db.tier(), LoadTier::KeysOnly);
}

#[test]
fn test_full_binary_without_records() {
    let dir = tempdir().unwrap();
    let source = write_source(dir.path());
    DatabaseCache::new(CacheConfig::for_source(&source)).get().unwrap();

    let config = CacheConfig {
        retain_records: false,
        write_derived: false,
        ..CacheConfig::for_source(&source)
    };
    let db = DatabaseCache::new(config.clone()).get().unwrap();
    assert_eq!(db.tier(), LoadTier::FullBinary);
    assert!(db.records().is_none());
    assert_eq!(db.record(0).unwrap().get("name"), Some("Apple"));
    assert!(!config.paths().keys_only.exists());
}

#[test]
fn test_second_get_does_no_io() {
    let dir = tempdir().unwrap();
    let storage = Arc::new(CountingStorage::default());
    let cache = DatabaseCache::with_storage(
        CacheConfig::for_source(write_source(dir.path())),
        storage.clone(),
    );

    let first = cache.get().unwrap();
    let opens = storage.opens();
    assert!(opens >= 1);

    let second = cache.get().unwrap();
    assert_eq!(storage.opens(), opens);
    assert!(Arc::ptr_eq(&first, &second));
    assert!(cache.is_loaded());
}

#[test]
fn test_concurrent_first_use_loads_once() {
    let dir = tempdir().unwrap();
    let storage = Arc::new(CountingStorage::default());
    let cache = DatabaseCache::with_storage(
        CacheConfig {
            write_derived: false,
            ..CacheConfig::for_source(write_source(dir.path()))
        },
        storage.clone(),
    );

    let threads = 8;
    let barrier = Barrier::new(threads);
    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    cache.get().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // One source open for the single load
    assert_eq!(storage.opens(), 1);
    for db in &results {
        assert!(Arc::ptr_eq(db, &results[0]));
    }
}

#[test]
fn test_failure_seen_by_all_callers() {
    let dir = tempdir().unwrap();
    let cache = DatabaseCache::new(CacheConfig::for_source(dir.path().join("none.csv")));

    let errors: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..4).map(|_| s.spawn(|| cache.get())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for result in errors {
        let err = result.unwrap_err();
        assert!(matches!(err, Error::LoadFailed(_)));
        assert!(matches!(err.root(), Error::SourceNotFound { .. }));
    }
    assert!(cache.is_failed());
}

#[test]
fn test_failed_derived_write_is_not_fatal() {
    let dir = tempdir().unwrap();
    let config = CacheConfig::for_source(write_source(dir.path()));
    let cache = DatabaseCache::with_storage(
        config.clone(),
        Arc::new(CountingStorage::failing_writes()),
    );

    let db = cache.get().unwrap();
    assert_eq!(db.tier(), LoadTier::Source);
    assert_eq!(db.len(), 2);
    assert!(!config.paths().full.exists());
}

#[test]
fn test_corrupt_keys_only_fails_load() {
    let dir = tempdir().unwrap();
    let config = CacheConfig::for_source(write_source(dir.path()));
    fs::write(config.paths().keys_only, [1u8, 0]).unwrap();

    let err = DatabaseCache::new(config).get().unwrap_err();
    assert!(matches!(err.root(), Error::TruncatedFile(_)));
}

#[test]
fn test_width_override_not_persisted() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("products.csv");
    fs::write(&source, "code\n300\n301\n556\n").unwrap();

    let narrowed = CacheConfig {
        record_bits: Some(8),
        ..CacheConfig::for_source(&source)
    };
    let db = DatabaseCache::new(narrowed.clone()).get().unwrap();
    assert_eq!(db.keys(), &[44, 45, 44]);
    assert_eq!(db.record_bits(), 8);

    // Full binary keeps the original keys
    let db = DatabaseCache::new(CacheConfig::for_source(&source)).get().unwrap();
    assert_eq!(db.tier(), LoadTier::FullBinary);
    assert_eq!(db.keys(), &[300, 301, 556]);
    assert_eq!(db.record_bits(), 16);

    // Wider than natural only changes the reported width
    let widened = CacheConfig {
        record_bits: Some(32),
        ..CacheConfig::for_source(&source)
    };
    let db = DatabaseCache::new(widened).get().unwrap();
    assert_eq!(db.tier(), LoadTier::KeysOnly);
    assert_eq!(db.keys(), &[300, 301, 556]);
    assert_eq!(db.record_bits(), 32);
    assert!(!db.is_narrowed());
}

#[test]
fn test_limit() {
    let dir = tempdir().unwrap();
    let config = CacheConfig {
        limit: Some(1),
        ..CacheConfig::for_source(write_source(dir.path()))
    };
    let db = DatabaseCache::new(config).get().unwrap();
    assert_eq!(db.len(), 1);
    assert!(matches!(
        db.record(1),
        Err(Error::IndexOutOfRange { index: 1, count: 1 })
    ));

    // The persisted file holds every record
    let db = DatabaseCache::new(CacheConfig::for_source(dir.path().join("products.csv")))
        .get()
        .unwrap();
    assert_eq!(db.len(), 2);
}

#[test]
fn test_disk_reads_use_cache_storage() {
    let dir = tempdir().unwrap();
    let config = CacheConfig::for_source(write_source(dir.path()));
    DatabaseCache::new(config.clone()).get().unwrap();
    DatabaseCache::new(config.clone()).get().unwrap();

    let storage = Arc::new(CountingStorage::default());
    let cache = DatabaseCache::with_storage(config, storage.clone());
    let db = cache.get().unwrap();
    assert_eq!(db.tier(), LoadTier::KeysOnly);
    assert_eq!(storage.opens(), 1);

    // Field data after a keys-only load is read from the full file
    assert_eq!(db.record(1).unwrap().get("name"), Some("Banana"));
    assert_eq!(storage.opens(), 2);

    let result = lookup(&cache, &DirectRetrieval::new(), "1").unwrap();
    assert_eq!(result.output.get("name"), Some("Apple"));
    assert_eq!(storage.opens(), 3);
}
