//! Key/value storage backends
//!
//! `OptimizedStorage` is the RocksDB backend used in production;
//! `MemoryStorage` keeps everything in a `BTreeMap` and can be told to fail
//! writes so tests can exercise rollback paths.

use crate::config::{CompressionType, StorageConfig};
use crate::errors::{QuickThreeResult, StorageError};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// A single mutation inside an atomic batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// Minimal ordered key/value contract shared by the ledger and round cache
pub trait KvBackend: Send + Sync {
    fn get(&self, key: &[u8]) -> QuickThreeResult<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> QuickThreeResult<()>;

    fn delete(&self, key: &[u8]) -> QuickThreeResult<()>;

    /// All entries whose key starts with `prefix`, in ascending key order
    fn scan_prefix(&self, prefix: &[u8]) -> QuickThreeResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Apply every operation or none of them
    fn write_batch(&self, ops: Vec<BatchOp>) -> QuickThreeResult<()>;
}

#[derive(Clone)]
pub struct OptimizedStorage {
    db: Arc<DB>,
}

impl OptimizedStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> QuickThreeResult<Self> {
        Self::open(path, &StorageConfig::default())
    }

    /// Open (or create) a database at `path` tuned by `config`
    pub fn open<P: AsRef<Path>>(path: P, config: &StorageConfig) -> QuickThreeResult<Self> {
        let path = path.as_ref();
        if config.clear_on_start && path.exists() {
            std::fs::remove_dir_all(path)?;
        }

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size_mb * 1024 * 1024);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_target_file_size_base((config.target_file_size_mb * 1024 * 1024) as u64);
        opts.set_compression_type(match config.compression_type {
            CompressionType::None => rocksdb::DBCompressionType::None,
            CompressionType::Snappy => rocksdb::DBCompressionType::Snappy,
            CompressionType::Lz4 => rocksdb::DBCompressionType::Lz4,
            CompressionType::Zstd => rocksdb::DBCompressionType::Zstd,
        });

        let db = DB::open(&opts, path).map_err(|e| {
            StorageError::DatabaseOpenFailed(format!("{}: {}", path.display(), e))
        })?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl KvBackend for OptimizedStorage {
    fn get(&self, key: &[u8]) -> QuickThreeResult<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map_err(|e| StorageError::ReadFailed(e.to_string()).into())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> QuickThreeResult<()> {
        self.db.put(key, value)?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> QuickThreeResult<()> {
        self.db.delete(key)?;
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> QuickThreeResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut rows = Vec::new();
        for item in self.db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = item.map_err(|e| StorageError::ReadFailed(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key.to_vec(), value.to_vec()));
        }
        Ok(rows)
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> QuickThreeResult<()> {
        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                BatchOp::Put(key, value) => batch.put(key, value),
                BatchOp::Delete(key) => batch.delete(key),
            }
        }
        self.db.write(batch)?;
        Ok(())
    }
}

/// In-process backend for tests and throwaway runs
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write return `StorageError::WriteFailed`
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent read return `StorageError::ReadFailed`
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_read(&self) -> QuickThreeResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::ReadFailed("injected read failure".to_string()).into());
        }
        Ok(())
    }

    fn check_write(&self) -> QuickThreeResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed("injected write failure".to_string()).into());
        }
        Ok(())
    }

    fn poisoned() -> StorageError {
        StorageError::ReadFailed("memory storage lock poisoned".to_string())
    }
}

impl KvBackend for MemoryStorage {
    fn get(&self, key: &[u8]) -> QuickThreeResult<Option<Vec<u8>>> {
        self.check_read()?;
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> QuickThreeResult<()> {
        self.check_write()?;
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> QuickThreeResult<()> {
        self.check_write()?;
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> QuickThreeResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.check_read()?;
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(entries
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> QuickThreeResult<()> {
        self.check_write()?;
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        for op in ops {
            match op {
                BatchOp::Put(key, value) => {
                    entries.insert(key, value);
                }
                BatchOp::Delete(key) => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }
}
