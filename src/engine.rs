//! The ordered key-value engine contract (§6) and a concrete `sled`-backed
//! implementation. Everything above this module only ever talks to the
//! [`KvSnapshot`]/[`KvTxn`] traits, never to `sled` directly.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

/// A read-only, ordered view over the keyspace.
pub trait KvSnapshot {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn has(&self, key: &[u8]) -> Result<bool> { Ok(self.get(key)?.is_some()) }

    /// Iterate `[start, limit)` in ascending (or, if `reverse`, descending)
    /// key order.
    fn range(&self, start: &[u8], limit: &[u8], reverse: bool) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_>;
}

/// A read-write transaction: a [`KvSnapshot`] plus a buffered batch of
/// mutations applied atomically on [`KvTxn::commit`].
pub trait KvTxn: KvSnapshot {
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>);
    fn delete(&mut self, key: Vec<u8>);
    fn commit(self: Box<Self>) -> Result<()>;
    fn discard(self: Box<Self>);
}

/// Opens and owns the underlying ordered store.
pub trait KvEngine {
    type Snap: KvSnapshot;
    type Tx: KvTxn;

    /// A point-in-time read view. Readers opened from it never observe
    /// writes committed after acquisition.
    fn snapshot(&self) -> Result<Self::Snap>;

    /// Acquire the single read-write transaction slot. Blocks (by erroring,
    /// never by suspending — §5 forbids cooperative suspension) if one is
    /// already in flight; callers are expected to serialize at a higher
    /// level rather than poll this.
    fn transaction(&self) -> Result<Self::Tx>;
}

/// `sled::Config` wrapper matching the knobs the storage layer actually
/// exercises, rather than exposing `sled::Config`'s full surface.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    path: Option<PathBuf>,
    temporary: bool,
    flush_every_ms: Option<u64>,
}

impl Default for OpenOptions {
    fn default() -> Self { OpenOptions { path: None, temporary: false, flush_every_ms: Some(500) } }
}

impl OpenOptions {
    pub fn new() -> Self { Self::default() }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    pub fn flush_every_ms(mut self, ms: Option<u64>) -> Self {
        self.flush_every_ms = ms;
        self
    }

    /// Convenience entry point, returning `anyhow::Result` rather than the
    /// crate's own `Error` — matching the teacher's `SledStorageEngine::new`/
    /// `with_path` constructors, which sit at the outermost "open a database
    /// at a path" boundary rather than inside the engine-contract traits.
    pub fn open(self) -> anyhow::Result<SledEngine> {
        let mut cfg = sled::Config::new().temporary(self.temporary).flush_every_ms(self.flush_every_ms);
        if let Some(path) = &self.path {
            cfg = cfg.path(path);
        }
        let db = cfg.open()?;
        tracing::debug!(temporary = self.temporary, "opened sled engine");
        Ok(SledEngine { db, rw_in_flight: Arc::new(Mutex::new(false)) })
    }
}

/// A single flat `sled::Db` backing the whole keyspace. One tree, not one
/// per store: the key layer's `"core" < "data" < "idx"` family prefixes are
/// what gives the keyspace its global ordering guarantee, and splitting
/// stores into separate sled trees would scatter that ordering across
/// trees that have no ordering relationship to each other.
pub struct SledEngine {
    db: sled::Db,
    rw_in_flight: Arc<Mutex<bool>>,
}

impl SledEngine {
    pub fn with_path(path: impl AsRef<Path>) -> anyhow::Result<Self> { OpenOptions::new().path(path).open() }

    pub fn with_homedir_folder(folder: &str) -> anyhow::Result<Self> {
        let path = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("failed to get home directory"))?.join(folder);
        Self::with_path(path)
    }

    /// Matches the teacher's `SledStorageEngine::new_test`: an in-memory,
    /// non-durable instance for tests and examples.
    pub fn new_test() -> anyhow::Result<Self> { OpenOptions::new().temporary(true).flush_every_ms(None).open() }

    pub fn temporary() -> anyhow::Result<Self> { Self::new_test() }
}

impl KvEngine for SledEngine {
    type Snap = SledSnapshot;
    type Tx = SledTxn;

    fn snapshot(&self) -> Result<Self::Snap> {
        // sled has no native MVCC read view, so a snapshot is realized as an
        // eager, immutable copy of every key visible right now. Documented
        // trade-off, not a silent shortcut: fine for an embedded catalog-sized
        // keyspace, and it gives true point-in-time isolation rather than a
        // live read-through that could observe later writes.
        let mut copy = BTreeMap::new();
        for entry in self.db.iter() {
            let (k, v) = entry?;
            copy.insert(k.to_vec(), v.to_vec());
        }
        Ok(SledSnapshot { data: Arc::new(copy) })
    }

    fn transaction(&self) -> Result<Self::Tx> {
        let mut in_flight = self.rw_in_flight.lock().expect("rw_in_flight mutex poisoned");
        if *in_flight {
            return Err(Error::Other("a read-write transaction is already in flight".into()));
        }
        *in_flight = true;
        drop(in_flight);
        Ok(SledTxn { db: self.db.clone(), overlay: BTreeMap::new(), finished: false, rw_in_flight: self.rw_in_flight.clone() })
    }
}

/// Point-in-time copy of the keyspace taken by [`SledEngine::snapshot`].
pub struct SledSnapshot {
    data: Arc<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl KvSnapshot for SledSnapshot {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> { Ok(self.data.get(key).cloned()) }

    fn range(&self, start: &[u8], limit: &[u8], reverse: bool) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_> {
        let iter = self.data.range((Bound::Included(start.to_vec()), Bound::Excluded(limit.to_vec())));
        if reverse {
            Box::new(iter.rev().map(|(k, v)| (k.clone(), v.clone())))
        } else {
            Box::new(iter.map(|(k, v)| (k.clone(), v.clone())))
        }
    }
}

/// A read-write transaction: live reads against `db`, shadowed by an overlay
/// of buffered writes for read-your-writes consistency (`sled::Batch` alone
/// cannot be read back before it's applied).
pub struct SledTxn {
    db: sled::Db,
    overlay: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    finished: bool,
    rw_in_flight: Arc<Mutex<bool>>,
}

impl KvSnapshot for SledTxn {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.overlay.get(key) {
            Some(Some(v)) => Ok(Some(v.clone())),
            Some(None) => Ok(None),
            None => Ok(self.db.get(key)?.map(|v| v.to_vec())),
        }
    }

    fn range(&self, start: &[u8], limit: &[u8], reverse: bool) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        for entry in self.db.range(start.to_vec()..limit.to_vec()) {
            if let Ok((k, v)) = entry {
                merged.insert(k.to_vec(), v.to_vec());
            }
        }
        for (k, v) in self.overlay.range(start.to_vec()..limit.to_vec()) {
            match v {
                Some(value) => {
                    merged.insert(k.clone(), value.clone());
                }
                None => {
                    merged.remove(k);
                }
            }
        }
        let items: Vec<(Vec<u8>, Vec<u8>)> = if reverse { merged.into_iter().rev().collect() } else { merged.into_iter().collect() };
        Box::new(items.into_iter())
    }
}

impl KvTxn for SledTxn {
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) { self.overlay.insert(key, Some(value)); }

    fn delete(&mut self, key: Vec<u8>) { self.overlay.insert(key, None); }

    fn commit(mut self: Box<Self>) -> Result<()> {
        let mut batch = sled::Batch::default();
        for (k, v) in std::mem::take(&mut self.overlay) {
            match v {
                Some(value) => batch.insert(k, value),
                None => batch.remove(k),
            }
        }
        self.db.apply_batch(batch)?;
        // sled's background flush thread lags a commit by design; a
        // database transaction's durability must not depend on whether the
        // process happens to stay alive long enough for that thread to run.
        self.db.flush()?;
        self.finished = true;
        tracing::debug!("transaction committed");
        Ok(())
    }

    fn discard(mut self: Box<Self>) {
        self.overlay.clear();
        self.finished = true;
        tracing::debug!("transaction discarded");
    }
}

impl Drop for SledTxn {
    fn drop(&mut self) {
        if !self.finished && !self.overlay.is_empty() {
            tracing::warn!("read-write transaction dropped without commit or discard; buffered writes are lost");
        }
        *self.rw_in_flight.lock().expect("rw_in_flight mutex poisoned") = false;
    }
}
