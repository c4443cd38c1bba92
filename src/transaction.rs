//! Database open/migrate protocol, and the three transaction flavors of
//! §4.7: read-only snapshot, read-write transaction, migration transaction.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::catalog::{self, Catalog, IndexSpec, StoreSpec};
use crate::cursor::{self, Cursor, Direction};
use crate::engine::{KvSnapshot, KvTxn, SledEngine, SledSnapshot, SledTxn};
use crate::error::{CatalogError, Error, RecordError, Result, TxnError};
use crate::index;
use crate::key::{self, Key, Range};
use crate::store;
use crate::value::Value;

/// A fully opened database: the engine plus the currently published
/// catalog. The catalog is replaced wholesale on every migration commit
/// (replace-then-publish, §5) rather than mutated in place.
pub struct Database {
    engine: SledEngine,
    catalog: Arc<RwLock<Catalog>>,
    name: String,
}

impl Database {
    /// `open(name, requestedVersion, path)` — the entry point of the
    /// migration protocol (§4.7). Call `.migrate(...)` on the result to run
    /// it to completion.
    pub fn open(name: &str, requested_version: u64, path: impl AsRef<Path>) -> Result<OpenHandle> {
        let engine = SledEngine::with_path(path).map_err(|e| Error::Other(e.to_string()))?;
        Ok(OpenHandle { engine, name: name.to_string(), requested_version })
    }

    /// Open under the user's home directory, matching the teacher's
    /// `SledStorageEngine::with_homedir_folder`/`new` convenience.
    pub fn open_in_homedir(name: &str, requested_version: u64, folder: &str) -> Result<OpenHandle> {
        let engine = SledEngine::with_homedir_folder(folder).map_err(|e| Error::Other(e.to_string()))?;
        Ok(OpenHandle { engine, name: name.to_string(), requested_version })
    }

    pub fn temporary(name: &str, requested_version: u64) -> Result<OpenHandle> {
        let engine = SledEngine::new_test().map_err(|e| Error::Other(e.to_string()))?;
        Ok(OpenHandle { engine, name: name.to_string(), requested_version })
    }

    fn catalog(&self) -> Catalog { self.catalog.read().expect("catalog lock poisoned").clone() }

    /// A read-only view scoped to `scope`. Stable for its entire lifetime,
    /// even across later `put`s the caller commits elsewhere.
    pub fn readonly_transaction(&self, scope: impl IntoIterator<Item = String>) -> Result<Snapshot> {
        let snap = self.engine.snapshot()?;
        Ok(Snapshot { catalog: self.catalog(), snap, scope: scope.into_iter().collect() })
    }

    /// A read-write transaction scoped to `scope`. Only one may be in
    /// flight at a time across the whole database (§5).
    pub fn transaction(&self, scope: impl IntoIterator<Item = String>) -> Result<Transaction> {
        let txn = self.engine.transaction()?;
        Ok(Transaction { catalog: self.catalog(), txn, scope: scope.into_iter().collect(), finished: false })
    }
}

/// Returned by [`Database::open`]; the migration callback runs when
/// [`OpenHandle::migrate`] is called.
pub struct OpenHandle {
    engine: SledEngine,
    name: String,
    requested_version: u64,
}

impl OpenHandle {
    pub fn migrate(self, f: impl FnOnce(u64, &mut MigrationTransaction) -> Result<()>) -> Result<Database> {
        let snap = self.engine.snapshot()?;
        let catalog = Catalog::hydrate(&snap, &self.name)?;

        if catalog.version > self.requested_version {
            return Err(CatalogError::VersionDowngrade { stored: catalog.version, requested: self.requested_version }.into());
        }
        if catalog.version == self.requested_version {
            tracing::debug!(db = %self.name, version = catalog.version, "hydrated at current version, no migration needed");
            return Ok(Database { engine: self.engine, catalog: Arc::new(RwLock::new(catalog)), name: self.name });
        }

        let old_version = catalog.version;
        let mut txn = self.engine.transaction()?;
        let mut working_catalog = catalog;
        let callback_result = {
            let mut migration = MigrationTransaction { txn: &mut txn, catalog: &mut working_catalog };
            f(old_version, &mut migration)
        };
        if let Err(e) = callback_result {
            Box::new(txn).discard();
            tracing::warn!(db = %self.name, from = old_version, to = self.requested_version, error = %e, "migration callback failed, discarded");
            return Err(e);
        }

        working_catalog.version = self.requested_version;
        let (k, v) = catalog::writes::put_database(&self.name, self.requested_version)?;
        txn.put(k, v);

        if let Err(e) = Box::new(txn).commit() {
            tracing::warn!(db = %self.name, from = old_version, to = self.requested_version, error = %e, "migration commit failed");
            return Err(TxnError::CommitFailed(e.to_string()).into());
        }

        tracing::info!(db = %self.name, from = old_version, to = self.requested_version, "migration committed");
        Ok(Database { engine: self.engine, catalog: Arc::new(RwLock::new(working_catalog)), name: self.name })
    }
}

fn check_scope<'a>(catalog: &'a Catalog, scope: &[String], name: &str) -> Result<&'a StoreSpec> {
    if !scope.iter().any(|s| s == name) {
        return Err(TxnError::StoreOutOfScope(name.to_string()).into());
    }
    catalog.store(name)
}

/// A read-only snapshot scoped to a declared set of stores (§4.7 #1).
pub struct Snapshot {
    catalog: Catalog,
    snap: SledSnapshot,
    scope: Vec<String>,
}

impl Snapshot {
    pub fn store(&self, name: &str) -> Result<StoreReader<'_>> {
        let spec = check_scope(&self.catalog, &self.scope, name)?;
        Ok(StoreReader { spec, read: &self.snap })
    }

    /// Read-only transactions cannot fail to commit; both `commit` and
    /// `abort` simply release the view.
    pub fn commit(self) {}

    pub fn abort(self) {}
}

/// A read-write transaction scoped to a declared set of stores (§4.7 #2).
pub struct Transaction {
    catalog: Catalog,
    txn: SledTxn,
    scope: Vec<String>,
    finished: bool,
}

impl Transaction {
    pub fn store(&mut self, name: &str) -> Result<StoreWriter<'_, SledTxn>> {
        let spec = check_scope(&self.catalog, &self.scope, name)?;
        Ok(StoreWriter { spec, txn: &mut self.txn })
    }

    pub fn commit(mut self) -> Result<()> {
        if self.finished {
            return Err(TxnError::AlreadyFinished.into());
        }
        self.finished = true;
        Box::new(self.txn).commit()
    }

    pub fn abort(mut self) {
        self.finished = true;
        Box::new(self.txn).discard();
    }
}

/// A read-write transaction with catalog-mutation privileges, handed to the
/// migration callback exclusively (§4.7 #3).
pub struct MigrationTransaction<'a> {
    txn: &'a mut SledTxn,
    catalog: &'a mut Catalog,
}

impl MigrationTransaction<'_> {
    pub fn create_store(&mut self, name: &str, key_path: Option<String>, auto_increment: bool) -> Result<()> {
        if self.catalog.stores.contains_key(name) {
            return Err(CatalogError::DuplicateStore(name.to_string()).into());
        }
        let spec = StoreSpec { name: name.to_string(), key_path, auto_increment, indexes: HashMap::new() };
        let (k, v) = catalog::writes::put_store(&spec)?;
        self.txn.put(k, v);
        self.catalog.stores.insert(name.to_string(), spec);
        tracing::info!(store = name, "store created");
        Ok(())
    }

    pub fn delete_store(&mut self, name: &str) -> Result<()> {
        if !self.catalog.stores.contains_key(name) {
            return Err(CatalogError::UnknownStore(name.to_string()).into());
        }
        let k = catalog::writes::delete_store(name)?;
        self.txn.delete(k);
        self.catalog.stores.remove(name);
        tracing::info!(store = name, "store deleted");
        Ok(())
    }

    pub fn create_index(&mut self, store_name: &str, index_name: &str, key_path: Option<String>, unique: bool, multi_entry: bool) -> Result<()> {
        let store = self.catalog.stores.get(store_name).ok_or_else(|| CatalogError::UnknownStore(store_name.to_string()))?;
        if store.indexes.contains_key(index_name) {
            return Err(CatalogError::DuplicateIndex(index_name.to_string()).into());
        }
        let spec = IndexSpec { name: index_name.to_string(), store_name: store_name.to_string(), key_path, unique, multi_entry };
        let (k, v) = catalog::writes::put_index(&spec)?;
        self.txn.put(k, v);
        self.catalog.stores.get_mut(store_name).unwrap().indexes.insert(index_name.to_string(), spec);
        tracing::info!(store = store_name, index = index_name, "index created");
        Ok(())
    }

    pub fn delete_index(&mut self, store_name: &str, index_name: &str) -> Result<()> {
        let store = self.catalog.stores.get_mut(store_name).ok_or_else(|| CatalogError::UnknownStore(store_name.to_string()))?;
        if store.indexes.remove(index_name).is_none() {
            return Err(CatalogError::UnknownIndex(index_name.to_string()).into());
        }
        let k = catalog::writes::delete_index(index_name)?;
        self.txn.delete(k);
        tracing::info!(store = store_name, index = index_name, "index deleted");
        Ok(())
    }

    /// A migration transaction is also a plain read-write transaction over
    /// pre-existing stores (§4.7 #3).
    pub fn store(&mut self, name: &str) -> Result<StoreWriter<'_, SledTxn>> {
        let spec = self.catalog.stores.get(name).ok_or_else(|| Error::from(CatalogError::UnknownStore(name.to_string())))?;
        Ok(StoreWriter { spec, txn: &mut *self.txn })
    }
}

/// Read-only access to one store, bound to either a [`Snapshot`] or a live
/// transaction's reborrowed read half.
pub struct StoreReader<'a> {
    spec: &'a StoreSpec,
    read: &'a dyn KvSnapshot,
}

impl StoreReader<'_> {
    pub fn get(&self, pk: &Key) -> Result<Option<Value>> { store::get(self.read, self.spec, pk) }
    pub fn get_all(&self, range: &Range, limit: Option<usize>) -> Result<Vec<Value>> { store::get_all(self.read, self.spec, range, limit) }
    pub fn get_key(&self, range: &Range) -> Result<Option<Vec<u8>>> { store::get_key(self.read, self.spec, range) }
    pub fn get_all_keys(&self, range: &Range, limit: Option<usize>) -> Result<Vec<Vec<u8>>> { store::get_all_keys(self.read, self.spec, range, limit) }
    pub fn count(&self, range: &Range) -> Result<usize> { store::count(self.read, self.spec, range) }

    pub fn open_cursor(&self, range: &Range, direction: Direction) -> Result<Cursor> {
        cursor::open(self.read, key::data_prefix(&self.spec.name), range, direction, false)
    }

    pub fn index(&self, name: &str) -> Result<IndexReader<'_>> {
        let spec = self.spec.indexes.get(name).ok_or_else(|| RecordError::IndexKeyDerivationFailed(name.to_string()))?;
        Ok(IndexReader { spec, read: self.read })
    }
}

/// Read-write access to one store within a live transaction.
pub struct StoreWriter<'a, T> {
    spec: &'a StoreSpec,
    txn: &'a mut T,
}

impl<'a, T: KvTxn> StoreWriter<'a, T> {
    pub fn put(&mut self, pk: &Key, value: Value) -> Result<()> { store::put(self.txn, self.spec, pk, value) }
    pub fn add(&mut self, pk: &Key, value: Value) -> Result<()> { store::add(self.txn, self.spec, pk, value) }
    pub fn delete(&mut self, pk: &Key) -> Result<()> { store::delete(self.txn, self.spec, pk) }
    pub fn clear(&mut self) -> Result<()> { store::clear(self.txn, self.spec) }

    pub fn get(&self, pk: &Key) -> Result<Option<Value>> { store::get(&*self.txn, self.spec, pk) }
    pub fn get_all(&self, range: &Range, limit: Option<usize>) -> Result<Vec<Value>> { store::get_all(&*self.txn, self.spec, range, limit) }
    pub fn count(&self, range: &Range) -> Result<usize> { store::count(&*self.txn, self.spec, range) }

    pub fn open_cursor(&self, range: &Range, direction: Direction) -> Result<Cursor> {
        cursor::open(&*self.txn, key::data_prefix(&self.spec.name), range, direction, false)
    }

    /// An index is read-only from the caller's perspective even inside a
    /// live write transaction (§4.5: only the owning store writes index
    /// entries); reads see this transaction's own buffered writes.
    pub fn index(&self, name: &str) -> Result<IndexReader<'_>> {
        let spec = self.spec.indexes.get(name).ok_or_else(|| RecordError::IndexKeyDerivationFailed(name.to_string()))?;
        Ok(IndexReader { spec, read: &*self.txn })
    }
}

/// Read-only access to one secondary index.
pub struct IndexReader<'a> {
    spec: &'a IndexSpec,
    read: &'a dyn KvSnapshot,
}

impl IndexReader<'_> {
    pub fn get(&self, range: &Range) -> Result<Option<Vec<u8>>> { index::get(self.read, self.spec, range) }
    pub fn get_all(&self, range: &Range, limit: Option<usize>) -> Result<Vec<Vec<u8>>> { index::get_all(self.read, self.spec, range, limit) }
    pub fn get_key(&self, range: &Range) -> Result<Option<Vec<u8>>> { index::get_key(self.read, self.spec, range) }
    pub fn get_all_keys(&self, range: &Range, limit: Option<usize>) -> Result<Vec<Vec<u8>>> { index::get_all_keys(self.read, self.spec, range, limit) }
    pub fn count(&self, range: &Range) -> Result<usize> { index::count(self.read, self.spec, range) }

    pub fn open_cursor(&self, range: &Range, direction: Direction) -> Result<Cursor> {
        cursor::open(self.read, key::idx_prefix(&self.spec.name), range, direction, true)
    }
}

// Re-exported so callers deriving index keys with a caller-supplied key
// function don't need to reach into `crate::index` directly.
pub use crate::index::KeyFn as IndexKeyFn;
