//! The core record family: database definition, store specs, index specs,
//! and hydration of the in-memory [`Catalog`] from them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::engine::KvSnapshot;
use crate::error::{CatalogError, Result};
use crate::key::{self, Key};
use crate::value::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DatabaseDoc {
    name: String,
    version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreSpecDoc {
    name: String,
    key_path: Option<String>,
    auto_increment: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexSpecDoc {
    name: String,
    store_name: String,
    key_path: Option<String>,
    unique: bool,
    multi_entry: bool,
}

/// A secondary index's schema, resolved and attached to its owning store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub store_name: String,
    pub key_path: Option<String>,
    pub unique: bool,
    pub multi_entry: bool,
}

/// An object store's schema, including the indexes defined on it.
#[derive(Debug, Clone)]
pub struct StoreSpec {
    pub name: String,
    pub key_path: Option<String>,
    pub auto_increment: bool,
    pub indexes: HashMap<String, IndexSpec>,
}

/// The in-memory database definition: name, version, and the full set of
/// stores and indexes. Mutated only by a migration transaction's commit,
/// then republished atomically (replace-then-publish, §5).
#[derive(Debug, Clone)]
pub struct Catalog {
    pub name: String,
    pub version: u64,
    pub stores: HashMap<String, StoreSpec>,
}

fn core_key(segs: impl IntoIterator<Item = Value>) -> Key { key::core_prefix().extended(segs) }

fn database_key() -> Key { key::core_prefix() }

fn store_key(name: &str) -> Key { core_key([Value::str("store"), Value::str(name)]) }

fn index_key(name: &str) -> Key { core_key([Value::str("index"), Value::str(name)]) }

impl Catalog {
    /// Load `["core"]` plus every `["core","store",*]` and `["core","index",*]`
    /// record reachable from `read`. Absent `["core"]` means a brand-new
    /// database at version 0 with no stores yet.
    pub fn hydrate(read: &impl KvSnapshot, requested_name: &str) -> Result<Self> {
        let db_bytes = read.get(&database_key().encode()?)?;
        let (name, version) = match db_bytes {
            Some(bytes) => {
                let doc: DatabaseDoc = bincode::deserialize(&bytes)?;
                (doc.name, doc.version)
            }
            None => (requested_name.to_string(), 0),
        };

        let mut stores: HashMap<String, StoreSpec> = HashMap::new();
        let (start, limit) = key::Range::prefix(Key::new([Value::str("store")])).resolve(&key::core_prefix())?;
        for (_, value) in read.range(&start, &limit, false) {
            let doc: StoreSpecDoc = bincode::deserialize(&value)?;
            stores.insert(
                doc.name.clone(),
                StoreSpec { name: doc.name, key_path: doc.key_path, auto_increment: doc.auto_increment, indexes: HashMap::new() },
            );
        }

        let (start, limit) = key::Range::prefix(Key::new([Value::str("index")])).resolve(&key::core_prefix())?;
        for (_, value) in read.range(&start, &limit, false) {
            let doc: IndexSpecDoc = bincode::deserialize(&value)?;
            let spec = IndexSpec {
                name: doc.name.clone(),
                store_name: doc.store_name.clone(),
                key_path: doc.key_path,
                unique: doc.unique,
                multi_entry: doc.multi_entry,
            };
            match stores.get_mut(&doc.store_name) {
                Some(store) => {
                    store.indexes.insert(doc.name, spec);
                }
                None => return Err(CatalogError::CatalogCorrupt(format!("index {} owned by unknown store {}", doc.name, doc.store_name)).into()),
            }
        }

        Ok(Catalog { name, version, stores })
    }

    pub fn store(&self, name: &str) -> Result<&StoreSpec> {
        self.stores.get(name).ok_or_else(|| CatalogError::UnknownStore(name.to_string()).into())
    }
}

/// Writes backing `createStore`/`createIndex`/`deleteIndex`/`deleteStore`
/// during a migration. Kept free of any transaction type so it can be
/// driven by [`crate::transaction::MigrationTransaction`] without a cyclic
/// module dependency.
pub mod writes {
    use super::*;

    pub fn put_database(name: &str, version: u64) -> Result<(Vec<u8>, Vec<u8>)> {
        let key = database_key().encode()?;
        let value = bincode::serialize(&DatabaseDoc { name: name.to_string(), version })?;
        Ok((key, value))
    }

    pub fn put_store(spec: &StoreSpec) -> Result<(Vec<u8>, Vec<u8>)> {
        let key = store_key(&spec.name).encode()?;
        let doc = StoreSpecDoc { name: spec.name.clone(), key_path: spec.key_path.clone(), auto_increment: spec.auto_increment };
        Ok((key, bincode::serialize(&doc)?))
    }

    pub fn delete_store(name: &str) -> Result<Vec<u8>> { store_key(name).encode().map_err(Into::into) }

    pub fn put_index(spec: &IndexSpec) -> Result<(Vec<u8>, Vec<u8>)> {
        let key = index_key(&spec.name).encode()?;
        let doc = IndexSpecDoc {
            name: spec.name.clone(),
            store_name: spec.store_name.clone(),
            key_path: spec.key_path.clone(),
            unique: spec.unique,
            multi_entry: spec.multi_entry,
        };
        Ok((key, bincode::serialize(&doc)?))
    }

    pub fn delete_index(name: &str) -> Result<Vec<u8>> { index_key(name).encode().map_err(Into::into) }
}
