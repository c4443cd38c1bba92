//! Object store operations: `put`/`add`/`delete`/`clear`/`get*`/`count`,
//! with atomic index maintenance on every mutation (§4.4).

use crate::catalog::StoreSpec;
use crate::engine::{KvSnapshot, KvTxn};
use crate::error::{RecordError, Result};
use crate::index::{self, KeyFn};
use crate::key::{self, Key, Range};
use crate::record::{Payload, Record};
use crate::value::Value;

fn primary_key_bytes(store_name: &str, pk: &Key) -> Result<Vec<u8>> { Ok(key::data_prefix(store_name).extended(pk.0.clone()).encode()?) }

/// Re-derive every index's entries for `(pk, value)`, check uniqueness
/// up front, then (only once every check has passed) erase the stale
/// entries and write the fresh ones — the write that keeps the
/// record/index bijection intact (§3 invariant 1, §9 "record's reverse-index
/// map").
fn apply_with_indexes(
    txn: &mut impl KvTxn,
    spec: &StoreSpec,
    pk: &Key,
    value: &Value,
    previous: Option<&Record>,
) -> Result<std::collections::HashMap<String, Vec<Vec<u8>>>> {
    let primary_bytes = primary_key_bytes(&spec.name, pk)?;

    struct Plan<'a> {
        index_name: &'a str,
        old_keys: Vec<Vec<u8>>,
        new_keys: Vec<Vec<u8>>,
    }

    let mut plans = Vec::with_capacity(spec.indexes.len());
    for index_spec in spec.indexes.values() {
        let old_keys = previous.and_then(|r| r.index_keys.get(&index_spec.name)).cloned().unwrap_or_default();
        let new_keys = index::keys_of(index_spec, pk, value, KeyFn::Path)?;

        if index_spec.unique {
            for ik in &new_keys {
                if old_keys.contains(ik) {
                    continue;
                }
                if txn.get(ik)?.is_some() {
                    tracing::warn!(index = %index_spec.name, "unique constraint violated");
                    return Err(RecordError::UniqueConstraintViolation(index_spec.name.clone()).into());
                }
            }
        }
        plans.push(Plan { index_name: &index_spec.name, old_keys, new_keys });
    }

    let mut index_keys = std::collections::HashMap::with_capacity(plans.len());
    for plan in plans {
        for ik in plan.old_keys.iter().filter(|ik| !plan.new_keys.contains(ik)) {
            txn.delete(ik.clone());
        }
        for ik in &plan.new_keys {
            txn.put(ik.clone(), primary_bytes.clone());
        }
        index_keys.insert(plan.index_name.to_string(), plan.new_keys);
    }
    Ok(index_keys)
}

/// Insert-or-replace. Overwrites whatever record previously lived at `pk`.
pub fn put(txn: &mut impl KvTxn, spec: &StoreSpec, pk: &Key, value: Value) -> Result<()> {
    let data_key = primary_key_bytes(&spec.name, pk)?;
    let previous = match txn.get(&data_key)? {
        Some(bytes) => Some(Record::from_bytes(&bytes)?),
        None => None,
    };
    let index_keys = apply_with_indexes(txn, spec, pk, &value, previous.as_ref())?;

    let record = Record { index_keys, value: Payload::from_value(&value)? };
    txn.put(data_key, record.to_bytes()?);
    tracing::debug!(store = %spec.name, "put");
    Ok(())
}

/// Like [`put`], but fails if a record already exists at `pk`.
pub fn add(txn: &mut impl KvTxn, spec: &StoreSpec, pk: &Key, value: Value) -> Result<()> {
    let data_key = primary_key_bytes(&spec.name, pk)?;
    if txn.get(&data_key)?.is_some() {
        return Err(RecordError::AlreadyExists.into());
    }
    put(txn, spec, pk, value)
}

/// Remove the record at `pk` and every index entry it owned.
pub fn delete(txn: &mut impl KvTxn, spec: &StoreSpec, pk: &Key) -> Result<()> {
    let data_key = primary_key_bytes(&spec.name, pk)?;
    let Some(bytes) = txn.get(&data_key)? else {
        return Err(RecordError::NotFound.into());
    };
    let record = Record::from_bytes(&bytes)?;
    for keys in record.index_keys.values() {
        for ik in keys {
            txn.delete(ik.clone());
        }
    }
    txn.delete(data_key);
    tracing::debug!(store = %spec.name, "delete");
    Ok(())
}

/// Remove every record in the store and every entry of every index defined
/// on it.
pub fn clear(txn: &mut impl KvTxn, spec: &StoreSpec) -> Result<()> {
    let (start, limit) = Range::all().resolve(&key::data_prefix(&spec.name))?;
    let data_keys: Vec<Vec<u8>> = txn.range(&start, &limit, false).map(|(k, _)| k).collect();
    for k in data_keys {
        txn.delete(k);
    }
    for index_spec in spec.indexes.values() {
        let (start, limit) = Range::all().resolve(&key::idx_prefix(&index_spec.name))?;
        let idx_keys: Vec<Vec<u8>> = txn.range(&start, &limit, false).map(|(k, _)| k).collect();
        for k in idx_keys {
            txn.delete(k);
        }
    }
    tracing::debug!(store = %spec.name, "clear");
    Ok(())
}

pub fn get(read: &impl KvSnapshot, spec: &StoreSpec, pk: &Key) -> Result<Option<Value>> {
    let data_key = primary_key_bytes(&spec.name, pk)?;
    match read.get(&data_key)? {
        Some(bytes) => Ok(Some(Record::from_bytes(&bytes)?.value.to_value()?)),
        None => Ok(None),
    }
}

pub fn get_all(read: &impl KvSnapshot, spec: &StoreSpec, range: &Range, limit: Option<usize>) -> Result<Vec<Value>> {
    let (start, bound) = range.resolve(&key::data_prefix(&spec.name))?;
    let iter = read.range(&start, &bound, false).map(|(_, v)| Record::from_bytes(&v).and_then(|r| r.value.to_value()));
    let values: Result<Vec<Value>> = match limit {
        Some(n) => iter.take(n).collect(),
        None => iter.collect(),
    };
    values
}

pub fn get_key(read: &impl KvSnapshot, spec: &StoreSpec, range: &Range) -> Result<Option<Vec<u8>>> {
    let (start, limit) = range.resolve(&key::data_prefix(&spec.name))?;
    Ok(read.range(&start, &limit, false).next().map(|(k, _)| k))
}

pub fn get_all_keys(read: &impl KvSnapshot, spec: &StoreSpec, range: &Range, limit: Option<usize>) -> Result<Vec<Vec<u8>>> {
    let (start, bound) = range.resolve(&key::data_prefix(&spec.name))?;
    let iter = read.range(&start, &bound, false).map(|(k, _)| k);
    Ok(match limit {
        Some(n) => iter.take(n).collect(),
        None => iter.collect(),
    })
}

pub fn count(read: &impl KvSnapshot, spec: &StoreSpec, range: &Range) -> Result<usize> {
    let (start, limit) = range.resolve(&key::data_prefix(&spec.name))?;
    Ok(read.range(&start, &limit, false).count())
}
