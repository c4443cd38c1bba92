//! Secondary indexes: key derivation (`keysOf`) and read-only access.
//! Index entries are never written directly by callers — [`crate::store`]
//! keeps them consistent with the owning record on every mutation (§4.4).

use crate::catalog::IndexSpec;
use crate::engine::KvSnapshot;
use crate::error::{RecordError, Result};
use crate::key::{self, Key};
use crate::value::Value;

/// How an index derives its key from a record's value. `Path` covers the
/// declarative, catalog-persisted case (§4.4's `keyPath`); `Func` is a
/// per-call override for derivations a dotted path can't express — it isn't
/// persisted, so it must be supplied again on every `put` that needs it.
pub enum KeyFn<'a> {
    Path,
    Func(&'a dyn Fn(&Value) -> Option<Value>),
}

/// Walk a dot-separated path of list indices into `value`. The value
/// universe has no named-field type (§3), so a `keyPath` like `"1.0"` means
/// "second element of the document, then its first element" — callers
/// modeling named attributes project them into a fixed list shape before
/// calling `put`.
pub fn extract_path(value: &Value, path: &str) -> Option<Value> {
    let mut cur = value;
    for segment in path.split('.') {
        let idx: usize = segment.parse().ok()?;
        cur = cur.as_list()?.get(idx)?;
    }
    Some(cur.clone())
}

/// Derive the set of encoded index-entry keys (`["idx", name, …ik, (…pk)?]`)
/// that `value` owns in `spec`, given the record's primary key tuple `pk`
/// (without the `["data", storeName]` head).
pub fn keys_of(spec: &IndexSpec, pk: &Key, value: &Value, key_fn: KeyFn<'_>) -> Result<Vec<Vec<u8>>> {
    let extracted = match key_fn {
        KeyFn::Func(f) => f(value),
        KeyFn::Path => match &spec.key_path {
            Some(path) => extract_path(value, path),
            None => return Err(RecordError::IndexKeyDerivationFailed(spec.name.clone()).into()),
        },
    };
    let Some(extracted) = extracted else {
        return Err(RecordError::IndexKeyDerivationFailed(spec.name.clone()).into());
    };

    let elements: Vec<Value> = if spec.multi_entry {
        extracted
            .as_list()
            .ok_or_else(|| RecordError::IndexKeyDerivationFailed(spec.name.clone()))?
            .to_vec()
    } else {
        vec![extracted]
    };

    let mut out = Vec::with_capacity(elements.len());
    for ik in elements {
        let mut full = key::idx_prefix(&spec.name).extended([ik]);
        if !spec.unique {
            full = full.extended(pk.0.clone());
        }
        out.push(full.encode()?);
    }
    Ok(out)
}

/// The primary key of the first record matching `range` within this index.
pub fn get(read: &impl KvSnapshot, spec: &IndexSpec, range: &key::Range) -> Result<Option<Vec<u8>>> {
    let (start, limit) = range.resolve(&key::idx_prefix(&spec.name))?;
    Ok(read.range(&start, &limit, false).next().map(|(_, v)| v))
}

/// Up to `limit` primary keys matching `range`, in ascending index order.
pub fn get_all(read: &impl KvSnapshot, spec: &IndexSpec, range: &key::Range, limit: Option<usize>) -> Result<Vec<Vec<u8>>> {
    let (start, bound) = range.resolve(&key::idx_prefix(&spec.name))?;
    let iter = read.range(&start, &bound, false).map(|(_, v)| v);
    Ok(match limit {
        Some(n) => iter.take(n).collect(),
        None => iter.collect(),
    })
}

/// The index key (without the primary key suffix re-attached) of the first
/// match.
pub fn get_key(read: &impl KvSnapshot, spec: &IndexSpec, range: &key::Range) -> Result<Option<Vec<u8>>> {
    let (start, limit) = range.resolve(&key::idx_prefix(&spec.name))?;
    Ok(read.range(&start, &limit, false).next().map(|(k, _)| k))
}

pub fn get_all_keys(read: &impl KvSnapshot, spec: &IndexSpec, range: &key::Range, limit: Option<usize>) -> Result<Vec<Vec<u8>>> {
    let (start, bound) = range.resolve(&key::idx_prefix(&spec.name))?;
    let iter = read.range(&start, &bound, false).map(|(k, _)| k);
    Ok(match limit {
        Some(n) => iter.take(n).collect(),
        None => iter.collect(),
    })
}

pub fn count(read: &impl KvSnapshot, spec: &IndexSpec, range: &key::Range) -> Result<usize> {
    let (start, limit) = range.resolve(&key::idx_prefix(&spec.name))?;
    Ok(read.range(&start, &limit, false).count())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(unique: bool, multi_entry: bool) -> IndexSpec {
        IndexSpec { name: "by_tag".into(), store_name: "widgets".into(), key_path: Some("1".into()), unique, multi_entry }
    }

    #[test]
    fn unique_index_omits_primary_key() {
        let pk = Key::new([Value::str("w1")]);
        let value = Value::list(vec![Value::str("widget"), Value::str("red")]);
        let keys = keys_of(&spec(true, false), &pk, &value, KeyFn::Path).unwrap();
        assert_eq!(keys.len(), 1);

        let expected = key::idx_prefix("by_tag").extended([Value::str("red")]).encode().unwrap();
        assert_eq!(keys[0], expected);
    }

    #[test]
    fn non_unique_index_appends_primary_key() {
        let pk = Key::new([Value::str("w1")]);
        let value = Value::list(vec![Value::str("widget"), Value::str("red")]);
        let keys = keys_of(&spec(false, false), &pk, &value, KeyFn::Path).unwrap();

        let expected = key::idx_prefix("by_tag").extended([Value::str("red"), Value::str("w1")]).encode().unwrap();
        assert_eq!(keys[0], expected);
    }

    #[test]
    fn multi_entry_index_yields_one_key_per_element() {
        let pk = Key::new([Value::str("w1")]);
        let tags = Value::list(vec![Value::str("red"), Value::str("blue")]);
        let value = Value::list(vec![Value::str("widget"), tags]);
        let keys = keys_of(&spec(false, true), &pk, &value, KeyFn::Path).unwrap();
        assert_eq!(keys.len(), 2);
    }
}
