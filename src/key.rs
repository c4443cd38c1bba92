//! Composite keys over the bytewise keyspace: the `core < data < idx` family
//! scheme, the `next`/`stop` helpers, and range resolution into half-open
//! byte intervals the engine can iterate directly.

use crate::codec;
use crate::value::Value;

/// A composite key: an ordered list of [`Value`]s, encoded as a single
/// bytewise `LIST`. Every key actually stored in the engine begins with a
/// family literal (`"core"`, `"data"`, or `"idx"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Key(pub Vec<Value>);

impl Key {
    pub fn new(parts: impl IntoIterator<Item = Value>) -> Self { Key(parts.into_iter().collect()) }

    pub fn empty() -> Self { Key(Vec::new()) }

    pub fn extended(&self, more: impl IntoIterator<Item = Value>) -> Self {
        let mut parts = self.0.clone();
        parts.extend(more);
        Key(parts)
    }

    /// Encode this key to its bytewise byte string. Encoding a well-formed
    /// `Key` (finite floats, NUL-free strings) never fails in practice, but
    /// callers that build keys from untrusted values should still check.
    pub fn encode(&self) -> Result<Vec<u8>, crate::error::CodecError> { codec::encode(&Value::List(self.0.clone())) }
}

pub const FAMILY_CORE: &str = "core";
pub const FAMILY_DATA: &str = "data";
pub const FAMILY_IDX: &str = "idx";

/// Build the `["core", ...]` key prefix.
pub fn core_prefix() -> Key { Key::new([Value::str(FAMILY_CORE)]) }

/// Build the `["data", storeName, ...]` key prefix.
pub fn data_prefix(store_name: &str) -> Key { Key::new([Value::str(FAMILY_DATA), Value::str(store_name)]) }

/// Build the `["idx", indexName, ...]` key prefix.
pub fn idx_prefix(index_name: &str) -> Key { Key::new([Value::str(FAMILY_IDX), Value::str(index_name)]) }

/// The smallest key strictly greater than `k`, with `k` as a proper prefix.
/// Appending `null` works because `null` has the smallest type tag, so any
/// continuation of `k` sorts at or above `k ++ [null]`, and no encoding of
/// `k` alone (a shorter list) can land between the two.
pub fn next(k: &Key) -> Key { k.extended([Value::Null]) }

/// The smallest byte string strictly greater than every byte string that
/// encodes a key having `k` as a componentwise prefix. Not generally a valid
/// value encoding itself.
///
/// `k`'s own encoding is a `LIST`: every element's bytes followed by an
/// `END` separator, the whole thing closed by one more `END`. Incrementing
/// the trailing byte of that full encoding (as if `k` itself were an opaque
/// byte string) would increment the closing `END`, but a key with one more
/// element continues right there with that element's tag byte (`>= 0x10`),
/// which sorts above the incremented closing byte — every extension of `k`
/// would then sort *above* the fence instead of below it. The fence must
/// instead be built by incrementing only the last element's own bytes,
/// leaving every earlier element's bytes (and separators) untouched.
pub fn stop(k: &Key) -> Result<Vec<u8>, crate::error::CodecError> {
    match k.0.split_last() {
        None => {
            // No element to single out; increment the bare `LIST`/`END` pair.
            let encoded = k.encode()?;
            Ok(codec::increment_last_non_ff(&encoded))
        }
        Some((last, init)) => {
            // `encode(List(init))` is `LIST || (elem || END) * || END`; the
            // final byte is always that closing `END`, so dropping it leaves
            // exactly the shared prefix through `init`'s own separators.
            let mut prefix_bytes = codec::encode(&Value::List(init.to_vec()))?;
            prefix_bytes.pop();
            prefix_bytes.extend(codec::increment_last_non_ff(&codec::encode(last)?));
            Ok(prefix_bytes)
        }
    }
}

/// A range of keys within a single family, resolved relative to that
/// family's prefix into the half-open `[start, limit)` byte interval the
/// engine's range iterator consumes.
#[derive(Debug, Clone, Default)]
pub struct Range {
    pub start: Option<Key>,
    pub limit: Option<Key>,
    pub start_exclusive: bool,
    pub limit_inclusive: bool,
    pub prefix: bool,
}

impl Range {
    /// Every key in the family.
    pub fn all() -> Self { Range::default() }

    /// Every key that has `k` as a prefix (e.g. every index entry for one
    /// index key, or every record whose primary key extends `k`).
    pub fn prefix(k: Key) -> Self { Range { start: Some(k), prefix: true, ..Default::default() } }

    /// The single key `k`, exactly.
    pub fn only(k: Key) -> Self {
        Range { start: Some(k.clone()), limit: Some(k), limit_inclusive: true, ..Default::default() }
    }

    pub fn lower_bound(k: Key, exclusive: bool) -> Self { Range { start: Some(k), start_exclusive: exclusive, ..Default::default() } }

    pub fn upper_bound(k: Key, inclusive: bool) -> Self { Range { limit: Some(k), limit_inclusive: inclusive, ..Default::default() } }

    pub fn bound(lower: Key, upper: Key, lower_exclusive: bool, upper_inclusive: bool) -> Self {
        Range {
            start: Some(lower),
            limit: Some(upper),
            start_exclusive: lower_exclusive,
            limit_inclusive: upper_inclusive,
            prefix: false,
        }
    }

    /// Resolve this range into a half-open `[start, limit)` byte interval,
    /// projected under `family_prefix` (e.g. `data_prefix("widgets")`).
    pub fn resolve(&self, family_prefix: &Key) -> Result<(Vec<u8>, Vec<u8>), crate::error::CodecError> {
        let mut start_key = family_prefix.clone();
        if let Some(s) = &self.start {
            start_key = start_key.extended(s.0.clone());
        }
        if self.start_exclusive {
            start_key = next(&start_key);
        }
        let start_bytes = start_key.encode()?;

        let limit_bytes = if self.prefix {
            stop(&start_key)?
        } else if let Some(l) = &self.limit {
            let mut limit_key = family_prefix.extended(l.0.clone());
            if self.limit_inclusive {
                limit_key = next(&limit_key);
            }
            limit_key.encode()?
        } else {
            // An unset, non-prefix limit runs to the end of the whole family
            // fence, not just the end of whatever the start happens to
            // prefix (that distinction matters for e.g. lowerBound ranges).
            stop(family_prefix)?
        };

        Ok((start_bytes, limit_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_is_smallest_strictly_greater_with_prefix() {
        let k = Key::new([Value::str("a")]);
        let nk = next(&k);
        assert!(k.encode().unwrap() < nk.encode().unwrap());

        let longer = k.extended([Value::str("z")]);
        assert!(nk.encode().unwrap() <= longer.encode().unwrap());
    }

    #[test]
    fn stop_bytes_is_exclusive_upper_fence_for_prefix() {
        let k = Key::new([Value::str("a")]);
        let encoded = k.encode().unwrap();
        let fence = stop(&k).unwrap();
        assert!(encoded < fence);

        let extended = k.extended([Value::str("anything")]).encode().unwrap();
        assert!(extended >= encoded && extended < fence);

        let deeply_extended = k.extended([Value::str("anything"), Value::Num(1.0), Value::List(vec![])]).encode().unwrap();
        assert!(deeply_extended < fence);

        // A sibling with a greater last element at the same position must
        // fall outside the fence.
        let sibling = Key::new([Value::str("b")]).encode().unwrap();
        assert!(sibling >= fence);
    }

    #[test]
    fn range_all_spans_exactly_the_family() {
        let family = data_prefix("widgets");
        let (start, limit) = Range::all().resolve(&family).unwrap();
        assert_eq!(start, family.encode().unwrap());
        assert!(limit > start);

        let a = family.extended([Value::str("a")]).encode().unwrap();
        let zzz = family.extended([Value::str("zzzzzz")]).encode().unwrap();
        assert!(a >= start && a < limit);
        assert!(zzz >= start && zzz < limit);
    }

    #[test]
    fn range_prefix_excludes_siblings() {
        let family = data_prefix("widgets");
        let target = Key::new([Value::str("k1")]);
        let (start, limit) = Range::prefix(target.clone()).resolve(&family).unwrap();

        let matching = family.extended(target.0.clone()).extended([Value::str("suffix")]).encode().unwrap();
        assert!(matching >= start && matching < limit);

        let sibling = family.extended([Value::str("k2")]).encode().unwrap();
        assert!(sibling >= limit);
    }

    #[test]
    fn range_exact_key_is_a_single_point() {
        let family = data_prefix("widgets");
        let target = Key::new([Value::str("k1")]);
        let (start, limit) = Range::only(target.clone()).resolve(&family).unwrap();
        let exact = family.extended(target.0.clone()).encode().unwrap();
        assert_eq!(start, exact);
        assert!(limit > exact);

        let next_sibling = family.extended([Value::str("k2")]).encode().unwrap();
        assert!(next_sibling >= limit);
    }
}
