//! Stateful range cursors (§4.6): `next`/`prev`/`nextUnique`/`prevUnique`
//! directions, `continue`/`advance`/`continueTo`/`continuePrimaryKey`.

use crate::codec;
use crate::error::{RecordError, Result};
use crate::key::{Key, Range};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
    NextUnique,
    PrevUnique,
}

impl Direction {
    fn is_reverse(self) -> bool { matches!(self, Direction::Prev | Direction::PrevUnique) }

    fn skips_duplicates(self) -> bool { matches!(self, Direction::NextUnique | Direction::PrevUnique) }
}

/// A materialized cursor over a resolved range. Entries are pulled eagerly
/// at `open` time (consistent with [`crate::engine::SledSnapshot`] already
/// being a point-in-time copy — there is no live iterator to hold open past
/// that point) and released once the cursor is dropped.
pub struct Cursor {
    family_prefix: Key,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    direction: Direction,
    /// Index cursors key on `[family, name, ik]` with the primary key
    /// trailing for non-unique indexes; store cursors key directly on the
    /// primary key, which is already unique, so duplicate-skipping never
    /// applies to them.
    is_index: bool,
    pos: Option<usize>,
}

impl Cursor {
    pub fn open(family_prefix: Key, mut entries: Vec<(Vec<u8>, Vec<u8>)>, direction: Direction, is_index: bool) -> Self {
        if direction.is_reverse() {
            entries.reverse();
        }
        let pos = if entries.is_empty() { None } else { Some(0) };
        Cursor { family_prefix, entries, direction, is_index, pos }
    }

    pub fn key(&self) -> Option<&[u8]> { self.pos.map(|i| self.entries[i].0.as_slice()) }

    pub fn primary_value(&self) -> Option<&[u8]> { self.pos.map(|i| self.entries[i].1.as_slice()) }

    pub fn is_valid(&self) -> bool { self.pos.is_some() }

    /// The leading `[family, name, ik]` portion of an index entry's key,
    /// used to detect duplicate index keys under `nextUnique`/`prevUnique`.
    fn unique_prefix(&self, idx: usize) -> Result<Vec<u8>> {
        let decoded = codec::decode(&self.entries[idx].0)?;
        let elements = decoded.as_list().ok_or(crate::error::CodecError::CorruptTag(0))?;
        Ok(codec::encode(&Value::List(elements.iter().take(3).cloned().collect()))?)
    }

    /// Advance one position in the configured direction. Returns `false`
    /// once the range is exhausted.
    pub fn advance_one(&mut self) -> Result<bool> {
        let Some(i) = self.pos else { return Ok(false) };

        if self.is_index && self.direction.skips_duplicates() {
            let current_prefix = self.unique_prefix(i)?;
            let mut j = i + 1;
            while j < self.entries.len() {
                if self.unique_prefix(j)? != current_prefix {
                    break;
                }
                j += 1;
            }
            self.pos = if j < self.entries.len() { Some(j) } else { None };
        } else {
            self.pos = if i + 1 < self.entries.len() { Some(i + 1) } else { None };
        }
        Ok(self.pos.is_some())
    }

    pub fn advance(&mut self, n: usize) -> Result<bool> {
        for _ in 0..n {
            if !self.advance_one()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Seek to the smallest position `>= target` (ascending directions) or
    /// largest `<= target` (descending directions), where `target` is a
    /// suffix relative to this cursor's family.
    pub fn continue_to(&mut self, target: &Key) -> Result<()> {
        let target_bytes = self.family_prefix.extended(target.0.clone()).encode()?;
        let found = if self.direction.is_reverse() {
            self.entries.iter().position(|(k, _)| k <= &target_bytes)
        } else {
            self.entries.iter().position(|(k, _)| k >= &target_bytes)
        };
        self.pos = found;
        if self.pos.is_none() {
            return Err(RecordError::NotFound.into());
        }
        Ok(())
    }

    /// Index-cursor-only: seek to the first entry whose index key is `>= ik`
    /// and whose primary-key portion is `>= pk` (disambiguating duplicate
    /// index keys under a non-unique index, whose entries carry the primary
    /// key as trailing elements).
    pub fn continue_primary_key(&mut self, ik: &Value, pk: &Key) -> Result<()> {
        let mut target = Key::new([ik.clone()]);
        target = target.extended(pk.0.clone());
        self.continue_to(&target)
    }
}

/// Build a cursor over `range` within `family_prefix`, pulling matching
/// entries from `read` (ascending byte order; reversed afterward by
/// [`Cursor::open`] for descending directions).
pub fn open(
    read: &impl crate::engine::KvSnapshot,
    family_prefix: Key,
    range: &Range,
    direction: Direction,
    is_index: bool,
) -> Result<Cursor> {
    let (start, limit) = range.resolve(&family_prefix)?;
    let entries: Vec<(Vec<u8>, Vec<u8>)> = read.range(&start, &limit, false).collect();
    Ok(Cursor::open(family_prefix, entries, direction, is_index))
}
