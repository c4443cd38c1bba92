//! The record envelope stored at every `["data", storeName, …pk]` key.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::Result;
use crate::value::Value;

/// The document payload of a record. Stored as the bytewise encoding of the
/// caller's `Value` tree — the codec's own dynamic value doubles as the
/// "self-describing document bytes" default contract from §1, so no second
/// document format is needed on top of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload(pub Vec<u8>);

impl Payload {
    pub fn from_value(value: &Value) -> Result<Self> { Ok(Payload(codec::encode(value)?)) }

    pub fn to_value(&self) -> Result<Value> { Ok(codec::decode(&self.0)?) }
}

/// The value stored at a primary record key: the caller's payload plus the
/// reverse-pointer set of every index entry this record currently owns.
/// `index_keys` is the *only* source of truth for which index entries must
/// be erased on update or delete (§3, §9 "Record's reverse-index map").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub index_keys: HashMap<String, Vec<Vec<u8>>>,
    pub value: Payload,
}

impl Record {
    pub fn new(value: Payload) -> Self { Record { index_keys: HashMap::new(), value } }

    pub fn to_bytes(&self) -> Result<Vec<u8>> { Ok(bincode::serialize(self)?) }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> { Ok(bincode::deserialize(bytes)?) }
}
