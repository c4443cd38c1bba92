use chrono::{DateTime, Utc};
use std::fmt::Display;

/// An instant in time, UTC, with nanosecond precision. Stored as a signed
/// seconds-since-epoch plus a non-negative nanosecond-of-second, mirroring
/// the wire shape the codec needs rather than carrying a full `chrono` type
/// through comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub fn from_utc(dt: DateTime<Utc>) -> Self { Timestamp { seconds: dt.timestamp(), nanos: dt.timestamp_subsec_nanos() } }

    pub fn to_utc(self) -> Option<DateTime<Utc>> { DateTime::from_timestamp(self.seconds, self.nanos) }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self { Timestamp::from_utc(dt) }
}

/// The dynamically-typed value tree that the bytewise codec encodes and
/// decodes. Every composite `Key` is a `Value::List`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Num(f64),
    Time(Timestamp),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self { Value::Str(s.into()) }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self { Value::List(items.into_iter().collect()) }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Num(n) => write!(f, "{n}"),
            Value::Time(t) => write!(f, "{}.{:09}", t.seconds, t.nanos),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Bool(b) }
}
impl From<f64> for Value {
    fn from(n: f64) -> Self { Value::Num(n) }
}
impl From<i64> for Value {
    fn from(n: i64) -> Self { Value::Num(n as f64) }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::Str(s.to_string()) }
}
impl From<String> for Value {
    fn from(s: String) -> Self { Value::Str(s) }
}
impl From<Timestamp> for Value {
    fn from(t: Timestamp) -> Self { Value::Time(t) }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self { Value::List(items.into_iter().map(Into::into).collect()) }
}
