use thiserror::Error;

/// Errors raised while encoding or decoding a [`crate::value::Value`] to/from
/// its bytewise byte string.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Never constructed: [`crate::value::Timestamp`] only ever holds a UTC
    /// instant (it is built from `chrono::DateTime<Utc>`, with no field for
    /// another offset), so there is no value this crate can encode for which
    /// this variant would apply. Kept so the error taxonomy names the
    /// constraint explicitly rather than relying on a type the caller might
    /// not inspect.
    #[error("timestamp is not UTC")]
    NonUtcTimestamp,
    #[error("string contains a NUL byte")]
    StringContainsNul,
    #[error("unsupported value type")]
    UnsupportedType,
    #[error("corrupt type tag: {0:#04x}")]
    CorruptTag(u8),
    #[error("truncated encoding")]
    Truncated,
    #[error("invalid UTF-8 in string")]
    InvalidUtf8,
}

/// Errors raised while hydrating or mutating the catalog (database/store/index specs).
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("stored version {stored} is newer than requested version {requested}")]
    VersionDowngrade { stored: u64, requested: u64 },
    #[error("catalog is corrupt: {0}")]
    CatalogCorrupt(String),
    #[error("unknown store: {0}")]
    UnknownStore(String),
    #[error("unknown index: {0}")]
    UnknownIndex(String),
    #[error("store already exists: {0}")]
    DuplicateStore(String),
    #[error("index already exists: {0}")]
    DuplicateIndex(String),
}

/// Errors raised by record-level store/index operations.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    AlreadyExists,
    #[error("unique constraint violated on index {0}")]
    UniqueConstraintViolation(String),
    #[error("failed to derive index key: {0}")]
    IndexKeyDerivationFailed(String),
}

/// Errors raised by the transaction/snapshot/migration layer.
#[derive(Debug, Error)]
pub enum TxnError {
    #[error("transaction already finished")]
    AlreadyFinished,
    #[error("commit failed: {0}")]
    CommitFailed(String),
    #[error("store {0} is out of the transaction's declared scope")]
    StoreOutOfScope(String),
    #[error("write attempted on a read-only transaction")]
    ReadOnlyViolation,
}

/// Crate-wide error type, aggregating every module's leaf error plus an
/// opaque passthrough for the underlying key-value engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Txn(#[from] TxnError),
    #[error("engine I/O error: {0}")]
    EngineIo(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
