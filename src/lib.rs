pub mod catalog;
pub mod codec;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod index;
pub mod key;
pub mod record;
pub mod store;
pub mod transaction;
pub mod value;

pub use cursor::{Cursor, Direction};
pub use engine::{KvEngine, KvSnapshot, KvTxn, OpenOptions, SledEngine, SledSnapshot, SledTxn};
pub use error::{CatalogError, CodecError, Error, RecordError, Result, TxnError};
pub use index::KeyFn;
pub use key::{Key, Range};
pub use transaction::{Database, IndexReader, MigrationTransaction, OpenHandle, Snapshot, StoreReader, StoreWriter, Transaction};
pub use value::{Timestamp, Value};
