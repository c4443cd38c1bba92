use std::str::FromStr;
use tracing::Level;

use bytewise_db::{Database, OpenHandle};

#[ctor::ctor]
fn init_tracing() {
    if let Ok(level) = std::env::var("LOG_LEVEL") {
        tracing_subscriber::fmt().with_max_level(Level::from_str(&level).unwrap()).with_test_writer().init();
    } else {
        tracing_subscriber::fmt().with_max_level(Level::WARN).with_test_writer().init();
    }
}

/// Opens a fresh temporary `widgets` store with a `by_tag` multi-entry index
/// and a `by_sku` unique index, both keyed off the document's list shape
/// `[name, sku, tags]`.
#[allow(unused)]
pub fn open_widgets(requested_version: u64) -> bytewise_db::Result<Database> {
    let handle: OpenHandle = Database::temporary("widgets-db", requested_version)?;
    handle.migrate(|_old, txn| {
        txn.create_store("widgets", None, false)?;
        txn.create_index("widgets", "by_sku", Some("1".into()), true, false)?;
        txn.create_index("widgets", "by_tag", Some("2".into()), false, true)?;
        Ok(())
    })
}

#[allow(unused)]
pub fn widget(name: &str, sku: &str, tags: Vec<&str>) -> bytewise_db::Value {
    bytewise_db::Value::list(vec![
        bytewise_db::Value::str(name),
        bytewise_db::Value::str(sku),
        bytewise_db::Value::list(tags.into_iter().map(bytewise_db::Value::str)),
    ])
}
