mod common;

use bytewise_db::{Key, Range, Value};
use common::{open_widgets, widget};

#[test]
fn put_over_existing_key_erases_stale_index_entries() {
    let db = open_widgets(1).unwrap();
    let pk = Key::new([Value::str("w1")]);

    let mut txn = db.transaction(["widgets".to_string()]).unwrap();
    {
        let mut store = txn.store("widgets").unwrap();
        store.put(&pk, widget("a", "SKU-1", vec!["red", "round"])).unwrap();
        store.put(&pk, widget("a", "SKU-1", vec!["blue"])).unwrap();
    }
    txn.commit().unwrap();

    let snap = db.readonly_transaction(["widgets".to_string()]).unwrap();
    let store = snap.store("widgets").unwrap();
    let by_tag = store.index("by_tag").unwrap();

    assert!(by_tag.get(&Range::prefix(Key::new([Value::str("red")]))).unwrap().is_none());
    assert!(by_tag.get(&Range::prefix(Key::new([Value::str("round")]))).unwrap().is_none());
    assert!(by_tag.get(&Range::prefix(Key::new([Value::str("blue")]))).unwrap().is_some());
    assert_eq!(store.get(&pk).unwrap(), Some(widget("a", "SKU-1", vec!["blue"])));
}

#[test]
fn delete_removes_record_and_every_owned_index_entry() {
    let db = open_widgets(1).unwrap();
    let pk = Key::new([Value::str("w1")]);

    let mut txn = db.transaction(["widgets".to_string()]).unwrap();
    {
        let mut store = txn.store("widgets").unwrap();
        store.put(&pk, widget("a", "SKU-1", vec!["red", "round"])).unwrap();
    }
    txn.commit().unwrap();

    let mut txn = db.transaction(["widgets".to_string()]).unwrap();
    {
        let mut store = txn.store("widgets").unwrap();
        store.delete(&pk).unwrap();
    }
    txn.commit().unwrap();

    let snap = db.readonly_transaction(["widgets".to_string()]).unwrap();
    let store = snap.store("widgets").unwrap();
    assert!(store.get(&pk).unwrap().is_none());

    let by_sku = store.index("by_sku").unwrap();
    assert!(by_sku.get(&Range::only(Key::new([Value::str("SKU-1")]))).unwrap().is_none());
    let by_tag = store.index("by_tag").unwrap();
    assert!(by_tag.get(&Range::prefix(Key::new([Value::str("red")]))).unwrap().is_none());
    assert!(by_tag.get(&Range::prefix(Key::new([Value::str("round")]))).unwrap().is_none());
    assert_eq!(store.count(&Range::all()).unwrap(), 0);
}

#[test]
fn delete_of_absent_key_fails_not_found() {
    let db = open_widgets(1).unwrap();
    let mut txn = db.transaction(["widgets".to_string()]).unwrap();
    let mut store = txn.store("widgets").unwrap();
    let err = store.delete(&Key::new([Value::str("missing")])).unwrap_err();
    assert!(matches!(err, bytewise_db::Error::Record(bytewise_db::RecordError::NotFound)));
}

#[test]
fn clear_empties_store_and_all_its_indexes() {
    let db = open_widgets(1).unwrap();
    let mut txn = db.transaction(["widgets".to_string()]).unwrap();
    {
        let mut store = txn.store("widgets").unwrap();
        for (i, sku) in ["SKU-1", "SKU-2"].iter().enumerate() {
            store.put(&Key::new([Value::str(format!("w{i}"))]), widget("n", sku, vec!["t"])).unwrap();
        }
        store.clear().unwrap();
    }
    txn.commit().unwrap();

    let snap = db.readonly_transaction(["widgets".to_string()]).unwrap();
    let store = snap.store("widgets").unwrap();
    assert_eq!(store.count(&Range::all()).unwrap(), 0);
    let by_sku = store.index("by_sku").unwrap();
    assert_eq!(by_sku.count(&Range::all()).unwrap(), 0);
    let by_tag = store.index("by_tag").unwrap();
    assert_eq!(by_tag.count(&Range::all()).unwrap(), 0);
}
