mod common;

use bytewise_db::{Direction, Key, Range, Value};
use common::{open_widgets, widget};

fn seeded_db() -> bytewise_db::Database {
    let db = open_widgets(1).unwrap();
    let mut txn = db.transaction(["widgets".to_string()]).unwrap();
    {
        let mut store = txn.store("widgets").unwrap();
        store.put(&Key::new([Value::str("w1")]), widget("a", "SKU-1", vec!["red"])).unwrap();
        store.put(&Key::new([Value::str("w2")]), widget("b", "SKU-2", vec!["red"])).unwrap();
        store.put(&Key::new([Value::str("w3")]), widget("c", "SKU-3", vec!["blue"])).unwrap();
    }
    txn.commit().unwrap();
    db
}

#[test]
fn store_cursor_walks_primary_keys_in_ascending_order() {
    let db = seeded_db();
    let snap = db.readonly_transaction(["widgets".to_string()]).unwrap();
    let store = snap.store("widgets").unwrap();
    let mut cursor = store.open_cursor(&Range::all(), Direction::Next).unwrap();

    let mut seen = Vec::new();
    while cursor.is_valid() {
        seen.push(cursor.key().unwrap().to_vec());
        cursor.advance_one().unwrap();
    }
    assert_eq!(seen.len(), 3);
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "ascending cursor must yield strictly increasing keys");
}

#[test]
fn store_cursor_prev_walks_in_descending_order() {
    let db = seeded_db();
    let snap = db.readonly_transaction(["widgets".to_string()]).unwrap();
    let store = snap.store("widgets").unwrap();
    let mut cursor = store.open_cursor(&Range::all(), Direction::Prev).unwrap();

    let mut seen = Vec::new();
    while cursor.is_valid() {
        seen.push(cursor.key().unwrap().to_vec());
        cursor.advance_one().unwrap();
    }
    assert_eq!(seen.len(), 3);
    assert!(seen.windows(2).all(|w| w[0] > w[1]), "descending cursor must yield strictly decreasing keys");
}

#[test]
fn index_cursor_next_unique_skips_duplicate_index_keys() {
    let db = seeded_db();
    let snap = db.readonly_transaction(["widgets".to_string()]).unwrap();
    let store = snap.store("widgets").unwrap();
    let by_tag = store.index("by_tag").unwrap();

    // Two records share the "red" tag; nextUnique must surface it once.
    let mut cursor = by_tag.open_cursor(&Range::all(), Direction::NextUnique).unwrap();
    let mut distinct_tags = 0;
    while cursor.is_valid() {
        distinct_tags += 1;
        cursor.advance_one().unwrap();
    }
    assert_eq!(distinct_tags, 2, "expected exactly the two distinct tags (red, blue)");

    let mut plain_cursor = by_tag.open_cursor(&Range::all(), Direction::Next).unwrap();
    let mut all_entries = 0;
    while plain_cursor.is_valid() {
        all_entries += 1;
        plain_cursor.advance_one().unwrap();
    }
    assert_eq!(all_entries, 3, "plain `next` must visit every entry, including duplicates under the same tag");
}

#[test]
fn cursor_continue_to_seeks_forward() {
    let db = seeded_db();
    let snap = db.readonly_transaction(["widgets".to_string()]).unwrap();
    let store = snap.store("widgets").unwrap();
    let mut cursor = store.open_cursor(&Range::all(), Direction::Next).unwrap();
    cursor.continue_to(&Key::new([Value::str("w2")])).unwrap();
    assert_eq!(cursor.primary_value().is_some(), true);
}
