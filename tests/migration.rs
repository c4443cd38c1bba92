mod common;

use bytewise_db::{CatalogError, Database, Error, Key, Range, Value};

#[test]
fn migration_bumps_version_and_persists_new_catalog_entries() {
    let dir = tempdir();
    {
        let handle = Database::open("catalog-db", 1, dir.path()).unwrap();
        let _db = handle
            .migrate(|old, txn| {
                assert_eq!(old, 0);
                txn.create_store("widgets", None, false)?;
                Ok(())
            })
            .unwrap();
    }

    // Reopening at the same version hydrates without invoking the callback.
    let handle = Database::open("catalog-db", 1, dir.path()).unwrap();
    let db = handle.migrate(|_old, _txn| panic!("must not run: already at requested version")).unwrap();
    let snap = db.readonly_transaction(["widgets".to_string()]).unwrap();
    assert!(snap.store("widgets").is_ok());
}

#[test]
fn failed_migration_leaves_version_and_catalog_untouched() {
    let dir = tempdir();
    {
        let handle = Database::open("catalog-db", 1, dir.path()).unwrap();
        handle.migrate(|_old, txn| -> bytewise_db::Result<()> {
            txn.create_store("widgets", None, false)?;
            Ok(())
        }).unwrap();
    }

    // Attempt a version bump to 2 whose callback errors after creating a store.
    {
        let handle = Database::open("catalog-db", 2, dir.path()).unwrap();
        let result = handle.migrate(|_old, txn| -> bytewise_db::Result<()> {
            txn.create_store("gizmos", None, false)?;
            Err(Error::Other("intentional migration failure".into()))
        });
        assert!(result.is_err());
    }

    // Reopen at version 2: the failed migration must run again from scratch
    // (stored version is still 1, and "gizmos" must not have survived).
    let handle = Database::open("catalog-db", 2, dir.path()).unwrap();
    let mut seen_old = None;
    let db = handle
        .migrate(|old, txn| {
            seen_old = Some(old);
            assert!(txn.store("gizmos").is_err(), "gizmos must not have persisted from the discarded migration");
            txn.create_store("gizmos", None, false)?;
            Ok(())
        })
        .unwrap();
    assert_eq!(seen_old, Some(1));
    let snap = db.readonly_transaction(["gizmos".to_string()]).unwrap();
    assert!(snap.store("gizmos").is_ok());
}

#[test]
fn stored_version_newer_than_requested_fails_version_downgrade() {
    let dir = tempdir();
    {
        let handle = Database::open("catalog-db", 3, dir.path()).unwrap();
        handle.migrate(|_old, _txn| Ok(())).unwrap();
    }

    let handle = Database::open("catalog-db", 1, dir.path()).unwrap();
    let err = handle.migrate(|_old, _txn| Ok(())).unwrap_err();
    assert!(matches!(err, Error::Catalog(CatalogError::VersionDowngrade { stored: 3, requested: 1 })));
}

#[test]
fn migration_can_also_write_records_atomically_with_the_schema_change() {
    let dir = tempdir();
    let handle = Database::open("catalog-db", 1, dir.path()).unwrap();
    let db = handle
        .migrate(|_old, txn| {
            txn.create_store("widgets", None, false)?;
            let mut store = txn.store("widgets")?;
            store.put(&Key::new([Value::str("seed")]), Value::str("seeded-at-migration"))?;
            Ok(())
        })
        .unwrap();

    let snap = db.readonly_transaction(["widgets".to_string()]).unwrap();
    let store = snap.store("widgets").unwrap();
    assert_eq!(store.get(&Key::new([Value::str("seed")])).unwrap(), Some(Value::str("seeded-at-migration")));
    assert_eq!(store.count(&Range::all()).unwrap(), 1);
}

fn tempdir() -> tempfile::TempDir { tempfile::tempdir().expect("create tempdir") }
