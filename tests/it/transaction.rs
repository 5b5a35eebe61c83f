use crate::helpers::*;
use bookkeep::Error;
use bookkeep::collection::EntityStore;
use bookkeep::data::{Book, EntityKind, Student};
use bookkeep::events::{ChangeEvent, ChangeKind};

#[test]
fn test_reads_see_staged_writes() {
    let library = setup_library();
    let txn = library.begin().unwrap();

    let books = txn.collection::<EntityStore<Book>>().unwrap();
    books.create("101", dune(2)).unwrap();
    assert_eq!(books.read("101").unwrap(), dune(2));
    assert_eq!(books.list_all().unwrap().len(), 1);

    books.delete("101").unwrap();
    assert_not_found(books.read("101"));
    assert!(books.list_all().unwrap().is_empty());
    assert_eq!(txn.staged_len(), 2);
}

#[test]
fn test_uncommitted_writes_are_invisible() {
    let library = setup_library();
    {
        let txn = library.begin().unwrap();
        txn.collection::<EntityStore<Book>>()
            .unwrap()
            .create("101", dune(2))
            .unwrap();
        assert_not_found(library.read_entity::<Book>("101"));
        // Dropped without commit
    }
    assert_not_found(library.read_entity::<Book>("101"));
    assert_eq!(library.dashboard_counts().unwrap().total_books, 0);
}

#[test]
fn test_read_backend_sees_committed_writes_only() {
    let library = setup_scenario();
    let txn = library.begin().unwrap();
    txn.set("book:102", "{}".to_string()).unwrap();

    let keys = library.read_backend(|backend| backend.list_keys()).unwrap().unwrap();
    assert_eq!(keys.len(), 2);
    assert!(!keys.contains(&"book:102".to_string()));

    txn.commit().unwrap();
    let stored = library
        .read_backend(|backend| backend.get("book:102"))
        .unwrap()
        .unwrap();
    assert_eq!(stored.as_deref(), Some("{}"));
}

#[test]
fn test_commit_applies_every_collection() {
    let library = setup_library();
    let txn = library.begin().unwrap();
    txn.collection::<EntityStore<Book>>()
        .unwrap()
        .create("101", dune(2))
        .unwrap();
    txn.collection::<EntityStore<Student>>()
        .unwrap()
        .create("S1", ana())
        .unwrap();

    assert_eq!(txn.commit().unwrap(), 2);
    assert!(library.read_entity::<Book>("101").is_ok());
    assert!(library.read_entity::<Student>("S1").is_ok());
}

#[test]
fn test_empty_commit() {
    let library = setup_library();
    let mut events = library.subscribe();
    assert_eq!(library.begin().unwrap().commit().unwrap(), 0);
    assert!(events.try_recv().is_err());
}

#[test]
fn test_commit_fails_when_a_read_key_changed() {
    let library = setup_library();

    let first = library.begin().unwrap();
    let second = library.begin().unwrap();
    for txn in [&first, &second] {
        let books = txn.collection::<EntityStore<Book>>().unwrap();
        books.create("101", dune(1)).unwrap();
    }
    let mut events = library.subscribe();

    assert_eq!(first.commit().unwrap(), 1);
    assert!(second.commit().unwrap_err().is_conflict());

    // Only the first commit landed and was announced
    assert!(events.try_recv().is_ok());
    assert!(events.try_recv().is_err());
    assert_eq!(library.read_entity::<Book>("101").unwrap(), dune(1));
}

#[test]
fn test_unrelated_commits_do_not_conflict() {
    let library = setup_scenario();

    let first = library.begin().unwrap();
    let second = library.begin().unwrap();
    first
        .collection::<EntityStore<Book>>()
        .unwrap()
        .create("102", dune(3))
        .unwrap();
    second
        .collection::<EntityStore<Student>>()
        .unwrap()
        .delete("S1")
        .unwrap();

    first.commit().unwrap();
    second.commit().unwrap();
    assert_eq!(library.list_books().unwrap().len(), 2);
    assert!(library.list_students().unwrap().is_empty());
}

#[test]
fn test_committed_transaction_cannot_be_reused() {
    let library = setup_library();
    let txn = library.begin().unwrap();
    let handle = txn.clone();
    txn.set("k", "{}".to_string()).unwrap();
    txn.commit().unwrap();

    assert!(matches!(
        handle.set("k2", "{}".to_string()),
        Err(Error::InvalidOperation(_))
    ));
    assert!(matches!(handle.get("k"), Err(Error::InvalidOperation(_))));
    assert!(matches!(handle.commit(), Err(Error::InvalidOperation(_))));
}

#[test]
fn test_merge_resolves_against_staged_value() {
    let library = setup_library();
    let txn = library.begin().unwrap();
    txn.set("k", r#"{"a":1}"#.to_string()).unwrap();
    txn.merge("k", r#"{"b":2}"#).unwrap();

    let staged: serde_json::Value = serde_json::from_str(&txn.get("k").unwrap().unwrap()).unwrap();
    assert_eq!(staged["a"], 1);
    assert_eq!(staged["b"], 2);

    txn.commit().unwrap();
    let stored = raw_value(&library, "k").unwrap();
    assert_eq!(stored, staged);
}

#[test]
fn test_commit_publishes_change_events() {
    let library = setup_scenario();
    let mut events = library.subscribe();

    let (id, _) = library.borrow("101", "S1", day(1), day(10)).unwrap();

    assert_eq!(
        events.try_recv().unwrap(),
        ChangeEvent {
            key: "book:101".to_string(),
            kind: Some(EntityKind::Book),
            change: ChangeKind::Set,
        }
    );
    assert_eq!(
        events.try_recv().unwrap(),
        ChangeEvent {
            key: format!("borrow:{id}"),
            kind: Some(EntityKind::Borrow),
            change: ChangeKind::Set,
        }
    );
    assert!(events.try_recv().is_err());

    library
        .update_entity::<Student>("S1", bookkeep::data::Patch::new().set("studentName", "Ana Cruz"))
        .unwrap();
    let event = events.try_recv().unwrap();
    assert_eq!(event.key, "student:S1");
    assert_eq!(event.change, ChangeKind::Merge);

    library.delete_entity::<Student>("S1").unwrap();
    assert_eq!(events.try_recv().unwrap().change, ChangeKind::Delete);
}

#[test]
fn test_failed_commit_publishes_nothing() {
    let (backend, fail_apply) = FailingBackend::with_switch();
    let library = bookkeep::Library::new(Box::new(backend));
    let mut events = library.subscribe();

    fail_apply.store(true, std::sync::atomic::Ordering::SeqCst);
    assert!(library.create_entity("101", dune(1)).is_err());
    assert!(events.try_recv().is_err());
}
