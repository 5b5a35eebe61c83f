use crate::helpers::*;
use bookkeep::backend::InMemoryBackend;
use bookkeep::collection::EntityStore;
use bookkeep::data::{Book, EntityKind, Patch, Program, Student, Year};
use bookkeep::{Error, Library};
use serde_json::json;

#[test]
fn test_create_then_read() {
    let library = setup_scenario();

    let book: Book = library.read_entity("101").unwrap();
    assert_eq!(book, dune(2));

    let student: Student = library.read_entity("S1").unwrap();
    assert_eq!(student.student_name, "Ana");
    assert_eq!(student.year, Year::First);
    assert_eq!(student.program, Program::Bsit);
}

#[test]
fn test_stored_values_are_tagged_and_namespaced() {
    let library = setup_scenario();

    let book = raw_value(&library, "book:101").expect("book stored under namespaced key");
    assert_eq!(book["kind"], "book");
    assert_eq!(book["bookName"], "Dune");
    assert_eq!(book["quantity"], 2);

    let student = raw_value(&library, "student:S1").expect("student stored under namespaced key");
    assert_eq!(student["kind"], "student");
    assert_eq!(student["year"], "1st Year");
    assert_eq!(student["program"], "BSIT");

    assert!(raw_value(&library, "101").is_none());
}

#[test]
fn test_ids_of_different_kinds_do_not_collide() {
    let library = setup_library();
    library.create_entity("101", dune(2)).unwrap();
    library.create_entity("101", ana()).unwrap();

    let book: Book = library.read_entity("101").unwrap();
    let student: Student = library.read_entity("101").unwrap();
    assert_eq!(book.book_name, "Dune");
    assert_eq!(student.student_name, "Ana");
}

#[test]
fn test_create_over_existing_id_fails() {
    let library = setup_scenario();

    match library.create_entity("101", Book::new("Emma", "Austen", 1)) {
        Err(Error::AlreadyExists { kind, id }) => {
            assert_eq!(kind, EntityKind::Book);
            assert_eq!(id, "101");
        }
        other => panic!("Expected AlreadyExists, got {:?}", other),
    }

    // The original is untouched
    let book: Book = library.read_entity("101").unwrap();
    assert_eq!(book.book_name, "Dune");
}

#[test]
fn test_create_validation() {
    let library = setup_library();

    assert_invalid_field(library.create_entity("", dune(1)), "id");
    assert_invalid_field(library.create_entity("book:1", dune(1)), "id");
    assert_invalid_field(library.create_entity("1", Book::new(" ", "Herbert", 1)), "bookName");
    assert_invalid_field(library.create_entity("1", Book::new("Dune", "", 1)), "authorName");
    assert_invalid_field(library.create_entity("1", dune(0)), "quantity");
    assert_invalid_field(
        library.create_entity("S1", Student::new("", Year::Second, Program::Bscs)),
        "studentName",
    );

    // Nothing was written
    assert!(library.list_books().unwrap().is_empty());
    assert!(library.list_students().unwrap().is_empty());
}

#[test]
fn test_create_from_submitted_fields() {
    let library = setup_library();

    let fields = json!({"bookName": "Dune", "authorName": "Herbert", "quantity": "3"});
    let book: Book = library
        .create_entity_from_fields("101", fields.as_object().unwrap())
        .unwrap();
    assert_eq!(book.quantity, 3);

    // The string quantity is stored as a number
    assert_eq!(raw_value(&library, "book:101").unwrap()["quantity"], 3);

    let bad_quantity = json!({"bookName": "Emma", "authorName": "Austen", "quantity": "many"});
    assert_invalid_field(
        library.create_entity_from_fields::<Book>("102", bad_quantity.as_object().unwrap()),
        "quantity",
    );

    let bad_program = json!({"studentName": "Ben", "year": "2nd Year", "program": "BSXX"});
    assert_invalid_field(
        library.create_entity_from_fields::<Student>("S2", bad_program.as_object().unwrap()),
        "program",
    );

    let bad_year = json!({"studentName": "Ben", "year": "5th Year", "program": "BSIT"});
    assert_invalid_field(
        library.create_entity_from_fields::<Student>("S2", bad_year.as_object().unwrap()),
        "year",
    );
}

#[test]
fn test_read_missing() {
    let library = setup_scenario();
    assert_not_found(library.read_entity::<Book>("999"));
    // A student id is not a book id
    assert_not_found(library.read_entity::<Book>("S1"));
}

#[test]
fn test_update_preserves_absent_fields() {
    let library = setup_scenario();

    let updated: Book = library
        .update_entity("101", Patch::new().set("quantity", 5))
        .unwrap();
    assert_eq!(updated.quantity, 5);
    assert_eq!(updated.book_name, "Dune");

    let stored: Book = library.read_entity("101").unwrap();
    assert_eq!(stored, updated);
    assert_eq!(raw_value(&library, "book:101").unwrap()["kind"], "book");
}

#[test]
fn test_update_normalizes_values() {
    let library = setup_scenario();

    library
        .update_entity::<Book>("101", Patch::new().set("quantity", "4"))
        .unwrap();
    assert_eq!(raw_value(&library, "book:101").unwrap()["quantity"], 4);

    let student: Student = library
        .update_entity("S1", Patch::new().set("year", "3rd year").set("program", "bscs"))
        .unwrap();
    assert_eq!(student.year, Year::Third);
    assert_eq!(student.program, Program::Bscs);

    let raw = raw_value(&library, "student:S1").unwrap();
    assert_eq!(raw["year"], "3rd Year");
    assert_eq!(raw["program"], "BSCS");
    assert_eq!(raw["studentName"], "Ana");
}

#[test]
fn test_update_validation() {
    let library = setup_scenario();

    assert_invalid_field(
        library.update_entity::<Book>("101", Patch::new().set("quantity", "abc")),
        "quantity",
    );
    assert_invalid_field(
        library.update_entity::<Book>("101", Patch::new().set("quantity", 0)),
        "quantity",
    );
    assert_invalid_field(
        library.update_entity::<Book>("101", Patch::new().set("bookName", "")),
        "bookName",
    );
    assert_invalid_field(
        library.update_entity::<Book>("101", Patch::new().set("color", "red")),
        "color",
    );
    assert_invalid_field(
        library.update_entity::<Book>("101", Patch::new().set("kind", "student")),
        "kind",
    );

    // None of the rejected patches were written
    let book: Book = library.read_entity("101").unwrap();
    assert_eq!(book, dune(2));
}

#[test]
fn test_empty_update_changes_nothing() {
    let library = setup_scenario();
    let mut events = library.subscribe();

    let book: Book = library.update_entity("101", Patch::new()).unwrap();
    assert_eq!(book, dune(2));
    assert!(events.try_recv().is_err());

    let txn = library.begin().unwrap();
    let students = txn.collection::<EntityStore<Student>>().unwrap();
    assert_eq!(students.update("S1", Patch::new()).unwrap(), ana());
    assert_eq!(txn.staged_len(), 0);

    // Still reports a missing entity
    assert_not_found(library.update_entity::<Book>("404", Patch::new()));
}

#[test]
fn test_update_missing() {
    let library = setup_library();
    assert_not_found(library.update_entity::<Book>("404", Patch::new().set("quantity", 1)));
}

#[test]
fn test_delete_is_idempotent() {
    let library = setup_scenario();

    library.delete_entity::<Book>("101").unwrap();
    assert_not_found(library.read_entity::<Book>("101"));

    library.delete_entity::<Book>("101").unwrap();
    library.delete_entity::<Student>("never-existed").unwrap();

    // The student is unaffected
    assert!(library.read_entity::<Student>("S1").is_ok());
}

#[test]
fn test_list_with_predicate() {
    let library = setup_library();
    library.create_entity("101", dune(2)).unwrap();
    library.create_entity("102", Book::new("Emma", "Austen", 1)).unwrap();
    library.create_entity("103", Book::new("Persuasion", "Austen", 4)).unwrap();
    library.create_entity("S1", ana()).unwrap();

    let txn = library.begin().unwrap();
    let books = txn.collection::<EntityStore<Book>>().unwrap();

    let mut austen: Vec<String> = books
        .list(|book| book.author_name == "Austen")
        .unwrap()
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    austen.sort();
    assert_eq!(austen, vec!["102", "103"]);

    assert_eq!(books.list_all().unwrap().len(), 3);
    assert_eq!(library.list_students().unwrap().len(), 1);
}

#[test]
fn test_list_skips_unreadable_values() {
    let backend = InMemoryBackend::from_entries([
        ("book:bad", "not json"),
        (
            "book:wrong",
            r#"{"kind":"student","studentName":"Ana","year":"1st Year","program":"BSIT"}"#,
        ),
        ("101", r#"{"bookName":"Legacy","authorName":"Someone","quantity":"1"}"#),
    ]);
    let library = Library::new(Box::new(backend));
    library.create_entity("102", dune(1)).unwrap();

    let books = library.list_books().unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].0, "102");

    // A stored value of the wrong kind is a storage error when read directly
    assert!(library.read_entity::<Book>("wrong").unwrap_err().is_storage());
}
