use bookkeep::backend::{Backend, InMemoryBackend, WriteOp};
use bookkeep::clock::FixedClock;
use bookkeep::data::{Book, Program, Student, Year};
use bookkeep::{Error, Library, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 2024-01-01T00:00:00Z in milliseconds.
pub const JAN_FIRST_MILLIS: i64 = 1_704_067_200_000;

/// Creates an empty library on an InMemoryBackend
pub fn setup_library() -> Library {
    Library::new(Box::new(InMemoryBackend::new()))
}

/// Creates an empty library whose clock only moves when the test says so
pub fn setup_library_with_clock() -> (Library, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::from_millis(JAN_FIRST_MILLIS));
    let library = setup_library().with_clock(clock.clone());
    (library, clock)
}

/// Midnight UTC on the given day of January 2024
pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
}

pub fn dune(quantity: u32) -> Book {
    Book::new("Dune", "Herbert", quantity)
}

pub fn ana() -> Student {
    Student::new("Ana", Year::First, Program::Bsit)
}

/// Stores book "101" (Dune, 2 copies) and student "S1" (Ana)
pub fn seed_scenario(library: &Library) {
    library
        .create_entity("101", dune(2))
        .expect("Failed to create book");
    library
        .create_entity("S1", ana())
        .expect("Failed to create student");
}

/// Creates a library holding the standard scenario
pub fn setup_scenario() -> Library {
    let library = setup_library();
    seed_scenario(&library);
    library
}

/// Raw value stored under `key`, bypassing every typed layer
pub fn raw_value(library: &Library, key: &str) -> Option<serde_json::Value> {
    library
        .read_backend(|backend| backend.get(key))
        .unwrap()
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
}

/// Helper for checking NotFound errors
pub fn assert_not_found<T: Debug>(result: Result<T>) {
    match result {
        Err(Error::NotFound { .. }) => (), // Expected
        other => panic!("Expected NotFound error, got {:?}", other),
    }
}

/// Helper for checking Validation errors on a specific field
pub fn assert_invalid_field<T: Debug>(result: Result<T>, expected_field: &str) {
    match result {
        Err(Error::Validation { field, .. }) => assert_eq!(field, expected_field),
        other => panic!(
            "Expected Validation error on '{}', got {:?}",
            expected_field, other
        ),
    }
}

/// An InMemoryBackend whose batch writes can be made to fail on demand
pub struct FailingBackend {
    inner: InMemoryBackend,
    fail_apply: Arc<AtomicBool>,
}

impl FailingBackend {
    /// Returns the backend and the switch that makes `apply` fail
    pub fn with_switch() -> (Self, Arc<AtomicBool>) {
        let fail_apply = Arc::new(AtomicBool::new(false));
        let backend = Self {
            inner: InMemoryBackend::new(),
            fail_apply: fail_apply.clone(),
        };
        (backend, fail_apply)
    }
}

impl Backend for FailingBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.inner.set(key, value)
    }

    fn merge(&mut self, key: &str, partial: &str) -> Result<()> {
        self.inner.merge(key, partial)
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.inner.delete(key)
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        self.inner.list_keys()
    }

    fn apply(&mut self, batch: Vec<WriteOp>) -> Result<()> {
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(Error::Storage("injected write failure".to_string()));
        }
        self.inner.apply(batch)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
