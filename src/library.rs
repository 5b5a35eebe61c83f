use crate::backend::Backend;
use crate::clock::{Clock, SystemClock};
use crate::collection::{BorrowLedger, EntityStore};
use crate::config::LibraryConfig;
use crate::data::{Book, BorrowRecord, Entity, Fields, Patch, Student};
use crate::events::{ChangeEvent, EventBus};
use crate::scanner::{DashboardCounts, DashboardView, InventoryScanner, ScanOptions};
use crate::search::SearchIndex;
use crate::transaction::Transaction;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

/// The handle to a library's store.
///
/// A `Library` owns the backend, the clock used to stamp borrow records and the
/// channel on which committed changes are announced. It is cheap to clone; clones
/// share all three.
///
/// Each method of the narrow API below runs in its own transaction and commits it
/// before returning. Use `begin()` to group several operations into one commit.
#[derive(Clone)]
pub struct Library {
    /// The backend used by the library.
    backend: Arc<Mutex<Box<dyn Backend>>>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    scan_options: ScanOptions,
}

impl Library {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend: Arc::new(Mutex::new(backend)),
            clock: Arc::new(SystemClock),
            events: EventBus::default(),
            scan_options: ScanOptions::default(),
        }
    }

    /// Builds a library configured from `config`.
    pub fn from_config(backend: Box<dyn Backend>, config: &LibraryConfig) -> Self {
        Self::new(backend)
            .with_scan_options(config.scan)
            .with_event_capacity(config.event_capacity)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_scan_options(mut self, options: ScanOptions) -> Self {
        self.scan_options = options;
        self
    }

    /// Replaces the change channel. Existing subscribers stop receiving events.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.events = EventBus::new(capacity);
        self
    }

    /// Runs `f` with shared access to the backend, e.g. to downcast it and save it.
    ///
    /// Access is read-only: every write goes through a `Transaction`, so change
    /// notifications stay in step with the store.
    pub fn read_backend<R>(&self, f: impl FnOnce(&dyn Backend) -> R) -> Result<R> {
        let backend = self.lock_backend()?;
        Ok(f(backend.as_ref()))
    }

    pub(crate) fn lock_backend(&self) -> Result<MutexGuard<'_, Box<dyn Backend>>> {
        self.backend
            .lock()
            .map_err(|_| Error::Storage("Failed to lock backend".to_string()))
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.events
    }

    /// Starts a new transaction.
    pub fn begin(&self) -> Result<Transaction> {
        Ok(Transaction::new(self))
    }

    /// Subscribes to change notifications for every subsequent commit.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    pub fn scanner(&self) -> InventoryScanner {
        InventoryScanner::new(self, self.scan_options)
    }

    /// A dashboard that rescans only after commits.
    pub fn dashboard_view(&self) -> DashboardView {
        DashboardView::new(self)
    }

    /// Stores a new book or student under `id`.
    pub fn create_entity<T: Entity>(&self, id: &str, entity: T) -> Result<()> {
        let txn = self.begin()?;
        txn.collection::<EntityStore<T>>()?.create(id, entity)?;
        txn.commit()?;
        Ok(())
    }

    /// Stores a new book or student built from raw submitted fields.
    pub fn create_entity_from_fields<T: Entity>(&self, id: &str, fields: &Fields) -> Result<T> {
        let txn = self.begin()?;
        let entity = txn
            .collection::<EntityStore<T>>()?
            .create_from_fields(id, fields)?;
        txn.commit()?;
        Ok(entity)
    }

    pub fn read_entity<T: Entity>(&self, id: &str) -> Result<T> {
        self.begin()?.collection::<EntityStore<T>>()?.read(id)
    }

    /// Merges `patch` into the stored entity and returns the updated entity.
    pub fn update_entity<T: Entity>(&self, id: &str, patch: Patch) -> Result<T> {
        let txn = self.begin()?;
        let entity = txn.collection::<EntityStore<T>>()?.update(id, patch)?;
        txn.commit()?;
        Ok(entity)
    }

    /// Removes an entity. Removing one that does not exist succeeds.
    pub fn delete_entity<T: Entity>(&self, id: &str) -> Result<()> {
        let txn = self.begin()?;
        txn.collection::<EntityStore<T>>()?.delete(id)?;
        txn.commit()?;
        Ok(())
    }

    pub fn list_books(&self) -> Result<Vec<(String, Book)>> {
        self.begin()?.collection::<EntityStore<Book>>()?.list_all()
    }

    pub fn list_students(&self) -> Result<Vec<(String, Student)>> {
        self.begin()?.collection::<EntityStore<Student>>()?.list_all()
    }

    /// Lends one copy of a book, decrementing its quantity and recording the loan
    /// in a single atomic commit.
    ///
    /// # Returns
    /// The composite id of the new borrow record, and the record.
    pub fn borrow(
        &self,
        book_id: &str,
        student_id: &str,
        date_borrow: DateTime<Utc>,
        date_return: DateTime<Utc>,
    ) -> Result<(String, BorrowRecord)> {
        let txn = self.begin()?;
        let borrowed = txn.collection::<BorrowLedger>()?.borrow(
            book_id,
            student_id,
            date_borrow,
            date_return,
        )?;
        txn.commit()?;
        Ok(borrowed)
    }

    /// Lists borrow records, optionally only those whose student id contains `student`
    /// (case-insensitive).
    pub fn list_borrow_records(
        &self,
        student: Option<&str>,
    ) -> Result<Vec<(String, BorrowRecord)>> {
        let records = self.begin()?.collection::<BorrowLedger>()?.records()?;
        let index = SearchIndex::new(records);
        Ok(index.matching(student, None))
    }

    pub fn dashboard_counts(&self) -> Result<DashboardCounts> {
        self.scanner().counts()
    }
}
