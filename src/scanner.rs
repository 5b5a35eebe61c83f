//! Whole-store classification and dashboard aggregation.
//!
//! The scanner reads every entry in the backend and decides what kind of record it
//! holds. Values written by this crate carry a `kind` tag; older untagged values are
//! recognized by the shape of their key when `ScanOptions::legacy_key_shapes` is set.

use crate::Result;
use crate::constants::LEGACY_BORROWED_FLAG;
use crate::data::{Book, BorrowRecord, EntityKind, Record, Student};
use crate::events::ChangeEvent;
use crate::key::{KeyShape, parse_key};
use crate::library::Library;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Controls how untagged entries are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Classify untagged values by key shape. When off they are reported as unknown.
    pub legacy_key_shapes: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            legacy_key_shapes: true,
        }
    }
}

/// What a single stored entry turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// A value carrying its own kind tag.
    Tagged(Record),
    /// An untagged value whose key looks like `kind`. `value` is `None` when the
    /// payload is not JSON at all.
    Legacy { kind: EntityKind, value: Option<Value> },
    Unknown,
}

impl Classification {
    pub fn kind(&self) -> Option<EntityKind> {
        match self {
            Classification::Tagged(record) => Some(record.kind()),
            Classification::Legacy { kind, .. } => Some(*kind),
            Classification::Unknown => None,
        }
    }
}

/// Classifies one entry. The stored tag wins over the key shape.
pub fn classify(key: &str, raw: &str, options: &ScanOptions) -> Classification {
    if let Ok(record) = Record::parse(raw) {
        return Classification::Tagged(record);
    }
    if !options.legacy_key_shapes {
        return Classification::Unknown;
    }
    match KeyShape::classify(key).kind() {
        Some(kind) => Classification::Legacy {
            kind,
            value: serde_json::from_str(raw).ok(),
        },
        None => Classification::Unknown,
    }
}

/// Whether a legacy borrow payload is flagged as still out.
///
/// Follows JavaScript truthiness, which is how the flag was originally written and read.
fn is_flagged_borrowed(value: Option<&Value>) -> bool {
    match value.and_then(|v| v.get(LEGACY_BORROWED_FLAG)) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Aggregate figures shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardCounts {
    pub total_books: usize,
    pub total_students: usize,
    /// Loans still out. Every tagged borrow record counts, since loans are never closed;
    /// a legacy borrow entry counts only if it carries a truthy `isBorrowed`.
    pub active_borrowed: usize,
}

/// Everything a scan found, with typed listings sorted by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    pub books: Vec<(String, Book)>,
    pub students: Vec<(String, Student)>,
    pub borrow_records: Vec<(String, BorrowRecord)>,
    pub counts: DashboardCounts,
    /// Keys that could not be attributed to any kind.
    pub unknown: Vec<String>,
}

impl Inventory {
    fn add(&mut self, key: String, classification: Classification) {
        match classification {
            Classification::Tagged(record) => {
                let id = parse_key(&key)
                    .map(|(_, id)| id.to_string())
                    .unwrap_or(key);
                match record {
                    Record::Book(book) => {
                        self.counts.total_books += 1;
                        self.books.push((id, book));
                    }
                    Record::Student(student) => {
                        self.counts.total_students += 1;
                        self.students.push((id, student));
                    }
                    Record::Borrow(record) => {
                        self.counts.active_borrowed += 1;
                        self.borrow_records.push((id, record));
                    }
                }
            }
            Classification::Legacy { kind, value } => match kind {
                EntityKind::Book => {
                    self.counts.total_books += 1;
                    push_parsed(&mut self.books, key, value);
                }
                EntityKind::Student => {
                    self.counts.total_students += 1;
                    push_parsed(&mut self.students, key, value);
                }
                EntityKind::Borrow => {
                    if is_flagged_borrowed(value.as_ref()) {
                        self.counts.active_borrowed += 1;
                    }
                    push_parsed(&mut self.borrow_records, key, value);
                }
            },
            Classification::Unknown => self.unknown.push(key),
        }
    }

    fn sort(&mut self) {
        self.books.sort_by(|a, b| a.0.cmp(&b.0));
        self.students.sort_by(|a, b| a.0.cmp(&b.0));
        self.borrow_records.sort_by(|a, b| a.0.cmp(&b.0));
        self.unknown.sort();
    }
}

fn push_parsed<T: DeserializeOwned>(
    list: &mut Vec<(String, T)>,
    key: String,
    value: Option<Value>,
) {
    let Some(value) = value else { return };
    match serde_json::from_value(value) {
        Ok(parsed) => list.push((key, parsed)),
        Err(e) => tracing::debug!(key = %key, error = %e, "Legacy entry does not parse"),
    }
}

/// Reads the whole store and classifies every entry.
///
/// Scans read the backend directly and never see uncommitted transaction writes.
#[derive(Clone)]
pub struct InventoryScanner {
    library: Library,
    options: ScanOptions,
}

impl InventoryScanner {
    pub fn new(library: &Library, options: ScanOptions) -> Self {
        Self {
            library: library.clone(),
            options,
        }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Enumerates every key and builds the full inventory.
    pub fn scan(&self) -> Result<Inventory> {
        let entries = {
            let backend = self.library.lock_backend()?;
            let keys = backend.list_keys()?;
            backend.multi_get(&keys)?
        };

        let mut inventory = Inventory::default();
        for (key, value) in entries {
            let Some(raw) = value else { continue };
            let classification = classify(&key, &raw, &self.options);
            inventory.add(key, classification);
        }
        inventory.sort();

        tracing::debug!(
            books = inventory.counts.total_books,
            students = inventory.counts.total_students,
            active_borrowed = inventory.counts.active_borrowed,
            unknown = inventory.unknown.len(),
            "Scanned inventory"
        );
        Ok(inventory)
    }

    pub fn counts(&self) -> Result<DashboardCounts> {
        Ok(self.scan()?.counts)
    }
}

/// Dashboard counts that are recomputed only after the store changes.
///
/// The view subscribes to the library's change channel when created. `refresh`
/// drains pending notifications and rescans only if a commit happened since the
/// last scan (or on first use, or after missing notifications).
pub struct DashboardView {
    scanner: InventoryScanner,
    receiver: broadcast::Receiver<ChangeEvent>,
    counts: Option<DashboardCounts>,
    scans: usize,
}

impl DashboardView {
    pub fn new(library: &Library) -> Self {
        Self {
            scanner: library.scanner(),
            receiver: library.subscribe(),
            counts: None,
            scans: 0,
        }
    }

    /// Returns current counts, rescanning if anything changed.
    pub fn refresh(&mut self) -> Result<DashboardCounts> {
        let mut dirty = self.counts.is_none();
        loop {
            match self.receiver.try_recv() {
                Ok(_) => dirty = true,
                Err(TryRecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "Dashboard fell behind change notifications");
                    dirty = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        match self.counts {
            Some(counts) if !dirty => Ok(counts),
            _ => {
                let counts = self.scanner.counts()?;
                self.scans += 1;
                self.counts = Some(counts);
                Ok(counts)
            }
        }
    }

    /// Counts from the last scan, if any.
    pub fn counts(&self) -> Option<DashboardCounts> {
        self.counts
    }

    /// How many full scans this view has performed.
    pub fn scans(&self) -> usize {
        self.scans
    }
}
