//! Borrow record lookup.

use crate::data::BorrowRecord;
use chrono::{DateTime, Utc};

/// True if the record's student id contains `needle`, ignoring case.
///
/// A blank needle matches every record.
pub fn matches_student(record: &BorrowRecord, needle: &str) -> bool {
    let needle = needle.trim();
    needle.is_empty()
        || record
            .student_id
            .to_lowercase()
            .contains(&needle.to_lowercase())
}

/// An in-memory set of borrow records with simple filters.
///
/// Built from a listing (see `BorrowLedger::records` or `Inventory::borrow_records`);
/// it does not track later changes to the store.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    records: Vec<(String, BorrowRecord)>,
}

impl SearchIndex {
    pub fn new(records: Vec<(String, BorrowRecord)>) -> Self {
        Self { records }
    }

    pub fn all(&self) -> &[(String, BorrowRecord)] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records whose student id contains `needle`, case-insensitively.
    pub fn by_student(&self, needle: &str) -> Vec<(String, BorrowRecord)> {
        self.matching(Some(needle), None)
    }

    /// Records whose loan window contains `instant`.
    pub fn active_on(&self, instant: DateTime<Utc>) -> Vec<(String, BorrowRecord)> {
        self.matching(None, Some(instant))
    }

    /// Records passing every given filter, in index order.
    pub fn matching(
        &self,
        student: Option<&str>,
        on: Option<DateTime<Utc>>,
    ) -> Vec<(String, BorrowRecord)> {
        self.records
            .iter()
            .filter(|(_, record)| student.is_none_or(|needle| matches_student(record, needle)))
            .filter(|(_, record)| on.is_none_or(|instant| record.covers(instant)))
            .cloned()
            .collect()
    }
}

impl From<Vec<(String, BorrowRecord)>> for SearchIndex {
    fn from(records: Vec<(String, BorrowRecord)>) -> Self {
        Self::new(records)
    }
}
