use crate::collection::{Collection, EntityStore};
use crate::data::{Book, BorrowRecord, EntityKind, Record, Student};
use crate::key::{composite_id, entity_key, parse_key};
use crate::transaction::Transaction;
use crate::{Error, Result};
use chrono::{DateTime, Utc};

/// The lending ledger.
///
/// A `BorrowLedger` appends immutable `BorrowRecord`s under `borrow:<bookId>_<studentId>_<millis>`
/// and keeps the borrowed book's quantity in step. Both writes are staged in the
/// transaction the ledger was created from, so they reach the backend in the same
/// atomic batch when that transaction commits.
pub struct BorrowLedger {
    txn: Transaction,
}

impl Collection for BorrowLedger {
    fn new(txn: &Transaction) -> Result<Self> {
        Ok(Self { txn: txn.clone() })
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Borrow
    }
}

impl BorrowLedger {
    /// Lends one copy of `book_id` to `student_id` for the given window.
    ///
    /// Stages the book's decremented quantity and the new borrow record. Nothing is
    /// staged if any check fails.
    ///
    /// # Returns
    /// The composite id the record was stored under, and the record itself.
    ///
    /// # Errors
    /// * `Error::NotFound` - if the book or the student does not exist
    /// * `Error::Validation` - if `date_return` is not after `date_borrow`
    /// * `Error::Unavailable` - if the book has no copies left
    #[tracing::instrument(level = "info", skip(self), err)]
    pub fn borrow(
        &self,
        book_id: &str,
        student_id: &str,
        date_borrow: DateTime<Utc>,
        date_return: DateTime<Utc>,
    ) -> Result<(String, BorrowRecord)> {
        let books = self.txn.collection::<EntityStore<Book>>()?;
        let students = self.txn.collection::<EntityStore<Student>>()?;

        let mut book = books.read(book_id)?;
        students.read(student_id)?;

        let record = BorrowRecord::new(book_id, student_id, date_borrow, date_return)?;
        if !book.is_available() {
            return Err(Error::Unavailable {
                book_id: book_id.to_string(),
            });
        }

        book.quantity -= 1;
        let remaining = book.quantity;
        books.put(book_id, book)?;

        let id = self.fresh_id(book_id, student_id)?;
        self.txn.set(
            &entity_key(EntityKind::Borrow, &id),
            Record::Borrow(record.clone()).to_json()?,
        )?;

        tracing::info!(id = %id, remaining, "Staged borrow");
        Ok((id, record))
    }

    /// Derives a composite id from the clock, moving forward a millisecond at a time
    /// past ids that are already taken.
    fn fresh_id(&self, book_id: &str, student_id: &str) -> Result<String> {
        let mut millis = self.txn.library().clock().now_millis();
        loop {
            let id = composite_id(book_id, student_id, millis);
            if self.txn.get(&entity_key(EntityKind::Borrow, &id))?.is_none() {
                return Ok(id);
            }
            millis += 1;
        }
    }

    /// Retrieves the borrow record stored under a composite id.
    pub fn record(&self, id: &str) -> Result<BorrowRecord> {
        let key = entity_key(EntityKind::Borrow, id);
        let raw = self
            .txn
            .get(&key)?
            .ok_or_else(|| Error::not_found(EntityKind::Borrow, id))?;
        match Record::parse(&raw)? {
            Record::Borrow(record) => Ok(record),
            other => Err(Error::Storage(format!(
                "{key} holds a {}, expected a {}",
                other.kind(),
                EntityKind::Borrow
            ))),
        }
    }

    /// Lists every tagged borrow record as (composite id, record) pairs.
    ///
    /// Untagged legacy entries are not included; `InventoryScanner` reports those.
    pub fn records(&self) -> Result<Vec<(String, BorrowRecord)>> {
        let keys: Vec<String> = self
            .txn
            .list_keys()?
            .into_iter()
            .filter(|key| matches!(parse_key(key), Some((EntityKind::Borrow, _))))
            .collect();

        let mut result = Vec::new();
        for (key, value) in self.txn.multi_get(&keys)? {
            let (Some(raw), Some((_, id))) = (value, parse_key(&key)) else {
                continue;
            };
            match Record::parse(&raw) {
                Ok(Record::Borrow(record)) => result.push((id.to_string(), record)),
                Ok(_) => {}
                Err(e) => tracing::debug!(key = %key, error = %e, "Skipping unreadable record"),
            }
        }
        Ok(result)
    }
}
