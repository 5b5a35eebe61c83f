use crate::Result;
use crate::data::EntityKind;
use crate::transaction::Transaction;

mod entity;
pub use entity::EntityStore;

mod ledger;
pub use ledger::BorrowLedger;

/// A typed view over one kind of record, bound to a `Transaction`.
///
/// `Collection` implementations define how records of one kind are keyed, validated,
/// read and written. They stage every change in the transaction they were created
/// from, so several collections can take part in the same atomic commit.
///
/// Users typically obtain a collection via `Transaction::collection`.
pub trait Collection: Sized {
    /// Creates a handle associated with a specific transaction.
    ///
    /// This constructor is typically called internally by `Transaction::collection`.
    fn new(txn: &Transaction) -> Result<Self>;

    /// The kind of record this collection manages.
    fn kind(&self) -> EntityKind;
}
