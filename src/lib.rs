//!
//! Bookkeep: the inventory and lending ledger of a small library.
//! This library keeps books, students and borrow records consistent inside a single flat key-value store.
//!
//! ## Core Concepts
//!
//! * **Backends (`backend::Backend`)**: The pluggable key-value store. Keys and values are strings; values are JSON.
//! * **Records (`data::Record`)**: Every value written by this crate is a tagged record, so its kind is read from the value rather than guessed from the key.
//! * **Transactions (`transaction::Transaction`)**: Stage reads and writes against the backend and commit them as one atomic batch.
//! * **Collections (`collection::Collection`)**: Typed views over a transaction:
//!     * **EntityStore (`collection::EntityStore`)**: Create/read/update/delete for books and students keyed by caller-chosen ids.
//!     * **BorrowLedger (`collection::BorrowLedger`)**: Records a loan and decrements the book's quantity in the same commit.
//! * **InventoryScanner (`scanner::InventoryScanner`)**: Classifies every entry in the store and aggregates dashboard counts.
//! * **Library (`library::Library`)**: The handle that owns the backend, the clock and the change-notification channel.

pub mod backend;
pub mod clock;
pub mod collection;
pub mod config;
pub mod constants;
pub mod data;
pub mod events;
pub mod key;
pub mod library;
pub mod scanner;
pub mod search;
pub mod transaction;

/// Re-export the `Library` struct for easier access.
pub use library::Library;

use data::EntityKind;

/// Result type used throughout the Bookkeep library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Bookkeep library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required field is missing or malformed, or a date range is inverted.
    /// Raised before anything is written.
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: EntityKind, id: String },

    /// The book has no copies left to lend.
    #[error("Book {book_id} is not available")]
    Unavailable { book_id: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The backend refused or failed a read or write.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A key the transaction read was changed by another commit before this one landed.
    /// Nothing from the transaction was written.
    #[error("Conflict on {key}: it changed after the transaction read it")]
    Conflict { key: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Shorthand for a field-level validation failure.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// True for failures of the underlying store rather than of the request.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Serialize(_) | Error::Storage(_) | Error::InvalidOperation(_)
        )
    }
}
