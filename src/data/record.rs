use crate::Result;
use crate::constants::{BOOK_NAMESPACE, BORROW_NAMESPACE, STUDENT_NAMESPACE};
use crate::data::{Book, BorrowRecord, Student};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of record that share the store's key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Book,
    Student,
    Borrow,
}

impl EntityKind {
    /// Every kind, in display order.
    pub const ALL: [EntityKind; 3] = [EntityKind::Book, EntityKind::Student, EntityKind::Borrow];

    /// The key namespace for this kind.
    pub fn namespace(self) -> &'static str {
        match self {
            EntityKind::Book => BOOK_NAMESPACE,
            EntityKind::Student => STUDENT_NAMESPACE,
            EntityKind::Borrow => BORROW_NAMESPACE,
        }
    }

    pub fn from_namespace(namespace: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.namespace() == namespace)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Book => "Book",
            EntityKind::Student => "Student",
            EntityKind::Borrow => "Borrow record",
        })
    }
}

/// The envelope every value written by this crate is stored as.
///
/// The `kind` field is serialized alongside the payload's own fields, so a stored
/// book looks like `{"kind":"book","bookName":...}`. Listing and classification
/// read the kind from here instead of from the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Book(Book),
    Student(Student),
    Borrow(BorrowRecord),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Book(_) => EntityKind::Book,
            Record::Student(_) => EntityKind::Student,
            Record::Borrow(_) => EntityKind::Borrow,
        }
    }

    /// Parses a stored value. Fails for untagged or malformed values.
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
