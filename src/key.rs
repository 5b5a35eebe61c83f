//! Storage key layout.
//!
//! Keys written by this crate are namespaced by kind (`book:101`, `student:S1`,
//! `borrow:101_S1_1704067200000`), so ids of different kinds cannot collide.
//! Older clients wrote bare ids into the same key space; `KeyShape` recognizes
//! those by their syntax.

use crate::constants::{
    COMPOSITE_SEPARATOR, KEY_SEPARATOR, LEGACY_BOOK_PREFIX, LEGACY_BORROW_PREFIX,
    LEGACY_STUDENT_PREFIX,
};
use crate::data::EntityKind;
use crate::{Error, Result};

/// Composes the storage key for an entity id.
pub fn entity_key(kind: EntityKind, id: &str) -> String {
    format!("{}{KEY_SEPARATOR}{id}", kind.namespace())
}

/// Splits a namespaced key into its kind and id.
///
/// Returns `None` for keys outside every namespace (legacy or foreign keys).
pub fn parse_key(key: &str) -> Option<(EntityKind, &str)> {
    let (namespace, id) = key.split_once(KEY_SEPARATOR)?;
    let kind = EntityKind::from_namespace(namespace)?;
    Some((kind, id))
}

/// Rejects ids that would make an ambiguous key.
pub fn check_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::validation("id", "is required"));
    }
    if id.contains(KEY_SEPARATOR) {
        return Err(Error::validation(
            "id",
            format!("must not contain '{KEY_SEPARATOR}'"),
        ));
    }
    Ok(())
}

/// Builds the composite id of a borrow record: `<bookId>_<studentId>_<millis>`.
pub fn composite_id(book_id: &str, student_id: &str, timestamp_millis: i64) -> String {
    format!("{book_id}{COMPOSITE_SEPARATOR}{student_id}{COMPOSITE_SEPARATOR}{timestamp_millis}")
}

/// The kind a legacy, untagged key looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyShape {
    Book,
    Student,
    Borrow,
    Unknown,
}

impl KeyShape {
    /// Classifies a key by its syntax alone.
    ///
    /// - `borrow_...` is a borrow record;
    /// - all digits, or `book_...`, is a book;
    /// - one letter followed by digits, or `student_...`, is a student;
    /// - anything else is unknown.
    pub fn classify(key: &str) -> Self {
        if key.starts_with(LEGACY_BORROW_PREFIX) {
            KeyShape::Borrow
        } else if key.starts_with(LEGACY_BOOK_PREFIX) || is_numeric(key) {
            KeyShape::Book
        } else if key.starts_with(LEGACY_STUDENT_PREFIX) || is_letter_then_digits(key) {
            KeyShape::Student
        } else {
            KeyShape::Unknown
        }
    }

    pub fn kind(self) -> Option<EntityKind> {
        match self {
            KeyShape::Book => Some(EntityKind::Book),
            KeyShape::Student => Some(EntityKind::Student),
            KeyShape::Borrow => Some(EntityKind::Borrow),
            KeyShape::Unknown => None,
        }
    }
}

fn is_numeric(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_digit())
}

fn is_letter_then_digits(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            let rest = chars.as_str();
            !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}
