//! Constants used throughout the Bookkeep library.
//!
//! This module provides central definitions for key namespaces, separators and
//! the markers older clients used in their keys and values.

/// Separator between the kind namespace and the id in a storage key.
pub const KEY_SEPARATOR: char = ':';

/// Namespace for book keys (`book:<id>`).
pub const BOOK_NAMESPACE: &str = "book";

/// Namespace for student keys (`student:<id>`).
pub const STUDENT_NAMESPACE: &str = "student";

/// Namespace for borrow record keys (`borrow:<bookId>_<studentId>_<millis>`).
pub const BORROW_NAMESPACE: &str = "borrow";

/// Separator between the parts of a borrow record's composite id.
pub const COMPOSITE_SEPARATOR: char = '_';

/// Legacy prefix of untagged borrow records.
pub const LEGACY_BORROW_PREFIX: &str = "borrow_";

/// Legacy prefix of untagged books.
pub const LEGACY_BOOK_PREFIX: &str = "book_";

/// Legacy prefix of untagged students.
pub const LEGACY_STUDENT_PREFIX: &str = "student_";

/// Legacy flag marking an untagged borrow record as an open loan.
pub const LEGACY_BORROWED_FLAG: &str = "isBorrowed";

/// Field holding the record kind in every tagged value.
pub const KIND_FIELD: &str = "kind";
