//!
//! Defines the records stored in the library and the traits that tie them to storage.
//!
//! `Record` is the tagged envelope every value is written as, `EntityKind` names the kinds,
//! and the `Entity` trait describes the caller-keyed kinds (books and students) that the
//! `EntityStore` collection manages. `Patch` carries partial updates.

mod fields;
mod record;
mod types;

pub use fields::{Fields, Patch};
pub use record::{EntityKind, Record};
pub use types::{Book, BorrowRecord, Entity, Program, Student, Year};
