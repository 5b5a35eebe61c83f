//!
//! Defines the storage backend trait and implementations.
//!
//! The `Backend` trait is the key-value store capability the rest of the crate is written against.
//! This allows the ledger logic (`Library`, `Transaction`) to be independent of the specific storage mechanism.

use crate::{Error, Result};
use serde_json::{Map, Value};
use std::any::Any;

mod in_memory;

pub use in_memory::InMemoryBackend;

/// A single write staged by a `Transaction` and applied by `Backend::apply`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Store `value` under `key`, replacing any previous value.
    Set { key: String, value: String },
    /// Shallow-merge the JSON object `partial` into the object stored under `key`.
    Merge { key: String, partial: String },
    /// Remove `key`. Absent keys are not an error.
    Delete { key: String },
    /// Require `key` to currently hold `value` (`None` = absent); otherwise the whole
    /// batch is rejected with `Error::Conflict`. Writes nothing.
    Expect { key: String, value: Option<String> },
}

impl WriteOp {
    /// The key this write touches.
    pub fn key(&self) -> &str {
        match self {
            WriteOp::Set { key, .. }
            | WriteOp::Merge { key, .. }
            | WriteOp::Delete { key }
            | WriteOp::Expect { key, .. } => key,
        }
    }
}

/// Backend trait abstracting the underlying key-value store.
///
/// Keys are arbitrary strings in one flat namespace and values are JSON documents
/// stored as strings. The store has no schema and no notion of entity kinds; those
/// live in the values (see `data::Record`).
///
/// All backend implementations must be `Send` and `Sync` to allow sharing across threads,
/// and implement `Any` to allow for downcasting if needed.
pub trait Backend: Send + Sync + Any {
    /// Retrieves the value stored under `key`, or `None` if the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: String) -> Result<()>;

    /// Shallow-merges the JSON object `partial` into the object stored under `key`.
    ///
    /// Top-level fields present in `partial` overwrite the stored ones; other stored
    /// fields are kept. If the key is absent, `partial` is stored as-is.
    fn merge(&mut self, key: &str, partial: &str) -> Result<()>;

    /// Removes `key`. Succeeds even if the key doesn't exist.
    fn delete(&mut self, key: &str) -> Result<()>;

    /// Lists every key in the store, in no particular order.
    fn list_keys(&self) -> Result<Vec<String>>;

    /// Retrieves several keys at once, preserving the order of `keys`.
    fn multi_get(&self, keys: &[String]) -> Result<Vec<(String, Option<String>)>> {
        keys.iter()
            .map(|key| Ok((key.clone(), self.get(key)?)))
            .collect()
    }

    /// Applies a batch of writes atomically.
    ///
    /// Either every write in `batch` becomes visible or none does. Implementations must
    /// validate the whole batch (e.g. that merge targets are JSON objects, and that every
    /// `WriteOp::Expect` holds against the state seen at that point of the batch) before
    /// mutating any state.
    fn apply(&mut self, batch: Vec<WriteOp>) -> Result<()>;

    /// Returns a reference to the backend instance as a dynamic `Any` type.
    ///
    /// This allows for downcasting to a concrete backend implementation if necessary,
    /// enabling access to implementation-specific methods such as file persistence.
    fn as_any(&self) -> &dyn Any;

    /// Returns a mutable reference to the backend instance as a dynamic `Any` type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Shallow-merges two JSON object documents, returning the serialized result.
///
/// `current` is the stored value, if any. Both documents must be JSON objects.
pub fn merge_json(current: Option<&str>, partial: &str) -> Result<String> {
    let patch = parse_object(partial)?;
    let mut merged = match current {
        Some(current) => parse_object(current)?,
        None => Map::new(),
    };
    merged.extend(patch);
    Ok(serde_json::to_string(&Value::Object(merged))?)
}

fn parse_object(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::Storage(format!(
            "cannot merge into non-object JSON value: {other}"
        ))),
    }
}
