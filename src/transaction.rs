use crate::backend::{WriteOp, merge_json};
use crate::collection::Collection;
use crate::library::Library;
use crate::{Error, Result};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Represents a single, atomic transaction against the library's store.
///
/// A `Transaction` accumulates writes staged through `Collection` handles obtained via
/// `Transaction::collection` (or directly through `set`/`merge`/`delete`). Reads made
/// through the transaction see its own staged writes layered over the backend.
///
/// Calling `commit()` hands every staged write to the backend as one batch, which the
/// backend applies all-or-nothing, and then publishes a change event per written key.
/// Dropping a transaction without committing discards its writes.
///
/// Concurrency is optimistic. The transaction remembers what it read from the backend
/// (including absent keys) and the commit fails with `Error::Conflict` if any of those
/// keys changed in the meantime, so two transactions that both acted on the same
/// state cannot both land.
///
/// `Transaction` instances are typically created via `Library::begin()`.
#[derive(Clone)]
pub struct Transaction {
    /// The staged writes, wrapped in Option to support consuming on commit
    staged: Rc<RefCell<Option<Staged>>>,
    /// The library this transaction belongs to
    library: Library,
}

#[derive(Default)]
struct Staged {
    /// Writes in the order they were staged.
    ops: Vec<WriteOp>,
    /// Resolved value of every staged key; `None` marks a staged delete.
    overlay: HashMap<String, Option<String>>,
    /// First value read from the backend for each key; `None` marks an absent key.
    reads: HashMap<String, Option<String>>,
}

fn already_committed() -> Error {
    Error::InvalidOperation("Transaction has already been committed".to_string())
}

impl Transaction {
    /// Creates a new, empty transaction for a specific `Library`.
    ///
    /// This is typically called internally by `Library::begin()`.
    pub(crate) fn new(library: &Library) -> Self {
        Self {
            staged: Rc::new(RefCell::new(Some(Staged::default()))),
            library: library.clone(),
        }
    }

    /// The library this transaction writes to.
    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Gets a handle to a typed `Collection` that reads and stages writes through this transaction.
    pub fn collection<T>(&self) -> Result<T>
    where
        T: Collection,
    {
        T::new(self)
    }

    fn staged_value(&self, key: &str) -> Result<Option<Option<String>>> {
        let staged_ref = self.staged.borrow();
        let staged = staged_ref.as_ref().ok_or_else(already_committed)?;
        Ok(staged.overlay.get(key).cloned())
    }

    fn record_read(&self, key: &str, value: &Option<String>) -> Result<()> {
        let mut staged_ref = self.staged.borrow_mut();
        let staged = staged_ref.as_mut().ok_or_else(already_committed)?;
        staged
            .reads
            .entry(key.to_string())
            .or_insert_with(|| value.clone());
        Ok(())
    }

    fn stage(&self, op: WriteOp, resolved: Option<String>) -> Result<()> {
        let mut staged_ref = self.staged.borrow_mut();
        let staged = staged_ref.as_mut().ok_or_else(already_committed)?;
        staged.overlay.insert(op.key().to_string(), resolved);
        staged.ops.push(op);
        Ok(())
    }

    /// Gets the value of `key` as this transaction sees it.
    ///
    /// Staged writes take precedence; otherwise the backend is read.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(staged) = self.staged_value(key)? {
            return Ok(staged);
        }
        let value = {
            let backend = self.library.lock_backend()?;
            backend.get(key)?
        };
        self.record_read(key, &value)?;
        Ok(value)
    }

    /// Gets several keys at once, in the order given.
    pub fn multi_get(&self, keys: &[String]) -> Result<Vec<(String, Option<String>)>> {
        let overlay: HashMap<String, Option<String>> = {
            let staged_ref = self.staged.borrow();
            let staged = staged_ref.as_ref().ok_or_else(already_committed)?;
            keys.iter()
                .filter_map(|k| staged.overlay.get(k).map(|v| (k.clone(), v.clone())))
                .collect()
        };

        let missing: Vec<String> = keys
            .iter()
            .filter(|k| !overlay.contains_key(*k))
            .cloned()
            .collect();
        let mut from_backend: HashMap<String, Option<String>> = {
            let backend = self.library.lock_backend()?;
            backend.multi_get(&missing)?.into_iter().collect()
        };
        for (key, value) in &from_backend {
            self.record_read(key, value)?;
        }

        Ok(keys
            .iter()
            .map(|k| {
                let value = match overlay.get(k) {
                    Some(staged) => staged.clone(),
                    None => from_backend.remove(k).flatten(),
                };
                (k.clone(), value)
            })
            .collect())
    }

    /// Lists every key visible to this transaction: backend keys plus staged sets,
    /// minus staged deletes.
    pub fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = {
            let backend = self.library.lock_backend()?;
            backend.list_keys()?
        };

        let staged_ref = self.staged.borrow();
        let staged = staged_ref.as_ref().ok_or_else(already_committed)?;
        let mut seen: HashSet<String> = keys.iter().cloned().collect();
        for (key, value) in &staged.overlay {
            if value.is_some() && seen.insert(key.clone()) {
                keys.push(key.clone());
            }
        }
        keys.retain(|k| !matches!(staged.overlay.get(k), Some(None)));
        Ok(keys)
    }

    /// Stages storing `value` under `key`.
    ///
    /// Nothing reaches the backend until `commit()`.
    pub fn set(&self, key: &str, value: String) -> Result<()> {
        self.stage(
            WriteOp::Set {
                key: key.to_string(),
                value: value.clone(),
            },
            Some(value),
        )
    }

    /// Stages a shallow merge of the JSON object `partial` into the value under `key`.
    ///
    /// The merge is resolved immediately against the transaction's view so later reads
    /// see it, and is replayed by the backend on commit.
    pub fn merge(&self, key: &str, partial: &str) -> Result<()> {
        let current = self.get(key)?;
        let merged = merge_json(current.as_deref(), partial)?;
        self.stage(
            WriteOp::Merge {
                key: key.to_string(),
                partial: partial.to_string(),
            },
            Some(merged),
        )
    }

    /// Stages removal of `key`. Removing an absent key is not an error.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.stage(
            WriteOp::Delete {
                key: key.to_string(),
            },
            None,
        )
    }

    /// Number of writes staged so far.
    pub fn staged_len(&self) -> usize {
        self.staged
            .borrow()
            .as_ref()
            .map_or(0, |staged| staged.ops.len())
    }

    /// Commits the transaction, applying every staged write as one atomic batch.
    ///
    /// This operation consumes the `Transaction` instance. The batch opens with one
    /// `WriteOp::Expect` per key read from the backend, so the backend rejects it if
    /// another commit changed any of them. If the backend rejects the batch, none of
    /// the writes are visible and the error is returned as-is.
    ///
    /// # Returns
    /// The number of writes applied.
    ///
    /// # Errors
    /// * `Error::Conflict` - if a key read by this transaction changed before the commit
    pub fn commit(self) -> Result<usize> {
        let staged = self.staged.borrow_mut().take().ok_or_else(already_committed)?;
        if staged.ops.is_empty() {
            return Ok(0);
        }

        let count = staged.ops.len();
        let batch: Vec<WriteOp> = staged
            .reads
            .into_iter()
            .map(|(key, value)| WriteOp::Expect { key, value })
            .chain(staged.ops.iter().cloned())
            .collect();
        {
            let mut backend = self.library.lock_backend()?;
            if let Err(e) = backend.apply(batch) {
                tracing::debug!(error = %e, "Commit rejected");
                return Err(e);
            }
        }
        tracing::debug!(writes = count, "Committed transaction");

        self.library.events().publish(&staged.ops);
        Ok(count)
    }
}
