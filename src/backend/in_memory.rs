use crate::backend::{Backend, WriteOp, merge_json};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// A simple in-memory backend implementation using a `HashMap` for storage.
///
/// This backend is suitable for testing, development, or a single local client
/// that loads the whole store at startup and writes it back afterwards.
///
/// It provides basic persistence capabilities via `save_to_file` and
/// `load_from_file`, serializing the `HashMap` to JSON.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct InMemoryBackend {
    entries: HashMap<String, String>,
}

impl InMemoryBackend {
    /// Creates a new, empty `InMemoryBackend`.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Creates a backend pre-populated with raw key/value pairs.
    ///
    /// Useful for loading data written by older clients, whose values carry no kind tag.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Saves the entire backend state to a specified file as JSON.
    ///
    /// The state is written to a sibling temporary file first and then renamed over
    /// `path`, so a crash mid-write never leaves a truncated store behind.
    ///
    /// # Arguments
    /// * `path` - The path to the file where the state should be saved.
    ///
    /// # Returns
    /// A `Result` indicating success or an I/O or serialization error.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string(self)?;

        let mut tmp = path.as_os_str().to_os_string();
        tmp.push(".tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), keys = self.entries.len(), "Saved store");
        Ok(())
    }

    /// Loads the backend state from a specified JSON file.
    ///
    /// If the file does not exist, a new, empty `InMemoryBackend` is returned.
    ///
    /// # Arguments
    /// * `path` - The path to the file from which to load the state.
    ///
    /// # Returns
    /// A `Result` containing the loaded `InMemoryBackend` or an I/O or deserialization error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No store file; starting empty");
            return Ok(Self::new());
        }

        let json = fs::read_to_string(path)?;
        let backend: Self = serde_json::from_str(&json)?;
        tracing::debug!(path = %path.display(), keys = backend.entries.len(), "Loaded store");
        Ok(backend)
    }
}

impl Backend for InMemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn merge(&mut self, key: &str, partial: &str) -> Result<()> {
        let merged = merge_json(self.entries.get(key).map(String::as_str), partial)?;
        self.entries.insert(key.to_string(), merged);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn apply(&mut self, batch: Vec<WriteOp>) -> Result<()> {
        // Resolve every write against a scratch overlay first; nothing touches
        // `entries` until the whole batch is known to succeed.
        let mut overlay: HashMap<String, Option<String>> = HashMap::new();
        for op in &batch {
            match op {
                WriteOp::Set { key, value } => {
                    overlay.insert(key.clone(), Some(value.clone()));
                }
                WriteOp::Merge { key, partial } => {
                    let current = match overlay.get(key) {
                        Some(staged) => staged.clone(),
                        None => self.entries.get(key).cloned(),
                    };
                    let merged = merge_json(current.as_deref(), partial).map_err(|e| {
                        Error::Storage(format!("batch rejected, merge into {key} failed: {e}"))
                    })?;
                    overlay.insert(key.clone(), Some(merged));
                }
                WriteOp::Delete { key } => {
                    overlay.insert(key.clone(), None);
                }
                WriteOp::Expect { key, value } => {
                    let current = match overlay.get(key) {
                        Some(staged) => staged.as_ref(),
                        None => self.entries.get(key),
                    };
                    if current != value.as_ref() {
                        return Err(Error::Conflict { key: key.clone() });
                    }
                }
            }
        }

        for (key, value) in overlay {
            match value {
                Some(value) => {
                    self.entries.insert(key, value);
                }
                None => {
                    self.entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
