use crate::collection::Collection;
use crate::data::{Entity, EntityKind, Fields, Patch, Record};
use crate::key::{check_id, entity_key, parse_key};
use crate::transaction::Transaction;
use crate::{Error, Result};
use serde_json::Value;
use std::marker::PhantomData;

/// Keyed CRUD over one entity kind.
///
/// `EntityStore` stores each entity under `<kind>:<id>`, where the id is chosen by the
/// caller, and writes it as a tagged `Record`. Because the kind is part of the key, a
/// book and a student may share the same id without overwriting each other.
///
/// # Type Parameters
/// - `T`: The entity type (`Book` or `Student`)
///
/// # Features
/// - Field validation before any write (see `Entity::validate_field`)
/// - Shallow-merge updates that keep fields absent from the patch
/// - Idempotent deletes
/// - Listing with a predicate; unparseable values are skipped
pub struct EntityStore<T>
where
    T: Entity,
{
    txn: Transaction,
    phantom: PhantomData<T>,
}

impl<T> Collection for EntityStore<T>
where
    T: Entity,
{
    fn new(txn: &Transaction) -> Result<Self> {
        Ok(Self {
            txn: txn.clone(),
            phantom: PhantomData,
        })
    }

    fn kind(&self) -> EntityKind {
        T::KIND
    }
}

impl<T> EntityStore<T>
where
    T: Entity,
{
    /// Stores a new entity under `id`.
    ///
    /// # Errors
    /// * `Error::Validation` - if `id` is blank or any field rule fails
    /// * `Error::AlreadyExists` - if an entity of this kind is already stored under `id`
    pub fn create(&self, id: &str, entity: T) -> Result<()> {
        check_id(id)?;
        entity.validate()?;

        let key = entity_key(T::KIND, id);
        if self.txn.get(&key)?.is_some() {
            return Err(Error::AlreadyExists {
                kind: T::KIND,
                id: id.to_string(),
            });
        }

        self.txn.set(&key, entity.into_record().to_json()?)?;
        tracing::debug!(kind = %T::KIND, id, "Staged create");
        Ok(())
    }

    /// Builds an entity from raw submitted fields and stores it under `id`.
    ///
    /// Quantities may be numeric strings; enumerated fields must name a known value.
    pub fn create_from_fields(&self, id: &str, fields: &Fields) -> Result<T> {
        let entity = T::from_fields(fields)?;
        self.create(id, entity.clone())?;
        Ok(entity)
    }

    /// Retrieves the entity stored under `id`.
    ///
    /// # Errors
    /// * `Error::NotFound` - if nothing of this kind is stored under `id`
    pub fn read(&self, id: &str) -> Result<T> {
        let key = entity_key(T::KIND, id);
        let raw = self
            .txn
            .get(&key)?
            .ok_or_else(|| Error::not_found(T::KIND, id))?;
        Self::decode(&key, &raw)
    }

    fn decode(key: &str, raw: &str) -> Result<T> {
        let record = Record::parse(raw)?;
        let found = record.kind();
        T::from_record(record).ok_or_else(|| {
            Error::Storage(format!("{key} holds a {found}, expected a {}", T::KIND))
        })
    }

    /// Shallow-merges `patch` into the entity stored under `id` and returns the result.
    ///
    /// An empty patch stages nothing and returns the stored entity. Otherwise only the
    /// patched fields are checked against the field rules, but the merged record must
    /// still be well-formed. Values are normalized before being written (a quantity
    /// submitted as `"3"` is stored as the number `3`).
    ///
    /// # Errors
    /// * `Error::NotFound` - if nothing of this kind is stored under `id`
    /// * `Error::Validation` - if the patch names an unknown field, the kind tag, or a value
    ///   that breaks a field rule
    pub fn update(&self, id: &str, patch: Patch) -> Result<T> {
        let key = entity_key(T::KIND, id);
        let raw = self
            .txn
            .get(&key)?
            .ok_or_else(|| Error::not_found(T::KIND, id))?;
        if patch.is_empty() {
            return Self::decode(&key, &raw);
        }

        let patch = patch.into_fields();
        if patch.contains_key(crate::constants::KIND_FIELD) {
            return Err(Error::validation(
                crate::constants::KIND_FIELD,
                "cannot be changed",
            ));
        }

        let mut merged: Fields = match serde_json::from_str(&raw)? {
            Value::Object(map) => map,
            _ => return Err(Error::Storage(format!("{key} does not hold a JSON object"))),
        };
        merged.extend(patch.clone());

        let entity = T::from_fields(&merged)?;
        for field in patch.keys() {
            entity.validate_field(field)?;
        }

        let normalized = match serde_json::to_value(entity.clone().into_record())? {
            Value::Object(map) => map,
            _ => return Err(Error::Storage(format!("{} is not a JSON object", T::KIND))),
        };
        let partial: Fields = patch
            .keys()
            .map(|field| {
                let value = normalized.get(field).cloned().unwrap_or(Value::Null);
                (field.clone(), value)
            })
            .collect();

        self.txn
            .merge(&key, &serde_json::to_string(&Value::Object(partial))?)?;
        tracing::debug!(kind = %T::KIND, id, fields = patch.len(), "Staged update");
        Ok(entity)
    }

    /// Replaces the entity under `id` without running the field rules.
    ///
    /// Used for internal bookkeeping such as lending, which may legitimately bring a
    /// book's quantity down to zero.
    pub(crate) fn put(&self, id: &str, entity: T) -> Result<()> {
        let key = entity_key(T::KIND, id);
        self.txn.set(&key, entity.into_record().to_json()?)
    }

    /// Removes the entity under `id`. Removing an absent entity is not an error.
    pub fn delete(&self, id: &str) -> Result<()> {
        let key = entity_key(T::KIND, id);
        self.txn.delete(&key)?;
        tracing::debug!(kind = %T::KIND, id, "Staged delete");
        Ok(())
    }

    /// Lists the entities matching a predicate.
    ///
    /// Every key in the store is enumerated and its value parsed; only records of this
    /// kind that satisfy `query` are returned. Values that cannot be parsed are skipped.
    /// The order is the store's enumeration order, which is unspecified.
    ///
    /// # Returns
    /// * `Ok(Vec<(String, T)>)` - (id, entity) pairs that match the predicate
    pub fn list(&self, query: impl Fn(&T) -> bool) -> Result<Vec<(String, T)>> {
        let keys = self.txn.list_keys()?;
        let mut result = Vec::new();

        for (key, value) in self.txn.multi_get(&keys)? {
            let Some(raw) = value else { continue };
            let Some((kind, id)) = parse_key(&key) else {
                continue;
            };
            if kind != T::KIND {
                continue;
            }
            match Self::decode(&key, &raw) {
                Ok(entity) if query(&entity) => result.push((id.to_string(), entity)),
                Ok(_) => {}
                Err(e) => tracing::debug!(key = %key, error = %e, "Skipping unreadable record"),
            }
        }

        Ok(result)
    }

    /// Lists every entity of this kind.
    pub fn list_all(&self) -> Result<Vec<(String, T)>> {
        self.list(|_| true)
    }
}
