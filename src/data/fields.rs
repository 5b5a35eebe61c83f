use crate::{Error, Result};
use serde::de::{self, Deserializer, Visitor};
use serde_json::{Map, Value};
use std::fmt;

/// Raw top-level fields of a stored or submitted JSON object.
pub type Fields = Map<String, Value>;

/// A partial update: the fields to overwrite in a stored record.
///
/// Fields not present in the patch are left untouched when it is merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    fields: Fields,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one field, builder style.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_fields(self) -> Fields {
        self.fields
    }
}

impl From<Fields> for Patch {
    fn from(fields: Fields) -> Self {
        Self { fields }
    }
}

/// Reads a required, non-blank string field.
pub(crate) fn required_str(fields: &Fields, name: &str) -> Result<String> {
    match fields.get(name) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) | Some(Value::Null) | None => {
            Err(Error::validation(name, "is required"))
        }
        Some(_) => Err(Error::validation(name, "must be a string")),
    }
}

/// Reads an optional string field; blank strings count as absent.
pub(crate) fn optional_str(fields: &Fields, name: &str) -> Result<Option<String>> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(Error::validation(name, "must be a string")),
    }
}

/// Reads a quantity that may arrive as a JSON number or as a numeric string.
pub(crate) fn required_quantity(fields: &Fields, name: &str) -> Result<u32> {
    match fields.get(name) {
        None | Some(Value::Null) => Err(Error::validation(name, "is required")),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(Error::validation(name, "is required"))
        }
        Some(Value::String(s)) => {
            parse_quantity(s).map_err(|reason| Error::validation(name, reason))
        }
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| Error::validation(name, "must be a positive number")),
        Some(_) => Err(Error::validation(name, "must be a positive number")),
    }
}

fn parse_quantity(raw: &str) -> std::result::Result<u32, &'static str> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| "must be a positive number")
}

/// Deserializes a quantity stored either as a number or as a numeric string.
///
/// Older clients stored quantities as strings (`"quantity":"2"`).
pub(crate) fn deserialize_quantity<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    struct QuantityVisitor;

    impl Visitor<'_> for QuantityVisitor {
        type Value = u32;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative integer or a numeric string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<u32, E> {
            u32::try_from(v).map_err(|_| E::custom("quantity out of range"))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<u32, E> {
            u32::try_from(v).map_err(|_| E::custom("quantity must not be negative"))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<u32, E> {
            parse_quantity(v).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(QuantityVisitor)
}
