use crate::data::fields::{
    Fields, deserialize_quantity, optional_str, required_quantity, required_str,
};
use crate::data::{EntityKind, Record};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A record kind stored under a caller-chosen id and managed by `EntityStore`.
///
/// Implementors describe their field rules once; `EntityStore` applies them on
/// create (all fields) and on update (the patched fields, against the merged record).
pub trait Entity: Serialize + DeserializeOwned + Clone {
    /// The kind tag and key namespace of this entity.
    const KIND: EntityKind;

    /// Stored field names, as they appear in the JSON value.
    const FIELDS: &'static [&'static str];

    /// Builds an entity from raw submitted fields.
    ///
    /// Performs type-level checks: numbers must parse and enumerated values must be known.
    fn from_fields(fields: &Fields) -> Result<Self>;

    /// Checks the rule for a single stored field.
    fn validate_field(&self, field: &str) -> Result<()>;

    /// Checks every field rule.
    fn validate(&self) -> Result<()> {
        Self::FIELDS
            .iter()
            .try_for_each(|field| self.validate_field(field))
    }

    fn into_record(self) -> Record;

    /// Extracts the entity from a record of the matching kind.
    fn from_record(record: Record) -> Option<Self>;
}

fn require_non_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::validation(field, "is required"))
    } else {
        Ok(())
    }
}

/// A title held by the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub book_name: String,
    pub author_name: String,
    /// Copies currently on the shelf.
    #[serde(deserialize_with = "deserialize_quantity")]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
}

impl Book {
    pub fn new(
        book_name: impl Into<String>,
        author_name: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self {
            book_name: book_name.into(),
            author_name: author_name.into(),
            quantity,
            image_uri: None,
        }
    }

    pub fn with_image(mut self, image_uri: impl Into<String>) -> Self {
        self.image_uri = Some(image_uri.into());
        self
    }

    pub fn is_available(&self) -> bool {
        self.quantity > 0
    }
}

impl Entity for Book {
    const KIND: EntityKind = EntityKind::Book;
    const FIELDS: &'static [&'static str] = &["bookName", "authorName", "quantity", "imageUri"];

    fn from_fields(fields: &Fields) -> Result<Self> {
        Ok(Self {
            book_name: required_str(fields, "bookName")?,
            author_name: required_str(fields, "authorName")?,
            quantity: required_quantity(fields, "quantity")?,
            image_uri: optional_str(fields, "imageUri")?,
        })
    }

    fn validate_field(&self, field: &str) -> Result<()> {
        match field {
            "bookName" => require_non_blank(field, &self.book_name),
            "authorName" => require_non_blank(field, &self.author_name),
            "quantity" if self.quantity == 0 => {
                Err(Error::validation(field, "must be a positive number"))
            }
            "quantity" | "imageUri" => Ok(()),
            other => Err(Error::validation(other, "is not a book field")),
        }
    }

    fn into_record(self) -> Record {
        Record::Book(self)
    }

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Book(book) => Some(book),
            _ => None,
        }
    }
}

/// Year level of a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Year {
    #[serde(rename = "1st Year")]
    First,
    #[serde(rename = "2nd Year")]
    Second,
    #[serde(rename = "3rd Year")]
    Third,
    #[serde(rename = "4th Year")]
    Fourth,
}

impl Year {
    pub const ALL: [Year; 4] = [Year::First, Year::Second, Year::Third, Year::Fourth];

    pub fn as_str(self) -> &'static str {
        match self {
            Year::First => "1st Year",
            Year::Second => "2nd Year",
            Year::Third => "3rd Year",
            Year::Fourth => "4th Year",
        }
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Year {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|year| year.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::validation("year", format!("unknown year level '{s}'")))
    }
}

/// Degree program codes offered by the school.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Program {
    Bsn,
    Bsoa,
    Bshm,
    Bsce,
    Bsece,
    Bstm,
    Bsm,
    Bsit,
    Bscs,
    Bsis,
    Blis,
}

impl Program {
    pub const ALL: [Program; 11] = [
        Program::Bsn,
        Program::Bsoa,
        Program::Bshm,
        Program::Bsce,
        Program::Bsece,
        Program::Bstm,
        Program::Bsm,
        Program::Bsit,
        Program::Bscs,
        Program::Bsis,
        Program::Blis,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Program::Bsn => "BSN",
            Program::Bsoa => "BSOA",
            Program::Bshm => "BSHM",
            Program::Bsce => "BSCE",
            Program::Bsece => "BSECE",
            Program::Bstm => "BSTM",
            Program::Bsm => "BSM",
            Program::Bsit => "BSIT",
            Program::Bscs => "BSCS",
            Program::Bsis => "BSIS",
            Program::Blis => "BLIS",
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Program {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|program| program.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::validation("program", format!("unknown program code '{s}'")))
    }
}

/// A library member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub student_name: String,
    pub year: Year,
    pub program: Program,
}

impl Student {
    pub fn new(student_name: impl Into<String>, year: Year, program: Program) -> Self {
        Self {
            student_name: student_name.into(),
            year,
            program,
        }
    }
}

impl Entity for Student {
    const KIND: EntityKind = EntityKind::Student;
    const FIELDS: &'static [&'static str] = &["studentName", "year", "program"];

    fn from_fields(fields: &Fields) -> Result<Self> {
        Ok(Self {
            student_name: required_str(fields, "studentName")?,
            year: required_str(fields, "year")?.parse()?,
            program: required_str(fields, "program")?.parse()?,
        })
    }

    fn validate_field(&self, field: &str) -> Result<()> {
        match field {
            "studentName" => require_non_blank(field, &self.student_name),
            // Enumerations are checked when parsed.
            "year" | "program" => Ok(()),
            other => Err(Error::validation(other, "is not a student field")),
        }
    }

    fn into_record(self) -> Record {
        Record::Student(self)
    }

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Student(student) => Some(student),
            _ => None,
        }
    }
}

/// An immutable record of one loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRecord {
    pub book_id: String,
    /// Older clients wrote this field as `studentNo`.
    #[serde(alias = "studentNo")]
    pub student_id: String,
    pub date_borrow: DateTime<Utc>,
    pub date_return: DateTime<Utc>,
}

impl BorrowRecord {
    /// Creates a record after checking that the loan window is not empty or inverted.
    pub fn new(
        book_id: impl Into<String>,
        student_id: impl Into<String>,
        date_borrow: DateTime<Utc>,
        date_return: DateTime<Utc>,
    ) -> Result<Self> {
        Self::check_window(date_borrow, date_return)?;
        Ok(Self {
            book_id: book_id.into(),
            student_id: student_id.into(),
            date_borrow,
            date_return,
        })
    }

    /// `date_return` must be strictly after `date_borrow`.
    pub fn check_window(date_borrow: DateTime<Utc>, date_return: DateTime<Utc>) -> Result<()> {
        if date_return <= date_borrow {
            return Err(Error::validation(
                "dateReturn",
                "must be after the borrow date",
            ));
        }
        Ok(())
    }

    /// Whether `instant` falls inside the loan window, both ends inclusive.
    pub fn covers(&self, instant: DateTime<Utc>) -> bool {
        self.date_borrow <= instant && instant <= self.date_return
    }
}
