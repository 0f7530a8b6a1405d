//! Expected domain conditions
//!
//! A missing file, an empty file or an unknown id is not a fault: the
//! operation reports it as a value and the caller may retry after fixing
//! the precondition. The `Display` text of each condition is the message
//! handed back by the string-returning store operations.

use std::fmt;
use std::path::PathBuf;

use super::record::Schema;

/// An expected condition that stops an operation without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// The backing file does not exist
    Missing(PathBuf),
    /// The backing file holds no records
    Empty(PathBuf),
    /// No record carries this id
    RecordNotFound(u64),
    /// The record exists but lacks the attribute
    FieldNotFound { id: u64, field: String },
    /// The selector is not valid for the schema
    InvalidFormat(Schema),
    /// Variadic attribute list was not name/value pairs
    OddFieldArguments(usize),
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Missing(path) => write!(f, "Database {} missing!", path.display()),
            Condition::Empty(path) => write!(f, "Database {} is empty!", path.display()),
            Condition::RecordNotFound(id) => write!(f, "Record {} is empty!", id),
            Condition::FieldNotFound { id, field } => {
                write!(f, "Field '{}' not found in record {}", field, id)
            }
            Condition::InvalidFormat(Schema::Fixed) => write!(f, "Invalid format provided!"),
            Condition::InvalidFormat(Schema::Flex) => {
                write!(f, "Invalid format! Use: raw, json, id, key, fields")
            }
            Condition::OddFieldArguments(n) => {
                write!(f, "Expected name/value pairs, got {} arguments", n)
            }
        }
    }
}

/// Outcome of a typed lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    Absent(Condition),
}

impl<T> Lookup<T> {
    /// Converts into an `Option`, dropping the condition
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::Absent(_) => None,
        }
    }

    /// Maps the found value
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(v) => Lookup::Found(f(v)),
            Lookup::Absent(c) => Lookup::Absent(c),
        }
    }

    /// Returns whether a value was found
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// Message plus status, returned by mutating and lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub message: String,
    pub status: bool,
}

impl Outcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: true,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: false,
        }
    }
}

impl From<Condition> for Outcome {
    fn from(condition: Condition) -> Self {
        Outcome::failed(condition.to_string())
    }
}

/// A multi-record result: the requested format echoed back and a JSON body.
///
/// The body is a compact JSON array of records, or the condition message
/// when the file is missing or empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub format: String,
    pub body: String,
}
