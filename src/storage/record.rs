//! Record shapes stored one per line
//!
//! Line format (field order is significant):
//!
//! ```text
//! fixed: {"id":<u64>,"key":"<string>","data":"<string>"}
//! flex:  {"id":<u64>,"key":"<string>","fields":{"<name>":"<value>",...}}
//! ```
//!
//! `fields` is encoded with its names in sorted order.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::serialization::{self, SerializationResult};

/// The two record shapes a backing file can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// `{id, key, data}`
    Fixed,
    /// `{id, key, fields}`
    Flex,
}

impl Schema {
    /// Returns the schema name
    pub fn as_str(&self) -> &'static str {
        match self {
            Schema::Fixed => "fixed",
            Schema::Flex => "flex",
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output selector accepted by read-style operations.
///
/// Fixed records accept `raw | json | id | key | value`,
/// flexible records accept `raw | json | id | key | fields`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// The stored line, byte for byte
    Raw,
    /// Indented JSON
    Json,
    Id,
    Key,
    /// The `data` payload
    Value,
    /// The attribute mapping as compact JSON
    Fields,
}

impl Format {
    /// Parses a selector name. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "raw" => Some(Format::Raw),
            "json" => Some(Format::Json),
            "id" => Some(Format::Id),
            "key" => Some(Format::Key),
            "value" => Some(Format::Value),
            "fields" => Some(Format::Fields),
            _ => None,
        }
    }

    /// Returns the selector name
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Raw => "raw",
            Format::Json => "json",
            Format::Id => "id",
            Format::Key => "key",
            Format::Value => "value",
            Format::Fields => "fields",
        }
    }
}

/// A record type that can live in a line-oriented backing file.
pub trait StoredRecord: Serialize + DeserializeOwned + Clone {
    /// Shape of this record type
    const SCHEMA: Schema;

    /// Store-assigned identity
    fn id(&self) -> u64;

    /// Renders the record for a selector.
    ///
    /// `line` is the record's stored text. Returns `None` when the selector
    /// does not apply to this shape.
    fn render(&self, format: Format, line: &str) -> SerializationResult<Option<String>>;
}

/// Fixed-schema record: one opaque string payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Record {
    /// Unique, store-assigned identifier
    pub id: u64,
    /// Label, not required to be unique
    pub key: String,
    /// Opaque payload (possibly ciphertext)
    pub data: String,
}

impl Record {
    /// Create a new record
    pub fn new(id: u64, key: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id,
            key: key.into(),
            data: data.into(),
        }
    }
}

impl StoredRecord for Record {
    const SCHEMA: Schema = Schema::Fixed;

    fn id(&self) -> u64 {
        self.id
    }

    fn render(&self, format: Format, line: &str) -> SerializationResult<Option<String>> {
        let out = match format {
            Format::Raw => line.to_string(),
            Format::Json => serialization::encode_indented(self)?,
            Format::Id => self.id.to_string(),
            Format::Key => self.key.clone(),
            Format::Value => self.data.clone(),
            Format::Fields => return Ok(None),
        };
        Ok(Some(out))
    }
}

/// Flexible-schema record: an open mapping of named string attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlexRecord {
    /// Unique, store-assigned identifier
    pub id: u64,
    /// Label, not required to be unique
    pub key: String,
    /// Attribute name -> value
    pub fields: BTreeMap<String, String>,
}

impl FlexRecord {
    /// Create a new flexible record
    pub fn new(id: u64, key: impl Into<String>, fields: BTreeMap<String, String>) -> Self {
        Self {
            id,
            key: key.into(),
            fields,
        }
    }
}

impl StoredRecord for FlexRecord {
    const SCHEMA: Schema = Schema::Flex;

    fn id(&self) -> u64 {
        self.id
    }

    fn render(&self, format: Format, line: &str) -> SerializationResult<Option<String>> {
        let out = match format {
            Format::Raw => line.to_string(),
            Format::Json => serialization::encode_indented(self)?,
            Format::Id => self.id.to_string(),
            Format::Key => self.key.clone(),
            Format::Fields => serialization::encode(&self.fields)?,
            Format::Value => return Ok(None),
        };
        Ok(Some(out))
    }
}
