//! Flexible-schema record store
//!
//! Records are `{id, key, fields}` where `fields` maps attribute names to
//! string values. Same file format and scan discipline as the fixed store;
//! selectors are `raw | json | id | key | fields`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::condition::{Condition, Listing, Lookup, Outcome};
use super::errors::StoreResult;
use super::file::{DbFile, StoreOptions};
use super::record::FlexRecord;
use super::table::{self, LineTable};
use crate::observability::{log_event_with_fields, Event};

/// Builds a field map from alternating name/value arguments.
///
/// An odd argument count is reported as a condition. A repeated name keeps
/// its last value.
pub fn pairs_to_fields<S: AsRef<str>>(pairs: &[S]) -> Result<BTreeMap<String, String>, Condition> {
    if pairs.len() % 2 != 0 {
        return Err(Condition::OddFieldArguments(pairs.len()));
    }
    Ok(pairs
        .chunks(2)
        .map(|kv| (kv[0].as_ref().to_string(), kv[1].as_ref().to_string()))
        .collect())
}

/// Handle on a flexible-schema backing file.
#[derive(Debug, Clone)]
pub struct FlexStore {
    table: LineTable<FlexRecord>,
}

impl FlexStore {
    /// Opens a handle with default options. Nothing is touched on disk.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_options(path, StoreOptions::default())
    }

    pub fn with_options(path: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self {
            table: LineTable::new(DbFile::new(path, options)),
        }
    }

    pub fn path(&self) -> &Path {
        self.table.file().path()
    }

    pub fn db(&self) -> &DbFile {
        self.table.file()
    }

    pub fn create_db(&self) -> StoreResult<Outcome> {
        self.db().create()
    }

    pub fn delete_db(&self) -> StoreResult<Outcome> {
        self.db().delete()
    }

    pub fn copy_db(&self, dest: &Path) -> StoreResult<Outcome> {
        self.db().copy_to(dest)
    }

    pub fn empty_db(&self) -> StoreResult<Outcome> {
        self.db().empty()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Appends `{id, key, fields}` with the next id.
    ///
    /// Returns false only if the file could not be created.
    pub fn add_flex_field(&self, key: &str, fields: BTreeMap<String, String>) -> StoreResult<bool> {
        Ok(self.insert(key, fields)?.is_some())
    }

    /// Appends a record from alternating name/value arguments.
    ///
    /// Returns false on an odd argument count.
    pub fn add_flex_field_variadic<S: AsRef<str>>(&self, key: &str, pairs: &[S]) -> StoreResult<bool> {
        match pairs_to_fields(pairs) {
            Ok(fields) => self.add_flex_field(key, fields),
            Err(condition) => {
                log_event_with_fields(
                    Event::FlexAddRejected,
                    &[("key", key), ("reason", condition.to_string().as_str())],
                );
                Ok(false)
            }
        }
    }

    /// Like [`FlexStore::add_flex_field`], returning the stored record.
    pub fn insert(&self, key: &str, fields: BTreeMap<String, String>) -> StoreResult<Option<FlexRecord>> {
        self.table.append_with(|id| FlexRecord::new(id, key, fields))
    }

    /// Replaces record `id` with a new key and attribute set.
    pub fn modify_flex_field(
        &self,
        id: u64,
        key: &str,
        fields: BTreeMap<String, String>,
    ) -> StoreResult<Outcome> {
        Ok(match self.table.replace(id, FlexRecord::new(id, key, fields))? {
            Lookup::Found(row) => Outcome::ok(row.line),
            Lookup::Absent(condition) => condition.into(),
        })
    }

    /// Deletes record `id`; the message is the removed line.
    pub fn remove_flex_field(&self, id: u64) -> StoreResult<Outcome> {
        Ok(match self.table.remove(id)? {
            Lookup::Found(row) => Outcome::ok(row.line),
            Lookup::Absent(condition) => condition.into(),
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn unique_id(&self) -> StoreResult<u64> {
        self.table.last_id()
    }

    pub fn count_size(&self) -> StoreResult<usize> {
        self.table.count_size()
    }

    pub fn get(&self, id: u64) -> StoreResult<Lookup<FlexRecord>> {
        Ok(self.table.find(id)?.map(|row| row.record))
    }

    pub fn select_flex_by_id(&self, id: u64, format: &str) -> StoreResult<String> {
        table::render(self.table.find(id)?, format)
    }

    /// Value of one attribute of record `id`.
    ///
    /// A missing attribute yields `Field '<name>' not found in record <id>`,
    /// distinct from the missing-record message.
    pub fn get_flex_field(&self, id: u64, field: &str) -> StoreResult<String> {
        Ok(match self.lookup_field(id, field)? {
            Lookup::Found(value) => value,
            Lookup::Absent(condition) => condition.to_string(),
        })
    }

    /// Typed variant of [`FlexStore::get_flex_field`].
    pub fn lookup_field(&self, id: u64, field: &str) -> StoreResult<Lookup<String>> {
        Ok(match self.get(id)? {
            Lookup::Found(mut record) => match record.fields.remove(field) {
                Some(value) => Lookup::Found(value),
                None => Lookup::Absent(Condition::FieldNotFound {
                    id,
                    field: field.to_string(),
                }),
            },
            Lookup::Absent(condition) => Lookup::Absent(condition),
        })
    }

    /// Attribute names of record `id`; empty if the record is absent.
    pub fn list_flex_fields(&self, id: u64) -> StoreResult<BTreeSet<String>> {
        Ok(match self.get(id)? {
            Lookup::Found(record) => record.fields.into_keys().collect(),
            Lookup::Absent(_) => BTreeSet::new(),
        })
    }

    pub fn first_flex_field(&self, format: &str) -> StoreResult<String> {
        table::render(self.table.first()?, format)
    }

    pub fn last_flex_field(&self, format: &str) -> StoreResult<String> {
        table::render(self.table.last()?, format)
    }

    pub fn first_x_flex_fields(&self, n: usize, format: &str) -> StoreResult<Listing> {
        table::listing(self.table.first_n(n)?, format)
    }

    pub fn last_x_flex_fields(&self, n: usize, format: &str) -> StoreResult<Listing> {
        table::listing(self.table.last_n(n)?, format)
    }

    /// Conjunctive, case-insensitive substring search over stored lines.
    pub fn select_flex_search(&self, query: &str, format: &str) -> StoreResult<Listing> {
        table::listing(self.table.search(query)?, format)
    }

    pub fn find_all(&self, query: &str) -> StoreResult<Lookup<Vec<FlexRecord>>> {
        self.table.search(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FlexStore {
        FlexStore::open(dir.path().join("flexible.db"))
    }

    #[test]
    fn test_pairs_to_fields() {
        let fields = pairs_to_fields(&["name", "a", "city", "b"]).unwrap();
        assert_eq!(fields.get("name").map(String::as_str), Some("a"));
        assert_eq!(fields.len(), 2);
        assert_eq!(
            pairs_to_fields(&["name", "a", "city"]),
            Err(Condition::OddFieldArguments(3))
        );
        assert!(pairs_to_fields::<&str>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_repeated_name_keeps_last_value() {
        let fields = pairs_to_fields(&["a", "1", "a", "2"]).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["a"], "2");
    }

    #[test]
    fn test_variadic_odd_count_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        assert!(!s.add_flex_field_variadic("user:1", &["name"]).unwrap());
        assert!(!s.db().exists());
    }

    #[test]
    fn test_fields_format_and_value_rejected() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.add_flex_field_variadic("user:1", &["name", "a"]).unwrap();
        assert_eq!(s.select_flex_by_id(1, "fields").unwrap(), r#"{"name":"a"}"#);
        assert_eq!(
            s.select_flex_by_id(1, "value").unwrap(),
            "Invalid format! Use: raw, json, id, key, fields"
        );
    }

    #[test]
    fn test_field_not_found_vs_record_not_found() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.add_flex_field_variadic("user:1", &["name", "a"]).unwrap();
        assert_eq!(s.get_flex_field(1, "age").unwrap(), "Field 'age' not found in record 1");
        assert_eq!(s.get_flex_field(9, "age").unwrap(), "Record 9 is empty!");
        assert!(s.list_flex_fields(9).unwrap().is_empty());
    }
}
