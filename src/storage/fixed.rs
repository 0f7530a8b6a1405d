//! Fixed-schema record store
//!
//! Records are `{id, key, data}` with `data` an opaque string. The handle
//! owns its path; several stores can coexist in one process.
//!
//! Read-style operations take a selector (`raw | json | id | key | value`)
//! and return a string: the rendered field, or a condition message such as
//! `Record 3 is empty!`. Use [`FixedStore::get`] for typed access.

use std::path::{Path, PathBuf};

use super::condition::{Listing, Lookup, Outcome};
use super::errors::StoreResult;
use super::file::{DbFile, StoreOptions};
use super::record::Record;
use super::table::{self, LineTable};

/// Handle on a fixed-schema backing file.
#[derive(Debug, Clone)]
pub struct FixedStore {
    table: LineTable<Record>,
}

impl FixedStore {
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

    /// The underlying file handle
    pub fn db(&self) -> &DbFile {
        self.table.file()
    }

    // =========================================================================
    // File lifecycle
    // =========================================================================

    pub fn create_db(&self) -> StoreResult<Outcome> {
        self.db().create()
    }

    pub fn delete_db(&self) -> StoreResult<Outcome> {
        self.db().delete()
    }

    pub fn copy_db(&self, dest: &Path) -> StoreResult<Outcome> {
        self.db().copy_to(dest)
    }

    /// Removes every record, keeping the file.
    pub fn empty_db(&self) -> StoreResult<Outcome> {
        self.db().empty()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Appends `{id, key, data}` with the next id.
    ///
    /// Returns false only if the file could not be created.
    pub fn add(&self, key: &str, data: &str) -> StoreResult<bool> {
        Ok(self.insert(key, data)?.is_some())
    }

    /// Like [`FixedStore::add`], returning the stored record.
    pub fn insert(&self, key: &str, data: &str) -> StoreResult<Option<Record>> {
        self.table.append_with(|id| Record::new(id, key, data))
    }

    /// Replaces record `id` with a new key and value.
    ///
    /// On success the message is the new stored line.
    pub fn modify(&self, id: u64, key: &str, value: &str) -> StoreResult<Outcome> {
        Ok(match self.table.replace(id, Record::new(id, key, value))? {
            Lookup::Found(row) => Outcome::ok(row.line),
            Lookup::Absent(condition) => condition.into(),
        })
    }

    /// Deletes record `id`.
    ///
    /// On success the message is the removed line.
    pub fn remove(&self, id: u64) -> StoreResult<Outcome> {
        Ok(match self.table.remove(id)? {
            Lookup::Found(row) => Outcome::ok(row.line),
            Lookup::Absent(condition) => condition.into(),
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Id of the last record; 0 when the file is missing or empty.
    pub fn unique_id(&self) -> StoreResult<u64> {
        self.table.last_id()
    }

    pub fn get(&self, id: u64) -> StoreResult<Lookup<Record>> {
        Ok(self.table.find(id)?.map(|row| row.record))
    }

    pub fn select_by_id(&self, id: u64, format: &str) -> StoreResult<String> {
        table::render(self.table.find(id)?, format)
    }

    pub fn count_size(&self) -> StoreResult<usize> {
        self.table.count_size()
    }

    pub fn first_field(&self, format: &str) -> StoreResult<String> {
        table::render(self.table.first()?, format)
    }

    pub fn last_field(&self, format: &str) -> StoreResult<String> {
        table::render(self.table.last()?, format)
    }

    /// JSON array of the first `n` records.
    pub fn first_x_fields(&self, n: usize, format: &str) -> StoreResult<Listing> {
        table::listing(self.table.first_n(n)?, format)
    }

    /// JSON array of the last `n` records (at least one).
    pub fn last_x_fields(&self, n: usize, format: &str) -> StoreResult<Listing> {
        table::listing(self.table.last_n(n)?, format)
    }

    /// Conjunctive, case-insensitive substring search over stored lines.
    pub fn search(&self, query: &str, format: &str) -> StoreResult<Listing> {
        table::listing(self.table.search(query)?, format)
    }

    /// Typed variant of [`FixedStore::search`].
    pub fn find_all(&self, query: &str) -> StoreResult<Lookup<Vec<Record>>> {
        self.table.search(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FixedStore {
        FixedStore::open(dir.path().join("tardigrade.db"))
    }

    #[test]
    fn test_add_creates_file() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        assert!(!s.db().exists());
        assert!(s.add("user:1", "hello").unwrap());
        assert!(s.db().exists());
        assert_eq!(s.unique_id().unwrap(), 1);
    }

    #[test]
    fn test_select_all_formats() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.add("user:1", "hello").unwrap();
        assert_eq!(s.select_by_id(1, "raw").unwrap(), r#"{"id":1,"key":"user:1","data":"hello"}"#);
        assert_eq!(s.select_by_id(1, "id").unwrap(), "1");
        assert_eq!(s.select_by_id(1, "key").unwrap(), "user:1");
        assert_eq!(s.select_by_id(1, "value").unwrap(), "hello");
        let json: serde_json::Value =
            serde_json::from_str(&s.select_by_id(1, "json").unwrap()).unwrap();
        assert_eq!(json["data"], "hello");
        assert_eq!(s.select_by_id(1, "yaml").unwrap(), "Invalid format provided!");
    }

    #[test]
    fn test_missing_file_messages() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let missing = s.select_by_id(1, "raw").unwrap();
        assert!(missing.starts_with("Database "));
        assert!(missing.ends_with(" missing!"));
        assert_eq!(s.first_field("raw").unwrap(), missing);
        assert_eq!(s.count_size().unwrap(), 0);
        assert_eq!(s.unique_id().unwrap(), 0);

        let outcome = s.modify(1, "k", "v").unwrap();
        assert!(!outcome.status);
        assert_eq!(outcome.message, missing);
    }

    #[test]
    fn test_empty_file_messages() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.create_db().unwrap();
        assert!(s.select_by_id(1, "raw").unwrap().ends_with(" is empty!"));
        assert!(s.last_field("raw").unwrap().ends_with(" is empty!"));
        assert!(s.search("x", "raw").unwrap().body.ends_with(" is empty!"));
    }

    #[test]
    fn test_modify_message_is_new_line() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.add("k", "v").unwrap();
        let outcome = s.modify(1, "k2", "v2").unwrap();
        assert!(outcome.status);
        assert_eq!(outcome.message, r#"{"id":1,"key":"k2","data":"v2"}"#);
    }

    #[test]
    fn test_remove_message_is_old_line() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.add("k", "v").unwrap();
        let outcome = s.remove(1).unwrap();
        assert!(outcome.status);
        assert_eq!(outcome.message, r#"{"id":1,"key":"k","data":"v"}"#);
    }

    #[test]
    fn test_first_and_last_field() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.add("a", "1").unwrap();
        s.add("b", "2").unwrap();
        s.add("c", "3").unwrap();
        assert_eq!(s.first_field("key").unwrap(), "a");
        assert_eq!(s.last_field("key").unwrap(), "c");
        assert_eq!(s.last_field("id").unwrap(), "3");
    }
}
