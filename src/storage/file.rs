//! Backing file handle
//!
//! Owns the path of one line-oriented file and every OS-level operation the
//! stores need: existence checks, lifecycle (create / delete / copy / empty),
//! line reads, appends and whole-file rewrites.
//!
//! Rewrites never edit the file in place:
//! 1. Write the new image to `<path>.tmp`
//! 2. fsync the temp file
//! 3. Rename it over `<path>`
//! 4. fsync the parent directory
//!
//! Writers serialize on an advisory lock held on `<path>.lock`.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use super::condition::Outcome;
use super::errors::{StoreError, StoreResult};
use crate::observability::{log_event_with_fields, Event};

/// Write behaviour of a store handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOptions {
    /// Take an exclusive advisory lock around every write
    #[serde(default = "default_true")]
    pub lock_writes: bool,

    /// fsync appends and rewrites before returning
    #[serde(default = "default_true")]
    pub sync_writes: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            lock_writes: true,
            sync_writes: true,
        }
    }
}

/// Exclusive write lock; released on drop.
#[derive(Debug)]
pub struct WriteLock {
    file: Option<File>,
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Some(ref file) = self.file {
            let _ = FileExt::unlock(file);
        }
    }
}

/// Handle on one backing file.
#[derive(Debug, Clone)]
pub struct DbFile {
    path: PathBuf,
    options: StoreOptions,
}

impl DbFile {
    pub fn new(path: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether the backing file exists and is a regular file.
    pub fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Returns the file size in bytes.
    pub fn len(&self) -> StoreResult<u64> {
        fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| {
                StoreError::read_failed(
                    format!("Failed to read metadata: {}", self.path.display()),
                    e,
                )
            })
    }

    fn absolute(&self) -> PathBuf {
        if self.path.is_absolute() {
            return self.path.clone();
        }
        std::env::current_dir()
            .map(|cwd| cwd.join(&self.path))
            .unwrap_or_else(|_| self.path.clone())
    }

    fn sidecar(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(OsString::new);
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Creates the backing file if it does not exist.
    ///
    /// `Created: <abs>` on success, `Exist: <abs>` (status false) if present.
    pub fn create(&self) -> StoreResult<Outcome> {
        let abs = self.absolute();
        if self.exists() {
            return Ok(Outcome::failed(format!("Exist: {}", abs.display())));
        }

        match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(_) => {}
            // Created by another writer since the check above
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Ok(Outcome::failed(format!("Exist: {}", abs.display())));
            }
            Err(e) => {
                return Err(StoreError::write_failed(
                    format!("Failed to create {}", self.display()),
                    e,
                ));
            }
        }

        log_event_with_fields(Event::DbCreated, &[("path", self.display().as_str())]);
        Ok(Outcome::ok(format!("Created: {}", abs.display())))
    }

    /// Deletes the backing file.
    ///
    /// `Removed: <abs>` on success, `Unavailable: <abs>` (status false) if absent.
    pub fn delete(&self) -> StoreResult<Outcome> {
        let abs = self.absolute();
        if !self.exists() {
            return Ok(Outcome::failed(format!("Unavailable: {}", abs.display())));
        }

        fs::remove_file(&self.path).map_err(|e| {
            StoreError::io_error(format!("Failed to delete {}", self.display()), e)
        })?;

        log_event_with_fields(Event::DbDeleted, &[("path", self.display().as_str())]);
        Ok(Outcome::ok(format!("Removed: {}", abs.display())))
    }

    /// Copies the backing file to `dest`, overwriting it.
    pub fn copy_to(&self, dest: &Path) -> StoreResult<Outcome> {
        if !self.exists() {
            return Ok(Outcome::failed(format!(
                "Failed: database {} missing!",
                self.display()
            )));
        }

        fs::copy(&self.path, dest).map_err(|e| {
            StoreError::write_failed(format!("Failed to copy to {}", dest.display()), e)
        })?;

        let dest_str = dest.display().to_string();
        log_event_with_fields(
            Event::DbCopied,
            &[("path", self.display().as_str()), ("dest", dest_str.as_str())],
        );
        Ok(Outcome::ok(format!("Copy: {}", dest_str)))
    }

    /// Destroys every record by deleting and re-creating the file.
    pub fn empty(&self) -> StoreResult<Outcome> {
        if !self.exists() {
            return Ok(Outcome::failed("Missing: could not find database!"));
        }

        let _lock = self.lock()?;
        if !self.delete()?.status {
            return Ok(Outcome::failed("Missing: could not find database!"));
        }
        match self.create() {
            Ok(outcome) if outcome.status => {}
            _ => return Ok(Outcome::failed("Failed: no permission to re-create!")),
        }

        log_event_with_fields(Event::DbEmptied, &[("path", self.display().as_str())]);
        Ok(Outcome::ok("Empty: database now clean!"))
    }

    /// Makes sure the file exists, creating it if needed.
    ///
    /// Returns false if it could not be created.
    pub fn ensure_exists(&self) -> bool {
        if self.exists() {
            return true;
        }
        match self.create() {
            Ok(_) => self.exists(),
            Err(e) => {
                log_event_with_fields(
                    Event::DbCreateFailed,
                    &[("path", self.display().as_str()), ("error", e.to_string().as_str())],
                );
                false
            }
        }
    }

    // =========================================================================
    // Locking
    // =========================================================================

    /// Takes the exclusive write lock (blocking).
    ///
    /// A no-op guard when `lock_writes` is off.
    pub fn lock(&self) -> StoreResult<WriteLock> {
        if !self.options.lock_writes {
            return Ok(WriteLock { file: None });
        }

        let lock_path = self.sidecar(".lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&lock_path)
            .map_err(|e| StoreError::lock_failed(&lock_path, e))?;
        file.lock_exclusive()
            .map_err(|e| StoreError::lock_failed(&lock_path, e))?;

        log_event_with_fields(Event::LockAcquired, &[("path", self.display().as_str())]);
        Ok(WriteLock { file: Some(file) })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Reads every line (without terminators).
    pub fn read_lines(&self) -> StoreResult<Vec<String>> {
        let file = File::open(&self.path).map_err(|e| {
            StoreError::read_failed(format!("Failed to open {}", self.display()), e)
        })?;

        BufReader::new(file)
            .lines()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::read_failed(format!("Failed to read {}", self.display()), e))
    }

    /// Counts `\n` bytes in the file.
    pub fn count_line_breaks(&self) -> StoreResult<usize> {
        let mut file = File::open(&self.path).map_err(|e| {
            StoreError::read_failed(format!("Failed to open {}", self.display()), e)
        })?;

        let mut buf = [0u8; 64 * 1024];
        let mut count = 0;
        loop {
            let n = file.read(&mut buf).map_err(|e| {
                StoreError::read_failed(format!("Failed to read {}", self.display()), e)
            })?;
            if n == 0 {
                break;
            }
            count += buf[..n].iter().filter(|&&b| b == b'\n').count();
        }
        Ok(count)
    }

    fn ends_with_newline(&self) -> StoreResult<bool> {
        let mut file = File::open(&self.path).map_err(|e| {
            StoreError::read_failed(format!("Failed to open {}", self.display()), e)
        })?;
        let len = file
            .metadata()
            .map_err(|e| StoreError::read_failed("Failed to read file metadata", e))?
            .len();
        if len == 0 {
            return Ok(true);
        }

        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))
            .and_then(|_| file.read_exact(&mut last))
            .map_err(|e| {
                StoreError::read_failed(format!("Failed to read {}", self.display()), e)
            })?;
        Ok(last[0] == b'\n')
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Appends one line, terminating it with `\n`.
    ///
    /// If the file does not end with a line break, one is written first so
    /// the new record starts on its own line.
    pub fn append_line(&self, line: &str) -> StoreResult<()> {
        let mut buf = String::with_capacity(line.len() + 2);
        if !self.ends_with_newline()? {
            buf.push('\n');
        }
        buf.push_str(line);
        buf.push('\n');

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| {
                StoreError::write_failed(format!("Failed to open {}", self.display()), e)
            })?;

        file.write_all(buf.as_bytes()).map_err(|e| {
            StoreError::write_failed(format!("Failed to append to {}", self.display()), e)
        })?;

        if self.options.sync_writes {
            file.sync_all().map_err(|e| {
                StoreError::write_failed(format!("fsync failed: {}", self.display()), e)
            })?;
        }
        Ok(())
    }

    /// Replaces the whole file with `lines`, each terminated by `\n`.
    pub fn rewrite<'a, I>(&self, lines: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let temp_path = self.sidecar(".tmp");
        let result = self.write_temp(&temp_path, lines).and_then(|_| {
            fs::rename(&temp_path, &self.path).map_err(|e| {
                StoreError::io_error(format!("Failed to replace {}", self.display()), e)
            })
        });

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
            return result;
        }

        if self.options.sync_writes {
            let parent = self
                .path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        log_event_with_fields(Event::RewriteCommitted, &[("path", self.display().as_str())]);
        Ok(())
    }

    fn write_temp<'a, I>(&self, temp_path: &Path, lines: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)
            .map_err(|e| {
                StoreError::write_failed(
                    format!("Failed to create temp file: {}", temp_path.display()),
                    e,
                )
            })?;

        let mut writer = BufWriter::new(file);
        for line in lines {
            writer
                .write_all(line.as_bytes())
                .and_then(|_| writer.write_all(b"\n"))
                .map_err(|e| {
                    StoreError::write_failed(
                        format!("Failed to write temp file: {}", temp_path.display()),
                        e,
                    )
                })?;
        }

        let file = writer.into_inner().map_err(|e| {
            StoreError::write_failed(
                format!("Failed to flush temp file: {}", temp_path.display()),
                e.into_error(),
            )
        })?;

        if self.options.sync_writes {
            file.sync_all().map_err(|e| {
                StoreError::write_failed(
                    format!("fsync failed: {}", temp_path.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn db(dir: &TempDir, name: &str) -> DbFile {
        DbFile::new(dir.path().join(name), StoreOptions::default())
    }

    #[test]
    fn test_create_then_exist() {
        let dir = TempDir::new().unwrap();
        let file = db(&dir, "a.db");
        assert!(!file.exists());

        let first = file.create().unwrap();
        assert!(first.status);
        assert!(first.message.starts_with("Created: "));
        assert!(file.exists());

        let second = file.create().unwrap();
        assert!(!second.status);
        assert!(second.message.starts_with("Exist: "));
    }

    #[test]
    fn test_racing_creates_report_exist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("race.db");
        let barrier = std::sync::Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let path = path.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let file = DbFile::new(path, StoreOptions::default());
                    barrier.wait();
                    file.create()
                })
            })
            .collect();

        let outcomes: Vec<Outcome> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        assert_eq!(outcomes.iter().filter(|o| o.status).count(), 1);
        assert!(outcomes
            .iter()
            .filter(|o| !o.status)
            .all(|o| o.message.starts_with("Exist: ")));
    }

    #[test]
    fn test_delete_missing_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let file = db(&dir, "a.db");
        let outcome = file.delete().unwrap();
        assert!(!outcome.status);
        assert!(outcome.message.starts_with("Unavailable: "));
    }

    #[test]
    fn test_append_terminates_lines() {
        let dir = TempDir::new().unwrap();
        let file = db(&dir, "a.db");
        file.append_line("one").unwrap();
        file.append_line("two").unwrap();
        assert_eq!(fs::read_to_string(file.path()).unwrap(), "one\ntwo\n");
        assert_eq!(file.count_line_breaks().unwrap(), 2);
    }

    #[test]
    fn test_append_after_unterminated_line() {
        let dir = TempDir::new().unwrap();
        let file = db(&dir, "a.db");
        fs::write(file.path(), "one").unwrap();
        file.append_line("two").unwrap();
        assert_eq!(file.read_lines().unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn test_rewrite_replaces_contents_and_cleans_temp() {
        let dir = TempDir::new().unwrap();
        let file = db(&dir, "a.db");
        file.append_line("old").unwrap();
        file.rewrite(vec!["new1", "new2"]).unwrap();
        assert_eq!(file.read_lines().unwrap(), vec!["new1", "new2"]);
        assert!(!dir.path().join("a.db.tmp").exists());
    }

    #[test]
    fn test_rewrite_to_nothing() {
        let dir = TempDir::new().unwrap();
        let file = db(&dir, "a.db");
        file.append_line("only").unwrap();
        file.rewrite(Vec::<&str>::new()).unwrap();
        assert_eq!(file.len().unwrap(), 0);
    }

    #[test]
    fn test_lock_is_reentrant_after_drop() {
        let dir = TempDir::new().unwrap();
        let file = db(&dir, "a.db");
        {
            let _guard = file.lock().unwrap();
        }
        let _again = file.lock().unwrap();
        assert!(dir.path().join("a.db.lock").exists());
    }

    #[test]
    fn test_lock_disabled_creates_no_sidecar() {
        let dir = TempDir::new().unwrap();
        let file = DbFile::new(
            dir.path().join("a.db"),
            StoreOptions {
                lock_writes: false,
                sync_writes: false,
            },
        );
        let _guard = file.lock().unwrap();
        assert!(!dir.path().join("a.db.lock").exists());
    }

    #[test]
    fn test_ensure_exists_fails_in_missing_directory() {
        let dir = TempDir::new().unwrap();
        let file = DbFile::new(dir.path().join("nope/a.db"), StoreOptions::default());
        assert!(!file.ensure_exists());
    }

    #[test]
    fn test_options_defaults_from_json() {
        let opts: StoreOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, StoreOptions::default());
        let opts: StoreOptions = serde_json::from_str(r#"{"lock_writes":false}"#).unwrap();
        assert!(!opts.lock_writes);
        assert!(opts.sync_writes);
    }
}
