//! Record storage subsystem for tardigrade
//!
//! A store is a plain text file holding one JSON record per line. There is
//! no in-memory index and no cache: every operation opens the file, scans
//! or appends, and closes it again.
//!
//! # Design Principles
//!
//! - Append-only creation (`id` = last id + 1, or 1 for an empty file)
//! - Identity by parsed `id`, never by substring
//! - Modify and remove rewrite the whole file through a temp file + rename
//! - Writers hold an advisory lock on `<path>.lock`
//! - Corrupt lines abort the operation (never skipped)
//! - Missing file, empty file and unknown id are conditions, not errors

mod condition;
mod errors;
mod file;
mod fixed;
mod flex;
mod record;
mod table;

pub use condition::{Condition, Listing, Lookup, Outcome};
pub use errors::{Severity, StoreError, StoreErrorCode, StoreResult};
pub use file::{DbFile, StoreOptions, WriteLock};
pub use fixed::FixedStore;
pub use flex::{pairs_to_fields, FlexStore};
pub use record::{FlexRecord, Format, Record, Schema, StoredRecord};
pub use table::{keywords, LineTable, Row};
