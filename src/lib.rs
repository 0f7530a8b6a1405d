//! tardigrade - an embeddable flat-file record store
//!
//! Every record is one compact JSON object on its own line. Two stores
//! share the file discipline:
//!
//! - [`FixedStore`]: `{id, key, data}` records with an opaque payload
//! - [`FlexStore`]: `{id, key, fields}` records with named string attributes
//!
//! ```no_run
//! use tardigrade::FixedStore;
//!
//! let store = FixedStore::open("tardigrade.db");
//! store.add("user:1", "hello").unwrap();
//! assert_eq!(store.select_by_id(1, "value").unwrap(), "hello");
//! ```

pub mod cipher;
pub mod cli;
pub mod observability;
pub mod serialization;
pub mod storage;

pub use cipher::{AesGcmTransform, CipherError, ValueTransform};
pub use storage::{
    Condition, FixedStore, FlexRecord, FlexStore, Format, Listing, Lookup, Outcome, Record,
    StoreError, StoreOptions, StoreResult,
};

/// Release version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
