//! Observable store events
//!
//! Events are explicit and typed. Each event carries a fixed severity so
//! call sites never pick one ad hoc.

use std::fmt;

use super::logger::Severity;

/// Observable events in tardigrade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // File lifecycle
    /// Backing file created
    DbCreated,
    /// Backing file deleted
    DbDeleted,
    /// Backing file copied
    DbCopied,
    /// Backing file emptied (delete + create)
    DbEmptied,
    /// Backing file could not be created before an append
    DbCreateFailed,

    // Record writes
    /// Record line appended
    RecordAppended,
    /// Record replaced through a full rewrite
    RecordModified,
    /// Record omitted through a full rewrite
    RecordRemoved,
    /// Temporary image renamed over the backing file
    RewriteCommitted,
    /// Advisory write lock taken
    LockAcquired,

    /// Variadic flexible add rejected its arguments
    FlexAddRejected,

    // Faults
    /// A stored line failed to decode
    CorruptionDetected,

    // CLI
    /// Configuration loaded
    ConfigLoaded,
    /// A command failed
    CommandFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::DbCreated => "DB_CREATED",
            Event::DbDeleted => "DB_DELETED",
            Event::DbCopied => "DB_COPIED",
            Event::DbEmptied => "DB_EMPTIED",
            Event::DbCreateFailed => "DB_CREATE_FAILED",

            Event::RecordAppended => "RECORD_APPENDED",
            Event::RecordModified => "RECORD_MODIFIED",
            Event::RecordRemoved => "RECORD_REMOVED",
            Event::RewriteCommitted => "REWRITE_COMMITTED",
            Event::LockAcquired => "LOCK_ACQUIRED",
            Event::FlexAddRejected => "FLEX_ADD_REJECTED",

            Event::CorruptionDetected => "CORRUPTION_DETECTED",

            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::CommandFailed => "COMMAND_FAILED",
        }
    }

    /// Severity this event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::RewriteCommitted | Event::LockAcquired => Severity::Trace,
            Event::DbCreateFailed | Event::FlexAddRejected => Severity::Warn,
            Event::CorruptionDetected | Event::CommandFailed => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
