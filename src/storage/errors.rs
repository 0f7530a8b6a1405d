//! Store error types
//!
//! Error codes:
//! - TG_STORE_IO_ERROR (ERROR severity)
//! - TG_STORE_WRITE_FAILED (ERROR severity)
//! - TG_STORE_READ_FAILED (ERROR severity)
//! - TG_STORE_LOCK_FAILED (ERROR severity)
//! - TG_ENCODE_FAILED (ERROR severity)
//! - TG_STORE_ID_EXHAUSTED (ERROR severity)
//! - TG_DATA_CORRUPTION (FATAL severity)
//!
//! Expected conditions (missing file, empty file, unknown id) are not
//! errors; see [`super::Condition`].

use std::fmt;
use std::io;
use std::path::Path;

use crate::serialization::SerializationError;

/// Severity levels for store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, caller may retry once the environment is fixed
    Error,
    /// Stored data can no longer be trusted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Store error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// Disk I/O failure outside a read or write (metadata, rename)
    TgStoreIoError,
    /// Append or rewrite failed
    TgStoreWriteFailed,
    /// Read of the backing file failed
    TgStoreReadFailed,
    /// Advisory write lock could not be taken
    TgStoreLockFailed,
    /// A record could not be encoded
    TgEncodeFailed,
    /// The last id is `u64::MAX`; no further id can be assigned
    TgStoreIdExhausted,
    /// A stored line is not a valid record
    TgDataCorruption,
}

impl StoreErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StoreErrorCode::TgStoreIoError => "TG_STORE_IO_ERROR",
            StoreErrorCode::TgStoreWriteFailed => "TG_STORE_WRITE_FAILED",
            StoreErrorCode::TgStoreReadFailed => "TG_STORE_READ_FAILED",
            StoreErrorCode::TgStoreLockFailed => "TG_STORE_LOCK_FAILED",
            StoreErrorCode::TgEncodeFailed => "TG_ENCODE_FAILED",
            StoreErrorCode::TgStoreIdExhausted => "TG_STORE_ID_EXHAUSTED",
            StoreErrorCode::TgDataCorruption => "TG_DATA_CORRUPTION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            StoreErrorCode::TgDataCorruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for StoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Store error with full context
#[derive(Debug)]
pub struct StoreError {
    code: StoreErrorCode,
    message: String,
    details: Option<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl StoreError {
    fn with_source(
        code: StoreErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: Some(Box::new(source)),
        }
    }

    /// Create a new store I/O error
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self::with_source(StoreErrorCode::TgStoreIoError, message, source)
    }

    /// Create a new write failed error
    pub fn write_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::with_source(StoreErrorCode::TgStoreWriteFailed, message, source)
    }

    /// Create a new read failed error
    pub fn read_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::with_source(StoreErrorCode::TgStoreReadFailed, message, source)
    }

    /// Create a new lock failed error
    pub fn lock_failed(path: &Path, source: io::Error) -> Self {
        Self::with_source(
            StoreErrorCode::TgStoreLockFailed,
            format!("Failed to lock {}", path.display()),
            source,
        )
    }

    /// Create an encode failure
    pub fn encode_failed(source: SerializationError) -> Self {
        Self::with_source(
            StoreErrorCode::TgEncodeFailed,
            "Failed to encode record",
            source,
        )
    }

    /// Create an id exhaustion error
    pub fn id_exhausted(path: &Path, last_id: u64) -> Self {
        Self {
            code: StoreErrorCode::TgStoreIdExhausted,
            message: format!("No id left after {} in {}", last_id, path.display()),
            details: None,
            source: None,
        }
    }

    /// Create a data corruption error for a stored line (FATAL)
    pub fn corruption_at_line(path: &Path, line_no: usize, source: SerializationError) -> Self {
        Self {
            code: StoreErrorCode::TgDataCorruption,
            message: format!("Unreadable record in {}", path.display()),
            details: Some(format!("line: {}", line_no)),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> StoreErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether the backing file must be considered corrupt
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization;

    fn parse_error() -> SerializationError {
        serialization::decode::<serde_json::Value>("{not json")
            .err()
            .unwrap()
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(StoreErrorCode::TgStoreIoError.code(), "TG_STORE_IO_ERROR");
        assert_eq!(StoreErrorCode::TgStoreWriteFailed.code(), "TG_STORE_WRITE_FAILED");
        assert_eq!(StoreErrorCode::TgStoreReadFailed.code(), "TG_STORE_READ_FAILED");
        assert_eq!(StoreErrorCode::TgStoreLockFailed.code(), "TG_STORE_LOCK_FAILED");
        assert_eq!(StoreErrorCode::TgEncodeFailed.code(), "TG_ENCODE_FAILED");
        assert_eq!(StoreErrorCode::TgStoreIdExhausted.code(), "TG_STORE_ID_EXHAUSTED");
        assert_eq!(StoreErrorCode::TgDataCorruption.code(), "TG_DATA_CORRUPTION");
    }

    #[test]
    fn test_only_corruption_is_fatal() {
        let err = StoreError::corruption_at_line(Path::new("a.db"), 3, parse_error());
        assert!(err.is_fatal());

        let err = StoreError::write_failed("disk full", io::Error::new(io::ErrorKind::Other, "disk full"));
        assert!(!err.is_fatal());
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn test_display_contains_context() {
        let err = StoreError::corruption_at_line(Path::new("a.db"), 12, parse_error());
        let display = err.to_string();
        assert!(display.contains("FATAL"));
        assert!(display.contains("TG_DATA_CORRUPTION"));
        assert!(display.contains("a.db"));
        assert!(display.contains("line: 12"));
    }

    #[test]
    fn test_source_is_exposed() {
        use std::error::Error;
        let err = StoreError::read_failed("read", io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(err.source().is_some());
    }
}
