//! Observability for tardigrade
//!
//! - Structured logging (JSON lines on stderr)
//! - Typed event catalogue
//!
//! Observability is read-only: it never changes the outcome of a store
//! operation and never fails one.
//!
//! ```ignore
//! use tardigrade::observability::{log_event_with_fields, Event, Logger, Severity};
//!
//! Logger::set_min_severity(Severity::Info);
//! log_event_with_fields(Event::RecordAppended, &[("id", "1")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log an event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
