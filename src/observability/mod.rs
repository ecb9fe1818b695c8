//! Observability for dapi
//!
//! Structured JSON logging with typed lifecycle and request events.
//!
//! ```ignore
//! use dapi::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::BatchCommitted, &[("steps", "3")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log an event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log an event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
