//! Observable events emitted by dapi
//!
//! Events are explicit and typed; the string form is what lands in the
//! `event` field of each log line.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Process startup begins
    BootStart,
    /// Configuration file read and validated
    ConfigLoaded,
    /// Table metadata introspected from the store
    CatalogLoaded,
    /// Table declares a primary key dapi cannot address
    CompositeKeyIgnored,
    /// HTTP listener bound
    ServerListening,

    // Requests
    /// Handler produced a response
    RequestComplete,
    /// Request could not be routed or handled
    RequestFailed,
    /// Unknown column dropped from a filter
    ColumnDropped,

    // Batches
    /// Transaction opened for a batch
    BatchStart,
    /// One sub-request replayed
    BatchStep,
    /// Batch committed
    BatchCommitted,
    /// Batch rolled back
    BatchRolledBack,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "BOOT_START",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::CatalogLoaded => "CATALOG_LOADED",
            Event::CompositeKeyIgnored => "COMPOSITE_KEY_IGNORED",
            Event::ServerListening => "SERVER_LISTENING",

            Event::RequestComplete => "REQUEST_COMPLETE",
            Event::RequestFailed => "REQUEST_FAILED",
            Event::ColumnDropped => "COLUMN_DROPPED",

            Event::BatchStart => "BATCH_START",
            Event::BatchStep => "BATCH_STEP",
            Event::BatchCommitted => "BATCH_COMMITTED",
            Event::BatchRolledBack => "BATCH_ROLLED_BACK",
        }
    }

    /// Severity this event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::BatchStep => Severity::Trace,
            Event::CompositeKeyIgnored
            | Event::ColumnDropped
            | Event::RequestFailed
            | Event::BatchRolledBack => Severity::Warn,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_event_names() {
        assert_eq!(Event::BootStart.as_str(), "BOOT_START");
        assert_eq!(Event::CatalogLoaded.as_str(), "CATALOG_LOADED");
        assert_eq!(Event::ServerListening.as_str(), "SERVER_LISTENING");
    }

    #[test]
    fn test_event_names_are_screaming_snake_case() {
        let events = [
            Event::BootStart,
            Event::CatalogLoaded,
            Event::RequestComplete,
            Event::ColumnDropped,
            Event::BatchRolledBack,
        ];
        for event in events {
            assert!(event
                .as_str()
                .chars()
                .all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(Event::ColumnDropped.severity(), Severity::Warn);
        assert_eq!(Event::BatchCommitted.severity(), Severity::Info);
        assert_eq!(Event::BatchStep.severity(), Severity::Trace);
    }
}
