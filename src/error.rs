//! Error types for sleep ingestion
//!
//! Two tiers: [`IngestError`] aborts the whole run, [`RecordIssue`] is
//! attached to a single record and only ever counted.

use thiserror::Error;

/// Errors that abort an ingestion run
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Document unreadable: {0}")]
    DocumentUnreadable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage sink error: {0}")]
    Sink(String),
}

impl From<quick_xml::Error> for IngestError {
    fn from(e: quick_xml::Error) -> Self {
        IngestError::DocumentUnreadable(e.to_string())
    }
}

/// Per-record anomalies. The record is skipped (or a field nulled) and
/// processing continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordIssue {
    #[error("Missing attribute: {attribute}")]
    AttributeMissing { attribute: &'static str },

    #[error("Unparseable timestamp in {attribute}: {value:?}")]
    TimestampUnparseable {
        attribute: &'static str,
        value: String,
    },

    #[error("Interval ends before it starts: {start} > {end}")]
    IntervalInvalid { start: String, end: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_error_is_unreadable() {
        let err: IngestError =
            quick_xml::Error::Io(std::sync::Arc::new(std::io::Error::other("boom"))).into();
        assert!(matches!(err, IngestError::DocumentUnreadable(_)));
    }

    #[test]
    fn test_issue_messages() {
        let issue = RecordIssue::AttributeMissing {
            attribute: "startDate",
        };
        assert_eq!(issue.to_string(), "Missing attribute: startDate");
    }
}
