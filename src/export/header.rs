//! Export header metadata
//!
//! The export starts with a `HealthData` root carrying the locale, an
//! `ExportDate` element and a `Me` element of personal characteristics.
//! These precede the records, so reading stops at the first `Record`.

use std::collections::BTreeMap;
use std::io::BufRead;

use chrono::{DateTime, FixedOffset};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use super::reader::{attribute_pairs, RECORD_ELEMENT};
use crate::error::IngestError;
use crate::normalizer::parse_timestamp;

/// Metadata found ahead of the records in an export
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportHeader {
    /// `locale` of the `HealthData` root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Raw `value` of `ExportDate`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_date: Option<String>,
    /// Attributes of `Me`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub me: BTreeMap<String, String>,
}

impl ExportHeader {
    /// Export date as an instant, if present and parseable
    pub fn export_instant(&self) -> Option<DateTime<FixedOffset>> {
        self.export_date.as_deref().and_then(parse_timestamp)
    }
}

/// Read the export header, stopping at the first record
pub fn read_export_header<R: BufRead>(source: R) -> Result<ExportHeader, IngestError> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut header = ExportHeader::default();
    let mut saw_root = false;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => {
                saw_root = true;
                match e.local_name().as_ref() {
                    b"HealthData" => {
                        header.locale = attribute_pairs(&e)?
                            .into_iter()
                            .find(|(k, _)| k == "locale")
                            .map(|(_, v)| v);
                    }
                    b"ExportDate" => {
                        header.export_date = attribute_pairs(&e)?
                            .into_iter()
                            .find(|(k, _)| k == "value")
                            .map(|(_, v)| v);
                    }
                    b"Me" => {
                        header.me = attribute_pairs(&e)?.into_iter().collect();
                    }
                    name if name == RECORD_ELEMENT => break,
                    _ => {}
                }
            }
            Event::Eof => {
                if !saw_root {
                    return Err(IngestError::DocumentUnreadable(
                        "document has no root element".to_string(),
                    ));
                }
                break;
            }
            _ => {}
        }
    }

    Ok(header)
}
