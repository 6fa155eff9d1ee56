//! Streaming record reader
//!
//! Walks the export with a pull parser and yields one [`RawEvent`] per
//! `Record` element of the selected category. Only the current element is
//! ever held in memory; non-matching elements are dropped as they are read.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::IngestError;
use crate::types::RawEvent;

/// Element name of individual health records
pub const RECORD_ELEMENT: &[u8] = b"Record";

/// Lazy, single-pass sequence of records of one category
///
/// Yields `Err(IngestError::DocumentUnreadable)` once if the document is
/// malformed or truncated, and nothing after that.
pub struct RecordReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    record_type: String,
    depth: usize,
    saw_root: bool,
    root_closed: bool,
    finished: bool,
    records_scanned: usize,
}

impl RecordReader<BufReader<File>> {
    /// Open an export file on disk
    pub fn from_path(path: impl AsRef<Path>, record_type: &str) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            IngestError::DocumentUnreadable(format!("cannot open {}: {e}", path.display()))
        })?;
        Ok(Self::new(BufReader::new(file), record_type))
    }
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(source: R, record_type: &str) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);

        Self {
            reader,
            buf: Vec::new(),
            record_type: record_type.to_string(),
            depth: 0,
            saw_root: false,
            root_closed: false,
            finished: false,
            records_scanned: 0,
        }
    }

    /// `Record` elements seen so far, of any category
    pub fn records_scanned(&self) -> usize {
        self.records_scanned
    }

    fn next_record(&mut self) -> Result<Option<RawEvent>, IngestError> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    if self.root_closed {
                        return Err(content_after_root());
                    }
                    self.saw_root = true;
                    self.depth += 1;
                    if e.local_name().as_ref() == RECORD_ELEMENT {
                        self.records_scanned += 1;
                        if let Some(raw) = matching_record(&e, &self.record_type)? {
                            return Ok(Some(raw));
                        }
                    }
                }
                Event::Empty(e) => {
                    if self.root_closed {
                        return Err(content_after_root());
                    }
                    self.saw_root = true;
                    if self.depth == 0 {
                        self.root_closed = true;
                    }
                    if e.local_name().as_ref() == RECORD_ELEMENT {
                        self.records_scanned += 1;
                        if let Some(raw) = matching_record(&e, &self.record_type)? {
                            return Ok(Some(raw));
                        }
                    }
                }
                Event::End(_) => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        self.root_closed = true;
                    }
                }
                Event::Text(e) if self.root_closed => {
                    if !e.iter().all(u8::is_ascii_whitespace) {
                        return Err(content_after_root());
                    }
                }
                Event::CData(_) if self.root_closed => return Err(content_after_root()),
                Event::Eof => {
                    if !self.saw_root {
                        return Err(IngestError::DocumentUnreadable(
                            "document has no root element".to_string(),
                        ));
                    }
                    if self.depth > 0 {
                        return Err(IngestError::DocumentUnreadable(format!(
                            "unexpected end of document with {} unclosed element(s)",
                            self.depth
                        )));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<RawEvent, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_record() {
            Ok(Some(raw)) => Some(Ok(raw)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

fn content_after_root() -> IngestError {
    IngestError::DocumentUnreadable("content after root element".to_string())
}

/// Build a [`RawEvent`] if the element's `type` matches
fn matching_record(
    element: &BytesStart<'_>,
    record_type: &str,
) -> Result<Option<RawEvent>, IngestError> {
    let mut raw = RawEvent::default();
    let mut matched = false;

    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let value = attr.unescape_value()?.into_owned();

        match attr.key.as_ref() {
            b"type" => {
                if value != record_type {
                    return Ok(None);
                }
                matched = true;
                raw.record_type = value;
            }
            b"sourceName" => raw.source_name = Some(value),
            b"sourceVersion" => raw.source_version = Some(value),
            b"device" => raw.device = Some(value),
            b"unit" => raw.unit = Some(value),
            b"creationDate" => raw.creation_date = Some(value),
            b"startDate" => raw.start_date = Some(value),
            b"endDate" => raw.end_date = Some(value),
            b"value" => raw.value = Some(value),
            _ => {}
        }
    }

    Ok(matched.then_some(raw))
}

/// Collect all attributes of an element as owned strings
pub(crate) fn attribute_pairs(
    element: &BytesStart<'_>,
) -> Result<Vec<(String, String)>, IngestError> {
    let mut pairs = Vec::new();
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        pairs.push((key, value));
    }
    Ok(pairs)
}
