//! Health export document access
//!
//! Streaming readers over an exported health document: the record reader
//! that feeds the pipeline, and the header reader for export metadata.

mod header;
mod reader;

pub use header::*;
pub use reader::*;
