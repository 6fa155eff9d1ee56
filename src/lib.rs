//! Sleep Ingest - streaming sleep extraction from personal health exports
//!
//! Reads a health export document in a single streaming pass and turns its
//! sleep analysis records into typed intervals and nightly metrics:
//! record reader → stage classifier → interval normalizer → night aggregator.
//!
//! Persistence is left to a [`sink::SleepSink`] implementation supplied by the
//! caller, invoked only after a run has succeeded.

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod encoder;
pub mod error;
pub mod export;
pub mod normalizer;
pub mod pipeline;
pub mod sink;
pub mod types;

pub use classifier::StageClassifier;
pub use config::{IngestConfig, SLEEP_ANALYSIS_TYPE};
pub use error::{IngestError, RecordIssue};
pub use export::{read_export_header, ExportHeader, RecordReader};
pub use pipeline::{extract_sleep, SleepExtraction, SleepPipeline};
pub use types::{IngestReport, NightAggregate, SleepInterval, SleepStage, StageSummary};

/// Crate version embedded in all batches
pub const INGEST_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for batches
pub const PRODUCER_NAME: &str = "sleep-ingest";
