//! Pipeline orchestration
//!
//! This module provides the public API for sleep ingestion.
//! It drives one sequential pass from the export document to nightly metrics:
//! record reader → stage classifier → interval normalizer → night aggregator.

use std::io::BufRead;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::aggregator::NightAggregator;
use crate::classifier::StageClassifier;
use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::export::RecordReader;
use crate::normalizer::{IntervalNormalizer, NightBoundary};
use crate::sink::SleepSink;
use crate::types::{IngestReport, NightAggregate, SleepInterval, SleepStage, StageSummary};

/// Everything one run produces
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SleepExtraction {
    /// Accepted intervals in document order
    pub intervals: Vec<SleepInterval>,
    /// Nightly aggregates, ascending by date
    pub nights: Vec<NightAggregate>,
    /// Per-night, per-stage totals
    pub stages: Vec<StageSummary>,
    pub report: IngestReport,
}

impl SleepExtraction {
    /// No sleep records survived; a valid outcome the caller may reject
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

/// Extract sleep intervals and nightly metrics from an export file on disk.
///
/// # Example
/// ```ignore
/// let extraction = extract_sleep("export.xml")?;
/// for night in &extraction.nights {
///     println!("{} {:.1}%", night.date, night.sleep_efficiency_pct);
/// }
/// ```
pub fn extract_sleep(path: impl AsRef<Path>) -> Result<SleepExtraction, IngestError> {
    SleepPipeline::default().run_path(path)
}

/// Configured pipeline. Holds no state between runs.
#[derive(Debug, Clone)]
pub struct SleepPipeline {
    config: IngestConfig,
    classifier: StageClassifier,
    normalizer: IntervalNormalizer,
}

impl Default for SleepPipeline {
    fn default() -> Self {
        Self {
            config: IngestConfig::default(),
            classifier: StageClassifier::default(),
            normalizer: IntervalNormalizer::default(),
        }
    }
}

impl SleepPipeline {
    pub fn new(config: IngestConfig) -> Result<Self, IngestError> {
        config.validate()?;
        let normalizer = IntervalNormalizer::new(NightBoundary::at_hour(config.night_boundary_hour));
        Ok(Self {
            config,
            classifier: StageClassifier::default(),
            normalizer,
        })
    }

    /// Replace the stage vocabulary
    pub fn with_classifier(mut self, classifier: StageClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Run over any buffered byte source
    pub fn run<R: BufRead>(&self, source: R) -> Result<SleepExtraction, IngestError> {
        self.process(RecordReader::new(source, &self.config.record_type))
    }

    /// Run over an export file on disk
    pub fn run_path(&self, path: impl AsRef<Path>) -> Result<SleepExtraction, IngestError> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "reading health export");
        self.process(RecordReader::from_path(path, &self.config.record_type)?)
    }

    /// Run, then hand the rows to `sink`. The sink is untouched if the run fails.
    pub fn run_into<R, S>(&self, source: R, sink: &mut S) -> Result<SleepExtraction, IngestError>
    where
        R: BufRead,
        S: SleepSink + ?Sized,
    {
        let extraction = self.run(source)?;

        let stored = sink.write_intervals(&extraction.intervals)?;
        let upserted = sink.upsert_nights(&extraction.nights)?;
        tracing::info!(intervals = stored, nights = upserted, "handed rows to storage");

        Ok(extraction)
    }

    fn process<R: BufRead>(
        &self,
        mut reader: RecordReader<R>,
    ) -> Result<SleepExtraction, IngestError> {
        let mut report = IngestReport::default();
        let mut aggregator = NightAggregator::new();
        let mut intervals = Vec::new();

        tracing::debug!(
            record_type = %self.config.record_type,
            vocabulary = self.classifier.len(),
            night_boundary_hour = self.config.night_boundary_hour,
            "starting sleep extraction"
        );

        for raw in reader.by_ref() {
            let raw = raw?;
            report.records_matched += 1;
            report.missing_attributes += raw.missing_attributes();

            let classified = self.classifier.classify(raw);
            match self.normalizer.normalize(classified) {
                Ok(interval) => {
                    if interval.stage == SleepStage::Unknown {
                        report.unknown_stage += 1;
                    }
                    aggregator.fold(&interval);
                    intervals.push(interval);
                }
                Err(issue) => {
                    tracing::debug!(%issue, "skipping sleep record");
                    report.record_issue(&issue);
                }
            }
        }

        tracing::debug!(folded = aggregator.len(), "closing night buckets");
        let aggregation = aggregator.finish();

        report.records_scanned = reader.records_scanned();
        report.intervals_emitted = intervals.len();
        report.nights = aggregation.nights.len();
        report.first_night = aggregation.nights.first().map(|n| n.date);
        report.last_night = aggregation.nights.last().map(|n| n.date);

        if report.skipped() > 0 {
            tracing::warn!(
                skipped = report.skipped(),
                invalid_interval = report.skipped_invalid_interval,
                missing_timestamp = report.skipped_missing_timestamp,
                unparseable_timestamp = report.skipped_unparseable_timestamp,
                "skipped sleep records"
            );
        }
        if report.is_empty() {
            tracing::warn!(record_type = %self.config.record_type, "no sleep records found");
        }
        tracing::info!(
            scanned = report.records_scanned,
            matched = report.records_matched,
            intervals = report.intervals_emitted,
            nights = report.nights,
            "sleep extraction complete"
        );

        Ok(SleepExtraction {
            intervals,
            nights: aggregation.nights,
            stages: aggregation.stages,
            report,
        })
    }
}
