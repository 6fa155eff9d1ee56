//! Core types for the sleep ingestion pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw export records, classified events, validated intervals, and
//! nightly aggregates.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::RecordIssue;

/// Sleep stage classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepStage {
    InBed,
    AsleepUnspecified,
    Awake,
    AsleepCore,
    AsleepDeep,
    AsleepRem,
    Unknown,
}

impl SleepStage {
    pub const ALL: [SleepStage; 7] = [
        SleepStage::InBed,
        SleepStage::AsleepUnspecified,
        SleepStage::Awake,
        SleepStage::AsleepCore,
        SleepStage::AsleepDeep,
        SleepStage::AsleepRem,
        SleepStage::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SleepStage::InBed => "in_bed",
            SleepStage::AsleepUnspecified => "asleep_unspecified",
            SleepStage::Awake => "awake",
            SleepStage::AsleepCore => "asleep_core",
            SleepStage::AsleepDeep => "asleep_deep",
            SleepStage::AsleepRem => "asleep_rem",
            SleepStage::Unknown => "unknown",
        }
    }

    /// Whether minutes in this stage count toward total sleep time
    pub fn is_asleep(&self) -> bool {
        matches!(
            self,
            SleepStage::AsleepUnspecified
                | SleepStage::AsleepCore
                | SleepStage::AsleepDeep
                | SleepStage::AsleepRem
        )
    }
}

impl std::fmt::Display for SleepStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One `Record` element of the selected category, attributes kept as strings
///
/// Any attribute may be absent; exporters differ across device and OS versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// `type` attribute (category identifier)
    pub record_type: String,
    pub source_name: Option<String>,
    pub source_version: Option<String>,
    pub device: Option<String>,
    pub unit: Option<String>,
    pub creation_date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub value: Option<String>,
}

impl RawEvent {
    /// Number of expected attributes that were absent on the element
    pub fn missing_attributes(&self) -> usize {
        [
            &self.source_name,
            &self.source_version,
            &self.creation_date,
            &self.start_date,
            &self.end_date,
            &self.value,
        ]
        .iter()
        .filter(|v| v.is_none())
        .count()
    }
}

/// A raw event with its resolved stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEvent {
    pub raw: RawEvent,
    pub stage: SleepStage,
}

/// A validated sleep interval, one row per accepted record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepInterval {
    pub stage: SleepStage,
    /// Start instant, offset preserved from the export
    pub start: DateTime<FixedOffset>,
    /// End instant, offset preserved from the export
    pub end: DateTime<FixedOffset>,
    /// Whole minutes between start and end, truncated
    pub duration_minutes: i64,
    /// Night bucket this interval is aggregated under
    pub night: NaiveDate,
    pub source_name: Option<String>,
    pub record_type: String,
    pub source_version: Option<String>,
    pub device: Option<String>,
    pub unit: Option<String>,
    pub creation_date: Option<String>,
    /// Raw category value as exported
    pub value: Option<String>,
}

/// Finalized per-night sleep metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NightAggregate {
    pub date: NaiveDate,
    /// Earliest start among asleep intervals
    pub sleep_start: Option<DateTime<FixedOffset>>,
    /// Latest end among asleep intervals
    pub sleep_end: Option<DateTime<FixedOffset>>,
    pub total_sleep_minutes: i64,
    pub total_sleep_hours: f64,
    pub time_in_bed_minutes: i64,
    pub sleep_efficiency_pct: f64,
    pub asleep_core_minutes: i64,
    pub asleep_deep_minutes: i64,
    pub asleep_rem_minutes: i64,
    pub awake_minutes: i64,
    pub asleep_core_pct: f64,
    pub asleep_deep_pct: f64,
    pub asleep_rem_pct: f64,
    pub awake_pct: f64,
    /// First source seen for the night
    pub source_name: Option<String>,
}

/// Per-night, per-stage totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub date: NaiveDate,
    pub stage: SleepStage,
    pub total_minutes: i64,
    pub interval_count: usize,
    pub first_event: DateTime<FixedOffset>,
    pub last_event: DateTime<FixedOffset>,
}

/// Run-level accounting of what was read and what was skipped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// `Record` elements of any category
    pub records_scanned: usize,
    /// Elements of the selected category
    pub records_matched: usize,
    pub intervals_emitted: usize,
    pub skipped_invalid_interval: usize,
    pub skipped_missing_timestamp: usize,
    pub skipped_unparseable_timestamp: usize,
    /// Absent attributes across all matched elements
    pub missing_attributes: usize,
    /// Intervals whose value fell outside the stage vocabulary
    pub unknown_stage: usize,
    pub nights: usize,
    pub first_night: Option<NaiveDate>,
    pub last_night: Option<NaiveDate>,
}

impl IngestReport {
    /// Count a skipped record by reason
    pub fn record_issue(&mut self, issue: &RecordIssue) {
        match issue {
            RecordIssue::AttributeMissing { .. } => self.skipped_missing_timestamp += 1,
            RecordIssue::TimestampUnparseable { .. } => self.skipped_unparseable_timestamp += 1,
            RecordIssue::IntervalInvalid { .. } => self.skipped_invalid_interval += 1,
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped_invalid_interval
            + self.skipped_missing_timestamp
            + self.skipped_unparseable_timestamp
    }

    pub fn is_empty(&self) -> bool {
        self.intervals_emitted == 0
    }
}
