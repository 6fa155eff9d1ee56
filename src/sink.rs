//! Storage hand-off
//!
//! The pipeline never persists anything itself. Once a run has fully
//! succeeded, its rows are handed to a [`SleepSink`], which owns conflict
//! handling (interval de-duplication, per-night replacement).

use std::collections::{BTreeMap, HashSet};
use std::io::Write;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;

use crate::error::IngestError;
use crate::types::{NightAggregate, SleepInterval, SleepStage};

/// Trait for storage collaborators receiving pipeline output
pub trait SleepSink {
    /// Store interval rows; returns the number of rows newly stored
    fn write_intervals(&mut self, intervals: &[SleepInterval]) -> Result<usize, IngestError>;

    /// Insert or replace night rows by date; returns the number of rows written
    fn upsert_nights(&mut self, nights: &[NightAggregate]) -> Result<usize, IngestError>;
}

type IntervalKey = (
    DateTime<FixedOffset>,
    DateTime<FixedOffset>,
    SleepStage,
    Option<String>,
);

/// In-memory sink with idempotent upsert semantics
#[derive(Debug, Default)]
pub struct MemorySink {
    intervals: Vec<SleepInterval>,
    seen: HashSet<IntervalKey>,
    nights: BTreeMap<NaiveDate, NightAggregate>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intervals(&self) -> &[SleepInterval] {
        &self.intervals
    }

    /// Stored nights, ascending by date
    pub fn nights(&self) -> impl Iterator<Item = &NightAggregate> {
        self.nights.values()
    }

    pub fn night(&self, date: NaiveDate) -> Option<&NightAggregate> {
        self.nights.get(&date)
    }
}

impl SleepSink for MemorySink {
    fn write_intervals(&mut self, intervals: &[SleepInterval]) -> Result<usize, IngestError> {
        let mut inserted = 0;
        for interval in intervals {
            let key = (
                interval.start,
                interval.end,
                interval.stage,
                interval.source_name.clone(),
            );
            if self.seen.insert(key) {
                self.intervals.push(interval.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn upsert_nights(&mut self, nights: &[NightAggregate]) -> Result<usize, IngestError> {
        for night in nights {
            self.nights.insert(night.date, night.clone());
        }
        Ok(nights.len())
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Row<'a> {
    Interval(&'a SleepInterval),
    Night(&'a NightAggregate),
}

/// Sink writing one JSON object per line, tagged with `kind`
pub struct NdjsonSink<W: Write> {
    writer: W,
}

impl<W: Write> NdjsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_row(&mut self, row: &Row<'_>) -> Result<(), IngestError> {
        serde_json::to_writer(&mut self.writer, row)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> SleepSink for NdjsonSink<W> {
    fn write_intervals(&mut self, intervals: &[SleepInterval]) -> Result<usize, IngestError> {
        for interval in intervals {
            self.write_row(&Row::Interval(interval))?;
        }
        self.writer.flush()?;
        Ok(intervals.len())
    }

    fn upsert_nights(&mut self, nights: &[NightAggregate]) -> Result<usize, IngestError> {
        for night in nights {
            self.write_row(&Row::Night(night))?;
        }
        self.writer.flush()?;
        Ok(nights.len())
    }
}
