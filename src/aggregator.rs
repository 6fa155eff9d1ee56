//! Nightly aggregation
//!
//! This module folds sleep intervals into per-night metrics:
//! - Total sleep time from asleep stages only
//! - Time in bed as the span of asleep intervals
//! - Sleep efficiency and per-stage percentages
//! - Per-stage totals for each night
//!
//! Intervals are summed as given. Overlapping intervals from several devices
//! are not merged, so efficiency can exceed 100%.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::types::{NightAggregate, SleepInterval, SleepStage, StageSummary};

/// Finalized output of a [`NightAggregator`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    /// One row per night, ascending by date
    pub nights: Vec<NightAggregate>,
    /// One row per (night, stage), ascending by date then stage
    pub stages: Vec<StageSummary>,
}

/// Running sums for one night
#[derive(Debug, Default)]
struct NightBucket {
    sleep_start: Option<DateTime<FixedOffset>>,
    sleep_end: Option<DateTime<FixedOffset>>,
    total_sleep_minutes: i64,
    core_minutes: i64,
    deep_minutes: i64,
    rem_minutes: i64,
    awake_minutes: i64,
    asleep_source: Option<String>,
    any_source: Option<String>,
}

impl NightBucket {
    fn fold(&mut self, interval: &SleepInterval) {
        if self.any_source.is_none() {
            self.any_source = interval.source_name.clone();
        }

        match interval.stage {
            SleepStage::AsleepCore => self.core_minutes += interval.duration_minutes,
            SleepStage::AsleepDeep => self.deep_minutes += interval.duration_minutes,
            SleepStage::AsleepRem => self.rem_minutes += interval.duration_minutes,
            SleepStage::Awake => self.awake_minutes += interval.duration_minutes,
            _ => {}
        }

        if !interval.stage.is_asleep() {
            return;
        }

        self.total_sleep_minutes += interval.duration_minutes;
        if self.asleep_source.is_none() {
            self.asleep_source = interval.source_name.clone();
        }
        if self.sleep_start.map_or(true, |s| interval.start < s) {
            self.sleep_start = Some(interval.start);
        }
        if self.sleep_end.map_or(true, |e| interval.end > e) {
            self.sleep_end = Some(interval.end);
        }
    }

    fn finalize(self, date: NaiveDate) -> NightAggregate {
        let time_in_bed_minutes = match (self.sleep_start, self.sleep_end) {
            (Some(start), Some(end)) => (end - start).num_minutes(),
            _ => 0,
        };
        let total = self.total_sleep_minutes;

        NightAggregate {
            date,
            sleep_start: self.sleep_start,
            sleep_end: self.sleep_end,
            total_sleep_minutes: total,
            total_sleep_hours: total as f64 / 60.0,
            time_in_bed_minutes,
            sleep_efficiency_pct: percentage(total, time_in_bed_minutes),
            asleep_core_minutes: self.core_minutes,
            asleep_deep_minutes: self.deep_minutes,
            asleep_rem_minutes: self.rem_minutes,
            awake_minutes: self.awake_minutes,
            asleep_core_pct: percentage(self.core_minutes, total),
            asleep_deep_pct: percentage(self.deep_minutes, total),
            asleep_rem_pct: percentage(self.rem_minutes, total),
            awake_pct: percentage(self.awake_minutes, time_in_bed_minutes),
            source_name: self.asleep_source.or(self.any_source),
        }
    }
}

/// Running totals for one stage within one night
#[derive(Debug)]
struct StageBucket {
    total_minutes: i64,
    interval_count: usize,
    first_event: DateTime<FixedOffset>,
    last_event: DateTime<FixedOffset>,
}

/// Groups intervals by night in arrival order
#[derive(Debug, Default)]
pub struct NightAggregator {
    nights: HashMap<NaiveDate, NightBucket>,
    stages: HashMap<(NaiveDate, SleepStage), StageBucket>,
    folded: usize,
}

impl NightAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one interval to its night's running sums
    pub fn fold(&mut self, interval: &SleepInterval) {
        self.folded += 1;
        self.nights.entry(interval.night).or_default().fold(interval);

        self.stages
            .entry((interval.night, interval.stage))
            .and_modify(|bucket| {
                bucket.total_minutes += interval.duration_minutes;
                bucket.interval_count += 1;
                if interval.start < bucket.first_event {
                    bucket.first_event = interval.start;
                }
                if interval.end > bucket.last_event {
                    bucket.last_event = interval.end;
                }
            })
            .or_insert_with(|| StageBucket {
                total_minutes: interval.duration_minutes,
                interval_count: 1,
                first_event: interval.start,
                last_event: interval.end,
            });
    }

    /// Intervals folded so far
    pub fn len(&self) -> usize {
        self.folded
    }

    pub fn is_empty(&self) -> bool {
        self.folded == 0
    }

    /// Close every open night and compute derived fields
    pub fn finish(self) -> Aggregation {
        let mut nights: Vec<NightAggregate> = self
            .nights
            .into_iter()
            .map(|(date, bucket)| bucket.finalize(date))
            .collect();
        nights.sort_by(|a, b| a.date.cmp(&b.date));

        let mut stages: Vec<StageSummary> = self
            .stages
            .into_iter()
            .map(|((date, stage), bucket)| StageSummary {
                date,
                stage,
                total_minutes: bucket.total_minutes,
                interval_count: bucket.interval_count,
                first_event: bucket.first_event,
                last_event: bucket.last_event,
            })
            .collect();
        stages.sort_by(|a, b| (a.date, a.stage.as_str()).cmp(&(b.date, b.stage.as_str())));

        Aggregation { nights, stages }
    }
}

/// `part / whole * 100`, or 0 when there is nothing to divide by
fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}
