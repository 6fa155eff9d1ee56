//! Interval normalization
//!
//! This module turns classified events into validated sleep intervals:
//! - Timestamps parsed with their original UTC offset kept
//! - Duration in whole minutes, truncated
//! - Night bucket derived from the local start date

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};

use crate::error::RecordIssue;
use crate::types::{ClassifiedEvent, SleepInterval};

/// Timestamp layout used by HealthKit exports, e.g. `2024-01-01 23:50:00 -0500`
pub const HEALTHKIT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Parse an export timestamp, keeping its offset.
///
/// Accepts the HealthKit layout and RFC 3339.
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    DateTime::parse_from_str(value, HEALTHKIT_TIMESTAMP_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
}

/// Where one night ends and the next begins, in local hours
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NightBoundary {
    hour: u32,
}

impl NightBoundary {
    /// Midnight boundary: the night is the local calendar date of the start
    pub const MIDNIGHT: NightBoundary = NightBoundary { hour: 0 };

    /// Boundary at `hour` local time; out-of-range hours wrap into 0-23
    pub fn at_hour(hour: u32) -> Self {
        Self { hour: hour % 24 }
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    /// Night bucket of an interval starting at `start`
    pub fn night_of(&self, start: &DateTime<FixedOffset>) -> NaiveDate {
        (*start - Duration::hours(i64::from(self.hour))).date_naive()
    }
}

/// Normalizer for converting classified events to sleep intervals
#[derive(Debug, Clone, Default)]
pub struct IntervalNormalizer {
    boundary: NightBoundary,
}

impl IntervalNormalizer {
    pub fn new(boundary: NightBoundary) -> Self {
        Self { boundary }
    }

    /// Normalize one event; any issue means the record is skipped
    pub fn normalize(&self, event: ClassifiedEvent) -> Result<SleepInterval, RecordIssue> {
        let ClassifiedEvent { raw, stage } = event;

        let start = required_timestamp("startDate", raw.start_date.as_deref())?;
        let end = required_timestamp("endDate", raw.end_date.as_deref())?;

        if end < start {
            return Err(RecordIssue::IntervalInvalid {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }

        Ok(SleepInterval {
            stage,
            start,
            end,
            duration_minutes: (end - start).num_minutes(),
            night: self.boundary.night_of(&start),
            source_name: raw.source_name,
            record_type: raw.record_type,
            source_version: raw.source_version,
            device: raw.device,
            unit: raw.unit,
            creation_date: raw.creation_date,
            value: raw.value,
        })
    }
}

fn required_timestamp(
    attribute: &'static str,
    value: Option<&str>,
) -> Result<DateTime<FixedOffset>, RecordIssue> {
    let value = value.ok_or(RecordIssue::AttributeMissing { attribute })?;
    parse_timestamp(value).ok_or_else(|| RecordIssue::TimestampUnparseable {
        attribute,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RawEvent, SleepStage};

    fn event(stage: SleepStage, start: Option<&str>, end: Option<&str>) -> ClassifiedEvent {
        ClassifiedEvent {
            raw: RawEvent {
                record_type: "HKCategoryTypeIdentifierSleepAnalysis".to_string(),
                source_name: Some("Watch".to_string()),
                start_date: start.map(str::to_string),
                end_date: end.map(str::to_string),
                ..Default::default()
            },
            stage,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_formats() {
        let hk = parse_timestamp("2024-01-01 23:50:00 -0500").unwrap();
        let rfc = parse_timestamp("2024-01-01T23:50:00-05:00").unwrap();

        assert_eq!(hk, rfc);
        assert_eq!(hk.offset().local_minus_utc(), -5 * 3600);
        assert!(parse_timestamp("2024-01-01 23:50:00").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_duration_minutes() {
        let normalizer = IntervalNormalizer::default();
        let interval = normalizer
            .normalize(event(
                SleepStage::AsleepCore,
                Some("2024-01-01 23:00:00 -0500"),
                Some("2024-01-02 02:00:00 -0500"),
            ))
            .unwrap();

        assert_eq!(interval.duration_minutes, 180);
        assert_eq!(interval.stage, SleepStage::AsleepCore);
        assert_eq!(interval.source_name.as_deref(), Some("Watch"));
    }

    #[test]
    fn test_partial_minutes_truncate() {
        let interval = IntervalNormalizer::default()
            .normalize(event(
                SleepStage::Awake,
                Some("2024-01-01 23:00:00 -0500"),
                Some("2024-01-01 23:04:59 -0500"),
            ))
            .unwrap();

        assert_eq!(interval.duration_minutes, 4);
    }

    #[test]
    fn test_zero_duration() {
        let interval = IntervalNormalizer::default()
            .normalize(event(
                SleepStage::InBed,
                Some("2024-01-01 23:00:00 -0500"),
                Some("2024-01-01 23:00:00 -0500"),
            ))
            .unwrap();

        assert_eq!(interval.duration_minutes, 0);
    }

    #[test]
    fn test_end_before_start_is_invalid() {
        let result = IntervalNormalizer::default().normalize(event(
            SleepStage::AsleepDeep,
            Some("2024-01-02 02:00:00 -0500"),
            Some("2024-01-01 23:00:00 -0500"),
        ));

        assert!(matches!(result, Err(RecordIssue::IntervalInvalid { .. })));
    }

    #[test]
    fn test_missing_and_unparseable_timestamps() {
        let normalizer = IntervalNormalizer::default();

        let missing = normalizer.normalize(event(
            SleepStage::Awake,
            Some("2024-01-01 23:00:00 -0500"),
            None,
        ));
        assert_eq!(
            missing,
            Err(RecordIssue::AttributeMissing {
                attribute: "endDate"
            })
        );

        let garbled = normalizer.normalize(event(
            SleepStage::Awake,
            Some("01/01/2024"),
            Some("2024-01-01 23:00:00 -0500"),
        ));
        assert!(matches!(
            garbled,
            Err(RecordIssue::TimestampUnparseable {
                attribute: "startDate",
                ..
            })
        ));
    }

    #[test]
    fn test_night_is_start_date_across_midnight() {
        let interval = IntervalNormalizer::default()
            .normalize(event(
                SleepStage::AsleepCore,
                Some("2024-01-01T23:50:00-05:00"),
                Some("2024-01-02T00:10:00-05:00"),
            ))
            .unwrap();

        assert_eq!(interval.night, date(2024, 1, 1));
        assert_eq!(interval.duration_minutes, 20);
    }

    #[test]
    fn test_night_uses_local_offset() {
        // 03:30 UTC on the 2nd is still the evening of the 1st in New York
        let interval = IntervalNormalizer::default()
            .normalize(event(
                SleepStage::AsleepCore,
                Some("2024-01-01 22:30:00 -0500"),
                Some("2024-01-01 23:30:00 -0500"),
            ))
            .unwrap();

        assert_eq!(interval.night, date(2024, 1, 1));
        assert_eq!(interval.start.to_rfc3339(), "2024-01-01T22:30:00-05:00");
    }

    #[test]
    fn test_shifted_boundary() {
        let noon = NightBoundary::at_hour(12);
        let early = parse_timestamp("2024-01-02 02:00:00 -0500").unwrap();
        let evening = parse_timestamp("2024-01-01 23:00:00 -0500").unwrap();
        let afternoon = parse_timestamp("2024-01-02 13:00:00 -0500").unwrap();

        assert_eq!(noon.night_of(&early), date(2024, 1, 1));
        assert_eq!(noon.night_of(&evening), date(2024, 1, 1));
        assert_eq!(noon.night_of(&afternoon), date(2024, 1, 2));
        assert_eq!(NightBoundary::MIDNIGHT.night_of(&early), date(2024, 1, 2));
        assert_eq!(NightBoundary::at_hour(25).hour(), 1);
    }
}
