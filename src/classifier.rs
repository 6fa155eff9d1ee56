//! Sleep stage classification
//!
//! Maps the category value string of a sleep record onto [`SleepStage`].
//! The lookup table belongs to the classifier instance, so alternate
//! vocabularies can be swapped in without touching global state.

use std::collections::HashMap;

use crate::types::{ClassifiedEvent, RawEvent, SleepStage};

/// HealthKit sleep analysis category values
pub const HEALTHKIT_SLEEP_VALUES: [(&str, SleepStage); 6] = [
    ("HKCategoryValueSleepAnalysisInBed", SleepStage::InBed),
    (
        "HKCategoryValueSleepAnalysisAsleepUnspecified",
        SleepStage::AsleepUnspecified,
    ),
    ("HKCategoryValueSleepAnalysisAwake", SleepStage::Awake),
    ("HKCategoryValueSleepAnalysisAsleepCore", SleepStage::AsleepCore),
    ("HKCategoryValueSleepAnalysisAsleepDeep", SleepStage::AsleepDeep),
    ("HKCategoryValueSleepAnalysisAsleepREM", SleepStage::AsleepRem),
];

/// Total mapping from value string to stage
#[derive(Debug, Clone)]
pub struct StageClassifier {
    table: HashMap<String, SleepStage>,
}

impl Default for StageClassifier {
    fn default() -> Self {
        Self::with_table(HEALTHKIT_SLEEP_VALUES)
    }
}

impl StageClassifier {
    /// Create a classifier over a custom vocabulary
    pub fn with_table<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, SleepStage)>,
        S: Into<String>,
    {
        Self {
            table: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Stage for a value; anything outside the table is `Unknown`
    pub fn stage_for(&self, value: Option<&str>) -> SleepStage {
        value
            .and_then(|v| self.table.get(v))
            .copied()
            .unwrap_or(SleepStage::Unknown)
    }

    pub fn classify(&self, raw: RawEvent) -> ClassifiedEvent {
        let stage = self.stage_for(raw.value.as_deref());
        ClassifiedEvent { raw, stage }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthkit_table() {
        let classifier = StageClassifier::default();
        let cases = [
            ("HKCategoryValueSleepAnalysisInBed", SleepStage::InBed),
            (
                "HKCategoryValueSleepAnalysisAsleepUnspecified",
                SleepStage::AsleepUnspecified,
            ),
            ("HKCategoryValueSleepAnalysisAwake", SleepStage::Awake),
            ("HKCategoryValueSleepAnalysisAsleepCore", SleepStage::AsleepCore),
            ("HKCategoryValueSleepAnalysisAsleepDeep", SleepStage::AsleepDeep),
            ("HKCategoryValueSleepAnalysisAsleepREM", SleepStage::AsleepRem),
        ];

        for (value, expected) in cases {
            assert_eq!(classifier.stage_for(Some(value)), expected, "{value}");
        }
    }

    #[test]
    fn test_unrecognized_values_are_unknown() {
        let classifier = StageClassifier::default();
        let cases = [
            Some(""),
            Some("HKCategoryValueSleepAnalysisAsleep"),
            Some("hkcategoryvaluesleepanalysisinbed"),
            Some("HKCategoryValueSleepAnalysisAsleepREM "),
            Some("42"),
            None,
        ];

        for value in cases {
            assert_eq!(classifier.stage_for(value), SleepStage::Unknown, "{value:?}");
        }
    }

    #[test]
    fn test_custom_vocabulary() {
        let classifier = StageClassifier::with_table([
            ("light", SleepStage::AsleepCore),
            ("deep", SleepStage::AsleepDeep),
        ]);

        assert_eq!(classifier.len(), 2);
        assert_eq!(classifier.stage_for(Some("deep")), SleepStage::AsleepDeep);
        assert_eq!(
            classifier.stage_for(Some("HKCategoryValueSleepAnalysisInBed")),
            SleepStage::Unknown
        );
    }

    #[test]
    fn test_classify_keeps_raw() {
        let raw = RawEvent {
            value: Some("HKCategoryValueSleepAnalysisAwake".to_string()),
            source_name: Some("Watch".to_string()),
            ..Default::default()
        };

        let classified = StageClassifier::default().classify(raw.clone());
        assert_eq!(classified.stage, SleepStage::Awake);
        assert_eq!(classified.raw, raw);
    }
}
