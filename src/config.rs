//! Ingestion configuration
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

use crate::error::IngestError;

/// Category identifier of sleep analysis records in a HealthKit export
pub const SLEEP_ANALYSIS_TYPE: &str = "HKCategoryTypeIdentifierSleepAnalysis";

/// Environment variable overriding [`IngestConfig::record_type`]
pub const ENV_RECORD_TYPE: &str = "SLEEP_INGEST_RECORD_TYPE";

/// Environment variable overriding [`IngestConfig::night_boundary_hour`]
pub const ENV_NIGHT_BOUNDARY_HOUR: &str = "SLEEP_INGEST_NIGHT_BOUNDARY_HOUR";

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// `type` attribute of the records to extract
    pub record_type: String,
    /// Local hour at which a night bucket begins (0 = calendar date of start)
    pub night_boundary_hour: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            record_type: SLEEP_ANALYSIS_TYPE.to_string(),
            night_boundary_hour: 0,
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SLEEP_INGEST_RECORD_TYPE`: record category (default: sleep analysis)
    /// - `SLEEP_INGEST_NIGHT_BOUNDARY_HOUR`: night boundary hour, 0-23 (default: 0)
    pub fn from_env() -> Result<Self, IngestError> {
        Self::load_from(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn load_from<F>(lookup: F) -> Result<Self, IngestError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(record_type) = lookup(ENV_RECORD_TYPE) {
            if !record_type.trim().is_empty() {
                cfg.record_type = record_type.trim().to_string();
            }
        }

        if let Some(hour) = lookup(ENV_NIGHT_BOUNDARY_HOUR) {
            cfg.night_boundary_hour = hour.trim().parse().map_err(|_| {
                IngestError::InvalidConfig(format!(
                    "{ENV_NIGHT_BOUNDARY_HOUR} must be an hour 0-23, got {hour:?}"
                ))
            })?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.record_type.is_empty() {
            return Err(IngestError::InvalidConfig(
                "record type must not be empty".to_string(),
            ));
        }
        if self.night_boundary_hour > 23 {
            return Err(IngestError::InvalidConfig(format!(
                "night boundary hour must be 0-23, got {}",
                self.night_boundary_hour
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let cfg = IngestConfig::default();
        assert_eq!(cfg.record_type, SLEEP_ANALYSIS_TYPE);
        assert_eq!(cfg.night_boundary_hour, 0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_load_overrides() {
        let cfg = IngestConfig::load_from(lookup(&[
            (ENV_RECORD_TYPE, "HKCategoryTypeIdentifierMindfulSession"),
            (ENV_NIGHT_BOUNDARY_HOUR, "12"),
        ]))
        .unwrap();
        assert_eq!(cfg.record_type, "HKCategoryTypeIdentifierMindfulSession");
        assert_eq!(cfg.night_boundary_hour, 12);
    }

    #[test]
    fn test_blank_record_type_keeps_default() {
        let cfg = IngestConfig::load_from(lookup(&[(ENV_RECORD_TYPE, "  ")])).unwrap();
        assert_eq!(cfg.record_type, SLEEP_ANALYSIS_TYPE);
    }

    #[test]
    fn test_invalid_boundary() {
        let result = IngestConfig::load_from(lookup(&[(ENV_NIGHT_BOUNDARY_HOUR, "24")]));
        assert!(matches!(result, Err(IngestError::InvalidConfig(_))));

        let result = IngestConfig::load_from(lookup(&[(ENV_NIGHT_BOUNDARY_HOUR, "noon")]));
        assert!(matches!(result, Err(IngestError::InvalidConfig(_))));
    }
}
