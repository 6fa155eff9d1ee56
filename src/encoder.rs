//! Batch encoding
//!
//! This module wraps a finished extraction into a self-describing batch for
//! bulk insertion by the storage layer.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IngestError;
use crate::pipeline::SleepExtraction;
use crate::types::{IngestReport, NightAggregate, SleepInterval, StageSummary};
use crate::{INGEST_VERSION, PRODUCER_NAME};

/// Current batch layout version
pub const BATCH_VERSION: &str = "1.0.0";

/// Producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Rows of one ingestion, ready for bulk insertion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepBatch {
    pub batch_version: String,
    pub producer: BatchProducer,
    pub computed_at_utc: String,
    pub report: IngestReport,
    pub intervals: Vec<SleepInterval>,
    pub nights: Vec<NightAggregate>,
    pub stages: Vec<StageSummary>,
}

/// Batch encoder for producing storage payloads
pub struct BatchEncoder {
    instance_id: String,
}

impl Default for BatchEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn encode(&self, extraction: SleepExtraction) -> SleepBatch {
        SleepBatch {
            batch_version: BATCH_VERSION.to_string(),
            producer: BatchProducer {
                name: PRODUCER_NAME.to_string(),
                version: INGEST_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            report: extraction.report,
            intervals: extraction.intervals,
            nights: extraction.nights,
            stages: extraction.stages,
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(&self, extraction: SleepExtraction) -> Result<String, IngestError> {
        let batch = self.encode(extraction);
        serde_json::to_string_pretty(&batch).map_err(IngestError::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_empty_extraction() {
        let encoder = BatchEncoder::with_instance_id("test-instance".to_string());
        let json = encoder.encode_to_json(SleepExtraction::default()).unwrap();

        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(payload["batch_version"], BATCH_VERSION);
        assert_eq!(payload["producer"]["name"], PRODUCER_NAME);
        assert_eq!(payload["producer"]["instance_id"], "test-instance");
        assert_eq!(payload["nights"].as_array().unwrap().len(), 0);
        assert_eq!(payload["report"]["records_matched"], 0);
    }

    #[test]
    fn test_instance_ids_are_unique() {
        let a = BatchEncoder::new().encode(SleepExtraction::default());
        let b = BatchEncoder::new().encode(SleepExtraction::default());
        assert_ne!(a.producer.instance_id, b.producer.instance_id);
    }
}
