//! Insight payload encoding
//!
//! Wraps an analysis report in a versioned envelope identifying the producer
//! and when the report was computed.

use crate::error::InsightError;
use crate::pipeline::InsightReport;
use crate::{INSIGHT_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current insight payload schema version
pub const INSIGHT_SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightPayload {
    pub schema_version: String,
    pub producer: InsightProducer,
    pub computed_at_utc: String,
    pub report: InsightReport,
}

/// Encoder for insight payloads
pub struct InsightEncoder {
    instance_id: String,
}

impl Default for InsightEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl InsightEncoder {
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

    pub fn encode(&self, report: &InsightReport) -> InsightPayload {
        InsightPayload {
            schema_version: INSIGHT_SCHEMA_VERSION.to_string(),
            producer: InsightProducer {
                name: PRODUCER_NAME.to_string(),
                version: INSIGHT_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            report: report.clone(),
        }
    }

    /// Encode to compact JSON
    pub fn encode_to_json(&self, report: &InsightReport) -> Result<String, InsightError> {
        serde_json::to_string(&self.encode(report))
            .map_err(|e| InsightError::EncodingError(e.to_string()))
    }

    pub fn encode_to_json_pretty(&self, report: &InsightReport) -> Result<String, InsightError> {
        serde_json::to_string_pretty(&self.encode(report))
            .map_err(|e| InsightError::EncodingError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{HealthSnapshot, InsightEngine};
    use crate::types::{Availability, DailyMetricRecord};
    use chrono::NaiveDate;

    fn make_report() -> InsightReport {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let record = DailyMetricRecord {
            sleep_score: Some(81.0),
            readiness_score: Some(74.0),
            ..DailyMetricRecord::new(date)
        };
        let snapshot = HealthSnapshot::new(vec![record], Vec::new(), Availability::default());
        InsightEngine::default().analyze(&snapshot, None).unwrap()
    }

    #[test]
    fn test_encode_carries_producer_metadata() {
        let encoder = InsightEncoder::with_instance_id("test-instance".to_string());
        let payload = encoder.encode(&make_report());

        assert_eq!(payload.schema_version, INSIGHT_SCHEMA_VERSION);
        assert_eq!(payload.producer.name, PRODUCER_NAME);
        assert_eq!(payload.producer.version, INSIGHT_VERSION);
        assert_eq!(payload.producer.instance_id, "test-instance");
        assert!(chrono::DateTime::parse_from_rfc3339(&payload.computed_at_utc).is_ok());
    }

    #[test]
    fn test_encoded_json_parses_back() {
        let report = make_report();
        let json = InsightEncoder::new().encode_to_json(&report).unwrap();
        let payload: InsightPayload = serde_json::from_str(&json).unwrap();

        assert_eq!(payload.report.as_of, report.as_of);
        assert_eq!(payload.report.sleep_need, report.sleep_need);
    }

    #[test]
    fn test_instances_get_distinct_ids() {
        assert_ne!(InsightEncoder::new().instance_id, InsightEncoder::new().instance_id);
    }
}
