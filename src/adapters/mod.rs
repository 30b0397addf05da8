//! Wearable payload adapters
//!
//! Adapters parse a raw cloud export once, at the boundary, into the typed
//! records every analysis works on.

mod oura;

pub use oura::OuraAdapter;

use crate::error::InsightError;
use crate::pipeline::HealthSnapshot;

/// Trait for wearable payload adapters
pub trait RecordAdapter {
    /// Parse raw JSON into a sorted, de-duplicated snapshot
    fn parse(&self, raw_json: &str) -> Result<HealthSnapshot, InsightError>;
}
