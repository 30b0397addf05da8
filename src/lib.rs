//! Synheart Insight - personal health analytics over wearable history
//!
//! Insight turns daily summary scores and raw sleep sessions into
//! personalized analysis through a deterministic pipeline: payload adaptation
//! → nightly aggregation → baselines → per-stage analyses → report encoding.
//!
//! ## Stages
//!
//! - **Sleep**: nightly aggregation with main-sleep detection, chronotype,
//!   personal sleep need, sleep debt and bedtime advice
//! - **Baselines**: rolling statistics, deviation labels and correlations
//! - **Warnings**: anomaly detection with need-scaled thresholds and a
//!   multi-signal illness score, plus threshold alerts
//! - **Outlook**: short-horizon ensemble forecasts, tag effects and a
//!   weekly review

pub mod adapters;
pub mod aggregation;
pub mod alerts;
pub mod anomaly;
pub mod baseline;
pub mod bedtime;
pub mod chronotype;
pub mod config;
pub mod correlation;
pub mod encoder;
pub mod error;
pub mod illness;
pub mod interpretation;
pub mod pipeline;
pub mod prediction;
pub mod sleep_debt;
pub mod sleep_need;
pub mod tags;
pub mod types;
pub mod weekly;

pub use adapters::{OuraAdapter, RecordAdapter};
pub use config::InsightConfig;
pub use encoder::InsightEncoder;
pub use error::InsightError;
pub use pipeline::{oura_to_insight_report, AnalysisOutcome, HealthSnapshot, InsightEngine, InsightReport};
pub use types::{DailyMetricRecord, Metric, NightlyAggregate, SleepSession};

/// Insight version embedded in all payloads
pub const INSIGHT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for insight payloads
pub const PRODUCER_NAME: &str = "synheart-insight";
