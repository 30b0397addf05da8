//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Insight. It runs every
//! analysis stage over one immutable snapshot of a person's history and
//! collects the results into a single report.

use crate::adapters::{OuraAdapter, RecordAdapter};
use crate::aggregation::SleepAggregator;
use crate::alerts::{AlertInputs, AlertMonitor, HealthAlert};
use crate::anomaly::{AnomalyDetector, AnomalyReport};
use crate::baseline::{compute_baseline, compute_baselines, Baseline};
use crate::bedtime::{BedtimeAdvisor, BedtimeRecommendation};
use crate::chronotype::{ChronotypeAnalyzer, ChronotypeResult};
use crate::config::InsightConfig;
use crate::correlation::{correlate_lagged, Correlation};
use crate::encoder::InsightEncoder;
use crate::error::InsightError;
use crate::illness::{IllnessAssessment, IllnessDetector};
use crate::interpretation::{InterpretationEngine, MetricInterpretation, RecoveryReport};
use crate::prediction::{Forecast, PredictionEngine};
use crate::sleep_debt::{SleepDebtState, SleepDebtTracker};
use crate::sleep_need::{PersonalSleepNeed, SleepNeedEstimator};
use crate::tags::{TagEffectAnalyzer, TagEffectReport};
use crate::types::{
    series, Availability, DailyMetricRecord, DailyTag, DatedValue, Metric, NightlyAggregate,
    SleepSession,
};
use crate::weekly::{WeeklyReview, WeeklyReviewer};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Metric pairs correlated in every report, with the lag applied to the second
const CORRELATION_PAIRS: [(Metric, Metric, i64); 4] = [
    (Metric::TotalSleepHours, Metric::ReadinessScore, 0),
    (Metric::SleepEfficiency, Metric::ReadinessScore, 0),
    (Metric::HrvBalance, Metric::ReadinessScore, 0),
    (Metric::ActivityScore, Metric::SleepScore, 1),
];

/// Metrics forecast in every report
const FORECAST_METRICS: [Metric; 3] = [
    Metric::SleepScore,
    Metric::ReadinessScore,
    Metric::HrvBalance,
];

/// Everything known about one person, sorted and one record per date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub records: Vec<DailyMetricRecord>,
    pub sessions: Vec<SleepSession>,
    #[serde(default)]
    pub vo2_max: Availability<Vec<DatedValue>>,
    #[serde(default)]
    pub tags: Vec<DailyTag>,
}

impl HealthSnapshot {
    /// Sort records and sessions ascending, keeping the last record seen per date
    pub fn new(
        mut records: Vec<DailyMetricRecord>,
        mut sessions: Vec<SleepSession>,
        vo2_max: Availability<Vec<DatedValue>>,
    ) -> Self {
        records.sort_by_key(|r| r.date);
        let mut deduped: Vec<DailyMetricRecord> = Vec::with_capacity(records.len());
        for record in records {
            match deduped.last_mut() {
                Some(last) if last.date == record.date => {
                    debug!(date = %record.date, "replaced duplicate daily record");
                    *last = record;
                }
                _ => deduped.push(record),
            }
        }
        sessions.sort_by_key(|s| s.start_time);

        Self {
            records: deduped,
            sessions,
            vo2_max,
            tags: Vec::new(),
        }
    }

    /// Attach user tags, normalized and sorted by date
    pub fn with_tags(mut self, tags: Vec<DailyTag>) -> Self {
        self.tags = tags
            .into_iter()
            .map(|t| DailyTag::new(t.date, &t.tag))
            .filter(|t| !t.tag.is_empty())
            .collect();
        self.tags.sort_by(|a, b| (a.date, &a.tag).cmp(&(b.date, &b.tag)));
        self
    }

    /// Parse a snapshot serialized as JSON, restoring its ordering guarantees
    pub fn from_json(raw_json: &str) -> Result<Self, InsightError> {
        let snapshot: HealthSnapshot = serde_json::from_str(raw_json)?;
        Ok(Self::new(snapshot.records, snapshot.sessions, snapshot.vo2_max)
            .with_tags(snapshot.tags))
    }

    /// Latest date carrying either a daily record or a session end
    pub fn latest_date(&self) -> Option<NaiveDate> {
        let record = self.records.last().map(|r| r.date);
        let session = self.sessions.iter().map(|s| s.end_time.date()).max();
        record.max(session)
    }
}

/// Result of one analysis stage as it appears in a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome<T> {
    Computed { value: T },
    Unavailable { kind: String, reason: String },
}

impl<T> AnalysisOutcome<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            AnalysisOutcome::Computed { value } => Some(value),
            AnalysisOutcome::Unavailable { .. } => None,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, AnalysisOutcome::Computed { .. })
    }
}

impl<T> From<Result<T, InsightError>> for AnalysisOutcome<T> {
    fn from(result: Result<T, InsightError>) -> Self {
        match result {
            Ok(value) => AnalysisOutcome::Computed { value },
            Err(e) => AnalysisOutcome::Unavailable {
                kind: e.code().to_string(),
                reason: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationEntry {
    pub first: Metric,
    pub second: Metric,
    pub lag_days: i64,
    pub result: AnalysisOutcome<Correlation>,
}

/// Combined output of every analysis stage for one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightReport {
    pub as_of: NaiveDate,
    pub days_analyzed: usize,
    pub nights_analyzed: usize,
    pub baselines: BTreeMap<String, AnalysisOutcome<Baseline>>,
    pub interpretations: AnalysisOutcome<Vec<MetricInterpretation>>,
    pub recovery: AnalysisOutcome<RecoveryReport>,
    pub chronotype: AnalysisOutcome<ChronotypeResult>,
    pub sleep_need: PersonalSleepNeed,
    pub sleep_debt: AnalysisOutcome<SleepDebtState>,
    pub bedtime: AnalysisOutcome<BedtimeRecommendation>,
    pub anomalies: AnalysisOutcome<AnomalyReport>,
    pub illness: AnalysisOutcome<IllnessAssessment>,
    /// Active alerts on the analysis date, critical first
    pub alerts: Vec<HealthAlert>,
    pub correlations: Vec<CorrelationEntry>,
    pub forecasts: BTreeMap<String, AnalysisOutcome<Forecast>>,
    pub fitness: AnalysisOutcome<Baseline>,
    pub tag_effects: AnalysisOutcome<TagEffectReport>,
    pub weekly: AnalysisOutcome<WeeklyReview>,
}

/// Runs all analysis stages with one validated configuration.
///
/// The engine holds no state between calls, so one instance can serve any
/// number of snapshots.
#[derive(Debug, Clone, Default)]
pub struct InsightEngine {
    config: InsightConfig,
}

impl InsightEngine {
    /// Create an engine, rejecting invalid configuration up front
    pub fn new(config: InsightConfig) -> Result<Self, InsightError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &InsightConfig {
        &self.config
    }

    /// Analyze `snapshot` as of a date.
    ///
    /// # Arguments
    /// * `snapshot` - Sorted history for one person
    /// * `as_of` - Last date to consider; defaults to the latest date present
    ///
    /// # Returns
    /// A report in which each stage is either computed or explains why not.
    /// Only an empty history is an error.
    ///
    /// # Example
    /// ```ignore
    /// let engine = InsightEngine::default();
    /// let report = engine.analyze(&snapshot, None)?;
    /// println!("need: {:.1} h", report.sleep_need.hours);
    /// ```
    pub fn analyze(
        &self,
        snapshot: &HealthSnapshot,
        as_of: Option<NaiveDate>,
    ) -> Result<InsightReport, InsightError> {
        let config = &self.config;
        let window = config.baseline.window_days;

        let as_of = as_of
            .or_else(|| snapshot.latest_date())
            .ok_or_else(|| InsightError::insufficient("analysis days", 1, 0))?;

        let records: Vec<DailyMetricRecord> = snapshot
            .records
            .iter()
            .filter(|r| r.date <= as_of)
            .cloned()
            .collect();
        let nights: Vec<NightlyAggregate> =
            SleepAggregator::aggregate(&snapshot.sessions, &config.aggregation)
                .into_iter()
                .filter(|n| n.date <= as_of)
                .collect();
        if records.is_empty() && nights.is_empty() {
            return Err(InsightError::insufficient("analysis days", 1, 0));
        }
        debug!(%as_of, days = records.len(), nights = nights.len(), "prepared snapshot");

        let mut baselines: BTreeMap<String, AnalysisOutcome<Baseline>> = BTreeMap::new();
        for (metric, result) in compute_baselines(&records, &Metric::DAILY, window) {
            baselines.insert(metric.name(), result.into());
        }
        for (metric, result) in compute_baselines(&nights, &Metric::NIGHTLY, window) {
            baselines.insert(metric.name(), result.into());
        }

        // The latest day is read against the history before it
        let latest = records.last();
        let history = &records[..records.len().saturating_sub(1)];
        let prior_baselines: BTreeMap<Metric, Baseline> =
            compute_baselines(history, &Metric::DAILY, window)
                .into_iter()
                .filter_map(|(metric, result)| result.ok().map(|b| (metric, b)))
                .collect();

        let interpretations: AnalysisOutcome<Vec<MetricInterpretation>> = latest
            .ok_or_else(|| InsightError::MissingField("daily records".to_string()))
            .map(|r| {
                InterpretationEngine::interpret_day(r, &prior_baselines, &config.interpretation)
            })
            .into();
        let recovery: AnalysisOutcome<RecoveryReport> = latest
            .ok_or_else(|| InsightError::MissingField("daily records".to_string()))
            .and_then(|r| {
                InterpretationEngine::recovery_score(
                    r,
                    prior_baselines.get(&Metric::RestingHeartRateScore),
                    &config.interpretation,
                )
            })
            .into();

        let chronotype = ChronotypeAnalyzer::analyze(&nights, &config.chronotype);
        let category = chronotype.as_ref().ok().map(|c| c.category);
        let sleep_need = SleepNeedEstimator::estimate(&records, &nights, category, &config.sleep_need);

        let sleep_debt = SleepDebtTracker::track(&nights, &sleep_need, &config.debt);
        let anomalies =
            AnomalyDetector::detect(&records, &nights, &sleep_need, &config.anomaly, window);
        let illness = IllnessDetector::assess(&records, &nights, &config.illness, window);
        let bedtime = BedtimeAdvisor::recommend(&nights, &sleep_need, &config.bedtime);
        let alerts = AlertMonitor::check(
            &AlertInputs {
                records: &records,
                nights: &nights,
                need: &sleep_need,
                debt: sleep_debt.as_ref().ok(),
                decline: anomalies
                    .as_ref()
                    .ok()
                    .and_then(|a| a.consecutive_decline.as_ref()),
            },
            &config.alerts,
        );

        let correlations: Vec<CorrelationEntry> = CORRELATION_PAIRS
            .iter()
            .map(|(first, second, lag)| CorrelationEntry {
                first: first.clone(),
                second: second.clone(),
                lag_days: *lag,
                result: correlate_lagged(
                    &metric_series(first, &records, &nights),
                    &metric_series(second, &records, &nights),
                    *lag,
                    &config.correlation,
                )
                .into(),
            })
            .collect();

        let forecasts: BTreeMap<String, AnalysisOutcome<Forecast>> = FORECAST_METRICS
            .iter()
            .map(|metric| {
                let outcome = PredictionEngine::forecast(
                    metric,
                    &metric_series(metric, &records, &nights),
                    &config.prediction,
                    window,
                );
                (metric.name(), outcome.into())
            })
            .collect();

        let fitness: AnalysisOutcome<Baseline> = snapshot
            .vo2_max
            .clone()
            .into_result("vo2_max")
            .and_then(|values| {
                let values: Vec<DatedValue> =
                    values.into_iter().filter(|v| v.date <= as_of).collect();
                compute_baseline(&values, &Metric::Vo2Max, window)
            })
            .into();

        let tags: Vec<DailyTag> = snapshot
            .tags
            .iter()
            .filter(|t| t.date <= as_of)
            .cloned()
            .collect();
        let tag_effects = TagEffectAnalyzer::analyze(&tags, &nights, &config.tags);
        let weekly = WeeklyReviewer::review(&records, &nights, as_of, &config.weekly);

        let report = InsightReport {
            as_of,
            days_analyzed: records.len(),
            nights_analyzed: nights.len(),
            baselines,
            interpretations,
            recovery,
            chronotype: chronotype.into(),
            sleep_need,
            sleep_debt: sleep_debt.into(),
            bedtime: bedtime.into(),
            anomalies: anomalies.into(),
            illness: illness.into(),
            alerts,
            correlations,
            forecasts,
            fitness,
            tag_effects: tag_effects.into(),
            weekly: weekly.into(),
        };

        info!(
            %as_of,
            days = report.days_analyzed,
            nights = report.nights_analyzed,
            need_hours = report.sleep_need.hours,
            alerts = report.alerts.len(),
            "analysis complete"
        );
        Ok(report)
    }
}

fn metric_series(
    metric: &Metric,
    records: &[DailyMetricRecord],
    nights: &[NightlyAggregate],
) -> Vec<DatedValue> {
    if metric.is_nightly() {
        series(nights, metric)
    } else {
        series(records, metric)
    }
}

/// Convert a raw Oura export to an encoded insight report.
///
/// # Arguments
/// * `raw_json` - Oura v2 export with `daily_sleep`, `daily_readiness`,
///   `daily_activity`, `sleep` and optional `vo2_max` collections
/// * `config` - Analysis configuration
///
/// # Returns
/// The report wrapped in an insight payload, as pretty-printed JSON
///
/// # Example
/// ```ignore
/// let json = oura_to_insight_report(oura_json, &InsightConfig::default())?;
/// ```
pub fn oura_to_insight_report(
    raw_json: String,
    config: &InsightConfig,
) -> Result<String, InsightError> {
    let snapshot = OuraAdapter.parse(&raw_json)?;
    let engine = InsightEngine::new(config.clone())?;
    let report = engine.analyze(&snapshot, None)?;
    InsightEncoder::new().encode_to_json_pretty(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sleep_need::SleepNeedMethod;
    use crate::types::{SessionKind, SleepStages};
    use chrono::{Duration, NaiveDateTime};
    use pretty_assertions::assert_eq;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn make_record(date: NaiveDate, i: usize) -> DailyMetricRecord {
        let wobble = (i % 5) as f64;
        DailyMetricRecord {
            sleep_score: Some(72.0 + wobble),
            readiness_score: Some(70.0 + 2.0 * wobble),
            activity_score: Some(65.0 + ((i * 3) % 7) as f64),
            hrv_balance: Some(60.0 + wobble),
            resting_heart_rate_score: Some(80.0 - wobble),
            temperature_deviation: Some(0.1 * (wobble - 2.0)),
            ..DailyMetricRecord::new(date)
        }
    }

    fn make_session(wake: NaiveDate, i: usize) -> SleepSession {
        let start_time: NaiveDateTime = (wake - Duration::days(1)).and_hms_opt(23, 0, 0).unwrap()
            - Duration::minutes(20 * (i % 3) as i64);
        let end_time = wake.and_hms_opt(7, 0, 0).unwrap();
        let in_bed = (end_time - start_time).num_minutes() as f64;
        let stages = SleepStages {
            deep_minutes: 90.0,
            rem_minutes: 100.0,
            light_minutes: in_bed - 90.0 - 100.0 - 30.0,
            awake_minutes: 30.0,
        };
        SleepSession {
            start_time,
            end_time,
            kind: SessionKind::Main,
            efficiency: stages.asleep_minutes() / in_bed * 100.0,
            stages,
            score: Some(75.0),
            respiratory_rate: Some(14.0),
        }
    }

    fn make_snapshot(days: usize) -> HealthSnapshot {
        let records = (0..days)
            .map(|i| make_record(start() + Duration::days(i as i64), i))
            .collect();
        let sessions = (0..days)
            .map(|i| make_session(start() + Duration::days(i as i64), i))
            .collect();
        HealthSnapshot::new(records, sessions, Availability::default())
    }

    #[test]
    fn test_snapshot_keeps_last_record_per_date() {
        let day = start();
        let mut early = DailyMetricRecord::new(day);
        early.sleep_score = Some(60.0);
        let mut late = DailyMetricRecord::new(day);
        late.sleep_score = Some(80.0);
        let other = DailyMetricRecord::new(day + Duration::days(1));

        let snapshot =
            HealthSnapshot::new(vec![other, early, late], Vec::new(), Availability::default());

        assert_eq!(snapshot.records.len(), 2);
        assert_eq!(snapshot.records[0].sleep_score, Some(80.0));
        assert_eq!(snapshot.records[1].date, day + Duration::days(1));
    }

    #[test]
    fn test_analyze_full_history() {
        let snapshot = make_snapshot(40);
        let report = InsightEngine::default().analyze(&snapshot, None).unwrap();

        assert_eq!(report.as_of, start() + Duration::days(39));
        assert_eq!(report.days_analyzed, 40);
        assert_eq!(report.nights_analyzed, 40);
        assert!(report.baselines["sleep_score"].is_computed());
        assert!(report.baselines["total_sleep_hours"].is_computed());
        assert!(report.recovery.is_computed());
        assert!(report.chronotype.is_computed());
        assert!(report.sleep_debt.is_computed());
        assert_eq!(report.forecasts.len(), 3);
        assert!(report.forecasts["sleep_score"].is_computed());
        assert_ne!(report.sleep_need.method, SleepNeedMethod::ChronotypeDefault);
        assert_eq!(report.correlations.len(), 4);
        assert!(report.bedtime.is_computed());
        assert!(report.weekly.is_computed());
        assert!(matches!(
            report.tag_effects,
            AnalysisOutcome::Unavailable { ref kind, .. } if kind == "insufficient_data"
        ));
    }

    #[test]
    fn test_tags_after_as_of_are_ignored() {
        let tags = [5, 12, 19, 33, 35, 37]
            .iter()
            .map(|i| DailyTag::new(start() + Duration::days(*i), "caffeine"))
            .collect();
        let snapshot = make_snapshot(40).with_tags(tags);

        let full = InsightEngine::default().analyze(&snapshot, None).unwrap();
        match &full.tag_effects {
            AnalysisOutcome::Computed { value } => assert_eq!(value.tags[0].occurrences, 6),
            other => panic!("expected tag effects, got {:?}", other),
        }

        let early = InsightEngine::default()
            .analyze(&snapshot, Some(start() + Duration::days(25)))
            .unwrap();
        match &early.tag_effects {
            AnalysisOutcome::Computed { value } => {
                assert_eq!(value.tags[0].nights.len(), 3);
                assert_eq!(value.nights_analyzed, 26);
            }
            other => panic!("expected tag effects, got {:?}", other),
        }
    }

    #[test]
    fn test_as_of_limits_history() {
        let snapshot = make_snapshot(40);
        let as_of = start() + Duration::days(9);
        let report = InsightEngine::default()
            .analyze(&snapshot, Some(as_of))
            .unwrap();

        assert_eq!(report.as_of, as_of);
        assert_eq!(report.days_analyzed, 10);
        assert_eq!(report.nights_analyzed, 10);
        match &report.baselines["sleep_score"] {
            AnalysisOutcome::Computed { value } => assert_eq!(value.sample_count, 10),
            other => panic!("expected baseline, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_vo2_max_is_reported_not_raised() {
        let report = InsightEngine::default()
            .analyze(&make_snapshot(10), None)
            .unwrap();

        match report.fitness {
            AnalysisOutcome::Unavailable { kind, .. } => assert_eq!(kind, "missing_field"),
            other => panic!("expected unavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_short_history_degrades_per_stage() {
        let report = InsightEngine::default()
            .analyze(&make_snapshot(3), None)
            .unwrap();

        assert!(matches!(
            report.chronotype,
            AnalysisOutcome::Unavailable { ref kind, .. } if kind == "insufficient_data"
        ));
        assert!(matches!(
            report.forecasts["sleep_score"],
            AnalysisOutcome::Unavailable { .. }
        ));
        assert!(report.sleep_need.hours > 0.0);
    }

    #[test]
    fn test_empty_snapshot_is_insufficient() {
        let snapshot = HealthSnapshot::new(Vec::new(), Vec::new(), Availability::default());
        let result = InsightEngine::default().analyze(&snapshot, None);
        assert!(matches!(result, Err(InsightError::InsufficientData { .. })));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = InsightConfig::default();
        config.baseline.window_days = 0;
        assert!(matches!(
            InsightEngine::new(config),
            Err(InsightError::ConfigError(_))
        ));
    }

    #[test]
    fn test_snapshot_json_is_resorted() {
        let snapshot = make_snapshot(3);
        let mut reversed = snapshot.clone();
        reversed.records.reverse();
        reversed.sessions.reverse();
        let json = serde_json::to_string(&reversed).unwrap();

        assert_eq!(HealthSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_oura_to_insight_report() {
        let raw = r#"{
            "daily_sleep": [
                {"day": "2024-03-01", "score": 70},
                {"day": "2024-03-02", "score": 80}
            ],
            "daily_readiness": [
                {"day": "2024-03-02", "score": 75, "contributors": {"hrv_balance": 70}}
            ]
        }"#;
        let json = oura_to_insight_report(raw.to_string(), &InsightConfig::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["producer"]["name"], "synheart-insight");
        assert_eq!(value["report"]["as_of"], "2024-03-02");
        assert_eq!(value["report"]["recovery"]["status"], "computed");
    }
}
