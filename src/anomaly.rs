//! Anomaly detection
//!
//! Two independent triggers flag a metric on a given day: a statistical one
//! (|z| beyond the configured threshold against the rolling baseline) and a
//! domain one (fixed thresholds such as a deep-sleep drop or an HRV floor).
//! Domain thresholds are calibrated for an 8-hour sleeper and scaled by
//! `personal_need / 8` before use.
//!
//! Separately, a consecutive-decline check looks for a run of bad nights.

use crate::baseline::{compute_baseline, Baseline};
use crate::config::{AnomalyConfig, ThresholdLevels};
use crate::error::InsightError;
use crate::sleep_need::PersonalSleepNeed;
use crate::types::{DailyMetricRecord, Metric, MetricSource, NightlyAggregate};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdLevel {
    Mild,
    Moderate,
    Elevated,
    Severe,
}

impl ThresholdLevel {
    pub fn severity(&self) -> Severity {
        match self {
            ThresholdLevel::Mild => Severity::Low,
            ThresholdLevel::Moderate => Severity::Medium,
            ThresholdLevel::Elevated | ThresholdLevel::Severe => Severity::High,
        }
    }
}

/// Domain thresholds for one metric after personal scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityThresholdSet {
    pub metric: Metric,
    pub scale_factor: f64,
    pub levels: ThresholdLevels,
}

impl SeverityThresholdSet {
    pub fn new(metric: Metric, base: &ThresholdLevels, need: &PersonalSleepNeed) -> Self {
        Self::with_scale(metric, base, need.scale_factor())
    }

    pub fn with_scale(metric: Metric, base: &ThresholdLevels, scale_factor: f64) -> Self {
        Self {
            metric,
            scale_factor,
            levels: base.scaled(scale_factor),
        }
    }

    /// Highest level met by a magnitude where larger is worse
    pub fn level_above(&self, magnitude: f64) -> Option<ThresholdLevel> {
        let l = &self.levels;
        if magnitude >= l.severe {
            Some(ThresholdLevel::Severe)
        } else if magnitude >= l.elevated {
            Some(ThresholdLevel::Elevated)
        } else if magnitude >= l.moderate {
            Some(ThresholdLevel::Moderate)
        } else if magnitude >= l.mild {
            Some(ThresholdLevel::Mild)
        } else {
            None
        }
    }

    /// Highest level breached by a value under descending floors
    pub fn level_below(&self, value: f64) -> Option<ThresholdLevel> {
        let l = &self.levels;
        if value < l.severe {
            Some(ThresholdLevel::Severe)
        } else if value < l.elevated {
            Some(ThresholdLevel::Elevated)
        } else if value < l.moderate {
            Some(ThresholdLevel::Moderate)
        } else if value < l.mild {
            Some(ThresholdLevel::Mild)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnomalyTrigger {
    Statistical { z_score: f64 },
    Domain { level: ThresholdLevel, threshold: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub metric: Metric,
    pub date: NaiveDate,
    pub severity: Severity,
    pub current_value: f64,
    pub baseline_value: f64,
    pub absolute_deviation: f64,
    pub percentage_deviation: Option<f64>,
    pub triggers: Vec<AnomalyTrigger>,
    pub candidate_causes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsecutiveDecline {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub nights: usize,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub date: NaiveDate,
    /// Sorted by severity, highest first
    pub events: Vec<AnomalyEvent>,
    pub consecutive_decline: Option<ConsecutiveDecline>,
    pub thresholds: Vec<SeverityThresholdSet>,
}

/// Flags statistical and domain anomalies with personalized thresholds
pub struct AnomalyDetector;

impl AnomalyDetector {
    /// Domain thresholds scaled to `need`
    pub fn thresholds(need: &PersonalSleepNeed, config: &AnomalyConfig) -> Vec<SeverityThresholdSet> {
        vec![
            SeverityThresholdSet::new(Metric::DeepSleepMinutes, &config.deep_sleep_drop, need),
            SeverityThresholdSet::new(Metric::SleepEfficiency, &config.efficiency_drop, need),
            SeverityThresholdSet::new(Metric::TotalSleepHours, &config.duration_deficit_levels, need),
            SeverityThresholdSet::new(Metric::HrvBalance, &config.hrv_balance_floor, need),
        ]
    }

    /// Evaluate the most recent day against the history before it
    ///
    /// # Arguments
    ///
    /// * `records` - Daily records, ascending by date
    /// * `nights` - Nightly aggregates, ascending by date
    /// * `need` - Personal sleep need driving threshold scaling
    /// * `config` - Anomaly settings
    /// * `window_days` - Baseline window
    pub fn detect(
        records: &[DailyMetricRecord],
        nights: &[NightlyAggregate],
        need: &PersonalSleepNeed,
        config: &AnomalyConfig,
        window_days: usize,
    ) -> Result<AnomalyReport, InsightError> {
        let date = records
            .last()
            .map(|r| r.date)
            .max(nights.last().map(|n| n.date))
            .ok_or_else(|| InsightError::insufficient("anomaly detection days", 1, 0))?;

        let thresholds = Self::thresholds(need, config);
        let mut events: BTreeMap<Metric, AnomalyEvent> = BTreeMap::new();

        let split = records.partition_point(|r| r.date < date);
        let (daily_history, today) = (&records[..split], records.get(split));
        if let Some(today) = today {
            for metric in Metric::DAILY.iter() {
                if let Some(value) = today.metric(metric) {
                    let baseline = compute_baseline(daily_history, metric, window_days).ok();
                    Self::check(&mut events, metric, date, value, baseline.as_ref(), &thresholds, config);
                }
            }
        }

        let split = nights.partition_point(|n| n.date < date);
        let (nightly_history, tonight) = (&nights[..split], nights.get(split));
        if let Some(night) = tonight {
            let nightly_metrics = [
                Metric::TotalSleepHours,
                Metric::SleepEfficiency,
                Metric::DeepSleepMinutes,
            ];
            for metric in nightly_metrics.iter() {
                if let Some(value) = night.metric(metric) {
                    let baseline = compute_baseline(nightly_history, metric, window_days).ok();
                    Self::check(&mut events, metric, date, value, baseline.as_ref(), &thresholds, config);
                }
            }
            Self::check_duration_deficit(&mut events, night, need, &thresholds);
        }

        let mut events: Vec<AnomalyEvent> = events.into_values().collect();
        events.sort_by(|a, b| b.severity.cmp(&a.severity));

        let consecutive_decline = Self::consecutive_decline(nights, need, config, window_days);
        debug!(%date, events = events.len(), decline = consecutive_decline.is_some(), "anomaly detection complete");

        Ok(AnomalyReport {
            date,
            events,
            consecutive_decline,
            thresholds,
        })
    }

    /// Statistical trigger alone
    pub fn detect_statistical(
        metric: &Metric,
        date: NaiveDate,
        value: f64,
        baseline: &Baseline,
        config: &AnomalyConfig,
    ) -> Option<AnomalyEvent> {
        let z = baseline.z_score(value)?;
        if z.abs() <= config.z_threshold {
            return None;
        }
        let ratio = z.abs() / config.z_threshold;
        let severity = if ratio >= 2.0 {
            Severity::High
        } else if ratio >= 4.0 / 3.0 {
            Severity::Medium
        } else {
            Severity::Low
        };
        Some(new_event(
            metric,
            date,
            value,
            baseline.mean,
            severity,
            AnomalyTrigger::Statistical { z_score: z },
        ))
    }

    fn check(
        events: &mut BTreeMap<Metric, AnomalyEvent>,
        metric: &Metric,
        date: NaiveDate,
        value: f64,
        baseline: Option<&Baseline>,
        thresholds: &[SeverityThresholdSet],
        config: &AnomalyConfig,
    ) {
        if let Some(event) =
            baseline.and_then(|b| Self::detect_statistical(metric, date, value, b, config))
        {
            merge(events, event);
        }

        let Some(set) = thresholds.iter().find(|t| &t.metric == metric) else {
            return;
        };
        let baseline_value = baseline.map(|b| b.mean);
        let breach = match metric {
            Metric::HrvBalance => set
                .level_below(value)
                .map(|level| (level, threshold_for(&set.levels, level))),
            Metric::DeepSleepMinutes | Metric::SleepEfficiency => baseline_value
                .filter(|mean| *mean > 0.0)
                .and_then(|mean| set.level_above((mean - value) / mean))
                .map(|level| (level, threshold_for(&set.levels, level))),
            _ => None,
        };
        if let Some((level, threshold)) = breach {
            merge(
                events,
                new_event(
                    metric,
                    date,
                    value,
                    baseline_value.unwrap_or(value),
                    level.severity(),
                    AnomalyTrigger::Domain { level, threshold },
                ),
            );
        }
    }

    fn check_duration_deficit(
        events: &mut BTreeMap<Metric, AnomalyEvent>,
        night: &NightlyAggregate,
        need: &PersonalSleepNeed,
        thresholds: &[SeverityThresholdSet],
    ) {
        let Some(set) = thresholds.iter().find(|t| t.metric == Metric::TotalSleepHours) else {
            return;
        };
        let actual = night.total_sleep_hours();
        if let Some(level) = set.level_above(need.hours - actual) {
            merge(
                events,
                new_event(
                    &Metric::TotalSleepHours,
                    night.date,
                    actual,
                    need.hours,
                    level.severity(),
                    AnomalyTrigger::Domain {
                        level,
                        threshold: threshold_for(&set.levels, level),
                    },
                ),
            );
        }
    }

    /// Run of bad nights ending at the newest night, if long enough
    ///
    /// A slump followed by a good night is over and is not reported.
    pub fn consecutive_decline(
        nights: &[NightlyAggregate],
        need: &PersonalSleepNeed,
        config: &AnomalyConfig,
        window_days: usize,
    ) -> Option<ConsecutiveDecline> {
        let split = nights.len().saturating_sub(config.lookback_nights);
        let (prior, recent) = nights.split_at(split);
        let baseline_for = |metric: &Metric| {
            compute_baseline(prior, metric, window_days)
                .or_else(|_| compute_baseline(nights, metric, window_days))
                .ok()
        };
        let score_baseline = baseline_for(&Metric::SleepScore);
        let efficiency_baseline = baseline_for(&Metric::SleepEfficiency);

        // Count back from the newest night; the run ends at the first good night or gap
        let mut len = 0;
        for (i, night) in recent.iter().enumerate().rev() {
            let adjacent = len == 0 || (recent[i + 1].date - night.date).num_days() == 1;
            let bad = Self::is_bad_night(
                night,
                score_baseline.as_ref(),
                efficiency_baseline.as_ref(),
                need,
                config,
            );
            if !(adjacent && bad) {
                break;
            }
            len += 1;
        }

        if len == 0 || len < config.consecutive_nights {
            return None;
        }
        let start = recent.len() - len;
        Some(ConsecutiveDecline {
            start_date: recent[start].date,
            end_date: recent[recent.len() - 1].date,
            nights: len,
            severity: if len >= 5 { Severity::High } else { Severity::Medium },
        })
    }

    /// Bad-night test
    ///
    /// With a score: below `baseline * (1 - score_drop_fraction)`. Without
    /// one: efficiency below its scaled drop AND a scaled duration deficit,
    /// both required.
    pub fn is_bad_night(
        night: &NightlyAggregate,
        score_baseline: Option<&Baseline>,
        efficiency_baseline: Option<&Baseline>,
        need: &PersonalSleepNeed,
        config: &AnomalyConfig,
    ) -> bool {
        let scale = need.scale_factor();
        match night.score() {
            Some(score) => score_baseline
                .is_some_and(|b| score < b.mean * (1.0 - config.score_drop_fraction)),
            None => {
                let low_efficiency = match (night.efficiency, efficiency_baseline) {
                    (Some(e), Some(b)) => e < b.mean * (1.0 - config.efficiency_drop_fraction * scale),
                    _ => false,
                };
                let short = need.hours - night.total_sleep_hours()
                    > config.duration_deficit_hours * scale;
                low_efficiency && short
            }
        }
    }
}

fn threshold_for(levels: &ThresholdLevels, level: ThresholdLevel) -> f64 {
    match level {
        ThresholdLevel::Mild => levels.mild,
        ThresholdLevel::Moderate => levels.moderate,
        ThresholdLevel::Elevated => levels.elevated,
        ThresholdLevel::Severe => levels.severe,
    }
}

fn new_event(
    metric: &Metric,
    date: NaiveDate,
    value: f64,
    baseline_value: f64,
    severity: Severity,
    trigger: AnomalyTrigger,
) -> AnomalyEvent {
    let absolute_deviation = value - baseline_value;
    AnomalyEvent {
        metric: metric.clone(),
        date,
        severity,
        current_value: value,
        baseline_value,
        absolute_deviation,
        percentage_deviation: (baseline_value != 0.0)
            .then(|| absolute_deviation / baseline_value.abs() * 100.0),
        triggers: vec![trigger],
        candidate_causes: candidate_causes(metric)
            .iter()
            .map(|c| c.to_string())
            .collect(),
    }
}

/// Keep one event per metric, carrying every trigger and the worst severity
fn merge(events: &mut BTreeMap<Metric, AnomalyEvent>, event: AnomalyEvent) {
    match events.get_mut(&event.metric) {
        Some(existing) => {
            existing.severity = existing.severity.max(event.severity);
            existing.triggers.extend(event.triggers);
        }
        None => {
            events.insert(event.metric.clone(), event);
        }
    }
}

pub fn candidate_causes(metric: &Metric) -> &'static [&'static str] {
    match metric {
        Metric::SleepScore | Metric::TotalSleepHours | Metric::MainSleepHours => &[
            "late bedtime",
            "irregular schedule",
            "high stress",
            "alcohol or caffeine",
        ],
        Metric::DeepSleepMinutes => &[
            "alcohol consumption",
            "late meal",
            "high stress",
            "room temperature too warm",
            "late exercise",
        ],
        Metric::SleepEfficiency => &[
            "noise or light disturbance",
            "caffeine",
            "high stress",
            "uncomfortable environment",
        ],
        Metric::ReadinessScore => &[
            "insufficient recovery",
            "illness onset",
            "high training load",
        ],
        Metric::HrvBalance => &[
            "overtraining",
            "illness onset",
            "poor sleep",
            "high stress",
            "alcohol",
        ],
        Metric::RestingHeartRateScore => &[
            "illness onset",
            "dehydration",
            "alcohol",
            "late meal",
            "overtraining",
        ],
        Metric::TemperatureDeviation => &[
            "illness onset",
            "menstrual cycle phase",
            "alcohol",
            "room temperature",
            "intense late exercise",
        ],
        Metric::ActivityScore => &["rest day", "illness", "schedule change"],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sleep_need::{Confidence, SleepNeedMethod};
    use crate::types::{SessionKind, SleepSession, SleepStages};
    use chrono::Duration;

    fn need(hours: f64) -> PersonalSleepNeed {
        PersonalSleepNeed {
            hours,
            confidence: Confidence::High,
            method: SleepNeedMethod::UserSpecified,
            sample_count: 0,
        }
    }

    fn day(i: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap() + Duration::days(i)
    }

    fn make_night(i: i64, hours: f64, efficiency: f64, score: Option<f64>) -> NightlyAggregate {
        let start = (day(i) - Duration::days(1)).and_hms_opt(23, 0, 0).unwrap();
        let minutes = hours * 60.0;
        NightlyAggregate {
            date: day(i),
            main_sleep: Some(SleepSession {
                start_time: start,
                end_time: start + Duration::minutes((minutes * 100.0 / efficiency) as i64),
                kind: SessionKind::Main,
                stages: SleepStages {
                    deep_minutes: minutes * 0.2,
                    light_minutes: minutes * 0.8,
                    ..Default::default()
                },
                efficiency,
                score,
                respiratory_rate: None,
            }),
            naps: Vec::new(),
            total_sleep_minutes: minutes,
            time_in_bed_minutes: minutes * 100.0 / efficiency,
            efficiency: Some(efficiency),
        }
    }

    fn steady_nights(n: i64) -> Vec<NightlyAggregate> {
        (0..n)
            .map(|i| make_night(i, 8.0, if i % 2 == 0 { 88.0 } else { 92.0 }, Some(if i % 2 == 0 { 78.0 } else { 82.0 })))
            .collect()
    }

    #[test]
    fn test_thresholds_equal_base_at_eight_hours() {
        let config = AnomalyConfig::default();
        let sets = AnomalyDetector::thresholds(&need(8.0), &config);
        assert_eq!(sets[0].levels, config.deep_sleep_drop);
        assert_eq!(sets[1].levels, config.efficiency_drop);
        assert_eq!(sets[2].levels, config.duration_deficit_levels);
        assert_eq!(sets[3].levels, config.hrv_balance_floor);
        assert!(sets.iter().all(|s| s.scale_factor == 1.0));
    }

    #[test]
    fn test_sleep_score_crash_is_high_severity() {
        let mut records: Vec<DailyMetricRecord> = (0..30)
            .map(|i| {
                let mut r = DailyMetricRecord::new(day(i));
                r.sleep_score = Some(if i % 2 == 0 { 70.0 } else { 80.0 });
                r
            })
            .collect();
        let mut today = DailyMetricRecord::new(day(30));
        today.sleep_score = Some(50.0);
        records.push(today);

        let report =
            AnomalyDetector::detect(&records, &[], &need(8.0), &AnomalyConfig::default(), 30).unwrap();
        let event = &report.events[0];
        assert_eq!(event.metric, Metric::SleepScore);
        assert_eq!(event.severity, Severity::High);
        assert!((event.baseline_value - 75.0).abs() < 1e-9);
        match event.triggers[0] {
            AnomalyTrigger::Statistical { z_score } => assert!((z_score + 5.0).abs() < 0.1),
            ref other => panic!("unexpected trigger {:?}", other),
        }
        assert!(!event.candidate_causes.is_empty());
    }

    #[test]
    fn test_deficit_threshold_scales_with_need() {
        // 1.05 h short: flagged against 8 h need, not against 9 h (scaled mild = 1.125 h)
        let eight = make_night(0, 6.95, 90.0, Some(80.0));
        let nine = make_night(0, 7.95, 90.0, Some(80.0));
        let config = AnomalyConfig::default();

        let short = AnomalyDetector::detect(&[], &[eight], &need(8.0), &config, 30).unwrap();
        let long = AnomalyDetector::detect(&[], &[nine], &need(9.0), &config, 30).unwrap();

        assert!(short.events.iter().any(|e| e.metric == Metric::TotalSleepHours));
        assert!(!long.events.iter().any(|e| e.metric == Metric::TotalSleepHours));
    }

    #[test]
    fn test_hrv_floor_without_baseline() {
        let mut today = DailyMetricRecord::new(day(0));
        today.hrv_balance = Some(38.0);
        let report =
            AnomalyDetector::detect(&[today], &[], &need(8.0), &AnomalyConfig::default(), 30).unwrap();

        let event = &report.events[0];
        assert_eq!(event.metric, Metric::HrvBalance);
        assert_eq!(event.severity, Severity::Medium);
        assert!(matches!(
            event.triggers[0],
            AnomalyTrigger::Domain { level: ThresholdLevel::Moderate, .. }
        ));
    }

    #[test]
    fn test_deep_sleep_drop_flags_domain_anomaly() {
        let mut nights = steady_nights(14);
        let mut last = make_night(14, 8.0, 90.0, Some(80.0));
        if let Some(main) = last.main_sleep.as_mut() {
            main.stages.deep_minutes = 96.0 * 0.55;
        }
        nights.push(last);

        let report =
            AnomalyDetector::detect(&[], &nights, &need(8.0), &AnomalyConfig::default(), 30).unwrap();
        let deep = report
            .events
            .iter()
            .find(|e| e.metric == Metric::DeepSleepMinutes)
            .unwrap();
        assert!(deep
            .triggers
            .iter()
            .any(|t| matches!(t, AnomalyTrigger::Domain { level: ThresholdLevel::Moderate, .. })));
    }

    #[test]
    fn test_unset_score_with_normal_sleep_is_not_bad() {
        let mut nights = steady_nights(14);
        for i in 14..21 {
            nights.push(make_night(i, 8.0, 90.0, Some(0.0)));
        }
        let decline =
            AnomalyDetector::consecutive_decline(&nights, &need(8.0), &AnomalyConfig::default(), 30);
        assert_eq!(decline, None);
    }

    #[test]
    fn test_unset_score_needs_both_criteria() {
        let config = AnomalyConfig::default();
        let mut nights = steady_nights(14);
        // low efficiency but full duration: still not bad
        for i in 14..18 {
            nights.push(make_night(i, 8.0, 70.0, None));
        }
        assert_eq!(
            AnomalyDetector::consecutive_decline(&nights, &need(8.0), &config, 30),
            None
        );

        // low efficiency and 2 h short: bad
        let mut nights = steady_nights(14);
        for i in 14..18 {
            nights.push(make_night(i, 6.0, 70.0, None));
        }
        let decline = AnomalyDetector::consecutive_decline(&nights, &need(8.0), &config, 30).unwrap();
        assert_eq!(decline.nights, 4);
        assert_eq!(decline.severity, Severity::Medium);
    }

    #[test]
    fn test_long_score_decline_is_high() {
        let mut nights = steady_nights(14);
        for i in 14..20 {
            nights.push(make_night(i, 7.5, 90.0, Some(55.0)));
        }
        let decline =
            AnomalyDetector::consecutive_decline(&nights, &need(8.0), &AnomalyConfig::default(), 30)
                .unwrap();
        assert_eq!(decline.nights, 6);
        assert_eq!(decline.start_date, day(14));
        assert_eq!(decline.end_date, day(19));
        assert_eq!(decline.severity, Severity::High);
    }

    #[test]
    fn test_gap_breaks_a_run() {
        let mut nights = steady_nights(14);
        for i in [14, 15, 17, 18] {
            nights.push(make_night(i, 7.5, 90.0, Some(55.0)));
        }
        let decline =
            AnomalyDetector::consecutive_decline(&nights, &need(8.0), &AnomalyConfig::default(), 30);
        assert_eq!(decline, None);
    }

    #[test]
    fn test_recovered_slump_is_not_a_decline() {
        let config = AnomalyConfig::default();
        let mut nights = steady_nights(14);
        for i in 14..17 {
            nights.push(make_night(i, 7.5, 90.0, Some(55.0)));
        }
        for i in 17..21 {
            nights.push(make_night(i, 8.0, 90.0, Some(85.0)));
        }
        assert_eq!(
            AnomalyDetector::consecutive_decline(&nights, &need(7.2), &config, 30),
            None
        );
    }

    #[test]
    fn test_decline_counts_only_the_trailing_run() {
        let config = AnomalyConfig::default();
        let mut nights = steady_nights(14);
        // an earlier, longer slump broken by one good night
        for i in 14..18 {
            nights.push(make_night(i, 7.5, 90.0, Some(55.0)));
        }
        nights.push(make_night(18, 8.0, 90.0, Some(85.0)));
        for i in 19..22 {
            nights.push(make_night(i, 7.5, 90.0, Some(55.0)));
        }
        let decline = AnomalyDetector::consecutive_decline(&nights, &need(8.0), &config, 30).unwrap();
        assert_eq!(decline.nights, 3);
        assert_eq!(decline.start_date, day(19));
        assert_eq!(decline.end_date, day(21));
        assert_eq!(decline.severity, Severity::Medium);
    }

    #[test]
    fn test_no_data_is_insufficient() {
        assert!(AnomalyDetector::detect(&[], &[], &need(8.0), &AnomalyConfig::default(), 30).is_err());
    }
}
