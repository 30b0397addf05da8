//! Health alerts
//!
//! Rule-based warnings over the most recent days: low scores, short or
//! irregular sleep, accumulated debt, a falling resting heart rate score,
//! training load against readiness, inactivity and declining trends. Sleep
//! duration and debt levels scale with personal sleep need.

use crate::anomaly::ConsecutiveDecline;
use crate::baseline::{mean, sample_std_dev};
use crate::bedtime::after_noon;
use crate::config::{AlertConfig, AlertLevels};
use crate::prediction::linear_fit;
use crate::sleep_debt::SleepDebtState;
use crate::sleep_need::PersonalSleepNeed;
use crate::types::{series, ClockTime, DailyMetricRecord, DatedValue, Metric, NightlyAggregate};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use tracing::debug;

/// Resting heart rate history needed before the earlier days form a reference
const MIN_RHR_HISTORY: usize = 7;
const MIN_BEDTIME_NIGHTS: usize = 5;
const MIN_HRV_DAYS: usize = 3;

/// Readiness and hard-day counts over the trend window that signal overtraining
const OVERTRAINING_CRITICAL: (f64, usize) = (70.0, 5);
const OVERTRAINING_WARNING: (f64, usize) = (75.0, 4);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    SleepQuality,
    SleepDuration,
    SleepDebt,
    Consistency,
    Recovery,
    Hrv,
    RestingHeartRate,
    Overtraining,
    Activity,
    Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAlert {
    pub category: AlertCategory,
    pub severity: AlertSeverity,
    /// Text key the presentation layer maps to a message and advice
    pub key: String,
    pub value: f64,
    pub threshold: f64,
}

impl HealthAlert {
    fn new(
        category: AlertCategory,
        severity: AlertSeverity,
        key: &str,
        value: f64,
        threshold: f64,
    ) -> Self {
        Self {
            category,
            severity,
            key: key.to_string(),
            value,
            threshold,
        }
    }
}

/// Everything the alert rules look at for one date
pub struct AlertInputs<'a> {
    pub records: &'a [DailyMetricRecord],
    pub nights: &'a [NightlyAggregate],
    pub need: &'a PersonalSleepNeed,
    pub debt: Option<&'a SleepDebtState>,
    pub decline: Option<&'a ConsecutiveDecline>,
}

/// Evaluates alert rules against recent history
pub struct AlertMonitor;

impl AlertMonitor {
    /// All active alerts, critical first
    pub fn check(inputs: &AlertInputs, config: &AlertConfig) -> Vec<HealthAlert> {
        let mut alerts: Vec<HealthAlert> = [
            Self::score_alert(
                inputs.records,
                &Metric::SleepScore,
                AlertCategory::SleepQuality,
                config.sleep_score,
                config,
            ),
            Self::score_alert(
                inputs.records,
                &Metric::ReadinessScore,
                AlertCategory::Recovery,
                config.readiness_score,
                config,
            ),
            Self::sleep_duration(inputs.nights, inputs.need, config),
            Self::sleep_debt(inputs.debt, inputs.need, config),
            Self::bedtime_consistency(inputs.nights, config),
            Self::bad_night_run(inputs.decline, config),
            Self::hrv(inputs.records, config),
            Self::resting_heart_rate(inputs.records, config),
            Self::overtraining(inputs.records, config),
            Self::inactivity(inputs.records, config),
        ]
        .into_iter()
        .flatten()
        .collect();

        alerts.extend(Self::declining_trend(inputs.records, &Metric::SleepScore, config));
        alerts.extend(Self::declining_trend(inputs.records, &Metric::ReadinessScore, config));

        alerts.sort_by_key(|a| Reverse(a.severity));
        debug!(count = alerts.len(), "evaluated alerts");
        alerts
    }

    /// Latest value under the critical level, or the recent mean under warning
    fn score_alert(
        records: &[DailyMetricRecord],
        metric: &Metric,
        category: AlertCategory,
        levels: AlertLevels,
        config: &AlertConfig,
    ) -> Option<HealthAlert> {
        let values = recent_values(&series(records, metric), config.recent_days);
        below_levels(&values, levels).map(|(severity, value, threshold)| {
            let key = format!("{}_{}", metric, severity_suffix(severity));
            HealthAlert::new(category, severity, &key, value, threshold)
        })
    }

    fn sleep_duration(
        nights: &[NightlyAggregate],
        need: &PersonalSleepNeed,
        config: &AlertConfig,
    ) -> Option<HealthAlert> {
        let hours = recent_values(&series(nights, &Metric::TotalSleepHours), config.recent_days);
        let levels = config.sleep_hours.scaled(need.scale_factor());
        below_levels(&hours, levels).map(|(severity, value, threshold)| {
            let key = match severity {
                AlertSeverity::Critical => "sleep_deprivation",
                AlertSeverity::Warning => "insufficient_sleep",
            };
            HealthAlert::new(AlertCategory::SleepDuration, severity, key, value, threshold)
        })
    }

    fn sleep_debt(
        debt: Option<&SleepDebtState>,
        need: &PersonalSleepNeed,
        config: &AlertConfig,
    ) -> Option<HealthAlert> {
        let debt = debt?.accumulated_hours;
        let levels = config.sleep_debt_hours.scaled(need.scale_factor());
        let (severity, threshold) = if debt >= levels.critical {
            (AlertSeverity::Critical, levels.critical)
        } else if debt >= levels.warning {
            (AlertSeverity::Warning, levels.warning)
        } else {
            return None;
        };
        Some(HealthAlert::new(
            AlertCategory::SleepDebt,
            severity,
            "sleep_debt",
            debt,
            threshold,
        ))
    }

    /// Bedtime spread over the last week of main sleeps
    fn bedtime_consistency(
        nights: &[NightlyAggregate],
        config: &AlertConfig,
    ) -> Option<HealthAlert> {
        let bedtimes: Vec<f64> = nights
            .iter()
            .rev()
            .take(config.trend_days)
            .filter_map(|n| n.main_sleep.as_ref())
            .map(|s| after_noon(ClockTime::of(&s.start_time)))
            .collect();
        if bedtimes.len() < MIN_BEDTIME_NIGHTS {
            return None;
        }
        let spread_hours = sample_std_dev(&bedtimes, mean(&bedtimes)) / 60.0;
        (spread_hours > config.bedtime_spread_hours).then(|| {
            HealthAlert::new(
                AlertCategory::Consistency,
                AlertSeverity::Warning,
                "irregular_bedtime",
                spread_hours,
                config.bedtime_spread_hours,
            )
        })
    }

    fn bad_night_run(
        decline: Option<&ConsecutiveDecline>,
        config: &AlertConfig,
    ) -> Option<HealthAlert> {
        let decline = decline?;
        let (severity, key) = if decline.nights >= config.critical_bad_nights {
            (AlertSeverity::Critical, "extended_poor_sleep")
        } else {
            (AlertSeverity::Warning, "consecutive_poor_sleep")
        };
        Some(HealthAlert::new(
            AlertCategory::SleepQuality,
            severity,
            key,
            decline.nights as f64,
            config.critical_bad_nights as f64,
        ))
    }

    fn hrv(records: &[DailyMetricRecord], config: &AlertConfig) -> Option<HealthAlert> {
        let values = recent_values(&series(records, &Metric::HrvBalance), config.trend_days);
        if values.len() < MIN_HRV_DAYS {
            return None;
        }
        below_levels(&values, config.hrv_balance).map(|(severity, value, threshold)| {
            let key = match severity {
                AlertSeverity::Critical => "hrv_drop",
                AlertSeverity::Warning => "hrv_low",
            };
            HealthAlert::new(AlertCategory::Hrv, severity, key, value, threshold)
        })
    }

    /// A lower resting heart rate score means a higher heart rate, so the
    /// alert fires when the recent score falls below the earlier days
    fn resting_heart_rate(
        records: &[DailyMetricRecord],
        config: &AlertConfig,
    ) -> Option<HealthAlert> {
        let values: Vec<f64> = series(records, &Metric::RestingHeartRateScore)
            .iter()
            .map(|p| p.value)
            .collect();
        if values.len() < MIN_RHR_HISTORY.max(config.recent_days + 2) {
            return None;
        }
        let split = values.len() - config.recent_days;
        let earlier = mean(&values[..split]);
        let recent = mean(&values[split..]);
        let drop = earlier - recent;

        let levels = config.resting_heart_rate_drop;
        let (severity, level) = if drop >= levels.critical {
            (AlertSeverity::Critical, levels.critical)
        } else if drop >= levels.warning {
            (AlertSeverity::Warning, levels.warning)
        } else {
            return None;
        };
        Some(HealthAlert::new(
            AlertCategory::RestingHeartRate,
            severity,
            "resting_heart_rate_elevated",
            recent,
            earlier - level,
        ))
    }

    /// Low readiness while most recent days were hard training days
    fn overtraining(records: &[DailyMetricRecord], config: &AlertConfig) -> Option<HealthAlert> {
        let window = &records[records.len().saturating_sub(config.trend_days)..];
        let readiness: Vec<f64> = window.iter().filter_map(|r| r.readiness_score).collect();
        if readiness.len() < config.trend_days.min(5) {
            return None;
        }
        let hard_days = window
            .iter()
            .filter(|r| {
                r.activity_score
                    .is_some_and(|s| s >= config.high_load_activity_score)
            })
            .count();
        let avg = mean(&readiness);

        let (severity, threshold) =
            if avg < OVERTRAINING_CRITICAL.0 && hard_days >= OVERTRAINING_CRITICAL.1 {
                (AlertSeverity::Critical, OVERTRAINING_CRITICAL.0)
            } else if avg < OVERTRAINING_WARNING.0 && hard_days >= OVERTRAINING_WARNING.1 {
                (AlertSeverity::Warning, OVERTRAINING_WARNING.0)
            } else {
                return None;
            };
        Some(HealthAlert::new(
            AlertCategory::Overtraining,
            severity,
            "overtraining_risk",
            avg,
            threshold,
        ))
    }

    /// Trailing run of low-activity days
    fn inactivity(records: &[DailyMetricRecord], config: &AlertConfig) -> Option<HealthAlert> {
        let streak = records
            .iter()
            .rev()
            .take(config.trend_days)
            .take_while(|r| {
                r.activity_score
                    .is_some_and(|s| s < config.inactive_activity_score)
            })
            .count();
        (streak >= config.inactive_streak_days).then(|| {
            HealthAlert::new(
                AlertCategory::Activity,
                AlertSeverity::Warning,
                "prolonged_inactivity",
                streak as f64,
                config.inactive_streak_days as f64,
            )
        })
    }

    fn declining_trend(
        records: &[DailyMetricRecord],
        metric: &Metric,
        config: &AlertConfig,
    ) -> Option<HealthAlert> {
        let points = series(records, metric);
        let recent = &points[points.len().saturating_sub(config.trend_days)..];
        if recent.len() < config.trend_days.saturating_sub(2).max(3) {
            return None;
        }
        let slope = trend_slope(recent);
        (slope < -config.trend_slope_per_day).then(|| {
            HealthAlert::new(
                AlertCategory::Trend,
                AlertSeverity::Warning,
                &format!("{}_declining", metric),
                slope,
                -config.trend_slope_per_day,
            )
        })
    }
}

fn recent_values(points: &[DatedValue], n: usize) -> Vec<f64> {
    points[points.len().saturating_sub(n)..]
        .iter()
        .map(|p| p.value)
        .collect()
}

/// Critical when the latest value is under the critical level, warning when
/// the mean is under the warning level
fn below_levels(values: &[f64], levels: AlertLevels) -> Option<(AlertSeverity, f64, f64)> {
    let latest = *values.last()?;
    if latest < levels.critical {
        return Some((AlertSeverity::Critical, latest, levels.critical));
    }
    let avg = mean(values);
    (avg < levels.warning).then_some((AlertSeverity::Warning, avg, levels.warning))
}

fn severity_suffix(severity: AlertSeverity) -> &'static str {
    match severity {
        AlertSeverity::Critical => "critical",
        AlertSeverity::Warning => "low",
    }
}

/// Units per day over the points' own dates
fn trend_slope(points: &[DatedValue]) -> f64 {
    let origin = points[0].date;
    let xy: Vec<(f64, f64)> = points
        .iter()
        .map(|p| ((p.date - origin).num_days() as f64, p.value))
        .collect();
    linear_fit(&xy).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::Severity;
    use crate::sleep_debt::{DebtSeverity, RecoveryEstimate};
    use crate::sleep_need::{Confidence, SleepNeedMethod};
    use crate::types::{SessionKind, SleepSession, SleepStages};
    use chrono::{Duration, NaiveDate};
    use pretty_assertions::assert_eq;

    fn need(hours: f64) -> PersonalSleepNeed {
        PersonalSleepNeed {
            hours,
            confidence: Confidence::High,
            method: SleepNeedMethod::UserSpecified,
            sample_count: 0,
        }
    }

    fn day(i: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 1).unwrap() + Duration::days(i)
    }

    /// Healthy days: nothing here should raise an alert
    fn make_records(n: i64) -> Vec<DailyMetricRecord> {
        (0..n)
            .map(|i| DailyMetricRecord {
                sleep_score: Some(82.0),
                readiness_score: Some(80.0),
                activity_score: Some(75.0),
                hrv_balance: Some(78.0),
                resting_heart_rate_score: Some(85.0),
                ..DailyMetricRecord::new(day(i))
            })
            .collect()
    }

    fn make_night(i: i64, bed_minutes: i64, hours: f64) -> NightlyAggregate {
        let start = (day(i) - Duration::days(1)).and_hms_opt(22, 0, 0).unwrap()
            + Duration::minutes(bed_minutes);
        let minutes = hours * 60.0;
        NightlyAggregate {
            date: day(i),
            main_sleep: Some(SleepSession {
                start_time: start,
                end_time: start + Duration::minutes(minutes as i64),
                kind: SessionKind::Main,
                stages: SleepStages {
                    light_minutes: minutes,
                    ..Default::default()
                },
                efficiency: 100.0,
                score: None,
                respiratory_rate: None,
            }),
            naps: Vec::new(),
            total_sleep_minutes: minutes,
            time_in_bed_minutes: minutes,
            efficiency: Some(100.0),
        }
    }

    fn make_nights(n: i64, hours: f64) -> Vec<NightlyAggregate> {
        (0..n).map(|i| make_night(i, 60, hours)).collect()
    }

    fn debt(hours: f64) -> SleepDebtState {
        SleepDebtState {
            accumulated_hours: hours,
            trailing_window_days: 14,
            need_hours: 8.0,
            recent_surplus_hours: 0.0,
            estimated_recovery_days: RecoveryEstimate::NotNeeded,
            severity: DebtSeverity::Minimal,
            timeline: Vec::new(),
        }
    }

    fn check(
        records: &[DailyMetricRecord],
        nights: &[NightlyAggregate],
        need_hours: f64,
    ) -> Vec<HealthAlert> {
        let need = need(need_hours);
        AlertMonitor::check(
            &AlertInputs {
                records,
                nights,
                need: &need,
                debt: None,
                decline: None,
            },
            &AlertConfig::default(),
        )
    }

    fn keys(alerts: &[HealthAlert]) -> Vec<&str> {
        alerts.iter().map(|a| a.key.as_str()).collect()
    }

    #[test]
    fn test_healthy_history_raises_nothing() {
        assert!(check(&make_records(14), &make_nights(14, 8.0), 8.0).is_empty());
    }

    #[test]
    fn test_latest_score_crash_is_critical() {
        let mut records = make_records(14);
        records[13].sleep_score = Some(58.0);
        let alerts = check(&records, &[], 8.0);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].category, AlertCategory::SleepQuality);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(alerts[0].key, "sleep_score_critical");
        assert_eq!(alerts[0].value, 58.0);
    }

    #[test]
    fn test_low_recent_readiness_is_warning() {
        let mut records = make_records(14);
        for (r, score) in records[11..].iter_mut().zip([68.0, 69.0, 66.0]) {
            r.readiness_score = Some(score);
        }
        let alerts = check(&records, &[], 8.0);

        assert_eq!(keys(&alerts), vec!["readiness_score_low"]);
        assert!((alerts[0].value - 203.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_duration_levels_scale_with_need() {
        // 6.5 h clears the scaled floor at 7 h need but not at 8.5 h need
        let nights = make_nights(7, 6.5);
        assert!(check(&[], &nights, 7.0).is_empty());

        let alerts = check(&[], &nights, 8.5);
        assert_eq!(keys(&alerts), vec!["insufficient_sleep"]);
        assert!((alerts[0].threshold - 7.0 * 8.5 / 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_sleep_debt_levels() {
        let need = need(8.0);
        let config = AlertConfig::default();
        let severities: Vec<Option<AlertSeverity>> = [9.0, 12.0, 16.0]
            .iter()
            .map(|h| AlertMonitor::sleep_debt(Some(&debt(*h)), &need, &config).map(|a| a.severity))
            .collect();
        assert_eq!(
            severities,
            vec![None, Some(AlertSeverity::Warning), Some(AlertSeverity::Critical)]
        );
    }

    #[test]
    fn test_irregular_bedtimes_warn() {
        // bedtimes swinging between 21:00 and 02:00
        let nights: Vec<NightlyAggregate> = (0..7)
            .map(|i| make_night(i, if i % 2 == 0 { -60 } else { 240 }, 8.0))
            .collect();
        let alerts = check(&[], &nights, 8.0);
        assert_eq!(keys(&alerts), vec!["irregular_bedtime"]);
        assert!(alerts[0].value > 2.0);
    }

    #[test]
    fn test_bad_night_run_maps_to_severity() {
        let config = AlertConfig::default();
        let run = |nights: usize| ConsecutiveDecline {
            start_date: day(0),
            end_date: day(nights as i64 - 1),
            nights,
            severity: Severity::Medium,
        };
        assert_eq!(
            AlertMonitor::bad_night_run(Some(&run(3)), &config).map(|a| a.severity),
            Some(AlertSeverity::Warning)
        );
        assert_eq!(
            AlertMonitor::bad_night_run(Some(&run(6)), &config).map(|a| a.severity),
            Some(AlertSeverity::Critical)
        );
        assert!(AlertMonitor::bad_night_run(None, &config).is_none());
    }

    #[test]
    fn test_falling_rhr_score_means_elevated_heart_rate() {
        let mut records = make_records(14);
        for r in &mut records[11..] {
            r.resting_heart_rate_score = Some(74.0);
        }
        let alerts = check(&records, &[], 8.0);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].category, AlertCategory::RestingHeartRate);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(alerts[0].threshold, 75.0);

        // a rising score is a lower heart rate and never alerts
        for r in &mut records[11..] {
            r.resting_heart_rate_score = Some(97.0);
        }
        assert!(check(&records, &[], 8.0).is_empty());
    }

    #[test]
    fn test_hard_training_on_low_readiness() {
        let mut records = make_records(14);
        for r in &mut records[7..] {
            r.activity_score = Some(90.0);
            r.readiness_score = Some(72.0);
        }
        let alerts = check(&records, &[], 8.0);
        assert!(alerts
            .iter()
            .any(|a| a.category == AlertCategory::Overtraining && a.severity == AlertSeverity::Warning));
    }

    #[test]
    fn test_inactivity_streak() {
        let mut records = make_records(10);
        for r in &mut records[6..] {
            r.activity_score = Some(40.0);
        }
        let alerts = check(&records, &[], 8.0);
        assert_eq!(keys(&alerts), vec!["prolonged_inactivity"]);
        assert_eq!(alerts[0].value, 4.0);
    }

    #[test]
    fn test_declining_trend_and_critical_first() {
        let mut records = make_records(14);
        for (k, r) in records[7..].iter_mut().enumerate() {
            r.sleep_score = Some(90.0 - 5.0 * k as f64);
        }
        let alerts = check(&records, &[], 8.0);

        // latest 60 is not under 60, but the recent mean is under 70
        assert_eq!(keys(&alerts), vec!["sleep_score_low", "sleep_score_declining"]);
        assert!((alerts[1].value + 5.0).abs() < 1e-9);

        records[13].sleep_score = Some(50.0);
        let alerts = check(&records, &[], 8.0);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
    }
}
