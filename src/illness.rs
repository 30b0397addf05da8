//! Early illness warning
//!
//! Several weak signals are each compared with the personal baseline, oriented
//! so that a positive deviation always means "more illness-like", and blended
//! into a 0-100 composite. Resting heart rate arrives as a score where lower
//! means a more elevated heart rate, so its deviation is inverted.

use crate::anomaly::{candidate_causes, Severity};
use crate::baseline::{compute_baseline, Baseline};
use crate::config::IllnessConfig;
use crate::error::InsightError;
use crate::types::{DailyMetricRecord, Metric, MetricSource, NightlyAggregate};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IllnessSignalKind {
    ElevatedRestingHeartRate,
    DepressedHrv,
    ElevatedTemperature,
    ReducedSleepEfficiency,
    ElevatedRespiratoryRate,
}

impl IllnessSignalKind {
    const ALL: [IllnessSignalKind; 5] = [
        IllnessSignalKind::ElevatedRestingHeartRate,
        IllnessSignalKind::DepressedHrv,
        IllnessSignalKind::ElevatedTemperature,
        IllnessSignalKind::ReducedSleepEfficiency,
        IllnessSignalKind::ElevatedRespiratoryRate,
    ];

    pub fn metric(&self) -> Metric {
        match self {
            IllnessSignalKind::ElevatedRestingHeartRate => Metric::RestingHeartRateScore,
            IllnessSignalKind::DepressedHrv => Metric::HrvBalance,
            IllnessSignalKind::ElevatedTemperature => Metric::TemperatureDeviation,
            IllnessSignalKind::ReducedSleepEfficiency => Metric::SleepEfficiency,
            IllnessSignalKind::ElevatedRespiratoryRate => Metric::RespiratoryRate,
        }
    }

    /// Sign that turns a z-score into an illness-like deviation
    fn orientation(&self) -> f64 {
        match self {
            IllnessSignalKind::ElevatedTemperature | IllnessSignalKind::ElevatedRespiratoryRate => 1.0,
            _ => -1.0,
        }
    }

    fn is_nightly(&self) -> bool {
        matches!(
            self,
            IllnessSignalKind::ReducedSleepEfficiency | IllnessSignalKind::ElevatedRespiratoryRate
        )
    }

    fn weight(&self, config: &IllnessConfig) -> f64 {
        let w = &config.weights;
        match self {
            IllnessSignalKind::ElevatedRestingHeartRate => w.resting_heart_rate,
            IllnessSignalKind::DepressedHrv => w.hrv,
            IllnessSignalKind::ElevatedTemperature => w.temperature,
            IllnessSignalKind::ReducedSleepEfficiency => w.efficiency,
            IllnessSignalKind::ElevatedRespiratoryRate => w.respiratory_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IllnessSignal {
    pub kind: IllnessSignalKind,
    pub value: f64,
    pub baseline_mean: f64,
    /// z-score with illness-like deviations positive
    pub oriented_z: f64,
    /// 0..=1
    pub strength: f64,
    pub weight: f64,
    pub severity: Severity,
    pub candidate_causes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyIllnessScore {
    pub date: NaiveDate,
    pub score: f64,
    pub alert: bool,
    /// Ranked by weighted strength, strongest first
    pub signals: Vec<IllnessSignal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IllnessRisk {
    Normal,
    Elevated,
    High,
    Critical,
}

impl IllnessRisk {
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            IllnessRisk::Critical
        } else if score >= 50.0 {
            IllnessRisk::High
        } else if score >= 30.0 {
            IllnessRisk::Elevated
        } else {
            IllnessRisk::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IllnessPattern {
    ClassicInfection,
    RespiratoryInfection,
    StressOvertraining,
    EarlyInfection,
    Unclassified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IllnessAssessment {
    pub date: NaiveDate,
    pub score: f64,
    pub risk: IllnessRisk,
    pub early_warning: bool,
    /// Alert days in a row ending at `date`
    pub consecutive_alert_days: usize,
    pub pattern: Option<IllnessPattern>,
    /// 0-100
    pub confidence: f64,
    pub daily: Vec<DailyIllnessScore>,
}

impl IllnessAssessment {
    /// Signals behind the latest score, strongest first
    pub fn contributing_signals(&self) -> &[IllnessSignal] {
        self.daily.last().map(|d| d.signals.as_slice()).unwrap_or(&[])
    }
}

/// Combines weak physiological signals into an early warning
pub struct IllnessDetector;

impl IllnessDetector {
    /// Score the most recent `evaluation_days` against the history before them
    pub fn assess(
        records: &[DailyMetricRecord],
        nights: &[NightlyAggregate],
        config: &IllnessConfig,
        window_days: usize,
    ) -> Result<IllnessAssessment, InsightError> {
        let dates: BTreeSet<NaiveDate> = records
            .iter()
            .map(|r| r.date)
            .chain(nights.iter().map(|n| n.date))
            .collect();
        let eval_dates: Vec<NaiveDate> = dates
            .iter()
            .rev()
            .take(config.evaluation_days)
            .rev()
            .copied()
            .collect();
        let Some(first) = eval_dates.first().copied() else {
            return Err(InsightError::insufficient("illness evaluation days", 1, 0));
        };

        let daily_history = &records[..records.partition_point(|r| r.date < first)];
        let nightly_history = &nights[..nights.partition_point(|n| n.date < first)];
        let baselines: BTreeMap<Metric, Baseline> = IllnessSignalKind::ALL
            .iter()
            .filter(|kind| kind.weight(config) > 0.0)
            .filter_map(|kind| {
                let metric = kind.metric();
                let baseline = if kind.is_nightly() {
                    compute_baseline(nightly_history, &metric, window_days)
                } else {
                    compute_baseline(daily_history, &metric, window_days)
                };
                baseline.ok().map(|b| (metric, b))
            })
            .collect();
        if baselines.is_empty() {
            return Err(InsightError::insufficient(
                "illness signal baselines",
                1,
                0,
            ));
        }

        let records_by_date: BTreeMap<_, _> = records.iter().map(|r| (r.date, r)).collect();
        let nights_by_date: BTreeMap<_, _> = nights.iter().map(|n| (n.date, n)).collect();
        let daily: Vec<DailyIllnessScore> = eval_dates
            .iter()
            .map(|date| {
                Self::score_day(
                    *date,
                    records_by_date.get(date).copied(),
                    nights_by_date.get(date).copied(),
                    &baselines,
                    config,
                )
            })
            .collect();

        let consecutive_alert_days = daily.iter().rev().take_while(|d| d.alert).count();
        let early_warning = consecutive_alert_days >= config.consecutive_days;
        let latest = daily
            .last()
            .ok_or_else(|| InsightError::insufficient("illness evaluation days", 1, 0))?;

        let active: Vec<&IllnessSignal> = latest
            .signals
            .iter()
            .filter(|s| s.severity >= Severity::Medium)
            .collect();
        let pattern = classify_pattern(&active);
        let confidence = if active.is_empty() {
            0.0
        } else {
            let avg_strength = active.iter().map(|s| s.strength).sum::<f64>() / active.len() as f64;
            ((active.len() as f64 / 3.0).min(1.0) * 0.6 + avg_strength * 0.4) * 100.0
        };

        if early_warning {
            info!(date = %latest.date, score = latest.score, consecutive_alert_days, "illness early warning");
        }

        Ok(IllnessAssessment {
            date: latest.date,
            score: latest.score,
            risk: IllnessRisk::from_score(latest.score),
            early_warning,
            consecutive_alert_days,
            pattern,
            confidence,
            daily,
        })
    }

    /// Composite score for one day
    pub fn score_day(
        date: NaiveDate,
        record: Option<&DailyMetricRecord>,
        night: Option<&NightlyAggregate>,
        baselines: &BTreeMap<Metric, Baseline>,
        config: &IllnessConfig,
    ) -> DailyIllnessScore {
        let mut signals = Vec::new();
        for kind in IllnessSignalKind::ALL {
            let weight = kind.weight(config);
            let metric = kind.metric();
            let value = if kind.is_nightly() {
                night.and_then(|n| n.metric(&metric))
            } else {
                record.and_then(|r| r.metric(&metric))
            };
            let (Some(value), Some(baseline)) = (value, baselines.get(&metric)) else {
                continue;
            };
            // constant baselines give no z-score; the signal is skipped
            let Some(z) = baseline.z_score(value) else {
                debug!(%date, ?kind, "skipping signal with flat baseline");
                continue;
            };
            if weight <= 0.0 {
                continue;
            }

            let oriented_z = z * kind.orientation();
            let strength = (oriented_z / config.saturation_z).clamp(0.0, 1.0);
            signals.push(IllnessSignal {
                kind,
                value,
                baseline_mean: baseline.mean,
                oriented_z,
                strength,
                weight,
                severity: if strength >= 2.0 / 3.0 {
                    Severity::High
                } else if strength >= 1.0 / 3.0 {
                    Severity::Medium
                } else {
                    Severity::Low
                },
                candidate_causes: candidate_causes(&metric)
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
            });
        }

        let total_weight: f64 = signals.iter().map(|s| s.weight).sum();
        let score = if total_weight > 0.0 {
            signals.iter().map(|s| s.weight * s.strength).sum::<f64>() / total_weight * 100.0
        } else {
            0.0
        };
        signals.sort_by(|a, b| (b.weight * b.strength).total_cmp(&(a.weight * a.strength)));

        DailyIllnessScore {
            date,
            score,
            alert: score >= config.alert_threshold,
            signals,
        }
    }
}

fn classify_pattern(active: &[&IllnessSignal]) -> Option<IllnessPattern> {
    if active.is_empty() {
        return None;
    }
    let has = |kind: IllnessSignalKind| active.iter().any(|s| s.kind == kind);
    let temp = has(IllnessSignalKind::ElevatedTemperature);
    let hrv = has(IllnessSignalKind::DepressedHrv);
    let rhr = has(IllnessSignalKind::ElevatedRestingHeartRate);
    let resp = has(IllnessSignalKind::ElevatedRespiratoryRate);

    let pattern = if temp && hrv && rhr {
        IllnessPattern::ClassicInfection
    } else if temp && resp {
        IllnessPattern::RespiratoryInfection
    } else if hrv && rhr {
        IllnessPattern::StressOvertraining
    } else if temp && active.len() >= 2 {
        IllnessPattern::EarlyInfection
    } else {
        IllnessPattern::Unclassified
    };
    Some(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn day(i: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 1).unwrap() + Duration::days(i)
    }

    struct Vitals {
        rhr: f64,
        hrv: f64,
        temp: f64,
        efficiency: f64,
    }

    const NORMAL: Vitals = Vitals {
        rhr: 82.0,
        hrv: 72.0,
        temp: 0.1,
        efficiency: 90.0,
    };

    const SICK: Vitals = Vitals {
        rhr: 70.0,
        hrv: 60.0,
        temp: 0.8,
        efficiency: 80.0,
    };

    fn make_day(i: i64, v: &Vitals) -> (DailyMetricRecord, NightlyAggregate) {
        let mut record = DailyMetricRecord::new(day(i));
        record.resting_heart_rate_score = Some(v.rhr);
        record.hrv_balance = Some(v.hrv);
        record.temperature_deviation = Some(v.temp);
        let night = NightlyAggregate {
            date: day(i),
            main_sleep: None,
            naps: Vec::new(),
            total_sleep_minutes: 450.0,
            time_in_bed_minutes: 500.0,
            efficiency: Some(v.efficiency),
        };
        (record, night)
    }

    /// 20 baseline days alternating around NORMAL, then the given recent days
    fn make_history(recent: &[&Vitals]) -> (Vec<DailyMetricRecord>, Vec<NightlyAggregate>) {
        let mut records = Vec::new();
        let mut nights = Vec::new();
        for i in 0..20 {
            let d = if i % 2 == 0 { 2.0 } else { -2.0 };
            let (r, n) = make_day(
                i,
                &Vitals {
                    rhr: NORMAL.rhr + d,
                    hrv: NORMAL.hrv + d,
                    temp: NORMAL.temp + d / 20.0,
                    efficiency: NORMAL.efficiency + d,
                },
            );
            records.push(r);
            nights.push(n);
        }
        for (offset, v) in recent.iter().enumerate() {
            let (r, n) = make_day(20 + offset as i64, v);
            records.push(r);
            nights.push(n);
        }
        (records, nights)
    }

    #[test]
    fn test_two_sick_days_raise_early_warning() {
        let (records, nights) = make_history(&[&NORMAL, &NORMAL, &NORMAL, &SICK, &SICK]);
        let assessment =
            IllnessDetector::assess(&records, &nights, &IllnessConfig::default(), 30).unwrap();

        assert_eq!(assessment.daily.len(), 5);
        assert!(assessment.daily[0].score.abs() < 1e-9);
        assert!((assessment.score - 100.0).abs() < 1e-9);
        assert_eq!(assessment.consecutive_alert_days, 2);
        assert!(assessment.early_warning);
        assert_eq!(assessment.risk, IllnessRisk::Critical);
        assert_eq!(assessment.pattern, Some(IllnessPattern::ClassicInfection));
        assert!((assessment.confidence - 100.0).abs() < 1e-9);
        assert_eq!(assessment.contributing_signals().len(), 4);
    }

    #[test]
    fn test_single_alert_day_is_not_a_warning() {
        let (records, nights) = make_history(&[&NORMAL, &NORMAL, &NORMAL, &NORMAL, &SICK]);
        let assessment =
            IllnessDetector::assess(&records, &nights, &IllnessConfig::default(), 30).unwrap();

        assert_eq!(assessment.consecutive_alert_days, 1);
        assert!(!assessment.early_warning);
    }

    #[test]
    fn test_higher_rhr_score_is_not_illness_like() {
        let calm = Vitals {
            rhr: 95.0,
            ..NORMAL
        };
        let (records, nights) = make_history(&[&NORMAL, &NORMAL, &NORMAL, &NORMAL, &calm]);
        let assessment =
            IllnessDetector::assess(&records, &nights, &IllnessConfig::default(), 30).unwrap();

        let rhr = assessment
            .contributing_signals()
            .iter()
            .find(|s| s.kind == IllnessSignalKind::ElevatedRestingHeartRate)
            .unwrap();
        assert!(rhr.oriented_z < 0.0);
        assert_eq!(rhr.strength, 0.0);
        assert!(assessment.score.abs() < 1e-9);
        assert_eq!(assessment.pattern, None);
    }

    #[test]
    fn test_low_rhr_and_hrv_without_fever_is_stress() {
        let strained = Vitals {
            temp: NORMAL.temp,
            efficiency: NORMAL.efficiency,
            ..SICK
        };
        let (records, nights) = make_history(&[&NORMAL, &NORMAL, &NORMAL, &strained, &strained]);
        let assessment =
            IllnessDetector::assess(&records, &nights, &IllnessConfig::default(), 30).unwrap();

        assert_eq!(assessment.pattern, Some(IllnessPattern::StressOvertraining));
        // rhr and hrv carry 0.60 of the weight at full strength
        assert!((assessment.score - 60.0).abs() < 1e-9);
        assert!(assessment.early_warning);
    }

    #[test]
    fn test_no_history_is_insufficient() {
        let (record, night) = make_day(0, &NORMAL);
        assert!(IllnessDetector::assess(&[record], &[night], &IllnessConfig::default(), 30).is_err());
    }
}
