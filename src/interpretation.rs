//! Semantic interpretation of daily metrics
//!
//! Turns raw values into labels relative to the personal baseline and blends
//! the day's scores into one weighted recovery score.

use crate::baseline::{interpret_deviation, Baseline, Deviation};
use crate::config::InterpretationConfig;
use crate::error::InsightError;
use crate::types::{DailyMetricRecord, Metric, MetricSource};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueLabel {
    AboveAverage,
    Typical,
    BelowAverage,
    /// No baseline, or a baseline without spread
    Indeterminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

/// Quality band for a 0-100 wearable score
pub fn score_quality(score: f64) -> ScoreQuality {
    if score >= 85.0 {
        ScoreQuality::Excellent
    } else if score >= 70.0 {
        ScoreQuality::Good
    } else if score >= 60.0 {
        ScoreQuality::Fair
    } else {
        ScoreQuality::Poor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HrvBalanceStatus {
    Balanced,
    Moderate,
    Low,
    VeryLow,
}

pub fn hrv_balance_status(value: f64) -> HrvBalanceStatus {
    if value >= 75.0 {
        HrvBalanceStatus::Balanced
    } else if value >= 50.0 {
        HrvBalanceStatus::Moderate
    } else if value >= 30.0 {
        HrvBalanceStatus::Low
    } else {
        HrvBalanceStatus::VeryLow
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricInterpretation {
    pub metric: Metric,
    pub value: f64,
    pub label: ValueLabel,
    pub deviation: Option<Deviation>,
    /// Only for 0-100 summary scores
    pub quality: Option<ScoreQuality>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryState {
    FullyRecovered,
    MostlyRecovered,
    PartiallyRecovered,
    Strained,
    NotRecovered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingIntensity {
    High,
    ModerateToHard,
    Moderate,
    Light,
    Rest,
}

impl RecoveryState {
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            RecoveryState::FullyRecovered
        } else if score >= 70.0 {
            RecoveryState::MostlyRecovered
        } else if score >= 55.0 {
            RecoveryState::PartiallyRecovered
        } else if score >= 40.0 {
            RecoveryState::Strained
        } else {
            RecoveryState::NotRecovered
        }
    }

    pub fn training_intensity(&self) -> TrainingIntensity {
        match self {
            RecoveryState::FullyRecovered => TrainingIntensity::High,
            RecoveryState::MostlyRecovered => TrainingIntensity::ModerateToHard,
            RecoveryState::PartiallyRecovered => TrainingIntensity::Moderate,
            RecoveryState::Strained => TrainingIntensity::Light,
            RecoveryState::NotRecovered => TrainingIntensity::Rest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryComponent {
    pub name: String,
    /// Component value on a 0-100 scale
    pub value: f64,
    /// Weight after renormalizing over present components
    pub weight: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub date: NaiveDate,
    pub score: f64,
    pub state: RecoveryState,
    pub training_intensity: TrainingIntensity,
    pub components: Vec<RecoveryComponent>,
    pub missing_components: Vec<String>,
}

/// Labels values and scores recovery
pub struct InterpretationEngine;

impl InterpretationEngine {
    /// Label a z-score
    pub fn label(z_score: Option<f64>, config: &InterpretationConfig) -> ValueLabel {
        match z_score {
            Some(z) if z > config.label_z_threshold => ValueLabel::AboveAverage,
            Some(z) if z < -config.label_z_threshold => ValueLabel::BelowAverage,
            Some(_) => ValueLabel::Typical,
            None => ValueLabel::Indeterminate,
        }
    }

    /// Interpret one value against an optional baseline
    pub fn interpret(
        metric: &Metric,
        value: f64,
        baseline: Option<&Baseline>,
        config: &InterpretationConfig,
    ) -> MetricInterpretation {
        let deviation = baseline.map(|b| interpret_deviation(value, b));
        let label = Self::label(deviation.as_ref().and_then(|d| d.z_score), config);
        let quality = matches!(
            metric,
            Metric::SleepScore | Metric::ReadinessScore | Metric::ActivityScore
        )
        .then(|| score_quality(value));

        MetricInterpretation {
            metric: metric.clone(),
            value,
            label,
            deviation,
            quality,
        }
    }

    /// Interpret every daily metric present on `record`
    pub fn interpret_day(
        record: &DailyMetricRecord,
        baselines: &BTreeMap<Metric, Baseline>,
        config: &InterpretationConfig,
    ) -> Vec<MetricInterpretation> {
        Metric::DAILY
            .iter()
            .filter_map(|metric| {
                let value = record.metric(metric)?;
                Some(Self::interpret(metric, value, baselines.get(metric), config))
            })
            .collect()
    }

    /// Weighted recovery score for one day
    ///
    /// Components missing from `record` are dropped and the remaining weights
    /// renormalized. Heart-rate stability penalizes distance from the resting
    /// heart rate baseline in either direction and is missing without one.
    /// Fails only when no component is present.
    pub fn recovery_score(
        record: &DailyMetricRecord,
        rhr_baseline: Option<&Baseline>,
        config: &InterpretationConfig,
    ) -> Result<RecoveryReport, InsightError> {
        let w = &config.weights;
        let candidates = [
            ("hrv_balance", w.hrv_balance, record.metric(&Metric::HrvBalance)),
            ("readiness", w.readiness, record.metric(&Metric::ReadinessScore)),
            ("sleep_score", w.sleep_score, record.metric(&Metric::SleepScore)),
            (
                "heart_rate_stability",
                w.heart_rate_stability,
                record
                    .metric(&Metric::RestingHeartRateScore)
                    .zip(rhr_baseline)
                    .map(|(s, b)| {
                        (100.0 - (s - b.mean).abs() * config.heart_rate_penalty_per_point).max(0.0)
                    }),
            ),
            (
                "temperature",
                w.temperature,
                record
                    .metric(&Metric::TemperatureDeviation)
                    .map(|d| 100.0 - d.abs() * config.temperature_penalty_per_degree),
            ),
        ];

        let mut present = Vec::new();
        let mut missing_components = Vec::new();
        for (name, weight, value) in candidates {
            match value {
                Some(v) if weight > 0.0 => present.push((name, weight, v.clamp(0.0, 100.0))),
                Some(_) => {}
                None => missing_components.push(name.to_string()),
            }
        }

        let total_weight: f64 = present.iter().map(|(_, w, _)| w).sum();
        if present.is_empty() || total_weight <= 0.0 {
            return Err(InsightError::MissingField(format!(
                "recovery score inputs on {}",
                record.date
            )));
        }

        let components: Vec<RecoveryComponent> = present
            .into_iter()
            .map(|(name, weight, value)| {
                let weight = weight / total_weight;
                RecoveryComponent {
                    name: name.to_string(),
                    value,
                    weight,
                    contribution: weight * value,
                }
            })
            .collect();
        let score = components
            .iter()
            .map(|c| c.contribution)
            .sum::<f64>()
            .clamp(0.0, 100.0);
        let state = RecoveryState::from_score(score);

        Ok(RecoveryReport {
            date: record.date,
            score,
            state,
            training_intensity: state.training_intensity(),
            components,
            missing_components,
        })
    }
}
