//! Personal sleep need estimation
//!
//! Tries progressively weaker methods until one succeeds:
//!
//! 1. main-sleep median on top-quartile readiness days
//! 2. the same keyed on sleep score
//! 3. 75th percentile of nightly total sleep
//! 4. a per-chronotype default
//!
//! A configured override short-circuits the chain. The estimator always
//! returns a value tagged with the method that produced it.

use crate::baseline::percentile;
use crate::chronotype::Chronotype;
use crate::config::{SleepNeedConfig, REFERENCE_SLEEP_NEED_HOURS};
use crate::error::InsightError;
use crate::types::{DailyMetricRecord, Metric, MetricSource, NightlyAggregate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepNeedMethod {
    UserSpecified,
    ReadinessCorrelation,
    SleepScoreCorrelation,
    DurationPercentile,
    ChronotypeDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonalSleepNeed {
    pub hours: f64,
    pub confidence: Confidence,
    pub method: SleepNeedMethod,
    /// Nights or days the estimate was drawn from
    pub sample_count: usize,
}

impl PersonalSleepNeed {
    /// Factor applied to thresholds calibrated for an 8-hour sleeper
    pub fn scale_factor(&self) -> f64 {
        self.hours / REFERENCE_SLEEP_NEED_HOURS
    }
}

/// Infers nightly sleep requirement from history
pub struct SleepNeedEstimator;

impl SleepNeedEstimator {
    /// Estimate personal sleep need
    ///
    /// # Arguments
    ///
    /// * `records` - Daily records carrying readiness and sleep scores
    /// * `nights` - Nightly aggregates keyed by wake-up date
    /// * `chronotype` - Classified chronotype, if known, for the final fallback
    /// * `config` - Estimator settings
    pub fn estimate(
        records: &[DailyMetricRecord],
        nights: &[NightlyAggregate],
        chronotype: Option<Chronotype>,
        config: &SleepNeedConfig,
    ) -> PersonalSleepNeed {
        if let Some(hours) = config.override_hours {
            return PersonalSleepNeed {
                hours,
                confidence: Confidence::High,
                method: SleepNeedMethod::UserSpecified,
                sample_count: 0,
            };
        }

        let attempts = [
            (Metric::ReadinessScore, SleepNeedMethod::ReadinessCorrelation, Confidence::High),
            (Metric::SleepScore, SleepNeedMethod::SleepScoreCorrelation, Confidence::Medium),
        ];
        for (metric, method, confidence) in attempts {
            match Self::top_performance_need(records, nights, &metric, config) {
                Ok((hours, sample_count)) => {
                    debug!(?method, hours, sample_count, "estimated sleep need");
                    return PersonalSleepNeed {
                        hours,
                        confidence,
                        method,
                        sample_count,
                    };
                }
                Err(e) => debug!(?method, error = %e, "sleep need method unavailable"),
            }
        }

        match Self::duration_percentile_need(nights, config) {
            Ok((hours, sample_count)) => {
                let confidence = if sample_count >= config.medium_confidence_nights {
                    Confidence::Medium
                } else {
                    Confidence::Low
                };
                return PersonalSleepNeed {
                    hours,
                    confidence,
                    method: SleepNeedMethod::DurationPercentile,
                    sample_count,
                };
            }
            Err(e) => debug!(error = %e, "duration percentile unavailable"),
        }

        let defaults = &config.chronotype_defaults;
        let hours = match chronotype {
            Some(Chronotype::ExtremeLark) => defaults.extreme_lark,
            Some(Chronotype::Lark) => defaults.lark,
            Some(Chronotype::Intermediate) => defaults.intermediate,
            Some(Chronotype::Owl) => defaults.owl,
            Some(Chronotype::ExtremeOwl) => defaults.extreme_owl,
            None => defaults.unknown,
        };
        debug!(?chronotype, hours, "falling back to chronotype default sleep need");
        PersonalSleepNeed {
            hours,
            confidence: Confidence::Low,
            method: SleepNeedMethod::ChronotypeDefault,
            sample_count: 0,
        }
    }

    /// Median main sleep on days scoring at or above the top percentile
    fn top_performance_need(
        records: &[DailyMetricRecord],
        nights: &[NightlyAggregate],
        metric: &Metric,
        config: &SleepNeedConfig,
    ) -> Result<(f64, usize), InsightError> {
        let main_sleep: BTreeMap<_, _> = nights
            .iter()
            .filter_map(|n| n.main_sleep_hours().map(|h| (n.date, h)))
            .collect();

        let paired: Vec<(f64, f64)> = records
            .iter()
            .filter_map(|r| {
                let score = r.metric(metric)?;
                main_sleep.get(&r.date).map(|hours| (score, *hours))
            })
            .collect();

        let mut scores: Vec<f64> = paired.iter().map(|(s, _)| *s).collect();
        scores.sort_by(f64::total_cmp);
        let cutoff = percentile(&scores, config.top_percentile);

        let mut top_hours: Vec<f64> = paired
            .iter()
            .filter(|(score, _)| *score >= cutoff)
            .map(|(_, hours)| *hours)
            .collect();

        if top_hours.len() < config.min_top_days {
            return Err(InsightError::insufficient(
                format!("{} top-quartile days", metric),
                config.min_top_days,
                top_hours.len(),
            ));
        }

        top_hours.sort_by(f64::total_cmp);
        Ok((percentile(&top_hours, 50.0), top_hours.len()))
    }

    fn duration_percentile_need(
        nights: &[NightlyAggregate],
        config: &SleepNeedConfig,
    ) -> Result<(f64, usize), InsightError> {
        let mut totals: Vec<f64> = nights
            .iter()
            .filter(|n| n.total_sleep_minutes > 0.0)
            .map(NightlyAggregate::total_sleep_hours)
            .collect();

        if totals.len() < config.min_percentile_nights {
            return Err(InsightError::insufficient(
                "sleep duration percentile",
                config.min_percentile_nights,
                totals.len(),
            ));
        }
        totals.sort_by(f64::total_cmp);
        Ok((percentile(&totals, config.top_percentile), totals.len()))
    }
}
