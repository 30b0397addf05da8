//! Sleep debt accumulation
//!
//! Walks the trailing window oldest night first. A short night adds its full
//! deficit; a long night repays only part of its surplus, and debt never goes
//! below zero.

use crate::config::{DebtConfig, ThresholdLevels};
use crate::error::InsightError;
use crate::sleep_need::PersonalSleepNeed;
use crate::types::NightlyAggregate;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtSeverity {
    Minimal,
    Mild,
    Moderate,
    Elevated,
    Severe,
}

impl DebtSeverity {
    fn classify(debt_hours: f64, levels: &ThresholdLevels) -> Self {
        if debt_hours >= levels.severe {
            DebtSeverity::Severe
        } else if debt_hours >= levels.elevated {
            DebtSeverity::Elevated
        } else if debt_hours >= levels.moderate {
            DebtSeverity::Moderate
        } else if debt_hours >= levels.mild {
            DebtSeverity::Mild
        } else {
            DebtSeverity::Minimal
        }
    }
}

/// One night of the debt walk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtEntry {
    pub date: NaiveDate,
    pub actual_hours: f64,
    pub need_hours: f64,
    /// Positive when short of need, negative for a surplus
    pub deficit_hours: f64,
    pub accumulated_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecoveryEstimate {
    NotNeeded,
    Days { days: f64 },
    /// Recent sleep is not exceeding need, so the debt is not shrinking
    Undefined { surplus_rate_hours: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepDebtState {
    pub accumulated_hours: f64,
    pub trailing_window_days: usize,
    pub need_hours: f64,
    /// Mean nightly sleep beyond need over the recent nights
    pub recent_surplus_hours: f64,
    pub estimated_recovery_days: RecoveryEstimate,
    pub severity: DebtSeverity,
    pub timeline: Vec<DebtEntry>,
}

/// Accumulates and decays sleep debt against personal need
pub struct SleepDebtTracker;

impl SleepDebtTracker {
    /// Compute debt over the trailing window ending at the latest night
    pub fn track(
        nights: &[NightlyAggregate],
        need: &PersonalSleepNeed,
        config: &DebtConfig,
    ) -> Result<SleepDebtState, InsightError> {
        if config.window_days == 0 || config.surplus_rate_window == 0 {
            return Err(InsightError::ConfigError(
                "debt.window_days and debt.surplus_rate_window must be positive".to_string(),
            ));
        }
        let recorded: Vec<&NightlyAggregate> = nights
            .iter()
            .filter(|n| n.total_sleep_minutes > 0.0)
            .collect();
        let Some(last) = recorded.last() else {
            return Err(InsightError::insufficient("sleep debt nights", 1, 0));
        };
        let window_start = last.date - Duration::days(config.window_days as i64 - 1);

        let mut accumulated = 0.0_f64;
        let mut timeline = Vec::new();
        for night in recorded.iter().filter(|n| n.date >= window_start) {
            let actual = night.total_sleep_hours();
            let deficit = need.hours - actual;
            accumulated = if deficit > 0.0 {
                accumulated + deficit
            } else {
                (accumulated + deficit * config.recovery_fraction).max(0.0)
            };
            timeline.push(DebtEntry {
                date: night.date,
                actual_hours: actual,
                need_hours: need.hours,
                deficit_hours: deficit,
                accumulated_hours: accumulated,
            });
        }

        let recent = &timeline[timeline.len().saturating_sub(config.surplus_rate_window)..];
        let recent_surplus_hours =
            recent.iter().map(|e| -e.deficit_hours).sum::<f64>() / recent.len() as f64;

        let estimated_recovery_days = if accumulated <= 0.0 {
            RecoveryEstimate::NotNeeded
        } else {
            match estimate_recovery_days(accumulated, recent_surplus_hours * config.recovery_fraction) {
                Ok(days) => RecoveryEstimate::Days { days },
                Err(_) => RecoveryEstimate::Undefined {
                    surplus_rate_hours: recent_surplus_hours,
                },
            }
        };

        let levels = config.severity_hours.scaled(need.scale_factor());
        let severity = DebtSeverity::classify(accumulated, &levels);
        debug!(accumulated, nights = timeline.len(), ?severity, "tracked sleep debt");

        Ok(SleepDebtState {
            accumulated_hours: accumulated,
            trailing_window_days: config.window_days,
            need_hours: need.hours,
            recent_surplus_hours,
            estimated_recovery_days,
            severity,
            timeline,
        })
    }
}

/// Days to clear `debt_hours` at `repayment_rate` hours per day
pub fn estimate_recovery_days(debt_hours: f64, repayment_rate: f64) -> Result<f64, InsightError> {
    if repayment_rate <= 0.0 || !repayment_rate.is_finite() {
        return Err(InsightError::UndefinedRate(format!(
            "sleep debt repayment rate is {:.2} h/day",
            repayment_rate
        )));
    }
    Ok(debt_hours / repayment_rate)
}
