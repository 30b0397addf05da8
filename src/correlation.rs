//! Pearson correlation between two dated metric series

use crate::config::CorrelationConfig;
use crate::error::InsightError;
use crate::types::DatedValue;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    Strong,
    Moderate,
    Weak,
    Negligible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationDirection {
    Positive,
    Negative,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub coefficient: f64,
    /// Paired dates that entered the computation
    pub sample_count: usize,
    pub strength: CorrelationStrength,
    pub direction: CorrelationDirection,
    /// Days `b` trails `a` by
    pub lag_days: i64,
}

/// Correlate two series on matching dates
pub fn correlate(
    a: &[DatedValue],
    b: &[DatedValue],
    config: &CorrelationConfig,
) -> Result<Correlation, InsightError> {
    correlate_lagged(a, b, 0, config)
}

/// Correlate `a` on day `d` with `b` on day `d + lag_days`
///
/// Useful for questions such as "does sleep duration predict next-day
/// readiness" (`lag_days = 1`).
pub fn correlate_lagged(
    a: &[DatedValue],
    b: &[DatedValue],
    lag_days: i64,
    config: &CorrelationConfig,
) -> Result<Correlation, InsightError> {
    let b_by_date: BTreeMap<_, _> = b.iter().map(|v| (v.date, v.value)).collect();
    let (xs, ys): (Vec<f64>, Vec<f64>) = a
        .iter()
        .filter_map(|v| {
            b_by_date
                .get(&(v.date + Duration::days(lag_days)))
                .map(|y| (v.value, *y))
        })
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .unzip();

    if xs.len() < 2 {
        return Err(InsightError::insufficient("correlation", 2, xs.len()));
    }

    let coefficient = pearson(&xs, &ys)?;
    Ok(Correlation {
        coefficient,
        sample_count: xs.len(),
        strength: strength(coefficient, config),
        direction: if coefficient > 0.0 {
            CorrelationDirection::Positive
        } else if coefficient < 0.0 {
            CorrelationDirection::Negative
        } else {
            CorrelationDirection::None
        },
        lag_days,
    })
}

fn pearson(xs: &[f64], ys: &[f64]) -> Result<f64, InsightError> {
    let n = xs.len() as f64;
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return Err(InsightError::UndefinedRate(
            "correlation with a constant series".to_string(),
        ));
    }
    Ok((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

fn strength(r: f64, config: &CorrelationConfig) -> CorrelationStrength {
    let magnitude = r.abs();
    if magnitude > config.strong {
        CorrelationStrength::Strong
    } else if magnitude > config.moderate {
        CorrelationStrength::Moderate
    } else if magnitude > config.weak {
        CorrelationStrength::Weak
    } else {
        CorrelationStrength::Negligible
    }
}
