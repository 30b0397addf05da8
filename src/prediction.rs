//! Short-horizon ensemble forecasts
//!
//! Three simple forecasters are blended with fixed weights: a least-squares
//! trend over the recent window, exponential reversion toward the baseline
//! mean, and a day-of-week offset learned from history.

use crate::baseline::{compute_baseline, mean};
use crate::config::PredictionConfig;
use crate::error::InsightError;
use crate::types::{DatedValue, Metric};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastComponents {
    pub trend: f64,
    pub reversion: f64,
    pub seasonal: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub horizon_days: usize,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
    pub components: ForecastComponents,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub metric: Metric,
    pub last_observed: NaiveDate,
    pub history_points: usize,
    pub baseline_mean: f64,
    /// Slope of the recent trend, units per day
    pub trend_per_day: f64,
    pub points: Vec<ForecastPoint>,
}

/// Produces ensemble forecasts for a metric series
pub struct PredictionEngine;

impl PredictionEngine {
    /// Forecast `series` over the configured horizon
    ///
    /// # Arguments
    ///
    /// * `metric` - Metric the series holds, used for value bounds
    /// * `series` - Observations in ascending date order
    /// * `config` - Horizon, windows and ensemble weights
    /// * `window_days` - Baseline window for the reversion target
    pub fn forecast(
        metric: &Metric,
        series: &[DatedValue],
        config: &PredictionConfig,
        window_days: usize,
    ) -> Result<Forecast, InsightError> {
        if config.trend_window < 2 || config.horizon_days == 0 {
            return Err(InsightError::ConfigError(format!(
                "forecast needs trend_window >= 2 and a positive horizon, got {} and {}",
                config.trend_window, config.horizon_days
            )));
        }
        if series.len() < config.min_history {
            return Err(InsightError::insufficient(
                format!("{} forecast history", metric),
                config.min_history,
                series.len(),
            ));
        }
        let baseline = compute_baseline(series, metric, window_days)?;
        let last = series[series.len() - 1];

        let recent = &series[series.len().saturating_sub(config.trend_window)..];
        let origin = recent[0].date;
        let (slope, intercept) = linear_fit(
            &recent
                .iter()
                .map(|p| ((p.date - origin).num_days() as f64, p.value))
                .collect::<Vec<_>>(),
        );
        let last_x = (last.date - origin).num_days() as f64;

        let overall_mean = mean(&series.iter().map(|p| p.value).collect::<Vec<_>>());
        let mut weekday_values: [Vec<f64>; 7] = Default::default();
        for p in series {
            weekday_values[p.date.weekday().num_days_from_monday() as usize].push(p.value);
        }

        let w = &config.weights;
        let total_weight = w.trend + w.reversion + w.seasonal;
        let bounds = metric.bounds();
        let clamp = |v: f64| match bounds {
            Some((lo, hi)) => v.clamp(lo, hi),
            None => v,
        };

        let points = (1..=config.horizon_days)
            .map(|h| {
                let date = last.date + Duration::days(h as i64);
                let hf = h as f64;

                let trend = intercept + slope * (last_x + hf);
                let reversion =
                    baseline.mean + (last.value - baseline.mean) * config.reversion_factor.powf(hf);
                let weekday = &weekday_values[date.weekday().num_days_from_monday() as usize];
                let seasonal = if weekday.is_empty() {
                    baseline.mean
                } else {
                    baseline.mean + (mean(weekday) - overall_mean)
                };

                let value = clamp(
                    (w.trend * trend + w.reversion * reversion + w.seasonal * seasonal)
                        / total_weight,
                );
                let half_width = config.confidence_z * baseline.std_dev * hf.sqrt();
                let (lower, upper) = bounded_interval(value, half_width, bounds);

                ForecastPoint {
                    date,
                    horizon_days: h,
                    value,
                    lower,
                    upper,
                    components: ForecastComponents {
                        trend,
                        reversion,
                        seasonal,
                    },
                }
            })
            .collect();

        Ok(Forecast {
            metric: metric.clone(),
            last_observed: last.date,
            history_points: series.len(),
            baseline_mean: baseline.mean,
            trend_per_day: slope,
            points,
        })
    }
}

/// Interval of width `2 * half_width` around `value`, slid inside `bounds`
///
/// Sliding instead of truncating keeps the width non-decreasing in the half
/// width; it only shrinks to the full bound range when it cannot fit.
fn bounded_interval(value: f64, half_width: f64, bounds: Option<(f64, f64)>) -> (f64, f64) {
    let (mut lower, mut upper) = (value - half_width, value + half_width);
    if let Some((lo, hi)) = bounds {
        if upper > hi {
            lower -= upper - hi;
            upper = hi;
        } else if lower < lo {
            upper += lo - lower;
            lower = lo;
        }
        lower = lower.max(lo);
        upper = upper.min(hi);
    }
    (lower, upper)
}

/// Least-squares slope and intercept; flat when x has no spread
pub(crate) fn linear_fit(points: &[(f64, f64)]) -> (f64, f64) {
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p.0).sum::<f64>() / n;
    let my = points.iter().map(|p| p.1).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.0 - mx).powi(2)).sum();
    if sxx == 0.0 {
        return (0.0, my);
    }
    let sxy: f64 = points.iter().map(|p| (p.0 - mx) * (p.1 - my)).sum();
    let slope = sxy / sxx;
    (slope, my - slope * mx)
}
