//! Rolling personal baselines
//!
//! A baseline summarizes the most recent values of one metric (mean, sample
//! standard deviation, percentiles, range) so that a new value can be judged
//! relative to the person instead of a population norm.

use crate::error::InsightError;
use crate::types::{Metric, MetricSource};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fewest samples a baseline can be built from
pub const MIN_BASELINE_SAMPLES: usize = 2;

/// Percentiles at the usual reporting ranks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileTable {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

/// Rolling statistics for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub metric: Metric,
    pub window_days: usize,
    pub sample_count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub percentiles: PercentileTable,
    #[serde(skip)]
    sorted: Vec<f64>,
}

impl Baseline {
    /// z-score of `value`, `None` for a constant series
    pub fn z_score(&self, value: f64) -> Option<f64> {
        (self.std_dev > 0.0).then(|| (value - self.mean) / self.std_dev)
    }

    /// Linearly interpolated percentile (0-100) of the retained sample
    pub fn percentile(&self, p: f64) -> f64 {
        if self.sorted.is_empty() {
            return self.mean;
        }
        percentile(&self.sorted, p)
    }
}

/// Compute a baseline from the most recent `window_days` present values
///
/// # Arguments
///
/// * `records` - Records in ascending date order
/// * `metric` - Metric to summarize; records without it are skipped
/// * `window_days` - Number of present values to keep
///
/// # Returns
///
/// The baseline, or `InsufficientData` when fewer than two values exist
pub fn compute_baseline<R: MetricSource>(
    records: &[R],
    metric: &Metric,
    window_days: usize,
) -> Result<Baseline, InsightError> {
    let present: Vec<f64> = records
        .iter()
        .filter_map(|r| r.metric(metric))
        .filter(|v| v.is_finite())
        .collect();
    let values = &present[present.len().saturating_sub(window_days)..];

    if values.len() < MIN_BASELINE_SAMPLES {
        return Err(InsightError::insufficient(
            format!("{} baseline", metric),
            MIN_BASELINE_SAMPLES,
            values.len(),
        ));
    }

    let mean = mean(values);
    let std_dev = sample_std_dev(values, mean);
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    debug!(%metric, samples = values.len(), mean, std_dev, "computed baseline");

    Ok(Baseline {
        metric: metric.clone(),
        window_days,
        sample_count: values.len(),
        mean,
        std_dev,
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        percentiles: PercentileTable {
            p10: percentile(&sorted, 10.0),
            p25: percentile(&sorted, 25.0),
            p50: percentile(&sorted, 50.0),
            p75: percentile(&sorted, 75.0),
            p90: percentile(&sorted, 90.0),
        },
        sorted,
    })
}

/// One baseline result per requested metric
pub fn compute_baselines<R: MetricSource>(
    records: &[R],
    metrics: &[Metric],
    window_days: usize,
) -> Vec<(Metric, Result<Baseline, InsightError>)> {
    metrics
        .iter()
        .map(|m| (m.clone(), compute_baseline(records, m, window_days)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationStatus {
    Normal,
    SlightlyAbnormal,
    ModeratelyAbnormal,
    HighlyAbnormal,
    /// Constant baseline, no z-score
    Indeterminate,
}

impl DeviationStatus {
    fn from_z(z: Option<f64>) -> Self {
        match z.map(f64::abs) {
            None => DeviationStatus::Indeterminate,
            Some(z) if z < 0.5 => DeviationStatus::Normal,
            Some(z) if z < 1.0 => DeviationStatus::SlightlyAbnormal,
            Some(z) if z < 1.5 => DeviationStatus::ModeratelyAbnormal,
            Some(_) => DeviationStatus::HighlyAbnormal,
        }
    }
}

/// A value compared against its baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deviation {
    pub value: f64,
    pub baseline_mean: f64,
    pub absolute: f64,
    /// Relative to the mean; `None` when the mean is zero
    pub percentage: Option<f64>,
    pub z_score: Option<f64>,
    pub status: DeviationStatus,
}

/// Compare `value` against `baseline`
pub fn interpret_deviation(value: f64, baseline: &Baseline) -> Deviation {
    let absolute = value - baseline.mean;
    let percentage = (baseline.mean != 0.0).then(|| absolute / baseline.mean.abs() * 100.0);
    let z_score = baseline.z_score(value);

    Deviation {
        value,
        baseline_mean: baseline.mean,
        absolute,
        percentage,
        z_score,
        status: DeviationStatus::from_z(z_score),
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation with n-1 correction; zero below two values
pub(crate) fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Percentile of an ascending slice by linear interpolation between ranks
pub(crate) fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let frac = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}
