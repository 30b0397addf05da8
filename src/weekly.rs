//! Weekly review
//!
//! Summarizes the week ending at the analysis date, grades it, picks out
//! highlights and lowlights, and compares it with the week before.

use crate::baseline::{mean, sample_std_dev};
use crate::config::WeeklyConfig;
use crate::error::InsightError;
use crate::prediction::linear_fit;
use crate::types::{series, DailyMetricRecord, DatedValue, Metric, NightlyAggregate};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Activity score at or above which a day counts as a training day
const TRAINING_ACTIVITY_SCORE: f64 = 85.0;
const SHORT_SLEEP_HOURS: f64 = 7.0;

const TREND_METRICS: [Metric; 3] = [
    Metric::SleepScore,
    Metric::ReadinessScore,
    Metric::ActivityScore,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekGrade {
    Excellent,
    Good,
    Average,
    Challenging,
}

impl WeekGrade {
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            WeekGrade::Excellent
        } else if score >= 75.0 {
            WeekGrade::Good
        } else if score >= 65.0 {
            WeekGrade::Average
        } else {
            WeekGrade::Challenging
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekSummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days_tracked: usize,
    pub nights_tracked: usize,
    pub sleep_score: Option<f64>,
    pub readiness_score: Option<f64>,
    pub activity_score: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub sleep_efficiency: Option<f64>,
    pub best_sleep_score: Option<f64>,
    pub worst_sleep_score: Option<f64>,
    /// 100 minus ten points per percent of night-to-night duration variation
    pub duration_consistency: Option<f64>,
    /// Weighted mean of the sleep, readiness and activity averages
    pub weekly_score: Option<f64>,
    pub grade: Option<WeekGrade>,
    pub training_days: usize,
}

impl WeekSummary {
    fn is_empty(&self) -> bool {
        self.days_tracked == 0 && self.nights_tracked == 0
    }
}

/// A notable result of the week, keyed for display by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekNote {
    pub key: String,
    pub value: f64,
}

impl WeekNote {
    fn new(key: &str, value: f64) -> Self {
        Self {
            key: key.to_string(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTrend {
    pub metric: Metric,
    pub slope_per_day: f64,
    pub direction: TrendDirection,
}

/// Current week minus previous week, where both have the value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekComparison {
    pub sleep_score_change: Option<f64>,
    pub readiness_score_change: Option<f64>,
    pub activity_score_change: Option<f64>,
    pub sleep_hours_change: Option<f64>,
    pub sleep_efficiency_change: Option<f64>,
    pub weekly_score_change: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReview {
    pub current: WeekSummary,
    pub previous: Option<WeekSummary>,
    pub comparison: Option<WeekComparison>,
    pub trends: Vec<MetricTrend>,
    pub highlights: Vec<WeekNote>,
    pub lowlights: Vec<WeekNote>,
}

/// Builds week summaries and week-over-week changes
pub struct WeeklyReviewer;

impl WeeklyReviewer {
    pub fn review(
        records: &[DailyMetricRecord],
        nights: &[NightlyAggregate],
        as_of: NaiveDate,
        config: &WeeklyConfig,
    ) -> Result<WeeklyReview, InsightError> {
        let days = config.days as i64;
        let current = Self::summarize(records, nights, as_of - Duration::days(days - 1), as_of, config);
        if current.is_empty() {
            return Err(InsightError::insufficient("days in the current week", 1, 0));
        }
        let prev_end = as_of - Duration::days(days);
        let previous = Self::summarize(records, nights, prev_end - Duration::days(days - 1), prev_end, config);
        let previous = (!previous.is_empty()).then_some(previous);

        let comparison = previous.as_ref().map(|p| WeekComparison {
            sleep_score_change: change(current.sleep_score, p.sleep_score),
            readiness_score_change: change(current.readiness_score, p.readiness_score),
            activity_score_change: change(current.activity_score, p.activity_score),
            sleep_hours_change: change(current.sleep_hours, p.sleep_hours),
            sleep_efficiency_change: change(current.sleep_efficiency, p.sleep_efficiency),
            weekly_score_change: change(current.weekly_score, p.weekly_score),
        });

        let week: Vec<DailyMetricRecord> = records
            .iter()
            .filter(|r| r.date >= current.start && r.date <= current.end)
            .cloned()
            .collect();
        let trends = TREND_METRICS
            .iter()
            .filter_map(|metric| trend(metric, &series(&week, metric), config))
            .collect();

        debug!(
            start = %current.start,
            days = current.days_tracked,
            has_previous = previous.is_some(),
            "built weekly review"
        );

        let highlights = highlights(&current);
        let lowlights = lowlights(&current);

        Ok(WeeklyReview {
            current,
            previous,
            comparison,
            trends,
            highlights,
            lowlights,
        })
    }

    fn summarize(
        records: &[DailyMetricRecord],
        nights: &[NightlyAggregate],
        start: NaiveDate,
        end: NaiveDate,
        config: &WeeklyConfig,
    ) -> WeekSummary {
        let in_week = |d: NaiveDate| d >= start && d <= end;
        let days: Vec<&DailyMetricRecord> = records.iter().filter(|r| in_week(r.date)).collect();
        let week_nights: Vec<&NightlyAggregate> = nights
            .iter()
            .filter(|n| in_week(n.date) && n.total_sleep_minutes > 0.0)
            .collect();

        let sleep_scores: Vec<f64> = days.iter().filter_map(|r| r.sleep_score).collect();
        let readiness: Vec<f64> = days.iter().filter_map(|r| r.readiness_score).collect();
        let activity: Vec<f64> = days.iter().filter_map(|r| r.activity_score).collect();
        let hours: Vec<f64> = week_nights.iter().map(|n| n.total_sleep_hours()).collect();
        let efficiency: Vec<f64> = week_nights.iter().filter_map(|n| n.efficiency).collect();

        let sleep_score = mean_of(&sleep_scores);
        let readiness_score = mean_of(&readiness);
        let activity_score = mean_of(&activity);

        let w = &config.weights;
        let weighted: Vec<(f64, f64)> = [
            (w.sleep, sleep_score),
            (w.readiness, readiness_score),
            (w.activity, activity_score),
        ]
        .into_iter()
        .filter_map(|(w, v)| v.map(|v| (w, v)))
        .filter(|(w, _)| *w > 0.0)
        .collect();
        let total_weight: f64 = weighted.iter().map(|(w, _)| w).sum();
        let weekly_score = (total_weight > 0.0)
            .then(|| weighted.iter().map(|(w, v)| w * v).sum::<f64>() / total_weight);

        WeekSummary {
            start,
            end,
            days_tracked: days.len(),
            nights_tracked: week_nights.len(),
            sleep_score,
            readiness_score,
            activity_score,
            sleep_hours: mean_of(&hours),
            sleep_efficiency: mean_of(&efficiency),
            best_sleep_score: sleep_scores.iter().copied().reduce(f64::max),
            worst_sleep_score: sleep_scores.iter().copied().reduce(f64::min),
            duration_consistency: duration_consistency(&hours),
            weekly_score,
            grade: weekly_score.map(WeekGrade::from_score),
            training_days: activity
                .iter()
                .filter(|s| **s >= TRAINING_ACTIVITY_SCORE)
                .count(),
        }
    }
}

fn highlights(week: &WeekSummary) -> Vec<WeekNote> {
    let mut notes = Vec::new();
    match (week.best_sleep_score, week.sleep_score) {
        (Some(best), _) if best >= 90.0 => notes.push(WeekNote::new("outstanding_sleep", best)),
        (_, Some(avg)) if avg >= 80.0 => notes.push(WeekNote::new("excellent_sleep_week", avg)),
        _ => {}
    }
    if let Some(c) = week.duration_consistency {
        if week.nights_tracked >= 5 && c >= 85.0 {
            notes.push(WeekNote::new("consistent_sleep", c));
        }
    }
    if let Some(avg) = week.readiness_score.filter(|v| *v >= 85.0) {
        notes.push(WeekNote::new("high_readiness_week", avg));
    }
    if week.training_days >= 4 {
        notes.push(WeekNote::new("consistent_training", week.training_days as f64));
    }
    notes
}

fn lowlights(week: &WeekSummary) -> Vec<WeekNote> {
    let mut notes = Vec::new();
    match (week.worst_sleep_score, week.sleep_score) {
        (Some(worst), _) if worst < 60.0 => notes.push(WeekNote::new("poor_sleep_night", worst)),
        (_, Some(avg)) if avg < 70.0 => notes.push(WeekNote::new("below_average_sleep", avg)),
        _ => {}
    }
    if let Some(hours) = week.sleep_hours.filter(|h| *h < SHORT_SLEEP_HOURS) {
        notes.push(WeekNote::new("insufficient_sleep", hours));
    }
    if let Some(avg) = week.readiness_score.filter(|v| *v < 70.0) {
        notes.push(WeekNote::new("low_readiness", avg));
    }
    if let Some(avg) = week.activity_score.filter(|v| *v < 60.0) {
        notes.push(WeekNote::new("low_activity", avg));
    }
    notes
}

fn mean_of(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| mean(values))
}

fn change(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    Some(current? - previous?)
}

fn duration_consistency(hours: &[f64]) -> Option<f64> {
    if hours.len() < 2 {
        return None;
    }
    let m = mean(hours);
    if m <= 0.0 {
        return None;
    }
    let cv_pct = sample_std_dev(hours, m) / m * 100.0;
    Some((100.0 - cv_pct * 10.0).max(0.0))
}

fn trend(metric: &Metric, points: &[DatedValue], config: &WeeklyConfig) -> Option<MetricTrend> {
    if points.len() < 3 {
        return None;
    }
    let origin = points[0].date;
    let xy: Vec<(f64, f64)> = points
        .iter()
        .map(|p| ((p.date - origin).num_days() as f64, p.value))
        .collect();
    let slope = linear_fit(&xy).0;
    let direction = if slope > config.trend_slope_per_day {
        TrendDirection::Improving
    } else if slope < -config.trend_slope_per_day {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    };
    Some(MetricTrend {
        metric: metric.clone(),
        slope_per_day: slope,
        direction,
    })
}
