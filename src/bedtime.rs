//! Bedtime recommendation
//!
//! Ranks main-sleep nights by a composite quality score and derives the
//! bedtime, duration and wake time of the best ones. Bedtimes are averaged on
//! a noon-shifted axis so that 23:30 and 00:30 average to midnight.

use crate::baseline::{mean, sample_std_dev};
use crate::chronotype::{circular_mean, TimeWindow};
use crate::config::BedtimeConfig;
use crate::error::InsightError;
use crate::sleep_need::PersonalSleepNeed;
use crate::types::{ClockTime, NightlyAggregate, SleepSession, MINUTES_PER_DAY};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

const NOON_MINUTES: f64 = 12.0 * 60.0;

/// Bedtime spread at which consistency is still perfect, and the span over
/// which it falls to zero
const CONSISTENT_SPREAD_MINUTES: f64 = 30.0;
const CONSISTENCY_FALLOFF_MINUTES: f64 = 90.0;

/// Quality of one main sleep, 0-100
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NightQuality {
    pub date: NaiveDate,
    pub score: f64,
    pub sleep_hours: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeekdayQuality {
    /// Weekday of the bedtime, not of the wake date
    pub weekday: Weekday,
    pub mean_quality: f64,
    pub nights: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BedtimeRecommendation {
    pub optimal_bedtime: ClockTime,
    /// Mean bedtime of the best nights, plus and minus one standard deviation
    pub bedtime_window: TimeWindow,
    pub optimal_duration_hours: f64,
    pub recommended_wake_time: ClockTime,
    /// Optimal bedtime followed by the optimal duration
    pub sleep_window: TimeWindow,
    /// 100 at a 30 minute bedtime spread, 0 at two hours
    pub bedtime_consistency: f64,
    pub best_nights: usize,
    pub nights_analyzed: usize,
    pub best_mean_quality: f64,
    /// Mean quality of the best nights minus the mean over all nights
    pub quality_gain: f64,
    /// Sleep of the best nights minus the mean over all nights, in hours
    pub duration_difference_hours: f64,
    pub weekday_quality: Vec<WeekdayQuality>,
}

struct RankedNight<'a> {
    session: &'a SleepSession,
    quality: NightQuality,
}

/// Recommends a bedtime from the person's best nights
pub struct BedtimeAdvisor;

impl BedtimeAdvisor {
    pub fn recommend(
        nights: &[NightlyAggregate],
        need: &PersonalSleepNeed,
        config: &BedtimeConfig,
    ) -> Result<BedtimeRecommendation, InsightError> {
        let mut ranked: Vec<RankedNight> = nights
            .iter()
            .filter_map(|n| {
                let session = n.main_sleep.as_ref()?;
                Some(RankedNight {
                    session,
                    quality: Self::night_quality(n.date, session, need),
                })
            })
            .collect();
        if ranked.len() < config.min_nights {
            return Err(InsightError::insufficient(
                "bedtime main-sleep nights",
                config.min_nights,
                ranked.len(),
            ));
        }

        let all_quality = mean(&ranked.iter().map(|r| r.quality.score).collect::<Vec<_>>());
        let all_hours = mean(&ranked.iter().map(|r| r.quality.sleep_hours).collect::<Vec<_>>());
        let weekday_quality = weekday_quality(&ranked);

        // Stable sort keeps earlier nights first among equal scores
        ranked.sort_by(|a, b| b.quality.score.total_cmp(&a.quality.score));
        let best_count = ((ranked.len() as f64 * config.top_fraction) as usize).max(1);
        let best = &ranked[..best_count];

        let bedtimes: Vec<f64> = best
            .iter()
            .map(|r| after_noon(ClockTime::of(&r.session.start_time)))
            .collect();
        let bedtime_mean = mean(&bedtimes);
        let spread = if bedtimes.len() > 1 {
            sample_std_dev(&bedtimes, bedtime_mean)
        } else {
            config.default_spread_minutes
        };
        let bedtime_consistency = if bedtimes.len() > 1 {
            (100.0 - (spread - CONSISTENT_SPREAD_MINUTES) * 100.0 / CONSISTENCY_FALLOFF_MINUTES)
                .clamp(0.0, 100.0)
        } else {
            100.0
        };

        let optimal_bedtime = from_after_noon(bedtime_mean);
        let best_hours = mean(&best.iter().map(|r| r.quality.sleep_hours).collect::<Vec<_>>());
        let best_mean_quality = mean(&best.iter().map(|r| r.quality.score).collect::<Vec<_>>());
        let recommended_wake_time = config.target_wake_time.unwrap_or_else(|| {
            circular_mean(best.iter().map(|r| ClockTime::of(&r.session.end_time))).0
        });

        debug!(
            nights = ranked.len(),
            best = best_count,
            bedtime = %optimal_bedtime,
            spread_minutes = spread,
            "recommended bedtime"
        );

        Ok(BedtimeRecommendation {
            optimal_bedtime,
            bedtime_window: TimeWindow {
                start: from_after_noon(bedtime_mean - spread),
                end: from_after_noon(bedtime_mean + spread),
            },
            optimal_duration_hours: best_hours,
            recommended_wake_time,
            sleep_window: TimeWindow {
                start: optimal_bedtime,
                end: ClockTime::from_minutes(optimal_bedtime.minutes() + best_hours * 60.0),
            },
            bedtime_consistency,
            best_nights: best_count,
            nights_analyzed: ranked.len(),
            best_mean_quality,
            quality_gain: best_mean_quality - all_quality,
            duration_difference_hours: best_hours - all_hours,
            weekday_quality,
        })
    }

    /// Composite quality of one main sleep
    ///
    /// Efficiency 25%, duration against personal need 20%, deep share 20%
    /// (ideal 15-20%) and REM share 20% (ideal 20-25%). Without stage data the
    /// stage terms are dropped and the rest renormalized.
    pub fn night_quality(
        date: NaiveDate,
        session: &SleepSession,
        need: &PersonalSleepNeed,
    ) -> NightQuality {
        let asleep = session.sleep_minutes();
        let sleep_hours = asleep / 60.0;
        let duration = 100.0 * (1.0 - (sleep_hours - need.hours).abs() / need.hours);

        let mut terms = vec![
            (0.25, session.efficiency),
            (0.20, duration),
        ];
        let staged = session.stages.asleep_minutes();
        if staged > 0.0 {
            let deep_pct = session.stages.deep_minutes / staged * 100.0;
            let rem_pct = session.stages.rem_minutes / staged * 100.0;
            terms.push((0.20, stage_share_score(deep_pct, 15.0, 20.0)));
            terms.push((0.20, stage_share_score(rem_pct, 20.0, 25.0)));
        }

        let total: f64 = terms.iter().map(|(w, _)| w).sum();
        let score = terms
            .iter()
            .map(|(w, v)| w * v.clamp(0.0, 100.0))
            .sum::<f64>()
            / total;

        NightQuality {
            date,
            score,
            sleep_hours,
        }
    }
}

/// Full marks inside the ideal band, three points lost per percent from its centre
fn stage_share_score(pct: f64, low: f64, high: f64) -> f64 {
    if (low..=high).contains(&pct) {
        100.0
    } else {
        100.0 - (pct - (low + high) / 2.0).abs() * 3.0
    }
}

fn weekday_quality(nights: &[RankedNight]) -> Vec<WeekdayQuality> {
    let mut by_day: [Vec<f64>; 7] = Default::default();
    for night in nights {
        let weekday = night.session.start_time.weekday();
        by_day[weekday.num_days_from_monday() as usize].push(night.quality.score);
    }
    let mut weekday = Weekday::Mon;
    let mut out = Vec::new();
    for scores in &by_day {
        if !scores.is_empty() {
            out.push(WeekdayQuality {
                weekday,
                mean_quality: mean(scores),
                nights: scores.len(),
            });
        }
        weekday = weekday.succ();
    }
    out
}

/// Minutes since noon, so that the night is contiguous
pub(crate) fn after_noon(time: ClockTime) -> f64 {
    (time.minutes() - NOON_MINUTES).rem_euclid(MINUTES_PER_DAY)
}

fn from_after_noon(minutes: f64) -> ClockTime {
    ClockTime::from_minutes(minutes + NOON_MINUTES)
}
