//! Chronotype classification
//!
//! Uses mid-sleep on free days (MSF) from main-sleep sessions only. Naps never
//! enter these statistics. Clock times are averaged on the circle so that
//! 23:30 and 00:30 average to midnight, not noon.

use crate::config::{ChronotypeConfig, MsfBands};
use crate::error::InsightError;
use crate::types::{ClockTime, DayType, NightlyAggregate, MINUTES_PER_DAY};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chronotype {
    ExtremeLark,
    Lark,
    Intermediate,
    Owl,
    ExtremeOwl,
}

impl Chronotype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chronotype::ExtremeLark => "extreme_lark",
            Chronotype::Lark => "lark",
            Chronotype::Intermediate => "intermediate",
            Chronotype::Owl => "owl",
            Chronotype::ExtremeOwl => "extreme_owl",
        }
    }

    /// Band for a mid-sleep clock time
    pub fn from_msf(msf: ClockTime, bands: &MsfBands) -> Self {
        let t = noon_shifted(msf.hours());
        if t < noon_shifted(bands.extreme_lark_before) {
            Chronotype::ExtremeLark
        } else if t < noon_shifted(bands.lark_before) {
            Chronotype::Lark
        } else if t <= noon_shifted(bands.intermediate_until) {
            Chronotype::Intermediate
        } else if t <= noon_shifted(bands.owl_until) {
            Chronotype::Owl
        } else {
            Chronotype::ExtremeOwl
        }
    }

    pub fn recommendation(&self) -> ChronotypeRecommendation {
        let (training, focus) = match self {
            Chronotype::ExtremeLark => ((6, 9), (7, 11)),
            Chronotype::Lark => ((7, 10), (8, 12)),
            Chronotype::Intermediate => ((11, 14), (9, 13)),
            Chronotype::Owl => ((16, 19), (12, 16)),
            Chronotype::ExtremeOwl => ((18, 21), (15, 19)),
        };
        ChronotypeRecommendation {
            key: self.as_str().to_string(),
            training_window: TimeWindow::hours(training.0, training.1),
            focus_window: TimeWindow::hours(focus.0, focus.1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl TimeWindow {
    fn hours(start: u32, end: u32) -> Self {
        Self {
            start: ClockTime::from_hm(start, 0),
            end: ClockTime::from_hm(end, 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChronotypeRecommendation {
    /// Text key the presentation layer maps to advice
    pub key: String,
    pub training_window: TimeWindow,
    pub focus_window: TimeWindow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChronotypeResult {
    /// Mid-sleep on free days
    pub msf: ClockTime,
    /// MSF corrected for catch-up sleep on free days
    pub msf_sleep_corrected: ClockTime,
    /// Mid-sleep on workdays
    pub msw: ClockTime,
    pub social_jetlag_hours: f64,
    pub category: Chronotype,
    pub average_bedtime: ClockTime,
    pub average_wake_time: ClockTime,
    /// Mean resultant length of mid-sleep times, 1.0 means identical every night
    pub timing_consistency: f64,
    pub workday_nights: usize,
    pub free_day_nights: usize,
    pub recommendation: ChronotypeRecommendation,
}

/// Classifies circadian type from main-sleep timing
pub struct ChronotypeAnalyzer;

impl ChronotypeAnalyzer {
    /// Classify, tagging nights with the configured weekly schedule
    pub fn analyze(
        nights: &[NightlyAggregate],
        config: &ChronotypeConfig,
    ) -> Result<ChronotypeResult, InsightError> {
        let tagged: Vec<(&NightlyAggregate, DayType)> = nights
            .iter()
            .map(|n| (n, config.schedule.day_type(n.date)))
            .collect();
        Self::analyze_tagged(&tagged, config)
    }

    /// Classify nights whose day type is supplied by the caller
    pub fn analyze_tagged(
        nights: &[(&NightlyAggregate, DayType)],
        config: &ChronotypeConfig,
    ) -> Result<ChronotypeResult, InsightError> {
        let mut free = Vec::new();
        let mut work = Vec::new();
        for (night, day_type) in nights {
            // nights with only naps carry no timing information
            let Ok(main) = night.main_sleep() else {
                continue;
            };
            let timing = MainSleepTiming {
                bedtime: ClockTime::of(&main.start_time),
                wake_time: ClockTime::of(&main.end_time),
                midpoint: ClockTime::of(&main.midpoint()),
                duration_hours: main.duration_minutes() / 60.0,
            };
            match day_type {
                DayType::FreeDay => free.push(timing),
                DayType::Workday => work.push(timing),
            }
        }

        let required = config.min_nights_per_day_type;
        if free.len() < required {
            return Err(InsightError::insufficient("chronotype free-day nights", required, free.len()));
        }
        if work.len() < required {
            return Err(InsightError::insufficient("chronotype workday nights", required, work.len()));
        }

        let (msf, _) = circular_mean(free.iter().map(|t| t.midpoint));
        let (msw, _) = circular_mean(work.iter().map(|t| t.midpoint));

        let free_duration = mean_duration(&free);
        let week_duration = mean_duration(free.iter().chain(work.iter()));
        let msf_sleep_corrected = if free_duration > week_duration {
            ClockTime::from_minutes(msf.minutes() - (free_duration - week_duration) * 30.0)
        } else {
            msf
        };

        let social_jetlag_hours =
            (clock_distance(msf, msw) / 60.0).min(config.social_jetlag_cap_hours);
        let category = Chronotype::from_msf(msf_sleep_corrected, &config.bands);

        let all = || free.iter().chain(work.iter());
        let (average_bedtime, _) = circular_mean(all().map(|t| t.bedtime));
        let (average_wake_time, _) = circular_mean(all().map(|t| t.wake_time));
        let (_, timing_consistency) = circular_mean(all().map(|t| t.midpoint));

        debug!(
            msf = %msf,
            msf_sc = %msf_sleep_corrected,
            msw = %msw,
            social_jetlag_hours,
            category = category.as_str(),
            "classified chronotype"
        );

        Ok(ChronotypeResult {
            msf,
            msf_sleep_corrected,
            msw,
            social_jetlag_hours,
            category,
            average_bedtime,
            average_wake_time,
            timing_consistency,
            workday_nights: work.len(),
            free_day_nights: free.len(),
            recommendation: category.recommendation(),
        })
    }
}

struct MainSleepTiming {
    bedtime: ClockTime,
    wake_time: ClockTime,
    midpoint: ClockTime,
    duration_hours: f64,
}

fn mean_duration<'a>(timings: impl IntoIterator<Item = &'a MainSleepTiming>) -> f64 {
    let (sum, n) = timings
        .into_iter()
        .fold((0.0, 0usize), |(s, n), t| (s + t.duration_hours, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Circular mean of clock times and the mean resultant length (0..=1)
pub fn circular_mean(times: impl IntoIterator<Item = ClockTime>) -> (ClockTime, f64) {
    let (mut s, mut c, mut n) = (0.0, 0.0, 0usize);
    for t in times {
        let angle = t.minutes() / MINUTES_PER_DAY * TAU;
        s += angle.sin();
        c += angle.cos();
        n += 1;
    }
    if n == 0 {
        return (ClockTime::from_minutes(0.0), 0.0);
    }
    let (s, c) = (s / n as f64, c / n as f64);
    let mean = s.atan2(c).rem_euclid(TAU) / TAU * MINUTES_PER_DAY;
    (ClockTime::from_minutes(mean), s.hypot(c).min(1.0))
}

/// Shortest distance around the clock, in minutes
fn clock_distance(a: ClockTime, b: ClockTime) -> f64 {
    let d = (a.minutes() - b.minutes()).abs();
    d.min(MINUTES_PER_DAY - d)
}

/// Hours since noon, so that the night is contiguous
fn noon_shifted(hours: f64) -> f64 {
    (hours - 12.0).rem_euclid(24.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::SleepAggregator;
    use crate::config::AggregationConfig;
    use crate::types::{SessionKind, SleepSession, SleepStages};
    use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};

    fn make_session(start: NaiveDateTime, minutes: i64, kind: SessionKind) -> SleepSession {
        SleepSession {
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            kind,
            stages: SleepStages {
                light_minutes: minutes as f64 * 0.9,
                ..Default::default()
            },
            efficiency: 90.0,
            score: None,
            respiratory_rate: None,
        }
    }

    /// Four weeks of nights, bedtimes given as (hour, minute, minutes asleep)
    fn make_sessions(work: (u32, u32, i64), free: (u32, u32, i64), with_naps: bool) -> Vec<SleepSession> {
        let first_wake = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let mut sessions = Vec::new();
        for i in 0..28 {
            let wake = first_wake + Duration::days(i);
            let is_free = matches!(wake.weekday(), Weekday::Sat | Weekday::Sun);
            let (h, m, minutes) = if is_free { free } else { work };
            let bed_day = if h >= 12 { wake - Duration::days(1) } else { wake };
            let start = bed_day.and_hms_opt(h, m, 0).unwrap();
            sessions.push(make_session(start, minutes, SessionKind::Main));
            if with_naps {
                let nap = wake.and_hms_opt(13, 0, 0).unwrap();
                sessions.push(make_session(nap, 30, SessionKind::Nap));
            }
        }
        sessions
    }

    fn analyze(sessions: &[SleepSession]) -> Result<ChronotypeResult, InsightError> {
        let nights = SleepAggregator::aggregate(sessions, &AggregationConfig::default());
        ChronotypeAnalyzer::analyze(&nights, &ChronotypeConfig::default())
    }

    #[test]
    fn test_bedtime_uses_main_sleep_only() {
        let result = analyze(&make_sessions((23, 0, 420), (23, 0, 420), true)).unwrap();
        assert_eq!(result.average_bedtime.to_string(), "23:00");
        assert_eq!(result.average_wake_time.to_string(), "06:00");
        assert!((result.timing_consistency - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_naps_do_not_change_classification() {
        let plain = analyze(&make_sessions((23, 0, 420), (0, 30, 480), false)).unwrap();
        let napped = analyze(&make_sessions((23, 0, 420), (0, 30, 480), true)).unwrap();
        assert_eq!(plain, napped);
    }

    #[test]
    fn test_late_free_days_classify_owl_with_jetlag() {
        // workdays 23:00-07:00 (mid 03:00), free days 01:30-09:30 (mid 05:30)
        let result = analyze(&make_sessions((23, 0, 480), (1, 30, 480), false)).unwrap();
        assert_eq!(result.msf.to_string(), "05:30");
        assert_eq!(result.msw.to_string(), "03:00");
        assert!((result.social_jetlag_hours - 2.5).abs() < 0.01);
        assert_eq!(result.category, Chronotype::Owl);
        assert_eq!(result.recommendation.key, "owl");
        assert_eq!(result.free_day_nights, 8);
        assert_eq!(result.workday_nights, 20);
    }

    #[test]
    fn test_early_sleeper_is_lark() {
        // 22:30-06:30 every night, mid 02:30
        let result = analyze(&make_sessions((22, 30, 480), (22, 30, 480), false)).unwrap();
        assert_eq!(result.category, Chronotype::Lark);
        assert!(result.social_jetlag_hours.abs() < 0.01);
    }

    #[test]
    fn test_mid_sleep_before_midnight_is_extreme_lark() {
        // 20:00-03:00, mid 23:30
        let result = analyze(&make_sessions((20, 0, 420), (20, 0, 420), false)).unwrap();
        assert_eq!(result.msf.to_string(), "23:30");
        assert_eq!(result.category, Chronotype::ExtremeLark);
    }

    #[test]
    fn test_social_jetlag_is_capped() {
        // mid 03:00 on workdays, 09:00 on free days
        let result = analyze(&make_sessions((23, 0, 480), (5, 0, 480), false)).unwrap();
        assert!((result.social_jetlag_hours - 4.0).abs() < 1e-9);
        assert_eq!(result.category, Chronotype::ExtremeOwl);
    }

    #[test]
    fn test_free_day_oversleep_corrects_msf_earlier() {
        // free days 00:00-10:00 (mid 05:00, 10 h), workdays 23:00-06:00 (7 h)
        let result = analyze(&make_sessions((23, 0, 420), (0, 0, 600), false)).unwrap();
        assert!(result.msf_sleep_corrected.minutes() < result.msf.minutes());
        assert_eq!(result.msf.to_string(), "05:00");
    }

    #[test]
    fn test_too_few_free_nights_is_insufficient() {
        let sessions: Vec<SleepSession> = make_sessions((23, 0, 420), (23, 0, 420), false)
            .into_iter()
            .take(7)
            .collect();
        let result = analyze(&sessions);
        assert!(matches!(
            result,
            Err(InsightError::InsufficientData { required: 5, found: 2, .. })
        ));
    }

    #[test]
    fn test_circular_mean_wraps_midnight() {
        let (mean, r) = circular_mean([ClockTime::from_hm(23, 30), ClockTime::from_hm(0, 30)]);
        assert_eq!(mean.to_string(), "00:00");
        assert!(r > 0.99);
    }
}
