//! Nightly sleep aggregation
//!
//! Collapses raw sleep sessions (naps, biphasic splits) into one aggregate per
//! night and picks the main sleep. A night is keyed by its wake-up date `D`
//! and collects every session whose midpoint falls in the 24 hours starting at
//! the nocturnal start hour on `D - 1`.

use crate::config::AggregationConfig;
use crate::types::{NightlyAggregate, SessionKind, SleepSession};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;
use tracing::debug;

/// Groups sessions into nights and identifies main sleep
pub struct SleepAggregator;

impl SleepAggregator {
    /// Aggregate sessions into nights, ascending by date
    pub fn aggregate(sessions: &[SleepSession], config: &AggregationConfig) -> Vec<NightlyAggregate> {
        let mut nights: BTreeMap<NaiveDate, Vec<SleepSession>> = BTreeMap::new();
        for session in sessions {
            if session.end_time <= session.start_time {
                debug!(start = %session.start_time, "skipping session with non-positive duration");
                continue;
            }
            nights
                .entry(Self::night_of(session, config))
                .or_default()
                .push(session.clone());
        }

        nights
            .into_iter()
            .map(|(date, sessions)| Self::aggregate_night(date, sessions, config))
            .collect()
    }

    /// Wake-up date of the night `session` belongs to
    pub fn night_of(session: &SleepSession, config: &AggregationConfig) -> NaiveDate {
        let shift = Duration::hours(24 - i64::from(config.nocturnal_start_hour));
        (session.midpoint() + shift).date()
    }

    /// Canonical nocturnal window for the night ending on `date`
    pub fn nocturnal_window(
        date: NaiveDate,
        config: &AggregationConfig,
    ) -> (NaiveDateTime, NaiveDateTime) {
        let start = (date - Duration::days(1)).and_time(hour(config.nocturnal_start_hour));
        let end = date.and_time(hour(config.nocturnal_end_hour));
        (start, end)
    }

    /// Build one night from the sessions assigned to it
    pub fn aggregate_night(
        date: NaiveDate,
        mut sessions: Vec<SleepSession>,
        config: &AggregationConfig,
    ) -> NightlyAggregate {
        sessions.sort_by_key(|s| s.start_time);
        let window = Self::nocturnal_window(date, config);

        let main_index = sessions
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                s.kind == SessionKind::Main || s.duration_minutes() >= config.min_main_sleep_minutes
            })
            .map(|(i, s)| (i, overlap_minutes(s, window), s.duration_minutes()))
            .filter(|(_, overlap, _)| *overlap > 0.0)
            .max_by(|a, b| a.1.total_cmp(&b.1).then(a.2.total_cmp(&b.2)))
            .map(|(i, _, _)| i);

        let total_sleep_minutes: f64 = sessions.iter().map(SleepSession::sleep_minutes).sum();
        let time_in_bed_minutes: f64 = sessions.iter().map(SleepSession::duration_minutes).sum();
        let efficiency = (time_in_bed_minutes > 0.0)
            .then(|| (total_sleep_minutes / time_in_bed_minutes * 100.0).min(100.0));

        let main_sleep = main_index.map(|i| sessions.remove(i));
        if main_sleep.is_none() {
            debug!(%date, sessions = sessions.len(), "no session qualifies as main sleep");
        }

        NightlyAggregate {
            date,
            main_sleep,
            naps: sessions,
            total_sleep_minutes,
            time_in_bed_minutes,
            efficiency,
        }
    }
}

fn hour(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h.min(23), 0, 0).unwrap_or_default()
}

fn overlap_minutes(session: &SleepSession, window: (NaiveDateTime, NaiveDateTime)) -> f64 {
    let start = session.start_time.max(window.0);
    let end = session.end_time.min(window.1);
    if end > start {
        (end - start).num_seconds() as f64 / 60.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InsightError;
    use crate::types::SleepStages;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn make_session(start: NaiveDateTime, minutes: i64, kind: SessionKind) -> SleepSession {
        SleepSession {
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            kind,
            stages: SleepStages {
                deep_minutes: minutes as f64 * 0.2,
                rem_minutes: minutes as f64 * 0.2,
                light_minutes: minutes as f64 * 0.5,
                awake_minutes: minutes as f64 * 0.1,
            },
            efficiency: 90.0,
            score: Some(80.0),
            respiratory_rate: Some(14.5),
        }
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        day(d).and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_main_sleep_and_afternoon_nap_share_a_night() {
        let sessions = vec![
            make_session(at(1, 23, 0), 420, SessionKind::Main),
            make_session(at(2, 13, 0), 30, SessionKind::Nap),
        ];
        let nights = SleepAggregator::aggregate(&sessions, &AggregationConfig::default());

        assert_eq!(nights.len(), 1);
        let night = &nights[0];
        assert_eq!(night.date, day(2));
        assert_eq!(night.main_sleep().unwrap().start_time, at(1, 23, 0));
        assert_eq!(night.naps.len(), 1);
        assert!((night.total_sleep_minutes - 450.0 * 0.9).abs() < 0.001);
    }

    #[test]
    fn test_nap_does_not_change_main_sleep() {
        let config = AggregationConfig::default();
        let main = make_session(at(1, 23, 0), 420, SessionKind::Main);
        let without = SleepAggregator::aggregate(std::slice::from_ref(&main), &config);
        let with = SleepAggregator::aggregate(
            &[main.clone(), make_session(at(2, 13, 0), 30, SessionKind::Nap)],
            &config,
        );

        let a = without[0].main_sleep().unwrap();
        let b = with[0].main_sleep().unwrap();
        assert_eq!(a.start_time, b.start_time);
        assert!((a.duration_minutes() - b.duration_minutes()).abs() < 1e-9);
    }

    #[test]
    fn test_nap_only_night_has_no_main_sleep() {
        let sessions = vec![make_session(at(2, 14, 0), 40, SessionKind::Nap)];
        let nights = SleepAggregator::aggregate(&sessions, &AggregationConfig::default());

        assert!(matches!(
            nights[0].main_sleep(),
            Err(InsightError::NoMainSleepIdentified(d)) if d == day(2)
        ));
        assert!((nights[0].nap_minutes() - 36.0).abs() < 0.001);
    }

    #[test]
    fn test_biphasic_night_picks_largest_overlap() {
        // 21:00-00:30 and 03:00-07:30, both untagged
        let sessions = vec![
            make_session(at(1, 21, 0), 210, SessionKind::Nap),
            make_session(at(2, 3, 0), 270, SessionKind::Nap),
        ];
        let nights = SleepAggregator::aggregate(&sessions, &AggregationConfig::default());

        assert_eq!(nights.len(), 1);
        assert_eq!(nights[0].main_sleep().unwrap().start_time, at(2, 3, 0));
        assert_eq!(nights[0].session_count(), 2);
    }

    #[test]
    fn test_overlap_tie_broken_by_duration() {
        // 16:00-21:00 is clipped to three hours by the window opening at 18:00
        let config = AggregationConfig::default();
        let early = make_session(at(1, 16, 0), 300, SessionKind::Main);
        let late = make_session(at(2, 2, 0), 180, SessionKind::Main);
        let night = SleepAggregator::aggregate_night(day(2), vec![late, early], &config);

        assert_eq!(night.main_sleep().unwrap().start_time, at(1, 16, 0));
    }

    #[test]
    fn test_efficiency_recomputed_from_totals() {
        let mut session = make_session(at(1, 23, 0), 480, SessionKind::Main);
        session.stages = SleepStages {
            deep_minutes: 90.0,
            rem_minutes: 90.0,
            light_minutes: 240.0,
            awake_minutes: 60.0,
        };
        session.efficiency = 50.0;
        let nights = SleepAggregator::aggregate(&[session], &AggregationConfig::default());

        assert!((nights[0].efficiency.unwrap() - 87.5).abs() < 0.001);
    }
}
