//! Oura cloud adapter
//!
//! Parses an export of the Oura v2 `usercollection` documents and maps them
//! to daily records and sleep sessions. Each collection may be given either
//! as a bare array or as the API's `{ "data": [...] }` page.

use crate::error::InsightError;
use crate::pipeline::HealthSnapshot;
use crate::types::{
    Availability, DailyMetricRecord, DailyTag, DatedValue, SessionKind, SleepSession, SleepStages,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::RecordAdapter;

/// Oura payload adapter
pub struct OuraAdapter;

impl RecordAdapter for OuraAdapter {
    fn parse(&self, raw_json: &str) -> Result<HealthSnapshot, InsightError> {
        let payload: OuraPayload = serde_json::from_str(raw_json)?;

        // Group daily documents by date
        let mut by_date: BTreeMap<NaiveDate, DailyMetricRecord> = BTreeMap::new();

        for doc in payload.daily_sleep.into_vec() {
            let date = parse_day(&doc.day)?;
            let record = by_date
                .entry(date)
                .or_insert_with(|| DailyMetricRecord::new(date));
            record.sleep_score = record.sleep_score.or(doc.score);
            merge_contributors(record, "sleep", doc.contributors);
        }

        for doc in payload.daily_readiness.into_vec() {
            let date = parse_day(&doc.day)?;
            let record = by_date
                .entry(date)
                .or_insert_with(|| DailyMetricRecord::new(date));
            record.readiness_score = record.readiness_score.or(doc.score);
            record.temperature_deviation = record.temperature_deviation.or(doc.temperature_deviation);
            record.hrv_balance = record
                .hrv_balance
                .or(doc.contributors.get("hrv_balance").copied().flatten());
            record.resting_heart_rate_score = record
                .resting_heart_rate_score
                .or(doc.contributors.get("resting_heart_rate").copied().flatten());
            merge_contributors(record, "readiness", doc.contributors);
        }

        for doc in payload.daily_activity.into_vec() {
            let date = parse_day(&doc.day)?;
            let record = by_date
                .entry(date)
                .or_insert_with(|| DailyMetricRecord::new(date));
            record.activity_score = record.activity_score.or(doc.score);
            merge_contributors(record, "activity", doc.contributors);
        }

        let daily_sleep_scores: BTreeMap<NaiveDate, f64> = by_date
            .iter()
            .filter_map(|(date, r)| r.sleep_score.map(|s| (*date, s)))
            .collect();

        let mut sessions = Vec::new();
        for doc in payload.sleep.into_vec() {
            match convert_session(&doc, &daily_sleep_scores) {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => debug!(id = ?doc.id, "skipped sleep document without timing"),
                Err(e) => {
                    warn!(id = ?doc.id, error = %e, "rejected sleep document");
                    return Err(e);
                }
            }
        }

        let vo2_max = match payload.vo2_max {
            Some(collection) => {
                let mut values = Vec::new();
                for doc in collection.into_vec() {
                    if let Some(value) = doc.vo2_max {
                        values.push(DatedValue {
                            date: parse_day(&doc.day)?,
                            value,
                        });
                    }
                }
                values.sort_by_key(|v| v.date);
                Availability::Available { value: values }
            }
            None => Availability::NotAvailable {
                reason: "vo2_max collection absent from payload".to_string(),
            },
        };

        let mut tags = Vec::new();
        for doc in payload.tag.into_vec() {
            let date = parse_day(&doc.day)?;
            tags.extend(doc.tags.iter().map(|t| DailyTag::new(date, t)));
            if let Some(text) = &doc.text {
                tags.push(DailyTag::new(date, text));
            }
        }

        debug!(
            days = by_date.len(),
            sessions = sessions.len(),
            tags = tags.len(),
            "parsed oura payload"
        );

        Ok(HealthSnapshot::new(by_date.into_values().collect(), sessions, vo2_max).with_tags(tags))
    }
}

/// Contributors keep the collection as a prefix so that "efficiency" from the
/// sleep document and any same-named readiness field stay distinct
fn merge_contributors(
    record: &mut DailyMetricRecord,
    prefix: &str,
    contributors: BTreeMap<String, Option<f64>>,
) {
    for (name, value) in contributors {
        if let Some(value) = value {
            record
                .contributors
                .entry(format!("{}_{}", prefix, name))
                .or_insert(value);
        }
    }
}

fn convert_session(
    doc: &OuraSleep,
    daily_sleep_scores: &BTreeMap<NaiveDate, f64>,
) -> Result<Option<SleepSession>, InsightError> {
    let (Some(start), Some(end)) = (&doc.bedtime_start, &doc.bedtime_end) else {
        return Ok(None);
    };
    let start_time = parse_local_time(start)?;
    let end_time = parse_local_time(end)?;

    let kind = match doc.kind.as_deref() {
        Some("long_sleep") => SessionKind::Main,
        _ => SessionKind::Nap,
    };

    let stages = SleepStages {
        deep_minutes: seconds_to_minutes(doc.deep_sleep_duration),
        rem_minutes: seconds_to_minutes(doc.rem_sleep_duration),
        light_minutes: seconds_to_minutes(doc.light_sleep_duration),
        awake_minutes: seconds_to_minutes(doc.awake_time),
    };

    // Session documents carry no score of their own; the main sleep takes
    // the day's sleep score
    let score = match (doc.score, kind) {
        (Some(score), _) => Some(score),
        (None, SessionKind::Main) => match &doc.day {
            Some(day) => daily_sleep_scores.get(&parse_day(day)?).copied(),
            None => None,
        },
        (None, SessionKind::Nap) => None,
    };

    let in_bed = (end_time - start_time).num_seconds() as f64 / 60.0;
    let efficiency = doc.efficiency.unwrap_or_else(|| {
        let asleep = doc
            .total_sleep_duration
            .map(|s| s / 60.0)
            .unwrap_or_else(|| stages.asleep_minutes());
        if in_bed > 0.0 {
            (asleep / in_bed * 100.0).min(100.0)
        } else {
            0.0
        }
    });

    Ok(Some(SleepSession {
        start_time,
        end_time,
        kind,
        stages,
        efficiency,
        score: score.filter(|s| *s > 0.0),
        respiratory_rate: doc.average_breath,
    }))
}

fn seconds_to_minutes(seconds: Option<f64>) -> f64 {
    seconds.map(|s| s / 60.0).unwrap_or(0.0)
}

fn parse_day(day: &str) -> Result<NaiveDate, InsightError> {
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| InsightError::DateParseError(format!("{}: {}", day, e)))
}

/// Parse a timestamp to local wall-clock time, dropping any UTC offset
fn parse_local_time(value: &str) -> Result<NaiveDateTime, InsightError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_local());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|e| InsightError::DateParseError(format!("{}: {}", value, e)))
}

// Oura API structures

#[derive(Debug, Deserialize)]
struct OuraPayload {
    #[serde(default)]
    daily_sleep: Collection<OuraDailySleep>,
    #[serde(default)]
    daily_readiness: Collection<OuraDailyReadiness>,
    #[serde(default)]
    daily_activity: Collection<OuraDailyActivity>,
    #[serde(default)]
    sleep: Collection<OuraSleep>,
    vo2_max: Option<Collection<OuraVo2Max>>,
    #[serde(default)]
    tag: Collection<OuraTag>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Collection<T> {
    Page { data: Vec<T> },
    List(Vec<T>),
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Collection::List(Vec::new())
    }
}

impl<T> Collection<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Collection::Page { data } => data,
            Collection::List(items) => items,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OuraDailySleep {
    day: String,
    score: Option<f64>,
    #[serde(default)]
    contributors: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct OuraDailyReadiness {
    day: String,
    score: Option<f64>,
    temperature_deviation: Option<f64>,
    #[serde(default)]
    contributors: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct OuraDailyActivity {
    day: String,
    score: Option<f64>,
    #[serde(default)]
    contributors: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct OuraSleep {
    id: Option<String>,
    day: Option<String>,
    bedtime_start: Option<String>,
    bedtime_end: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    total_sleep_duration: Option<f64>,
    deep_sleep_duration: Option<f64>,
    rem_sleep_duration: Option<f64>,
    light_sleep_duration: Option<f64>,
    awake_time: Option<f64>,
    efficiency: Option<f64>,
    average_breath: Option<f64>,
    score: Option<f64>,
}

/// Tag codes arrive in `tags`; free-text notes in `text`
#[derive(Debug, Deserialize)]
struct OuraTag {
    day: String,
    #[serde(default)]
    tags: Vec<String>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OuraVo2Max {
    day: String,
    vo2_max: Option<f64>,
}
