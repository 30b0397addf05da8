//! Core types for the Synheart Insight engine
//!
//! This module defines the values that flow between analysis stages: daily
//! metric records and raw sleep sessions on the way in, nightly aggregates and
//! dated series in between. Every value is constructed once and never mutated
//! by a later stage.

use crate::error::InsightError;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const MINUTES_PER_DAY: f64 = 1440.0;

/// Named metric that can be baselined, correlated or forecast
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    SleepScore,
    ReadinessScore,
    ActivityScore,
    HrvBalance,
    /// 0-100 score, higher means a calmer resting heart rate
    RestingHeartRateScore,
    /// Degrees Celsius relative to the wearable's own reference
    TemperatureDeviation,
    TotalSleepHours,
    MainSleepHours,
    SleepEfficiency,
    DeepSleepMinutes,
    RemSleepMinutes,
    RespiratoryRate,
    Vo2Max,
    /// Named sub-score from a daily record's contributor map
    Contributor(String),
}

impl Metric {
    /// Daily metrics carried directly on a `DailyMetricRecord`
    pub const DAILY: [Metric; 6] = [
        Metric::SleepScore,
        Metric::ReadinessScore,
        Metric::ActivityScore,
        Metric::HrvBalance,
        Metric::RestingHeartRateScore,
        Metric::TemperatureDeviation,
    ];

    pub fn name(&self) -> String {
        match self {
            Metric::SleepScore => "sleep_score".to_string(),
            Metric::ReadinessScore => "readiness_score".to_string(),
            Metric::ActivityScore => "activity_score".to_string(),
            Metric::HrvBalance => "hrv_balance".to_string(),
            Metric::RestingHeartRateScore => "resting_heart_rate_score".to_string(),
            Metric::TemperatureDeviation => "temperature_deviation".to_string(),
            Metric::TotalSleepHours => "total_sleep_hours".to_string(),
            Metric::MainSleepHours => "main_sleep_hours".to_string(),
            Metric::SleepEfficiency => "sleep_efficiency".to_string(),
            Metric::DeepSleepMinutes => "deep_sleep_minutes".to_string(),
            Metric::RemSleepMinutes => "rem_sleep_minutes".to_string(),
            Metric::RespiratoryRate => "respiratory_rate".to_string(),
            Metric::Vo2Max => "vo2_max".to_string(),
            Metric::Contributor(name) => format!("contributor:{}", name),
        }
    }

    /// Nightly aggregate metrics used for baselines
    pub const NIGHTLY: [Metric; 6] = [
        Metric::TotalSleepHours,
        Metric::MainSleepHours,
        Metric::SleepEfficiency,
        Metric::DeepSleepMinutes,
        Metric::RemSleepMinutes,
        Metric::RespiratoryRate,
    ];

    /// Whether the metric is read from nightly aggregates rather than daily records
    pub fn is_nightly(&self) -> bool {
        matches!(
            self,
            Metric::TotalSleepHours
                | Metric::MainSleepHours
                | Metric::SleepEfficiency
                | Metric::DeepSleepMinutes
                | Metric::RemSleepMinutes
                | Metric::RespiratoryRate
        )
    }

    /// Valid value range, used to clamp forecasts
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match self {
            Metric::SleepScore
            | Metric::ReadinessScore
            | Metric::ActivityScore
            | Metric::HrvBalance
            | Metric::RestingHeartRateScore
            | Metric::SleepEfficiency
            | Metric::Contributor(_) => Some((0.0, 100.0)),
            Metric::TotalSleepHours | Metric::MainSleepHours => Some((0.0, 24.0)),
            Metric::DeepSleepMinutes | Metric::RemSleepMinutes => Some((0.0, MINUTES_PER_DAY)),
            Metric::RespiratoryRate | Metric::Vo2Max => Some((0.0, f64::MAX)),
            Metric::TemperatureDeviation => None,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Metric {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(name) = s.strip_prefix("contributor:") {
            return Ok(Metric::Contributor(name.to_string()));
        }
        let metric = match s {
            "sleep_score" => Metric::SleepScore,
            "readiness_score" => Metric::ReadinessScore,
            "activity_score" => Metric::ActivityScore,
            "hrv_balance" => Metric::HrvBalance,
            "resting_heart_rate_score" => Metric::RestingHeartRateScore,
            "temperature_deviation" => Metric::TemperatureDeviation,
            "total_sleep_hours" => Metric::TotalSleepHours,
            "main_sleep_hours" => Metric::MainSleepHours,
            "sleep_efficiency" => Metric::SleepEfficiency,
            "deep_sleep_minutes" => Metric::DeepSleepMinutes,
            "rem_sleep_minutes" => Metric::RemSleepMinutes,
            "respiratory_rate" => Metric::RespiratoryRate,
            "vo2_max" => Metric::Vo2Max,
            other => return Err(InsightError::ParseError(format!("unknown metric '{}'", other))),
        };
        Ok(metric)
    }
}

/// Anything that exposes dated metric values
pub trait MetricSource {
    fn date(&self) -> NaiveDate;

    /// Value of `metric` on this date, `None` when not recorded
    fn metric(&self, metric: &Metric) -> Option<f64>;
}

/// One calendar day of summary scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetricRecord {
    pub date: NaiveDate,
    #[serde(default)]
    pub sleep_score: Option<f64>,
    #[serde(default)]
    pub readiness_score: Option<f64>,
    #[serde(default)]
    pub activity_score: Option<f64>,
    #[serde(default)]
    pub hrv_balance: Option<f64>,
    #[serde(default)]
    pub resting_heart_rate_score: Option<f64>,
    #[serde(default)]
    pub temperature_deviation: Option<f64>,
    /// Sub-contributor scores keyed by name (e.g. "deep_sleep", "restfulness")
    #[serde(default)]
    pub contributors: BTreeMap<String, f64>,
}

impl DailyMetricRecord {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            sleep_score: None,
            readiness_score: None,
            activity_score: None,
            hrv_balance: None,
            resting_heart_rate_score: None,
            temperature_deviation: None,
            contributors: BTreeMap::new(),
        }
    }

    /// Fill fields that are unset here from `other` (same date)
    pub fn merge(&mut self, other: DailyMetricRecord) {
        self.sleep_score = self.sleep_score.or(other.sleep_score);
        self.readiness_score = self.readiness_score.or(other.readiness_score);
        self.activity_score = self.activity_score.or(other.activity_score);
        self.hrv_balance = self.hrv_balance.or(other.hrv_balance);
        self.resting_heart_rate_score = self
            .resting_heart_rate_score
            .or(other.resting_heart_rate_score);
        self.temperature_deviation = self.temperature_deviation.or(other.temperature_deviation);
        for (name, value) in other.contributors {
            self.contributors.entry(name).or_insert(value);
        }
    }
}

impl MetricSource for DailyMetricRecord {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn metric(&self, metric: &Metric) -> Option<f64> {
        match metric {
            Metric::SleepScore => normalize_score(self.sleep_score),
            Metric::ReadinessScore => normalize_score(self.readiness_score),
            Metric::ActivityScore => normalize_score(self.activity_score),
            Metric::HrvBalance => self.hrv_balance,
            Metric::RestingHeartRateScore => self.resting_heart_rate_score,
            Metric::TemperatureDeviation => self.temperature_deviation,
            Metric::Contributor(name) => self.contributors.get(name).copied(),
            _ => None,
        }
    }
}

/// Treat a zero score as "not computed" rather than a zero-quality day
pub fn normalize_score(score: Option<f64>) -> Option<f64> {
    score.filter(|s| s.is_finite() && *s > 0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Main,
    Nap,
}

/// Sleep stage durations in minutes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SleepStages {
    #[serde(default)]
    pub deep_minutes: f64,
    #[serde(default)]
    pub rem_minutes: f64,
    #[serde(default)]
    pub light_minutes: f64,
    #[serde(default)]
    pub awake_minutes: f64,
}

impl SleepStages {
    pub fn asleep_minutes(&self) -> f64 {
        self.deep_minutes + self.rem_minutes + self.light_minutes
    }
}

/// A single recorded sleep period, times in local wall-clock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepSession {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub kind: SessionKind,
    #[serde(default)]
    pub stages: SleepStages,
    /// Percentage of time in bed spent asleep (0-100)
    pub efficiency: f64,
    /// Raw score; 0 means the wearable did not compute one
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub respiratory_rate: Option<f64>,
}

impl SleepSession {
    /// Time in bed
    pub fn duration_minutes(&self) -> f64 {
        (self.end_time - self.start_time).num_seconds().max(0) as f64 / 60.0
    }

    /// Time asleep, falling back to efficiency when stages are missing
    pub fn sleep_minutes(&self) -> f64 {
        let staged = self.stages.asleep_minutes();
        if staged > 0.0 {
            staged
        } else {
            self.duration_minutes() * self.efficiency / 100.0
        }
    }

    pub fn midpoint(&self) -> NaiveDateTime {
        self.start_time + (self.end_time - self.start_time) / 2
    }

    pub fn valid_score(&self) -> Option<f64> {
        normalize_score(self.score)
    }
}

/// Sessions collapsed into one night, keyed by wake-up date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NightlyAggregate {
    pub date: NaiveDate,
    pub main_sleep: Option<SleepSession>,
    pub naps: Vec<SleepSession>,
    /// Sleep across all sessions of the night
    pub total_sleep_minutes: f64,
    pub time_in_bed_minutes: f64,
    /// Recomputed as total sleep over time in bed
    pub efficiency: Option<f64>,
}

impl NightlyAggregate {
    pub fn main_sleep(&self) -> Result<&SleepSession, InsightError> {
        self.main_sleep
            .as_ref()
            .ok_or(InsightError::NoMainSleepIdentified(self.date))
    }

    pub fn total_sleep_hours(&self) -> f64 {
        self.total_sleep_minutes / 60.0
    }

    pub fn main_sleep_hours(&self) -> Option<f64> {
        self.main_sleep.as_ref().map(|s| s.sleep_minutes() / 60.0)
    }

    pub fn nap_minutes(&self) -> f64 {
        self.naps.iter().map(SleepSession::sleep_minutes).sum()
    }

    pub fn session_count(&self) -> usize {
        self.naps.len() + usize::from(self.main_sleep.is_some())
    }

    /// Score of the main sleep, `None` for nap-only nights or unset scores
    pub fn score(&self) -> Option<f64> {
        self.main_sleep.as_ref().and_then(SleepSession::valid_score)
    }
}

impl MetricSource for NightlyAggregate {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn metric(&self, metric: &Metric) -> Option<f64> {
        let main = self.main_sleep.as_ref();
        match metric {
            Metric::TotalSleepHours if self.total_sleep_minutes > 0.0 => {
                Some(self.total_sleep_hours())
            }
            Metric::MainSleepHours => self.main_sleep_hours(),
            Metric::SleepEfficiency => self.efficiency,
            Metric::SleepScore => self.score(),
            Metric::DeepSleepMinutes => main.map(|s| s.stages.deep_minutes),
            Metric::RemSleepMinutes => main.map(|s| s.stages.rem_minutes),
            Metric::RespiratoryRate => main.and_then(|s| s.respiratory_rate),
            _ => None,
        }
    }
}

/// A single dated observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatedValue {
    pub date: NaiveDate,
    pub value: f64,
}

/// A bare series answers for whichever metric it was extracted as
impl MetricSource for DatedValue {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn metric(&self, _metric: &Metric) -> Option<f64> {
        Some(self.value)
    }
}

/// A user tag (supplement, intervention, note) attached to a calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTag {
    pub date: NaiveDate,
    pub tag: String,
}

impl DailyTag {
    /// Tag text is trimmed and lowercased so that "Magnesium" and "magnesium " group together
    pub fn new(date: NaiveDate, tag: &str) -> Self {
        Self {
            date,
            tag: tag.trim().to_lowercase(),
        }
    }
}

/// Extract the present values of `metric` as a dated series
pub fn series<R: MetricSource>(records: &[R], metric: &Metric) -> Vec<DatedValue> {
    records
        .iter()
        .filter_map(|r| {
            r.metric(metric)
                .filter(|v| v.is_finite())
                .map(|value| DatedValue {
                    date: r.date(),
                    value,
                })
        })
        .collect()
}

/// Time of day in minutes after midnight
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClockTime(f64);

impl ClockTime {
    pub fn from_minutes(minutes: f64) -> Self {
        ClockTime(minutes.rem_euclid(MINUTES_PER_DAY))
    }

    pub fn from_hm(hour: u32, minute: u32) -> Self {
        Self::from_minutes((hour * 60 + minute) as f64)
    }

    pub fn of(datetime: &NaiveDateTime) -> Self {
        let minutes = datetime.hour() * 60 + datetime.minute();
        Self::from_minutes(minutes as f64 + datetime.second() as f64 / 60.0)
    }

    pub fn minutes(&self) -> f64 {
        self.0
    }

    pub fn hours(&self) -> f64 {
        self.0 / 60.0
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.round() as u32 % 1440;
        write!(f, "{:02}:{:02}", total / 60, total % 60)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayType {
    Workday,
    FreeDay,
}

/// Which nights are schedule-free
///
/// Nights are keyed by wake-up date, so with the default free days of
/// Saturday and Sunday the free nights are Friday and Saturday nights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub free_days: Vec<Weekday>,
    /// Per-date exceptions such as holidays
    #[serde(default)]
    pub overrides: BTreeMap<NaiveDate, DayType>,
}

impl Default for WeeklySchedule {
    fn default() -> Self {
        Self {
            free_days: vec![Weekday::Sat, Weekday::Sun],
            overrides: BTreeMap::new(),
        }
    }
}

impl WeeklySchedule {
    pub fn day_type(&self, date: NaiveDate) -> DayType {
        if let Some(day_type) = self.overrides.get(&date) {
            return *day_type;
        }
        if self.free_days.contains(&date.weekday()) {
            DayType::FreeDay
        } else {
            DayType::Workday
        }
    }
}

/// Result of asking an upstream source for an optional data set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Availability<T> {
    Available { value: T },
    NotAvailable { reason: String },
}

impl<T> Availability<T> {
    pub fn as_option(&self) -> Option<&T> {
        match self {
            Availability::Available { value } => Some(value),
            Availability::NotAvailable { .. } => None,
        }
    }

    /// Convert to a result, naming `field` when absent
    pub fn into_result(self, field: &str) -> Result<T, InsightError> {
        match self {
            Availability::Available { value } => Ok(value),
            Availability::NotAvailable { reason } => {
                Err(InsightError::MissingField(format!("{} ({})", field, reason)))
            }
        }
    }
}

impl<T> Default for Availability<T> {
    fn default() -> Self {
        Availability::NotAvailable {
            reason: "not requested".to_string(),
        }
    }
}
