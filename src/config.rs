//! Analysis configuration
//!
//! Every tunable threshold, weight and window lives here as an explicit value
//! handed to each analysis call. Each section has defaults, so a TOML file only
//! needs to name the values it changes.

use crate::error::InsightError;
use crate::types::{ClockTime, WeeklySchedule};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default baseline window in days
pub const DEFAULT_BASELINE_WINDOW: usize = 30;

/// Sleep need the base anomaly and debt thresholds are calibrated for
pub const REFERENCE_SLEEP_NEED_HOURS: f64 = 8.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    pub baseline: BaselineConfig,
    pub aggregation: AggregationConfig,
    pub correlation: CorrelationConfig,
    pub interpretation: InterpretationConfig,
    pub anomaly: AnomalyConfig,
    pub chronotype: ChronotypeConfig,
    pub sleep_need: SleepNeedConfig,
    pub debt: DebtConfig,
    pub illness: IllnessConfig,
    pub prediction: PredictionConfig,
    pub bedtime: BedtimeConfig,
    pub alerts: AlertConfig,
    pub tags: TagConfig,
    pub weekly: WeeklyConfig,
}

impl InsightConfig {
    /// Parse a (possibly partial) TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, InsightError> {
        let config: InsightConfig = toml::from_str(content)
            .map_err(|e| InsightError::ConfigError(format!("failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, InsightError> {
        let content = fs::read_to_string(&path).map_err(|e| {
            InsightError::ConfigError(format!(
                "failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, InsightError> {
        toml::to_string_pretty(self)
            .map_err(|e| InsightError::ConfigError(format!("failed to serialize config: {}", e)))
    }

    /// Reject configurations that would make an analysis meaningless
    pub fn validate(&self) -> Result<(), InsightError> {
        if self.baseline.window_days < 2 {
            return Err(invalid("baseline.window_days must be at least 2"));
        }
        if self.aggregation.nocturnal_start_hour > 23 || self.aggregation.nocturnal_end_hour > 23 {
            return Err(invalid("aggregation hours must be within 0-23"));
        }

        let c = &self.correlation;
        if !(0.0 < c.weak && c.weak < c.moderate && c.moderate < c.strong && c.strong <= 1.0) {
            return Err(invalid("correlation bands must satisfy 0 < weak < moderate < strong <= 1"));
        }

        check_weights("interpretation.weights", &self.interpretation.weights.as_array())?;
        check_weights("illness.weights", &self.illness.weights.as_array())?;
        check_weights("prediction.weights", &self.prediction.weights.as_array())?;

        if self.anomaly.z_threshold <= 0.0 {
            return Err(invalid("anomaly.z_threshold must be positive"));
        }
        if self.anomaly.consecutive_nights == 0
            || self.anomaly.consecutive_nights > self.anomaly.lookback_nights
        {
            return Err(invalid("anomaly.consecutive_nights must be within 1..=lookback_nights"));
        }
        self.anomaly.deep_sleep_drop.check_ascending("anomaly.deep_sleep_drop")?;
        self.anomaly.efficiency_drop.check_ascending("anomaly.efficiency_drop")?;
        self.anomaly.duration_deficit_levels.check_ascending("anomaly.duration_deficit_levels")?;
        self.anomaly.hrv_balance_floor.check_descending("anomaly.hrv_balance_floor")?;
        self.debt.severity_hours.check_ascending("debt.severity_hours")?;

        let b = &self.chronotype.bands;
        let ordered = [b.extreme_lark_before, b.lark_before, b.intermediate_until, b.owl_until];
        if ordered.windows(2).any(|w| w[0] >= w[1]) {
            return Err(invalid("chronotype.bands must be strictly increasing"));
        }

        if self.sleep_need.override_hours.is_some_and(|h| !(3.0..=14.0).contains(&h)) {
            return Err(invalid("sleep_need.override_hours must be within 3-14"));
        }
        if self.debt.window_days == 0 || self.debt.surplus_rate_window == 0 {
            return Err(invalid("debt.window_days and debt.surplus_rate_window must be positive"));
        }
        if self.interpretation.heart_rate_penalty_per_point < 0.0
            || self.interpretation.temperature_penalty_per_degree < 0.0
        {
            return Err(invalid("interpretation penalties must not be negative"));
        }
        if !(0.0 < self.debt.recovery_fraction && self.debt.recovery_fraction <= 1.0) {
            return Err(invalid("debt.recovery_fraction must be within (0, 1]"));
        }
        if self.illness.saturation_z <= 0.0 || self.illness.consecutive_days == 0 {
            return Err(invalid("illness.saturation_z and consecutive_days must be positive"));
        }
        if self.prediction.horizon_days == 0 || self.prediction.trend_window < 2 {
            return Err(invalid("prediction.horizon_days must be positive and trend_window >= 2"));
        }
        if !(0.0..=1.0).contains(&self.prediction.reversion_factor) {
            return Err(invalid("prediction.reversion_factor must be within [0, 1]"));
        }

        if !(0.0 < self.bedtime.top_fraction && self.bedtime.top_fraction <= 1.0) {
            return Err(invalid("bedtime.top_fraction must be within (0, 1]"));
        }
        if self.bedtime.min_nights == 0 {
            return Err(invalid("bedtime.min_nights must be positive"));
        }
        let a = &self.alerts;
        for (name, levels) in [
            ("alerts.sleep_score", a.sleep_score),
            ("alerts.readiness_score", a.readiness_score),
            ("alerts.hrv_balance", a.hrv_balance),
        ] {
            levels.check_floor(name)?;
        }
        a.sleep_hours.check_floor("alerts.sleep_hours")?;
        a.sleep_debt_hours.check_ceiling("alerts.sleep_debt_hours")?;
        a.resting_heart_rate_drop.check_ceiling("alerts.resting_heart_rate_drop")?;
        if a.recent_days == 0 || a.trend_days < 3 {
            return Err(invalid("alerts.recent_days must be positive and trend_days >= 3"));
        }
        if self.tags.min_occurrences == 0 {
            return Err(invalid("tags.min_occurrences must be positive"));
        }
        check_weights("weekly.weights", &self.weekly.weights.as_array())?;
        if self.weekly.days == 0 {
            return Err(invalid("weekly.days must be positive"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> InsightError {
    InsightError::ConfigError(message.to_string())
}

fn check_weights(section: &str, weights: &[f64]) -> Result<(), InsightError> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(InsightError::ConfigError(format!(
            "{} must be non-negative",
            section
        )));
    }
    if weights.iter().sum::<f64>() <= 0.0 {
        return Err(InsightError::ConfigError(format!(
            "{} must have a positive sum",
            section
        )));
    }
    Ok(())
}

/// Four ordered severity cut-offs for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdLevels {
    pub mild: f64,
    pub moderate: f64,
    pub elevated: f64,
    pub severe: f64,
}

impl ThresholdLevels {
    pub const fn new(mild: f64, moderate: f64, elevated: f64, severe: f64) -> Self {
        Self {
            mild,
            moderate,
            elevated,
            severe,
        }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(
            self.mild * factor,
            self.moderate * factor,
            self.elevated * factor,
            self.severe * factor,
        )
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.mild, self.moderate, self.elevated, self.severe]
    }

    fn check_ascending(&self, name: &str) -> Result<(), InsightError> {
        if self.as_array().windows(2).any(|w| w[0] > w[1]) || self.mild < 0.0 {
            return Err(InsightError::ConfigError(format!(
                "{} must be non-negative and ascending",
                name
            )));
        }
        Ok(())
    }

    fn check_descending(&self, name: &str) -> Result<(), InsightError> {
        if self.as_array().windows(2).any(|w| w[0] < w[1]) || self.severe < 0.0 {
            return Err(InsightError::ConfigError(format!(
                "{} must be non-negative and descending",
                name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    pub window_days: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_BASELINE_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Local hour the nocturnal window opens on the evening before
    pub nocturnal_start_hour: u32,
    /// Local hour the nocturnal window closes on the wake-up day
    pub nocturnal_end_hour: u32,
    /// Shortest session that can be main sleep without a main-sleep tag
    pub min_main_sleep_minutes: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            nocturnal_start_hour: 18,
            nocturnal_end_hour: 12,
            min_main_sleep_minutes: 120.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub strong: f64,
    pub moderate: f64,
    pub weak: f64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            strong: 0.7,
            moderate: 0.5,
            weak: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryWeights {
    pub hrv_balance: f64,
    pub readiness: f64,
    pub sleep_score: f64,
    pub heart_rate_stability: f64,
    pub temperature: f64,
}

impl RecoveryWeights {
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.hrv_balance,
            self.readiness,
            self.sleep_score,
            self.heart_rate_stability,
            self.temperature,
        ]
    }
}

impl Default for RecoveryWeights {
    fn default() -> Self {
        Self {
            hrv_balance: 0.35,
            readiness: 0.30,
            sleep_score: 0.20,
            heart_rate_stability: 0.10,
            temperature: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpretationConfig {
    /// |z| beyond which a value is labelled above or below average
    pub label_z_threshold: f64,
    /// Points removed from the temperature term per degree of deviation
    pub temperature_penalty_per_degree: f64,
    /// Points removed from heart-rate stability per point of resting heart
    /// rate score away from its baseline
    pub heart_rate_penalty_per_point: f64,
    pub weights: RecoveryWeights,
}

impl Default for InterpretationConfig {
    fn default() -> Self {
        Self {
            label_z_threshold: 1.0,
            temperature_penalty_per_degree: 100.0,
            heart_rate_penalty_per_point: 10.0,
            weights: RecoveryWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub z_threshold: f64,
    /// Run length that makes a consecutive decline
    pub consecutive_nights: usize,
    /// Most recent nights searched for a decline
    pub lookback_nights: usize,
    /// Score below baseline mean by this fraction marks a bad night
    pub score_drop_fraction: f64,
    /// Efficiency drop for the missing-score bad-night test (scaled)
    pub efficiency_drop_fraction: f64,
    /// Deficit against personal need for the missing-score bad-night test (scaled)
    pub duration_deficit_hours: f64,
    /// Fractional drop of deep sleep below baseline
    pub deep_sleep_drop: ThresholdLevels,
    /// Fractional drop of sleep efficiency below baseline
    pub efficiency_drop: ThresholdLevels,
    /// Hours of total sleep short of personal need
    pub duration_deficit_levels: ThresholdLevels,
    /// Absolute HRV balance floors, descending
    pub hrv_balance_floor: ThresholdLevels,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            z_threshold: 1.5,
            consecutive_nights: 3,
            lookback_nights: 7,
            score_drop_fraction: 0.15,
            efficiency_drop_fraction: 0.10,
            duration_deficit_hours: 1.0,
            deep_sleep_drop: ThresholdLevels::new(0.30, 0.40, 0.50, 0.60),
            efficiency_drop: ThresholdLevels::new(0.10, 0.15, 0.20, 0.30),
            duration_deficit_levels: ThresholdLevels::new(1.0, 1.5, 2.0, 3.0),
            hrv_balance_floor: ThresholdLevels::new(50.0, 40.0, 35.0, 30.0),
        }
    }
}

/// MSF boundaries in hours after midnight (may exceed 24 for very late types)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MsfBands {
    pub extreme_lark_before: f64,
    pub lark_before: f64,
    pub intermediate_until: f64,
    pub owl_until: f64,
}

impl Default for MsfBands {
    fn default() -> Self {
        Self {
            extreme_lark_before: 2.0,
            lark_before: 3.0,
            intermediate_until: 5.0,
            owl_until: 6.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChronotypeConfig {
    pub min_nights_per_day_type: usize,
    pub social_jetlag_cap_hours: f64,
    pub bands: MsfBands,
    pub schedule: WeeklySchedule,
}

impl Default for ChronotypeConfig {
    fn default() -> Self {
        Self {
            min_nights_per_day_type: 5,
            social_jetlag_cap_hours: 4.0,
            bands: MsfBands::default(),
            schedule: WeeklySchedule::default(),
        }
    }
}

/// Fallback sleep need per chronotype, in hours
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChronotypeDefaults {
    pub extreme_lark: f64,
    pub lark: f64,
    pub intermediate: f64,
    pub owl: f64,
    pub extreme_owl: f64,
    /// Used when no chronotype could be classified
    pub unknown: f64,
}

impl Default for ChronotypeDefaults {
    fn default() -> Self {
        Self {
            extreme_lark: 8.0,
            lark: 7.75,
            intermediate: 7.5,
            owl: 7.25,
            extreme_owl: 7.0,
            unknown: 7.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepNeedConfig {
    /// Percentile selecting top-performance days
    pub top_percentile: f64,
    pub min_top_days: usize,
    pub min_percentile_nights: usize,
    /// Nights needed before the duration percentile earns medium confidence
    pub medium_confidence_nights: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_hours: Option<f64>,
    pub chronotype_defaults: ChronotypeDefaults,
}

impl Default for SleepNeedConfig {
    fn default() -> Self {
        Self {
            top_percentile: 75.0,
            min_top_days: 5,
            min_percentile_nights: 3,
            medium_confidence_nights: 14,
            override_hours: None,
            chronotype_defaults: ChronotypeDefaults::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebtConfig {
    pub window_days: usize,
    /// Share of a surplus night credited against debt
    pub recovery_fraction: f64,
    /// Recent nights averaged for the repayment rate
    pub surplus_rate_window: usize,
    /// Debt hours at each severity level for an 8 h sleeper
    pub severity_hours: ThresholdLevels,
}

impl Default for DebtConfig {
    fn default() -> Self {
        Self {
            window_days: 14,
            recovery_fraction: 0.5,
            surplus_rate_window: 7,
            severity_hours: ThresholdLevels::new(2.0, 8.0, 16.0, 40.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IllnessWeights {
    pub resting_heart_rate: f64,
    pub hrv: f64,
    pub temperature: f64,
    pub efficiency: f64,
    pub respiratory_rate: f64,
}

impl IllnessWeights {
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.resting_heart_rate,
            self.hrv,
            self.temperature,
            self.efficiency,
            self.respiratory_rate,
        ]
    }
}

impl Default for IllnessWeights {
    fn default() -> Self {
        Self {
            resting_heart_rate: 0.30,
            hrv: 0.30,
            temperature: 0.25,
            efficiency: 0.15,
            respiratory_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IllnessConfig {
    /// Composite score (0-100) counted as an alert day
    pub alert_threshold: f64,
    pub consecutive_days: usize,
    /// Most recent days scored against the earlier baseline
    pub evaluation_days: usize,
    /// Oriented z-score at which a signal reaches full strength
    pub saturation_z: f64,
    pub weights: IllnessWeights,
}

impl Default for IllnessConfig {
    fn default() -> Self {
        Self {
            alert_threshold: 40.0,
            consecutive_days: 2,
            evaluation_days: 5,
            saturation_z: 3.0,
            weights: IllnessWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleWeights {
    pub trend: f64,
    pub reversion: f64,
    pub seasonal: f64,
}

impl EnsembleWeights {
    pub fn as_array(&self) -> [f64; 3] {
        [self.trend, self.reversion, self.seasonal]
    }
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            trend: 0.4,
            reversion: 0.3,
            seasonal: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub horizon_days: usize,
    pub trend_window: usize,
    pub min_history: usize,
    /// Share of today's gap to the mean still present after one day
    pub reversion_factor: f64,
    pub confidence_z: f64,
    pub weights: EnsembleWeights,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            horizon_days: 7,
            trend_window: 14,
            min_history: 7,
            reversion_factor: 0.7,
            confidence_z: 1.96,
            weights: EnsembleWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BedtimeConfig {
    /// Share of nights, ranked by quality, treated as the best nights
    pub top_fraction: f64,
    pub min_nights: usize,
    /// Window half-width when only one best night exists
    pub default_spread_minutes: f64,
    /// Fixed wake time; inferred from the best nights when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_wake_time: Option<ClockTime>,
}

impl Default for BedtimeConfig {
    fn default() -> Self {
        Self {
            top_fraction: 0.25,
            min_nights: 5,
            default_spread_minutes: 30.0,
            target_wake_time: None,
        }
    }
}

/// Warning and critical cut-offs for one alert
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertLevels {
    pub warning: f64,
    pub critical: f64,
}

impl AlertLevels {
    pub const fn new(warning: f64, critical: f64) -> Self {
        Self { warning, critical }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.warning * factor, self.critical * factor)
    }

    /// Alerts fire below the levels, so critical sits under warning
    fn check_floor(&self, name: &str) -> Result<(), InsightError> {
        if self.critical > self.warning || self.critical < 0.0 {
            return Err(InsightError::ConfigError(format!(
                "{} critical must be non-negative and at most warning",
                name
            )));
        }
        Ok(())
    }

    /// Alerts fire above the levels, so critical sits over warning
    fn check_ceiling(&self, name: &str) -> Result<(), InsightError> {
        if self.critical < self.warning || self.warning < 0.0 {
            return Err(InsightError::ConfigError(format!(
                "{} warning must be non-negative and at most critical",
                name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Days averaged for the warning level of score and duration alerts
    pub recent_days: usize,
    pub sleep_score: AlertLevels,
    pub readiness_score: AlertLevels,
    pub hrv_balance: AlertLevels,
    /// Nightly hours for an 8 h sleeper
    pub sleep_hours: AlertLevels,
    /// Accumulated debt hours for an 8 h sleeper
    pub sleep_debt_hours: AlertLevels,
    /// Resting heart rate score points lost against the earlier days
    pub resting_heart_rate_drop: AlertLevels,
    /// Bedtime standard deviation that marks an irregular schedule
    pub bedtime_spread_hours: f64,
    /// Nights in a bad run that make the decline critical
    pub critical_bad_nights: usize,
    /// Activity score at or above which a day counts as a hard training day
    pub high_load_activity_score: f64,
    /// Activity score below which a day counts as inactive
    pub inactive_activity_score: f64,
    pub inactive_streak_days: usize,
    pub trend_days: usize,
    /// Score points per day of decline that raise a trend alert
    pub trend_slope_per_day: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            recent_days: 3,
            sleep_score: AlertLevels::new(70.0, 60.0),
            readiness_score: AlertLevels::new(70.0, 60.0),
            hrv_balance: AlertLevels::new(60.0, 50.0),
            sleep_hours: AlertLevels::new(7.0, 6.0),
            sleep_debt_hours: AlertLevels::new(10.0, 15.0),
            resting_heart_rate_drop: AlertLevels::new(7.0, 10.0),
            bedtime_spread_hours: 2.0,
            critical_bad_nights: 5,
            high_load_activity_score: 85.0,
            inactive_activity_score: 50.0,
            inactive_streak_days: 3,
            trend_days: 7,
            trend_slope_per_day: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    /// Nights a tag must precede before its effect is estimated
    pub min_occurrences: usize,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self { min_occurrences: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyScoreWeights {
    pub sleep: f64,
    pub readiness: f64,
    pub activity: f64,
}

impl WeeklyScoreWeights {
    pub fn as_array(&self) -> [f64; 3] {
        [self.sleep, self.readiness, self.activity]
    }
}

impl Default for WeeklyScoreWeights {
    fn default() -> Self {
        Self {
            sleep: 0.4,
            readiness: 0.3,
            activity: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyConfig {
    pub days: usize,
    /// Slope in points per day beyond which a week is trending
    pub trend_slope_per_day: f64,
    pub weights: WeeklyScoreWeights,
}

impl Default for WeeklyConfig {
    fn default() -> Self {
        Self {
            days: 7,
            trend_slope_per_day: 2.0,
            weights: WeeklyScoreWeights::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        assert!(InsightConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = InsightConfig::from_toml_str(
            r#"
            [baseline]
            window_days = 14

            [anomaly]
            z_threshold = 2.0
            "#,
        )
        .unwrap();

        assert_eq!(config.baseline.window_days, 14);
        assert!((config.anomaly.z_threshold - 2.0).abs() < 0.001);
        assert_eq!(config.anomaly.consecutive_nights, 3);
        assert_eq!(config.prediction, PredictionConfig::default());
    }

    #[test]
    fn test_default_config_survives_toml_round_trip() {
        let config = InsightConfig::default();
        let text = config.to_toml_string().unwrap();
        let parsed = InsightConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_rejects_unordered_correlation_bands() {
        let result = InsightConfig::from_toml_str(
            r#"
            [correlation]
            strong = 0.4
            moderate = 0.5
            "#,
        );
        assert!(matches!(result, Err(InsightError::ConfigError(_))));
    }

    #[test]
    fn test_rejects_zero_weight_sum() {
        let mut config = InsightConfig::default();
        config.prediction.weights = EnsembleWeights {
            trend: 0.0,
            reversion: 0.0,
            seasonal: 0.0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_debt_windows() {
        let result = InsightConfig::from_toml_str(
            r#"
            [debt]
            surplus_rate_window = 0
            "#,
        );
        assert!(matches!(result, Err(InsightError::ConfigError(_))));

        let mut config = InsightConfig::default();
        config.debt.window_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_short_trend_window() {
        let mut config = InsightConfig::default();
        config.prediction.trend_window = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_alert_levels() {
        let result = InsightConfig::from_toml_str(
            r#"
            [alerts.sleep_score]
            warning = 60.0
            critical = 70.0
            "#,
        );
        assert!(matches!(result, Err(InsightError::ConfigError(_))));

        let mut config = InsightConfig::default();
        config.alerts.sleep_debt_hours = AlertLevels::new(15.0, 10.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_target_wake_time_round_trips() {
        let mut config = InsightConfig::default();
        config.bedtime.target_wake_time = Some(ClockTime::from_hm(6, 30));
        let parsed = InsightConfig::from_toml_str(&config.to_toml_string().unwrap()).unwrap();
        assert_eq!(parsed.bedtime.target_wake_time, Some(ClockTime::from_hm(6, 30)));
    }

    #[test]
    fn test_threshold_levels_scale_linearly() {
        let levels = ThresholdLevels::new(1.0, 1.5, 2.0, 3.0).scaled(9.0 / 8.0);
        assert!((levels.mild - 1.125).abs() < 1e-9);
        assert!((levels.severe - 3.375).abs() < 1e-9);
    }
}
