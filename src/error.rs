//! Error types for Synheart Insight

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur during analysis
#[derive(Debug, Error)]
pub enum InsightError {
    #[error("Insufficient data for {context}: need {required}, found {found}")]
    InsufficientData {
        context: String,
        required: usize,
        found: usize,
    },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Undefined rate: {0}")]
    UndefinedRate(String),

    #[error("No main sleep identified for night of {0}")]
    NoMainSleepIdentified(NaiveDate),

    #[error("Failed to parse payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl InsightError {
    /// Shorthand for an `InsufficientData` error
    pub fn insufficient(context: impl Into<String>, required: usize, found: usize) -> Self {
        InsightError::InsufficientData {
            context: context.into(),
            required,
            found,
        }
    }

    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            InsightError::InsufficientData { .. } => "insufficient_data",
            InsightError::MissingField(_) => "missing_field",
            InsightError::UndefinedRate(_) => "undefined_rate",
            InsightError::NoMainSleepIdentified(_) => "no_main_sleep_identified",
            InsightError::ParseError(_) => "parse_error",
            InsightError::JsonError(_) => "json_error",
            InsightError::DateParseError(_) => "date_parse_error",
            InsightError::ConfigError(_) => "config_error",
            InsightError::EncodingError(_) => "encoding_error",
        }
    }
}
