//! Tag effects
//!
//! Compares the nights that follow a tagged day (a supplement, a late meal,
//! an evening workout) with nights not following any analyzed tag, and ranks
//! tags by a weighted sum of standardized differences.

use crate::baseline::{mean, sample_std_dev};
use crate::config::TagConfig;
use crate::error::InsightError;
use crate::types::{DailyTag, Metric, MetricSource, NightlyAggregate};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Metrics compared per tag with their weight in the effectiveness score
const TAG_METRICS: [(Metric, f64); 5] = [
    (Metric::SleepScore, 0.30),
    (Metric::SleepEfficiency, 0.20),
    (Metric::DeepSleepMinutes, 0.20),
    (Metric::RemSleepMinutes, 0.15),
    (Metric::TotalSleepHours, 0.10),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagClassification {
    HighlyBeneficial,
    Beneficial,
    SlightlyBeneficial,
    Neutral,
    SlightlyHarmful,
    Harmful,
}

impl TagClassification {
    pub fn from_effectiveness(score: f64) -> Self {
        if score >= 10.0 {
            TagClassification::HighlyBeneficial
        } else if score >= 5.0 {
            TagClassification::Beneficial
        } else if score >= 2.0 {
            TagClassification::SlightlyBeneficial
        } else if score >= -2.0 {
            TagClassification::Neutral
        } else if score >= -5.0 {
            TagClassification::SlightlyHarmful
        } else {
            TagClassification::Harmful
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEffect {
    pub metric: Metric,
    pub tagged_mean: f64,
    pub baseline_mean: f64,
    pub difference: f64,
    /// Relative to the baseline mean; `None` when that mean is zero
    pub percentage: Option<f64>,
    /// Difference in baseline standard deviations, 0 for a constant baseline
    pub effect_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagEffect {
    pub tag: String,
    pub occurrences: usize,
    /// Wake dates of the nights that followed the tag
    pub nights: Vec<NaiveDate>,
    pub effects: Vec<MetricEffect>,
    pub effectiveness: f64,
    pub classification: TagClassification,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagEffectReport {
    /// Most effective first
    pub tags: Vec<TagEffect>,
    pub baseline_nights: usize,
    pub nights_analyzed: usize,
}

/// Mean and spread of one metric over a set of nights
struct MetricSummary {
    mean: f64,
    std_dev: f64,
}

fn summarize(nights: &[&NightlyAggregate], metric: &Metric) -> Option<MetricSummary> {
    let values: Vec<f64> = nights.iter().filter_map(|n| n.metric(metric)).collect();
    if values.is_empty() {
        return None;
    }
    let mean = mean(&values);
    Some(MetricSummary {
        mean,
        std_dev: sample_std_dev(&values, mean),
    })
}

/// Estimates how tags relate to the following night's sleep
pub struct TagEffectAnalyzer;

impl TagEffectAnalyzer {
    /// A tag on day D is paired with the night that ends on D + 1
    pub fn analyze(
        tags: &[DailyTag],
        nights: &[NightlyAggregate],
        config: &TagConfig,
    ) -> Result<TagEffectReport, InsightError> {
        if tags.is_empty() {
            return Err(InsightError::insufficient("tagged days", 1, 0));
        }
        let by_date: BTreeMap<NaiveDate, &NightlyAggregate> = nights
            .iter()
            .filter(|n| n.total_sleep_minutes > 0.0)
            .map(|n| (n.date, n))
            .collect();

        let mut groups: BTreeMap<&str, BTreeSet<NaiveDate>> = BTreeMap::new();
        for tag in tags {
            let night = tag.date + Duration::days(1);
            if by_date.contains_key(&night) {
                groups.entry(tag.tag.as_str()).or_default().insert(night);
            }
        }

        let most = groups.values().map(BTreeSet::len).max().unwrap_or(0);
        groups.retain(|_, dates| dates.len() >= config.min_occurrences);
        if groups.is_empty() {
            return Err(InsightError::insufficient(
                "tag occurrences",
                config.min_occurrences,
                most,
            ));
        }

        let tagged: BTreeSet<NaiveDate> = groups.values().flatten().copied().collect();
        let mut baseline: Vec<&NightlyAggregate> = by_date
            .iter()
            .filter(|(date, _)| !tagged.contains(date))
            .map(|(_, n)| *n)
            .collect();
        if baseline.is_empty() {
            baseline = by_date.values().copied().collect();
        }
        let baseline_stats: Vec<(Metric, f64, Option<MetricSummary>)> = TAG_METRICS
            .iter()
            .map(|(m, w)| (m.clone(), *w, summarize(&baseline, m)))
            .collect();

        let mut effects: Vec<TagEffect> = groups
            .into_iter()
            .map(|(tag, dates)| {
                let tag_nights: Vec<&NightlyAggregate> =
                    dates.iter().filter_map(|d| by_date.get(d).copied()).collect();
                tag_effect(tag, &dates, &tag_nights, &baseline_stats)
            })
            .collect();
        effects.sort_by(|a, b| b.effectiveness.total_cmp(&a.effectiveness));

        debug!(
            tags = effects.len(),
            baseline_nights = baseline.len(),
            "analyzed tag effects"
        );

        Ok(TagEffectReport {
            tags: effects,
            baseline_nights: baseline.len(),
            nights_analyzed: by_date.len(),
        })
    }
}

fn tag_effect(
    tag: &str,
    dates: &BTreeSet<NaiveDate>,
    tag_nights: &[&NightlyAggregate],
    baseline_stats: &[(Metric, f64, Option<MetricSummary>)],
) -> TagEffect {
    let mut effects = Vec::new();
    let mut effectiveness = 0.0;
    for (metric, weight, base) in baseline_stats {
        let (Some(base), Some(tagged)) = (base, summarize(tag_nights, metric)) else {
            continue;
        };
        let difference = tagged.mean - base.mean;
        let effect_size = if base.std_dev > 0.0 {
            difference / base.std_dev
        } else {
            0.0
        };
        effectiveness += effect_size * weight * 100.0;
        effects.push(MetricEffect {
            metric: metric.clone(),
            tagged_mean: tagged.mean,
            baseline_mean: base.mean,
            difference,
            percentage: (base.mean != 0.0).then(|| difference / base.mean * 100.0),
            effect_size,
        });
    }

    TagEffect {
        tag: tag.to_string(),
        occurrences: dates.len(),
        nights: dates.iter().copied().collect(),
        effects,
        effectiveness,
        classification: TagClassification::from_effectiveness(effectiveness),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SessionKind, SleepSession, SleepStages};
    use pretty_assertions::assert_eq;

    fn day(i: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 1).unwrap() + Duration::days(i)
    }

    fn make_night(i: i64, score: f64, hours: f64) -> NightlyAggregate {
        let start = (day(i) - Duration::days(1)).and_hms_opt(23, 0, 0).unwrap();
        let minutes = hours * 60.0;
        NightlyAggregate {
            date: day(i),
            main_sleep: Some(SleepSession {
                start_time: start,
                end_time: start + Duration::minutes(minutes as i64),
                kind: SessionKind::Main,
                stages: SleepStages {
                    deep_minutes: minutes * 0.2,
                    rem_minutes: minutes * 0.2,
                    light_minutes: minutes * 0.6,
                    ..Default::default()
                },
                efficiency: 90.0,
                score: Some(score),
                respiratory_rate: None,
            }),
            naps: Vec::new(),
            total_sleep_minutes: minutes,
            time_in_bed_minutes: minutes,
            efficiency: Some(90.0),
        }
    }

    /// Twenty nights alternating between two ordinary levels
    fn make_nights() -> Vec<NightlyAggregate> {
        (0..20)
            .map(|i| {
                if i % 2 == 0 {
                    make_night(i, 74.0, 7.0)
                } else {
                    make_night(i, 78.0, 7.5)
                }
            })
            .collect()
    }

    #[test]
    fn test_tag_pairs_with_following_night() {
        let mut nights = make_nights();
        for i in [4, 8, 12] {
            nights[i] = make_night(i as i64, 88.0, 8.0);
        }
        let tags: Vec<DailyTag> = [3, 7, 11]
            .iter()
            .map(|i| DailyTag::new(day(*i), "Magnesium"))
            .collect();

        let report = TagEffectAnalyzer::analyze(&tags, &nights, &TagConfig::default()).unwrap();
        let effect = &report.tags[0];

        assert_eq!(effect.tag, "magnesium");
        assert_eq!(effect.nights, vec![day(4), day(8), day(12)]);
        assert_eq!(report.baseline_nights, 17);
        let score = &effect.effects[0];
        assert_eq!(score.metric, Metric::SleepScore);
        assert!((score.tagged_mean - 88.0).abs() < 1e-9);
        assert!(score.effect_size > 1.0);
        assert_eq!(effect.classification, TagClassification::HighlyBeneficial);
    }

    #[test]
    fn test_tags_rank_by_effectiveness() {
        let mut nights = make_nights();
        for i in [2, 6, 10] {
            nights[i] = make_night(i as i64, 90.0, 8.0);
        }
        for i in [3, 9, 15] {
            nights[i] = make_night(i as i64, 60.0, 5.5);
        }
        let mut tags = Vec::new();
        for i in [1, 5, 9] {
            tags.push(DailyTag::new(day(i), "meditation"));
        }
        for i in [2, 8, 14] {
            tags.push(DailyTag::new(day(i), "late meal"));
        }

        let report = TagEffectAnalyzer::analyze(&tags, &nights, &TagConfig::default()).unwrap();
        let names: Vec<&str> = report.tags.iter().map(|t| t.tag.as_str()).collect();
        assert_eq!(names, vec!["meditation", "late meal"]);
        assert!(report.tags[1].effectiveness < -5.0);
        assert_eq!(report.tags[1].classification, TagClassification::Harmful);
    }

    #[test]
    fn test_rare_tags_are_insufficient() {
        let tags = vec![DailyTag::new(day(1), "sauna"), DailyTag::new(day(5), "sauna")];
        let result = TagEffectAnalyzer::analyze(&tags, &make_nights(), &TagConfig::default());
        assert!(matches!(
            result,
            Err(InsightError::InsufficientData { required: 3, found: 2, .. })
        ));
    }

    #[test]
    fn test_tag_without_following_night_is_ignored() {
        // the last night is day(19); a tag on day(19) has no night after it
        let tags: Vec<DailyTag> = [2, 4, 19]
            .iter()
            .map(|i| DailyTag::new(day(*i), "alcohol"))
            .collect();
        let result = TagEffectAnalyzer::analyze(&tags, &make_nights(), &TagConfig::default());
        assert!(matches!(
            result,
            Err(InsightError::InsufficientData { found: 2, .. })
        ));
    }

    #[test]
    fn test_classification_bands() {
        let bands: Vec<TagClassification> = [12.0, 6.0, 3.0, 0.0, -3.0, -8.0]
            .iter()
            .map(|s| TagClassification::from_effectiveness(*s))
            .collect();
        assert_eq!(
            bands,
            vec![
                TagClassification::HighlyBeneficial,
                TagClassification::Beneficial,
                TagClassification::SlightlyBeneficial,
                TagClassification::Neutral,
                TagClassification::SlightlyHarmful,
                TagClassification::Harmful,
            ]
        );
    }
}
