//! Algorithmic fitness score: a pure, deterministic function of extracted
//! attributes, the declared schema and the job criteria.

use serde::{Deserialize, Serialize};

use crate::models::candidate::{AttributeMap, ExtractionField, JobCriteria, NumericThreshold};

/// Score when there is nothing to measure (no fields, thresholds or keywords).
pub const EMPTY_SCHEMA_BASELINE: u8 = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ComponentWeights {
    pub required: f64,
    pub preferred: f64,
    pub thresholds: f64,
    pub keywords: f64,
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            required: 0.40,
            preferred: 0.20,
            thresholds: 0.25,
            keywords: 0.15,
        }
    }
}

/// Per-component credit in 0.0 – 1.0. `None` means the component had no inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub required: Option<f64>,
    pub preferred: Option<f64>,
    pub thresholds: Option<f64>,
    pub keywords: Option<f64>,
}

impl ScoreBreakdown {
    /// Weighted mean of the available components, scaled to 0 – 100.
    pub fn total(&self, weights: &ComponentWeights) -> u8 {
        let parts = [
            (self.required, weights.required),
            (self.preferred, weights.preferred),
            (self.thresholds, weights.thresholds),
            (self.keywords, weights.keywords),
        ];
        let (earned, available) = parts
            .iter()
            .filter_map(|(credit, weight)| credit.map(|c| (c * weight, *weight)))
            .fold((0.0, 0.0), |(e, a), (ce, w)| (e + ce, a + w));

        if available <= 0.0 {
            return EMPTY_SCHEMA_BASELINE;
        }
        ((earned / available) * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

pub fn compute_algo_score(
    attributes: &AttributeMap,
    fields: &[ExtractionField],
    criteria: &JobCriteria,
) -> u8 {
    score_breakdown(attributes, fields, criteria).total(&ComponentWeights::default())
}

pub fn score_breakdown(
    attributes: &AttributeMap,
    fields: &[ExtractionField],
    criteria: &JobCriteria,
) -> ScoreBreakdown {
    ScoreBreakdown {
        required: field_coverage(attributes, fields.iter().filter(|f| f.required)),
        preferred: field_coverage(attributes, fields.iter().filter(|f| !f.required)),
        thresholds: threshold_credit(attributes, &criteria.thresholds),
        keywords: keyword_credit(attributes, &criteria.keywords),
    }
}

/// Percentage of declared fields that carry a value. An empty schema is complete.
pub fn data_completeness(attributes: &AttributeMap, fields: &[ExtractionField]) -> u8 {
    if fields.is_empty() {
        return 100;
    }
    let populated = fields
        .iter()
        .filter(|f| {
            attributes
                .get(&f.name)
                .map(|v| v.is_populated())
                .unwrap_or(false)
        })
        .count();
    ((populated as f64 / fields.len() as f64) * 100.0).round() as u8
}

fn field_coverage<'a>(
    attributes: &AttributeMap,
    fields: impl Iterator<Item = &'a ExtractionField>,
) -> Option<f64> {
    let (total, matched) = fields.fold((0usize, 0usize), |(total, matched), field| {
        let hit = attributes
            .get(&field.name)
            .map(|v| v.is_truthy())
            .unwrap_or(false);
        (total + 1, matched + usize::from(hit))
    });
    (total > 0).then(|| matched as f64 / total as f64)
}

fn threshold_credit(attributes: &AttributeMap, thresholds: &[NumericThreshold]) -> Option<f64> {
    if thresholds.is_empty() {
        return None;
    }
    let sum: f64 = thresholds
        .iter()
        .map(|t| {
            let Some(value) = attributes.get(&t.field).and_then(|v| v.as_number()) else {
                return 0.0;
            };
            let min_credit = match t.min {
                Some(min) if value >= min => 1.0,
                Some(min) if min > 0.0 => (value / min).clamp(0.0, 1.0),
                Some(_) => 0.0,
                None => 1.0,
            };
            let max_credit = match t.max {
                Some(max) if value <= max => 1.0,
                Some(max) if value > 0.0 && max > 0.0 => (max / value).clamp(0.0, 1.0),
                Some(_) => 0.0,
                None => 1.0,
            };
            min_credit * max_credit
        })
        .sum();
    Some(sum / thresholds.len() as f64)
}

fn keyword_credit(attributes: &AttributeMap, keywords: &[String]) -> Option<f64> {
    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        return None;
    }
    let haystack: Vec<String> = attributes
        .values()
        .flat_map(|v| v.text_fragments())
        .collect();
    let hits = keywords
        .iter()
        .filter(|k| haystack.iter().any(|h| h.contains(k.as_str())))
        .count();
    Some(hits as f64 / keywords.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::candidate::{AttributeValue, FieldType};

    fn field(name: &str, field_type: FieldType, required: bool) -> ExtractionField {
        ExtractionField {
            name: name.to_string(),
            field_type,
            required,
            description: String::new(),
        }
    }

    fn schema() -> Vec<ExtractionField> {
        vec![
            field("closed_enterprise_deals", FieldType::Boolean, true),
            field("years_experience", FieldType::Number, true),
            field("industries", FieldType::StringList, false),
            field("is_founder", FieldType::Boolean, false),
        ]
    }

    fn attrs() -> AttributeMap {
        let mut a = AttributeMap::new();
        a.insert(
            "closed_enterprise_deals".to_string(),
            AttributeValue::Bool(true),
        );
        a.insert("years_experience".to_string(), AttributeValue::Number(4.0));
        a.insert(
            "industries".to_string(),
            AttributeValue::List(vec!["Fintech".to_string(), "Healthcare".to_string()]),
        );
        a
    }

    fn criteria() -> JobCriteria {
        JobCriteria {
            thresholds: vec![NumericThreshold {
                field: "years_experience".to_string(),
                min: Some(5.0),
                max: None,
            }],
            keywords: vec![
                "fintech".to_string(),
                "logistics".to_string(),
                "healthcare".to_string(),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_score_is_deterministic() {
        let first = compute_algo_score(&attrs(), &schema(), &criteria());
        let second = compute_algo_score(&attrs(), &schema(), &criteria());
        assert_eq!(first, second);
    }

    #[test]
    fn test_breakdown_components() {
        let b = score_breakdown(&attrs(), &schema(), &criteria());
        assert_eq!(b.required, Some(1.0));
        assert_eq!(b.preferred, Some(0.5));
        assert!((b.thresholds.unwrap() - 0.8).abs() < 1e-9);
        assert!((b.keywords.unwrap() - 2.0 / 3.0).abs() < 1e-9);
        // 0.4*1 + 0.2*0.5 + 0.25*0.8 + 0.15*(2/3) = 0.8
        assert_eq!(b.total(&ComponentWeights::default()), 80);
    }

    #[test]
    fn test_empty_schema_uses_baseline() {
        let score = compute_algo_score(&AttributeMap::new(), &[], &JobCriteria::default());
        assert_eq!(score, EMPTY_SCHEMA_BASELINE);
    }

    #[test]
    fn test_missing_components_leave_the_denominator() {
        // Only required fields declared, all satisfied → full marks.
        let fields = vec![field("closed_enterprise_deals", FieldType::Boolean, true)];
        let score = compute_algo_score(&attrs(), &fields, &JobCriteria::default());
        assert_eq!(score, 100);
    }

    #[test]
    fn test_max_threshold_partial_credit() {
        let mut a = AttributeMap::new();
        a.insert("notice_weeks".to_string(), AttributeValue::Number(8.0));
        let credit = threshold_credit(
            &a,
            &[NumericThreshold {
                field: "notice_weeks".to_string(),
                min: None,
                max: Some(4.0),
            }],
        );
        assert_eq!(credit, Some(0.5));
    }

    #[test]
    fn test_completeness() {
        assert_eq!(data_completeness(&attrs(), &schema()), 75);
        assert_eq!(data_completeness(&AttributeMap::new(), &[]), 100);
    }
}
