//! Re-weightable priority. Sort key only: never written back to a candidate.
//!
//! priority = algo_score + Σ weight(rule) × rule.points × [rule fires]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::candidate::{AttributeMap, BoostRule, Candidate};

pub const DEFAULT_BOOST_WEIGHT: f64 = 1.0;
pub const MAX_BOOST_WEIGHT: f64 = 2.0;

#[derive(Debug, Error, PartialEq)]
pub enum RankingError {
    #[error("Boost weight for '{name}' must be within [0, 2], got {weight}")]
    WeightOutOfRange { name: String, weight: f64 },

    #[error("Unknown boost '{0}'")]
    UnknownBoost(String),
}

/// Operator-adjustable multipliers keyed by boost rule name. Missing names use 1.0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankingWeights {
    #[serde(default)]
    pub boosts: BTreeMap<String, f64>,
}

impl RankingWeights {
    pub fn weight_for(&self, rule: &str) -> f64 {
        self.boosts
            .get(rule)
            .copied()
            .unwrap_or(DEFAULT_BOOST_WEIGHT)
    }

    pub fn validate(&self, rules: &[BoostRule]) -> Result<(), RankingError> {
        for (name, weight) in &self.boosts {
            if !rules.iter().any(|r| &r.name == name) {
                return Err(RankingError::UnknownBoost(name.clone()));
            }
            if !(0.0..=MAX_BOOST_WEIGHT).contains(weight) {
                return Err(RankingError::WeightOutOfRange {
                    name: name.clone(),
                    weight: *weight,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate<'a> {
    pub candidate: &'a Candidate,
    pub priority: f64,
    pub fired_boosts: Vec<String>,
}

/// True when every `when` field is truthy and no `unless` field is.
pub fn boost_fires(rule: &BoostRule, attributes: &AttributeMap) -> bool {
    if rule.when.is_empty() && rule.unless.is_empty() {
        return false;
    }
    let truthy = |field: &String| attributes.get(field).map(|v| v.is_truthy()).unwrap_or(false);
    rule.when.iter().all(truthy) && !rule.unless.iter().any(truthy)
}

/// Orders candidates by priority (desc), then name, then id.
pub fn rank<'a>(
    candidates: &'a [Candidate],
    rules: &[BoostRule],
    weights: &RankingWeights,
) -> Result<Vec<RankedCandidate<'a>>, RankingError> {
    weights.validate(rules)?;

    let mut ranked: Vec<RankedCandidate<'a>> = candidates
        .iter()
        .map(|candidate| {
            let mut priority = candidate.algo_score.unwrap_or(0) as f64;
            let mut fired_boosts = Vec::new();
            for rule in rules {
                if boost_fires(rule, &candidate.attributes) {
                    priority += weights.weight_for(&rule.name) * rule.points;
                    fired_boosts.push(rule.name.clone());
                }
            }
            RankedCandidate {
                candidate,
                priority,
                fired_boosts,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.priority
            .total_cmp(&a.priority)
            .then_with(|| a.candidate.name.cmp(&b.candidate.name))
            .then_with(|| a.candidate.id.cmp(&b.candidate.id))
    });
    Ok(ranked)
}
