use serde::{Deserialize, Serialize};
use tracing::info;

use crate::learning::keywords::{KeywordRules, extract_keywords_with};
use crate::learning::types::{CorrectionField, MatchExpression, NewPattern};
use crate::store::LearningStore;
use crate::{EngineError, EngineResult};

pub const SEED_ACTOR: &str = "seed";

const DEFAULT_SEED_CONFIDENCE: f64 = 0.9;

/// One configured pattern, e.g.
/// `{"expression":{"kind":"exact","text":"Monthly rent"},"target_field":"category","target_value":"Rent"}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternSeed {
    pub expression: MatchExpression,
    pub target_field: CorrectionField,
    pub target_value: String,
    #[serde(default = "default_seed_confidence")]
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedOutcome {
    pub created: usize,
    pub existing: usize,
    pub pattern_ids: Vec<String>,
}

/// Materializes seeds for a tenant; seeds already present are left as they
/// are. All seeds are checked before anything is written.
///
/// Keyword seeds must already be in the form keyword extraction produces
/// under `rules`, otherwise they could never match a description.
pub fn seed_patterns<S>(
    store: &S,
    tenant_id: &str,
    seeds: &[PatternSeed],
    rules: &KeywordRules,
) -> EngineResult<SeedOutcome>
where
    S: LearningStore + ?Sized,
{
    let mut expressions = Vec::with_capacity(seeds.len());
    for (index, seed) in seeds.iter().enumerate() {
        check_seed(index, seed)?;
        expressions.push(matchable_expression(index, &seed.expression, rules)?);
    }

    let mut outcome = SeedOutcome::default();
    for (seed, expression) in seeds.iter().zip(expressions) {
        let (pattern, created) = store.insert_pattern_if_absent(&NewPattern {
            tenant_id: tenant_id.to_string(),
            expression,
            target_field: seed.target_field,
            target_value: seed.target_value.trim().to_string(),
            confidence: seed.confidence,
            created_by: SEED_ACTOR.to_string(),
        })?;
        if created {
            outcome.created += 1;
        } else {
            outcome.existing += 1;
        }
        outcome.pattern_ids.push(pattern.pattern_id);
    }

    info!(
        tenant_id,
        created = outcome.created,
        existing = outcome.existing,
        "seeded classification patterns"
    );
    Ok(outcome)
}

fn check_seed(index: usize, seed: &PatternSeed) -> EngineResult<()> {
    let problem = if seed.expression.is_empty() {
        Some("has an empty match expression")
    } else if seed.target_value.trim().is_empty() {
        Some("has an empty target_value")
    } else if !(0.0..=1.0).contains(&seed.confidence) {
        Some("has a confidence outside [0, 1]")
    } else {
        None
    };
    match problem {
        Some(problem) => Err(EngineError::invalid_argument(&format!(
            "Pattern seed #{} {problem}.",
            index + 1
        ))),
        None => Ok(()),
    }
}

fn matchable_expression(
    index: usize,
    expression: &MatchExpression,
    rules: &KeywordRules,
) -> EngineResult<MatchExpression> {
    let MatchExpression::Keywords { .. } = expression else {
        return Ok(expression.clone());
    };
    let written = expression.storage_text();
    let extracted = extract_keywords_with(&written, &rules.unbounded());
    if extracted.join(" ") == written {
        return Ok(MatchExpression::Keywords {
            keywords: extracted,
        });
    }
    let kept = if extracted.is_empty() {
        "nothing".to_string()
    } else {
        format!("`{}`", extracted.join(" "))
    };
    Err(EngineError::invalid_argument_with_recovery(
        &format!(
            "Pattern seed #{} keywords `{written}` can never match: descriptions only yield {kept}.",
            index + 1
        ),
        vec![
            "Drop stop words, numbers, punctuation and very short words from keyword seeds.".to_string(),
            "Use an `exact` expression to match a whole description instead.".to_string(),
        ],
    ))
}

fn default_seed_confidence() -> f64 {
    DEFAULT_SEED_CONFIDENCE
}
