use std::cmp::Ordering;

use tracing::debug;

use crate::EngineResult;
use crate::learning::keywords::{KeywordRules, extract_keywords_with, field_similarity_with};
use crate::learning::policy::{LEARNING_POLICY_V1, LearningPolicy};
use crate::learning::types::{
    ClassificationPattern, ClassificationResult, ConfidenceTier, CorrectionField, FieldScores,
    MatchCandidate, MatchSource, MatchedField, TransactionRecord,
};
use crate::store::LearningStore;

/// Field-similarity voting over candidates, plus precise pattern triggers.
#[derive(Debug, Clone)]
pub struct Matcher {
    policy: LearningPolicy,
    rules: KeywordRules,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(LEARNING_POLICY_V1, KeywordRules::default())
    }
}

impl Matcher {
    pub fn new(policy: LearningPolicy, rules: KeywordRules) -> Self {
        Self { policy, rules }
    }

    pub fn policy(&self) -> LearningPolicy {
        self.policy
    }

    /// Candidates resembling `target`, best first, at or above
    /// `min_confidence`.
    ///
    /// Candidates without a description, or with neither origin nor
    /// destination, are skipped rather than scored.
    pub fn find_similar(
        &self,
        target: &TransactionRecord,
        candidates: &[TransactionRecord],
        min_confidence: f64,
    ) -> Vec<MatchCandidate> {
        let mut matches: Vec<MatchCandidate> = candidates
            .iter()
            .filter_map(|candidate| self.score_candidate(target, candidate))
            .filter(|candidate| candidate.confidence >= min_confidence)
            .collect();
        matches.sort_by(compare_candidates);
        matches
    }

    /// One result per field that a pattern or similar transactions can
    /// decide, in field order. Patterns win over similar transactions.
    pub fn classify(
        &self,
        transaction: &TransactionRecord,
        patterns: &[ClassificationPattern],
        candidates: &[TransactionRecord],
    ) -> Vec<ClassificationResult> {
        let keywords = extract_keywords_with(&transaction.description, &self.rules.unbounded());
        let hits: Vec<&ClassificationPattern> = patterns
            .iter()
            .filter(|pattern| pattern.is_active)
            .filter(|pattern| pattern.expression.matches(&keywords, &transaction.description))
            .collect();

        let similar = if candidates.is_empty() {
            Vec::new()
        } else {
            self.find_similar(transaction, candidates, self.policy.default_min_confidence)
        };

        let mut results = Vec::new();
        for field in CorrectionField::ALL {
            if let Some(pattern) = best_pattern(&hits, field) {
                results.push(self.pattern_result(pattern));
            } else if let Some(result) = self.vote(field, &similar) {
                results.push(result);
            }
        }
        debug!(
            transaction_id = %transaction.id,
            pattern_hits = hits.len(),
            similar = similar.len(),
            results = results.len(),
            "classified transaction"
        );
        results
    }

    pub fn tier_for(&self, confidence: f64) -> ConfidenceTier {
        if confidence >= self.policy.high_tier_floor {
            ConfidenceTier::High
        } else if confidence >= self.policy.medium_tier_floor {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    fn score_candidate(
        &self,
        target: &TransactionRecord,
        candidate: &TransactionRecord,
    ) -> Option<MatchCandidate> {
        if candidate.id == target.id || !is_scorable(candidate) {
            return None;
        }

        let scores = FieldScores {
            origin: self.party_similarity(target.origin.as_deref(), candidate.origin.as_deref()),
            destination: self.party_similarity(
                target.destination.as_deref(),
                candidate.destination.as_deref(),
            ),
            description: field_similarity_with(
                &target.description,
                &candidate.description,
                self.policy,
                &self.rules,
            ),
        };

        let mut matched_fields = Vec::new();
        let mut similarity_sum = 0.0;
        if self.policy.party_matches(scores.origin) {
            matched_fields.push(MatchedField::Origin);
            similarity_sum += scores.origin;
        }
        if self.policy.party_matches(scores.destination) {
            matched_fields.push(MatchedField::Destination);
            similarity_sum += scores.destination;
        }
        if self.policy.description_matches(scores.description) {
            matched_fields.push(MatchedField::Description);
            similarity_sum += scores.description;
        }
        if matched_fields.is_empty() {
            return None;
        }

        let mean_similarity = similarity_sum / matched_fields.len() as f64;
        let base = self.policy.base_confidence(matched_fields.len(), mean_similarity);
        let amount_penalty = self
            .policy
            .amount_deviation_penalty(target.amount, candidate.amount);
        let confidence = (base - amount_penalty).clamp(0.0, 1.0);

        Some(MatchCandidate {
            transaction: candidate.clone(),
            scores,
            amount_penalty,
            matched_fields,
            confidence,
            tier: self.tier_for(confidence),
        })
    }

    fn party_similarity(&self, target: Option<&str>, candidate: Option<&str>) -> f64 {
        match (target, candidate) {
            (Some(target), Some(candidate)) => {
                field_similarity_with(target, candidate, self.policy, &self.rules)
            }
            _ => 0.0,
        }
    }

    fn pattern_result(&self, pattern: &ClassificationPattern) -> ClassificationResult {
        ClassificationResult {
            field: pattern.target_field,
            value: pattern.target_value.clone(),
            confidence: pattern.confidence,
            tier: self.tier_for(pattern.confidence),
            matched_fields: vec![MatchedField::Description],
            justification: format!(
                "Matched {} pattern \"{}\" (used {} times).",
                pattern.expression.kind(),
                pattern.expression.storage_text(),
                pattern.usage_count
            ),
            source: MatchSource::Pattern {
                pattern_id: pattern.pattern_id.clone(),
            },
        }
    }

    /// Values of `field` among similar transactions compete by summed
    /// confidence; the best supporting candidate carries the result.
    fn vote(&self, field: CorrectionField, similar: &[MatchCandidate]) -> Option<ClassificationResult> {
        struct Tally<'a> {
            value: &'a str,
            total: f64,
            supporters: usize,
            best: &'a MatchCandidate,
        }

        let mut tallies: Vec<Tally<'_>> = Vec::new();
        for candidate in similar {
            let Some(value) = candidate.transaction.classification_value(field) else {
                continue;
            };
            match tallies
                .iter_mut()
                .find(|tally| tally.value.eq_ignore_ascii_case(value))
            {
                Some(tally) => {
                    tally.total += candidate.confidence;
                    tally.supporters += 1;
                }
                None => tallies.push(Tally {
                    value,
                    total: candidate.confidence,
                    supporters: 1,
                    best: candidate,
                }),
            }
        }

        // Candidates arrive best first, so a tally's first supporter is its
        // strongest and ties keep the earlier tally.
        let winner = tallies.into_iter().reduce(|leader, challenger| {
            if challenger.total > leader.total {
                challenger
            } else {
                leader
            }
        })?;

        let best = winner.best;
        Some(ClassificationResult {
            field,
            value: winner.value.to_string(),
            confidence: best.confidence,
            tier: best.tier,
            matched_fields: best.matched_fields.clone(),
            justification: format!(
                "{} similar transaction(s) agree; closest is {} ({} of 3 fields matched).",
                winner.supporters,
                best.transaction.id,
                best.matched_fields.len()
            ),
            source: MatchSource::SimilarTransaction {
                transaction_id: best.transaction.id.clone(),
            },
        })
    }
}

/// Adds one use to every pattern that decided a result.
pub fn record_pattern_usage<S>(
    store: &S,
    tenant_id: &str,
    results: &[ClassificationResult],
) -> EngineResult<()>
where
    S: LearningStore + ?Sized,
{
    for result in results {
        if let MatchSource::Pattern { pattern_id } = &result.source {
            store.increment_pattern_usage(tenant_id, pattern_id)?;
        }
    }
    Ok(())
}

fn is_scorable(candidate: &TransactionRecord) -> bool {
    let present = |value: Option<&str>| value.is_some_and(|value| !value.trim().is_empty());
    !candidate.description.trim().is_empty()
        && (present(candidate.origin.as_deref()) || present(candidate.destination.as_deref()))
}

fn best_pattern<'a>(
    hits: &[&'a ClassificationPattern],
    field: CorrectionField,
) -> Option<&'a ClassificationPattern> {
    hits.iter()
        .copied()
        .filter(|pattern| pattern.target_field == field)
        .min_by(|left, right| {
            right
                .confidence
                .total_cmp(&left.confidence)
                .then_with(|| {
                    right
                        .expression
                        .specificity()
                        .cmp(&left.expression.specificity())
                })
                .then_with(|| right.usage_count.cmp(&left.usage_count))
                .then_with(|| left.created_at.cmp(&right.created_at))
                .then_with(|| left.pattern_id.cmp(&right.pattern_id))
        })
}

fn compare_candidates(left: &MatchCandidate, right: &MatchCandidate) -> Ordering {
    right
        .confidence
        .total_cmp(&left.confidence)
        .then_with(|| right.matched_fields.len().cmp(&left.matched_fields.len()))
        .then_with(|| right.transaction.date.cmp(&left.transaction.date))
        .then_with(|| left.transaction.id.cmp(&right.transaction.id))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::Matcher;
    use crate::learning::types::{
        ClassificationPattern, ConfidenceTier, CorrectionField, MatchExpression, MatchSource,
        MatchedField, TransactionRecord,
    };

    fn transaction(id: &str, description: &str, amount: f64, day: u32) -> TransactionRecord {
        TransactionRecord {
            id: id.to_string(),
            description: description.to_string(),
            origin: Some("Coinbase".to_string()),
            destination: Some("Main wallet".to_string()),
            amount,
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap_or_default(),
            entity: Some("Kraken".to_string()),
            category: Some("Crypto income".to_string()),
            subcategory: None,
        }
    }

    fn pattern(id: &str, keywords: &[&str], value: &str, confidence: f64) -> ClassificationPattern {
        ClassificationPattern {
            pattern_id: id.to_string(),
            tenant_id: "tenant_a".to_string(),
            expression: MatchExpression::Keywords {
                keywords: keywords.iter().map(|word| word.to_string()).collect(),
            },
            target_field: CorrectionField::Entity,
            target_value: value.to_string(),
            confidence,
            created_by: "seed".to_string(),
            usage_count: 0,
            is_active: true,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default(),
        }
    }

    #[test]
    fn amount_divergence_demotes_identical_text() {
        let matcher = Matcher::default();
        let target = transaction("t", "Received BTC deposit", 100.0, 10);
        let near = transaction("a", "Received BTC deposit", 140.0, 1);
        let far = transaction("b", "Received BTC deposit", 500.0, 2);

        let ranked = matcher.find_similar(&target, &[far, near], 0.0);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].transaction.id, "a");
        assert_eq!(ranked[0].tier, ConfidenceTier::High);
        assert!(ranked[1].confidence < ranked[0].confidence);
        assert!(ranked[1].amount_penalty > 0.0);
        assert_eq!(ranked[0].matched_fields.len(), ranked[1].matched_fields.len());
    }

    #[test]
    fn equal_matches_prefer_the_more_recent_date() {
        let matcher = Matcher::default();
        let target = transaction("t", "Stripe payout", 50.0, 20);
        let older = transaction("old", "Stripe payout", 50.0, 3);
        let newer = transaction("new", "Stripe payout", 50.0, 15);

        let ranked = matcher.find_similar(&target, &[older, newer], 0.3);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].transaction.id, "new");
        assert_eq!(ranked[1].transaction.id, "old");
    }

    #[test]
    fn sparse_candidates_and_the_target_itself_are_skipped() {
        let matcher = Matcher::default();
        let target = transaction("t", "Stripe payout", 50.0, 20);
        let mut sparse = transaction("sparse", "Stripe payout", 50.0, 3);
        sparse.origin = None;
        sparse.destination = Some("  ".to_string());
        let mut blank = transaction("blank", "", 50.0, 3);
        blank.description = "   ".to_string();

        let ranked = matcher.find_similar(&target, &[target.clone(), sparse, blank], 0.0);
        assert!(ranked.is_empty());
    }

    #[test]
    fn description_only_match_lands_in_low_tier() {
        let matcher = Matcher::default();
        let target = transaction("t", "Gusto payroll run", 900.0, 20);
        let mut candidate = transaction("c", "Gusto payroll run", 900.0, 3);
        candidate.origin = Some("Chase checking".to_string());
        candidate.destination = Some("Gusto".to_string());

        let ranked = matcher.find_similar(&target, &[candidate], 0.0);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].matched_fields, vec![MatchedField::Description]);
        assert_eq!(ranked[0].tier, ConfidenceTier::Low);
    }

    #[test]
    fn classify_without_inputs_is_empty() {
        let matcher = Matcher::default();
        let target = transaction("t", "Anything", 1.0, 1);
        assert!(matcher.classify(&target, &[], &[]).is_empty());
    }

    #[test]
    fn patterns_win_over_similar_transactions() {
        let matcher = Matcher::default();
        let target = transaction("t", "Received 0.2 BTC deposit", 100.0, 20);
        let mut neighbour = transaction("n", "Received BTC deposit", 100.0, 2);
        neighbour.entity = Some("Binance".to_string());
        let broad = pattern("pat_broad", &["received"], "Generic exchange", 0.9);
        let specific = pattern("pat_specific", &["received", "btc"], "Kraken", 0.9);
        let inactive = {
            let mut inactive = pattern("pat_off", &["received", "btc"], "Old", 0.99);
            inactive.is_active = false;
            inactive
        };

        let results = matcher.classify(&target, &[broad, specific, inactive], &[neighbour]);
        let entity = results
            .iter()
            .find(|result| result.field == CorrectionField::Entity);
        assert!(entity.is_some());
        if let Some(entity) = entity {
            assert_eq!(entity.value, "Kraken");
            assert_eq!(
                entity.source,
                MatchSource::Pattern {
                    pattern_id: "pat_specific".to_string()
                }
            );
        }
        let category = results
            .iter()
            .find(|result| result.field == CorrectionField::Category);
        assert!(matches!(
            category.map(|result| &result.source),
            Some(MatchSource::SimilarTransaction { transaction_id }) if transaction_id == "n"
        ));
    }
}
