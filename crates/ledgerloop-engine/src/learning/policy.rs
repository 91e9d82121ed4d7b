use std::time::Duration;

/// Learning-loop policy identifier.
///
/// Emitted with scan, validation and classification results so threshold
/// changes remain auditable across stored suggestions and patterns.
pub const LEARNING_POLICY_VERSION: &str = "learning/v1";

/// v1 learning and matching policy.
///
/// Notes:
/// - `amount_ratio_limit` and `amount_penalty` were read off production
///   matching behavior and are tunable defaults, not calibrated constants.
/// - Tier bands are inclusive on their lower bound.
#[derive(Debug, Clone, Copy)]
pub struct LearningPolicy {
    pub aggregation_threshold: i64,
    pub validation_batch_size: usize,
    pub llm_timeout: Duration,
    pub max_keywords: usize,
    pub min_keyword_len: usize,
    pub description_match_threshold: f64,
    pub substring_score: f64,
    pub keyword_overlap_ceiling: f64,
    pub amount_ratio_limit: f64,
    pub amount_penalty: f64,
    pub high_tier_floor: f64,
    pub medium_tier_floor: f64,
    pub low_tier_floor: f64,
    pub default_min_confidence: f64,
    pub max_prompt_samples: usize,
}

impl LearningPolicy {
    /// Base confidence for a candidate with `matched` fields out of three,
    /// interpolated inside the tier band by the mean similarity of the
    /// matched fields.
    pub fn base_confidence(self, matched: usize, mean_similarity: f64) -> f64 {
        let (floor, ceiling) = match matched {
            0 => return 0.0,
            1 => (self.low_tier_floor, self.medium_tier_floor - 0.01),
            2 => (self.medium_tier_floor, self.high_tier_floor - 0.01),
            _ => (self.high_tier_floor, 1.0),
        };
        let fit = mean_similarity.clamp(0.0, 1.0);
        floor + (ceiling - floor) * fit
    }

    /// Penalty applied when two amounts diverge by more than the ratio limit.
    pub fn amount_deviation_penalty(self, target: f64, candidate: f64) -> f64 {
        let target_abs = target.abs();
        let candidate_abs = candidate.abs();
        if target_abs == 0.0 && candidate_abs == 0.0 {
            return 0.0;
        }
        let smaller = target_abs.min(candidate_abs);
        let larger = target_abs.max(candidate_abs);
        if smaller == 0.0 || larger / smaller > self.amount_ratio_limit {
            return self.amount_penalty;
        }
        0.0
    }

    pub fn description_matches(self, similarity: f64) -> bool {
        similarity >= self.description_match_threshold
    }

    /// Origin and destination only count on exact or substring agreement.
    pub fn party_matches(self, similarity: f64) -> bool {
        similarity >= self.substring_score
    }
}

pub const LEARNING_POLICY_V1: LearningPolicy = LearningPolicy {
    aggregation_threshold: 3,
    validation_batch_size: 30,
    llm_timeout: Duration::from_secs(30),
    max_keywords: 5,
    min_keyword_len: 3,
    description_match_threshold: 0.7,
    substring_score: 0.85,
    keyword_overlap_ceiling: 0.8,
    amount_ratio_limit: 2.0,
    amount_penalty: 0.3,
    high_tier_floor: 0.8,
    medium_tier_floor: 0.5,
    low_tier_floor: 0.3,
    default_min_confidence: 0.3,
    max_prompt_samples: 5,
};
