use std::collections::BTreeSet;

use crate::learning::policy::{LEARNING_POLICY_V1, LearningPolicy};

/// Articles, prepositions and banking boilerplate that carry no signal about
/// who or what a transaction is.
pub const DEFAULT_STOP_WORDS: [&str; 40] = [
    "the", "and", "for", "from", "with", "via", "into", "onto", "per", "por", "para", "des",
    "del", "los", "las", "une", "das", "der", "die", "von", "pos", "debit", "credit", "card",
    "purchase", "ach", "online", "payment", "transfer", "transaction", "txn", "trx", "ref",
    "reference", "auth", "pending", "visa", "withdrawal", "atm", "check",
];

/// Keyword extraction knobs. Tenants may extend the stop-word list.
#[derive(Debug, Clone)]
pub struct KeywordRules {
    pub min_token_len: usize,
    pub max_keywords: usize,
    extra_stop_words: BTreeSet<String>,
}

impl Default for KeywordRules {
    fn default() -> Self {
        Self::from_policy(LEARNING_POLICY_V1)
    }
}

impl KeywordRules {
    pub fn from_policy(policy: LearningPolicy) -> Self {
        Self {
            min_token_len: policy.min_keyword_len,
            max_keywords: policy.max_keywords,
            extra_stop_words: BTreeSet::new(),
        }
    }

    pub fn with_extra_stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for word in words {
            let normalized = word.as_ref().trim().to_lowercase();
            if !normalized.is_empty() {
                self.extra_stop_words.insert(normalized);
            }
        }
        self
    }

    /// Same stop words, no truncation. Used for overlap scoring.
    pub fn unbounded(&self) -> Self {
        Self {
            max_keywords: usize::MAX,
            ..self.clone()
        }
    }

    fn is_stop_word(&self, token: &str) -> bool {
        DEFAULT_STOP_WORDS.contains(&token) || self.extra_stop_words.contains(token)
    }
}

/// Ordered, stop-word-filtered, number-stripped keywords of `text`.
///
/// Order follows the input and must never be sorted: the joined sequence is
/// shown to people as the pattern's match expression.
pub fn extract_keywords(text: &str) -> Vec<String> {
    extract_keywords_with(text, &KeywordRules::default())
}

pub fn extract_keywords_with(text: &str, rules: &KeywordRules) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for token in tokenize(text) {
        if keywords.len() >= rules.max_keywords {
            break;
        }
        if token.chars().count() < rules.min_token_len
            || is_numeric_token(&token)
            || rules.is_stop_word(&token)
            || keywords.contains(&token)
        {
            continue;
        }
        keywords.push(token);
    }
    keywords
}

/// Grouping key form of the keywords; `None` when nothing significant is left.
pub fn keyword_signature(text: &str, rules: &KeywordRules) -> Option<String> {
    let keywords = extract_keywords_with(text, rules);
    if keywords.is_empty() {
        return None;
    }
    Some(keywords.join(" "))
}

pub fn field_similarity(a: &str, b: &str) -> f64 {
    field_similarity_with(a, b, LEARNING_POLICY_V1, &KeywordRules::default())
}

/// Similarity in `[0, 1]`: exact (case-insensitive) is 1.0, containment is
/// the policy's substring score, otherwise keyword overlap scaled under the
/// overlap ceiling.
pub fn field_similarity_with(
    a: &str,
    b: &str,
    policy: LearningPolicy,
    rules: &KeywordRules,
) -> f64 {
    let left = collapse_whitespace(a);
    let right = collapse_whitespace(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    if left == right {
        return 1.0;
    }
    if left.contains(&right) || right.contains(&left) {
        return policy.substring_score;
    }

    let unbounded = rules.unbounded();
    let left_keywords: BTreeSet<String> = extract_keywords_with(&left, &unbounded)
        .into_iter()
        .collect();
    let right_keywords: BTreeSet<String> = extract_keywords_with(&right, &unbounded)
        .into_iter()
        .collect();
    let shared = left_keywords.intersection(&right_keywords).count();
    if shared == 0 {
        return 0.0;
    }
    let union = left_keywords.union(&right_keywords).count();
    policy.keyword_overlap_ceiling * (shared as f64) / (union as f64)
}

fn tokenize(text: &str) -> Vec<String> {
    let mut cleaned = String::with_capacity(text.len());
    for character in text.chars() {
        if character.is_alphanumeric() {
            cleaned.extend(character.to_lowercase());
        } else {
            cleaned.push(' ');
        }
    }
    cleaned
        .split_whitespace()
        .map(std::string::ToString::to_string)
        .collect()
}

fn collapse_whitespace(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .to_lowercase()
}

/// Pure digit runs, and reference-like tokens that are mostly digits.
fn is_numeric_token(token: &str) -> bool {
    let digits = token.chars().filter(char::is_ascii_digit).count();
    digits > 0 && digits * 2 >= token.chars().count()
}

#[cfg(test)]
mod tests {
    use super::{
        KeywordRules, extract_keywords, extract_keywords_with, field_similarity, keyword_signature,
    };

    #[test]
    fn keywords_preserve_input_order() {
        let keywords = extract_keywords("Received Bitcoin deposit from external");
        assert_eq!(keywords, vec!["received", "bitcoin", "deposit", "external"]);

        let mut sorted = keywords.clone();
        sorted.sort();
        assert_ne!(keywords, sorted);
    }

    #[test]
    fn numeric_amounts_do_not_change_the_signature() {
        let rules = KeywordRules::default();
        let first = keyword_signature("Received 0.00695 BTC", &rules);
        let second = keyword_signature("Received 0.00705 BTC", &rules);
        assert_eq!(first, Some("received btc".to_string()));
        assert_eq!(first, second);
    }

    #[test]
    fn keywords_truncate_to_leading_significant_words() {
        let keywords =
            extract_keywords("Monthly hosting invoice acme cloud services europe region");
        assert_eq!(
            keywords,
            vec!["monthly", "hosting", "invoice", "acme", "cloud"]
        );
    }

    #[test]
    fn boilerplate_short_tokens_and_references_are_dropped() {
        let keywords = extract_keywords("POS DEBIT CARD PURCHASE at NETFLIX.COM #1234 ref99812a");
        assert_eq!(keywords, vec!["netflix", "com"]);
    }

    #[test]
    fn repeated_tokens_keep_first_position_only() {
        let keywords = extract_keywords("uber uber eats uber");
        assert_eq!(keywords, vec!["uber", "eats"]);
    }

    #[test]
    fn tenant_stop_words_extend_the_defaults() {
        let rules = KeywordRules::default().with_extra_stop_words(["Pix", " recebido "]);
        let keywords = extract_keywords_with("PIX RECEBIDO Maria Silva", &rules);
        assert_eq!(keywords, vec!["maria", "silva"]);
    }

    #[test]
    fn signature_is_none_when_only_noise_remains() {
        let rules = KeywordRules::default();
        assert_eq!(keyword_signature("ACH PAYMENT 12345", &rules), None);
        assert_eq!(keyword_signature("   ", &rules), None);
    }

    #[test]
    fn exact_match_ignores_case_and_spacing() {
        assert_eq!(field_similarity("Coinbase  Wallet", "coinbase wallet"), 1.0);
    }

    #[test]
    fn substring_match_is_high_but_never_exact() {
        let score = field_similarity("Coinbase", "Coinbase Wallet 3f9a");
        assert!(score > 0.8);
        assert!(score < 1.0);
    }

    #[test]
    fn keyword_overlap_scores_partial_agreement_and_disjoint_is_zero() {
        let overlap = field_similarity("Received 0.00695 BTC", "Received 0.00705 BTC");
        assert!(overlap >= 0.7);
        assert!(overlap < 0.85);

        let partial = field_similarity("Stripe payout acme", "Stripe refund globex");
        assert!(partial > 0.0);
        assert!(partial < 0.7);

        assert_eq!(field_similarity("Payroll", "Groceries"), 0.0);
        assert_eq!(field_similarity("", "Groceries"), 0.0);
    }
}
