use std::path::Path;

use crate::EngineResult;
use crate::commands::common::{TenantSession, read_json_file, require_unit_interval};
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::{ClassifyData, SimilarData};
use crate::learning::matcher::{Matcher, record_pattern_usage};
use crate::learning::policy::LEARNING_POLICY_VERSION;
use crate::learning::types::TransactionRecord;
use crate::store::LearningStore;

#[derive(Debug, Default)]
pub struct ClassifyOptions<'a> {
    pub tenant_id: String,
    pub transaction_path: String,
    pub candidates_path: Option<String>,
    pub home_override: Option<&'a Path>,
}

#[derive(Debug, Default)]
pub struct SimilarOptions<'a> {
    pub tenant_id: String,
    pub transaction_path: String,
    pub candidates_path: String,
    pub min_confidence: Option<f64>,
    pub home_override: Option<&'a Path>,
}

/// Classifies one transaction against the tenant's active patterns and,
/// when given, a file of already classified transactions.
pub fn classify_with_options(options: ClassifyOptions<'_>) -> EngineResult<SuccessEnvelope> {
    let transaction: TransactionRecord = read_json_file(Path::new(&options.transaction_path))?;
    let candidates: Vec<TransactionRecord> = match options.candidates_path.as_deref() {
        Some(path) => read_json_file(Path::new(path))?,
        None => Vec::new(),
    };

    let mut session = TenantSession::open(&options.tenant_id, options.home_override)?;
    let settings = session.settings()?;
    let patterns = session.store.patterns(&session.tenant_id, false)?;
    let matcher = Matcher::new(settings.policy(), settings.keyword_rules());

    let results = matcher.classify(&transaction, &patterns, &candidates);
    record_pattern_usage(&session.store, &session.tenant_id, &results)?;

    success(
        "classify",
        ClassifyData {
            policy_version: LEARNING_POLICY_VERSION.to_string(),
            tenant_id: session.tenant_id.clone(),
            transaction_id: transaction.id,
            candidate_count: candidates.len(),
            results,
        },
    )
}

pub fn similar_with_options(options: SimilarOptions<'_>) -> EngineResult<SuccessEnvelope> {
    if let Some(min_confidence) = options.min_confidence {
        require_unit_interval("--min-confidence", min_confidence)?;
    }
    let transaction: TransactionRecord = read_json_file(Path::new(&options.transaction_path))?;
    let candidates: Vec<TransactionRecord> = read_json_file(Path::new(&options.candidates_path))?;

    let mut session = TenantSession::open(&options.tenant_id, options.home_override)?;
    let settings = session.settings()?;
    let min_confidence = options
        .min_confidence
        .unwrap_or(settings.min_match_confidence);
    let matcher = Matcher::new(settings.policy(), settings.keyword_rules());
    let matches = matcher.find_similar(&transaction, &candidates, min_confidence);

    success(
        "similar",
        SimilarData {
            policy_version: LEARNING_POLICY_VERSION.to_string(),
            tenant_id: session.tenant_id.clone(),
            transaction_id: transaction.id,
            min_confidence,
            matches,
        },
    )
}
