use std::path::Path;

use crate::commands::common::TenantSession;
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::{SuggestionListData, SuggestionScanData, SuggestionValidateData};
use crate::learning::aggregate::scan_pending_groups;
use crate::learning::llm::LlmClient;
use crate::learning::policy::LEARNING_POLICY_VERSION;
use crate::learning::types::SuggestionStatus;
use crate::learning::validator::Validator;
use crate::store::LearningStore;
use crate::{EngineError, EngineResult};

const MAX_VALIDATION_BATCH: usize = 30;

#[derive(Debug, Default)]
pub struct SuggestionScanOptions<'a> {
    pub tenant_id: String,
    pub home_override: Option<&'a Path>,
}

#[derive(Debug, Default)]
pub struct SuggestionListOptions<'a> {
    pub tenant_id: String,
    pub status: Option<String>,
    pub home_override: Option<&'a Path>,
}

#[derive(Debug, Default)]
pub struct SuggestionValidateOptions<'a> {
    pub tenant_id: String,
    pub limit: Option<usize>,
    pub home_override: Option<&'a Path>,
}

pub fn scan_with_options(options: SuggestionScanOptions<'_>) -> EngineResult<SuccessEnvelope> {
    let mut session = TenantSession::open(&options.tenant_id, options.home_override)?;
    let settings = session.settings()?;
    let pending = scan_pending_groups(
        &session.store,
        &session.tenant_id,
        settings.aggregation_threshold,
        &settings.keyword_rules(),
    )?;

    success(
        "suggestions scan",
        SuggestionScanData {
            policy_version: LEARNING_POLICY_VERSION.to_string(),
            tenant_id: session.tenant_id,
            aggregation_threshold: settings.aggregation_threshold,
            pending,
        },
    )
}

pub fn list_with_options(options: SuggestionListOptions<'_>) -> EngineResult<SuccessEnvelope> {
    let status = match options.status.as_deref() {
        Some(raw) => Some(SuggestionStatus::parse(raw.trim()).ok_or_else(|| {
            EngineError::invalid_argument_with_recovery(
                &format!("Unknown suggestion status `{raw}`."),
                vec!["Use one of: pending, approved, rejected.".to_string()],
            )
        })?),
        None => None,
    };
    let session = TenantSession::open(&options.tenant_id, options.home_override)?;
    let suggestions = session.store.list_suggestions(&session.tenant_id, status)?;

    success(
        "suggestions list",
        SuggestionListData {
            tenant_id: session.tenant_id,
            status: status.map(|status| status.as_str().to_string()),
            suggestions,
        },
    )
}

/// Runs one validation batch against `llm`. LLM trouble never fails the
/// command; it shows up as deferred suggestions.
pub async fn validate_with_options<C>(
    options: SuggestionValidateOptions<'_>,
    llm: &C,
) -> EngineResult<SuccessEnvelope>
where
    C: LlmClient,
{
    if let Some(limit) = options.limit
        && !(1..=MAX_VALIDATION_BATCH).contains(&limit)
    {
        return Err(EngineError::invalid_argument(
            "`--limit` must be between 1 and 30.",
        ));
    }
    let mut session = TenantSession::open(&options.tenant_id, options.home_override)?;
    let settings = session.settings()?;
    let mut policy = settings.policy();
    policy.validation_batch_size = options
        .limit
        .unwrap_or(policy.validation_batch_size)
        .min(MAX_VALIDATION_BATCH);

    let validator = Validator {
        store: &session.store,
        llm,
        notifications: &session.store,
        business: &session.store,
        policy,
    };
    let run = validator.validate_pending(&session.tenant_id).await?;
    let still_pending = session
        .store
        .list_suggestions(&session.tenant_id, Some(SuggestionStatus::Pending))?
        .len();

    success(
        "suggestions validate",
        SuggestionValidateData {
            policy_version: LEARNING_POLICY_VERSION.to_string(),
            tenant_id: session.tenant_id.clone(),
            batch_size: policy.validation_batch_size,
            run,
            still_pending,
        },
    )
}
