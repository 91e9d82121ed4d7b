use std::path::Path;

use crate::commands::common::{TenantSession, read_json_file};
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::{PatternDeactivateData, PatternListData, PatternSeedData};
use crate::learning::seed::{PatternSeed, seed_patterns};
use crate::store::LearningStore;
use crate::{EngineError, EngineResult};

#[derive(Debug, Default)]
pub struct PatternListOptions<'a> {
    pub tenant_id: String,
    pub include_inactive: bool,
    pub home_override: Option<&'a Path>,
}

#[derive(Debug, Default)]
pub struct PatternSeedOptions<'a> {
    pub tenant_id: String,
    pub path: String,
    pub home_override: Option<&'a Path>,
}

#[derive(Debug, Default)]
pub struct PatternDeactivateOptions<'a> {
    pub tenant_id: String,
    pub pattern_id: String,
    pub home_override: Option<&'a Path>,
}

pub fn list_with_options(options: PatternListOptions<'_>) -> EngineResult<SuccessEnvelope> {
    let session = TenantSession::open(&options.tenant_id, options.home_override)?;
    let patterns = session
        .store
        .patterns(&session.tenant_id, options.include_inactive)?;

    success(
        "patterns list",
        PatternListData {
            tenant_id: session.tenant_id,
            include_inactive: options.include_inactive,
            patterns,
        },
    )
}

pub fn seed_with_options(options: PatternSeedOptions<'_>) -> EngineResult<SuccessEnvelope> {
    let seeds: Vec<PatternSeed> = read_json_file(Path::new(&options.path))?;
    let mut session = TenantSession::open(&options.tenant_id, options.home_override)?;
    let rules = session.settings()?.keyword_rules();
    let outcome = seed_patterns(&session.store, &session.tenant_id, &seeds, &rules)?;

    success(
        "patterns seed",
        PatternSeedData {
            tenant_id: session.tenant_id,
            path: options.path,
            outcome,
        },
    )
}

pub fn deactivate_with_options(
    options: PatternDeactivateOptions<'_>,
) -> EngineResult<SuccessEnvelope> {
    let pattern_id = options.pattern_id.trim();
    let session = TenantSession::open(&options.tenant_id, options.home_override)?;
    if !session
        .store
        .deactivate_pattern(&session.tenant_id, pattern_id)?
    {
        return Err(EngineError::pattern_not_found(pattern_id));
    }

    success(
        "patterns deactivate",
        PatternDeactivateData {
            tenant_id: session.tenant_id.clone(),
            pattern_id: pattern_id.to_string(),
            is_active: false,
        },
    )
}
