use serde::Serialize;

use crate::learning::config::SettingValue;
use crate::learning::notify::StoredNotification;
use crate::learning::seed::SeedOutcome;
use crate::learning::types::{
    ClassificationEvent, ClassificationPattern, ClassificationResult, MatchCandidate,
    PatternSuggestion,
};
use crate::learning::validator::ValidationRun;

#[derive(Debug, Clone, Serialize)]
pub struct CorrectionRecordData {
    pub policy_version: String,
    pub event: ClassificationEvent,
    pub noop: bool,
    pub suggestion: Option<PatternSuggestion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestionScanData {
    pub policy_version: String,
    pub tenant_id: String,
    pub aggregation_threshold: i64,
    pub pending: Vec<PatternSuggestion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestionListData {
    pub tenant_id: String,
    pub status: Option<String>,
    pub suggestions: Vec<PatternSuggestion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestionValidateData {
    pub policy_version: String,
    pub tenant_id: String,
    pub batch_size: usize,
    #[serde(flatten)]
    pub run: ValidationRun,
    pub still_pending: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternListData {
    pub tenant_id: String,
    pub include_inactive: bool,
    pub patterns: Vec<ClassificationPattern>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternSeedData {
    pub tenant_id: String,
    pub path: String,
    #[serde(flatten)]
    pub outcome: SeedOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternDeactivateData {
    pub tenant_id: String,
    pub pattern_id: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyData {
    pub policy_version: String,
    pub tenant_id: String,
    pub transaction_id: String,
    pub candidate_count: usize,
    pub results: Vec<ClassificationResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarData {
    pub policy_version: String,
    pub tenant_id: String,
    pub transaction_id: String,
    pub min_confidence: f64,
    pub matches: Vec<MatchCandidate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingRow {
    pub key: String,
    pub value: SettingValue,
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingsShowData {
    pub tenant_id: String,
    pub settings: Vec<SettingRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingUpdateData {
    pub tenant_id: String,
    pub key: String,
    pub value: SettingValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationListData {
    pub tenant_id: String,
    pub notifications: Vec<StoredNotification>,
}
