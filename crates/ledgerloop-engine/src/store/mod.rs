mod notifications;
mod settings;
mod sqlite;

use chrono::{DateTime, Utc};

use crate::EngineResult;
use crate::learning::types::{
    ClassificationEvent, ClassificationPattern, CorrectionField, NewCorrection, NewPattern,
    PatternSuggestion, SuggestionStatus,
};

pub use sqlite::SqliteStore;

/// Aggregated group ready to be written as (or merged into) a pending
/// suggestion.
#[derive(Debug, Clone)]
pub struct SuggestionDraft {
    pub tenant_id: String,
    pub pattern_type: CorrectionField,
    pub keywords: Vec<String>,
    pub target_value: String,
    pub origin: String,
    pub destination: String,
    pub event_ids: Vec<String>,
    pub first_event_at: DateTime<Utc>,
}

/// A rejection. Approvals go through `LearningStore::approve_suggestion`
/// because they must materialize a pattern in the same write.
#[derive(Debug, Clone)]
pub struct SuggestionDecision {
    pub status: SuggestionStatus,
    pub confidence: f64,
    pub justification: String,
}

/// Pattern behind an approved suggestion.
#[derive(Debug, Clone)]
pub struct ApprovedPattern {
    pub pattern: ClassificationPattern,
    pub created: bool,
    pub reactivated: bool,
}

/// Persistence boundary of the learning loop.
///
/// Implementations must make `upsert_pending_suggestion` and
/// `insert_pattern_if_absent` safe under concurrent writers, and must only
/// let `decide_suggestion` or `approve_suggestion` move a suggestion out of
/// `pending` once.
pub trait LearningStore {
    fn append_event(&self, correction: &NewCorrection) -> EngineResult<ClassificationEvent>;

    /// Every event of the tenant in creation order.
    fn tenant_events(&self, tenant_id: &str) -> EngineResult<Vec<ClassificationEvent>>;

    /// Events of the tenant that set `field` to `new_value`, in creation order.
    fn events_for_target(
        &self,
        tenant_id: &str,
        field: CorrectionField,
        new_value: &str,
    ) -> EngineResult<Vec<ClassificationEvent>>;

    fn events_by_ids(
        &self,
        tenant_id: &str,
        event_ids: &[String],
    ) -> EngineResult<Vec<ClassificationEvent>>;

    /// Creates the suggestion for the draft's group, or grows the occurrence
    /// data of a still-pending one. Returns the row as stored afterwards,
    /// which may already be decided.
    fn upsert_pending_suggestion(&self, draft: &SuggestionDraft)
    -> EngineResult<PatternSuggestion>;

    fn suggestion(
        &self,
        tenant_id: &str,
        suggestion_id: &str,
    ) -> EngineResult<Option<PatternSuggestion>>;

    fn list_suggestions(
        &self,
        tenant_id: &str,
        status: Option<SuggestionStatus>,
    ) -> EngineResult<Vec<PatternSuggestion>>;

    /// Oldest-first pending suggestions, at most `limit`.
    fn pending_suggestions(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> EngineResult<Vec<PatternSuggestion>>;

    fn record_validation_failure(&self, suggestion_id: &str, detail: &str) -> EngineResult<()>;

    /// Rejects a pending suggestion. Returns `false` when the suggestion was
    /// no longer pending.
    fn decide_suggestion(
        &self,
        suggestion_id: &str,
        decision: &SuggestionDecision,
    ) -> EngineResult<bool>;

    /// Claims a pending suggestion as approved and materializes its pattern
    /// in one write; a deactivated pattern with the same key is switched back
    /// on. Returns `None`, having written nothing, when the suggestion was no
    /// longer pending.
    fn approve_suggestion(
        &self,
        suggestion_id: &str,
        justification: &str,
        pattern: &NewPattern,
    ) -> EngineResult<Option<ApprovedPattern>>;

    /// Returns the stored pattern and whether this call created it.
    fn insert_pattern_if_absent(
        &self,
        pattern: &NewPattern,
    ) -> EngineResult<(ClassificationPattern, bool)>;

    fn patterns(
        &self,
        tenant_id: &str,
        include_inactive: bool,
    ) -> EngineResult<Vec<ClassificationPattern>>;

    fn pattern(&self, tenant_id: &str, pattern_id: &str)
    -> EngineResult<Option<ClassificationPattern>>;

    /// Returns `false` when no such pattern exists for the tenant.
    fn deactivate_pattern(&self, tenant_id: &str, pattern_id: &str) -> EngineResult<bool>;

    fn increment_pattern_usage(&self, tenant_id: &str, pattern_id: &str) -> EngineResult<()>;
}
