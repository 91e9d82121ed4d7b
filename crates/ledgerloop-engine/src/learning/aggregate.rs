use std::collections::HashMap;

use tracing::{debug, info};

use crate::EngineResult;
use crate::learning::keywords::{KeywordRules, extract_keywords_with};
use crate::learning::types::{ClassificationEvent, CorrectionField, PatternSuggestion};
use crate::store::{LearningStore, SuggestionDraft};

/// Identity of a group of corrections that may become one suggestion.
///
/// Descriptions only group on equal keyword sequences, so amounts embedded
/// in the text never split a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub field: CorrectionField,
    pub target_value: String,
    pub keywords: Vec<String>,
    pub origin: String,
    pub destination: String,
}

impl GroupKey {
    /// `None` for no-op corrections and for descriptions with no
    /// significant keywords; neither can count toward a pattern.
    pub fn for_event(event: &ClassificationEvent, rules: &KeywordRules) -> Option<Self> {
        if event.is_noop() {
            return None;
        }
        let keywords = extract_keywords_with(&event.description, rules);
        if keywords.is_empty() {
            return None;
        }
        Some(Self {
            field: event.field,
            target_value: event.new_value.trim().to_string(),
            keywords,
            origin: normalize_party(event.origin.as_deref()),
            destination: normalize_party(event.destination.as_deref()),
        })
    }

    pub fn signature(&self) -> String {
        self.keywords.join(" ")
    }
}

struct Group<'a> {
    key: GroupKey,
    events: Vec<&'a ClassificationEvent>,
}

impl Group<'_> {
    fn draft(&self, tenant_id: &str) -> Option<SuggestionDraft> {
        let first = self.events.first()?;
        Some(SuggestionDraft {
            tenant_id: tenant_id.to_string(),
            pattern_type: self.key.field,
            keywords: self.key.keywords.clone(),
            target_value: self.key.target_value.clone(),
            origin: self.key.origin.clone(),
            destination: self.key.destination.clone(),
            event_ids: self
                .events
                .iter()
                .map(|event| event.event_id.clone())
                .collect(),
            first_event_at: first.created_at,
        })
    }
}

/// Checks the group of a freshly recorded event and writes or grows its
/// suggestion once the group reaches `threshold` distinct events.
///
/// Returns the suggestion only while it is still pending.
pub fn evaluate_new_event<S>(
    store: &S,
    event: &ClassificationEvent,
    threshold: i64,
    rules: &KeywordRules,
) -> EngineResult<Option<PatternSuggestion>>
where
    S: LearningStore + ?Sized,
{
    let Some(key) = GroupKey::for_event(event, rules) else {
        debug!(
            tenant_id = %event.tenant_id,
            event_id = %event.event_id,
            "event does not contribute to any group"
        );
        return Ok(None);
    };

    let siblings = store.events_for_target(&event.tenant_id, event.field, &key.target_value)?;
    let mut groups = group_events(&siblings, rules);
    let Some(index) = groups.iter().position(|group| group.key == key) else {
        return Ok(None);
    };
    let group = groups.swap_remove(index);
    promote_group(store, &event.tenant_id, &group, threshold)
}

/// Re-aggregates every event of the tenant. Eligible groups are written in
/// the order of their earliest event; only still-pending suggestions are
/// returned.
pub fn scan_pending_groups<S>(
    store: &S,
    tenant_id: &str,
    threshold: i64,
    rules: &KeywordRules,
) -> EngineResult<Vec<PatternSuggestion>>
where
    S: LearningStore + ?Sized,
{
    let events = store.tenant_events(tenant_id)?;
    let groups = group_events(&events, rules);

    let mut pending = Vec::new();
    for group in &groups {
        if let Some(suggestion) = promote_group(store, tenant_id, group, threshold)? {
            pending.push(suggestion);
        }
    }
    debug!(
        tenant_id,
        groups = groups.len(),
        pending = pending.len(),
        "scanned correction groups"
    );
    Ok(pending)
}

/// Groups in order of first appearance; `events` must be in creation order.
fn group_events<'a>(events: &'a [ClassificationEvent], rules: &KeywordRules) -> Vec<Group<'a>> {
    let mut groups: Vec<Group<'a>> = Vec::new();
    let mut index_by_key: HashMap<GroupKey, usize> = HashMap::new();

    for event in events {
        let Some(key) = GroupKey::for_event(event, rules) else {
            continue;
        };
        match index_by_key.get(&key) {
            Some(&index) => {
                let group = &mut groups[index];
                if !group
                    .events
                    .iter()
                    .any(|existing| existing.event_id == event.event_id)
                {
                    group.events.push(event);
                }
            }
            None => {
                index_by_key.insert(key.clone(), groups.len());
                groups.push(Group {
                    key,
                    events: vec![event],
                });
            }
        }
    }
    groups
}

fn promote_group<S>(
    store: &S,
    tenant_id: &str,
    group: &Group<'_>,
    threshold: i64,
) -> EngineResult<Option<PatternSuggestion>>
where
    S: LearningStore + ?Sized,
{
    let count = i64::try_from(group.events.len()).unwrap_or(i64::MAX);
    if count < threshold.max(1) {
        return Ok(None);
    }
    let Some(draft) = group.draft(tenant_id) else {
        return Ok(None);
    };

    let stored = store.upsert_pending_suggestion(&draft)?;
    if stored.status.is_decided() {
        debug!(
            tenant_id,
            suggestion_id = %stored.suggestion_id,
            status = stored.status.as_str(),
            "group already decided; not re-triggering"
        );
        return Ok(None);
    }

    info!(
        tenant_id,
        suggestion_id = %stored.suggestion_id,
        occurrence_count = stored.occurrence_count,
        signature = %group.key.signature(),
        "pattern suggestion pending"
    );
    Ok(Some(stored))
}

fn normalize_party(value: Option<&str>) -> String {
    value
        .map(|value| value.trim().to_lowercase())
        .unwrap_or_default()
}
