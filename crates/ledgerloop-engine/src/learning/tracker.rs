use tracing::{debug, warn};

use crate::error::CorrectionIssue;
use crate::learning::types::{ClassificationEvent, NewCorrection};
use crate::store::LearningStore;
use crate::{EngineError, EngineResult};

const MAX_VALUE_CHARS: usize = 512;
const MAX_DESCRIPTION_CHARS: usize = 2_048;

/// Appends one user correction to the tenant's event log.
///
/// Every valid correction is stored, including ones whose new value equals
/// the old value; those are flagged here and skipped by aggregation.
pub fn record_correction<S>(store: &S, correction: NewCorrection) -> EngineResult<ClassificationEvent>
where
    S: LearningStore + ?Sized,
{
    let correction = normalize_correction(correction)?;
    let event = store.append_event(&correction)?;

    if event.is_noop() {
        warn!(
            tenant_id = %event.tenant_id,
            event_id = %event.event_id,
            field = event.field.as_str(),
            "correction leaves value unchanged; excluded from pattern counting"
        );
    } else {
        debug!(
            tenant_id = %event.tenant_id,
            event_id = %event.event_id,
            field = event.field.as_str(),
            "correction recorded"
        );
    }
    Ok(event)
}

fn normalize_correction(correction: NewCorrection) -> EngineResult<NewCorrection> {
    let tenant_id = required(&correction.tenant_id, CorrectionIssue::MissingTenant)?;
    let transaction_ref = required(
        &correction.transaction_ref,
        CorrectionIssue::MissingTransactionRef,
    )?;
    let description = required(&correction.description, CorrectionIssue::MissingDescription)?;
    let new_value = required(&correction.new_value, CorrectionIssue::MissingNewValue)?;
    let actor = required(&correction.actor, CorrectionIssue::MissingActor)?;
    let old_value = optional(correction.old_value.as_deref());
    let origin = optional(correction.origin.as_deref());
    let destination = optional(correction.destination.as_deref());

    if description.chars().count() > MAX_DESCRIPTION_CHARS
        || [Some(&new_value), old_value.as_ref(), origin.as_ref(), destination.as_ref()]
            .into_iter()
            .flatten()
            .any(|value| value.chars().count() > MAX_VALUE_CHARS)
    {
        return Err(EngineError::invalid_correction(CorrectionIssue::ValueTooLong));
    }

    Ok(NewCorrection {
        tenant_id,
        transaction_ref,
        field: correction.field,
        old_value,
        new_value,
        description,
        origin,
        destination,
        actor,
    })
}

fn required(value: &str, issue: CorrectionIssue) -> EngineResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::invalid_correction(issue));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(std::string::ToString::to_string)
}
