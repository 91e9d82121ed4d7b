use std::path::Path;

use crate::commands::common::TenantSession;
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::CorrectionRecordData;
use crate::learning::aggregate::evaluate_new_event;
use crate::learning::policy::LEARNING_POLICY_VERSION;
use crate::learning::tracker::record_correction;
use crate::learning::types::{CorrectionField, NewCorrection};
use crate::{EngineError, EngineResult};

#[derive(Debug, Default)]
pub struct CorrectionRecordOptions<'a> {
    pub tenant_id: String,
    pub transaction_ref: String,
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: String,
    pub description: String,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub actor: String,
    pub home_override: Option<&'a Path>,
}

/// Records the correction and checks its group against the tenant's
/// aggregation threshold in one write; if aggregation fails the event is not
/// kept, so the caller can retry.
pub fn record_with_options(options: CorrectionRecordOptions<'_>) -> EngineResult<SuccessEnvelope> {
    let Some(field) = CorrectionField::parse(&options.field) else {
        return Err(EngineError::invalid_correction_field(&options.field));
    };
    let mut session = TenantSession::open(&options.tenant_id, options.home_override)?;
    let settings = session.settings()?;

    let transaction = session.store.begin_immediate()?;
    let event = record_correction(
        &session.store,
        NewCorrection {
            tenant_id: session.tenant_id.clone(),
            transaction_ref: options.transaction_ref,
            field,
            old_value: options.old_value,
            new_value: options.new_value,
            description: options.description,
            origin: options.origin,
            destination: options.destination,
            actor: options.actor,
        },
    )?;
    let suggestion = evaluate_new_event(
        &session.store,
        &event,
        settings.aggregation_threshold,
        &settings.keyword_rules(),
    )?;
    transaction
        .commit()
        .map_err(|error| session.store.sqlite_error(&error))?;

    success(
        "correction record",
        CorrectionRecordData {
            policy_version: LEARNING_POLICY_VERSION.to_string(),
            noop: event.is_noop(),
            event,
            suggestion,
        },
    )
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::{CorrectionRecordOptions, record_with_options};
    use crate::store::{LearningStore, SqliteStore};

    fn options<'a>(home: &'a std::path::Path, description: &str) -> CorrectionRecordOptions<'a> {
        CorrectionRecordOptions {
            tenant_id: "acme".to_string(),
            transaction_ref: description.to_string(),
            field: "entity".to_string(),
            new_value: "Kraken".to_string(),
            description: description.to_string(),
            actor: "ana@example.com".to_string(),
            home_override: Some(home),
            ..CorrectionRecordOptions::default()
        }
    }

    #[test]
    fn failed_aggregation_does_not_keep_the_event() {
        let temp = tempfile::tempdir();
        assert!(temp.is_ok());
        let Ok(temp) = temp else {
            return;
        };
        let home = temp.path().join("home");

        for description in ["Received 0.00695 BTC", "Received 0.00705 BTC"] {
            assert!(record_with_options(options(&home, description)).is_ok());
        }

        let db_path = home.join("ledgerloop.db");
        let blocked = Connection::open(&db_path).and_then(|connection| {
            connection.execute_batch(
                "CREATE TRIGGER block_suggestions BEFORE INSERT ON pattern_suggestions
                 BEGIN SELECT RAISE(ABORT, 'suggestions are read-only'); END;",
            )
        });
        assert!(blocked.is_ok());

        let third = record_with_options(options(&home, "Received 0.01 BTC"));
        assert!(third.is_err());

        let store = SqliteStore::open(&db_path);
        assert!(store.is_ok());
        if let Ok(store) = store {
            let events = store.tenant_events("acme");
            assert!(matches!(events, Ok(ref rows) if rows.len() == 2));
            let suggestions = store.list_suggestions("acme", None);
            assert!(matches!(suggestions, Ok(ref rows) if rows.is_empty()));
        }
    }
}
