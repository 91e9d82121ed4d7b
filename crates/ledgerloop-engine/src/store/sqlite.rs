use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};
use ulid::Ulid;

use crate::learning::types::{
    ClassificationEvent, ClassificationPattern, CorrectionField, MatchExpression, NewCorrection,
    NewPattern, PatternSuggestion, SuggestionStatus,
};
use crate::migrations::run_pending;
use crate::setup::map_migration_error;
use crate::state::{map_sqlite_error, open_connection};
use crate::store::{ApprovedPattern, LearningStore, SuggestionDecision, SuggestionDraft};
use crate::{EngineError, EngineResult};

const EVENT_COLUMNS: &str = "event_id, tenant_id, transaction_ref, field_changed, old_value,
    new_value, description, origin, destination, actor, created_at";

const SUGGESTION_COLUMNS: &str = "suggestion_id, tenant_id, pattern_type, keyword_signature,
    target_value, origin, destination, occurrence_count, event_ids, first_event_at, status,
    confidence, justification, pattern_id, validation_attempts, last_error, created_at,
    updated_at, validated_at";

const PATTERN_COLUMNS: &str = "pattern_id, tenant_id, match_kind, match_expression,
    target_field, target_value, confidence, created_by, usage_count, is_active, created_at";

pub struct SqliteStore {
    pub(crate) connection: Connection,
    pub(crate) db_path: PathBuf,
}

impl SqliteStore {
    /// Opens the database at `db_path`, applying pending migrations.
    pub fn open(db_path: &Path) -> EngineResult<Self> {
        let mut connection = open_connection(db_path)?;
        run_pending(&mut connection).map_err(|error| map_migration_error(db_path, &error))?;
        Ok(Self {
            connection,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn open_in_memory() -> EngineResult<Self> {
        let db_path = PathBuf::from(":memory:");
        let mut connection =
            Connection::open_in_memory().map_err(|error| map_sqlite_error(&db_path, &error))?;
        run_pending(&mut connection).map_err(|error| map_migration_error(&db_path, &error))?;
        Ok(Self {
            connection,
            db_path,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub(crate) fn sqlite_error(&self, error: &rusqlite::Error) -> EngineError {
        map_sqlite_error(&self.db_path, error)
    }

    /// Starts a write transaction on the shared connection. Statements issued
    /// through `self` join it until it is committed; dropping it rolls back.
    pub fn begin_immediate(&self) -> EngineResult<Transaction<'_>> {
        Transaction::new_unchecked(&self.connection, TransactionBehavior::Immediate)
            .map_err(|error| self.sqlite_error(&error))
    }

    fn query_events(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> EngineResult<Vec<ClassificationEvent>> {
        let mut statement = self
            .connection
            .prepare(sql)
            .map_err(|error| self.sqlite_error(&error))?;
        let rows = statement
            .query_map(params, event_from_row)
            .map_err(|error| self.sqlite_error(&error))?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row.map_err(|error| self.sqlite_error(&error))?);
        }
        Ok(events)
    }

    fn query_suggestions(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> EngineResult<Vec<PatternSuggestion>> {
        let mut statement = self
            .connection
            .prepare(sql)
            .map_err(|error| self.sqlite_error(&error))?;
        let rows = statement
            .query_map(params, suggestion_from_row)
            .map_err(|error| self.sqlite_error(&error))?;
        let mut suggestions = Vec::new();
        for row in rows {
            suggestions.push(row.map_err(|error| self.sqlite_error(&error))?);
        }
        Ok(suggestions)
    }

    fn query_patterns(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> EngineResult<Vec<ClassificationPattern>> {
        let mut statement = self
            .connection
            .prepare(sql)
            .map_err(|error| self.sqlite_error(&error))?;
        let rows = statement
            .query_map(params, pattern_from_row)
            .map_err(|error| self.sqlite_error(&error))?;
        let mut patterns = Vec::new();
        for row in rows {
            patterns.push(row.map_err(|error| self.sqlite_error(&error))?);
        }
        Ok(patterns)
    }
}

impl LearningStore for SqliteStore {
    fn append_event(&self, correction: &NewCorrection) -> EngineResult<ClassificationEvent> {
        let event = ClassificationEvent {
            event_id: format!("evt_{}", Ulid::new()),
            tenant_id: correction.tenant_id.clone(),
            transaction_ref: correction.transaction_ref.clone(),
            field: correction.field,
            old_value: correction.old_value.clone(),
            new_value: correction.new_value.clone(),
            description: correction.description.clone(),
            origin: correction.origin.clone(),
            destination: correction.destination.clone(),
            actor: correction.actor.clone(),
            created_at: Utc::now(),
        };
        self.connection
            .execute(
                "INSERT INTO classification_events (
                    event_id,
                    tenant_id,
                    transaction_ref,
                    field_changed,
                    old_value,
                    new_value,
                    description,
                    origin,
                    destination,
                    actor,
                    created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    &event.event_id,
                    &event.tenant_id,
                    &event.transaction_ref,
                    event.field.as_str(),
                    &event.old_value,
                    &event.new_value,
                    &event.description,
                    &event.origin,
                    &event.destination,
                    &event.actor,
                    event.created_at,
                ],
            )
            .map_err(|error| self.sqlite_error(&error))?;
        Ok(event)
    }

    fn tenant_events(&self, tenant_id: &str) -> EngineResult<Vec<ClassificationEvent>> {
        self.query_events(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM classification_events
                 WHERE tenant_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ),
            params![tenant_id],
        )
    }

    fn events_for_target(
        &self,
        tenant_id: &str,
        field: CorrectionField,
        new_value: &str,
    ) -> EngineResult<Vec<ClassificationEvent>> {
        self.query_events(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM classification_events
                 WHERE tenant_id = ?1 AND field_changed = ?2 AND new_value = ?3
                 ORDER BY created_at ASC, rowid ASC"
            ),
            params![tenant_id, field.as_str(), new_value],
        )
    }

    fn events_by_ids(
        &self,
        tenant_id: &str,
        event_ids: &[String],
    ) -> EngineResult<Vec<ClassificationEvent>> {
        if event_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids_json = serde_json::to_string(event_ids)
            .map_err(|error| EngineError::internal_serialization(&error.to_string()))?;
        self.query_events(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM classification_events
                 WHERE tenant_id = ?1
                   AND event_id IN (SELECT value FROM json_each(?2))
                 ORDER BY created_at ASC, rowid ASC"
            ),
            params![tenant_id, ids_json],
        )
    }

    fn upsert_pending_suggestion(
        &self,
        draft: &SuggestionDraft,
    ) -> EngineResult<PatternSuggestion> {
        let signature = draft.keywords.join(" ");
        let event_ids = serde_json::to_string(&draft.event_ids)
            .map_err(|error| EngineError::internal_serialization(&error.to_string()))?;
        let occurrence_count = i64::try_from(draft.event_ids.len()).unwrap_or(i64::MAX);
        let now = Utc::now();

        self.connection
            .execute(
                "INSERT INTO pattern_suggestions (
                    suggestion_id,
                    tenant_id,
                    pattern_type,
                    keyword_signature,
                    target_value,
                    origin,
                    destination,
                    occurrence_count,
                    event_ids,
                    first_event_at,
                    status,
                    created_at,
                    updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'pending', ?11, ?11)
                 ON CONFLICT (tenant_id, pattern_type, target_value, keyword_signature, origin, destination)
                 DO UPDATE SET
                    occurrence_count = excluded.occurrence_count,
                    event_ids = excluded.event_ids,
                    first_event_at = excluded.first_event_at,
                    updated_at = excluded.updated_at
                 WHERE pattern_suggestions.status = 'pending'
                   AND excluded.occurrence_count > pattern_suggestions.occurrence_count",
                params![
                    format!("sug_{}", Ulid::new()),
                    &draft.tenant_id,
                    draft.pattern_type.as_str(),
                    &signature,
                    &draft.target_value,
                    &draft.origin,
                    &draft.destination,
                    occurrence_count,
                    &event_ids,
                    draft.first_event_at,
                    now,
                ],
            )
            .map_err(|error| self.sqlite_error(&error))?;

        let stored = self.query_suggestions(
            &format!(
                "SELECT {SUGGESTION_COLUMNS} FROM pattern_suggestions
                 WHERE tenant_id = ?1
                   AND pattern_type = ?2
                   AND target_value = ?3
                   AND keyword_signature = ?4
                   AND origin = ?5
                   AND destination = ?6"
            ),
            params![
                &draft.tenant_id,
                draft.pattern_type.as_str(),
                &draft.target_value,
                &signature,
                &draft.origin,
                &draft.destination,
            ],
        )?;
        stored.into_iter().next().ok_or_else(|| {
            EngineError::store_write_failed(&self.db_path, "upserted suggestion is not readable")
        })
    }

    fn suggestion(
        &self,
        tenant_id: &str,
        suggestion_id: &str,
    ) -> EngineResult<Option<PatternSuggestion>> {
        let rows = self.query_suggestions(
            &format!(
                "SELECT {SUGGESTION_COLUMNS} FROM pattern_suggestions
                 WHERE tenant_id = ?1 AND suggestion_id = ?2"
            ),
            params![tenant_id, suggestion_id],
        )?;
        Ok(rows.into_iter().next())
    }

    fn list_suggestions(
        &self,
        tenant_id: &str,
        status: Option<SuggestionStatus>,
    ) -> EngineResult<Vec<PatternSuggestion>> {
        self.query_suggestions(
            &format!(
                "SELECT {SUGGESTION_COLUMNS} FROM pattern_suggestions
                 WHERE tenant_id = ?1 AND (?2 IS NULL OR status = ?2)
                 ORDER BY first_event_at ASC, suggestion_id ASC"
            ),
            params![tenant_id, status.map(SuggestionStatus::as_str)],
        )
    }

    fn pending_suggestions(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> EngineResult<Vec<PatternSuggestion>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_suggestions(
            &format!(
                "SELECT {SUGGESTION_COLUMNS} FROM pattern_suggestions
                 WHERE tenant_id = ?1 AND status = 'pending'
                 ORDER BY first_event_at ASC, suggestion_id ASC
                 LIMIT ?2"
            ),
            params![tenant_id, limit],
        )
    }

    fn record_validation_failure(&self, suggestion_id: &str, detail: &str) -> EngineResult<()> {
        self.connection
            .execute(
                "UPDATE pattern_suggestions
                 SET validation_attempts = validation_attempts + 1,
                     last_error = ?2,
                     updated_at = ?3
                 WHERE suggestion_id = ?1 AND status = 'pending'",
                params![suggestion_id, detail, Utc::now()],
            )
            .map_err(|error| self.sqlite_error(&error))?;
        Ok(())
    }

    fn decide_suggestion(
        &self,
        suggestion_id: &str,
        decision: &SuggestionDecision,
    ) -> EngineResult<bool> {
        if decision.status != SuggestionStatus::Rejected {
            return Err(EngineError::invalid_argument(
                "Only rejections are recorded directly; approvals must materialize a pattern.",
            ));
        }
        let now = Utc::now();
        let changed = self
            .connection
            .execute(
                "UPDATE pattern_suggestions
                 SET status = ?2,
                     confidence = ?3,
                     justification = ?4,
                     validation_attempts = validation_attempts + 1,
                     last_error = NULL,
                     updated_at = ?5,
                     validated_at = ?5
                 WHERE suggestion_id = ?1 AND status = 'pending'",
                params![
                    suggestion_id,
                    decision.status.as_str(),
                    decision.confidence,
                    &decision.justification,
                    now,
                ],
            )
            .map_err(|error| self.sqlite_error(&error))?;
        Ok(changed == 1)
    }

    fn approve_suggestion(
        &self,
        suggestion_id: &str,
        justification: &str,
        pattern: &NewPattern,
    ) -> EngineResult<Option<ApprovedPattern>> {
        let transaction = self.begin_immediate()?;
        let now = Utc::now();
        let claimed = transaction
            .execute(
                "UPDATE pattern_suggestions
                 SET status = 'approved',
                     confidence = ?2,
                     justification = ?3,
                     validation_attempts = validation_attempts + 1,
                     last_error = NULL,
                     updated_at = ?4,
                     validated_at = ?4
                 WHERE suggestion_id = ?1 AND status = 'pending'",
                params![suggestion_id, pattern.confidence, justification, now],
            )
            .map_err(|error| self.sqlite_error(&error))?;
        if claimed == 0 {
            return Ok(None);
        }

        let (mut stored, created) = self.insert_pattern_if_absent(pattern)?;
        let reactivated = !stored.is_active;
        if reactivated {
            transaction
                .execute(
                    "UPDATE classification_patterns SET is_active = 1
                     WHERE tenant_id = ?1 AND pattern_id = ?2",
                    params![&stored.tenant_id, &stored.pattern_id],
                )
                .map_err(|error| self.sqlite_error(&error))?;
            stored.is_active = true;
        }
        transaction
            .execute(
                "UPDATE pattern_suggestions SET pattern_id = ?2 WHERE suggestion_id = ?1",
                params![suggestion_id, &stored.pattern_id],
            )
            .map_err(|error| self.sqlite_error(&error))?;
        transaction
            .commit()
            .map_err(|error| self.sqlite_error(&error))?;

        Ok(Some(ApprovedPattern {
            pattern: stored,
            created,
            reactivated,
        }))
    }

    fn insert_pattern_if_absent(
        &self,
        pattern: &NewPattern,
    ) -> EngineResult<(ClassificationPattern, bool)> {
        let expression = pattern.expression.storage_text();
        if expression.is_empty() {
            return Err(EngineError::invalid_argument(
                "A classification pattern needs a non-empty match expression.",
            ));
        }
        if !(0.0..=1.0).contains(&pattern.confidence) {
            return Err(EngineError::invalid_argument(
                "A classification pattern confidence must be within [0, 1].",
            ));
        }

        let inserted = self
            .connection
            .execute(
                "INSERT INTO classification_patterns (
                    pattern_id,
                    tenant_id,
                    match_kind,
                    match_expression,
                    target_field,
                    target_value,
                    confidence,
                    created_by,
                    usage_count,
                    is_active,
                    created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, 1, ?9)
                 ON CONFLICT (tenant_id, target_field, match_kind, match_expression) DO NOTHING",
                params![
                    format!("pat_{}", Ulid::new()),
                    &pattern.tenant_id,
                    pattern.expression.kind(),
                    &expression,
                    pattern.target_field.as_str(),
                    &pattern.target_value,
                    pattern.confidence,
                    &pattern.created_by,
                    Utc::now(),
                ],
            )
            .map_err(|error| self.sqlite_error(&error))?;

        let stored = self.query_patterns(
            &format!(
                "SELECT {PATTERN_COLUMNS} FROM classification_patterns
                 WHERE tenant_id = ?1
                   AND target_field = ?2
                   AND match_kind = ?3
                   AND match_expression = ?4"
            ),
            params![
                &pattern.tenant_id,
                pattern.target_field.as_str(),
                pattern.expression.kind(),
                &expression,
            ],
        )?;
        let row = stored.into_iter().next().ok_or_else(|| {
            EngineError::store_write_failed(&self.db_path, "inserted pattern is not readable")
        })?;
        Ok((row, inserted == 1))
    }

    fn patterns(
        &self,
        tenant_id: &str,
        include_inactive: bool,
    ) -> EngineResult<Vec<ClassificationPattern>> {
        self.query_patterns(
            &format!(
                "SELECT {PATTERN_COLUMNS} FROM classification_patterns
                 WHERE tenant_id = ?1 AND (?2 = 1 OR is_active = 1)
                 ORDER BY created_at ASC, pattern_id ASC"
            ),
            params![tenant_id, include_inactive],
        )
    }

    fn pattern(
        &self,
        tenant_id: &str,
        pattern_id: &str,
    ) -> EngineResult<Option<ClassificationPattern>> {
        let rows = self.query_patterns(
            &format!(
                "SELECT {PATTERN_COLUMNS} FROM classification_patterns
                 WHERE tenant_id = ?1 AND pattern_id = ?2"
            ),
            params![tenant_id, pattern_id],
        )?;
        Ok(rows.into_iter().next())
    }

    fn deactivate_pattern(&self, tenant_id: &str, pattern_id: &str) -> EngineResult<bool> {
        let exists = self
            .connection
            .query_row(
                "SELECT 1 FROM classification_patterns WHERE tenant_id = ?1 AND pattern_id = ?2",
                params![tenant_id, pattern_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(|error| self.sqlite_error(&error))?;
        if exists.is_none() {
            return Ok(false);
        }
        self.connection
            .execute(
                "UPDATE classification_patterns SET is_active = 0
                 WHERE tenant_id = ?1 AND pattern_id = ?2",
                params![tenant_id, pattern_id],
            )
            .map_err(|error| self.sqlite_error(&error))?;
        Ok(true)
    }

    fn increment_pattern_usage(&self, tenant_id: &str, pattern_id: &str) -> EngineResult<()> {
        self.connection
            .execute(
                "UPDATE classification_patterns SET usage_count = usage_count + 1
                 WHERE tenant_id = ?1 AND pattern_id = ?2",
                params![tenant_id, pattern_id],
            )
            .map_err(|error| self.sqlite_error(&error))?;
        Ok(())
    }
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<ClassificationEvent> {
    let field: String = row.get(3)?;
    Ok(ClassificationEvent {
        event_id: row.get(0)?,
        tenant_id: row.get(1)?,
        transaction_ref: row.get(2)?,
        field: parse_field(3, &field)?,
        old_value: row.get(4)?,
        new_value: row.get(5)?,
        description: row.get(6)?,
        origin: row.get(7)?,
        destination: row.get(8)?,
        actor: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn suggestion_from_row(row: &Row<'_>) -> rusqlite::Result<PatternSuggestion> {
    let pattern_type: String = row.get(2)?;
    let signature: String = row.get(3)?;
    let event_ids_json: String = row.get(8)?;
    let status: String = row.get(10)?;
    let event_ids: Vec<String> = serde_json::from_str(&event_ids_json)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(error)))?;
    let status = SuggestionStatus::parse(&status).ok_or_else(|| conversion_error(10, &status))?;

    Ok(PatternSuggestion {
        suggestion_id: row.get(0)?,
        tenant_id: row.get(1)?,
        pattern_type: parse_field(2, &pattern_type)?,
        keywords: signature
            .split_whitespace()
            .map(std::string::ToString::to_string)
            .collect(),
        target_value: row.get(4)?,
        origin: row.get(5)?,
        destination: row.get(6)?,
        occurrence_count: row.get(7)?,
        event_ids,
        first_event_at: row.get::<_, DateTime<Utc>>(9)?,
        status,
        confidence: row.get(11)?,
        justification: row.get(12)?,
        pattern_id: row.get(13)?,
        validation_attempts: row.get(14)?,
        last_error: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
        validated_at: row.get(18)?,
    })
}

fn pattern_from_row(row: &Row<'_>) -> rusqlite::Result<ClassificationPattern> {
    let kind: String = row.get(2)?;
    let text: String = row.get(3)?;
    let target_field: String = row.get(4)?;
    let expression =
        MatchExpression::from_storage(&kind, &text).ok_or_else(|| conversion_error(2, &kind))?;
    Ok(ClassificationPattern {
        pattern_id: row.get(0)?,
        tenant_id: row.get(1)?,
        expression,
        target_field: parse_field(4, &target_field)?,
        target_value: row.get(5)?,
        confidence: row.get(6)?,
        created_by: row.get(7)?,
        usage_count: row.get(8)?,
        is_active: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn parse_field(index: usize, value: &str) -> rusqlite::Result<CorrectionField> {
    CorrectionField::parse(value).ok_or_else(|| conversion_error(index, value))
}

fn conversion_error(index: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        Type::Text,
        Box::new(std::io::Error::other(format!("unexpected stored value `{value}`"))),
    )
}
