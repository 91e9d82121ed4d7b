use std::path::Path;

use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EngineError {
    pub code: String,
    pub message: String,
    pub recovery_steps: Vec<String>,
    pub data: Option<Value>,
}

/// Why a correction was refused at the tracker boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionIssue {
    MissingTenant,
    MissingTransactionRef,
    MissingDescription,
    MissingNewValue,
    MissingActor,
    ValueTooLong,
}

impl CorrectionIssue {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingTenant => "missing_tenant",
            Self::MissingTransactionRef => "missing_transaction_ref",
            Self::MissingDescription => "missing_description",
            Self::MissingNewValue => "missing_new_value",
            Self::MissingActor => "missing_actor",
            Self::ValueTooLong => "value_too_long",
        }
    }

    fn message(self) -> &'static str {
        match self {
            Self::MissingTenant => "A correction needs a tenant id.",
            Self::MissingTransactionRef => "A correction needs the transaction reference it edits.",
            Self::MissingDescription => "A correction needs the transaction description snapshot.",
            Self::MissingNewValue => "A correction needs a non-empty new value.",
            Self::MissingActor => "A correction needs the acting user id or email.",
            Self::ValueTooLong => "A correction value exceeds the maximum stored length.",
        }
    }
}

impl EngineError {
    pub fn new(code: &str, message: &str, recovery_steps: Vec<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            recovery_steps,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Reason tag carried in `data.reason`, when the error has one.
    pub fn reason(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|data| data.get("reason"))
            .and_then(Value::as_str)
    }

    pub fn invalid_argument(message: &str) -> Self {
        Self::invalid_argument_for_command(message, None)
    }

    pub fn invalid_argument_for_command(message: &str, command: Option<&str>) -> Self {
        let help_hint = match command {
            Some(cmd) => format!("Run `ledgerloop {cmd} --help` for usage."),
            None => "Run `ledgerloop --help` for usage.".to_string(),
        };
        let error = Self::new("invalid_argument", message, vec![help_hint]);
        if let Some(cmd) = command {
            return error.with_data(json!({
                "command_hint": cmd,
            }));
        }
        error
    }

    pub fn invalid_argument_with_recovery(message: &str, recovery_steps: Vec<String>) -> Self {
        Self::new("invalid_argument", message, recovery_steps)
    }

    pub fn invalid_correction(issue: CorrectionIssue) -> Self {
        Self::new(
            "invalid_correction",
            issue.message(),
            vec![
                "Fill in the missing correction fields and resubmit.".to_string(),
                "Run `ledgerloop correction record --help` to review required fields."
                    .to_string(),
            ],
        )
        .with_data(json!({
            "reason": issue.as_str(),
        }))
    }

    pub fn invalid_correction_field(received: &str) -> Self {
        Self::new(
            "invalid_correction",
            &format!("`{received}` is not a classification field."),
            vec![
                "Use one of: entity, category, subcategory, origin, destination.".to_string(),
            ],
        )
        .with_data(json!({
            "reason": "unknown_field",
            "received_field": received,
        }))
    }

    pub fn invalid_input_file(path: &str, detail: &str) -> Self {
        Self::new(
            "invalid_input_file",
            &format!("Could not read `{path}`: {detail}"),
            vec![
                "Check that the file exists and contains valid JSON.".to_string(),
                "Run the command with `--help` to review the expected shape.".to_string(),
            ],
        )
        .with_data(json!({
            "path": path,
        }))
    }

    pub fn invalid_setting(key: &str, detail: &str) -> Self {
        Self::invalid_argument_with_recovery(
            &format!("Setting `{key}` was rejected: {detail}"),
            vec!["Run `ledgerloop settings show` to see valid keys and current values.".to_string()],
        )
        .with_data(json!({
            "key": key,
        }))
    }

    pub fn suggestion_not_found(suggestion_id: &str) -> Self {
        Self::new(
            "suggestion_not_found",
            &format!("Pattern suggestion `{suggestion_id}` was not found."),
            vec!["Run `ledgerloop suggestions list` to find a valid suggestion id.".to_string()],
        )
        .with_data(json!({
            "suggestion_id": suggestion_id,
        }))
    }

    pub fn pattern_not_found(pattern_id: &str) -> Self {
        Self::new(
            "pattern_not_found",
            &format!("Classification pattern `{pattern_id}` was not found."),
            vec!["Run `ledgerloop patterns list --all` to find a valid pattern id.".to_string()],
        )
        .with_data(json!({
            "pattern_id": pattern_id,
        }))
    }

    pub fn llm_not_configured(missing: &str) -> Self {
        Self::new(
            "llm_not_configured",
            &format!("LLM validation is not configured: `{missing}` is not set."),
            vec![
                "Set LEDGERLOOP_LLM_URL to an OpenAI-compatible chat completions endpoint."
                    .to_string(),
                "Set LEDGERLOOP_LLM_MODEL (and LEDGERLOOP_LLM_API_KEY when required).".to_string(),
            ],
        )
    }

    pub fn internal_serialization(message: &str) -> Self {
        Self::new("internal_serialization_error", message, Vec::new())
    }

    pub fn internal_runtime(detail: &str) -> Self {
        Self::new(
            "internal_runtime",
            &format!("Could not start the async runtime: {detail}"),
            vec!["Retry the command; report it if the failure repeats.".to_string()],
        )
    }

    pub fn store_permission_denied(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "store_permission_denied",
            &format!("Cannot open the pattern store at `{location}`: {detail}"),
            vec![format!(
                "Grant write access to `{location}` or set `LEDGERLOOP_HOME` to a writable directory."
            )],
        )
    }

    pub fn store_locked(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            "store_locked",
            &format!("Pattern store is locked at `{location}`."),
            vec![format!(
                "Close other processes using `{location}` so the lock is released."
            )],
        )
    }

    pub fn store_corrupt(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            "store_corrupt",
            &format!("Pattern store appears corrupt at `{location}`."),
            vec![format!(
                "Replace `{location}` with a valid SQLite file or restore from backup."
            )],
        )
    }

    pub fn store_write_failed(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "store_write_failed",
            &format!("Pattern store operation failed at `{location}`: {detail}"),
            vec!["Retry the command; no partial state was written.".to_string()],
        )
    }

    pub fn migration_failed(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "migration_failed",
            &format!("Pattern store migration failed at `{location}`: {detail}"),
            vec!["Resolve conflicting schema objects referenced in the error details.".to_string()],
        )
    }

    pub fn store_init_failed(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "store_init_failed",
            &format!("Pattern store initialization failed at `{location}`: {detail}"),
            Vec::new(),
        )
    }

    pub fn is_internal(&self) -> bool {
        self.code.starts_with("internal_")
            || matches!(
                self.code.as_str(),
                "store_permission_denied"
                    | "store_locked"
                    | "store_corrupt"
                    | "store_write_failed"
                    | "migration_failed"
                    | "store_init_failed"
            )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::{CorrectionIssue, EngineError};

    #[test]
    fn invalid_correction_carries_discriminated_reason() {
        let error = EngineError::invalid_correction(CorrectionIssue::MissingDescription);
        assert_eq!(error.code, "invalid_correction");
        assert_eq!(error.reason(), Some("missing_description"));
        assert!(!error.is_internal());
    }

    #[test]
    fn store_errors_are_internal() {
        let error = EngineError::store_locked(std::path::Path::new("/tmp/ledgerloop.db"));
        assert!(error.is_internal());
        assert!(error.reason().is_none());
    }

    #[test]
    fn runtime_start_failure_is_internal() {
        let error = EngineError::internal_runtime("too many open files");
        assert_eq!(error.code, "internal_runtime");
        assert!(error.message.contains("too many open files"));
        assert!(error.is_internal());
    }
}
