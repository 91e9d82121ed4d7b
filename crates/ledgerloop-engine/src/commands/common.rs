use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::learning::config::{SettingsCache, TenantSettings};
use crate::setup::{SetupContext, open_store};
use crate::store::SqliteStore;
use crate::{EngineError, EngineResult};

const MAX_TENANT_ID_CHARS: usize = 128;

/// Store handle plus settings cache for one tenant's unit of work.
pub struct TenantSession {
    pub setup: SetupContext,
    pub store: SqliteStore,
    pub tenant_id: String,
    settings: SettingsCache,
}

impl TenantSession {
    pub fn open(tenant_id: &str, home_override: Option<&Path>) -> EngineResult<Self> {
        let tenant_id = require_tenant(tenant_id)?;
        let (setup, store) = open_store(home_override)?;
        Ok(Self {
            setup,
            store,
            tenant_id,
            settings: SettingsCache::with_system_clock(),
        })
    }

    pub fn settings(&mut self) -> EngineResult<TenantSettings> {
        self.settings.settings(&self.store, &self.tenant_id)
    }

    pub fn invalidate_settings(&mut self) {
        self.settings.invalidate(&self.tenant_id);
    }
}

pub fn require_tenant(tenant_id: &str) -> EngineResult<String> {
    let trimmed = tenant_id.trim();
    if trimmed.is_empty() {
        return Err(EngineError::invalid_argument_with_recovery(
            "A tenant id is required.",
            vec!["Pass `--tenant <id>` to scope the command to one tenant.".to_string()],
        ));
    }
    if trimmed.chars().count() > MAX_TENANT_ID_CHARS {
        return Err(EngineError::invalid_argument(
            "The tenant id is longer than 128 characters.",
        ));
    }
    Ok(trimmed.to_string())
}

pub fn read_json_file<T>(path: &Path) -> EngineResult<T>
where
    T: DeserializeOwned,
{
    let display = path.display().to_string();
    let text = fs::read_to_string(path)
        .map_err(|error| EngineError::invalid_input_file(&display, &error.to_string()))?;
    serde_json::from_str(&text)
        .map_err(|error| EngineError::invalid_input_file(&display, &error.to_string()))
}

pub fn require_unit_interval(name: &str, value: f64) -> EngineResult<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        return Ok(value);
    }
    Err(EngineError::invalid_argument(&format!(
        "`{name}` must be a number between 0 and 1."
    )))
}

#[cfg(test)]
mod tests {
    use super::{read_json_file, require_tenant, require_unit_interval};
    use crate::learning::types::TransactionRecord;

    #[test]
    fn tenant_ids_are_trimmed_and_required() {
        assert!(matches!(require_tenant("  acme "), Ok(ref tenant) if tenant == "acme"));
        assert!(matches!(require_tenant("   "), Err(ref error) if error.code == "invalid_argument"));
    }

    #[test]
    fn unreadable_or_invalid_files_are_input_errors() {
        let temp = tempfile::tempdir();
        assert!(temp.is_ok());
        if let Ok(temp) = temp {
            let missing = read_json_file::<TransactionRecord>(&temp.path().join("missing.json"));
            assert!(matches!(missing, Err(ref error) if error.code == "invalid_input_file"));

            let path = temp.path().join("bad.json");
            assert!(std::fs::write(&path, "{\"id\": 1}").is_ok());
            let invalid = read_json_file::<TransactionRecord>(&path);
            assert!(matches!(invalid, Err(ref error) if error.code == "invalid_input_file"));
        }
    }

    #[test]
    fn unit_interval_rejects_out_of_range_values() {
        assert!(require_unit_interval("min_confidence", 0.5).is_ok());
        assert!(require_unit_interval("min_confidence", 1.5).is_err());
        assert!(require_unit_interval("min_confidence", f64::NAN).is_err());
    }
}
