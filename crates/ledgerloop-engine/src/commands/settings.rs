use std::path::Path;

use crate::EngineResult;
use crate::commands::common::TenantSession;
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::{SettingRow, SettingUpdateData, SettingsShowData};
use crate::learning::config::{SettingKey, TenantSettings, validate_setting};

#[derive(Debug, Default)]
pub struct SettingsShowOptions<'a> {
    pub tenant_id: String,
    pub home_override: Option<&'a Path>,
}

#[derive(Debug, Default)]
pub struct SettingsSetOptions<'a> {
    pub tenant_id: String,
    pub key: String,
    pub value: String,
    pub home_override: Option<&'a Path>,
}

pub fn show_with_options(options: SettingsShowOptions<'_>) -> EngineResult<SuccessEnvelope> {
    let mut session = TenantSession::open(&options.tenant_id, options.home_override)?;
    let settings = session.settings()?;
    let defaults = TenantSettings::default();

    let settings = SettingKey::ALL
        .into_iter()
        .map(|key| {
            let value = settings.value(key);
            SettingRow {
                key: key.as_str().to_string(),
                is_default: value == defaults.value(key),
                value,
            }
        })
        .collect::<Vec<SettingRow>>();

    success(
        "settings show",
        SettingsShowData {
            tenant_id: session.tenant_id,
            settings,
        },
    )
}

pub fn set_with_options(options: SettingsSetOptions<'_>) -> EngineResult<SuccessEnvelope> {
    let (key, canonical) = validate_setting(&options.key, &options.value)?;
    let mut session = TenantSession::open(&options.tenant_id, options.home_override)?;
    session
        .store
        .save_setting(&session.tenant_id, key, &canonical)?;
    session.invalidate_settings();
    let value = session.settings()?.value(key);

    success(
        "settings set",
        SettingUpdateData {
            tenant_id: session.tenant_id,
            key: key.as_str().to_string(),
            value,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::{SettingsSetOptions, SettingsShowOptions, set_with_options, show_with_options};

    #[test]
    fn set_then_show_reports_the_override() {
        let temp = tempfile::tempdir();
        assert!(temp.is_ok());
        if let Ok(temp) = temp {
            let set = set_with_options(SettingsSetOptions {
                tenant_id: "tenant_a".to_string(),
                key: "aggregation_threshold".to_string(),
                value: "5".to_string(),
                home_override: Some(temp.path()),
            });
            assert!(set.is_ok());
            if let Ok(envelope) = set {
                assert_eq!(envelope.data["value"], 5);
            }

            let shown = show_with_options(SettingsShowOptions {
                tenant_id: "tenant_a".to_string(),
                home_override: Some(temp.path()),
            });
            assert!(shown.is_ok());
            if let Ok(envelope) = shown {
                let rows = envelope.data["settings"].as_array().cloned().unwrap_or_default();
                let threshold = rows
                    .iter()
                    .find(|row| row["key"] == "aggregation_threshold");
                assert!(threshold.is_some());
                if let Some(row) = threshold {
                    assert_eq!(row["value"], 5);
                    assert_eq!(row["is_default"], false);
                }
            }
        }
    }

    #[test]
    fn invalid_values_are_rejected_before_opening_the_store() {
        let temp = tempfile::tempdir();
        assert!(temp.is_ok());
        if let Ok(temp) = temp {
            let home = temp.path().join("untouched");
            let set = set_with_options(SettingsSetOptions {
                tenant_id: "tenant_a".to_string(),
                key: "validation_batch_size".to_string(),
                value: "500".to_string(),
                home_override: Some(&home),
            });
            assert!(matches!(set, Err(ref error) if error.code == "invalid_argument"));
            assert!(!home.exists());
        }
    }
}
