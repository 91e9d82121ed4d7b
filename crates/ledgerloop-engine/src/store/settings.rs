use chrono::Utc;
use rusqlite::params;

use crate::EngineResult;
use crate::learning::config::{SettingKey, SettingsSource, TenantSettings};
use crate::learning::context::{BusinessContext, BusinessContextProvider};
use crate::store::SqliteStore;

impl SettingsSource for SqliteStore {
    fn load_settings(&self, tenant_id: &str) -> EngineResult<Vec<(String, String)>> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT key, value FROM tenant_settings
                 WHERE tenant_id = ?1
                 ORDER BY key ASC",
            )
            .map_err(|error| self.sqlite_error(&error))?;
        let rows = statement
            .query_map(params![tenant_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|error| self.sqlite_error(&error))?;

        let mut pairs = Vec::new();
        for row in rows {
            pairs.push(row.map_err(|error| self.sqlite_error(&error))?);
        }
        Ok(pairs)
    }
}

impl SqliteStore {
    /// Stores an already validated setting value.
    pub fn save_setting(&self, tenant_id: &str, key: SettingKey, value: &str) -> EngineResult<()> {
        self.connection
            .execute(
                "INSERT INTO tenant_settings (tenant_id, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (tenant_id, key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at",
                params![tenant_id, key.as_str(), value, Utc::now()],
            )
            .map_err(|error| self.sqlite_error(&error))?;
        Ok(())
    }
}

impl BusinessContextProvider for SqliteStore {
    /// Known entities are the targets of active entity patterns and of
    /// approved entity suggestions; industry hints come from settings.
    fn business_context(&self, tenant_id: &str) -> EngineResult<BusinessContext> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT target_value FROM classification_patterns
                 WHERE tenant_id = ?1 AND target_field = 'entity' AND is_active = 1
                 UNION
                 SELECT target_value FROM pattern_suggestions
                 WHERE tenant_id = ?1 AND pattern_type = 'entity' AND status = 'approved'
                 ORDER BY 1 ASC",
            )
            .map_err(|error| self.sqlite_error(&error))?;
        let rows = statement
            .query_map(params![tenant_id], |row| row.get::<_, String>(0))
            .map_err(|error| self.sqlite_error(&error))?;

        let mut known_entities = Vec::new();
        for row in rows {
            known_entities.push(row.map_err(|error| self.sqlite_error(&error))?);
        }

        let settings = TenantSettings::from_pairs(&self.load_settings(tenant_id)?);
        Ok(BusinessContext {
            known_entities,
            industry_hints: settings.industry_hints,
        })
    }
}
