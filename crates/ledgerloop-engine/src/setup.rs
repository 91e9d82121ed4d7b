use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::migrations::{REQUIRED_META_KEYS, REQUIRED_TABLE_NAMES};
use crate::state::{ensure_store_directory, map_sqlite_error, resolve_store_home, store_db_path};
use crate::store::SqliteStore;
use crate::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct SetupContext {
    pub db_path: String,
    pub schema_version: String,
}

/// Resolves the store home, creates it when missing, migrates the database
/// and checks that every required table is present.
pub fn open_store(home_override: Option<&Path>) -> EngineResult<(SetupContext, SqliteStore)> {
    let store_home = resolve_store_home(home_override)?;
    ensure_store_directory(&store_home)?;

    let db_path = store_db_path(&store_home);
    let store = SqliteStore::open(&db_path)?;

    verify_tables(&store.connection, &db_path)?;
    repair_meta(&store.connection, &db_path)?;
    let schema_version = read_schema_version(&store.connection, &db_path)?;

    Ok((
        SetupContext {
            db_path: db_path.display().to_string(),
            schema_version,
        },
        store,
    ))
}

pub(crate) fn map_migration_error(db_path: &Path, error: &rusqlite_migration::Error) -> EngineError {
    match error {
        rusqlite_migration::Error::RusqliteError { query: _, err } => {
            let mapped = map_sqlite_error(db_path, err);
            if mapped.code == "store_locked"
                || mapped.code == "store_corrupt"
                || mapped.code == "store_permission_denied"
            {
                mapped
            } else {
                EngineError::migration_failed(db_path, &error.to_string())
            }
        }
        _ => EngineError::migration_failed(db_path, &error.to_string()),
    }
}

fn verify_tables(connection: &Connection, db_path: &Path) -> EngineResult<()> {
    for table_name in REQUIRED_TABLE_NAMES {
        let exists = connection
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table_name],
                |_| Ok(()),
            )
            .optional()
            .map_err(|error| map_sqlite_error(db_path, &error))?
            .is_some();
        if !exists {
            return Err(EngineError::store_corrupt(db_path));
        }
    }
    Ok(())
}

/// Insert-only: a missing key is restored, a changed value is left for
/// `read_schema_version` to judge.
fn repair_meta(connection: &Connection, db_path: &Path) -> EngineResult<()> {
    for (meta_key, default_value) in REQUIRED_META_KEYS {
        connection
            .execute(
                "INSERT OR IGNORE INTO internal_meta (key, value) VALUES (?1, ?2)",
                params![meta_key, default_value],
            )
            .map_err(|error| map_sqlite_error(db_path, &error))?;
    }
    Ok(())
}

fn read_schema_version(connection: &Connection, db_path: &Path) -> EngineResult<String> {
    let version = connection
        .query_row(
            "SELECT value FROM internal_meta WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    match version {
        Some(version) if version == "v1" => Ok(version),
        _ => Err(EngineError::store_corrupt(db_path)),
    }
}
