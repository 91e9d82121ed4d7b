use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, Error as SqliteError, ffi::ErrorCode};

use crate::{EngineError, EngineResult};

pub const HOME_ENV_VAR: &str = "LEDGERLOOP_HOME";

pub fn resolve_store_home(home_override: Option<&Path>) -> EngineResult<PathBuf> {
    let candidate = match home_override {
        Some(path) => path.to_path_buf(),
        None => {
            if let Some(override_path) = std::env::var_os(HOME_ENV_VAR) {
                PathBuf::from(override_path)
            } else if let Some(home_path) = home::home_dir() {
                home_path.join(".ledgerloop")
            } else {
                return Err(EngineError::store_init_failed(
                    Path::new("."),
                    "Could not resolve a home directory for the pattern store.",
                ));
            }
        }
    };

    absolutize(&candidate)
}

pub fn ensure_store_directory(path: &Path) -> EngineResult<()> {
    fs::create_dir_all(path).map_err(|error| map_io_error(path, &error))?;
    set_private_permissions_best_effort(path);
    Ok(())
}

pub fn store_db_path(home: &Path) -> PathBuf {
    home.join("ledgerloop.db")
}

pub fn open_connection(db_path: &Path) -> EngineResult<Connection> {
    let connection =
        Connection::open(db_path).map_err(|error| map_sqlite_error(db_path, &error))?;
    connection
        .busy_timeout(Duration::from_millis(250))
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    Ok(connection)
}

pub fn map_io_error(path: &Path, error: &std::io::Error) -> EngineError {
    if error.kind() == std::io::ErrorKind::PermissionDenied {
        return EngineError::store_permission_denied(path, &error.to_string());
    }

    EngineError::store_init_failed(path, &error.to_string())
}

pub fn map_sqlite_error(path: &Path, error: &SqliteError) -> EngineError {
    let error_code = error.sqlite_error_code();

    if matches!(
        error_code,
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    ) {
        return EngineError::store_locked(path);
    }

    if matches!(error_code, Some(ErrorCode::NotADatabase)) {
        return EngineError::store_corrupt(path);
    }

    if matches!(
        error_code,
        Some(ErrorCode::CannotOpen | ErrorCode::ReadOnly)
    ) {
        return EngineError::store_permission_denied(path, &error.to_string());
    }

    EngineError::store_write_failed(path, &error.to_string())
}

fn absolutize(path: &Path) -> EngineResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|error| EngineError::store_init_failed(path, &error.to_string()))
}

#[cfg(unix)]
fn set_private_permissions_best_effort(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o700));
}

#[cfg(not(unix))]
fn set_private_permissions_best_effort(_path: &Path) {}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{resolve_store_home, store_db_path};

    #[test]
    fn explicit_override_wins_and_is_absolute() {
        let resolved = resolve_store_home(Some(Path::new("/tmp/ledgerloop-home")));
        assert!(resolved.is_ok());
        if let Ok(home) = resolved {
            assert_eq!(home, Path::new("/tmp/ledgerloop-home"));
            assert_eq!(
                store_db_path(&home),
                Path::new("/tmp/ledgerloop-home/ledgerloop.db")
            );
        }
    }

    #[test]
    fn relative_override_is_anchored_at_cwd() {
        let resolved = resolve_store_home(Some(Path::new("relative-home")));
        assert!(resolved.is_ok());
        if let Ok(home) = resolved {
            assert!(home.is_absolute());
            assert!(home.ends_with("relative-home"));
        }
    }
}
