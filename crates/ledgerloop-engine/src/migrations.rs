use rusqlite::Connection;
use rusqlite_migration::{M, Migrations};

const BOOTSTRAP_SQL: &str = include_str!("migrations/0001_bootstrap.sql");

pub const REQUIRED_TABLE_NAMES: [&str; 6] = [
    "internal_meta",
    "classification_events",
    "pattern_suggestions",
    "classification_patterns",
    "notifications",
    "tenant_settings",
];

pub const REQUIRED_META_KEYS: [(&str, &str); 2] = [
    ("schema_version", "v1"),
    ("learning_policy_version", "learning/v1"),
];

pub fn run_pending(conn: &mut Connection) -> rusqlite_migration::Result<()> {
    let migrations = Migrations::new(vec![M::up(BOOTSTRAP_SQL)]);
    migrations.to_latest(conn)
}

#[cfg(test)]
mod tests {
    use rusqlite::{Connection, params};

    use super::{REQUIRED_META_KEYS, REQUIRED_TABLE_NAMES, run_pending};

    #[test]
    fn bootstrap_creates_every_required_table_and_meta_key() {
        let opened = Connection::open_in_memory();
        assert!(opened.is_ok());
        if let Ok(mut connection) = opened {
            assert!(run_pending(&mut connection).is_ok());
            for table in REQUIRED_TABLE_NAMES {
                let count = connection
                    .query_row(
                        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                        params![table],
                        |row| row.get::<_, i64>(0),
                    )
                    .unwrap_or(0);
                assert_eq!(count, 1, "missing table {table}");
            }
            for (key, expected) in REQUIRED_META_KEYS {
                let value = connection
                    .query_row(
                        "SELECT value FROM internal_meta WHERE key = ?1",
                        params![key],
                        |row| row.get::<_, String>(0),
                    )
                    .unwrap_or_default();
                assert_eq!(value, expected);
            }
        }
    }

    #[test]
    fn running_migrations_twice_is_a_no_op() {
        let opened = Connection::open_in_memory();
        assert!(opened.is_ok());
        if let Ok(mut connection) = opened {
            assert!(run_pending(&mut connection).is_ok());
            assert!(run_pending(&mut connection).is_ok());
        }
    }
}
