use chrono::Utc;
use rusqlite::params;
use ulid::Ulid;

use crate::EngineResult;
use crate::learning::notify::{
    Notification, NotificationPriority, NotificationSink, StoredNotification,
};
use crate::store::SqliteStore;

impl NotificationSink for SqliteStore {
    fn notify(&self, notification: &Notification) -> EngineResult<()> {
        self.connection
            .execute(
                "INSERT INTO notifications (
                    notification_id,
                    tenant_id,
                    title,
                    message,
                    priority,
                    related_pattern_id,
                    created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    format!("ntf_{}", Ulid::new()),
                    &notification.tenant_id,
                    &notification.title,
                    &notification.message,
                    notification.priority.as_str(),
                    &notification.related_pattern_id,
                    Utc::now(),
                ],
            )
            .map_err(|error| self.sqlite_error(&error))?;
        Ok(())
    }
}

impl SqliteStore {
    /// Newest first.
    pub fn notifications(&self, tenant_id: &str) -> EngineResult<Vec<StoredNotification>> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT notification_id, tenant_id, title, message, priority,
                        related_pattern_id, created_at
                 FROM notifications
                 WHERE tenant_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )
            .map_err(|error| self.sqlite_error(&error))?;
        let rows = statement
            .query_map(params![tenant_id], |row| {
                let priority: String = row.get(4)?;
                Ok(StoredNotification {
                    notification_id: row.get(0)?,
                    notification: Notification {
                        tenant_id: row.get(1)?,
                        title: row.get(2)?,
                        message: row.get(3)?,
                        priority: NotificationPriority::parse(&priority)
                            .unwrap_or(NotificationPriority::Normal),
                        related_pattern_id: row.get(5)?,
                    },
                    created_at: row.get(6)?,
                })
            })
            .map_err(|error| self.sqlite_error(&error))?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row.map_err(|error| self.sqlite_error(&error))?);
        }
        Ok(notifications)
    }
}
