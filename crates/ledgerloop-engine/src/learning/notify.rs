use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::EngineResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
}

impl NotificationPriority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub tenant_id: String,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    pub related_pattern_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredNotification {
    pub notification_id: String,
    #[serde(flatten)]
    pub notification: Notification,
    pub created_at: DateTime<Utc>,
}

/// Where pattern approvals and rejections are announced. Rendering and
/// delivery belong to the surrounding application.
pub trait NotificationSink {
    fn notify(&self, notification: &Notification) -> EngineResult<()>;
}

pub fn pattern_approved(
    tenant_id: &str,
    pattern_id: &str,
    expression: &str,
    target: &str,
) -> Notification {
    Notification {
        tenant_id: tenant_id.to_string(),
        title: "New classification pattern learned".to_string(),
        message: format!(
            "Transactions matching \"{expression}\" will now be classified as {target}."
        ),
        priority: NotificationPriority::Normal,
        related_pattern_id: Some(pattern_id.to_string()),
    }
}

pub fn pattern_rejected(tenant_id: &str, expression: &str, target: &str) -> Notification {
    Notification {
        tenant_id: tenant_id.to_string(),
        title: "Suggested pattern was not adopted".to_string(),
        message: format!(
            "Repeated corrections of \"{expression}\" to {target} were reviewed and not turned into a rule."
        ),
        priority: NotificationPriority::Low,
        related_pattern_id: None,
    }
}
