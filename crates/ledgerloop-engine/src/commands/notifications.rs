use std::path::Path;

use crate::EngineResult;
use crate::commands::common::TenantSession;
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::NotificationListData;

#[derive(Debug, Default)]
pub struct NotificationListOptions<'a> {
    pub tenant_id: String,
    pub home_override: Option<&'a Path>,
}

pub fn list_with_options(options: NotificationListOptions<'_>) -> EngineResult<SuccessEnvelope> {
    let session = TenantSession::open(&options.tenant_id, options.home_override)?;
    let notifications = session.store.notifications(&session.tenant_id)?;

    success(
        "notifications list",
        NotificationListData {
            tenant_id: session.tenant_id,
            notifications,
        },
    )
}
