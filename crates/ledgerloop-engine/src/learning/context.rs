use serde::Serialize;

use crate::EngineResult;

/// What the validator knows about a tenant's business when judging a
/// suggested generalization.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BusinessContext {
    pub known_entities: Vec<String>,
    pub industry_hints: Vec<String>,
}

pub trait BusinessContextProvider {
    fn business_context(&self, tenant_id: &str) -> EngineResult<BusinessContext>;
}
