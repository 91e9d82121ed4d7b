use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Failures of one validation round trip. All of them leave the suggestion
/// pending for a later pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM transport failed: {0}")]
    Transport(String),

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("LLM response is not valid JSON: {0}")]
    Malformed(String),

    #[error("LLM response is missing `{0}`")]
    MissingField(&'static str),
}

impl LlmError {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Transport(_) => "transport",
            Self::EmptyResponse => "empty_response",
            Self::Malformed(_) => "malformed",
            Self::MissingField(_) => "missing_field",
        }
    }
}

/// Text completion transport used by the validator.
///
/// Implementations only move text; prompt construction, timeouts and
/// response parsing stay with the caller.
pub trait LlmClient {
    fn complete(
        &self,
        prompt: &str,
        response_schema_hint: &str,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;
}
