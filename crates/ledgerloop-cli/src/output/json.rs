use std::io;

use ledgerloop_engine::contracts::envelope::failure_from_error;
use ledgerloop_engine::{EngineError, SuccessEnvelope};
use serde::Serialize;

/// Every command prints its envelope unchanged: `ok`, `command`, `version`
/// and `data`.
pub fn render_success_json(success: &SuccessEnvelope) -> io::Result<String> {
    serialize_json_pretty(success)
}

pub fn render_error_json(error: &EngineError) -> io::Result<String> {
    serialize_json_pretty(&failure_from_error(error))
}

fn serialize_json_pretty<T>(value: &T) -> io::Result<String>
where
    T: Serialize,
{
    serde_json::to_string_pretty(value).map_err(io::Error::other)
}
