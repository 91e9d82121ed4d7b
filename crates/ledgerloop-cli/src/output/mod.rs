mod error_text;
mod format;
mod json;
mod learning_text;
mod mode;

use std::io;

use ledgerloop_engine::{EngineError, SuccessEnvelope};

use crate::stdout_io::write_stdout_line;

pub use mode::{OutputMode, infer_requested_output_mode, mode_for_cli};

pub fn print_success(success: &SuccessEnvelope, mode: OutputMode) -> io::Result<()> {
    let body = match mode {
        OutputMode::Text => render_text_success(success)?,
        OutputMode::Json => json::render_success_json(success)?,
    };
    write_stdout_line(&body)
}

pub fn print_failure(error: &EngineError, mode: OutputMode) -> io::Result<()> {
    let body = match mode {
        OutputMode::Json => json::render_error_json(error)?,
        OutputMode::Text => error_text::render_error(error),
    };
    write_stdout_line(&body)
}

fn render_text_success(success: &SuccessEnvelope) -> io::Result<String> {
    let data = &success.data;
    match success.command.as_str() {
        "correction record" => learning_text::render_correction_record(data),
        "suggestions scan" => learning_text::render_suggestions_scan(data),
        "suggestions list" => learning_text::render_suggestions_list(data),
        "suggestions validate" => learning_text::render_suggestions_validate(data),
        "patterns list" => learning_text::render_patterns_list(data),
        "patterns seed" => learning_text::render_patterns_seed(data),
        "patterns deactivate" => learning_text::render_patterns_deactivate(data),
        "classify" => learning_text::render_classify(data),
        "similar" => learning_text::render_similar(data),
        "settings show" => learning_text::render_settings_show(data),
        "settings set" => learning_text::render_settings_set(data),
        "notifications list" => learning_text::render_notifications_list(data),
        _ => Err(io::Error::other(format!(
            "unsupported text output command `{}`",
            success.command
        ))),
    }
}
