use ledgerloop_engine::EngineError;

pub fn render_error(error: &EngineError) -> String {
    let mut lines = vec![
        "The command could not be completed.".to_string(),
        String::new(),
        format!("  Error:    {}", error.code),
        format!("  Details:  {}", error.message),
    ];
    if let Some(reason) = error.reason() {
        lines.push(format!("  Reason:   {reason}"));
    }
    lines.push(String::new());
    lines.push("What to do next:".to_string());

    if error.recovery_steps.is_empty() {
        lines.push("  1. Retry the command.".to_string());
    } else {
        for (index, step) in error.recovery_steps.iter().enumerate() {
            lines.push(format!("  {}. {step}", index + 1));
        }
    }

    lines.join("\n")
}
