mod cli;
mod dispatch;
mod logging;
mod output;
mod stdout_io;

use std::process::ExitCode;

use clap::{Parser, error::ErrorKind};
use ledgerloop_engine::EngineError;
use stdout_io::write_stdout_line;

const ROOT_HELP: &str = "ledgerloop - learns classification patterns from bookkeeping corrections

USAGE: ledgerloop <command> --tenant <id> [--json]

Teach it:
  ledgerloop correction record --help                     How corrections are recorded and grouped
  ledgerloop suggestions list --status pending            Groups ready for review
  ledgerloop suggestions validate                         Review pending suggestions with the LLM

Use what it learned:
  ledgerloop patterns list                                Active patterns
  ledgerloop classify <txn.json> [--candidates <file>]    Classify one transaction
  ledgerloop similar <txn.json> --candidates <file>       Rank similar classified transactions

Configure:
  ledgerloop settings show                                Effective per-tenant settings
  ledgerloop patterns seed <seeds.json>                   Load configured patterns
  ledgerloop notifications list                           Approval and rejection notices
";

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(code) => code,
    }
}

fn run() -> Result<ExitCode, ExitCode> {
    logging::init_tracing();

    let raw_args = std::env::args().collect::<Vec<String>>();
    if raw_args.len() == 1 || is_top_level_help_request(&raw_args) {
        if write_stdout_line(ROOT_HELP.trim_end()).is_err() {
            return Err(ExitCode::from(2));
        }
        return Ok(ExitCode::SUCCESS);
    }

    let cli = match cli::Cli::try_parse() {
        Ok(value) => value,
        Err(err) => {
            if matches!(
                err.kind(),
                ErrorKind::DisplayHelp
                    | ErrorKind::DisplayVersion
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) {
                if write_stdout_line(err.to_string().trim_end()).is_err() {
                    return Err(ExitCode::from(2));
                }
                return Ok(ExitCode::SUCCESS);
            }
            let clean_message = strip_clap_boilerplate(&err.to_string());
            let parse_error = EngineError::invalid_argument_for_command(
                &clean_message,
                command_path_from_args(&raw_args).as_deref(),
            );
            let mode = output::infer_requested_output_mode(&raw_args);
            if output::print_failure(&parse_error, mode).is_err() {
                return Err(ExitCode::from(2));
            }
            return Err(ExitCode::from(1));
        }
    };
    let mode = output::mode_for_cli(&cli);

    match dispatch::dispatch(&cli) {
        Ok(success) => {
            if output::print_success(&success, mode).is_err() {
                return Err(ExitCode::from(2));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            if output::print_failure(&error, mode).is_err() {
                return Err(ExitCode::from(2));
            }
            Err(exit_code_for_error(&error))
        }
    }
}

fn is_top_level_help_request(raw_args: &[String]) -> bool {
    raw_args.len() == 2 && matches!(raw_args[1].as_str(), "--help" | "-h")
}

/// Strips clap's trailing usage and "For more information" lines so the
/// "What to do next" section is the only guidance printed.
fn strip_clap_boilerplate(message: &str) -> String {
    let trimmed = if let Some(pos) = message.find("\n\nUsage:") {
        &message[..pos]
    } else if let Some(pos) = message.find("\nFor more information") {
        &message[..pos]
    } else {
        message
    };
    trimmed.trim_end().to_string()
}

/// Command path such as "suggestions validate", for `--help` hints.
fn command_path_from_args(raw_args: &[String]) -> Option<String> {
    let words: Vec<&str> = raw_args
        .iter()
        .skip(1)
        .filter(|value| !value.starts_with('-'))
        .map(String::as_str)
        .collect();

    let hint = match words.as_slice() {
        ["correction", "record", ..] => "correction record",
        ["suggestions", "scan", ..] => "suggestions scan",
        ["suggestions", "list", ..] => "suggestions list",
        ["suggestions", "validate", ..] => "suggestions validate",
        ["patterns", "list", ..] => "patterns list",
        ["patterns", "seed", ..] => "patterns seed",
        ["patterns", "deactivate", ..] => "patterns deactivate",
        ["settings", "show", ..] => "settings show",
        ["settings", "set", ..] => "settings set",
        ["notifications", "list", ..] => "notifications list",
        [group @ ("correction" | "suggestions" | "patterns" | "settings" | "notifications"
        | "classify" | "similar"), ..] => group,
        _ => return None,
    };
    Some(hint.to_string())
}

fn exit_code_for_error(error: &EngineError) -> ExitCode {
    if error.is_internal() {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    }
}

#[cfg(test)]
mod tests {
    use super::{command_path_from_args, strip_clap_boilerplate};

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_string()).collect()
    }

    #[test]
    fn command_path_skips_flags_and_operands() {
        assert_eq!(
            command_path_from_args(&args(&["ledgerloop", "suggestions", "validate", "--limit", "5"]))
                .as_deref(),
            Some("suggestions validate")
        );
        assert_eq!(
            command_path_from_args(&args(&["ledgerloop", "classify", "txn.json"])).as_deref(),
            Some("classify")
        );
        assert_eq!(
            command_path_from_args(&args(&["ledgerloop", "--json", "unknown"])),
            None
        );
    }

    #[test]
    fn clap_usage_tail_is_removed() {
        let message = "error: unexpected argument '--bogus' found\n\nUsage: ledgerloop classify <TRANSACTION>\n\nFor more information, try '--help'.";
        assert_eq!(
            strip_clap_boilerplate(message),
            "error: unexpected argument '--bogus' found"
        );
    }
}
