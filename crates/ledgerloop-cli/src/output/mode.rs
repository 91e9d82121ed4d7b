use crate::cli::Cli;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OutputMode {
    Text,
    Json,
}

pub fn mode_for_cli(cli: &Cli) -> OutputMode {
    if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    }
}

/// Used when argument parsing failed and no `Cli` exists.
pub fn infer_requested_output_mode(raw_args: &[String]) -> OutputMode {
    if raw_args.iter().skip(1).any(|value| value == "--json") {
        return OutputMode::Json;
    }
    OutputMode::Text
}

#[cfg(test)]
mod tests {
    use super::{OutputMode, infer_requested_output_mode, mode_for_cli};
    use crate::cli::parse_from;

    #[test]
    fn json_flag_selects_json_anywhere_on_the_line() {
        let parsed = parse_from(["ledgerloop", "--json", "settings", "show"]);
        assert!(parsed.is_ok());
        if let Ok(cli) = parsed {
            assert_eq!(mode_for_cli(&cli), OutputMode::Json);
        }

        let trailing = parse_from(["ledgerloop", "settings", "show", "--json"]);
        assert!(trailing.is_ok());
        if let Ok(cli) = trailing {
            assert_eq!(mode_for_cli(&cli), OutputMode::Json);
        }
    }

    #[test]
    fn text_is_the_default() {
        let parsed = parse_from(["ledgerloop", "notifications", "list"]);
        assert!(parsed.is_ok());
        if let Ok(cli) = parsed {
            assert_eq!(mode_for_cli(&cli), OutputMode::Text);
        }
    }

    #[test]
    fn raw_args_inference_ignores_the_binary_name() {
        let args = ["--json".to_string(), "classify".to_string()];
        assert_eq!(infer_requested_output_mode(&args), OutputMode::Text);

        let args = [
            "ledgerloop".to_string(),
            "classify".to_string(),
            "--json".to_string(),
        ];
        assert_eq!(infer_requested_output_mode(&args), OutputMode::Json);
    }
}
