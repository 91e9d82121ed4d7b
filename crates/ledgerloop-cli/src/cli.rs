use clap::{Parser, Subcommand};

pub fn parse_correction_field(value: &str) -> Result<String, String> {
    match value {
        "entity" | "category" | "subcategory" | "origin" | "destination" => Ok(value.to_string()),
        _ => Err(
            "field must be one of: entity, category, subcategory, origin, destination".to_string(),
        ),
    }
}

pub fn parse_suggestion_status(value: &str) -> Result<String, String> {
    match value {
        "pending" | "approved" | "rejected" => Ok(value.to_string()),
        _ => Err("status must be one of: pending, approved, rejected".to_string()),
    }
}

pub fn parse_unit_interval(value: &str) -> Result<f64, String> {
    let parsed = value
        .parse::<f64>()
        .map_err(|_| "value must be a number between 0 and 1".to_string())?;
    if !(0.0..=1.0).contains(&parsed) {
        return Err("value must be a number between 0 and 1".to_string());
    }
    Ok(parsed)
}

/// Extended help shown after `ledgerloop correction record --help`.
pub const CORRECTION_RECORD_AFTER_HELP: &str = "\
How learning works:
  Every correction is stored as an event. Once the same field is corrected
  to the same value for similar descriptions enough times (see
  `aggregation_threshold` in `ledgerloop settings show`), a pattern
  suggestion is queued for validation.

  Amounts and other numbers in descriptions are ignored when grouping, so
  `Received 0.00695 BTC` and `Received 0.01 BTC` count toward the same group.

  A correction whose old value equals its new value is recorded but never
  counted.

What to do next:
  1. Run `ledgerloop suggestions list --status pending` to see queued suggestions.
  2. Run `ledgerloop suggestions validate` to review them with the configured LLM.
";

/// Extended help shown after `ledgerloop suggestions validate --help`.
pub const SUGGESTIONS_VALIDATE_AFTER_HELP: &str = "\
LLM configuration (environment):
  LEDGERLOOP_LLM_URL       OpenAI-compatible chat completions endpoint (required)
  LEDGERLOOP_LLM_MODEL     Model name sent with each request (required)
  LEDGERLOOP_LLM_API_KEY   Bearer token (optional)

Timeouts, malformed replies and transport errors leave a suggestion pending
for the next run. Approved suggestions become active patterns.
";

#[derive(Debug, Parser)]
#[command(
    name = "ledgerloop",
    version,
    about = "pattern learning and transaction classification",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Tenant the command is scoped to
    #[arg(long, global = true)]
    pub tenant: Option<String>,
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record user corrections to transaction classifications
    #[command(arg_required_else_help = true)]
    Correction {
        #[command(subcommand)]
        command: CorrectionCommand,
    },
    /// Inspect and validate pattern suggestions
    #[command(arg_required_else_help = true)]
    Suggestions {
        #[command(subcommand)]
        command: SuggestionsCommand,
    },
    /// Manage approved classification patterns
    #[command(arg_required_else_help = true)]
    Patterns {
        #[command(subcommand)]
        command: PatternsCommand,
    },
    /// Classify a transaction from a JSON file
    Classify {
        /// Path to a JSON transaction object
        transaction: String,
        /// Path to a JSON array of already classified transactions
        #[arg(long)]
        candidates: Option<String>,
    },
    /// Rank classified transactions by similarity to one transaction
    Similar {
        /// Path to a JSON transaction object
        transaction: String,
        /// Path to a JSON array of already classified transactions
        #[arg(long)]
        candidates: String,
        /// Lowest confidence to report (defaults to the tenant setting)
        #[arg(long, value_parser = parse_unit_interval)]
        min_confidence: Option<f64>,
    },
    /// Show or change per-tenant learning settings
    #[command(arg_required_else_help = true)]
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    /// List pattern approval and rejection notices
    #[command(arg_required_else_help = true)]
    Notifications {
        #[command(subcommand)]
        command: NotificationsCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum CorrectionCommand {
    /// Record one correction and report any suggestion it completes
    #[command(after_long_help = CORRECTION_RECORD_AFTER_HELP)]
    Record {
        /// Reference of the corrected transaction
        #[arg(long = "txn")]
        transaction_ref: String,
        /// Corrected field
        #[arg(long, value_parser = parse_correction_field)]
        field: String,
        /// Value before the correction
        #[arg(long = "old")]
        old_value: Option<String>,
        /// Value after the correction
        #[arg(long = "new")]
        new_value: String,
        /// Transaction description at correction time
        #[arg(long)]
        description: String,
        #[arg(long)]
        origin: Option<String>,
        #[arg(long)]
        destination: Option<String>,
        /// User id or email of whoever made the correction
        #[arg(long)]
        actor: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum SuggestionsCommand {
    /// Re-aggregate recorded corrections into pending suggestions
    Scan,
    /// List suggestions, oldest group first
    List {
        #[arg(long, value_parser = parse_suggestion_status)]
        status: Option<String>,
    },
    /// Review pending suggestions with the configured LLM
    #[command(after_long_help = SUGGESTIONS_VALIDATE_AFTER_HELP)]
    Validate {
        /// Maximum suggestions to review (1-30)
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Debug, Subcommand)]
pub enum PatternsCommand {
    /// List active patterns
    List {
        /// Include deactivated patterns
        #[arg(long)]
        all: bool,
    },
    /// Create patterns from a JSON array of seeds
    Seed { path: String },
    /// Stop a pattern from matching
    Deactivate { pattern_id: String },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Show effective settings and whether each is a default
    Show,
    /// Override one setting for the tenant
    Set { key: String, value: String },
}

#[derive(Debug, Subcommand)]
pub enum NotificationsCommand {
    /// List notices, newest first
    List,
}

#[cfg(test)]
pub fn parse_from<I, T>(itr: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(itr)
}
