use ledgerloop_engine::commands::{
    classify, corrections, notifications, patterns, settings, suggestions,
};
use ledgerloop_engine::learning::http_llm::HttpLlmClient;
use ledgerloop_engine::{EngineError, EngineResult, SuccessEnvelope};

use crate::cli::{
    Cli, Commands, CorrectionCommand, NotificationsCommand, PatternsCommand, SettingsCommand,
    SuggestionsCommand,
};

pub fn dispatch(cli: &Cli) -> EngineResult<SuccessEnvelope> {
    let tenant_id = cli.tenant.clone().unwrap_or_default();
    match &cli.command {
        Commands::Correction { command } => match command {
            CorrectionCommand::Record {
                transaction_ref,
                field,
                old_value,
                new_value,
                description,
                origin,
                destination,
                actor,
            } => corrections::record_with_options(corrections::CorrectionRecordOptions {
                tenant_id,
                transaction_ref: transaction_ref.clone(),
                field: field.clone(),
                old_value: old_value.clone(),
                new_value: new_value.clone(),
                description: description.clone(),
                origin: origin.clone(),
                destination: destination.clone(),
                actor: actor.clone(),
                home_override: None,
            }),
        },
        Commands::Suggestions { command } => match command {
            SuggestionsCommand::Scan => {
                suggestions::scan_with_options(suggestions::SuggestionScanOptions {
                    tenant_id,
                    home_override: None,
                })
            }
            SuggestionsCommand::List { status } => {
                suggestions::list_with_options(suggestions::SuggestionListOptions {
                    tenant_id,
                    status: status.clone(),
                    home_override: None,
                })
            }
            SuggestionsCommand::Validate { limit } => validate(tenant_id, *limit),
        },
        Commands::Patterns { command } => match command {
            PatternsCommand::List { all } => {
                patterns::list_with_options(patterns::PatternListOptions {
                    tenant_id,
                    include_inactive: *all,
                    home_override: None,
                })
            }
            PatternsCommand::Seed { path } => {
                patterns::seed_with_options(patterns::PatternSeedOptions {
                    tenant_id,
                    path: path.clone(),
                    home_override: None,
                })
            }
            PatternsCommand::Deactivate { pattern_id } => {
                patterns::deactivate_with_options(patterns::PatternDeactivateOptions {
                    tenant_id,
                    pattern_id: pattern_id.clone(),
                    home_override: None,
                })
            }
        },
        Commands::Classify {
            transaction,
            candidates,
        } => classify::classify_with_options(classify::ClassifyOptions {
            tenant_id,
            transaction_path: transaction.clone(),
            candidates_path: candidates.clone(),
            home_override: None,
        }),
        Commands::Similar {
            transaction,
            candidates,
            min_confidence,
        } => classify::similar_with_options(classify::SimilarOptions {
            tenant_id,
            transaction_path: transaction.clone(),
            candidates_path: candidates.clone(),
            min_confidence: *min_confidence,
            home_override: None,
        }),
        Commands::Settings { command } => match command {
            SettingsCommand::Show => settings::show_with_options(settings::SettingsShowOptions {
                tenant_id,
                home_override: None,
            }),
            SettingsCommand::Set { key, value } => {
                settings::set_with_options(settings::SettingsSetOptions {
                    tenant_id,
                    key: key.clone(),
                    value: value.clone(),
                    home_override: None,
                })
            }
        },
        Commands::Notifications { command } => match command {
            NotificationsCommand::List => {
                notifications::list_with_options(notifications::NotificationListOptions {
                    tenant_id,
                    home_override: None,
                })
            }
        },
    }
}

/// The validation pass borrows the store across awaits, so it runs on a
/// current-thread runtime owned by this call.
fn validate(tenant_id: String, limit: Option<usize>) -> EngineResult<SuccessEnvelope> {
    let llm = HttpLlmClient::from_env()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| EngineError::internal_runtime(&error.to_string()))?;
    runtime.block_on(suggestions::validate_with_options(
        suggestions::SuggestionValidateOptions {
            tenant_id,
            limit,
            home_override: None,
        },
        &llm,
    ))
}
