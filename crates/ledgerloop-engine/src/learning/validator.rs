use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::EngineResult;
use crate::learning::context::{BusinessContext, BusinessContextProvider};
use crate::learning::llm::{LlmClient, LlmError};
use crate::learning::notify::{Notification, NotificationSink, pattern_approved, pattern_rejected};
use crate::learning::policy::LearningPolicy;
use crate::learning::types::{NewPattern, PatternSuggestion, SuggestionStatus};
use crate::store::{LearningStore, SuggestionDecision};

pub const VALIDATOR_ACTOR: &str = "llm_validator";

pub const VALIDATION_RESPONSE_SCHEMA: &str = r#"{"approved": boolean, "confidence": number between 0 and 1, "justification": string}"#;

/// Parsed verdict on one suggestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub approved: bool,
    pub confidence: f64,
    pub justification: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationRun {
    pub processed: usize,
    pub approved: usize,
    pub rejected: usize,
    pub deferred: usize,
    pub pattern_ids: Vec<String>,
}

/// The collaborators of one validation pass.
pub struct Validator<'a, S: ?Sized, C, N: ?Sized, B: ?Sized> {
    pub store: &'a S,
    pub llm: &'a C,
    pub notifications: &'a N,
    pub business: &'a B,
    pub policy: LearningPolicy,
}

impl<S, C, N, B> Validator<'_, S, C, N, B>
where
    S: LearningStore + ?Sized,
    C: LlmClient,
    N: NotificationSink + ?Sized,
    B: BusinessContextProvider + ?Sized,
{
    /// Asks the LLM about the tenant's oldest pending suggestions, at most
    /// one batch. LLM failures leave the suggestion pending and are counted
    /// as deferred; store failures abort the pass.
    pub async fn validate_pending(&self, tenant_id: &str) -> EngineResult<ValidationRun> {
        let batch = self.store.pending_suggestions(tenant_id, self.policy.validation_batch_size)?;
        let mut run = ValidationRun::default();
        if batch.is_empty() {
            return Ok(run);
        }
        let context = self.business.business_context(tenant_id)?;

        for suggestion in &batch {
            run.processed += 1;
            let samples = self.sample_descriptions(suggestion)?;
            match validate_one(self.llm, suggestion, &samples, &context, self.policy).await {
                Ok(decision) if decision.approved => {
                    if let Some(pattern_id) = self.approve(suggestion, &decision)? {
                        run.approved += 1;
                        run.pattern_ids.push(pattern_id);
                    }
                }
                Ok(decision) => {
                    if self.reject(suggestion, &decision)? {
                        run.rejected += 1;
                    }
                }
                Err(error) => {
                    warn!(
                        tenant_id,
                        suggestion_id = %suggestion.suggestion_id,
                        error_kind = error.kind(),
                        error = %error,
                        "validation deferred; suggestion stays pending"
                    );
                    self.store
                        .record_validation_failure(&suggestion.suggestion_id, &error.to_string())?;
                    run.deferred += 1;
                }
            }
        }
        Ok(run)
    }

    /// Closes the suggestion as approved and materializes its pattern in one
    /// store write. Returns the pattern id when this call made the decision.
    pub fn approve(
        &self,
        suggestion: &PatternSuggestion,
        decision: &Decision,
    ) -> EngineResult<Option<String>> {
        let approved = self.store.approve_suggestion(
            &suggestion.suggestion_id,
            &decision.justification,
            &NewPattern {
                tenant_id: suggestion.tenant_id.clone(),
                expression: suggestion.match_expression(),
                target_field: suggestion.pattern_type,
                target_value: suggestion.target_value.clone(),
                confidence: decision.confidence,
                created_by: VALIDATOR_ACTOR.to_string(),
            },
        )?;
        let Some(approved) = approved else {
            debug!(
                suggestion_id = %suggestion.suggestion_id,
                "suggestion was decided by another run"
            );
            return Ok(None);
        };
        let pattern = approved.pattern;

        info!(
            tenant_id = %suggestion.tenant_id,
            suggestion_id = %suggestion.suggestion_id,
            pattern_id = %pattern.pattern_id,
            occurrence_count = suggestion.occurrence_count,
            created = approved.created,
            reactivated = approved.reactivated,
            "suggestion approved"
        );
        self.announce(pattern_approved(
            &suggestion.tenant_id,
            &pattern.pattern_id,
            &pattern.expression.storage_text(),
            &target_label(suggestion),
        ));
        Ok(Some(pattern.pattern_id))
    }

    fn reject(&self, suggestion: &PatternSuggestion, decision: &Decision) -> EngineResult<bool> {
        let decided = self.store.decide_suggestion(
            &suggestion.suggestion_id,
            &SuggestionDecision {
                status: SuggestionStatus::Rejected,
                confidence: decision.confidence,
                justification: decision.justification.clone(),
            },
        )?;
        if decided {
            info!(
                tenant_id = %suggestion.tenant_id,
                suggestion_id = %suggestion.suggestion_id,
                occurrence_count = suggestion.occurrence_count,
                "suggestion rejected"
            );
            self.announce(pattern_rejected(
                &suggestion.tenant_id,
                &suggestion.match_expression().storage_text(),
                &target_label(suggestion),
            ));
        }
        Ok(decided)
    }

    fn announce(&self, notification: Notification) {
        if let Err(error) = self.notifications.notify(&notification) {
            warn!(
                tenant_id = %notification.tenant_id,
                code = %error.code,
                "notification sink failed"
            );
        }
    }

    fn sample_descriptions(&self, suggestion: &PatternSuggestion) -> EngineResult<Vec<String>> {
        let events = self
            .store
            .events_by_ids(&suggestion.tenant_id, &suggestion.event_ids)?;
        let mut samples: Vec<String> = Vec::new();
        for event in events {
            if samples.len() >= self.policy.max_prompt_samples {
                break;
            }
            if !samples.contains(&event.description) {
                samples.push(event.description);
            }
        }
        Ok(samples)
    }
}

/// One bounded LLM round trip for one suggestion.
pub async fn validate_one<C>(
    llm: &C,
    suggestion: &PatternSuggestion,
    samples: &[String],
    context: &BusinessContext,
    policy: LearningPolicy,
) -> Result<Decision, LlmError>
where
    C: LlmClient,
{
    let prompt = build_prompt(suggestion, samples, context);
    let raw = tokio::time::timeout(
        policy.llm_timeout,
        llm.complete(&prompt, VALIDATION_RESPONSE_SCHEMA),
    )
    .await
    .map_err(|_| LlmError::Timeout(policy.llm_timeout))??;
    parse_decision(&raw)
}

pub fn build_prompt(
    suggestion: &PatternSuggestion,
    samples: &[String],
    context: &BusinessContext,
) -> String {
    let mut lines = vec![
        "A bookkeeper corrected several transactions the same way. Decide whether the correction should become an automatic rule.".to_string(),
        String::new(),
        format!(
            "Match expression (keywords, in order): {}",
            suggestion.match_expression().storage_text()
        ),
        format!(
            "Target classification: {} = {}",
            suggestion.pattern_type.as_str(),
            suggestion.target_value
        ),
        format!("Occurrences: {}", suggestion.occurrence_count),
    ];
    if !suggestion.origin.is_empty() {
        lines.push(format!("Origin: {}", suggestion.origin));
    }
    if !suggestion.destination.is_empty() {
        lines.push(format!("Destination: {}", suggestion.destination));
    }

    lines.push(String::new());
    lines.push("Sample descriptions:".to_string());
    for sample in samples {
        lines.push(format!("- {sample}"));
    }

    lines.push(String::new());
    lines.push(format!(
        "Known entities: {}",
        joined_or_none(&context.known_entities)
    ));
    lines.push(format!(
        "Industry hints: {}",
        joined_or_none(&context.industry_hints)
    ));
    lines.push(String::new());
    lines.push(
        "Approve only if every transaction matching the expression should get this classification. Reply with JSON: "
            .to_string()
            + VALIDATION_RESPONSE_SCHEMA,
    );
    lines.join("\n")
}

/// Parses the model's verdict. Anything ambiguous is an error, never a
/// default decision.
pub fn parse_decision(raw: &str) -> Result<Decision, LlmError> {
    let body = strip_code_fence(raw.trim());
    if body.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    let value: Value =
        serde_json::from_str(body).map_err(|error| LlmError::Malformed(error.to_string()))?;
    let Value::Object(object) = value else {
        return Err(LlmError::Malformed("expected a JSON object".to_string()));
    };

    let approved = approval_signal(&object)?;
    let confidence = confidence_value(&object)?;
    let justification = object
        .get("justification")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or(LlmError::MissingField("justification"))?;

    Ok(Decision {
        approved,
        confidence,
        justification: justification.to_string(),
    })
}

fn approval_signal(object: &Map<String, Value>) -> Result<bool, LlmError> {
    let value = object
        .get("approved")
        .or_else(|| object.get("decision"))
        .filter(|value| !value.is_null())
        .ok_or(LlmError::MissingField("approved"))?;
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "approve" | "approved" => Ok(true),
            "false" | "no" | "reject" | "rejected" => Ok(false),
            other => Err(LlmError::Malformed(format!(
                "unrecognized approval signal `{other}`"
            ))),
        },
        _ => Err(LlmError::Malformed(
            "approval signal must be a boolean or yes/no".to_string(),
        )),
    }
}

fn confidence_value(object: &Map<String, Value>) -> Result<f64, LlmError> {
    let value = object
        .get("confidence")
        .filter(|value| !value.is_null())
        .ok_or(LlmError::MissingField("confidence"))?;
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    }
    .filter(|number| number.is_finite())
    .ok_or_else(|| LlmError::Malformed("confidence is not a number".to_string()))?;

    if (0.0..=1.0).contains(&number) {
        Ok(number)
    } else if number > 1.0 && number <= 100.0 {
        Ok(number / 100.0)
    } else {
        Err(LlmError::Malformed(format!(
            "confidence {number} is out of range"
        )))
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn target_label(suggestion: &PatternSuggestion) -> String {
    format!(
        "{} {}",
        suggestion.pattern_type.as_str(),
        suggestion.target_value
    )
}

fn joined_or_none(values: &[String]) -> String {
    if values.is_empty() {
        return "none recorded".to_string();
    }
    values.join(", ")
}
