mod support;

use ledgerloop_engine::learning::aggregate::scan_pending_groups;
use ledgerloop_engine::learning::keywords::KeywordRules;
use ledgerloop_engine::learning::llm::LlmError;
use ledgerloop_engine::learning::policy::LEARNING_POLICY_V1;
use ledgerloop_engine::learning::tracker::record_correction;
use ledgerloop_engine::learning::types::{
    CorrectionField, MatchExpression, NewCorrection, NewPattern, SuggestionStatus,
};
use ledgerloop_engine::learning::validator::{Decision, Validator};
use ledgerloop_engine::store::{LearningStore, SqliteStore, SuggestionDecision};
use support::learning_testkit::{Reply, ScriptedLlm, approval};

fn store_with_pending_suggestion() -> Option<SqliteStore> {
    let store = SqliteStore::open_in_memory().ok()?;
    for amount in ["0.00695", "0.00705", "0.01"] {
        record_correction(
            &store,
            NewCorrection {
                tenant_id: "acme".to_string(),
                transaction_ref: format!("txn_{amount}"),
                field: CorrectionField::Entity,
                old_value: None,
                new_value: "Kraken".to_string(),
                description: format!("Received {amount} BTC"),
                origin: Some("Coinbase".to_string()),
                destination: None,
                actor: "ana@example.com".to_string(),
            },
        )
        .ok()?;
    }
    let pending = scan_pending_groups(&store, "acme", 3, &KeywordRules::default()).ok()?;
    if pending.len() != 1 {
        return None;
    }
    Some(store)
}

type StoreValidator<'a> = Validator<'a, SqliteStore, ScriptedLlm, SqliteStore, SqliteStore>;

fn validator<'a>(store: &'a SqliteStore, llm: &'a ScriptedLlm) -> StoreValidator<'a> {
    Validator {
        store,
        llm,
        notifications: store,
        business: store,
        policy: LEARNING_POLICY_V1,
    }
}

#[tokio::test(start_paused = true)]
async fn timeout_leaves_suggestion_pending_and_is_retried_without_duplication() {
    let store = store_with_pending_suggestion();
    assert!(store.is_some());
    if let Some(store) = store {
        let llm = ScriptedLlm::new(vec![
            Reply::Hang,
            Reply::Text(approval(0.9, "Consistent Kraken deposits.")),
        ]);

        let first = validator(&store, &llm).validate_pending("acme").await;
        assert!(first.is_ok());
        if let Ok(run) = first {
            assert_eq!(run.processed, 1);
            assert_eq!(run.deferred, 1);
            assert_eq!(run.approved, 0);
        }
        let pending = store.list_suggestions("acme", Some(SuggestionStatus::Pending));
        assert!(pending.is_ok());
        if let Ok(rows) = pending {
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].validation_attempts, 1);
            assert!(rows[0].last_error.as_deref().is_some_and(|error| error.contains("timed out")));
        }

        let second = validator(&store, &llm).validate_pending("acme").await;
        assert!(second.is_ok());
        if let Ok(run) = second {
            assert_eq!(run.processed, 1);
            assert_eq!(run.approved, 1);
        }
        let all = store.list_suggestions("acme", None);
        assert!(matches!(all, Ok(ref rows) if rows.len() == 1 && rows[0].status == SuggestionStatus::Approved));
        let patterns = store.patterns("acme", true);
        assert!(matches!(patterns, Ok(ref rows) if rows.len() == 1));
    }
}

#[tokio::test]
async fn malformed_and_incomplete_responses_are_soft_failures() {
    let store = store_with_pending_suggestion();
    assert!(store.is_some());
    if let Some(store) = store {
        let llm = ScriptedLlm::new(vec![
            Reply::Text("I think this is probably fine".to_string()),
            Reply::Text(r#"{"approved": true, "justification": "no number"}"#.to_string()),
            Reply::Fail(LlmError::Transport("connection reset".to_string())),
        ]);

        for _ in 0..3 {
            let run = validator(&store, &llm).validate_pending("acme").await;
            assert!(matches!(run, Ok(ref run) if run.deferred == 1 && run.approved == 0 && run.rejected == 0));
        }

        let pending = store.list_suggestions("acme", Some(SuggestionStatus::Pending));
        assert!(pending.is_ok());
        if let Ok(rows) = pending {
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].validation_attempts, 3);
            assert_eq!(rows[0].confidence, None);
        }
        let patterns = store.patterns("acme", true);
        assert!(matches!(patterns, Ok(ref rows) if rows.is_empty()));
        let notices = store.notifications("acme");
        assert!(matches!(notices, Ok(ref rows) if rows.is_empty()));
    }
}

#[tokio::test]
async fn approving_the_same_suggestion_twice_materializes_one_pattern() {
    let store = store_with_pending_suggestion();
    assert!(store.is_some());
    if let Some(store) = store {
        let llm = ScriptedLlm::new(Vec::new());
        let suggestion = store
            .pending_suggestions("acme", 1)
            .ok()
            .and_then(|rows| rows.into_iter().next());
        assert!(suggestion.is_some());
        if let Some(suggestion) = suggestion {
            let decision = Decision {
                approved: true,
                confidence: 0.88,
                justification: "Kraken deposits".to_string(),
            };
            let racer = validator(&store, &llm);
            let first = racer.approve(&suggestion, &decision);
            let second = racer.approve(&suggestion, &decision);
            assert!(matches!(first, Ok(Some(_))));
            assert!(matches!(second, Ok(None)));

            let patterns = store.patterns("acme", true);
            assert!(patterns.is_ok());
            if let Ok(rows) = patterns {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].expression.storage_text(), "received btc");
            }
            let notices = store.notifications("acme");
            assert!(matches!(notices, Ok(ref rows) if rows.len() == 1));
        }
    }
}

#[tokio::test]
async fn approving_an_already_rejected_suggestion_writes_no_pattern() {
    let store = store_with_pending_suggestion();
    assert!(store.is_some());
    if let Some(store) = store {
        let llm = ScriptedLlm::new(Vec::new());
        let suggestion = store
            .pending_suggestions("acme", 1)
            .ok()
            .and_then(|rows| rows.into_iter().next());
        assert!(suggestion.is_some());
        if let Some(suggestion) = suggestion {
            let rejected = store.decide_suggestion(
                &suggestion.suggestion_id,
                &SuggestionDecision {
                    status: SuggestionStatus::Rejected,
                    confidence: 0.7,
                    justification: "Deposits come from several exchanges".to_string(),
                },
            );
            assert!(matches!(rejected, Ok(true)));

            let late = validator(&store, &llm).approve(
                &suggestion,
                &Decision {
                    approved: true,
                    confidence: 0.9,
                    justification: "Kraken deposits".to_string(),
                },
            );
            assert!(matches!(late, Ok(None)));

            let patterns = store.patterns("acme", true);
            assert!(matches!(patterns, Ok(ref rows) if rows.is_empty()));
            let stored = store.suggestion("acme", &suggestion.suggestion_id);
            assert!(matches!(
                stored,
                Ok(Some(ref row)) if row.status == SuggestionStatus::Rejected && row.pattern_id.is_none()
            ));
        }
    }
}

#[tokio::test]
async fn approval_switches_a_deactivated_pattern_back_on() {
    let store = store_with_pending_suggestion();
    assert!(store.is_some());
    if let Some(store) = store {
        let existing = store.insert_pattern_if_absent(&NewPattern {
            tenant_id: "acme".to_string(),
            expression: MatchExpression::Keywords {
                keywords: vec!["received".to_string(), "btc".to_string()],
            },
            target_field: CorrectionField::Entity,
            target_value: "Kraken".to_string(),
            confidence: 0.8,
            created_by: "seed".to_string(),
        });
        assert!(existing.is_ok());
        let Ok((existing, _)) = existing else {
            return;
        };
        assert!(matches!(
            store.deactivate_pattern("acme", &existing.pattern_id),
            Ok(true)
        ));

        let llm = ScriptedLlm::new(vec![Reply::Text(approval(0.9, "Consistent Kraken deposits."))]);
        let run = validator(&store, &llm).validate_pending("acme").await;
        assert!(matches!(run, Ok(ref run) if run.approved == 1 && run.pattern_ids == vec![existing.pattern_id.clone()]));

        let active = store.patterns("acme", false);
        assert!(active.is_ok());
        if let Ok(rows) = active {
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].pattern_id, existing.pattern_id);
            assert!(rows[0].is_active);
        }
        let approved = store.list_suggestions("acme", Some(SuggestionStatus::Approved));
        assert!(matches!(
            approved,
            Ok(ref rows) if rows.len() == 1 && rows[0].pattern_id.as_deref() == Some(existing.pattern_id.as_str())
        ));
    }
}

#[tokio::test]
async fn nothing_pending_means_no_llm_calls() {
    let opened = SqliteStore::open_in_memory();
    assert!(opened.is_ok());
    if let Ok(store) = opened {
        let llm = ScriptedLlm::new(Vec::new());
        let run = validator(&store, &llm).validate_pending("acme").await;
        assert!(matches!(run, Ok(ref run) if run.processed == 0));
        assert!(llm.prompts().is_empty());
    }
}
