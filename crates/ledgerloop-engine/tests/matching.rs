mod support;

use ledgerloop_engine::commands::classify::{self, ClassifyOptions, SimilarOptions};
use ledgerloop_engine::commands::patterns::{self, PatternDeactivateOptions, PatternSeedOptions};
use serde_json::{Value, json};
use support::learning_testkit::{temp_home_in_tmp, transaction, write_fixture_json};

fn payload(result: ledgerloop_engine::EngineResult<ledgerloop_engine::SuccessEnvelope>) -> Value {
    assert!(result.is_ok());
    if let Ok(success) = result {
        return serde_json::to_value(success).unwrap_or(Value::Null);
    }
    Value::Null
}

#[test]
fn amount_divergence_ranks_below_a_close_amount() {
    let temp = temp_home_in_tmp("ledgerloop-amount-penalty");
    assert!(temp.is_ok());
    if let Ok((dir, home)) = temp {
        let target = write_fixture_json(
            dir.path(),
            "target.json",
            &transaction("target", "Received BTC deposit", 100.0, "2024-04-10", None),
        );
        let candidates = write_fixture_json(
            dir.path(),
            "candidates.json",
            &json!([
                transaction("far", "Received BTC deposit", 500.0, "2024-04-09", Some("Kraken")),
                transaction("near", "Received BTC deposit", 140.0, "2024-04-01", Some("Kraken")),
            ]),
        );
        assert!(target.is_ok() && candidates.is_ok());
        if let (Ok(target), Ok(candidates)) = (target, candidates) {
            let similar = payload(classify::similar_with_options(SimilarOptions {
                tenant_id: "acme".to_string(),
                transaction_path: target.display().to_string(),
                candidates_path: candidates.display().to_string(),
                min_confidence: Some(0.0),
                home_override: Some(&home),
            }));
            let matches = similar["data"]["matches"].as_array().cloned().unwrap_or_default();
            assert_eq!(matches.len(), 2);
            assert_eq!(matches[0]["transaction"]["id"], "near");
            assert_eq!(matches[0]["tier"], "high");
            assert_eq!(matches[1]["transaction"]["id"], "far");
            let near = matches[0]["confidence"].as_f64().unwrap_or(0.0);
            let far = matches[1]["confidence"].as_f64().unwrap_or(1.0);
            assert!(far < near);
        }
    }
}

#[test]
fn equal_candidates_are_ordered_most_recent_first() {
    let temp = temp_home_in_tmp("ledgerloop-date-tiebreak");
    assert!(temp.is_ok());
    if let Ok((dir, home)) = temp {
        let target = write_fixture_json(
            dir.path(),
            "target.json",
            &transaction("target", "Stripe payout", 50.0, "2024-04-10", None),
        );
        let candidates = write_fixture_json(
            dir.path(),
            "candidates.json",
            &json!([
                transaction("older", "Stripe payout", 50.0, "2024-01-02", Some("Stripe")),
                transaction("newer", "Stripe payout", 50.0, "2024-03-02", Some("Stripe")),
            ]),
        );
        if let (Ok(target), Ok(candidates)) = (target, candidates) {
            let similar = payload(classify::similar_with_options(SimilarOptions {
                tenant_id: "acme".to_string(),
                transaction_path: target.display().to_string(),
                candidates_path: candidates.display().to_string(),
                min_confidence: None,
                home_override: Some(&home),
            }));
            assert_eq!(similar["data"]["min_confidence"], 0.3);
            assert_eq!(similar["data"]["matches"][0]["transaction"]["id"], "newer");
            assert_eq!(similar["data"]["matches"][1]["transaction"]["id"], "older");
        }
    }
}

#[test]
fn classify_with_nothing_to_compare_returns_no_results() {
    let temp = temp_home_in_tmp("ledgerloop-empty-classify");
    assert!(temp.is_ok());
    if let Ok((dir, home)) = temp {
        let target = write_fixture_json(
            dir.path(),
            "target.json",
            &transaction("target", "Unseen vendor", 12.0, "2024-04-10", None),
        );
        let candidates = write_fixture_json(dir.path(), "candidates.json", &json!([]));
        if let (Ok(target), Ok(candidates)) = (target, candidates) {
            let classified = payload(classify::classify_with_options(ClassifyOptions {
                tenant_id: "acme".to_string(),
                transaction_path: target.display().to_string(),
                candidates_path: Some(candidates.display().to_string()),
                home_override: Some(&home),
            }));
            assert_eq!(classified["data"]["results"], json!([]));
            assert_eq!(classified["data"]["candidate_count"], 0);
        }
    }
}

#[test]
fn seeded_exact_pattern_classifies_until_deactivated() {
    let temp = temp_home_in_tmp("ledgerloop-seeded");
    assert!(temp.is_ok());
    if let Ok((dir, home)) = temp {
        let seeds = write_fixture_json(
            dir.path(),
            "seeds.json",
            &json!([
                {
                    "expression": {"kind": "exact", "text": "Monthly Rent"},
                    "target_field": "category",
                    "target_value": "Rent",
                    "confidence": 0.95
                }
            ]),
        );
        let target = write_fixture_json(
            dir.path(),
            "target.json",
            &transaction("target", "monthly  rent", 1800.0, "2024-04-01", None),
        );
        if let (Ok(seeds), Ok(target)) = (seeds, target) {
            let seeded = payload(patterns::seed_with_options(PatternSeedOptions {
                tenant_id: "acme".to_string(),
                path: seeds.display().to_string(),
                home_override: Some(&home),
            }));
            assert_eq!(seeded["data"]["created"], 1);
            let pattern_id = seeded["data"]["pattern_ids"][0]
                .as_str()
                .unwrap_or_default()
                .to_string();

            let classify_target = || {
                payload(classify::classify_with_options(ClassifyOptions {
                    tenant_id: "acme".to_string(),
                    transaction_path: target.display().to_string(),
                    candidates_path: None,
                    home_override: Some(&home),
                }))
            };
            let before = classify_target();
            assert_eq!(before["data"]["results"][0]["field"], "category");
            assert_eq!(before["data"]["results"][0]["value"], "Rent");
            assert_eq!(before["data"]["results"][0]["tier"], "high");

            let deactivated = payload(patterns::deactivate_with_options(PatternDeactivateOptions {
                tenant_id: "acme".to_string(),
                pattern_id: pattern_id.clone(),
                home_override: Some(&home),
            }));
            assert_eq!(deactivated["data"]["is_active"], false);

            let after = classify_target();
            assert_eq!(after["data"]["results"], json!([]));

            let missing = patterns::deactivate_with_options(PatternDeactivateOptions {
                tenant_id: "globex".to_string(),
                pattern_id,
                home_override: Some(&home),
            });
            assert!(matches!(missing, Err(ref error) if error.code == "pattern_not_found"));
        }
    }
}
