//! End-to-end executor scenarios
//!
//! Covers the core evaluation laws: determinism, rule-order preservation,
//! FIRST short-circuit, the UNIQUE strict contract, and the COLLECT-SUM
//! column law, plus record persistence and batch mode.

mod common;

use common::{harness, input_map, runtime};
use serde_json::json;

use dmn_engine::engine::EngineError;
use dmn_engine::models::{ExecuteOptions, ExecuteRequest, ExecutionStatus};
use dmn_engine::store::{DecisionStore, ExecutionStore, Page};

#[test]
fn test_first_age_grading_scenario() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();
        h.decisions.save(&common::age_grading_decision()).await.unwrap();

        let result = h
            .executor
            .execute(
                ExecuteRequest::by_id("dec-grading").with_input("age", json!(25)),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.matched_rules.as_deref(), Some(&["rule_0".to_string()][..]));
        assert_eq!(result.output_result, Some(json!({"level": "adult"})));
        assert_eq!(result.matched_count, 1);
    });
}

#[test]
fn test_first_short_circuit_is_visible_in_audit() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();
        h.decisions.save(&common::age_grading_decision()).await.unwrap();

        // first rule matches: exactly one rule evaluated
        let result = h
            .executor
            .execute(
                ExecuteRequest::by_id("dec-grading").with_input("age", json!(40)),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.audit.unwrap().rule_executions.len(), 1);

        // a null input satisfies neither ordering rule: all rules evaluated
        let result = h
            .executor
            .execute(
                ExecuteRequest::by_id("dec-grading").with_input("age", json!(null)),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.status, ExecutionStatus::NoMatch);
        assert_eq!(result.audit.unwrap().rule_executions.len(), 2);
    });
}

#[test]
fn test_collect_sum_scoring_scenario() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();
        h.decisions.save(&common::scoring_decision()).await.unwrap();

        let result = h
            .executor
            .execute(
                ExecuteRequest::by_id("dec-scoring").with_input("category", json!("A")),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.matched_count, 2);
        assert_eq!(result.output_result, Some(json!({"points": 300})));
    });
}

#[test]
fn test_unique_violation_strict_persists_failed_record() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();
        h.decisions
            .save(&common::overlapping_unique_decision())
            .await
            .unwrap();

        let error = h
            .executor
            .execute(
                ExecuteRequest::by_id("dec-overlap").with_input("x", json!(5)),
                ExecuteOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(error, EngineError::PolicyViolation(_)));

        // the FAILED record is persisted before the rethrow
        let (records, total) = h.executions.query(Some("dec-overlap"), None, Page::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(records[0].status, ExecutionStatus::Failed);
        assert!(records[0].error_message.as_deref().unwrap().contains("UNIQUE"));
        // both rules were evaluated before the violation surfaced
        assert!(records[0].audit.as_ref().unwrap().rule_executions.len() >= 2);
    });
}

#[test]
fn test_unique_lenient_merges_and_records_validation_message() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();
        h.decisions
            .save(&common::overlapping_unique_decision())
            .await
            .unwrap();

        let result = h
            .executor
            .execute(
                ExecuteRequest::by_id("dec-overlap").with_input("x", json!(5)),
                ExecuteOptions::default().lenient(),
            )
            .await
            .unwrap();

        assert_eq!(result.status, ExecutionStatus::Success);
        // merge keeps the last non-null value per output key
        assert_eq!(result.output_result, Some(json!({"band": "high"})));
        assert!(result.audit.unwrap().validation_message.is_some());
    });
}

#[test]
fn test_priority_scenario_returns_highest_severity() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();
        h.decisions
            .save(&common::priority_triage_decision())
            .await
            .unwrap();

        let result = h
            .executor
            .execute(
                ExecuteRequest::by_id("dec-triage").with_input("code", json!("x")),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.matched_count, 3);
        assert_eq!(result.output_result, Some(json!({"severity": "HIGH"})));
        // matched-rule ids resort by the declared severity order
        assert_eq!(
            result.matched_rules.as_deref(),
            Some(
                &[
                    "rule_1".to_string(),
                    "rule_2".to_string(),
                    "rule_0".to_string()
                ][..]
            )
        );
    });
}

#[test]
fn test_determinism_across_invocations() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();
        h.decisions.save(&common::scoring_decision()).await.unwrap();

        let request = || ExecuteRequest::by_id("dec-scoring").with_input("category", json!("A"));
        let first = h
            .executor
            .execute(request(), ExecuteOptions::default())
            .await
            .unwrap();
        let second = h
            .executor
            .execute(request(), ExecuteOptions::default())
            .await
            .unwrap();

        assert_eq!(first.output_result, second.output_result);
        assert_eq!(first.matched_rules, second.matched_rules);
        assert_eq!(first.matched_count, second.matched_count);
        assert_eq!(first.status, second.status);
    });
}

#[test]
fn test_key_selection_requires_published_and_picks_highest_version() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();
        let v1 = common::age_grading_decision();
        h.decisions.save(&v1).await.unwrap();

        let mut v2 = common::age_grading_decision();
        v2.id = "dec-grading-v2".to_string();
        v2.version = 2;
        // v2 output flips the label so the selected version is observable
        v2.rules[0].outputs[0].value = json!("grown-up");
        h.decisions.save(&v2).await.unwrap();

        let mut draft_v3 = common::age_grading_decision();
        draft_v3.id = "dec-grading-v3".to_string();
        draft_v3.version = 3;
        draft_v3.status = dmn_engine::models::DecisionStatus::Draft;
        h.decisions.save(&draft_v3).await.unwrap();

        // unpinned key selection takes the highest published version (v2)
        let result = h
            .executor
            .execute(
                ExecuteRequest::by_key("grading").with_input("age", json!(30)),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.decision_version, 2);
        assert_eq!(result.output_result, Some(json!({"level": "grown-up"})));

        // pinning an unpublished version is an invalid request
        let error = h
            .executor
            .execute(
                ExecuteRequest::by_key("grading")
                    .with_version(3)
                    .with_input("age", json!(30)),
                ExecuteOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(error, EngineError::InvalidRequest(_)));

        // unknown key is not found
        let error = h
            .executor
            .execute(
                ExecuteRequest::by_key("missing").with_input("age", json!(30)),
                ExecuteOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(error, EngineError::NotFound(_)));

        // a request with no selector at all is invalid
        let error = h
            .executor
            .execute(ExecuteRequest::default(), ExecuteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(error, EngineError::InvalidRequest(_)));
    });
}

#[test]
fn test_input_expression_fallback_via_feel() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();
        let mut decision = common::age_grading_decision();
        // the condition references input id "age" whose value is absent
        // from the map; the input expression derives it
        decision.inputs[0].expression = "applicant.age".to_string();
        h.decisions.save(&decision).await.unwrap();

        let result = h
            .executor
            .execute(
                ExecuteRequest::by_id("dec-grading")
                    .with_input_data(input_map(json!({"applicant": {"age": 25}}))),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.output_result, Some(json!({"level": "adult"})));
    });
}

#[test]
fn test_no_match_persists_record() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();
        h.decisions.save(&common::scoring_decision()).await.unwrap();

        let result = h
            .executor
            .execute(
                ExecuteRequest::by_id("dec-scoring").with_input("category", json!("Z")),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.status, ExecutionStatus::NoMatch);
        assert_eq!(result.matched_count, 0);
        assert_eq!(result.output_result, None);

        let stats = h.executions.stats("dec-scoring").await.unwrap();
        assert_eq!(stats.total_executions, 1);
        assert_eq!(stats.no_match_count, 1);
    });
}

#[test]
fn test_batch_mode_never_throws() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();
        h.decisions.save(&common::scoring_decision()).await.unwrap();

        let results = h
            .executor
            .execute_batch(
                "dec-scoring",
                vec![
                    input_map(json!({"category": "A"})),
                    input_map(json!({"category": "B"})),
                    input_map(json!({"category": "Z"})),
                ],
                ExecuteOptions::default(),
            )
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, ExecutionStatus::Success);
        assert_eq!(results[0].output_result, Some(json!({"points": 300})));
        assert_eq!(results[1].output_result, Some(json!({"points": 50})));
        assert_eq!(results[2].status, ExecutionStatus::NoMatch);

        // a batch against a missing decision yields FAILED entries
        let results = h
            .executor
            .execute_batch(
                "missing",
                vec![input_map(json!({"category": "A"}))],
                ExecuteOptions::default(),
            )
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, ExecutionStatus::Failed);
        assert!(results[0].error_message.is_some());
    });
}

#[test]
fn test_audit_can_be_disabled() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();
        h.decisions.save(&common::age_grading_decision()).await.unwrap();

        let result = h
            .executor
            .execute(
                ExecuteRequest::by_id("dec-grading").with_input("age", json!(25)),
                ExecuteOptions::default().with_audit(false),
            )
            .await
            .unwrap();
        assert!(result.audit.is_none());
    });
}

#[test]
fn test_statistics_aggregate_over_mixed_outcomes() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();
        h.decisions
            .save(&common::overlapping_unique_decision())
            .await
            .unwrap();

        // one success (single match), one no-match, one failure (violation)
        h.executor
            .execute(
                ExecuteRequest::by_id("dec-overlap").with_input("x", json!(1)),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();
        h.executor
            .execute(
                ExecuteRequest::by_id("dec-overlap").with_input("x", json!(-1)),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();
        let _ = h
            .executor
            .execute(
                ExecuteRequest::by_id("dec-overlap").with_input("x", json!(9)),
                ExecuteOptions::default(),
            )
            .await;

        let stats = h.executions.stats("dec-overlap").await.unwrap();
        assert_eq!(stats.total_executions, 3);
        assert_eq!(stats.success_count, 1);
        assert_eq!(stats.no_match_count, 1);
        assert_eq!(stats.failed_count, 1);
    });
}
