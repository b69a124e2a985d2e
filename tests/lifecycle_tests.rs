//! Lifecycle integration tests
//!
//! The state machine is unit-tested next to the manager; these tests
//! cover the cross-subsystem flows: versioning visible to the executor,
//! query filters, and statistics fed by real executions.

mod common;

use common::{harness, runtime};
use serde_json::json;

use dmn_engine::lifecycle::DecisionDefinition;
use dmn_engine::models::{
    Condition, DecisionInput, DecisionOutput, DecisionStatus, ExecuteOptions, ExecuteRequest,
    HitPolicy, Rule, RuleOutput,
};
use dmn_engine::store::{DecisionFilter, Page};

fn banding_definition() -> DecisionDefinition {
    DecisionDefinition {
        decision_key: "banding".to_string(),
        name: "Score Banding".to_string(),
        hit_policy: HitPolicy::First,
        inputs: vec![DecisionInput::new("score", "Score", "score").with_type("number")],
        outputs: vec![DecisionOutput::new("band", "Band", "band").with_type("string")],
        rules: vec![
            Rule::new("rule_0")
                .add_condition(Condition::new("score", ">=", json!(70)))
                .add_output(RuleOutput::new("band", json!("pass"))),
            Rule::new("rule_1")
                .add_condition(Condition::new("score", "<", json!(70)))
                .add_output(RuleOutput::new("band", json!("fail"))),
        ],
        category: Some("exams".to_string()),
        ..Default::default()
    }
}

#[test]
fn test_new_version_becomes_executable_after_publish() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();
        let v1 = h.manager.create(banding_definition()).await.unwrap();
        h.manager.publish(&v1.id).await.unwrap();

        // v2 tightens the pass mark
        let v2 = h.manager.create_new_version(&v1.id).await.unwrap();
        let mut definition = banding_definition();
        definition.rules[0].conditions[0].value = json!(80);
        definition.rules[1].conditions[0].value = json!(80);
        h.manager.update(&v2.id, definition).await.unwrap();

        // until v2 is published, key execution uses v1
        let result = h
            .executor
            .execute(
                ExecuteRequest::by_key("banding").with_input("score", json!(75)),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.decision_version, 1);
        assert_eq!(result.output_result, Some(json!({"band": "pass"})));

        h.manager.publish(&v2.id).await.unwrap();

        let result = h
            .executor
            .execute(
                ExecuteRequest::by_key("banding").with_input("score", json!(75)),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.decision_version, 2);
        assert_eq!(result.output_result, Some(json!({"band": "fail"})));

        // pinned execution still reaches v1
        let result = h
            .executor
            .execute(
                ExecuteRequest::by_key("banding")
                    .with_version(1)
                    .with_input("score", json!(75)),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.decision_version, 1);
    });
}

#[test]
fn test_suspension_blocks_key_execution() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();
        let created = h.manager.create(banding_definition()).await.unwrap();
        h.manager.publish(&created.id).await.unwrap();
        h.manager.suspend(&created.id).await.unwrap();

        // no published version remains for the key
        let error = h
            .executor
            .execute(
                ExecuteRequest::by_key("banding").with_input("score", json!(75)),
                ExecuteOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(error, dmn_engine::engine::EngineError::NotFound(_)));

        h.manager.activate(&created.id).await.unwrap();
        let result = h
            .executor
            .execute(
                ExecuteRequest::by_key("banding").with_input("score", json!(75)),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.output_result, Some(json!({"band": "pass"})));
    });
}

#[test]
fn test_query_filters() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();
        let banding = h.manager.create(banding_definition()).await.unwrap();
        h.manager.publish(&banding.id).await.unwrap();

        let mut other = banding_definition();
        other.decision_key = "routing".to_string();
        other.name = "Case Routing".to_string();
        other.category = Some("ops".to_string());
        h.manager.create(other).await.unwrap();

        let (all, total) = h
            .manager
            .query(DecisionFilter::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(all.len(), 2);

        let (published, _) = h
            .manager
            .query(
                DecisionFilter {
                    status: Some(DecisionStatus::Published),
                    ..Default::default()
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].decision_key, "banding");

        let (by_category, _) = h
            .manager
            .query(
                DecisionFilter {
                    category: Some("ops".to_string()),
                    ..Default::default()
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(by_category.len(), 1);
        assert_eq!(by_category[0].decision_key, "routing");

        let (by_name, _) = h
            .manager
            .query(
                DecisionFilter {
                    name: Some("Routing".to_string()),
                    ..Default::default()
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);
    });
}

#[test]
fn test_statistics_reflect_executions() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();
        let created = h.manager.create(banding_definition()).await.unwrap();
        h.manager.publish(&created.id).await.unwrap();

        for score in [90, 40, 75] {
            h.executor
                .execute(
                    ExecuteRequest::by_id(&created.id).with_input("score", json!(score)),
                    ExecuteOptions::default(),
                )
                .await
                .unwrap();
        }
        // null satisfies neither rule
        h.executor
            .execute(
                ExecuteRequest::by_id(&created.id).with_input("score", json!(null)),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();

        let stats = h.manager.get_statistics(&created.id).await.unwrap();
        assert_eq!(stats.total_executions, 4);
        assert_eq!(stats.success_count, 3);
        assert_eq!(stats.no_match_count, 1);
        assert_eq!(stats.failed_count, 0);
    });
}

#[test]
fn test_tenant_scoped_keys_do_not_collide() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();
        let mut acme = banding_definition();
        acme.tenant_id = Some("acme".to_string());
        let mut globex = banding_definition();
        globex.tenant_id = Some("globex".to_string());

        // the same key may exist once per tenant
        let a = h.manager.create(acme).await.unwrap();
        let g = h.manager.create(globex).await.unwrap();
        h.manager.publish(&a.id).await.unwrap();
        h.manager.publish(&g.id).await.unwrap();

        let result = h
            .executor
            .execute(
                ExecuteRequest::by_key("banding")
                    .with_tenant("acme")
                    .with_input("score", json!(90)),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.decision_id, a.id);
    });
}
