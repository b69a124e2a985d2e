//! DMN XML round-trip tests
//!
//! Export-then-parse must recover a decision equal modulo synthesized ids
//! and whitespace, and a parsed COLLECT/SUM document must evaluate exactly
//! like its hand-built counterpart.

mod common;

use common::{harness, runtime};
use serde_json::json;

use dmn_engine::export::{DmnExporter, ExportOptions};
use dmn_engine::import::{convert_to_decisions, DmnParser};
use dmn_engine::lifecycle::DecisionDefinition;
use dmn_engine::models::{
    Condition, DecisionInput, DecisionOutput, ExecuteOptions, ExecuteRequest, ExecutionStatus,
    HitPolicy, Rule, RuleOutput,
};
use dmn_engine::store::DecisionStore;

const COLLECT_SUM_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<definitions xmlns="https://www.omg.org/spec/DMN/20191111/MODEL/" id="defs" name="scoring" namespace="http://example.com/dmn">
  <decision id="xml-scoring" name="Category Scoring">
    <decisionTable id="dt" hitPolicy="COLLECT" aggregation="SUM">
      <input id="category" label="Category">
        <inputExpression typeRef="string"><text>category</text></inputExpression>
      </input>
      <output id="points" label="Points" name="points" typeRef="integer"/>
      <rule id="r0">
        <inputEntry id="ie00"><text><![CDATA["A"]]></text></inputEntry>
        <outputEntry id="oe00"><text><![CDATA[100]]></text></outputEntry>
      </rule>
      <rule id="r1">
        <inputEntry id="ie10"><text><![CDATA["A"]]></text></inputEntry>
        <outputEntry id="oe10"><text><![CDATA[200]]></text></outputEntry>
      </rule>
    </decisionTable>
  </decision>
</definitions>"#;

#[test]
fn test_parse_collect_sum_then_execute_matches_handbuilt() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();

        // ingest the XML as a draft, then publish and run it
        let imported = h.manager.import_xml(COLLECT_SUM_XML, None).await.unwrap();
        assert_eq!(imported.len(), 1);
        let decision = &imported[0];
        assert_eq!(decision.hit_policy, HitPolicy::Collect);
        assert_eq!(
            decision.aggregation,
            Some(dmn_engine::models::Aggregation::Sum)
        );
        assert_eq!(decision.rule_count, 2);

        h.manager.publish(&decision.id).await.unwrap();

        let result = h
            .executor
            .execute(
                ExecuteRequest::by_key("xml-scoring").with_input("category", json!("A")),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();

        // identical to the hand-built COLLECT/SUM scenario
        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.matched_count, 2);
        assert_eq!(result.output_result, Some(json!({"points": 300})));
    });
}

#[test]
fn test_created_decision_survives_export_parse_roundtrip() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();
        let created = h
            .manager
            .create(DecisionDefinition {
                decision_key: "loan-check".to_string(),
                name: "Loan Check".to_string(),
                description: Some("Risk banding for loan applications".to_string()),
                hit_policy: HitPolicy::First,
                inputs: vec![
                    DecisionInput::new("amount", "Amount", "amount").with_type("number"),
                    DecisionInput::new("segment", "Segment", "segment").with_type("string"),
                ],
                outputs: vec![
                    DecisionOutput::new("band", "Band", "band").with_type("string"),
                    DecisionOutput::new("limit", "Limit", "limit").with_type("number"),
                ],
                rules: vec![
                    Rule::new("rule_0")
                        .add_condition(Condition::new("amount", "between", json!([0, 10_000])))
                        .add_condition(Condition::new("segment", "in", json!(["retail", "smb"])))
                        .add_output(RuleOutput::new("band", json!("low")))
                        .add_output(RuleOutput::new("limit", json!(10_000))),
                    Rule::new("rule_1")
                        .add_condition(Condition::new("amount", ">", json!(10_000)))
                        .add_output(RuleOutput::new("band", json!("high")))
                        .add_output(RuleOutput::new("limit", json!(250_000))),
                ],
                ..Default::default()
            })
            .await
            .unwrap();

        let xml = h
            .manager
            .export_xml(&created.id, &ExportOptions::default())
            .await
            .unwrap();
        let recovered = convert_to_decisions(&xml, None).unwrap().remove(0);

        // equal modulo synthesized ids and timestamps
        assert_eq!(recovered.decision_key, created.decision_key);
        assert_eq!(recovered.name, created.name);
        assert_eq!(recovered.description, created.description);
        assert_eq!(recovered.hit_policy, created.hit_policy);
        assert_eq!(recovered.inputs, created.inputs);
        assert_eq!(recovered.rule_count, created.rule_count);
        for (recovered_output, original_output) in recovered.outputs.iter().zip(&created.outputs) {
            assert_eq!(recovered_output.id, original_output.id);
            assert_eq!(recovered_output.name, original_output.name);
            assert_eq!(recovered_output.type_ref, original_output.type_ref);
        }
        for (recovered_rule, original_rule) in recovered.rules.iter().zip(&created.rules) {
            assert_eq!(recovered_rule.conditions, original_rule.conditions);
            assert_eq!(recovered_rule.outputs, original_rule.outputs);
        }
    });
}

#[test]
fn test_roundtrip_preserves_behavior() {
    let rt = runtime();
    rt.block_on(async {
        // the exported-and-reimported decision must decide identically
        let h = harness();
        let original = common::scoring_decision();
        h.decisions.save(&original).await.unwrap();

        let xml = DmnExporter::new()
            .export(&original, &ExportOptions::default())
            .unwrap();
        let reimported = h.manager.import_xml(&xml, None).await.unwrap().remove(0);
        h.manager.publish(&reimported.id).await.unwrap();

        let original_result = h
            .executor
            .execute(
                ExecuteRequest::by_id("dec-scoring").with_input("category", json!("A")),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();
        let reimported_result = h
            .executor
            .execute(
                ExecuteRequest::by_id(&reimported.id).with_input("category", json!("A")),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(original_result.output_result, reimported_result.output_result);
        assert_eq!(original_result.matched_count, reimported_result.matched_count);
    });
}

#[test]
fn test_validate_xml_outcomes() {
    let rt = runtime();
    rt.block_on(async {
        let h = harness();

        let ok = h.manager.validate_xml(COLLECT_SUM_XML);
        assert!(ok.valid, "errors: {:?}", ok.errors);

        let broken = h.manager.validate_xml("<definitions><decision>");
        assert!(!broken.valid);

        let no_definitions = h.manager.validate_xml("<something/>");
        assert!(!no_definitions.valid);
        assert!(no_definitions
            .errors
            .iter()
            .any(|e| e.contains("definitions")));
    });
}

#[test]
fn test_parse_never_throws_on_garbage() {
    let parser = DmnParser::new();
    for garbage in ["", "not xml at all", "<a><b></a></b>", "<?xml version=\"1.0\"?>"] {
        let result = parser.parse(garbage);
        assert!(!result.is_ok());
        assert!(!result.errors.is_empty(), "input {:?}", garbage);
    }
}
