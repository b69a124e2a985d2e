//! Shared fixtures for the integration suite
//!
//! Every harness pins the clock and uses sequential ids so results are
//! reproducible run to run.

// each test binary uses a different subset of these fixtures
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::{json, Map, Value};

use dmn_engine::engine::RuleEngineExecutor;
use dmn_engine::lifecycle::DecisionManager;
use dmn_engine::models::{
    Aggregation, Condition, Decision, DecisionInput, DecisionOutput, HitPolicy, Rule, RuleOutput,
};
use dmn_engine::store::{
    FixedClock, InMemoryDecisionStore, InMemoryExecutionStore, SequentialIdGenerator,
};

pub type TestExecutor = RuleEngineExecutor<
    InMemoryDecisionStore,
    InMemoryExecutionStore,
    FixedClock,
    SequentialIdGenerator,
>;

pub type TestManager = DecisionManager<
    InMemoryDecisionStore,
    InMemoryExecutionStore,
    FixedClock,
    SequentialIdGenerator,
>;

/// An engine wired over shared in-memory stores
pub struct Harness {
    pub decisions: Arc<InMemoryDecisionStore>,
    pub executions: Arc<InMemoryExecutionStore>,
    pub executor: TestExecutor,
    pub manager: TestManager,
}

pub fn harness() -> Harness {
    let decisions = Arc::new(InMemoryDecisionStore::new());
    let executions = Arc::new(InMemoryExecutionStore::new());
    let clock = Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    ));
    let ids = Arc::new(SequentialIdGenerator::new("exec"));
    Harness {
        executor: RuleEngineExecutor::new(
            decisions.clone(),
            executions.clone(),
            clock.clone(),
            ids.clone(),
        ),
        manager: DecisionManager::new(decisions.clone(), executions.clone(), clock, ids),
        decisions,
        executions,
    }
}

pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

pub fn input_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {:?}", other),
    }
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// FIRST-policy age grading: `age >= 18 => adult`, `age < 18 => minor`
pub fn age_grading_decision() -> Decision {
    let mut decision = Decision::new("dec-grading", "grading", "Age Grading", now())
        .with_hit_policy(HitPolicy::First)
        .add_input(DecisionInput::new("age", "Age", "age").with_type("number"))
        .add_output(DecisionOutput::new("level", "Level", "level").with_type("string"))
        .add_rule(
            Rule::new("rule_0")
                .add_condition(Condition::new("age", ">=", json!(18)))
                .add_output(RuleOutput::new("level", json!("adult"))),
        )
        .add_rule(
            Rule::new("rule_1")
                .add_condition(Condition::new("age", "<", json!(18)))
                .add_output(RuleOutput::new("level", json!("minor"))),
        );
    decision.status = dmn_engine::models::DecisionStatus::Published;
    decision.publish_time = Some(now());
    decision
}

/// COLLECT/SUM category scoring: two rules for "A" (100, 200), one for
/// "B" (50)
pub fn scoring_decision() -> Decision {
    let mut decision = Decision::new("dec-scoring", "scoring", "Category Scoring", now())
        .with_hit_policy(HitPolicy::Collect)
        .with_aggregation(Aggregation::Sum)
        .add_input(DecisionInput::new("category", "Category", "category").with_type("string"))
        .add_output(DecisionOutput::new("points", "Points", "points").with_type("number"))
        .add_rule(
            Rule::new("rule_0")
                .add_condition(Condition::new("category", "==", json!("A")))
                .add_output(RuleOutput::new("points", json!(100))),
        )
        .add_rule(
            Rule::new("rule_1")
                .add_condition(Condition::new("category", "==", json!("A")))
                .add_output(RuleOutput::new("points", json!(200))),
        )
        .add_rule(
            Rule::new("rule_2")
                .add_condition(Condition::new("category", "==", json!("B")))
                .add_output(RuleOutput::new("points", json!(50))),
        );
    decision.status = dmn_engine::models::DecisionStatus::Published;
    decision.publish_time = Some(now());
    decision
}

/// Two overlapping rules that both match `x = 5`, for UNIQUE violations
pub fn overlapping_unique_decision() -> Decision {
    let mut decision = Decision::new("dec-overlap", "overlap", "Overlap", now())
        .with_hit_policy(HitPolicy::Unique)
        .add_input(DecisionInput::new("x", "X", "x").with_type("number"))
        .add_output(DecisionOutput::new("band", "Band", "band").with_type("string"))
        .add_rule(
            Rule::new("rule_0")
                .add_condition(Condition::new("x", ">", json!(0)))
                .add_output(RuleOutput::new("band", json!("positive"))),
        )
        .add_rule(
            Rule::new("rule_1")
                .add_condition(Condition::new("x", ">=", json!(5)))
                .add_output(RuleOutput::new("band", json!("high"))),
        );
    decision.status = dmn_engine::models::DecisionStatus::Published;
    decision.publish_time = Some(now());
    decision
}

/// PRIORITY triage with a declared severity order HIGH > MEDIUM > LOW;
/// three rules matching `code = "x"` emit LOW, HIGH, MEDIUM
pub fn priority_triage_decision() -> Decision {
    let mut decision = Decision::new("dec-triage", "triage", "Triage", now())
        .with_hit_policy(HitPolicy::Priority)
        .add_input(DecisionInput::new("code", "Code", "code").with_type("string"))
        .add_output(
            DecisionOutput::new("severity", "Severity", "severity")
                .with_type("string")
                .with_output_values(vec![json!("HIGH"), json!("MEDIUM"), json!("LOW")]),
        )
        .add_rule(
            Rule::new("rule_0")
                .add_condition(Condition::new("code", "==", json!("x")))
                .add_output(RuleOutput::new("severity", json!("LOW"))),
        )
        .add_rule(
            Rule::new("rule_1")
                .add_condition(Condition::new("code", "==", json!("x")))
                .add_output(RuleOutput::new("severity", json!("HIGH"))),
        )
        .add_rule(
            Rule::new("rule_2")
                .add_condition(Condition::new("code", "==", json!("x")))
                .add_output(RuleOutput::new("severity", json!("MEDIUM"))),
        );
    decision.status = dmn_engine::models::DecisionStatus::Published;
    decision.publish_time = Some(now());
    decision
}
