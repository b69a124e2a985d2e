//! Decision-definition validation
//!
//! Cheap, synchronous checks run before publishing. Errors block the
//! publish; warnings are advisory.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::engine::condition::{evaluate_condition, ConditionOperator};
use crate::models::{Condition, Decision, HitPolicy, Rule};

/// Outcome of a definition validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Validate a decision definition.
///
/// Errors: missing inputs, missing outputs, a rule condition referencing
/// an unknown input id, a rule output referencing an unknown output id.
/// Warnings: zero rules, a rule with zero conditions, and detectable rule
/// overlap under the UNIQUE hit policy (a best-effort check: it only
/// reports overlaps it can prove from literal equality conditions).
pub fn validate_decision(decision: &Decision) -> DecisionValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if decision.inputs.is_empty() {
        errors.push("decision has no input clauses".to_string());
    }
    if decision.outputs.is_empty() {
        errors.push("decision has no output clauses".to_string());
    }

    let input_ids: HashSet<&str> = decision.inputs.iter().map(|i| i.id.as_str()).collect();
    let output_ids: HashSet<&str> = decision.outputs.iter().map(|o| o.id.as_str()).collect();

    for (index, rule) in decision.rules.iter().enumerate() {
        let label = if rule.id.is_empty() {
            format!("rule #{}", index + 1)
        } else {
            format!("rule '{}'", rule.id)
        };
        for condition in &rule.conditions {
            if !input_ids.contains(condition.input_id.as_str()) {
                errors.push(format!(
                    "{} references unknown input '{}'",
                    label, condition.input_id
                ));
            }
        }
        for output in &rule.outputs {
            if !output_ids.contains(output.output_id.as_str()) {
                errors.push(format!(
                    "{} references unknown output '{}'",
                    label, output.output_id
                ));
            }
        }
        if rule.conditions.is_empty() {
            warnings.push(format!("{} has no conditions and matches every input", label));
        }
    }

    if decision.rules.is_empty() {
        warnings.push("decision has no rules".to_string());
    }

    if decision.hit_policy == HitPolicy::Unique {
        for (first_index, first) in decision.rules.iter().enumerate() {
            for (second_index, second) in decision.rules.iter().enumerate().skip(first_index + 1) {
                if rules_may_overlap(first, second) {
                    warnings.push(format!(
                        "UNIQUE hit policy: rules #{} and #{} may overlap",
                        first_index + 1,
                        second_index + 1
                    ));
                }
            }
        }
    }

    DecisionValidationResult {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// Best-effort overlap test: two rules are disjoint only when some input
/// column carries provably exclusive conditions in both rules.
fn rules_may_overlap(first: &Rule, second: &Rule) -> bool {
    for condition in &first.conditions {
        for other in &second.conditions {
            if condition.input_id == other.input_id && provably_disjoint(condition, other) {
                return false;
            }
        }
    }
    true
}

/// Exclusive when both are equality tests on different literals, or one
/// side's equality literal fails the other side's predicate
fn provably_disjoint(a: &Condition, b: &Condition) -> bool {
    let a_op = ConditionOperator::parse(&a.operator);
    let b_op = ConditionOperator::parse(&b.operator);
    match (a_op, b_op) {
        (Some(ConditionOperator::Equals), Some(b_op)) => {
            !evaluate_condition(&a.value, b_op, &b.value)
        }
        (Some(a_op), Some(ConditionOperator::Equals)) => {
            !evaluate_condition(&b.value, a_op, &a.value)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DecisionInput, DecisionOutput, RuleOutput};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn base_decision() -> Decision {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        Decision::new("d1", "grading", "Grading", now)
            .add_input(DecisionInput::new("age", "Age", "age").with_type("number"))
            .add_output(DecisionOutput::new("level", "Level", "level").with_type("string"))
    }

    #[test]
    fn test_valid_decision_passes() {
        let decision = base_decision().add_rule(
            Rule::new("rule_0")
                .add_condition(Condition::new("age", ">=", json!(18)))
                .add_output(RuleOutput::new("level", json!("adult"))),
        );
        let result = validate_decision(&decision);
        assert!(result.valid, "errors: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_missing_clauses_are_errors() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let empty = Decision::new("d1", "empty", "Empty", now);
        let result = validate_decision(&empty);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_dangling_references_are_errors() {
        let decision = base_decision().add_rule(
            Rule::new("rule_0")
                .add_condition(Condition::new("nope", "==", json!(1)))
                .add_output(RuleOutput::new("missing", json!("x"))),
        );
        let result = validate_decision(&decision);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("unknown input 'nope'")));
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("unknown output 'missing'")));
    }

    #[test]
    fn test_zero_rules_and_empty_conditions_warn() {
        let no_rules = base_decision();
        assert!(validate_decision(&no_rules)
            .warnings
            .iter()
            .any(|w| w.contains("no rules")));

        let catch_all = base_decision()
            .add_rule(Rule::new("rule_0").add_output(RuleOutput::new("level", json!("any"))));
        assert!(validate_decision(&catch_all)
            .warnings
            .iter()
            .any(|w| w.contains("no conditions")));
    }

    #[test]
    fn test_unique_overlap_detection() {
        let overlapping = base_decision()
            .with_hit_policy(HitPolicy::Unique)
            .add_rule(Rule::new("rule_0").add_condition(Condition::new("age", ">=", json!(18))))
            .add_rule(Rule::new("rule_1").add_condition(Condition::new("age", ">=", json!(21))));
        assert!(validate_decision(&overlapping)
            .warnings
            .iter()
            .any(|w| w.contains("may overlap")));

        // provably exclusive equality literals
        let disjoint = base_decision()
            .with_hit_policy(HitPolicy::Unique)
            .add_rule(Rule::new("rule_0").add_condition(Condition::new("age", "==", json!(18))))
            .add_rule(Rule::new("rule_1").add_condition(Condition::new("age", "==", json!(21))));
        assert!(!validate_decision(&disjoint)
            .warnings
            .iter()
            .any(|w| w.contains("may overlap")));
    }
}
