//! Per-execution audit trace
//!
//! The [`AuditContainer`] records every rule's evaluation during one
//! decision execution: which conditions were checked against which values,
//! whether each rule matched, and the final composed result. It is built
//! unconditionally during evaluation and attached to results and execution
//! records when audit is enabled.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::decision::HitPolicy;

/// One condition check inside a rule evaluation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InputAuditEntry {
    /// Id of the tested input clause
    pub input_id: String,
    /// Value the condition was tested against
    pub input_value: Value,
    /// Condition operator
    pub operator: String,
    /// Condition operand
    pub condition_value: Value,
    /// Whether the condition held
    pub matched: bool,
}

/// One output entry produced by a matched rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutputAuditEntry {
    /// Id of the fed output clause
    pub output_id: String,
    /// Emitted value
    pub output_value: Value,
}

/// Trace of one rule's evaluation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleAuditEntry {
    /// 1-based rule number, in declared order
    pub rule_number: usize,
    /// Rule id
    pub rule_id: String,
    /// Whether every condition held
    pub matched: bool,
    /// Per-condition trace, in condition order
    #[serde(default)]
    pub input_entries: Vec<InputAuditEntry>,
    /// Outputs recorded when the rule matched
    #[serde(default)]
    pub output_entries: Vec<OutputAuditEntry>,
    /// Error text when evaluating this rule threw
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_message: Option<String>,
    /// Policy-violation note recorded in non-strict mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_message: Option<String>,
}

impl RuleAuditEntry {
    /// Start a trace entry for a rule (1-based number)
    pub fn new(rule_number: usize, rule_id: impl Into<String>) -> Self {
        Self {
            rule_number,
            rule_id: rule_id.into(),
            matched: false,
            input_entries: Vec::new(),
            output_entries: Vec::new(),
            exception_message: None,
            validation_message: None,
        }
    }
}

/// Per-execution trace container
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditContainer {
    /// Id of the evaluated decision
    pub decision_id: String,
    /// Logical key of the evaluated decision
    pub decision_key: String,
    /// Hit policy in force
    pub hit_policy: HitPolicy,
    /// Whether strict mode was in force
    pub strict_mode: bool,
    /// Whether DMN 1.1 compatibility was requested
    pub force_dmn11: bool,
    /// Per-rule trace, in declared rule order
    #[serde(default)]
    pub rule_executions: Vec<RuleAuditEntry>,
    /// Policy-violation note recorded in non-strict mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_message: Option<String>,
    /// Final composed result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_result: Option<Value>,
}

impl AuditContainer {
    /// Start a trace for one execution
    pub fn new(
        decision_id: impl Into<String>,
        decision_key: impl Into<String>,
        hit_policy: HitPolicy,
        strict_mode: bool,
        force_dmn11: bool,
    ) -> Self {
        Self {
            decision_id: decision_id.into(),
            decision_key: decision_key.into(),
            hit_policy,
            strict_mode,
            force_dmn11,
            rule_executions: Vec::new(),
            validation_message: None,
            decision_result: None,
        }
    }

    /// Append a rule trace entry; entries stay in declared rule order
    pub fn record_rule(&mut self, entry: RuleAuditEntry) {
        self.rule_executions.push(entry);
    }

    /// Record a non-strict policy-violation note
    pub fn record_validation_message(&mut self, message: impl Into<String>) {
        self.validation_message = Some(message.into());
    }

    /// Number of rules whose conditions were evaluated
    pub fn evaluated_rule_count(&self) -> usize {
        self.rule_executions.len()
    }

    /// Ids of matched rules in declared order
    pub fn matched_rule_ids(&self) -> Vec<String> {
        self.rule_executions
            .iter()
            .filter(|entry| entry.matched)
            .map(|entry| entry.rule_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_matched_rule_ids_preserve_order() {
        let mut audit = AuditContainer::new("d1", "grading", HitPolicy::RuleOrder, true, false);
        let mut first = RuleAuditEntry::new(1, "rule_0");
        first.matched = true;
        let second = RuleAuditEntry::new(2, "rule_1");
        let mut third = RuleAuditEntry::new(3, "rule_2");
        third.matched = true;

        audit.record_rule(first);
        audit.record_rule(second);
        audit.record_rule(third);

        assert_eq!(audit.matched_rule_ids(), vec!["rule_0", "rule_2"]);
        assert_eq!(audit.evaluated_rule_count(), 3);
    }

    #[test]
    fn test_audit_json_shape() {
        let mut audit = AuditContainer::new("d1", "grading", HitPolicy::First, true, false);
        let mut entry = RuleAuditEntry::new(1, "rule_0");
        entry.matched = true;
        entry.input_entries.push(InputAuditEntry {
            input_id: "age".to_string(),
            input_value: json!(25),
            operator: ">=".to_string(),
            condition_value: json!(18),
            matched: true,
        });
        entry.output_entries.push(OutputAuditEntry {
            output_id: "level".to_string(),
            output_value: json!("adult"),
        });
        audit.record_rule(entry);

        let value = serde_json::to_value(&audit).unwrap();
        assert_eq!(value["hitPolicy"], json!("FIRST"));
        assert_eq!(value["ruleExecutions"][0]["ruleNumber"], json!(1));
        assert_eq!(
            value["ruleExecutions"][0]["inputEntries"][0]["inputId"],
            json!("age")
        );
    }
}
