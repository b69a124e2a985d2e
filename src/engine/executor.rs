//! Rule-engine executor
//!
//! Per-request orchestrator: resolves the decision, evaluates its rules in
//! declared order, consults the hit-policy handler, aggregates, and
//! persists an execution record for every attempt.
//!
//! The executor holds no mutable state between requests; the store
//! collaborators own their own concurrency discipline and every store call
//! is treated as atomic. A persistence failure is logged and swallowed so
//! it never masks the functional result.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::feel::{self, FeelContext, FeelError};
use crate::models::{
    AuditContainer, Decision, DecisionResult, DecisionStatus, ExecuteOptions, ExecuteRequest,
    ExecutionRecord, ExecutionStatus, InputAuditEntry, OutputAuditEntry, Rule, RuleAuditEntry,
};
use crate::store::{Clock, DecisionStore, ExecutionStore, IdGenerator, StoreError};

use super::condition::{evaluate_condition, ConditionOperator};
use super::hit_policy::{
    handler_for, CompositionContext, HitPolicyHandler, PolicyOutcome, RuleResult,
};

/// Engine failure taxonomy
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// Malformed request: missing selector, wrong decision status
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// No decision for the given selector
    #[error("not found: {0}")]
    NotFound(String),
    /// A strict-mode hit-policy contract violation
    #[error("hit policy violation: {0}")]
    PolicyViolation(String),
    /// A FEEL evaluation failure inside a rule or input expression
    #[error("evaluation failed: {0}")]
    Evaluation(#[from] FeelError),
    /// A decision-store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-request rule-engine orchestrator, generic over its collaborators
pub struct RuleEngineExecutor<DS, ES, C, I> {
    decisions: Arc<DS>,
    executions: Arc<ES>,
    clock: Arc<C>,
    ids: Arc<I>,
}

impl<DS, ES, C, I> RuleEngineExecutor<DS, ES, C, I>
where
    DS: DecisionStore,
    ES: ExecutionStore,
    C: Clock,
    I: IdGenerator,
{
    /// Create an executor over the given collaborators
    pub fn new(decisions: Arc<DS>, executions: Arc<ES>, clock: Arc<C>, ids: Arc<I>) -> Self {
        Self {
            decisions,
            executions,
            clock,
            ids,
        }
    }

    /// Evaluate one decision against one input map.
    ///
    /// A FAILED execution record is persisted (best effort) before an
    /// evaluation error is rethrown to the caller.
    pub async fn execute(
        &self,
        request: ExecuteRequest,
        options: ExecuteOptions,
    ) -> Result<DecisionResult, EngineError> {
        let decision = self.resolve_decision(&request).await?;
        let started = self.clock.now();
        let execution_id = request
            .execution_id
            .clone()
            .unwrap_or_else(|| self.ids.next_id());

        let mut audit = AuditContainer::new(
            decision.id.clone(),
            decision.decision_key.clone(),
            decision.hit_policy,
            options.strict_mode,
            options.force_dmn11,
        );

        let evaluation = self.evaluate_rules(&decision, &request.input_data, &options, &mut audit);
        let elapsed_ms = (self.clock.now() - started).num_milliseconds().max(0) as u64;

        match evaluation {
            Ok(outcome) => {
                let status = if outcome.has_match {
                    ExecutionStatus::Success
                } else {
                    ExecutionStatus::NoMatch
                };
                audit.decision_result = outcome.output.clone();
                let record = self.build_record(
                    &execution_id,
                    &decision,
                    &request,
                    status,
                    &outcome,
                    elapsed_ms,
                    None,
                    options.enable_audit.then(|| audit.clone()),
                );
                self.persist_record(&record).await;
                Ok(DecisionResult {
                    execution_id,
                    decision_id: decision.id.clone(),
                    decision_key: decision.decision_key.clone(),
                    decision_version: decision.version,
                    status,
                    output_result: outcome.output,
                    matched_rules: Some(outcome.matched_rule_ids),
                    matched_count: outcome.matched_count,
                    execution_time_ms: elapsed_ms,
                    error_message: None,
                    audit: options.enable_audit.then_some(audit),
                })
            }
            Err(error) => {
                // best-effort FAILED record, then rethrow
                let failed = PolicyOutcomeSummary::default();
                let record = self.build_record(
                    &execution_id,
                    &decision,
                    &request,
                    ExecutionStatus::Failed,
                    &failed,
                    elapsed_ms,
                    Some(error.to_string()),
                    options.enable_audit.then(|| audit.clone()),
                );
                self.persist_record(&record).await;
                Err(error)
            }
        }
    }

    /// Evaluate one decision against many input maps.
    ///
    /// Errors are converted into FAILED results; the batch itself never
    /// fails.
    pub async fn execute_batch(
        &self,
        decision_id: &str,
        inputs: Vec<Map<String, Value>>,
        options: ExecuteOptions,
    ) -> Vec<DecisionResult> {
        let mut results = Vec::with_capacity(inputs.len());
        for input_data in inputs {
            let request = ExecuteRequest {
                decision_id: Some(decision_id.to_string()),
                input_data,
                ..Default::default()
            };
            match self.execute(request, options).await {
                Ok(result) => results.push(result),
                Err(error) => results.push(DecisionResult {
                    execution_id: self.ids.next_id(),
                    decision_id: decision_id.to_string(),
                    decision_key: String::new(),
                    decision_version: 0,
                    status: ExecutionStatus::Failed,
                    output_result: None,
                    matched_rules: None,
                    matched_count: 0,
                    execution_time_ms: 0,
                    error_message: Some(error.to_string()),
                    audit: None,
                }),
            }
        }
        results
    }

    /// Resolve the decision named by the request selector.
    ///
    /// The id path accepts any status (draft test runs included); the key
    /// path requires a published decision and picks the highest published
    /// version when none is pinned.
    async fn resolve_decision(&self, request: &ExecuteRequest) -> Result<Decision, EngineError> {
        if let Some(id) = &request.decision_id {
            return self
                .decisions
                .find_by_id(id)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("decision '{}' not found", id)));
        }
        let Some(key) = &request.decision_key else {
            return Err(EngineError::InvalidRequest(
                "either decisionId or decisionKey must be provided".to_string(),
            ));
        };
        match request.version {
            Some(version) => {
                let decision = self
                    .decisions
                    .find_by_key(key, request.tenant_id.as_deref(), Some(version))
                    .await?
                    .ok_or_else(|| {
                        EngineError::NotFound(format!(
                            "decision '{}' version {} not found",
                            key, version
                        ))
                    })?;
                if decision.status != DecisionStatus::Published {
                    return Err(EngineError::InvalidRequest(format!(
                        "decision '{}' version {} is {}, not PUBLISHED",
                        key, version, decision.status
                    )));
                }
                Ok(decision)
            }
            None => self
                .decisions
                .find_highest_published_by_key(key, request.tenant_id.as_deref())
                .await?
                .ok_or_else(|| {
                    EngineError::NotFound(format!("no published decision for key '{}'", key))
                }),
        }
    }

    /// CPU-bound core: rule iteration, hit-policy dispatch, composition
    fn evaluate_rules(
        &self,
        decision: &Decision,
        input_data: &Map<String, Value>,
        options: &ExecuteOptions,
        audit: &mut AuditContainer,
    ) -> Result<PolicyOutcomeSummary, EngineError> {
        let handler = handler_for(decision.hit_policy);
        let continue_behavior = handler.as_continue_evaluating();
        let feel_ctx = FeelContext::from_json_map(input_data);

        let mut resolved_inputs: Map<String, Value> = Map::new();
        let mut matched: Vec<RuleResult> = Vec::new();

        for (index, rule) in decision.rules.iter().enumerate() {
            let rule_id = effective_rule_id(rule, index);
            let mut entry = RuleAuditEntry::new(index + 1, rule_id.clone());
            let mut rule_matched = true;

            for condition in &rule.conditions {
                let input_value = self.resolve_input_value(
                    decision,
                    &condition.input_id,
                    input_data,
                    &feel_ctx,
                    &mut resolved_inputs,
                )?;
                let operator = ConditionOperator::parse_or_equals(&condition.operator);
                let condition_matched =
                    evaluate_condition(&input_value, operator, &condition.value);
                entry.input_entries.push(InputAuditEntry {
                    input_id: condition.input_id.clone(),
                    input_value,
                    operator: operator.as_str().to_string(),
                    condition_value: condition.value.clone(),
                    matched: condition_matched,
                });
                if !condition_matched {
                    rule_matched = false;
                }
            }

            entry.matched = rule_matched;
            if rule_matched {
                let mut outputs = Map::new();
                for output_entry in &rule.outputs {
                    let name = decision
                        .output_by_id(&output_entry.output_id)
                        .map(|o| o.name.clone())
                        .unwrap_or_else(|| output_entry.output_id.clone());
                    entry.output_entries.push(OutputAuditEntry {
                        output_id: output_entry.output_id.clone(),
                        output_value: output_entry.value.clone(),
                    });
                    outputs.insert(name, output_entry.value.clone());
                }
                matched.push(RuleResult {
                    rule_index: index,
                    rule_id: rule_id.clone(),
                    priority: rule.priority,
                    outputs,
                });
            }
            audit.record_rule(entry);

            if rule_matched {
                if let Some(behavior) = continue_behavior {
                    let decision_to_continue = behavior.should_continue_evaluating(true);
                    if !decision_to_continue.should_continue {
                        debug!(
                            rule = rule_id.as_str(),
                            reason = decision_to_continue.reason.as_deref().unwrap_or(""),
                            "stopping rule iteration"
                        );
                        break;
                    }
                }
            }
        }

        let composition = CompositionContext {
            matched: &matched,
            outputs: &decision.outputs,
            aggregation: decision.aggregation,
            force_dmn11: options.force_dmn11,
        };
        let outcome = handler.handle(&matched, &composition);
        self.check_validity(handler, &matched, options, audit)?;
        let output = self.compose_output(handler, &composition, &outcome, options, audit)?;

        Ok(PolicyOutcomeSummary {
            has_match: outcome.has_match,
            matched_rule_ids: outcome.matched_rule_ids,
            matched_count: matched.len(),
            output,
        })
    }

    /// Input value for a condition: the caller-supplied value when present,
    /// otherwise the input clause's FEEL expression evaluated against the
    /// input map. Values are resolved once per execution.
    fn resolve_input_value(
        &self,
        decision: &Decision,
        input_id: &str,
        input_data: &Map<String, Value>,
        feel_ctx: &FeelContext,
        resolved: &mut Map<String, Value>,
    ) -> Result<Value, EngineError> {
        if let Some(value) = input_data.get(input_id) {
            return Ok(value.clone());
        }
        if let Some(value) = resolved.get(input_id) {
            return Ok(value.clone());
        }
        let value = match decision.input_by_id(input_id) {
            Some(input) if !input.expression.trim().is_empty() => {
                let expression = input.expression.trim();
                // fast path first; identical results on the overlap
                let evaluated = match feel::evaluate_direct(expression, feel_ctx) {
                    Some(result) => result,
                    None => feel::evaluate_str(expression, feel_ctx),
                };
                match evaluated {
                    Ok(value) => value.to_json(),
                    Err(e) if e.kind == crate::feel::FeelErrorKind::VariableNotFound => {
                        // an absent variable is an absent input, not a failure
                        Value::Null
                    }
                    Err(e) => return Err(EngineError::Evaluation(e)),
                }
            }
            _ => Value::Null,
        };
        resolved.insert(input_id.to_string(), value.clone());
        Ok(value)
    }

    fn check_validity(
        &self,
        handler: &dyn HitPolicyHandler,
        matched: &[RuleResult],
        options: &ExecuteOptions,
        audit: &mut AuditContainer,
    ) -> Result<(), EngineError> {
        let Some(validity) = handler.as_rule_validity() else {
            return Ok(());
        };
        let outcome = validity.evaluate_rule_validity(matched, options.strict_mode);
        if outcome.valid {
            return Ok(());
        }
        let message = outcome
            .error_message
            .unwrap_or_else(|| "hit policy violated".to_string());
        if options.strict_mode {
            return Err(EngineError::PolicyViolation(message));
        }
        warn!(message = message.as_str(), "hit policy violation (lenient mode)");
        audit.record_validation_message(message);
        Ok(())
    }

    fn compose_output(
        &self,
        handler: &dyn HitPolicyHandler,
        composition: &CompositionContext<'_>,
        outcome: &PolicyOutcome,
        options: &ExecuteOptions,
        audit: &mut AuditContainer,
    ) -> Result<Option<Value>, EngineError> {
        if let Some(composer) = handler.as_compose_results() {
            match composer.compose_decision_results(composition) {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => return Ok(outcome.output.clone()),
                Err(violation) => {
                    if options.strict_mode {
                        return Err(EngineError::PolicyViolation(violation.message));
                    }
                    warn!(
                        message = violation.message.as_str(),
                        "composition violation (lenient mode)"
                    );
                    audit.record_validation_message(violation.message);
                    return Ok(outcome.output.clone());
                }
            }
        }
        Ok(outcome.output.clone())
    }

    #[allow(clippy::too_many_arguments)]
    fn build_record(
        &self,
        execution_id: &str,
        decision: &Decision,
        request: &ExecuteRequest,
        status: ExecutionStatus,
        outcome: &PolicyOutcomeSummary,
        elapsed_ms: u64,
        error_message: Option<String>,
        audit: Option<AuditContainer>,
    ) -> ExecutionRecord {
        ExecutionRecord {
            id: execution_id.to_string(),
            decision_id: decision.id.clone(),
            decision_key: decision.decision_key.clone(),
            decision_version: decision.version,
            status,
            input_data: request.input_data.clone(),
            output_result: outcome.output.clone(),
            matched_rule_ids: if outcome.matched_rule_ids.is_empty() {
                None
            } else {
                Some(outcome.matched_rule_ids.clone())
            },
            matched_count: outcome.matched_count,
            execution_time_ms: elapsed_ms,
            process_instance_id: request.process_instance_id.clone(),
            activity_id: request.activity_id.clone(),
            task_id: request.task_id.clone(),
            tenant_id: request.tenant_id.clone().or_else(|| decision.tenant_id.clone()),
            error_message,
            error_details: None,
            audit,
            create_time: self.clock.now(),
        }
    }

    /// Append the record; failures are logged, never propagated
    async fn persist_record(&self, record: &ExecutionRecord) {
        if let Err(error) = self.executions.append(record).await {
            warn!(
                execution_id = record.id.as_str(),
                error = %error,
                "failed to persist execution record"
            );
        }
    }
}

/// Rules stored without an id get a synthesized `rule_<index>` (0-based)
pub(crate) fn effective_rule_id(rule: &Rule, index: usize) -> String {
    if rule.id.trim().is_empty() {
        format!("rule_{}", index)
    } else {
        rule.id.clone()
    }
}

/// Internal composition summary carried to record building
#[derive(Debug, Default)]
struct PolicyOutcomeSummary {
    has_match: bool,
    matched_rule_ids: Vec<String>,
    matched_count: usize,
    output: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_rule_id_synthesis() {
        let anonymous = Rule::new("");
        assert_eq!(effective_rule_id(&anonymous, 3), "rule_3");
        let named = Rule::new("check-age");
        assert_eq!(effective_rule_id(&named, 3), "check-age");
    }
}
