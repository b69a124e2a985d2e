//! Hit-policy handlers
//!
//! Eight policy strategies behind a small trait surface. The base
//! [`HitPolicyHandler::handle`] produces a preliminary outcome from the
//! matched rules; optional behavior traits refine it:
//!
//! - [`ContinueEvaluating`] lets FIRST stop rule iteration early
//! - [`EvaluateRuleValidity`] lets UNIQUE and ANY detect violations
//! - [`ComposeDecisionResults`] lets PRIORITY, OUTPUT ORDER, COLLECT and
//!   the non-strict UNIQUE fallback override the default composition
//!
//! Handlers are stateless statics selected by [`handler_for`]; the
//! registry is immutable after process init and safe for concurrent reads.

use serde_json::{Map, Number, Value};

use crate::models::{Aggregation, DecisionOutput, HitPolicy};

/// One matched (or candidate) rule with its composed output record
#[derive(Debug, Clone, PartialEq)]
pub struct RuleResult {
    /// 0-based index in the declared rule list
    pub rule_index: usize,
    /// Rule id
    pub rule_id: String,
    /// Declared rule priority; lower numeric value = higher priority
    pub priority: Option<i64>,
    /// Output record keyed by output-clause name
    pub outputs: Map<String, Value>,
}

/// Preliminary outcome of `handle`
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyOutcome {
    /// Whether any rule matched
    pub has_match: bool,
    /// Matched rule ids in match order
    pub matched_rule_ids: Vec<String>,
    /// Composed output: object for single-result policies, array otherwise
    pub output: Option<Value>,
    /// Whether an aggregator still has to run over the output
    pub needs_aggregation: bool,
    /// Whether the output is an array of per-rule records
    pub multiple_results: bool,
}

/// Decision returned by [`ContinueEvaluating::should_continue_evaluating`]
#[derive(Debug, Clone, PartialEq)]
pub struct ContinueDecision {
    pub should_continue: bool,
    pub reason: Option<String>,
}

impl ContinueDecision {
    fn proceed() -> Self {
        Self {
            should_continue: true,
            reason: None,
        }
    }

    fn stop(reason: impl Into<String>) -> Self {
        Self {
            should_continue: false,
            reason: Some(reason.into()),
        }
    }
}

/// Outcome of a rule-validity check
#[derive(Debug, Clone, PartialEq)]
pub struct ValidityOutcome {
    pub valid: bool,
    pub error_message: Option<String>,
}

impl ValidityOutcome {
    fn ok() -> Self {
        Self {
            valid: true,
            error_message: None,
        }
    }

    fn violation(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            error_message: Some(message.into()),
        }
    }
}

/// A hit-policy contract violation raised during composition
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyViolation {
    pub message: String,
}

impl PolicyViolation {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Everything composition may need beyond the matched rules
#[derive(Debug, Clone, Copy)]
pub struct CompositionContext<'a> {
    /// Matched rules in match order
    pub matched: &'a [RuleResult],
    /// Output clauses of the decision, in declared order
    pub outputs: &'a [DecisionOutput],
    /// COLLECT aggregator, when configured
    pub aggregation: Option<Aggregation>,
    /// DMN 1.1 compatibility (COLLECT deduplicates before aggregating)
    pub force_dmn11: bool,
}

/// Optional behavior: decide after each rule whether iteration continues
pub trait ContinueEvaluating: Send + Sync {
    fn should_continue_evaluating(&self, current_rule_matched: bool) -> ContinueDecision;
}

/// Optional behavior: detect policy violations over the matched set
pub trait EvaluateRuleValidity: Send + Sync {
    fn evaluate_rule_validity(&self, matched: &[RuleResult], strict_mode: bool) -> ValidityOutcome;
}

/// Optional behavior: override the default result composition.
///
/// `Ok(None)` keeps the preliminary outcome; `Ok(Some(v))` replaces it;
/// `Err` reports a violation the executor resolves according to strict
/// mode.
pub trait ComposeDecisionResults: Send + Sync {
    fn compose_decision_results(
        &self,
        ctx: &CompositionContext<'_>,
    ) -> Result<Option<Value>, PolicyViolation>;
}

/// Base contract of every hit-policy handler
pub trait HitPolicyHandler: Send + Sync {
    /// The policy this handler implements
    fn policy(&self) -> HitPolicy;

    /// Produce the preliminary outcome from the matched rules
    fn handle(&self, matched: &[RuleResult], ctx: &CompositionContext<'_>) -> PolicyOutcome;

    /// Capability probe for [`ContinueEvaluating`]
    fn as_continue_evaluating(&self) -> Option<&dyn ContinueEvaluating> {
        None
    }

    /// Capability probe for [`EvaluateRuleValidity`]
    fn as_rule_validity(&self) -> Option<&dyn EvaluateRuleValidity> {
        None
    }

    /// Capability probe for [`ComposeDecisionResults`]
    fn as_compose_results(&self) -> Option<&dyn ComposeDecisionResults> {
        None
    }
}

/// Select the handler for a policy
pub fn handler_for(policy: HitPolicy) -> &'static dyn HitPolicyHandler {
    match policy {
        HitPolicy::Unique => &UniqueHandler,
        HitPolicy::First => &FirstHandler,
        HitPolicy::Priority => &PriorityHandler,
        HitPolicy::Any => &AnyHandler,
        HitPolicy::Collect => &CollectHandler,
        HitPolicy::RuleOrder => &RuleOrderHandler,
        HitPolicy::OutputOrder => &OutputOrderHandler,
        HitPolicy::Unordered => &UnorderedHandler,
    }
}

fn ids_of(matched: &[RuleResult]) -> Vec<String> {
    matched.iter().map(|r| r.rule_id.clone()).collect()
}

fn single_outcome(matched: &[RuleResult], pick: Option<&RuleResult>) -> PolicyOutcome {
    PolicyOutcome {
        has_match: !matched.is_empty(),
        matched_rule_ids: ids_of(matched),
        output: pick.map(|r| Value::Object(r.outputs.clone())),
        needs_aggregation: false,
        multiple_results: false,
    }
}

fn array_outcome(matched: &[RuleResult], needs_aggregation: bool) -> PolicyOutcome {
    PolicyOutcome {
        has_match: !matched.is_empty(),
        matched_rule_ids: ids_of(matched),
        output: if matched.is_empty() {
            None
        } else {
            Some(Value::Array(
                matched
                    .iter()
                    .map(|r| Value::Object(r.outputs.clone()))
                    .collect(),
            ))
        },
        needs_aggregation,
        multiple_results: true,
    }
}

// ---- UNIQUE ----

/// UNIQUE: exactly one rule may match.
///
/// The non-strict fallback merges all matches preserving the last non-null
/// value per output key. That merge is atypical of DMN engines and is kept
/// for compatibility with the legacy contract; strict mode never reaches
/// it because the validity check throws first.
pub struct UniqueHandler;

impl HitPolicyHandler for UniqueHandler {
    fn policy(&self) -> HitPolicy {
        HitPolicy::Unique
    }

    fn handle(&self, matched: &[RuleResult], _ctx: &CompositionContext<'_>) -> PolicyOutcome {
        single_outcome(matched, matched.first())
    }

    fn as_rule_validity(&self) -> Option<&dyn EvaluateRuleValidity> {
        Some(self)
    }

    fn as_compose_results(&self) -> Option<&dyn ComposeDecisionResults> {
        Some(self)
    }
}

impl EvaluateRuleValidity for UniqueHandler {
    fn evaluate_rule_validity(&self, matched: &[RuleResult], _strict_mode: bool) -> ValidityOutcome {
        if matched.len() > 1 {
            ValidityOutcome::violation(format!(
                "UNIQUE hit policy violated: {} rules matched ({})",
                matched.len(),
                ids_of(matched).join(", ")
            ))
        } else {
            ValidityOutcome::ok()
        }
    }
}

impl ComposeDecisionResults for UniqueHandler {
    fn compose_decision_results(
        &self,
        ctx: &CompositionContext<'_>,
    ) -> Result<Option<Value>, PolicyViolation> {
        if ctx.matched.len() <= 1 {
            return Ok(None);
        }
        // merge preserving the last non-null value per output key
        let mut merged = Map::new();
        for result in ctx.matched {
            for (key, value) in &result.outputs {
                let keep_existing =
                    value.is_null() && merged.get(key).is_some_and(|v: &Value| !v.is_null());
                if !keep_existing {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(Some(Value::Object(merged)))
    }
}

// ---- FIRST ----

/// FIRST: the first matching rule wins and iteration stops there
pub struct FirstHandler;

impl HitPolicyHandler for FirstHandler {
    fn policy(&self) -> HitPolicy {
        HitPolicy::First
    }

    fn handle(&self, matched: &[RuleResult], _ctx: &CompositionContext<'_>) -> PolicyOutcome {
        single_outcome(matched, matched.first())
    }

    fn as_continue_evaluating(&self) -> Option<&dyn ContinueEvaluating> {
        Some(self)
    }
}

impl ContinueEvaluating for FirstHandler {
    fn should_continue_evaluating(&self, current_rule_matched: bool) -> ContinueDecision {
        if current_rule_matched {
            ContinueDecision::stop("FIRST hit policy: first matching rule found")
        } else {
            ContinueDecision::proceed()
        }
    }
}

// ---- PRIORITY / OUTPUT ORDER ----

/// Position of a result in the declared output-value priority lists;
/// smaller sorts first
fn priority_key(result: &RuleResult, outputs: &[DecisionOutput]) -> Vec<usize> {
    outputs
        .iter()
        .filter(|output| !output.output_values.is_empty())
        .map(|output| {
            let value = result.outputs.get(&output.name);
            value
                .and_then(|v| output.output_values.iter().position(|candidate| candidate == v))
                .unwrap_or(usize::MAX)
        })
        .collect()
}

fn has_declared_priorities(outputs: &[DecisionOutput]) -> bool {
    outputs.iter().any(|output| !output.output_values.is_empty())
}

fn sort_by_declared_priority(ctx: &CompositionContext<'_>) -> Vec<RuleResult> {
    let mut sorted = ctx.matched.to_vec();
    sorted.sort_by_key(|result| priority_key(result, ctx.outputs));
    sorted
}

/// PRIORITY: the match whose output ranks highest in the declared
/// output-value list wins
pub struct PriorityHandler;

impl HitPolicyHandler for PriorityHandler {
    fn policy(&self) -> HitPolicy {
        HitPolicy::Priority
    }

    fn handle(&self, matched: &[RuleResult], ctx: &CompositionContext<'_>) -> PolicyOutcome {
        // matched-rule ids resort by the declared priority list; without
        // one the outcome keeps match order (the non-strict fallback)
        if has_declared_priorities(ctx.outputs) {
            let sorted = sort_by_declared_priority(ctx);
            return single_outcome(&sorted, sorted.first());
        }
        single_outcome(matched, matched.first())
    }

    fn as_compose_results(&self) -> Option<&dyn ComposeDecisionResults> {
        Some(self)
    }
}

impl ComposeDecisionResults for PriorityHandler {
    fn compose_decision_results(
        &self,
        ctx: &CompositionContext<'_>,
    ) -> Result<Option<Value>, PolicyViolation> {
        if ctx.matched.is_empty() {
            return Ok(None);
        }
        if !has_declared_priorities(ctx.outputs) {
            return Err(PolicyViolation::new(
                "PRIORITY hit policy requires declared output values on an output clause",
            ));
        }
        let sorted = sort_by_declared_priority(ctx);
        Ok(Some(Value::Object(sorted[0].outputs.clone())))
    }
}

/// OUTPUT ORDER: all matches, sorted by the declared output-value list
pub struct OutputOrderHandler;

impl HitPolicyHandler for OutputOrderHandler {
    fn policy(&self) -> HitPolicy {
        HitPolicy::OutputOrder
    }

    fn handle(&self, matched: &[RuleResult], ctx: &CompositionContext<'_>) -> PolicyOutcome {
        // matched-rule ids resort by the declared priority list
        if has_declared_priorities(ctx.outputs) {
            return array_outcome(&sort_by_declared_priority(ctx), false);
        }
        array_outcome(matched, false)
    }

    fn as_compose_results(&self) -> Option<&dyn ComposeDecisionResults> {
        Some(self)
    }
}

impl ComposeDecisionResults for OutputOrderHandler {
    fn compose_decision_results(
        &self,
        ctx: &CompositionContext<'_>,
    ) -> Result<Option<Value>, PolicyViolation> {
        if ctx.matched.is_empty() {
            return Ok(None);
        }
        if !has_declared_priorities(ctx.outputs) {
            return Err(PolicyViolation::new(
                "OUTPUT ORDER hit policy requires declared output values on an output clause",
            ));
        }
        let sorted = sort_by_declared_priority(ctx);
        Ok(Some(Value::Array(
            sorted
                .iter()
                .map(|r| Value::Object(r.outputs.clone()))
                .collect(),
        )))
    }
}

// ---- ANY ----

/// ANY: all matches must produce the identical output record
pub struct AnyHandler;

impl HitPolicyHandler for AnyHandler {
    fn policy(&self) -> HitPolicy {
        HitPolicy::Any
    }

    fn handle(&self, matched: &[RuleResult], _ctx: &CompositionContext<'_>) -> PolicyOutcome {
        single_outcome(matched, matched.first())
    }

    fn as_rule_validity(&self) -> Option<&dyn EvaluateRuleValidity> {
        Some(self)
    }

    fn as_compose_results(&self) -> Option<&dyn ComposeDecisionResults> {
        Some(self)
    }
}

impl EvaluateRuleValidity for AnyHandler {
    fn evaluate_rule_validity(&self, matched: &[RuleResult], _strict_mode: bool) -> ValidityOutcome {
        if let Some(first) = matched.first() {
            for other in &matched[1..] {
                if other.outputs != first.outputs {
                    return ValidityOutcome::violation(format!(
                        "ANY hit policy violated: rules '{}' and '{}' disagree on outputs",
                        first.rule_id, other.rule_id
                    ));
                }
            }
        }
        ValidityOutcome::ok()
    }
}

impl ComposeDecisionResults for AnyHandler {
    fn compose_decision_results(
        &self,
        ctx: &CompositionContext<'_>,
    ) -> Result<Option<Value>, PolicyViolation> {
        // non-strict fallback takes the last match; on a valid set this is
        // identical to the first
        Ok(ctx
            .matched
            .last()
            .map(|result| Value::Object(result.outputs.clone())))
    }
}

// ---- COLLECT ----

/// COLLECT: all matches; an optional aggregator reduces each output column
pub struct CollectHandler;

impl HitPolicyHandler for CollectHandler {
    fn policy(&self) -> HitPolicy {
        HitPolicy::Collect
    }

    fn handle(&self, matched: &[RuleResult], ctx: &CompositionContext<'_>) -> PolicyOutcome {
        array_outcome(matched, ctx.aggregation.is_some())
    }

    fn as_compose_results(&self) -> Option<&dyn ComposeDecisionResults> {
        Some(self)
    }
}

impl ComposeDecisionResults for CollectHandler {
    fn compose_decision_results(
        &self,
        ctx: &CompositionContext<'_>,
    ) -> Result<Option<Value>, PolicyViolation> {
        let Some(aggregation) = ctx.aggregation else {
            // no aggregator: keep the array outcome
            return Ok(None);
        };
        if ctx.matched.is_empty() {
            return Ok(None);
        }
        let mut results: Vec<&RuleResult> = ctx.matched.iter().collect();
        if ctx.force_dmn11 {
            // DMN 1.1 deduplicates identical output records before aggregating
            let mut seen: Vec<&Map<String, Value>> = Vec::new();
            results.retain(|result| {
                if seen.contains(&&result.outputs) {
                    false
                } else {
                    seen.push(&result.outputs);
                    true
                }
            });
        }
        let mut aggregated = Map::new();
        for output in ctx.outputs {
            let column: Vec<&Value> = results
                .iter()
                .filter_map(|result| result.outputs.get(&output.name))
                .collect();
            aggregated.insert(output.name.clone(), aggregate_column(aggregation, &column));
        }
        Ok(Some(Value::Object(aggregated)))
    }
}

/// Reduce one output column.
///
/// SUM coerces via numeric parse with non-numeric contributing 0; COUNT
/// ignores absent values; MIN/MAX ignore values that do not parse as
/// numbers.
pub fn aggregate_column(aggregation: Aggregation, column: &[&Value]) -> Value {
    let numbers: Vec<f64> = column
        .iter()
        .filter_map(|value| match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
        // "NaN" parses as a float but never contributes
        .filter(|n| !n.is_nan())
        .collect();
    match aggregation {
        Aggregation::Sum => number_value(numbers.iter().sum()),
        Aggregation::Count => {
            number_value(column.iter().filter(|v| !v.is_null()).count() as f64)
        }
        Aggregation::Min => numbers
            .iter()
            .copied()
            .fold(None::<f64>, |best, n| match best {
                Some(b) if b <= n => Some(b),
                _ => Some(n),
            })
            .map(number_value)
            .unwrap_or(Value::Null),
        Aggregation::Max => numbers
            .iter()
            .copied()
            .fold(None::<f64>, |best, n| match best {
                Some(b) if b >= n => Some(b),
                _ => Some(n),
            })
            .map(number_value)
            .unwrap_or(Value::Null),
    }
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9e15 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

// ---- RULE ORDER / UNORDERED ----

/// RULE ORDER: all matches in declared rule order
pub struct RuleOrderHandler;

impl HitPolicyHandler for RuleOrderHandler {
    fn policy(&self) -> HitPolicy {
        HitPolicy::RuleOrder
    }

    fn handle(&self, matched: &[RuleResult], _ctx: &CompositionContext<'_>) -> PolicyOutcome {
        // matches arrive in declared order; keep it
        array_outcome(matched, false)
    }
}

/// UNORDERED: all matches, no ordering promised (stable in practice)
pub struct UnorderedHandler;

impl HitPolicyHandler for UnorderedHandler {
    fn policy(&self) -> HitPolicy {
        HitPolicy::Unordered
    }

    fn handle(&self, matched: &[RuleResult], _ctx: &CompositionContext<'_>) -> PolicyOutcome {
        array_outcome(matched, false)
    }
}
