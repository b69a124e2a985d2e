//! Decision-table execution
//!
//! - Scalar condition evaluation ([`condition`])
//! - Hit-policy handlers and their behavior traits ([`hit_policy`])
//! - The per-request rule-engine executor ([`executor`])

pub mod condition;
pub mod executor;
pub mod hit_policy;

pub use condition::{evaluate_condition, ConditionOperator};
pub use executor::{EngineError, RuleEngineExecutor};
pub use hit_policy::{
    handler_for, ComposeDecisionResults, CompositionContext, ContinueDecision, ContinueEvaluating,
    EvaluateRuleValidity, HitPolicyHandler, PolicyOutcome, PolicyViolation, RuleResult,
    ValidityOutcome,
};
