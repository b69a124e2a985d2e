//! Data model
//!
//! Structures shared across the engine:
//! - Decision-table definitions with lifecycle state ([`decision`])
//! - Execution records, requests, results and statistics ([`execution`])
//! - Per-execution audit traces ([`audit`])

pub mod audit;
pub mod decision;
pub mod execution;

pub use audit::{AuditContainer, InputAuditEntry, OutputAuditEntry, RuleAuditEntry};
pub use decision::{
    Aggregation, Condition, Decision, DecisionInput, DecisionOutput, DecisionStatus, HitPolicy,
    Rule, RuleOutput,
};
pub use execution::{
    DecisionResult, DecisionStatistics, ExecuteOptions, ExecuteRequest, ExecutionRecord,
    ExecutionStatus,
};
