//! Execution records and evaluation request/response types
//!
//! An [`ExecutionRecord`] is appended for every evaluation attempt, whether
//! or not any rule matched. Records are immutable after creation and feed
//! the aggregated [`DecisionStatistics`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::audit::AuditContainer;

/// Outcome classification of a single evaluation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// At least one rule matched and composition succeeded
    Success,
    /// The evaluation threw
    Failed,
    /// No rule matched
    NoMatch,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::NoMatch => write!(f, "no_match"),
        }
    }
}

/// Append-only audit log entry for one evaluation attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    /// Opaque unique identifier
    pub id: String,
    /// Id of the evaluated decision
    pub decision_id: String,
    /// Logical key of the evaluated decision
    pub decision_key: String,
    /// Version of the evaluated decision
    pub decision_version: u32,
    /// Outcome classification
    pub status: ExecutionStatus,
    /// Caller-supplied input map
    pub input_data: Map<String, Value>,
    /// Composed output, when the evaluation produced one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_result: Option<Value>,
    /// Ids of matched rules, in match order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule_ids: Option<Vec<String>>,
    /// Number of matched rules
    pub matched_count: usize,
    /// Wall-clock duration of the evaluation
    pub execution_time_ms: u64,
    /// Originating process instance, when invoked from a workflow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_instance_id: Option<String>,
    /// Originating activity, when invoked from a workflow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    /// Originating task, when invoked from a workflow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Owning tenant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Error summary for FAILED records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Error detail for FAILED records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    /// Per-rule evaluation trace, when audit was enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditContainer>,
    /// Creation timestamp
    pub create_time: DateTime<Utc>,
}

/// Selector + payload for one evaluation
///
/// Exactly one of `decision_id` or `decision_key` must be set. The key path
/// requires a Published decision and picks the highest published version
/// when `version` is absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    /// Direct decision id selector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_id: Option<String>,
    /// Logical key selector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_key: Option<String>,
    /// Version pin for the key selector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Caller-supplied input map
    #[serde(default)]
    pub input_data: Map<String, Value>,
    /// Caller-chosen execution id; generated when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    /// Originating process instance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_instance_id: Option<String>,
    /// Originating activity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    /// Originating task
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Owning tenant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl ExecuteRequest {
    /// Request by decision id
    pub fn by_id(decision_id: impl Into<String>) -> Self {
        Self {
            decision_id: Some(decision_id.into()),
            ..Default::default()
        }
    }

    /// Request by decision key (highest published version)
    pub fn by_key(decision_key: impl Into<String>) -> Self {
        Self {
            decision_key: Some(decision_key.into()),
            ..Default::default()
        }
    }

    /// Pin the version for a key-based request
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// Set one input value
    pub fn with_input(mut self, key: impl Into<String>, value: Value) -> Self {
        self.input_data.insert(key.into(), value);
        self
    }

    /// Replace the whole input map
    pub fn with_input_data(mut self, input_data: Map<String, Value>) -> Self {
        self.input_data = input_data;
        self
    }

    /// Set the tenant
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

/// Evaluation options
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteOptions {
    /// Policy violations throw instead of degrading to a recorded warning
    pub strict_mode: bool,
    /// DMN 1.1 compatibility (COLLECT deduplicates before aggregating)
    pub force_dmn11: bool,
    /// Attach the per-rule audit trace to the result
    pub enable_audit: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            strict_mode: true,
            force_dmn11: false,
            enable_audit: true,
        }
    }
}

impl ExecuteOptions {
    /// Disable strict mode (legacy-compatibility fallback composition)
    pub fn lenient(mut self) -> Self {
        self.strict_mode = false;
        self
    }

    /// Request DMN 1.1 COLLECT behavior
    pub fn with_force_dmn11(mut self, force: bool) -> Self {
        self.force_dmn11 = force;
        self
    }

    /// Toggle the audit trace
    pub fn with_audit(mut self, enable: bool) -> Self {
        self.enable_audit = enable;
        self
    }
}

/// Functional result of one evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResult {
    /// Execution id (caller-chosen or generated)
    pub execution_id: String,
    /// Id of the evaluated decision
    pub decision_id: String,
    /// Logical key of the evaluated decision
    pub decision_key: String,
    /// Version of the evaluated decision
    pub decision_version: u32,
    /// Outcome classification
    pub status: ExecutionStatus,
    /// Composed output: object for single-result policies, array for
    /// multi-result policies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_result: Option<Value>,
    /// Ids of matched rules, in match order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rules: Option<Vec<String>>,
    /// Number of matched rules
    pub matched_count: usize,
    /// Wall-clock duration of the evaluation
    pub execution_time_ms: u64,
    /// Error summary for failed evaluations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Per-rule evaluation trace, when audit was enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditContainer>,
}

/// Aggregated execution statistics for one decision
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DecisionStatistics {
    /// Total number of evaluation attempts
    pub total_executions: u64,
    /// Number of SUCCESS records
    pub success_count: u64,
    /// Number of FAILED records
    pub failed_count: u64,
    /// Number of NO_MATCH records
    pub no_match_count: u64,
    /// Mean execution time in milliseconds; 0 when there are no records
    #[serde(rename = "avgExecutionTime")]
    pub avg_execution_time_ms: f64,
}
