//! Decision-table definition model
//!
//! A [`Decision`] is a versioned decision-table template following the
//! lifecycle: Draft → Published → [Suspended ⇄ Published] → Archived.
//! Published definitions are immutable; edits require a new version.
//!
//! ## Invariants
//!
//! - `(decision_key, version, tenant_id)` is unique across the store
//! - only a Draft may be edited or deleted
//! - only Published decisions are executable
//! - `rule_count` always equals `rules.len()`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Decision status in lifecycle
///
/// Decisions follow a lifecycle: Draft → Published → [Suspended | Archived]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionStatus {
    /// Decision is editable and not yet executable
    #[default]
    Draft,
    /// Decision is frozen and executable
    Published,
    /// Execution is temporarily blocked; can be re-activated
    Suspended,
    /// Decision is retired
    Archived,
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionStatus::Draft => write!(f, "DRAFT"),
            DecisionStatus::Published => write!(f, "PUBLISHED"),
            DecisionStatus::Suspended => write!(f, "SUSPENDED"),
            DecisionStatus::Archived => write!(f, "ARCHIVED"),
        }
    }
}

/// Hit policy selecting which matching rules contribute to the output
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HitPolicy {
    /// At most one rule may match
    Unique,
    /// First matching rule wins; iteration stops there
    #[default]
    First,
    /// Highest-priority output value wins (declared output-value order)
    Priority,
    /// All matches must agree on the output
    Any,
    /// All matches are collected, optionally aggregated
    Collect,
    /// All matches in rule order
    RuleOrder,
    /// All matches sorted by declared output-value order
    OutputOrder,
    /// All matches, no ordering promised
    Unordered,
}

impl HitPolicy {
    /// The bit-exact DMN XML attribute value (`RULE ORDER` etc.)
    pub fn as_dmn(&self) -> &'static str {
        match self {
            HitPolicy::Unique => "UNIQUE",
            HitPolicy::First => "FIRST",
            HitPolicy::Priority => "PRIORITY",
            HitPolicy::Any => "ANY",
            HitPolicy::Collect => "COLLECT",
            HitPolicy::RuleOrder => "RULE ORDER",
            HitPolicy::OutputOrder => "OUTPUT ORDER",
            HitPolicy::Unordered => "UNORDERED",
        }
    }

    /// Parse a DMN hit-policy attribute value.
    ///
    /// Accepts both the XML spelling (`RULE ORDER`) and the underscore
    /// spelling (`RULE_ORDER`); matching is case-insensitive.
    pub fn from_dmn(value: &str) -> Option<Self> {
        let normalized = value.trim().to_uppercase().replace(' ', "_");
        match normalized.as_str() {
            "UNIQUE" => Some(HitPolicy::Unique),
            "FIRST" => Some(HitPolicy::First),
            "PRIORITY" => Some(HitPolicy::Priority),
            "ANY" => Some(HitPolicy::Any),
            "COLLECT" => Some(HitPolicy::Collect),
            "RULE_ORDER" => Some(HitPolicy::RuleOrder),
            "OUTPUT_ORDER" => Some(HitPolicy::OutputOrder),
            "UNORDERED" => Some(HitPolicy::Unordered),
            _ => None,
        }
    }
}

impl std::fmt::Display for HitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_dmn())
    }
}

/// Aggregator for the COLLECT hit policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Aggregation {
    Sum,
    Min,
    Max,
    Count,
}

impl Aggregation {
    /// The DMN XML attribute value
    pub fn as_dmn(&self) -> &'static str {
        match self {
            Aggregation::Sum => "SUM",
            Aggregation::Min => "MIN",
            Aggregation::Max => "MAX",
            Aggregation::Count => "COUNT",
        }
    }

    /// Parse a DMN aggregation attribute value (case-insensitive)
    pub fn from_dmn(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "SUM" => Some(Aggregation::Sum),
            "MIN" => Some(Aggregation::Min),
            "MAX" => Some(Aggregation::Max),
            "COUNT" => Some(Aggregation::Count),
            _ => None,
        }
    }
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_dmn())
    }
}

/// Input clause of a decision table
///
/// `expression` is a FEEL literal or variable path; it is evaluated against
/// the caller's input map when the map carries no value under `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DecisionInput {
    /// Unique within the decision; referenced by rule conditions
    pub id: String,
    /// Human-readable label
    pub label: String,
    /// FEEL expression producing the input value
    pub expression: String,
    /// Optional type hint (`string`, `number`, `boolean`, ...)
    #[serde(skip_serializing_if = "Option::is_none", alias = "type")]
    pub type_ref: Option<String>,
    /// Whether the caller must supply a value
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

impl DecisionInput {
    /// Create a new input clause
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            expression: expression.into(),
            type_ref: None,
            required: false,
        }
    }

    /// Set the type hint
    pub fn with_type(mut self, type_ref: impl Into<String>) -> Self {
        self.type_ref = Some(type_ref.into());
        self
    }
}

/// Output clause of a decision table
///
/// `name` becomes the key in the emitted output record. `output_values`,
/// when present, is the declared priority list consulted by the PRIORITY
/// and OUTPUT ORDER hit policies (first entry = highest priority).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOutput {
    /// Unique within the decision; referenced by rule output entries
    pub id: String,
    /// Human-readable label
    pub label: String,
    /// Key under which this output appears in the result record
    pub name: String,
    /// Optional type hint
    #[serde(skip_serializing_if = "Option::is_none", alias = "type")]
    pub type_ref: Option<String>,
    /// Value emitted when no rule produces one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Declared output values, ordered highest priority first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_values: Vec<Value>,
}

impl DecisionOutput {
    /// Create a new output clause
    pub fn new(id: impl Into<String>, label: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            name: name.into(),
            type_ref: None,
            default_value: None,
            output_values: Vec::new(),
        }
    }

    /// Set the type hint
    pub fn with_type(mut self, type_ref: impl Into<String>) -> Self {
        self.type_ref = Some(type_ref.into());
        self
    }

    /// Set the declared priority list (highest priority first)
    pub fn with_output_values(mut self, values: Vec<Value>) -> Self {
        self.output_values = values;
        self
    }
}

/// A single condition entry of a rule
///
/// `value` may be a scalar, a 2-element array for `between`, or an array
/// for `in`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Id of the [`DecisionInput`] this condition tests
    pub input_id: String,
    /// Operator name, drawn from the closed operator set
    pub operator: String,
    /// Operand
    pub value: Value,
}

impl Condition {
    /// Create a new condition
    pub fn new(input_id: impl Into<String>, operator: impl Into<String>, value: Value) -> Self {
        Self {
            input_id: input_id.into(),
            operator: operator.into(),
            value,
        }
    }
}

/// Output entry of a rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleOutput {
    /// Id of the [`DecisionOutput`] this entry feeds
    pub output_id: String,
    /// Emitted value
    pub value: Value,
}

impl RuleOutput {
    /// Create a new rule output entry
    pub fn new(output_id: impl Into<String>, value: Value) -> Self {
        Self {
            output_id: output_id.into(),
            value,
        }
    }
}

/// A decision-table rule: a conjunction of conditions producing outputs
///
/// Rule order within the table is significant: FIRST, RULE ORDER and audit
/// numbering depend on it. Numbering is 1-based externally, 0-based
/// internally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Rule id; synthesized as `rule_<index>` when absent from storage
    pub id: String,
    /// Conditions; all must hold for the rule to match
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Output entries emitted when the rule matches
    #[serde(default)]
    pub outputs: Vec<RuleOutput>,
    /// Rule priority; lower numeric value = higher priority
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    /// Free-text description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Rule {
    /// Create a new rule
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            conditions: Vec::new(),
            outputs: Vec::new(),
            priority: None,
            description: None,
        }
    }

    /// Add a condition entry
    pub fn add_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Add an output entry
    pub fn add_output(mut self, output: RuleOutput) -> Self {
        self.outputs.push(output);
        self
    }

    /// Set the rule priority (lower = higher priority)
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Versioned decision-table definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// Opaque unique identifier
    pub id: String,
    /// Stable logical name, unique per tenant and version
    pub decision_key: String,
    /// Display name
    pub name: String,
    /// Free-text description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Monotonic positive version number
    pub version: u32,
    /// Lifecycle status
    pub status: DecisionStatus,
    /// Hit policy governing rule-match composition
    pub hit_policy: HitPolicy,
    /// Aggregator; only meaningful when `hit_policy` is COLLECT
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
    /// Input clauses
    #[serde(default)]
    pub inputs: Vec<DecisionInput>,
    /// Output clauses
    #[serde(default)]
    pub outputs: Vec<DecisionOutput>,
    /// Ordered rule list
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Always equals `rules.len()`
    pub rule_count: usize,
    /// Optional grouping category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Owning tenant, when multi-tenancy applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Set when the decision was last published
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub create_time: DateTime<Utc>,
    /// Last modification timestamp
    pub update_time: DateTime<Utc>,
}

impl Decision {
    /// Create a new Draft decision at version 1
    pub fn new(
        id: impl Into<String>,
        decision_key: impl Into<String>,
        name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            decision_key: decision_key.into(),
            name: name.into(),
            description: None,
            version: 1,
            status: DecisionStatus::Draft,
            hit_policy: HitPolicy::First,
            aggregation: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            rules: Vec::new(),
            rule_count: 0,
            category: None,
            tenant_id: None,
            publish_time: None,
            create_time: now,
            update_time: now,
        }
    }

    /// Generate a deterministic UUID for a decision key + version
    pub fn generate_id(decision_key: &str, version: u32) -> String {
        let namespace = Uuid::NAMESPACE_URL;
        let name = format!("decision:{}:{}", decision_key, version);
        Uuid::new_v5(&namespace, name.as_bytes()).to_string()
    }

    /// Set the hit policy
    pub fn with_hit_policy(mut self, hit_policy: HitPolicy) -> Self {
        self.hit_policy = hit_policy;
        self
    }

    /// Set the COLLECT aggregator
    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the owning tenant
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Add an input clause
    pub fn add_input(mut self, input: DecisionInput) -> Self {
        self.inputs.push(input);
        self
    }

    /// Add an output clause
    pub fn add_output(mut self, output: DecisionOutput) -> Self {
        self.outputs.push(output);
        self
    }

    /// Add a rule, keeping `rule_count` in sync
    pub fn add_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self.rule_count = self.rules.len();
        self
    }

    /// Re-derive `rule_count` from the rule list
    pub fn touch_rule_count(&mut self) {
        self.rule_count = self.rules.len();
    }

    /// Whether the definition body may still be edited
    pub fn is_editable(&self) -> bool {
        self.status == DecisionStatus::Draft
    }

    /// Whether the decision is executable via the key path
    pub fn is_executable(&self) -> bool {
        self.status == DecisionStatus::Published
    }

    /// Find an input clause by id
    pub fn input_by_id(&self, id: &str) -> Option<&DecisionInput> {
        self.inputs.iter().find(|i| i.id == id)
    }

    /// Find an output clause by id
    pub fn output_by_id(&self, id: &str) -> Option<&DecisionOutput> {
        self.outputs.iter().find(|o| o.id == id)
    }
}
