//! Scalar condition evaluation
//!
//! A total predicate over `(input value, operator, condition value)`.
//! Evaluation never fails: malformed operands and non-compiling regexes
//! yield `false`, and an unknown operator falls back to equality after a
//! logged warning.
//!
//! String equality is case-insensitive. This is a deliberate, user-visible
//! contract of the engine.

use serde_json::Value;
use tracing::warn;

/// The closed operator set understood by rule conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    In,
    NotIn,
    Between,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Matches,
    IsNull,
    IsNotNull,
    IsEmpty,
    IsNotEmpty,
}

impl ConditionOperator {
    /// Parse an operator name.
    ///
    /// Matching is case-insensitive and tolerates whitespace and
    /// underscores between words (`is not null`, `IS_NOT_NULL`,
    /// `isNotNull` all resolve to the same operator).
    pub fn parse(text: &str) -> Option<Self> {
        let normalized: String = text
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "==" | "=" | "equals" | "equal" => Some(ConditionOperator::Equals),
            "!=" | "<>" | "notequals" | "notequal" => Some(ConditionOperator::NotEquals),
            ">" | "greaterthan" => Some(ConditionOperator::GreaterThan),
            ">=" | "greaterthanorequal" => Some(ConditionOperator::GreaterOrEqual),
            "<" | "lessthan" => Some(ConditionOperator::LessThan),
            "<=" | "lessthanorequal" => Some(ConditionOperator::LessOrEqual),
            "in" => Some(ConditionOperator::In),
            "notin" => Some(ConditionOperator::NotIn),
            "between" => Some(ConditionOperator::Between),
            "contains" => Some(ConditionOperator::Contains),
            "notcontains" => Some(ConditionOperator::NotContains),
            "startswith" => Some(ConditionOperator::StartsWith),
            "endswith" => Some(ConditionOperator::EndsWith),
            "matches" => Some(ConditionOperator::Matches),
            "isnull" => Some(ConditionOperator::IsNull),
            "isnotnull" => Some(ConditionOperator::IsNotNull),
            "isempty" => Some(ConditionOperator::IsEmpty),
            "isnotempty" => Some(ConditionOperator::IsNotEmpty),
            _ => None,
        }
    }

    /// Parse with the equality fallback for unknown operators
    pub fn parse_or_equals(text: &str) -> Self {
        match Self::parse(text) {
            Some(op) => op,
            None => {
                warn!(operator = text, "unknown condition operator, falling back to equality");
                ConditionOperator::Equals
            }
        }
    }

    /// Canonical spelling, as stored in conditions and emitted to audits
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Equals => "==",
            ConditionOperator::NotEquals => "!=",
            ConditionOperator::GreaterThan => ">",
            ConditionOperator::GreaterOrEqual => ">=",
            ConditionOperator::LessThan => "<",
            ConditionOperator::LessOrEqual => "<=",
            ConditionOperator::In => "in",
            ConditionOperator::NotIn => "not in",
            ConditionOperator::Between => "between",
            ConditionOperator::Contains => "contains",
            ConditionOperator::NotContains => "notContains",
            ConditionOperator::StartsWith => "startsWith",
            ConditionOperator::EndsWith => "endsWith",
            ConditionOperator::Matches => "matches",
            ConditionOperator::IsNull => "is null",
            ConditionOperator::IsNotNull => "is not null",
            ConditionOperator::IsEmpty => "is empty",
            ConditionOperator::IsNotEmpty => "is not empty",
        }
    }

    /// Whether this operator can hold for an absent input value
    pub fn is_presence_check(&self) -> bool {
        matches!(
            self,
            ConditionOperator::IsNull
                | ConditionOperator::IsNotNull
                | ConditionOperator::IsEmpty
                | ConditionOperator::IsNotEmpty
        )
    }
}

impl std::fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Evaluate one condition. Total: never panics, never errors.
pub fn evaluate_condition(input: &Value, operator: ConditionOperator, operand: &Value) -> bool {
    // a null input can only satisfy presence checks
    if input.is_null() && !operator.is_presence_check() {
        return false;
    }
    match operator {
        ConditionOperator::Equals => values_equal(input, operand),
        ConditionOperator::NotEquals => !values_equal(input, operand),
        ConditionOperator::GreaterThan => {
            compare(input, operand).is_some_and(|o| o == std::cmp::Ordering::Greater)
        }
        ConditionOperator::GreaterOrEqual => {
            compare(input, operand).is_some_and(|o| o != std::cmp::Ordering::Less)
        }
        ConditionOperator::LessThan => {
            compare(input, operand).is_some_and(|o| o == std::cmp::Ordering::Less)
        }
        ConditionOperator::LessOrEqual => {
            compare(input, operand).is_some_and(|o| o != std::cmp::Ordering::Greater)
        }
        ConditionOperator::In => in_list(input, operand),
        ConditionOperator::NotIn => !in_list(input, operand),
        ConditionOperator::Between => match operand.as_array() {
            Some(bounds) if bounds.len() == 2 => {
                // inclusive on both ends
                compare(input, &bounds[0]).is_some_and(|o| o != std::cmp::Ordering::Less)
                    && compare(input, &bounds[1]).is_some_and(|o| o != std::cmp::Ordering::Greater)
            }
            _ => false,
        },
        ConditionOperator::Contains => {
            text_of(input).contains(text_of(operand).as_str())
        }
        ConditionOperator::NotContains => {
            !text_of(input).contains(text_of(operand).as_str())
        }
        ConditionOperator::StartsWith => {
            text_of(input).starts_with(text_of(operand).as_str())
        }
        ConditionOperator::EndsWith => text_of(input).ends_with(text_of(operand).as_str()),
        ConditionOperator::Matches => match regex::Regex::new(&text_of(operand)) {
            Ok(re) => re.is_match(&text_of(input)),
            // a non-compiling pattern never matches; evaluation stays total
            Err(_) => false,
        },
        ConditionOperator::IsNull => input.is_null(),
        ConditionOperator::IsNotNull => !input.is_null(),
        ConditionOperator::IsEmpty => is_empty(input),
        ConditionOperator::IsNotEmpty => !is_empty(input),
    }
}

/// Render any scalar as text for string operators
fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn numeric_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Equality: numeric when either side coerces to a number, otherwise
/// case-insensitive string comparison
fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (numeric_of(a), numeric_of(b)) {
        return x == y;
    }
    if a.is_null() || b.is_null() {
        return a.is_null() && b.is_null();
    }
    text_of(a).eq_ignore_ascii_case(&text_of(b))
}

/// Ordering: numeric first, else lexicographic by Unicode code points
fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (numeric_of(a), numeric_of(b)) {
        return x.partial_cmp(&y);
    }
    Some(text_of(a).cmp(&text_of(b)))
}

fn in_list(input: &Value, operand: &Value) -> bool {
    match operand.as_array() {
        Some(items) => items.iter().any(|item| values_equal(input, item)),
        // a scalar operand degrades to an equality check
        None => values_equal(input, operand),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(entries) => entries.is_empty(),
        _ => false,
    }
}
