//! FEEL runtime values
//!
//! A single tagged sum covering every value the evaluator can produce,
//! plus the coercions between FEEL values and `serde_json::Value` used at
//! the decision-table boundary.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde_json::{Number, Value};

use super::ast::Expr;
use super::error::{FeelError, FeelErrorKind};

/// An ISO-8601 duration, split into a calendar part and a clock part
///
/// Years collapse into months, days/hours/minutes collapse into seconds.
/// Temporal arithmetic beyond parsing and formatting is out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeelDuration {
    /// Calendar component in months
    pub months: i64,
    /// Clock component in seconds
    pub seconds: i64,
}

impl FeelDuration {
    /// Build from explicit components
    pub fn new(months: i64, seconds: i64) -> Self {
        Self { months, seconds }
    }

    /// Render back to ISO-8601 (`P1Y2M3DT4H5M6S` style)
    pub fn to_iso8601(&self) -> String {
        if self.months == 0 && self.seconds == 0 {
            return "P0D".to_string();
        }
        let negative = self.months < 0 || self.seconds < 0;
        let months = self.months.abs();
        let mut seconds = self.seconds.abs();

        let mut out = String::new();
        if negative {
            out.push('-');
        }
        out.push('P');
        let years = months / 12;
        let rem_months = months % 12;
        if years > 0 {
            out.push_str(&format!("{}Y", years));
        }
        if rem_months > 0 {
            out.push_str(&format!("{}M", rem_months));
        }
        let days = seconds / 86_400;
        seconds %= 86_400;
        if days > 0 {
            out.push_str(&format!("{}D", days));
        }
        if seconds > 0 {
            out.push('T');
            let hours = seconds / 3_600;
            seconds %= 3_600;
            let minutes = seconds / 60;
            seconds %= 60;
            if hours > 0 {
                out.push_str(&format!("{}H", hours));
            }
            if minutes > 0 {
                out.push_str(&format!("{}M", minutes));
            }
            if seconds > 0 {
                out.push_str(&format!("{}S", seconds));
            }
        }
        out
    }
}

/// A user-defined function value: parameters, body, captured scope
#[derive(Debug)]
pub struct FeelLambda {
    /// Parameter names, in declaration order
    pub params: Vec<String>,
    /// Function body
    pub body: Expr,
    /// Variables captured at definition time
    pub closure: BTreeMap<String, FeelValue>,
}

/// A FEEL runtime value
#[derive(Debug, Clone)]
pub enum FeelValue {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    List(Vec<FeelValue>),
    Context(BTreeMap<String, FeelValue>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<Utc>),
    Duration(FeelDuration),
    /// Interval with open/closed endpoints
    Range {
        start: Box<FeelValue>,
        end: Box<FeelValue>,
        start_closed: bool,
        end_closed: bool,
    },
    Lambda(Arc<FeelLambda>),
}

impl PartialEq for FeelValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FeelValue::Null, FeelValue::Null) => true,
            (FeelValue::Boolean(a), FeelValue::Boolean(b)) => a == b,
            (FeelValue::Number(a), FeelValue::Number(b)) => a == b,
            (FeelValue::String(a), FeelValue::String(b)) => a == b,
            (FeelValue::List(a), FeelValue::List(b)) => a == b,
            (FeelValue::Context(a), FeelValue::Context(b)) => a == b,
            (FeelValue::Date(a), FeelValue::Date(b)) => a == b,
            (FeelValue::Time(a), FeelValue::Time(b)) => a == b,
            (FeelValue::DateTime(a), FeelValue::DateTime(b)) => a == b,
            (FeelValue::Duration(a), FeelValue::Duration(b)) => a == b,
            (
                FeelValue::Range {
                    start: a_start,
                    end: a_end,
                    start_closed: a_sc,
                    end_closed: a_ec,
                },
                FeelValue::Range {
                    start: b_start,
                    end: b_end,
                    start_closed: b_sc,
                    end_closed: b_ec,
                },
            ) => a_start == b_start && a_end == b_end && a_sc == b_sc && a_ec == b_ec,
            (FeelValue::Lambda(a), FeelValue::Lambda(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl FeelValue {
    /// The FEEL type name, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FeelValue::Null => "null",
            FeelValue::Boolean(_) => "boolean",
            FeelValue::Number(_) => "number",
            FeelValue::String(_) => "string",
            FeelValue::List(_) => "list",
            FeelValue::Context(_) => "context",
            FeelValue::Date(_) => "date",
            FeelValue::Time(_) => "time",
            FeelValue::DateTime(_) => "date and time",
            FeelValue::Duration(_) => "duration",
            FeelValue::Range { .. } => "range",
            FeelValue::Lambda(_) => "function",
        }
    }

    /// Truthiness: null, false, 0, empty string and empty list are falsy
    pub fn is_truthy(&self) -> bool {
        match self {
            FeelValue::Null => false,
            FeelValue::Boolean(b) => *b,
            FeelValue::Number(n) => *n != 0.0,
            FeelValue::String(s) => !s.is_empty(),
            FeelValue::List(items) => !items.is_empty(),
            _ => true,
        }
    }

    /// Numeric view, when this value is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FeelValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// String view, when this value is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FeelValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Ordering between two same-kind values; cross-kind is a type error
    pub fn compare(&self, other: &FeelValue) -> Result<std::cmp::Ordering, FeelError> {
        match (self, other) {
            (FeelValue::Number(a), FeelValue::Number(b)) => a.partial_cmp(b).ok_or_else(|| {
                FeelError::new(FeelErrorKind::TypeError, "cannot compare NaN values")
            }),
            (FeelValue::String(a), FeelValue::String(b)) => Ok(a.cmp(b)),
            (FeelValue::Date(a), FeelValue::Date(b)) => Ok(a.cmp(b)),
            (FeelValue::Time(a), FeelValue::Time(b)) => Ok(a.cmp(b)),
            (FeelValue::DateTime(a), FeelValue::DateTime(b)) => Ok(a.cmp(b)),
            (FeelValue::Boolean(a), FeelValue::Boolean(b)) => Ok(a.cmp(b)),
            _ => Err(FeelError::new(
                FeelErrorKind::TypeError,
                format!(
                    "cannot compare {} with {}",
                    self.type_name(),
                    other.type_name()
                ),
            )),
        }
    }

    /// Render with FEEL `string()` semantics: null → "null", dates → ISO-8601
    pub fn to_feel_string(&self) -> String {
        match self {
            FeelValue::Null => "null".to_string(),
            FeelValue::Boolean(b) => b.to_string(),
            FeelValue::Number(n) => format_number(*n),
            FeelValue::String(s) => s.clone(),
            FeelValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_feel_string()).collect();
                format!("[{}]", parts.join(", "))
            }
            FeelValue::Context(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.to_feel_string()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            FeelValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FeelValue::Time(t) => t.format("%H:%M:%S").to_string(),
            FeelValue::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
            FeelValue::Duration(d) => d.to_iso8601(),
            FeelValue::Range {
                start,
                end,
                start_closed,
                end_closed,
            } => format!(
                "{}{}..{}{}",
                if *start_closed { '[' } else { '(' },
                start.to_feel_string(),
                end.to_feel_string(),
                if *end_closed { ']' } else { ')' },
            ),
            FeelValue::Lambda(lambda) => format!("function({})", lambda.params.join(", ")),
        }
    }

    /// Convert a JSON value into a FEEL value
    pub fn from_json(value: &Value) -> FeelValue {
        match value {
            Value::Null => FeelValue::Null,
            Value::Bool(b) => FeelValue::Boolean(*b),
            Value::Number(n) => FeelValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => FeelValue::String(s.clone()),
            Value::Array(items) => {
                FeelValue::List(items.iter().map(FeelValue::from_json).collect())
            }
            Value::Object(entries) => FeelValue::Context(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), FeelValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert back to JSON; temporal values become ISO-8601 strings,
    /// functions degrade to null
    pub fn to_json(&self) -> Value {
        match self {
            FeelValue::Null => Value::Null,
            FeelValue::Boolean(b) => Value::Bool(*b),
            FeelValue::Number(n) => Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FeelValue::String(s) => Value::String(s.clone()),
            FeelValue::List(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            FeelValue::Context(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            FeelValue::Date(_)
            | FeelValue::Time(_)
            | FeelValue::DateTime(_)
            | FeelValue::Duration(_)
            | FeelValue::Range { .. } => Value::String(self.to_feel_string()),
            FeelValue::Lambda(_) => Value::Null,
        }
    }
}

/// Render a number without a trailing `.0` for integral values
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
