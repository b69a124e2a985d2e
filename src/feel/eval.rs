//! FEEL evaluator
//!
//! Tree-walk interpreter over `(expression, context)`. Dispatch is a single
//! `match` over the AST variant.
//!
//! `and`/`or` evaluate the left side first but still evaluate the right
//! side; there is no lazy short-circuit beyond that ordering. This is a
//! known, documented behavior of the engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::ast::{BinaryOp, Expr, Literal, Quantifier};
use super::builtins;
use super::error::{FeelError, FeelErrorKind};
use super::parser;
use super::value::{FeelLambda, FeelValue};

/// Variable/function scope for one evaluation
#[derive(Debug, Clone, Default)]
pub struct FeelContext {
    /// Named variables visible to the expression
    pub variables: BTreeMap<String, FeelValue>,
    /// Reference instant for `now()`/`today()`; falls back to the system
    /// clock when absent
    pub current_date_time: Option<DateTime<Utc>>,
}

impl FeelContext {
    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a JSON object (the decision-table input map)
    pub fn from_json_map(map: &Map<String, Value>) -> Self {
        Self {
            variables: map
                .iter()
                .map(|(k, v)| (k.clone(), FeelValue::from_json(v)))
                .collect(),
            current_date_time: None,
        }
    }

    /// Add one variable
    pub fn with_variable(mut self, name: impl Into<String>, value: FeelValue) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    /// Pin the reference instant used by `now()`/`today()`
    pub fn with_current_date_time(mut self, instant: DateTime<Utc>) -> Self {
        self.current_date_time = Some(instant);
        self
    }

    /// Child scope with one extra binding (used by `for`/`some`/`every`,
    /// filters and lambda application)
    fn child_with(&self, name: &str, value: FeelValue) -> FeelContext {
        let mut child = self.clone();
        child.variables.insert(name.to_string(), value);
        child
    }
}

/// Evaluate a parsed expression against a context
pub fn evaluate(expr: &Expr, ctx: &FeelContext) -> Result<FeelValue, FeelError> {
    match expr {
        Expr::Literal(literal) => Ok(literal_value(literal)),
        Expr::Name(name) => ctx.variables.get(name).cloned().ok_or_else(|| {
            FeelError::new(
                FeelErrorKind::VariableNotFound,
                format!("variable '{}' not found", name),
            )
        }),
        Expr::Neg(inner) => {
            let value = evaluate(inner, ctx)?;
            match value {
                FeelValue::Number(n) => Ok(FeelValue::Number(-n)),
                other => Err(FeelError::type_error(format!(
                    "cannot negate {}",
                    other.type_name()
                ))),
            }
        }
        Expr::Not(inner) => {
            let value = evaluate(inner, ctx)?;
            Ok(FeelValue::Boolean(!value.is_truthy()))
        }
        Expr::Binary { op, left, right } => {
            let lhs = evaluate(left, ctx)?;
            let rhs = evaluate(right, ctx)?;
            apply_binary(*op, &lhs, &rhs)
        }
        Expr::Between { value, low, high } => {
            let v = evaluate(value, ctx)?;
            let lo = evaluate(low, ctx)?;
            let hi = evaluate(high, ctx)?;
            between(&v, &lo, &hi).map(FeelValue::Boolean)
        }
        Expr::In { value, list } => {
            let v = evaluate(value, ctx)?;
            let collection = evaluate(list, ctx)?;
            in_collection(&v, &collection).map(FeelValue::Boolean)
        }
        Expr::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let test = evaluate(condition, ctx)?;
            if test.is_truthy() {
                evaluate(then_branch, ctx)
            } else {
                evaluate(else_branch, ctx)
            }
        }
        Expr::For {
            variable,
            source,
            body,
        } => {
            let items = want_iteration_source(evaluate(source, ctx)?)?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let child = ctx.child_with(variable, item);
                out.push(evaluate(body, &child)?);
            }
            Ok(FeelValue::List(out))
        }
        Expr::Quantified {
            quantifier,
            variable,
            source,
            condition,
        } => {
            let items = want_iteration_source(evaluate(source, ctx)?)?;
            let mut all = true;
            let mut any = false;
            for item in items {
                let child = ctx.child_with(variable, item);
                if evaluate(condition, &child)?.is_truthy() {
                    any = true;
                } else {
                    all = false;
                }
            }
            Ok(FeelValue::Boolean(match quantifier {
                Quantifier::Some => any,
                Quantifier::Every => all,
            }))
        }
        Expr::Path { base, property } => {
            let value = evaluate(base, ctx)?;
            match value {
                FeelValue::Null => Err(FeelError::new(
                    FeelErrorKind::NullValue,
                    format!("cannot read property '{}' of null", property),
                )),
                FeelValue::Context(entries) => {
                    Ok(entries.get(property).cloned().unwrap_or(FeelValue::Null))
                }
                other => Err(FeelError::type_error(format!(
                    "cannot read property '{}' of {}",
                    property,
                    other.type_name()
                ))),
            }
        }
        Expr::Call { callee, args } => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(evaluate(arg, ctx)?);
            }
            match callee.as_ref() {
                Expr::Name(name) => {
                    // a variable holding a function shadows a builtin
                    if let Some(value) = ctx.variables.get(name) {
                        if matches!(value, FeelValue::Lambda(_)) {
                            return call_function(&value.clone(), &evaluated, ctx);
                        }
                    }
                    match builtins::lookup(name) {
                        Some(builtin) => builtins::invoke(builtin, ctx, &evaluated),
                        None => Err(FeelError::new(
                            FeelErrorKind::FunctionNotFound,
                            format!("function '{}' not found", name),
                        )),
                    }
                }
                other => {
                    let callee_value = evaluate(other, ctx)?;
                    call_function(&callee_value, &evaluated, ctx)
                }
            }
        }
        Expr::Filter { base, filter } => {
            let value = evaluate(base, ctx)?;
            let items = match value {
                FeelValue::List(items) => items,
                other => {
                    return Err(FeelError::type_error(format!(
                        "cannot filter {}",
                        other.type_name()
                    )))
                }
            };
            // a numeric-literal filter is a 1-based index
            if let Expr::Literal(Literal::Number(n)) = filter.as_ref() {
                return Ok(index_list(&items, *n));
            }
            if let Expr::Neg(inner) = filter.as_ref() {
                if let Expr::Literal(Literal::Number(n)) = inner.as_ref() {
                    return Ok(index_list(&items, -*n));
                }
            }
            let mut out = Vec::new();
            for item in items {
                let child = ctx.child_with("item", item.clone());
                if evaluate(filter, &child)?.is_truthy() {
                    out.push(item);
                }
            }
            Ok(FeelValue::List(out))
        }
        Expr::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(evaluate(item, ctx)?);
            }
            Ok(FeelValue::List(out))
        }
        Expr::Context(entries) => {
            // later entries may reference earlier ones
            let mut scope = ctx.clone();
            let mut out = BTreeMap::new();
            for (key, value_expr) in entries {
                let value = evaluate(value_expr, &scope)?;
                scope.variables.insert(key.clone(), value.clone());
                out.insert(key.clone(), value);
            }
            Ok(FeelValue::Context(out))
        }
        Expr::Range {
            start,
            end,
            start_closed,
            end_closed,
        } => {
            let start = evaluate(start, ctx)?;
            let end = evaluate(end, ctx)?;
            Ok(FeelValue::Range {
                start: Box::new(start),
                end: Box::new(end),
                start_closed: *start_closed,
                end_closed: *end_closed,
            })
        }
        Expr::Function { params, body } => Ok(FeelValue::Lambda(Arc::new(FeelLambda {
            params: params.clone(),
            body: (**body).clone(),
            closure: ctx.variables.clone(),
        }))),
    }
}

/// Parse and evaluate a FEEL source string in one step.
///
/// Parse errors surface as a single `SYNTAX_ERROR` carrying the first
/// collected problem.
pub fn evaluate_str(source: &str, ctx: &FeelContext) -> Result<FeelValue, FeelError> {
    let (expr, errors) = parser::parse(source);
    if let Some(first) = errors.into_iter().next() {
        return Err(first);
    }
    evaluate(&expr, ctx)
}

/// Apply a user-defined function value to arguments.
///
/// Parameters shadow the captured closure; the closure shadows nothing
/// else (the lambda does not see the caller's scope).
pub(crate) fn call_function(
    value: &FeelValue,
    args: &[FeelValue],
    ctx: &FeelContext,
) -> Result<FeelValue, FeelError> {
    let lambda = match value {
        FeelValue::Lambda(lambda) => lambda,
        other => {
            return Err(FeelError::type_error(format!(
                "{} is not a function",
                other.type_name()
            )))
        }
    };
    if args.len() != lambda.params.len() {
        return Err(FeelError::invalid_arguments(format!(
            "function expects {} argument(s), got {}",
            lambda.params.len(),
            args.len()
        )));
    }
    let mut scope = FeelContext {
        variables: lambda.closure.clone(),
        current_date_time: ctx.current_date_time,
    };
    for (param, arg) in lambda.params.iter().zip(args) {
        scope.variables.insert(param.clone(), arg.clone());
    }
    evaluate(&lambda.body, &scope)
}

fn literal_value(literal: &Literal) -> FeelValue {
    match literal {
        Literal::Null => FeelValue::Null,
        Literal::Boolean(b) => FeelValue::Boolean(*b),
        Literal::Number(n) => FeelValue::Number(*n),
        Literal::String(s) => FeelValue::String(s.clone()),
    }
}

fn want_iteration_source(value: FeelValue) -> Result<Vec<FeelValue>, FeelError> {
    match value {
        FeelValue::List(items) => Ok(items),
        other => Err(FeelError::type_error(format!(
            "expected a list to iterate, got {}",
            other.type_name()
        ))),
    }
}

/// 1-based indexing; negative indices count from the end; out of range
/// yields null
fn index_list(items: &[FeelValue], index: f64) -> FeelValue {
    let len = items.len() as i64;
    let idx = index as i64;
    let resolved = if idx > 0 { idx - 1 } else { len + idx };
    if resolved < 0 || resolved >= len {
        FeelValue::Null
    } else {
        items[resolved as usize].clone()
    }
}

/// Equality across values: cross-type compares unequal rather than erroring
pub(crate) fn values_equal(a: &FeelValue, b: &FeelValue) -> bool {
    a == b
}

/// Inclusive membership of `value` in `[lo, hi]`
pub(crate) fn between(
    value: &FeelValue,
    low: &FeelValue,
    high: &FeelValue,
) -> Result<bool, FeelError> {
    Ok(value.compare(low)? != std::cmp::Ordering::Less
        && value.compare(high)? != std::cmp::Ordering::Greater)
}

/// Membership in a list (by equality) or a range (by interval inclusion)
pub(crate) fn in_collection(value: &FeelValue, collection: &FeelValue) -> Result<bool, FeelError> {
    match collection {
        FeelValue::List(items) => Ok(items.iter().any(|item| values_equal(value, item))),
        FeelValue::Range {
            start,
            end,
            start_closed,
            end_closed,
        } => {
            let above = match value.compare(start)? {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Equal => *start_closed,
                std::cmp::Ordering::Less => false,
            };
            let below = match value.compare(end)? {
                std::cmp::Ordering::Less => true,
                std::cmp::Ordering::Equal => *end_closed,
                std::cmp::Ordering::Greater => false,
            };
            Ok(above && below)
        }
        other => Err(FeelError::type_error(format!(
            "right side of 'in' must be a list, got {}",
            other.type_name()
        ))),
    }
}

pub(crate) fn apply_binary(
    op: BinaryOp,
    lhs: &FeelValue,
    rhs: &FeelValue,
) -> Result<FeelValue, FeelError> {
    match op {
        BinaryOp::Add => match (lhs, rhs) {
            (FeelValue::Number(a), FeelValue::Number(b)) => Ok(FeelValue::Number(a + b)),
            // `+` concatenates when either side is a string
            (FeelValue::String(a), b) => Ok(FeelValue::String(format!("{}{}", a, b.to_feel_string()))),
            (a, FeelValue::String(b)) => Ok(FeelValue::String(format!("{}{}", a.to_feel_string(), b))),
            (FeelValue::List(a), FeelValue::List(b)) => {
                let mut items = a.clone();
                items.extend(b.iter().cloned());
                Ok(FeelValue::List(items))
            }
            (a, b) => Err(FeelError::type_error(format!(
                "cannot add {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        },
        BinaryOp::Sub => numeric_binary(lhs, rhs, "subtract", |a, b| Ok(a - b)),
        BinaryOp::Mul => numeric_binary(lhs, rhs, "multiply", |a, b| Ok(a * b)),
        BinaryOp::Div => numeric_binary(lhs, rhs, "divide", |a, b| {
            if b == 0.0 {
                Err(FeelError::new(
                    FeelErrorKind::DivisionByZero,
                    "division by zero",
                ))
            } else {
                Ok(a / b)
            }
        }),
        BinaryOp::Pow => numeric_binary(lhs, rhs, "exponentiate", |a, b| Ok(a.powf(b))),
        BinaryOp::Eq => Ok(FeelValue::Boolean(values_equal(lhs, rhs))),
        BinaryOp::Ne => Ok(FeelValue::Boolean(!values_equal(lhs, rhs))),
        BinaryOp::Lt => ordering(lhs, rhs, |o| o == std::cmp::Ordering::Less),
        BinaryOp::Le => ordering(lhs, rhs, |o| o != std::cmp::Ordering::Greater),
        BinaryOp::Gt => ordering(lhs, rhs, |o| o == std::cmp::Ordering::Greater),
        BinaryOp::Ge => ordering(lhs, rhs, |o| o != std::cmp::Ordering::Less),
        BinaryOp::And => Ok(FeelValue::Boolean(lhs.is_truthy() && rhs.is_truthy())),
        BinaryOp::Or => Ok(FeelValue::Boolean(lhs.is_truthy() || rhs.is_truthy())),
    }
}

fn numeric_binary(
    lhs: &FeelValue,
    rhs: &FeelValue,
    verb: &str,
    f: impl Fn(f64, f64) -> Result<f64, FeelError>,
) -> Result<FeelValue, FeelError> {
    match (lhs, rhs) {
        (FeelValue::Number(a), FeelValue::Number(b)) => f(*a, *b).map(FeelValue::Number),
        (a, b) => Err(FeelError::type_error(format!(
            "cannot {} {} and {}",
            verb,
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn ordering(
    lhs: &FeelValue,
    rhs: &FeelValue,
    test: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<FeelValue, FeelError> {
    Ok(FeelValue::Boolean(test(lhs.compare(rhs)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx_with(vars: serde_json::Value) -> FeelContext {
        match vars {
            Value::Object(map) => FeelContext::from_json_map(&map),
            _ => panic!("expected an object"),
        }
    }

    fn eval(source: &str, ctx: &FeelContext) -> FeelValue {
        evaluate_str(source, ctx).unwrap_or_else(|e| panic!("eval {:?} failed: {}", source, e))
    }

    #[test]
    fn test_arithmetic() {
        let ctx = FeelContext::new();
        assert_eq!(eval("1 + 2 * 3", &ctx), FeelValue::Number(7.0));
        assert_eq!(eval("2 ** 10", &ctx), FeelValue::Number(1024.0));
        assert_eq!(eval("10 / 4", &ctx), FeelValue::Number(2.5));
        assert_eq!(eval("-(3 + 4)", &ctx), FeelValue::Number(-7.0));
    }

    #[test]
    fn test_division_by_zero() {
        let err = evaluate_str("1 / 0", &FeelContext::new()).unwrap_err();
        assert_eq!(err.kind, FeelErrorKind::DivisionByZero);
    }

    #[test]
    fn test_string_concatenation_via_plus() {
        let ctx = FeelContext::new();
        assert_eq!(
            eval("\"a\" + 1", &ctx),
            FeelValue::String("a1".to_string())
        );
        assert_eq!(
            eval("1 + \"a\"", &ctx),
            FeelValue::String("1a".to_string())
        );
    }

    #[test]
    fn test_cross_type_ordering_is_error() {
        let err = evaluate_str("1 < \"2\"", &FeelContext::new()).unwrap_err();
        assert_eq!(err.kind, FeelErrorKind::TypeError);
    }

    #[test]
    fn test_variable_lookup() {
        let ctx = ctx_with(json!({"age": 25}));
        assert_eq!(eval("age + 1", &ctx), FeelValue::Number(26.0));
        let err = evaluate_str("missing", &ctx).unwrap_err();
        assert_eq!(err.kind, FeelErrorKind::VariableNotFound);
    }

    #[test]
    fn test_scenario_between_and_equality() {
        let active = ctx_with(json!({"age": 25, "active": true}));
        assert_eq!(
            eval("age between 20 and 30 and active = true", &active),
            FeelValue::Boolean(true)
        );
        let inactive = ctx_with(json!({"age": 25, "active": false}));
        assert_eq!(
            eval("age between 20 and 30 and active = true", &inactive),
            FeelValue::Boolean(false)
        );
    }

    #[test]
    fn test_if_for_quantified() {
        let ctx = FeelContext::new();
        assert_eq!(
            eval("if 2 > 1 then \"yes\" else \"no\"", &ctx),
            FeelValue::String("yes".to_string())
        );
        assert_eq!(
            eval("for x in [1, 2, 3] return x * 2", &ctx),
            FeelValue::List(vec![
                FeelValue::Number(2.0),
                FeelValue::Number(4.0),
                FeelValue::Number(6.0),
            ])
        );
        assert_eq!(
            eval("some x in [1, 2, 3] satisfies x > 2", &ctx),
            FeelValue::Boolean(true)
        );
        assert_eq!(
            eval("every x in [1, 2, 3] satisfies x > 2", &ctx),
            FeelValue::Boolean(false)
        );
    }

    #[test]
    fn test_filter_numeric_literal_is_one_based_index() {
        let ctx = ctx_with(json!({"items": [10, 20, 30]}));
        assert_eq!(eval("items[1]", &ctx), FeelValue::Number(10.0));
        assert_eq!(eval("items[3]", &ctx), FeelValue::Number(30.0));
        assert_eq!(eval("items[-1]", &ctx), FeelValue::Number(30.0));
        assert_eq!(eval("items[9]", &ctx), FeelValue::Null);
    }

    #[test]
    fn test_filter_predicate_binds_item() {
        let ctx = ctx_with(json!({"items": [10, 20, 30]}));
        assert_eq!(
            eval("items[item > 15]", &ctx),
            FeelValue::List(vec![FeelValue::Number(20.0), FeelValue::Number(30.0)])
        );
    }

    #[test]
    fn test_path_access() {
        let ctx = ctx_with(json!({"order": {"customer": {"name": "Ada"}}}));
        assert_eq!(
            eval("order.customer.name", &ctx),
            FeelValue::String("Ada".to_string())
        );
        // missing key on a context is null, not an error
        assert_eq!(eval("order.missing", &ctx), FeelValue::Null);
        // but property access on null is an error
        let err = evaluate_str("order.missing.deeper", &ctx).unwrap_err();
        assert_eq!(err.kind, FeelErrorKind::NullValue);
    }

    #[test]
    fn test_in_list_and_range() {
        let ctx = ctx_with(json!({"x": 5}));
        assert_eq!(eval("x in [1, 5, 9]", &ctx), FeelValue::Boolean(true));
        assert_eq!(eval("x in [1..10]", &ctx), FeelValue::Boolean(true));
        assert_eq!(eval("x in (5..10]", &ctx), FeelValue::Boolean(false));
        let err = evaluate_str("x in 5", &ctx).unwrap_err();
        assert_eq!(err.kind, FeelErrorKind::TypeError);
    }

    #[test]
    fn test_lambda_closes_over_scope() {
        let ctx = ctx_with(json!({"base": 100}));
        assert_eq!(
            eval("(function(x) base + x)(5)", &ctx),
            FeelValue::Number(105.0)
        );
    }

    #[test]
    fn test_context_literal_sees_earlier_entries() {
        let ctx = FeelContext::new();
        assert_eq!(
            eval("{a: 2, b: a * 3}.b", &ctx),
            FeelValue::Number(6.0)
        );
    }

    #[test]
    fn test_builtin_call_through_evaluator() {
        let ctx = FeelContext::new();
        assert_eq!(
            eval("upper case(\"abc\")", &ctx),
            FeelValue::String("ABC".to_string())
        );
        assert_eq!(eval("sum([1, 2, 3])", &ctx), FeelValue::Number(6.0));
        let err = evaluate_str("nope(1)", &FeelContext::new()).unwrap_err();
        assert_eq!(err.kind, FeelErrorKind::FunctionNotFound);
    }

    #[test]
    fn test_sort_with_comparator_lambda() {
        let ctx = FeelContext::new();
        assert_eq!(
            eval("sort([3, 1, 2], function(a, b) a > b)", &ctx),
            FeelValue::List(vec![
                FeelValue::Number(3.0),
                FeelValue::Number(2.0),
                FeelValue::Number(1.0),
            ])
        );
    }

    #[test]
    fn test_truthiness_in_logic() {
        let ctx = ctx_with(json!({"name": "", "count": 0}));
        assert_eq!(eval("name or count", &ctx), FeelValue::Boolean(false));
        assert_eq!(eval("not name", &ctx), FeelValue::Boolean(true));
    }
}
