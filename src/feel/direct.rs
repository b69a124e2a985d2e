//! Direct-string evaluation fast path
//!
//! Bypasses the parser for the common decision-table idioms: a single
//! literal, a variable path, a simple comparison, `between`, `in [...]`,
//! and `and`/`or` joins of those. Anything else returns `None` and the
//! caller falls back to the full parse-and-evaluate path.
//!
//! The fast path must agree with the full path on every expression both
//! can evaluate; see the conformance tests at the bottom of this file.

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::{FeelError, FeelErrorKind};
use super::eval::{self, FeelContext};
use super::value::FeelValue;

static RE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?(\d+(\.\d+)?|\.\d+)$").expect("Invalid regex"));
static RE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_?]*(\.[A-Za-z_][A-Za-z0-9_?]*)*$").expect("Invalid regex")
});

/// Try to evaluate `source` without parsing.
///
/// `None` means "not a fast-path shape"; the caller should use the full
/// evaluator. `Some(Err(_))` is a definitive failure (for example a missing
/// variable), identical to what the full path would report.
pub fn evaluate_direct(source: &str, ctx: &FeelContext) -> Option<Result<FeelValue, FeelError>> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return None;
    }
    eval_or_join(trimmed, ctx)
}

fn eval_or_join(source: &str, ctx: &FeelContext) -> Option<Result<FeelValue, FeelError>> {
    let parts = split_top_level(source, "or");
    if parts.len() > 1 {
        let mut any = false;
        for part in parts {
            match eval_and_join(part.trim(), ctx)? {
                Ok(value) => any = any || value.is_truthy(),
                Err(e) => return Some(Err(e)),
            }
        }
        return Some(Ok(FeelValue::Boolean(any)));
    }
    eval_and_join(source, ctx)
}

fn eval_and_join(source: &str, ctx: &FeelContext) -> Option<Result<FeelValue, FeelError>> {
    let parts = split_top_level(source, "and");
    if parts.len() > 1 {
        let mut all = true;
        for part in parts {
            match eval_simple(part.trim(), ctx)? {
                Ok(value) => all = all && value.is_truthy(),
                Err(e) => return Some(Err(e)),
            }
        }
        return Some(Ok(FeelValue::Boolean(all)));
    }
    eval_simple(source, ctx)
}

fn eval_simple(source: &str, ctx: &FeelContext) -> Option<Result<FeelValue, FeelError>> {
    if let Some(value) = parse_literal(source) {
        return Some(Ok(value));
    }
    if RE_PATH.is_match(source) {
        return Some(resolve_path(source, ctx));
    }
    // the inner Option distinguishes "shape matched but operands are not
    // simple" (bail to the full path) from a definitive outcome
    if let Some(outcome) = eval_between(source, ctx) {
        return outcome;
    }
    if let Some(outcome) = eval_in_list(source, ctx) {
        return outcome;
    }
    if let Some(outcome) = eval_comparison(source, ctx) {
        return outcome;
    }
    None
}

/// Split on the keyword `word` at bracket depth zero, outside strings.
///
/// A `between` consumes its own following `and`, so that join-splitting
/// does not tear `x between a and b` apart.
fn split_top_level<'a>(source: &'a str, word: &str) -> Vec<&'a str> {
    let bytes = source.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut start = 0usize;
    let mut pending_between = false;
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if in_string {
            if c == '\\' {
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '(' | '{' => depth += 1,
            ']' | ')' | '}' => depth -= 1,
            _ => {}
        }
        if depth == 0 && c.is_ascii_alphabetic() && is_word_boundary(bytes, i) {
            let end = word_end(bytes, i);
            let token = &source[i..end];
            if token == "between" {
                pending_between = true;
            } else if token == "and" && pending_between {
                pending_between = false;
            } else if token == word {
                parts.push(&source[start..i]);
                start = end;
            }
            i = end;
            continue;
        }
        i += 1;
    }
    parts.push(&source[start..]);
    parts
}

fn is_word_boundary(bytes: &[u8], index: usize) -> bool {
    index == 0 || !(bytes[index - 1] as char).is_ascii_alphanumeric() && bytes[index - 1] != b'_'
}

fn word_end(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() {
        let c = bytes[end] as char;
        if c.is_ascii_alphanumeric() || c == '_' {
            end += 1;
        } else {
            break;
        }
    }
    end
}

fn parse_literal(source: &str) -> Option<FeelValue> {
    match source {
        "true" => return Some(FeelValue::Boolean(true)),
        "false" => return Some(FeelValue::Boolean(false)),
        "null" => return Some(FeelValue::Null),
        _ => {}
    }
    if RE_NUMBER.is_match(source) {
        return source.parse::<f64>().ok().map(FeelValue::Number);
    }
    if source.len() >= 2 && source.starts_with('"') && source.ends_with('"') {
        let inner = &source[1..source.len() - 1];
        // reject embedded unescaped quotes so `"a" = "b"` is not one literal
        let mut out = String::new();
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            match c {
                '"' => return None,
                '\\' => match chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('\\') => out.push('\\'),
                    Some('"') => out.push('"'),
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => return None,
                },
                other => out.push(other),
            }
        }
        return Some(FeelValue::String(out));
    }
    None
}

/// Resolve a dotted variable path with the same semantics as the full
/// evaluator: missing root is an error, a missing context key is null,
/// descending into null is an error.
fn resolve_path(source: &str, ctx: &FeelContext) -> Result<FeelValue, FeelError> {
    let mut segments = source.split('.');
    let root = segments.next().unwrap_or_default();
    let mut current = match ctx.variables.get(root) {
        Some(value) => value.clone(),
        None => {
            return Err(FeelError::new(
                FeelErrorKind::VariableNotFound,
                format!("variable '{}' not found", root),
            ))
        }
    };
    for segment in segments {
        current = match current {
            FeelValue::Null => {
                return Err(FeelError::new(
                    FeelErrorKind::NullValue,
                    format!("cannot read property '{}' of null", segment),
                ))
            }
            FeelValue::Context(entries) => {
                entries.get(segment).cloned().unwrap_or(FeelValue::Null)
            }
            other => {
                return Err(FeelError::type_error(format!(
                    "cannot read property '{}' of {}",
                    segment,
                    other.type_name()
                )))
            }
        };
    }
    Ok(current)
}

/// A leaf operand: a literal or a variable path
fn eval_leaf(source: &str, ctx: &FeelContext) -> Option<Result<FeelValue, FeelError>> {
    if let Some(value) = parse_literal(source) {
        return Some(Ok(value));
    }
    if RE_PATH.is_match(source) {
        return Some(resolve_path(source, ctx));
    }
    None
}

static RE_BETWEEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s+between\s+(.+?)\s+and\s+(.+)$").expect("Invalid regex"));

fn eval_between(source: &str, ctx: &FeelContext) -> Option<Option<Result<FeelValue, FeelError>>> {
    let caps = RE_BETWEEN.captures(source)?;
    let value = match eval_leaf(caps.get(1)?.as_str().trim(), ctx) {
        Some(Ok(v)) => v,
        Some(Err(e)) => return Some(Some(Err(e))),
        None => return Some(None),
    };
    let low = match eval_leaf(caps.get(2)?.as_str().trim(), ctx) {
        Some(Ok(v)) => v,
        Some(Err(e)) => return Some(Some(Err(e))),
        None => return Some(None),
    };
    let high = match eval_leaf(caps.get(3)?.as_str().trim(), ctx) {
        Some(Ok(v)) => v,
        Some(Err(e)) => return Some(Some(Err(e))),
        None => return Some(None),
    };
    Some(Some(
        eval::between(&value, &low, &high).map(FeelValue::Boolean),
    ))
}

static RE_IN_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s+in\s+\[(.*)\]$").expect("Invalid regex"));

fn eval_in_list(source: &str, ctx: &FeelContext) -> Option<Option<Result<FeelValue, FeelError>>> {
    let caps = RE_IN_LIST.captures(source)?;
    let value = match eval_leaf(caps.get(1)?.as_str().trim(), ctx) {
        Some(Ok(v)) => v,
        Some(Err(e)) => return Some(Some(Err(e))),
        None => return Some(None),
    };
    let body = caps.get(2)?.as_str();
    let mut items = Vec::new();
    if !body.trim().is_empty() {
        for part in split_list_items(body) {
            match parse_literal(part.trim()) {
                Some(item) => items.push(item),
                // ranges and expression items go to the full path
                None => return Some(None),
            }
        }
    }
    let list = FeelValue::List(items);
    Some(Some(
        eval::in_collection(&value, &list).map(FeelValue::Boolean),
    ))
}

/// Split a bracket body on commas, respecting string literals
fn split_list_items(body: &str) -> Vec<&str> {
    let bytes = body.as_bytes();
    let mut parts = Vec::new();
    let mut in_string = false;
    let mut start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if in_string {
            if c == '\\' {
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if c == ',' {
            parts.push(&body[start..i]);
            start = i + 1;
        }
        i += 1;
    }
    parts.push(&body[start..]);
    parts
}

/// Comparison operators, longest spelling first
const COMPARISON_OPS: &[&str] = &["==", "!=", ">=", "<=", "=", ">", "<"];

fn eval_comparison(source: &str, ctx: &FeelContext) -> Option<Option<Result<FeelValue, FeelError>>> {
    let (lhs_text, op, rhs_text) = find_comparison(source)?;
    let lhs = match eval_leaf(lhs_text.trim(), ctx) {
        Some(Ok(v)) => v,
        Some(Err(e)) => return Some(Some(Err(e))),
        None => return Some(None),
    };
    let rhs = match eval_leaf(rhs_text.trim(), ctx) {
        Some(Ok(v)) => v,
        Some(Err(e)) => return Some(Some(Err(e))),
        None => return Some(None),
    };
    let result = match op {
        "=" | "==" => Ok(FeelValue::Boolean(eval::values_equal(&lhs, &rhs))),
        "!=" => Ok(FeelValue::Boolean(!eval::values_equal(&lhs, &rhs))),
        "<" => lhs.compare(&rhs).map(|o| FeelValue::Boolean(o == std::cmp::Ordering::Less)),
        "<=" => lhs
            .compare(&rhs)
            .map(|o| FeelValue::Boolean(o != std::cmp::Ordering::Greater)),
        ">" => lhs
            .compare(&rhs)
            .map(|o| FeelValue::Boolean(o == std::cmp::Ordering::Greater)),
        ">=" => lhs
            .compare(&rhs)
            .map(|o| FeelValue::Boolean(o != std::cmp::Ordering::Less)),
        _ => return Some(None),
    };
    Some(Some(result))
}

/// Locate a single comparison operator at top level, outside strings
fn find_comparison(source: &str) -> Option<(&str, &'static str, &str)> {
    let bytes = source.as_bytes();
    let mut in_string = false;
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if in_string {
            if c == '\\' {
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if c == '"' {
            in_string = true;
            i += 1;
            continue;
        }
        for op in COMPARISON_OPS {
            if source[i..].starts_with(op) {
                // `-5` on the right of `<` must stay with the operand
                let lhs = &source[..i];
                let rhs = &source[i + op.len()..];
                if lhs.trim().is_empty() || rhs.trim().is_empty() {
                    return None;
                }
                return Some((lhs, op, rhs));
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serde_json::Value;

    fn ctx() -> FeelContext {
        match json!({
            "age": 25,
            "active": true,
            "name": "Ada",
            "order": {"total": 99.5},
        }) {
            Value::Object(map) => FeelContext::from_json_map(&map),
            _ => unreachable!(),
        }
    }

    fn direct(source: &str) -> FeelValue {
        evaluate_direct(source, &ctx())
            .unwrap_or_else(|| panic!("{:?} did not take the fast path", source))
            .unwrap_or_else(|e| panic!("{:?} failed: {}", source, e))
    }

    #[test]
    fn test_literals() {
        assert_eq!(direct("42"), FeelValue::Number(42.0));
        assert_eq!(direct("-3.5"), FeelValue::Number(-3.5));
        assert_eq!(direct("\"hi\""), FeelValue::String("hi".to_string()));
        assert_eq!(direct("true"), FeelValue::Boolean(true));
        assert_eq!(direct("null"), FeelValue::Null);
    }

    #[test]
    fn test_variable_paths() {
        assert_eq!(direct("age"), FeelValue::Number(25.0));
        assert_eq!(direct("order.total"), FeelValue::Number(99.5));
        let err = evaluate_direct("missing", &ctx()).unwrap().unwrap_err();
        assert_eq!(err.kind, FeelErrorKind::VariableNotFound);
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(direct("age >= 18"), FeelValue::Boolean(true));
        assert_eq!(direct("age < 18"), FeelValue::Boolean(false));
        assert_eq!(direct("name = \"Ada\""), FeelValue::Boolean(true));
        assert_eq!(direct("name != \"Bob\""), FeelValue::Boolean(true));
    }

    #[test]
    fn test_between_and_in() {
        assert_eq!(direct("age between 20 and 30"), FeelValue::Boolean(true));
        assert_eq!(direct("age in [18, 25, 30]"), FeelValue::Boolean(true));
        assert_eq!(direct("name in [\"Ada\", \"Bob\"]"), FeelValue::Boolean(true));
        assert_eq!(direct("age in []"), FeelValue::Boolean(false));
    }

    #[test]
    fn test_joins() {
        assert_eq!(
            direct("age between 20 and 30 and active = true"),
            FeelValue::Boolean(true)
        );
        assert_eq!(
            direct("age < 18 or name = \"Ada\""),
            FeelValue::Boolean(true)
        );
        assert_eq!(
            direct("age < 18 and name = \"Ada\""),
            FeelValue::Boolean(false)
        );
    }

    #[test]
    fn test_non_fast_path_shapes_bail() {
        assert!(evaluate_direct("1 + 2", &ctx()).is_none());
        assert!(evaluate_direct("sum([1, 2])", &ctx()).is_none());
        assert!(evaluate_direct("if a then b else c", &ctx()).is_none());
        assert!(evaluate_direct("age in [1..10]", &ctx()).is_none());
    }

    /// The fast path and the full parser must agree on the overlap
    #[test]
    fn test_agreement_with_full_path() {
        let context = ctx();
        let expressions = [
            "42",
            "\"hi\"",
            "true",
            "null",
            "age",
            "order.total",
            "age >= 18",
            "age = 25",
            "age != 24",
            "name = \"Ada\"",
            "age between 20 and 30",
            "age between 26 and 30",
            "age in [18, 25]",
            "age in [1, 2]",
            "age >= 18 and active = true",
            "age < 18 or active = true",
            "age between 20 and 30 and active = true",
        ];
        for source in expressions {
            let fast = evaluate_direct(source, &context)
                .unwrap_or_else(|| panic!("{:?} should take the fast path", source));
            let full = eval::evaluate_str(source, &context);
            match (fast, full) {
                (Ok(a), Ok(b)) => assert_eq!(a, b, "disagreement on {:?}", source),
                (Err(a), Err(b)) => assert_eq!(a.kind, b.kind, "error disagreement on {:?}", source),
                (a, b) => panic!("outcome disagreement on {:?}: {:?} vs {:?}", source, a, b),
            }
        }
    }
}
