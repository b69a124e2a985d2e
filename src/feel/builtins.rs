//! FEEL built-in function library
//!
//! A fixed registry mapping normalized names (lowercased, spaces replaced
//! by underscores) to descriptors. The registry is immutable after process
//! init and safe for concurrent reads.
//!
//! Indices are 1-based everywhere the DMN specification mandates it.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::error::{FeelError, FeelErrorKind};
use super::eval::{call_function, FeelContext};
use super::value::{FeelDuration, FeelValue};

/// Implementation signature shared by every builtin
pub type BuiltinFn = fn(&FeelContext, &[FeelValue]) -> Result<FeelValue, FeelError>;

/// Descriptor of one built-in function
pub struct Builtin {
    /// Canonical (normalized) name
    pub name: &'static str,
    /// Minimum number of arguments
    pub min_args: usize,
    /// Maximum number of arguments; `None` means variadic
    pub max_args: Option<usize>,
    /// Implementation
    pub invoke: BuiltinFn,
}

/// Normalize a FEEL function name for registry lookup
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Look up a builtin by (possibly unnormalized) name
pub fn lookup(name: &str) -> Option<&'static Builtin> {
    REGISTRY.get(normalize_name(name).as_str())
}

/// Invoke a builtin, enforcing its arity
pub fn invoke(
    builtin: &Builtin,
    ctx: &FeelContext,
    args: &[FeelValue],
) -> Result<FeelValue, FeelError> {
    if args.len() < builtin.min_args
        || builtin.max_args.is_some_and(|max| args.len() > max)
    {
        return Err(FeelError::invalid_arguments(format!(
            "function '{}' called with {} argument(s)",
            builtin.name,
            args.len()
        )));
    }
    (builtin.invoke)(ctx, args)
}

macro_rules! builtin {
    ($map:expr, $name:expr, $min:expr, $max:expr, $func:expr) => {
        $map.insert(
            $name,
            Builtin {
                name: $name,
                min_args: $min,
                max_args: $max,
                invoke: $func,
            },
        );
    };
}

static REGISTRY: Lazy<HashMap<&'static str, Builtin>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, Builtin> = HashMap::new();

    // Numeric
    builtin!(m, "abs", 1, Some(1), numeric_abs);
    builtin!(m, "ceiling", 1, Some(1), numeric_ceiling);
    builtin!(m, "floor", 1, Some(1), numeric_floor);
    builtin!(m, "integer", 1, Some(1), numeric_integer);
    builtin!(m, "modulo", 2, Some(2), numeric_modulo);
    builtin!(m, "power", 2, Some(2), numeric_power);
    builtin!(m, "round", 1, Some(2), numeric_round);
    builtin!(m, "sqrt", 1, Some(1), numeric_sqrt);
    builtin!(m, "number", 1, Some(1), conv_number);
    builtin!(m, "decimal", 2, Some(2), numeric_decimal);

    // String
    builtin!(m, "substring", 2, Some(3), string_substring);
    builtin!(m, "string_length", 1, Some(1), string_length);
    builtin!(m, "upper_case", 1, Some(1), string_upper);
    builtin!(m, "lower_case", 1, Some(1), string_lower);
    builtin!(m, "substring_before", 2, Some(2), string_substring_before);
    builtin!(m, "substring_after", 2, Some(2), string_substring_after);
    builtin!(m, "replace", 3, Some(3), string_replace);
    builtin!(m, "contains", 2, Some(2), string_contains);
    builtin!(m, "starts_with", 2, Some(2), string_starts_with);
    builtin!(m, "ends_with", 2, Some(2), string_ends_with);
    builtin!(m, "matches", 2, Some(2), string_matches);
    builtin!(m, "split", 2, Some(2), string_split);
    builtin!(m, "concat", 1, None, string_concat);

    // List
    builtin!(m, "list_contains", 2, Some(2), list_contains);
    builtin!(m, "count", 1, Some(1), list_count);
    builtin!(m, "min", 1, None, list_min);
    builtin!(m, "max", 1, None, list_max);
    builtin!(m, "sum", 1, None, list_sum);
    builtin!(m, "product", 1, None, list_product);
    builtin!(m, "mean", 1, None, list_mean);
    builtin!(m, "median", 1, None, list_median);
    builtin!(m, "stddev", 1, None, list_stddev);
    builtin!(m, "mode", 1, None, list_mode);
    builtin!(m, "and", 1, None, list_and);
    builtin!(m, "all", 1, None, list_and);
    builtin!(m, "or", 1, None, list_or);
    builtin!(m, "any", 1, None, list_or);
    builtin!(m, "sublist", 2, Some(3), list_sublist);
    builtin!(m, "append", 1, None, list_append);
    builtin!(m, "concatenate", 1, None, list_concatenate);
    builtin!(m, "insert_before", 3, Some(3), list_insert_before);
    builtin!(m, "remove", 2, Some(2), list_remove);
    builtin!(m, "reverse", 1, Some(1), list_reverse);
    builtin!(m, "index_of", 2, Some(2), list_index_of);
    builtin!(m, "union", 1, None, list_union);
    builtin!(m, "distinct_values", 1, Some(1), list_distinct);
    builtin!(m, "flatten", 1, Some(1), list_flatten);
    builtin!(m, "sort", 1, Some(2), list_sort);
    builtin!(m, "join", 1, Some(2), list_join);

    // Date/time
    builtin!(m, "now", 0, Some(0), temporal_now);
    builtin!(m, "today", 0, Some(0), temporal_today);
    builtin!(m, "date", 1, Some(3), temporal_date);
    builtin!(m, "time", 1, Some(4), temporal_time);
    builtin!(m, "date_and_time", 1, Some(2), temporal_date_and_time);
    builtin!(m, "duration", 1, Some(1), temporal_duration);
    builtin!(
        m,
        "years_and_months_duration",
        2,
        Some(2),
        temporal_years_and_months
    );

    // Conversion
    builtin!(m, "string", 1, Some(1), conv_string);
    builtin!(m, "boolean", 1, Some(1), conv_boolean);

    // Context
    builtin!(m, "get_entries", 1, Some(1), context_get_entries);
    builtin!(m, "get_value", 2, Some(2), context_get_value);
    builtin!(m, "context_put", 3, Some(3), context_put);
    builtin!(m, "context_merge", 1, None, context_merge);

    // Range
    builtin!(m, "before", 2, Some(2), range_before);
    builtin!(m, "after", 2, Some(2), range_after);
    builtin!(m, "meets", 2, Some(2), range_meets);
    builtin!(m, "met_by", 2, Some(2), range_met_by);
    builtin!(m, "overlaps", 2, Some(2), range_overlaps);
    builtin!(m, "overlapped_by", 2, Some(2), range_overlapped_by);
    builtin!(m, "finishes", 2, Some(2), range_finishes);
    builtin!(m, "finished_by", 2, Some(2), range_finished_by);
    builtin!(m, "includes", 2, Some(2), range_includes);
    builtin!(m, "during", 2, Some(2), range_during);
    builtin!(m, "starts", 2, Some(2), range_starts);
    builtin!(m, "started_by", 2, Some(2), range_started_by);
    builtin!(m, "coincides", 2, Some(2), range_coincides);

    m
});

// ---- argument helpers ----

fn want_number(value: &FeelValue, what: &str) -> Result<f64, FeelError> {
    value.as_number().ok_or_else(|| {
        FeelError::invalid_arguments(format!("{} must be a number, got {}", what, value.type_name()))
    })
}

fn want_string<'a>(value: &'a FeelValue, what: &str) -> Result<&'a str, FeelError> {
    value.as_str().ok_or_else(|| {
        FeelError::invalid_arguments(format!("{} must be a string, got {}", what, value.type_name()))
    })
}

fn want_list<'a>(value: &'a FeelValue, what: &str) -> Result<&'a [FeelValue], FeelError> {
    match value {
        FeelValue::List(items) => Ok(items),
        _ => Err(FeelError::invalid_arguments(format!(
            "{} must be a list, got {}",
            what,
            value.type_name()
        ))),
    }
}

fn want_context<'a>(
    value: &'a FeelValue,
    what: &str,
) -> Result<&'a BTreeMap<String, FeelValue>, FeelError> {
    match value {
        FeelValue::Context(entries) => Ok(entries),
        _ => Err(FeelError::invalid_arguments(format!(
            "{} must be a context, got {}",
            what,
            value.type_name()
        ))),
    }
}

fn compile_regex(pattern: &str) -> Result<Regex, FeelError> {
    Regex::new(pattern)
        .map_err(|e| FeelError::invalid_arguments(format!("invalid pattern: {}", e)))
}

/// Variadic helpers like `min(1, 2, 3)` also accept `min([1, 2, 3])`
fn spread_args(args: &[FeelValue]) -> Vec<FeelValue> {
    if args.len() == 1 {
        if let FeelValue::List(items) = &args[0] {
            return items.clone();
        }
    }
    args.to_vec()
}

// ---- numeric ----

fn numeric_abs(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    Ok(FeelValue::Number(want_number(&args[0], "abs argument")?.abs()))
}

fn numeric_ceiling(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    Ok(FeelValue::Number(
        want_number(&args[0], "ceiling argument")?.ceil(),
    ))
}

fn numeric_floor(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    Ok(FeelValue::Number(
        want_number(&args[0], "floor argument")?.floor(),
    ))
}

fn numeric_integer(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    // truncation toward zero
    Ok(FeelValue::Number(
        want_number(&args[0], "integer argument")?.trunc(),
    ))
}

fn numeric_modulo(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let dividend = want_number(&args[0], "modulo dividend")?;
    let divisor = want_number(&args[1], "modulo divisor")?;
    if divisor == 0.0 {
        return Err(FeelError::new(
            FeelErrorKind::DivisionByZero,
            "modulo by zero",
        ));
    }
    // result carries the sign of the divisor
    Ok(FeelValue::Number(dividend - divisor * (dividend / divisor).floor()))
}

fn numeric_power(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let base = want_number(&args[0], "power base")?;
    let exponent = want_number(&args[1], "power exponent")?;
    Ok(FeelValue::Number(base.powf(exponent)))
}

fn numeric_round(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let n = want_number(&args[0], "round argument")?;
    let scale = match args.get(1) {
        Some(v) => want_number(v, "round scale")? as i32,
        None => 0,
    };
    let factor = 10f64.powi(scale);
    // half away from zero
    Ok(FeelValue::Number((n * factor).round() / factor))
}

fn numeric_sqrt(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let n = want_number(&args[0], "sqrt argument")?;
    if n < 0.0 {
        return Err(FeelError::invalid_arguments(
            "sqrt of a negative number",
        ));
    }
    Ok(FeelValue::Number(n.sqrt()))
}

fn numeric_decimal(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let n = want_number(&args[0], "decimal argument")?;
    let scale = want_number(&args[1], "decimal scale")? as i32;
    let factor = 10f64.powi(scale);
    // truncate-round to scale
    Ok(FeelValue::Number((n * factor).trunc() / factor))
}

fn conv_number(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    match &args[0] {
        FeelValue::Number(n) => Ok(FeelValue::Number(*n)),
        FeelValue::String(s) => s
            .trim()
            .parse::<f64>()
            .map(FeelValue::Number)
            .map_err(|_| FeelError::invalid_arguments(format!("'{}' is not a number", s))),
        other => Err(FeelError::invalid_arguments(format!(
            "cannot convert {} to number",
            other.type_name()
        ))),
    }
}

// ---- string ----

fn string_substring(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let s = want_string(&args[0], "substring input")?;
    let start = want_number(&args[1], "substring start")? as i64;
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len() as i64;
    // 1-based; a negative start counts from the end
    let begin = if start > 0 {
        start - 1
    } else if start < 0 {
        len + start
    } else {
        0
    };
    let begin = begin.clamp(0, len) as usize;
    let take = match args.get(2) {
        Some(v) => want_number(v, "substring length")?.max(0.0) as usize,
        None => chars.len() - begin,
    };
    Ok(FeelValue::String(
        chars[begin..].iter().take(take).collect(),
    ))
}

fn string_length(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let s = want_string(&args[0], "string length input")?;
    Ok(FeelValue::Number(s.chars().count() as f64))
}

fn string_upper(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    Ok(FeelValue::String(
        want_string(&args[0], "upper case input")?.to_uppercase(),
    ))
}

fn string_lower(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    Ok(FeelValue::String(
        want_string(&args[0], "lower case input")?.to_lowercase(),
    ))
}

fn string_substring_before(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let s = want_string(&args[0], "substring before input")?;
    let needle = want_string(&args[1], "substring before match")?;
    Ok(FeelValue::String(match s.find(needle) {
        Some(idx) => s[..idx].to_string(),
        None => String::new(),
    }))
}

fn string_substring_after(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let s = want_string(&args[0], "substring after input")?;
    let needle = want_string(&args[1], "substring after match")?;
    Ok(FeelValue::String(match s.find(needle) {
        Some(idx) => s[idx + needle.len()..].to_string(),
        None => String::new(),
    }))
}

fn string_replace(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let s = want_string(&args[0], "replace input")?;
    let pattern = want_string(&args[1], "replace pattern")?;
    let replacement = want_string(&args[2], "replace replacement")?;
    let re = compile_regex(pattern)?;
    Ok(FeelValue::String(
        re.replace_all(s, replacement).into_owned(),
    ))
}

fn string_contains(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let s = want_string(&args[0], "contains input")?;
    let needle = want_string(&args[1], "contains match")?;
    Ok(FeelValue::Boolean(s.contains(needle)))
}

fn string_starts_with(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let s = want_string(&args[0], "starts with input")?;
    let prefix = want_string(&args[1], "starts with match")?;
    Ok(FeelValue::Boolean(s.starts_with(prefix)))
}

fn string_ends_with(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let s = want_string(&args[0], "ends with input")?;
    let suffix = want_string(&args[1], "ends with match")?;
    Ok(FeelValue::Boolean(s.ends_with(suffix)))
}

fn string_matches(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let s = want_string(&args[0], "matches input")?;
    let pattern = want_string(&args[1], "matches pattern")?;
    let re = compile_regex(pattern)?;
    Ok(FeelValue::Boolean(re.is_match(s)))
}

fn string_split(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let s = want_string(&args[0], "split input")?;
    let delimiter = want_string(&args[1], "split delimiter")?;
    let re = compile_regex(delimiter)?;
    Ok(FeelValue::List(
        re.split(s)
            .map(|part| FeelValue::String(part.to_string()))
            .collect(),
    ))
}

fn string_concat(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let parts = spread_args(args);
    let mut out = String::new();
    for part in &parts {
        match part {
            FeelValue::Null => {}
            other => out.push_str(&other.to_feel_string()),
        }
    }
    Ok(FeelValue::String(out))
}

// ---- list ----

fn list_contains(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let items = want_list(&args[0], "list contains input")?;
    Ok(FeelValue::Boolean(items.contains(&args[1])))
}

fn list_count(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let items = want_list(&args[0], "count input")?;
    Ok(FeelValue::Number(items.len() as f64))
}

fn numeric_items(args: &[FeelValue], what: &str) -> Result<Vec<f64>, FeelError> {
    spread_args(args)
        .iter()
        .map(|v| want_number(v, what))
        .collect()
}

fn list_min(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let items = spread_args(args);
    if items.is_empty() {
        return Ok(FeelValue::Null);
    }
    let mut best = items[0].clone();
    for item in &items[1..] {
        if item.compare(&best)? == std::cmp::Ordering::Less {
            best = item.clone();
        }
    }
    Ok(best)
}

fn list_max(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let items = spread_args(args);
    if items.is_empty() {
        return Ok(FeelValue::Null);
    }
    let mut best = items[0].clone();
    for item in &items[1..] {
        if item.compare(&best)? == std::cmp::Ordering::Greater {
            best = item.clone();
        }
    }
    Ok(best)
}

fn list_sum(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let numbers = numeric_items(args, "sum item")?;
    Ok(FeelValue::Number(numbers.iter().sum()))
}

fn list_product(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let numbers = numeric_items(args, "product item")?;
    Ok(FeelValue::Number(numbers.iter().product()))
}

fn list_mean(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let numbers = numeric_items(args, "mean item")?;
    if numbers.is_empty() {
        return Ok(FeelValue::Null);
    }
    Ok(FeelValue::Number(
        numbers.iter().sum::<f64>() / numbers.len() as f64,
    ))
}

fn list_median(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let mut numbers = numeric_items(args, "median item")?;
    if numbers.is_empty() {
        return Ok(FeelValue::Null);
    }
    numbers.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = numbers.len() / 2;
    let median = if numbers.len() % 2 == 0 {
        (numbers[mid - 1] + numbers[mid]) / 2.0
    } else {
        numbers[mid]
    };
    Ok(FeelValue::Number(median))
}

fn list_stddev(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let numbers = numeric_items(args, "stddev item")?;
    if numbers.is_empty() {
        return Ok(FeelValue::Null);
    }
    let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
    // population standard deviation
    let variance =
        numbers.iter().map(|n| (n - mean).powi(2)).sum::<f64>() / numbers.len() as f64;
    Ok(FeelValue::Number(variance.sqrt()))
}

fn list_mode(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let numbers = numeric_items(args, "mode item")?;
    if numbers.is_empty() {
        return Ok(FeelValue::List(Vec::new()));
    }
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for n in &numbers {
        match counts.iter_mut().find(|(v, _)| v == n) {
            Some((_, count)) => *count += 1,
            None => counts.push((*n, 1)),
        }
    }
    let best = counts.iter().map(|(_, c)| *c).max().unwrap_or(0);
    let mut modes: Vec<f64> = counts
        .into_iter()
        .filter(|(_, c)| *c == best)
        .map(|(v, _)| v)
        .collect();
    modes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Ok(FeelValue::List(
        modes.into_iter().map(FeelValue::Number).collect(),
    ))
}

fn list_and(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    for item in spread_args(args) {
        match item {
            FeelValue::Boolean(true) => {}
            FeelValue::Boolean(false) => return Ok(FeelValue::Boolean(false)),
            other => {
                return Err(FeelError::invalid_arguments(format!(
                    "and() requires booleans, got {}",
                    other.type_name()
                )))
            }
        }
    }
    Ok(FeelValue::Boolean(true))
}

fn list_or(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    for item in spread_args(args) {
        match item {
            FeelValue::Boolean(false) => {}
            FeelValue::Boolean(true) => return Ok(FeelValue::Boolean(true)),
            other => {
                return Err(FeelError::invalid_arguments(format!(
                    "or() requires booleans, got {}",
                    other.type_name()
                )))
            }
        }
    }
    Ok(FeelValue::Boolean(false))
}

fn list_sublist(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let items = want_list(&args[0], "sublist input")?;
    let start = want_number(&args[1], "sublist start")? as i64;
    let len = items.len() as i64;
    let begin = if start > 0 {
        start - 1
    } else if start < 0 {
        len + start
    } else {
        0
    };
    let begin = begin.clamp(0, len) as usize;
    let take = match args.get(2) {
        Some(v) => want_number(v, "sublist length")?.max(0.0) as usize,
        None => items.len() - begin,
    };
    Ok(FeelValue::List(
        items[begin..].iter().take(take).cloned().collect(),
    ))
}

fn list_append(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let mut items = want_list(&args[0], "append input")?.to_vec();
    items.extend(args[1..].iter().cloned());
    Ok(FeelValue::List(items))
}

fn list_concatenate(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let mut out = Vec::new();
    for arg in args {
        out.extend(want_list(arg, "concatenate argument")?.iter().cloned());
    }
    Ok(FeelValue::List(out))
}

fn list_insert_before(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let mut items = want_list(&args[0], "insert before input")?.to_vec();
    let position = want_number(&args[1], "insert before position")? as i64;
    if position < 1 || position as usize > items.len() + 1 {
        return Err(FeelError::invalid_arguments(format!(
            "insert before position {} out of range",
            position
        )));
    }
    items.insert(position as usize - 1, args[2].clone());
    Ok(FeelValue::List(items))
}

fn list_remove(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let mut items = want_list(&args[0], "remove input")?.to_vec();
    let position = want_number(&args[1], "remove position")? as i64;
    if position < 1 || position as usize > items.len() {
        return Err(FeelError::invalid_arguments(format!(
            "remove position {} out of range",
            position
        )));
    }
    items.remove(position as usize - 1);
    Ok(FeelValue::List(items))
}

fn list_reverse(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let mut items = want_list(&args[0], "reverse input")?.to_vec();
    items.reverse();
    Ok(FeelValue::List(items))
}

fn list_index_of(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let items = want_list(&args[0], "index of input")?;
    let positions: Vec<FeelValue> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| *item == &args[1])
        .map(|(idx, _)| FeelValue::Number((idx + 1) as f64))
        .collect();
    Ok(FeelValue::List(positions))
}

fn list_union(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let mut out: Vec<FeelValue> = Vec::new();
    for arg in args {
        for item in want_list(arg, "union argument")? {
            if !out.contains(item) {
                out.push(item.clone());
            }
        }
    }
    Ok(FeelValue::List(out))
}

fn list_distinct(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let items = want_list(&args[0], "distinct values input")?;
    let mut out: Vec<FeelValue> = Vec::new();
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    Ok(FeelValue::List(out))
}

fn flatten_into(value: &FeelValue, out: &mut Vec<FeelValue>) {
    match value {
        FeelValue::List(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        other => out.push(other.clone()),
    }
}

fn list_flatten(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    want_list(&args[0], "flatten input")?;
    let mut out = Vec::new();
    flatten_into(&args[0], &mut out);
    Ok(FeelValue::List(out))
}

/// Default sort order: numbers before strings, numbers ascending, strings
/// lexicographic
fn default_sort_key(a: &FeelValue, b: &FeelValue) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (FeelValue::Number(x), FeelValue::Number(y)) => {
            x.partial_cmp(y).unwrap_or(Ordering::Equal)
        }
        (FeelValue::Number(_), _) => Ordering::Less,
        (_, FeelValue::Number(_)) => Ordering::Greater,
        (FeelValue::String(x), FeelValue::String(y)) => x.cmp(y),
        _ => a
            .compare(b)
            .unwrap_or(Ordering::Equal),
    }
}

fn list_sort(ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let mut items = want_list(&args[0], "sort input")?.to_vec();
    match args.get(1) {
        None => {
            items.sort_by(default_sort_key);
            Ok(FeelValue::List(items))
        }
        Some(comparator) => {
            // precedes(a, b): truthy means a sorts before b
            let mut failure: Option<FeelError> = None;
            items.sort_by(|a, b| {
                if failure.is_some() {
                    return std::cmp::Ordering::Equal;
                }
                match call_function(comparator, &[a.clone(), b.clone()], ctx) {
                    Ok(result) => {
                        if result.is_truthy() {
                            std::cmp::Ordering::Less
                        } else {
                            std::cmp::Ordering::Greater
                        }
                    }
                    Err(e) => {
                        failure = Some(e);
                        std::cmp::Ordering::Equal
                    }
                }
            });
            match failure {
                Some(e) => Err(e),
                None => Ok(FeelValue::List(items)),
            }
        }
    }
}

fn list_join(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let items = want_list(&args[0], "join input")?;
    let delimiter = match args.get(1) {
        Some(v) => want_string(v, "join delimiter")?.to_string(),
        None => String::new(),
    };
    let parts: Vec<String> = items
        .iter()
        .filter(|v| !matches!(v, FeelValue::Null))
        .map(|v| v.to_feel_string())
        .collect();
    Ok(FeelValue::String(parts.join(&delimiter)))
}

// ---- date/time ----

fn context_now(ctx: &FeelContext) -> DateTime<Utc> {
    ctx.current_date_time.unwrap_or_else(Utc::now)
}

fn temporal_now(ctx: &FeelContext, _args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    Ok(FeelValue::DateTime(context_now(ctx)))
}

fn temporal_today(ctx: &FeelContext, _args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    Ok(FeelValue::Date(context_now(ctx).date_naive()))
}

fn temporal_date(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    match args {
        [FeelValue::String(text)] => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(FeelValue::Date)
            .map_err(|_| FeelError::invalid_arguments(format!("'{}' is not a date", text))),
        [FeelValue::DateTime(dt)] => Ok(FeelValue::Date(dt.date_naive())),
        [FeelValue::Date(d)] => Ok(FeelValue::Date(*d)),
        [year, month, day] => {
            let year = want_number(year, "date year")? as i32;
            let month = want_number(month, "date month")? as u32; // 1-based
            let day = want_number(day, "date day")? as u32;
            NaiveDate::from_ymd_opt(year, month, day)
                .map(FeelValue::Date)
                .ok_or_else(|| {
                    FeelError::invalid_arguments(format!(
                        "invalid date {}-{}-{}",
                        year, month, day
                    ))
                })
        }
        _ => Err(FeelError::invalid_arguments(
            "date() takes a string or (year, month, day)",
        )),
    }
}

fn temporal_time(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    match args {
        [FeelValue::String(text)] => {
            let trimmed = text.trim();
            NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f"))
                .map(FeelValue::Time)
                .map_err(|_| FeelError::invalid_arguments(format!("'{}' is not a time", text)))
        }
        [FeelValue::Time(t)] => Ok(FeelValue::Time(*t)),
        [hour, minute, second] | [hour, minute, second, _] => {
            let hour = want_number(hour, "time hour")? as u32;
            let minute = want_number(minute, "time minute")? as u32;
            let second_f = want_number(second, "time second")?;
            NaiveTime::from_hms_opt(hour, minute, second_f as u32)
                .map(FeelValue::Time)
                .ok_or_else(|| {
                    FeelError::invalid_arguments(format!(
                        "invalid time {}:{}:{}",
                        hour, minute, second_f
                    ))
                })
        }
        _ => Err(FeelError::invalid_arguments(
            "time() takes a string or (hour, minute, second[, offset])",
        )),
    }
}

fn parse_date_time_text(text: &str) -> Result<DateTime<Utc>, FeelError> {
    let trimmed = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    // naive local form assumes UTC
    chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| {
            FeelError::invalid_arguments(format!("'{}' is not a date and time", text))
        })
}

fn temporal_date_and_time(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    match args {
        [FeelValue::String(text)] => parse_date_time_text(text).map(FeelValue::DateTime),
        [FeelValue::Date(date), FeelValue::Time(time)] => Ok(FeelValue::DateTime(
            Utc.from_utc_datetime(&date.and_time(*time)),
        )),
        _ => Err(FeelError::invalid_arguments(
            "date and time() takes a string or (date, time)",
        )),
    }
}

static RE_ISO_DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<sign>-)?P(?:(?P<years>\d+)Y)?(?:(?P<months>\d+)M)?(?:(?P<days>\d+)D)?(?:T(?:(?P<hours>\d+)H)?(?:(?P<minutes>\d+)M)?(?:(?P<seconds>\d+(?:\.\d+)?)S)?)?$",
    )
    .expect("Invalid regex")
});

/// Parse an ISO-8601 duration literal (`P[nY][nM][nD][T[nH][nM][nS]]`)
pub fn parse_iso_duration(text: &str) -> Option<FeelDuration> {
    let caps = RE_ISO_DURATION.captures(text.trim())?;
    let group = |name: &str| -> i64 {
        caps.name(name)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .map(|n| n as i64)
            .unwrap_or(0)
    };
    let months = group("years") * 12 + group("months");
    let seconds = group("days") * 86_400 + group("hours") * 3_600 + group("minutes") * 60
        + group("seconds");
    if months == 0 && seconds == 0 && !text.contains('0') {
        // bare "P" / "PT" is not a duration
        return None;
    }
    let sign = if caps.name("sign").is_some() { -1 } else { 1 };
    Some(FeelDuration::new(sign * months, sign * seconds))
}

fn temporal_duration(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let text = want_string(&args[0], "duration argument")?;
    parse_iso_duration(text)
        .map(FeelValue::Duration)
        .ok_or_else(|| FeelError::invalid_arguments(format!("'{}' is not a duration", text)))
}

fn want_date(value: &FeelValue, what: &str) -> Result<NaiveDate, FeelError> {
    match value {
        FeelValue::Date(d) => Ok(*d),
        FeelValue::DateTime(dt) => Ok(dt.date_naive()),
        other => Err(FeelError::invalid_arguments(format!(
            "{} must be a date, got {}",
            what,
            other.type_name()
        ))),
    }
}

fn temporal_years_and_months(
    _ctx: &FeelContext,
    args: &[FeelValue],
) -> Result<FeelValue, FeelError> {
    let from = want_date(&args[0], "years and months duration start")?;
    let to = want_date(&args[1], "years and months duration end")?;
    let mut months =
        (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64);
    // partial months do not count
    if months > 0 && to.day() < from.day() {
        months -= 1;
    } else if months < 0 && to.day() > from.day() {
        months += 1;
    }
    Ok(FeelValue::Duration(FeelDuration::new(months, 0)))
}

// ---- conversion ----

fn conv_string(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    Ok(FeelValue::String(args[0].to_feel_string()))
}

fn conv_boolean(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let result = match &args[0] {
        FeelValue::Null => false,
        FeelValue::Boolean(b) => *b,
        FeelValue::Number(n) => *n != 0.0,
        FeelValue::String(s) => {
            matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1")
        }
        other => other.is_truthy(),
    };
    Ok(FeelValue::Boolean(result))
}

// ---- context ----

fn context_get_entries(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let entries = want_context(&args[0], "get entries input")?;
    Ok(FeelValue::List(
        entries
            .iter()
            .map(|(key, value)| {
                let mut entry = BTreeMap::new();
                entry.insert("key".to_string(), FeelValue::String(key.clone()));
                entry.insert("value".to_string(), value.clone());
                FeelValue::Context(entry)
            })
            .collect(),
    ))
}

fn context_get_value(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let entries = want_context(&args[0], "get value input")?;
    let key = want_string(&args[1], "get value key")?;
    Ok(entries.get(key).cloned().unwrap_or(FeelValue::Null))
}

fn context_put(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let mut entries = want_context(&args[0], "context put input")?.clone();
    let key = want_string(&args[1], "context put key")?;
    entries.insert(key.to_string(), args[2].clone());
    Ok(FeelValue::Context(entries))
}

fn context_merge(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let contexts = spread_args(args);
    let mut merged = BTreeMap::new();
    for value in &contexts {
        for (key, entry) in want_context(value, "context merge argument")? {
            merged.insert(key.clone(), entry.clone());
        }
    }
    Ok(FeelValue::Context(merged))
}

// ---- range ----

/// Endpoint view of a range or point value
struct Interval<'a> {
    start: &'a FeelValue,
    end: &'a FeelValue,
    start_closed: bool,
    end_closed: bool,
}

fn as_interval(value: &FeelValue) -> Interval<'_> {
    match value {
        FeelValue::Range {
            start,
            end,
            start_closed,
            end_closed,
        } => Interval {
            start,
            end,
            start_closed: *start_closed,
            end_closed: *end_closed,
        },
        point => Interval {
            start: point,
            end: point,
            start_closed: true,
            end_closed: true,
        },
    }
}

fn cmp(a: &FeelValue, b: &FeelValue) -> Result<std::cmp::Ordering, FeelError> {
    a.compare(b)
}

fn range_before(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let a = as_interval(&args[0]);
    let b = as_interval(&args[1]);
    let result = match cmp(a.end, b.start)? {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Equal => !(a.end_closed && b.start_closed),
        std::cmp::Ordering::Greater => false,
    };
    Ok(FeelValue::Boolean(result))
}

fn range_after(ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    range_before(ctx, &[args[1].clone(), args[0].clone()])
}

fn range_meets(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let a = as_interval(&args[0]);
    let b = as_interval(&args[1]);
    Ok(FeelValue::Boolean(
        a.end_closed && b.start_closed && cmp(a.end, b.start)? == std::cmp::Ordering::Equal,
    ))
}

fn range_met_by(ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    range_meets(ctx, &[args[1].clone(), args[0].clone()])
}

fn range_overlaps(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let a = as_interval(&args[0]);
    let b = as_interval(&args[1]);
    let left = match cmp(a.start, b.end)? {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Equal => a.start_closed && b.end_closed,
        std::cmp::Ordering::Greater => false,
    };
    let right = match cmp(a.end, b.start)? {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Equal => a.end_closed && b.start_closed,
        std::cmp::Ordering::Less => false,
    };
    Ok(FeelValue::Boolean(left && right))
}

fn range_overlapped_by(ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    range_overlaps(ctx, &[args[1].clone(), args[0].clone()])
}

fn range_finishes(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let a = as_interval(&args[0]);
    let b = as_interval(&args[1]);
    let ends_match =
        cmp(a.end, b.end)? == std::cmp::Ordering::Equal && a.end_closed == b.end_closed;
    let starts_within = match cmp(a.start, b.start)? {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Equal => !a.start_closed || b.start_closed,
        std::cmp::Ordering::Less => false,
    };
    Ok(FeelValue::Boolean(ends_match && starts_within))
}

fn range_finished_by(ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    range_finishes(ctx, &[args[1].clone(), args[0].clone()])
}

fn range_includes(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let a = as_interval(&args[0]);
    let b = as_interval(&args[1]);
    let start_ok = match cmp(b.start, a.start)? {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Equal => a.start_closed || !b.start_closed,
        std::cmp::Ordering::Less => false,
    };
    let end_ok = match cmp(b.end, a.end)? {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Equal => a.end_closed || !b.end_closed,
        std::cmp::Ordering::Greater => false,
    };
    Ok(FeelValue::Boolean(start_ok && end_ok))
}

fn range_during(ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    range_includes(ctx, &[args[1].clone(), args[0].clone()])
}

fn range_starts(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let a = as_interval(&args[0]);
    let b = as_interval(&args[1]);
    let starts_match =
        cmp(a.start, b.start)? == std::cmp::Ordering::Equal && a.start_closed == b.start_closed;
    let ends_within = match cmp(a.end, b.end)? {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Equal => !a.end_closed || b.end_closed,
        std::cmp::Ordering::Greater => false,
    };
    Ok(FeelValue::Boolean(starts_match && ends_within))
}

fn range_started_by(ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    range_starts(ctx, &[args[1].clone(), args[0].clone()])
}

fn range_coincides(_ctx: &FeelContext, args: &[FeelValue]) -> Result<FeelValue, FeelError> {
    let a = as_interval(&args[0]);
    let b = as_interval(&args[1]);
    Ok(FeelValue::Boolean(
        cmp(a.start, b.start)? == std::cmp::Ordering::Equal
            && cmp(a.end, b.end)? == std::cmp::Ordering::Equal
            && a.start_closed == b.start_closed
            && a.end_closed == b.end_closed,
    ))
}
