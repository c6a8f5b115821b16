//! Aggregate function computation over per-argument value lists.
//!
//! Each argument of an aggregate call arrives as a `FieldValue::Array`
//! holding one evaluated value per row of the aggregation context. The first
//! non-null element fixes the expected element type; elements of any other
//! type are silently skipped rather than erroring, mirroring SQL's
//! permissive treatment of mixed inputs.
//!
//! Empty-input behavior: `count` and `sum` and `avg` return zero, `max` and
//! `min` return an error result carrying the no-match flag. A non-empty
//! list with no valid (non-null) element is an error for everything but
//! `count`: there are rows, but nothing to aggregate.

use crate::rillsql::sql::error::SqlError;
use crate::rillsql::sql::execution::expression::valuer::FunctionResult;
use crate::rillsql::sql::execution::types::FieldValue;

/// True when `name` (already lowercased) is a builtin aggregate.
pub fn is_aggregate_function(name: &str) -> bool {
    matches!(name, "count" | "sum" | "avg" | "max" | "min")
}

/// Dispatch an aggregate call. `name` must already be lowercased.
pub fn call_aggregate(name: &str, args: &[FieldValue]) -> FunctionResult {
    let list = match args.first() {
        Some(FieldValue::Array(list)) => list,
        Some(other) => {
            return FunctionResult::Error(SqlError::function_error(
                name,
                format!("expected a value list argument, got {}", other.type_name()),
            ));
        }
        None => {
            return FunctionResult::Error(SqlError::function_error(name, "missing argument"));
        }
    };
    match name {
        "count" => FunctionResult::Value(FieldValue::Integer(list.len() as i64)),
        "sum" => sum(name, list),
        "avg" => avg(list),
        "max" => extremum(name, list, true),
        "min" => extremum(name, list, false),
        _ => FunctionResult::NotFound,
    }
}

/// First non-null element; fixes the expected element type for the call.
fn first_valid(list: &[FieldValue]) -> Option<&FieldValue> {
    list.iter().find(|v| !v.is_null())
}

fn int_total(list: &[FieldValue]) -> i64 {
    list.iter()
        .filter_map(|v| match v {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        })
        .sum()
}

fn float_total(list: &[FieldValue]) -> f64 {
    list.iter()
        .filter_map(|v| match v {
            FieldValue::Float(f) => Some(*f),
            _ => None,
        })
        .sum()
}

fn sum(name: &str, list: &[FieldValue]) -> FunctionResult {
    if list.is_empty() {
        return FunctionResult::Value(FieldValue::Integer(0));
    }
    match first_valid(list) {
        None => FunctionResult::Error(SqlError::function_error(
            name,
            "no valid element in input list",
        )),
        Some(FieldValue::Integer(_)) => FunctionResult::Value(FieldValue::Integer(int_total(list))),
        Some(FieldValue::Float(_)) => FunctionResult::Value(FieldValue::Float(float_total(list))),
        Some(other) => FunctionResult::Error(SqlError::function_error(
            name,
            format!("invalid element type {}", other.type_name()),
        )),
    }
}

fn avg(list: &[FieldValue]) -> FunctionResult {
    if list.is_empty() {
        return FunctionResult::Value(FieldValue::Integer(0));
    }
    match first_valid(list) {
        None => FunctionResult::Error(SqlError::function_error(
            "avg",
            "no valid element in input list",
        )),
        // Integer average truncates, matching integer division semantics.
        Some(FieldValue::Integer(_)) => {
            FunctionResult::Value(FieldValue::Integer(int_total(list) / list.len() as i64))
        }
        Some(FieldValue::Float(_)) => {
            FunctionResult::Value(FieldValue::Float(float_total(list) / list.len() as f64))
        }
        Some(other) => FunctionResult::Error(SqlError::function_error(
            "avg",
            format!("invalid element type {}", other.type_name()),
        )),
    }
}

fn extremum(name: &str, list: &[FieldValue], want_max: bool) -> FunctionResult {
    let first = match first_valid(list) {
        Some(v) => v,
        None => {
            return FunctionResult::Error(SqlError::function_error(name, "empty input list"));
        }
    };
    match first {
        FieldValue::Integer(seed) => {
            let mut best = *seed;
            for v in list {
                if let FieldValue::Integer(i) = v {
                    if (want_max && *i > best) || (!want_max && *i < best) {
                        best = *i;
                    }
                }
            }
            FunctionResult::Value(FieldValue::Integer(best))
        }
        FieldValue::Float(seed) => {
            let mut best = *seed;
            for v in list {
                if let FieldValue::Float(f) = v {
                    if (want_max && *f > best) || (!want_max && *f < best) {
                        best = *f;
                    }
                }
            }
            FunctionResult::Value(FieldValue::Float(best))
        }
        FieldValue::String(seed) => {
            let mut best = seed.clone();
            for v in list {
                if let FieldValue::String(s) = v {
                    if (want_max && *s > best) || (!want_max && *s < best) {
                        best = s.clone();
                    }
                }
            }
            FunctionResult::Value(FieldValue::String(best))
        }
        other => FunctionResult::Error(SqlError::function_error(
            name,
            format!("unsupported element type {}", other.type_name()),
        )),
    }
}
