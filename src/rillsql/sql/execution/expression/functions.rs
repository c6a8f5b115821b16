//! Function registry: the explicit capability resolving function names.
//!
//! The registry is handed to valuers at construction, so evaluation carries
//! no ambient global state. It answers three questions: is a name an
//! aggregate, what does a scalar call produce, and what does an aggregate
//! call produce. Unknown names resolve to [`FunctionResult::NotFound`] so
//! the caller can continue its chain or log.

use crate::rillsql::sql::error::SqlError;
use crate::rillsql::sql::execution::expression::aggregates;
use crate::rillsql::sql::execution::expression::valuer::FunctionResult;
use crate::rillsql::sql::execution::types::FieldValue;
use std::collections::HashMap;
use std::sync::Arc;

/// A user-registered scalar function.
pub type ScalarFunction = dyn Fn(&[FieldValue]) -> FunctionResult + Send + Sync;

/// Resolves scalar and aggregate function calls.
///
/// Builtins cover the common SQL surface; additional scalar functions can be
/// registered per instance. Function names are case-insensitive.
#[derive(Default)]
pub struct FunctionRegistry {
    custom: HashMap<String, Arc<ScalarFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        FunctionRegistry::default()
    }

    /// Register a custom scalar function, overriding any builtin of the
    /// same name except the aggregates.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[FieldValue]) -> FunctionResult + Send + Sync + 'static,
    {
        self.custom.insert(name.into().to_ascii_lowercase(), Arc::new(f));
    }

    /// True when `name` resolves to an aggregate function.
    pub fn is_aggregate(&self, name: &str) -> bool {
        aggregates::is_aggregate_function(&name.to_ascii_lowercase())
    }

    /// Dispatch a call with already-evaluated arguments.
    ///
    /// For aggregate names each argument is expected to be a
    /// `FieldValue::Array` holding one value per row of the context.
    pub fn call(&self, name: &str, args: &[FieldValue]) -> FunctionResult {
        let lower = name.to_ascii_lowercase();
        if aggregates::is_aggregate_function(&lower) {
            return aggregates::call_aggregate(&lower, args);
        }
        if let Some(f) = self.custom.get(&lower) {
            return f(args);
        }
        self.call_builtin(&lower, args)
    }

    fn call_builtin(&self, name: &str, args: &[FieldValue]) -> FunctionResult {
        match name {
            "upper" => match single_string(name, args) {
                Ok(s) => FunctionResult::Value(FieldValue::String(s.to_uppercase())),
                Err(r) => r,
            },
            "lower" => match single_string(name, args) {
                Ok(s) => FunctionResult::Value(FieldValue::String(s.to_lowercase())),
                Err(r) => r,
            },
            "length" => match args.first() {
                Some(FieldValue::String(s)) => {
                    FunctionResult::Value(FieldValue::Integer(s.chars().count() as i64))
                }
                Some(FieldValue::Array(items)) => {
                    FunctionResult::Value(FieldValue::Integer(items.len() as i64))
                }
                Some(FieldValue::Null) | None => FunctionResult::Value(FieldValue::Null),
                Some(other) => arg_type_error(name, "STRING or ARRAY", other),
            },
            "concat" => {
                let mut out = String::new();
                for arg in args {
                    match arg {
                        FieldValue::Null => {}
                        v => out.push_str(&v.to_string()),
                    }
                }
                FunctionResult::Value(FieldValue::String(out))
            }
            "abs" => match args.first() {
                Some(FieldValue::Integer(i)) => {
                    FunctionResult::Value(FieldValue::Integer(i.wrapping_abs()))
                }
                Some(FieldValue::Float(f)) => FunctionResult::Value(FieldValue::Float(f.abs())),
                Some(FieldValue::Unsigned(u)) => {
                    FunctionResult::Value(FieldValue::Unsigned(*u))
                }
                Some(FieldValue::Null) | None => FunctionResult::Value(FieldValue::Null),
                Some(other) => arg_type_error(name, "numeric", other),
            },
            "round" => rounding(name, args, f64::round),
            "floor" => rounding(name, args, f64::floor),
            "ceil" => rounding(name, args, f64::ceil),
            "coalesce" => {
                for arg in args {
                    if !arg.is_null() {
                        return FunctionResult::Value(arg.clone());
                    }
                }
                FunctionResult::Value(FieldValue::Null)
            }
            _ => FunctionResult::NotFound,
        }
    }
}

fn rounding(name: &str, args: &[FieldValue], f: fn(f64) -> f64) -> FunctionResult {
    match args.first() {
        Some(FieldValue::Float(v)) => FunctionResult::Value(FieldValue::Float(f(*v))),
        Some(v @ FieldValue::Integer(_)) | Some(v @ FieldValue::Unsigned(_)) => {
            FunctionResult::Value(v.clone())
        }
        Some(FieldValue::Null) | None => FunctionResult::Value(FieldValue::Null),
        Some(other) => arg_type_error(name, "numeric", other),
    }
}

fn single_string<'a>(name: &str, args: &'a [FieldValue]) -> Result<&'a str, FunctionResult> {
    match args.first() {
        Some(FieldValue::String(s)) => Ok(s),
        Some(FieldValue::Null) | None => Err(FunctionResult::Value(FieldValue::Null)),
        Some(other) => Err(arg_type_error(name, "STRING", other)),
    }
}

fn arg_type_error(name: &str, expected: &str, actual: &FieldValue) -> FunctionResult {
    FunctionResult::Error(SqlError::function_error(
        name,
        format!("expected {} argument, got {}", expected, actual.type_name()),
    ))
}
