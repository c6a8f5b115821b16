//! Expression evaluation for streaming SQL.
//!
//! This module contains all the logic for evaluating compiled expressions:
//! - Field resolution through composable valuers (rows, joins, aggregates)
//! - Binary operations with SQL-permissive coercion
//! - Scalar and aggregate function dispatch through the registry
//!
//! Evaluation never raises for type mismatches; it resolves to `Null`,
//! `false`, or a documented numeric default so one malformed field never
//! halts a pipeline.

pub mod aggregates;
pub mod evaluator;
pub mod functions;
pub mod valuer;

// Re-export the main API
pub use evaluator::ExpressionEvaluator;
pub use functions::FunctionRegistry;
pub use valuer::{DataValuer, EvalScope, FunctionResult, Valuer, Wildcarder};
