//! Query execution against streaming data.
//!
//! The execution layer takes compiled expression trees from the planner and
//! runs them over stream records: the value type system and payload shapes
//! live in [`types`], expression evaluation and function dispatch in
//! [`expression`], and the relational plan operators (filter, aggregate,
//! order, project) in [`processors`].

pub mod expression;
pub mod processors;
pub mod types;

// Re-export the main API
pub use expression::evaluator::ExpressionEvaluator;
pub use expression::functions::FunctionRegistry;
pub use types::{FieldValue, StreamData, StreamRecord, WindowBatchSet};
