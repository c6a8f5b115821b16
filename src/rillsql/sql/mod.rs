// SQL evaluation for continuous queries
// Compiled expression trees, permissive coercion, and the plan operators

pub mod ast;
pub mod error;
pub mod execution;

// Re-export main API
pub use ast::{BinaryOperator, Expr, LiteralValue, WindowKind, WindowSpec};
pub use error::{SqlError, SqlResult};
pub use execution::types::{FieldValue, StreamData, StreamRecord};
