//! Relational plan operators.
//!
//! Each processor exposes a synchronous `apply` over [`StreamData`] plus a
//! `StreamFunction` impl so it can run inside a unary operator. Errors from
//! a transformation are logged at the operator boundary; `StreamData::Error`
//! inputs pass through every processor unchanged so a collector stage can
//! report them.
//!
//! [`StreamData`]: crate::rillsql::sql::execution::types::StreamData

pub mod aggregate;
pub mod filter;
pub mod order;
pub mod project;

// Re-export the main API
pub use aggregate::AggregateProcessor;
pub use filter::FilterProcessor;
pub use order::OrderProcessor;
pub use project::ProjectProcessor;
