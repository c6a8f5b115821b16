//! # rillsql
//!
//! A continuous SQL streaming dataflow engine: compiled expressions are
//! evaluated with SQL-permissive coercion over live records, relational
//! plan operators run as concurrent tokio stages wired by bounded
//! channels, and time windows (tumbling, hopping, sliding, session)
//! trigger in processing time or by watermark in event time.
//!
//! ## Features
//!
//! - **Permissive Evaluation**: type mismatches resolve to `NULL`/`false`
//!   instead of halting the pipeline
//! - **Composable Valuers**: rows, joined rows, and window batches resolve
//!   fields through one capability chain
//! - **Concurrent Operators**: per-stage worker pools with backpressure,
//!   barrier interception, and fan-out broadcast
//! - **Dual-Mode Windowing**: wall-clock tickers or watermark-driven
//!   event-time triggering with late tolerance
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rillsql::rillsql::sql::ast::{BinaryOperator, Expr, LiteralValue};
//! use rillsql::rillsql::sql::execution::expression::functions::FunctionRegistry;
//! use rillsql::rillsql::sql::execution::processors::filter::FilterProcessor;
//! use rillsql::rillsql::stream::config::StreamConfig;
//! use rillsql::rillsql::stream::topology::Topology;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let condition = Expr::binary(
//!     Expr::field("temperature"),
//!     BinaryOperator::Gt,
//!     Expr::Literal(LiteralValue::Integer(30)),
//! );
//! let filter = Arc::new(FilterProcessor::new(
//!     condition,
//!     Arc::new(FunctionRegistry::new()),
//! ));
//!
//! let mut topology = Topology::new("hot-readings", StreamConfig::default());
//! topology.add_unary("filter", filter)?;
//! let sink = topology.add_sink("filter", "sink")?;
//! let source = topology.source("filter")?;
//! topology.start()?;
//! # Ok(())
//! # }
//! ```

pub mod rillsql;

// Re-export the primary API at the crate root
pub use rillsql::sql::error::{SqlError, SqlResult};
pub use rillsql::sql::execution::types::{FieldValue, StreamData, StreamRecord};
pub use rillsql::stream::topology::Topology;
