//! WHERE clause evaluation over single rows and row collections.

use crate::rillsql::sql::ast::Expr;
use crate::rillsql::sql::error::{SqlError, SqlResult};
use crate::rillsql::sql::execution::expression::evaluator::ExpressionEvaluator;
use crate::rillsql::sql::execution::expression::functions::FunctionRegistry;
use crate::rillsql::sql::execution::expression::valuer::{DataValuer, EvalScope};
use crate::rillsql::sql::execution::types::{FieldValue, StreamData};
use crate::rillsql::stream::context::StreamContext;
use crate::rillsql::stream::operator::StreamFunction;
use async_trait::async_trait;
use std::sync::Arc;

/// Filters rows by a compiled condition expression.
///
/// Single rows pass through on a `true` condition and are suppressed on
/// `false` or null; a condition that evaluates to any other type is the
/// operator's error result and travels downstream as [`StreamData::Error`].
/// Collections keep exactly the rows whose condition is `true`; the first
/// row whose condition fails aborts the whole collection into an error
/// result, and a collection left empty is dropped rather than emitted empty.
pub struct FilterProcessor {
    condition: Expr,
    /// Stateful helper calls evaluated for their side effects whenever a
    /// single row passes the condition.
    stateful_calls: Vec<Expr>,
    evaluator: ExpressionEvaluator,
    registry: Arc<FunctionRegistry>,
}

impl FilterProcessor {
    pub fn new(condition: Expr, registry: Arc<FunctionRegistry>) -> Self {
        FilterProcessor {
            condition,
            stateful_calls: Vec::new(),
            evaluator: ExpressionEvaluator::new(),
            registry,
        }
    }

    /// Attach helper calls evaluated alongside a passing single row.
    pub fn with_stateful_calls(mut self, calls: Vec<Expr>) -> Self {
        self.stateful_calls = calls;
        self
    }

    /// True when the condition evaluates to `true` for this row.
    fn passes(&self, row: &dyn DataValuer) -> SqlResult<bool> {
        let scope = EvalScope::row(row, &self.registry);
        match self.evaluator.eval(&self.condition, &scope) {
            FieldValue::Boolean(true) => Ok(true),
            FieldValue::Boolean(false) | FieldValue::Null => Ok(false),
            other => Err(SqlError::execution_error(
                format!(
                    "filter condition evaluated to {} instead of a boolean",
                    other.type_name()
                ),
                Some("filter".to_string()),
            )),
        }
    }

    /// Apply the filter to one payload.
    pub fn apply(&self, data: StreamData) -> SqlResult<Option<StreamData>> {
        match data {
            StreamData::Record(record) => {
                match self.passes(record.as_ref()) {
                    Ok(true) => {
                        let scope = EvalScope::row(record.as_ref(), &self.registry);
                        for call in &self.stateful_calls {
                            self.evaluator.eval(call, &scope);
                        }
                        Ok(Some(StreamData::Record(record)))
                    }
                    Ok(false) => Ok(None),
                    // Condition failures are the operator's result so
                    // collector stages can observe them.
                    Err(e) => Ok(Some(StreamData::Error(e))),
                }
            }
            StreamData::Joined(mut batch) => {
                let mut kept = Vec::with_capacity(batch.rows.len());
                for row in batch.rows {
                    match self.passes(&row) {
                        Ok(true) => kept.push(row),
                        Ok(false) => {}
                        // The first failing row aborts the whole collection.
                        Err(e) => return Ok(Some(StreamData::Error(e))),
                    }
                }
                if kept.is_empty() {
                    Ok(None)
                } else {
                    batch.rows = kept;
                    Ok(Some(StreamData::Joined(batch)))
                }
            }
            StreamData::Window(mut set) => {
                if set.batches.len() != 1 {
                    log::warn!(
                        "filter cannot evaluate a window batch set with {} streams",
                        set.batches.len()
                    );
                    return Ok(None);
                }
                let records = std::mem::take(&mut set.batches[0].records);
                let mut kept = Vec::with_capacity(records.len());
                for record in records {
                    match self.passes(record.as_ref()) {
                        Ok(true) => kept.push(record),
                        Ok(false) => {}
                        Err(e) => return Ok(Some(StreamData::Error(e))),
                    }
                }
                if kept.is_empty() {
                    Ok(None)
                } else {
                    set.batches[0].records = kept;
                    Ok(Some(StreamData::Window(set)))
                }
            }
            StreamData::Grouped(_) => {
                log::warn!("filter received a grouped batch, dropping it");
                Ok(None)
            }
            StreamData::Error(e) => Ok(Some(StreamData::Error(e))),
        }
    }
}

#[async_trait]
impl StreamFunction for FilterProcessor {
    async fn apply(&self, _ctx: &StreamContext, data: StreamData) -> SqlResult<Option<StreamData>> {
        FilterProcessor::apply(self, data)
    }
}
