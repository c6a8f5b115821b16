//! SELECT clause projection: shaping output records from rows and groups.

use crate::rillsql::sql::ast::{Expr, SelectField};
use crate::rillsql::sql::error::SqlResult;
use crate::rillsql::sql::execution::expression::evaluator::ExpressionEvaluator;
use crate::rillsql::sql::execution::expression::functions::FunctionRegistry;
use crate::rillsql::sql::execution::expression::valuer::EvalScope;
use crate::rillsql::sql::execution::types::{
    DataRow, FieldValue, StreamData, StreamRecord, WindowBatchSet,
};
use crate::rillsql::stream::context::StreamContext;
use crate::rillsql::stream::operator::StreamFunction;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Evaluates the select-field expressions per row or per group into output
/// records.
///
/// For grouped input one output record is produced per group, with the
/// select fields evaluated aggregate-aware over the group's rows. Wildcard
/// fields merge the whole backing message into the output.
pub struct ProjectProcessor {
    fields: Vec<SelectField>,
    evaluator: ExpressionEvaluator,
    registry: Arc<FunctionRegistry>,
}

impl ProjectProcessor {
    pub fn new(fields: Vec<SelectField>, registry: Arc<FunctionRegistry>) -> Self {
        ProjectProcessor {
            fields,
            evaluator: ExpressionEvaluator::new(),
            registry,
        }
    }

    /// Evaluate every select field in `scope` into an output message.
    fn project_scope(&self, scope: &EvalScope<'_>) -> HashMap<String, FieldValue> {
        let mut message = HashMap::new();
        for (i, field) in self.fields.iter().enumerate() {
            if matches!(field.expr, Expr::Wildcard) {
                for (k, v) in scope.all() {
                    message.entry(k).or_insert(v);
                }
                continue;
            }
            let value = self.evaluator.eval(&field.expr, scope);
            message.insert(field.output_name(i), value);
        }
        message
    }

    fn project_row(&self, row: &DataRow, timestamp: i64) -> Arc<StreamRecord> {
        let scope = EvalScope::row(row, &self.registry);
        let message = self.project_scope(&scope);
        let emitter = match row {
            DataRow::Record(r) => r.emitter.clone(),
            DataRow::Joined(j) => j
                .records
                .first()
                .map(|r| r.emitter.clone())
                .unwrap_or_default(),
        };
        Arc::new(StreamRecord::new(emitter, message, timestamp))
    }

    /// Apply the projection to one payload.
    pub fn apply(&self, data: StreamData) -> SqlResult<Option<StreamData>> {
        match data {
            StreamData::Record(record) => {
                let row = DataRow::Record(record.clone());
                Ok(Some(StreamData::Record(
                    self.project_row(&row, record.timestamp),
                )))
            }
            StreamData::Window(set) => {
                if set.batches.len() != 1 {
                    log::warn!(
                        "project cannot evaluate a window batch set with {} streams",
                        set.batches.len()
                    );
                    return Ok(None);
                }
                let mut out = WindowBatchSet::new();
                for record in &set.batches[0].records {
                    let row = DataRow::Record(record.clone());
                    out.add_record(self.project_row(&row, record.timestamp));
                }
                Ok(Some(StreamData::Window(out)))
            }
            StreamData::Joined(batch) => {
                let mut out = WindowBatchSet::new();
                for joined in batch.rows {
                    let ts = joined.records.first().map_or(0, |r| r.timestamp);
                    let row = DataRow::Joined(joined);
                    out.add_record(self.project_row(&row, ts));
                }
                if out.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(StreamData::Window(out)))
                }
            }
            StreamData::Grouped(batch) => {
                // One output record per group, aggregate-aware.
                let mut out = WindowBatchSet::new();
                for group in &batch.groups {
                    let representative = match group.rows.first() {
                        Some(row) => row,
                        None => continue,
                    };
                    let scope = EvalScope::aggregate(representative, group, &self.registry);
                    let message = self.project_scope(&scope);
                    let (emitter, ts) = match representative {
                        DataRow::Record(r) => (r.emitter.clone(), r.timestamp),
                        DataRow::Joined(j) => (
                            j.records
                                .first()
                                .map(|r| r.emitter.clone())
                                .unwrap_or_default(),
                            j.records.first().map_or(0, |r| r.timestamp),
                        ),
                    };
                    out.add_record(Arc::new(StreamRecord::new(emitter, message, ts)));
                }
                if out.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(StreamData::Window(out)))
                }
            }
            StreamData::Error(e) => Ok(Some(StreamData::Error(e))),
        }
    }
}

#[async_trait]
impl StreamFunction for ProjectProcessor {
    async fn apply(&self, _ctx: &StreamContext, data: StreamData) -> SqlResult<Option<StreamData>> {
        ProjectProcessor::apply(self, data)
    }
}
