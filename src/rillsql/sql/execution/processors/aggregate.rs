//! GROUP BY evaluation: bucketing rows by dimension-key strings.

use crate::rillsql::sql::ast::Dimension;
use crate::rillsql::sql::error::SqlResult;
use crate::rillsql::sql::execution::expression::evaluator::ExpressionEvaluator;
use crate::rillsql::sql::execution::expression::functions::FunctionRegistry;
use crate::rillsql::sql::execution::expression::valuer::EvalScope;
use crate::rillsql::sql::execution::types::{
    DataRow, GroupedBatch, RecordGroup, StreamData,
};
use crate::rillsql::stream::context::StreamContext;
use crate::rillsql::stream::operator::StreamFunction;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Buckets input rows into a [`GroupedBatch`] keyed by the comma-joined
/// stringified dimension values.
///
/// Accepts a single row, a single-stream window batch set, or a joined
/// batch. A multi-stream window batch set is a caller error: aggregation is
/// only meaningful against a flattened or joined row set, so it is logged
/// and dropped. With no dimensions every row lands in one group.
pub struct AggregateProcessor {
    dimensions: Vec<Dimension>,
    evaluator: ExpressionEvaluator,
    registry: Arc<FunctionRegistry>,
}

impl AggregateProcessor {
    pub fn new(dimensions: Vec<Dimension>, registry: Arc<FunctionRegistry>) -> Self {
        AggregateProcessor {
            dimensions,
            evaluator: ExpressionEvaluator::new(),
            registry,
        }
    }

    /// The group key for one row: dimension values stringified and joined
    /// with commas, in declaration order.
    fn group_key(&self, row: &DataRow) -> String {
        let scope = EvalScope::row(row, &self.registry);
        self.dimensions
            .iter()
            .map(|d| self.evaluator.eval(&d.expr, &scope).to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    fn group(&self, rows: Vec<DataRow>) -> Option<StreamData> {
        if rows.is_empty() {
            return None;
        }
        let mut batch = GroupedBatch::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for row in rows {
            let key = self.group_key(&row);
            match index.get(&key) {
                Some(&i) => batch.groups[i].rows.push(row),
                None => {
                    index.insert(key.clone(), batch.groups.len());
                    let mut group = RecordGroup::new(key);
                    group.rows.push(row);
                    batch.groups.push(group);
                }
            }
        }
        Some(StreamData::Grouped(batch))
    }

    /// Apply the aggregation to one payload.
    pub fn apply(&self, data: StreamData) -> SqlResult<Option<StreamData>> {
        match data {
            StreamData::Record(record) => Ok(self.group(vec![DataRow::Record(record)])),
            StreamData::Window(set) => {
                if set.batches.len() != 1 {
                    log::warn!(
                        "aggregate cannot evaluate a window batch set with {} streams",
                        set.batches.len()
                    );
                    return Ok(None);
                }
                let rows = set.batches[0]
                    .records
                    .iter()
                    .map(|r| DataRow::Record(r.clone()))
                    .collect();
                Ok(self.group(rows))
            }
            StreamData::Joined(batch) => {
                let rows = batch.rows.into_iter().map(DataRow::Joined).collect();
                Ok(self.group(rows))
            }
            StreamData::Grouped(_) => {
                log::warn!("aggregate received an already grouped batch, dropping it");
                Ok(None)
            }
            StreamData::Error(e) => Ok(Some(StreamData::Error(e))),
        }
    }
}

#[async_trait]
impl StreamFunction for AggregateProcessor {
    async fn apply(&self, _ctx: &StreamContext, data: StreamData) -> SqlResult<Option<StreamData>> {
        AggregateProcessor::apply(self, data)
    }
}
