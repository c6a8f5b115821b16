//! Valuer composition: resolving field references and function calls against
//! rows and the function registry through one interface.
//!
//! A [`Valuer`] answers field lookups for some underlying row; a
//! [`Wildcarder`] additionally exposes the whole message for `*` expressions.
//! [`MultiValuer`] chains several row valuers with the function registry so
//! the evaluator queries a single object, and [`AggregateMultiValuer`] adds
//! the row collection backing an aggregation context.

use crate::rillsql::sql::error::SqlError;
use crate::rillsql::sql::execution::expression::functions::FunctionRegistry;
use crate::rillsql::sql::execution::types::{
    DataRow, FieldValue, JoinedBatch, JoinedRecord, RecordGroup, StreamRecord, WindowBatchSet,
};
use std::collections::HashMap;

/// Resolves field names against some underlying row or context.
pub trait Valuer {
    /// The value for `key`, or `None` when the key is not present.
    fn value(&self, key: &str) -> Option<FieldValue>;
}

/// Exposes the whole message backing a row, for wildcard resolution.
pub trait Wildcarder {
    /// Every field of the row as a map.
    fn all(&self) -> HashMap<String, FieldValue>;
}

/// A row that supports both field lookup and wildcard resolution.
pub trait DataValuer: Valuer + Wildcarder {}

impl<T: Valuer + Wildcarder> DataValuer for T {}

/// Outcome of dispatching a function call to a valuer.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionResult {
    /// The call produced a value
    Value(FieldValue),
    /// No valuer in the chain knows the function
    NotFound,
    /// The function matched but failed; callers treat this as "no usable
    /// result", not a hard failure
    Error(SqlError),
}

impl Valuer for StreamRecord {
    fn value(&self, key: &str) -> Option<FieldValue> {
        self.field(key)
    }
}

impl Wildcarder for StreamRecord {
    fn all(&self) -> HashMap<String, FieldValue> {
        self.message.clone()
    }
}

impl Valuer for JoinedRecord {
    fn value(&self, key: &str) -> Option<FieldValue> {
        self.field(key)
    }
}

impl Wildcarder for JoinedRecord {
    fn all(&self) -> HashMap<String, FieldValue> {
        self.merged_message()
    }
}

impl Valuer for DataRow {
    fn value(&self, key: &str) -> Option<FieldValue> {
        self.field(key)
    }
}

impl Wildcarder for DataRow {
    fn all(&self) -> HashMap<String, FieldValue> {
        match self {
            DataRow::Record(r) => r.message.clone(),
            DataRow::Joined(j) => j.merged_message(),
        }
    }
}

/// The row collection backing an aggregation context.
///
/// Aggregate-aware call dispatch evaluates each argument expression once per
/// row returned here, producing the per-argument lists aggregate functions
/// consume.
pub trait AggregateData {
    /// The rows of the current aggregation context, in arrival order.
    fn aggregate_rows(&self) -> Vec<DataRow>;
}

impl AggregateData for WindowBatchSet {
    /// Single-stream sets yield their records; a multi-stream set cannot be
    /// aggregated directly and yields no rows.
    fn aggregate_rows(&self) -> Vec<DataRow> {
        if self.batches.len() != 1 {
            log::warn!("window batch set with {} streams cannot back an aggregation", self.batches.len());
            return Vec::new();
        }
        self.batches[0]
            .records
            .iter()
            .map(|r| DataRow::Record(r.clone()))
            .collect()
    }
}

impl AggregateData for JoinedBatch {
    fn aggregate_rows(&self) -> Vec<DataRow> {
        self.rows.iter().map(|r| DataRow::Joined(r.clone())).collect()
    }
}

impl AggregateData for RecordGroup {
    fn aggregate_rows(&self) -> Vec<DataRow> {
        self.rows.clone()
    }
}

impl AggregateData for DataRow {
    /// A single row aggregates over itself.
    fn aggregate_rows(&self) -> Vec<DataRow> {
        vec![self.clone()]
    }
}

/// Chains row valuers with the function registry.
///
/// Field lookup tries each wrapped valuer in order and returns the first
/// resolution; call dispatch goes to the registry.
pub struct MultiValuer<'a> {
    valuers: Vec<&'a dyn DataValuer>,
    functions: &'a FunctionRegistry,
}

impl<'a> MultiValuer<'a> {
    /// An empty chain over the given registry.
    pub fn new(functions: &'a FunctionRegistry) -> Self {
        MultiValuer {
            valuers: Vec::new(),
            functions,
        }
    }

    /// The common single-row case.
    pub fn over(row: &'a dyn DataValuer, functions: &'a FunctionRegistry) -> Self {
        MultiValuer {
            valuers: vec![row],
            functions,
        }
    }

    /// Append another valuer to the chain.
    pub fn with(mut self, valuer: &'a dyn DataValuer) -> Self {
        self.valuers.push(valuer);
        self
    }

    /// The registry resolving function calls for this chain.
    pub fn functions(&self) -> &'a FunctionRegistry {
        self.functions
    }

    /// Dispatch a function call to the registry.
    pub fn call(&self, name: &str, args: &[FieldValue]) -> FunctionResult {
        self.functions.call(name, args)
    }

    /// Wildcard resolution against the first wrapped valuer.
    pub fn all(&self) -> HashMap<String, FieldValue> {
        self.valuers.first().map_or_else(HashMap::new, |v| v.all())
    }
}

impl Valuer for MultiValuer<'_> {
    fn value(&self, key: &str) -> Option<FieldValue> {
        self.valuers.iter().find_map(|v| v.value(key))
    }
}

/// A [`MultiValuer`] bound to the rows of an aggregation context.
pub struct AggregateMultiValuer<'a> {
    inner: MultiValuer<'a>,
    data: &'a dyn AggregateData,
}

impl<'a> AggregateMultiValuer<'a> {
    pub fn new(inner: MultiValuer<'a>, data: &'a dyn AggregateData) -> Self {
        AggregateMultiValuer { inner, data }
    }

    /// The rows argument expressions are evaluated against, one by one.
    pub fn rows(&self) -> Vec<DataRow> {
        self.data.aggregate_rows()
    }

    pub fn functions(&self) -> &'a FunctionRegistry {
        self.inner.functions()
    }

    pub fn call(&self, name: &str, args: &[FieldValue]) -> FunctionResult {
        self.inner.call(name, args)
    }

    pub fn all(&self) -> HashMap<String, FieldValue> {
        self.inner.all()
    }
}

impl Valuer for AggregateMultiValuer<'_> {
    fn value(&self, key: &str) -> Option<FieldValue> {
        self.inner.value(key)
    }
}

/// The resolution context handed to the evaluator: either a plain row chain
/// or an aggregate-aware one.
pub enum EvalScope<'a> {
    /// Scalar evaluation against one row
    Row(MultiValuer<'a>),
    /// Aggregate-aware evaluation over a row collection
    Aggregate(AggregateMultiValuer<'a>),
}

impl<'a> EvalScope<'a> {
    /// Build a scalar scope over one row.
    pub fn row(row: &'a dyn DataValuer, functions: &'a FunctionRegistry) -> Self {
        EvalScope::Row(MultiValuer::over(row, functions))
    }

    /// Build an aggregate scope: field lookups resolve against `row` (the
    /// representative row of the context), calls see the whole collection.
    pub fn aggregate(
        row: &'a dyn DataValuer,
        data: &'a dyn AggregateData,
        functions: &'a FunctionRegistry,
    ) -> Self {
        EvalScope::Aggregate(AggregateMultiValuer::new(
            MultiValuer::over(row, functions),
            data,
        ))
    }

    pub fn functions(&self) -> &'a FunctionRegistry {
        match self {
            EvalScope::Row(v) => v.functions(),
            EvalScope::Aggregate(v) => v.functions(),
        }
    }

    /// Wildcard resolution for this scope.
    pub fn all(&self) -> HashMap<String, FieldValue> {
        match self {
            EvalScope::Row(v) => v.all(),
            EvalScope::Aggregate(v) => v.all(),
        }
    }

    /// Dispatch a function call with already-evaluated arguments.
    pub fn dispatch(&self, name: &str, args: &[FieldValue]) -> FunctionResult {
        match self {
            EvalScope::Row(v) => v.call(name, args),
            EvalScope::Aggregate(v) => v.call(name, args),
        }
    }
}

impl Valuer for EvalScope<'_> {
    fn value(&self, key: &str) -> Option<FieldValue> {
        match self {
            EvalScope::Row(v) => v.value(key),
            EvalScope::Aggregate(v) => v.value(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(emitter: &str, fields: &[(&str, FieldValue)]) -> StreamRecord {
        let message = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        StreamRecord::new(emitter, message, 0)
    }

    #[test]
    fn test_multi_valuer_chains_in_order() {
        let registry = FunctionRegistry::new();
        let first = record("a", &[("x", FieldValue::Integer(1))]);
        let second = record("b", &[("x", FieldValue::Integer(2)), ("y", FieldValue::Integer(3))]);
        let mv = MultiValuer::new(&registry).with(&first).with(&second);
        // First resolution wins.
        assert_eq!(mv.value("x"), Some(FieldValue::Integer(1)));
        assert_eq!(mv.value("y"), Some(FieldValue::Integer(3)));
        assert_eq!(mv.value("z"), None);
    }

    #[test]
    fn test_multi_stream_window_set_yields_no_aggregate_rows() {
        let mut set = WindowBatchSet::new();
        set.add_record(Arc::new(record("s1", &[])));
        set.add_record(Arc::new(record("s2", &[])));
        assert!(set.aggregate_rows().is_empty());
    }

    #[test]
    fn test_single_row_aggregate_data() {
        let row = DataRow::Record(Arc::new(record("s", &[("a", FieldValue::Integer(7))])));
        let rows = row.aggregate_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].field("a"), Some(FieldValue::Integer(7)));
    }
}
