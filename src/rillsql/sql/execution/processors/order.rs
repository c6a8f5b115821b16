//! ORDER BY evaluation: stable multi-key sorting with the evaluator's
//! comparison rules.

use crate::rillsql::sql::ast::{BinaryOperator, SortField};
use crate::rillsql::sql::error::SqlResult;
use crate::rillsql::sql::execution::expression::evaluator::ExpressionEvaluator;
use crate::rillsql::sql::execution::types::{FieldValue, StreamData};
use crate::rillsql::stream::context::StreamContext;
use crate::rillsql::stream::operator::StreamFunction;
use async_trait::async_trait;
use std::cmp::Ordering;

/// Sorts row collections by a list of sort fields.
///
/// Fields are compared in declared order with the same coercion rules as
/// the evaluator's comparison operators, short-circuiting on the first
/// field that discriminates. A field absent on either side compares as
/// greater than any present value, so absent rows land deterministically at
/// the descending end instead of raising. The sort is stable: re-sorting a
/// sorted collection is a no-op.
pub struct OrderProcessor {
    fields: Vec<SortField>,
    evaluator: ExpressionEvaluator,
}

impl OrderProcessor {
    pub fn new(fields: Vec<SortField>) -> Self {
        OrderProcessor {
            fields,
            evaluator: ExpressionEvaluator::new(),
        }
    }

    /// Compare two rows through their field lookups.
    fn compare(
        &self,
        lookup: impl Fn(&str) -> Option<FieldValue>,
        other: impl Fn(&str) -> Option<FieldValue>,
    ) -> Ordering {
        for field in &self.fields {
            let vp = lookup(&field.name);
            let vq = other(&field.name);
            let ordering = match (vp, vq) {
                (None, None) => Ordering::Equal,
                // Absent compares as greater than any present value.
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(vp), Some(vq)) => {
                    let lt = self.evaluator.binary_op(
                        vp.clone(),
                        vq.clone(),
                        BinaryOperator::Lt,
                    );
                    let gt = self.evaluator.binary_op(vq, vp, BinaryOperator::Lt);
                    match (lt, gt) {
                        (FieldValue::Boolean(true), _) => Ordering::Less,
                        (_, FieldValue::Boolean(true)) => Ordering::Greater,
                        // Non-comparable values tie; stability keeps their
                        // relative order.
                        _ => Ordering::Equal,
                    }
                }
            };
            let ordering = if field.ascending {
                ordering
            } else {
                ordering.reverse()
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    fn sort_by_lookup<T>(&self, items: &mut [T], value_of: impl Fn(&T, &str) -> Option<FieldValue>) {
        items.sort_by(|p, q| self.compare(|k| value_of(p, k), |k| value_of(q, k)));
    }

    /// Apply the sort to one payload. Single rows pass through unchanged.
    pub fn apply(&self, data: StreamData) -> SqlResult<Option<StreamData>> {
        match data {
            StreamData::Record(record) => Ok(Some(StreamData::Record(record))),
            StreamData::Window(mut set) => {
                if let Some(batch) = set.batches.first_mut() {
                    self.sort_by_lookup(&mut batch.records, |r, k| r.field(k));
                }
                Ok(Some(StreamData::Window(set)))
            }
            StreamData::Joined(mut batch) => {
                self.sort_by_lookup(&mut batch.rows, |r, k| r.field(k));
                Ok(Some(StreamData::Joined(batch)))
            }
            StreamData::Grouped(mut batch) => {
                // Groups sort by their first row, the group's representative.
                self.sort_by_lookup(&mut batch.groups, |g, k| {
                    g.rows.first().and_then(|r| r.field(k))
                });
                Ok(Some(StreamData::Grouped(batch)))
            }
            StreamData::Error(e) => Ok(Some(StreamData::Error(e))),
        }
    }
}

#[async_trait]
impl StreamFunction for OrderProcessor {
    async fn apply(&self, _ctx: &StreamContext, data: StreamData) -> SqlResult<Option<StreamData>> {
        OrderProcessor::apply(self, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rillsql::sql::execution::types::{StreamRecord, WindowBatchSet};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn record(fields: &[(&str, FieldValue)]) -> Arc<StreamRecord> {
        let message = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Arc::new(StreamRecord::new("demo", message, 0))
    }

    fn window_of(records: Vec<Arc<StreamRecord>>) -> WindowBatchSet {
        let mut set = WindowBatchSet::new();
        for r in records {
            set.add_record(r);
        }
        set
    }

    fn values_of(data: &StreamData, key: &str) -> Vec<Option<FieldValue>> {
        match data {
            StreamData::Window(set) => set
                .records_for("demo")
                .unwrap()
                .iter()
                .map(|r| r.field(key))
                .collect(),
            other => panic!("expected window data, got {:?}", other),
        }
    }

    #[test]
    fn test_single_key_ascending_sort() {
        let order = OrderProcessor::new(vec![SortField::asc("a")]);
        let set = window_of(vec![
            record(&[("a", FieldValue::Integer(3))]),
            record(&[("a", FieldValue::Integer(1))]),
            record(&[("a", FieldValue::Integer(2))]),
        ]);
        let out = order.apply(StreamData::Window(set)).unwrap().unwrap();
        assert_eq!(
            values_of(&out, "a"),
            vec![
                Some(FieldValue::Integer(1)),
                Some(FieldValue::Integer(2)),
                Some(FieldValue::Integer(3))
            ]
        );
    }

    #[test]
    fn test_multi_key_sort_short_circuits_on_first_discriminating_field() {
        let order = OrderProcessor::new(vec![SortField::asc("a"), SortField::desc("b")]);
        let set = window_of(vec![
            record(&[("a", FieldValue::Integer(1)), ("b", FieldValue::Integer(1))]),
            record(&[("a", FieldValue::Integer(1)), ("b", FieldValue::Integer(9))]),
            record(&[("a", FieldValue::Integer(0)), ("b", FieldValue::Integer(5))]),
        ]);
        let out = order.apply(StreamData::Window(set)).unwrap().unwrap();
        assert_eq!(
            values_of(&out, "b"),
            vec![
                Some(FieldValue::Integer(5)),
                Some(FieldValue::Integer(9)),
                Some(FieldValue::Integer(1))
            ]
        );
    }

    #[test]
    fn test_absent_field_row_lands_at_deterministic_position() {
        let rows = || {
            vec![
                record(&[("a", FieldValue::Integer(4))]),
                record(&[("a", FieldValue::Integer(2))]),
                record(&[("other", FieldValue::Integer(0))]),
                record(&[("a", FieldValue::Integer(1))]),
                record(&[("a", FieldValue::Integer(3))]),
            ]
        };
        // Ascending: the absent-field row sorts last.
        let asc = OrderProcessor::new(vec![SortField::asc("a")]);
        let out = asc
            .apply(StreamData::Window(window_of(rows())))
            .unwrap()
            .unwrap();
        assert_eq!(
            values_of(&out, "a"),
            vec![
                Some(FieldValue::Integer(1)),
                Some(FieldValue::Integer(2)),
                Some(FieldValue::Integer(3)),
                Some(FieldValue::Integer(4)),
                None
            ]
        );
        // Descending: it sorts first.
        let desc = OrderProcessor::new(vec![SortField::desc("a")]);
        let out = desc
            .apply(StreamData::Window(window_of(rows())))
            .unwrap()
            .unwrap();
        assert_eq!(
            values_of(&out, "a"),
            vec![
                None,
                Some(FieldValue::Integer(4)),
                Some(FieldValue::Integer(3)),
                Some(FieldValue::Integer(2)),
                Some(FieldValue::Integer(1))
            ]
        );
    }

    #[test]
    fn test_resorting_sorted_data_is_a_no_op() {
        let order = OrderProcessor::new(vec![SortField::asc("a")]);
        let set = window_of(vec![
            record(&[("a", FieldValue::Integer(2)), ("tag", FieldValue::String("x".into()))]),
            record(&[("a", FieldValue::Integer(2)), ("tag", FieldValue::String("y".into()))]),
            record(&[("a", FieldValue::Integer(1))]),
        ]);
        let once = order.apply(StreamData::Window(set)).unwrap().unwrap();
        let twice = order.apply(once.clone()).unwrap().unwrap();
        assert_eq!(once, twice);
        // Stability: equal keys keep their original relative order.
        assert_eq!(
            values_of(&once, "tag"),
            vec![
                None,
                Some(FieldValue::String("x".into())),
                Some(FieldValue::String("y".into()))
            ]
        );
    }

    #[test]
    fn test_single_row_passes_through() {
        let order = OrderProcessor::new(vec![SortField::asc("a")]);
        let data = StreamData::Record(record(&[("a", FieldValue::Integer(1))]));
        assert_eq!(order.apply(data.clone()).unwrap(), Some(data));
    }
}
