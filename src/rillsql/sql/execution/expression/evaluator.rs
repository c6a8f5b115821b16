//! The expression interpreter.
//!
//! [`ExpressionEvaluator::eval`] interprets a compiled [`Expr`] against an
//! [`EvalScope`] and always produces a [`FieldValue`]. Type mismatches never
//! raise: following SQL's permissive semantics they resolve to `Null`,
//! `false`, or a documented numeric default, so one malformed field cannot
//! halt a pipeline.
//!
//! Binary evaluation handles three families:
//! - nested access: `->` drills into map values, `[]` indexes/slices arrays
//! - the numeric/boolean/string/timestamp coercion table with explicit
//!   i64/u64/f64 cross-casting rules
//! - null coercion: a one-sided null against a boolean peer becomes `false`
//!
//! In an aggregate scope, call arguments are evaluated once per row of the
//! context and materialized as per-argument lists; scalar functions called
//! there degrade to the first value of each list.

use crate::rillsql::sql::ast::{BinaryOperator, Expr, LiteralValue};
use crate::rillsql::sql::execution::expression::valuer::{
    EvalScope, FunctionResult, MultiValuer, Valuer,
};
use crate::rillsql::sql::execution::types::FieldValue;
use chrono::NaiveDateTime;

/// Stateless interpreter for compiled expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionEvaluator {
    /// When set, division between two integers is evaluated as floating
    /// point division instead of truncating.
    float_division: bool,
}

impl ExpressionEvaluator {
    pub fn new() -> Self {
        ExpressionEvaluator::default()
    }

    /// An evaluator that promotes integer division to floating point.
    pub fn with_float_division() -> Self {
        ExpressionEvaluator {
            float_division: true,
        }
    }

    /// Evaluate `expr` in `scope`.
    pub fn eval(&self, expr: &Expr, scope: &EvalScope<'_>) -> FieldValue {
        match expr {
            Expr::Literal(lit) => match lit {
                LiteralValue::Boolean(b) => FieldValue::Boolean(*b),
                LiteralValue::Integer(i) => FieldValue::Integer(*i),
                LiteralValue::Float(f) => FieldValue::Float(*f),
                LiteralValue::String(s) => FieldValue::String(s.clone()),
            },
            Expr::Paren(inner) => self.eval(inner, scope),
            Expr::BinaryOp { op, left, right } => self.eval_binary(*op, left, right, scope),
            Expr::FieldRef { stream, name } => {
                let value = match stream {
                    Some(stream) => scope.value(&format!("{}.{}", stream, name)),
                    None => scope.value(name),
                };
                value.unwrap_or(FieldValue::Null)
            }
            Expr::Wildcard => FieldValue::Map(scope.all()),
            // Bracket expressions only carry meaning as the right-hand side
            // of a Subset binary expression.
            Expr::Index(_) | Expr::Range { .. } => FieldValue::Null,
            Expr::Call { name, args } => self.eval_call(name, args, scope),
        }
    }

    fn eval_call(&self, name: &str, args: &[Expr], scope: &EvalScope<'_>) -> FieldValue {
        let result = match scope {
            EvalScope::Row(_) => {
                let argv: Vec<FieldValue> = args.iter().map(|a| self.eval(a, scope)).collect();
                scope.dispatch(name, &argv)
            }
            EvalScope::Aggregate(agg) => {
                // Evaluate each argument once per row of the context,
                // producing a per-argument list.
                let rows = agg.rows();
                let functions = agg.functions();
                let argv: Vec<FieldValue> = args
                    .iter()
                    .map(|arg| {
                        let per_row: Vec<FieldValue> = rows
                            .iter()
                            .map(|row| {
                                let row_scope =
                                    EvalScope::Row(MultiValuer::over(row, functions));
                                self.eval(arg, &row_scope)
                            })
                            .collect();
                        FieldValue::Array(per_row)
                    })
                    .collect();
                if functions.is_aggregate(name) {
                    scope.dispatch(name, &argv)
                } else {
                    // Scalar function inside an aggregate context: degrade
                    // to the first value of each per-argument list.
                    let firsts: Vec<FieldValue> = argv
                        .into_iter()
                        .map(|arg| match arg {
                            FieldValue::Array(list) => {
                                list.into_iter().next().unwrap_or(FieldValue::Null)
                            }
                            other => other,
                        })
                        .collect();
                    scope.dispatch(name, &firsts)
                }
            }
        };
        match result {
            FunctionResult::Value(v) => v,
            FunctionResult::NotFound => {
                log::warn!("no function named '{}' is registered", name);
                FieldValue::Null
            }
            FunctionResult::Error(e) => {
                log::warn!("function '{}' failed: {}", name, e);
                FieldValue::Null
            }
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOperator,
        left: &Expr,
        right: &Expr,
        scope: &EvalScope<'_>,
    ) -> FieldValue {
        let lhs = self.eval(left, scope);

        // Nested values take the arrow/subset path before the coercion table.
        match &lhs {
            FieldValue::Map(map) => {
                if op == BinaryOperator::Arrow {
                    return match right {
                        Expr::FieldRef { name, .. } => {
                            map.get(name).cloned().unwrap_or(FieldValue::Null)
                        }
                        _ => {
                            log::debug!("arrow right-hand side is not a field reference");
                            FieldValue::Null
                        }
                    };
                }
                log::debug!("{:?} is not a valid operation on a map value", op);
                return FieldValue::Null;
            }
            FieldValue::Array(items) => {
                if op == BinaryOperator::Subset {
                    return Self::eval_subset(items, right);
                }
                log::debug!("{:?} is not a valid operation on an array value", op);
                return FieldValue::Null;
            }
            _ => {}
        }

        let mut lhs = lhs;
        let mut rhs = self.eval(right, scope);

        // One-sided null against a boolean peer coerces to false.
        if lhs.is_null() && matches!(rhs, FieldValue::Boolean(_)) {
            lhs = FieldValue::Boolean(false);
        } else if rhs.is_null() && matches!(lhs, FieldValue::Boolean(_)) {
            rhs = FieldValue::Boolean(false);
        }

        self.binary_op(lhs, rhs, op)
    }

    /// Index or slice access into an array. Out-of-range access produces
    /// `Null` without raising.
    fn eval_subset(items: &[FieldValue], index_expr: &Expr) -> FieldValue {
        let (start, end) = match index_expr {
            Expr::Index(i) => (*i, *i),
            Expr::Range { start, end } => (*start, *end),
            _ => {
                log::debug!("subset right-hand side is not an index or range");
                return FieldValue::Null;
            }
        };
        if start < 0 || end < 0 {
            return FieldValue::Null;
        }
        let (start, end) = (start as usize, end as usize);
        if start == end {
            // A range whose start equals its end is a single-element index.
            items.get(start).cloned().unwrap_or(FieldValue::Null)
        } else if start < end && end <= items.len() {
            FieldValue::Array(items[start..end].to_vec())
        } else {
            FieldValue::Null
        }
    }

    /// The type-dispatched comparison/arithmetic table over two already
    /// evaluated operands.
    ///
    /// Also used by the order processor to compare sort keys with the same
    /// coercion rules as the rest of the engine.
    pub fn binary_op(&self, lhs: FieldValue, rhs: FieldValue, op: BinaryOperator) -> FieldValue {
        use BinaryOperator::*;
        use FieldValue::*;

        match (&lhs, &rhs) {
            (Boolean(l), _) => {
                let (ok, r) = match &rhs {
                    Boolean(r) => (true, *r),
                    _ => (false, false),
                };
                let l = *l;
                match op {
                    And | BitwiseAnd => return Boolean(ok && (l && r)),
                    Or | BitwiseOr => return Boolean(ok && (l || r)),
                    BitwiseXor | NotEq => return Boolean(ok && (l != r)),
                    Eq => return Boolean(ok && (l == r)),
                    _ => {}
                }
            }
            (Float(l), _) => {
                let r = match &rhs {
                    Float(r) => Some(*r),
                    Integer(r) => Some(*r as f64),
                    Unsigned(r) => Some(*r as f64),
                    _ => None,
                };
                if let Some(result) = self.eval_float(*l, r, op) {
                    return result;
                }
            }
            (Integer(l), Float(r)) => {
                if let Some(result) = self.eval_float(*l as f64, Some(*r), op) {
                    return result;
                }
            }
            (Unsigned(l), Float(r)) => {
                if let Some(result) = self.eval_float(*l as f64, Some(*r), op) {
                    return result;
                }
            }
            (Integer(l), Integer(r)) => {
                if let Some(result) = self.eval_int(*l, *r, op) {
                    return result;
                }
            }
            (Integer(l), Unsigned(r)) => {
                // Signed against unsigned: comparisons account for sign,
                // arithmetic is carried out in the unsigned domain.
                let (l, r) = (*l, *r);
                match op {
                    Lt => return Boolean(l < 0 || (l as u64) < r),
                    Lte => return Boolean(l < 0 || (l as u64) <= r),
                    Gt => return Boolean(l >= 0 && (l as u64) > r),
                    Gte => return Boolean(l >= 0 && (l as u64) >= r),
                    _ => {
                        if let Some(result) = self.eval_uint(l as u64, r, op) {
                            return result;
                        }
                    }
                }
            }
            (Unsigned(l), Integer(r)) => {
                let (l, r) = (*l, *r);
                match op {
                    Lt => return Boolean(r >= 0 && l < r as u64),
                    Lte => return Boolean(r >= 0 && l <= r as u64),
                    Gt => return Boolean(r < 0 || l > r as u64),
                    Gte => return Boolean(r < 0 || l >= r as u64),
                    _ => {
                        if let Some(result) = self.eval_uint(l, r as u64, op) {
                            return result;
                        }
                    }
                }
            }
            (Unsigned(l), Unsigned(r)) => {
                if let Some(result) = self.eval_uint(*l, *r, op) {
                    return result;
                }
            }
            (FieldValue::String(l), _) => {
                if op.is_comparison() {
                    return match &rhs {
                        FieldValue::String(r) => Boolean(compare_ordered(l, r, op)),
                        _ => Boolean(false),
                    };
                }
            }
            (Timestamp(l), _) => {
                let r = match coerce_timestamp(&rhs) {
                    Some(r) => r,
                    // Coercion failure resolves to false for any operator.
                    None => return Boolean(false),
                };
                if op.is_comparison() {
                    return Boolean(compare_ordered(l, &r, op));
                }
            }
            _ => {}
        }

        // The types were not comparable: equality/ordering resolves to
        // false, everything else to null.
        if op.is_comparison() {
            Boolean(false)
        } else {
            Null
        }
    }

    fn eval_float(&self, l: f64, r: Option<f64>, op: BinaryOperator) -> Option<FieldValue> {
        use BinaryOperator::*;
        let ok = r.is_some();
        let r = r.unwrap_or(0.0);
        let result = match op {
            Eq => FieldValue::Boolean(ok && l == r),
            NotEq => FieldValue::Boolean(ok && l != r),
            Lt => FieldValue::Boolean(ok && l < r),
            Lte => FieldValue::Boolean(ok && l <= r),
            Gt => FieldValue::Boolean(ok && l > r),
            Gte => FieldValue::Boolean(ok && l >= r),
            Add if ok => FieldValue::Float(l + r),
            Subtract if ok => FieldValue::Float(l - r),
            Multiply if ok => FieldValue::Float(l * r),
            Divide if ok => {
                if r == 0.0 {
                    FieldValue::Float(0.0)
                } else {
                    FieldValue::Float(l / r)
                }
            }
            Modulo if ok => {
                if r == 0.0 {
                    FieldValue::Float(0.0)
                } else {
                    FieldValue::Float(l % r)
                }
            }
            Add | Subtract | Multiply | Divide | Modulo => FieldValue::Null,
            _ => return None,
        };
        Some(result)
    }

    fn eval_int(&self, l: i64, r: i64, op: BinaryOperator) -> Option<FieldValue> {
        use BinaryOperator::*;
        let result = match op {
            Eq => FieldValue::Boolean(l == r),
            NotEq => FieldValue::Boolean(l != r),
            Lt => FieldValue::Boolean(l < r),
            Lte => FieldValue::Boolean(l <= r),
            Gt => FieldValue::Boolean(l > r),
            Gte => FieldValue::Boolean(l >= r),
            Add => FieldValue::Integer(l.wrapping_add(r)),
            Subtract => FieldValue::Integer(l.wrapping_sub(r)),
            Multiply => FieldValue::Integer(l.wrapping_mul(r)),
            Divide => {
                if self.float_division {
                    if r == 0 {
                        FieldValue::Float(0.0)
                    } else {
                        FieldValue::Float(l as f64 / r as f64)
                    }
                } else if r == 0 {
                    FieldValue::Integer(0)
                } else {
                    FieldValue::Integer(l.wrapping_div(r))
                }
            }
            Modulo => {
                if r == 0 {
                    FieldValue::Integer(0)
                } else {
                    FieldValue::Integer(l.wrapping_rem(r))
                }
            }
            BitwiseAnd => FieldValue::Integer(l & r),
            BitwiseOr => FieldValue::Integer(l | r),
            BitwiseXor => FieldValue::Integer(l ^ r),
            _ => return None,
        };
        Some(result)
    }

    fn eval_uint(&self, l: u64, r: u64, op: BinaryOperator) -> Option<FieldValue> {
        use BinaryOperator::*;
        let result = match op {
            Eq => FieldValue::Boolean(l == r),
            NotEq => FieldValue::Boolean(l != r),
            Lt => FieldValue::Boolean(l < r),
            Lte => FieldValue::Boolean(l <= r),
            Gt => FieldValue::Boolean(l > r),
            Gte => FieldValue::Boolean(l >= r),
            Add => FieldValue::Unsigned(l.wrapping_add(r)),
            Subtract => FieldValue::Unsigned(l.wrapping_sub(r)),
            Multiply => FieldValue::Unsigned(l.wrapping_mul(r)),
            Divide => {
                if r == 0 {
                    FieldValue::Unsigned(0)
                } else {
                    FieldValue::Unsigned(l / r)
                }
            }
            Modulo => {
                if r == 0 {
                    FieldValue::Unsigned(0)
                } else {
                    FieldValue::Unsigned(l % r)
                }
            }
            BitwiseAnd => FieldValue::Unsigned(l & r),
            BitwiseOr => FieldValue::Unsigned(l | r),
            BitwiseXor => FieldValue::Unsigned(l ^ r),
            _ => return None,
        };
        Some(result)
    }
}

fn compare_ordered<T: PartialOrd>(l: &T, r: &T, op: BinaryOperator) -> bool {
    match op {
        BinaryOperator::Eq => l == r,
        BinaryOperator::NotEq => l != r,
        BinaryOperator::Lt => l < r,
        BinaryOperator::Lte => l <= r,
        BinaryOperator::Gt => l > r,
        BinaryOperator::Gte => l >= r,
        _ => false,
    }
}

/// Coerce the right-hand side of a timestamp comparison: timestamps pass
/// through, integers are read as epoch milliseconds, strings are parsed.
fn coerce_timestamp(value: &FieldValue) -> Option<NaiveDateTime> {
    match value {
        FieldValue::Timestamp(t) => Some(*t),
        FieldValue::Integer(ms) => {
            chrono::DateTime::from_timestamp_millis(*ms).map(|dt| dt.naive_utc())
        }
        FieldValue::String(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
            .ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rillsql::sql::ast::BinaryOperator as Op;
    use crate::rillsql::sql::execution::expression::functions::FunctionRegistry;
    use crate::rillsql::sql::execution::types::{StreamRecord, WindowBatchSet};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn record(fields: &[(&str, FieldValue)]) -> StreamRecord {
        let message = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        StreamRecord::new("demo", message, 0)
    }

    fn eval_with(record: &StreamRecord, expr: &Expr) -> FieldValue {
        let registry = FunctionRegistry::new();
        let scope = EvalScope::row(record, &registry);
        ExpressionEvaluator::new().eval(expr, &scope)
    }

    fn int(i: i64) -> Expr {
        Expr::Literal(LiteralValue::Integer(i))
    }

    fn float(f: f64) -> Expr {
        Expr::Literal(LiteralValue::Float(f))
    }

    #[test]
    fn test_integer_arithmetic_matches_widened_sql_semantics() {
        let r = record(&[]);
        let cases = [
            (Op::Add, 7, 3, 10),
            (Op::Subtract, 7, 3, 4),
            (Op::Multiply, 7, 3, 21),
            (Op::Divide, 7, 3, 2), // truncating
            (Op::Modulo, 7, 3, 1),
        ];
        for (op, l, rv, expected) in cases {
            assert_eq!(
                eval_with(&r, &Expr::binary(int(l), op, int(rv))),
                FieldValue::Integer(expected),
                "{:?}",
                op
            );
        }
    }

    #[test]
    fn test_mixed_numeric_operands_widen_to_float() {
        let r = record(&[]);
        assert_eq!(
            eval_with(&r, &Expr::binary(int(7), Op::Add, float(0.5))),
            FieldValue::Float(7.5)
        );
        assert_eq!(
            eval_with(&r, &Expr::binary(float(7.5), Op::Subtract, int(7))),
            FieldValue::Float(0.5)
        );
        assert_eq!(
            eval_with(&r, &Expr::binary(float(1.0), Op::Lt, int(2))),
            FieldValue::Boolean(true)
        );
    }

    #[test]
    fn test_division_by_zero_yields_zero_value_of_result_type() {
        let r = record(&[]);
        assert_eq!(
            eval_with(&r, &Expr::binary(int(7), Op::Divide, int(0))),
            FieldValue::Integer(0)
        );
        assert_eq!(
            eval_with(&r, &Expr::binary(int(7), Op::Modulo, int(0))),
            FieldValue::Integer(0)
        );
        assert_eq!(
            eval_with(&r, &Expr::binary(float(7.0), Op::Divide, float(0.0))),
            FieldValue::Float(0.0)
        );
    }

    #[test]
    fn test_float_division_mode_promotes_integer_division() {
        let registry = FunctionRegistry::new();
        let rec = record(&[]);
        let scope = EvalScope::row(&rec, &registry);
        let e = ExpressionEvaluator::with_float_division();
        assert_eq!(
            e.eval(&Expr::binary(int(7), Op::Divide, int(2)), &scope),
            FieldValue::Float(3.5)
        );
        assert_eq!(
            e.eval(&Expr::binary(int(7), Op::Divide, int(0)), &scope),
            FieldValue::Float(0.0)
        );
    }

    #[test]
    fn test_signed_unsigned_comparisons_account_for_sign() {
        let e = ExpressionEvaluator::new();
        assert_eq!(
            e.binary_op(FieldValue::Integer(-1), FieldValue::Unsigned(1), Op::Lt),
            FieldValue::Boolean(true)
        );
        assert_eq!(
            e.binary_op(FieldValue::Unsigned(1), FieldValue::Integer(-1), Op::Gt),
            FieldValue::Boolean(true)
        );
        assert_eq!(
            e.binary_op(FieldValue::Unsigned(2), FieldValue::Integer(3), Op::Lt),
            FieldValue::Boolean(true)
        );
    }

    #[test]
    fn test_boolean_operators_and_null_coercion() {
        let r = record(&[("flag", FieldValue::Boolean(true))]);
        let t = Expr::Literal(LiteralValue::Boolean(true));
        let f = Expr::Literal(LiteralValue::Boolean(false));
        assert_eq!(
            eval_with(&r, &Expr::binary(t.clone(), Op::And, f.clone())),
            FieldValue::Boolean(false)
        );
        assert_eq!(
            eval_with(&r, &Expr::binary(t.clone(), Op::Or, f.clone())),
            FieldValue::Boolean(true)
        );
        // Missing field evaluates to null, which coerces to false against a
        // boolean peer.
        assert_eq!(
            eval_with(&r, &Expr::binary(Expr::field("missing"), Op::Or, t.clone())),
            FieldValue::Boolean(true)
        );
        assert_eq!(
            eval_with(&r, &Expr::binary(Expr::field("missing"), Op::And, t.clone())),
            FieldValue::Boolean(false)
        );
        // Ordering on booleans is not comparable.
        assert_eq!(
            eval_with(&r, &Expr::binary(t, Op::Lt, f)),
            FieldValue::Boolean(false)
        );
    }

    #[test]
    fn test_non_comparable_types() {
        let r = record(&[]);
        let s = Expr::Literal(LiteralValue::String("abc".into()));
        // Equality/ordering on mismatched types resolves to false.
        assert_eq!(
            eval_with(&r, &Expr::binary(s.clone(), Op::Eq, int(1))),
            FieldValue::Boolean(false)
        );
        // Other operators resolve to null.
        assert_eq!(
            eval_with(&r, &Expr::binary(s, Op::Add, int(1))),
            FieldValue::Null
        );
        assert_eq!(
            eval_with(&r, &Expr::binary(Expr::field("missing"), Op::Add, int(1))),
            FieldValue::Null
        );
    }

    #[test]
    fn test_string_comparison() {
        let r = record(&[]);
        let a = Expr::Literal(LiteralValue::String("apple".into()));
        let b = Expr::Literal(LiteralValue::String("banana".into()));
        assert_eq!(
            eval_with(&r, &Expr::binary(a.clone(), Op::Lt, b.clone())),
            FieldValue::Boolean(true)
        );
        assert_eq!(
            eval_with(&r, &Expr::binary(a, Op::Eq, b)),
            FieldValue::Boolean(false)
        );
    }

    #[test]
    fn test_timestamp_comparison_with_coercion() {
        let e = ExpressionEvaluator::new();
        let ts = chrono::DateTime::from_timestamp_millis(1_000_000)
            .unwrap()
            .naive_utc();
        assert_eq!(
            e.binary_op(
                FieldValue::Timestamp(ts),
                FieldValue::Integer(2_000_000),
                Op::Lt
            ),
            FieldValue::Boolean(true)
        );
        assert_eq!(
            e.binary_op(
                FieldValue::Timestamp(ts),
                FieldValue::Integer(1_000_000),
                Op::Eq
            ),
            FieldValue::Boolean(true)
        );
        // Coercion failure resolves to false.
        assert_eq!(
            e.binary_op(
                FieldValue::Timestamp(ts),
                FieldValue::String("not a time".into()),
                Op::Lt
            ),
            FieldValue::Boolean(false)
        );
    }

    #[test]
    fn test_arrow_drills_into_nested_map() {
        let mut nested = HashMap::new();
        nested.insert("zone".to_string(), FieldValue::String("east".into()));
        let r = record(&[("meta", FieldValue::Map(nested))]);
        let expr = Expr::binary(Expr::field("meta"), Op::Arrow, Expr::field("zone"));
        assert_eq!(eval_with(&r, &expr), FieldValue::String("east".into()));
        let missing = Expr::binary(Expr::field("meta"), Op::Arrow, Expr::field("nope"));
        assert_eq!(eval_with(&r, &missing), FieldValue::Null);
    }

    #[test]
    fn test_subset_index_and_slice() {
        let r = record(&[(
            "xs",
            FieldValue::Array(vec![
                FieldValue::Integer(10),
                FieldValue::Integer(20),
                FieldValue::Integer(30),
            ]),
        )]);
        let index = Expr::binary(Expr::field("xs"), Op::Subset, Expr::Index(1));
        assert_eq!(eval_with(&r, &index), FieldValue::Integer(20));
        // A range with start == end is a single-element index.
        let point = Expr::binary(
            Expr::field("xs"),
            Op::Subset,
            Expr::Range { start: 2, end: 2 },
        );
        assert_eq!(eval_with(&r, &point), FieldValue::Integer(30));
        let slice = Expr::binary(
            Expr::field("xs"),
            Op::Subset,
            Expr::Range { start: 0, end: 2 },
        );
        assert_eq!(
            eval_with(&r, &slice),
            FieldValue::Array(vec![FieldValue::Integer(10), FieldValue::Integer(20)])
        );
        // Out of range produces null, never a panic.
        let oob = Expr::binary(Expr::field("xs"), Op::Subset, Expr::Index(9));
        assert_eq!(eval_with(&r, &oob), FieldValue::Null);
    }

    #[test]
    fn test_field_ref_and_wildcard() {
        let r = record(&[("a", FieldValue::Integer(1))]);
        assert_eq!(eval_with(&r, &Expr::field("a")), FieldValue::Integer(1));
        assert_eq!(
            eval_with(&r, &Expr::qualified_field("demo", "a")),
            FieldValue::Integer(1)
        );
        match eval_with(&r, &Expr::Wildcard) {
            FieldValue::Map(m) => assert_eq!(m.get("a"), Some(&FieldValue::Integer(1))),
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_aggregate_scope_evaluates_arguments_per_row() {
        let registry = FunctionRegistry::new();
        let mut set = WindowBatchSet::new();
        for v in [1, 2, 3] {
            set.add_record(Arc::new(record(&[("a", FieldValue::Integer(v))])));
        }
        let first = set.batches[0].records[0].clone();
        let row = crate::rillsql::sql::execution::types::DataRow::Record(first);
        let scope = EvalScope::aggregate(&row, &set, &registry);
        let e = ExpressionEvaluator::new();
        assert_eq!(
            e.eval(&Expr::call("sum", vec![Expr::field("a")]), &scope),
            FieldValue::Integer(6)
        );
        assert_eq!(
            e.eval(&Expr::call("count", vec![Expr::field("a")]), &scope),
            FieldValue::Integer(3)
        );
        assert_eq!(
            e.eval(&Expr::call("avg", vec![Expr::field("a")]), &scope),
            FieldValue::Integer(2)
        );
        assert_eq!(
            e.eval(&Expr::call("max", vec![Expr::field("a")]), &scope),
            FieldValue::Integer(3)
        );
        assert_eq!(
            e.eval(&Expr::call("min", vec![Expr::field("a")]), &scope),
            FieldValue::Integer(1)
        );
    }

    #[test]
    fn test_scalar_function_in_aggregate_scope_takes_first_value() {
        let registry = FunctionRegistry::new();
        let mut set = WindowBatchSet::new();
        for s in ["first", "second"] {
            set.add_record(Arc::new(record(&[("name", FieldValue::String(s.into()))])));
        }
        let first = set.batches[0].records[0].clone();
        let row = crate::rillsql::sql::execution::types::DataRow::Record(first);
        let scope = EvalScope::aggregate(&row, &set, &registry);
        let e = ExpressionEvaluator::new();
        assert_eq!(
            e.eval(&Expr::call("upper", vec![Expr::field("name")]), &scope),
            FieldValue::String("FIRST".into())
        );
    }
}
