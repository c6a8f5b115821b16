//! Compiled query structures consumed from the parser/planner.
//!
//! This module contains the already-type-checked structures the execution
//! engine interprets:
//! - [`Expr`] - the compiled expression tree evaluated against records
//! - [`WindowSpec`] - window kind, length and interval for window operators
//! - [`SortField`] / [`Dimension`] / [`SelectField`] - ORDER BY, GROUP BY
//!   and SELECT clause inputs for the plan operators
//!
//! The SQL grammar itself and the lexer/parser producing these structures
//! are external collaborators; nothing here parses text.

use serde::{Deserialize, Serialize};

/// A literal value embedded in a compiled expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    /// Boolean literal (TRUE/FALSE)
    Boolean(bool),
    /// Integer literal
    Integer(i64),
    /// Floating point literal
    Float(f64),
    /// String literal
    String(String),
}

/// Binary operators recognized by the expression evaluator.
///
/// `Arrow` and `Subset` are the nested-access operators: `->` drills into a
/// map value and `[]` indexes or slices an array value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    /// Logical AND
    And,
    /// Logical OR
    Or,
    /// Bitwise AND (logical AND for booleans)
    BitwiseAnd,
    /// Bitwise OR (logical OR for booleans)
    BitwiseOr,
    /// Bitwise XOR (logical XOR for booleans)
    BitwiseXor,
    /// Equality
    Eq,
    /// Inequality
    NotEq,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// Addition
    Add,
    /// Subtraction
    Subtract,
    /// Multiplication
    Multiply,
    /// Division
    Divide,
    /// Modulo
    Modulo,
    /// `->` keyed drill-down into a nested map
    Arrow,
    /// `[]` index or slice access into an array
    Subset,
}

impl BinaryOperator {
    /// True for the equality and ordering operators.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::Lt
                | BinaryOperator::Lte
                | BinaryOperator::Gt
                | BinaryOperator::Gte
        )
    }
}

/// A compiled expression tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Literal value
    Literal(LiteralValue),
    /// Parenthesized sub-expression
    Paren(Box<Expr>),
    /// Binary expression
    BinaryOp {
        /// Operator
        op: BinaryOperator,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Field reference, optionally qualified by a stream name
    FieldRef {
        /// Stream qualifier (`stream.field`), if any
        stream: Option<String>,
        /// Field name
        name: String,
    },
    /// `*` wildcard reference resolving to the whole message
    Wildcard,
    /// Single index access `[i]`; only meaningful as the right-hand side of
    /// a `Subset` binary expression
    Index(i64),
    /// Range access `[start:end]` (end-exclusive); only meaningful as the
    /// right-hand side of a `Subset` binary expression
    Range {
        /// Start index
        start: i64,
        /// End index (exclusive)
        end: i64,
    },
    /// Scalar or aggregate function call
    Call {
        /// Function name as written in the query
        name: String,
        /// Argument expressions
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Shorthand for an unqualified field reference.
    pub fn field(name: impl Into<String>) -> Expr {
        Expr::FieldRef {
            stream: None,
            name: name.into(),
        }
    }

    /// Shorthand for a stream-qualified field reference.
    pub fn qualified_field(stream: impl Into<String>, name: impl Into<String>) -> Expr {
        Expr::FieldRef {
            stream: Some(stream.into()),
            name: name.into(),
        }
    }

    /// Shorthand for a binary expression.
    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
        Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Shorthand for a function call.
    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Call {
            name: name.into(),
            args,
        }
    }
}

/// Window kinds supported by the window operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowKind {
    /// No windowing; every tuple triggers a scan at its own timestamp
    None,
    /// Fixed-size non-overlapping windows advancing by their full length
    Tumbling,
    /// Fixed-size windows advancing by a smaller interval (overlapping)
    Hopping,
    /// Windows triggered by every incoming tuple, covering the last `length`
    Sliding,
    /// Windows closed by a gap of `interval` without arrivals
    Session,
}

/// Window specification consumed from the planner.
///
/// `interval_ms` defaults to `length_ms` when unset. Immutable for the
/// lifetime of the owning window operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// Window kind
    pub kind: WindowKind,
    /// Window length in milliseconds
    pub length_ms: i64,
    /// Advance/timeout interval in milliseconds; defaults to the length
    pub interval_ms: Option<i64>,
}

impl WindowSpec {
    /// Create a window spec with the interval defaulted to the length.
    pub fn new(kind: WindowKind, length_ms: i64) -> Self {
        WindowSpec {
            kind,
            length_ms,
            interval_ms: None,
        }
    }

    /// Create a window spec with an explicit interval.
    pub fn with_interval(kind: WindowKind, length_ms: i64, interval_ms: i64) -> Self {
        WindowSpec {
            kind,
            length_ms,
            interval_ms: Some(interval_ms),
        }
    }

    /// Effective interval: the configured interval, or the length when unset.
    pub fn interval(&self) -> i64 {
        match self.interval_ms {
            Some(i) if i > 0 => i,
            _ => self.length_ms,
        }
    }
}

/// One ORDER BY field: name plus direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortField {
    /// Field name to sort by
    pub name: String,
    /// Ascending (`true`) or descending (`false`)
    pub ascending: bool,
}

impl SortField {
    /// Ascending sort on `name`.
    pub fn asc(name: impl Into<String>) -> Self {
        SortField {
            name: name.into(),
            ascending: true,
        }
    }

    /// Descending sort on `name`.
    pub fn desc(name: impl Into<String>) -> Self {
        SortField {
            name: name.into(),
            ascending: false,
        }
    }
}

/// One GROUP BY dimension expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Expression evaluated per row to build the group key
    pub expr: Expr,
}

impl Dimension {
    pub fn new(expr: Expr) -> Self {
        Dimension { expr }
    }
}

/// One SELECT clause item: an expression with an optional alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectField {
    /// Expression producing the output value
    pub expr: Expr,
    /// Output column name; derived from the expression when absent
    pub alias: Option<String>,
}

impl SelectField {
    pub fn new(expr: Expr) -> Self {
        SelectField { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        SelectField {
            expr,
            alias: Some(alias.into()),
        }
    }

    /// Output column name: the alias, the referenced field name, the called
    /// function name, or a positional fallback.
    pub fn output_name(&self, position: usize) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match &self.expr {
            Expr::FieldRef { name, .. } => name.clone(),
            Expr::Call { name, .. } => name.clone(),
            _ => format!("col_{}", position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_interval_defaults_to_length() {
        let w = WindowSpec::new(WindowKind::Tumbling, 2000);
        assert_eq!(w.interval(), 2000);
        let w = WindowSpec::with_interval(WindowKind::Hopping, 2000, 500);
        assert_eq!(w.interval(), 500);
    }

    #[test]
    fn test_select_field_output_name() {
        assert_eq!(SelectField::new(Expr::field("temp")).output_name(0), "temp");
        assert_eq!(
            SelectField::aliased(Expr::call("count", vec![Expr::Wildcard]), "n").output_name(1),
            "n"
        );
        assert_eq!(
            SelectField::new(Expr::Literal(LiteralValue::Integer(1))).output_name(2),
            "col_2"
        );
    }

    #[test]
    fn test_comparison_operator_classification() {
        assert!(BinaryOperator::Lte.is_comparison());
        assert!(!BinaryOperator::Add.is_comparison());
        assert!(!BinaryOperator::Arrow.is_comparison());
    }
}
