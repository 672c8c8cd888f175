//! Formula Abstract Syntax Tree types

use gridcalc_core::{CellError, CellRef, RangeRef};

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// Error literal
    Error(CellError),
    /// Omitted function argument, as in `IF(A1,,2)`
    Missing,

    // === References ===
    /// Single cell reference, possibly sheet-qualified
    CellRef(CellRef),
    /// Range reference, possibly sheet-qualified
    RangeRef(RangeRef),
    /// Identifier that is neither a reference nor a function call
    NameRef(String),

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    Function {
        name: String,
        args: Vec<FormulaExpr>,
    },

    // === Array ===
    Array(Vec<Vec<FormulaExpr>>),
}

impl FormulaExpr {
    /// Whether the expression is a bare reference (single cell or range)
    pub fn is_reference(&self) -> bool {
        matches!(self, FormulaExpr::CellRef(_) | FormulaExpr::RangeRef(_))
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Percent,
}
