//! Formula evaluator
//!
//! Walks a [`FormulaExpr`] tree and produces a [`FormulaValue`]. Cell reads go
//! through a [`CellResolver`], so the same evaluator serves plain expressions,
//! single sheets and whole workbooks.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::{FunctionImpl, FunctionRegistry};
use crate::parser::parse_formula;
use gridcalc_core::number_format::format_general;
use gridcalc_core::{CellError, CellRef, CellValue, EngineOptions, RangeRef};
use std::cmp::Ordering;
use std::fmt;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FormulaValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
    Array(Vec<Vec<FormulaValue>>),
    #[default]
    Empty,
}

impl FormulaValue {
    /// Convert to number, if possible
    ///
    /// Booleans count as 1/0, empty as 0, and text when it reads as a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            FormulaValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            FormulaValue::String(s) => s.trim().parse().ok(),
            FormulaValue::Empty => Some(0.0),
            FormulaValue::Array(rows) => match rows.as_slice() {
                [row] if row.len() == 1 => row[0].as_number(),
                _ => None,
            },
            FormulaValue::Error(_) => None,
        }
    }

    /// Force conversion to number
    pub fn to_number(&self) -> FormulaResult<f64> {
        self.as_number()
            .ok_or_else(|| FormulaError::Evaluation(format!("Cannot convert {:?} to number", self)))
    }

    /// Convert to boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FormulaValue::Boolean(b) => Some(*b),
            FormulaValue::Number(n) => Some(*n != 0.0),
            FormulaValue::Empty => Some(false),
            FormulaValue::String(s) => {
                if s.eq_ignore_ascii_case("TRUE") {
                    Some(true)
                } else if s.eq_ignore_ascii_case("FALSE") {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Convert to display text
    pub fn as_string(&self) -> String {
        match self {
            FormulaValue::Number(n) => format_general(*n),
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Boolean(true) => "TRUE".to_string(),
            FormulaValue::Boolean(false) => "FALSE".to_string(),
            FormulaValue::Error(e) => e.to_string(),
            FormulaValue::Empty => String::new(),
            FormulaValue::Array(rows) => match rows.first().and_then(|r| r.first()) {
                Some(first) => first.as_string(),
                None => String::new(),
            },
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, FormulaValue::Error(_))
    }

    /// Get the error if this is one
    pub fn get_error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Whether this is a blank
    pub fn is_empty(&self) -> bool {
        matches!(self, FormulaValue::Empty)
    }
}

impl fmt::Display for FormulaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl From<CellValue> for FormulaValue {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Empty => FormulaValue::Empty,
            CellValue::Number(n) => FormulaValue::Number(n),
            CellValue::Text(s) => FormulaValue::String(s),
            CellValue::Boolean(b) => FormulaValue::Boolean(b),
        }
    }
}

impl From<&CellValue> for FormulaValue {
    fn from(value: &CellValue) -> Self {
        value.clone().into()
    }
}

impl From<f64> for FormulaValue {
    fn from(n: f64) -> Self {
        FormulaValue::Number(n)
    }
}

impl From<&str> for FormulaValue {
    fn from(s: &str) -> Self {
        FormulaValue::String(s.to_string())
    }
}

impl From<bool> for FormulaValue {
    fn from(b: bool) -> Self {
        FormulaValue::Boolean(b)
    }
}

impl From<CellError> for FormulaValue {
    fn from(e: CellError) -> Self {
        FormulaValue::Error(e)
    }
}

/// Source of cell values for reference evaluation
///
/// The calculator implements this to evaluate dependencies on demand.
pub trait CellResolver {
    /// Value of one cell. Cells outside the data read as [`FormulaValue::Empty`].
    fn cell_value(&self, cell: &CellRef) -> FormulaResult<FormulaValue>;

    /// Rows and columns holding data on `sheet` (`None` is the current sheet)
    ///
    /// `None` when unknown; every cell of a range is then read.
    fn used_extent(&self, _sheet: Option<&str>) -> Option<(u32, u32)> {
        None
    }

    /// Values of a range in row-major order, one inner `Vec` per row
    ///
    /// Cells past the used extent are blank without being read.
    fn range_grid(&self, range: &RangeRef) -> FormulaResult<Vec<Vec<FormulaValue>>> {
        let sheet = range.sheet().map(str::to_string);
        let (used_rows, used_cols) = self
            .used_extent(range.sheet())
            .unwrap_or((u32::MAX, u32::MAX));

        let mut rows = Vec::with_capacity(range.row_count() as usize);
        for row in range.top()..=range.bottom() {
            let mut values = Vec::with_capacity(range.col_count() as usize);
            for col in range.left()..=range.right() {
                if row >= used_rows || col >= used_cols {
                    values.push(FormulaValue::Empty);
                    continue;
                }
                let cell = CellRef {
                    sheet: sheet.clone(),
                    ..CellRef::new(row, col)
                };
                values.push(self.cell_value(&cell)?);
            }
            rows.push(values);
        }
        Ok(rows)
    }

    /// The part of a range that overlaps the used extent
    ///
    /// The grid loses the range's shape, so only callers that skip blanks
    /// may use it.
    fn used_range_grid(&self, range: &RangeRef) -> FormulaResult<Vec<Vec<FormulaValue>>> {
        let Some((used_rows, used_cols)) = self.used_extent(range.sheet()) else {
            return self.range_grid(range);
        };
        if used_rows == 0 || used_cols == 0 {
            return Ok(Vec::new());
        }

        let bottom = range.bottom().min(used_rows - 1);
        let right = range.right().min(used_cols - 1);
        if range.top() > bottom || range.left() > right {
            return Ok(Vec::new());
        }

        let mut start = CellRef::new(range.top(), range.left());
        start.sheet = range.sheet().map(str::to_string);
        let mut end = CellRef::new(bottom, right);
        end.sheet = start.sheet.clone();
        self.range_grid(&RangeRef::new(start, end))
    }
}

/// Context for formula evaluation
///
/// Handed to every function implementation, so functions can read cells and
/// ranges and evaluate their own argument expressions.
#[derive(Clone, Copy)]
pub struct EvaluationContext<'a> {
    registry: &'a FunctionRegistry,
    resolver: Option<&'a dyn CellResolver>,
    options: EngineOptions,
}

impl<'a> EvaluationContext<'a> {
    /// Create a context without cell access; every reference reads as empty
    pub fn new(registry: &'a FunctionRegistry) -> Self {
        Self {
            registry,
            resolver: None,
            options: EngineOptions::default(),
        }
    }

    /// Read cells through `resolver`
    pub fn with_resolver(mut self, resolver: &'a dyn CellResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &'a FunctionRegistry {
        self.registry
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Value of a single cell
    pub fn cell_value(&self, cell: &CellRef) -> FormulaResult<FormulaValue> {
        match self.resolver {
            Some(resolver) => resolver.cell_value(cell),
            None => Ok(FormulaValue::Empty),
        }
    }

    /// Values of a range as rows
    pub fn range_grid(&self, range: &RangeRef) -> FormulaResult<Vec<Vec<FormulaValue>>> {
        match self.resolver {
            Some(resolver) => resolver.range_grid(range),
            None => Ok(vec![
                vec![FormulaValue::Empty; range.col_count() as usize];
                range.row_count() as usize
            ]),
        }
    }

    /// Values of the part of a range that holds data
    ///
    /// See [`CellResolver::used_range_grid`].
    pub fn used_range_grid(&self, range: &RangeRef) -> FormulaResult<Vec<Vec<FormulaValue>>> {
        match self.resolver {
            Some(resolver) => resolver.used_range_grid(range),
            None => Ok(Vec::new()),
        }
    }

    /// Values of a range flattened in row-major order
    pub fn range_raw_values(&self, range: &RangeRef) -> FormulaResult<Vec<FormulaValue>> {
        Ok(self.range_grid(range)?.into_iter().flatten().collect())
    }

    /// Numeric values of a range; everything else is skipped
    pub fn range_values(&self, range: &RangeRef) -> FormulaResult<Vec<f64>> {
        Ok(self
            .range_raw_values(range)?
            .into_iter()
            .filter_map(|v| match v {
                FormulaValue::Number(n) => Some(n),
                _ => None,
            })
            .collect())
    }

    /// Evaluate a sub-expression in this context
    pub fn evaluate(&self, expr: &FormulaExpr) -> FormulaResult<FormulaValue> {
        evaluate(expr, self)
    }

    /// Parse and evaluate formula text (with or without the leading `=`)
    pub fn evaluate_formula(&self, formula: &str) -> FormulaResult<FormulaValue> {
        let ast = parse_formula(formula)?;
        evaluate(&ast, self)
    }
}

impl fmt::Debug for EvaluationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("resolver", &self.resolver.is_some())
            .field("options", &self.options)
            .finish()
    }
}

/// Evaluate a formula expression
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match expr {
        // === Literals ===
        FormulaExpr::Number(n) => Ok(FormulaValue::Number(*n)),
        FormulaExpr::String(s) => Ok(FormulaValue::String(s.clone())),
        FormulaExpr::Boolean(b) => Ok(FormulaValue::Boolean(*b)),
        FormulaExpr::Error(e) => Ok(FormulaValue::Error(*e)),
        FormulaExpr::Missing => Ok(FormulaValue::Empty),

        // === References ===
        FormulaExpr::CellRef(cell) => ctx.cell_value(cell),
        FormulaExpr::RangeRef(range) => Ok(FormulaValue::Array(ctx.range_grid(range)?)),
        FormulaExpr::NameRef(name) => Err(FormulaError::UnknownName(name.clone())),

        // === Operators ===
        FormulaExpr::BinaryOp { op, left, right } => evaluate_binary_op(*op, left, right, ctx),
        FormulaExpr::UnaryOp { op, operand } => evaluate_unary_op(*op, operand, ctx),

        // === Functions ===
        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx),

        // === Arrays ===
        FormulaExpr::Array(rows) => {
            let mut result_rows = Vec::with_capacity(rows.len());
            for row in rows {
                let mut result_row = Vec::with_capacity(row.len());
                for expr in row {
                    result_row.push(evaluate(expr, ctx)?);
                }
                result_rows.push(result_row);
            }
            Ok(FormulaValue::Array(result_rows))
        }
    }
}

/// Reduce a single-cell array to its value; larger arrays stay as they are
fn scalar(value: FormulaValue) -> FormulaValue {
    match value {
        FormulaValue::Array(mut rows) if rows.len() == 1 && rows[0].len() == 1 => {
            rows[0].pop().unwrap_or_default()
        }
        other => other,
    }
}

fn operand_number(value: &FormulaValue) -> Result<f64, CellError> {
    match value {
        FormulaValue::Error(e) => Err(*e),
        other => other.as_number().ok_or(CellError::Value),
    }
}

fn finite(n: f64) -> FormulaValue {
    if n.is_finite() {
        FormulaValue::Number(n)
    } else {
        FormulaValue::Error(CellError::Num)
    }
}

/// Evaluate a binary operation
///
/// Left operands of a chain like `A1+A2+...+An` are nested down the left
/// side of the tree. The chain is walked with a loop and folded bottom-up,
/// so its length costs no stack.
fn evaluate_binary_op(
    op: BinaryOperator,
    left: &FormulaExpr,
    right: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let mut chain = vec![(op, right)];
    let mut innermost = left;
    while let FormulaExpr::BinaryOp { op, left, right } = innermost {
        chain.push((*op, right.as_ref()));
        innermost = left.as_ref();
    }

    let mut acc = evaluate(innermost, ctx)?;
    for (op, right) in chain.into_iter().rev() {
        let right_val = evaluate(right, ctx)?;
        acc = apply_binary_op(op, acc, right_val);
    }
    Ok(acc)
}

fn apply_binary_op(
    op: BinaryOperator,
    left_val: FormulaValue,
    right_val: FormulaValue,
) -> FormulaValue {
    let left_val = scalar(left_val);
    let right_val = scalar(right_val);

    // Propagate errors, left first
    if let Some(e) = left_val.get_error() {
        return FormulaValue::Error(e);
    }
    if let Some(e) = right_val.get_error() {
        return FormulaValue::Error(e);
    }
    if matches!(left_val, FormulaValue::Array(_)) || matches!(right_val, FormulaValue::Array(_)) {
        return FormulaValue::Error(CellError::Value);
    }

    let arithmetic = |f: fn(f64, f64) -> FormulaValue| -> FormulaValue {
        match (operand_number(&left_val), operand_number(&right_val)) {
            (Ok(l), Ok(r)) => f(l, r),
            (Err(e), _) | (_, Err(e)) => FormulaValue::Error(e),
        }
    };

    match op {
        BinaryOperator::Add => arithmetic(|l, r| finite(l + r)),
        BinaryOperator::Subtract => arithmetic(|l, r| finite(l - r)),
        BinaryOperator::Multiply => arithmetic(|l, r| finite(l * r)),
        BinaryOperator::Divide => arithmetic(|l, r| {
            if r == 0.0 {
                FormulaValue::Error(CellError::Div0)
            } else {
                finite(l / r)
            }
        }),
        BinaryOperator::Power => arithmetic(|l, r| {
            if l == 0.0 && r < 0.0 {
                FormulaValue::Error(CellError::Div0)
            } else {
                finite(l.powf(r))
            }
        }),

        BinaryOperator::Equal => compare(&left_val, &right_val, Ordering::is_eq),
        BinaryOperator::NotEqual => compare(&left_val, &right_val, Ordering::is_ne),
        BinaryOperator::LessThan => compare(&left_val, &right_val, Ordering::is_lt),
        BinaryOperator::LessEqual => compare(&left_val, &right_val, Ordering::is_le),
        BinaryOperator::GreaterThan => compare(&left_val, &right_val, Ordering::is_gt),
        BinaryOperator::GreaterEqual => compare(&left_val, &right_val, Ordering::is_ge),

        BinaryOperator::Concat => {
            FormulaValue::String(left_val.as_string() + &right_val.as_string())
        }
    }
}

fn compare(left: &FormulaValue, right: &FormulaValue, test: fn(Ordering) -> bool) -> FormulaValue {
    FormulaValue::Boolean(test(compare_values(left, right)))
}

/// Spreadsheet ordering of two scalar values
///
/// Blank compares as 0 against numbers and as "" against text. Text compares
/// case-insensitively. Across types: number < text < boolean.
pub fn compare_values(left: &FormulaValue, right: &FormulaValue) -> Ordering {
    use FormulaValue::*;

    match (left, right) {
        (Empty, Empty) => Ordering::Equal,
        (Empty, String(s)) => "".cmp(s.as_str()),
        (String(s), Empty) => s.as_str().cmp(""),
        (Empty, Boolean(b)) => false.cmp(b),
        (Boolean(b), Empty) => b.cmp(&false),
        (Empty, _) => compare_values(&Number(0.0), right),
        (_, Empty) => compare_values(left, &Number(0.0)),

        (Number(l), Number(r)) => l.partial_cmp(r).unwrap_or(Ordering::Equal),
        (String(l), String(r)) => l.to_lowercase().cmp(&r.to_lowercase()),
        (Boolean(l), Boolean(r)) => l.cmp(r),

        (Number(_), String(_) | Boolean(_)) => Ordering::Less,
        (String(_) | Boolean(_), Number(_)) => Ordering::Greater,
        (String(_), Boolean(_)) => Ordering::Less,
        (Boolean(_), String(_)) => Ordering::Greater,

        (Error(l), Error(r)) => l.as_str().cmp(r.as_str()),
        (Error(_), _) => Ordering::Greater,
        (_, Error(_)) => Ordering::Less,

        (Array(_), _) | (_, Array(_)) => Ordering::Equal,
    }
}

fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let val = scalar(evaluate(operand, ctx)?);

    if matches!(val, FormulaValue::Array(_)) {
        return Ok(FormulaValue::Error(CellError::Value));
    }

    let n = match operand_number(&val) {
        Ok(n) => n,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };

    Ok(match op {
        UnaryOperator::Negate => FormulaValue::Number(-n),
        UnaryOperator::Percent => FormulaValue::Number(n / 100.0),
    })
}

fn evaluate_function(
    name: &str,
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let func = ctx
        .registry()
        .get(name)
        .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

    if args.len() < func.min_args {
        return Err(FormulaError::ArgumentCount {
            function: func.name.to_string(),
            expected: format!("at least {}", func.min_args),
            actual: args.len(),
        });
    }

    if let Some(max) = func.max_args {
        if args.len() > max {
            return Err(FormulaError::ArgumentCount {
                function: func.name.to_string(),
                expected: format!("at most {}", max),
                actual: args.len(),
            });
        }
    }

    match func.implementation {
        FunctionImpl::Eager(f) => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                let value = match arg {
                    FormulaExpr::RangeRef(range) if func.ignores_blanks => {
                        FormulaValue::Array(ctx.used_range_grid(range)?)
                    }
                    other => evaluate(other, ctx)?,
                };
                evaluated.push(value);
            }
            f(&evaluated, ctx)
        }
        FunctionImpl::Lazy(f) => f(args, ctx),
    }
}
