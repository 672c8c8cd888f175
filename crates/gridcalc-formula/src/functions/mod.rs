//! Built-in spreadsheet functions

pub mod criteria;
pub mod date;
pub mod financial;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod statistical;
pub mod text;

use crate::ast::FormulaExpr;
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use ahash::AHashMap;
use gridcalc_core::CellError;
use std::fmt;

/// Implementation that receives evaluated arguments
///
/// Range arguments arrive as [`FormulaValue::Array`] grids.
pub type EagerFn = fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue>;

/// Implementation that receives argument expressions and evaluates only what it needs
pub type LazyFn = fn(&[FormulaExpr], &EvaluationContext) -> FormulaResult<FormulaValue>;

/// Function implementation
#[derive(Clone, Copy)]
pub enum FunctionImpl {
    Eager(EagerFn),
    Lazy(LazyFn),
}

/// Grouping used for registration order and listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCategory {
    Statistical,
    Math,
    Logical,
    Text,
    Lookup,
    Financial,
    Date,
}

/// Function definition
#[derive(Clone)]
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
    pub category: FunctionCategory,
    /// Range arguments are read only as far as the sheet holds data
    pub ignores_blanks: bool,
}

impl FunctionDef {
    pub fn eager(
        name: &'static str,
        category: FunctionCategory,
        min_args: usize,
        max_args: Option<usize>,
        implementation: EagerFn,
    ) -> Self {
        Self {
            name,
            min_args,
            max_args,
            implementation: FunctionImpl::Eager(implementation),
            category,
            ignores_blanks: false,
        }
    }

    pub fn lazy(
        name: &'static str,
        category: FunctionCategory,
        min_args: usize,
        max_args: Option<usize>,
        implementation: LazyFn,
    ) -> Self {
        Self {
            name,
            min_args,
            max_args,
            implementation: FunctionImpl::Lazy(implementation),
            category,
            ignores_blanks: false,
        }
    }

    /// Clip range arguments to the cells the sheet actually holds
    ///
    /// Only for implementations where a blank cell and an absent one give
    /// the same answer: aggregates such as SUM or COUNTA, never COUNTBLANK,
    /// ROWS or anything indexing into a range.
    pub fn ignoring_blanks(mut self) -> Self {
        self.ignores_blanks = true;
        self
    }

    /// Whether arguments are handed over unevaluated
    pub fn is_lazy(&self) -> bool {
        matches!(self.implementation, FunctionImpl::Lazy(_))
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("lazy", &self.is_lazy())
            .field("category", &self.category)
            .field("ignores_blanks", &self.ignores_blanks)
            .finish()
    }
}

/// Function registry
///
/// Owned by whoever evaluates formulas and passed to the evaluator through
/// [`EvaluationContext`].
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self::empty();

        statistical::register(&mut registry);
        math::register(&mut registry);
        logical::register(&mut registry);
        text::register(&mut registry);
        lookup::register(&mut registry);
        financial::register(&mut registry);
        date::register(&mut registry);

        registry
    }

    /// A registry with no functions
    pub fn empty() -> Self {
        Self {
            functions: AHashMap::new(),
        }
    }

    /// Look up a function by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Register a function, replacing any existing one with the same name
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Names in one category, sorted
    pub fn names_in(&self, category: FunctionCategory) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .functions
            .iter()
            .filter(|(_, def)| def.category == category)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// === Argument helpers shared by the categories ===

/// A spreadsheet error value short-circuits a computation
pub(crate) type ValueResult<T> = Result<T, CellError>;

/// Run a computation that fails with an error value rather than an `Err`
pub(crate) fn lift(f: impl FnOnce() -> ValueResult<FormulaValue>) -> FormulaResult<FormulaValue> {
    Ok(f().unwrap_or_else(FormulaValue::Error))
}

/// Numeric value of an argument
pub(crate) fn number(value: &FormulaValue) -> ValueResult<f64> {
    match value {
        FormulaValue::Number(n) => Ok(*n),
        FormulaValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        FormulaValue::Empty => Ok(0.0),
        FormulaValue::String(s) => s.trim().parse().map_err(|_| CellError::Value),
        FormulaValue::Error(e) => Err(*e),
        FormulaValue::Array(rows) => match rows.as_slice() {
            [row] if row.len() == 1 => number(&row[0]),
            _ => Err(CellError::Value),
        },
    }
}

pub(crate) fn number_arg(args: &[FormulaValue], index: usize) -> ValueResult<f64> {
    args.get(index).map_or(Err(CellError::Value), number)
}

/// Optional numeric argument; missing or blank gives `default`
pub(crate) fn opt_number(args: &[FormulaValue], index: usize, default: f64) -> ValueResult<f64> {
    match args.get(index) {
        None | Some(FormulaValue::Empty) => Ok(default),
        Some(value) => number(value),
    }
}

/// Text value of an argument
pub(crate) fn text(value: &FormulaValue) -> ValueResult<String> {
    match value {
        FormulaValue::Error(e) => Err(*e),
        FormulaValue::Array(rows) => match rows.as_slice() {
            [row] if row.len() == 1 => text(&row[0]),
            _ => Err(CellError::Value),
        },
        other => Ok(other.as_string()),
    }
}

pub(crate) fn text_arg(args: &[FormulaValue], index: usize) -> ValueResult<String> {
    args.get(index).map_or(Err(CellError::Value), text)
}

/// Truthiness of a condition
///
/// `0`, `"0"`, `FALSE`, `""` and blank are false; any other text is true,
/// including `"FALSE"` and `"0.0"`.
pub(crate) fn truthy(value: &FormulaValue) -> ValueResult<bool> {
    match value {
        FormulaValue::Boolean(b) => Ok(*b),
        FormulaValue::Number(n) => Ok(*n != 0.0),
        FormulaValue::Empty => Ok(false),
        FormulaValue::String(s) => Ok(!(s.is_empty() || s == "0")),
        FormulaValue::Error(e) => Err(*e),
        FormulaValue::Array(rows) => match rows.as_slice() {
            [row] if row.len() == 1 => truthy(&row[0]),
            _ => Err(CellError::Value),
        },
    }
}

/// Every scalar in the arguments, with arrays flattened row by row
pub(crate) fn flatten(args: &[FormulaValue]) -> impl Iterator<Item = &FormulaValue> {
    args.iter().flat_map(|arg| {
        let (rows, single) = match arg {
            FormulaValue::Array(rows) => (Some(rows), None),
            other => (None, Some(other)),
        };
        rows.into_iter().flatten().flatten().chain(single)
    })
}

/// Numbers for aggregate functions
///
/// Inside ranges and arrays only real numbers count. Direct arguments also
/// accept booleans and numeric text. Errors propagate either way.
pub(crate) fn collect_numbers(args: &[FormulaValue]) -> ValueResult<Vec<f64>> {
    let mut numbers = Vec::new();

    for arg in args {
        match arg {
            FormulaValue::Array(rows) => {
                for value in rows.iter().flatten() {
                    match value {
                        FormulaValue::Number(n) => numbers.push(*n),
                        FormulaValue::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
            FormulaValue::Number(n) => numbers.push(*n),
            FormulaValue::Boolean(b) => numbers.push(if *b { 1.0 } else { 0.0 }),
            FormulaValue::String(s) => {
                if let Ok(n) = s.trim().parse::<f64>() {
                    numbers.push(n);
                }
            }
            FormulaValue::Error(e) => return Err(*e),
            FormulaValue::Empty => {}
        }
    }

    Ok(numbers)
}

/// A value as a grid; scalars become a 1x1 grid
pub(crate) fn grid(value: &FormulaValue) -> Vec<Vec<FormulaValue>> {
    match value {
        FormulaValue::Array(rows) => rows.clone(),
        other => vec![vec![other.clone()]],
    }
}

/// Convert a count argument to an index, rejecting fractions below 1
pub(crate) fn positive_index(n: f64) -> ValueResult<usize> {
    if !n.is_finite() || n < 1.0 {
        return Err(CellError::Value);
    }
    Ok(n.trunc() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_registry_lookup_is_case_insensitive() {
        let registry = FunctionRegistry::new();
        assert!(registry.get("sum").is_some());
        assert!(registry.get("Sum").is_some());
        assert!(registry.get("NOT_A_FUNCTION").is_none());
        assert_eq!(registry.get("vlookup").map(|f| f.name), Some("VLOOKUP"));
    }

    #[test]
    fn test_registry_covers_categories() {
        let registry = FunctionRegistry::new();
        assert!(registry.len() >= 50);
        for name in [
            "SUM", "MEDIAN", "COUNTIF", "ROUND", "MOD", "IF", "IFS", "LEFT", "SUBSTITUTE", "TEXT",
            "VLOOKUP", "XLOOKUP", "PMT", "RATE", "IRR", "DATE", "DATEDIF", "EOMONTH",
        ] {
            assert!(registry.contains(name), "{} not registered", name);
        }
        assert!(registry.names_in(FunctionCategory::Financial).contains(&"NPV"));
        assert!(registry.get("IF").unwrap().is_lazy());
        assert!(!registry.get("SUM").unwrap().is_lazy());
    }

    fn always_seven(_: &[FormulaValue], _: &EvaluationContext) -> FormulaResult<FormulaValue> {
        Ok(FormulaValue::Number(7.0))
    }

    #[test]
    fn test_register_overwrites() {
        let mut registry = FunctionRegistry::new();
        let before = registry.len();
        registry.register(FunctionDef::eager(
            "sum",
            FunctionCategory::Math,
            0,
            None,
            always_seven,
        ));
        assert_eq!(registry.len(), before);

        let ctx = EvaluationContext::new(&registry);
        assert_eq!(
            ctx.evaluate_formula("=SUM(1,2)").unwrap(),
            FormulaValue::Number(7.0)
        );
    }

    #[test]
    fn test_names_sorted() {
        let mut registry = FunctionRegistry::empty();
        registry.register(FunctionDef::eager("B", FunctionCategory::Math, 0, None, always_seven));
        registry.register(FunctionDef::eager("A", FunctionCategory::Math, 0, None, always_seven));
        assert_eq!(registry.names(), vec!["A", "B"]);
    }

    #[test]
    fn test_truthy() {
        for falsy in [
            FormulaValue::Number(0.0),
            FormulaValue::String("0".into()),
            FormulaValue::Boolean(false),
            FormulaValue::String(String::new()),
            FormulaValue::Empty,
        ] {
            assert_eq!(truthy(&falsy), Ok(false), "{:?}", falsy);
        }
        for text in ["yes", "FALSE", "false", "0.0", " 0 ", " "] {
            assert_eq!(truthy(&FormulaValue::String(text.into())), Ok(true), "{:?}", text);
        }
        assert_eq!(truthy(&FormulaValue::Number(-1.0)), Ok(true));
        assert_eq!(
            truthy(&FormulaValue::Error(CellError::Na)),
            Err(CellError::Na)
        );
    }

    #[test]
    fn test_collect_numbers() {
        let args = vec![
            FormulaValue::Array(vec![vec![
                FormulaValue::Number(1.0),
                FormulaValue::String("2".into()),
                FormulaValue::Boolean(true),
            ]]),
            FormulaValue::String("3".into()),
            FormulaValue::Boolean(true),
        ];
        assert_eq!(collect_numbers(&args), Ok(vec![1.0, 3.0, 1.0]));

        let with_error = vec![FormulaValue::Array(vec![vec![FormulaValue::Error(
            CellError::Div0,
        )]])];
        assert_eq!(collect_numbers(&with_error), Err(CellError::Div0));
    }

    #[test]
    fn test_number_coercion() {
        assert_eq!(number(&FormulaValue::String(" 2.5 ".into())), Ok(2.5));
        assert_eq!(number(&FormulaValue::String("abc".into())), Err(CellError::Value));
        assert_eq!(number(&FormulaValue::Empty), Ok(0.0));
        assert_eq!(opt_number(&[], 0, 4.0), Ok(4.0));
    }
}
