//! # gridcalc-formula
//!
//! Formula parser and evaluator for gridcalc.
//!
//! This crate provides:
//! - Formula parsing (text → AST)
//! - Formula evaluation (AST → value) against a [`CellResolver`]
//! - A [`FunctionRegistry`] of built-in spreadsheet functions
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_formula::{parse_formula, evaluate, EvaluationContext, FormulaValue, FunctionRegistry};
//!
//! let registry = FunctionRegistry::new();
//! let ctx = EvaluationContext::new(&registry);
//! let ast = parse_formula("=ROUND(PMT(0, 12, 1200), 2)").unwrap();
//! assert_eq!(evaluate(&ast, &ctx).unwrap(), FormulaValue::Number(-100.0));
//! ```

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;

pub use ast::{BinaryOperator, FormulaExpr, UnaryOperator};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, CellResolver, EvaluationContext, FormulaValue};
pub use functions::{FunctionCategory, FunctionDef, FunctionImpl, FunctionRegistry};
pub use parser::parse_formula;
