//! # gridcalc
//!
//! A spreadsheet formula engine.
//!
//! gridcalc takes sheets of literal values and `=` formulas, evaluates every
//! formula and returns calculated copies with Excel-style display text.
//!
//! ## Features
//!
//! - 90+ built-in functions: statistical, math, logical, text, lookup,
//!   financial, date and time
//! - On-demand evaluation with memoization and circular reference detection
//! - Cross-sheet references (`Sheet2!A1`, `'My Sheet'!B2`), each sheet
//!   calculated once per call
//! - Number formats (`$#,##0.00`, `0.00%`, `YYYY-MM-DD`, ...) applied after
//!   calculation
//! - Date-like text (`2024-01-31`, `Jan 31, 2024`) recognized as dates
//! - JSON payloads through the `json` feature (on by default)
//!
//! ## Example
//!
//! ```rust
//! use gridcalc::prelude::*;
//!
//! let sheet = create_sheet("Budget", vec![
//!     vec![SpreadsheetCell::from(10.0)],
//!     vec![SpreadsheetCell::from(20.0)],
//!     vec![SpreadsheetCell::from(30.0)],
//!     vec![SpreadsheetCell::from(("=SUM(A1:A3)", "$#,##0.00"))],
//! ]);
//!
//! let result = Calculator::new().calculate(&sheet, None);
//! assert_eq!(result.value("A4"), Some(&FormulaValue::Number(60.0)));
//! assert_eq!(to_string_array(&result)[3][0], "$60.00");
//! ```

pub mod calculation;
pub mod prelude;
pub mod sheet;

// Re-export calculation types
pub use calculation::{
    calculate, calculate_workbook, CalculatedCell, CalculatedSheet, CalculationError,
    CalculationErrorKind, CalculationStats, Calculator, FormulaInfo,
};
pub use sheet::{create_sheet, preprocess_dates, to_string_array};

// Re-export core types
pub use gridcalc_core::{
    cell_ref_to_a1, column_to_index, date, format_number, index_to_column, number_format,
    parse_cell_ref, parse_range_ref, range_ref_to_a1, CellError, CellRef, CellValue, DateOrder,
    EngineOptions, Error, RangeRef, Result, SheetData, SpreadsheetCell, SpreadsheetToolData,
};

// Re-export formula types
pub use gridcalc_formula::{
    evaluate, parse_formula, CellResolver, EvaluationContext, FormulaError, FormulaExpr,
    FormulaResult, FormulaValue, FunctionCategory, FunctionDef, FunctionRegistry,
};
