//! Prelude module - common imports for gridcalc users
//!
//! ```rust
//! use gridcalc::prelude::*;
//! ```

pub use crate::{
    // Calculation
    calculate,
    calculate_workbook,
    create_sheet,
    to_string_array,
    CalculatedSheet,
    CalculationError,
    CalculationErrorKind,
    Calculator,

    // Cell types
    CellError,
    CellRef,
    CellValue,
    EngineOptions,
    FormulaValue,
    RangeRef,
    SheetData,
    SpreadsheetCell,
    SpreadsheetToolData,
};
