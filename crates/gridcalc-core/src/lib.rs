//! # gridcalc-core
//!
//! Core data structures for the gridcalc formula engine.
//!
//! This crate provides the leaf building blocks used by the formula and
//! calculation crates:
//! - [`CellRef`] and [`RangeRef`] - A1-style references, optionally sheet-qualified
//! - [`SpreadsheetCell`], [`CellValue`], [`SheetData`] - the input data model
//! - [`date`] - 1900-system serial dates and date-like text detection
//! - [`number_format`] - Excel-style format codes rendered to display strings
//! - [`EngineOptions`] - knobs shared by the evaluator and the calculator
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_core::{parse_cell_ref, cell_ref_to_a1};
//!
//! let r = parse_cell_ref("'My Sheet'!$b2").unwrap();
//! assert_eq!(r.row, 1);
//! assert_eq!(r.col, 1);
//! assert_eq!(cell_ref_to_a1(&r), "'My Sheet'!$B2");
//! ```

pub mod cell;
pub mod date;
pub mod error;
pub mod number_format;
pub mod options;
pub mod sheet;

pub use cell::{
    cell_ref_to_a1, column_to_index, index_to_column, parse_cell_ref, parse_range_ref,
    range_ref_to_a1, CellError, CellRef, CellValue, RangeCells, RangeRef, SpreadsheetCell,
};
pub use date::{DateOrder, ParsedDate};
pub use error::{Error, Result};
pub use number_format::format_number;
pub use options::EngineOptions;
pub use sheet::{SheetData, SpreadsheetToolData};

/// Maximum number of rows addressable by a reference (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns addressable by a reference (three letters, `ZZZ`)
pub const MAX_COLS: u32 = 18_278;
