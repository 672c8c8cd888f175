//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellRef`] - A cell's location (e.g., "A1", "'Q1 Data'!$B$2")
//! - [`RangeRef`] - A rectangle of cells (e.g., "A1:B10")
//! - [`CellValue`] and [`SpreadsheetCell`] - Input cell contents and format code
//! - [`CellError`] - Spreadsheet error sentinels (`#DIV/0!`, `#N/A`, ...)

mod reference;
#[cfg(feature = "serde")]
mod serde_impl;
mod value;

pub use reference::{
    cell_ref_to_a1, column_to_index, index_to_column, parse_cell_ref, parse_range_ref,
    quote_sheet_name, range_ref_to_a1, CellRef, RangeCells, RangeRef,
};
pub use value::{CellError, CellValue, SpreadsheetCell};
