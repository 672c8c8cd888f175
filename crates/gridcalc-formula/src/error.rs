//! Formula error types

use gridcalc_core::CellError;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that stop a formula from producing a value
///
/// Spreadsheet-level failures (`#DIV/0!`, `#N/A`, ...) are not errors here;
/// they travel as [`FormulaValue::Error`](crate::FormulaValue::Error).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Formula evaluation error
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Bare identifier that is not a reference
    #[error("Unknown name: {0}")]
    UnknownName(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Circular reference
    #[error("Circular reference detected at {0}")]
    CircularReference(String),

    /// Reference to invalid cell or sheet
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
}

impl FormulaError {
    /// The sentinel a cell shows when this error is kept in place
    pub fn to_cell_error(&self) -> CellError {
        match self {
            FormulaError::InvalidReference(_) | FormulaError::CircularReference(_) => CellError::Ref,
            FormulaError::UnknownFunction(_) | FormulaError::UnknownName(_) => CellError::Name,
            _ => CellError::Value,
        }
    }
}

impl From<gridcalc_core::Error> for FormulaError {
    fn from(err: gridcalc_core::Error) -> Self {
        match err {
            gridcalc_core::Error::InvalidReference(msg) => FormulaError::InvalidReference(msg),
            other => FormulaError::Evaluation(other.to_string()),
        }
    }
}
