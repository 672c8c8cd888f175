//! Cell value types

use std::fmt;

/// A literal value as supplied by the caller
///
/// Formulas are not a separate variant: a cell is a formula when its value
/// is text beginning with `=`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// Empty cell (no value)
    #[default]
    Empty,

    /// Numeric value (all numbers stored as f64, including dates)
    Number(f64),

    /// Text value, or formula source when it starts with `=`
    Text(String),

    /// Boolean value (TRUE/FALSE)
    Boolean(bool),
}

impl CellValue {
    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Check if the cell contains a formula
    pub fn is_formula(&self) -> bool {
        self.formula().is_some()
    }

    /// Formula source (including the leading `=`), if this is a formula
    pub fn formula(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) if s.starts_with('=') => Some(s.as_str()),
            _ => None,
        }
    }

    /// Try to get the value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Try to get the value as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{}", crate::number_format::format_general(*n)),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Empty, Into::into)
    }
}

/// One input cell: a literal or formula plus an optional format code
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpreadsheetCell {
    pub value: CellValue,
    /// Excel-style number format code (e.g. `"$#,##0.00"`)
    pub format: Option<String>,
}

impl SpreadsheetCell {
    pub fn new<V: Into<CellValue>>(value: V) -> Self {
        Self {
            value: value.into(),
            format: None,
        }
    }

    /// Create a cell with a number format code
    pub fn with_format<V: Into<CellValue>, S: Into<String>>(value: V, format: S) -> Self {
        Self {
            value: value.into(),
            format: Some(format.into()),
        }
    }

    /// Create a formula cell; the leading `=` is added when missing
    pub fn formula<S: AsRef<str>>(text: S) -> Self {
        let text = text.as_ref();
        let source = if text.starts_with('=') {
            text.to_string()
        } else {
            format!("={}", text)
        };
        Self::new(CellValue::Text(source))
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Check if the cell contains a formula
    pub fn is_formula(&self) -> bool {
        self.value.is_formula()
    }
}

macro_rules! impl_cell_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for SpreadsheetCell {
                fn from(value: $ty) -> Self {
                    SpreadsheetCell::new(value)
                }
            }

            impl<S: Into<String>> From<($ty, S)> for SpreadsheetCell {
                fn from((value, format): ($ty, S)) -> Self {
                    SpreadsheetCell::with_format(value, format)
                }
            }
        )*
    };
}

impl_cell_from!(f64, i32, i64, bool, &str, String, CellValue);

/// Excel error values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellError {
    /// #NULL! - Incorrect range operator
    Null,
    /// #DIV/0! - Division by zero
    Div0,
    /// #VALUE! - Wrong type of argument or operand
    Value,
    /// #REF! - Invalid cell reference
    Ref,
    /// #NAME? - Unrecognized formula name
    Name,
    /// #NUM! - Invalid numeric value
    Num,
    /// #N/A - Value not available
    Na,
}

impl CellError {
    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            CellError::Null => "#NULL!",
            CellError::Div0 => "#DIV/0!",
            CellError::Value => "#VALUE!",
            CellError::Ref => "#REF!",
            CellError::Name => "#NAME?",
            CellError::Num => "#NUM!",
            CellError::Na => "#N/A",
        }
    }

    /// Parse an error literal such as `#N/A` (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "#NULL!" => Some(CellError::Null),
            "#DIV/0!" => Some(CellError::Div0),
            "#VALUE!" => Some(CellError::Value),
            "#REF!" => Some(CellError::Ref),
            "#NAME?" => Some(CellError::Name),
            "#NUM!" => Some(CellError::Num),
            "#N/A" => Some(CellError::Na),
            _ => None,
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formula_detection() {
        assert!(CellValue::from("=SUM(A1:A3)").is_formula());
        assert!(!CellValue::from("SUM").is_formula());
        assert!(!CellValue::Number(1.0).is_formula());
        assert_eq!(SpreadsheetCell::formula("A1*2").value.formula(), Some("=A1*2"));
    }

    #[test]
    fn test_cell_conversions() {
        assert_eq!(SpreadsheetCell::from(3), SpreadsheetCell::new(3.0));
        assert_eq!(
            SpreadsheetCell::from((1234.5, "$#,##0.00")),
            SpreadsheetCell::with_format(1234.5, "$#,##0.00")
        );
        assert_eq!(SpreadsheetCell::from(true).value, CellValue::Boolean(true));
        assert_eq!(CellValue::from(None::<f64>), CellValue::Empty);
    }

    #[test]
    fn test_error_strings() {
        for err in [
            CellError::Null,
            CellError::Div0,
            CellError::Value,
            CellError::Ref,
            CellError::Name,
            CellError::Num,
            CellError::Na,
        ] {
            assert_eq!(CellError::parse(err.as_str()), Some(err));
        }
        assert_eq!(CellError::parse("#n/a"), Some(CellError::Na));
        assert_eq!(CellError::parse("#BOGUS"), None);
    }
}
