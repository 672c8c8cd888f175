//! Sheet payloads exchanged with the host

use crate::cell::SpreadsheetCell;

/// A named grid of input cells. Rows may be ragged.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SheetData {
    /// Sheet name, also the key for cross-sheet references
    pub name: String,
    #[cfg_attr(feature = "serde", serde(rename = "data", alias = "rows", default))]
    pub rows: Vec<Vec<SpreadsheetCell>>,
}

impl SheetData {
    pub fn new<S: Into<String>>(name: S, rows: Vec<Vec<SpreadsheetCell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Cell at a 0-based position, if present
    pub fn cell(&self, row: usize, col: usize) -> Option<&SpreadsheetCell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row
    pub fn col_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Whether any cell holds a formula
    pub fn has_formulas(&self) -> bool {
        self.rows.iter().flatten().any(SpreadsheetCell::is_formula)
    }
}

/// The `{ title, sheets }` envelope a spreadsheet tool call carries
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpreadsheetToolData {
    #[cfg_attr(feature = "serde", serde(default))]
    pub title: String,
    pub sheets: Vec<SheetData>,
}

impl SpreadsheetToolData {
    pub fn new<S: Into<String>>(title: S, sheets: Vec<SheetData>) -> Self {
        Self {
            title: title.into(),
            sheets,
        }
    }

    /// Find a sheet by name (case-insensitive)
    pub fn sheet(&self, name: &str) -> Option<&SheetData> {
        self.sheets
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Parse the JSON envelope
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to compact JSON
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;

    fn sample() -> SheetData {
        SheetData::new(
            "Budget",
            vec![
                vec![SpreadsheetCell::new("Item"), SpreadsheetCell::new("Cost")],
                vec![SpreadsheetCell::new("Rent")],
                vec![SpreadsheetCell::empty(), SpreadsheetCell::formula("SUM(B1:B2)")],
            ],
        )
    }

    #[test]
    fn test_ragged_rows() {
        let sheet = sample();
        assert_eq!(sheet.row_count(), 3);
        assert_eq!(sheet.col_count(), 2);
        assert!(sheet.cell(1, 1).is_none());
        assert_eq!(
            sheet.cell(0, 1).map(|c| &c.value),
            Some(&CellValue::Text("Cost".into()))
        );
        assert!(sheet.has_formulas());
    }

    #[test]
    fn test_sheet_lookup_ignores_case() {
        let data = SpreadsheetToolData::new("Q1", vec![sample()]);
        assert!(data.sheet("budget").is_some());
        assert!(data.sheet("Other").is_none());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_envelope() {
        let json = r#"{
            "title": "Costs",
            "sheets": [
                {"name": "Sheet1", "data": [[100, {"v": 0.25, "f": "0%"}], ["=A1*2"]]}
            ]
        }"#;
        let data = SpreadsheetToolData::from_json(json).unwrap();
        assert_eq!(data.title, "Costs");
        let sheet = &data.sheets[0];
        assert_eq!(sheet.rows[0][1].format.as_deref(), Some("0%"));
        assert!(sheet.rows[1][0].is_formula());

        let round = SpreadsheetToolData::from_json(&data.to_json().unwrap()).unwrap();
        assert_eq!(round, data);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_errors_are_reported() {
        assert!(matches!(
            SpreadsheetToolData::from_json("{\"sheets\": 3}"),
            Err(crate::Error::Json(_))
        ));
    }
}
