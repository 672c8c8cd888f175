//! Helpers for building input sheets and exporting results

use crate::calculation::CalculatedSheet;
use gridcalc_core::date::{is_date_like, parse_date, DateOrder};
use gridcalc_core::{CellValue, SheetData, SpreadsheetCell};

/// Build a sheet from rows of anything convertible to a cell
///
/// Numbers, strings (formulas start with `=`), booleans and
/// `(value, format)` pairs all convert.
///
/// ```rust
/// use gridcalc::{create_sheet, SpreadsheetCell};
///
/// let sheet = create_sheet("Prices", vec![
///     vec![SpreadsheetCell::from("Item"), SpreadsheetCell::from("Price")],
///     vec![SpreadsheetCell::from("Tea"), SpreadsheetCell::from((3.5, "$0.00"))],
/// ]);
/// assert_eq!(sheet.row_count(), 2);
/// assert_eq!(sheet.rows[1][1].format.as_deref(), Some("$0.00"));
/// ```
pub fn create_sheet<S, R, C>(name: S, rows: R) -> SheetData
where
    S: Into<String>,
    R: IntoIterator,
    R::Item: IntoIterator<Item = C>,
    C: Into<SpreadsheetCell>,
{
    let rows = rows
        .into_iter()
        .map(|row| row.into_iter().map(Into::into).collect())
        .collect();
    SheetData::new(name, rows)
}

/// Every cell as display text: formatted text where present, else the value
pub fn to_string_array(sheet: &CalculatedSheet) -> Vec<Vec<String>> {
    sheet
        .data
        .iter()
        .map(|row| row.iter().map(|cell| cell.display()).collect())
        .collect()
}

/// Literal date text becomes a serial number
///
/// A cell without a format code picks up the one matching how the date was
/// written, so it renders back the same way.
pub fn preprocess_dates(sheet: &SheetData, order: DateOrder) -> SheetData {
    let mut sheet = sheet.clone();
    for cell in sheet.rows.iter_mut().flatten() {
        let parsed = match &cell.value {
            CellValue::Text(text) if !cell.value.is_formula() && is_date_like(text) => {
                parse_date(text, order)
            }
            _ => None,
        };

        if let Some(parsed) = parsed {
            cell.value = CellValue::Number(parsed.serial);
            if cell.format.is_none() {
                cell.format = Some(parsed.format);
            }
        }
    }
    sheet
}
