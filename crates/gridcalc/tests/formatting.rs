//! Format codes applied to calculated results

use gridcalc::prelude::*;
use pretty_assertions::assert_eq;

fn c<T: Into<SpreadsheetCell>>(value: T) -> SpreadsheetCell {
    value.into()
}

#[test]
fn test_formats_apply_to_formula_results() {
    let sheet = create_sheet(
        "Budget",
        vec![
            vec![c(1000.0), c(234.56)],
            vec![c(("=A1+B1", "$#,##0.00")), c(("=B1/A1", "0.00%"))],
            vec![c(("=A1/8", "0.0")), c(("=A1*1000", "#,##0"))],
        ],
    );
    let result = calculate(&sheet, None);

    assert_eq!(result.display("A2").as_deref(), Some("$1,234.56"));
    assert_eq!(result.display("B2").as_deref(), Some("23.46%"));
    assert_eq!(result.display("A3").as_deref(), Some("125.0"));
    assert_eq!(result.display("B3").as_deref(), Some("1,000,000"));
    // The raw value is kept alongside the text
    assert_eq!(result.value("A2"), Some(&FormulaValue::Number(1234.56)));
}

#[test]
fn test_formats_apply_to_literal_numbers() {
    let sheet = create_sheet("Sheet1", vec![vec![c((0.5, "0.00%")), c((-42.0, "$0.00"))]]);
    let result = calculate(&sheet, None);

    assert_eq!(result.display("A1").as_deref(), Some("50.00%"));
    assert_eq!(result.display("B1").as_deref(), Some("-$42.00"));
}

#[test]
fn test_text_results_ignore_number_formats() {
    let sheet = create_sheet(
        "Sheet1",
        vec![vec![c(("=\"n/a\"", "$0.00")), c(("=1/0", "0%"))]],
    );
    let result = calculate(&sheet, None);

    assert_eq!(result.display("A1").as_deref(), Some("n/a"));
    assert_eq!(result.cell(0, 0).and_then(|c| c.formatted.clone()), None);
    assert_eq!(result.display("B1").as_deref(), Some("#DIV/0!"));
}

#[test]
fn test_to_string_array() {
    let sheet = create_sheet(
        "Sheet1",
        vec![
            vec![c("Item"), c("Cost")],
            vec![c("Rent"), c((1200.0, "$#,##0.00"))],
            vec![c("Total"), c("=SUM(B2:B2)*2"), c("=B3>2000")],
        ],
    );
    let result = calculate(&sheet, None);

    assert_eq!(
        to_string_array(&result),
        vec![
            vec!["Item".to_string(), "Cost".to_string()],
            vec!["Rent".to_string(), "$1,200.00".to_string()],
            vec!["Total".to_string(), "2400".to_string(), "TRUE".to_string()],
        ]
    );
}
