//! References between sheets

use gridcalc::prelude::*;
use pretty_assertions::assert_eq;

fn c<T: Into<SpreadsheetCell>>(value: T) -> SpreadsheetCell {
    value.into()
}

fn inputs() -> SheetData {
    create_sheet("Sheet1", vec![vec![c(100.0)], vec![c(50.0)], vec![c("=A1+A2")]])
}

#[test]
fn test_reads_other_sheet() {
    let sheet1 = inputs();
    let sheet2 = create_sheet(
        "Sheet2",
        vec![
            vec![c("=Sheet1!A1*2")],
            vec![c("=Sheet1!A3")],
            vec![c("=SUM(Sheet1!A1:A3)")],
        ],
    );
    let sheets = vec![sheet1, sheet2.clone()];
    let result = calculate(&sheet2, Some(&sheets));

    assert_eq!(result.value("A1"), Some(&FormulaValue::Number(200.0)));
    assert_eq!(result.value("A2"), Some(&FormulaValue::Number(150.0)));
    assert_eq!(result.value("A3"), Some(&FormulaValue::Number(300.0)));
    assert!(result.errors.is_empty());
    // Sheet1 is calculated once and reused
    assert_eq!(result.stats.cross_sheet_calculations, 1);
}

#[test]
fn test_sheet_names_ignore_case() {
    let sheet2 = create_sheet("Sheet2", vec![vec![c("=sheet1!A1+1")]]);
    let sheets = vec![inputs()];
    let result = calculate(&sheet2, Some(&sheets));
    assert_eq!(result.value("A1"), Some(&FormulaValue::Number(101.0)));
}

#[test]
fn test_quoted_sheet_names() {
    let rates = create_sheet("Tax Rates", vec![vec![c(0.2)]]);
    let invoice = create_sheet(
        "Invoice",
        vec![vec![c(250.0), c("=A1*'Tax Rates'!A1")]],
    );
    let sheets = vec![rates, invoice.clone()];
    let result = calculate(&invoice, Some(&sheets));
    assert_eq!(result.value("B1"), Some(&FormulaValue::Number(50.0)));
}

#[test]
fn test_unknown_sheet_is_a_reference_error() {
    let sheet = create_sheet("Sheet1", vec![vec![c("=Missing!A1")]]);
    let result = calculate(&sheet, None);

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, CalculationErrorKind::Reference);
    assert!(result.errors[0].message.contains("Missing"));
    assert_eq!(result.value("A1"), Some(&FormulaValue::Number(0.0)));
}

#[test]
fn test_disabled_cross_sheet_refs() {
    let sheet2 = create_sheet("Sheet2", vec![vec![c("=Sheet1!A1")]]);
    let sheets = vec![inputs()];
    let calculator =
        Calculator::with_options(EngineOptions::default().with_cross_sheet_refs(false));
    let result = calculator.calculate(&sheet2, Some(&sheets));

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, CalculationErrorKind::Reference);
    assert_eq!(result.stats.cross_sheet_calculations, 0);
}

#[test]
fn test_own_sheet_prefix_reads_current_pass() {
    let sheet = create_sheet("Sheet1", vec![vec![c(4.0), c("=Sheet1!A1*Sheet1!A1")]]);
    let result = calculate(&sheet, None);
    assert_eq!(result.value("B1"), Some(&FormulaValue::Number(16.0)));
    assert_eq!(result.stats.cross_sheet_calculations, 0);
}

#[test]
fn test_current_sheet_replaces_stale_copy() {
    let stale = create_sheet("Sheet1", vec![vec![c(1.0)]]);
    let fresh = create_sheet("Sheet1", vec![vec![c(7.0), c("=A1*3")]]);
    let sheets = vec![stale];
    let result = calculate(&fresh, Some(&sheets));
    assert_eq!(result.value("B1"), Some(&FormulaValue::Number(21.0)));
}

#[test]
fn test_workbook_calculates_every_sheet() {
    let summary = create_sheet(
        "Summary",
        vec![vec![c("=Sheet1!A3"), c("=Detail!B1")]],
    );
    let detail = create_sheet("Detail", vec![vec![c(3.0), c("=A1*Sheet1!A2")]]);
    let results = calculate_workbook(&[inputs(), detail, summary]);

    assert_eq!(results.len(), 3);
    let names: Vec<&str> = results.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Sheet1", "Detail", "Summary"]);
    assert_eq!(results[0].value("A3"), Some(&FormulaValue::Number(150.0)));
    assert_eq!(results[1].value("B1"), Some(&FormulaValue::Number(150.0)));
    assert_eq!(results[2].value("A1"), Some(&FormulaValue::Number(150.0)));
    assert_eq!(results[2].value("B1"), Some(&FormulaValue::Number(150.0)));
    assert!(results.iter().all(|s| s.errors.is_empty()));
}
