//! Cycles between cells and between sheets

use gridcalc::prelude::*;
use pretty_assertions::assert_eq;

fn c<T: Into<SpreadsheetCell>>(value: T) -> SpreadsheetCell {
    value.into()
}

#[test]
fn test_two_cell_cycle_reports_once() {
    let sheet = create_sheet("Sheet1", vec![vec![c("=B1+1"), c("=A1+1")]]);
    let result = calculate(&sheet, None);

    assert_eq!(result.errors.len(), 1);
    let error = &result.errors[0];
    assert_eq!(error.cell, "A1");
    assert_eq!(error.formula, "=B1+1");
    assert_eq!(error.kind, CalculationErrorKind::Circular);
    assert_eq!(result.stats.circular_references, 1);

    // The cell that closed the cycle falls back to zero
    assert_eq!(result.value("A1"), Some(&FormulaValue::Number(0.0)));
    assert_eq!(result.value("B1"), Some(&FormulaValue::Number(1.0)));
}

#[test]
fn test_longer_cycle_leaves_other_cells_alone() {
    let sheet = create_sheet(
        "Sheet1",
        vec![
            vec![c("=C1"), c("=A1"), c("=B1")],
            vec![c(5.0), c("=A2*2"), c("=SUM(A2:B2)")],
        ],
    );
    let result = calculate(&sheet, None);

    assert_eq!(result.stats.circular_references, 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.value("B2"), Some(&FormulaValue::Number(10.0)));
    assert_eq!(result.value("C2"), Some(&FormulaValue::Number(15.0)));
    for a1 in ["A1", "B1", "C1"] {
        assert_eq!(result.value(a1), Some(&FormulaValue::Number(0.0)), "{}", a1);
    }
}

#[test]
fn test_cycle_through_a_range() {
    let sheet = create_sheet("Sheet1", vec![vec![c(1.0)], vec![c(2.0)], vec![c("=SUM(A1:A3)")]]);
    let result = calculate(&sheet, None);

    assert_eq!(result.stats.circular_references, 1);
    assert_eq!(result.errors[0].cell, "A3");
    assert_eq!(result.value("A3"), Some(&FormulaValue::Number(0.0)));
}

#[test]
fn test_cycle_across_sheets() {
    let first = create_sheet("First", vec![vec![c("=Second!A1+1")]]);
    let second = create_sheet("Second", vec![vec![c("=First!A1+1")]]);
    let sheets = vec![first.clone(), second];

    let result = calculate(&first, Some(&sheets));
    assert_eq!(result.stats.circular_references, 1);
    assert_eq!(result.errors[0].cell, "A1");
    assert_eq!(result.errors[0].kind, CalculationErrorKind::Circular);
    assert_eq!(result.value("A1"), Some(&FormulaValue::Number(0.0)));
}

#[test]
fn test_strict_mode_shows_ref_error() {
    let sheet = create_sheet("Sheet1", vec![vec![c("=A1")]]);
    let calculator = Calculator::with_options(EngineOptions::default().with_strict_mode(true));
    let result = calculator.calculate(&sheet, None);

    assert_eq!(result.value("A1"), Some(&FormulaValue::Error(CellError::Ref)));
    assert_eq!(result.display("A1").as_deref(), Some("#REF!"));
}
