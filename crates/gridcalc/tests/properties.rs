//! Property tests over generated sheets

use gridcalc::prelude::*;
use proptest::prelude::*;

fn c<T: Into<SpreadsheetCell>>(value: T) -> SpreadsheetCell {
    value.into()
}

proptest! {
    #[test]
    fn sum_matches_direct_addition(values in proptest::collection::vec(-1.0e6f64..1.0e6, 1..40)) {
        let mut rows: Vec<Vec<SpreadsheetCell>> = values.iter().map(|v| vec![c(*v)]).collect();
        rows.push(vec![c(format!("=SUM(A1:A{})", values.len()))]);
        let sheet = create_sheet("Sheet1", rows);
        let result = calculate(&sheet, None);

        let expected: f64 = values.iter().sum();
        let a1 = format!("A{}", values.len() + 1);
        match result.value(&a1) {
            Some(FormulaValue::Number(total)) => {
                prop_assert!((total - expected).abs() <= 1e-6 * expected.abs().max(1.0));
            }
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }

    #[test]
    fn chains_evaluate_each_cell_once(length in 1usize..60) {
        // A1 = 1, A(n) = A(n-1) + 1
        let mut rows = vec![vec![c(1.0)]];
        for n in 1..length {
            rows.push(vec![c(format!("=A{}+1", n))]);
        }
        let sheet = create_sheet("Chain", rows);
        let result = calculate(&sheet, None);

        prop_assert_eq!(result.stats.formula_count, length - 1);
        prop_assert_eq!(result.stats.cells_evaluated, length - 1);
        let last = format!("A{}", length);
        prop_assert_eq!(result.value(&last), Some(&FormulaValue::Number(length as f64)));
    }

    #[test]
    fn every_cycle_reports_exactly_once(length in 1usize..30) {
        // Each cell reads the next, the last reads the first
        let rows: Vec<Vec<SpreadsheetCell>> = (0..length)
            .map(|n| vec![c(format!("=A{}", (n + 1) % length + 1))])
            .collect();
        let sheet = create_sheet("Ring", rows);
        let result = calculate(&sheet, None);

        prop_assert_eq!(result.stats.circular_references, 1);
        prop_assert_eq!(result.errors.len(), 1);
        prop_assert!(result.data.iter().flatten().all(|cell| cell.value == FormulaValue::Number(0.0)));
    }

    #[test]
    fn sheets_without_formulas_pass_through(
        grid in proptest::collection::vec(
            proptest::collection::vec(-1000i32..1000, 0..6),
            0..6,
        )
    ) {
        let sheet = create_sheet("Plain", grid.clone());
        let result = calculate(&sheet, None);

        prop_assert!(result.errors.is_empty());
        prop_assert_eq!(result.stats.cells_evaluated, 0);
        for (row, values) in grid.iter().enumerate() {
            for (col, value) in values.iter().enumerate() {
                let cell = result.cell(row, col).map(|c| c.value.clone());
                prop_assert_eq!(cell, Some(FormulaValue::Number(*value as f64)));
            }
        }
    }
}
