//! Sheet and workbook calculation
//!
//! Formula cells are evaluated on demand: a formula that reads a cell not
//! calculated yet is set aside until that cell is done, so dependencies
//! resolve in whatever order the formulas need them. The pending cells live
//! on an explicit work stack, so long chains do not deepen the call stack.
//! Each top-level call owns its pass state.
//!
//! - Results are memoized per pass, so shared dependencies evaluate once.
//! - Reading a cell that was started but not finished is a circular
//!   reference. One error is recorded per cycle, against the cell whose
//!   re-entry closed it; that cell and every reader of it see `0`.
//! - The first reference to another sheet calculates that whole sheet and
//!   caches the result for the rest of the call. A sheet that is still being
//!   calculated further up the stack is read through its live pass.
//!
//! # Example
//!
//! ```rust
//! use gridcalc::{create_sheet, Calculator, FormulaValue, SpreadsheetCell};
//!
//! let sheet = create_sheet(
//!     "Sheet1",
//!     vec![vec![
//!         SpreadsheetCell::from(10.0),
//!         SpreadsheetCell::from(20.0),
//!         SpreadsheetCell::from("=A1+B1"),
//!     ]],
//! );
//!
//! let result = Calculator::new().calculate(&sheet, None);
//! assert_eq!(result.value("C1"), Some(&FormulaValue::Number(30.0)));
//! assert!(result.errors.is_empty());
//! ```

use crate::sheet::preprocess_dates;
use ahash::{AHashMap, AHashSet};
use gridcalc_core::{
    format_number, CellRef, EngineOptions, RangeRef, SheetData, SpreadsheetCell,
    SpreadsheetToolData,
};
use gridcalc_formula::{
    CellResolver, EvaluationContext, FormulaError, FormulaResult, FormulaValue, FunctionRegistry,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use thiserror::Error;

/// One calculated cell
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalculatedCell {
    pub value: FormulaValue,
    /// Display text for numeric cells that carry a format code
    pub formatted: Option<String>,
}

impl CalculatedCell {
    /// What a spreadsheet would show: the formatted text, else the raw value
    pub fn display(&self) -> String {
        match &self.formatted {
            Some(text) => text.clone(),
            None => self.value.as_string(),
        }
    }
}

/// A formula cell and the value it produced
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaInfo {
    /// A1 address on its own sheet
    pub cell: String,
    pub formula: String,
    pub result: FormulaValue,
}

/// Category of a [`CalculationError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalculationErrorKind {
    Circular,
    Reference,
    Formula,
    Unknown,
}

impl From<&FormulaError> for CalculationErrorKind {
    fn from(error: &FormulaError) -> Self {
        match error {
            FormulaError::CircularReference(_) => CalculationErrorKind::Circular,
            FormulaError::InvalidReference(_) => CalculationErrorKind::Reference,
            FormulaError::Parse(_)
            | FormulaError::UnknownFunction(_)
            | FormulaError::ArgumentCount { .. }
            | FormulaError::Argument(_)
            | FormulaError::Evaluation(_) => CalculationErrorKind::Formula,
            FormulaError::UnknownName(_) => CalculationErrorKind::Unknown,
        }
    }
}

/// A formula that could not be evaluated. The cell falls back to `0` (or to
/// its error sentinel in strict mode) and the rest of the sheet carries on.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{cell}: {message}")]
pub struct CalculationError {
    pub cell: String,
    pub formula: String,
    pub message: String,
    pub kind: CalculationErrorKind,
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalculationStats {
    /// Formula cells in the sheet
    pub formula_count: usize,
    /// Formula evaluations performed
    pub cells_evaluated: usize,
    /// Cycles detected
    pub circular_references: usize,
    /// Recorded calculation errors
    pub errors: usize,
    /// Other sheets calculated in full to resolve cross-sheet references
    pub cross_sheet_calculations: usize,
}

/// The result of calculating one sheet
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalculatedSheet {
    pub name: String,
    /// Same shape as the input rows
    pub data: Vec<Vec<CalculatedCell>>,
    pub formulas: Vec<FormulaInfo>,
    pub errors: Vec<CalculationError>,
    pub stats: CalculationStats,
}

impl CalculatedSheet {
    /// Cell at a 0-based position
    pub fn cell(&self, row: usize, col: usize) -> Option<&CalculatedCell> {
        self.data.get(row).and_then(|r| r.get(col))
    }

    /// Value at an A1 address such as `"B3"`
    pub fn value(&self, a1: &str) -> Option<&FormulaValue> {
        let cell = CellRef::parse(a1).ok()?;
        self.cell(cell.row as usize, cell.col as usize)
            .map(|c| &c.value)
    }

    /// Display text at an A1 address
    pub fn display(&self, a1: &str) -> Option<String> {
        let cell = CellRef::parse(a1).ok()?;
        self.cell(cell.row as usize, cell.col as usize)
            .map(CalculatedCell::display)
    }
}

/// Formula engine for sheets and workbooks
///
/// Owns the function registry and the options. Calculation takes `&self`,
/// so one calculator can serve any number of calls.
#[derive(Debug, Clone)]
pub struct Calculator {
    registry: FunctionRegistry,
    options: EngineOptions,
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new()
    }
}

impl Calculator {
    /// Calculator with the built-in functions and default options
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            registry: FunctionRegistry::new(),
            options,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: EngineOptions) {
        self.options = options;
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Mutable access to register custom functions
    pub fn registry_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.registry
    }

    /// Calculate one sheet
    ///
    /// `all_sheets` supplies the targets of cross-sheet references. `sheet`
    /// takes the place of the entry with the same name, if there is one.
    pub fn calculate(&self, sheet: &SheetData, all_sheets: Option<&[SheetData]>) -> CalculatedSheet {
        let order = self.options.date_order();
        let mut sheets: Vec<SheetData> = all_sheets
            .unwrap_or_default()
            .iter()
            .map(|s| preprocess_dates(s, order))
            .collect();

        let current = preprocess_dates(sheet, order);
        let index = match sheets.iter().position(|s| same_sheet(&s.name, &sheet.name)) {
            Some(index) => {
                sheets[index] = current;
                index
            }
            None => {
                sheets.push(current);
                sheets.len() - 1
            }
        };

        let workbook = WorkbookPass::new(self, &sheets);
        workbook.sheet_result(index).as_ref().clone()
    }

    /// Calculate every sheet, sharing cross-sheet results between them
    pub fn calculate_workbook(&self, sheets: &[SheetData]) -> Vec<CalculatedSheet> {
        let order = self.options.date_order();
        let sheets: Vec<SheetData> = sheets.iter().map(|s| preprocess_dates(s, order)).collect();

        let workbook = WorkbookPass::new(self, &sheets);
        (0..sheets.len())
            .map(|index| workbook.sheet_result(index).as_ref().clone())
            .collect()
    }

    /// Calculate every sheet of a tool payload
    pub fn calculate_tool_data(&self, data: &SpreadsheetToolData) -> Vec<CalculatedSheet> {
        self.calculate_workbook(&data.sheets)
    }
}

/// Calculate one sheet with default options
pub fn calculate(sheet: &SheetData, all_sheets: Option<&[SheetData]>) -> CalculatedSheet {
    Calculator::new().calculate(sheet, all_sheets)
}

/// Calculate a workbook with default options
pub fn calculate_workbook(sheets: &[SheetData]) -> Vec<CalculatedSheet> {
    Calculator::new().calculate_workbook(sheets)
}

/// Sheet names compare case-insensitively
fn same_sheet(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

fn cell_label(row: usize, col: usize) -> String {
    CellRef::new(row as u32, col as u32).to_a1_string()
}

/// What a failing cell resolves to
fn fallback(error: &FormulaError, options: &EngineOptions) -> FormulaValue {
    if options.strict_mode {
        FormulaValue::Error(error.to_cell_error())
    } else {
        FormulaValue::Number(0.0)
    }
}

/// Cross-sheet reads that may be in flight at once
///
/// Each one holds a sheet calculation on the call stack.
const MAX_SHEET_DEPTH: usize = 64;

/// State shared by every sheet calculated within one top-level call
struct WorkbookPass<'a> {
    calculator: &'a Calculator,
    sheets: &'a [SheetData],
    /// Sheets whose calculation is on the stack
    active: RefCell<AHashMap<usize, Rc<SheetPass<'a>>>>,
    finished: RefCell<AHashMap<usize, Rc<CalculatedSheet>>>,
    cross_sheet_calculations: Cell<usize>,
    /// Cross-sheet reads in flight
    depth: Cell<usize>,
}

impl<'a> WorkbookPass<'a> {
    fn new(calculator: &'a Calculator, sheets: &'a [SheetData]) -> Self {
        Self {
            calculator,
            sheets,
            active: RefCell::new(AHashMap::new()),
            finished: RefCell::new(AHashMap::new()),
            cross_sheet_calculations: Cell::new(0),
            depth: Cell::new(0),
        }
    }

    fn options(&self) -> &EngineOptions {
        &self.calculator.options
    }

    fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|s| same_sheet(&s.name, name))
    }

    /// Calculate a sheet in full, or return the cached result
    fn sheet_result(&self, index: usize) -> Rc<CalculatedSheet> {
        if let Some(done) = self.finished.borrow().get(&index) {
            return Rc::clone(done);
        }

        let pass = Rc::new(SheetPass::new(&self.sheets[index]));
        self.active.borrow_mut().insert(index, Rc::clone(&pass));
        let before = self.cross_sheet_calculations.get();

        pass.calculate_all(self);

        self.active.borrow_mut().remove(&index);
        let mut result = pass.finish();
        result.stats.cross_sheet_calculations = self.cross_sheet_calculations.get() - before;

        let result = Rc::new(result);
        self.finished.borrow_mut().insert(index, Rc::clone(&result));
        result
    }

    /// Value of a cell on another sheet
    fn foreign_value(&self, name: &str, row: u32, col: u32) -> FormulaResult<FormulaValue> {
        if !self.options().enable_cross_sheet_refs {
            return Err(FormulaError::InvalidReference(format!(
                "cross-sheet reference to '{}' is disabled",
                name
            )));
        }
        let index = self
            .sheet_index(name)
            .ok_or_else(|| FormulaError::InvalidReference(format!("unknown sheet '{}'", name)))?;

        if self.depth.get() >= MAX_SHEET_DEPTH {
            return Err(FormulaError::Evaluation(format!(
                "cross-sheet references nest deeper than {} levels",
                MAX_SHEET_DEPTH
            )));
        }
        self.depth.set(self.depth.get() + 1);
        let value = self.sheet_value(index, row as usize, col as usize);
        self.depth.set(self.depth.get() - 1);
        Ok(value)
    }

    fn sheet_value(&self, index: usize, row: usize, col: usize) -> FormulaValue {
        let live = self.active.borrow().get(&index).cloned();
        if let Some(pass) = live {
            return pass.resolve(row, col, self);
        }

        let cached = self.finished.borrow().get(&index).cloned();
        let sheet = match cached {
            Some(sheet) => sheet,
            None => {
                log::debug!(
                    "calculating sheet '{}' for a cross-sheet reference",
                    self.sheets[index].name
                );
                self.cross_sheet_calculations
                    .set(self.cross_sheet_calculations.get() + 1);
                self.sheet_result(index)
            }
        };

        sheet
            .cell(row, col)
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    /// Rows and columns of a sheet, or `None` when it cannot be read
    fn extent(&self, name: &str) -> Option<(u32, u32)> {
        if !self.options().enable_cross_sheet_refs {
            return None;
        }
        self.sheet_index(name).map(|index| sheet_extent(&self.sheets[index]))
    }
}

fn sheet_extent(sheet: &SheetData) -> (u32, u32) {
    (sheet.row_count() as u32, sheet.col_count() as u32)
}

type CellKey = (usize, usize);

/// Calculation state of one sheet
///
/// Dependencies are resolved with an explicit work stack rather than by
/// recursion. An attempt to evaluate a formula that reads a formula cell
/// without a value yet is abandoned: its result is discarded, the missing
/// cells are pushed above it, and it runs again once they are done. Only
/// cross-sheet reads nest, bounded by [`MAX_SHEET_DEPTH`].
struct SheetPass<'a> {
    sheet: &'a SheetData,
    values: RefCell<Vec<Vec<Option<FormulaValue>>>>,
    /// Formula cells started but not finished; reading one closes a cycle
    calculating: RefCell<AHashSet<CellKey>>,
    /// Cells each running attempt is waiting on, innermost last
    attempts: RefCell<Vec<Vec<CellKey>>>,
    /// Cells that closed a cycle
    circular: RefCell<AHashSet<CellKey>>,
    formulas: RefCell<Vec<FormulaInfo>>,
    errors: RefCell<Vec<CalculationError>>,
    cells_evaluated: Cell<usize>,
}

impl<'a> SheetPass<'a> {
    fn new(sheet: &'a SheetData) -> Self {
        Self {
            sheet,
            values: RefCell::new(sheet.rows.iter().map(|r| vec![None; r.len()]).collect()),
            calculating: RefCell::new(AHashSet::new()),
            attempts: RefCell::new(Vec::new()),
            circular: RefCell::new(AHashSet::new()),
            formulas: RefCell::new(Vec::new()),
            errors: RefCell::new(Vec::new()),
            cells_evaluated: Cell::new(0),
        }
    }

    fn calculate_all(&self, workbook: &WorkbookPass<'a>) {
        for (row, cells) in self.sheet.rows.iter().enumerate() {
            for col in 0..cells.len() {
                self.resolve(row, col, workbook);
            }
        }
    }

    fn done(&self, (row, col): CellKey) -> Option<FormulaValue> {
        self.values
            .borrow()
            .get(row)
            .and_then(|r| r.get(col))
            .cloned()
            .flatten()
    }

    fn store(&self, (row, col): CellKey, value: FormulaValue) {
        self.values.borrow_mut()[row][col] = Some(value);
    }

    /// Value of a cell, calculating it and everything it needs first
    fn resolve(&self, row: usize, col: usize, workbook: &WorkbookPass<'a>) -> FormulaValue {
        let key = (row, col);
        if let Some(done) = self.done(key) {
            return done;
        }
        if self.calculating.borrow().contains(&key) {
            if let Some(formula) = self.sheet.cell(row, col).and_then(|c| c.value.formula()) {
                return self.close_cycle(key, formula, workbook.options());
            }
        }

        let mut stack = vec![key];
        while let Some(&top) = stack.last() {
            if self.done(top).is_some() {
                stack.pop();
                continue;
            }
            let cell = match self.sheet.cell(top.0, top.1) {
                Some(cell) => cell,
                None => {
                    stack.pop();
                    continue;
                }
            };
            match cell.value.formula() {
                None => {
                    self.store(top, FormulaValue::from(&cell.value));
                    stack.pop();
                }
                Some(formula) => match self.attempt(top, formula, workbook) {
                    Some(value) => {
                        self.store(top, value);
                        stack.pop();
                    }
                    None => {
                        let missing = self.attempts.borrow_mut().pop().unwrap_or_default();
                        stack.extend(missing);
                    }
                },
            }
        }

        self.done(key).unwrap_or_default()
    }

    /// Same-sheet read from inside an attempt
    fn read(&self, row: usize, col: usize, workbook: &WorkbookPass<'a>) -> FormulaValue {
        let key = (row, col);
        if let Some(done) = self.done(key) {
            return done;
        }
        let cell = match self.sheet.cell(row, col) {
            Some(cell) => cell,
            None => return FormulaValue::Empty,
        };
        let formula = match cell.value.formula() {
            Some(formula) => formula,
            None => return FormulaValue::from(&cell.value),
        };
        if self.calculating.borrow().contains(&key) {
            return self.close_cycle(key, formula, workbook.options());
        }

        if self.wait_for(vec![key]) {
            FormulaValue::Empty
        } else {
            self.resolve(row, col, workbook)
        }
    }

    /// Mark the running attempt as waiting; false outside an attempt
    fn wait_for(&self, cells: Vec<CellKey>) -> bool {
        match self.attempts.borrow_mut().last_mut() {
            Some(missing) => {
                missing.extend(cells);
                true
            }
            None => false,
        }
    }

    /// The running attempt will be discarded, so its reads do not matter
    fn waiting(&self) -> bool {
        self.attempts
            .borrow()
            .last()
            .map_or(false, |missing| !missing.is_empty())
    }

    /// Formula cells in a range that have not been started
    fn unstarted_in(&self, range: &RangeRef) -> Vec<CellKey> {
        let calculating = self.calculating.borrow();
        let values = self.values.borrow();
        let mut cells = Vec::new();
        for row in range.top() as usize..=range.bottom() as usize {
            let Some(cells_in_row) = self.sheet.rows.get(row) else {
                break;
            };
            let right = (range.right() as usize).min(cells_in_row.len().saturating_sub(1));
            for col in range.left() as usize..=right {
                let key = (row, col);
                if col < cells_in_row.len()
                    && cells_in_row[col].is_formula()
                    && values[row][col].is_none()
                    && !calculating.contains(&key)
                {
                    cells.push(key);
                }
            }
        }
        cells
    }

    /// Evaluate a formula cell once its inputs are available
    ///
    /// `None` when the formula read a cell without a value; the missing
    /// cells are left on top of `attempts`.
    fn attempt(
        &self,
        key: CellKey,
        formula: &str,
        workbook: &WorkbookPass<'a>,
    ) -> Option<FormulaValue> {
        let calculator = workbook.calculator;
        let resolver = PassResolver {
            workbook,
            pass: self,
        };
        let ctx = EvaluationContext::new(&calculator.registry)
            .with_resolver(&resolver)
            .with_options(calculator.options);

        self.calculating.borrow_mut().insert(key);
        self.attempts.borrow_mut().push(Vec::new());
        let outcome = ctx.evaluate_formula(formula);
        if self.waiting() {
            return None;
        }
        self.attempts.borrow_mut().pop();
        self.calculating.borrow_mut().remove(&key);

        let label = cell_label(key.0, key.1);
        log::trace!("{}!{}: {}", self.sheet.name, label, formula);
        self.cells_evaluated.set(self.cells_evaluated.get() + 1);

        let mut value = match outcome {
            Ok(value) => value,
            Err(error) => {
                self.record_error(key, formula, &error);
                fallback(&error, &calculator.options)
            }
        };

        if self.circular.borrow().contains(&key) {
            let error = FormulaError::CircularReference(label.clone());
            value = fallback(&error, &calculator.options);
        }

        self.formulas.borrow_mut().push(FormulaInfo {
            cell: label,
            formula: formula.to_string(),
            result: value.clone(),
        });
        Some(value)
    }

    /// Read of a cell that is started but not finished
    fn close_cycle(&self, key: CellKey, formula: &str, options: &EngineOptions) -> FormulaValue {
        let error = FormulaError::CircularReference(format!(
            "{}!{}",
            self.sheet.name,
            cell_label(key.0, key.1)
        ));
        if self.circular.borrow_mut().insert(key) {
            self.record_error(key, formula, &error);
        }
        fallback(&error, options)
    }

    fn record_error(&self, key: CellKey, formula: &str, error: &FormulaError) {
        let error = CalculationError {
            cell: cell_label(key.0, key.1),
            formula: formula.to_string(),
            message: error.to_string(),
            kind: CalculationErrorKind::from(error),
        };
        log::warn!("{}!{}: {}", self.sheet.name, error.cell, error.message);
        self.errors.borrow_mut().push(error);
    }

    /// Assemble the result, applying format codes to numeric cells
    fn finish(&self) -> CalculatedSheet {
        let values = self.values.take();
        let data = self
            .sheet
            .rows
            .iter()
            .zip(values)
            .map(|(cells, row_values)| {
                cells
                    .iter()
                    .zip(row_values)
                    .map(|(cell, value)| formatted_cell(cell, value.unwrap_or_default()))
                    .collect()
            })
            .collect();

        let errors = self.errors.take();
        let stats = CalculationStats {
            formula_count: self
                .sheet
                .rows
                .iter()
                .flatten()
                .filter(|c| c.is_formula())
                .count(),
            cells_evaluated: self.cells_evaluated.get(),
            circular_references: errors
                .iter()
                .filter(|e| e.kind == CalculationErrorKind::Circular)
                .count(),
            errors: errors.len(),
            cross_sheet_calculations: 0,
        };

        CalculatedSheet {
            name: self.sheet.name.clone(),
            data,
            formulas: self.formulas.take(),
            errors,
            stats,
        }
    }
}

fn formatted_cell(cell: &SpreadsheetCell, value: FormulaValue) -> CalculatedCell {
    let formatted = match (&value, cell.format.as_deref()) {
        (FormulaValue::Number(n), Some(code)) => Some(format_number(*n, code)),
        _ => None,
    };
    CalculatedCell { value, formatted }
}

/// Reads cells for the evaluator from the live passes
struct PassResolver<'p, 'a> {
    workbook: &'p WorkbookPass<'a>,
    pass: &'p SheetPass<'a>,
}

impl PassResolver<'_, '_> {
    fn is_own_sheet(&self, sheet: Option<&str>) -> bool {
        sheet.map_or(true, |name| same_sheet(name, &self.pass.sheet.name))
    }
}

impl CellResolver for PassResolver<'_, '_> {
    fn cell_value(&self, cell: &CellRef) -> FormulaResult<FormulaValue> {
        if self.pass.waiting() {
            return Ok(FormulaValue::Empty);
        }
        match cell.sheet.as_deref() {
            Some(name) if !self.is_own_sheet(Some(name)) => {
                self.workbook.foreign_value(name, cell.row, cell.col)
            }
            _ => Ok(self
                .pass
                .read(cell.row as usize, cell.col as usize, self.workbook)),
        }
    }

    fn used_extent(&self, sheet: Option<&str>) -> Option<(u32, u32)> {
        match sheet {
            Some(name) if !self.is_own_sheet(Some(name)) => self.workbook.extent(name),
            _ => Some(sheet_extent(self.pass.sheet)),
        }
    }

    /// Waits on every unstarted formula in a same-sheet range at once, so a
    /// range costs one abandoned attempt instead of one per cell
    fn range_grid(&self, range: &RangeRef) -> FormulaResult<Vec<Vec<FormulaValue>>> {
        let blank = || {
            vec![vec![FormulaValue::Empty; range.col_count() as usize]; range.row_count() as usize]
        };
        if self.pass.waiting() {
            return Ok(blank());
        }
        if self.is_own_sheet(range.sheet()) {
            let missing = self.pass.unstarted_in(range);
            if !missing.is_empty() && self.pass.wait_for(missing) {
                return Ok(blank());
            }
        }

        let sheet = range.sheet().map(str::to_string);
        let (used_rows, used_cols) = self
            .used_extent(range.sheet())
            .unwrap_or((u32::MAX, u32::MAX));
        let mut rows = Vec::with_capacity(range.row_count() as usize);
        for row in range.top()..=range.bottom() {
            let mut values = Vec::with_capacity(range.col_count() as usize);
            for col in range.left()..=range.right() {
                if row >= used_rows || col >= used_cols {
                    values.push(FormulaValue::Empty);
                    continue;
                }
                let cell = CellRef {
                    sheet: sheet.clone(),
                    ..CellRef::new(row, col)
                };
                values.push(self.cell_value(&cell)?);
            }
            rows.push(values);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::create_sheet;
    use gridcalc_core::CellError;
    use pretty_assertions::assert_eq;

    fn c<T: Into<SpreadsheetCell>>(value: T) -> SpreadsheetCell {
        value.into()
    }

    #[test]
    fn test_simple_calculation() {
        let sheet = create_sheet("Sheet1", vec![vec![c(10.0), c(20.0), c("=A1+B1")]]);
        let result = calculate(&sheet, None);

        assert_eq!(result.value("C1"), Some(&FormulaValue::Number(30.0)));
        assert_eq!(result.value("A1"), Some(&FormulaValue::Number(10.0)));
        assert_eq!(
            result.formulas,
            vec![FormulaInfo {
                cell: "C1".into(),
                formula: "=A1+B1".into(),
                result: FormulaValue::Number(30.0),
            }]
        );
        assert_eq!(result.stats.formula_count, 1);
    }

    #[test]
    fn test_forward_references_resolve_on_demand() {
        let sheet = create_sheet(
            "Sheet1",
            vec![vec![c("=B1*2")], vec![c("=A1+1")], vec![c(5.0)]],
        );
        // B1 lies outside the data and reads as empty
        let result = calculate(&sheet, None);
        assert_eq!(result.value("A1"), Some(&FormulaValue::Number(0.0)));
        assert_eq!(result.value("A2"), Some(&FormulaValue::Number(1.0)));

        let sheet = create_sheet("Sheet1", vec![vec![c("=A2*2")], vec![c("=A3+1")], vec![c(5.0)]]);
        let result = calculate(&sheet, None);
        assert_eq!(result.value("A1"), Some(&FormulaValue::Number(12.0)));
        assert_eq!(result.stats.cells_evaluated, 2);
    }

    #[test]
    fn test_diamond_evaluates_each_cell_once() {
        let sheet = create_sheet(
            "Sheet1",
            vec![
                vec![c(2.0)],
                vec![c("=A1*10")],
                vec![c("=A2+1")],
                vec![c("=A2+2")],
                vec![c("=A3+A4")],
            ],
        );
        let result = calculate(&sheet, None);
        assert_eq!(result.value("A5"), Some(&FormulaValue::Number(43.0)));
        assert_eq!(result.stats.cells_evaluated, 4);
        assert_eq!(result.stats.formula_count, 4);
    }

    #[test]
    fn test_circular_pair_records_one_error() {
        let sheet = create_sheet("Sheet1", vec![vec![c("=B1"), c("=A1")]]);
        let result = calculate(&sheet, None);

        assert_eq!(result.value("A1"), Some(&FormulaValue::Number(0.0)));
        assert_eq!(result.value("B1"), Some(&FormulaValue::Number(0.0)));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, CalculationErrorKind::Circular);
        assert_eq!(result.errors[0].cell, "A1");
        assert_eq!(result.stats.circular_references, 1);
    }

    #[test]
    fn test_range_waits_for_every_formula_at_once() {
        let sheet = create_sheet(
            "Sheet1",
            vec![
                vec![c("=SUM(A2:A4)")],
                vec![c("=A3*2")],
                vec![c("=A4+1")],
                vec![c(4.0)],
            ],
        );
        let result = calculate(&sheet, None);
        assert_eq!(result.value("A1"), Some(&FormulaValue::Number(19.0)));
        assert_eq!(result.stats.cells_evaluated, 3);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_cross_sheet_nesting_is_bounded() {
        let count = MAX_SHEET_DEPTH + 6;
        let sheets: Vec<SheetData> = (1..=count)
            .map(|i| {
                let cell = if i == count {
                    c(1.0)
                } else {
                    c(format!("=S{}!A1+1", i + 1))
                };
                create_sheet(format!("S{}", i), vec![vec![cell]])
            })
            .collect();
        let results = calculate_workbook(&sheets);

        let failed: Vec<_> = results
            .iter()
            .filter(|r| !r.errors.is_empty())
            .map(|r| (r.name.as_str(), r.errors[0].kind))
            .collect();
        let name = format!("S{}", MAX_SHEET_DEPTH + 1);
        assert_eq!(failed, vec![(name.as_str(), CalculationErrorKind::Formula)]);
        assert_eq!(
            results[0].value("A1"),
            Some(&FormulaValue::Number(MAX_SHEET_DEPTH as f64))
        );
        assert_eq!(results[count - 2].value("A1"), Some(&FormulaValue::Number(2.0)));
    }

    #[test]
    fn test_self_reference() {
        let sheet = create_sheet("Sheet1", vec![vec![c(1.0), c("=A1+B1")]]);
        let result = calculate(&sheet, None);
        assert_eq!(result.value("B1"), Some(&FormulaValue::Number(0.0)));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].cell, "B1");
    }

    #[test]
    fn test_error_kinds_and_fallback() {
        let sheet = create_sheet(
            "Sheet1",
            vec![vec![
                c("=NOSUCH(1)"),
                c("=1+"),
                c("=Other!A1"),
                c("=SUM()"),
                c("=A1+1"),
            ]],
        );
        let result = calculate(&sheet, None);

        let kinds: Vec<_> = result.errors.iter().map(|e| (e.cell.as_str(), e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("A1", CalculationErrorKind::Formula),
                ("B1", CalculationErrorKind::Formula),
                ("C1", CalculationErrorKind::Reference),
                ("D1", CalculationErrorKind::Formula),
            ]
        );
        assert_eq!(result.value("A1"), Some(&FormulaValue::Number(0.0)));
        // Readers of a failed cell see the fallback, not another error
        assert_eq!(result.value("E1"), Some(&FormulaValue::Number(1.0)));
    }

    #[test]
    fn test_strict_mode_keeps_sentinels() {
        let calculator = Calculator::with_options(EngineOptions::default().with_strict_mode(true));
        let sheet = create_sheet(
            "Sheet1",
            vec![vec![c("=NOSUCH(1)"), c("=Other!A1"), c("=1+")]],
        );
        let result = calculator.calculate(&sheet, None);

        assert_eq!(result.value("A1"), Some(&FormulaValue::Error(CellError::Name)));
        assert_eq!(result.value("B1"), Some(&FormulaValue::Error(CellError::Ref)));
        assert_eq!(result.value("C1"), Some(&FormulaValue::Error(CellError::Value)));
    }

    #[test]
    fn test_error_values_are_not_calculation_errors() {
        let sheet = create_sheet("Sheet1", vec![vec![c("=1/0"), c("=IFERROR(A1,-1)")]]);
        let result = calculate(&sheet, None);
        assert_eq!(result.value("A1"), Some(&FormulaValue::Error(CellError::Div0)));
        assert_eq!(result.value("B1"), Some(&FormulaValue::Number(-1.0)));
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_formatting_pass() {
        let sheet = create_sheet(
            "Sheet1",
            vec![vec![
                c((1234.5, "$#,##0.00")),
                c(("=A1/2469", "0.00%")),
                c(("text", "0.00")),
            ]],
        );
        let result = calculate(&sheet, None);
        assert_eq!(result.display("A1").as_deref(), Some("$1,234.50"));
        assert_eq!(result.display("B1").as_deref(), Some("50.00%"));
        assert_eq!(result.cell(0, 2).and_then(|c| c.formatted.clone()), None);
    }

    #[test]
    fn test_options_roundtrip() {
        let mut calculator = Calculator::new();
        assert_eq!(calculator.options().max_iterations, 100);
        calculator.set_options(EngineOptions::default().with_max_iterations(5));
        assert_eq!(calculator.options().max_iterations, 5);
    }
}
