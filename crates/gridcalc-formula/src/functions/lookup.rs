//! Lookup and reference functions
//!
//! Ranges arrive as 2-D grids. Exact matching is case-insensitive for text
//! and never falls back to an approximate match; a miss is #N/A.

use super::criteria::{has_wildcards, wildcard_regex};
use super::{
    grid, lift, number, number_arg, opt_number, positive_index, truthy, FunctionCategory,
    FunctionDef, FunctionRegistry, ValueResult,
};
use crate::error::FormulaResult;
use crate::evaluator::{compare_values, EvaluationContext, FormulaValue};
use gridcalc_core::CellError;
use regex::Regex;
use std::cmp::Ordering;

pub fn register(registry: &mut FunctionRegistry) {
    const C: FunctionCategory = FunctionCategory::Lookup;

    registry.register(FunctionDef::eager("VLOOKUP", C, 3, Some(4), fn_vlookup));
    registry.register(FunctionDef::eager("HLOOKUP", C, 3, Some(4), fn_hlookup));
    registry.register(FunctionDef::eager("MATCH", C, 2, Some(3), fn_match));
    registry.register(FunctionDef::eager("INDEX", C, 2, Some(3), fn_index));
    registry.register(FunctionDef::eager("XLOOKUP", C, 3, Some(6), fn_xlookup));
    registry.register(FunctionDef::eager("CHOOSE", C, 2, None, fn_choose));
    registry.register(FunctionDef::eager("ROWS", C, 1, Some(1), fn_rows));
    registry.register(FunctionDef::eager("COLUMNS", C, 1, Some(1), fn_columns));
}

/// How a lookup compares its target against candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchMode {
    /// Equality, with `*`/`?` wildcards when `wildcards` is set
    Exact { wildcards: bool },
    /// Largest value <= target, assuming ascending order
    AscendingApprox,
    /// Smallest value >= target, assuming descending order
    DescendingApprox,
    /// Exact, else the closest smaller value anywhere in the vector
    NextSmaller,
    /// Exact, else the closest larger value anywhere in the vector
    NextLarger,
}

/// Lookup target prepared once per call
struct Target<'a> {
    value: &'a FormulaValue,
    pattern: Option<Regex>,
}

impl<'a> Target<'a> {
    fn new(value: &'a FormulaValue, wildcards: bool) -> ValueResult<Self> {
        match value {
            FormulaValue::Error(e) => return Err(*e),
            FormulaValue::Array(_) => return Err(CellError::Value),
            _ => {}
        }

        let pattern = match value {
            FormulaValue::String(s) if wildcards && has_wildcards(s) => wildcard_regex(s),
            _ => None,
        };
        Ok(Self { value, pattern })
    }

    /// Same kind of value, so ordering between them is meaningful
    fn comparable(&self, candidate: &FormulaValue) -> bool {
        matches!(
            (self.value, candidate),
            (FormulaValue::Number(_), FormulaValue::Number(_))
                | (FormulaValue::String(_), FormulaValue::String(_))
                | (FormulaValue::Boolean(_), FormulaValue::Boolean(_))
        )
    }

    fn equals(&self, candidate: &FormulaValue) -> bool {
        if let (Some(re), FormulaValue::String(s)) = (&self.pattern, candidate) {
            return re.is_match(s);
        }
        self.comparable(candidate) && compare_values(candidate, self.value) == Ordering::Equal
    }

    fn ordering(&self, candidate: &FormulaValue) -> Option<Ordering> {
        self.comparable(candidate)
            .then(|| compare_values(candidate, self.value))
    }
}

/// Position of the target in `values`, visiting them in `order`
fn find_position(
    target: &Target,
    values: &[FormulaValue],
    mode: MatchMode,
    reverse: bool,
) -> Option<usize> {
    let order: Box<dyn Iterator<Item = usize>> = if reverse {
        Box::new((0..values.len()).rev())
    } else {
        Box::new(0..values.len())
    };

    match mode {
        MatchMode::Exact { .. } => order.into_iter().find(|&i| target.equals(&values[i])),
        MatchMode::AscendingApprox => {
            let mut found = None;
            for i in order {
                match target.ordering(&values[i]) {
                    Some(Ordering::Greater) => break,
                    Some(_) => found = Some(i),
                    None => {}
                }
            }
            found
        }
        MatchMode::DescendingApprox => {
            let mut found = None;
            for i in order {
                match target.ordering(&values[i]) {
                    Some(Ordering::Less) => break,
                    Some(_) => found = Some(i),
                    None => {}
                }
            }
            found
        }
        MatchMode::NextSmaller | MatchMode::NextLarger => {
            let wanted = if mode == MatchMode::NextSmaller {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let mut best: Option<usize> = None;
            for i in order {
                match target.ordering(&values[i]) {
                    Some(Ordering::Equal) => return Some(i),
                    Some(ord) if ord == wanted => {
                        let closer = best.map_or(true, |b| {
                            compare_values(&values[i], &values[b]) == wanted.reverse()
                        });
                        if closer {
                            best = Some(i);
                        }
                    }
                    _ => {}
                }
            }
            best
        }
    }
}

/// A single row or column as a flat vector
fn vector(rows: &[Vec<FormulaValue>]) -> Option<Vec<FormulaValue>> {
    match rows {
        [row] => Some(row.clone()),
        _ if rows.iter().all(|r| r.len() == 1) => {
            Some(rows.iter().map(|r| r[0].clone()).collect())
        }
        _ => None,
    }
}

fn is_missing(args: &[FormulaValue], index: usize) -> bool {
    matches!(args.get(index), None | Some(FormulaValue::Empty))
}

/// Shared body of VLOOKUP and HLOOKUP over a grid already oriented so that
/// each inner vector is one candidate row
fn table_lookup(args: &[FormulaValue], table: Vec<Vec<FormulaValue>>) -> ValueResult<FormulaValue> {
    let approximate = if is_missing(args, 3) {
        true
    } else {
        truthy(&args[3])?
    };
    let mode = if approximate {
        MatchMode::AscendingApprox
    } else {
        MatchMode::Exact { wildcards: true }
    };
    let target = Target::new(&args[0], !approximate)?;

    let index = positive_index(number_arg(args, 2)?)?;
    let width = table.first().map_or(0, Vec::len);
    if index > width {
        return Err(CellError::Ref);
    }

    let keys: Vec<FormulaValue> = table
        .iter()
        .map(|row| row.first().cloned().unwrap_or_default())
        .collect();
    let found = find_position(&target, &keys, mode, false).ok_or(CellError::Na)?;
    Ok(table[found].get(index - 1).cloned().unwrap_or_default())
}

fn transpose(rows: &[Vec<FormulaValue>]) -> Vec<Vec<FormulaValue>> {
    let width = rows.first().map_or(0, Vec::len);
    (0..width)
        .map(|c| {
            rows.iter()
                .map(|row| row.get(c).cloned().unwrap_or_default())
                .collect()
        })
        .collect()
}

/// VLOOKUP(lookup_value, table_array, col_index, [range_lookup])
pub fn fn_vlookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| table_lookup(args, grid(&args[1])))
}

/// HLOOKUP(lookup_value, table_array, row_index, [range_lookup])
pub fn fn_hlookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| table_lookup(args, transpose(&grid(&args[1]))))
}

/// MATCH(lookup_value, lookup_array, [match_type]) - 1-based position
pub fn fn_match(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let match_type = opt_number(args, 2, 1.0)?;
        let mode = if match_type > 0.0 {
            MatchMode::AscendingApprox
        } else if match_type < 0.0 {
            MatchMode::DescendingApprox
        } else {
            MatchMode::Exact { wildcards: true }
        };
        let target = Target::new(&args[0], matches!(mode, MatchMode::Exact { .. }))?;

        let values = vector(&grid(&args[1])).ok_or(CellError::Na)?;
        let found = find_position(&target, &values, mode, false).ok_or(CellError::Na)?;
        Ok(FormulaValue::Number((found + 1) as f64))
    })
}

/// Non-negative index argument; 0 selects a whole row or column
fn index_number(value: &FormulaValue) -> ValueResult<usize> {
    let n = number(value)?.trunc();
    if n < 0.0 {
        return Err(CellError::Value);
    }
    Ok(n as usize)
}

/// INDEX(array, row_num, [column_num])
///
/// With a single-row array and one index, the index selects the column.
pub fn fn_index(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        if let FormulaValue::Error(e) = &args[0] {
            return Err(*e);
        }
        let rows = grid(&args[0]);
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);

        let (row, col) = match args.get(2) {
            Some(col) => (index_number(&args[1])?, index_number(col)?),
            None if height == 1 => (1, index_number(&args[1])?),
            None => (index_number(&args[1])?, 1),
        };
        if row > height || col > width {
            return Err(CellError::Ref);
        }

        Ok(match (row, col) {
            (0, 0) => FormulaValue::Array(rows),
            (0, c) => FormulaValue::Array(
                rows.iter()
                    .map(|r| vec![r.get(c - 1).cloned().unwrap_or_default()])
                    .collect(),
            ),
            (r, 0) => FormulaValue::Array(vec![rows[r - 1].clone()]),
            (r, c) => rows[r - 1].get(c - 1).cloned().unwrap_or_default(),
        })
    })
}

/// XLOOKUP(lookup_value, lookup_array, return_array, [if_not_found], [match_mode], [search_mode])
///
/// The return array must line up with the lookup vector; a matching row (or
/// column) of several cells comes back as an array.
pub fn fn_xlookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let mode = match opt_number(args, 4, 0.0)? as i64 {
            0 => MatchMode::Exact { wildcards: false },
            -1 => MatchMode::NextSmaller,
            1 => MatchMode::NextLarger,
            2 => MatchMode::Exact { wildcards: true },
            _ => return Err(CellError::Value),
        };
        let reverse = match opt_number(args, 5, 1.0)? as i64 {
            1 => false,
            -1 => true,
            _ => return Err(CellError::Value),
        };
        let target = Target::new(&args[0], mode == MatchMode::Exact { wildcards: true })?;

        let lookup_rows = grid(&args[1]);
        let is_column = lookup_rows.len() > 1 || lookup_rows.first().map_or(0, Vec::len) == 1;
        let keys = vector(&lookup_rows).ok_or(CellError::Value)?;

        let return_rows = grid(&args[2]);
        let results: Vec<Vec<FormulaValue>> = if is_column {
            return_rows
        } else {
            transpose(&return_rows)
        };
        if results.len() != keys.len() {
            return Err(CellError::Value);
        }

        match find_position(&target, &keys, mode, reverse) {
            Some(i) => Ok(match results[i].as_slice() {
                [single] => single.clone(),
                many if is_column => FormulaValue::Array(vec![many.to_vec()]),
                many => FormulaValue::Array(many.iter().map(|v| vec![v.clone()]).collect()),
            }),
            None if !is_missing(args, 3) => Ok(args[3].clone()),
            None => Err(CellError::Na),
        }
    })
}

/// CHOOSE(index, value1, [value2], ...)
pub fn fn_choose(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let index = positive_index(number_arg(args, 0)?)?;
        args.get(index).cloned().ok_or(CellError::Value)
    })
}

/// ROWS(array)
pub fn fn_rows(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| match &args[0] {
        FormulaValue::Error(e) => Err(*e),
        other => Ok(FormulaValue::Number(grid(other).len() as f64)),
    })
}

/// COLUMNS(array)
pub fn fn_columns(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| match &args[0] {
        FormulaValue::Error(e) => Err(*e),
        other => Ok(FormulaValue::Number(
            grid(other).first().map_or(0, Vec::len) as f64,
        )),
    })
}
