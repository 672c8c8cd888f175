//! Statistical functions

use super::criteria::CriteriaMatcher;
use super::{
    collect_numbers, flatten, grid, lift, number_arg, positive_index, FunctionCategory,
    FunctionDef, FunctionRegistry, ValueResult,
};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use gridcalc_core::CellError;

pub fn register(registry: &mut FunctionRegistry) {
    const C: FunctionCategory = FunctionCategory::Statistical;

    registry.register(FunctionDef::eager("SUM", C, 1, None, fn_sum).ignoring_blanks());
    registry.register(FunctionDef::eager("AVERAGE", C, 1, None, fn_average).ignoring_blanks());
    registry.register(FunctionDef::eager("MAX", C, 1, None, fn_max).ignoring_blanks());
    registry.register(FunctionDef::eager("MIN", C, 1, None, fn_min).ignoring_blanks());
    registry.register(FunctionDef::eager("COUNT", C, 1, None, fn_count).ignoring_blanks());
    registry.register(FunctionDef::eager("COUNTA", C, 1, None, fn_counta).ignoring_blanks());
    registry.register(FunctionDef::eager("COUNTBLANK", C, 1, Some(1), fn_countblank));
    registry.register(FunctionDef::eager("MEDIAN", C, 1, None, fn_median).ignoring_blanks());
    registry.register(FunctionDef::eager("MODE", C, 1, None, fn_mode).ignoring_blanks());
    registry.register(FunctionDef::eager("STDEV", C, 1, None, fn_stdev).ignoring_blanks());
    registry.register(FunctionDef::eager("STDEVP", C, 1, None, fn_stdevp).ignoring_blanks());
    registry.register(FunctionDef::eager("VAR", C, 1, None, fn_var).ignoring_blanks());
    registry.register(FunctionDef::eager("VARP", C, 1, None, fn_varp).ignoring_blanks());
    registry.register(FunctionDef::eager("PRODUCT", C, 1, None, fn_product).ignoring_blanks());
    registry.register(FunctionDef::eager("SUMPRODUCT", C, 1, None, fn_sumproduct));
    registry.register(FunctionDef::eager("LARGE", C, 2, Some(2), fn_large));
    registry.register(FunctionDef::eager("SMALL", C, 2, Some(2), fn_small));
    registry.register(FunctionDef::eager("COUNTIF", C, 2, Some(2), fn_countif));
    registry.register(FunctionDef::eager("SUMIF", C, 2, Some(3), fn_sumif));
    registry.register(FunctionDef::eager("AVERAGEIF", C, 2, Some(3), fn_averageif));
    registry.register(FunctionDef::eager("COUNTIFS", C, 2, None, fn_countifs));
    registry.register(FunctionDef::eager("SUMIFS", C, 3, None, fn_sumifs));
    registry.register(FunctionDef::eager("AVERAGEIFS", C, 3, None, fn_averageifs));
}

/// SUM(number1, [number2], ...)
pub fn fn_sum(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Number(collect_numbers(args)?.iter().sum())))
}

/// AVERAGE(number1, [number2], ...) - #DIV/0! without numbers
pub fn fn_average(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let numbers = collect_numbers(args)?;
        mean(&numbers).map(FormulaValue::Number)
    })
}

/// MAX(number1, [number2], ...) - 0 without numbers
pub fn fn_max(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let numbers = collect_numbers(args)?;
        let max = numbers.iter().copied().fold(None, |acc: Option<f64>, n| {
            Some(acc.map_or(n, |m| m.max(n)))
        });
        Ok(FormulaValue::Number(max.unwrap_or(0.0)))
    })
}

/// MIN(number1, [number2], ...) - 0 without numbers
pub fn fn_min(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let numbers = collect_numbers(args)?;
        let min = numbers.iter().copied().fold(None, |acc: Option<f64>, n| {
            Some(acc.map_or(n, |m| m.min(n)))
        });
        Ok(FormulaValue::Number(min.unwrap_or(0.0)))
    })
}

/// COUNT(value1, [value2], ...) - Counts numbers; errors are skipped, not raised
pub fn fn_count(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut count = 0usize;

    for arg in args {
        match arg {
            FormulaValue::Array(rows) => {
                count += rows
                    .iter()
                    .flatten()
                    .filter(|v| matches!(v, FormulaValue::Number(_)))
                    .count();
            }
            FormulaValue::Number(_) | FormulaValue::Boolean(_) => count += 1,
            FormulaValue::String(s) if s.trim().parse::<f64>().is_ok() => count += 1,
            _ => {}
        }
    }

    Ok(FormulaValue::Number(count as f64))
}

/// COUNTA(value1, [value2], ...) - Counts non-blank values, errors included
pub fn fn_counta(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = flatten(args).filter(|v| !v.is_empty()).count();
    Ok(FormulaValue::Number(count as f64))
}

/// COUNTBLANK(range) - Counts blank cells and empty text
pub fn fn_countblank(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = flatten(args)
        .filter(|v| match v {
            FormulaValue::Empty => true,
            FormulaValue::String(s) => s.is_empty(),
            _ => false,
        })
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// MEDIAN(number1, [number2], ...)
pub fn fn_median(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let mut numbers = collect_numbers(args)?;
        if numbers.is_empty() {
            return Err(CellError::Num);
        }
        numbers.sort_by(f64::total_cmp);
        let mid = numbers.len() / 2;
        let median = if numbers.len() % 2 == 0 {
            (numbers[mid - 1] + numbers[mid]) / 2.0
        } else {
            numbers[mid]
        };
        Ok(FormulaValue::Number(median))
    })
}

/// MODE(number1, [number2], ...) - Most frequent value, earliest on ties; #N/A without repeats
pub fn fn_mode(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let numbers = collect_numbers(args)?;
        let mut best: Option<(f64, usize)> = None;

        for (i, &candidate) in numbers.iter().enumerate() {
            // Only the first occurrence of each value is scored
            if numbers[..i].contains(&candidate) {
                continue;
            }
            let occurrences = numbers.iter().filter(|&&n| n == candidate).count();
            if occurrences > 1 && best.map_or(true, |(_, c)| occurrences > c) {
                best = Some((candidate, occurrences));
            }
        }

        best.map(|(n, _)| FormulaValue::Number(n)).ok_or(CellError::Na)
    })
}

/// STDEV(number1, [number2], ...) - Sample standard deviation
pub fn fn_stdev(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Number(variance(&collect_numbers(args)?, true)?.sqrt())))
}

/// STDEVP(number1, [number2], ...) - Population standard deviation
pub fn fn_stdevp(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Number(variance(&collect_numbers(args)?, false)?.sqrt())))
}

/// VAR(number1, [number2], ...) - Sample variance
pub fn fn_var(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Number(variance(&collect_numbers(args)?, true)?)))
}

/// VARP(number1, [number2], ...) - Population variance
pub fn fn_varp(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Number(variance(&collect_numbers(args)?, false)?)))
}

/// PRODUCT(number1, [number2], ...) - 0 without numbers
pub fn fn_product(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let numbers = collect_numbers(args)?;
        if numbers.is_empty() {
            return Ok(FormulaValue::Number(0.0));
        }
        Ok(FormulaValue::Number(numbers.iter().product()))
    })
}

/// SUMPRODUCT(array1, [array2], ...) - Arrays must share dimensions; text counts as 0
pub fn fn_sumproduct(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let grids: Vec<Vec<Vec<FormulaValue>>> = args.iter().map(grid).collect();
        let dims = array_dims(&grids[0]);
        if grids.iter().any(|g| array_dims(g) != dims) {
            return Err(CellError::Value);
        }

        let mut total = 0.0;
        for row in 0..dims.0 {
            for col in 0..dims.1 {
                let mut product = 1.0;
                for g in &grids {
                    product *= match &g[row][col] {
                        FormulaValue::Number(n) => *n,
                        FormulaValue::Error(e) => return Err(*e),
                        _ => 0.0,
                    };
                }
                total += product;
            }
        }
        Ok(FormulaValue::Number(total))
    })
}

/// LARGE(array, k) - k-th largest value
pub fn fn_large(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let mut numbers = collect_numbers(&args[..1])?;
        numbers.sort_by(|a, b| b.total_cmp(a));
        kth(&numbers, number_arg(args, 1)?)
    })
}

/// SMALL(array, k) - k-th smallest value
pub fn fn_small(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let mut numbers = collect_numbers(&args[..1])?;
        numbers.sort_by(f64::total_cmp);
        kth(&numbers, number_arg(args, 1)?)
    })
}

/// COUNTIF(range, criteria)
pub fn fn_countif(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let matcher = CriteriaMatcher::new(&args[1]);
    let count = flatten(&args[..1]).filter(|v| matcher.matches(v)).count();
    Ok(FormulaValue::Number(count as f64))
}

/// SUMIF(range, criteria, [sum_range])
pub fn fn_sumif(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let values = matching_values(&args[0], &args[1], args.get(2))?;
        Ok(FormulaValue::Number(values.iter().sum()))
    })
}

/// AVERAGEIF(range, criteria, [average_range]) - #DIV/0! when nothing matches
pub fn fn_averageif(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let values = matching_values(&args[0], &args[1], args.get(2))?;
        mean(&values).map(FormulaValue::Number)
    })
}

/// COUNTIFS(range1, criteria1, [range2, criteria2], ...)
pub fn fn_countifs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        if args.len() % 2 != 0 {
            return Err(CellError::Value);
        }
        let mask = multi_criteria_mask(args)?;
        Ok(FormulaValue::Number(mask.iter().filter(|&&m| m).count() as f64))
    })
}

/// SUMIFS(sum_range, range1, criteria1, ...)
pub fn fn_sumifs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let values = multi_criteria_values(args)?;
        Ok(FormulaValue::Number(values.iter().sum()))
    })
}

/// AVERAGEIFS(average_range, range1, criteria1, ...)
pub fn fn_averageifs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let values = multi_criteria_values(args)?;
        mean(&values).map(FormulaValue::Number)
    })
}

// === Helpers ===

fn mean(numbers: &[f64]) -> ValueResult<f64> {
    if numbers.is_empty() {
        return Err(CellError::Div0);
    }
    Ok(numbers.iter().sum::<f64>() / numbers.len() as f64)
}

fn variance(numbers: &[f64], sample: bool) -> ValueResult<f64> {
    let n = numbers.len();
    let denominator = if sample { n.saturating_sub(1) } else { n };
    if denominator == 0 {
        return Err(CellError::Div0);
    }
    let avg = mean(numbers)?;
    let sum_sq: f64 = numbers.iter().map(|x| (x - avg).powi(2)).sum();
    Ok(sum_sq / denominator as f64)
}

fn kth(sorted: &[f64], k: f64) -> ValueResult<FormulaValue> {
    let k = positive_index(k).map_err(|_| CellError::Num)?;
    sorted
        .get(k - 1)
        .map(|&n| FormulaValue::Number(n))
        .ok_or(CellError::Num)
}

fn array_dims(rows: &[Vec<FormulaValue>]) -> (usize, usize) {
    (rows.len(), rows.first().map_or(0, Vec::len))
}

/// Numbers from the value range at positions where the criteria range matches
///
/// The value range is aligned to the criteria range from its top-left corner.
fn matching_values(
    range: &FormulaValue,
    criteria: &FormulaValue,
    value_range: Option<&FormulaValue>,
) -> ValueResult<Vec<f64>> {
    let matcher = CriteriaMatcher::new(criteria);
    let criteria_grid = grid(range);
    let value_grid = value_range.map(grid);
    let value_grid = value_grid.as_ref().unwrap_or(&criteria_grid);

    let mut values = Vec::new();
    for (r, row) in criteria_grid.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if !matcher.matches(cell) {
                continue;
            }
            match value_grid.get(r).and_then(|vr| vr.get(c)) {
                Some(FormulaValue::Number(n)) => values.push(*n),
                Some(FormulaValue::Error(e)) => return Err(*e),
                _ => {}
            }
        }
    }
    Ok(values)
}

/// Cell-by-cell AND of every (range, criteria) pair; ranges must share dimensions
fn multi_criteria_mask(pairs: &[FormulaValue]) -> ValueResult<Vec<bool>> {
    let mut mask: Option<Vec<bool>> = None;
    let mut dims = None;

    for pair in pairs.chunks(2) {
        let range = grid(&pair[0]);
        let matcher = CriteriaMatcher::new(&pair[1]);
        let pair_dims = array_dims(&range);
        if *dims.get_or_insert(pair_dims) != pair_dims {
            return Err(CellError::Value);
        }

        let hits = range.iter().flatten().map(|v| matcher.matches(v));
        mask = Some(match mask {
            None => hits.collect(),
            Some(prev) => prev.into_iter().zip(hits).map(|(a, b)| a && b).collect(),
        });
    }

    Ok(mask.unwrap_or_default())
}

fn multi_criteria_values(args: &[FormulaValue]) -> ValueResult<Vec<f64>> {
    if args.len() % 2 == 0 {
        return Err(CellError::Value);
    }
    let values = grid(&args[0]);
    let mask = multi_criteria_mask(&args[1..])?;
    if mask.len() != values.iter().map(Vec::len).sum::<usize>() {
        return Err(CellError::Value);
    }

    let mut out = Vec::new();
    for (value, hit) in values.iter().flatten().zip(mask) {
        if !hit {
            continue;
        }
        match value {
            FormulaValue::Number(n) => out.push(*n),
            FormulaValue::Error(e) => return Err(*e),
            _ => {}
        }
    }
    Ok(out)
}
