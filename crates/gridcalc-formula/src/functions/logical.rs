//! Logical functions
//!
//! IF, IFS, IFERROR and IFNA are lazy: only the branch that is taken gets
//! evaluated, so a reference inside an unused branch is never read.

use super::{lift, truthy, FunctionCategory, FunctionDef, FunctionRegistry, ValueResult};
use crate::ast::FormulaExpr;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{EvaluationContext, FormulaValue};
use gridcalc_core::CellError;

pub fn register(registry: &mut FunctionRegistry) {
    const C: FunctionCategory = FunctionCategory::Logical;

    registry.register(FunctionDef::lazy("IF", C, 2, Some(3), fn_if));
    registry.register(FunctionDef::lazy("IFS", C, 2, None, fn_ifs));
    registry.register(FunctionDef::lazy("IFERROR", C, 2, Some(2), fn_iferror));
    registry.register(FunctionDef::lazy("IFNA", C, 2, Some(2), fn_ifna));
    registry.register(FunctionDef::eager("AND", C, 1, None, fn_and).ignoring_blanks());
    registry.register(FunctionDef::eager("OR", C, 1, None, fn_or).ignoring_blanks());
    registry.register(FunctionDef::eager("XOR", C, 1, None, fn_xor).ignoring_blanks());
    registry.register(FunctionDef::eager("NOT", C, 1, Some(1), fn_not));
    registry.register(FunctionDef::eager("TRUE", C, 0, Some(0), fn_true));
    registry.register(FunctionDef::eager("FALSE", C, 0, Some(0), fn_false));
}

/// Evaluate a condition expression; an error value short-circuits
fn condition(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<ValueResult<bool>> {
    let value = ctx.evaluate(expr)?;
    Ok(truthy(&value))
}

/// IF(condition, value_if_true, [value_if_false])
pub fn fn_if(args: &[FormulaExpr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match condition(&args[0], ctx)? {
        Err(e) => Ok(FormulaValue::Error(e)),
        Ok(true) => ctx.evaluate(&args[1]),
        Ok(false) => match args.get(2) {
            Some(expr) => ctx.evaluate(expr),
            None => Ok(FormulaValue::Boolean(false)),
        },
    }
}

/// IFS(condition1, value1, [condition2, value2], ...) - #N/A when nothing is true
pub fn fn_ifs(args: &[FormulaExpr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    if args.len() % 2 != 0 {
        return Err(FormulaError::Argument(
            "IFS expects condition/value pairs".into(),
        ));
    }

    for pair in args.chunks(2) {
        match condition(&pair[0], ctx)? {
            Err(e) => return Ok(FormulaValue::Error(e)),
            Ok(true) => return ctx.evaluate(&pair[1]),
            Ok(false) => {}
        }
    }

    Ok(FormulaValue::Error(CellError::Na))
}

/// IFERROR(value, value_if_error)
///
/// Falls back on error values and on formulas that cannot be evaluated at all.
pub fn fn_iferror(args: &[FormulaExpr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match ctx.evaluate(&args[0]) {
        Ok(FormulaValue::Error(_)) | Err(_) => ctx.evaluate(&args[1]),
        Ok(value) => Ok(value),
    }
}

/// IFNA(value, value_if_na) - Falls back on #N/A only
pub fn fn_ifna(args: &[FormulaExpr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match ctx.evaluate(&args[0])? {
        FormulaValue::Error(CellError::Na) => ctx.evaluate(&args[1]),
        value => Ok(value),
    }
}

/// Logical values in the arguments
///
/// Inside ranges text and blanks are skipped; direct arguments go through
/// the usual truthiness rules. No logical values at all is #VALUE!.
fn logical_values(args: &[FormulaValue]) -> ValueResult<Vec<bool>> {
    let mut values = Vec::new();

    for arg in args {
        match arg {
            FormulaValue::Array(rows) => {
                for value in rows.iter().flatten() {
                    match value {
                        FormulaValue::Boolean(b) => values.push(*b),
                        FormulaValue::Number(n) => values.push(*n != 0.0),
                        FormulaValue::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
            FormulaValue::Empty => {}
            other => values.push(truthy(other)?),
        }
    }

    if values.is_empty() {
        return Err(CellError::Value);
    }
    Ok(values)
}

/// AND(logical1, [logical2], ...)
pub fn fn_and(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Boolean(logical_values(args)?.iter().all(|&b| b))))
}

/// OR(logical1, [logical2], ...)
pub fn fn_or(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Boolean(logical_values(args)?.iter().any(|&b| b))))
}

/// XOR(logical1, [logical2], ...) - TRUE when an odd number of arguments is TRUE
pub fn fn_xor(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let trues = logical_values(args)?.iter().filter(|&&b| b).count();
        Ok(FormulaValue::Boolean(trues % 2 == 1))
    })
}

/// NOT(logical)
pub fn fn_not(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Boolean(!truthy(&args[0])?)))
}

/// TRUE()
pub fn fn_true(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(true))
}

/// FALSE()
pub fn fn_false(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(false))
}
