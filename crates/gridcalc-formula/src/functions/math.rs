//! Math functions

use super::{lift, number_arg, opt_number, FunctionCategory, FunctionDef, FunctionRegistry};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use gridcalc_core::number_format::round_half_away;
use gridcalc_core::CellError;

pub fn register(registry: &mut FunctionRegistry) {
    const C: FunctionCategory = FunctionCategory::Math;

    registry.register(FunctionDef::eager("ROUND", C, 1, Some(2), fn_round));
    registry.register(FunctionDef::eager("ROUNDUP", C, 1, Some(2), fn_roundup));
    registry.register(FunctionDef::eager("ROUNDDOWN", C, 1, Some(2), fn_rounddown));
    registry.register(FunctionDef::eager("FLOOR", C, 1, Some(2), fn_floor));
    registry.register(FunctionDef::eager("CEILING", C, 1, Some(2), fn_ceiling));
    registry.register(FunctionDef::eager("ABS", C, 1, Some(1), fn_abs));
    registry.register(FunctionDef::eager("POWER", C, 2, Some(2), fn_power));
    registry.register(FunctionDef::eager("SQRT", C, 1, Some(1), fn_sqrt));
    registry.register(FunctionDef::eager("MOD", C, 2, Some(2), fn_mod));
    registry.register(FunctionDef::eager("INT", C, 1, Some(1), fn_int));
    registry.register(FunctionDef::eager("TRUNC", C, 1, Some(2), fn_trunc));
    registry.register(FunctionDef::eager("SIGN", C, 1, Some(1), fn_sign));
    registry.register(FunctionDef::eager("PI", C, 0, Some(0), fn_pi));
    registry.register(FunctionDef::eager("EXP", C, 1, Some(1), fn_exp));
    registry.register(FunctionDef::eager("LN", C, 1, Some(1), fn_ln));
    registry.register(FunctionDef::eager("LOG", C, 1, Some(2), fn_log));
    registry.register(FunctionDef::eager("LOG10", C, 1, Some(1), fn_log10));
}

/// Non-finite results become #NUM!
fn num(n: f64) -> Result<FormulaValue, CellError> {
    if n.is_finite() {
        Ok(FormulaValue::Number(n))
    } else {
        Err(CellError::Num)
    }
}

/// Apply `op` at `digits` decimal places (negative digits work left of the point)
fn round_with(value: f64, digits: f64, op: fn(f64) -> f64) -> f64 {
    let digits = digits.trunc().clamp(-308.0, 308.0) as i32;
    let factor = 10f64.powi(digits.abs());
    let scaled = if digits >= 0 { value * factor } else { value / factor };
    if !scaled.is_finite() {
        return value;
    }
    // 0.3 / 0.1 lands a hair under 3
    let snapped = if (scaled - scaled.round()).abs() < 1e-9 {
        scaled.round()
    } else {
        scaled
    };
    let rounded = op(snapped);
    if digits >= 0 {
        rounded / factor
    } else {
        rounded * factor
    }
}

/// Quotient snapped to the nearest integer when within tolerance
fn snapped_quotient(value: f64, significance: f64) -> f64 {
    let q = value / significance;
    if (q - q.round()).abs() < 1e-9 {
        q.round()
    } else {
        q
    }
}

/// ROUND(number, [num_digits]) - Half away from zero
pub fn fn_round(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let value = number_arg(args, 0)?;
        let digits = opt_number(args, 1, 0.0)?.trunc();
        if digits > 15.0 {
            return num(value);
        }
        num(round_half_away(value, digits.max(-308.0) as i32))
    })
}

/// ROUNDUP(number, [num_digits]) - Away from zero
pub fn fn_roundup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let value = number_arg(args, 0)?;
        let digits = opt_number(args, 1, 0.0)?;
        num(round_with(value, digits, |x| x.signum() * x.abs().ceil()))
    })
}

/// ROUNDDOWN(number, [num_digits]) - Toward zero
pub fn fn_rounddown(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let value = number_arg(args, 0)?;
        let digits = opt_number(args, 1, 0.0)?;
        num(round_with(value, digits, f64::trunc))
    })
}

/// TRUNC(number, [num_digits])
pub fn fn_trunc(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    fn_rounddown(args, ctx)
}

/// FLOOR(number, [significance]) - Down to a multiple of significance
pub fn fn_floor(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let value = number_arg(args, 0)?;
        let significance = opt_number(args, 1, 1.0)?;
        if value == 0.0 {
            return Ok(FormulaValue::Number(0.0));
        }
        if significance == 0.0 {
            return Err(CellError::Div0);
        }
        if value > 0.0 && significance < 0.0 {
            return Err(CellError::Num);
        }
        num(snapped_quotient(value, significance).floor() * significance)
    })
}

/// CEILING(number, [significance]) - Up to a multiple of significance
pub fn fn_ceiling(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let value = number_arg(args, 0)?;
        let significance = opt_number(args, 1, 1.0)?;
        if value == 0.0 || significance == 0.0 {
            return Ok(FormulaValue::Number(0.0));
        }
        if value > 0.0 && significance < 0.0 {
            return Err(CellError::Num);
        }
        num(snapped_quotient(value, significance).ceil() * significance)
    })
}

/// ABS(number)
pub fn fn_abs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| num(number_arg(args, 0)?.abs()))
}

/// POWER(number, power)
pub fn fn_power(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let base = number_arg(args, 0)?;
        let exponent = number_arg(args, 1)?;
        if base == 0.0 && exponent < 0.0 {
            return Err(CellError::Div0);
        }
        num(base.powf(exponent))
    })
}

/// SQRT(number) - #NUM! for negatives
pub fn fn_sqrt(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let n = number_arg(args, 0)?;
        if n < 0.0 {
            return Err(CellError::Num);
        }
        num(n.sqrt())
    })
}

/// MOD(number, divisor) - Result takes the divisor's sign
pub fn fn_mod(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let n = number_arg(args, 0)?;
        let d = number_arg(args, 1)?;
        if d == 0.0 {
            return Err(CellError::Div0);
        }
        num(n - d * snapped_quotient(n, d).floor())
    })
}

/// INT(number) - Down to the nearest integer
pub fn fn_int(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| num(number_arg(args, 0)?.floor()))
}

/// SIGN(number)
pub fn fn_sign(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let n = number_arg(args, 0)?;
        let sign = if n > 0.0 {
            1.0
        } else if n < 0.0 {
            -1.0
        } else {
            0.0
        };
        Ok(FormulaValue::Number(sign))
    })
}

/// PI()
pub fn fn_pi(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(std::f64::consts::PI))
}

/// EXP(number)
pub fn fn_exp(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| num(number_arg(args, 0)?.exp()))
}

/// LN(number) - #NUM! unless positive
pub fn fn_ln(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let n = number_arg(args, 0)?;
        if n <= 0.0 {
            return Err(CellError::Num);
        }
        num(n.ln())
    })
}

/// LOG(number, [base]) - Base 10 by default
pub fn fn_log(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let n = number_arg(args, 0)?;
        let base = opt_number(args, 1, 10.0)?;
        if n <= 0.0 || base <= 0.0 {
            return Err(CellError::Num);
        }
        if base == 1.0 {
            return Err(CellError::Div0);
        }
        if base == 10.0 {
            return num(n.log10());
        }
        num(n.ln() / base.ln())
    })
}

/// LOG10(number)
pub fn fn_log10(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let n = number_arg(args, 0)?;
        if n <= 0.0 {
            return Err(CellError::Num);
        }
        num(n.log10())
    })
}

#[cfg(test)]
mod tests {
    use crate::evaluator::{EvaluationContext, FormulaValue};
    use crate::functions::FunctionRegistry;
    use gridcalc_core::CellError;
    use pretty_assertions::assert_eq;

    fn eval(formula: &str) -> FormulaValue {
        let registry = FunctionRegistry::new();
        EvaluationContext::new(&registry)
            .evaluate_formula(formula)
            .unwrap()
    }

    fn n(v: f64) -> FormulaValue {
        FormulaValue::Number(v)
    }

    fn err(e: CellError) -> FormulaValue {
        FormulaValue::Error(e)
    }

    #[test]
    fn test_round_family() {
        assert_eq!(eval("=ROUND(2.5)"), n(3.0));
        assert_eq!(eval("=ROUND(-2.5)"), n(-3.0));
        assert_eq!(eval("=ROUND(1.005, 2)"), n(1.01));
        assert_eq!(eval("=ROUND(1234.5678, -2)"), n(1200.0));
        assert_eq!(eval("=ROUNDUP(3.2, 0)"), n(4.0));
        assert_eq!(eval("=ROUNDUP(-3.2, 0)"), n(-4.0));
        assert_eq!(eval("=ROUNDUP(3.14159, 3)"), n(3.142));
        assert_eq!(eval("=ROUNDDOWN(-3.7, 0)"), n(-3.0));
        assert_eq!(eval("=ROUNDDOWN(3.14159, 2)"), n(3.14));
        assert_eq!(eval("=ROUNDUP(1234, -2)"), n(1300.0));
        assert_eq!(eval("=TRUNC(-2.5)"), n(-2.0));
        assert_eq!(eval("=INT(-2.5)"), n(-3.0));
    }

    #[test]
    fn test_floor_ceiling() {
        assert_eq!(eval("=FLOOR(7, 2)"), n(6.0));
        assert_eq!(eval("=CEILING(7, 2)"), n(8.0));
        assert_eq!(eval("=FLOOR(-2.5, 2)"), n(-4.0));
        assert_eq!(eval("=CEILING(-2.5, 2)"), n(-2.0));
        assert_eq!(eval("=FLOOR(2.5, 0.5)"), n(2.5));
        assert_eq!(eval("=FLOOR(7, 0)"), err(CellError::Div0));
        assert_eq!(eval("=FLOOR(7, -2)"), err(CellError::Num));
        assert_eq!(eval("=CEILING(7, 0)"), n(0.0));
    }

    #[test]
    fn test_mod() {
        assert_eq!(eval("=MOD(10, 3)"), n(1.0));
        assert_eq!(eval("=MOD(-3, 2)"), n(1.0));
        assert_eq!(eval("=MOD(3, -2)"), n(-1.0));
        assert_eq!(eval("=MOD(5, 0)"), err(CellError::Div0));
    }

    #[test]
    fn test_powers_and_logs() {
        assert_eq!(eval("=POWER(2, 3)"), n(8.0));
        assert_eq!(eval("=SQRT(16)"), n(4.0));
        assert_eq!(eval("=SQRT(-1)"), err(CellError::Num));
        assert_eq!(eval("=EXP(0)"), n(1.0));
        assert_eq!(eval("=LN(0)"), err(CellError::Num));
        assert_eq!(eval("=LOG(100)"), n(2.0));
        assert_eq!(eval("=LOG10(1000)"), n(3.0));
        assert_eq!(eval("=LOG(8, 1)"), err(CellError::Div0));
        match eval("=LOG(8, 2)") {
            FormulaValue::Number(v) => assert!((v - 3.0).abs() < 1e-12),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_misc() {
        assert_eq!(eval("=ABS(-4)"), n(4.0));
        assert_eq!(eval("=SIGN(-0.5)"), n(-1.0));
        assert_eq!(eval("=SIGN(0)"), n(0.0));
        assert_eq!(eval("=PI()"), n(std::f64::consts::PI));
        assert_eq!(eval("=ABS(\"x\")"), err(CellError::Value));
        assert_eq!(eval("=ABS(#N/A)"), err(CellError::Na));
    }
}
