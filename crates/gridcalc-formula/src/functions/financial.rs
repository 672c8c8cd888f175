//! Financial functions
//!
//! Time-value-of-money functions share the annuity identity
//! `pv*(1+r)^n + pmt*(1+r*type)*((1+r)^n - 1)/r + fv = 0`,
//! with the `r == 0` case handled separately. RATE and IRR solve for the
//! rate with Newton-Raphson.

use super::{
    collect_numbers, lift, number_arg, opt_number, FunctionCategory, FunctionDef,
    FunctionRegistry, ValueResult,
};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use gridcalc_core::CellError;

/// Convergence tolerance on successive iterates
pub const ITERATION_TOLERANCE: f64 = 1.0e-7;

pub fn register(registry: &mut FunctionRegistry) {
    const C: FunctionCategory = FunctionCategory::Financial;

    registry.register(FunctionDef::eager("PV", C, 3, Some(5), fn_pv));
    registry.register(FunctionDef::eager("FV", C, 3, Some(5), fn_fv));
    registry.register(FunctionDef::eager("PMT", C, 3, Some(5), fn_pmt));
    registry.register(FunctionDef::eager("NPER", C, 3, Some(5), fn_nper));
    registry.register(FunctionDef::eager("RATE", C, 3, Some(6), fn_rate));
    registry.register(FunctionDef::eager("NPV", C, 2, None, fn_npv));
    registry.register(FunctionDef::eager("IRR", C, 1, Some(2), fn_irr));
}

/// `((1+rate)^nper, (1+rate)^nper - 1)` computed through `ln_1p`/`exp_m1`
fn pow1p(rate: f64, nper: f64) -> Option<(f64, f64)> {
    let ln1p = rate.ln_1p();
    if !ln1p.is_finite() {
        return None;
    }
    let growth_minus_1 = (nper * ln1p).exp_m1();
    let growth = growth_minus_1 + 1.0;
    (growth.is_finite() && growth_minus_1.is_finite()).then_some((growth, growth_minus_1))
}

/// Payment-timing argument: anything non-zero means start of period
fn payment_type(args: &[FormulaValue], index: usize) -> ValueResult<f64> {
    Ok(if opt_number(args, index, 0.0)? != 0.0 {
        1.0
    } else {
        0.0
    })
}

fn finite(value: f64) -> ValueResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CellError::Num)
    }
}

/// Present value
pub fn pv(rate: f64, nper: f64, pmt: f64, fv: f64, typ: f64) -> ValueResult<f64> {
    if rate == 0.0 {
        return finite(-fv - pmt * nper);
    }
    if rate == -1.0 && nper != 0.0 {
        return Err(CellError::Div0);
    }

    let (growth, growth_minus_1) = pow1p(rate, nper).ok_or(CellError::Num)?;
    if growth == 0.0 {
        return Err(CellError::Div0);
    }
    let pmt_factor = (1.0 + rate * typ) * growth_minus_1 / rate;
    finite(-(fv + pmt * pmt_factor) / growth)
}

/// Future value
pub fn fv(rate: f64, nper: f64, pmt: f64, pv: f64, typ: f64) -> ValueResult<f64> {
    if rate == 0.0 {
        return finite(-(pv + pmt * nper));
    }

    let (growth, growth_minus_1) = pow1p(rate, nper).ok_or(CellError::Num)?;
    let pmt_factor = (1.0 + rate * typ) * growth_minus_1 / rate;
    finite(-(pv * growth + pmt * pmt_factor))
}

/// Periodic payment
pub fn pmt(rate: f64, nper: f64, pv: f64, fv: f64, typ: f64) -> ValueResult<f64> {
    if nper == 0.0 {
        return Err(CellError::Div0);
    }
    if rate == 0.0 {
        return finite(-(pv + fv) / nper);
    }

    let (growth, growth_minus_1) = pow1p(rate, nper).ok_or(CellError::Num)?;
    let pmt_factor = (1.0 + rate * typ) * growth_minus_1 / rate;
    if pmt_factor == 0.0 {
        return Err(CellError::Div0);
    }
    finite(-(pv * growth + fv) / pmt_factor)
}

/// Number of periods
pub fn nper(rate: f64, pmt: f64, pv: f64, fv: f64, typ: f64) -> ValueResult<f64> {
    if rate == 0.0 {
        if pmt == 0.0 {
            return if pv + fv == 0.0 {
                Ok(0.0)
            } else {
                Err(CellError::Num)
            };
        }
        return finite(-(pv + fv) / pmt);
    }

    let ln1p = rate.ln_1p();
    if !ln1p.is_finite() || ln1p == 0.0 {
        return Err(CellError::Num);
    }

    // Solve (1+r)^n = (a - fv) / (pv + a) with a = pmt*(1+r*type)/r
    let a = pmt * (1.0 + rate * typ) / rate;
    if pv + a == 0.0 {
        return Err(CellError::Num);
    }
    let growth = (a - fv) / (pv + a);
    if growth <= 0.0 {
        return Err(CellError::Num);
    }
    finite(growth.ln() / ln1p)
}

/// Newton-Raphson from `guess`
///
/// Returns `Ok(Some(root))` on convergence and `Ok(None)` when the iteration
/// budget runs out; a flat or non-finite step is #NUM!.
fn newton<F>(guess: f64, max_iterations: u32, f: F) -> ValueResult<(f64, Option<f64>)>
where
    F: Fn(f64) -> Option<(f64, f64)>,
{
    let mut x = guess;
    for _ in 0..max_iterations {
        let (fx, dfx) = f(x).ok_or(CellError::Num)?;
        if dfx == 0.0 || !dfx.is_finite() {
            return Err(CellError::Num);
        }

        let next = x - fx / dfx;
        if !next.is_finite() {
            return Err(CellError::Num);
        }
        if (next - x).abs() <= ITERATION_TOLERANCE {
            return Ok((next, Some(next)));
        }
        x = next;
    }
    Ok((x, None))
}

/// Annuity identity and its derivative with respect to the rate
fn rate_equation(rate: f64, nper: f64, pmt: f64, pv: f64, fv: f64, typ: f64) -> Option<(f64, f64)> {
    if rate <= -1.0 {
        return None;
    }

    if rate == 0.0 {
        let value = pv + pmt * nper + fv;
        let slope = nper * pv + pmt * (nper * (nper - 1.0) / 2.0 + typ * nper);
        return Some((value, slope));
    }

    let (growth, growth_minus_1) = pow1p(rate, nper)?;
    let annuity = growth_minus_1 / rate;
    let value = pv * growth + pmt * (1.0 + rate * typ) * annuity + fv;

    // d/dr (1+r)^n = n*(1+r)^(n-1)
    let d_growth = nper * growth / (1.0 + rate);
    let d_annuity = (d_growth * rate - growth_minus_1) / (rate * rate);
    let d_pmt_factor = typ * annuity + (1.0 + rate * typ) * d_annuity;
    let slope = pv * d_growth + pmt * d_pmt_factor;

    (value.is_finite() && slope.is_finite()).then_some((value, slope))
}

/// Interest rate per period; #NUM! unless Newton converges
pub fn rate(
    nper: f64,
    pmt: f64,
    pv: f64,
    fv: f64,
    typ: f64,
    guess: f64,
    max_iterations: u32,
) -> ValueResult<f64> {
    if nper <= 0.0 || guess <= -1.0 {
        return Err(CellError::Num);
    }

    let (_, root) = newton(guess, max_iterations, |r| {
        rate_equation(r, nper, pmt, pv, fv, typ)
    })?;
    root.ok_or(CellError::Num)
}

/// Net present value of cash flows at the end of periods 1, 2, ...
pub fn npv(rate: f64, values: &[f64]) -> ValueResult<f64> {
    if rate == -1.0 {
        return Err(CellError::Div0);
    }
    let mut total = 0.0;
    let mut discount = 1.0;
    for value in values {
        discount *= 1.0 + rate;
        total += value / discount;
    }
    finite(total)
}

/// Internal rate of return of cash flows at periods 0, 1, ...
///
/// When the iteration budget runs out the last iterate is returned as the
/// best available estimate.
pub fn irr(values: &[f64], guess: f64, max_iterations: u32) -> ValueResult<f64> {
    let has_positive = values.iter().any(|v| *v > 0.0);
    let has_negative = values.iter().any(|v| *v < 0.0);
    if !has_positive || !has_negative || guess <= -1.0 {
        return Err(CellError::Num);
    }

    let (last, root) = newton(guess, max_iterations, |r| {
        if r <= -1.0 {
            return None;
        }
        let base = 1.0 + r;
        let mut value = 0.0;
        let mut slope = 0.0;
        for (i, cash) in values.iter().enumerate() {
            let t = i as f64;
            value += cash / base.powf(t);
            slope -= t * cash / base.powf(t + 1.0);
        }
        Some((value, slope))
    })?;
    finite(root.unwrap_or(last))
}

/// PV(rate, nper, pmt, [fv], [type])
pub fn fn_pv(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let value = pv(
            number_arg(args, 0)?,
            number_arg(args, 1)?,
            number_arg(args, 2)?,
            opt_number(args, 3, 0.0)?,
            payment_type(args, 4)?,
        )?;
        Ok(FormulaValue::Number(value))
    })
}

/// FV(rate, nper, pmt, [pv], [type])
pub fn fn_fv(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let value = fv(
            number_arg(args, 0)?,
            number_arg(args, 1)?,
            number_arg(args, 2)?,
            opt_number(args, 3, 0.0)?,
            payment_type(args, 4)?,
        )?;
        Ok(FormulaValue::Number(value))
    })
}

/// PMT(rate, nper, pv, [fv], [type])
pub fn fn_pmt(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let value = pmt(
            number_arg(args, 0)?,
            number_arg(args, 1)?,
            number_arg(args, 2)?,
            opt_number(args, 3, 0.0)?,
            payment_type(args, 4)?,
        )?;
        Ok(FormulaValue::Number(value))
    })
}

/// NPER(rate, pmt, pv, [fv], [type])
pub fn fn_nper(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let value = nper(
            number_arg(args, 0)?,
            number_arg(args, 1)?,
            number_arg(args, 2)?,
            opt_number(args, 3, 0.0)?,
            payment_type(args, 4)?,
        )?;
        Ok(FormulaValue::Number(value))
    })
}

/// RATE(nper, pmt, pv, [fv], [type], [guess])
pub fn fn_rate(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let value = rate(
            number_arg(args, 0)?,
            number_arg(args, 1)?,
            number_arg(args, 2)?,
            opt_number(args, 3, 0.0)?,
            payment_type(args, 4)?,
            opt_number(args, 5, 0.1)?,
            ctx.options().max_iterations,
        )?;
        Ok(FormulaValue::Number(value))
    })
}

/// NPV(rate, value1, [value2], ...)
pub fn fn_npv(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let rate = number_arg(args, 0)?;
        let values = collect_numbers(&args[1..])?;
        Ok(FormulaValue::Number(npv(rate, &values)?))
    })
}

/// IRR(values, [guess])
pub fn fn_irr(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let values = collect_numbers(&args[..1])?;
        let guess = opt_number(args, 1, 0.1)?;
        let value = irr(&values, guess, ctx.options().max_iterations)?;
        Ok(FormulaValue::Number(value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionRegistry;
    use gridcalc_core::EngineOptions;
    use pretty_assertions::assert_eq;

    fn eval(formula: &str) -> FormulaValue {
        let registry = FunctionRegistry::new();
        EvaluationContext::new(&registry)
            .evaluate_formula(formula)
            .unwrap()
    }

    fn assert_approx(formula: &str, expected: f64, tolerance: f64) {
        match eval(formula) {
            FormulaValue::Number(n) => assert!(
                (n - expected).abs() <= tolerance,
                "{} = {}, expected {}",
                formula,
                n,
                expected
            ),
            other => panic!("{} = {:?}, expected a number", formula, other),
        }
    }

    #[test]
    fn test_pmt() {
        assert_eq!(eval("=PMT(0,12,1200)"), FormulaValue::Number(-100.0));
        assert_approx("=PMT(0.05/12,360,200000)", -1073.643, 1e-3);
        assert_eq!(eval("=PMT(0.05,0,100)"), FormulaValue::Error(CellError::Div0));
    }

    #[test]
    fn test_pv_fv() {
        assert_eq!(eval("=PV(0,10,-100)"), FormulaValue::Number(1000.0));
        assert_approx("=FV(0.05,10,-100)", 1257.789, 1e-3);
        assert_eq!(eval("=FV(0,10,-100,-50)"), FormulaValue::Number(1050.0));
        // Payments at the start of each period earn one more period of interest
        assert_approx("=FV(0.05,10,-100,0,1)", 1257.789 * 1.05, 1e-3);
    }

    #[test]
    fn test_nper() {
        assert_eq!(eval("=NPER(0,-100,1000)"), FormulaValue::Number(10.0));
        assert_approx("=PV(0.01,NPER(0.01,-100,1000),-100)", 1000.0, 1e-6);
        assert_eq!(eval("=NPER(0,0,100)"), FormulaValue::Error(CellError::Num));
    }

    #[test]
    fn test_rate_matches_annuity_identity() {
        assert_approx("=PV(RATE(12,-100,1000),12,-100)", 1000.0, 1e-6);
        assert_approx("=PMT(RATE(360,-1073.64,200000),360,200000)", -1073.64, 1e-6);
        assert_eq!(eval("=RATE(0,-100,1000)"), FormulaValue::Error(CellError::Num));
    }

    #[test]
    fn test_rate_respects_iteration_limit() {
        let registry = FunctionRegistry::new();
        let ctx = EvaluationContext::new(&registry)
            .with_options(EngineOptions::default().with_max_iterations(1));
        assert_eq!(
            ctx.evaluate_formula("=RATE(12,-100,1000)").unwrap(),
            FormulaValue::Error(CellError::Num)
        );
    }

    #[test]
    fn test_npv() {
        assert_approx("=NPV(0.1,100,100)", 100.0 / 1.1 + 100.0 / 1.21, 1e-9);
        assert_approx("=NPV(0.1,{100,100})", 100.0 / 1.1 + 100.0 / 1.21, 1e-9);
        assert_eq!(eval("=NPV(-1,100)"), FormulaValue::Error(CellError::Div0));
    }

    #[test]
    fn test_irr() {
        assert_approx("=IRR({-1000,300,400,500})", 0.088963, 1e-6);
        assert_approx(
            "=-1000+NPV(IRR({-1000,300,400,500}),300,400,500)",
            0.0,
            1e-6,
        );
        assert_eq!(eval("=IRR({100,200})"), FormulaValue::Error(CellError::Num));
    }

    #[test]
    fn test_irr_returns_last_iterate_when_budget_runs_out() {
        let values = [-1000.0, 300.0, 400.0, 500.0];
        let estimate = irr(&values, 0.1, 1).unwrap();
        assert!(estimate != 0.1);
        assert!((estimate - 0.088963).abs() < 0.01);
    }
}
