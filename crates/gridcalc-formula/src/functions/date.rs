//! Date and time functions
//!
//! Dates are serial numbers in the 1900 system (see [`gridcalc_core::date`]).
//! Date arguments may also be text such as `"2024-01-31"`; ambiguous slash
//! dates follow the engine's date-order option.

use super::{
    lift, number, number_arg, opt_number, text_arg, FunctionCategory, FunctionDef,
    FunctionRegistry, ValueResult,
};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use chrono::{Datelike, Local, Months, NaiveDate, Timelike};
use gridcalc_core::date::{
    date_to_serial, datetime_to_serial, parse_date, serial_from_parts, serial_to_date,
    serial_to_datetime, serial_to_ymd, SECONDS_PER_DAY,
};
use gridcalc_core::CellError;

pub fn register(registry: &mut FunctionRegistry) {
    const C: FunctionCategory = FunctionCategory::Date;

    registry.register(FunctionDef::eager("DATE", C, 3, Some(3), fn_date));
    registry.register(FunctionDef::eager("TIME", C, 3, Some(3), fn_time));
    registry.register(FunctionDef::eager("DATEDIF", C, 3, Some(3), fn_datedif));
    registry.register(FunctionDef::eager("TODAY", C, 0, Some(0), fn_today));
    registry.register(FunctionDef::eager("NOW", C, 0, Some(0), fn_now));
    registry.register(FunctionDef::eager("YEAR", C, 1, Some(1), fn_year));
    registry.register(FunctionDef::eager("MONTH", C, 1, Some(1), fn_month));
    registry.register(FunctionDef::eager("DAY", C, 1, Some(1), fn_day));
    registry.register(FunctionDef::eager("HOUR", C, 1, Some(1), fn_hour));
    registry.register(FunctionDef::eager("MINUTE", C, 1, Some(1), fn_minute));
    registry.register(FunctionDef::eager("SECOND", C, 1, Some(1), fn_second));
    registry.register(FunctionDef::eager("WEEKDAY", C, 1, Some(2), fn_weekday));
    registry.register(FunctionDef::eager("EDATE", C, 2, Some(2), fn_edate));
    registry.register(FunctionDef::eager("EOMONTH", C, 2, Some(2), fn_eomonth));
    registry.register(FunctionDef::eager("DAYS", C, 2, Some(2), fn_days));
    registry.register(FunctionDef::eager("DATEVALUE", C, 1, Some(1), fn_datevalue));
}

/// Serial number of a date argument; text is parsed as a date
fn serial_arg(args: &[FormulaValue], index: usize, ctx: &EvaluationContext) -> ValueResult<f64> {
    let serial = match args.get(index) {
        Some(FormulaValue::String(s)) => match s.trim().parse::<f64>() {
            Ok(n) => n,
            Err(_) => {
                parse_date(s, ctx.options().date_order())
                    .ok_or(CellError::Value)?
                    .serial
            }
        },
        Some(other) => number(other)?,
        None => return Err(CellError::Value),
    };

    if serial < 0.0 || !serial.is_finite() {
        return Err(CellError::Num);
    }
    Ok(serial)
}

fn date_arg(args: &[FormulaValue], index: usize, ctx: &EvaluationContext) -> ValueResult<NaiveDate> {
    serial_to_date(serial_arg(args, index, ctx)?).ok_or(CellError::Num)
}

/// Shift by whole months, clamping the day to the end of the target month
fn add_months(date: NaiveDate, months: i64) -> ValueResult<NaiveDate> {
    let magnitude = u32::try_from(months.unsigned_abs()).map_err(|_| CellError::Num)?;
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(magnitude))
    } else {
        date.checked_sub_months(Months::new(magnitude))
    };
    shifted.ok_or(CellError::Num)
}

fn serial_result(serial: f64) -> ValueResult<FormulaValue> {
    if serial < 0.0 || !serial.is_finite() {
        return Err(CellError::Num);
    }
    Ok(FormulaValue::Number(serial))
}

/// DATE(year, month, day)
///
/// Years 0-1899 are offsets from 1900. Month and day overflow roll into the
/// neighbouring months and years.
pub fn fn_date(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let mut year = number_arg(args, 0)?.trunc();
        let month = number_arg(args, 1)?.trunc();
        let day = number_arg(args, 2)?.trunc();

        if !(0.0..10000.0).contains(&year) {
            return Err(CellError::Num);
        }
        if year < 1900.0 {
            year += 1900.0;
        }
        if month.abs() > 1e6 || day.abs() > 1e8 {
            return Err(CellError::Num);
        }

        let serial = serial_from_parts(year as i64, month as i64, day as i64).ok_or(CellError::Num)?;
        serial_result(serial)
    })
}

/// TIME(hour, minute, second) - fraction of a day, wrapping past midnight
pub fn fn_time(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let hour = number_arg(args, 0)?.trunc();
        let minute = number_arg(args, 1)?.trunc();
        let second = number_arg(args, 2)?.trunc();

        let total = hour * 3600.0 + minute * 60.0 + second;
        if total < 0.0 || !total.is_finite() {
            return Err(CellError::Num);
        }
        Ok(FormulaValue::Number(
            total.rem_euclid(SECONDS_PER_DAY) / SECONDS_PER_DAY,
        ))
    })
}

/// Whole months from `start` to `end`
fn whole_months(start: NaiveDate, end: NaiveDate) -> i64 {
    let months = (end.year() as i64 - start.year() as i64) * 12 + end.month() as i64
        - start.month() as i64;
    if end.day() < start.day() {
        months - 1
    } else {
        months
    }
}

/// DATEDIF(start_date, end_date, unit)
///
/// Units: `Y` years, `M` months, `D` days, `MD` days ignoring months and
/// years, `YM` months ignoring years, `YD` days ignoring years.
pub fn fn_datedif(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let start_serial = serial_arg(args, 0, ctx)?.trunc();
        let end_serial = serial_arg(args, 1, ctx)?.trunc();
        let unit = text_arg(args, 2)?.to_ascii_uppercase();
        if end_serial < start_serial {
            return Err(CellError::Num);
        }

        let start = serial_to_date(start_serial).ok_or(CellError::Num)?;
        let end = serial_to_date(end_serial).ok_or(CellError::Num)?;
        let months = whole_months(start, end);

        let value = match unit.as_str() {
            "Y" => months / 12,
            "M" => months,
            "D" => (end_serial - start_serial) as i64,
            "YM" => months % 12,
            "MD" => (end - add_months(start, months)?).num_days(),
            "YD" => (end - add_months(start, months / 12 * 12)?).num_days(),
            _ => return Err(CellError::Num),
        };
        Ok(FormulaValue::Number(value as f64))
    })
}

/// TODAY() - serial of the current local date
pub fn fn_today(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(date_to_serial(Local::now().date_naive())))
}

/// NOW() - serial of the current local date and time
pub fn fn_now(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(datetime_to_serial(
        Local::now().naive_local(),
    )))
}

fn ymd_part(
    args: &[FormulaValue],
    ctx: &EvaluationContext,
    part: impl FnOnce((i32, u32, u32)) -> f64,
) -> FormulaResult<FormulaValue> {
    lift(|| {
        let ymd = serial_to_ymd(serial_arg(args, 0, ctx)?).ok_or(CellError::Num)?;
        Ok(FormulaValue::Number(part(ymd)))
    })
}

/// YEAR(serial)
pub fn fn_year(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    ymd_part(args, ctx, |(y, _, _)| y as f64)
}

/// MONTH(serial)
pub fn fn_month(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    ymd_part(args, ctx, |(_, m, _)| m as f64)
}

/// DAY(serial)
pub fn fn_day(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    ymd_part(args, ctx, |(_, _, d)| d as f64)
}

fn time_part(
    args: &[FormulaValue],
    ctx: &EvaluationContext,
    part: impl FnOnce(u32, u32, u32) -> u32,
) -> FormulaResult<FormulaValue> {
    lift(|| {
        let datetime = serial_to_datetime(serial_arg(args, 0, ctx)?).ok_or(CellError::Num)?;
        let value = part(datetime.hour(), datetime.minute(), datetime.second());
        Ok(FormulaValue::Number(value as f64))
    })
}

/// HOUR(serial)
pub fn fn_hour(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    time_part(args, ctx, |h, _, _| h)
}

/// MINUTE(serial)
pub fn fn_minute(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    time_part(args, ctx, |_, m, _| m)
}

/// SECOND(serial)
pub fn fn_second(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    time_part(args, ctx, |_, _, s| s)
}

/// WEEKDAY(serial, [return_type])
///
/// Type 1 numbers Sunday..Saturday as 1..7, type 2 Monday..Sunday as 1..7,
/// type 3 Monday..Sunday as 0..6. Serial 1 is a Sunday, as in the 1900 system.
pub fn fn_weekday(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let serial = serial_arg(args, 0, ctx)?.trunc() as i64;
        let from_sunday = (serial - 1).rem_euclid(7);
        let from_monday = (from_sunday + 6) % 7;

        let value = match opt_number(args, 1, 1.0)?.trunc() as i64 {
            1 => from_sunday + 1,
            2 => from_monday + 1,
            3 => from_monday,
            _ => return Err(CellError::Num),
        };
        Ok(FormulaValue::Number(value as f64))
    })
}

/// EDATE(start_date, months) - same day `months` later, clamped to month end
pub fn fn_edate(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let start = date_arg(args, 0, ctx)?;
        let months = number_arg(args, 1)?.trunc();
        if months.abs() > 1e6 {
            return Err(CellError::Num);
        }
        serial_result(date_to_serial(add_months(start, months as i64)?))
    })
}

/// EOMONTH(start_date, months) - last day of the month `months` later
pub fn fn_eomonth(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let start = date_arg(args, 0, ctx)?;
        let months = number_arg(args, 1)?.trunc();
        if months.abs() > 1e6 {
            return Err(CellError::Num);
        }
        // Day 0 of the following month
        let serial = serial_from_parts(
            start.year() as i64,
            start.month() as i64 + months as i64 + 1,
            0,
        )
        .ok_or(CellError::Num)?;
        serial_result(serial)
    })
}

/// DAYS(end_date, start_date)
pub fn fn_days(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let end = serial_arg(args, 0, ctx)?.trunc();
        let start = serial_arg(args, 1, ctx)?.trunc();
        Ok(FormulaValue::Number(end - start))
    })
}

/// DATEVALUE(date_text) - serial of the date part of a date string
pub fn fn_datevalue(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| match &args[0] {
        FormulaValue::String(s) => {
            let parsed = parse_date(s, ctx.options().date_order()).ok_or(CellError::Value)?;
            Ok(FormulaValue::Number(parsed.serial.floor()))
        }
        FormulaValue::Error(e) => Err(*e),
        _ => Err(CellError::Value),
    })
}

#[cfg(test)]
mod tests {
    use crate::evaluator::{EvaluationContext, FormulaValue};
    use crate::functions::FunctionRegistry;
    use gridcalc_core::{CellError, EngineOptions};
    use pretty_assertions::assert_eq;

    fn eval(formula: &str) -> FormulaValue {
        let registry = FunctionRegistry::new();
        EvaluationContext::new(&registry)
            .evaluate_formula(formula)
            .unwrap()
    }

    fn n(value: f64) -> FormulaValue {
        FormulaValue::Number(value)
    }

    #[test]
    fn test_date() {
        assert_eq!(eval("=DATE(2024,1,1)"), n(45292.0));
        assert_eq!(eval("=DATE(2024,13,1)"), n(45658.0));
        assert_eq!(eval("=DATE(2024,3,0)"), n(45351.0));
        assert_eq!(eval("=DATE(24,1,1)"), n(8767.0));
        assert_eq!(eval("=DATE(1900,3,0)"), n(60.0));
        assert_eq!(eval("=DATE(-1,1,1)"), FormulaValue::Error(CellError::Num));
    }

    #[test]
    fn test_time() {
        assert_eq!(eval("=TIME(12,0,0)"), n(0.5));
        assert_eq!(eval("=TIME(25,0,0)"), eval("=TIME(1,0,0)"));
        assert_eq!(eval("=TIME(0,-1,0)"), FormulaValue::Error(CellError::Num));
    }

    #[test]
    fn test_datedif_units() {
        let dif = |unit: &str| eval(&format!("=DATEDIF(\"2020-01-15\",\"2024-03-10\",\"{}\")", unit));
        assert_eq!(dif("Y"), n(4.0));
        assert_eq!(dif("M"), n(49.0));
        assert_eq!(dif("D"), n(1516.0));
        assert_eq!(dif("MD"), n(24.0));
        assert_eq!(dif("YM"), n(1.0));
        assert_eq!(dif("YD"), n(55.0));
        assert_eq!(dif("x"), FormulaValue::Error(CellError::Num));
    }

    #[test]
    fn test_datedif_end_before_start() {
        assert_eq!(
            eval("=DATEDIF(DATE(2024,1,2),DATE(2024,1,1),\"D\")"),
            FormulaValue::Error(CellError::Num)
        );
        assert_eq!(eval("=DATEDIF(DATE(2024,1,31),DATE(2024,3,1),\"MD\")"), n(1.0));
    }

    #[test]
    fn test_date_parts() {
        assert_eq!(eval("=YEAR(45292)"), n(2024.0));
        assert_eq!(eval("=MONTH(\"2024-07-04\")"), n(7.0));
        assert_eq!(eval("=DAY(DATE(2024,2,29))"), n(29.0));
        assert_eq!(eval("=DAY(60)"), n(29.0));
        assert_eq!(eval("=YEAR(-1)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=YEAR(\"soon\")"), FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_time_parts() {
        assert_eq!(eval("=HOUR(0.75)"), n(18.0));
        assert_eq!(eval("=MINUTE(TIME(1,30,0))"), n(30.0));
        assert_eq!(eval("=SECOND(TIME(1,2,3))"), n(3.0));
        assert_eq!(eval("=HOUR(\"2024-01-01 13:45\")"), n(13.0));
    }

    #[test]
    fn test_weekday() {
        // 2024-01-01 was a Monday
        assert_eq!(eval("=WEEKDAY(45292)"), n(2.0));
        assert_eq!(eval("=WEEKDAY(45292,2)"), n(1.0));
        assert_eq!(eval("=WEEKDAY(45292,3)"), n(0.0));
        assert_eq!(eval("=WEEKDAY(1)"), n(1.0));
        assert_eq!(eval("=WEEKDAY(45292,9)"), FormulaValue::Error(CellError::Num));
    }

    #[test]
    fn test_edate_eomonth_days() {
        assert_eq!(eval("=EDATE(DATE(2024,1,31),1)"), n(45351.0));
        assert_eq!(eval("=EDATE(DATE(2024,3,31),-1)"), n(45351.0));
        assert_eq!(eval("=EOMONTH(DATE(2024,1,15),1)"), n(45351.0));
        assert_eq!(eval("=EOMONTH(DATE(2024,1,15),-1)"), n(45291.0));
        assert_eq!(eval("=DAYS(DATE(2024,3,1),DATE(2024,1,1))"), n(60.0));
    }

    #[test]
    fn test_datevalue() {
        assert_eq!(eval("=DATEVALUE(\"2024-01-01\")"), n(45292.0));
        assert_eq!(eval("=DATEVALUE(\"Jan 1, 2024\")"), n(45292.0));
        assert_eq!(eval("=DATEVALUE(\"nope\")"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=DATEVALUE(45292)"), FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_day_first_option() {
        let registry = FunctionRegistry::new();
        let day_first = EvaluationContext::new(&registry)
            .with_options(EngineOptions::default().with_day_first_dates(true));
        assert_eq!(
            day_first.evaluate_formula("=MONTH(\"02/03/2024\")").unwrap(),
            n(3.0)
        );
        assert_eq!(eval("=MONTH(\"02/03/2024\")"), n(2.0));
    }

    #[test]
    fn test_today_now() {
        let today = match eval("=TODAY()") {
            FormulaValue::Number(v) => v,
            other => panic!("TODAY() = {:?}", other),
        };
        assert!(today > 45000.0);
        assert_eq!(today.fract(), 0.0);

        let now = match eval("=NOW()") {
            FormulaValue::Number(v) => v,
            other => panic!("NOW() = {:?}", other),
        };
        assert!(now >= today);
    }
}
