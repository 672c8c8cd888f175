//! Text functions
//!
//! Positions and lengths count characters, not bytes.

use super::criteria::{has_wildcards, wildcard_to_regex};
use super::{
    flatten, lift, number, opt_number, text, text_arg, FunctionCategory, FunctionDef,
    FunctionRegistry, ValueResult,
};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use gridcalc_core::date::parse_date_serial;
use gridcalc_core::{format_number, CellError};
use regex::RegexBuilder;

pub fn register(registry: &mut FunctionRegistry) {
    const C: FunctionCategory = FunctionCategory::Text;

    registry.register(FunctionDef::eager("LEFT", C, 1, Some(2), fn_left));
    registry.register(FunctionDef::eager("RIGHT", C, 1, Some(2), fn_right));
    registry.register(FunctionDef::eager("MID", C, 3, Some(3), fn_mid));
    registry.register(FunctionDef::eager("LEN", C, 1, Some(1), fn_len));
    registry.register(FunctionDef::eager("UPPER", C, 1, Some(1), fn_upper));
    registry.register(FunctionDef::eager("LOWER", C, 1, Some(1), fn_lower));
    registry.register(FunctionDef::eager("PROPER", C, 1, Some(1), fn_proper));
    registry.register(FunctionDef::eager("TRIM", C, 1, Some(1), fn_trim));
    registry.register(FunctionDef::eager("SUBSTITUTE", C, 3, Some(4), fn_substitute));
    registry.register(FunctionDef::eager("REPLACE", C, 4, Some(4), fn_replace));
    registry.register(FunctionDef::eager("FIND", C, 2, Some(3), fn_find));
    registry.register(FunctionDef::eager("SEARCH", C, 2, Some(3), fn_search));
    registry.register(FunctionDef::eager("CONCATENATE", C, 1, None, fn_concatenate));
    registry.register(FunctionDef::eager("CONCAT", C, 1, None, fn_concat).ignoring_blanks());
    registry.register(FunctionDef::eager("REPT", C, 2, Some(2), fn_rept));
    registry.register(FunctionDef::eager("TEXT", C, 2, Some(2), fn_text));
    registry.register(FunctionDef::eager("VALUE", C, 1, Some(1), fn_value));
    registry.register(FunctionDef::eager("EXACT", C, 2, Some(2), fn_exact));
}

fn string(s: String) -> ValueResult<FormulaValue> {
    Ok(FormulaValue::String(s))
}

/// Non-negative character count
fn count_arg(args: &[FormulaValue], index: usize, default: f64) -> ValueResult<usize> {
    let n = opt_number(args, index, default)?;
    if n < 0.0 {
        return Err(CellError::Value);
    }
    Ok(n.trunc() as usize)
}

/// 1-based character position
fn position_arg(args: &[FormulaValue], index: usize, default: f64) -> ValueResult<usize> {
    let n = opt_number(args, index, default)?;
    if n < 1.0 {
        return Err(CellError::Value);
    }
    Ok(n.trunc() as usize)
}

/// LEFT(text, [num_chars])
pub fn fn_left(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let s = text_arg(args, 0)?;
        let n = count_arg(args, 1, 1.0)?;
        string(s.chars().take(n).collect())
    })
}

/// RIGHT(text, [num_chars])
pub fn fn_right(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let s = text_arg(args, 0)?;
        let n = count_arg(args, 1, 1.0)?;
        let len = s.chars().count();
        string(s.chars().skip(len.saturating_sub(n)).collect())
    })
}

/// MID(text, start_num, num_chars)
pub fn fn_mid(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let s = text_arg(args, 0)?;
        let start = position_arg(args, 1, 1.0)?;
        let n = count_arg(args, 2, 0.0)?;
        string(s.chars().skip(start - 1).take(n).collect())
    })
}

/// LEN(text)
pub fn fn_len(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Number(text_arg(args, 0)?.chars().count() as f64)))
}

/// UPPER(text)
pub fn fn_upper(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| string(text_arg(args, 0)?.to_uppercase()))
}

/// LOWER(text)
pub fn fn_lower(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| string(text_arg(args, 0)?.to_lowercase()))
}

/// PROPER(text) - Capitalizes the first letter of each word
pub fn fn_proper(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let s = text_arg(args, 0)?;
        let mut out = String::with_capacity(s.len());
        let mut word_start = true;
        for c in s.chars() {
            if c.is_alphabetic() {
                if word_start {
                    out.extend(c.to_uppercase());
                } else {
                    out.extend(c.to_lowercase());
                }
                word_start = false;
            } else {
                out.push(c);
                word_start = true;
            }
        }
        string(out)
    })
}

/// TRIM(text) - Strips outer spaces and collapses inner runs to one
pub fn fn_trim(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let s = text_arg(args, 0)?;
        string(s.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" "))
    })
}

/// SUBSTITUTE(text, old_text, new_text, [instance_num])
pub fn fn_substitute(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let s = text_arg(args, 0)?;
        let old = text_arg(args, 1)?;
        let new = text_arg(args, 2)?;

        if old.is_empty() {
            return string(s);
        }

        if args.len() < 4 {
            return string(s.replace(&old, &new));
        }

        let instance = position_arg(args, 3, 1.0)?;
        match s.match_indices(&old).nth(instance - 1) {
            Some((at, _)) => {
                let mut out = String::with_capacity(s.len() + new.len());
                out.push_str(&s[..at]);
                out.push_str(&new);
                out.push_str(&s[at + old.len()..]);
                string(out)
            }
            None => string(s),
        }
    })
}

/// REPLACE(old_text, start_num, num_chars, new_text)
pub fn fn_replace(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let s = text_arg(args, 0)?;
        let start = position_arg(args, 1, 1.0)?;
        let n = count_arg(args, 2, 0.0)?;
        let new = text_arg(args, 3)?;

        let mut out: String = s.chars().take(start - 1).collect();
        out.push_str(&new);
        out.extend(s.chars().skip((start - 1).saturating_add(n)));
        string(out)
    })
}

/// Byte offset of the `start`-th character (1-based), allowing one past the end
fn char_offset(s: &str, start: usize) -> ValueResult<usize> {
    if start == 1 {
        return Ok(0);
    }
    match s.char_indices().nth(start - 1) {
        Some((offset, _)) => Ok(offset),
        None if s.chars().count() + 1 == start => Ok(s.len()),
        None => Err(CellError::Value),
    }
}

fn char_position(s: &str, byte_offset: usize) -> f64 {
    (s[..byte_offset].chars().count() + 1) as f64
}

/// FIND(find_text, within_text, [start_num]) - Case-sensitive, no wildcards
pub fn fn_find(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let needle = text_arg(args, 0)?;
        let haystack = text_arg(args, 1)?;
        let start = position_arg(args, 2, 1.0)?;
        let from = char_offset(&haystack, start)?;

        haystack[from..]
            .find(&needle)
            .map(|at| FormulaValue::Number(char_position(&haystack, from + at)))
            .ok_or(CellError::Value)
    })
}

/// SEARCH(find_text, within_text, [start_num]) - Case-insensitive, `*` and `?` wildcards
pub fn fn_search(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let needle = text_arg(args, 0)?;
        let haystack = text_arg(args, 1)?;
        let start = position_arg(args, 2, 1.0)?;
        let from = char_offset(&haystack, start)?;

        let pattern = if has_wildcards(&needle) {
            wildcard_to_regex(&needle)
        } else {
            regex::escape(&needle)
        };
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|_| CellError::Value)?;

        regex
            .find_at(&haystack, from)
            .map(|m| FormulaValue::Number(char_position(&haystack, m.start())))
            .ok_or(CellError::Value)
    })
}

/// CONCATENATE(text1, [text2], ...)
pub fn fn_concatenate(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let mut out = String::new();
        for arg in args {
            out.push_str(&text(arg)?);
        }
        string(out)
    })
}

/// CONCAT(text1, [text2], ...) - Like CONCATENATE, but ranges are joined cell by cell
pub fn fn_concat(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let mut out = String::new();
        for value in flatten(args) {
            out.push_str(&text(value)?);
        }
        string(out)
    })
}

/// REPT(text, number_times)
pub fn fn_rept(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let s = text_arg(args, 0)?;
        let times = count_arg(args, 1, 0.0)?;
        if s.len().saturating_mul(times) > 32_767 {
            return Err(CellError::Value);
        }
        string(s.repeat(times))
    })
}

/// TEXT(value, format_text) - Renders a number with a format code; other text passes through
pub fn fn_text(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let format = text_arg(args, 1)?;
        let rendered = match &args[0] {
            FormulaValue::String(s) => match s.trim().parse::<f64>() {
                Ok(n) => format_number(n, &format),
                Err(_) => s.clone(),
            },
            other => format_number(number(other)?, &format),
        };
        string(rendered)
    })
}

/// VALUE(text) - Numbers, percentages, currency and dates
pub fn fn_value(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let s = match &args[0] {
            FormulaValue::Number(n) => return Ok(FormulaValue::Number(*n)),
            FormulaValue::Empty => return Ok(FormulaValue::Number(0.0)),
            other => text(other)?,
        };
        parse_value(&s, ctx.options().prefer_day_first_dates)
            .map(FormulaValue::Number)
            .ok_or(CellError::Value)
    })
}

fn parse_value(s: &str, prefer_day_first: bool) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };
    let (percent, body) = match unsigned.strip_suffix('%') {
        Some(rest) => (true, rest.trim_end()),
        None => (false, unsigned),
    };
    let body = body.strip_prefix('$').unwrap_or(body).replace(',', "");

    if let Ok(n) = body.parse::<f64>() {
        let n = if percent { n / 100.0 } else { n };
        return Some(if negative { -n } else { n });
    }

    parse_date_serial(trimmed, prefer_day_first)
}

/// EXACT(text1, text2) - Case-sensitive comparison
pub fn fn_exact(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Boolean(text_arg(args, 0)? == text_arg(args, 1)?)))
}
