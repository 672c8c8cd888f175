//! Number formatting for display
//!
//! Renders a numeric cell value through an Excel-style format code. The
//! supported subset covers what generated sheets use in practice:
//!
//! - `General` (and empty / `@`)
//! - date and time codes (`YYYY-MM-DD`, `MMM D, YYYY`, `h:mm AM/PM`, ...)
//! - currency (`$#,##0.00`), percentages (`0.0%`), thousands (`#,##0`)
//! - fixed decimals (`0.000`) and scientific (`0.00E+00`)
//!
//! Only the first `;`-separated section of a code is used.

use crate::cell::CellError;
use crate::date::{serial_to_date, serial_to_datetime, serial_to_ymd, DAY_NAMES, MONTH_NAMES};
use chrono::{Datelike, Timelike};

/// Format `value` with an Excel-style format code
///
/// ```
/// use gridcalc_core::format_number;
///
/// assert_eq!(format_number(1234.56, "$#,##0.00"), "$1,234.56");
/// assert_eq!(format_number(0.5, "0.00%"), "50.00%");
/// assert_eq!(format_number(45292.0, "YYYY-MM-DD"), "2024-01-01");
/// ```
pub fn format_number(value: f64, code: &str) -> String {
    if !value.is_finite() {
        return CellError::Num.as_str().to_string();
    }

    let section = first_section(code).trim();
    if section.is_empty() || section.eq_ignore_ascii_case("general") || section == "@" {
        return format_general(value);
    }

    let bare = strip_literals(section);
    if is_date_format(&bare) {
        return format_date(value, section).unwrap_or_else(|| format_general(value));
    }

    let decimals = decimal_places(&bare);
    let thousands = bare.contains(',');

    if bare.contains('$') {
        format_currency(value, decimals, thousands)
    } else if bare.contains('%') {
        format!("{}%", format_fixed(value * 100.0, decimals, thousands))
    } else if bare.to_ascii_uppercase().contains("E+") || bare.to_ascii_uppercase().contains("E-") {
        format_scientific(value, decimals)
    } else {
        format_fixed(value, decimals, thousands)
    }
}

/// General format: integers without a decimal point, otherwise up to 10 decimals
pub fn format_general(value: f64) -> String {
    if !value.is_finite() {
        return CellError::Num.as_str().to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let abs_value = value.abs();
    if abs_value >= 1e15 || abs_value < 1e-10 {
        return format_scientific_trimmed(value);
    }

    if value.fract() == 0.0 {
        return format!("{:.0}", value);
    }

    let formatted = format!("{:.10}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Round half away from zero to `digits` decimal places (negative digits round left of the point)
pub fn round_half_away(value: f64, digits: i32) -> f64 {
    if digits < 0 {
        let divisor = 10f64.powi(-digits);
        return (value / divisor).round() * divisor;
    }
    let multiplier = 10f64.powi(digits);
    let scaled = value * multiplier;
    // Absorb representation error such as 1.005 * 100 = 100.49999999999999
    let nudged = scaled + scaled.signum() * scaled.abs() * f64::EPSILON * 4.0;
    nudged.round() / multiplier
}

/// Fixed decimals, optionally with thousands separators
pub fn format_fixed(value: f64, decimals: usize, thousands: bool) -> String {
    let rounded = round_half_away(value, decimals as i32);
    let body = format!("{:.*}", decimals, rounded.abs());
    let body = if thousands {
        add_thousands_separator(&body)
    } else {
        body
    };

    if rounded < 0.0 {
        format!("-{}", body)
    } else {
        body
    }
}

/// Currency with the sign outside the symbol: `-$1,234.56`
fn format_currency(value: f64, decimals: usize, thousands: bool) -> String {
    let body = format_fixed(value.abs(), decimals, thousands);
    if round_half_away(value, decimals as i32) < 0.0 {
        format!("-${}", body)
    } else {
        format!("${}", body)
    }
}

fn format_scientific(value: f64, decimals: usize) -> String {
    let raw = format!("{:.*e}", decimals, value);
    excel_exponent(&raw)
}

fn format_scientific_trimmed(value: f64) -> String {
    let raw = format!("{:.5e}", value);
    let (mantissa, exponent) = raw.split_once('e').unwrap_or((raw.as_str(), "0"));
    let mantissa = if mantissa.contains('.') {
        mantissa.trim_end_matches('0').trim_end_matches('.')
    } else {
        mantissa
    };
    excel_exponent(&format!("{}e{}", mantissa, exponent))
}

/// `1.5e3` -> `1.5E+03`
fn excel_exponent(raw: &str) -> String {
    match raw.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}E{}{:02}", mantissa, sign, exponent.abs())
        }
        None => raw.to_string(),
    }
}

fn add_thousands_separator(s: &str) -> String {
    let (integer_part, decimal_part) = match s.split_once('.') {
        Some((i, d)) => (i, Some(d)),
        None => (s, None),
    };

    let len = integer_part.len();
    let mut result = String::with_capacity(s.len() + len / 3);
    for (i, c) in integer_part.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    if let Some(decimal) = decimal_part {
        result.push('.');
        result.push_str(decimal);
    }

    result
}

/// Number of `0` placeholders after the decimal point
fn decimal_places(bare: &str) -> usize {
    match bare.find('.') {
        Some(dot) => bare[dot + 1..]
            .chars()
            .take_while(|c| matches!(c, '0' | '#'))
            .filter(|&c| c == '0')
            .count(),
        None => 0,
    }
}

/// The section of a code used for positive numbers
fn first_section(code: &str) -> &str {
    let mut in_quotes = false;
    for (i, c) in code.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => return &code[..i],
            _ => {}
        }
    }
    code
}

/// Drop quoted text, escaped characters and `[...]` modifiers
fn strip_literals(code: &str) -> String {
    let mut result = String::with_capacity(code.len());
    let mut chars = code.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                for q in chars.by_ref() {
                    if q == '"' {
                        break;
                    }
                }
            }
            '\\' => {
                chars.next();
            }
            '[' => {
                for q in chars.by_ref() {
                    if q == ']' {
                        break;
                    }
                }
            }
            _ => result.push(c),
        }
    }
    result
}

/// Whether a code (with literals stripped) contains date or time tokens
pub fn is_date_format(bare: &str) -> bool {
    bare.chars()
        .any(|c| matches!(c.to_ascii_lowercase(), 'y' | 'm' | 'd' | 'h' | 's'))
}

#[derive(Debug, Clone, PartialEq)]
enum DateToken {
    Year(usize),
    Month(usize),
    Minute(usize),
    Day(usize),
    Hour(usize),
    Second(usize),
    AmPm { lower: bool },
    AP { lower: bool },
    Literal(String),
}

fn tokenize_date(code: &str) -> Vec<DateToken> {
    let chars: Vec<char> = code.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let ahead = |n: usize| chars[i..].iter().take(n).collect::<String>();

        if ahead(5).eq_ignore_ascii_case("am/pm") {
            tokens.push(DateToken::AmPm {
                lower: c.is_ascii_lowercase(),
            });
            i += 5;
            continue;
        }
        if ahead(3).eq_ignore_ascii_case("a/p") {
            tokens.push(DateToken::AP {
                lower: c.is_ascii_lowercase(),
            });
            i += 3;
            continue;
        }

        match c {
            '"' => {
                let literal: String = chars[i + 1..].iter().take_while(|&&q| q != '"').collect();
                i += literal.chars().count() + 2;
                tokens.push(DateToken::Literal(literal));
            }
            '\\' => {
                if let Some(&next) = chars.get(i + 1) {
                    tokens.push(DateToken::Literal(next.to_string()));
                }
                i += 2;
            }
            '[' => {
                while i < chars.len() && chars[i] != ']' {
                    i += 1;
                }
                i += 1;
            }
            _ if matches!(c.to_ascii_lowercase(), 'y' | 'm' | 'd' | 'h' | 's') => {
                // Take the whole run so MMMM wins over MMM, MM and M
                let mut run = 1;
                while i + run < chars.len() && chars[i + run].eq_ignore_ascii_case(&c) {
                    run += 1;
                }
                tokens.push(match c.to_ascii_lowercase() {
                    'y' => DateToken::Year(run),
                    'm' => DateToken::Month(run),
                    'd' => DateToken::Day(run),
                    'h' => DateToken::Hour(run),
                    _ => DateToken::Second(run),
                });
                i += run;
            }
            _ => {
                tokens.push(DateToken::Literal(c.to_string()));
                i += 1;
            }
        }
    }

    resolve_minutes(&mut tokens);
    tokens
}

/// `m`/`mm` next to an hour or seconds token means minutes
fn resolve_minutes(tokens: &mut [DateToken]) {
    let is_field = |t: &DateToken| !matches!(t, DateToken::Literal(_));

    for i in 0..tokens.len() {
        let run = match tokens[i] {
            DateToken::Month(run) if run <= 2 => run,
            _ => continue,
        };
        let after_hour = tokens[..i]
            .iter()
            .rev()
            .find(|t| is_field(t))
            .map_or(false, |t| matches!(t, DateToken::Hour(_)));
        let before_second = tokens[i + 1..]
            .iter()
            .find(|t| is_field(t))
            .map_or(false, |t| matches!(t, DateToken::Second(_)));
        if after_hour || before_second {
            tokens[i] = DateToken::Minute(run);
        }
    }
}

fn format_date(value: f64, code: &str) -> Option<String> {
    let datetime = serial_to_datetime(value)?;
    let (year, month, day) = serial_to_ymd(value)?;
    let weekday = serial_to_date(value)?.weekday().num_days_from_sunday() as usize;

    let tokens = tokenize_date(code);
    let twelve_hour = tokens
        .iter()
        .any(|t| matches!(t, DateToken::AmPm { .. } | DateToken::AP { .. }));
    let hour = datetime.hour();
    let display_hour = if twelve_hour {
        match hour % 12 {
            0 => 12,
            h => h,
        }
    } else {
        hour
    };
    let month_name = MONTH_NAMES[(month - 1) as usize];
    let day_name = DAY_NAMES[weekday];

    let mut out = String::new();
    for token in &tokens {
        match token {
            DateToken::Year(n) if *n <= 2 => out.push_str(&format!("{:02}", year.rem_euclid(100))),
            DateToken::Year(_) => out.push_str(&format!("{:04}", year)),
            DateToken::Month(1) => out.push_str(&month.to_string()),
            DateToken::Month(2) => out.push_str(&format!("{:02}", month)),
            DateToken::Month(3) => out.push_str(&month_name[..3]),
            DateToken::Month(4) => out.push_str(month_name),
            DateToken::Month(_) => out.push_str(&month_name[..1]),
            DateToken::Day(1) => out.push_str(&day.to_string()),
            DateToken::Day(2) => out.push_str(&format!("{:02}", day)),
            DateToken::Day(3) => out.push_str(&day_name[..3]),
            DateToken::Day(_) => out.push_str(day_name),
            DateToken::Hour(1) => out.push_str(&display_hour.to_string()),
            DateToken::Hour(_) => out.push_str(&format!("{:02}", display_hour)),
            DateToken::Minute(1) => out.push_str(&datetime.minute().to_string()),
            DateToken::Minute(_) => out.push_str(&format!("{:02}", datetime.minute())),
            DateToken::Second(1) => out.push_str(&datetime.second().to_string()),
            DateToken::Second(_) => out.push_str(&format!("{:02}", datetime.second())),
            DateToken::AmPm { lower } => {
                let marker = if hour < 12 { "AM" } else { "PM" };
                out.push_str(&if *lower { marker.to_ascii_lowercase() } else { marker.to_string() });
            }
            DateToken::AP { lower } => {
                let marker = if hour < 12 { "A" } else { "P" };
                out.push_str(&if *lower { marker.to_ascii_lowercase() } else { marker.to_string() });
            }
            DateToken::Literal(s) => out.push_str(s),
        }
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_general() {
        assert_eq!(format_general(42.0), "42");
        assert_eq!(format_general(-3.5), "-3.5");
        assert_eq!(format_general(0.1 + 0.2), "0.3");
        assert_eq!(format_general(1.0 / 3.0), "0.3333333333");
        assert_eq!(format_general(-0.0), "0");
        assert_eq!(format_general(1e20), "1E+20");
        assert_eq!(format_number(7.25, "General"), "7.25");
        assert_eq!(format_number(7.25, ""), "7.25");
    }

    #[test]
    fn test_currency() {
        assert_eq!(format_number(1234.56, "$#,##0.00"), "$1,234.56");
        assert_eq!(format_number(-1234.56, "$#,##0.00"), "-$1,234.56");
        assert_eq!(format_number(1234567.0, "$#,##0"), "$1,234,567");
        assert_eq!(format_number(9.999, "$0.00"), "$10.00");
        assert_eq!(format_number(-0.001, "$0.00"), "$0.00");
    }

    #[test]
    fn test_percent() {
        assert_eq!(format_number(0.5, "0.00%"), "50.00%");
        assert_eq!(format_number(0.125, "0%"), "13%");
        assert_eq!(format_number(-0.0525, "0.0%"), "-5.3%");
    }

    #[test]
    fn test_fixed_and_thousands() {
        assert_eq!(format_number(1234.5678, "0.00"), "1234.57");
        assert_eq!(format_number(1234.5678, "#,##0"), "1,235");
        assert_eq!(format_number(-1234567.891, "#,##0.0"), "-1,234,567.9");
        assert_eq!(format_number(2.5, "0"), "3");
        assert_eq!(format_number(-2.5, "0"), "-3");
        assert_eq!(format_number(1.005, "0.00"), "1.01");
        assert_eq!(format_number(12.0, "0.000"), "12.000");
    }

    #[test]
    fn test_scientific() {
        assert_eq!(format_number(12345.0, "0.00E+00"), "1.23E+04");
        assert_eq!(format_number(0.000123, "0.0E+00"), "1.2E-04");
    }

    #[test]
    fn test_non_finite() {
        assert_eq!(format_number(f64::NAN, "0.00"), "#NUM!");
        assert_eq!(format_number(f64::INFINITY, "$#,##0"), "#NUM!");
    }

    #[test]
    fn test_dates() {
        let serial = 45306.0; // 2024-01-15, a Monday
        assert_eq!(format_number(serial, "YYYY-MM-DD"), "2024-01-15");
        assert_eq!(format_number(serial, "MM/DD/YYYY"), "01/15/2024");
        assert_eq!(format_number(serial, "DD/MM/YYYY"), "15/01/2024");
        assert_eq!(format_number(serial, "DD-MMM-YYYY"), "15-Jan-2024");
        assert_eq!(format_number(serial, "MMM D, YYYY"), "Jan 15, 2024");
        assert_eq!(format_number(serial, "D MMM YYYY"), "15 Jan 2024");
        assert_eq!(format_number(serial, "dddd, mmmm d, yy"), "Monday, January 15, 24");
        assert_eq!(format_number(60.0, "yyyy-mm-dd"), "1900-02-29");
    }

    #[test]
    fn test_times() {
        let serial = 45306.0 + 13.0 / 24.0 + 5.0 / 1440.0 + 9.0 / 86400.0;
        assert_eq!(format_number(serial, "hh:mm:ss"), "13:05:09");
        assert_eq!(format_number(serial, "h:mm AM/PM"), "1:05 PM");
        assert_eq!(format_number(serial, "YYYY-MM-DD hh:mm"), "2024-01-15 13:05");
        assert_eq!(format_number(0.0, "h:mm am/pm"), "12:00 am");
        // m between seconds-free tokens stays a month
        assert_eq!(format_number(serial, "m/d"), "1/15");
    }

    #[test]
    fn test_literals_pass_through() {
        assert_eq!(format_number(45306.0, "\"Due:\" yyyy"), "Due: 2024");
        assert_eq!(format_number(45306.0, "yyyy\\hmm"), "2024h01");
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        assert_eq!(round_half_away(2.5, 0), 3.0);
        assert_eq!(round_half_away(-2.5, 0), -3.0);
        assert_eq!(round_half_away(1234.0, -2), 1200.0);
        assert_eq!(round_half_away(0.125, 2), 0.13);
    }
}
