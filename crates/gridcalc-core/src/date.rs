//! Serial dates in the 1900 date system
//!
//! Spreadsheets store dates as serial day numbers where 1900-01-01 is day 1
//! and the time of day is the fractional part (`h/24 + m/1440 + s/86400`).
//!
//! Notes:
//! - The 1900 system keeps the historical "1900 leap year" bug: serial 60 is
//!   the non-existent 1900-02-29, so every serial from 1900-03-01 on matches
//!   what spreadsheet software shows (2024-01-01 is 45292).
//! - Text recognition covers the handful of layouts people actually type:
//!   ISO, slash dates, and dates with month names.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

/// Days from 0001-01-01 (day 1) to 1899-12-30, the day before serial 1 minus the leap bug
const EPOCH_DAYS_FROM_CE: i64 = 693_594;

/// Seconds in a day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// How to read an ambiguous `A/B/YYYY` date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateOrder {
    /// `MM/DD/YYYY`
    #[default]
    MonthFirst,
    /// `DD/MM/YYYY`
    DayFirst,
}

/// A date recognized in text, with the format code that reproduces its layout
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDate {
    pub serial: f64,
    pub format: String,
}

static ISO_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:[T ](\d{1,2}):(\d{2})(?::(\d{2}))?)?$")
        .expect("static regex")
});

static SLASH_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})(?: (\d{1,2}):(\d{2})(?::(\d{2}))?)?$")
        .expect("static regex")
});

static DAY_MONTH_DASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})-([A-Za-z]{3,9})-(\d{4})$").expect("static regex"));

static DAY_MONTH_SPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2}) ([A-Za-z]{3,9})\.?,? (\d{4})$").expect("static regex")
});

static MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]{3,9})\.? (\d{1,2})(?:st|nd|rd|th)?,? (\d{4})$").expect("static regex")
});

static DATE_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?:\d{4}-\d{1,2}-\d{1,2}",
        r"|\d{1,2}/\d{1,2}/\d{4}",
        r"|\d{1,2}[- ][A-Za-z]{3,9}\.?,?[- ]\d{4}",
        r"|[A-Za-z]{3,9}\.? \d{1,2}(?:st|nd|rd|th)?,? \d{4})",
    ))
    .expect("static regex")
});

/// Cheap check for text that might be a date. [`parse_date`] does the real work.
pub fn is_date_like(text: &str) -> bool {
    DATE_LIKE.is_match(text.trim())
}

/// Recognize a date (optionally with a time) and report the matching format code
///
/// ```
/// use gridcalc_core::date::{parse_date, DateOrder};
///
/// let parsed = parse_date("2024-01-01", DateOrder::MonthFirst).unwrap();
/// assert_eq!(parsed.serial, 45292.0);
/// assert_eq!(parsed.format, "YYYY-MM-DD");
/// ```
pub fn parse_date(text: &str, order: DateOrder) -> Option<ParsedDate> {
    let text = text.trim();
    if !is_date_like(text) {
        return None;
    }

    if let Some(caps) = ISO_DATE.captures(text) {
        let date = calendar_date(num(&caps, 1)?, num(&caps, 2)?, num(&caps, 3)?)?;
        return with_time(date, &caps, 4, "YYYY-MM-DD");
    }

    if let Some(caps) = SLASH_DATE.captures(text) {
        let first: u32 = num(&caps, 1)?;
        let second: u32 = num(&caps, 2)?;
        let year = num(&caps, 3)?;
        let day_first = if first > 12 {
            true
        } else if second > 12 {
            false
        } else {
            order == DateOrder::DayFirst
        };
        let (date, format) = if day_first {
            (calendar_date(year, second, first)?, "DD/MM/YYYY")
        } else {
            (calendar_date(year, first, second)?, "MM/DD/YYYY")
        };
        return with_time(date, &caps, 4, format);
    }

    if let Some(caps) = DAY_MONTH_DASH.captures(text) {
        let month = month_from_name(&caps[2])?;
        let date = calendar_date(num(&caps, 3)?, month, num(&caps, 1)?)?;
        return with_time(date, &caps, 4, "DD-MMM-YYYY");
    }

    if let Some(caps) = DAY_MONTH_SPACE.captures(text) {
        let month = month_from_name(&caps[2])?;
        let date = calendar_date(num(&caps, 3)?, month, num(&caps, 1)?)?;
        return with_time(date, &caps, 4, "D MMM YYYY");
    }

    if let Some(caps) = MONTH_DAY.captures(text) {
        let month = month_from_name(&caps[1])?;
        let date = calendar_date(num(&caps, 3)?, month, num(&caps, 2)?)?;
        return with_time(date, &caps, 4, "MMM D, YYYY");
    }

    None
}

/// Serial number of a date-like text, or `None`
pub fn parse_date_serial(text: &str, prefer_day_first: bool) -> Option<f64> {
    let order = if prefer_day_first {
        DateOrder::DayFirst
    } else {
        DateOrder::MonthFirst
    };
    parse_date(text, order).map(|p| p.serial)
}

/// Month number for a full or three-letter month name (case-insensitive)
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    MONTH_NAMES.iter().position(|full| {
        let full = full.to_ascii_lowercase();
        lower == full || lower == full[..3] || (full == "september" && lower == "sept")
    })
    .map(|i| i as u32 + 1)
}

/// Serial day number of a calendar date
pub fn date_to_serial(date: NaiveDate) -> f64 {
    let days = date.num_days_from_ce() as i64 - EPOCH_DAYS_FROM_CE;
    // Before 1900-03-01 there is no phantom leap day to skip over
    if days <= 60 {
        (days - 1) as f64
    } else {
        days as f64
    }
}

/// Serial number (with time fraction) of a date and time
pub fn datetime_to_serial(datetime: NaiveDateTime) -> f64 {
    date_to_serial(datetime.date()) + datetime.time().num_seconds_from_midnight() as f64 / SECONDS_PER_DAY
}

/// Fraction of a day for a time of day
pub fn time_to_fraction(hour: f64, minute: f64, second: f64) -> f64 {
    hour / 24.0 + minute / 1440.0 + second / SECONDS_PER_DAY
}

/// Split a serial into whole days and seconds past midnight, rounding to the second
fn split_serial(serial: f64) -> Option<(i64, u32)> {
    if !serial.is_finite() {
        return None;
    }
    let total = (serial * SECONDS_PER_DAY).round();
    if total.abs() > 1e15 {
        return None;
    }
    let total = total as i64;
    Some((total.div_euclid(86_400), total.rem_euclid(86_400) as u32))
}

fn date_from_day_number(whole: i64) -> Option<NaiveDate> {
    // Serial 60 does not exist on a real calendar; it reads as the last day of February
    let days = if whole >= 60 { whole } else { whole + 1 };
    let days_from_ce = i32::try_from(EPOCH_DAYS_FROM_CE + days).ok()?;
    NaiveDate::from_num_days_from_ce_opt(days_from_ce)
}

/// Calendar date of a serial. Serial 60 (the phantom 1900-02-29) maps to 1900-02-28.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    let (whole, _) = split_serial(serial)?;
    date_from_day_number(whole)
}

/// Date and time of a serial, rounded to the nearest second
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let (whole, seconds) = split_serial(serial)?;
    let date = date_from_day_number(whole)?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)?;
    Some(date.and_time(time))
}

/// Year, month and day as spreadsheet software shows them, including 1900-02-29
pub fn serial_to_ymd(serial: f64) -> Option<(i32, u32, u32)> {
    let (whole, _) = split_serial(serial)?;
    if whole == 60 {
        return Some((1900, 2, 29));
    }
    let date = date_from_day_number(whole)?;
    Some((date.year(), date.month(), date.day()))
}

/// Serial for year/month/day components with rolling overflow
///
/// Month 13 is January of the next year, month 0 is December of the previous
/// one, day 0 is the last day of the previous month, and so on.
pub fn serial_from_parts(year: i64, month: i64, day: i64) -> Option<f64> {
    let first = first_of_month(year, month)?;
    Some(date_to_serial(first) + (day - 1) as f64)
}

/// Calendar date for year/month/day components with rolling overflow
pub fn roll_date(year: i64, month: i64, day: i64) -> Option<NaiveDate> {
    first_of_month(year, month)?.checked_add_signed(Duration::try_days(day - 1)?)
}

fn first_of_month(year: i64, month: i64) -> Option<NaiveDate> {
    let months = year.checked_mul(12)?.checked_add(month - 1)?;
    let y = i32::try_from(months.div_euclid(12)).ok()?;
    let m = months.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(y, m, 1)
}

/// Strict calendar date: rolls the components and rejects anything that moved (Feb 30)
fn calendar_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let rolled = roll_date(year as i64, month as i64, day as i64)?;
    (rolled.year() == year && rolled.month() == month && rolled.day() == day).then_some(rolled)
}

fn num<T: std::str::FromStr>(caps: &regex::Captures, index: usize) -> Option<T> {
    caps.get(index)?.as_str().parse().ok()
}

/// Attach the optional `hh:mm[:ss]` captures starting at `index`
fn with_time(
    date: NaiveDate,
    caps: &regex::Captures,
    index: usize,
    date_format: &str,
) -> Option<ParsedDate> {
    let serial = date_to_serial(date);
    if caps.get(index).is_none() {
        return Some(ParsedDate {
            serial,
            format: date_format.to_string(),
        });
    }

    let hour: u32 = num(caps, index)?;
    let minute: u32 = num(caps, index + 1)?;
    let second: Option<u32> = match caps.get(index + 2) {
        Some(m) => Some(m.as_str().parse().ok()?),
        None => None,
    };
    if hour > 23 || minute > 59 || second.unwrap_or(0) > 59 {
        return None;
    }

    let fraction = time_to_fraction(hour as f64, minute as f64, second.unwrap_or(0) as f64);
    let time_format = if second.is_some() { "hh:mm:ss" } else { "hh:mm" };
    Some(ParsedDate {
        serial: serial + fraction,
        format: format!("{} {}", date_format, time_format),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_known_serials() {
        assert_eq!(date_to_serial(ymd(1900, 1, 1)), 1.0);
        assert_eq!(date_to_serial(ymd(1900, 2, 28)), 59.0);
        assert_eq!(date_to_serial(ymd(1900, 3, 1)), 61.0);
        assert_eq!(date_to_serial(ymd(2024, 1, 1)), 45292.0);
        assert_eq!(date_to_serial(ymd(2000, 2, 29)), 36585.0);
    }

    #[test]
    fn test_serial_to_date() {
        assert_eq!(serial_to_date(1.0), Some(ymd(1900, 1, 1)));
        assert_eq!(serial_to_date(61.0), Some(ymd(1900, 3, 1)));
        assert_eq!(serial_to_date(45292.75), Some(ymd(2024, 1, 1)));
        assert_eq!(serial_to_ymd(60.0), Some((1900, 2, 29)));
        assert_eq!(serial_to_date(f64::NAN), None);

        let dt = serial_to_datetime(45292.5).unwrap();
        assert_eq!((dt.hour(), dt.minute()), (12, 0));
    }

    #[test]
    fn test_roundtrip_modern_dates() {
        for serial in [61.0, 365.0, 36526.0, 45292.0, 60000.0] {
            let date = serial_to_date(serial).unwrap();
            assert_eq!(date_to_serial(date), serial);
        }
    }

    #[test]
    fn test_serial_from_parts_rolls_over() {
        assert_eq!(serial_from_parts(2024, 1, 1), Some(45292.0));
        assert_eq!(serial_from_parts(2023, 13, 1), Some(45292.0));
        assert_eq!(serial_from_parts(2024, 1, 0), serial_from_parts(2023, 12, 31));
        assert_eq!(serial_from_parts(2024, 0, 1), serial_from_parts(2023, 12, 1));
        assert_eq!(serial_from_parts(1900, 2, 29), Some(60.0));
        assert_eq!(roll_date(2024, 2, 30), Some(ymd(2024, 3, 1)));
    }

    #[test]
    fn test_parse_formats() {
        let order = DateOrder::MonthFirst;
        let cases = [
            ("2024-01-15", 45306.0, "YYYY-MM-DD"),
            ("01/15/2024", 45306.0, "MM/DD/YYYY"),
            ("15/01/2024", 45306.0, "DD/MM/YYYY"),
            ("15-Jan-2024", 45306.0, "DD-MMM-YYYY"),
            ("Jan 15, 2024", 45306.0, "MMM D, YYYY"),
            ("January 15 2024", 45306.0, "MMM D, YYYY"),
            ("15 january 2024", 45306.0, "D MMM YYYY"),
        ];
        for (text, serial, format) in cases {
            let parsed = parse_date(text, order).unwrap_or_else(|| panic!("{} should parse", text));
            assert_eq!(parsed.serial, serial, "{}", text);
            assert_eq!(parsed.format, format, "{}", text);
        }
    }

    #[test]
    fn test_parse_with_time() {
        let parsed = parse_date("2024-01-01T12:30", DateOrder::MonthFirst).unwrap();
        assert_eq!(parsed.format, "YYYY-MM-DD hh:mm");
        assert!((parsed.serial - 45292.520833).abs() < 1e-5);

        let parsed = parse_date("2024-01-01 06:00:30", DateOrder::MonthFirst).unwrap();
        assert_eq!(parsed.format, "YYYY-MM-DD hh:mm:ss");

        assert!(parse_date("2024-01-01 25:00", DateOrder::MonthFirst).is_none());
    }

    #[test]
    fn test_slash_order() {
        let month_first = parse_date_serial("03/04/2024", false).unwrap();
        let day_first = parse_date_serial("03/04/2024", true).unwrap();
        assert_eq!(serial_to_date(month_first), Some(ymd(2024, 3, 4)));
        assert_eq!(serial_to_date(day_first), Some(ymd(2024, 4, 3)));

        // A part above 12 settles the order regardless of preference
        assert_eq!(parse_date_serial("13/04/2024", false), parse_date_serial("04/13/2024", true));
    }

    #[test]
    fn test_rejects_invalid_dates() {
        for text in ["2024-02-30", "2023-02-29", "13/13/2024", "31-Foo-2024", "hello", "2024", "12.5"] {
            assert!(parse_date(text, DateOrder::MonthFirst).is_none(), "{}", text);
        }
        assert!(parse_date("2024-02-29", DateOrder::MonthFirst).is_some());
    }

    #[test]
    fn test_is_date_like() {
        assert!(is_date_like(" 2024-01-01 "));
        assert!(is_date_like("Mar 3, 2021"));
        assert!(!is_date_like("=DATE(2024,1,1)"));
        assert!(!is_date_like("100"));
    }

    #[test]
    fn test_month_names() {
        assert_eq!(month_from_name("JAN"), Some(1));
        assert_eq!(month_from_name("sept"), Some(9));
        assert_eq!(month_from_name("December"), Some(12));
        assert_eq!(month_from_name("Decem"), None);
    }
}
