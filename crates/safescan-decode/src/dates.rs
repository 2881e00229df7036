//! Date parsing for GS1 values and printed label dates.

use chrono::{Datelike, NaiveDate};
use safescan_core::defaults::DATE_PIVOT_YEAR;

/// Last calendar day of `month` in `year`.
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

fn expand_year(yy: u32) -> i32 {
    if yy <= DATE_PIVOT_YEAR {
        2000 + yy as i32
    } else {
        1900 + yy as i32
    }
}

/// Parse a GS1 `YYMMDD` date.
///
/// Years `00`–`50` are 20xx, `51`–`99` are 19xx. Day `00` means the last day
/// of the month. Month `00` is invalid.
pub fn parse_yymmdd(value: &str) -> Option<NaiveDate> {
    if value.len() != 6 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let yy: u32 = value[0..2].parse().ok()?;
    let mm: u32 = value[2..4].parse().ok()?;
    let dd: u32 = value[4..6].parse().ok()?;
    let year = expand_year(yy);
    if !(1..=12).contains(&mm) {
        return None;
    }
    if dd == 0 {
        return last_day_of_month(year, mm);
    }
    NaiveDate::from_ymd_opt(year, mm, dd)
}

/// Parse a date as printed on labels or supplied in JSON/URL payloads.
///
/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, `DD.MM.YYYY`, `MM/DD/YYYY`,
/// `MM/DD/YY`, month-precision `YYYY-MM` and `MM/YYYY` (last day of the
/// month), and GS1 `YYMMDD`.
pub fn parse_loose(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Some(date) = parse_yymmdd(value) {
        return Some(date);
    }
    if let Some(date) = short_us_date(value) {
        return Some(date);
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%m/%d/%Y", "%m-%d-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            if date.year() >= 1000 {
                return Some(date);
            }
        }
    }
    month_precision(value)
}

/// `MM/DD/YY` with the GS1 year pivot.
fn short_us_date(value: &str) -> Option<NaiveDate> {
    let mut parts = value.split('/');
    let (m, d, y) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || y.len() != 2 {
        return None;
    }
    let month: u32 = m.parse().ok()?;
    let day: u32 = d.parse().ok()?;
    let yy: u32 = y.parse().ok()?;
    NaiveDate::from_ymd_opt(expand_year(yy), month, day)
}

fn month_precision(value: &str) -> Option<NaiveDate> {
    let (year, month) = if let Some((y, m)) = value.split_once('-') {
        (y, m)
    } else if let Some((m, y)) = value.split_once('/') {
        (y, m)
    } else {
        return None;
    };
    if year.len() != 4 || month.is_empty() || month.len() > 2 {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    last_day_of_month(year, month)
}
