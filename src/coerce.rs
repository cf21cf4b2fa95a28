use calamine::Data;
use chrono::{Duration, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HOUR_MINUTE: Regex = Regex::new(r"^\d{1,2}:\d{2}$").unwrap();
}

/// Excel stores dates as day counts from an epoch of 1899-12-30 (the shifted
/// epoch accounts for the 1900 leap-year bug). Day numbers outside
/// 1..=2_958_465 (9999-12-31) do not decode to a calendar date.
const MAX_DATE_SERIAL: i64 = 2_958_465;

/// Strings accepted as `true` by [`to_bool`], compared trimmed and lowercased.
const TRUTHY: &[&str] = &["yes", "y", "true", "t", "sold", "soldout", "1"];

/// Format the date portion of a cell as `YYYY-MM-DD`
///
/// Numeric cells (including native date-formatted cells) are decoded as Excel
/// date serials. Text cells are trimmed and passed through unchanged, so the
/// result is not guaranteed to be ISO-shaped for free-text input.
///
/// # Arguments
/// * `cell` - The cell value to format
///
/// # Returns
/// * `String` - The formatted date, a passthrough string, or empty
pub fn format_date_part(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Int(i) => match serial_date(*i as f64) {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => i.to_string(),
        },
        Data::Float(f) => match serial_date(*f) {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => f.to_string(),
        },
        Data::DateTime(dt) => match serial_date(dt.as_f64()) {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::Bool(b) => b.to_string(),
    }
}

/// Format the time portion of a cell as `HH:MM:SS` (24-hour, zero-padded)
///
/// Numeric cells are decoded from the fractional part of the Excel serial.
/// Text of the shape `H:MM` or `HH:MM` gets `:00` seconds appended; any other
/// text is trimmed and passed through unchanged.
///
/// # Arguments
/// * `cell` - The cell value to format
///
/// # Returns
/// * `String` - The formatted time, a passthrough string, or empty
pub fn format_time_part(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => pad_time_text(s),
        Data::DateTimeIso(s) | Data::DurationIso(s) => pad_time_text(s),
        Data::Int(i) => serial_time(*i as f64).unwrap_or_else(|| i.to_string()),
        Data::Float(f) => serial_time(*f).unwrap_or_else(|| f.to_string()),
        Data::DateTime(dt) => {
            serial_time(dt.as_f64()).unwrap_or_else(|| dt.as_f64().to_string())
        }
        Data::Bool(b) => b.to_string(),
    }
}

/// Coerce a cell to a number, tolerating thousands separators
///
/// Never fails: unparseable or non-numeric cells become `0.0`.
///
/// # Arguments
/// * `cell` - The cell value to coerce
///
/// # Returns
/// * `f64` - The numeric value, or `0.0`
pub fn to_num(cell: &Data) -> f64 {
    match cell {
        Data::Int(i) => *i as f64,
        Data::Float(f) => *f,
        Data::DateTime(dt) => dt.as_f64(),
        Data::String(s) => s
            .trim()
            .replace(',', "")
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Coerce a cell to a non-negative count, truncating fractions
///
/// Negative values saturate to zero.
pub fn to_count(cell: &Data) -> u64 {
    to_num(cell) as u64
}

/// Coerce a cell to a boolean
///
/// Booleans pass through, numbers are true iff nonzero, and strings are
/// matched (trimmed, case-insensitive) against a fixed accepted-truth set.
/// Everything else, including empty cells, is false.
pub fn to_bool(cell: &Data) -> bool {
    match cell {
        Data::Bool(b) => *b,
        Data::Int(i) => *i != 0,
        Data::Float(f) => *f != 0.0,
        Data::String(s) => TRUTHY.contains(&s.trim().to_lowercase().as_str()),
        _ => false,
    }
}

/// Render a cell as display text without reformatting
///
/// Used for free-text fields (event name, audience, marketing copy) where the
/// spreadsheet's own representation is the display value.
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::Bool(b) => b.to_string(),
    }
}

// Decode the integer part of a serial into a calendar date. Day number 0 and
// anything past 9999-12-31 fall outside the representable window.
fn serial_date(serial: f64) -> Option<NaiveDate> {
    let days = serial.floor() as i64;
    if !(1..=MAX_DATE_SERIAL).contains(&days) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(days))
}

// Decode the fractional part of a serial into "HH:MM:SS". Sub-second
// remainders round to the nearest whole second; H:MM values are periodic
// fractions of a day and would otherwise drift down to H:MM-1:59. A value
// that rounds up to 24:00:00 wraps to 00:00:00.
fn serial_time(serial: f64) -> Option<String> {
    if !(0.0..=MAX_DATE_SERIAL as f64).contains(&serial) {
        return None;
    }
    let mut secs = (serial.fract() * 86_400.0).round() as u32;
    if secs >= 86_400 {
        secs = 0;
    }
    Some(format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        secs % 3600 / 60,
        secs % 60
    ))
}

// Text times of the shape H:MM or HH:MM are missing seconds only.
fn pad_time_text(raw: &str) -> String {
    let trimmed = raw.trim();
    if HOUR_MINUTE.is_match(trimmed) {
        format!("{trimmed}:00")
    } else {
        trimmed.to_string()
    }
}
