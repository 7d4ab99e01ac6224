use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use polars::prelude::*;

use crate::error::PipelineError;
use crate::mapping::PlantRules;
use crate::schema::{canonical, shift};

/// Date formats accepted in raw uploads. The first is the canonical storage
/// form, so standardized output always re-parses under the same rules.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Canonicalize a raw shift label. Letter and numeric-string forms are both
/// accepted; anything else is rejected, never passed through.
pub fn canonical_shift(raw: &str) -> Option<&'static str> {
    match raw.trim().to_uppercase().as_str() {
        "A" | "1" => Some(shift::A),
        "B" | "2" => Some(shift::B),
        "C" | "3" => Some(shift::C),
        _ => None,
    }
}

/// Parse a raw date cell. Tries plain-date formats first, then the datetime
/// forms spreadsheet exports tend to produce (time component discarded).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Full weekday name for a date.
pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Parse a count cell: a non-negative integer, also accepting the float form
/// spreadsheets emit for integer cells ("12.0").
fn parse_count(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return (n >= 0).then_some(n);
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => Some(f as i64),
        _ => None,
    }
}

fn parse_duration(raw: &str) -> Option<f64> {
    match raw.trim().parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 => Some(f),
        _ => None,
    }
}

/// Standardize a column-normalized table into canonical records.
///
/// Steps, in dependency order: parse dates, canonicalize shifts, convert
/// downtime to minutes using the plant's declared unit, validate metric
/// columns, derive `day_of_week`. All-or-nothing per batch: the first failing
/// row aborts the whole table so a caller never persists a half-clean result.
/// Any incoming `day_of_week` column is ignored and recomputed.
///
/// Rows in errors are 1-based data rows (header excluded).
pub fn standardize(table: DataFrame, rules: &PlantRules) -> Result<DataFrame, PipelineError> {
    // Everything is validated from string form; typed input (e.g. a re-run on
    // already-canonical data) is cast back first.
    let table = table
        .lazy()
        .with_columns(
            canonical::REQUIRED
                .iter()
                .map(|c| col(*c).cast(DataType::String))
                .collect::<Vec<_>>(),
        )
        .collect()?;

    let n = table.height();
    let raw_dates = table.column(canonical::DATE)?.str()?;
    let raw_shifts = table.column(canonical::SHIFT)?.str()?;
    let raw_bottles = table.column(canonical::BOTTLES_PRODUCED)?.str()?;
    let raw_defects = table.column(canonical::DEFECT_COUNT)?.str()?;
    let raw_downtime = table.column(canonical::DOWNTIME)?.str()?;

    let cell = |c: &StringChunked, i: usize| c.get(i).unwrap_or("").to_string();

    // Step 1: dates.
    let mut dates: Vec<NaiveDate> = Vec::with_capacity(n);
    for i in 0..n {
        let raw = cell(raw_dates, i);
        let parsed = parse_date(&raw).ok_or_else(|| PipelineError::InvalidDate {
            value: raw.clone(),
            row: i + 1,
        })?;
        dates.push(parsed);
    }

    // Step 2: shifts.
    let mut shifts: Vec<&'static str> = Vec::with_capacity(n);
    for i in 0..n {
        let raw = cell(raw_shifts, i);
        let code = canonical_shift(&raw)
            .ok_or_else(|| PipelineError::InvalidShift { value: raw.clone() })?;
        shifts.push(code);
    }

    // Steps 3 and 4: unit conversion and metric validation.
    let factor = rules.downtime_unit.to_minutes_factor();
    let mut bottles: Vec<i64> = Vec::with_capacity(n);
    let mut defects: Vec<i64> = Vec::with_capacity(n);
    let mut downtime: Vec<f64> = Vec::with_capacity(n);
    for i in 0..n {
        let raw = cell(raw_bottles, i);
        bottles.push(parse_count(&raw).ok_or_else(|| PipelineError::InvalidMetric {
            field: canonical::BOTTLES_PRODUCED.to_string(),
            row: i + 1,
            value: raw.clone(),
        })?);

        let raw = cell(raw_defects, i);
        defects.push(parse_count(&raw).ok_or_else(|| PipelineError::InvalidMetric {
            field: canonical::DEFECT_COUNT.to_string(),
            row: i + 1,
            value: raw.clone(),
        })?);

        let raw = cell(raw_downtime, i);
        let minutes = parse_duration(&raw).ok_or_else(|| PipelineError::InvalidMetric {
            field: canonical::DOWNTIME.to_string(),
            row: i + 1,
            value: raw.clone(),
        })?;
        downtime.push(minutes * factor);
    }

    // Step 5: derived day_of_week.
    let day_of_week: Vec<&'static str> = dates.iter().map(|d| weekday_name(*d)).collect();
    let iso_dates: Vec<String> = dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();

    let df = DataFrame::new(vec![
        Column::new(canonical::DATE.into(), iso_dates),
        Column::new(canonical::SHIFT.into(), shifts),
        Column::new(canonical::BOTTLES_PRODUCED.into(), bottles),
        Column::new(canonical::DEFECT_COUNT.into(), defects),
        Column::new(canonical::DOWNTIME.into(), downtime),
        Column::new(canonical::DAY_OF_WEEK.into(), day_of_week),
    ])?;

    Ok(df)
}
