use calamine::Data;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::models::{format_number, CellValue};

/// Converts a decoded calamine cell into the crate's cell model.
///
/// Date-time cells keep their raw serial number; the workbook is read
/// without applying number formats.
pub fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::String(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(d) => CellValue::Number(d.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::String(e.to_string()),
        Data::Empty => CellValue::Null,
    }
}

/// Header cells are keyed by their text.
pub fn header_text(data: &Data) -> String {
    match data {
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_number(*f),
        Data::Empty => String::new(),
        other => cell_from_data(other).to_string(),
    }
}

pub fn is_date_string(s: &str) -> bool {
    let s = s.trim();
    if s.is_empty() {
        return false;
    }

    // Scheduling exports join two timestamps with " au "; the first one decides.
    let s = s.split(" au ").next().unwrap_or(s);

    if DateTime::parse_from_rfc3339(s).is_ok() || DateTime::parse_from_rfc2822(s).is_ok() {
        return true;
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%d-%m-%Y %H:%M",
        "%d-%m-%Y %H:%M:%S",
    ];
    if datetime_formats
        .iter()
        .any(|format| NaiveDateTime::parse_from_str(s, format).is_ok())
    {
        return true;
    }

    let date_formats = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    date_formats
        .iter()
        .any(|format| NaiveDate::parse_from_str(s, format).is_ok())
}

pub fn update_min_max(min_max: &mut (Option<f64>, Option<f64>), value: f64) {
    match min_max.0 {
        Some(min_val) if value < min_val => min_max.0 = Some(value),
        None => min_max.0 = Some(value),
        _ => {}
    }

    match min_max.1 {
        Some(max_val) if value > max_val => min_max.1 = Some(value),
        None => min_max.1 = Some(value),
        _ => {}
    }
}
