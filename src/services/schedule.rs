//! Parsing of the free-text scheduling fields of an export.
//!
//! The `RDV` field reads `DD-MM-YYYY HH:MM au DD-MM-YYYY HH:MM`. Every
//! `try_*` function reports failure as `None`; the plain variants keep the
//! sentinel values the views display (`"00:00"`, the current date, `None`).

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Record;

pub const RANGE_DELIMITER: &str = " au ";
pub const ALL: &str = "all";
pub const MIDNIGHT: &str = "00:00";

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:Tel\s*:|Tél\s*:)?\s*((?:(?:\+|00)33|0)\s*[1-9](?:[\s.-]*\d{2}){4})")
        .expect("phone pattern is valid")
});

const WEEKDAYS_SHORT: [&str; 7] = ["lun.", "mar.", "mer.", "jeu.", "ven.", "sam.", "dim."];
const WEEKDAYS_LONG: [&str; 7] = ["lundi", "mardi", "mercredi", "jeudi", "vendredi", "samedi", "dimanche"];
const MONTHS_SHORT: [&str; 12] = [
    "janv.", "févr.", "mars", "avr.", "mai", "juin", "juil.", "août", "sept.", "oct.", "nov.", "déc.",
];
const MONTHS_LONG: [&str; 12] = [
    "janvier", "février", "mars", "avril", "mai", "juin", "juillet", "août", "septembre", "octobre",
    "novembre", "décembre",
];

/// Reads a `DD-MM-YYYY` prefix (anything after the first space is ignored).
pub fn try_parse_appointment_date(field: &str) -> Option<NaiveDate> {
    let date_part = field.split(' ').next().filter(|part| !part.is_empty())?;
    let mut parts = date_part.split('-').map(|p| p.parse::<u32>().ok().filter(|n| *n != 0));
    let day = parts.next()??;
    let month = parts.next()??;
    let year = parts.next()??;
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

/// Midnight of the appointment date, or `now` when the field does not hold
/// a usable date.
pub fn parse_appointment_date(field: &str, now: NaiveDateTime) -> NaiveDateTime {
    try_parse_appointment_date(field)
        .map(|date| date.and_time(NaiveTime::MIN))
        .unwrap_or(now)
}

fn parse_time_token(half: &str) -> Option<NaiveTime> {
    let token = half.split(' ').nth(1)?;
    let token: String = token.chars().take(5).collect();
    NaiveTime::parse_from_str(&token, "%H:%M").ok()
}

/// Start and end times, or `None` when the delimiter or either time is
/// missing.
pub fn try_parse_appointment_times(field: &str) -> Option<(NaiveTime, NaiveTime)> {
    let (start, end) = field.split_once(RANGE_DELIMITER)?;
    Some((parse_time_token(start)?, parse_time_token(end)?))
}

/// `HH:MM` start and end times; both are `"00:00"` when the field cannot be
/// read, so an unreadable field looks like a midnight slot.
pub fn parse_appointment_times(field: &str) -> (String, String) {
    match try_parse_appointment_times(field) {
        Some((start, end)) => (start.format("%H:%M").to_string(), end.format("%H:%M").to_string()),
        None => (MIDNIGHT.to_string(), MIDNIGHT.to_string()),
    }
}

/// Appointment start as a full date-time. A missing date falls back to
/// today's date and a missing time to midnight.
pub fn parse_appointment_start(field: &str, now: NaiveDateTime) -> NaiveDateTime {
    let date = try_parse_appointment_date(field).unwrap_or_else(|| now.date());
    let start = try_parse_appointment_times(field)
        .map(|(start, _)| start)
        .unwrap_or(NaiveTime::MIN);
    date.and_time(start)
}

/// Start date-time only when both the date and the start time are readable.
pub fn try_parse_appointment_start(field: &str) -> Option<NaiveDateTime> {
    let date = try_parse_appointment_date(field)?;
    let (start, _) = try_parse_appointment_times(field)?;
    Some(date.and_time(start))
}

/// First French phone number found in free text, as written.
pub fn extract_phone_number(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    PHONE_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn weekday_index(weekday: Weekday) -> usize {
    weekday.num_days_from_monday() as usize
}

/// Short French rendering, e.g. `lun. 15 janv.`; unreadable input comes
/// back unchanged.
pub fn format_date(date_str: &str) -> String {
    match try_parse_appointment_date(date_str) {
        Some(date) => format!(
            "{} {} {}",
            WEEKDAYS_SHORT[weekday_index(date.weekday())],
            date.day(),
            MONTHS_SHORT[date.month0() as usize]
        ),
        None => date_str.to_string(),
    }
}

/// Long French rendering, e.g. `lundi 15 janvier`.
pub fn format_date_long(date_str: &str) -> String {
    match try_parse_appointment_date(date_str) {
        Some(date) => format!(
            "{} {} {}",
            WEEKDAYS_LONG[weekday_index(date.weekday())],
            date.day(),
            MONTHS_LONG[date.month0() as usize]
        ),
        None => date_str.to_string(),
    }
}

/// Zero-padded `DD-MM-YYYY`.
pub fn today_string(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// `target` itself when listed, otherwise the listed date nearest to it.
/// Ties go to the first date encountered; `"all"` entries are skipped.
pub fn find_closest_date<S: AsRef<str>>(dates: &[S], target: &str) -> String {
    find_closest_date_at(dates, target, Local::now().naive_local())
}

pub fn find_closest_date_at<S: AsRef<str>>(dates: &[S], target: &str, now: NaiveDateTime) -> String {
    let Some(first) = dates.first() else {
        return ALL.to_string();
    };
    if dates.iter().any(|d| d.as_ref() == target) {
        return target.to_string();
    }

    let target_at = parse_appointment_date(target, now);
    let mut closest = first.as_ref();
    let mut min_diff: Option<i64> = None;

    for date in dates.iter().map(|d| d.as_ref()) {
        if date == ALL {
            continue;
        }
        let diff = (parse_appointment_date(date, now) - target_at).num_seconds().abs();
        if min_diff.map_or(true, |min| diff < min) {
            min_diff = Some(diff);
            closest = date;
        }
    }

    closest.to_string()
}

/// A record is urgent when its notes mention "urgent", in any case.
pub fn is_urgent(record: &Record) -> bool {
    record
        .text("JUSTIFICATION")
        .map_or(false, |notes| notes.to_lowercase().contains("urgent"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;

    fn at(day: u32, month: u32, year: i32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn parses_range_times() {
        assert_eq!(
            parse_appointment_times("01-01-2024 09:30 au 01-01-2024 11:00"),
            ("09:30".to_string(), "11:00".to_string())
        );
    }

    #[test]
    fn seconds_are_truncated() {
        assert_eq!(
            parse_appointment_times("01-01-2024 09:30:45 au 01-01-2024 11:00:00"),
            ("09:30".to_string(), "11:00".to_string())
        );
    }

    #[test]
    fn unreadable_times_fall_back_to_midnight() {
        let midnight = ("00:00".to_string(), "00:00".to_string());
        assert_eq!(parse_appointment_times(""), midnight);
        assert_eq!(parse_appointment_times("01-01-2024 09:30"), midnight);
        assert_eq!(parse_appointment_times("01-01-2024 soon au later"), midnight);
        assert!(try_parse_appointment_times("").is_none());
    }

    #[test]
    fn genuine_midnight_is_distinguishable_from_failure() {
        let parsed = try_parse_appointment_times("01-01-2024 00:00 au 01-01-2024 00:00");
        assert_eq!(parsed, Some((NaiveTime::MIN, NaiveTime::MIN)));
        assert_eq!(try_parse_appointment_times("garbage"), None);
    }

    #[test]
    fn parses_date_prefix() {
        assert_eq!(
            try_parse_appointment_date("15-01-2024 09:30 au 15-01-2024 11:00"),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert_eq!(try_parse_appointment_date("15-01-2024"), NaiveDate::from_ymd_opt(2024, 1, 15));
    }

    #[test]
    fn bad_dates_fall_back_to_now() {
        let now = at(3, 2, 2025, 14, 5);
        assert_eq!(parse_appointment_date("", now), now);
        assert_eq!(parse_appointment_date("00-01-2024 10:00", now), now);
        assert_eq!(parse_appointment_date("demain", now), now);
        assert_eq!(parse_appointment_date("15-01", now), now);
        assert_eq!(parse_appointment_date("15-01-2024", now), at(15, 1, 2024, 0, 0));
    }

    #[test]
    fn start_combines_date_and_time() {
        let now = at(3, 2, 2025, 14, 5);
        assert_eq!(
            parse_appointment_start("15-01-2024 09:30 au 15-01-2024 11:00", now),
            at(15, 1, 2024, 9, 30)
        );
        assert_eq!(parse_appointment_start("", now), at(3, 2, 2025, 0, 0));
        assert_eq!(try_parse_appointment_start("15-01-2024"), None);
    }

    #[test]
    fn extracts_french_phone_numbers() {
        assert_eq!(
            extract_phone_number("Tel: 06 12 34 56 78 urgent").as_deref(),
            Some("06 12 34 56 78")
        );
        assert_eq!(
            extract_phone_number("rappeler au +33 6.12.34.56.78 avant 10h").as_deref(),
            Some("+33 6.12.34.56.78")
        );
        assert_eq!(extract_phone_number("Tél:0612345678").as_deref(), Some("0612345678"));
        assert_eq!(extract_phone_number("no phone here"), None);
        assert_eq!(extract_phone_number(""), None);
    }

    #[test]
    fn extracted_number_has_ten_digits() {
        let phone = extract_phone_number("Tel: 06 12 34 56 78 urgent").unwrap();
        let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
        assert_eq!(digits.len(), 10);
        assert!(digits.starts_with("06"));
    }

    #[test]
    fn formats_french_dates() {
        assert_eq!(format_date("15-01-2024"), "lun. 15 janv.");
        assert_eq!(format_date_long("15-01-2024"), "lundi 15 janvier");
        assert_eq!(format_date("pas une date"), "pas une date");
        assert_eq!(format_date(""), "");
    }

    #[test]
    fn today_string_is_zero_padded() {
        assert_eq!(today_string(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()), "05-03-2024");
    }

    #[test]
    fn closest_date_prefers_smaller_distance() {
        let dates = ["10-01-2024", "15-01-2024"];
        assert_eq!(find_closest_date(&dates, "12-01-2024"), "10-01-2024");
        assert_eq!(find_closest_date(&dates, "14-01-2024"), "15-01-2024");
    }

    #[test]
    fn closest_date_exact_match_and_sentinels() {
        let dates = ["all", "10-01-2024", "15-01-2024"];
        assert_eq!(find_closest_date(&dates, "15-01-2024"), "15-01-2024");
        assert_eq!(find_closest_date(&dates, "01-01-2024"), "10-01-2024");
        assert_eq!(find_closest_date::<&str>(&[], "01-01-2024"), "all");
        assert_eq!(find_closest_date(&["all"], "01-01-2024"), "all");
    }

    #[test]
    fn closest_date_ties_keep_first_seen() {
        let dates = ["14-01-2024", "10-01-2024"];
        assert_eq!(find_closest_date(&dates, "12-01-2024"), "14-01-2024");
    }

    #[test]
    fn urgency_is_case_insensitive() {
        let record: Record = vec![("JUSTIFICATION", CellValue::String("Client URGENT, rappeler".into()))]
            .into_iter()
            .collect();
        assert!(is_urgent(&record));

        let calm: Record = vec![("JUSTIFICATION", CellValue::String("RAS".into()))].into_iter().collect();
        assert!(!is_urgent(&calm));
        assert!(!is_urgent(&Record::new()));
    }
}
