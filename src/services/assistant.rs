use chrono::{NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

use crate::models::Record;
use crate::services::appointment::ticket_id;
use crate::services::schedule::{
    format_date_long, is_urgent, parse_appointment_times, try_parse_appointment_date,
    try_parse_appointment_times,
};

pub const REFRESH_PERIOD: Duration = Duration::from_secs(60);

/// Wall-clock time in `tz`, without the offset.
pub fn now_in(tz: Tz) -> NaiveDateTime {
    Utc::now().with_timezone(&tz).naive_local()
}

/// Start of the appointment. The date must be readable; an unreadable time
/// counts as midnight.
fn start_of(record: &Record) -> Option<NaiveDateTime> {
    let rdv = record.text("RDV")?;
    let date = try_parse_appointment_date(&rdv)?;
    let time = try_parse_appointment_times(&rdv)
        .map(|(start, _)| start)
        .unwrap_or(NaiveTime::MIN);
    Some(date.and_time(time))
}

/// Earliest appointment starting strictly after `now`.
pub fn next_appointment(records: &[Record], now: NaiveDateTime) -> Option<(&Record, NaiveDateTime)> {
    records
        .iter()
        .filter_map(|r| start_of(r).map(|start| (r, start)))
        .filter(|(_, start)| *start > now)
        .min_by_key(|(_, start)| *start)
}

pub fn time_until(start: NaiveDateTime, now: NaiveDateTime) -> String {
    let diff = start - now;
    let hours = diff.num_hours();
    let minutes = diff.num_minutes() % 60;

    if hours > 24 {
        let days = hours / 24;
        format!("Dans {} jour{}", days, if days > 1 { "s" } else { "" })
    } else if hours > 0 {
        if minutes > 0 {
            format!("Dans {}h {}min", hours, minutes)
        } else {
            format!("Dans {}h", hours)
        }
    } else {
        format!("Dans {} minute{}", minutes, if minutes > 1 { "s" } else { "" })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextAppointment {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub time_until: String,
    pub ticket: Option<String>,
    pub location: Option<String>,
    pub technician: Option<String>,
    pub article: Option<String>,
    pub urgent: bool,
}

impl NextAppointment {
    pub fn find(records: &[Record], now: NaiveDateTime) -> Option<Self> {
        let (record, start) = next_appointment(records, now)?;
        let rdv = record.text("RDV").map(|t| t.into_owned()).unwrap_or_default();
        let (start_time, end_time) = parse_appointment_times(&rdv);
        let text = |key: &str| record.text(key).map(|t| t.into_owned());

        Some(NextAppointment {
            date: format_date_long(rdv.split(' ').next().unwrap_or_default()),
            start_time,
            end_time,
            time_until: time_until(start, now),
            ticket: ticket_id(record),
            location: text("LOCALISATION"),
            technician: text("TECHNICIEN"),
            article: text("ARTICLE"),
            urgent: is_urgent(record),
        })
    }
}

/// Recomputes the next appointment every `period` and hands it to `report`
/// until `shutdown` resolves.
pub async fn watch<S, F>(records: &[Record], tz: Tz, period: Duration, shutdown: S, mut report: F)
where
    S: Future<Output = ()>,
    F: FnMut(Option<NextAppointment>),
{
    let mut interval = tokio::time::interval(period);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Stopping next-appointment watch");
                break;
            }
            _ = interval.tick() => {
                let now = now_in(tz);
                tracing::debug!("Refreshing next appointment at {}", now);
                report(NextAppointment::find(records, now));
            }
        }
    }
}
