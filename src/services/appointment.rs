use serde::Serialize;
use url::form_urlencoded;

use crate::models::Record;
use crate::services::schedule::{
    extract_phone_number, format_date, is_urgent, parse_appointment_times,
};

pub const TICKET_KEYS: &[&str] = &["RITM", "ENTETE"];

pub const OLD_BARCODE_KEYS: &[&str] = &[
    "CODE BARRE ANCIEN",
    "ANCIEN CODE BARRE",
    "ANCIEN CODE-BARRE",
    "CODE BARRE",
    "CODE-BARRE",
];

pub const NEW_BARCODE_KEYS: &[&str] = &[
    "CODE BARRE NEW",
    "NOUVEAU CODE BARRE",
    "NOUVEAU CODE-BARRE",
    "NOUVEAU CB",
];

pub const DEFAULT_STATUS: &str = "En attente";
pub const MISSING_TICKET: &str = "N/A";

/// Notes longer than this are collapsed on a card.
pub const NOTES_PREVIEW_LEN: usize = 100;

pub fn ticket_id(record: &Record) -> Option<String> {
    record.first_text(TICKET_KEYS).map(|t| t.into_owned())
}

pub fn old_barcode(record: &Record) -> Option<String> {
    record.first_text(OLD_BARCODE_KEYS).map(|t| t.into_owned())
}

pub fn new_barcode(record: &Record) -> Option<String> {
    record.first_text(NEW_BARCODE_KEYS).map(|t| t.into_owned())
}

pub fn status(record: &Record) -> String {
    record
        .text("STATUT")
        .map(|s| s.into_owned())
        .unwrap_or_else(|| DEFAULT_STATUS.to_string())
}

/// Badge label for a free-text status.
pub fn status_label(status: &str) -> &'static str {
    let lower = status.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["finalis", "done"]) {
        "Finalisé"
    } else if has(&["erreur", "error"]) {
        "Erreur"
    } else if has(&["plannifi", "planned"]) {
        "Planifié"
    } else if has(&["cours", "progress"]) {
        "En cours"
    } else {
        DEFAULT_STATUS
    }
}

fn portal_query(pairs: &[(&str, &str)]) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        query.append_pair(key, value);
    }
    query.finish()
}

pub fn portal_ticket_url(base: &str, ticket: &str) -> String {
    format!(
        "{}/Pilotage-10/11-livraison.php?{}",
        base.trim_end_matches('/'),
        portal_query(&[("ritm", ticket)])
    )
}

pub fn portal_export_url(base: &str, technician: &str) -> String {
    format!(
        "{}/MODULES/Covea/livraison_export.php?{}",
        base.trim_end_matches('/'),
        portal_query(&[("statut", ""), ("technicien", technician)])
    )
}

/// Text copied to the clipboard from a card.
pub fn clipboard_ticket(ticket: &str) -> String {
    format!("RITM-{}", ticket)
}

/// Everything an appointment card shows, derived from one record.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentCard {
    pub ticket: String,
    pub date: Option<String>,
    pub date_label: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub location: Option<String>,
    pub technician: Option<String>,
    pub article: Option<String>,
    pub relay_point: Option<String>,
    pub status: String,
    pub status_label: &'static str,
    pub urgent: bool,
    pub phone: Option<String>,
    pub old_barcode: Option<String>,
    pub new_barcode: Option<String>,
    pub notes: Option<String>,
    pub notes_expandable: bool,
    pub portal_url: String,
    pub clipboard: String,
    pub technician_export_url: Option<String>,
}

impl AppointmentCard {
    pub fn from_record(record: &Record, portal_base: &str) -> Self {
        let rdv = record.text("RDV").map(|t| t.into_owned()).unwrap_or_default();
        let (start_time, end_time) = parse_appointment_times(&rdv);
        let date = rdv.split(' ').next().filter(|d| !d.is_empty()).map(str::to_string);
        let notes = record.text("JUSTIFICATION").map(|t| t.into_owned());
        let ticket = ticket_id(record).unwrap_or_else(|| MISSING_TICKET.to_string());
        let status = status(record);
        let technician = record.text("TECHNICIEN").map(|t| t.into_owned());

        AppointmentCard {
            portal_url: portal_ticket_url(portal_base, &ticket),
            clipboard: clipboard_ticket(&ticket),
            date_label: date.as_deref().map(format_date),
            date,
            start_time,
            end_time,
            location: record.text("LOCALISATION").map(|t| t.into_owned()),
            technician_export_url: technician.as_deref().map(|t| portal_export_url(portal_base, t)),
            technician,
            article: record.text("ARTICLE").map(|t| t.into_owned()),
            relay_point: record.text("POINT RELAI").map(|t| t.into_owned()),
            status_label: status_label(&status),
            status,
            urgent: is_urgent(record),
            phone: notes.as_deref().and_then(extract_phone_number),
            old_barcode: old_barcode(record),
            new_barcode: new_barcode(record),
            notes_expandable: notes
                .as_deref()
                .map_or(false, |n| n.chars().count() > NOTES_PREVIEW_LEN),
            notes,
            ticket,
        }
    }
}
