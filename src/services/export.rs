use std::io::Write;
use std::path::Path;

use crate::error::AppError;
use crate::models::Record;
use crate::services::appointment::ticket_id;
use crate::services::schedule::{parse_appointment_times, ALL};

pub const CSV_HEADERS: [&str; 6] = ["Date", "Heure", "RITM", "Article", "Localisation", "Détails"];

/// `interventions-<date>.csv`, or `interventions-complet.csv` when no date
/// filter is active.
pub fn export_filename(selected_date: &str) -> String {
    let suffix = if selected_date == ALL { "complet" } else { selected_date };
    format!("interventions-{}.csv", suffix)
}

/// The six exported cells of one record; missing fields export as `""`.
pub fn csv_row(record: &Record) -> [String; 6] {
    let rdv = record.text("RDV").map(|t| t.into_owned()).unwrap_or_default();
    let (start_time, _) = parse_appointment_times(&rdv);
    let text = |key: &str| record.text(key).map(|t| t.into_owned()).unwrap_or_default();

    [
        rdv.split(' ').next().unwrap_or_default().to_string(),
        start_time,
        ticket_id(record).unwrap_or_default(),
        text("ARTICLE"),
        text("LOCALISATION"),
        text("JUSTIFICATION"),
    ]
}

/// Writes one quoted row per record, headers first.
pub fn write_csv<W: Write>(records: &[&Record], writer: W) -> Result<(), AppError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    csv_writer.write_record(CSV_HEADERS)?;
    for record in records {
        csv_writer.write_record(csv_row(record))?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn export_to_string(records: &[&Record]) -> Result<String, AppError> {
    let mut buffer = Vec::new();
    write_csv(records, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| AppError::Export(e.to_string()))
}

pub fn export_to_path(records: &[&Record], path: &Path) -> Result<(), AppError> {
    let file = std::fs::File::create(path)?;
    write_csv(records, file)?;
    tracing::info!("Exported {} rows to {}", records.len(), path.display());
    Ok(())
}
