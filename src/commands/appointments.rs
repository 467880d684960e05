use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write;
use std::path::PathBuf;

use crate::commands::{to_json, ListArgs, StockArgs};
use crate::config::Config;
use crate::error::AppError;
use crate::models::Record;
use crate::services::appointment::AppointmentCard;
use crate::services::assistant::{now_in, watch, NextAppointment, REFRESH_PERIOD};
use crate::services::export::{csv_row, export_filename, export_to_path};
use crate::services::filter::{Counters, Criteria, Page, ViewKind, ViewState};
use crate::services::schedule::{format_date, today_string};

const TODAY: &str = "today";

/// Applies the command-line controls in the order a user would set them;
/// the page number goes last since every other setter resets it.
pub fn build_view(
    kind: ViewKind,
    records: &[Record],
    args: &ListArgs,
    config: &Config,
    now: NaiveDateTime,
) -> Result<ViewState, AppError> {
    let mut state = ViewState::for_records(kind, records, now);

    if let Some(date) = &args.date {
        if date.eq_ignore_ascii_case(TODAY) {
            state.set_date(today_string(now.date()));
        } else {
            state.set_date(date.trim());
        }
    }
    if let Some(location) = &args.location {
        state.set_location(location.as_str());
    }
    if let Some(status) = args.status {
        if !kind.filters_status() {
            return Err(AppError::InvalidInput(
                "Le filtre de statut n'est pas disponible pour les pièces".to_string(),
            ));
        }
        state.set_status(status);
    }
    if let Some(search) = &args.search {
        state.set_search(search.as_str());
    }
    state.set_sort(args.sort.unwrap_or_else(|| kind.default_sort_key()), args.order)?;
    state.set_items_per_page(args.per_page.unwrap_or(config.items_per_page))?;
    state.set_page(args.page);

    tracing::debug!("View {:?} with criteria {:?}", kind, state.criteria());
    Ok(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListOutput<'a, T> {
    criteria: &'a Criteria,
    current_page: usize,
    total_pages: usize,
    items_per_page: usize,
    total_items: usize,
    counters: &'a Counters,
    items: Vec<T>,
}

impl<'a, T> ListOutput<'a, T> {
    fn new(state: &'a ViewState, page: &'a Page<'_>, items: Vec<T>) -> Self {
        ListOutput {
            criteria: state.criteria(),
            current_page: page.current_page,
            total_pages: page.total_pages,
            items_per_page: page.items_per_page,
            total_items: page.total_items,
            counters: &page.counters,
            items,
        }
    }
}

fn page_header(state: &ViewState, page: &Page<'_>) -> Result<String, AppError> {
    let c = &page.counters;
    let mut out = format!(
        "Date: {} | {} dates, {} lieux, {} techniciens, {} urgents",
        state.criteria().date,
        c.distinct_dates,
        c.distinct_locations,
        c.distinct_technicians,
        c.urgent
    );
    if page.total_items == 0 {
        out.push_str("\nAucun rendez-vous");
    } else {
        write!(
            out,
            "\n{}-{} sur {} (page {}/{})",
            page.first_item, page.last_item, page.total_items, page.current_page, page.total_pages
        )?;
    }
    Ok(out)
}

pub fn render_appointments_at(
    records: &[Record],
    args: &ListArgs,
    config: &Config,
    json: bool,
    now: NaiveDateTime,
) -> Result<String, AppError> {
    let state = build_view(ViewKind::Appointments, records, args, config, now)?;
    let page = state.page(records, now);
    let cards: Vec<AppointmentCard> = page
        .items
        .iter()
        .map(|r| AppointmentCard::from_record(r, &config.portal_url))
        .collect();

    if json {
        return to_json(&ListOutput::new(&state, &page, cards));
    }

    let mut out = page_header(&state, &page)?;
    for card in &cards {
        write!(
            out,
            "\n\n{} {}-{}  {}  [{}]{}",
            card.date_label.as_deref().unwrap_or("-"),
            card.start_time,
            card.end_time,
            card.ticket,
            card.status_label,
            if card.urgent { "  URGENT" } else { "" }
        )?;
        for (label, value) in [
            ("Lieu", &card.location),
            ("Technicien", &card.technician),
            ("Article", &card.article),
            ("Point relais", &card.relay_point),
            ("Téléphone", &card.phone),
            ("Ancien code", &card.old_barcode),
            ("Nouveau code", &card.new_barcode),
        ] {
            if let Some(value) = value {
                write!(out, "\n  {}: {}", label, value)?;
            }
        }
        write!(out, "\n  {}", card.portal_url)?;
    }
    Ok(out)
}

pub fn render_appointments(records: &[Record], args: &ListArgs, config: &Config, json: bool) -> Result<String, AppError> {
    render_appointments_at(records, args, config, json, now_in(config.timezone))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StockRow {
    date: String,
    start_time: String,
    ticket: String,
    article: String,
    location: String,
    details: String,
}

impl From<[String; 6]> for StockRow {
    fn from([date, start_time, ticket, article, location, details]: [String; 6]) -> Self {
        StockRow {
            date,
            start_time,
            ticket,
            article,
            location,
            details,
        }
    }
}

fn export_path(requested: &str, selected_date: &str) -> PathBuf {
    if requested.trim().is_empty() {
        PathBuf::from(export_filename(selected_date))
    } else {
        PathBuf::from(requested)
    }
}

pub fn render_stock_at(
    records: &[Record],
    args: &StockArgs,
    config: &Config,
    json: bool,
    now: NaiveDateTime,
) -> Result<String, AppError> {
    let state = build_view(ViewKind::StockParts, records, &args.list, config, now)?;

    let exported = match &args.export {
        Some(requested) => {
            let path = export_path(requested, &state.criteria().date);
            let filtered = state.filtered(records, now);
            export_to_path(&filtered, &path)?;
            Some((path, filtered.len()))
        }
        None => None,
    };

    let page = state.page(records, now);
    let rows: Vec<StockRow> = page.items.iter().map(|r| StockRow::from(csv_row(r))).collect();

    if json {
        return to_json(&ListOutput::new(&state, &page, rows));
    }

    let mut out = page_header(&state, &page)?;
    for row in &rows {
        write!(
            out,
            "\n{} {}  {}  {}  {}",
            format_date(&row.date),
            row.start_time,
            row.ticket,
            row.article,
            row.location
        )?;
        if !row.details.is_empty() {
            write!(out, "\n    {}", row.details.replace('\n', " "))?;
        }
    }
    if let Some((path, count)) = exported {
        write!(out, "\n\nExport: {} ({} lignes)", path.display(), count)?;
    }
    Ok(out)
}

pub fn render_stock(records: &[Record], args: &StockArgs, config: &Config, json: bool) -> Result<String, AppError> {
    render_stock_at(records, args, config, json, now_in(config.timezone))
}

pub fn format_next(next: Option<&NextAppointment>, json: bool) -> Result<String, AppError> {
    if json {
        return to_json(&next);
    }
    let Some(next) = next else {
        return Ok("Aucun rendez-vous à venir".to_string());
    };

    let mut out = format!(
        "Prochain rendez-vous: {} {}-{} ({})",
        next.date, next.start_time, next.end_time, next.time_until
    );
    if next.urgent {
        out.push_str("  URGENT");
    }
    for (label, value) in [
        ("Ticket", &next.ticket),
        ("Lieu", &next.location),
        ("Technicien", &next.technician),
        ("Article", &next.article),
    ] {
        if let Some(value) = value {
            write!(out, "\n  {}: {}", label, value)?;
        }
    }
    Ok(out)
}

pub fn render_next(records: &[Record], config: &Config, json: bool) -> Result<String, AppError> {
    let next = NextAppointment::find(records, now_in(config.timezone));
    format_next(next.as_ref(), json)
}

/// Prints the next appointment every minute until Ctrl-C.
pub async fn watch_next<W: Write>(records: &[Record], config: &Config, json: bool, out: &mut W) -> Result<(), AppError> {
    let mut failure: Option<AppError> = None;
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    watch(records, config.timezone, REFRESH_PERIOD, shutdown, |next| {
        if failure.is_some() {
            return;
        }
        let written = format_next(next.as_ref(), json)
            .and_then(|text| writeln!(out, "{}", text).and_then(|_| out.flush()).map_err(AppError::from));
        if let Err(e) = written {
            tracing::error!("Cannot write next appointment: {}", e);
            failure = Some(e);
        }
    })
    .await;

    failure.map_or(Ok(()), Err)
}
