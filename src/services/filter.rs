//! Filtering, sorting and pagination of imported records for the two list
//! views (appointments and stock parts).

use chrono::NaiveDateTime;
use indexmap::IndexSet;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::models::Record;
use crate::services::schedule::{
    find_closest_date_at, is_urgent, parse_appointment_date, parse_appointment_start, today_string, ALL,
};

pub const PAGE_SIZE_OPTIONS: [usize; 4] = [5, 10, 25, 50];
pub const DEFAULT_PAGE_SIZE: usize = 10;

const SEARCH_FIELDS: [&str; 4] = ["RITM", "LOCALISATION", "ARTICLE", "JUSTIFICATION"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    All,
    Urgent,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Date,
    Tech,
    Location,
    /// Date and start time together.
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Appointments,
    StockParts,
}

impl ViewKind {
    pub fn sort_keys(&self) -> &'static [SortKey] {
        match self {
            ViewKind::Appointments => &[SortKey::Date, SortKey::Tech, SortKey::Location],
            ViewKind::StockParts => &[SortKey::Time, SortKey::Location],
        }
    }

    pub fn default_sort_key(&self) -> SortKey {
        self.sort_keys()[0]
    }

    /// The stock-parts view has no status selector.
    pub fn filters_status(&self) -> bool {
        matches!(self, ViewKind::Appointments)
    }
}

macro_rules! str_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    other => Err(AppError::InvalidInput(format!(
                        concat!("unknown ", stringify!($ty), " {:?}"),
                        other
                    ))),
                }
            }
        }
    };
}

str_enum!(StatusFilter { All => "all", Urgent => "urgent", Normal => "normal" });
str_enum!(SortKey { Date => "date", Tech => "tech", Location => "location", Time => "time" });
str_enum!(SortOrder { Asc => "asc", Desc => "desc" });

/// The filter and sort controls of a view. `"all"` and an empty search
/// disable their filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Criteria {
    pub date: String,
    pub location: String,
    pub status: StatusFilter,
    pub search: String,
    pub sort_key: SortKey,
    pub sort_order: SortOrder,
}

impl Criteria {
    pub fn new(kind: ViewKind) -> Self {
        Criteria {
            date: ALL.to_string(),
            location: ALL.to_string(),
            status: StatusFilter::All,
            search: String::new(),
            sort_key: kind.default_sort_key(),
            sort_order: SortOrder::Asc,
        }
    }
}

/// All active filters must pass. The search clause is checked last and
/// only narrows what the date, location and status filters let through.
pub fn matches(record: &Record, criteria: &Criteria, kind: ViewKind) -> bool {
    if criteria.date != ALL {
        let on_date = record
            .text("RDV")
            .map_or(false, |rdv| rdv.starts_with(criteria.date.as_str()));
        if !on_date {
            return false;
        }
    }

    if criteria.location != ALL
        && record.text("LOCALISATION").as_deref() != Some(criteria.location.as_str())
    {
        return false;
    }

    if kind.filters_status() {
        match criteria.status {
            StatusFilter::Urgent if !is_urgent(record) => return false,
            StatusFilter::Normal if is_urgent(record) => return false,
            _ => {}
        }
    }

    if !criteria.search.is_empty() {
        let needle = criteria.search.to_lowercase();
        return SEARCH_FIELDS.iter().any(|field| {
            record
                .text(field)
                .map_or(false, |value| value.to_lowercase().contains(&needle))
        });
    }

    true
}

/// Ascending comparison for one sort key. Unreadable dates sort as `now`.
pub fn compare(a: &Record, b: &Record, key: SortKey, now: NaiveDateTime) -> Ordering {
    match key {
        SortKey::Date => {
            let date_of = |r: &Record| {
                let rdv = r.text("RDV").unwrap_or_default();
                parse_appointment_date(&rdv, now)
            };
            date_of(a).cmp(&date_of(b))
        }
        SortKey::Time => {
            let start_of = |r: &Record| {
                let rdv = r.text("RDV").unwrap_or_default();
                parse_appointment_start(&rdv, now)
            };
            start_of(a).cmp(&start_of(b))
        }
        SortKey::Tech => locale_compare(
            &a.text("TECHNICIEN").unwrap_or_default(),
            &b.text("TECHNICIEN").unwrap_or_default(),
        ),
        SortKey::Location => locale_compare(
            &a.text("LOCALISATION").unwrap_or_default(),
            &b.text("LOCALISATION").unwrap_or_default(),
        ),
    }
}

/// Filters, then stable-sorts the survivors.
pub fn apply<'a>(records: &'a [Record], criteria: &Criteria, kind: ViewKind, now: NaiveDateTime) -> Vec<&'a Record> {
    let mut filtered: Vec<&Record> = records
        .iter()
        .filter(|record| matches(record, criteria, kind))
        .collect();

    filtered.sort_by(|a, b| {
        let ordering = compare(a, b, criteria.sort_key, now);
        match criteria.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });

    filtered
}

/// Case- and accent-insensitive ordering, raw text as tie-breaker.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}

fn collation_key(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
            'ç' => 'c',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ñ' => 'n',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'ý' | 'ÿ' => 'y',
            other => other,
        })
        .collect()
}

/// Date parts of every `RDV`, first-seen order, after the `"all"` sentinel.
pub fn unique_dates(records: &[Record]) -> Vec<String> {
    let mut dates = IndexSet::from([ALL.to_string()]);
    for record in records {
        if let Some(rdv) = record.text("RDV") {
            let date = rdv.split(' ').next().unwrap_or_default();
            if !date.is_empty() {
                dates.insert(date.to_string());
            }
        }
    }
    dates.into_iter().collect()
}

fn unique_values(records: &[Record], field: &str) -> Vec<String> {
    let mut values = IndexSet::from([ALL.to_string()]);
    for record in records {
        if let Some(value) = record.text(field) {
            values.insert(value.into_owned());
        }
    }
    values.into_iter().collect()
}

pub fn unique_locations(records: &[Record]) -> Vec<String> {
    unique_values(records, "LOCALISATION")
}

pub fn unique_technicians(records: &[Record]) -> Vec<String> {
    unique_values(records, "TECHNICIEN")
}

/// Status-bar figures. Everything except `filtered_total` counts the full
/// record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub distinct_dates: usize,
    pub distinct_locations: usize,
    pub distinct_technicians: usize,
    pub urgent: usize,
    pub filtered_total: usize,
}

impl Counters {
    pub fn compute(records: &[Record], filtered_total: usize) -> Self {
        Counters {
            distinct_dates: unique_dates(records).len() - 1,
            distinct_locations: unique_locations(records).len() - 1,
            distinct_technicians: unique_technicians(records).len() - 1,
            urgent: records.iter().filter(|r| is_urgent(r)).count(),
            filtered_total,
        }
    }
}

/// One visible page of a filtered, sorted list.
#[derive(Debug, Clone, Serialize)]
pub struct Page<'a> {
    pub items: Vec<&'a Record>,
    pub current_page: usize,
    pub total_pages: usize,
    pub items_per_page: usize,
    pub total_items: usize,
    /// 1-based position of the first item shown, 0 when nothing is shown.
    pub first_item: usize,
    pub last_item: usize,
    pub show_pagination: bool,
    pub counters: Counters,
}

/// Slices `[(page-1)*size, page*size)`, with `page` clamped into range.
pub fn paginate<T: Clone>(items: &[T], page: usize, size: usize) -> (Vec<T>, usize, usize) {
    let size = size.max(1);
    let total_pages = items.len().div_ceil(size);
    let current = page.clamp(1, total_pages.max(1));
    let start = ((current - 1) * size).min(items.len());
    let end = (start + size).min(items.len());
    (items[start..end].to_vec(), current, total_pages)
}

/// State of one list view. Changing any filter, the sort or the page size
/// sends the view back to page 1.
#[derive(Debug, Clone, Serialize)]
pub struct ViewState {
    kind: ViewKind,
    criteria: Criteria,
    items_per_page: usize,
    current_page: usize,
}

impl ViewState {
    pub fn new(kind: ViewKind) -> Self {
        ViewState {
            kind,
            criteria: Criteria::new(kind),
            items_per_page: DEFAULT_PAGE_SIZE,
            current_page: 1,
        }
    }

    /// Starts on the imported date closest to `now`'s date.
    pub fn for_records(kind: ViewKind, records: &[Record], now: NaiveDateTime) -> Self {
        let mut state = ViewState::new(kind);
        state.criteria.date = find_closest_date_at(&unique_dates(records), &today_string(now.date()), now);
        state
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn items_per_page(&self) -> usize {
        self.items_per_page
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn set_date(&mut self, date: impl Into<String>) {
        self.criteria.date = date.into();
        self.current_page = 1;
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        self.criteria.location = location.into();
        self.current_page = 1;
    }

    pub fn set_status(&mut self, status: StatusFilter) {
        self.criteria.status = status;
        self.current_page = 1;
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.criteria.search = search.into();
        self.current_page = 1;
    }

    pub fn set_sort(&mut self, key: SortKey, order: SortOrder) -> Result<(), AppError> {
        if !self.kind.sort_keys().contains(&key) {
            return Err(AppError::InvalidInput(format!(
                "sort key {} is not available in this view",
                key
            )));
        }
        self.criteria.sort_key = key;
        self.criteria.sort_order = order;
        self.current_page = 1;
        Ok(())
    }

    pub fn set_items_per_page(&mut self, size: usize) -> Result<(), AppError> {
        if !PAGE_SIZE_OPTIONS.contains(&size) {
            return Err(AppError::InvalidInput(format!(
                "page size must be one of {:?}, got {}",
                PAGE_SIZE_OPTIONS, size
            )));
        }
        self.items_per_page = size;
        self.current_page = 1;
        Ok(())
    }

    pub fn set_page(&mut self, page: usize) {
        self.current_page = page.max(1);
    }

    /// Every record passing the filters, in display order.
    pub fn filtered<'a>(&self, records: &'a [Record], now: NaiveDateTime) -> Vec<&'a Record> {
        apply(records, &self.criteria, self.kind, now)
    }

    pub fn page<'a>(&self, records: &'a [Record], now: NaiveDateTime) -> Page<'a> {
        let filtered = self.filtered(records, now);
        let total_items = filtered.len();
        let (items, current_page, total_pages) = paginate(&filtered, self.current_page, self.items_per_page);
        let first_item = if items.is_empty() {
            0
        } else {
            (current_page - 1) * self.items_per_page + 1
        };

        Page {
            last_item: first_item + items.len().saturating_sub(1),
            items,
            current_page,
            total_pages,
            items_per_page: self.items_per_page,
            total_items,
            first_item,
            show_pagination: total_items > self.items_per_page,
            counters: Counters::compute(records, total_items),
        }
    }
}
