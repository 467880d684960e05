use serde::Serialize;
use std::fmt::Write as _;

use crate::commands::to_json;
use crate::error::AppError;
use crate::models::{format_number, CellValue};
use crate::services::excel::Sheet;
use crate::services::import::ImportedFile;
use crate::services::insights::ColumnInsight;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SheetSummary<'a> {
    name: &'a str,
    row_count: usize,
    column_count: usize,
}

fn pick_sheet(file: &ImportedFile, index: usize) -> Result<&Sheet, AppError> {
    file.sheets.get(index).ok_or_else(|| {
        AppError::InvalidInput(format!(
            "La feuille {} n'existe pas ({} feuille(s) dans {})",
            index,
            file.sheets.len(),
            file.file_name
        ))
    })
}

pub fn render_sheets(file: &ImportedFile, json: bool) -> Result<String, AppError> {
    let summaries: Vec<SheetSummary> = file
        .sheets
        .iter()
        .map(|s| SheetSummary {
            name: &s.name,
            row_count: s.row_count,
            column_count: s.column_count,
        })
        .collect();

    if json {
        return to_json(&summaries);
    }

    let mut out = format!("{} ({} records)\n", file.file_name, file.records.len());
    for (i, s) in summaries.iter().enumerate() {
        writeln!(out, "  [{}] {}: {} rows, {} columns", i, s.name, s.row_count, s.column_count)?;
    }
    Ok(out.trim_end().to_string())
}

fn percent(fraction: f64) -> String {
    format!("{:.0}%", fraction * 100.0)
}

pub fn render_insights(file: &ImportedFile, index: usize, json: bool) -> Result<String, AppError> {
    let sheet = pick_sheet(file, index)?;
    let insights: Vec<ColumnInsight> = sheet.columns.iter().map(ColumnInsight::new).collect();

    if json {
        return to_json(&insights);
    }

    let mut out = format!("{}: {} rows\n", sheet.name, sheet.row_count);
    for insight in &insights {
        let col = insight.column;
        writeln!(
            out,
            "\n{} ({})\n  unique {} / {}, empty {}, quality {} ({:?})",
            col.name,
            col.column_type.as_str(),
            col.unique_values,
            col.total_count,
            col.null_count,
            percent(insight.quality.score),
            insight.quality.grade,
        )?;
        if let (Some(min), Some(max), Some(avg)) = (col.min, col.max, col.average) {
            writeln!(
                out,
                "  min {}, max {}, average {:.2}",
                format_number(min),
                format_number(max),
                avg
            )?;
        }
        if !col.examples.is_empty() {
            let examples: Vec<String> = col.examples.iter().map(CellValue::to_string).collect();
            writeln!(out, "  examples: {}", examples.join(", "))?;
        }
        for entry in insight.top_values {
            writeln!(out, "  {:>5} {} ({})", percent(entry.percentage), entry.value, entry.count)?;
        }
    }
    Ok(out.trim_end().to_string())
}

pub fn render_table(
    file: &ImportedFile,
    index: usize,
    limit: Option<usize>,
    json: bool,
) -> Result<String, AppError> {
    let sheet = pick_sheet(file, index)?;
    let shown = limit.unwrap_or(sheet.rows().len()).min(sheet.rows().len());
    let rows = &sheet.rows()[..shown];

    if json {
        let grid: Vec<&Vec<CellValue>> = sheet.data.iter().take(shown + 1).collect();
        return to_json(&grid);
    }

    let mut out = sheet.headers().join("\t");
    for row in rows {
        let cells: Vec<String> = row.iter().map(CellValue::to_string).collect();
        write!(out, "\n{}", cells.join("\t"))?;
    }
    if shown < sheet.rows().len() {
        write!(out, "\n... {} more rows", sheet.rows().len() - shown)?;
    }
    Ok(out)
}
