use super::types::*;
use super::utils::*;
use crate::error::AppError;
use crate::models::CellValue;
use bytes::Bytes;
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;

/// Decodes `.xlsx`/`.xls` buffers into [`Sheet`]s with column statistics.
pub struct ExcelAnalyzer;

impl ExcelAnalyzer {
    /// One sheet per worksheet, in workbook order.
    pub fn analyze_from_bytes(&self, file_data: Bytes) -> Result<Vec<Sheet>, AppError> {
        let start = std::time::Instant::now();
        tracing::info!("Starting Excel file analysis from bytes ({} bytes)", file_data.len());

        let cursor = Cursor::new(file_data);
        let mut workbook = open_workbook_auto_from_rs(cursor).map_err(|e| {
            tracing::error!("Failed to open Excel file: {}", e);
            AppError::Decode(format!("Failed to open Excel file: {}", e))
        })?;

        let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
        tracing::info!("Found {} sheets: {:?}", sheet_names.len(), sheet_names);

        let mut sheets = Vec::with_capacity(sheet_names.len());
        for sheet_name in &sheet_names {
            let range = workbook.worksheet_range(sheet_name).map_err(|e| {
                tracing::error!("Failed to read worksheet {}: {}", sheet_name, e);
                AppError::Decode(format!("Failed to read worksheet {}: {}", sheet_name, e))
            })?;
            sheets.push(self.analyze_range(sheet_name, &range));
        }

        tracing::info!("Analysis completed in {:?}", start.elapsed());
        Ok(sheets)
    }

    pub fn analyze_range(&self, name: &str, range: &Range<Data>) -> Sheet {
        let mut rows = range.rows();

        let Some(header_row) = rows.next() else {
            tracing::warn!("Sheet {} is empty", name);
            return Sheet {
                name: name.to_string(),
                row_count: 0,
                column_count: 0,
                columns: Vec::new(),
                data: Vec::new(),
            };
        };

        // Cells right of the last header have no key to live under.
        let column_count = header_row
            .iter()
            .rposition(|cell| !matches!(cell, Data::Empty))
            .map_or(0, |idx| idx + 1);

        let mut data: Vec<Vec<CellValue>> = Vec::with_capacity(range.height());
        data.push(
            header_row[..column_count]
                .iter()
                .map(|cell| CellValue::String(header_text(cell)))
                .collect(),
        );
        for row in rows {
            let mut cells: Vec<CellValue> = row.iter().take(column_count).map(cell_from_data).collect();
            cells.resize(column_count, CellValue::Null);
            data.push(cells);
        }

        let row_count = data.len() - 1;
        tracing::info!(
            "Sheet {}: {} rows, {} columns",
            name,
            row_count,
            column_count
        );

        let columns = (0..column_count)
            .into_par_iter()
            .map(|idx| {
                let values: Vec<&CellValue> = data[1..].iter().map(|row| &row[idx]).collect();
                self.analyze_column(&values, &data[0][idx].to_string())
            })
            .collect();

        Sheet {
            name: name.to_string(),
            row_count,
            column_count,
            columns,
            data,
        }
    }

    pub fn analyze_column(&self, values: &[&CellValue], name: &str) -> ColumnStat {
        let non_null: Vec<&CellValue> = values.iter().copied().filter(|v| !v.is_null()).collect();

        let column_type = self.detect_column_type(&non_null);

        let unique_values = non_null
            .iter()
            .map(|v| identity_key(v))
            .collect::<HashSet<_>>()
            .len();

        let examples: SmallVec<[CellValue; SAMPLE_SIZE]> =
            non_null.iter().take(SAMPLE_SIZE).map(|v| (*v).clone()).collect();

        let mut stat = ColumnStat {
            name: name.to_string(),
            column_type,
            unique_values,
            null_count: values.len() - non_null.len(),
            total_count: values.len(),
            examples,
            min: None,
            max: None,
            average: None,
            valid_values: None,
            value_distribution: calculate_distribution(&non_null),
        };

        if column_type == ColumnType::Number {
            let (min_max, sum, valid) = non_null
                .iter()
                .filter_map(|v| v.as_finite_number())
                .fold(((None, None), 0.0, 0usize), |(mut min_max, sum, valid), n| {
                    update_min_max(&mut min_max, n);
                    (min_max, sum + n, valid + 1)
                });
            stat.valid_values = Some(valid);
            if valid > 0 {
                stat.min = min_max.0;
                stat.max = min_max.1;
                stat.average = Some(sum / valid as f64);
            }
        }

        stat
    }

    /// Classifies a column from its first non-null value only. Numeric
    /// coercion is tried first, so booleans read as 0/1 numbers.
    pub fn detect_column_type(&self, non_null: &[&CellValue]) -> ColumnType {
        match non_null.first() {
            None => ColumnType::String,
            Some(sample) if sample.as_finite_number().is_some() => ColumnType::Number,
            Some(CellValue::Bool(_)) => ColumnType::Boolean,
            Some(CellValue::String(s)) if is_date_string(s) => ColumnType::Date,
            Some(_) => ColumnType::String,
        }
    }
}

/// Distinguishes `1` from `"1"` when counting unique values.
fn identity_key(value: &CellValue) -> (u8, String) {
    let tag = match value {
        CellValue::String(_) => 0,
        CellValue::Number(_) => 1,
        CellValue::Bool(_) => 2,
        CellValue::Null => 3,
    };
    (tag, value.to_string())
}

/// Groups by display text and sorts by descending count; ties keep the
/// order in which values first appear.
pub fn calculate_distribution(non_null: &[&CellValue]) -> Vec<ValueDistribution> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in non_null {
        let key = value.to_string();
        let count = counts.entry(key.clone()).or_insert(0);
        if *count == 0 {
            order.push(key);
        }
        *count += 1;
    }

    let total = non_null.len() as f64;
    let mut distribution: Vec<ValueDistribution> = order
        .into_iter()
        .map(|value| {
            let count = counts[&value];
            ValueDistribution {
                value,
                count,
                percentage: count as f64 / total,
            }
        })
        .collect();
    distribution.sort_by(|a, b| b.count.cmp(&a.count));
    distribution
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range_from(rows: &[Vec<Data>]) -> Range<Data> {
        let height = rows.len() as u32;
        let width = rows.iter().map(Vec::len).max().unwrap_or(0) as u32;
        let mut range = Range::new((0, 0), (height - 1, width - 1));
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                range.set_value((r as u32, c as u32), cell.clone());
            }
        }
        range
    }

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    #[test]
    fn builds_grid_with_header_row_first() {
        let range = range_from(&[
            vec![s("RDV"), s("LOCALISATION"), s("QTE")],
            vec![s("01-01-2024 09:00 au 01-01-2024 10:00"), s("Lyon"), Data::Int(2)],
            vec![s("02-01-2024 09:00 au 02-01-2024 10:00"), Data::Empty, Data::Float(4.0)],
        ]);

        let sheet = ExcelAnalyzer.analyze_range("Planning", &range);

        assert_eq!(sheet.name, "Planning");
        assert_eq!(sheet.row_count, 2);
        assert_eq!(sheet.column_count, 3);
        assert_eq!(sheet.headers(), vec!["RDV", "LOCALISATION", "QTE"]);
        assert_eq!(sheet.data[2][1], CellValue::Null);
        assert!(sheet.rows().iter().all(|row| row.len() == 3));
    }

    #[test]
    fn short_rows_are_padded_and_extra_cells_dropped() {
        let range = range_from(&[
            vec![s("A"), s("B"), Data::Empty],
            vec![s("x")],
            vec![s("y"), s("z"), s("orphan")],
        ]);

        let sheet = ExcelAnalyzer.analyze_range("S", &range);

        assert_eq!(sheet.column_count, 2);
        assert_eq!(sheet.data[1], vec![CellValue::String("x".into()), CellValue::Null]);
        assert_eq!(sheet.data[2].len(), 2);
    }

    #[test]
    fn numeric_column_statistics() {
        let range = range_from(&[
            vec![s("QTE")],
            vec![Data::Int(2)],
            vec![s("4")],
            vec![Data::Empty],
            vec![s("n/a")],
            vec![Data::Float(6.0)],
        ]);

        let sheet = ExcelAnalyzer.analyze_range("S", &range);
        let col = &sheet.columns[0];

        assert_eq!(col.column_type, ColumnType::Number);
        assert_eq!(col.total_count, 5);
        assert_eq!(col.null_count, 1);
        assert_eq!(col.unique_values, 4);
        assert_eq!(col.valid_values, Some(3));
        assert_eq!(col.min, Some(2.0));
        assert_eq!(col.max, Some(6.0));
        assert_eq!(col.average, Some(4.0));
        assert_eq!(col.examples.len(), 3);
    }

    #[test]
    fn type_comes_from_first_sample_only() {
        let a = CellValue::String("Lyon".into());
        let b = CellValue::Number(3.0);
        assert_eq!(ExcelAnalyzer.detect_column_type(&[&a, &b]), ColumnType::String);
        assert_eq!(ExcelAnalyzer.detect_column_type(&[&b, &a]), ColumnType::Number);

        let d = CellValue::String("2024-01-15".into());
        assert_eq!(ExcelAnalyzer.detect_column_type(&[&d]), ColumnType::Date);

        let t = CellValue::Bool(true);
        assert_eq!(ExcelAnalyzer.detect_column_type(&[&t]), ColumnType::Number);

        assert_eq!(ExcelAnalyzer.detect_column_type(&[]), ColumnType::String);
    }

    #[test]
    fn boolean_column_gets_numeric_stats() {
        let t = CellValue::Bool(true);
        let f = CellValue::Bool(false);
        let col = ExcelAnalyzer.analyze_column(&[&t, &f, &t], "ACTIF");

        assert_eq!(col.column_type, ColumnType::Number);
        assert_eq!(col.valid_values, Some(3));
        assert_eq!(col.min, Some(0.0));
        assert_eq!(col.max, Some(1.0));
        assert!((col.average.unwrap() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn distribution_sorted_by_count_descending() {
        let lyon = CellValue::String("Lyon".into());
        let paris = CellValue::String("Paris".into());
        let values = vec![&lyon, &paris, &paris, &lyon, &paris];

        let dist = calculate_distribution(&values);

        assert_eq!(dist.len(), 2);
        assert_eq!(dist[0].value, "Paris");
        assert_eq!(dist[0].count, 3);
        assert!((dist[0].percentage - 0.6).abs() < 1e-9);
        assert_eq!(dist[1].value, "Lyon");
    }

    #[test]
    fn empty_range_gives_empty_sheet() {
        let range: Range<Data> = Range::empty();
        let sheet = ExcelAnalyzer.analyze_range("Vide", &range);
        assert_eq!(sheet.row_count, 0);
        assert_eq!(sheet.column_count, 0);
        assert!(sheet.data.is_empty());
    }

    #[test]
    fn rejects_non_spreadsheet_bytes() {
        let err = ExcelAnalyzer
            .analyze_from_bytes(Bytes::from_static(b"definitely not a workbook"))
            .unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
    }
}
