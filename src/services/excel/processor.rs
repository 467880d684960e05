use super::types::Sheet;
use crate::error::AppError;
use crate::models::{CellValue, Record};

/// Turns a sheet's header row and data rows into keyed records.
pub struct ExcelProcessor;

impl ExcelProcessor {
    /// One record per data row, every header present as a key. A repeated
    /// header keeps the value of its last column.
    pub fn normalize(&self, sheet: &Sheet) -> Vec<Record> {
        let headers = sheet.headers();

        sheet
            .rows()
            .iter()
            .map(|row| {
                headers
                    .iter()
                    .enumerate()
                    .map(|(idx, header)| {
                        (header.clone(), row.get(idx).cloned().unwrap_or(CellValue::Null))
                    })
                    .collect::<Record>()
            })
            .collect()
    }

    /// Normalizes the first sheet of an import, refusing workbooks whose
    /// first sheet has no header row.
    pub fn normalize_first(&self, sheets: &[Sheet]) -> Result<Vec<Record>, AppError> {
        let sheet = sheets
            .first()
            .ok_or_else(|| AppError::Format("No sheets found in workbook".to_string()))?;

        if sheet.column_count == 0 || sheet.data.is_empty() {
            tracing::warn!("Sheet {} has no header row", sheet.name);
            return Err(AppError::Format(format!("Sheet {} has no header row", sheet.name)));
        }

        let records = self.normalize(sheet);
        tracing::debug!("Normalized {} records from sheet {}", records.len(), sheet.name);
        Ok(records)
    }
}
