use serde::Serialize;
use smallvec::SmallVec;

use crate::models::CellValue;

pub const SAMPLE_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Date,
    Boolean,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Number => "number",
            ColumnType::Date => "date",
            ColumnType::Boolean => "boolean",
        }
    }
}

/// Share of one distinct value among a column's non-null cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueDistribution {
    pub value: String,
    pub count: usize,
    /// Fraction of non-null values, in `0.0..=1.0`.
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStat {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub unique_values: usize,
    pub null_count: usize,
    pub total_count: usize,
    pub examples: SmallVec<[CellValue; SAMPLE_SIZE]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_values: Option<usize>,
    pub value_distribution: Vec<ValueDistribution>,
}

/// One worksheet: header row plus data rows, and per-column statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    pub name: String,
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<ColumnStat>,
    /// Row 0 holds the headers. Every row is `column_count` wide.
    pub data: Vec<Vec<CellValue>>,
}

impl Sheet {
    /// Header names as text; blank header cells become `""`.
    pub fn headers(&self) -> Vec<String> {
        self.data
            .first()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .unwrap_or_default()
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        self.data.get(1..).unwrap_or(&[])
    }
}
