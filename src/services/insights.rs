use serde::Serialize;

use crate::services::excel::{ColumnStat, ColumnType, ValueDistribution};

pub const CHART_ENTRIES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Good,
    Fair,
    Poor,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Grade::Good
        } else if score >= 0.6 {
            Grade::Fair
        } else {
            Grade::Poor
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quality {
    pub completeness: f64,
    pub uniqueness: f64,
    pub validity: f64,
    pub score: f64,
    pub grade: Grade,
}

fn ratio(part: usize, total: usize) -> f64 {
    part as f64 / total.max(1) as f64
}

/// Mean of completeness, uniqueness and validity. Validity only drops below
/// 1 for number columns that carry a range.
pub fn data_quality(column: &ColumnStat) -> Quality {
    let completeness = 1.0 - ratio(column.null_count, column.total_count);
    let uniqueness = ratio(column.unique_values, column.total_count);
    let validity = match (column.column_type, column.min, column.max) {
        (ColumnType::Number, Some(_), Some(_)) => ratio(column.valid_values.unwrap_or(0), column.total_count),
        _ => 1.0,
    };

    let score = (completeness + uniqueness + validity) / 3.0;
    Quality {
        completeness,
        uniqueness,
        validity,
        score,
        grade: Grade::from_score(score),
    }
}

/// Leading entries of the (already sorted) distribution.
pub fn top_distribution(column: &ColumnStat, limit: usize) -> &[ValueDistribution] {
    let end = column.value_distribution.len().min(limit);
    &column.value_distribution[..end]
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInsight<'a> {
    #[serde(flatten)]
    pub column: &'a ColumnStat,
    pub quality: Quality,
    pub top_values: &'a [ValueDistribution],
}

impl<'a> ColumnInsight<'a> {
    pub fn new(column: &'a ColumnStat) -> Self {
        ColumnInsight {
            column,
            quality: data_quality(column),
            top_values: top_distribution(column, CHART_ENTRIES),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::SmallVec;

    fn column(column_type: ColumnType, unique: usize, nulls: usize, total: usize) -> ColumnStat {
        ColumnStat {
            name: "col".to_string(),
            column_type,
            unique_values: unique,
            null_count: nulls,
            total_count: total,
            examples: SmallVec::new(),
            min: None,
            max: None,
            average: None,
            valid_values: None,
            value_distribution: Vec::new(),
        }
    }

    #[test]
    fn fully_unique_complete_column_is_good() {
        let q = data_quality(&column(ColumnType::String, 10, 0, 10));
        assert_eq!(q.score, 1.0);
        assert_eq!(q.grade, Grade::Good);
    }

    #[test]
    fn repeated_values_lower_the_score() {
        // (1 + 0.2 + 1) / 3
        let q = data_quality(&column(ColumnType::String, 2, 0, 10));
        assert!((q.score - 2.2 / 3.0).abs() < 1e-9);
        assert_eq!(q.grade, Grade::Fair);
    }

    #[test]
    fn numeric_validity_uses_valid_values() {
        let mut col = column(ColumnType::Number, 4, 4, 10);
        col.min = Some(1.0);
        col.max = Some(9.0);
        col.valid_values = Some(6);

        let q = data_quality(&col);
        assert!((q.validity - 0.6).abs() < 1e-9);
        assert!((q.score - (0.6 + 0.4 + 0.6) / 3.0).abs() < 1e-9);
        assert_eq!(q.grade, Grade::Poor);
    }

    #[test]
    fn empty_column_does_not_divide_by_zero() {
        let q = data_quality(&column(ColumnType::String, 0, 0, 0));
        assert!(q.score.is_finite());
        assert_eq!(q.completeness, 1.0);
    }

    #[test]
    fn chart_keeps_first_entries() {
        let mut col = column(ColumnType::String, 7, 0, 7);
        col.value_distribution = (0..7)
            .map(|i| ValueDistribution {
                value: i.to_string(),
                count: 1,
                percentage: 1.0 / 7.0,
            })
            .collect();

        let top = top_distribution(&col, CHART_ENTRIES);
        assert_eq!(top.len(), 5);
        assert_eq!(top[0].value, "0");
        assert_eq!(top_distribution(&col, 50).len(), 7);
    }
}
