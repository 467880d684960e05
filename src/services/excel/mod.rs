pub mod analyzer;
pub mod processor;
pub mod types;
pub mod utils;

pub use analyzer::ExcelAnalyzer;
pub use processor::ExcelProcessor;
pub use types::{ColumnStat, ColumnType, Sheet, ValueDistribution};
