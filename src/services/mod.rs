pub mod appointment;
pub mod assistant;
pub mod excel;
pub mod export;
pub mod filter;
pub mod import;
pub mod insights;
pub mod notify;
pub mod schedule;
