//! Reporting Module
//!
//! Terminal and JSON rendering of pipeline run reports.

pub mod report_generator;

pub use report_generator::RunReport;
