//! Feature rows, their CSV persistence and the terminal report.

pub mod csv_sink;
pub mod feature_row;
pub mod table;

pub use csv_sink::CsvSink;
pub use feature_row::{FEATURE_NAMES, FeatureRow};
pub use table::{render_assessment, render_outcomes, render_summary};
