//! DataFrame boundary and output column layout

pub mod columns;
pub mod frame;

// Re-export commonly used types
pub use columns::{output_columns, ColumnNamer, KEY_COLUMNS, STAT_COLUMNS};
pub use frame::{augmented_to_frame, read_csv, records_from_frame, targets_from_frame};
