//! Point-in-time feature engine

pub mod aggregator;
pub mod extractor;
pub mod locator;
pub mod merge;
pub mod orchestrator;
pub mod targets;
pub mod timeline;


// Re-export commonly used types
pub use aggregator::{aggregate, compute_stats, DEFAULT_ROLLING_WINDOW};
pub use extractor::{extract, recent_history, FieldProjection, RecordField};
pub use locator::{locate, Timed};
pub use orchestrator::{augment, Augmenter, HistoricalRecords};
pub use timeline::{Counters, EntityTimeline, Timelines};
