//! Boatrace Features - point-in-time historical features for race entries
//!
//! This library provides:
//! - Per-entity timelines with running cumulative counters
//! - Statistics (win/place rate, average rank, race count) as of a target row
//! - Most-recent-first history windows with configurable field projections
//! - A batch orchestrator that joins all of the above onto target rows
//!   one-to-one, for competitors, operators and handlers
//!
//! Every value attached to a target row is computed from records strictly
//! earlier than that row's event time.
//!
//! # Example
//!
//! ```no_run
//! use boatrace_features::data::{augmented_to_frame, read_csv, records_from_frame, targets_from_frame};
//! use boatrace_features::{AugmentConfig, Augmenter, EntityKind, HistoricalRecords};
//!
//! let targets = targets_from_frame(&read_csv("targets.csv").unwrap()).unwrap();
//! let mut historical = HistoricalRecords::new();
//! historical.insert(
//!     EntityKind::Handler,
//!     records_from_frame(&read_csv("handlers.csv").unwrap()).unwrap(),
//! );
//!
//! let config = AugmentConfig::for_kinds(&[EntityKind::Handler]);
//! let rows = Augmenter::new(config.clone()).unwrap().augment(&targets, &historical).unwrap();
//! let df = augmented_to_frame(&rows, &config).unwrap();
//! println!("{}", df);
//! ```

pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{AugmentConfig, ExtractionSpec, KindPlan};
pub use crate::core::{augment, Augmenter, FieldProjection, HistoricalRecords, RecordField, Timelines};
pub use error::{FeatureError, Stage};
pub use models::{
    AugmentedRow, EntityKind, EntityStats, EventTime, KindFeatures, RaceRecord,
    RaceRecordSnapshot, RowIdentity, TargetRow, TimeResolution,
};
