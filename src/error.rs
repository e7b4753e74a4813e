use polars::prelude::PolarsError;
use std::fmt;
use thiserror::Error;

use crate::models::EntityKind;

/// Pipeline stage where a failure was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Timeline,
    Targets,
    Merge,
    Frame,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Timeline => "timeline",
            Stage::Targets => "targets",
            Stage::Merge => "merge",
            Stage::Frame => "frame",
        };
        f.write_str(name)
    }
}

/// Feature pipeline errors
///
/// Every variant is fatal for the whole batch.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Invalid input at {stage} stage{}: {subject} is missing `{field}`", kind_suffix(.kind))]
    InvalidInput {
        stage: Stage,
        kind: Option<EntityKind>,
        subject: String,
        field: &'static str,
    },

    #[error("Ambiguous join at {stage} stage{}: expected {expected} rows, got {actual} ({detail})", kind_suffix(.kind))]
    AmbiguousJoin {
        stage: Stage,
        kind: Option<EntityKind>,
        expected: usize,
        actual: usize,
        detail: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("DataFrame error: {0}")]
    Frame(#[from] PolarsError),

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

fn kind_suffix(kind: &Option<EntityKind>) -> String {
    match kind {
        Some(k) => format!(" [{}]", k),
        None => String::new(),
    }
}

impl FeatureError {
    pub fn missing(
        stage: Stage,
        kind: Option<EntityKind>,
        subject: impl Into<String>,
        field: &'static str,
    ) -> Self {
        FeatureError::InvalidInput {
            stage,
            kind,
            subject: subject.into(),
            field,
        }
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, FeatureError::InvalidInput { .. })
    }

    pub fn is_ambiguous_join(&self) -> bool {
        matches!(self, FeatureError::AmbiguousJoin { .. })
    }
}

/// Row-count check applied after every lookup-style merge
pub fn validate_row_count(
    stage: Stage,
    kind: Option<EntityKind>,
    expected: usize,
    actual: usize,
) -> Result<(), FeatureError> {
    if expected != actual {
        return Err(FeatureError::AmbiguousJoin {
            stage,
            kind,
            expected,
            actual,
            detail: "row count changed across merge".to_string(),
        });
    }
    Ok(())
}

/// Rejects a window size of zero
pub fn validate_window(rolling_window: usize) -> Result<(), FeatureError> {
    if rolling_window == 0 {
        return Err(FeatureError::Config(
            "rolling_window must be at least 1".to_string(),
        ));
    }
    Ok(())
}
