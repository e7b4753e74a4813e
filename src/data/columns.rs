//! Output column naming
//!
//! Every entity kind uses the same column layout under its own prefix:
//! `{kind}_win_rate`, `{kind}_recent_1_rank`, `{kind}_prev_3_odds`, ...

use crate::config::AugmentConfig;
use crate::models::EntityKind;

/// Per-row statistics columns, in output order
pub const STAT_COLUMNS: [&str; 12] = [
    "win_rate",
    "place_rate",
    "avg_rank",
    "race_count",
    "rolling_win_rate",
    "rolling_place_rate",
    "rolling_avg_rank",
    "rolling_race_count",
    "surface_win_rate",
    "surface_place_rate",
    "surface_race_count",
    "days_since_last",
];

/// Identity and time columns that lead every output frame
pub const KEY_COLUMNS: [&str; 3] = ["event_id", "competitor_number", "event_time"];

/// Column naming for one entity kind
#[derive(Debug, Clone, Copy)]
pub struct ColumnNamer {
    kind: EntityKind,
}

impl ColumnNamer {
    pub fn new(kind: EntityKind) -> Self {
        Self { kind }
    }

    /// Input/output column holding the entity id, e.g. `handler_id`
    pub fn id(&self) -> String {
        format!("{}_id", self.kind.prefix())
    }

    pub fn stat(&self, name: &str) -> String {
        format!("{}_{}", self.kind.prefix(), name)
    }

    /// Column of one field of the i-th (1-based) snapshot of a window
    pub fn window_field(&self, label: &str, i: usize, suffix: &str) -> String {
        format!("{}_{}_{}_{}", self.kind.prefix(), label, i, suffix)
    }

    pub fn window_event_id(&self, label: &str, i: usize) -> String {
        self.window_field(label, i, "event_id")
    }
}

/// All output column names for a config, in frame order
pub fn output_columns(config: &AugmentConfig) -> Vec<String> {
    let mut names: Vec<String> = KEY_COLUMNS.iter().map(|s| s.to_string()).collect();
    for plan in &config.kinds {
        let namer = ColumnNamer::new(plan.kind);
        names.push(namer.id());
        names.extend(STAT_COLUMNS.iter().map(|s| namer.stat(s)));
        for spec in &plan.extractions {
            for i in 1..=spec.k {
                names.push(namer.window_event_id(&spec.label, i));
                names.extend(
                    spec.fields
                        .fields()
                        .iter()
                        .map(|f| namer.window_field(&spec.label, i, f.column_suffix())),
                );
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_names() {
        let namer = ColumnNamer::new(EntityKind::Operator);
        assert_eq!(namer.id(), "operator_id");
        assert_eq!(namer.stat("win_rate"), "operator_win_rate");
        assert_eq!(namer.window_field("recent", 2, "rank"), "operator_recent_2_rank");
        assert_eq!(namer.window_event_id("recent", 1), "operator_recent_1_event_id");
    }

    #[test]
    fn test_output_columns_default() {
        let names = output_columns(&AugmentConfig::default());
        assert_eq!(&names[..3], &["event_id", "competitor_number", "event_time"]);
        assert!(names.contains(&"competitor_race_count".to_string()));
        assert!(names.contains(&"handler_recent_3_surface".to_string()));
        assert!(names.contains(&"competitor_prev_5_odds".to_string()));
        assert!(!names.contains(&"handler_prev_1_event_id".to_string()));

        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), names.len());
    }
}
