//! One-to-one merge of per-kind results onto target rows
//!
//! Every unit's result map must hold exactly one entry per target row.
//! Anything else is reported as an ambiguous join rather than silently
//! dropped or duplicated.

use std::collections::HashMap;

use super::targets::ResolvedRow;
use crate::error::{validate_row_count, FeatureError, Stage};
use crate::models::{
    AugmentedRow, EntityKind, EntityStats, HistoryWindow, KindFeatures, RaceRecordSnapshot,
    RowIdentity,
};

/// Results of one named extraction
#[derive(Debug)]
pub struct WindowOutput {
    pub label: String,
    pub by_row: HashMap<RowIdentity, Vec<RaceRecordSnapshot>>,
}

/// All unit results for one entity kind
#[derive(Debug)]
pub struct KindOutput {
    pub kind: EntityKind,
    pub stats: HashMap<RowIdentity, EntityStats>,
    pub windows: Vec<WindowOutput>,
}

/// Join kind outputs onto rows by identity, preserving input row order
pub fn merge_rows(
    rows: &[ResolvedRow<'_>],
    outputs: Vec<KindOutput>,
) -> Result<Vec<AugmentedRow>, FeatureError> {
    let mut features: Vec<Vec<KindFeatures>> = rows
        .iter()
        .map(|_| Vec::with_capacity(outputs.len()))
        .collect();

    for output in outputs {
        let kind = output.kind;
        let stats = align(kind, "statistics", rows, output.stats)?;

        let mut windows: Vec<Vec<HistoryWindow>> = rows
            .iter()
            .map(|_| Vec::with_capacity(output.windows.len()))
            .collect();
        for window in output.windows {
            let aligned = align(kind, &window.label, rows, window.by_row)?;
            for (slot, snapshots) in windows.iter_mut().zip(aligned) {
                slot.push(HistoryWindow {
                    label: window.label.clone(),
                    snapshots,
                });
            }
        }

        for (((row, slot), stats), windows) in rows.iter().zip(&mut features).zip(stats).zip(windows) {
            let entity_id = row.row.entity_ids.get(kind).ok_or_else(|| {
                FeatureError::missing(
                    Stage::Merge,
                    Some(kind),
                    format!("row {}", row.identity),
                    "entity_id",
                )
            })?;
            slot.push(KindFeatures {
                kind,
                entity_id: entity_id.to_string(),
                stats,
                windows,
            });
        }
    }

    let merged: Vec<AugmentedRow> = rows
        .iter()
        .zip(features)
        .map(|(row, features)| AugmentedRow {
            identity: row.identity.clone(),
            target: row.row.clone(),
            features,
        })
        .collect();

    validate_row_count(Stage::Merge, None, rows.len(), merged.len())?;
    Ok(merged)
}

/// Reorder one unit's results to row order; every row needs exactly one result
fn align<V>(
    kind: EntityKind,
    unit: &str,
    rows: &[ResolvedRow<'_>],
    mut results: HashMap<RowIdentity, V>,
) -> Result<Vec<V>, FeatureError> {
    let produced = results.len();
    let mut aligned = Vec::with_capacity(rows.len());
    let mut missing: Vec<&RowIdentity> = Vec::new();

    for row in rows {
        match results.remove(&row.identity) {
            Some(value) => aligned.push(value),
            None => missing.push(&row.identity),
        }
    }

    if let Some(first) = missing.first() {
        return Err(FeatureError::AmbiguousJoin {
            stage: Stage::Merge,
            kind: Some(kind),
            expected: rows.len(),
            actual: aligned.len(),
            detail: format!("no {} result for {} rows, first {}", unit, missing.len(), first),
        });
    }
    // Leftovers mean a unit produced rows the targets never asked for
    if !results.is_empty() {
        return Err(FeatureError::AmbiguousJoin {
            stage: Stage::Merge,
            kind: Some(kind),
            expected: rows.len(),
            actual: produced,
            detail: format!("{} {} results did not match any target row", results.len(), unit),
        });
    }
    Ok(aligned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::targets::resolve_targets;
    use crate::models::{EventTime, TargetRow};

    fn rows() -> Vec<TargetRow> {
        let t = EventTime::from_ymd(2024, 3, 1).unwrap();
        vec![
            TargetRow::new("E1", 1, t).with_entity(EntityKind::Operator, "O1"),
            TargetRow::new("E1", 2, t).with_entity(EntityKind::Operator, "O2"),
        ]
    }

    fn stats_for(ids: &[RowIdentity]) -> HashMap<RowIdentity, EntityStats> {
        ids.iter().map(|id| (id.clone(), EntityStats::default())).collect()
    }

    #[test]
    fn test_merge_preserves_order() {
        let targets = rows();
        let resolved = resolve_targets(&targets).unwrap();
        let ids: Vec<RowIdentity> = resolved.iter().map(|r| r.identity.clone()).collect();

        let output = KindOutput {
            kind: EntityKind::Operator,
            stats: stats_for(&ids),
            windows: vec![WindowOutput {
                label: "recent".to_string(),
                by_row: ids.iter().map(|id| (id.clone(), Vec::new())).collect(),
            }],
        };

        let merged = merge_rows(&resolved, vec![output]).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].identity, RowIdentity::new("E1", 1));
        assert_eq!(merged[1].kind(EntityKind::Operator).unwrap().entity_id, "O2");
        assert!(merged[1].kind(EntityKind::Operator).unwrap().window("recent").unwrap().is_empty());
    }

    #[test]
    fn test_merge_missing_result() {
        let targets = rows();
        let resolved = resolve_targets(&targets).unwrap();
        let output = KindOutput {
            kind: EntityKind::Operator,
            stats: stats_for(&[resolved[0].identity.clone()]),
            windows: Vec::new(),
        };

        let err = merge_rows(&resolved, vec![output]).unwrap_err();
        assert!(err.is_ambiguous_join());
        assert!(err.to_string().contains("E1#2"));
        assert!(err.to_string().contains("expected 2 rows, got 1"));
    }

    #[test]
    fn test_merge_reports_real_match_count() {
        let t = EventTime::from_ymd(2024, 3, 1).unwrap();
        let targets: Vec<TargetRow> = (1..=4)
            .map(|n| TargetRow::new("E1", n, t).with_entity(EntityKind::Operator, "O1"))
            .collect();
        let resolved = resolve_targets(&targets).unwrap();
        let ids: Vec<RowIdentity> = resolved.iter().map(|r| r.identity.clone()).collect();

        let output = KindOutput {
            kind: EntityKind::Operator,
            stats: stats_for(&ids),
            windows: vec![WindowOutput {
                label: "recent".to_string(),
                by_row: ids[..1].iter().map(|id| (id.clone(), Vec::new())).collect(),
            }],
        };

        let err = merge_rows(&resolved, vec![output]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("expected 4 rows, got 1"));
        assert!(msg.contains("no recent result for 3 rows, first E1#2"));
    }

    #[test]
    fn test_merge_surplus_result() {
        let targets = rows();
        let resolved = resolve_targets(&targets).unwrap();
        let mut ids: Vec<RowIdentity> = resolved.iter().map(|r| r.identity.clone()).collect();
        ids.push(RowIdentity::new("E9", 7));

        let output = KindOutput {
            kind: EntityKind::Operator,
            stats: stats_for(&ids),
            windows: Vec::new(),
        };

        let err = merge_rows(&resolved, vec![output]).unwrap_err();
        assert!(err.is_ambiguous_join());
        assert!(err.to_string().contains("expected 2 rows, got 3"));
    }
}
