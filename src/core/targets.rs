//! Target row validation
//!
//! Resolves caller-supplied rows into rows with a checked identity, so the
//! later per-kind stages never see a missing key.

use std::collections::HashMap;

use crate::error::{FeatureError, Stage};
use crate::models::{EntityKind, EventTime, RowIdentity, TargetRow};

/// A target row whose identity and time are known to be present
#[derive(Debug, Clone)]
pub struct ResolvedRow<'t> {
    pub index: usize,
    pub identity: RowIdentity,
    pub event_time: EventTime,
    pub surface_type: Option<&'t str>,
    pub row: &'t TargetRow,
}

/// View of a resolved row for one entity kind
#[derive(Debug, Clone, Copy)]
pub struct KindTarget<'t> {
    pub identity: &'t RowIdentity,
    pub entity_id: &'t str,
    pub event_time: EventTime,
    pub surface_type: Option<&'t str>,
}

/// Check required fields and identity uniqueness for a batch
pub fn resolve_targets(targets: &[TargetRow]) -> Result<Vec<ResolvedRow<'_>>, FeatureError> {
    let mut seen: HashMap<RowIdentity, usize> = HashMap::with_capacity(targets.len());
    let mut resolved = Vec::with_capacity(targets.len());

    for (index, row) in targets.iter().enumerate() {
        let event_id = row
            .event_id
            .as_deref()
            .ok_or_else(|| FeatureError::missing(Stage::Targets, None, format!("row #{}", index), "event_id"))?;
        let competitor_number = row.competitor_number.ok_or_else(|| {
            FeatureError::missing(
                Stage::Targets,
                None,
                format!("row #{} (event {})", index, event_id),
                "competitor_number",
            )
        })?;
        let identity = RowIdentity::new(event_id, competitor_number);
        let event_time = row.event_time.ok_or_else(|| {
            FeatureError::missing(Stage::Targets, None, format!("row {}", identity), "event_time")
        })?;

        if let Some(first) = seen.insert(identity.clone(), index) {
            return Err(FeatureError::AmbiguousJoin {
                stage: Stage::Targets,
                kind: None,
                expected: targets.len(),
                actual: targets.len(),
                detail: format!("row identity {} appears at rows #{} and #{}", identity, first, index),
            });
        }

        resolved.push(ResolvedRow {
            index,
            identity,
            event_time,
            surface_type: row.surface_type.as_deref(),
            row,
        });
    }

    Ok(resolved)
}

/// Project resolved rows onto one kind; every row must carry that kind's id
pub fn kind_targets<'t>(
    kind: EntityKind,
    rows: &'t [ResolvedRow<'t>],
) -> Result<Vec<KindTarget<'t>>, FeatureError> {
    rows.iter()
        .map(|r| {
            let entity_id = r.row.entity_ids.get(kind).ok_or_else(|| {
                FeatureError::missing(
                    Stage::Targets,
                    Some(kind),
                    format!("row {}", r.identity),
                    entity_field(kind),
                )
            })?;
            Ok(KindTarget {
                identity: &r.identity,
                entity_id,
                event_time: r.event_time,
                surface_type: r.surface_type,
            })
        })
        .collect()
}

fn entity_field(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Competitor => "competitor_id",
        EntityKind::Operator => "operator_id",
        EntityKind::Handler => "handler_id",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t() -> EventTime {
        EventTime::from_ymd(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_resolve_targets_ok() {
        let rows = vec![
            TargetRow::new("r1", 1, t()).with_surface("turf"),
            TargetRow::new("r1", 2, t()),
        ];
        let resolved = resolve_targets(&rows).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[1].identity, RowIdentity::new("r1", 2));
        assert_eq!(resolved[0].surface_type, Some("turf"));
    }

    #[test]
    fn test_resolve_targets_duplicate_identity() {
        let rows = vec![TargetRow::new("r1", 1, t()), TargetRow::new("r1", 1, t())];
        let err = resolve_targets(&rows).unwrap_err();
        assert!(err.is_ambiguous_join());
        assert!(err.to_string().contains("r1#1"));
    }

    #[test]
    fn test_resolve_targets_missing_fields() {
        let mut no_time = TargetRow::new("r1", 1, t());
        no_time.event_time = None;
        assert!(resolve_targets(&[no_time]).unwrap_err().is_invalid_input());

        let mut no_number = TargetRow::new("r1", 1, t());
        no_number.competitor_number = None;
        let err = resolve_targets(&[no_number]).unwrap_err();
        assert!(err.to_string().contains("competitor_number"));

        let no_event = TargetRow::default();
        assert!(resolve_targets(&[no_event]).unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_kind_targets_requires_entity_id() {
        let rows = vec![TargetRow::new("r1", 1, t()).with_entity(EntityKind::Competitor, "C1")];
        let resolved = resolve_targets(&rows).unwrap();

        let competitors = kind_targets(EntityKind::Competitor, &resolved).unwrap();
        assert_eq!(competitors[0].entity_id, "C1");

        let err = kind_targets(EntityKind::Handler, &resolved).unwrap_err();
        assert!(err.to_string().contains("handler_id"));
        assert!(err.to_string().contains("[handler]"));
    }
}
