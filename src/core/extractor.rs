//! Recent-History Extractor
//!
//! The K most recent strictly-past records of an entity, most recent first,
//! copied through a field projection. The per-kind "recent" windows and the
//! competitor's previous-race chain are the same extraction with a
//! different `k` and projection.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::locator::locate;
use super::targets::KindTarget;
use super::timeline::{EntityTimeline, Timelines};
use crate::models::{EventTime, RaceRecord, RaceRecordSnapshot, RowIdentity};

/// Record fields that can be copied into a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    FinishRank,
    ElapsedTime,
    Distance,
    SurfaceType,
    SurfaceCondition,
    FieldSize,
    PostPosition,
    CarriedWeight,
    Odds,
}

impl RecordField {
    pub const ALL: [RecordField; 9] = [
        RecordField::FinishRank,
        RecordField::ElapsedTime,
        RecordField::Distance,
        RecordField::SurfaceType,
        RecordField::SurfaceCondition,
        RecordField::FieldSize,
        RecordField::PostPosition,
        RecordField::CarriedWeight,
        RecordField::Odds,
    ];

    /// Suffix of the output column, e.g. `competitor_recent_1_rank`
    pub fn column_suffix(&self) -> &'static str {
        match self {
            RecordField::FinishRank => "rank",
            RecordField::ElapsedTime => "time",
            RecordField::Distance => "distance",
            RecordField::SurfaceType => "surface",
            RecordField::SurfaceCondition => "condition",
            RecordField::FieldSize => "field_size",
            RecordField::PostPosition => "post",
            RecordField::CarriedWeight => "weight",
            RecordField::Odds => "odds",
        }
    }
}

/// Ordered, duplicate-free set of fields to copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<RecordField>", into = "Vec<RecordField>")]
pub struct FieldProjection(Vec<RecordField>);

impl FieldProjection {
    pub fn new(fields: impl IntoIterator<Item = RecordField>) -> Self {
        let mut unique: Vec<RecordField> = Vec::new();
        for field in fields {
            if !unique.contains(&field) {
                unique.push(field);
            }
        }
        Self(unique)
    }

    /// Fields for the per-kind recent windows
    pub fn basic() -> Self {
        Self::new([
            RecordField::FinishRank,
            RecordField::Distance,
            RecordField::SurfaceType,
            RecordField::FieldSize,
        ])
    }

    /// Every field, used for the previous-race chain
    pub fn full() -> Self {
        Self::new(RecordField::ALL)
    }

    pub fn fields(&self) -> &[RecordField] {
        &self.0
    }

    pub fn contains(&self, field: RecordField) -> bool {
        self.0.contains(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy the projected fields of `record`; event id and time are always kept
    pub fn project(&self, record: &RaceRecord, event_time: EventTime) -> RaceRecordSnapshot {
        let mut snapshot = RaceRecordSnapshot {
            event_id: record.event_id.clone(),
            event_time: Some(event_time),
            ..Default::default()
        };
        for field in &self.0 {
            match field {
                RecordField::FinishRank => snapshot.finish_rank = record.finish_rank,
                RecordField::ElapsedTime => snapshot.elapsed_time = record.elapsed_time,
                RecordField::Distance => snapshot.distance = record.distance,
                RecordField::SurfaceType => snapshot.surface_type = record.surface_type.clone(),
                RecordField::SurfaceCondition => {
                    snapshot.surface_condition = record.surface_condition.clone()
                }
                RecordField::FieldSize => snapshot.field_size = record.field_size,
                RecordField::PostPosition => snapshot.post_position = record.post_position,
                RecordField::CarriedWeight => snapshot.carried_weight = record.carried_weight,
                RecordField::Odds => snapshot.odds = record.odds,
            }
        }
        snapshot
    }
}

impl From<Vec<RecordField>> for FieldProjection {
    fn from(fields: Vec<RecordField>) -> Self {
        Self::new(fields)
    }
}

impl From<FieldProjection> for Vec<RecordField> {
    fn from(projection: FieldProjection) -> Self {
        projection.0
    }
}

/// Up to `k` strictly-past records before `query_time`, most recent first
pub fn recent_history(
    timeline: Option<&EntityTimeline<'_>>,
    query_time: EventTime,
    k: usize,
    projection: &FieldProjection,
) -> Vec<RaceRecordSnapshot> {
    let Some(timeline) = timeline else {
        return Vec::new();
    };
    let Some(boundary) = locate(timeline.entries(), query_time) else {
        return Vec::new();
    };

    let take = k.min(boundary + 1);
    timeline.entries()[boundary + 1 - take..boundary + 1]
        .iter()
        .rev()
        // Snapshots keep the record's own time even when the batch compares dates
        .map(|e| projection.project(e.record, e.record.event_time.unwrap_or(e.event_time)))
        .collect()
}

/// Recent history for every target row of one kind, keyed by row identity
pub fn extract(
    timelines: &Timelines<'_>,
    targets: &[KindTarget<'_>],
    k: usize,
    projection: &FieldProjection,
) -> HashMap<RowIdentity, Vec<RaceRecordSnapshot>> {
    targets
        .par_iter()
        .map(|t| {
            let history = recent_history(timelines.get(t.entity_id), t.event_time, k, projection);
            (t.identity.clone(), history)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityKind;

    fn date(m: u32, d: u32) -> EventTime {
        EventTime::from_ymd(2024, m, d).unwrap()
    }

    fn ids(snapshots: &[RaceRecordSnapshot]) -> Vec<&str> {
        snapshots.iter().map(|s| s.event_id.as_str()).collect()
    }

    #[test]
    fn test_most_recent_first() {
        let records = vec![
            RaceRecord::new("R1", "H", date(1, 1), Some(1)),
            RaceRecord::new("R2", "H", date(2, 1), Some(3)),
        ];
        let timelines = Timelines::build(EntityKind::Handler, &records).unwrap();
        let history = recent_history(timelines.get("H"), date(3, 1), 3, &FieldProjection::basic());

        assert_eq!(ids(&history), vec!["R2", "R1"]);
        assert_eq!(history[0].finish_rank, Some(3));
        assert_eq!(history[1].finish_rank, Some(1));
    }

    #[test]
    fn test_truncates_to_k() {
        let records: Vec<RaceRecord> = (1..=6)
            .map(|d| RaceRecord::new(format!("R{}", d), "H", date(1, d), Some(d)))
            .collect();
        let timelines = Timelines::build(EntityKind::Competitor, &records).unwrap();
        let history = recent_history(timelines.get("H"), date(1, 6), 2, &FieldProjection::basic());

        // R6 is on the query date and excluded
        assert_eq!(ids(&history), vec!["R5", "R4"]);

        let none = recent_history(timelines.get("H"), date(1, 6), 0, &FieldProjection::basic());
        assert!(none.is_empty());
    }

    #[test]
    fn test_debut_yields_nothing() {
        let records = vec![RaceRecord::new("A", "H", date(1, 1), Some(1))];
        let timelines = Timelines::build(EntityKind::Handler, &records).unwrap();
        assert!(recent_history(timelines.get("H"), date(1, 1), 5, &FieldProjection::full()).is_empty());
        assert!(recent_history(None, date(1, 1), 5, &FieldProjection::full()).is_empty());
    }

    #[test]
    fn test_ties_excluded_and_stable() {
        let records = vec![
            RaceRecord::new("T1", "H", date(2, 1), Some(1)),
            RaceRecord::new("T2", "H", date(2, 1), Some(2)),
            RaceRecord::new("R0", "H", date(1, 1), Some(3)),
        ];
        let timelines = Timelines::build(EntityKind::Handler, &records).unwrap();

        let at_tie = recent_history(timelines.get("H"), date(2, 1), 5, &FieldProjection::basic());
        assert_eq!(ids(&at_tie), vec!["R0"]);

        // Later query sees both tied records, the higher event id first
        let after = recent_history(timelines.get("H"), date(3, 1), 5, &FieldProjection::basic());
        assert_eq!(ids(&after), vec!["T2", "T1", "R0"]);
    }

    #[test]
    fn test_projection_limits_fields() {
        let mut record = RaceRecord::new("R1", "H", date(1, 1), Some(2));
        record.elapsed_time = Some(71.3);
        record.odds = Some(4.5);
        record.distance = Some(1800);

        let projection = FieldProjection::new([RecordField::ElapsedTime]);
        let snapshot = projection.project(&record, date(1, 1));
        assert_eq!(snapshot.event_id, "R1");
        assert_eq!(snapshot.elapsed_time, Some(71.3));
        assert_eq!(snapshot.finish_rank, None);
        assert_eq!(snapshot.odds, None);

        let full = FieldProjection::full().project(&record, date(1, 1));
        assert_eq!(full.odds, Some(4.5));
        assert_eq!(full.distance, Some(1800));
    }

    #[test]
    fn test_projection_dedups() {
        let projection = FieldProjection::new([RecordField::Odds, RecordField::FinishRank, RecordField::Odds]);
        assert_eq!(projection.fields(), &[RecordField::Odds, RecordField::FinishRank]);

        let parsed: FieldProjection = serde_json::from_str(r#"["odds","odds","finish_rank"]"#).unwrap();
        assert_eq!(parsed, projection);
    }
}
