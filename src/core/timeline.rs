//! Entity Timelines
//!
//! Groups historical records by entity and annotates each record with
//! running cumulative counters, so point-in-time statistics are O(1)
//! reads after an O(log n) boundary search.

use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;

use super::locator::Timed;
use crate::error::{FeatureError, Stage};
use crate::models::{EntityKind, EventTime, RaceRecord, TimeResolution};

/// Running counters up to and including one record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub races: u32,
    pub wins: u32,
    pub top3: u32,
    /// Starts with a finishing position (denominator of the rank average)
    pub ranked: u32,
    pub rank_sum: u64,
}

impl Counters {
    fn add(&mut self, record: &RaceRecord) {
        self.races += 1;
        if let Some(rank) = record.ranked() {
            self.ranked += 1;
            self.rank_sum += rank as u64;
            if rank == 1 {
                self.wins += 1;
            }
            if rank <= 3 {
                self.top3 += 1;
            }
        }
    }

    /// Counters accumulated after `earlier`
    pub fn since(&self, earlier: &Counters) -> Counters {
        Counters {
            races: self.races.saturating_sub(earlier.races),
            wins: self.wins.saturating_sub(earlier.wins),
            top3: self.top3.saturating_sub(earlier.top3),
            ranked: self.ranked.saturating_sub(earlier.ranked),
            rank_sum: self.rank_sum.saturating_sub(earlier.rank_sum),
        }
    }

    pub fn win_rate(&self) -> f64 {
        ratio(self.wins as f64, self.races)
    }

    pub fn place_rate(&self) -> f64 {
        ratio(self.top3 as f64, self.races)
    }

    pub fn avg_rank(&self) -> f64 {
        ratio(self.rank_sum as f64, self.ranked)
    }
}

fn ratio(numerator: f64, denominator: u32) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

/// One record on an entity timeline
#[derive(Debug, Clone)]
pub struct TimelineEntry<'a> {
    pub record: &'a RaceRecord,
    pub event_time: EventTime,
    /// Position in the input record slice, the last tiebreaker after event id
    pub load_order: usize,
    pub cumulative: Counters,
}

impl Timed for TimelineEntry<'_> {
    fn event_time(&self) -> EventTime {
        self.event_time
    }
}

/// Cumulative counters restricted to one surface type
#[derive(Debug, Clone, Copy)]
pub struct SurfacePoint {
    pub event_time: EventTime,
    pub cumulative: Counters,
}

impl Timed for SurfacePoint {
    fn event_time(&self) -> EventTime {
        self.event_time
    }
}

/// Time-ordered history of one entity
#[derive(Debug, Clone)]
pub struct EntityTimeline<'a> {
    entity_id: &'a str,
    entries: Vec<TimelineEntry<'a>>,
    surfaces: HashMap<&'a str, Vec<SurfacePoint>>,
}

impl<'a> EntityTimeline<'a> {
    /// Build from records of a single entity, already in load order
    fn from_group(entity_id: &'a str, mut group: Vec<(usize, EventTime, &'a RaceRecord)>) -> Self {
        // Equal times order by event id; stable sort keeps load order for the rest
        group.sort_by(|(_, a_time, a), (_, b_time, b)| {
            a_time.cmp(b_time).then_with(|| a.event_id.cmp(&b.event_id))
        });

        let mut running = Counters::default();
        let mut surface_running: HashMap<&'a str, Counters> = HashMap::new();
        let mut surfaces: HashMap<&'a str, Vec<SurfacePoint>> = HashMap::new();
        let mut entries = Vec::with_capacity(group.len());

        for (load_order, event_time, record) in group {
            running.add(record);
            if let Some(surface) = record.surface_type.as_deref() {
                let counters = surface_running.entry(surface).or_default();
                counters.add(record);
                surfaces.entry(surface).or_default().push(SurfacePoint {
                    event_time,
                    cumulative: *counters,
                });
            }
            entries.push(TimelineEntry {
                record,
                event_time,
                load_order,
                cumulative: running,
            });
        }

        Self {
            entity_id,
            entries,
            surfaces,
        }
    }

    pub fn entity_id(&self) -> &'a str {
        self.entity_id
    }

    pub fn entries(&self) -> &[TimelineEntry<'a>] {
        &self.entries
    }

    /// Sub-timeline of one surface type (empty if never raced on it)
    pub fn surface(&self, surface_type: &str) -> &[SurfacePoint] {
        self.surfaces
            .get(surface_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Cumulative counters through `index` inclusive
    pub fn counters_at(&self, index: usize) -> Counters {
        self.entries
            .get(index)
            .map(|e| e.cumulative)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All timelines of one entity kind, indexed by entity id
///
/// Borrows the historical records read-only for the lifetime of a batch.
#[derive(Debug, Clone)]
pub struct Timelines<'a> {
    kind: EntityKind,
    by_entity: HashMap<&'a str, EntityTimeline<'a>>,
    record_count: usize,
}

impl<'a> Timelines<'a> {
    /// Group, sort and annotate all records of one kind at full time resolution
    ///
    /// Fails if any record lacks `entity_id` or `event_time`.
    pub fn build(kind: EntityKind, records: &'a [RaceRecord]) -> Result<Self, FeatureError> {
        Self::build_at(kind, records, TimeResolution::DateTime)
    }

    /// Like [`Timelines::build`], with every event time reduced to `resolution`
    pub fn build_at(
        kind: EntityKind,
        records: &'a [RaceRecord],
        resolution: TimeResolution,
    ) -> Result<Self, FeatureError> {
        let mut groups: HashMap<&'a str, Vec<(usize, EventTime, &'a RaceRecord)>> = HashMap::new();

        for (i, record) in records.iter().enumerate() {
            let entity_id = record.entity_id.as_deref().ok_or_else(|| {
                FeatureError::missing(Stage::Timeline, Some(kind), record_subject(i, record), "entity_id")
            })?;
            let event_time = record.event_time.ok_or_else(|| {
                FeatureError::missing(Stage::Timeline, Some(kind), record_subject(i, record), "event_time")
            })?
            .at(resolution);
            groups
                .entry(entity_id)
                .or_default()
                .push((i, event_time, record));
        }

        let by_entity: HashMap<&'a str, EntityTimeline<'a>> = groups
            .into_par_iter()
            .map(|(entity_id, group)| (entity_id, EntityTimeline::from_group(entity_id, group)))
            .collect();

        debug!(
            "Built {} {} timelines from {} records",
            by_entity.len(),
            kind,
            records.len()
        );

        Ok(Self {
            kind,
            by_entity,
            record_count: records.len(),
        })
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn get(&self, entity_id: &str) -> Option<&EntityTimeline<'a>> {
        self.by_entity.get(entity_id)
    }

    /// Entity ids in sorted order
    pub fn entity_ids(&self) -> Vec<&'a str> {
        let mut ids: Vec<&'a str> = self.by_entity.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Number of distinct entities
    pub fn len(&self) -> usize {
        self.by_entity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }
}

fn record_subject(index: usize, record: &RaceRecord) -> String {
    if record.event_id.is_empty() {
        format!("record #{}", index)
    } else {
        format!("record #{} (event {})", index, record.event_id)
    }
}
