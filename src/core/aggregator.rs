//! Entity Statistics Aggregator
//!
//! Win rate, place rate, average finishing position and race count as of
//! (but excluding) a target row's event time.

use rayon::prelude::*;
use std::collections::HashMap;

use super::locator::locate;
use super::targets::KindTarget;
use super::timeline::{EntityTimeline, Timelines};
use crate::models::{EntityStats, EventTime, RowIdentity};

/// Number of recent races used for rolling statistics
pub const DEFAULT_ROLLING_WINDOW: usize = 30;

/// Compute statistics for one entity at `query_time`
///
/// A missing timeline or a timeline with nothing strictly before
/// `query_time` is a debut and yields all-zero statistics.
///
/// # Arguments
/// * `timeline` - The entity's timeline, if it has any history at all
/// * `query_time` - Target row's event time; only earlier records count
/// * `surface_type` - Target surface for surface-specific statistics
/// * `rolling_window` - Number of most recent races for rolling statistics
pub fn compute_stats(
    timeline: Option<&EntityTimeline<'_>>,
    query_time: EventTime,
    surface_type: Option<&str>,
    rolling_window: usize,
) -> EntityStats {
    let Some(timeline) = timeline else {
        return EntityStats::default();
    };
    let Some(boundary) = locate(timeline.entries(), query_time) else {
        return EntityStats::default();
    };

    let total = timeline.counters_at(boundary);

    // Entries (boundary - window, boundary]
    let rolling = match boundary.checked_sub(rolling_window) {
        Some(before) => total.since(&timeline.counters_at(before)),
        None => total,
    };

    let surface = surface_type
        .map(|s| {
            let points = timeline.surface(s);
            locate(points, query_time)
                .map(|i| points[i].cumulative)
                .unwrap_or_default()
        })
        .unwrap_or_default();

    let last_time = timeline.entries()[boundary].event_time;

    EntityStats {
        race_count: total.races,
        win_rate: total.win_rate(),
        place_rate: total.place_rate(),
        avg_rank: total.avg_rank(),
        rolling_race_count: rolling.races,
        rolling_win_rate: rolling.win_rate(),
        rolling_place_rate: rolling.place_rate(),
        rolling_avg_rank: rolling.avg_rank(),
        surface_race_count: surface.races,
        surface_win_rate: surface.win_rate(),
        surface_place_rate: surface.place_rate(),
        days_since_last: Some(last_time.days_until(query_time)),
    }
}

/// Statistics for every target row of one kind, keyed by row identity
pub fn aggregate(
    timelines: &Timelines<'_>,
    targets: &[KindTarget<'_>],
    rolling_window: usize,
) -> HashMap<RowIdentity, EntityStats> {
    targets
        .par_iter()
        .map(|t| {
            let stats = compute_stats(
                timelines.get(t.entity_id),
                t.event_time,
                t.surface_type,
                rolling_window,
            );
            (t.identity.clone(), stats)
        })
        .collect()
}
