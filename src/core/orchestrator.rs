//! Temporal Join/Dispatch Orchestrator
//!
//! Builds one timeline index per entity kind, runs every statistics and
//! history unit independently on the worker pool, then merges the unit
//! results onto the target rows in a single-threaded reducer.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use boatrace_features::{augment, EntityKind, EventTime, RaceRecord, TargetRow};
//!
//! let jan = EventTime::from_ymd(2024, 1, 1).unwrap();
//! let mar = EventTime::from_ymd(2024, 3, 1).unwrap();
//!
//! let mut historical = HashMap::new();
//! historical.insert(EntityKind::Handler, vec![RaceRecord::new("R1", "H1", jan, Some(1))]);
//!
//! let targets = vec![TargetRow::new("C", 4, mar)
//!     .with_entity(EntityKind::Competitor, "C1")
//!     .with_entity(EntityKind::Operator, "O1")
//!     .with_entity(EntityKind::Handler, "H1")];
//!
//! let rows = augment(&targets, &historical).unwrap();
//! assert_eq!(rows.len(), 1);
//! assert_eq!(rows[0].kind(EntityKind::Handler).unwrap().stats.race_count, 1);
//! ```

use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::aggregator::aggregate;
use super::extractor::extract;
use super::merge::{merge_rows, KindOutput, WindowOutput};
use super::targets::{kind_targets, resolve_targets, KindTarget, ResolvedRow};
use super::timeline::Timelines;
use crate::config::{AugmentConfig, ExtractionSpec, KindPlan};
use crate::error::FeatureError;
use crate::models::{
    AugmentedRow, EntityKind, EntityStats, RaceRecord, RaceRecordSnapshot, RowIdentity, TargetRow,
    TimeResolution,
};

/// Historical records per entity kind
pub type HistoricalRecords = HashMap<EntityKind, Vec<RaceRecord>>;

/// Augment target rows with the default configuration
pub fn augment(
    targets: &[TargetRow],
    historical: &HistoricalRecords,
) -> Result<Vec<AugmentedRow>, FeatureError> {
    Augmenter::new(AugmentConfig::default())?.augment(targets, historical)
}

/// One independent piece of work
enum Unit<'p> {
    Stats,
    History(&'p ExtractionSpec),
}

enum UnitResult {
    Stats(HashMap<RowIdentity, EntityStats>),
    History(String, HashMap<RowIdentity, Vec<RaceRecordSnapshot>>),
}

/// Batch augmenter
///
/// Holds no state between calls: every `augment` builds its timelines,
/// uses them, and drops them before returning.
#[derive(Debug, Clone)]
pub struct Augmenter {
    config: AugmentConfig,
}

impl Augmenter {
    pub fn new(config: AugmentConfig) -> Result<Self, FeatureError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AugmentConfig {
        &self.config
    }

    /// Augment every target row, or fail for the whole batch
    ///
    /// The output has exactly one row per target, in input order.
    pub fn augment(
        &self,
        targets: &[TargetRow],
        historical: &HistoricalRecords,
    ) -> Result<Vec<AugmentedRow>, FeatureError> {
        match self.config.workers {
            Some(workers) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build()?;
                debug!("Running batch on dedicated pool of {} workers", workers);
                pool.install(|| self.run(targets, historical))
            }
            None => self.run(targets, historical),
        }
    }

    fn run(
        &self,
        targets: &[TargetRow],
        historical: &HistoricalRecords,
    ) -> Result<Vec<AugmentedRow>, FeatureError> {
        info!(
            "Augmenting {} target rows for {} entity kinds",
            targets.len(),
            self.config.kinds.len()
        );

        let mut rows = resolve_targets(targets)?;
        let resolution = batch_resolution(&rows, historical, &self.config.kinds);
        if resolution == TimeResolution::Date {
            debug!("Comparing event times by date for this batch");
            for row in &mut rows {
                row.event_time = row.event_time.at(resolution);
            }
        }

        let per_kind: Vec<(&KindPlan, Vec<KindTarget<'_>>)> = self
            .config
            .kinds
            .iter()
            .map(|plan| Ok((plan, kind_targets(plan.kind, &rows)?)))
            .collect::<Result<_, FeatureError>>()?;

        let timelines: Vec<Timelines<'_>> = self
            .config
            .kinds
            .par_iter()
            .map(|plan| Timelines::build_at(plan.kind, records_for(historical, plan.kind), resolution))
            .collect::<Result<_, FeatureError>>()?;

        let units: Vec<(usize, Unit<'_>)> = self
            .config
            .kinds
            .iter()
            .enumerate()
            .flat_map(|(i, plan)| {
                std::iter::once((i, Unit::Stats))
                    .chain(plan.extractions.iter().map(move |spec| (i, Unit::History(spec))))
            })
            .collect();

        let window = self.config.rolling_window;
        let results: Vec<(usize, UnitResult)> = units
            .par_iter()
            .map(|(i, unit)| {
                let (_, kind_rows) = &per_kind[*i];
                let index = &timelines[*i];
                let result = match unit {
                    Unit::Stats => UnitResult::Stats(aggregate(index, kind_rows, window)),
                    Unit::History(spec) => UnitResult::History(
                        spec.label.clone(),
                        extract(index, kind_rows, spec.k, &spec.fields),
                    ),
                };
                (*i, result)
            })
            .collect();
        debug!("Completed {} work units", results.len());

        let mut outputs: Vec<KindOutput> = self
            .config
            .kinds
            .iter()
            .map(|plan| KindOutput {
                kind: plan.kind,
                stats: HashMap::new(),
                windows: Vec::with_capacity(plan.extractions.len()),
            })
            .collect();

        // Results come back in unit order, so window order follows the plan
        for (i, result) in results {
            match result {
                UnitResult::Stats(stats) => outputs[i].stats = stats,
                UnitResult::History(label, by_row) => {
                    outputs[i].windows.push(WindowOutput { label, by_row })
                }
            }
        }

        let merged = merge_rows(&rows, outputs)?;
        info!("Augmented {} rows", merged.len());
        Ok(merged)
    }
}

/// One comparison granularity for targets and every configured history
fn batch_resolution(
    rows: &[ResolvedRow<'_>],
    historical: &HistoricalRecords,
    kinds: &[KindPlan],
) -> TimeResolution {
    let record_times = kinds
        .iter()
        .filter_map(|plan| historical.get(&plan.kind))
        .flatten()
        .filter_map(|record| record.event_time);
    TimeResolution::detect(rows.iter().map(|r| r.event_time).chain(record_times))
}

fn records_for(historical: &HistoricalRecords, kind: EntityKind) -> &[RaceRecord] {
    match historical.get(&kind) {
        Some(records) => records.as_slice(),
        None => {
            warn!("No historical records for {}; every {} debuts", kind, kind);
            &[]
        }
    }
}
