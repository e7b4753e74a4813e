//! DataFrame adapters for records, target rows and augmented output

use polars::prelude::*;
use std::path::Path;

use super::columns::{ColumnNamer, KEY_COLUMNS};
use crate::config::AugmentConfig;
use crate::core::extractor::RecordField;
use crate::error::{FeatureError, Stage};
use crate::models::{
    AugmentedRow, EntityKind, EntityStats, EventTime, KindFeatures, RaceRecord,
    RaceRecordSnapshot, TargetRow,
};

/// Load a CSV file into a DataFrame
pub fn read_csv<P: AsRef<Path>>(csv_path: P) -> Result<DataFrame, FeatureError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(csv_path.as_ref().to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Convert a historical record frame
///
/// Required columns: `entity_id`, `event_time`. Optional: `event_id`,
/// `finish_rank`, `elapsed_time`, `distance`, `surface_type`,
/// `surface_condition`, `field_size`, `post_position`, `carried_weight`, `odds`.
pub fn records_from_frame(df: &DataFrame) -> Result<Vec<RaceRecord>, FeatureError> {
    let entity_ids = string_values(required(df, "entity_id", "record frame")?)?;
    let event_times = event_times(required(df, "event_time", "record frame")?)?;
    let event_ids = optional_strings(df, "event_id")?;
    let ranks = optional_u32(df, "finish_rank")?;
    let elapsed = optional_f64(df, "elapsed_time")?;
    let distances = optional_u32(df, "distance")?;
    let surfaces = optional_strings(df, "surface_type")?;
    let conditions = optional_strings(df, "surface_condition")?;
    let field_sizes = optional_u32(df, "field_size")?;
    let posts = optional_u32(df, "post_position")?;
    let weights = optional_f64(df, "carried_weight")?;
    let odds = optional_f64(df, "odds")?;

    let mut records = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        records.push(RaceRecord {
            event_id: event_ids[i].clone().unwrap_or_default(),
            entity_id: entity_ids[i].clone(),
            event_time: event_times[i],
            finish_rank: ranks[i],
            elapsed_time: elapsed[i],
            distance: distances[i],
            surface_type: surfaces[i].clone(),
            surface_condition: conditions[i].clone(),
            field_size: field_sizes[i],
            post_position: posts[i],
            carried_weight: weights[i],
            odds: odds[i],
        });
    }

    Ok(records)
}

/// Convert a target frame
///
/// Required columns: `event_id`, `competitor_number`, `event_time`.
/// Optional: `competitor_id`, `operator_id`, `handler_id`, `surface_type`.
pub fn targets_from_frame(df: &DataFrame) -> Result<Vec<TargetRow>, FeatureError> {
    let event_ids = string_values(required(df, "event_id", "target frame")?)?;
    let numbers = u32_values(required(df, "competitor_number", "target frame")?)?;
    let event_times = event_times(required(df, "event_time", "target frame")?)?;
    let surfaces = optional_strings(df, "surface_type")?;
    let entity_columns: Vec<(EntityKind, Vec<Option<String>>)> = EntityKind::ALL
        .iter()
        .map(|&kind| Ok((kind, optional_strings(df, &ColumnNamer::new(kind).id())?)))
        .collect::<Result<_, FeatureError>>()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let mut row = TargetRow {
            event_id: event_ids[i].clone(),
            competitor_number: numbers[i],
            event_time: event_times[i],
            surface_type: surfaces[i].clone(),
            ..Default::default()
        };
        for (kind, ids) in &entity_columns {
            row.entity_ids.set(*kind, ids[i].clone());
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Flatten augmented rows into the `{kind}_...` column contract
pub fn augmented_to_frame(
    rows: &[AugmentedRow],
    config: &AugmentConfig,
) -> Result<DataFrame, FeatureError> {
    let mut columns = vec![
        Column::new(
            KEY_COLUMNS[0].into(),
            rows.iter().map(|r| r.identity.event_id.clone()).collect::<Vec<String>>(),
        ),
        Column::new(
            KEY_COLUMNS[1].into(),
            rows.iter().map(|r| r.identity.competitor_number).collect::<Vec<u32>>(),
        ),
        Column::new(
            KEY_COLUMNS[2].into(),
            rows.iter()
                .map(|r| r.target.event_time.map(|t| t.to_string()))
                .collect::<Vec<Option<String>>>(),
        ),
    ];

    for plan in &config.kinds {
        let namer = ColumnNamer::new(plan.kind);
        let features: Vec<&KindFeatures> = rows
            .iter()
            .map(|r| {
                r.kind(plan.kind).ok_or_else(|| {
                    FeatureError::missing(Stage::Frame, Some(plan.kind), format!("row {}", r.identity), "features")
                })
            })
            .collect::<Result<_, FeatureError>>()?;

        columns.push(Column::new(
            namer.id().into(),
            features.iter().map(|f| f.entity_id.clone()).collect::<Vec<String>>(),
        ));
        let stats: Vec<&EntityStats> = features.iter().map(|f| &f.stats).collect();
        columns.extend(stat_columns(&namer, &stats));

        for spec in &plan.extractions {
            for i in 1..=spec.k {
                let snapshots: Vec<Option<&RaceRecordSnapshot>> = features
                    .iter()
                    .map(|f| f.window(&spec.label).and_then(|w| w.get(i - 1)))
                    .collect();
                columns.push(Column::new(
                    namer.window_event_id(&spec.label, i).into(),
                    snapshots
                        .iter()
                        .map(|s| s.map(|s| s.event_id.clone()))
                        .collect::<Vec<Option<String>>>(),
                ));
                for field in spec.fields.fields() {
                    let name = namer.window_field(&spec.label, i, field.column_suffix());
                    columns.push(field_column(name, *field, &snapshots));
                }
            }
        }
    }

    Ok(DataFrame::new(columns)?)
}

fn stat_columns(namer: &ColumnNamer, stats: &[&EntityStats]) -> Vec<Column> {
    let float = |name: &str, get: fn(&EntityStats) -> f64| {
        Column::new(namer.stat(name).into(), stats.iter().map(|s| get(s)).collect::<Vec<f64>>())
    };
    let count = |name: &str, get: fn(&EntityStats) -> u32| {
        Column::new(namer.stat(name).into(), stats.iter().map(|s| get(s)).collect::<Vec<u32>>())
    };

    vec![
        float("win_rate", |s| s.win_rate),
        float("place_rate", |s| s.place_rate),
        float("avg_rank", |s| s.avg_rank),
        count("race_count", |s| s.race_count),
        float("rolling_win_rate", |s| s.rolling_win_rate),
        float("rolling_place_rate", |s| s.rolling_place_rate),
        float("rolling_avg_rank", |s| s.rolling_avg_rank),
        count("rolling_race_count", |s| s.rolling_race_count),
        float("surface_win_rate", |s| s.surface_win_rate),
        float("surface_place_rate", |s| s.surface_place_rate),
        count("surface_race_count", |s| s.surface_race_count),
        Column::new(
            namer.stat("days_since_last").into(),
            stats.iter().map(|s| s.days_since_last).collect::<Vec<Option<i64>>>(),
        ),
    ]
}

fn field_column(name: String, field: RecordField, snapshots: &[Option<&RaceRecordSnapshot>]) -> Column {
    let name: PlSmallStr = name.into();
    match field {
        RecordField::FinishRank => Column::new(name, collect(snapshots, |s| s.finish_rank)),
        RecordField::ElapsedTime => Column::new(name, collect(snapshots, |s| s.elapsed_time)),
        RecordField::Distance => Column::new(name, collect(snapshots, |s| s.distance)),
        RecordField::SurfaceType => Column::new(name, collect(snapshots, |s| s.surface_type.clone())),
        RecordField::SurfaceCondition => {
            Column::new(name, collect(snapshots, |s| s.surface_condition.clone()))
        }
        RecordField::FieldSize => Column::new(name, collect(snapshots, |s| s.field_size)),
        RecordField::PostPosition => Column::new(name, collect(snapshots, |s| s.post_position)),
        RecordField::CarriedWeight => Column::new(name, collect(snapshots, |s| s.carried_weight)),
        RecordField::Odds => Column::new(name, collect(snapshots, |s| s.odds)),
    }
}

fn collect<T>(
    snapshots: &[Option<&RaceRecordSnapshot>],
    get: impl Fn(&RaceRecordSnapshot) -> Option<T>,
) -> Vec<Option<T>> {
    snapshots.iter().map(|s| s.and_then(&get)).collect()
}

fn required<'df>(df: &'df DataFrame, name: &'static str, subject: &str) -> Result<&'df Column, FeatureError> {
    df.column(name)
        .map_err(|_| FeatureError::missing(Stage::Frame, None, subject, name))
}

fn string_values(column: &Column) -> Result<Vec<Option<String>>, FeatureError> {
    let column = column.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
        .collect())
}

fn u32_values(column: &Column) -> Result<Vec<Option<u32>>, FeatureError> {
    let column = column.cast(&DataType::Int64)?;
    Ok(column
        .i64()?
        .into_iter()
        .map(|v| v.and_then(|n| u32::try_from(n).ok()))
        .collect())
}

fn f64_values(column: &Column) -> Result<Vec<Option<f64>>, FeatureError> {
    let column = column.cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

/// `event_time` as YYYYMMDD integers or date/datetime strings
fn event_times(column: &Column) -> Result<Vec<Option<EventTime>>, FeatureError> {
    match column.dtype() {
        DataType::String => Ok(column
            .str()?
            .into_iter()
            .map(|v| v.and_then(EventTime::parse))
            .collect()),
        _ => {
            let column = column.cast(&DataType::Int64)?;
            Ok(column
                .i64()?
                .into_iter()
                .map(|v| v.and_then(EventTime::from_yyyymmdd))
                .collect())
        }
    }
}

fn optional_strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, FeatureError> {
    match df.column(name) {
        Ok(column) => string_values(column),
        Err(_) => Ok(vec![None; df.height()]),
    }
}

fn optional_u32(df: &DataFrame, name: &str) -> Result<Vec<Option<u32>>, FeatureError> {
    match df.column(name) {
        Ok(column) => u32_values(column),
        Err(_) => Ok(vec![None; df.height()]),
    }
}

fn optional_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, FeatureError> {
    match df.column(name) {
        Ok(column) => f64_values(column),
        Err(_) => Ok(vec![None; df.height()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::orchestrator::{Augmenter, HistoricalRecords};
    use crate::data::columns::output_columns;

    #[test]
    fn test_records_from_frame() {
        let df = df!(
            "event_id" => ["R1", "R2"],
            "entity_id" => [5017i64, 5017],
            "event_time" => [20240101i64, 20240201],
            "finish_rank" => [Some(1i64), None],
            "surface_type" => ["turf", "dirt"]
        )
        .unwrap();

        let records = records_from_frame(&df).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].entity_id.as_deref(), Some("5017"));
        assert_eq!(records[0].event_time, EventTime::from_ymd(2024, 1, 1));
        assert_eq!(records[1].finish_rank, None);
        assert_eq!(records[1].surface_type.as_deref(), Some("dirt"));
        assert_eq!(records[0].odds, None);
    }

    #[test]
    fn test_records_from_frame_string_dates() {
        let df = df!(
            "entity_id" => ["H1"],
            "event_time" => ["2024-03-01 15:10"]
        )
        .unwrap();
        let records = records_from_frame(&df).unwrap();
        assert_eq!(records[0].event_time, EventTime::parse("2024-03-01 15:10"));
        assert_eq!(records[0].event_id, "");
    }

    #[test]
    fn test_records_from_frame_missing_column() {
        let df = df!("entity_id" => ["H1"]).unwrap();
        let err = records_from_frame(&df).unwrap_err();
        assert!(err.is_invalid_input());
        assert!(err.to_string().contains("event_time"));
    }

    #[test]
    fn test_targets_from_frame() {
        let df = df!(
            "event_id" => ["C", "C"],
            "competitor_number" => [1i64, 2],
            "event_time" => ["2024-03-01", "2024-03-01"],
            "handler_id" => ["H", "J"]
        )
        .unwrap();

        let rows = targets_from_frame(&df).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].competitor_number, Some(2));
        assert_eq!(rows[1].entity_ids.get(EntityKind::Handler), Some("J"));
        assert_eq!(rows[0].entity_ids.get(EntityKind::Operator), None);
    }

    #[test]
    fn test_date_only_history_with_timed_targets() {
        let history = df!(
            "event_id" => ["SELF"],
            "entity_id" => ["H"],
            "event_time" => [20240301i64],
            "finish_rank" => [1i64]
        )
        .unwrap();
        let targets = df!(
            "event_id" => ["SELF"],
            "competitor_number" => [1i64],
            "event_time" => ["2024-03-01 15:10"],
            "handler_id" => ["H"]
        )
        .unwrap();

        let mut historical = HistoricalRecords::new();
        historical.insert(EntityKind::Handler, records_from_frame(&history).unwrap());
        let targets = targets_from_frame(&targets).unwrap();
        let config = AugmentConfig::for_kinds(&[EntityKind::Handler]);
        let rows = Augmenter::new(config).unwrap().augment(&targets, &historical).unwrap();

        let handler = rows[0].kind(EntityKind::Handler).unwrap();
        assert_eq!(handler.stats.race_count, 0);
        assert_eq!(handler.stats.win_rate, 0.0);
        assert!(handler.recent(1).is_none());
    }

    #[test]
    fn test_augmented_to_frame() {
        let t = EventTime::from_ymd(2024, 3, 1).unwrap();
        let mut historical = HistoricalRecords::new();
        historical.insert(
            EntityKind::Handler,
            vec![
                RaceRecord::new("R1", "H", EventTime::from_ymd(2024, 1, 1).unwrap(), Some(1)),
                RaceRecord::new("R2", "H", EventTime::from_ymd(2024, 2, 1).unwrap(), Some(3)),
            ],
        );
        let config = AugmentConfig::for_kinds(&[EntityKind::Handler]);
        let targets = vec![TargetRow::new("C", 1, t).with_entity(EntityKind::Handler, "H")];
        let rows = Augmenter::new(config.clone()).unwrap().augment(&targets, &historical).unwrap();

        let df = augmented_to_frame(&rows, &config).unwrap();
        assert_eq!(df.height(), 1);

        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, output_columns(&config));

        let race_count = df.column("handler_race_count").unwrap().u32().unwrap().get(0);
        assert_eq!(race_count, Some(2));
        let win_rate = df.column("handler_win_rate").unwrap().f64().unwrap().get(0).unwrap();
        assert!((win_rate - 0.5).abs() < 1e-9);
        let recent_1 = df.column("handler_recent_1_event_id").unwrap().str().unwrap().get(0);
        assert_eq!(recent_1, Some("R2"));
        let recent_3 = df.column("handler_recent_3_event_id").unwrap().str().unwrap().get(0);
        assert_eq!(recent_3, None);
    }
}
