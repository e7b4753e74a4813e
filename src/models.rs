use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Event scheduling time
///
/// Totally ordered. Most sources only carry the race date, which maps to
/// midnight of that day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventTime(NaiveDateTime);

impl EventTime {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.and_time(NaiveTime::MIN))
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self::from_date)
    }

    /// Build from a packed YYYYMMDD integer (e.g. 20240115)
    pub fn from_yyyymmdd(value: i64) -> Option<Self> {
        if value <= 0 {
            return None;
        }
        let year = (value / 10_000) as i32;
        let month = ((value / 100) % 100) as u32;
        let day = (value % 100) as u32;
        Self::from_ymd(year, month, day)
    }

    /// Parse `YYYY-MM-DD`, `YYYYMMDD` or `YYYY-MM-DD HH:MM[:SS]`
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Some(Self(dt));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
            return Some(Self(dt));
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(Self::from_date(date));
        }
        if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
            return s.parse::<i64>().ok().and_then(Self::from_yyyymmdd);
        }
        None
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// Whole days elapsed from `self` to `later`
    pub fn days_until(&self, later: EventTime) -> i64 {
        (later.0 - self.0).num_days()
    }

    /// Whether a time of day is set (date-only values sit at midnight)
    pub fn has_time_of_day(&self) -> bool {
        self.0.time() != NaiveTime::MIN
    }

    /// This time as compared under `resolution`
    pub fn at(&self, resolution: TimeResolution) -> EventTime {
        match resolution {
            TimeResolution::DateTime => *self,
            TimeResolution::Date => Self::from_date(self.0.date()),
        }
    }
}

/// Granularity at which one batch compares event times
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeResolution {
    /// Calendar dates only; anything on the same day is a tie
    Date,
    DateTime,
}

impl TimeResolution {
    /// `DateTime` only when every time carries a time of day
    ///
    /// A single date-only value means some source cannot order events
    /// within a day, so the whole batch falls back to dates.
    pub fn detect(times: impl IntoIterator<Item = EventTime>) -> Self {
        if times.into_iter().all(|t| t.has_time_of_day()) {
            TimeResolution::DateTime
        } else {
            TimeResolution::Date
        }
    }
}

impl From<NaiveDate> for EventTime {
    fn from(date: NaiveDate) -> Self {
        Self::from_date(date)
    }
}

impl From<NaiveDateTime> for EventTime {
    fn from(dt: NaiveDateTime) -> Self {
        Self(dt)
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.time() == NaiveTime::MIN {
            write!(f, "{}", self.0.format("%Y-%m-%d"))
        } else {
            write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S"))
        }
    }
}

/// Tracked participant kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Competitor,
    Operator,
    Handler,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Competitor,
        EntityKind::Operator,
        EntityKind::Handler,
    ];

    /// Column prefix used in the output contract
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityKind::Competitor => "competitor",
            EntityKind::Operator => "operator",
            EntityKind::Handler => "handler",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "competitor" => Ok(EntityKind::Competitor),
            "operator" => Ok(EntityKind::Operator),
            "handler" => Ok(EntityKind::Handler),
            other => Err(format!("unknown entity kind: {}", other)),
        }
    }
}

/// Unique key of a target row: (event id, competitor number)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowIdentity {
    pub event_id: String,
    pub competitor_number: u32,
}

impl RowIdentity {
    pub fn new(event_id: impl Into<String>, competitor_number: u32) -> Self {
        Self {
            event_id: event_id.into(),
            competitor_number,
        }
    }
}

impl fmt::Display for RowIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.event_id, self.competitor_number)
    }
}

/// One entity's participation and outcome in one historical event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaceRecord {
    pub event_id: String,
    pub entity_id: Option<String>,
    pub event_time: Option<EventTime>,
    /// 1-based finishing position; None when there is no result
    pub finish_rank: Option<u32>,
    pub elapsed_time: Option<f64>,
    pub distance: Option<u32>,
    pub surface_type: Option<String>,
    pub surface_condition: Option<String>,
    pub field_size: Option<u32>,
    pub post_position: Option<u32>,
    pub carried_weight: Option<f64>,
    pub odds: Option<f64>,
}

impl RaceRecord {
    pub fn new(
        event_id: impl Into<String>,
        entity_id: impl Into<String>,
        event_time: EventTime,
        finish_rank: Option<u32>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            entity_id: Some(entity_id.into()),
            event_time: Some(event_time),
            finish_rank,
            ..Default::default()
        }
    }

    pub fn with_surface(mut self, surface_type: impl Into<String>) -> Self {
        self.surface_type = Some(surface_type.into());
        self
    }

    /// Rank that counts toward statistics (0 is treated as no result)
    pub fn ranked(&self) -> Option<u32> {
        self.finish_rank.filter(|&r| r >= 1)
    }
}

/// Entity ids referenced by a target row, one per kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityIds {
    pub competitor: Option<String>,
    pub operator: Option<String>,
    pub handler: Option<String>,
}

impl EntityIds {
    pub fn get(&self, kind: EntityKind) -> Option<&str> {
        match kind {
            EntityKind::Competitor => self.competitor.as_deref(),
            EntityKind::Operator => self.operator.as_deref(),
            EntityKind::Handler => self.handler.as_deref(),
        }
    }

    pub fn set(&mut self, kind: EntityKind, id: Option<String>) {
        match kind {
            EntityKind::Competitor => self.competitor = id,
            EntityKind::Operator => self.operator = id,
            EntityKind::Handler => self.handler = id,
        }
    }
}

/// Row requiring augmentation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetRow {
    pub event_id: Option<String>,
    pub competitor_number: Option<u32>,
    pub event_time: Option<EventTime>,
    pub entity_ids: EntityIds,
    /// Surface of the target event, used for surface-specific statistics
    #[serde(default)]
    pub surface_type: Option<String>,
}

impl TargetRow {
    pub fn new(event_id: impl Into<String>, competitor_number: u32, event_time: EventTime) -> Self {
        Self {
            event_id: Some(event_id.into()),
            competitor_number: Some(competitor_number),
            event_time: Some(event_time),
            ..Default::default()
        }
    }

    pub fn with_entity(mut self, kind: EntityKind, id: impl Into<String>) -> Self {
        self.entity_ids.set(kind, Some(id.into()));
        self
    }

    pub fn with_surface(mut self, surface_type: impl Into<String>) -> Self {
        self.surface_type = Some(surface_type.into());
        self
    }
}

/// Point-in-time statistics for one entity at one target row
///
/// All-zero (and `days_since_last = None`) for a debut.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityStats {
    pub race_count: u32,
    pub win_rate: f64,
    pub place_rate: f64,
    pub avg_rank: f64,
    pub rolling_race_count: u32,
    pub rolling_win_rate: f64,
    pub rolling_place_rate: f64,
    pub rolling_avg_rank: f64,
    pub surface_race_count: u32,
    pub surface_win_rate: f64,
    pub surface_place_rate: f64,
    pub days_since_last: Option<i64>,
}

/// Projected copy of a past record
///
/// Fields outside the requested projection stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaceRecordSnapshot {
    pub event_id: String,
    pub event_time: Option<EventTime>,
    pub finish_rank: Option<u32>,
    pub elapsed_time: Option<f64>,
    pub distance: Option<u32>,
    pub surface_type: Option<String>,
    pub surface_condition: Option<String>,
    pub field_size: Option<u32>,
    pub post_position: Option<u32>,
    pub carried_weight: Option<f64>,
    pub odds: Option<f64>,
}

/// Most-recent-first history for one named extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryWindow {
    pub label: String,
    pub snapshots: Vec<RaceRecordSnapshot>,
}

/// Everything computed for one entity kind on one row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindFeatures {
    pub kind: EntityKind,
    pub entity_id: String,
    pub stats: EntityStats,
    pub windows: Vec<HistoryWindow>,
}

impl KindFeatures {
    pub fn window(&self, label: &str) -> Option<&[RaceRecordSnapshot]> {
        self.windows
            .iter()
            .find(|w| w.label == label)
            .map(|w| w.snapshots.as_slice())
    }

    /// `recent_i` snapshot, 1-based
    pub fn recent(&self, i: usize) -> Option<&RaceRecordSnapshot> {
        if i == 0 {
            return None;
        }
        self.window("recent").and_then(|s| s.get(i - 1))
    }
}

/// Target row plus per-kind features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentedRow {
    pub identity: RowIdentity,
    pub target: TargetRow,
    pub features: Vec<KindFeatures>,
}

impl AugmentedRow {
    pub fn kind(&self, kind: EntityKind) -> Option<&KindFeatures> {
        self.features.iter().find(|f| f.kind == kind)
    }
}
