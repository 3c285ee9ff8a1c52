use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Bleeding intensity on a period day, stored as 1..=3.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "u8", into = "u8")]
pub enum FlowLevel {
    Light,
    Medium,
    Heavy,
}

impl FlowLevel {
    pub fn label(self) -> &'static str {
        match self {
            FlowLevel::Light => "Light",
            FlowLevel::Medium => "Medium",
            FlowLevel::Heavy => "Heavy",
        }
    }
}

impl TryFrom<u8> for FlowLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FlowLevel::Light),
            2 => Ok(FlowLevel::Medium),
            3 => Ok(FlowLevel::Heavy),
            other => Err(format!("flow level must be 1, 2 or 3, got {other}")),
        }
    }
}

impl From<FlowLevel> for u8 {
    fn from(level: FlowLevel) -> Self {
        match level {
            FlowLevel::Light => 1,
            FlowLevel::Medium => 2,
            FlowLevel::Heavy => 3,
        }
    }
}

impl FromStr for FlowLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "light" => Ok(FlowLevel::Light),
            "2" | "medium" => Ok(FlowLevel::Medium),
            "3" | "heavy" => Ok(FlowLevel::Heavy),
            other => Err(format!("unknown flow level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Excited,
    Calm,
    Sad,
    Anxious,
    Angry,
    Tired,
    Energetic,
    Cranky,
}

impl Mood {
    pub const ALL: [Mood; 9] = [
        Mood::Happy,
        Mood::Excited,
        Mood::Calm,
        Mood::Sad,
        Mood::Anxious,
        Mood::Angry,
        Mood::Tired,
        Mood::Energetic,
        Mood::Cranky,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Excited => "excited",
            Mood::Calm => "calm",
            Mood::Sad => "sad",
            Mood::Anxious => "anxious",
            Mood::Angry => "angry",
            Mood::Tired => "tired",
            Mood::Energetic => "energetic",
            Mood::Cranky => "cranky",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mood::Happy => "Happy",
            Mood::Excited => "Excited",
            Mood::Calm => "Calm",
            Mood::Sad => "Sad",
            Mood::Anxious => "Anxious",
            Mood::Angry => "Angry",
            Mood::Tired => "Tired",
            Mood::Energetic => "Energetic",
            Mood::Cranky => "Cranky",
        }
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Mood::ALL
            .into_iter()
            .find(|m| m.id() == wanted)
            .ok_or_else(|| format!("unknown mood: {s}"))
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Everything logged for one calendar day.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayRecord {
    #[serde(default, skip_serializing_if = "is_false")]
    pub period: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ovulation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<FlowLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<Mood>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DayRecord {
    /// A record with nothing worth keeping.
    pub fn is_empty(&self) -> bool {
        !self.period
            && !self.ovulation
            && self.flow.is_none()
            && self.mood.is_none()
            && self.notes.as_deref().map_or(true, |n| n.trim().is_empty())
    }

    /// Flow only exists on period days; blank notes are no notes.
    fn normalize(&mut self) {
        if !self.period {
            self.flow = None;
        }
        if self.notes.as_deref().is_some_and(|n| n.trim().is_empty()) {
            self.notes = None;
        }
    }
}

/// The per-day history, keyed by calendar day and ordered chronologically.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct DayLog {
    days: BTreeMap<NaiveDate, DayRecord>,
}

impl DayLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DayRecord> {
        self.days.get(&date)
    }

    pub fn is_period(&self, date: NaiveDate) -> bool {
        self.days.get(&date).is_some_and(|r| r.period)
    }

    /// Get-or-create the record for `date`, apply `mutate`, and drop the
    /// record again if it ends up empty. Returns what `mutate` returned.
    pub fn upsert<R>(&mut self, date: NaiveDate, mutate: impl FnOnce(&mut DayRecord) -> R) -> R {
        let record = self.days.entry(date).or_default();
        let result = mutate(&mut *record);
        record.normalize();
        if record.is_empty() {
            self.days.remove(&date);
        }
        result
    }

    pub fn remove(&mut self, date: NaiveDate) -> Option<DayRecord> {
        self.days.remove(&date)
    }

    /// Drop flow from non-period days and any records left empty, e.g. ones
    /// read from an older document.
    pub fn prune(&mut self) {
        self.days.retain(|_, record| {
            record.normalize();
            !record.is_empty()
        });
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (NaiveDate, &DayRecord)> {
        self.days.iter().map(|(date, record)| (*date, record))
    }

    /// Chronologically ordered days marked as period days.
    pub fn period_days(&self) -> impl DoubleEndedIterator<Item = NaiveDate> + '_ {
        self.iter().filter(|(_, r)| r.period).map(|(date, _)| date)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

impl FromIterator<(NaiveDate, DayRecord)> for DayLog {
    fn from_iter<T: IntoIterator<Item = (NaiveDate, DayRecord)>>(iter: T) -> Self {
        let mut log = DayLog {
            days: iter.into_iter().collect(),
        };
        log.prune();
        log
    }
}

/// Predicted flags for one day.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PredictedDay {
    #[serde(default, skip_serializing_if = "is_false")]
    pub predicted_period: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub predicted_ovulation: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub fertile_window: bool,
}

/// Derived predictions keyed by day. Never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PredictionMap {
    days: BTreeMap<NaiveDate, PredictedDay>,
}

impl PredictionMap {
    pub fn get(&self, date: NaiveDate) -> Option<&PredictedDay> {
        self.days.get(&date)
    }

    /// Set flags on `date` without clearing flags already there.
    pub fn mark(&mut self, date: NaiveDate, flag: impl FnOnce(&mut PredictedDay)) {
        flag(self.days.entry(date).or_default());
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &PredictedDay)> {
        self.days.iter().map(|(date, day)| (*date, day))
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// One logged period: its first day and how many consecutive days it ran.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeriodSummary {
    pub start: NaiveDate,
    pub length: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CycleStats {
    pub total_periods: usize,
    pub avg_cycle_length: Option<i64>,
    pub avg_period_length: Option<f32>,
    pub shortest_cycle: Option<i64>,
    pub longest_cycle: Option<i64>,
    pub last_period_start: Option<NaiveDate>,
    pub last_period_end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub is_today: bool,
    pub record: Option<DayRecord>,
    pub prediction: Option<PredictedDay>,
}

/// Data for one month of the calendar view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthData {
    pub year: i32,
    pub month: u32,
    pub days: Vec<CalendarDay>,
}
