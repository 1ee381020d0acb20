use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::{IntoParams, ToSchema};

pub type PeriodId = i64;
pub type EntryId = i64;
pub type DayId = u8;

/// Default school week: Monday to Saturday. Sunday is off.
pub const SCHOOL_WEEK: [&str; 6] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Serde adapter for wall-clock times exchanged as `HH:MM` or `HH:MM:SS`.
pub mod wall_clock {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub const WIRE_FORMAT: &str = "%H:%M:%S";

    pub fn parse(value: &str) -> Option<NaiveTime> {
        let value = value.trim();
        NaiveTime::parse_from_str(value, WIRE_FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
            .ok()
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format(WIRE_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid wall-clock time: {raw}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Period {
    pub id: PeriodId,
    pub name: String,
    #[serde(with = "wall_clock")]
    #[schema(value_type = String, example = "08:00:00")]
    pub start_time: NaiveTime,
    #[serde(with = "wall_clock")]
    #[schema(value_type = String, example = "08:45:00")]
    pub end_time: NaiveTime,
    #[serde(default)]
    pub is_break: bool,
    pub order: i32,
}

impl Period {
    /// `HH:MM - HH:MM`, seconds dropped.
    pub fn time_range(&self) -> String {
        format!(
            "{} - {}",
            self.start_time.format("%H:%M"),
            self.end_time.format("%H:%M")
        )
    }
}

/// Period form state as submitted by an administrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PeriodDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    #[schema(example = "08:00")]
    pub start_time: String,
    #[serde(default)]
    #[schema(example = "08:45")]
    pub end_time: String,
    #[serde(default)]
    pub is_break: bool,
    pub order: Option<i32>,
}

impl From<&Period> for PeriodDraft {
    fn from(period: &Period) -> Self {
        Self {
            name: period.name.clone(),
            start_time: period.start_time.format(wall_clock::WIRE_FORMAT).to_string(),
            end_time: period.end_time.format(wall_clock::WIRE_FORMAT).to_string(),
            is_break: period.is_break,
            order: Some(period.order),
        }
    }
}

/// Validated period body sent to the backend.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewPeriod {
    pub name: String,
    #[serde(with = "wall_clock")]
    pub start_time: NaiveTime,
    #[serde(with = "wall_clock")]
    pub end_time: NaiveTime,
    pub is_break: bool,
    pub order: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct TimetableEntry {
    pub id: EntryId,
    #[serde(default)]
    pub class_obj: i64,
    #[serde(default)]
    pub section: i64,
    pub day_of_week: DayId,
    pub period: PeriodId,
    #[serde(default)]
    pub subject: i64,
    #[serde(default)]
    pub subject_name: String,
    #[serde(default)]
    pub teacher: i64,
    #[serde(default)]
    pub teacher_name: String,
    #[serde(default)]
    pub room: Option<i64>,
    #[serde(default)]
    pub room_name: Option<String>,
    #[serde(default)]
    pub academic_year: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct EntryDraft {
    pub class_obj: i64,
    pub section: i64,
    pub day_of_week: DayId,
    pub period: PeriodId,
    pub subject: i64,
    pub teacher: i64,
    pub room: Option<i64>,
    pub academic_year: String,
}

/// Query filters accepted by the backend timetable listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TimetableFilter {
    pub class_id: Option<i64>,
    pub section_id: Option<i64>,
    pub teacher_id: Option<i64>,
    pub academic_year: Option<String>,
    pub day: Option<DayId>,
}

impl TimetableFilter {
    pub fn for_section(class_id: i64, section_id: i64) -> Self {
        Self {
            class_id: Some(class_id),
            section_id: Some(section_id),
            ..Self::default()
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = self.class_id {
            pairs.push(("class_id", id.to_string()));
        }
        if let Some(id) = self.section_id {
            pairs.push(("section_id", id.to_string()));
        }
        if let Some(id) = self.teacher_id {
            pairs.push(("teacher_id", id.to_string()));
        }
        if let Some(year) = &self.academic_year {
            pairs.push(("academic_year", year.clone()));
        }
        if let Some(day) = self.day {
            pairs.push(("day", day.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Day {
    pub id: DayId,
    pub label: String,
}

impl Day {
    /// Days after Monday, so Monday is 0.
    pub fn offset_from_monday(&self) -> i64 {
        i64::from(self.id) - 1
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DayTableError {
    #[error("Day table must list at least one day")]
    Empty,
    #[error("Day table lists {0} days, a week has 7")]
    TooManyDays(usize),
    #[error("Day label {0} is blank")]
    BlankLabel(DayId),
}

/// Ordered `(id, label)` pairs making up the rows of a timetable.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct DayTable {
    days: Vec<Day>,
}

impl Default for DayTable {
    fn default() -> Self {
        Self::school_week()
    }
}

impl DayTable {
    pub fn school_week() -> Self {
        Self {
            days: SCHOOL_WEEK
                .iter()
                .zip(1..)
                .map(|(label, id)| Day {
                    id,
                    label: (*label).to_string(),
                })
                .collect(),
        }
    }

    /// Labels get ids 1..=n in the given order.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self, DayTableError> {
        if labels.is_empty() {
            return Err(DayTableError::Empty);
        }
        if labels.len() > 7 {
            return Err(DayTableError::TooManyDays(labels.len()));
        }
        let mut days = Vec::with_capacity(labels.len());
        for (label, id) in labels.iter().zip(1..) {
            let label = label.as_ref().trim();
            if label.is_empty() {
                return Err(DayTableError::BlankLabel(id));
            }
            days.push(Day {
                id,
                label: label.to_string(),
            });
        }
        Ok(Self { days })
    }

    pub fn get(&self, id: DayId) -> Option<&Day> {
        self.days.iter().find(|day| day.id == id)
    }

    pub fn contains(&self, id: DayId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Day> {
        self.days.iter()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Short message shown to the user after a successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    PeriodCreated,
    PeriodUpdated,
    PeriodDeleted,
    EntryAssigned,
    EntryUpdated,
    EntryRemoved,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Notice::PeriodCreated => "Period created successfully",
            Notice::PeriodUpdated => "Period updated successfully",
            Notice::PeriodDeleted => "Period deleted",
            Notice::EntryAssigned => "Assigned successfully",
            Notice::EntryUpdated => "Updated successfully",
            Notice::EntryRemoved => "Removed successfully",
        };
        f.write_str(message)
    }
}
