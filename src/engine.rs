use std::fmt;
use std::num::IntErrorKind;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{Duration, NaiveTime};

use crate::model::Task;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Where the first task of a day starts.
pub const DAY_START: ClockTime = ClockTime { hour: 9, minute: 0 };

/// Column titles of the exported sheet, in order.
pub const COLUMNS: [&str; 4] = ["Task Name", "Start Time", "End Time", "Duration"];

/// A time of day with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
}

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Self {
        ClockTime { hour, minute }
    }

    /// Build a time from minutes since midnight, wrapping past the end of the day.
    pub fn from_minutes(total: u32) -> Self {
        let total = total % MINUTES_PER_DAY;
        ClockTime::new(total / 60, total % 60)
    }

    /// Minutes since midnight, without any rollover.
    pub fn minutes(self) -> u32 {
        self.hour * 60 + self.minute
    }

    /// The next minute, wrapping from 23:59 to 00:00.
    pub fn succ(self) -> Self {
        ClockTime::from_minutes(self.minutes() + 1)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// One of the four editable time components of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeField {
    StartHour,
    StartMinute,
    EndHour,
    EndMinute,
}

impl TimeField {
    /// Largest value the field accepts.
    pub fn limit(self) -> i64 {
        match self {
            TimeField::StartHour | TimeField::EndHour => 23,
            TimeField::StartMinute | TimeField::EndMinute => 59,
        }
    }

    /// Name of the column holding this field in the task table.
    pub fn column(self) -> &'static str {
        match self {
            TimeField::StartHour => "start_hour",
            TimeField::StartMinute => "start_minute",
            TimeField::EndHour => "end_hour",
            TimeField::EndMinute => "end_minute",
        }
    }
}

impl fmt::Display for TimeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.column().replace('_', "-"))
    }
}

impl FromStr for TimeField {
    type Err = anyhow::Error;

    /// Accepts `start-hour`, `start_hour` and `startHour` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(|c: char| c == '-' || c == '_', "").as_str() {
            "starthour" => Ok(TimeField::StartHour),
            "startminute" => Ok(TimeField::StartMinute),
            "endhour" => Ok(TimeField::EndHour),
            "endminute" => Ok(TimeField::EndMinute),
            _ => Err(anyhow!(
                "unknown time field `{}` (expected start-hour, start-minute, end-hour or end-minute)",
                s
            )),
        }
    }
}

/// Coerce raw user input into a valid value for `field`.
///
/// Anything that is not an integer counts as 0, then the value is clamped
/// to the field's range. This never fails.
pub fn normalize_value(field: TimeField, raw: &str) -> u32 {
    let value = match raw.trim().parse::<i64>() {
        Ok(value) => value,
        Err(err) => match err.kind() {
            IntErrorKind::PosOverflow => i64::MAX,
            IntErrorKind::NegOverflow => i64::MIN,
            _ => 0,
        },
    };
    value.min(field.limit()).max(0) as u32
}

/// Two-digit rendering of a stored field value.
pub fn pad(value: u32) -> String {
    format!("{:02}", value)
}

/// The end time a task must have so that it finishes after it starts.
///
/// Compares plain minutes of the day, so an end at or before the start is
/// moved to one minute after the start (wrapping at midnight).
pub fn corrected_end(start: ClockTime, end: ClockTime) -> ClockTime {
    if end.minutes() <= start.minutes() {
        start.succ()
    } else {
        end
    }
}

/// Default start and end of a new task, chained after the previous task's end.
pub fn chained_slot(previous_end: Option<ClockTime>) -> (ClockTime, ClockTime) {
    let start = match previous_end {
        Some(end) => end.succ(),
        None => DAY_START,
    };
    (start, start.succ())
}

/// Elapsed hours and minutes between two times of day. An end earlier than
/// the start is taken to be on the next day. Out of range input gives `(0, 0)`.
pub fn duration(start_hour: u32, start_minute: u32, end_hour: u32, end_minute: u32) -> (i64, i64) {
    let start = NaiveTime::from_hms_opt(start_hour, start_minute, 0);
    let end = NaiveTime::from_hms_opt(end_hour, end_minute, 0);
    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        _ => return (0, 0),
    };

    let mut elapsed = end.signed_duration_since(start);
    if end < start {
        elapsed = elapsed + Duration::days(1);
    }
    let minutes = elapsed.num_minutes();
    (minutes / 60, minutes % 60)
}

pub fn format_duration(hours: i64, minutes: i64) -> String {
    match (hours, minutes) {
        (0, 0) => "0 min".to_string(),
        (0, m) => format!("{} min", m),
        (h, 0) => format!("{} hr", h),
        (h, m) => format!("{} hr, {} min", h, m),
    }
}

/// Sum of every task's duration, rendered with `format_duration`.
pub fn total_duration(tasks: &[Task]) -> String {
    let minutes: i64 = tasks
        .iter()
        .map(|task| {
            let (hours, minutes) = task.duration();
            hours * 60 + minutes
        })
        .sum();
    format_duration(minutes / 60, minutes % 60)
}

/// One line of the exported sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub task_name: String,
    pub start_time: String,
    pub end_time: String,
    pub duration: String,
}

impl ExportRow {
    /// Cells in `COLUMNS` order.
    pub fn cells(&self) -> [&str; 4] {
        [
            self.task_name.as_str(),
            self.start_time.as_str(),
            self.end_time.as_str(),
            self.duration.as_str(),
        ]
    }
}

/// Materialize the exportable table, one row per task in the given order.
pub fn to_table(tasks: &[Task]) -> Vec<ExportRow> {
    tasks
        .iter()
        .map(|task| {
            let (hours, minutes) = task.duration();
            ExportRow {
                task_name: task.name.clone(),
                start_time: task.start.to_string(),
                end_time: task.end.to_string(),
                duration: format_duration(hours, minutes),
            }
        })
        .collect()
}
