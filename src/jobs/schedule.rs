//! Job schedules
//!
//! A schedule is written as a 5-field cron expression (`minute hour day month weekday`).
//! Fixed `M H * * *` expressions become [`Schedule::Daily`], the common case; anything
//! else is kept as a full [`CronExpression`].

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid cron schedule format (expected 5 fields): {0}")]
    FieldCount(String),

    #[error("invalid {field} field '{value}' in schedule")]
    InvalidField { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Schedule {
    Daily { hour: u32, minute: u32 },
    Cron(CronExpression),
}

impl Schedule {
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ScheduleError::FieldCount(expression.to_string()));
        }

        if fields[2..].iter().all(|f| *f == "*") {
            if let (Some(minute), Some(hour)) = (plain_number(fields[0]), plain_number(fields[1])) {
                if minute < 60 && hour < 24 {
                    return Ok(Schedule::Daily { hour, minute });
                }
            }
        }

        CronExpression::parse(&fields).map(Schedule::Cron)
    }

    /// Whether the schedule fires in the minute containing `at`
    pub fn matches(&self, at: &NaiveDateTime) -> bool {
        match self {
            Schedule::Daily { hour, minute } => at.hour() == *hour && at.minute() == *minute,
            Schedule::Cron(expr) => expr.matches(at),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Schedule::Daily { hour, minute } => format!("daily at {:02}:{:02}", hour, minute),
            Schedule::Cron(expr) => format!("cron '{}'", expr.expression),
        }
    }
}

fn plain_number(field: &str) -> Option<u32> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Daily { hour, minute } => write!(f, "{} {} * * *", minute, hour),
            Schedule::Cron(expr) => f.write_str(&expr.expression),
        }
    }
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Schedule::parse(s)
    }
}

impl TryFrom<String> for Schedule {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Schedule::parse(&value)
    }
}

impl From<Schedule> for String {
    fn from(schedule: Schedule) -> Self {
        schedule.to_string()
    }
}

/// Parsed 5-field cron expression, each field stored as a bit set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    expression: String,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    day_of_month_restricted: bool,
    day_of_week_restricted: bool,
}

impl CronExpression {
    fn parse(fields: &[&str]) -> Result<Self, ScheduleError> {
        let minutes = parse_field(fields[0], "minute", 0, 59)?;
        let hours = parse_field(fields[1], "hour", 0, 23)?;
        let days_of_month = parse_field(fields[2], "day-of-month", 1, 31)?;
        let months = parse_field(fields[3], "month", 1, 12)?;
        let mut days_of_week = parse_field(fields[4], "day-of-week", 0, 7)?;

        // 7 is an alias for Sunday
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }

        Ok(Self {
            expression: fields.join(" "),
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            day_of_month_restricted: !fields[2].starts_with('*'),
            day_of_week_restricted: !fields[4].starts_with('*'),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn matches(&self, at: &NaiveDateTime) -> bool {
        let bit = |set: u64, value: u32| set & (1u64 << value) != 0;

        if !bit(self.minutes, at.minute()) || !bit(self.hours, at.hour()) || !bit(self.months, at.month()) {
            return false;
        }

        let dom = bit(self.days_of_month, at.day());
        let dow = bit(self.days_of_week, at.weekday().num_days_from_sunday());

        // Standard cron: when both day fields are restricted, either may match
        if self.day_of_month_restricted && self.day_of_week_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }
}

fn parse_field(field: &str, name: &'static str, min: u32, max: u32) -> Result<u64, ScheduleError> {
    let invalid = || ScheduleError::InvalidField {
        field: name,
        value: field.to_string(),
    };

    let mut set = 0u64;
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| invalid())?;
                if step == 0 {
                    return Err(invalid());
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (start, end) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            let a: u32 = a.parse().map_err(|_| invalid())?;
            let b: u32 = b.parse().map_err(|_| invalid())?;
            (a, b)
        } else {
            let a: u32 = range.parse().map_err(|_| invalid())?;
            // "5/15" means every 15 starting at 5
            if step.is_some() {
                (a, max)
            } else {
                (a, a)
            }
        };

        if start < min || end > max || start > end {
            return Err(invalid());
        }

        let step = step.unwrap_or(1);
        let mut value = start;
        while value <= end {
            set |= 1u64 << value;
            value += step;
        }
    }

    Ok(set)
}
