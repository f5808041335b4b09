use std::sync::Arc;

use chrono::{DateTime, Days, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use regex::Regex;

use crate::db::models::{parse_weekday, MonthDay, RecurrencePattern};
use crate::error::{AppError, AppResult};
use crate::reminder::clock::Clock;
use crate::reminder::recurrence::resolve_local;

const PRIORITY_MARKER: &str = "-call";

lazy_static::lazy_static! {
    static ref TIME_OF_DAY: Regex =
        Regex::new(r"^(\d{1,2})(?::(\d{2}))?\s*(am|pm)?$").expect("valid time-of-day regex");
    static ref MONTHLY: Regex =
        Regex::new(r"^months?\s+on\s+the\s+(first|last|\d+(?:st|nd|rd|th)?)$").expect("valid monthly regex");
}

/// A one-time reminder command after parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReminder {
    pub due_time: DateTime<Utc>,
    pub title: String,
    pub priority: bool,
}

/// A recurring reminder command after parsing. `anchor` is the local time of day.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecurring {
    pub pattern: RecurrencePattern,
    pub anchor: NaiveTime,
    pub title: String,
    pub priority: bool,
}

/// Turns free-form reminder commands into due times and recurrence patterns.
#[derive(Clone)]
pub struct TimeParser {
    location: Tz,
    clock: Arc<dyn Clock>,
    default_time: NaiveTime,
}

impl TimeParser {
    pub fn new(location: Tz, clock: Arc<dyn Clock>, default_time: NaiveTime) -> Self {
        Self {
            location,
            clock,
            default_time,
        }
    }

    /// `<time> to|that <title> [-call]`
    pub fn parse_command(&self, input: &str) -> AppResult<ParsedReminder> {
        let (body, priority) = strip_priority_marker(input);
        let (time_part, title) = split_on_separator(body, &[" to ", " that "]).ok_or_else(|| {
            AppError::Format("use '<time> to <message>'".to_string())
        })?;

        let due_time = self.parse_time_expression(time_part)?;

        Ok(ParsedReminder {
            due_time,
            title: title.to_string(),
            priority,
        })
    }

    pub fn parse_time_expression(&self, input: &str) -> AppResult<DateTime<Utc>> {
        let expr = input.trim().to_lowercase();

        if expr.starts_with("every") {
            return Err(AppError::RecurrenceMisuse);
        }
        if let Some(rest) = expr.strip_prefix("in ") {
            return self.parse_relative(rest, input);
        }
        if let Some(rest) = expr.strip_prefix("tomorrow") {
            let rest = rest.trim_start();
            let rest = rest.strip_prefix("at").unwrap_or(rest);
            let time = parse_time_of_day(rest)
                .ok_or_else(|| AppError::TimeFormat(input.trim().to_string()))?;
            let tomorrow = self
                .today()
                .checked_add_days(Days::new(1))
                .ok_or_else(|| AppError::TimeFormat(input.trim().to_string()))?;
            return self.at_local(tomorrow.and_time(time), input);
        }

        if let Ok(naive) = NaiveDateTime::parse_from_str(&expr, "%Y-%m-%d %H:%M") {
            return self.at_local(naive, input);
        }
        if let Some(time) = parse_time_of_day(&expr) {
            return self.at_local(self.today().and_time(time), input);
        }

        Err(AppError::TimeFormat(input.trim().to_string()))
    }

    /// `every <schedule> [at <time>]`. Without an `at` clause the configured
    /// default time of day is used.
    pub fn parse_recurrence_pattern(&self, input: &str) -> AppResult<(RecurrencePattern, NaiveTime)> {
        let expr = input.trim().to_lowercase();
        let rest = expr
            .strip_prefix("every")
            .ok_or_else(|| AppError::Format("recurrence must start with 'every'".to_string()))?
            .trim();

        let parts: Vec<&str> = rest.split(" at ").collect();
        let (schedule, anchor) = match parts.as_slice() {
            [schedule] => (*schedule, self.default_time),
            [schedule, time] => {
                let anchor = parse_time_of_day(time)
                    .ok_or_else(|| AppError::TimeFormat(time.trim().to_string()))?;
                (*schedule, anchor)
            }
            _ => {
                return Err(AppError::Format(
                    "use 'every <schedule> at <time>'".to_string(),
                ))
            }
        };

        Ok((parse_schedule(schedule)?, anchor))
    }

    /// `every <schedule> [at <time>] to <title> [-call]`
    pub fn parse_recurring_command(&self, input: &str) -> AppResult<ParsedRecurring> {
        let (body, priority) = strip_priority_marker(input);
        let (pattern_part, title) = split_on_separator(body, &[" to "]).ok_or_else(|| {
            AppError::Format("use 'every <schedule> at <time> to <message>'".to_string())
        })?;

        let (pattern, anchor) = self.parse_recurrence_pattern(pattern_part)?;

        Ok(ParsedRecurring {
            pattern,
            anchor,
            title: title.to_string(),
            priority,
        })
    }

    fn parse_relative(&self, rest: &str, input: &str) -> AppResult<DateTime<Utc>> {
        let invalid = || AppError::TimeFormat(input.trim().to_string());

        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let (amount, unit) = match tokens.as_slice() {
            [amount, unit] => (*amount, *unit),
            _ => return Err(invalid()),
        };
        let amount: u32 = amount.parse().map_err(|_| invalid())?;
        let unit = unit.strip_suffix('s').unwrap_or(unit);
        let now = self.clock.now();

        let due = match unit {
            "minute" => now.checked_add_signed(Duration::minutes(i64::from(amount))),
            "hour" => now.checked_add_signed(Duration::hours(i64::from(amount))),
            "day" | "week" | "month" => {
                let local = now.with_timezone(&self.location).naive_local();
                let date = match unit {
                    "day" => local.date().checked_add_days(Days::new(u64::from(amount))),
                    "week" => local.date().checked_add_days(Days::new(u64::from(amount) * 7)),
                    _ => local.date().checked_add_months(Months::new(amount)),
                };
                date.and_then(|d| resolve_local(&self.location, d.and_time(local.time())))
            }
            _ => None,
        };
        due.ok_or_else(invalid)
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.location).date_naive()
    }

    fn at_local(&self, naive: NaiveDateTime, input: &str) -> AppResult<DateTime<Utc>> {
        resolve_local(&self.location, naive).ok_or_else(|| AppError::TimeFormat(input.trim().to_string()))
    }
}

/// Remove a trailing `-call` marker.
fn strip_priority_marker(input: &str) -> (&str, bool) {
    let trimmed = input.trim();
    match trimmed.strip_suffix(PRIORITY_MARKER) {
        Some(rest) => (rest.trim_end(), true),
        None => (trimmed, false),
    }
}

/// Split on the first separator found, trying them in order, case-insensitively.
fn split_on_separator<'a>(input: &'a str, separators: &[&str]) -> Option<(&'a str, &'a str)> {
    // ASCII lowercasing keeps byte offsets aligned with the original.
    let lower = input.to_ascii_lowercase();
    separators.iter().find_map(|sep| {
        lower.find(sep).map(|idx| {
            (
                input[..idx].trim(),
                input[idx + sep.len()..].trim(),
            )
        })
    })
}

/// `14:30`, `3pm`, `3 pm`, `3:04pm`, `3:04 pm` (and `am`).
fn parse_time_of_day(input: &str) -> Option<NaiveTime> {
    let caps = TIME_OF_DAY.captures(input.trim())?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };

    let hour = match caps.get(3).map(|m| m.as_str()) {
        Some(meridiem) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            match (meridiem, hour) {
                ("am", 12) => 0,
                ("am", h) => h,
                ("pm", 12) => 12,
                (_, h) => h + 12,
            }
        }
        // 24h form needs minutes.
        None if caps.get(2).is_some() => hour,
        None => return None,
    };

    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn parse_schedule(schedule: &str) -> AppResult<RecurrencePattern> {
    let schedule = schedule.trim();
    let invalid = || AppError::InvalidSchedule(schedule.to_string());

    match schedule {
        "day" | "daily" => return Ok(RecurrencePattern::Daily),
        "weekday" | "weekdays" => return Ok(RecurrencePattern::Weekdays),
        _ => {}
    }

    if schedule.starts_with("month") {
        let caps = MONTHLY.captures(schedule).ok_or_else(invalid)?;
        let day: MonthDay = caps
            .get(1)
            .ok_or_else(invalid)?
            .as_str()
            .parse()
            .map_err(|_| invalid())?;
        return Ok(RecurrencePattern::Monthly(day));
    }

    let mut days = Vec::new();
    for name in schedule.split(" and ") {
        let name = name.trim();
        let day = parse_weekday(name)
            .ok_or_else(|| AppError::InvalidSchedule(format!("unknown day '{}'", name)))?;
        days.push(day);
    }
    Ok(RecurrencePattern::weekly(days))
}
