use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Day-of-month selector for monthly recurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthDay {
    First,
    Last,
    /// Always within 1..=28 so it exists in every month.
    Day(u32),
}

impl MonthDay {
    pub const MAX_DAY: i64 = 28;

    /// Build a numeric day, clamped to [1, 28].
    pub fn day(n: i64) -> Self {
        MonthDay::Day(n.clamp(1, Self::MAX_DAY) as u32)
    }
}

/// Recurrence descriptor stored on a reminder.
///
/// Persisted as its canonical text form (`daily`, `weekday`, `weekly:sunday,monday`,
/// `monthly:first`, `monthly:last`, `monthly:15`) and decoded once when a row is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RecurrencePattern {
    Daily,
    /// Monday to Friday.
    Weekdays,
    /// One or more weekdays, in the order they were given, without duplicates.
    Weekly(Vec<Weekday>),
    Monthly(MonthDay),
}

impl RecurrencePattern {
    pub fn weekly<I: IntoIterator<Item = Weekday>>(days: I) -> Self {
        let mut unique = Vec::new();
        for day in days {
            if !unique.contains(&day) {
                unique.push(day);
            }
        }
        RecurrencePattern::Weekly(unique)
    }

    /// Whether a date falling on `weekday` can host an occurrence.
    /// Monthly patterns are constrained by day-of-month instead.
    pub fn allows_weekday(&self, weekday: Weekday) -> bool {
        match self {
            RecurrencePattern::Daily | RecurrencePattern::Monthly(_) => true,
            RecurrencePattern::Weekdays => !matches!(weekday, Weekday::Sat | Weekday::Sun),
            RecurrencePattern::Weekly(days) => days.contains(&weekday),
        }
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Parse a full lowercase weekday name.
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    match name {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonthDay::First => f.write_str("first"),
            MonthDay::Last => f.write_str("last"),
            MonthDay::Day(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for MonthDay {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(MonthDay::First),
            "last" => Ok(MonthDay::Last),
            other => {
                // Accepts "15" as well as ordinal forms like "15th".
                let digits: String = other.chars().take_while(|c| c.is_ascii_digit()).collect();
                let suffix = &other[digits.len()..];
                if digits.is_empty() || !matches!(suffix, "" | "st" | "nd" | "rd" | "th") {
                    return Err(AppError::UnsupportedRecurrence(format!("monthly:{}", other)));
                }
                let n: i64 = digits.parse().unwrap_or(i64::MAX);
                Ok(MonthDay::day(n))
            }
        }
    }
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrencePattern::Daily => f.write_str("daily"),
            RecurrencePattern::Weekdays => f.write_str("weekday"),
            RecurrencePattern::Weekly(days) => {
                let names: Vec<&str> = days.iter().map(|d| weekday_name(*d)).collect();
                write!(f, "weekly:{}", names.join(","))
            }
            RecurrencePattern::Monthly(day) => write!(f, "monthly:{}", day),
        }
    }
}

impl FromStr for RecurrencePattern {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_lowercase();
        let (kind, params) = match raw.split_once(':') {
            Some((kind, params)) => (kind, Some(params)),
            None => (raw.as_str(), None),
        };

        match (kind, params) {
            ("daily", None) => Ok(RecurrencePattern::Daily),
            ("weekday", None) => Ok(RecurrencePattern::Weekdays),
            ("weekly", Some(days)) => {
                let mut parsed = Vec::new();
                for name in days.split(',') {
                    let day = parse_weekday(name.trim())
                        .ok_or_else(|| AppError::UnsupportedRecurrence(raw.clone()))?;
                    parsed.push(day);
                }
                Ok(RecurrencePattern::weekly(parsed))
            }
            ("monthly", Some(day)) => Ok(RecurrencePattern::Monthly(day.parse()?)),
            _ => Err(AppError::UnsupportedRecurrence(raw.clone())),
        }
    }
}

impl From<RecurrencePattern> for String {
    fn from(pattern: RecurrencePattern) -> Self {
        pattern.to_string()
    }
}

impl TryFrom<String> for RecurrencePattern {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
