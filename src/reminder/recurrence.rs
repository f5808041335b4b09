use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::db::models::{MonthDay, RecurrencePattern};
use crate::error::{AppError, AppResult};

/// Upper bound on calendar steps when searching for an occurrence.
const MAX_STEPS: u32 = 400;

/// Computes the occurrence that follows a fired reminder.
pub trait OccurrenceCalculator: Send + Sync + 'static {
    fn next_occurrence(
        &self,
        pattern: &RecurrencePattern,
        base: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<DateTime<Utc>>;
}

/// Resolve a wall-clock time in `tz`. Ambiguous times take the earlier instant,
/// times inside a DST gap are pushed forward by an hour.
pub fn resolve_local(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Clone, Copy)]
pub struct RecurrenceEngine {
    location: Tz,
}

impl RecurrenceEngine {
    pub fn new(location: Tz) -> Self {
        Self { location }
    }

    pub fn location(&self) -> Tz {
        self.location
    }

    /// The occurrence after `base`, not before `now`, at base's local hour and minute.
    pub fn next_occurrence(
        &self,
        pattern: &RecurrencePattern,
        base: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<DateTime<Utc>> {
        let base_local = base.with_timezone(&self.location);
        let anchor = NaiveTime::from_hms_opt(base_local.hour(), base_local.minute(), 0)
            .ok_or_else(|| out_of_range(pattern))?;
        let base_date = base_local.date_naive();

        match pattern {
            RecurrencePattern::Monthly(day) => {
                let start = month_index(base_date) + 1;
                self.scan_months(pattern, *day, anchor, start, |candidate| candidate >= now, now)
            }
            _ => {
                let start = base_date
                    .checked_add_days(Days::new(1))
                    .ok_or_else(|| out_of_range(pattern))?;
                self.scan_days(pattern, anchor, start, |candidate| candidate >= now, now)
            }
        }
    }

    /// First instant strictly after `now` matching the pattern at `anchor`.
    pub fn first_occurrence(
        &self,
        pattern: &RecurrencePattern,
        anchor: NaiveTime,
        now: DateTime<Utc>,
    ) -> AppResult<DateTime<Utc>> {
        let anchor = NaiveTime::from_hms_opt(anchor.hour(), anchor.minute(), 0)
            .ok_or_else(|| out_of_range(pattern))?;
        let today = now.with_timezone(&self.location).date_naive();

        match pattern {
            RecurrencePattern::Monthly(day) => self.scan_months(
                pattern,
                *day,
                anchor,
                month_index(today),
                |candidate| candidate > now,
                now,
            ),
            _ => self.scan_days(pattern, anchor, today, |candidate| candidate > now, now),
        }
    }

    fn scan_days(
        &self,
        pattern: &RecurrencePattern,
        anchor: NaiveTime,
        start: NaiveDate,
        accept: impl Fn(DateTime<Utc>) -> bool,
        now: DateTime<Utc>,
    ) -> AppResult<DateTime<Utc>> {
        if let RecurrencePattern::Weekly(days) = pattern {
            if days.is_empty() {
                return Err(AppError::UnsupportedRecurrence(pattern.to_string()));
            }
        }

        // Dates before the day preceding now can only produce past candidates.
        let mut date = now
            .with_timezone(&self.location)
            .date_naive()
            .checked_sub_days(Days::new(1))
            .map_or(start, |floor| floor.max(start));

        for _ in 0..MAX_STEPS {
            if pattern.allows_weekday(date.weekday()) {
                let candidate = resolve_local(&self.location, date.and_time(anchor))
                    .ok_or_else(|| out_of_range(pattern))?;
                if accept(candidate) {
                    return Ok(candidate);
                }
            }
            date = date
                .checked_add_days(Days::new(1))
                .ok_or_else(|| out_of_range(pattern))?;
        }

        Err(out_of_range(pattern))
    }

    fn scan_months(
        &self,
        pattern: &RecurrencePattern,
        day: MonthDay,
        anchor: NaiveTime,
        start: i64,
        accept: impl Fn(DateTime<Utc>) -> bool,
        now: DateTime<Utc>,
    ) -> AppResult<DateTime<Utc>> {
        let floor = month_index(now.with_timezone(&self.location).date_naive()) - 1;
        let mut index = start.max(floor);

        for _ in 0..MAX_STEPS {
            let date = pin_day(index, day).ok_or_else(|| out_of_range(pattern))?;
            let candidate = resolve_local(&self.location, date.and_time(anchor))
                .ok_or_else(|| out_of_range(pattern))?;
            if accept(candidate) {
                return Ok(candidate);
            }
            index += 1;
        }

        Err(out_of_range(pattern))
    }
}

impl OccurrenceCalculator for RecurrenceEngine {
    fn next_occurrence(
        &self,
        pattern: &RecurrencePattern,
        base: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<DateTime<Utc>> {
        RecurrenceEngine::next_occurrence(self, pattern, base, now)
    }
}

fn out_of_range(pattern: &RecurrencePattern) -> AppError {
    AppError::UnsupportedRecurrence(format!("{} (date out of range)", pattern))
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

/// The date selected by `day` within the month at `index`.
fn pin_day(index: i64, day: MonthDay) -> Option<NaiveDate> {
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = index.rem_euclid(12) as u32 + 1;
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;

    match day {
        MonthDay::First => Some(first),
        MonthDay::Last => first
            .checked_add_months(chrono::Months::new(1))?
            .pred_opt(),
        MonthDay::Day(n) => NaiveDate::from_ymd_opt(year, month, n),
    }
}
