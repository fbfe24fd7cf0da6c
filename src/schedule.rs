use chrono::{DateTime, Utc};

use crate::errors::{Error, Result};
use crate::jalali::JalaliCalendar;

pub const MAX_DUE_DAY: u32 = 31;

pub fn validate_schedule_params(count: u32, due_day: u32) -> Result<()> {
    if count < 1 {
        return Err(Error::InvalidScheduleParams(format!(
            "installment count must be at least 1, got {}",
            count
        )));
    }
    if !(1..=MAX_DUE_DAY).contains(&due_day) {
        return Err(Error::InvalidScheduleParams(format!(
            "due day must be within 1..=31, got {}",
            due_day
        )));
    }
    Ok(())
}

/// Builds `count` monthly due dates starting in the Jalali month of `start`.
///
/// Month `i` lands on `min(due_day, days in that month)`, computed from
/// `due_day` every time so a short month never shifts later ones. The
/// local time of day of `start` is kept.
pub fn generate_schedule(
    calendar: &JalaliCalendar,
    start: DateTime<Utc>,
    count: u32,
    due_day: u32,
) -> Result<Vec<DateTime<Utc>>> {
    validate_schedule_params(count, due_day)?;

    let first = calendar.to_jalali(start)?;
    let time = calendar.local_time(start);
    let mut dates = Vec::new();
    for i in 0..count {
        let month = first.month_start_offset(i as i32)?;
        let due = month.with_day_clamped(due_day)?;
        dates.push(calendar.from_jalali_at(due, time)?);
    }
    Ok(dates)
}

/// First date not before `now`, or the first date when all have passed.
pub fn upcoming_due_date(schedule: &[DateTime<Utc>], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule
        .iter()
        .find(|d| **d >= now)
        .or_else(|| schedule.first())
        .copied()
}
