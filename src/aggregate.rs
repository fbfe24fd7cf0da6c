use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::Result;
use crate::jalali::{JalaliCalendar, JalaliDate};

/// Sums per Jalali month, oldest first. `labels` are `YYYY/MM` keys.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl MonthlySeries {
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Display labels such as `آبان ۰۴`, aligned with `values`.
    pub fn display_labels(&self, calendar: &JalaliCalendar) -> Result<Vec<String>> {
        self.labels.iter().map(|key| calendar.month_label(key)).collect()
    }
}

/// The `months_back` month keys ending with the month containing `now`.
pub fn month_window(calendar: &JalaliCalendar, now: DateTime<Utc>, months_back: u32) -> Result<Vec<String>> {
    Ok(window_months(calendar, now, months_back)?
        .iter()
        .map(JalaliDate::month_key)
        .collect())
}

fn window_months(calendar: &JalaliCalendar, now: DateTime<Utc>, months_back: u32) -> Result<Vec<JalaliDate>> {
    let current = calendar.to_jalali(now)?;
    (0..months_back as i32)
        .rev()
        .map(|back| current.month_start_offset(-back))
        .collect()
}

/// Buckets `items` into the last `months_back` Jalali months. Items dated
/// outside the window are dropped; empty months sum to zero. Two calls
/// with the same `now` and `months_back` return identical labels.
pub fn bucket_by_month<T, D, A>(
    items: &[T],
    date_of: D,
    amount_of: A,
    months_back: u32,
    now: DateTime<Utc>,
    calendar: &JalaliCalendar,
) -> Result<MonthlySeries>
where
    D: Fn(&T) -> DateTime<Utc>,
    A: Fn(&T) -> f64,
{
    let months = window_months(calendar, now, months_back)?;
    let labels: Vec<String> = months.iter().map(JalaliDate::month_key).collect();
    let mut values = vec![0.0; labels.len()];
    let (first, last) = match (months.first(), months.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Ok(MonthlySeries { labels, values }),
    };

    // Only items inside [start, end) are converted to Jalali.
    let start = calendar.from_jalali(*first)?;
    let end = calendar.from_jalali(last.month_start_offset(1)?)?;
    let index: HashMap<&str, usize> = labels
        .iter()
        .enumerate()
        .map(|(i, key)| (key.as_str(), i))
        .collect();

    for item in items {
        let date = date_of(item);
        if date < start || date >= end {
            continue;
        }
        let key = calendar.month_key(date)?;
        if let Some(&i) = index.get(key.as_str()) {
            values[i] += amount_of(item);
        }
    }

    Ok(MonthlySeries { labels, values })
}
