//! Jalali (Persian solar) calendar arithmetic.
//!
//! Day numbers are Julian Day Numbers; the Gregorian side is delegated to
//! chrono. Leap years follow the 33-year break table, valid for Jalali
//! years -61 through 3177.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};

use crate::digits::{to_english_digits, DigitMode};
use crate::errors::{Error, Result};

const BREAKS: [i32; 20] = [
    -61, 9, 38, 199, 426, 686, 756, 818, 1111, 1181, 1210, 1635, 2060, 2097, 2192, 2262, 2324,
    2394, 2456, 3178,
];

/// Julian Day Number of 0001-01-01 (proleptic Gregorian) minus one.
const JDN_CE_OFFSET: i32 = 1_721_425;

pub const MONTH_NAMES: [&str; 12] = [
    "فروردین",
    "اردیبهشت",
    "خرداد",
    "تیر",
    "مرداد",
    "شهریور",
    "مهر",
    "آبان",
    "آذر",
    "دی",
    "بهمن",
    "اسفند",
];

struct YearInfo {
    gregorian_year: i32,
    /// Day of March on which Farvardin 1st falls.
    march: u32,
    /// Years since the last leap year; 0 means this year is leap.
    leap: i32,
}

fn year_info(jy: i32) -> Result<YearInfo> {
    if jy < BREAKS[0] || jy >= BREAKS[BREAKS.len() - 1] {
        return Err(Error::InvalidDate(format!("Jalali year {} out of range", jy)));
    }

    let gy = jy + 621;
    let mut leap_j = -14;
    let mut jp = BREAKS[0];
    let mut jump = 0;
    for &jm in &BREAKS[1..] {
        jump = jm - jp;
        if jy < jm {
            break;
        }
        leap_j += jump / 33 * 8 + (jump % 33) / 4;
        jp = jm;
    }
    let mut n = jy - jp;

    leap_j += n / 33 * 8 + ((n % 33) + 3) / 4;
    if jump % 33 == 4 && jump - n == 4 {
        leap_j += 1;
    }
    let leap_g = gy / 4 - ((gy / 100 + 1) * 3) / 4 - 150;
    let march = 20 + leap_j - leap_g;

    if jump - n < 6 {
        n = n - jump + (jump + 4) / 33 * 33;
    }
    let mut leap = ((n + 1) % 33 - 1) % 4;
    if leap == -1 {
        leap = 4;
    }

    Ok(YearInfo {
        gregorian_year: gy,
        march: march as u32,
        leap,
    })
}

fn gregorian_to_jdn(date: NaiveDate) -> i32 {
    date.num_days_from_ce() + JDN_CE_OFFSET
}

fn jdn_to_gregorian(jdn: i32) -> Result<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(jdn - JDN_CE_OFFSET)
        .ok_or_else(|| Error::InvalidDate(format!("day number {} out of range", jdn)))
}

fn farvardin_first_jdn(info: &YearInfo) -> Result<i32> {
    NaiveDate::from_ymd_opt(info.gregorian_year, 3, info.march)
        .map(gregorian_to_jdn)
        .ok_or_else(|| Error::InvalidDate(format!("no Farvardin 1st for {}", info.gregorian_year)))
}

pub fn is_leap_jalali_year(year: i32) -> Result<bool> {
    Ok(year_info(year)?.leap == 0)
}

pub fn days_in_jalali_month(year: i32, month: u32) -> Result<u32> {
    match month {
        1..=6 => Ok(31),
        7..=11 => Ok(30),
        12 => Ok(if is_leap_jalali_year(year)? { 30 } else { 29 }),
        _ => Err(Error::InvalidDate(format!("month {} out of range", month))),
    }
}

/// A validated Jalali calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JalaliDate {
    year: i32,
    month: u32,
    day: u32,
}

impl JalaliDate {
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self> {
        let days = days_in_jalali_month(year, month)?;
        if day == 0 || day > days {
            return Err(Error::InvalidDate(format!(
                "day {} out of range for {}/{:02} ({} days)",
                day, year, month, days
            )));
        }
        Ok(Self { year, month, day })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn days_in_month(&self) -> Result<u32> {
        days_in_jalali_month(self.year, self.month)
    }

    pub fn from_gregorian(date: NaiveDate) -> Result<Self> {
        let jdn = gregorian_to_jdn(date);
        let mut jy = date.year() - 621;
        let info = year_info(jy)?;
        let mut k = jdn - farvardin_first_jdn(&info)?;

        if k >= 0 {
            if k <= 185 {
                return Ok(Self {
                    year: jy,
                    month: (1 + k / 31) as u32,
                    day: (k % 31 + 1) as u32,
                });
            }
            k -= 186;
        } else {
            // still in the previous Jalali year
            jy -= 1;
            k += 179;
            if info.leap == 1 {
                k += 1;
            }
        }
        Ok(Self {
            year: jy,
            month: (7 + k / 30) as u32,
            day: (k % 30 + 1) as u32,
        })
    }

    pub fn to_gregorian(&self) -> Result<NaiveDate> {
        let info = year_info(self.year)?;
        let m = self.month as i32;
        let jdn = farvardin_first_jdn(&info)? + (m - 1) * 31 - m / 7 * (m - 7) + self.day as i32 - 1;
        jdn_to_gregorian(jdn)
    }

    /// First day of the month `months` away (negative goes back).
    pub fn month_start_offset(&self, months: i32) -> Result<Self> {
        let index = self
            .year
            .checked_mul(12)
            .and_then(|i| i.checked_add(self.month as i32 - 1))
            .and_then(|i| i.checked_add(months))
            .ok_or_else(|| Error::InvalidDate(format!("{} plus {} months overflows", self, months)))?;
        Self::new(index.div_euclid(12), (index.rem_euclid(12) + 1) as u32, 1)
    }

    /// Same month, day clamped to the month length.
    pub fn with_day_clamped(&self, day: u32) -> Result<Self> {
        let days = self.days_in_month()?;
        Self::new(self.year, self.month, day.clamp(1, days))
    }

    /// Moves `months` calendar months, keeping this date's day unless the
    /// target month is shorter.
    pub fn add_months(&self, months: i32) -> Result<Self> {
        self.month_start_offset(months)?.with_day_clamped(self.day)
    }

    /// `jYYYY/jMM`, the bucket key used by chart series.
    pub fn month_key(&self) -> String {
        format!("{:04}/{:02}", self.year, self.month)
    }
}

impl fmt::Display for JalaliDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}/{:02}/{:02}", self.year, self.month, self.day)
    }
}

impl FromStr for JalaliDate {
    type Err = Error;

    /// Accepts `y/m/d` in any digit script.
    fn from_str(s: &str) -> Result<Self> {
        let normalized = to_english_digits(s.trim());
        let parts: Vec<&str> = normalized.split('/').collect();
        if parts.len() != 3 {
            return Err(Error::InvalidDate(format!("expected year/month/day, got {:?}", s)));
        }
        let bad = |_| Error::InvalidDate(format!("non-numeric Jalali date {:?}", s));
        let year = parts[0].trim().parse::<i32>().map_err(bad)?;
        let month = parts[1].trim().parse::<u32>().map_err(bad)?;
        let day = parts[2].trim().parse::<u32>().map_err(bad)?;
        Self::new(year, month, day)
    }
}

/// Parses an ISO-8601 instant, or a bare `YYYY-MM-DD` taken as UTC midnight.
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }
    Err(Error::InvalidDate(format!("not an ISO-8601 instant: {:?}", s)))
}

/// The Jalali Date Adapter: converts instants to local Jalali fields and
/// back using an explicit offset and digit mode.
#[derive(Debug, Clone, Copy)]
pub struct JalaliCalendar {
    offset: FixedOffset,
    digits: DigitMode,
}

impl JalaliCalendar {
    pub fn new(offset: FixedOffset, digits: DigitMode) -> Self {
        Self { offset, digits }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn digit_mode(&self) -> DigitMode {
        self.digits
    }

    pub fn to_jalali(&self, instant: DateTime<Utc>) -> Result<JalaliDate> {
        JalaliDate::from_gregorian(instant.with_timezone(&self.offset).date_naive())
    }

    /// Local midnight of `date`.
    pub fn from_jalali(&self, date: JalaliDate) -> Result<DateTime<Utc>> {
        self.from_jalali_at(date, NaiveTime::MIN)
    }

    pub fn from_jalali_at(&self, date: JalaliDate, time: NaiveTime) -> Result<DateTime<Utc>> {
        let local = date.to_gregorian()?.and_time(time);
        self.offset
            .from_local_datetime(&local)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| Error::InvalidDate(format!("{} {} has no single instant", date, time)))
    }

    /// Local wall-clock time of `instant`, dropping sub-second precision.
    pub fn local_time(&self, instant: DateTime<Utc>) -> NaiveTime {
        let t = instant.with_timezone(&self.offset).time();
        t.with_nanosecond(0).unwrap_or(t)
    }

    pub fn add_jalali_months(&self, instant: DateTime<Utc>, months: i32) -> Result<DateTime<Utc>> {
        let shifted = self.to_jalali(instant)?.add_months(months)?;
        self.from_jalali_at(shifted, self.local_time(instant))
    }

    pub fn day_of_month(&self, instant: DateTime<Utc>) -> Result<u32> {
        Ok(self.to_jalali(instant)?.day())
    }

    pub fn month_key(&self, instant: DateTime<Utc>) -> Result<String> {
        Ok(self.to_jalali(instant)?.month_key())
    }

    /// `jYYYY/jMM/jDD` in the configured digits.
    pub fn format_date(&self, instant: DateTime<Utc>) -> Result<String> {
        Ok(self.digits.apply(&self.to_jalali(instant)?.to_string()))
    }

    /// `jYYYY/jMM/jDD HH:mm` in the configured digits.
    pub fn format_date_time(&self, instant: DateTime<Utc>) -> Result<String> {
        let date = self.to_jalali(instant)?;
        let time = self.local_time(instant);
        Ok(self
            .digits
            .apply(&format!("{} {:02}:{:02}", date, time.hour(), time.minute())))
    }

    /// Jalali `y/m/d` text (any digits) to the instant of its local midnight.
    pub fn parse_date(&self, text: &str) -> Result<DateTime<Utc>> {
        self.from_jalali(text.parse()?)
    }

    /// Month name and two-digit year for a `jYYYY/jMM` key, e.g. `آبان ۰۴`.
    pub fn month_label(&self, key: &str) -> Result<String> {
        let date = parse_month_key(key)?;
        let name = MONTH_NAMES[(date.month() - 1) as usize];
        Ok(format!(
            "{} {}",
            name,
            self.digits.apply(&format!("{:02}", date.year().rem_euclid(100)))
        ))
    }

    /// Bare two-digit month number for a `jYYYY/jMM` key.
    pub fn month_number_label(&self, key: &str) -> Result<String> {
        let date = parse_month_key(key)?;
        Ok(self.digits.apply(&format!("{:02}", date.month())))
    }
}

fn parse_month_key(key: &str) -> Result<JalaliDate> {
    format!("{}/01", key.trim()).parse()
}
