#![allow(dead_code)]

use chrono::{DateTime, Utc};
use daftar_lib::{DigitMode, FixedClock, JalaliCalendar, JalaliDate, TrackerConfig};
use rusqlite::Connection;
use tempfile::TempDir;

/// File-backed database in a fresh temp dir, Latin digits, Tehran offset.
pub fn setup_test_env() -> (Connection, JalaliCalendar, TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = TrackerConfig {
        database_path: Some(dir.path().join("finance.db")),
        digit_mode: DigitMode::Latin,
        ..TrackerConfig::default()
    };
    let conn = daftar_lib::open(&config).expect("open database");
    let calendar = config.calendar().expect("calendar");
    (conn, calendar, dir)
}

pub fn jalali(calendar: &JalaliCalendar, y: i32, m: u32, d: u32) -> DateTime<Utc> {
    calendar
        .from_jalali(JalaliDate::new(y, m, d).expect("valid jalali date"))
        .expect("convert jalali date")
}

pub fn clock_at(calendar: &JalaliCalendar, y: i32, m: u32, d: u32) -> FixedClock {
    FixedClock(jalali(calendar, y, m, d))
}
