use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use rusqlite::{params, Connection, Row};
use serde::Serialize;

use crate::clock::Clock;
use crate::digits::format_amount;
use crate::errors::{Error, Result};
use crate::installments::{get_installment, get_installment_payments};
use crate::jalali::JalaliCalendar;
use crate::models::{Reminder, ReminderItemType};
use crate::schedule::upcoming_due_date;
use crate::utils::{enum_column, instant_column, instant_text};

const SELECT_REMINDER: &str =
    "SELECT id, title, message, dueDate, isActive, itemType, itemId, createdAt FROM reminders";

fn reminder_from_row(row: &Row<'_>) -> rusqlite::Result<Reminder> {
    Ok(Reminder {
        id: row.get(0)?,
        title: row.get(1)?,
        message: row.get(2)?,
        due_date: instant_column(row, 3)?,
        is_active: row.get::<_, Option<bool>>(4)?.unwrap_or(true),
        item_type: enum_column(row, 5)?,
        item_id: row.get(6)?,
        created_at: instant_column(row, 7)?,
    })
}

pub fn get_reminders(conn: &Connection) -> Result<Vec<Reminder>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY dueDate ASC, id ASC", SELECT_REMINDER))?;
    let rows = stmt.query_map([], reminder_from_row)?;
    let mut reminders = Vec::new();
    for r in rows {
        reminders.push(r?);
    }
    Ok(reminders)
}

pub fn add_reminder(conn: &Connection, reminder: &Reminder, clock: &dyn Clock) -> Result<Vec<Reminder>> {
    conn.execute(
        "INSERT INTO reminders (title, message, dueDate, isActive, itemType, itemId, createdAt) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            reminder.title,
            reminder.message,
            instant_text(&reminder.due_date),
            reminder.is_active,
            reminder.item_type.as_str(),
            reminder.item_id,
            instant_text(&clock.now()),
        ],
    )?;
    get_reminders(conn)
}

pub fn deactivate_reminder(conn: &Connection, id: i64) -> Result<Vec<Reminder>> {
    conn.execute("UPDATE reminders SET isActive = 0 WHERE id = ?1", params![id])?;
    get_reminders(conn)
}

/// Drops every reminder pointing at one item, e.g. after the item is deleted.
pub fn delete_reminders_for_item(
    conn: &Connection,
    item_type: ReminderItemType,
    item_id: i64,
) -> Result<Vec<Reminder>> {
    conn.execute(
        "DELETE FROM reminders WHERE itemType = ?1 AND itemId = ?2",
        params![item_type.as_str(), item_id],
    )?;
    get_reminders(conn)
}

pub fn delete_reminder(conn: &Connection, id: i64) -> Result<Vec<Reminder>> {
    conn.execute("DELETE FROM reminders WHERE id = ?1", params![id])?;
    get_reminders(conn)
}

fn at_local_hour(calendar: &JalaliCalendar, date: NaiveDate, hour: u32) -> Result<DateTime<Utc>> {
    let local = date
        .and_hms_opt(hour, 0, 0)
        .ok_or_else(|| Error::InvalidDate(format!("reminder hour out of range: {}", hour)))?;
    calendar
        .offset()
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::InvalidDate(format!("{} has no single instant", local)))
}

/// `days_before` local days ahead of `due`, at `hour:00`. A time already in
/// the past moves to tomorrow at the same hour.
pub fn reminder_fire_time(
    calendar: &JalaliCalendar,
    due: DateTime<Utc>,
    days_before: u32,
    hour: u32,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let due_day = due.with_timezone(&calendar.offset()).date_naive();
    let fire_day = due_day
        .checked_sub_days(Days::new(days_before.into()))
        .ok_or_else(|| Error::InvalidDate(format!("{} days before {} is out of range", days_before, due_day)))?;
    let fire_at = at_local_hour(calendar, fire_day, hour)?;
    if fire_at >= now {
        return Ok(fire_at);
    }
    let today = now.with_timezone(&calendar.offset()).date_naive();
    let tomorrow = today
        .checked_add_days(Days::new(1))
        .ok_or_else(|| Error::InvalidDate(format!("no day after {}", today)))?;
    at_local_hour(calendar, tomorrow, hour)
}

/// A notification ready to hand to whatever delivers it.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledReminder {
    pub title: String,
    pub message: String,
    pub item_type: ReminderItemType,
    pub item_id: i64,
    pub due_date: DateTime<Utc>,
    pub fire_at: DateTime<Utc>,
}

impl ScheduledReminder {
    pub fn to_reminder(&self, created_at: DateTime<Utc>) -> Reminder {
        Reminder {
            id: 0,
            title: self.title.clone(),
            message: self.message.clone(),
            due_date: self.due_date,
            is_active: true,
            item_type: self.item_type,
            item_id: self.item_id,
            created_at,
        }
    }
}

/// Reminder text for one due item, e.g.
/// `قسط لپ‌تاپ به مبلغ ۱٬۵۰۰٬۰۰۰ تومان در تاریخ ۱۴۰۴/۰۷/۱۰ سررسید دارد.`
pub fn reminder_message(
    calendar: &JalaliCalendar,
    item_type: ReminderItemType,
    name: &str,
    amount: f64,
    due: DateTime<Utc>,
) -> Result<String> {
    let amount = format_amount(amount, calendar.digit_mode());
    let date = calendar.format_date(due)?;
    Ok(match item_type {
        ReminderItemType::Installment => {
            format!("قسط {} به مبلغ {} در تاریخ {} سررسید دارد.", name, amount, date)
        }
        ReminderItemType::Debt => {
            format!("بدهی به {} به مبلغ {} در تاریخ {} سررسید دارد.", name, amount, date)
        }
        ReminderItemType::Credit => {
            format!("طلب از {} به مبلغ {} در تاریخ {} سررسید دارد.", name, amount, date)
        }
        ReminderItemType::Check => {
            format!("چک {} به مبلغ {} در تاریخ {} سررسید دارد.", name, amount, date)
        }
    })
}

/// Reminder for the next unpaid payment of a plan, or `None` once every
/// payment is paid.
pub fn next_installment_reminder(
    conn: &Connection,
    plan_id: i64,
    calendar: &JalaliCalendar,
    days_before: u32,
    hour: u32,
    clock: &dyn Clock,
) -> Result<Option<ScheduledReminder>> {
    let plan = get_installment(conn, plan_id)?;
    let unpaid: Vec<DateTime<Utc>> = get_installment_payments(conn, plan_id)?
        .into_iter()
        .filter(|p| !p.is_paid)
        .map(|p| p.due_date)
        .collect();

    let now = clock.now();
    let due = match upcoming_due_date(&unpaid, now) {
        Some(due) => due,
        None => return Ok(None),
    };
    Ok(Some(ScheduledReminder {
        title: format!("یادآوری: {}", plan.title),
        message: reminder_message(
            calendar,
            ReminderItemType::Installment,
            &plan.title,
            plan.installment_amount,
            due,
        )?,
        item_type: ReminderItemType::Installment,
        item_id: plan.id,
        due_date: due,
        fire_at: reminder_fire_time(calendar, due, days_before, hour, now)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::digits::DigitMode;
    use crate::installments::{create_installment, toggle_installment_payment};
    use crate::jalali::JalaliDate;
    use crate::models::NewInstallmentPlan;
    use crate::utils::open_in_memory;
    use chrono::FixedOffset;

    fn calendar() -> JalaliCalendar {
        JalaliCalendar::new(FixedOffset::east_opt(210 * 60).unwrap(), DigitMode::Latin)
    }

    fn local(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        calendar()
            .offset()
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn fires_days_before_at_hour() {
        let fire = reminder_fire_time(&calendar(), local(2025, 10, 20, 0), 3, 9, local(2025, 10, 1, 12)).unwrap();
        assert_eq!(fire, local(2025, 10, 17, 9));
    }

    #[test]
    fn past_fire_time_moves_to_tomorrow() {
        let fire = reminder_fire_time(&calendar(), local(2025, 10, 20, 0), 3, 9, local(2025, 10, 19, 15)).unwrap();
        assert_eq!(fire, local(2025, 10, 20, 9));
    }

    #[test]
    fn local_day_decides_not_utc_day() {
        // 01:00 local on the 20th is still the 19th in UTC
        let fire = reminder_fire_time(&calendar(), local(2025, 10, 20, 1), 0, 9, local(2025, 10, 1, 0)).unwrap();
        assert_eq!(fire, local(2025, 10, 20, 9));
    }

    #[test]
    fn bad_hour_is_invalid_date() {
        assert!(matches!(
            reminder_fire_time(&calendar(), local(2025, 10, 20, 0), 1, 24, local(2025, 10, 1, 0)),
            Err(Error::InvalidDate(_))
        ));
    }

    #[test]
    fn huge_lead_time_is_invalid_date() {
        let now = local(2025, 10, 1, 12);
        assert!(matches!(
            reminder_fire_time(&calendar(), now, u32::MAX, 9, now),
            Err(Error::InvalidDate(_))
        ));
    }

    #[test]
    fn reminder_rows_crud() {
        let conn = open_in_memory().unwrap();
        let clock = FixedClock(local(2025, 10, 1, 12));
        let scheduled = ScheduledReminder {
            title: "t".to_string(),
            message: "m".to_string(),
            item_type: ReminderItemType::Debt,
            item_id: 4,
            due_date: local(2025, 10, 20, 0),
            fire_at: local(2025, 10, 17, 9),
        };
        let rows = add_reminder(&conn, &scheduled.to_reminder(clock.0), &clock).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_active);
        assert_eq!(rows[0].item_type, ReminderItemType::Debt);

        let rows = deactivate_reminder(&conn, rows[0].id).unwrap();
        assert!(!rows[0].is_active);
        assert!(delete_reminders_for_item(&conn, ReminderItemType::Debt, 4).unwrap().is_empty());
    }

    #[test]
    fn next_installment_reminder_skips_paid() {
        let mut conn = open_in_memory().unwrap();
        let cal = calendar();
        let clock = FixedClock(cal.from_jalali(JalaliDate::new(1404, 7, 1).unwrap()).unwrap());
        let plan = create_installment(
            &mut conn,
            &NewInstallmentPlan {
                title: "tv".to_string(),
                installment_count: 3,
                installment_amount: 2_000_000.0,
                start_date: cal.from_jalali(JalaliDate::new(1404, 7, 1).unwrap()).unwrap(),
                due_day: Some(10),
                description: None,
            },
            &cal,
            &clock,
        )
        .unwrap();
        toggle_installment_payment(&mut conn, plan.id, 1, true, &clock).unwrap();

        let reminder = next_installment_reminder(&conn, plan.id, &cal, 3, 9, &clock).unwrap().unwrap();
        assert_eq!(cal.format_date(reminder.due_date).unwrap(), "1404/08/10");
        assert_eq!(
            reminder.message,
            "قسط tv به مبلغ 2,000,000 تومان در تاریخ 1404/08/10 سررسید دارد."
        );

        for m in 2..=3 {
            toggle_installment_payment(&mut conn, plan.id, m, true, &clock).unwrap();
        }
        assert!(next_installment_reminder(&conn, plan.id, &cal, 3, 9, &clock).unwrap().is_none());
    }
}
