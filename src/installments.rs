use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::clock::Clock;
use crate::errors::{Error, Result};
use crate::jalali::JalaliCalendar;
use crate::models::{InstallmentPatch, InstallmentPlan, NewInstallmentPlan, PaymentOccurrence};
use crate::reconcile::{rebuild_occurrences, reconcile_in, PlanParams, PlanStore};
use crate::schedule::{generate_schedule, validate_schedule_params};
use crate::utils::{count_column, instant_column, instant_text, optional_instant_column};

// The last column recounts paid occurrences so a stale paidCount never leaks out.
const SELECT_PLAN: &str = "SELECT i.id, i.title, i.totalAmount, i.installmentCount, i.paidCount, \
     i.installmentAmount, i.startDate, i.dueDay, i.description, i.isPaid, i.createdAt, i.updatedAt, \
     (SELECT COUNT(1) FROM installment_payments p WHERE p.installmentId = i.id AND p.isPaid = 1) \
     FROM installments i";

const SELECT_OCCURRENCE: &str =
    "SELECT id, installmentId, monthIndex, dueDate, isPaid, paidAt FROM installment_payments";

fn plan_from_row(row: &Row<'_>) -> rusqlite::Result<InstallmentPlan> {
    let installment_count = count_column(row, 3)?;
    let paid_count = count_column(row, 12)?;
    let stored_paid: Option<bool> = row.get(9)?;
    Ok(InstallmentPlan {
        id: row.get(0)?,
        title: row.get(1)?,
        total_amount: row.get(2)?,
        installment_count,
        paid_count,
        installment_amount: row.get(5)?,
        start_date: instant_column(row, 6)?,
        due_day: count_column(row, 7)?,
        description: row.get(8)?,
        is_paid: paid_count >= installment_count || stored_paid.unwrap_or(false),
        created_at: instant_column(row, 10)?,
        updated_at: instant_column(row, 11)?,
    })
}

fn occurrence_from_row(row: &Row<'_>) -> rusqlite::Result<PaymentOccurrence> {
    Ok(PaymentOccurrence {
        id: row.get(0)?,
        installment_id: row.get(1)?,
        month_index: count_column(row, 2)?,
        due_date: instant_column(row, 3)?,
        is_paid: row.get::<_, Option<bool>>(4)?.unwrap_or(false),
        paid_at: optional_instant_column(row, 5)?,
    })
}

fn check_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidScheduleParams(format!(
            "installment amount must be a non-negative number, got {}",
            amount
        )));
    }
    Ok(())
}

impl PlanStore for Connection {
    fn plan_params(&self, plan_id: i64) -> Result<Option<PlanParams>> {
        let params = self
            .query_row(
                "SELECT startDate, installmentCount, dueDay FROM installments WHERE id = ?1 LIMIT 1",
                params![plan_id],
                |row| {
                    Ok(PlanParams {
                        start_date: instant_column(row, 0)?,
                        installment_count: count_column(row, 1)?,
                        due_day: count_column(row, 2)?,
                    })
                },
            )
            .optional()?;
        Ok(params)
    }

    fn occurrences(&self, plan_id: i64) -> Result<Vec<PaymentOccurrence>> {
        get_installment_payments(self, plan_id)
    }

    fn delete_occurrences(&self, plan_id: i64) -> Result<usize> {
        Ok(self.execute(
            "DELETE FROM installment_payments WHERE installmentId = ?1",
            params![plan_id],
        )?)
    }

    fn insert_occurrences(&self, rows: &[PaymentOccurrence]) -> Result<()> {
        let mut stmt = self.prepare(
            "INSERT INTO installment_payments (installmentId, monthIndex, dueDate, isPaid, paidAt) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for occ in rows {
            stmt.execute(params![
                occ.installment_id,
                occ.month_index,
                instant_text(&occ.due_date),
                occ.is_paid,
                occ.paid_at.as_ref().map(instant_text),
            ])?;
        }
        Ok(())
    }

    fn update_plan_summary(
        &self,
        plan_id: i64,
        paid_count: u32,
        is_paid: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        self.execute(
            "UPDATE installments SET paidCount = ?1, isPaid = ?2, updatedAt = ?3 WHERE id = ?4",
            params![paid_count, is_paid, instant_text(&updated_at), plan_id],
        )?;
        Ok(())
    }
}

/// Inserts a plan and its full unpaid schedule in one transaction.
///
/// `due_day` defaults to the Jalali day of `start_date`.
pub fn create_installment(
    conn: &mut Connection,
    plan: &NewInstallmentPlan,
    calendar: &JalaliCalendar,
    clock: &dyn Clock,
) -> Result<InstallmentPlan> {
    let due_day = match plan.due_day {
        Some(day) => day,
        None => calendar.day_of_month(plan.start_date)?,
    };
    validate_schedule_params(plan.installment_count, due_day)?;
    check_amount(plan.installment_amount)?;

    let now = clock.now();
    let total_amount = plan.installment_amount * plan.installment_count as f64;
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO installments (title, totalAmount, installmentCount, paidCount, installmentAmount, startDate, dueDay, description, isPaid, createdAt, updatedAt)
         VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?7, 0, ?8, ?8)",
        params![
            plan.title,
            total_amount,
            plan.installment_count,
            plan.installment_amount,
            instant_text(&plan.start_date),
            due_day,
            plan.description,
            instant_text(&now),
        ],
    )?;
    let id = tx.last_insert_rowid();

    let schedule_params = PlanParams {
        start_date: plan.start_date,
        installment_count: plan.installment_count,
        due_day,
    };
    let rows = rebuild_occurrences(id, &schedule_params, &[], calendar, now)?;
    tx.insert_occurrences(&rows)?;
    tx.commit()?;

    info!(
        "Created installment plan {} ({} payments, due day {})",
        id, plan.installment_count, due_day
    );
    get_installment(conn, id)
}

/// All plans, newest first.
pub fn get_installments(conn: &Connection) -> Result<Vec<InstallmentPlan>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY i.createdAt DESC, i.id DESC", SELECT_PLAN))?;
    let rows = stmt.query_map([], plan_from_row)?;

    let mut plans = Vec::new();
    for plan in rows {
        plans.push(plan?);
    }
    Ok(plans)
}

pub fn get_installment(conn: &Connection, id: i64) -> Result<InstallmentPlan> {
    conn.query_row(&format!("{} WHERE i.id = ?1", SELECT_PLAN), params![id], plan_from_row)
        .optional()?
        .ok_or(Error::PlanNotFound(id))
}

/// Applies `patch` and, when the start date, count or due day changed,
/// reconciles the schedule in the same transaction.
pub fn update_installment(
    conn: &mut Connection,
    id: i64,
    patch: &InstallmentPatch,
    calendar: &JalaliCalendar,
    clock: &dyn Clock,
) -> Result<InstallmentPlan> {
    let current = get_installment(conn, id)?;
    let resync = patch.touches_schedule(&current);

    let installment_count = patch.installment_count.unwrap_or(current.installment_count);
    let due_day = patch.due_day.unwrap_or(current.due_day);
    let installment_amount = patch.installment_amount.unwrap_or(current.installment_amount);
    validate_schedule_params(installment_count, due_day)?;
    check_amount(installment_amount)?;

    let title = patch.title.clone().unwrap_or(current.title);
    let description = patch.description.clone().or(current.description);
    let start_date = patch.start_date.unwrap_or(current.start_date);
    let now = clock.now();

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(
        "UPDATE installments SET title = ?1, totalAmount = ?2, installmentCount = ?3, installmentAmount = ?4, startDate = ?5, dueDay = ?6, description = ?7, updatedAt = ?8 WHERE id = ?9",
        params![
            title,
            installment_amount * installment_count as f64,
            installment_count,
            installment_amount,
            instant_text(&start_date),
            due_day,
            description,
            instant_text(&now),
            id,
        ],
    )?;
    if resync {
        reconcile_in(&*tx, id, calendar, clock)?;
    }
    tx.commit()?;

    get_installment(conn, id)
}

/// Removes the plan together with its occurrences.
pub fn delete_installment(conn: &mut Connection, id: i64) -> Result<()> {
    let tx = conn.transaction()?;
    tx.delete_occurrences(id)?;
    let deleted = tx.execute("DELETE FROM installments WHERE id = ?1", params![id])?;
    tx.commit()?;
    if deleted > 0 {
        info!("Deleted installment plan {}", id);
    }
    Ok(())
}

pub fn get_installment_payments(conn: &Connection, plan_id: i64) -> Result<Vec<PaymentOccurrence>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE installmentId = ?1 ORDER BY monthIndex ASC",
        SELECT_OCCURRENCE
    ))?;
    let rows = stmt.query_map(params![plan_id], occurrence_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Every occurrence of every plan, by due date.
pub fn get_all_installment_payments(conn: &Connection) -> Result<Vec<PaymentOccurrence>> {
    let mut stmt = conn.prepare(&format!(
        "{} ORDER BY dueDate ASC, installmentId ASC, monthIndex ASC",
        SELECT_OCCURRENCE
    ))?;
    let rows = stmt.query_map([], occurrence_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Marks one occurrence paid or unpaid and refreshes the plan's summary.
pub fn toggle_installment_payment(
    conn: &mut Connection,
    plan_id: i64,
    month_index: u32,
    paid: bool,
    clock: &dyn Clock,
) -> Result<PaymentOccurrence> {
    let now = clock.now();
    let paid_at = if paid { Some(instant_text(&now)) } else { None };

    let tx = conn.transaction()?;
    let updated = tx.execute(
        "UPDATE installment_payments SET isPaid = ?1, paidAt = ?2 WHERE installmentId = ?3 AND monthIndex = ?4",
        params![paid, paid_at, plan_id, month_index],
    )?;
    if updated == 0 {
        return Err(Error::OccurrenceNotFound { plan_id, month_index });
    }

    let (paid_count, installment_count): (u32, u32) = tx.query_row(
        "SELECT (SELECT COUNT(1) FROM installment_payments WHERE installmentId = ?1 AND isPaid = 1),
                (SELECT installmentCount FROM installments WHERE id = ?1)",
        params![plan_id],
        |row| Ok((count_column(row, 0)?, count_column(row, 1)?)),
    )?;
    tx.update_plan_summary(plan_id, paid_count, paid_count >= installment_count, now)?;

    let occurrence = tx.query_row(
        &format!("{} WHERE installmentId = ?1 AND monthIndex = ?2", SELECT_OCCURRENCE),
        params![plan_id, month_index],
        occurrence_from_row,
    )?;
    tx.commit()?;
    Ok(occurrence)
}

/// The due dates the plan's current parameters produce. Unlike
/// reconciliation, a missing plan is an error here.
pub fn schedule_for_plan(
    conn: &Connection,
    plan_id: i64,
    calendar: &JalaliCalendar,
) -> Result<Vec<DateTime<Utc>>> {
    let params = conn.plan_params(plan_id)?.ok_or(Error::PlanNotFound(plan_id))?;
    generate_schedule(calendar, params.start_date, params.installment_count, params.due_day)
}
