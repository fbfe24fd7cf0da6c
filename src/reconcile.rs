//! Regenerates a plan's payment schedule after its start date, count or
//! due day changed.
//!
//! Paid history is carried over by position: if `P` occurrences were paid
//! before, the first `min(P, count)` occurrences of the new schedule are
//! paid afterwards, reusing the old `paid_at` stamps in order. Calendar
//! months are not matched between the old and the new schedule.

use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{Connection, TransactionBehavior};

use crate::clock::Clock;
use crate::errors::Result;
use crate::jalali::JalaliCalendar;
use crate::models::PaymentOccurrence;
use crate::schedule::generate_schedule;

/// The plan fields a schedule is derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanParams {
    pub start_date: DateTime<Utc>,
    pub installment_count: u32,
    pub due_day: u32,
}

/// Storage operations the reconciler needs. Callers run them inside one
/// transaction; see [`reconcile`].
pub trait PlanStore {
    fn plan_params(&self, plan_id: i64) -> Result<Option<PlanParams>>;
    /// Occurrences ordered by `month_index` ascending.
    fn occurrences(&self, plan_id: i64) -> Result<Vec<PaymentOccurrence>>;
    fn delete_occurrences(&self, plan_id: i64) -> Result<usize>;
    fn insert_occurrences(&self, rows: &[PaymentOccurrence]) -> Result<()>;
    fn update_plan_summary(
        &self,
        plan_id: i64,
        paid_count: u32,
        is_paid: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub plan_id: i64,
    pub installment_count: u32,
    pub paid_count: u32,
}

/// Builds the replacement occurrence set for a plan.
pub fn rebuild_occurrences(
    plan_id: i64,
    params: &PlanParams,
    prior: &[PaymentOccurrence],
    calendar: &JalaliCalendar,
    now: DateTime<Utc>,
) -> Result<Vec<PaymentOccurrence>> {
    let schedule = generate_schedule(
        calendar,
        params.start_date,
        params.installment_count,
        params.due_day,
    )?;

    let mut prior_sorted: Vec<&PaymentOccurrence> = prior.iter().collect();
    prior_sorted.sort_by_key(|o| o.month_index);
    let paid_at: Vec<Option<DateTime<Utc>>> = prior_sorted
        .iter()
        .filter(|o| o.is_paid)
        .map(|o| o.paid_at)
        .collect();
    let keep_paid = paid_at.len().min(schedule.len());

    Ok(schedule
        .into_iter()
        .enumerate()
        .map(|(i, due_date)| {
            let is_paid = i < keep_paid;
            PaymentOccurrence {
                id: 0,
                installment_id: plan_id,
                month_index: i as u32 + 1,
                due_date,
                is_paid,
                paid_at: if is_paid { Some(paid_at[i].unwrap_or(now)) } else { None },
            }
        })
        .collect())
}

/// Runs reconciliation against `store` without managing a transaction.
///
/// A missing plan is a no-op and yields `Ok(None)`.
pub fn reconcile_in<S: PlanStore + ?Sized>(
    store: &S,
    plan_id: i64,
    calendar: &JalaliCalendar,
    clock: &dyn Clock,
) -> Result<Option<ReconcileOutcome>> {
    let params = match store.plan_params(plan_id)? {
        Some(p) => p,
        None => {
            debug!("Reconcile skipped: installment plan {} does not exist", plan_id);
            return Ok(None);
        }
    };

    let now = clock.now();
    let prior = store.occurrences(plan_id)?;
    let rows = rebuild_occurrences(plan_id, &params, &prior, calendar, now)?;
    let paid_count = rows.iter().filter(|o| o.is_paid).count() as u32;

    store.delete_occurrences(plan_id)?;
    store.insert_occurrences(&rows)?;
    store.update_plan_summary(
        plan_id,
        paid_count,
        paid_count >= params.installment_count,
        now,
    )?;

    info!(
        "Reconciled installment plan {}: {} -> {} payments, {} paid",
        plan_id,
        prior.len(),
        rows.len(),
        paid_count
    );
    Ok(Some(ReconcileOutcome {
        plan_id,
        installment_count: params.installment_count,
        paid_count,
    }))
}

/// Reconciles one plan inside an immediate SQLite transaction, so a
/// failure leaves the previous occurrences untouched and two writers
/// cannot reconcile the same plan at once.
pub fn reconcile(
    conn: &mut Connection,
    plan_id: i64,
    calendar: &JalaliCalendar,
    clock: &dyn Clock,
) -> Result<Option<ReconcileOutcome>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let outcome = reconcile_in(&*tx, plan_id, calendar, clock)?;
    tx.commit()?;
    Ok(outcome)
}
