use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;

use crate::aggregate::bucket_by_month;
use crate::clock::Clock;
use crate::errors::Result;
use crate::installments::{get_all_installment_payments, get_installments};
use crate::jalali::JalaliCalendar;
use crate::models::FinancialSummary;
use crate::records::{get_credits, get_debts, get_expenses};

/// Dashboard totals. Installments count every payment due in the current
/// Jalali month, paid or not.
pub fn financial_summary(
    conn: &Connection,
    calendar: &JalaliCalendar,
    clock: &dyn Clock,
) -> Result<FinancialSummary> {
    let (total_debts, total_credits, total_pending_checks): (f64, f64, u32) = conn.query_row(
        "SELECT
            (SELECT IFNULL(SUM(amount), 0) FROM debts WHERE IFNULL(isPaid, 0) = 0),
            (SELECT IFNULL(SUM(amount), 0) FROM credits WHERE IFNULL(isReceived, 0) = 0),
            (SELECT COUNT(1) FROM checks WHERE status = 'pending')",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    let amounts = plan_amounts(conn)?;
    let current_month = calendar.month_key(clock.now())?;
    let mut total_upcoming_installments = 0.0;
    for payment in get_all_installment_payments(conn)? {
        if calendar.month_key(payment.due_date)? == current_month {
            total_upcoming_installments += amounts.get(&payment.installment_id).copied().unwrap_or(0.0);
        }
    }

    Ok(FinancialSummary {
        total_debts,
        total_credits,
        total_pending_checks,
        total_upcoming_installments,
        net_balance: total_credits - total_debts,
    })
}

fn plan_amounts(conn: &Connection) -> Result<HashMap<i64, f64>> {
    Ok(get_installments(conn)?
        .into_iter()
        .map(|p| (p.id, p.installment_amount))
        .collect())
}

/// Aligned monthly series for the dashboard charts.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub months: Vec<String>,
    pub labels: Vec<String>,
    pub expenses: Vec<f64>,
    pub installments: Vec<f64>,
    pub debts: Vec<f64>,
    pub credits: Vec<f64>,
}

pub fn chart_series(
    conn: &Connection,
    calendar: &JalaliCalendar,
    months_back: u32,
    clock: &dyn Clock,
) -> Result<ChartSeries> {
    let now = clock.now();

    let expenses = bucket_by_month(
        &get_expenses(conn)?,
        |e| e.due_date,
        |e| e.amount,
        months_back,
        now,
        calendar,
    )?;

    let amounts = plan_amounts(conn)?;
    let installments = bucket_by_month(
        &get_all_installment_payments(conn)?,
        |p| p.due_date,
        |p| amounts.get(&p.installment_id).copied().unwrap_or(0.0),
        months_back,
        now,
        calendar,
    )?;

    let debts = bucket_by_month(&get_debts(conn)?, |d| d.due_date, |d| d.amount, months_back, now, calendar)?;
    let credits = bucket_by_month(&get_credits(conn)?, |c| c.due_date, |c| c.amount, months_back, now, calendar)?;

    Ok(ChartSeries {
        labels: expenses.display_labels(calendar)?,
        months: expenses.labels,
        expenses: expenses.values,
        installments: installments.values,
        debts: debts.values,
        credits: credits.values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::digits::DigitMode;
    use crate::installments::create_installment;
    use crate::jalali::JalaliDate;
    use crate::models::{Check, CheckStatus, CheckType, Credit, Debt, Expense, NewInstallmentPlan};
    use crate::records::{add_check, add_credit, add_debt, add_expense};
    use crate::utils::open_in_memory;
    use chrono::{DateTime, FixedOffset, Utc};

    fn calendar() -> JalaliCalendar {
        JalaliCalendar::new(FixedOffset::east_opt(210 * 60).unwrap(), DigitMode::Latin)
    }

    fn on(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        calendar().from_jalali(JalaliDate::new(y, m, d).unwrap()).unwrap()
    }

    fn seed(conn: &mut Connection, clock: &FixedClock) {
        let cal = calendar();
        create_installment(
            conn,
            &NewInstallmentPlan {
                title: "car".to_string(),
                installment_count: 3,
                installment_amount: 400.0,
                start_date: on(1404, 6, 1),
                due_day: Some(15),
                description: None,
            },
            &cal,
            clock,
        )
        .unwrap();

        let debt = |amount: f64, paid: bool, due| Debt {
            id: 0,
            person_name: "x".to_string(),
            amount,
            phone: None,
            description: None,
            due_date: due,
            is_paid: paid,
            reminder_days: 3,
            created_at: due,
            updated_at: due,
        };
        add_debt(conn, &debt(100.0, false, on(1404, 7, 3)), clock).unwrap();
        add_debt(conn, &debt(900.0, true, on(1404, 7, 4)), clock).unwrap();

        let due = on(1404, 5, 20);
        add_credit(
            conn,
            &Credit {
                id: 0,
                person_name: "y".to_string(),
                amount: 250.0,
                phone: None,
                description: None,
                due_date: due,
                is_received: false,
                reminder_days: 3,
                created_at: due,
                updated_at: due,
            },
            clock,
        )
        .unwrap();

        for status in [CheckStatus::Pending, CheckStatus::Cashed, CheckStatus::Pending] {
            add_check(
                conn,
                &Check {
                    id: 0,
                    check_number: "1".to_string(),
                    amount: 1.0,
                    bank_name: "b".to_string(),
                    due_date: due,
                    check_type: CheckType::Receivable,
                    status,
                    person_name: "z".to_string(),
                    description: None,
                    reminder_days: 3,
                    created_at: due,
                    updated_at: due,
                },
                clock,
            )
            .unwrap();
        }

        add_expense(
            conn,
            &Expense {
                id: 0,
                title: "rent".to_string(),
                amount: 70.0,
                due_date: on(1404, 7, 1),
                description: None,
                reminder_days: 3,
                created_at: due,
                updated_at: due,
            },
            clock,
        )
        .unwrap();
    }

    #[test]
    fn summary_totals() {
        let mut conn = open_in_memory().unwrap();
        let clock = FixedClock(on(1404, 7, 10));
        seed(&mut conn, &clock);

        let summary = financial_summary(&conn, &calendar(), &clock).unwrap();
        assert_eq!(summary.total_debts, 100.0);
        assert_eq!(summary.total_credits, 250.0);
        assert_eq!(summary.total_pending_checks, 2);
        assert_eq!(summary.total_upcoming_installments, 400.0);
        assert_eq!(summary.net_balance, 150.0);
    }

    #[test]
    fn chart_series_stay_aligned() {
        let mut conn = open_in_memory().unwrap();
        let clock = FixedClock(on(1404, 7, 10));
        seed(&mut conn, &clock);

        let charts = chart_series(&conn, &calendar(), 4, &clock).unwrap();
        assert_eq!(charts.months, vec!["1404/04", "1404/05", "1404/06", "1404/07"]);
        assert_eq!(charts.labels.len(), 4);
        assert_eq!(charts.expenses, vec![0.0, 0.0, 0.0, 70.0]);
        assert_eq!(charts.installments, vec![0.0, 0.0, 400.0, 400.0]);
        assert_eq!(charts.debts, vec![0.0, 0.0, 0.0, 1000.0]);
        assert_eq!(charts.credits, vec![0.0, 250.0, 0.0, 0.0]);
    }

    #[test]
    fn empty_database_gives_zeroes() {
        let conn = open_in_memory().unwrap();
        let clock = FixedClock(on(1404, 1, 1));
        assert_eq!(financial_summary(&conn, &calendar(), &clock).unwrap(), FinancialSummary::default());
        let charts = chart_series(&conn, &calendar(), 6, &clock).unwrap();
        assert_eq!(charts.installments, vec![0.0; 6]);
    }
}
