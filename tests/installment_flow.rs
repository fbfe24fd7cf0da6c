mod common;

use daftar_lib::{
    create_installment, get_installment, get_installment_payments, get_installments, reconcile,
    schedule_for_plan, toggle_installment_payment, update_installment, InstallmentPatch,
    NewInstallmentPlan,
};

fn laptop(start: chrono::DateTime<chrono::Utc>, count: u32) -> NewInstallmentPlan {
    NewInstallmentPlan {
        title: "لپ‌تاپ".to_string(),
        installment_count: count,
        installment_amount: 1_500_000.0,
        start_date: start,
        due_day: Some(31),
        description: Some("12 ماهه".to_string()),
    }
}

#[test]
fn edit_then_reconcile_keeps_first_paid_months() {
    let (mut conn, calendar, _dir) = common::setup_test_env();
    let clock = common::clock_at(&calendar, 1404, 6, 1);
    let start = common::jalali(&calendar, 1404, 6, 1);

    let plan = create_installment(&mut conn, &laptop(start, 6), &calendar, &clock).expect("create plan");
    for month in 1..=4 {
        toggle_installment_payment(&mut conn, plan.id, month, true, &clock).expect("pay");
    }

    // move the start two months later and grow to 12 payments
    let patch = InstallmentPatch {
        installment_count: Some(12),
        start_date: Some(common::jalali(&calendar, 1404, 8, 1)),
        ..Default::default()
    };
    let updated = update_installment(&mut conn, plan.id, &patch, &calendar, &clock).expect("update");
    assert_eq!(updated.paid_count, 4);
    assert!(!updated.is_paid);
    assert_eq!(updated.total_amount, 18_000_000.0);

    let payments = get_installment_payments(&conn, plan.id).expect("payments");
    assert_eq!(payments.len(), 12);
    let paid: Vec<u32> = payments.iter().filter(|p| p.is_paid).map(|p| p.month_index).collect();
    assert_eq!(paid, vec![1, 2, 3, 4]);
    assert_eq!(calendar.format_date(payments[0].due_date).unwrap(), "1404/08/30");
    assert!(payments.windows(2).all(|w| w[0].due_date <= w[1].due_date));
}

#[test]
fn reconcile_is_idempotent_and_ignores_missing_plans() {
    let (mut conn, calendar, _dir) = common::setup_test_env();
    let clock = common::clock_at(&calendar, 1404, 1, 1);
    let start = common::jalali(&calendar, 1404, 1, 1);
    let plan = create_installment(&mut conn, &laptop(start, 3), &calendar, &clock).expect("create plan");
    toggle_installment_payment(&mut conn, plan.id, 1, true, &clock).expect("pay");

    let first = reconcile(&mut conn, plan.id, &calendar, &clock).expect("reconcile");
    let rows_after_first = get_installment_payments(&conn, plan.id).expect("payments");
    let second = reconcile(&mut conn, plan.id, &calendar, &clock).expect("reconcile again");
    let rows_after_second = get_installment_payments(&conn, plan.id).expect("payments");

    assert_eq!(first, second);
    let strip = |rows: &[daftar_lib::PaymentOccurrence]| {
        rows.iter()
            .map(|r| (r.month_index, r.due_date, r.is_paid, r.paid_at))
            .collect::<Vec<_>>()
    };
    assert_eq!(strip(&rows_after_first), strip(&rows_after_second));

    assert_eq!(reconcile(&mut conn, 9_999, &calendar, &clock).expect("no-op"), None);
    let total_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM installment_payments", [], |r| r.get(0))
        .expect("count");
    assert_eq!(total_rows, 3);
}

#[test]
fn stored_schedule_matches_generated_schedule() {
    let (mut conn, calendar, _dir) = common::setup_test_env();
    let clock = common::clock_at(&calendar, 1403, 11, 5);
    let start = common::jalali(&calendar, 1403, 11, 5);
    let plan = create_installment(&mut conn, &laptop(start, 5), &calendar, &clock).expect("create plan");

    let generated = schedule_for_plan(&conn, plan.id, &calendar).expect("schedule");
    let stored: Vec<_> = get_installment_payments(&conn, plan.id)
        .expect("payments")
        .into_iter()
        .map(|p| p.due_date)
        .collect();
    assert_eq!(generated, stored);

    let days: Vec<String> = stored.iter().map(|d| calendar.format_date(*d).unwrap()).collect();
    assert_eq!(
        days,
        vec!["1403/11/30", "1403/12/30", "1404/01/31", "1404/02/31", "1404/03/31"]
    );
}

#[test]
fn plans_survive_reopen() {
    let (mut conn, calendar, dir) = common::setup_test_env();
    let clock = common::clock_at(&calendar, 1404, 1, 1);
    let start = common::jalali(&calendar, 1404, 1, 1);
    let plan = create_installment(&mut conn, &laptop(start, 2), &calendar, &clock).expect("create plan");
    drop(conn);

    let conn = daftar_lib::open_database(&dir.path().join("finance.db")).expect("reopen");
    assert_eq!(get_installments(&conn).expect("plans").len(), 1);
    assert_eq!(get_installment(&conn, plan.id).expect("plan").title, "لپ‌تاپ");
}
