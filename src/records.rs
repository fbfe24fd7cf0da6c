//! Debts, credits, checks and expenses. Each mutation returns the
//! refreshed list ordered by due date.

use rusqlite::{params, Connection, Row};

use crate::clock::Clock;
use crate::errors::{Error, Result};
use crate::models::{Check, CheckStatus, Credit, Debt, Expense};
use crate::utils::{count_column, enum_column, instant_column, instant_text};

const SELECT_DEBT: &str = "SELECT id, personName, amount, phone, description, dueDate, isPaid, reminderDays, createdAt, updatedAt FROM debts";
const SELECT_CREDIT: &str = "SELECT id, personName, amount, phone, description, dueDate, isReceived, reminderDays, createdAt, updatedAt FROM credits";
const SELECT_CHECK: &str = "SELECT id, checkNumber, amount, bankName, dueDate, type, status, personName, description, reminderDays, createdAt, updatedAt FROM checks";
const SELECT_EXPENSE: &str =
    "SELECT id, title, amount, dueDate, description, reminderDays, createdAt, updatedAt FROM expenses";

fn flag(row: &Row<'_>, idx: usize) -> rusqlite::Result<bool> {
    Ok(row.get::<_, Option<bool>>(idx)?.unwrap_or(false))
}

fn debt_from_row(row: &Row<'_>) -> rusqlite::Result<Debt> {
    Ok(Debt {
        id: row.get(0)?,
        person_name: row.get(1)?,
        amount: row.get(2)?,
        phone: row.get(3)?,
        description: row.get(4)?,
        due_date: instant_column(row, 5)?,
        is_paid: flag(row, 6)?,
        reminder_days: count_column(row, 7)?,
        created_at: instant_column(row, 8)?,
        updated_at: instant_column(row, 9)?,
    })
}

fn credit_from_row(row: &Row<'_>) -> rusqlite::Result<Credit> {
    Ok(Credit {
        id: row.get(0)?,
        person_name: row.get(1)?,
        amount: row.get(2)?,
        phone: row.get(3)?,
        description: row.get(4)?,
        due_date: instant_column(row, 5)?,
        is_received: flag(row, 6)?,
        reminder_days: count_column(row, 7)?,
        created_at: instant_column(row, 8)?,
        updated_at: instant_column(row, 9)?,
    })
}

fn check_from_row(row: &Row<'_>) -> rusqlite::Result<Check> {
    Ok(Check {
        id: row.get(0)?,
        check_number: row.get(1)?,
        amount: row.get(2)?,
        bank_name: row.get(3)?,
        due_date: instant_column(row, 4)?,
        check_type: enum_column(row, 5)?,
        status: enum_column(row, 6)?,
        person_name: row.get(7)?,
        description: row.get(8)?,
        reminder_days: count_column(row, 9)?,
        created_at: instant_column(row, 10)?,
        updated_at: instant_column(row, 11)?,
    })
}

fn expense_from_row(row: &Row<'_>) -> rusqlite::Result<Expense> {
    Ok(Expense {
        id: row.get(0)?,
        title: row.get(1)?,
        amount: row.get(2)?,
        due_date: instant_column(row, 3)?,
        description: row.get(4)?,
        reminder_days: count_column(row, 5)?,
        created_at: instant_column(row, 6)?,
        updated_at: instant_column(row, 7)?,
    })
}

fn query_all<T>(
    conn: &Connection,
    sql: &str,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], map)?;

    let mut items = Vec::new();
    for item in rows {
        items.push(item?);
    }
    Ok(items)
}

// ---- debts ----

pub fn get_debts(conn: &Connection) -> Result<Vec<Debt>> {
    query_all(conn, &format!("{} ORDER BY dueDate ASC, id ASC", SELECT_DEBT), debt_from_row)
}

pub fn add_debt(conn: &Connection, debt: &Debt, clock: &dyn Clock) -> Result<Vec<Debt>> {
    let now = instant_text(&clock.now());
    conn.execute(
        "INSERT INTO debts (phone, personName, amount, description, dueDate, isPaid, reminderDays, createdAt, updatedAt)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            debt.phone,
            debt.person_name,
            debt.amount,
            debt.description,
            instant_text(&debt.due_date),
            debt.is_paid,
            debt.reminder_days,
            now
        ],
    )?;

    get_debts(conn)
}

pub fn update_debt(conn: &Connection, debt: &Debt, clock: &dyn Clock) -> Result<Vec<Debt>> {
    conn.execute(
        "UPDATE debts SET phone = ?1, personName = ?2, amount = ?3, description = ?4, dueDate = ?5, isPaid = ?6, reminderDays = ?7, updatedAt = ?8 WHERE id = ?9",
        params![
            debt.phone,
            debt.person_name,
            debt.amount,
            debt.description,
            instant_text(&debt.due_date),
            debt.is_paid,
            debt.reminder_days,
            instant_text(&clock.now()),
            debt.id
        ],
    )?;

    get_debts(conn)
}

pub fn set_debt_paid(conn: &Connection, id: i64, paid: bool, clock: &dyn Clock) -> Result<Vec<Debt>> {
    conn.execute(
        "UPDATE debts SET isPaid = ?1, updatedAt = ?2 WHERE id = ?3",
        params![paid, instant_text(&clock.now()), id],
    )?;

    get_debts(conn)
}

pub fn delete_debt(conn: &Connection, id: i64) -> Result<Vec<Debt>> {
    conn.execute("DELETE FROM debts WHERE id = ?1", params![id])?;

    get_debts(conn)
}

// ---- credits ----

pub fn get_credits(conn: &Connection) -> Result<Vec<Credit>> {
    query_all(conn, &format!("{} ORDER BY dueDate ASC, id ASC", SELECT_CREDIT), credit_from_row)
}

pub fn add_credit(conn: &Connection, credit: &Credit, clock: &dyn Clock) -> Result<Vec<Credit>> {
    let now = instant_text(&clock.now());
    conn.execute(
        "INSERT INTO credits (phone, personName, amount, description, dueDate, isReceived, reminderDays, createdAt, updatedAt)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            credit.phone,
            credit.person_name,
            credit.amount,
            credit.description,
            instant_text(&credit.due_date),
            credit.is_received,
            credit.reminder_days,
            now
        ],
    )?;

    get_credits(conn)
}

pub fn update_credit(conn: &Connection, credit: &Credit, clock: &dyn Clock) -> Result<Vec<Credit>> {
    conn.execute(
        "UPDATE credits SET phone = ?1, personName = ?2, amount = ?3, description = ?4, dueDate = ?5, isReceived = ?6, reminderDays = ?7, updatedAt = ?8 WHERE id = ?9",
        params![
            credit.phone,
            credit.person_name,
            credit.amount,
            credit.description,
            instant_text(&credit.due_date),
            credit.is_received,
            credit.reminder_days,
            instant_text(&clock.now()),
            credit.id
        ],
    )?;

    get_credits(conn)
}

pub fn set_credit_received(
    conn: &Connection,
    id: i64,
    received: bool,
    clock: &dyn Clock,
) -> Result<Vec<Credit>> {
    conn.execute(
        "UPDATE credits SET isReceived = ?1, updatedAt = ?2 WHERE id = ?3",
        params![received, instant_text(&clock.now()), id],
    )?;

    get_credits(conn)
}

pub fn delete_credit(conn: &Connection, id: i64) -> Result<Vec<Credit>> {
    conn.execute("DELETE FROM credits WHERE id = ?1", params![id])?;

    get_credits(conn)
}

// ---- checks ----

pub fn get_checks(conn: &Connection) -> Result<Vec<Check>> {
    query_all(conn, &format!("{} ORDER BY dueDate ASC, id ASC", SELECT_CHECK), check_from_row)
}

pub fn add_check(conn: &Connection, check: &Check, clock: &dyn Clock) -> Result<Vec<Check>> {
    let now = instant_text(&clock.now());
    conn.execute(
        "INSERT INTO checks (checkNumber, amount, bankName, dueDate, type, status, personName, description, reminderDays, createdAt, updatedAt)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            check.check_number,
            check.amount,
            check.bank_name,
            instant_text(&check.due_date),
            check.check_type.as_str(),
            check.status.as_str(),
            check.person_name,
            check.description,
            check.reminder_days,
            now
        ],
    )?;

    get_checks(conn)
}

pub fn update_check(conn: &Connection, check: &Check, clock: &dyn Clock) -> Result<Vec<Check>> {
    conn.execute(
        "UPDATE checks SET checkNumber = ?1, amount = ?2, bankName = ?3, dueDate = ?4, type = ?5, status = ?6, personName = ?7, description = ?8, reminderDays = ?9, updatedAt = ?10 WHERE id = ?11",
        params![
            check.check_number,
            check.amount,
            check.bank_name,
            instant_text(&check.due_date),
            check.check_type.as_str(),
            check.status.as_str(),
            check.person_name,
            check.description,
            check.reminder_days,
            instant_text(&clock.now()),
            check.id
        ],
    )?;

    get_checks(conn)
}

/// Moves a check to `pending`, `cashed` or `bounced`.
pub fn set_check_status(
    conn: &Connection,
    id: i64,
    status: CheckStatus,
    clock: &dyn Clock,
) -> Result<Vec<Check>> {
    let updated = conn.execute(
        "UPDATE checks SET status = ?1, updatedAt = ?2 WHERE id = ?3",
        params![status.as_str(), instant_text(&clock.now()), id],
    )?;
    if updated == 0 {
        return Err(Error::Persistence(rusqlite::Error::QueryReturnedNoRows));
    }

    get_checks(conn)
}

pub fn delete_check(conn: &Connection, id: i64) -> Result<Vec<Check>> {
    conn.execute("DELETE FROM checks WHERE id = ?1", params![id])?;

    get_checks(conn)
}

// ---- expenses ----

pub fn get_expenses(conn: &Connection) -> Result<Vec<Expense>> {
    query_all(conn, &format!("{} ORDER BY dueDate ASC, id ASC", SELECT_EXPENSE), expense_from_row)
}

pub fn add_expense(conn: &Connection, expense: &Expense, clock: &dyn Clock) -> Result<Vec<Expense>> {
    let now = instant_text(&clock.now());
    conn.execute(
        "INSERT INTO expenses (title, amount, dueDate, description, reminderDays, createdAt, updatedAt)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            expense.title,
            expense.amount,
            instant_text(&expense.due_date),
            expense.description,
            expense.reminder_days,
            now
        ],
    )?;

    get_expenses(conn)
}

pub fn update_expense(conn: &Connection, expense: &Expense, clock: &dyn Clock) -> Result<Vec<Expense>> {
    conn.execute(
        "UPDATE expenses SET title = ?1, amount = ?2, dueDate = ?3, description = ?4, reminderDays = ?5, updatedAt = ?6 WHERE id = ?7",
        params![
            expense.title,
            expense.amount,
            instant_text(&expense.due_date),
            expense.description,
            expense.reminder_days,
            instant_text(&clock.now()),
            expense.id
        ],
    )?;

    get_expenses(conn)
}

pub fn delete_expense(conn: &Connection, id: i64) -> Result<Vec<Expense>> {
    conn.execute("DELETE FROM expenses WHERE id = ?1", params![id])?;

    get_expenses(conn)
}
