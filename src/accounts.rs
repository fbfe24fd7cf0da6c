use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::clock::Clock;
use crate::digits::to_english_digits;
use crate::errors::{Error, Result};
use crate::models::Account;
use crate::sms::parse_balances;
use crate::utils::{instant_column, instant_text};

const SELECT_ACCOUNT: &str =
    "SELECT id, title, bankName, cardLast4, balance, createdAt, updatedAt FROM accounts";

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        title: row.get(1)?,
        bank_name: row.get(2)?,
        card_last4: row.get(3)?,
        balance: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
        created_at: instant_column(row, 5)?,
        updated_at: instant_column(row, 6)?,
    })
}

// Blank strings are stored as NULL so they never collide on UNIQUE(cardLast4).
fn clean_last4(last4: Option<&str>) -> Option<String> {
    last4
        .map(|s| to_english_digits(s.trim()))
        .filter(|s| !s.is_empty())
}

pub fn get_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY title ASC, id ASC", SELECT_ACCOUNT))?;
    let rows = stmt.query_map([], account_from_row)?;

    let mut accounts = Vec::new();
    for account in rows {
        accounts.push(account?);
    }
    Ok(accounts)
}

pub fn get_account(conn: &Connection, id: i64) -> Result<Account> {
    conn.query_row(&format!("{} WHERE id = ?1", SELECT_ACCOUNT), params![id], account_from_row)
        .optional()?
        .ok_or(Error::AccountNotFound(id))
}

pub fn create_account(
    conn: &Connection,
    title: &str,
    bank_name: Option<&str>,
    card_last4: Option<&str>,
    balance: Option<f64>,
    clock: &dyn Clock,
) -> Result<Vec<Account>> {
    let now = instant_text(&clock.now());
    conn.execute(
        "INSERT INTO accounts (title, bankName, cardLast4, balance, createdAt, updatedAt) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![title, bank_name, clean_last4(card_last4), balance.unwrap_or(0.0), now],
    )?;

    get_accounts(conn)
}

pub fn update_account(conn: &Connection, account: &Account, clock: &dyn Clock) -> Result<Vec<Account>> {
    let updated = conn.execute(
        "UPDATE accounts SET title = ?1, bankName = ?2, cardLast4 = ?3, balance = ?4, updatedAt = ?5 WHERE id = ?6",
        params![
            account.title,
            account.bank_name,
            clean_last4(account.card_last4.as_deref()),
            account.balance,
            instant_text(&clock.now()),
            account.id
        ],
    )?;
    if updated == 0 {
        return Err(Error::AccountNotFound(account.id));
    }

    get_accounts(conn)
}

pub fn delete_account(conn: &Connection, id: i64) -> Result<Vec<Account>> {
    conn.execute("DELETE FROM accounts WHERE id = ?1", params![id])?;

    get_accounts(conn)
}

pub fn find_account_by_last4(conn: &Connection, last4: &str) -> Result<Option<Account>> {
    let last4 = to_english_digits(last4.trim());
    Ok(conn
        .query_row(
            &format!("{} WHERE cardLast4 = ?1 LIMIT 1", SELECT_ACCOUNT),
            params![last4],
            account_from_row,
        )
        .optional()?)
}

/// Sets the balance of the account for `last4`, creating a `کارت ****1234`
/// account when none exists yet.
pub fn upsert_balance_by_last4(
    conn: &Connection,
    last4: &str,
    balance: f64,
    now: DateTime<Utc>,
) -> Result<Account> {
    let last4 = to_english_digits(last4.trim());
    let stamp = instant_text(&now);
    match find_account_by_last4(conn, &last4)? {
        Some(existing) => {
            conn.execute(
                "UPDATE accounts SET balance = ?1, updatedAt = ?2 WHERE id = ?3",
                params![balance, stamp, existing.id],
            )?;
            get_account(conn, existing.id)
        }
        None => {
            conn.execute(
                "INSERT INTO accounts (title, bankName, cardLast4, balance, createdAt, updatedAt) VALUES (?1, '', ?2, ?3, ?4, ?4)",
                params![format!("کارت ****{}", last4), last4, balance, stamp],
            )?;
            get_account(conn, conn.last_insert_rowid())
        }
    }
}

/// Parses pasted SMS text and writes every balance found in one
/// transaction. Returns the applied `(last4, balance)` pairs.
pub fn apply_sms_balances(
    conn: &mut Connection,
    text: &str,
    clock: &dyn Clock,
) -> Result<Vec<(String, i64)>> {
    let balances = parse_balances(text);
    if balances.is_empty() {
        return Ok(Vec::new());
    }

    let now = clock.now();
    let tx = conn.transaction()?;
    for (last4, balance) in &balances {
        upsert_balance_by_last4(&tx, last4, *balance as f64, now)?;
    }
    tx.commit()?;

    info!("Applied {} SMS balance(s)", balances.len());
    Ok(balances.into_iter().collect())
}
