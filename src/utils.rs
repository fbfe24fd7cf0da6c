use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::{info, warn};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};

use crate::errors::{Error, Result};
use crate::jalali::parse_instant;
use crate::models::iso_instant;

pub const APP_DIR_NAME: &str = "Daftar";
pub const DB_FILE_NAME: &str = "finance.db";

/// Tables in restore order (children after parents).
pub const TABLES: [&str; 8] = [
    "installments",
    "installment_payments",
    "debts",
    "credits",
    "checks",
    "expenses",
    "accounts",
    "reminders",
];

/// `<data dir>/Daftar`, created if missing.
pub fn default_data_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir()
        .ok_or_else(|| Error::Config("could not determine the user data directory".to_string()))?;
    let app_dir = base_dir.join(APP_DIR_NAME);
    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}

pub fn default_db_path() -> Result<PathBuf> {
    Ok(default_data_dir()?.join(DB_FILE_NAME))
}

/// Opens (or creates) the database file and brings its schema up to date.
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    apply_pragmas(&conn);
    init_db(&conn)?;
    Ok(conn)
}

/// Fresh in-memory database with the full schema.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    apply_pragmas(&conn);
    init_db(&conn)?;
    Ok(conn)
}

/// Tries one PRAGMA; `Ok(false)` when SQLite accepted it but did not
/// take the requested value.
pub fn probe_pragma(conn: &Connection, name: &str, value: &str) -> Result<bool> {
    conn.pragma_update(None, name, value)?;
    let current: String = conn.pragma_query_value(None, name, |row| {
        let v: rusqlite::types::Value = row.get(0)?;
        Ok(match v {
            rusqlite::types::Value::Integer(i) => i.to_string(),
            rusqlite::types::Value::Text(t) => t,
            _ => String::new(),
        })
    })?;
    Ok(current.eq_ignore_ascii_case(value))
}

fn apply_pragmas(conn: &Connection) {
    let wanted = [
        ("foreign_keys", "1"),
        ("journal_mode", "wal"),
        ("synchronous", "1"),
        ("busy_timeout", "3000"),
    ];
    for (name, value) in wanted {
        match probe_pragma(conn, name, value) {
            Ok(true) => {}
            // in-memory databases report journal_mode=memory
            Ok(false) => warn!("PRAGMA {} = {} not applied by this SQLite build", name, value),
            Err(e) => warn!("PRAGMA {} = {} failed: {}", name, value, e),
        }
    }
}

pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut info_stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let existing = info_stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(existing.iter().any(|c| c == column))
}

/// Adds `column` when an older database lacks it. Returns whether it was added.
pub fn ensure_column(conn: &Connection, table: &str, column: &str, decl: &str) -> Result<bool> {
    if column_exists(conn, table, column)? {
        return Ok(false);
    }
    conn.execute(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, decl), [])?;
    info!("Migrated {}: added column {}", table, column);
    Ok(true)
}

/// Creates every table and index if missing, then runs column migrations.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS installments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            totalAmount REAL NOT NULL,
            installmentCount INTEGER NOT NULL,
            paidCount INTEGER DEFAULT 0,
            installmentAmount REAL NOT NULL,
            startDate TEXT NOT NULL,
            dueDay INTEGER NOT NULL,
            description TEXT,
            isPaid INTEGER DEFAULT 0,
            createdAt TEXT NOT NULL,
            updatedAt TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS installment_payments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            installmentId INTEGER NOT NULL,
            monthIndex INTEGER NOT NULL,
            dueDate TEXT NOT NULL,
            isPaid INTEGER DEFAULT 0,
            paidAt TEXT,
            UNIQUE(installmentId, monthIndex)
        );
        CREATE INDEX IF NOT EXISTS idx_installment_payments_dueDate ON installment_payments(dueDate);

        CREATE TABLE IF NOT EXISTS debts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            phone TEXT,
            personName TEXT NOT NULL,
            amount REAL NOT NULL,
            description TEXT,
            dueDate TEXT NOT NULL,
            isPaid INTEGER DEFAULT 0,
            reminderDays INTEGER DEFAULT 3,
            createdAt TEXT NOT NULL,
            updatedAt TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_debts_dueDate ON debts(dueDate);
        CREATE INDEX IF NOT EXISTS idx_debts_isPaid ON debts(isPaid);

        CREATE TABLE IF NOT EXISTS credits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            phone TEXT,
            personName TEXT NOT NULL,
            amount REAL NOT NULL,
            description TEXT,
            dueDate TEXT NOT NULL,
            isReceived INTEGER DEFAULT 0,
            reminderDays INTEGER DEFAULT 3,
            createdAt TEXT NOT NULL,
            updatedAt TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_credits_dueDate ON credits(dueDate);
        CREATE INDEX IF NOT EXISTS idx_credits_isReceived ON credits(isReceived);

        CREATE TABLE IF NOT EXISTS checks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            checkNumber TEXT NOT NULL,
            amount REAL NOT NULL,
            bankName TEXT NOT NULL,
            dueDate TEXT NOT NULL,
            type TEXT NOT NULL CHECK (type IN ('receivable', 'payable')),
            status TEXT DEFAULT 'pending' CHECK (status IN ('pending', 'cashed', 'bounced')),
            personName TEXT NOT NULL,
            description TEXT,
            reminderDays INTEGER DEFAULT 3,
            createdAt TEXT NOT NULL,
            updatedAt TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_checks_dueDate ON checks(dueDate);
        CREATE INDEX IF NOT EXISTS idx_checks_status ON checks(status);
        CREATE INDEX IF NOT EXISTS idx_checks_type ON checks(type);

        CREATE TABLE IF NOT EXISTS reminders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            dueDate TEXT NOT NULL,
            isActive INTEGER DEFAULT 1,
            itemType TEXT NOT NULL,
            itemId INTEGER NOT NULL,
            createdAt TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            amount REAL NOT NULL,
            dueDate TEXT NOT NULL,
            description TEXT,
            reminderDays INTEGER DEFAULT 3,
            createdAt TEXT NOT NULL,
            updatedAt TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_expenses_dueDate ON expenses(dueDate);

        CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            bankName TEXT,
            cardLast4 TEXT,
            balance REAL DEFAULT 0,
            createdAt TEXT NOT NULL,
            updatedAt TEXT NOT NULL,
            UNIQUE(cardLast4)
        );
        CREATE INDEX IF NOT EXISTS idx_accounts_last4 ON accounts(cardLast4);",
    )?;

    // Databases created before phone numbers were tracked
    ensure_column(conn, "debts", "phone", "TEXT")?;
    ensure_column(conn, "credits", "phone", "TEXT")?;

    Ok(())
}

/// Deletes the database file (if any) and recreates an empty schema.
pub fn reset_database(path: &Path) -> Result<Connection> {
    match fs::remove_file(path) {
        Ok(()) => info!("Removed database {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    open_database(path)
}

pub fn instant_text(instant: &DateTime<Utc>) -> String {
    iso_instant::to_text(instant)
}

fn conversion_failure(idx: usize, err: Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Reads an ISO-8601 text column.
pub fn instant_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    parse_instant(&text).map_err(|e| conversion_failure(idx, e))
}

pub fn optional_instant_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(text) if !text.trim().is_empty() => {
            parse_instant(&text).map(Some).map_err(|e| conversion_failure(idx, e))
        }
        _ => Ok(None),
    }
}

/// Reads a text column into one of the model's text enums.
pub fn enum_column<T: FromStr<Err = Error>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| conversion_failure(idx, e))
}

/// SQLite INTEGER counters are stored signed; negative values read as 0.
pub fn count_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<u32> {
    let value: Option<i64> = row.get(idx)?;
    Ok(value.unwrap_or(0).clamp(0, u32::MAX as i64) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_db_is_idempotent() {
        let conn = open_in_memory().unwrap();
        init_db(&conn).unwrap();
        for table in TABLES {
            conn.prepare(&format!("SELECT 1 FROM {} LIMIT 1", table)).unwrap();
        }
    }

    #[test]
    fn adds_missing_phone_column_to_old_schema() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE debts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                personName TEXT NOT NULL,
                amount REAL NOT NULL,
                description TEXT,
                dueDate TEXT NOT NULL,
                isPaid INTEGER DEFAULT 0,
                reminderDays INTEGER DEFAULT 3,
                createdAt TEXT NOT NULL,
                updatedAt TEXT NOT NULL
            );",
        )
        .unwrap();
        assert!(!column_exists(&conn, "debts", "phone").unwrap());
        init_db(&conn).unwrap();
        assert!(column_exists(&conn, "debts", "phone").unwrap());
        assert!(!ensure_column(&conn, "debts", "phone", "TEXT").unwrap());
    }

    #[test]
    fn foreign_keys_probe_succeeds() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(probe_pragma(&conn, "foreign_keys", "1").unwrap());
    }

    #[test]
    fn reset_recreates_empty_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(DB_FILE_NAME);
        let conn = open_database(&path).unwrap();
        conn.execute(
            "INSERT INTO expenses (title, amount, dueDate, createdAt, updatedAt) VALUES ('x', 1, '2025-01-01', '2025-01-01', '2025-01-01')",
            [],
        )
        .unwrap();
        drop(conn);
        let conn = reset_database(&path).unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM expenses", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }
}
