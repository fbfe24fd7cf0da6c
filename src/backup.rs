use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use rusqlite::backup::Progress;
use rusqlite::{params, Connection, DatabaseName, OpenFlags};
use serde::{Deserialize, Serialize};

use crate::accounts::get_accounts;
use crate::clock::Clock;
use crate::errors::{Error, Result};
use crate::installments::{get_all_installment_payments, get_installments};
use crate::models::{
    iso_instant, Account, Check, Credit, Debt, Expense, InstallmentPlan, PaymentOccurrence, Reminder,
};
use crate::records::{get_checks, get_credits, get_debts, get_expenses};
use crate::reminders::get_reminders;
use crate::utils::{init_db, instant_text, TABLES};

pub const BACKUP_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupMeta {
    #[serde(with = "iso_instant")]
    pub exported_at: chrono::DateTime<chrono::Utc>,
    pub version: u32,
}

/// The JSON backup document: one array per table.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BackupDocument {
    pub meta: Option<BackupMeta>,
    pub installments: Vec<InstallmentPlan>,
    pub installment_payments: Vec<PaymentOccurrence>,
    pub debts: Vec<Debt>,
    pub credits: Vec<Credit>,
    pub checks: Vec<Check>,
    pub expenses: Vec<Expense>,
    pub accounts: Vec<Account>,
    pub reminders: Vec<Reminder>,
}

impl BackupDocument {
    pub fn row_count(&self) -> usize {
        self.installments.len()
            + self.installment_payments.len()
            + self.debts.len()
            + self.credits.len()
            + self.checks.len()
            + self.expenses.len()
            + self.accounts.len()
            + self.reminders.len()
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct BackupInfo {
    pub timestamp: String,
    pub file_size: u64,
    pub version: String,
    pub path: PathBuf,
}

pub fn export_document(conn: &Connection, clock: &dyn Clock) -> Result<BackupDocument> {
    Ok(BackupDocument {
        meta: Some(BackupMeta {
            exported_at: clock.now(),
            version: BACKUP_VERSION,
        }),
        installments: get_installments(conn)?,
        installment_payments: get_all_installment_payments(conn)?,
        debts: get_debts(conn)?,
        credits: get_credits(conn)?,
        checks: get_checks(conn)?,
        expenses: get_expenses(conn)?,
        accounts: get_accounts(conn)?,
        reminders: get_reminders(conn)?,
    })
}

/// Pretty-printed JSON of every table.
pub fn export_all(conn: &Connection, clock: &dyn Clock) -> Result<String> {
    Ok(serde_json::to_string_pretty(&export_document(conn, clock)?)?)
}

// id 0 means "not assigned"; let SQLite pick one.
fn keep_id(id: i64) -> Option<i64> {
    if id > 0 {
        Some(id)
    } else {
        None
    }
}

/// Replaces every table with the contents of `json` in one transaction.
/// Blank input is an empty document. Returns the number of rows written.
pub fn import_all(conn: &mut Connection, json: &str) -> Result<usize> {
    let doc: BackupDocument = if json.trim().is_empty() {
        BackupDocument::default()
    } else {
        serde_json::from_str(json)?
    };
    import_document(conn, &doc)
}

pub fn import_document(conn: &mut Connection, doc: &BackupDocument) -> Result<usize> {
    if let Some(meta) = &doc.meta {
        if meta.version > BACKUP_VERSION {
            return Err(Error::Config(format!(
                "backup version {} is newer than supported version {}",
                meta.version, BACKUP_VERSION
            )));
        }
    }
    let tx = conn.transaction()?;
    for table in TABLES {
        tx.execute(&format!("DELETE FROM {}", table), [])?;
    }

    for it in &doc.installments {
        tx.execute(
            "INSERT INTO installments (id, title, totalAmount, installmentCount, paidCount, installmentAmount, startDate, dueDay, description, isPaid, createdAt, updatedAt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                keep_id(it.id),
                it.title,
                it.total_amount,
                it.installment_count,
                it.paid_count,
                it.installment_amount,
                instant_text(&it.start_date),
                it.due_day,
                it.description,
                it.is_paid,
                instant_text(&it.created_at),
                instant_text(&it.updated_at),
            ],
        )?;
    }
    for p in &doc.installment_payments {
        tx.execute(
            "INSERT INTO installment_payments (id, installmentId, monthIndex, dueDate, isPaid, paidAt) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                keep_id(p.id),
                p.installment_id,
                p.month_index,
                instant_text(&p.due_date),
                p.is_paid,
                p.paid_at.as_ref().map(instant_text),
            ],
        )?;
    }
    for d in &doc.debts {
        tx.execute(
            "INSERT INTO debts (id, phone, personName, amount, description, dueDate, isPaid, reminderDays, createdAt, updatedAt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                keep_id(d.id),
                d.phone,
                d.person_name,
                d.amount,
                d.description,
                instant_text(&d.due_date),
                d.is_paid,
                d.reminder_days,
                instant_text(&d.created_at),
                instant_text(&d.updated_at),
            ],
        )?;
    }
    for c in &doc.credits {
        tx.execute(
            "INSERT INTO credits (id, phone, personName, amount, description, dueDate, isReceived, reminderDays, createdAt, updatedAt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                keep_id(c.id),
                c.phone,
                c.person_name,
                c.amount,
                c.description,
                instant_text(&c.due_date),
                c.is_received,
                c.reminder_days,
                instant_text(&c.created_at),
                instant_text(&c.updated_at),
            ],
        )?;
    }
    for ch in &doc.checks {
        tx.execute(
            "INSERT INTO checks (id, checkNumber, amount, bankName, dueDate, type, status, personName, description, reminderDays, createdAt, updatedAt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                keep_id(ch.id),
                ch.check_number,
                ch.amount,
                ch.bank_name,
                instant_text(&ch.due_date),
                ch.check_type.as_str(),
                ch.status.as_str(),
                ch.person_name,
                ch.description,
                ch.reminder_days,
                instant_text(&ch.created_at),
                instant_text(&ch.updated_at),
            ],
        )?;
    }
    for e in &doc.expenses {
        tx.execute(
            "INSERT INTO expenses (id, title, amount, dueDate, description, reminderDays, createdAt, updatedAt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                keep_id(e.id),
                e.title,
                e.amount,
                instant_text(&e.due_date),
                e.description,
                e.reminder_days,
                instant_text(&e.created_at),
                instant_text(&e.updated_at),
            ],
        )?;
    }
    for a in &doc.accounts {
        tx.execute(
            "INSERT INTO accounts (id, title, bankName, cardLast4, balance, createdAt, updatedAt) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                keep_id(a.id),
                a.title,
                a.bank_name,
                a.card_last4.as_deref().filter(|s| !s.trim().is_empty()),
                a.balance,
                instant_text(&a.created_at),
                instant_text(&a.updated_at),
            ],
        )?;
    }
    for r in &doc.reminders {
        tx.execute(
            "INSERT INTO reminders (id, title, message, dueDate, isActive, itemType, itemId, createdAt) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                keep_id(r.id),
                r.title,
                r.message,
                instant_text(&r.due_date),
                r.is_active,
                r.item_type.as_str(),
                r.item_id,
                instant_text(&r.created_at),
            ],
        )?;
    }

    tx.commit()?;
    let rows = doc.row_count();
    info!("Imported backup: {} rows across {} tables", rows, TABLES.len());
    Ok(rows)
}

fn verify_tables(conn: &Connection) -> Result<()> {
    for table in TABLES {
        if conn.prepare(&format!("SELECT 1 FROM {} LIMIT 1", table)).is_err() {
            return Err(Error::Config(format!("Database is missing {} table", table)));
        }
    }
    Ok(())
}

/// Copies the live database into `dir` as `finance_<timestamp>.db` using
/// SQLite's online backup, so a WAL-mode database is captured consistently.
pub fn backup_database(conn: &Connection, dir: &Path, clock: &dyn Clock) -> Result<BackupInfo> {
    verify_tables(conn)?;
    fs::create_dir_all(dir)?;

    let timestamp = clock.now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = dir.join(format!("finance_{}.db", timestamp));
    conn.backup(DatabaseName::Main, &backup_path, None)?;

    let file_size = fs::metadata(&backup_path)?.len();
    info!("Backed up database to {} ({} bytes)", backup_path.display(), file_size);
    Ok(BackupInfo {
        timestamp,
        file_size,
        version: BACKUP_VERSION.to_string(),
        path: backup_path,
    })
}

/// Replaces the live database with the snapshot at `src`. The snapshot is
/// checked before anything is overwritten.
pub fn restore_database(conn: &mut Connection, src: &Path) -> Result<()> {
    {
        let snapshot = Connection::open_with_flags(src, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        verify_tables(&snapshot)?;
    }
    conn.restore(DatabaseName::Main, src, None::<fn(Progress)>)?;
    init_db(conn)?;
    info!("Restored database from {}", src.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::utils::open_in_memory;
    use chrono::{TimeZone, Utc};

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn empty_export_has_meta_and_all_arrays() {
        let conn = open_in_memory().unwrap();
        let json: serde_json::Value = serde_json::from_str(&export_all(&conn, &clock()).unwrap()).unwrap();
        assert_eq!(json["meta"]["version"], 1);
        assert_eq!(json["meta"]["exportedAt"], "2025-10-01T12:00:00.000Z");
        for table in TABLES {
            assert!(json[table].as_array().unwrap().is_empty(), "{}", table);
        }
    }

    #[test]
    fn import_accepts_integer_booleans_and_keeps_ids() {
        let mut conn = open_in_memory().unwrap();
        let json = r#"{
            "meta": {"exportedAt": "2025-10-01T12:00:00.000Z", "version": 1},
            "debts": [{"id": 41, "personName": "ali", "amount": 10, "dueDate": "2025-11-01T00:00:00.000Z",
                       "isPaid": 1, "reminderDays": 2, "createdAt": "2025-10-01T00:00:00.000Z",
                       "updatedAt": "2025-10-01T00:00:00.000Z"}]
        }"#;
        assert_eq!(import_all(&mut conn, json).unwrap(), 1);
        let debts = get_debts(&conn).unwrap();
        assert_eq!(debts[0].id, 41);
        assert!(debts[0].is_paid);
    }

    #[test]
    fn failed_import_leaves_data_untouched() {
        let mut conn = open_in_memory().unwrap();
        let good = r#"{"expenses": [{"title": "rent", "amount": 1, "dueDate": "2025-10-01",
                       "createdAt": "2025-10-01", "updatedAt": "2025-10-01"}]}"#;
        import_all(&mut conn, good).unwrap();

        // duplicate primary keys abort the transaction
        let dup = r#"{"expenses": [
            {"id": 1, "title": "a", "amount": 1, "dueDate": "2025-10-01", "createdAt": "2025-10-01", "updatedAt": "2025-10-01"},
            {"id": 1, "title": "b", "amount": 1, "dueDate": "2025-10-01", "createdAt": "2025-10-01", "updatedAt": "2025-10-01"}]}"#;
        assert!(matches!(import_all(&mut conn, dup), Err(Error::Persistence(_))));
        assert!(matches!(import_all(&mut conn, "{broken"), Err(Error::Serialization(_))));

        let expenses = get_expenses(&conn).unwrap();
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].title, "rent");
    }

    #[test]
    fn newer_backup_version_is_rejected() {
        let mut conn = open_in_memory().unwrap();
        let good = r#"{"expenses": [{"title": "rent", "amount": 1, "dueDate": "2025-10-01",
                       "createdAt": "2025-10-01", "updatedAt": "2025-10-01"}]}"#;
        import_all(&mut conn, good).unwrap();

        let newer = r#"{"meta": {"exportedAt": "2025-10-01T12:00:00.000Z", "version": 2}, "expenses": []}"#;
        assert!(matches!(import_all(&mut conn, newer), Err(Error::Config(_))));
        assert_eq!(get_expenses(&conn).unwrap().len(), 1);
    }

    #[test]
    fn snapshot_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = open_in_memory().unwrap();
        let good = r#"{"expenses": [{"title": "rent", "amount": 1, "dueDate": "2025-10-01",
                       "createdAt": "2025-10-01", "updatedAt": "2025-10-01"}]}"#;
        import_all(&mut conn, good).unwrap();

        let info = backup_database(&conn, dir.path(), &clock()).unwrap();
        assert_eq!(info.timestamp, "20251001_120000");
        assert!(info.file_size > 0);

        import_all(&mut conn, "").unwrap();
        assert!(get_expenses(&conn).unwrap().is_empty());

        restore_database(&mut conn, &info.path).unwrap();
        assert_eq!(get_expenses(&conn).unwrap().len(), 1);
    }

    #[test]
    fn restore_rejects_foreign_database() {
        let dir = tempfile::tempdir().unwrap();
        let other = dir.path().join("other.db");
        Connection::open(&other)
            .unwrap()
            .execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY);")
            .unwrap();
        let mut conn = open_in_memory().unwrap();
        assert!(matches!(restore_database(&mut conn, &other), Err(Error::Config(_))));
    }
}
