pub mod accounts;
pub mod aggregate;
pub mod backup;
pub mod clock;
pub mod config;
pub mod digits;
pub mod errors;
pub mod installments;
pub mod jalali;
pub mod models;
pub mod reconcile;
pub mod records;
pub mod reminders;
pub mod schedule;
pub mod sms;
pub mod summary;
pub mod utils;

use log::info;
use rusqlite::Connection;

// Re-export the core types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::TrackerConfig;
pub use digits::{format_amount, to_english_digits, to_persian_digits, DigitMode};
pub use errors::{Error, Result};
pub use jalali::{JalaliCalendar, JalaliDate};
pub use models::{
    Account, Check, CheckStatus, CheckType, Credit, Debt, Expense, FinancialSummary,
    InstallmentPatch, InstallmentPlan, NewInstallmentPlan, PaymentOccurrence, Reminder,
    ReminderItemType,
};

// Re-export the engine
pub use aggregate::{bucket_by_month, MonthlySeries};
pub use reconcile::{reconcile, PlanStore};
pub use schedule::{generate_schedule, upcoming_due_date};
pub use sms::parse_balances;

// Re-export persistence functions
pub use installments::{
    create_installment, delete_installment, get_all_installment_payments, get_installment,
    get_installment_payments, get_installments, schedule_for_plan, toggle_installment_payment,
    update_installment,
};
pub use accounts::{apply_sms_balances, find_account_by_last4, upsert_balance_by_last4};
pub use backup::{backup_database, export_all, import_all, restore_database};
pub use summary::{chart_series, financial_summary};
pub use utils::{init_db, open_database, open_in_memory, reset_database};

/// Opens the database named by `config` (or the default location) and
/// brings its schema up to date.
pub fn open(config: &TrackerConfig) -> Result<Connection> {
    config.validate()?;
    let path = config.database_path()?;
    let conn = utils::open_database(&path)?;
    info!("Opened database at {}", path.display());
    Ok(conn)
}
