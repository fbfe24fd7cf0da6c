use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid schedule parameters: {0}")]
    InvalidScheduleParams(String),

    #[error("Installment plan {0} not found")]
    PlanNotFound(i64),

    #[error("Installment plan {plan_id} has no payment for month {month_index}")]
    OccurrenceNotFound { plan_id: i64, month_index: u32 },

    #[error("Account {0} not found")]
    AccountNotFound(i64),

    #[error("Database error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
