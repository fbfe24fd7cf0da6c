use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Instants travel as ISO-8601 text (`2024-03-20T06:30:00.000Z`); a bare
/// `YYYY-MM-DD` is accepted on the way in.
pub mod iso_instant {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::jalali::parse_instant;

    pub fn to_text(instant: &DateTime<Utc>) -> String {
        instant.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(instant: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_text(instant))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_instant(&text).map_err(de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{de, Deserialize, Deserializer, Serializer};

        use crate::jalali::parse_instant;

        pub fn serialize<S: Serializer>(
            instant: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match instant {
                Some(i) => serializer.serialize_some(&super::to_text(i)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(text) if !text.trim().is_empty() => {
                    parse_instant(&text).map(Some).map_err(de::Error::custom)
                }
                _ => Ok(None),
            }
        }
    }
}

/// Accepts `true`/`false` as well as the `0`/`1` integers raw SQLite rows carry.
pub mod flexible_bool {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Null(()),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => b,
            Raw::Int(i) => i != 0,
            Raw::Null(()) => false,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentPlan {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    pub total_amount: f64,
    pub installment_count: u32,
    #[serde(default)]
    pub paid_count: u32,
    pub installment_amount: f64,
    #[serde(with = "iso_instant")]
    pub start_date: DateTime<Utc>,
    pub due_day: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "flexible_bool::deserialize")]
    pub is_paid: bool,
    #[serde(with = "iso_instant")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_instant")]
    pub updated_at: DateTime<Utc>,
}

/// Input for a new plan. `due_day` defaults to the Jalali day of `start_date`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewInstallmentPlan {
    pub title: String,
    pub installment_count: u32,
    pub installment_amount: f64,
    #[serde(with = "iso_instant")]
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub due_day: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update of a plan; `None` leaves the field untouched.
#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentPatch {
    pub title: Option<String>,
    pub installment_count: Option<u32>,
    pub installment_amount: Option<f64>,
    #[serde(default, with = "iso_instant::option")]
    pub start_date: Option<DateTime<Utc>>,
    pub due_day: Option<u32>,
    pub description: Option<String>,
}

impl InstallmentPatch {
    /// Whether applying the patch changes the shape of the schedule.
    pub fn touches_schedule(&self, plan: &InstallmentPlan) -> bool {
        self.installment_count.map_or(false, |c| c != plan.installment_count)
            || self.due_day.map_or(false, |d| d != plan.due_day)
            || self.start_date.map_or(false, |s| s != plan.start_date)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOccurrence {
    #[serde(default)]
    pub id: i64,
    pub installment_id: i64,
    /// 1-based position in the plan.
    pub month_index: u32,
    #[serde(with = "iso_instant")]
    pub due_date: DateTime<Utc>,
    #[serde(default, deserialize_with = "flexible_bool::deserialize")]
    pub is_paid: bool,
    #[serde(default, with = "iso_instant::option")]
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub card_last4: Option<String>,
    #[serde(default)]
    pub balance: f64,
    #[serde(with = "iso_instant")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_instant")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    #[serde(default)]
    pub id: i64,
    pub person_name: String,
    pub amount: f64,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(with = "iso_instant")]
    pub due_date: DateTime<Utc>,
    #[serde(default, deserialize_with = "flexible_bool::deserialize")]
    pub is_paid: bool,
    #[serde(default = "default_reminder_days")]
    pub reminder_days: u32,
    #[serde(with = "iso_instant")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_instant")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Credit {
    #[serde(default)]
    pub id: i64,
    pub person_name: String,
    pub amount: f64,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(with = "iso_instant")]
    pub due_date: DateTime<Utc>,
    #[serde(default, deserialize_with = "flexible_bool::deserialize")]
    pub is_received: bool,
    #[serde(default = "default_reminder_days")]
    pub reminder_days: u32,
    #[serde(with = "iso_instant")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_instant")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    Receivable,
    Payable,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    #[default]
    Pending,
    Cashed,
    Bounced,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    #[serde(default)]
    pub id: i64,
    pub check_number: String,
    pub amount: f64,
    pub bank_name: String,
    #[serde(with = "iso_instant")]
    pub due_date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub check_type: CheckType,
    #[serde(default)]
    pub status: CheckStatus,
    pub person_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_reminder_days")]
    pub reminder_days: u32,
    #[serde(with = "iso_instant")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_instant")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    pub amount: f64,
    #[serde(with = "iso_instant")]
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_reminder_days")]
    pub reminder_days: u32,
    #[serde(with = "iso_instant")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_instant")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReminderItemType {
    Installment,
    Debt,
    Credit,
    Check,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    pub message: String,
    #[serde(with = "iso_instant")]
    pub due_date: DateTime<Utc>,
    #[serde(default = "default_true", deserialize_with = "flexible_bool::deserialize")]
    pub is_active: bool,
    pub item_type: ReminderItemType,
    pub item_id: i64,
    #[serde(with = "iso_instant")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub total_debts: f64,
    pub total_credits: f64,
    pub total_pending_checks: u32,
    pub total_upcoming_installments: f64,
    pub net_balance: f64,
}

pub const DEFAULT_REMINDER_DAYS: u32 = 3;

fn default_reminder_days() -> u32 {
    DEFAULT_REMINDER_DAYS
}

fn default_true() -> bool {
    true
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(Error::Config(format!(
                        "unknown {} value {:?}",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

text_enum!(CheckType { Receivable => "receivable", Payable => "payable" });
text_enum!(CheckStatus { Pending => "pending", Cashed => "cashed", Bounced => "bounced" });
text_enum!(ReminderItemType {
    Installment => "installment",
    Debt => "debt",
    Credit => "credit",
    Check => "check",
});
