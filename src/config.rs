use std::fs;
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use log::info;
use serde::{Deserialize, Serialize};

use crate::digits::DigitMode;
use crate::errors::{Error, Result};
use crate::jalali::JalaliCalendar;
use crate::utils::{default_data_dir, default_db_path};

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Iran Standard Time, UTC+03:30.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 210;

pub const MAX_REMINDER_DAYS_BEFORE: u32 = 365;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    pub database_path: Option<PathBuf>,
    pub digit_mode: DigitMode,
    pub utc_offset_minutes: i32,
    pub chart_months_back: u32,
    pub reminder_days_before: u32,
    pub reminder_hour: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            digit_mode: DigitMode::Persian,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            chart_months_back: 6,
            reminder_days_before: 3,
            reminder_hour: 9,
        }
    }
}

impl TrackerConfig {
    pub fn default_path() -> Result<PathBuf> {
        Ok(default_data_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Reads the config file. A missing file gives the defaults; a file
    /// that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let config_data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let config: TrackerConfig = serde_json::from_str(&config_data)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let config_json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, config_json)?;
        info!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.utc_offset()?;
        if self.reminder_hour > 23 {
            return Err(Error::Config(format!(
                "reminder_hour must be within 0..=23, got {}",
                self.reminder_hour
            )));
        }
        if self.reminder_days_before > MAX_REMINDER_DAYS_BEFORE {
            return Err(Error::Config(format!(
                "reminder_days_before must be at most {}, got {}",
                MAX_REMINDER_DAYS_BEFORE, self.reminder_days_before
            )));
        }
        if self.chart_months_back == 0 {
            return Err(Error::Config("chart_months_back must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn utc_offset(&self) -> Result<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                Error::Config(format!(
                    "utc_offset_minutes out of range: {}",
                    self.utc_offset_minutes
                ))
            })
    }

    pub fn calendar(&self) -> Result<JalaliCalendar> {
        Ok(JalaliCalendar::new(self.utc_offset()?, self.digit_mode))
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => default_db_path(),
        }
    }
}
