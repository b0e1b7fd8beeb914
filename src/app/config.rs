use chrono_tz::Tz;

use crate::adapters::{telegram, yasno};
use crate::app::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_bot_token: String,
    pub telegram_channel_id: String,
    pub telegram_schedule_channel_id: String,
    pub telegram_api_base_url: String,
    pub api_token: String,
    pub http_bind: String,
    pub db_path: String,
    pub timezone: Tz,
    pub http_timeout_secs: u64,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub api_base_url: String,
    pub region_id: u32,
    pub dso_id: u32,
    pub group: String,
    pub debug_file: Option<String>,
    pub check_interval_secs: u64,
    pub changes_start_hour: u32,
    pub tomorrow_start_hour: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let telegram_channel_id = required(&lookup, "TELEGRAM_CHANNEL_ID")?;
        let timezone_name = optional(&lookup, "TIMEZONE").unwrap_or_else(|| "Europe/Kyiv".to_string());
        let timezone = timezone_name
            .parse::<Tz>()
            .map_err(|_| AppError::config(format!("TIMEZONE {timezone_name} is not a known IANA zone")))?;

        let schedule = ScheduleConfig {
            enabled: parse_flag(&lookup, "SCHEDULE_ENABLED", true)?,
            api_base_url: optional(&lookup, "YASNO_API_BASE_URL")
                .unwrap_or_else(|| yasno::DEFAULT_API_BASE_URL.to_string()),
            region_id: parse_or_default(&lookup, "YASNO_REGION_ID", 25_u32)?,
            dso_id: parse_or_default(&lookup, "YASNO_DSO_ID", 902_u32)?,
            group: optional(&lookup, "YASNO_GROUP").unwrap_or_else(|| "2.1".to_string()),
            debug_file: optional(&lookup, "YASNO_DEBUG_FILE"),
            check_interval_secs: parse_or_default(&lookup, "SCHEDULE_CHECK_INTERVAL", 3_600_u64)?,
            changes_start_hour: parse_or_default(&lookup, "SCHEDULE_CHANGES_START_HOUR", 8_u32)?,
            tomorrow_start_hour: parse_or_default(&lookup, "SCHEDULE_TOMORROW_START_HOUR", 18_u32)?,
        };

        let config = Self {
            telegram_bot_token: required(&lookup, "TELEGRAM_BOT_TOKEN")?,
            telegram_schedule_channel_id: optional(&lookup, "TELEGRAM_SCHEDULE_CHANNEL_ID")
                .unwrap_or_else(|| telegram_channel_id.clone()),
            telegram_channel_id,
            telegram_api_base_url: optional(&lookup, "TELEGRAM_API_BASE_URL")
                .unwrap_or_else(|| telegram::DEFAULT_API_BASE_URL.to_string()),
            api_token: required(&lookup, "API_TOKEN")?,
            http_bind: optional(&lookup, "HTTP_BIND").unwrap_or_else(|| "0.0.0.0:5000".to_string()),
            db_path: optional(&lookup, "DB_PATH").unwrap_or_else(|| "light_bot.db".to_string()),
            timezone,
            http_timeout_secs: parse_or_default(&lookup, "HTTP_TIMEOUT_SECS", 30_u64)?,
            schedule,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        let schedule = &self.schedule;
        if schedule.changes_start_hour > 23 {
            return Err(AppError::config("SCHEDULE_CHANGES_START_HOUR must be below 24"));
        }
        if schedule.tomorrow_start_hour > 23 {
            return Err(AppError::config("SCHEDULE_TOMORROW_START_HOUR must be below 24"));
        }
        if schedule.changes_start_hour >= schedule.tomorrow_start_hour {
            return Err(AppError::config(
                "SCHEDULE_CHANGES_START_HOUR must be earlier than SCHEDULE_TOMORROW_START_HOUR",
            ));
        }
        if schedule.check_interval_secs == 0 {
            return Err(AppError::config("SCHEDULE_CHECK_INTERVAL must be greater than zero"));
        }
        if self.http_timeout_secs == 0 {
            return Err(AppError::config("HTTP_TIMEOUT_SECS must be greater than zero"));
        }
        Ok(())
    }
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, key: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or_else(|| AppError::config(format!("{key} is required")))
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match optional(lookup, key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(_) => Err(AppError::config(format!("{key} must be true or false"))),
    }
}
