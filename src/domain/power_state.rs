use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use chrono_tz::Tz;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::duration::format_duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerStatus {
    On,
    Off,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("status must be \"on\" or \"off\"")]
pub struct InvalidPowerStatus;

impl PowerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl FromStr for PowerStatus {
    type Err = InvalidPowerStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            _ => Err(InvalidPowerStatus),
        }
    }
}

impl fmt::Display for PowerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PowerState {
    pub status: PowerStatus,
    pub observed_at: Option<DateTime<FixedOffset>>,
    pub raw_observed_at: String,
}

#[derive(Debug, Deserialize)]
struct PowerStateRecord {
    status: String,
    observed_at: String,
}

impl PowerState {
    pub fn encode(status: PowerStatus, observed_at: &DateTime<Tz>) -> String {
        serde_json::json!({
            "status": status.as_str(),
            "observed_at": observed_at.to_rfc3339_opts(SecondsFormat::Secs, false),
        })
        .to_string()
    }

    /// Returns `None` for anything that is not a recognizable record.
    pub fn decode(raw: &str) -> Option<Self> {
        let record: PowerStateRecord = serde_json::from_str(raw).ok()?;
        let status = record.status.parse().ok()?;
        let observed_at = DateTime::parse_from_rfc3339(record.observed_at.trim()).ok();

        Some(Self {
            status,
            observed_at,
            raw_observed_at: record.observed_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PowerTransition {
    pub status: PowerStatus,
    pub observed_at: DateTime<Tz>,
    pub previous_duration_secs: Option<u64>,
}

pub fn detect_transition(
    previous: Option<&PowerState>,
    status: PowerStatus,
    observed_at: DateTime<Tz>,
) -> Option<PowerTransition> {
    if previous.is_some_and(|state| state.status == status) {
        return None;
    }

    let previous_duration_secs = previous
        .and_then(|state| state.observed_at)
        .map(|since| observed_at.timestamp() - since.timestamp())
        .and_then(|elapsed| u64::try_from(elapsed).ok());

    Some(PowerTransition {
        status,
        observed_at,
        previous_duration_secs,
    })
}

pub fn render_power_message(transition: &PowerTransition) -> String {
    let time = transition.observed_at.format("%d.%m.%Y %H:%M:%S");
    let duration = transition.previous_duration_secs.map(format_duration);

    match transition.status {
        PowerStatus::On => {
            let mut message = format!(
                "⚡️ <b>Світло з'явилось!</b> ⚡️\n\n✅ Електропостачання відновлено\n🕐 Час: {time}\n"
            );
            if let Some(duration) = duration {
                message.push_str(&format!("⏱ Відключення тривало: {duration}\n"));
            }
            message.push_str("\n🏠 Можна користуватись побутовими приладами");
            message
        }
        PowerStatus::Off => {
            let mut message =
                format!("🔴 <b>Світло зникло</b> 🔴\n\n❌ Електропостачання відсутнє\n🕐 Час: {time}");
            if let Some(duration) = duration {
                message.push_str(&format!("\n⏱ Світло було: {duration}"));
            }
            message
        }
    }
}
