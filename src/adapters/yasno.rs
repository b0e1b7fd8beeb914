use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, FixedOffset};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::schedule::{
    DaySchedule, DayStatus, GroupSchedule, MINUTES_PER_DAY, OutageInterval, ScheduleSnapshot,
    SlotKind,
};

pub const DEFAULT_API_BASE_URL: &str = "https://app.yasno.ua";

pub trait ScheduleSource: Send {
    fn fetch(&self) -> Result<ScheduleSnapshot, ScheduleSourceError>;
}

impl<T: ScheduleSource + ?Sized> ScheduleSource for Box<T> {
    fn fetch(&self) -> Result<ScheduleSnapshot, ScheduleSourceError> {
        (**self).fetch()
    }
}

#[derive(Debug, Error)]
pub enum ScheduleSourceError {
    #[error("schedule request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("schedule API answered with status {0}")]
    Status(u16),
    #[error("failed to parse schedule payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("group {group}: slot {start}-{end} is outside the day")]
    InvalidSlot { group: String, start: u16, end: u16 },
    #[error("schedule replay failed: {0}")]
    Replay(String),
}

#[derive(Debug, Deserialize)]
enum WireSlotType {
    Definite,
    NotPlanned,
    Maybe,
}

#[derive(Debug, Deserialize)]
enum WireStatus {
    ScheduleApplies,
    WaitingForSchedule,
    NoOutages,
    EmergencyShutdowns,
}

#[derive(Debug, Deserialize)]
struct WireSlot {
    start: u16,
    end: u16,
    #[serde(rename = "type")]
    kind: WireSlotType,
}

#[derive(Debug, Deserialize)]
struct WireDay {
    #[serde(default)]
    slots: Vec<WireSlot>,
    date: DateTime<FixedOffset>,
    status: WireStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireGroup {
    today: WireDay,
    tomorrow: WireDay,
    updated_on: Option<DateTime<FixedOffset>>,
}

impl From<WireSlotType> for SlotKind {
    fn from(value: WireSlotType) -> Self {
        match value {
            WireSlotType::Definite => Self::Definite,
            WireSlotType::NotPlanned => Self::NotPlanned,
            WireSlotType::Maybe => Self::Possible,
        }
    }
}

impl From<WireStatus> for DayStatus {
    fn from(value: WireStatus) -> Self {
        match value {
            WireStatus::ScheduleApplies => Self::Applies,
            WireStatus::WaitingForSchedule => Self::WaitingForConfirmation,
            WireStatus::NoOutages => Self::NoOutages,
            WireStatus::EmergencyShutdowns => Self::Emergency,
        }
    }
}

pub fn parse_snapshot(payload: Value) -> Result<ScheduleSnapshot, ScheduleSourceError> {
    let wire: HashMap<String, WireGroup> = serde_json::from_value(payload)?;

    let mut groups = BTreeMap::new();
    for (group, schedule) in wire {
        let today = convert_day(&group, schedule.today)?;
        let tomorrow = convert_day(&group, schedule.tomorrow)?;
        groups.insert(
            group,
            GroupSchedule {
                today,
                tomorrow,
                updated_on: schedule.updated_on,
            },
        );
    }

    Ok(ScheduleSnapshot { groups })
}

fn convert_day(group: &str, day: WireDay) -> Result<DaySchedule, ScheduleSourceError> {
    let slots = day
        .slots
        .into_iter()
        .map(|slot| {
            if slot.start > slot.end || slot.end > MINUTES_PER_DAY {
                return Err(ScheduleSourceError::InvalidSlot {
                    group: group.to_string(),
                    start: slot.start,
                    end: slot.end,
                });
            }
            Ok(OutageInterval {
                start: slot.start,
                end: slot.end,
                kind: slot.kind.into(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DaySchedule {
        date: day.date.date_naive(),
        status: day.status.into(),
        slots,
    })
}

#[derive(Debug, Clone)]
pub struct YasnoClient {
    client: Client,
    url: String,
}

impl YasnoClient {
    pub fn new(client: Client, base_url: &str, region_id: u32, dso_id: u32) -> Self {
        Self {
            client,
            url: format!(
                "{}/api/blackout-service/public/shutdowns/regions/{region_id}/dsos/{dso_id}/planned-outages",
                base_url.trim_end_matches('/')
            ),
        }
    }
}

impl ScheduleSource for YasnoClient {
    fn fetch(&self) -> Result<ScheduleSnapshot, ScheduleSourceError> {
        tracing::debug!(url = %self.url, "fetching outage schedule");

        let response = self.client.get(&self.url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScheduleSourceError::Status(status.as_u16()));
        }

        let payload: Value = response.json()?;
        let snapshot = parse_snapshot(payload)?;
        tracing::debug!(groups = snapshot.groups.len(), "outage schedule received");
        Ok(snapshot)
    }
}
