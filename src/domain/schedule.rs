use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate};
use sha2::{Digest, Sha256};

pub const MINUTES_PER_DAY: u16 = 1_440;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlotKind {
    Definite,
    NotPlanned,
    Possible,
}

impl SlotKind {
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Definite => "Definite",
            Self::NotPlanned => "NotPlanned",
            Self::Possible => "Maybe",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStatus {
    Applies,
    WaitingForConfirmation,
    NoOutages,
    Emergency,
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Applies => "ScheduleApplies",
            Self::WaitingForConfirmation => "WaitingForSchedule",
            Self::NoOutages => "NoOutages",
            Self::Emergency => "EmergencyShutdowns",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutageInterval {
    pub start: u16,
    pub end: u16,
    pub kind: SlotKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub slots: Vec<OutageInterval>,
}

impl DaySchedule {
    pub fn is_confirmed(&self) -> bool {
        self.status != DayStatus::WaitingForConfirmation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSchedule {
    pub today: DaySchedule,
    pub tomorrow: DaySchedule,
    pub updated_on: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleSnapshot {
    pub groups: BTreeMap<String, GroupSchedule>,
}

impl ScheduleSnapshot {
    pub fn group(&self, group: &str) -> Option<&GroupSchedule> {
        self.groups.get(group)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScheduleFingerprint(String);

impl ScheduleFingerprint {
    /// Digest of the group id and the day's intervals in canonical order.
    /// Dates, titles and update stamps never take part.
    pub fn compute(group: &str, slots: &[OutageInterval]) -> Self {
        let mut ordered = slots.to_vec();
        ordered.sort_unstable();

        let body = ordered
            .iter()
            .map(|slot| format!("{}-{}-{}", slot.start, slot.end, slot.kind.wire_name()))
            .collect::<Vec<_>>()
            .join("|");

        let digest = Sha256::digest(format!("{group}|{body}").as_bytes());
        Self(hex::encode(digest))
    }

    pub fn from_stored(value: &str) -> Option<Self> {
        let value = value.trim();
        let well_formed = value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit());
        well_formed.then(|| Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationCheckpoint {
    pub last_check_date: Option<NaiveDate>,
    pub tomorrow_announced_date: Option<NaiveDate>,
    pub fingerprint_stale_since: Option<NaiveDate>,
}

impl ReconciliationCheckpoint {
    pub fn is_new_calendar_day(&self, today: NaiveDate) -> bool {
        self.last_check_date.is_some_and(|date| date != today)
    }

    pub fn tomorrow_announced_on(&self, today: NaiveDate) -> bool {
        self.tomorrow_announced_date == Some(today)
    }

    pub fn stale_before(&self, today: NaiveDate) -> bool {
        self.fingerprint_stale_since.is_some_and(|date| date < today)
    }
}
