use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Timelike};
use chrono_tz::Tz;
use thiserror::Error;

use crate::adapters::markers::{MarkerError, MarkerStore, read_date, write_date};
use crate::adapters::telegram::Notifier;
use crate::adapters::yasno::{ScheduleSource, ScheduleSourceError};
use crate::domain::clock::Clock;
use crate::domain::schedule::{GroupSchedule, ReconciliationCheckpoint, ScheduleFingerprint};
use crate::domain::schedule_format::{Framing, render_schedule_message};

pub const FINGERPRINT_KEY: &str = "schedule.fingerprint";
pub const LAST_CHECK_DATE_KEY: &str = "schedule.last_check_date";
pub const TOMORROW_ANNOUNCED_KEY: &str = "schedule.tomorrow_announced_date";
pub const FINGERPRINT_STALE_SINCE_KEY: &str = "schedule.fingerprint_stale_since";

const SLEEP_SLICE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    pub group: String,
    pub timezone: Tz,
    pub changes_start_hour: u32,
    pub tomorrow_start_hour: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TomorrowOutcome {
    AlreadyAnnounced,
    TooEarly,
    Waiting,
    Announced,
    SendFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodayOutcome {
    Inactive,
    BaselineEstablished,
    Unchanged,
    Announced(Framing),
    SendFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub tomorrow: TomorrowOutcome,
    pub today: TodayOutcome,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("schedule fetch failed: {0}")]
    Fetch(#[from] ScheduleSourceError),
    #[error("group {0} is missing from the schedule")]
    GroupMissing(String),
    #[error("schedule marker access failed: {0}")]
    Markers(#[from] MarkerError),
}

pub struct ScheduleReconciler<S, N, M, Cl> {
    source: S,
    notifier: N,
    markers: M,
    clock: Cl,
    settings: ScheduleSettings,
}

impl<S, N, M, Cl> ScheduleReconciler<S, N, M, Cl>
where
    S: ScheduleSource,
    N: Notifier,
    M: MarkerStore,
    Cl: Clock,
{
    pub fn new(source: S, notifier: N, markers: M, clock: Cl, settings: ScheduleSettings) -> Self {
        Self {
            source,
            notifier,
            markers,
            clock,
            settings,
        }
    }

    pub fn tick(&self) -> Result<TickReport, ReconcileError> {
        let now = self.clock.now().with_timezone(&self.settings.timezone);
        let today = now.date_naive();
        let hour = now.hour();
        let checkpoint = self.load_checkpoint()?;

        let tomorrow_gate = if checkpoint.tomorrow_announced_on(today) {
            Some(TomorrowOutcome::AlreadyAnnounced)
        } else if hour < self.settings.tomorrow_start_hour {
            Some(TomorrowOutcome::TooEarly)
        } else {
            None
        };
        let today_active =
            hour >= self.settings.changes_start_hour && hour < self.settings.tomorrow_start_hour;

        if let Some(outcome) = tomorrow_gate
            && !today_active
        {
            tracing::debug!(hour, tomorrow = ?outcome, "schedule tick outside active windows");
            return Ok(TickReport {
                tomorrow: outcome,
                today: TodayOutcome::Inactive,
            });
        }

        let snapshot = self.source.fetch()?;
        let group = snapshot
            .group(&self.settings.group)
            .ok_or_else(|| ReconcileError::GroupMissing(self.settings.group.clone()))?;

        let tomorrow = match tomorrow_gate {
            Some(outcome) => outcome,
            None => self.reconcile_tomorrow(group, &checkpoint, today, &now)?,
        };
        let today_outcome = if today_active {
            self.reconcile_today(group, today, &now)?
        } else {
            TodayOutcome::Inactive
        };

        Ok(TickReport {
            tomorrow,
            today: today_outcome,
        })
    }

    fn reconcile_tomorrow(
        &self,
        group: &GroupSchedule,
        checkpoint: &ReconciliationCheckpoint,
        today: NaiveDate,
        now: &DateTime<Tz>,
    ) -> Result<TomorrowOutcome, ReconcileError> {
        if !group.tomorrow.is_confirmed() {
            if checkpoint.fingerprint_stale_since.is_none() {
                write_date(&self.markers, FINGERPRINT_STALE_SINCE_KEY, today)?;
            }
            tracing::info!(
                group = %self.settings.group,
                date = %group.tomorrow.date,
                "tomorrow's schedule still waiting for confirmation"
            );
            return Ok(TomorrowOutcome::Waiting);
        }

        let message =
            render_schedule_message(&self.settings.group, &group.tomorrow, Framing::Tomorrow, now);
        if let Err(error) = self.notifier.send(&message) {
            tracing::warn!(error = %error, "tomorrow's schedule announcement failed");
            return Ok(TomorrowOutcome::SendFailed);
        }

        let fingerprint = ScheduleFingerprint::compute(&self.settings.group, &group.tomorrow.slots);
        self.markers.set(FINGERPRINT_KEY, fingerprint.as_str())?;
        self.markers.remove(FINGERPRINT_STALE_SINCE_KEY)?;
        write_date(&self.markers, TOMORROW_ANNOUNCED_KEY, today)?;

        tracing::info!(
            group = %self.settings.group,
            date = %group.tomorrow.date,
            status = %group.tomorrow.status,
            fingerprint = fingerprint.short(),
            "tomorrow's schedule announced"
        );
        Ok(TomorrowOutcome::Announced)
    }

    fn reconcile_today(
        &self,
        group: &GroupSchedule,
        today: NaiveDate,
        now: &DateTime<Tz>,
    ) -> Result<TodayOutcome, ReconcileError> {
        // Re-read: the tomorrow track may have moved markers in this tick.
        let checkpoint = self.load_checkpoint()?;
        let current = ScheduleFingerprint::compute(&self.settings.group, &group.today.slots);
        let stale = checkpoint.stale_before(today);

        let framing = match self.load_fingerprint()? {
            None => {
                self.commit_today(&current, &checkpoint, today)?;
                tracing::info!(fingerprint = current.short(), "schedule baseline established");
                return Ok(TodayOutcome::BaselineEstablished);
            }
            Some(previous) if previous == current && !stale => {
                write_date(&self.markers, LAST_CHECK_DATE_KEY, today)?;
                tracing::debug!(fingerprint = current.short(), "today's schedule unchanged");
                return Ok(TodayOutcome::Unchanged);
            }
            Some(_) if stale || checkpoint.is_new_calendar_day(today) => Framing::Today,
            Some(_) => Framing::Changed,
        };

        let message = render_schedule_message(&self.settings.group, &group.today, framing, now);
        if let Err(error) = self.notifier.send(&message) {
            tracing::warn!(error = %error, framing = ?framing, "today's schedule announcement failed");
            return Ok(TodayOutcome::SendFailed);
        }

        self.commit_today(&current, &checkpoint, today)?;
        tracing::info!(
            group = %self.settings.group,
            framing = ?framing,
            status = %group.today.status,
            fingerprint = current.short(),
            "today's schedule announced"
        );
        Ok(TodayOutcome::Announced(framing))
    }

    fn commit_today(
        &self,
        fingerprint: &ScheduleFingerprint,
        checkpoint: &ReconciliationCheckpoint,
        today: NaiveDate,
    ) -> Result<(), ReconcileError> {
        self.markers.set(FINGERPRINT_KEY, fingerprint.as_str())?;
        if checkpoint.fingerprint_stale_since.is_some() {
            self.markers.remove(FINGERPRINT_STALE_SINCE_KEY)?;
        }
        write_date(&self.markers, LAST_CHECK_DATE_KEY, today)?;
        Ok(())
    }

    fn load_checkpoint(&self) -> Result<ReconciliationCheckpoint, MarkerError> {
        Ok(ReconciliationCheckpoint {
            last_check_date: read_date(&self.markers, LAST_CHECK_DATE_KEY)?,
            tomorrow_announced_date: read_date(&self.markers, TOMORROW_ANNOUNCED_KEY)?,
            fingerprint_stale_since: read_date(&self.markers, FINGERPRINT_STALE_SINCE_KEY)?,
        })
    }

    fn load_fingerprint(&self) -> Result<Option<ScheduleFingerprint>, MarkerError> {
        let Some(raw) = self.markers.get(FINGERPRINT_KEY)? else {
            return Ok(None);
        };

        let parsed = ScheduleFingerprint::from_stored(&raw);
        if parsed.is_none() {
            tracing::warn!(raw = %raw, "ignoring malformed schedule fingerprint");
        }
        Ok(parsed)
    }
}

pub fn start_schedule_poller<S, N, M, Cl>(
    reconciler: ScheduleReconciler<S, N, M, Cl>,
    interval: Duration,
    stop_flag: Arc<AtomicBool>,
) -> JoinHandle<()>
where
    S: ScheduleSource + 'static,
    N: Notifier + 'static,
    M: MarkerStore + 'static,
    Cl: Clock + Send + 'static,
{
    std::thread::spawn(move || {
        while !stop_flag.load(Ordering::Relaxed) {
            match reconciler.tick() {
                Ok(report) => tracing::debug!(
                    tomorrow = ?report.tomorrow,
                    today = ?report.today,
                    "schedule tick finished"
                ),
                Err(error) => tracing::warn!(error = %error, "schedule tick failed"),
            }
            sleep_unless_stopped(interval, &stop_flag);
        }
        tracing::info!("schedule poller stopped");
    })
}

fn sleep_unless_stopped(interval: Duration, stop_flag: &AtomicBool) {
    let mut remaining = interval;
    while !remaining.is_zero() && !stop_flag.load(Ordering::Relaxed) {
        let step = remaining.min(SLEEP_SLICE);
        std::thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
}
