use std::sync::Mutex;

use chrono_tz::Tz;
use thiserror::Error;

use crate::adapters::markers::{MarkerError, MarkerStore};
use crate::adapters::telegram::Notifier;
use crate::app::power::{PowerStatusReconciler, StatusReport, read_power_state};
use crate::domain::clock::Clock;
use crate::domain::power_state::{PowerState, PowerStatus};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("power reconciler lock poisoned")]
    LockPoisoned,
    #[error("marker lookup failed: {0}")]
    Markers(#[from] MarkerError),
}

pub trait PowerStatusHandler: Send + Sync {
    fn report_status(&self, status: PowerStatus) -> Result<StatusReport, ServiceError>;
    fn current_state(&self) -> Result<Option<PowerState>, ServiceError>;
}

// Reports are serialized through the reconciler lock; state reads bypass it.
pub struct PowerStatusService<N, M, Cl> {
    reconciler: Mutex<PowerStatusReconciler<N, M>>,
    markers: M,
    clock: Cl,
    timezone: Tz,
}

impl<N, M, Cl> PowerStatusService<N, M, Cl>
where
    N: Notifier,
    M: MarkerStore + Clone,
    Cl: Clock + Send + Sync,
{
    pub fn new(reconciler: PowerStatusReconciler<N, M>, clock: Cl, timezone: Tz) -> Self {
        let markers = reconciler.markers().clone();
        Self {
            reconciler: Mutex::new(reconciler),
            markers,
            clock,
            timezone,
        }
    }
}

impl<N, M, Cl> PowerStatusHandler for PowerStatusService<N, M, Cl>
where
    N: Notifier,
    M: MarkerStore,
    Cl: Clock + Send + Sync,
{
    fn report_status(&self, status: PowerStatus) -> Result<StatusReport, ServiceError> {
        let reconciler = self
            .reconciler
            .lock()
            .map_err(|_| ServiceError::LockPoisoned)?;
        let observed_at = self.clock.now().with_timezone(&self.timezone);
        Ok(reconciler.report_status(status, observed_at))
    }

    fn current_state(&self) -> Result<Option<PowerState>, ServiceError> {
        Ok(read_power_state(&self.markers)?)
    }
}
