use chrono::DateTime;
use chrono_tz::Tz;

use crate::adapters::markers::{MarkerError, MarkerStore};
use crate::adapters::telegram::Notifier;
use crate::domain::power_state::{
    PowerState, PowerStatus, detect_transition, render_power_message,
};

pub const POWER_STATE_KEY: &str = "power.state";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub changed: bool,
    pub notified: bool,
}

/// Callers must serialize `report_status`.
pub struct PowerStatusReconciler<N, M> {
    notifier: N,
    markers: M,
}

impl<N, M> PowerStatusReconciler<N, M>
where
    N: Notifier,
    M: MarkerStore,
{
    pub fn new(notifier: N, markers: M) -> Self {
        Self { notifier, markers }
    }

    pub fn report_status(&self, status: PowerStatus, observed_at: DateTime<Tz>) -> StatusReport {
        let previous = self.load_previous();

        let Some(transition) = detect_transition(previous.as_ref(), status, observed_at) else {
            tracing::debug!(status = %status, "power status unchanged");
            return StatusReport {
                changed: false,
                notified: false,
            };
        };

        let message = render_power_message(&transition);
        let notified = match self.notifier.send(&message) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(status = %status, error = %error, "power notification failed");
                false
            }
        };

        let encoded = PowerState::encode(status, &transition.observed_at);
        if let Err(error) = self.markers.set(POWER_STATE_KEY, &encoded) {
            tracing::error!(status = %status, error = %error, "failed to persist power state");
        }

        tracing::info!(
            status = %status,
            previous_duration_secs = ?transition.previous_duration_secs,
            notified,
            "power transition recorded"
        );

        StatusReport {
            changed: true,
            notified,
        }
    }

    pub fn current_state(&self) -> Result<Option<PowerState>, MarkerError> {
        read_power_state(&self.markers)
    }

    pub fn markers(&self) -> &M {
        &self.markers
    }

    fn load_previous(&self) -> Option<PowerState> {
        match self.markers.get(POWER_STATE_KEY) {
            Ok(Some(raw)) => {
                let decoded = PowerState::decode(&raw);
                if decoded.is_none() {
                    tracing::warn!(raw = %raw, "ignoring malformed power state marker");
                }
                decoded
            }
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(error = %error, "power state lookup failed; treating as unknown");
                None
            }
        }
    }
}

pub fn read_power_state<M: MarkerStore + ?Sized>(
    markers: &M,
) -> Result<Option<PowerState>, MarkerError> {
    Ok(markers
        .get(POWER_STATE_KEY)?
        .as_deref()
        .and_then(PowerState::decode))
}
