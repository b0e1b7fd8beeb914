use std::fs;
use std::sync::Mutex;

use serde::Deserialize;
use serde_json::Value;

use crate::adapters::yasno::{ScheduleSource, ScheduleSourceError, parse_snapshot};
use crate::domain::schedule::ScheduleSnapshot;

#[derive(Debug, Clone, Deserialize)]
struct ScriptFile {
    #[serde(default = "default_loop")]
    loop_forever: bool,
    responses: Vec<ScriptEvent>,
}

#[derive(Debug, Clone, Deserialize)]
struct ScriptEvent {
    ok: Option<Value>,
    error: Option<String>,
}

fn default_loop() -> bool {
    true
}

#[derive(Debug)]
pub struct ScheduleFileSource {
    script: ScriptFile,
    next_index: Mutex<usize>,
}

impl ScheduleFileSource {
    pub fn from_file(path: &str) -> Result<Self, ScheduleSourceError> {
        let content = fs::read_to_string(path)
            .map_err(|error| ScheduleSourceError::Replay(format!("{path}: {error}")))?;
        let script: ScriptFile = serde_json::from_str(&content)?;

        if script.responses.is_empty() {
            return Err(ScheduleSourceError::Replay(
                "debug script must contain at least one response".to_string(),
            ));
        }

        Ok(Self {
            script,
            next_index: Mutex::new(0),
        })
    }

    fn next_event(&self) -> Result<ScriptEvent, ScheduleSourceError> {
        let mut index = self
            .next_index
            .lock()
            .map_err(|_| ScheduleSourceError::Replay("replay state lock poisoned".to_string()))?;

        if *index >= self.script.responses.len() {
            if self.script.loop_forever {
                *index = 0;
            } else {
                return Err(ScheduleSourceError::Replay("debug replay finished".to_string()));
            }
        }

        let event = self.script.responses[*index].clone();
        *index += 1;
        Ok(event)
    }
}

impl ScheduleSource for ScheduleFileSource {
    fn fetch(&self) -> Result<ScheduleSnapshot, ScheduleSourceError> {
        match self.next_event()? {
            ScriptEvent {
                ok: Some(payload),
                error: None,
            } => parse_snapshot(payload),
            ScriptEvent {
                ok: None,
                error: Some(kind),
            } => Err(ScheduleSourceError::Replay(format!("scripted failure: {kind}"))),
            _ => Err(ScheduleSourceError::Replay(
                "script event must contain exactly one of: ok or error".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ScheduleFileSource;
    use crate::adapters::yasno::{ScheduleSource, ScheduleSourceError};
    use crate::domain::schedule::DayStatus;

    fn fixture(path: &str) -> String {
        format!(
            "{}/testdata/schedule/{path}",
            env!("CARGO_MANIFEST_DIR").replace("\\", "/")
        )
    }

    #[test]
    fn replays_and_loops_scripted_snapshots() {
        let source = ScheduleFileSource::from_file(&fixture("confirm_tomorrow.json"))
            .expect("script should load");

        let waiting = source.fetch().expect("first response should parse");
        let confirmed = source.fetch().expect("second response should parse");
        let looped = source.fetch().expect("script should loop");

        let status = |snapshot: &crate::domain::schedule::ScheduleSnapshot| {
            snapshot.group("2.1").expect("group").tomorrow.status
        };
        assert_eq!(status(&waiting), DayStatus::WaitingForConfirmation);
        assert_eq!(status(&confirmed), DayStatus::Applies);
        assert_eq!(status(&looped), DayStatus::WaitingForConfirmation);
    }

    #[test]
    fn scripted_failures_surface_as_errors_until_replay_ends() {
        let source = ScheduleFileSource::from_file(&fixture("failures.json"))
            .expect("script should load");

        let first = source.fetch().expect_err("scripted timeout must fail");
        assert!(first.to_string().contains("timeout"));
        assert!(source.fetch().is_ok());

        let finished = source.fetch().expect_err("non-looping script ends");
        assert!(finished.to_string().contains("debug replay finished"));
    }

    #[test]
    fn rejects_script_without_responses() {
        let error = ScheduleFileSource::from_file(&fixture("empty.json"))
            .expect_err("empty script must fail");
        assert!(matches!(error, ScheduleSourceError::Replay(_)));
    }

    #[test]
    fn rejects_missing_file() {
        let error = ScheduleFileSource::from_file(&fixture("does_not_exist.json"))
            .expect_err("missing script must fail");
        assert!(error.to_string().contains("does_not_exist.json"));
    }
}
