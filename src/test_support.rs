use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::adapters::db::{open_connection, run_migrations};
use crate::adapters::markers::{MarkerError, MarkerStore};
use crate::adapters::telegram::{Notifier, NotifyError};
use crate::adapters::yasno::{ScheduleSource, ScheduleSourceError};
use crate::domain::clock::Clock;
use crate::domain::schedule::ScheduleSnapshot;

static TEST_DB_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn open_test_connection(test_name: &str) -> Connection {
    let template = ensure_template_db();
    let test_db_path = unique_test_db_path(test_name);

    if let Some(parent) = test_db_path.parent() {
        std::fs::create_dir_all(parent).expect("test db dir should be creatable");
    }

    std::fs::copy(&template, &test_db_path).expect("template db should be copied");
    open_connection(test_db_path.to_string_lossy().as_ref()).expect("test db should open")
}

fn ensure_template_db() -> PathBuf {
    static TEMPLATE_PATH: OnceLock<PathBuf> = OnceLock::new();

    TEMPLATE_PATH
        .get_or_init(|| {
            let template_path = std::env::var("TEST_DB_TEMPLATE_PATH")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| Path::new("./data/light_bot_test.db").to_path_buf());

            if let Some(parent) = template_path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).expect("template parent dir should be creatable");
            }

            let mut connection = open_connection(template_path.to_string_lossy().as_ref())
                .expect("template db opens");
            run_migrations(&mut connection).expect("template migrations should succeed");

            template_path
        })
        .clone()
}

fn unique_test_db_path(test_name: &str) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let counter = TEST_DB_COUNTER.fetch_add(1, Ordering::Relaxed);
    Path::new("./target/testdb").join(format!("{test_name}-{now}-{counter}.sqlite"))
}

pub async fn run_blocking<T, F>(work: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    actix_web::web::block(work)
        .await
        .expect("blocking work should finish")
}

#[derive(Clone, Default)]
pub struct InMemoryMarkerStore {
    values: Arc<Mutex<BTreeMap<String, String>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryMarkerStore {
    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().expect("markers lock").get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.values
            .lock()
            .expect("markers lock")
            .insert(key.to_string(), value.to_string());
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values.lock().expect("markers lock").clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), MarkerError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(MarkerError::LockPoisoned)
        } else {
            Ok(())
        }
    }
}

impl MarkerStore for InMemoryMarkerStore {
    fn get(&self, key: &str) -> Result<Option<String>, MarkerError> {
        self.check()?;
        Ok(self.value(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), MarkerError> {
        self.check()?;
        self.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), MarkerError> {
        self.check()?;
        self.values.lock().expect("markers lock").remove(key);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<String>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("notifier lock").clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, text: &str) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected {
                status: 502,
                description: "scripted failure".to_string(),
            });
        }
        self.sent.lock().expect("notifier lock").push(text.to_string());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct ScriptedSource {
    queue: Arc<Mutex<VecDeque<Result<ScheduleSnapshot, String>>>>,
    fetches: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn push(&self, snapshot: ScheduleSnapshot) {
        self.queue.lock().expect("source lock").push_back(Ok(snapshot));
    }

    pub fn push_failure(&self, reason: &str) {
        self.queue
            .lock()
            .expect("source lock")
            .push_back(Err(reason.to_string()));
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ScheduleSource for ScriptedSource {
    fn fetch(&self) -> Result<ScheduleSnapshot, ScheduleSourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.queue.lock().expect("source lock").pop_front() {
            Some(Ok(snapshot)) => Ok(snapshot),
            Some(Err(reason)) => Err(ScheduleSourceError::Replay(reason)),
            None => Err(ScheduleSourceError::Replay("no scripted snapshot".to_string())),
        }
    }
}

#[derive(Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("clock lock") = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}
