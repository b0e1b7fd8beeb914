use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, SecondsFormat, Utc};
use rusqlite::Connection;
use thiserror::Error;

use crate::adapters::db::{self, DbError, MarkerRecord};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("marker store lock poisoned")]
    LockPoisoned,
    #[error("marker store operation failed: {0}")]
    Database(#[from] DbError),
}

pub trait MarkerStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, MarkerError>;
    fn set(&self, key: &str, value: &str) -> Result<(), MarkerError>;
    fn remove(&self, key: &str) -> Result<(), MarkerError>;
}

pub trait MarkerQueryHandler: Send + Sync {
    fn list_markers(&self) -> Result<Vec<MarkerRecord>, MarkerError>;
}

#[derive(Clone)]
pub struct SqliteMarkerStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteMarkerStore {
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, DbError>,
    ) -> Result<T, MarkerError> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| MarkerError::LockPoisoned)?;
        op(&connection).map_err(MarkerError::from)
    }
}

impl MarkerStore for SqliteMarkerStore {
    fn get(&self, key: &str) -> Result<Option<String>, MarkerError> {
        self.with_connection(|connection| db::get_marker(connection, key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), MarkerError> {
        let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.with_connection(|connection| db::upsert_marker(connection, key, value, &updated_at))
    }

    fn remove(&self, key: &str) -> Result<(), MarkerError> {
        self.with_connection(|connection| db::delete_marker(connection, key))
    }
}

impl MarkerQueryHandler for SqliteMarkerStore {
    fn list_markers(&self) -> Result<Vec<MarkerRecord>, MarkerError> {
        self.with_connection(db::list_markers)
    }
}

/// Reads a `YYYY-MM-DD` marker; unparseable content counts as absent.
pub fn read_date<M: MarkerStore + ?Sized>(
    markers: &M,
    key: &str,
) -> Result<Option<NaiveDate>, MarkerError> {
    let Some(raw) = markers.get(key)? else {
        return Ok(None);
    };

    match NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT) {
        Ok(date) => Ok(Some(date)),
        Err(error) => {
            tracing::warn!(key, raw = %raw, error = %error, "ignoring malformed date marker");
            Ok(None)
        }
    }
}

pub fn write_date<M: MarkerStore + ?Sized>(
    markers: &M,
    key: &str,
    date: NaiveDate,
) -> Result<(), MarkerError> {
    markers.set(key, &date.format(DATE_FORMAT).to_string())
}
