use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

pub const LATEST_SCHEMA_VERSION: u32 = 1;

const MIGRATIONS: &[(u32, &str)] = &[(
    1,
    r#"
CREATE TABLE IF NOT EXISTS markers (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#,
)];

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unsupported schema version {current}; latest supported is {latest}")]
    UnsupportedSchemaVersion { current: u32, latest: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerRecord {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

pub fn open_connection(path: &str) -> Result<Connection, DbError> {
    Connection::open(path).map_err(DbError::from)
}

pub fn run_migrations(connection: &mut Connection) -> Result<(), DbError> {
    let current_version = schema_version(connection)?;

    if current_version > LATEST_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            current: current_version,
            latest: LATEST_SCHEMA_VERSION,
        });
    }

    let transaction = connection.transaction()?;

    for (version, sql) in MIGRATIONS {
        if *version > current_version {
            transaction.execute_batch(sql)?;
            transaction.pragma_update(None, "user_version", version)?;
        }
    }

    transaction.commit()?;

    Ok(())
}

pub fn schema_version(connection: &Connection) -> Result<u32, DbError> {
    let version = connection.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

pub fn get_marker(connection: &Connection, key: &str) -> Result<Option<String>, DbError> {
    let value = connection
        .query_row(
            "SELECT value FROM markers WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn upsert_marker(
    connection: &Connection,
    key: &str,
    value: &str,
    updated_at: &str,
) -> Result<(), DbError> {
    connection.execute(
        "INSERT INTO markers (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, updated_at],
    )?;
    Ok(())
}

pub fn delete_marker(connection: &Connection, key: &str) -> Result<(), DbError> {
    connection.execute("DELETE FROM markers WHERE key = ?1", params![key])?;
    Ok(())
}

pub fn list_markers(connection: &Connection) -> Result<Vec<MarkerRecord>, DbError> {
    let mut statement =
        connection.prepare("SELECT key, value, updated_at FROM markers ORDER BY key ASC")?;

    let rows = statement.query_map([], |row| {
        Ok(MarkerRecord {
            key: row.get(0)?,
            value: row.get(1)?,
            updated_at: row.get(2)?,
        })
    })?;

    let mut markers = Vec::new();
    for row in rows {
        markers.push(row?);
    }

    Ok(markers)
}
