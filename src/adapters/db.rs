use chrono::{NaiveDateTime, SecondsFormat};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use crate::domain::models::{ChargingSessionRecord, TelemetrySnapshot};

pub const LATEST_SCHEMA_VERSION: u32 = 1;

const NAIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

const MIGRATIONS: &[(u32, &str)] = &[(
    1,
    r#"
CREATE TABLE IF NOT EXISTS station_observations (
    id TEXT PRIMARY KEY,
    captured_at TEXT NOT NULL,
    station_id TEXT NOT NULL,
    name TEXT,
    nickname TEXT,
    status INTEGER NOT NULL,
    vehicle_connected INTEGER NOT NULL,
    led_hex_code TEXT,
    led_modulation_state TEXT,
    current REAL,
    energy REAL,
    energy_unit TEXT,
    voltage REAL,
    voltage_unit TEXT
);

CREATE INDEX IF NOT EXISTS idx_station_observations_captured_at_desc
ON station_observations (captured_at DESC);

CREATE TABLE IF NOT EXISTS charging_sessions (
    id TEXT PRIMARY KEY,
    station_name TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    duration_ms INTEGER NOT NULL,
    energy_wh REAL NOT NULL,
    imported_at TEXT NOT NULL,
    UNIQUE (station_name, started_at)
);

CREATE INDEX IF NOT EXISTS idx_charging_sessions_started_at_desc
ON charging_sessions (started_at DESC);
"#,
)];

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unsupported schema version {current}; latest supported is {latest}")]
    UnsupportedSchemaVersion { current: u32, latest: u32 },
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

#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRow {
    pub id: String,
    pub captured_at: String,
    pub station_id: String,
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub status: i64,
    pub vehicle_connected: bool,
    pub led_hex_code: Option<String>,
    pub led_modulation_state: Option<String>,
    pub current: Option<f64>,
    pub energy: Option<f64>,
    pub energy_unit: Option<String>,
    pub voltage: Option<f64>,
    pub voltage_unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargingSessionRow {
    pub id: String,
    pub station_name: String,
    pub started_at: String,
    pub finished_at: String,
    pub duration_ms: i64,
    pub energy_wh: f64,
    pub imported_at: String,
}

pub fn insert_observation(
    connection: &Connection,
    id: &str,
    snapshot: &TelemetrySnapshot,
) -> Result<(), DbError> {
    connection.execute(
        "INSERT INTO station_observations (
            id, captured_at, station_id, name, nickname, status, vehicle_connected,
            led_hex_code, led_modulation_state, current, energy, energy_unit, voltage, voltage_unit
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            id,
            snapshot
                .captured_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            snapshot.station_id,
            snapshot.name,
            snapshot.nickname,
            snapshot.status,
            snapshot.vehicle_connected,
            snapshot.led_hex_code,
            snapshot.led_modulation_state,
            snapshot.current,
            snapshot.energy,
            snapshot.energy_unit,
            snapshot.voltage,
            snapshot.voltage_unit,
        ],
    )?;

    Ok(())
}

/// Sessions already stored (same station and start) are left untouched.
pub fn insert_charging_sessions(
    connection: &Connection,
    records: &[ChargingSessionRecord],
    imported_at: &str,
    mut next_id: impl FnMut() -> String,
) -> Result<usize, DbError> {
    let transaction = connection.unchecked_transaction()?;
    let mut inserted = 0;

    {
        let mut statement = transaction.prepare(
            "INSERT OR IGNORE INTO charging_sessions
                (id, station_name, started_at, finished_at, duration_ms, energy_wh, imported_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;

        for record in records {
            inserted += statement.execute(params![
                next_id(),
                record.station_name,
                format_naive(record.started_at),
                format_naive(record.finished_at),
                record.duration_ms,
                record.energy_wh,
                imported_at,
            ])?;
        }
    }

    transaction.commit()?;

    Ok(inserted)
}

pub fn latest_observation(connection: &Connection) -> Result<Option<ObservationRow>, DbError> {
    let row = connection
        .query_row(
            "SELECT id, captured_at, station_id, name, nickname, status, vehicle_connected,
                    led_hex_code, led_modulation_state, current, energy, energy_unit, voltage,
                    voltage_unit
             FROM station_observations
             ORDER BY captured_at DESC
             LIMIT 1",
            [],
            |row| {
                Ok(ObservationRow {
                    id: row.get(0)?,
                    captured_at: row.get(1)?,
                    station_id: row.get(2)?,
                    name: row.get(3)?,
                    nickname: row.get(4)?,
                    status: row.get(5)?,
                    vehicle_connected: row.get(6)?,
                    led_hex_code: row.get(7)?,
                    led_modulation_state: row.get(8)?,
                    current: row.get(9)?,
                    energy: row.get(10)?,
                    energy_unit: row.get(11)?,
                    voltage: row.get(12)?,
                    voltage_unit: row.get(13)?,
                })
            },
        )
        .optional()?;

    Ok(row)
}

pub fn list_charging_sessions(
    connection: &Connection,
    limit: u32,
    offset: u32,
) -> Result<Vec<ChargingSessionRow>, DbError> {
    let mut statement = connection.prepare(
        "SELECT id, station_name, started_at, finished_at, duration_ms, energy_wh, imported_at
         FROM charging_sessions
         ORDER BY started_at DESC, station_name ASC
         LIMIT ?1 OFFSET ?2",
    )?;

    let rows = statement.query_map(params![i64::from(limit), i64::from(offset)], |row| {
        Ok(ChargingSessionRow {
            id: row.get(0)?,
            station_name: row.get(1)?,
            started_at: row.get(2)?,
            finished_at: row.get(3)?,
            duration_ms: row.get(4)?,
            energy_wh: row.get(5)?,
            imported_at: row.get(6)?,
        })
    })?;

    let mut sessions = Vec::new();
    for row in rows {
        sessions.push(row?);
    }

    Ok(sessions)
}

pub fn count_charging_sessions(connection: &Connection) -> Result<i64, DbError> {
    let count = connection.query_row("SELECT COUNT(*) FROM charging_sessions", [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

fn format_naive(timestamp: NaiveDateTime) -> String {
    timestamp.format(NAIVE_TIMESTAMP_FORMAT).to_string()
}
