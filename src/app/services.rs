use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::adapters::db;
use crate::adapters::db::{ChargingSessionRow, DbError, ObservationRow};
use crate::domain::models::{ChargingSessionRecord, TelemetrySnapshot};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database lock poisoned")]
    DbLockPoisoned,
    #[error("database operation failed: {0}")]
    Database(#[from] DbError),
}

pub trait RecordSink {
    fn store_snapshot(&self, snapshot: &TelemetrySnapshot) -> Result<String, StoreError>;
    fn store_charging_sessions(
        &self,
        records: &[ChargingSessionRecord],
    ) -> Result<usize, StoreError>;
}

pub trait RecordQueries {
    fn latest_observation(&self) -> Result<Option<ObservationRow>, StoreError>;
    fn list_charging_sessions(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ChargingSessionRow>, StoreError>;
    fn count_charging_sessions(&self) -> Result<i64, StoreError>;
}

#[derive(Clone)]
pub struct SqliteRecordStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, DbError>,
    ) -> Result<T, StoreError> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| StoreError::DbLockPoisoned)?;
        op(&connection).map_err(StoreError::from)
    }
}

impl RecordSink for SqliteRecordStore {
    fn store_snapshot(&self, snapshot: &TelemetrySnapshot) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.with_connection(|connection| db::insert_observation(connection, &id, snapshot))?;

        tracing::info!(
            observation_id = %id,
            station_id = %snapshot.station_id,
            "station snapshot persisted"
        );
        Ok(id)
    }

    fn store_charging_sessions(
        &self,
        records: &[ChargingSessionRecord],
    ) -> Result<usize, StoreError> {
        let imported_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let inserted = self.with_connection(|connection| {
            db::insert_charging_sessions(connection, records, &imported_at, || {
                Uuid::new_v4().to_string()
            })
        })?;

        tracing::info!(
            received = records.len(),
            inserted,
            "charging sessions persisted"
        );
        Ok(inserted)
    }
}

impl RecordQueries for SqliteRecordStore {
    fn latest_observation(&self) -> Result<Option<ObservationRow>, StoreError> {
        self.with_connection(db::latest_observation)
    }

    fn list_charging_sessions(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ChargingSessionRow>, StoreError> {
        self.with_connection(|connection| db::list_charging_sessions(connection, limit, offset))
    }

    fn count_charging_sessions(&self) -> Result<i64, StoreError> {
        self.with_connection(db::count_charging_sessions)
    }
}
