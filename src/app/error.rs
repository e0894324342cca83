use thiserror::Error;

use crate::app::services::StoreError;
use crate::portal::history::HistoryError;
use crate::portal::snapshot::TelemetryError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to initialize database: {0}")]
    DatabaseInit(String),
    #[error("runtime failure: {0}")]
    Runtime(String),
    #[error("snapshot collection failed: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("history collection failed: {0}")]
    History(#[from] HistoryError),
    #[error("failed to store collected data: {0}")]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn logging_init<E: std::fmt::Display>(error: E) -> Self {
        Self::LoggingInit(error.to_string())
    }

    pub fn config<E: std::fmt::Display>(error: E) -> Self {
        Self::Config(error.to_string())
    }

    pub fn database_init<E: std::fmt::Display>(error: E) -> Self {
        Self::DatabaseInit(error.to_string())
    }

    pub fn runtime<E: std::fmt::Display>(error: E) -> Self {
        Self::Runtime(error.to_string())
    }
}
