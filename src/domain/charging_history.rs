use std::io::Cursor;

use calamine::{Data, Reader, Xlsx, XlsxError};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::domain::models::ChargingSessionRecord;
use crate::domain::numeric::parse_f64_from_text;

pub const REPORT_SHEET: &str = "Report";

/// Positional layout of the history report. Cells are matched by index, not by header text.
pub const REPORT_COLUMNS: [&str; 11] = [
    "startDate",
    "endDate",
    "cardNumber",
    "parkName",
    "stationName",
    "durationDays",
    "energyTransferredWh",
    "originalCost",
    "originalCurrency",
    "totalCost",
    "currency",
];

const START_DATE: usize = 0;
const END_DATE: usize = 1;
const STATION_NAME: usize = 4;
const ENERGY_WH: usize = 6;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("failed to read history workbook: {0}")]
    Workbook(#[from] XlsxError),
    #[error("history workbook has no sheet named {0}")]
    MissingSheet(&'static str),
}

#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    #[error("missing value for {0}")]
    MissingCell(&'static str),
    #[error("unparsable {column}: {value}")]
    InvalidDate { column: &'static str, value: String },
    #[error("unparsable energyTransferredWh: {0}")]
    InvalidEnergy(String),
}

pub fn normalize(bytes: &[u8]) -> Result<Vec<ChargingSessionRecord>, NormalizeError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;

    if !workbook.sheet_names().iter().any(|name| name == REPORT_SHEET) {
        return Err(NormalizeError::MissingSheet(REPORT_SHEET));
    }

    let range = workbook.worksheet_range(REPORT_SHEET)?;
    Ok(normalize_rows(range.rows()))
}

/// The first row restates the column headers and is dropped; unmappable rows are skipped.
pub fn normalize_rows<'a, I>(rows: I) -> Vec<ChargingSessionRecord>
where
    I: IntoIterator<Item = &'a [Data]>,
{
    let mut records = Vec::new();

    for (index, row) in rows.into_iter().enumerate().skip(1) {
        if row.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }

        match normalize_row(row) {
            Ok(record) => records.push(record),
            Err(error) => {
                tracing::warn!(row = index + 1, error = %error, "skipping charging history row");
            }
        }
    }

    records
}

pub fn normalize_row(row: &[Data]) -> Result<ChargingSessionRecord, RowError> {
    let started_at = cell_datetime(row, START_DATE)?;
    let finished_at = cell_datetime(row, END_DATE)?;

    let station_name = row
        .get(STATION_NAME)
        .map(|cell| cell.to_string().trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or(RowError::MissingCell(REPORT_COLUMNS[STATION_NAME]))?;

    let energy_wh = match row.get(ENERGY_WH) {
        Some(Data::Float(value)) => *value,
        Some(Data::Int(value)) => *value as f64,
        Some(Data::String(text)) => {
            parse_f64_from_text(text).ok_or_else(|| RowError::InvalidEnergy(text.clone()))?
        }
        Some(Data::Empty) | None => {
            return Err(RowError::MissingCell(REPORT_COLUMNS[ENERGY_WH]));
        }
        Some(other) => return Err(RowError::InvalidEnergy(other.to_string())),
    };

    Ok(ChargingSessionRecord {
        station_name,
        started_at,
        finished_at,
        duration_ms: (finished_at - started_at).num_milliseconds(),
        energy_wh,
    })
}

fn cell_datetime(row: &[Data], index: usize) -> Result<NaiveDateTime, RowError> {
    let column = REPORT_COLUMNS[index];
    let cell = match row.get(index) {
        Some(Data::Empty) | None => return Err(RowError::MissingCell(column)),
        Some(cell) => cell,
    };

    let parsed = match cell {
        Data::DateTime(value) => from_serial(value.as_f64()),
        Data::Float(value) => from_serial(*value),
        Data::Int(value) => from_serial(*value as f64),
        Data::String(text) | Data::DateTimeIso(text) => parse_datetime_text(text),
        _ => None,
    };

    parsed.ok_or_else(|| RowError::InvalidDate {
        column,
        value: cell.to_string(),
    })
}

/// Spreadsheet date serial: days since 1899-12-30, fraction is the time of day.
fn from_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial <= 0.0 {
        return None;
    }

    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

fn parse_datetime_text(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    if let Some(parsed) = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
    {
        return Some(parsed);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_local());
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
