use chrono::{DateTime, NaiveDateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
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
    pub captured_at: DateTime<Utc>,
}

// Timestamps are the portal's wall-clock values and carry no offset.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargingSessionRecord {
    pub station_name: String,
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
    pub duration_ms: i64,
    pub energy_wh: f64,
}
