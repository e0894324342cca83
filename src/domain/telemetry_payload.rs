use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::models::TelemetrySnapshot;
use crate::domain::numeric::{find_value, parse_f64, parse_i64};

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("station status body is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("payload must be a JSON object")]
    InvalidPayloadType,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("field {0} has an unexpected type")]
    InvalidField(&'static str),
}

const ID_KEYS: &[&str] = &["Id"];
const NAME_KEYS: &[&str] = &["Name"];
const NICKNAME_KEYS: &[&str] = &["Nickname"];
const STATUS_KEYS: &[&str] = &["Status"];
const VEHICLE_CONNECTED_KEYS: &[&str] = &["VehicleConnected"];
const LED_HEX_KEYS: &[&str] = &["LedHexCode"];
const LED_MODULATION_KEYS: &[&str] = &["CurrentLEDModulationState", "LedModulationState"];
const CURRENT_KEYS: &[&str] = &["Current"];
const ENERGY_KEYS: &[&str] = &["Energy"];
const ENERGY_UNIT_KEYS: &[&str] = &["EnergyUnits", "EnergyUnit"];
const VOLTAGE_KEYS: &[&str] = &["Voltage"];
const VOLTAGE_UNIT_KEYS: &[&str] = &["VoltageUnits", "VoltageUnit"];

pub fn parse_station_status(
    body: &str,
    captured_at: DateTime<Utc>,
) -> Result<TelemetrySnapshot, ParseError> {
    let payload: Value = serde_json::from_str(body.trim())
        .map_err(|error| ParseError::InvalidJson(error.to_string()))?;
    let object = payload.as_object().ok_or(ParseError::InvalidPayloadType)?;

    let station_id = find_text(object, ID_KEYS)
        .filter(|id| !id.is_empty())
        .ok_or(ParseError::MissingField("Id"))?;

    let status = find_value(object, STATUS_KEYS)
        .ok_or(ParseError::MissingField("Status"))
        .and_then(|value| parse_i64(value).ok_or(ParseError::InvalidField("Status")))?;

    let vehicle_connected = find_value(object, VEHICLE_CONNECTED_KEYS)
        .ok_or(ParseError::MissingField("VehicleConnected"))
        .and_then(|value| parse_flag(value).ok_or(ParseError::InvalidField("VehicleConnected")))?;

    Ok(TelemetrySnapshot {
        station_id,
        name: find_text(object, NAME_KEYS),
        nickname: find_text(object, NICKNAME_KEYS),
        status,
        vehicle_connected,
        led_hex_code: find_text(object, LED_HEX_KEYS),
        led_modulation_state: find_text(object, LED_MODULATION_KEYS),
        current: find_value(object, CURRENT_KEYS).and_then(parse_f64),
        energy: find_value(object, ENERGY_KEYS).and_then(parse_f64),
        energy_unit: find_text(object, ENERGY_UNIT_KEYS),
        voltage: find_value(object, VOLTAGE_KEYS).and_then(parse_f64),
        voltage_unit: find_text(object, VOLTAGE_UNIT_KEYS),
        captured_at,
    })
}

fn find_text(object: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    match find_value(object, aliases)? {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_f64().map(|number| number != 0.0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
