pub mod auth_state;
pub mod charging_history;
pub mod clock;
pub mod date_range;
pub mod models;
pub mod numeric;
pub mod session_token;
pub mod telemetry_payload;
