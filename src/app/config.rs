use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::app::AppError;

#[derive(Clone)]
pub struct AppConfig {
    pub station_id: String,
    pub username: String,
    pub password: String,
    pub portal_url: String,
    pub cookies_path: PathBuf,
    pub download_dir: PathBuf,
    pub history_file: String,
    pub db_path: String,
    pub http_timeout_ms: u64,
    pub download_timeout_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            station_id: required(&lookup, "FLO_STATION_ID")?,
            username: required(&lookup, "FLO_USERNAME")?,
            password: required(&lookup, "FLO_PASSWORD")?,
            portal_url: text_or_default(&lookup, "FLO_PORTAL_URL", "https://account.flo.ca"),
            cookies_path: text_or_default(&lookup, "FLO_COOKIES_PATH", "temp/cookies.json").into(),
            download_dir: text_or_default(&lookup, "FLO_DOWNLOAD_DIR", "temp").into(),
            history_file: text_or_default(&lookup, "FLO_HISTORY_FILE", "SessionHistory.xlsx"),
            db_path: text_or_default(&lookup, "DB_PATH", "data/db.sqlite"),
            http_timeout_ms: parse_or_default(&lookup, "HTTP_TIMEOUT_MS", 30_000_u64)?,
            download_timeout_ms: parse_or_default(&lookup, "DOWNLOAD_TIMEOUT_MS", 30_000_u64)?,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_millis(self.download_timeout_ms)
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("station_id", &self.station_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("portal_url", &self.portal_url)
            .field("cookies_path", &self.cookies_path)
            .field("download_dir", &self.download_dir)
            .field("history_file", &self.history_file)
            .field("db_path", &self.db_path)
            .field("http_timeout_ms", &self.http_timeout_ms)
            .field("download_timeout_ms", &self.download_timeout_ms)
            .finish()
    }
}

fn trimmed<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, key: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    trimmed(lookup, key).ok_or_else(|| AppError::config(format!("{key} is required")))
}

fn text_or_default<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    trimmed(lookup, key).unwrap_or_else(|| default.to_string())
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}
