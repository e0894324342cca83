use reqwest::Url;
use thiserror::Error;

const SIGN_IN_PATH: &str = "/Account/Login";
const STATION_STATUS_PATH: &str = "/Station/StationStatus";
const SESSION_HISTORY_PATH: &str = "/SessionHistory";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EndpointError {
    #[error("invalid portal url {url}: {reason}")]
    InvalidPortalUrl { url: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct PortalEndpoints {
    base: Url,
}

impl PortalEndpoints {
    pub fn new(base_url: &str) -> Result<Self, EndpointError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base = Url::parse(trimmed).map_err(|error| EndpointError::InvalidPortalUrl {
            url: base_url.to_string(),
            reason: error.to_string(),
        })?;

        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(EndpointError::InvalidPortalUrl {
                url: base_url.to_string(),
                reason: "expected an http(s) url".to_string(),
            });
        }

        Ok(Self { base })
    }

    pub fn sign_in_url(&self) -> String {
        self.join(SIGN_IN_PATH).to_string()
    }

    pub fn station_status_url(&self, station_id: &str) -> String {
        let mut url = self.join(STATION_STATUS_PATH);
        url.query_pairs_mut()
            .append_pair("friendlyDeviceId", station_id)
            .append_pair("startFastUpdates", "false");
        url.to_string()
    }

    pub fn session_history_url(&self) -> String {
        self.join(SESSION_HISTORY_PATH).to_string()
    }

    fn join(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let prefix = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{prefix}{path}"));
        url.set_query(None);
        url
    }
}
