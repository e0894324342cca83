use thiserror::Error;

use crate::adapters::browser::{BrowserError, BrowsingContext};
use crate::domain::clock::Clock;
use crate::domain::models::TelemetrySnapshot;
use crate::domain::telemetry_payload::{ParseError, parse_station_status};
use crate::portal::endpoints::PortalEndpoints;
use crate::portal::navigator::{AuthenticatedNavigator, NavigatorError};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to reach station status page: {0}")]
    Navigation(#[from] NavigatorError),
    #[error("failed to read station status page: {0}")]
    Browser(#[from] BrowserError),
    #[error("failed to parse station status: {0}")]
    Parse(#[from] ParseError),
}

pub struct SnapshotExtractor<'n, B, C> {
    navigator: &'n AuthenticatedNavigator<B>,
    endpoints: PortalEndpoints,
    station_id: String,
    clock: C,
}

impl<'n, B, C> SnapshotExtractor<'n, B, C>
where
    B: BrowsingContext,
    C: Clock,
{
    pub fn new(
        navigator: &'n AuthenticatedNavigator<B>,
        endpoints: PortalEndpoints,
        station_id: impl Into<String>,
        clock: C,
    ) -> Self {
        Self {
            navigator,
            endpoints,
            station_id: station_id.into(),
            clock,
        }
    }

    pub async fn fetch_snapshot(&self) -> Result<TelemetrySnapshot, TelemetryError> {
        let url = self.endpoints.station_status_url(&self.station_id);
        self.navigator.navigate_to(&url).await?;

        let body = self.navigator.page().body_text().await?;
        let snapshot = parse_station_status(&body, self.clock.now())?;

        tracing::info!(
            station_id = %snapshot.station_id,
            status = snapshot.status,
            vehicle_connected = snapshot.vehicle_connected,
            energy = ?snapshot.energy,
            "station snapshot captured"
        );
        Ok(snapshot)
    }
}
