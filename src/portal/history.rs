use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::adapters::browser::{BrowserError, BrowsingContext, click_and_wait};
use crate::domain::charging_history::{NormalizeError, normalize};
use crate::domain::clock::Clock;
use crate::domain::date_range::DateRange;
use crate::domain::models::ChargingSessionRecord;
use crate::portal::endpoints::PortalEndpoints;
use crate::portal::navigator::{AuthenticatedNavigator, NavigatorError};

const DATE_FROM_SELECTOR: &str = "#DateRange_From";
const DATE_TO_SELECTOR: &str = "#DateRange_To";
const DEVICE_SELECTOR: &str = "#SelectedDevice";
const ALL_STATIONS: &str = "AllStations";
const FILTER_SUBMIT_SELECTOR: &str = "button[type=submit]";
const DOWNLOAD_LINK_SELECTOR: &str = "a[href*=SessionHistoryFile]";

const DOWNLOAD_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to reach session history page: {0}")]
    Navigation(#[from] NavigatorError),
    #[error("browser action failed on session history page: {0}")]
    Browser(#[from] BrowserError),
    #[error("failed to prepare download directory {path}: {source}")]
    DownloadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("download {path} did not complete within {timeout_ms} ms")]
    DownloadTimeout { path: PathBuf, timeout_ms: u128 },
    #[error("failed to read downloaded history {path}: {source}")]
    Download {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to normalize session history: {0}")]
    Normalize(#[from] NormalizeError),
}

#[derive(Debug, Clone)]
pub struct HistorySettings {
    pub download_dir: PathBuf,
    pub file_name: String,
    pub download_timeout: Duration,
}

impl HistorySettings {
    pub fn target_path(&self) -> PathBuf {
        self.download_dir.join(&self.file_name)
    }
}

pub struct SessionHistoryRetriever<'n, B, C> {
    navigator: &'n AuthenticatedNavigator<B>,
    endpoints: PortalEndpoints,
    settings: HistorySettings,
    clock: C,
}

impl<'n, B, C> SessionHistoryRetriever<'n, B, C>
where
    B: BrowsingContext,
    C: Clock,
{
    pub fn new(
        navigator: &'n AuthenticatedNavigator<B>,
        endpoints: PortalEndpoints,
        settings: HistorySettings,
        clock: C,
    ) -> Self {
        Self {
            navigator,
            endpoints,
            settings,
            clock,
        }
    }

    pub async fn fetch_history(&self) -> Result<Vec<ChargingSessionRecord>, HistoryError> {
        let range = DateRange::ending_on(self.clock.today());
        self.navigator
            .navigate_to(&self.endpoints.session_history_url())
            .await?;

        let page = self.navigator.page();
        let download_dir = &self.settings.download_dir;
        tokio::fs::create_dir_all(download_dir)
            .await
            .map_err(|source| HistoryError::DownloadDir {
                path: download_dir.clone(),
                source,
            })?;
        page.set_download_dir(download_dir).await?;

        page.type_text(DATE_FROM_SELECTOR, &range.from_param()).await?;
        page.type_text(DATE_TO_SELECTOR, &range.to_param()).await?;
        page.type_text(DEVICE_SELECTOR, ALL_STATIONS).await?;
        click_and_wait(page, FILTER_SUBMIT_SELECTOR).await?;

        let target = self.settings.target_path();
        remove_stale_download(&target).await;

        click_and_wait(page, DOWNLOAD_LINK_SELECTOR).await?;
        wait_for_download(&target, self.settings.download_timeout).await?;

        let bytes = tokio::fs::read(&target)
            .await
            .map_err(|source| HistoryError::Download {
                path: target.clone(),
                source,
            })?;
        let records = normalize(&bytes)?;

        tracing::info!(
            from = %range.from_param(),
            to = %range.to_param(),
            records = records.len(),
            "session history retrieved"
        );
        Ok(records)
    }
}

async fn remove_stale_download(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed previous history download"),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => tracing::warn!(
            path = %path.display(),
            error = %error,
            "failed to remove previous history download"
        ),
    }
}

/// Waits until `path` exists with a non-zero size that held still for one poll interval.
/// A file first seen at the deadline still gets its confirming poll.
async fn wait_for_download(path: &Path, timeout: Duration) -> Result<(), HistoryError> {
    let deadline = Instant::now() + timeout;
    let mut last_size = None;
    let mut confirming_late = false;

    loop {
        let size = match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() && metadata.len() > 0 => Some(metadata.len()),
            _ => None,
        };

        if size.is_some() && size == last_size {
            return Ok(());
        }
        last_size = size;

        if Instant::now() >= deadline {
            if size.is_some() && !confirming_late {
                confirming_late = true;
                tokio::time::sleep(DOWNLOAD_POLL_INTERVAL).await;
                continue;
            }
            return Err(HistoryError::DownloadTimeout {
                path: path.to_path_buf(),
                timeout_ms: timeout.as_millis(),
            });
        }
        tokio::time::sleep(DOWNLOAD_POLL_INTERVAL).await;
    }
}
