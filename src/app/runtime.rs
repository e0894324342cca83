use std::sync::{Arc, Mutex};

use crate::adapters::browser::BrowsingContext;
use crate::adapters::db::{open_connection, run_migrations};
use crate::adapters::portal_http::HttpBrowsingContext;
use crate::adapters::session_cache::SessionCache;
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::app::services::{RecordSink, SqliteRecordStore};
use crate::domain::clock::SystemClock;
use crate::portal::endpoints::PortalEndpoints;
use crate::portal::history::{HistorySettings, SessionHistoryRetriever};
use crate::portal::navigator::{AuthenticatedNavigator, Credentials};
use crate::portal::snapshot::SnapshotExtractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Snapshot,
    History,
}

pub fn run(config: AppConfig, jobs: &[Job]) -> Result<(), AppError> {
    if let Some(parent) = std::path::Path::new(&config.db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(AppError::database_init)?;
    }

    let mut connection = open_connection(&config.db_path).map_err(AppError::database_init)?;
    run_migrations(&mut connection).map_err(AppError::database_init)?;
    let store = SqliteRecordStore::new(Arc::new(Mutex::new(connection)));

    let browser = HttpBrowsingContext::new(config.http_timeout()).map_err(AppError::runtime)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(AppError::runtime)?;

    runtime.block_on(collect(&config, browser, &store, jobs))
}

pub async fn collect<B, S>(
    config: &AppConfig,
    browser: B,
    sink: &S,
    jobs: &[Job],
) -> Result<(), AppError>
where
    B: BrowsingContext,
    S: RecordSink,
{
    let endpoints = PortalEndpoints::new(&config.portal_url).map_err(AppError::config)?;
    let navigator = AuthenticatedNavigator::new(
        browser,
        SessionCache::new(&config.cookies_path),
        Credentials::new(&config.username, &config.password),
        endpoints.sign_in_url(),
    );

    for job in jobs {
        match job {
            Job::Snapshot => {
                let extractor = SnapshotExtractor::new(
                    &navigator,
                    endpoints.clone(),
                    &config.station_id,
                    SystemClock,
                );
                let snapshot = extractor.fetch_snapshot().await?;
                sink.store_snapshot(&snapshot)?;
            }
            Job::History => {
                let retriever = SessionHistoryRetriever::new(
                    &navigator,
                    endpoints.clone(),
                    HistorySettings {
                        download_dir: config.download_dir.clone(),
                        file_name: config.history_file.clone(),
                        download_timeout: config.download_timeout(),
                    },
                    SystemClock,
                );
                let records = retriever.fetch_history().await?;
                sink.store_charging_sessions(&records)?;
            }
        }
    }

    Ok(())
}
