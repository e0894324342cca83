mod config;
mod error;
mod logging;
mod runtime;
pub mod services;

pub use config::AppConfig;
pub use error::AppError;
pub use runtime::{Job, collect};

pub fn run() -> Result<(), AppError> {
    start(&[Job::Snapshot, Job::History])
}

pub fn run_snapshot() -> Result<(), AppError> {
    start(&[Job::Snapshot])
}

pub fn run_history() -> Result<(), AppError> {
    start(&[Job::History])
}

fn start(jobs: &[Job]) -> Result<(), AppError> {
    logging::init()?;

    let config = AppConfig::from_env()?;

    tracing::info!(
        station_id = %config.station_id,
        username = %config.username,
        portal_url = %config.portal_url,
        cookies_path = %config.cookies_path.display(),
        download_dir = %config.download_dir.display(),
        db_path = %config.db_path,
        jobs = ?jobs,
        "collector bootstrap initialized"
    );

    runtime::run(config, jobs)
}
