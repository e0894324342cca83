use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mockito::{Matcher, Mock, Server, ServerGuard};

use flo_portal_collector::adapters::db::{open_connection, run_migrations};
use flo_portal_collector::adapters::portal_http::HttpBrowsingContext;
use flo_portal_collector::adapters::session_cache::SessionCache;
use flo_portal_collector::app::services::{RecordQueries, SqliteRecordStore};
use flo_portal_collector::app::{AppConfig, AppError, Job, collect};
use flo_portal_collector::portal::navigator::NavigatorError;
use flo_portal_collector::portal::snapshot::TelemetryError;

const LOGIN_PAGE: &str = r#"<html><body>
<form method="post" action="/Account/Login">
  <input name="__RequestVerificationToken" type="hidden" value="csrf-1">
  <input id="Username" name="Username" type="email">
  <input id="Password" name="Password" type="password">
  <button type="submit">Sign in</button>
</form></body></html>"#;

const HISTORY_PAGE: &str = r#"<html><body>
<form method="post" action="/SessionHistory">
  <input id="DateRange_From" name="DateRange.From" type="date">
  <input id="DateRange_To" name="DateRange.To" type="date">
  <select id="SelectedDevice" name="SelectedDevice">
    <option value="A1" selected>Garage</option>
    <option value="AllStations">All stations</option>
  </select>
  <button type="submit">Filter</button>
</form></body></html>"#;

const FILTERED_HISTORY_PAGE: &str = r#"<html><body>
<a href="/SessionHistory/SessionHistoryFile?format=xlsx">Export</a>
</body></html>"#;

const STATUS_BODY: &str = r#"{"Id":"A1","Name":"Station 1","Status":2,"VehicleConnected":true,"Energy":12.3,"EnergyUnits":"kWh","Voltage":240,"VoltageUnits":"V","Current":16}"#;

const SIGNED_IN_COOKIE: &str = r"\.AspNetCore\.Cookies=signed-in";

fn fixture(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join("history")
        .join(name);
    std::fs::read(path).expect("fixture should exist")
}

fn config(server: &ServerGuard, dir: &Path) -> AppConfig {
    AppConfig {
        station_id: "A1".to_string(),
        username: "driver@example.com".to_string(),
        password: "hunter2".to_string(),
        portal_url: server.url(),
        cookies_path: dir.join("temp").join("cookies.json"),
        download_dir: dir.join("downloads"),
        history_file: "SessionHistory.xlsx".to_string(),
        db_path: dir.join("db.sqlite").to_string_lossy().into_owned(),
        http_timeout_ms: 5_000,
        download_timeout_ms: 5_000,
    }
}

fn store(config: &AppConfig) -> SqliteRecordStore {
    let mut connection = open_connection(&config.db_path).expect("db should open");
    run_migrations(&mut connection).expect("migrations should succeed");
    SqliteRecordStore::new(Arc::new(Mutex::new(connection)))
}

fn browser() -> HttpBrowsingContext {
    HttpBrowsingContext::new(Duration::from_secs(5)).expect("client should build")
}

struct SignInMocks {
    anonymous_status: Mock,
    submit: Mock,
}

async fn mock_sign_in(server: &mut ServerGuard) -> SignInMocks {
    let anonymous_status = server
        .mock("GET", "/Station/StationStatus")
        .match_query(Matcher::Any)
        .match_header("cookie", Matcher::Missing)
        .with_status(302)
        .with_header(
            "location",
            "/Account/Login?ReturnUrl=%2FStation%2FStationStatus",
        )
        .with_header("set-cookie", "antiforgery=af1; Path=/; HttpOnly")
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/Account/Login")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(LOGIN_PAGE)
        .create_async()
        .await;
    let submit = server
        .mock("POST", "/Account/Login")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("Username".into(), "driver@example.com".into()),
            Matcher::UrlEncoded("Password".into(), "hunter2".into()),
            Matcher::UrlEncoded("__RequestVerificationToken".into(), "csrf-1".into()),
        ]))
        .with_status(302)
        .with_header("location", "/")
        .with_header(
            "set-cookie",
            ".AspNetCore.Cookies=signed-in; Path=/; HttpOnly",
        )
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><body>Dashboard</body></html>")
        .create_async()
        .await;

    SignInMocks {
        anonymous_status,
        submit,
    }
}

async fn mock_status(server: &mut ServerGuard, hits: usize) -> Mock {
    server
        .mock("GET", "/Station/StationStatus")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("friendlyDeviceId".into(), "A1".into()),
            Matcher::UrlEncoded("startFastUpdates".into(), "false".into()),
        ]))
        .match_header("cookie", Matcher::Regex(SIGNED_IN_COOKIE.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json; charset=utf-8")
        .with_body(STATUS_BODY)
        .expect(hits)
        .create_async()
        .await
}

#[tokio::test]
async fn signs_in_collects_snapshot_and_history() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let mut server = Server::new_async().await;
    let sign_in = mock_sign_in(&mut server).await;
    let status = mock_status(&mut server, 1).await;
    let history_page = server
        .mock("GET", "/SessionHistory")
        .match_header("cookie", Matcher::Regex(SIGNED_IN_COOKIE.to_string()))
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(HISTORY_PAGE)
        .create_async()
        .await;
    let filter = server
        .mock("POST", "/SessionHistory")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r"DateRange\.From=\d{4}-\d{2}-\d{2}".to_string()),
            Matcher::Regex(r"DateRange\.To=\d{4}-\d{2}-\d{2}".to_string()),
            Matcher::UrlEncoded("SelectedDevice".into(), "AllStations".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(FILTERED_HISTORY_PAGE)
        .create_async()
        .await;
    let download = server
        .mock("GET", "/SessionHistory/SessionHistoryFile")
        .match_query(Matcher::Any)
        .match_header("cookie", Matcher::Regex(SIGNED_IN_COOKIE.to_string()))
        .with_status(200)
        .with_header(
            "content-type",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        )
        .with_header(
            "content-disposition",
            "attachment; filename=\"SessionHistory.xlsx\"",
        )
        .with_body(fixture("report_current.xlsx"))
        .create_async()
        .await;

    let config = config(&server, dir.path());
    let store = store(&config);

    collect(&config, browser(), &store, &[Job::Snapshot, Job::History])
        .await
        .expect("collection should succeed");

    sign_in.anonymous_status.assert_async().await;
    sign_in.submit.assert_async().await;
    status.assert_async().await;
    history_page.assert_async().await;
    filter.assert_async().await;
    download.assert_async().await;

    let observation = store
        .latest_observation()
        .expect("query should succeed")
        .expect("observation should be stored");
    assert_eq!(observation.station_id, "A1");
    assert_eq!(observation.energy, Some(12.3));
    assert_eq!(store.count_charging_sessions().expect("count"), 3);

    let cached = SessionCache::new(&config.cookies_path)
        .load()
        .expect("session token should be cached");
    assert_eq!(
        cached.get(".AspNetCore.Cookies").map(|cookie| cookie.value.as_str()),
        Some("signed-in")
    );
    assert!(config.download_dir.join("SessionHistory.xlsx").exists());
}

#[tokio::test]
async fn cached_session_skips_sign_in_on_next_run() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let mut server = Server::new_async().await;
    let sign_in = mock_sign_in(&mut server).await;
    let status = mock_status(&mut server, 2).await;

    let config = config(&server, dir.path());
    let store = store(&config);

    collect(&config, browser(), &store, &[Job::Snapshot])
        .await
        .expect("first run should succeed");
    collect(&config, browser(), &store, &[Job::Snapshot])
        .await
        .expect("second run should succeed");

    sign_in.anonymous_status.assert_async().await;
    sign_in.submit.assert_async().await;
    status.assert_async().await;
}

#[tokio::test]
async fn rejected_credentials_stop_the_run() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let mut server = Server::new_async().await;
    let status = server
        .mock("GET", "/Station/StationStatus")
        .match_query(Matcher::Any)
        .with_status(302)
        .with_header("location", "/Account/Login")
        .expect(2)
        .create_async()
        .await;
    server
        .mock("GET", "/Account/Login")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(LOGIN_PAGE)
        .create_async()
        .await;
    let submit = server
        .mock("POST", "/Account/Login")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(LOGIN_PAGE)
        .expect(1)
        .create_async()
        .await;

    let config = config(&server, dir.path());
    let store = store(&config);

    let result = collect(&config, browser(), &store, &[Job::Snapshot]).await;

    assert!(matches!(
        result,
        Err(AppError::Telemetry(TelemetryError::Navigation(
            NavigatorError::AuthenticationFailed { .. }
        )))
    ));
    status.assert_async().await;
    submit.assert_async().await;
    assert!(store.latest_observation().expect("query").is_none());
}
