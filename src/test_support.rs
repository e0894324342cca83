use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::Connection;
use tempfile::TempDir;
use tokio::sync::watch;

use crate::adapters::browser::{BrowserError, BrowsingContext, NavigationFuture};
use crate::adapters::db::{open_connection, run_migrations};
use crate::domain::clock::Clock;
use crate::domain::session_token::{SessionCookie, SessionToken};

pub const PORTAL_ORIGIN: &str = "https://portal.test";
pub const USERNAME: &str = "driver@example.com";
pub const PASSWORD: &str = "hunter2";

const AUTH_COOKIE: &str = ".AspNetCore.Cookies";
const LOGIN_PAGE: &str = r#"<form method="post"><input id="Username" name="Username"><input id="Password" name="Password" type="password"><button type="submit">Sign in</button></form>"#;

static TEMPLATE_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn migrated_connection(test_name: &str) -> (TempDir, Connection) {
    let template = ensure_template_db();
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let counter = TEMPLATE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = dir.path().join(format!("{test_name}-{counter}.sqlite"));

    std::fs::copy(template, &path).expect("template db should be copied");
    let connection = open_connection(path.to_string_lossy().as_ref()).expect("test db should open");
    (dir, connection)
}

fn ensure_template_db() -> &'static Path {
    static TEMPLATE_PATH: OnceLock<PathBuf> = OnceLock::new();

    TEMPLATE_PATH.get_or_init(|| {
        let dir = tempfile::tempdir().expect("template dir should be created");
        let path = dir.path().join("template.sqlite");
        std::mem::forget(dir);

        let mut connection =
            open_connection(path.to_string_lossy().as_ref()).expect("template db opens");
        run_migrations(&mut connection).expect("template migrations should succeed");
        path
    })
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Noon UTC keeps the local calendar date stable across test machine timezones.
    pub fn on(year: i32, month: u32, day: u32) -> Self {
        Self(
            Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
                .single()
                .expect("fixed clock date should be valid"),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }

    fn today(&self) -> NaiveDate {
        self.0.date_naive()
    }
}

pub fn portal_url(path: &str) -> String {
    format!("{PORTAL_ORIGIN}{path}")
}

struct ScriptedDownload {
    file_name: String,
    bytes: Vec<u8>,
    delay: Option<Duration>,
}

#[derive(Default)]
struct PortalState {
    accept_logins: bool,
    valid_session: String,
    pages: HashMap<String, String>,
    download: Option<ScriptedDownload>,
    jar: SessionToken,
    location: Option<String>,
    body: String,
    return_to: Option<String>,
    typed: HashMap<String, String>,
    submitted_filters: Vec<HashMap<String, String>>,
    download_dir: Option<PathBuf>,
    login_submissions: usize,
    visits: Vec<String>,
}

/// In-memory portal double: a page map behind a cookie-guarded sign-in form.
pub struct ScriptedPortal {
    state: Mutex<PortalState>,
    navigations: watch::Sender<u64>,
}

impl ScriptedPortal {
    pub fn new() -> Self {
        let (navigations, _) = watch::channel(0);
        Self {
            state: Mutex::new(PortalState {
                accept_logins: true,
                valid_session: "session-1".to_string(),
                ..PortalState::default()
            }),
            navigations,
        }
    }

    pub fn sign_in_url() -> String {
        portal_url("/Account/Login")
    }

    pub fn with_page(self, path: &str, body: &str) -> Self {
        self.state()
            .pages
            .insert(portal_url(path), body.to_string());
        self
    }

    pub fn with_download(self, file_name: &str, bytes: Vec<u8>) -> Self {
        self.set_download(file_name, bytes, None);
        self
    }

    /// The download link navigates, but the file only lands after `delay`.
    pub fn with_slow_download(self, file_name: &str, bytes: Vec<u8>, delay: Duration) -> Self {
        self.set_download(file_name, bytes, Some(delay));
        self
    }

    pub fn set_download(&self, file_name: &str, bytes: Vec<u8>, delay: Option<Duration>) {
        self.state().download = Some(ScriptedDownload {
            file_name: file_name.to_string(),
            bytes,
            delay,
        });
    }

    pub fn rejecting_logins(self) -> Self {
        self.state().accept_logins = false;
        self
    }

    pub fn issue_valid_token(&self) -> SessionToken {
        let state = self.state();
        SessionToken::new(vec![auth_cookie(&state.valid_session)])
    }

    pub fn expired_token() -> SessionToken {
        SessionToken::new(vec![auth_cookie("session-0")])
    }

    pub fn login_submissions(&self) -> usize {
        self.state().login_submissions
    }

    pub fn visits(&self) -> Vec<String> {
        self.state().visits.clone()
    }

    pub fn submitted_filters(&self) -> Vec<HashMap<String, String>> {
        self.state().submitted_filters.clone()
    }

    pub fn download_dir(&self) -> Option<PathBuf> {
        self.state().download_dir.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, PortalState> {
        self.state.lock().expect("portal state lock should not be poisoned")
    }

    fn navigated(&self) {
        self.navigations.send_modify(|count| *count += 1);
    }
}

impl Default for ScriptedPortal {
    fn default() -> Self {
        Self::new()
    }
}

fn auth_cookie(value: &str) -> SessionCookie {
    SessionCookie {
        name: AUTH_COOKIE.to_string(),
        value: value.to_string(),
        domain: "portal.test".to_string(),
        path: "/".to_string(),
        expires: None,
        http_only: true,
        secure: true,
    }
}

impl PortalState {
    fn authenticated(&self) -> bool {
        self.jar
            .get(AUTH_COOKIE)
            .is_some_and(|cookie| cookie.value == self.valid_session)
    }

    fn at_sign_in(&self) -> bool {
        self.location
            .as_deref()
            .is_some_and(|location| location.starts_with(&ScriptedPortal::sign_in_url()))
    }

    fn show(&mut self, location: String, body: String) {
        self.location = Some(location);
        self.body = body;
        self.typed.clear();
    }
}

#[async_trait]
impl BrowsingContext for ScriptedPortal {
    async fn set_cookies(&self, token: &SessionToken) -> Result<(), BrowserError> {
        self.state().jar.merge(token);
        Ok(())
    }

    async fn cookies(&self) -> Result<SessionToken, BrowserError> {
        Ok(self.state().jar.clone())
    }

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        {
            let mut state = self.state();
            state.visits.push(url.to_string());

            if state.authenticated() {
                let body = state.pages.get(url).cloned().unwrap_or_default();
                state.show(url.to_string(), body);
            } else {
                state.return_to = Some(url.to_string());
                state.show(
                    format!("{}?ReturnUrl=%2F", ScriptedPortal::sign_in_url()),
                    LOGIN_PAGE.to_string(),
                );
            }
        }

        self.navigated();
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        self.state().location.clone().ok_or(BrowserError::NoPage)
    }

    async fn body_text(&self) -> Result<String, BrowserError> {
        let state = self.state();
        match state.location {
            Some(_) => Ok(state.body.clone()),
            None => Err(BrowserError::NoPage),
        }
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        let mut state = self.state();
        if state.location.is_none() {
            return Err(BrowserError::NoPage);
        }
        state.typed.insert(selector.to_string(), text.to_string());
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let pending_download = {
            let mut state = self.state();

            match selector {
                "button[type=submit]" if state.at_sign_in() => {
                    state.login_submissions += 1;
                    let accepted = state.accept_logins
                        && state.typed.get("#Username").map(String::as_str) == Some(USERNAME)
                        && state.typed.get("#Password").map(String::as_str) == Some(PASSWORD);

                    if accepted {
                        let session = state.valid_session.clone();
                        state.jar.upsert(auth_cookie(&session));
                        let home = state.return_to.take().unwrap_or_else(|| portal_url("/"));
                        let body = state.pages.get(&home).cloned().unwrap_or_default();
                        state.show(home, body);
                    } else {
                        let location = state.location.clone().unwrap_or_default();
                        state.show(location, LOGIN_PAGE.to_string());
                    }
                    None
                }
                "button[type=submit]" => {
                    let filter = state.typed.clone();
                    state.submitted_filters.push(filter);
                    None
                }
                "a[href*=SessionHistoryFile]" => {
                    let dir = state
                        .download_dir
                        .clone()
                        .ok_or(BrowserError::DownloadNotConfigured)?;
                    let download = state
                        .download
                        .as_ref()
                        .ok_or_else(|| BrowserError::ElementNotFound(selector.to_string()))?;
                    Some((
                        dir.join(&download.file_name),
                        download.bytes.clone(),
                        download.delay,
                    ))
                }
                other => return Err(BrowserError::ElementNotFound(other.to_string())),
            }
        };

        match pending_download {
            Some((path, bytes, Some(delay))) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    std::fs::write(path, bytes).expect("delayed download should be written");
                });
            }
            Some((path, bytes, None)) => {
                std::fs::write(path, bytes).map_err(BrowserError::Download)?;
            }
            None => {}
        }

        self.navigated();
        Ok(())
    }

    fn navigation(&self) -> NavigationFuture {
        let mut receiver = self.navigations.subscribe();
        Box::pin(async move {
            receiver
                .changed()
                .await
                .map_err(|_| BrowserError::Closed)
        })
    }

    async fn set_download_dir(&self, dir: &Path) -> Result<(), BrowserError> {
        self.state().download_dir = Some(dir.to_path_buf());
        Ok(())
    }
}
