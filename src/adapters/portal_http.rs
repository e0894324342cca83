use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE, LOCATION};
use reqwest::{Client, Method, Response, StatusCode, Url, redirect};
use tokio::sync::watch;

use crate::adapters::browser::{BrowserError, BrowsingContext, NavigationFuture};
use crate::adapters::html_form::{self, FormMethod, Selector};
use crate::domain::session_token::{SessionCookie, SessionToken};

const MAX_REDIRECTS: usize = 10;
const BLANK_URL: &str = "about:blank";

pub struct HttpBrowsingContext {
    client: Client,
    state: Mutex<PageState>,
    navigations: watch::Sender<u64>,
}

#[derive(Default)]
struct PageState {
    cookies: SessionToken,
    page: Option<LoadedPage>,
    typed: Vec<(String, String)>,
    download_dir: Option<PathBuf>,
}

struct LoadedPage {
    url: Url,
    body: String,
    is_html: bool,
}

struct PendingRequest {
    method: Method,
    url: Url,
    form: Option<Vec<(String, String)>>,
}

impl HttpBrowsingContext {
    pub fn new(timeout: Duration) -> Result<Self, BrowserError> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .user_agent(concat!("flo-portal-collector/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let (navigations, _) = watch::channel(0_u64);

        Ok(Self {
            client,
            state: Mutex::new(PageState::default()),
            navigations,
        })
    }

    fn with_state<T>(&self, op: impl FnOnce(&mut PageState) -> T) -> Result<T, BrowserError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| BrowserError::StateLockPoisoned)?;
        Ok(op(&mut state))
    }

    async fn load(&self, request: PendingRequest) -> Result<(), BrowserError> {
        let PendingRequest {
            mut method,
            mut url,
            mut form,
        } = request;

        for _ in 0..=MAX_REDIRECTS {
            let cookie_header = self.with_state(|state| {
                state.cookies.header_for(
                    url.host_str().unwrap_or_default(),
                    url.path(),
                    url.scheme() == "https",
                    Utc::now(),
                )
            })?;

            let mut builder = self.client.request(method.clone(), url.clone());
            if let Some(header) = cookie_header {
                builder = builder.header(COOKIE, header);
            }
            if let Some(fields) = &form {
                builder = builder.form(fields);
            }

            tracing::debug!(method = %method, url = %url, "portal request");
            let response = builder.send().await?;
            self.store_cookies(&url, &response)?;

            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(|| BrowserError::InvalidUrl {
                        url: url.to_string(),
                        reason: "redirect without a Location header".to_string(),
                    })?;
                url = resolve(&url, location)?;
                if status != StatusCode::TEMPORARY_REDIRECT
                    && status != StatusCode::PERMANENT_REDIRECT
                {
                    method = Method::GET;
                    form = None;
                }
                continue;
            }

            if !status.is_success() {
                return Err(BrowserError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            match attachment_name(&response) {
                Some(file_name) => {
                    let bytes = response.bytes().await?;
                    self.save_download(&file_name, &bytes).await?;
                }
                None => {
                    let is_html = is_html(&response);
                    let body = response.text().await?;
                    self.with_state(|state| {
                        state.page = Some(LoadedPage { url, body, is_html });
                        state.typed.clear();
                    })?;
                }
            }

            self.navigations.send_modify(|count| *count += 1);
            return Ok(());
        }

        Err(BrowserError::TooManyRedirects(url.to_string()))
    }

    fn store_cookies(&self, url: &Url, response: &Response) -> Result<(), BrowserError> {
        let now = SystemTime::now();
        let host = url.host_str().unwrap_or_default().to_string();
        let fallback_path = default_cookie_path(url);

        let received: Vec<(SessionCookie, bool)> = response
            .cookies()
            .map(|cookie| {
                let expires_at = cookie
                    .max_age()
                    .map(|max_age| now + max_age)
                    .or_else(|| cookie.expires());
                let expired = cookie.max_age() == Some(Duration::ZERO)
                    || expires_at.is_some_and(|expires_at| expires_at <= now);
                let session_cookie = SessionCookie {
                    name: cookie.name().to_string(),
                    value: cookie.value().to_string(),
                    domain: cookie
                        .domain()
                        .map(|domain| domain.trim_start_matches('.').to_string())
                        .unwrap_or_else(|| host.clone()),
                    path: cookie
                        .path()
                        .filter(|path| path.starts_with('/'))
                        .unwrap_or(fallback_path)
                        .to_string(),
                    expires: expires_at.map(epoch_seconds),
                    http_only: cookie.http_only(),
                    secure: cookie.secure(),
                };
                (session_cookie, expired)
            })
            .collect();

        if received.is_empty() {
            return Ok(());
        }

        self.with_state(|state| {
            for (cookie, expired) in received {
                if expired {
                    state.cookies.remove(&cookie);
                } else {
                    state.cookies.upsert(cookie);
                }
            }
        })
    }

    async fn save_download(&self, file_name: &str, bytes: &[u8]) -> Result<(), BrowserError> {
        let dir = self
            .with_state(|state| state.download_dir.clone())?
            .ok_or(BrowserError::DownloadNotConfigured)?;

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(BrowserError::Download)?;

        let target = dir.join(file_name);
        let partial = dir.join(format!("{file_name}.part"));
        tokio::fs::write(&partial, bytes)
            .await
            .map_err(BrowserError::Download)?;
        tokio::fs::rename(&partial, &target)
            .await
            .map_err(BrowserError::Download)?;

        tracing::info!(path = %target.display(), bytes = bytes.len(), "download saved");
        Ok(())
    }

    fn click_request(&self, selector: &str) -> Result<PendingRequest, BrowserError> {
        let parsed = Selector::parse(selector)?;

        self.with_state(|state| {
            let page = state.page.as_ref().ok_or(BrowserError::NoPage)?;
            let elements = html_form::elements(&page.body);
            let element = html_form::find(&elements, &parsed)
                .ok_or_else(|| BrowserError::ElementNotFound(selector.to_string()))?;

            if element.tag == "a" {
                let href = element
                    .attr("href")
                    .ok_or_else(|| BrowserError::NotClickable(selector.to_string()))?;
                return Ok(PendingRequest {
                    method: Method::GET,
                    url: resolve(&page.url, href)?,
                    form: None,
                });
            }

            if !element.is_submit_control() {
                return Err(BrowserError::NotClickable(selector.to_string()));
            }

            let mut form = html_form::enclosing_form(&page.body, &elements, element)
                .ok_or_else(|| BrowserError::NoEnclosingForm(selector.to_string()))?;
            form.apply(&state.typed);

            let mut action = match form.action.as_deref() {
                Some(action) => resolve(&page.url, action)?,
                None => page.url.clone(),
            };
            action.set_fragment(None);

            Ok(match form.method {
                FormMethod::Get => {
                    action.set_query(None);
                    action.query_pairs_mut().extend_pairs(form.fields.iter());
                    PendingRequest {
                        method: Method::GET,
                        url: action,
                        form: None,
                    }
                }
                FormMethod::Post => PendingRequest {
                    method: Method::POST,
                    url: action,
                    form: Some(form.fields),
                },
            })
        })?
    }
}

#[async_trait]
impl BrowsingContext for HttpBrowsingContext {
    async fn set_cookies(&self, token: &SessionToken) -> Result<(), BrowserError> {
        self.with_state(|state| state.cookies.merge(token))
    }

    async fn cookies(&self) -> Result<SessionToken, BrowserError> {
        self.with_state(|state| state.cookies.clone())
    }

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let url = Url::parse(url).map_err(|error| BrowserError::InvalidUrl {
            url: url.to_string(),
            reason: error.to_string(),
        })?;

        self.load(PendingRequest {
            method: Method::GET,
            url,
            form: None,
        })
        .await
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        self.with_state(|state| {
            state
                .page
                .as_ref()
                .map(|page| page.url.to_string())
                .unwrap_or_else(|| BLANK_URL.to_string())
        })
    }

    async fn body_text(&self) -> Result<String, BrowserError> {
        self.with_state(|state| {
            state.page.as_ref().map(|page| {
                if page.is_html {
                    html_form::inner_text(&page.body)
                } else {
                    page.body.clone()
                }
            })
        })?
        .ok_or(BrowserError::NoPage)
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        let parsed = Selector::parse(selector)?;

        self.with_state(|state| {
            let page = state.page.as_ref().ok_or(BrowserError::NoPage)?;
            let elements = html_form::elements(&page.body);
            let name = html_form::find(&elements, &parsed)
                .and_then(|element| element.field_name())
                .map(str::to_string)
                .ok_or_else(|| BrowserError::ElementNotFound(selector.to_string()))?;

            match state.typed.iter_mut().find(|(field, _)| field == &name) {
                Some(field) => field.1 = text.to_string(),
                None => state.typed.push((name, text.to_string())),
            }
            Ok(())
        })?
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let request = self.click_request(selector)?;
        tracing::debug!(selector, url = %request.url, "click");
        self.load(request).await
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
        let dir = dir.to_path_buf();
        self.with_state(|state| state.download_dir = Some(dir))
    }
}

fn resolve(base: &Url, reference: &str) -> Result<Url, BrowserError> {
    base.join(reference.trim())
        .map_err(|error| BrowserError::InvalidUrl {
            url: reference.to_string(),
            reason: error.to_string(),
        })
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("html"))
}

fn attachment_name(response: &Response) -> Option<String> {
    let disposition = response
        .headers()
        .get(CONTENT_DISPOSITION)?
        .to_str()
        .ok()?;
    if !disposition.to_ascii_lowercase().starts_with("attachment") {
        return None;
    }

    let suggested = disposition
        .split(';')
        .map(str::trim)
        .find_map(|part| {
            let (key, value) = part.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("filename")
                .then(|| value.trim().trim_matches('"').to_string())
        })
        .or_else(|| {
            response
                .url()
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .map(str::to_string)
        })
        .unwrap_or_default();

    let file_name = Path::new(&suggested)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("download")
        .to_string();

    Some(file_name)
}

// Directory of the request path, for cookies sent without a usable Path.
fn default_cookie_path(url: &Url) -> &str {
    match url.path().rfind('/') {
        Some(0) | None => "/",
        Some(index) => &url.path()[..index],
    }
}

fn epoch_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}
