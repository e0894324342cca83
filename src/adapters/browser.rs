use std::io;
use std::path::Path;

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::domain::session_token::SessionToken;

pub type NavigationFuture = BoxFuture<'static, Result<(), BrowserError>>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("portal responded with HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("too many redirects while loading {0}")]
    TooManyRedirects(String),
    #[error("no page has been loaded yet")]
    NoPage,
    #[error("unsupported selector: {0}")]
    UnsupportedSelector(String),
    #[error("no element matches selector {0}")]
    ElementNotFound(String),
    #[error("element {0} cannot be clicked")]
    NotClickable(String),
    #[error("element {0} is not inside a form")]
    NoEnclosingForm(String),
    #[error("received a download but no download directory is configured")]
    DownloadNotConfigured,
    #[error("failed to save download: {0}")]
    Download(#[source] io::Error),
    #[error("browsing context state lock poisoned")]
    StateLockPoisoned,
    #[error("browsing context closed")]
    Closed,
}

#[async_trait]
pub trait BrowsingContext: Send + Sync {
    async fn set_cookies(&self, token: &SessionToken) -> Result<(), BrowserError>;

    async fn cookies(&self) -> Result<SessionToken, BrowserError>;

    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    async fn body_text(&self) -> Result<String, BrowserError>;

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError>;

    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    /// Registers interest in the next navigation. The registration happens when this is
    /// called, not when the returned future is first polled.
    fn navigation(&self) -> NavigationFuture;

    async fn set_download_dir(&self, dir: &Path) -> Result<(), BrowserError>;
}

/// Both futures exist before either is awaited, so a fast navigation cannot be missed.
pub async fn click_and_wait<B>(browser: &B, selector: &str) -> Result<(), BrowserError>
where
    B: BrowsingContext + ?Sized,
{
    let navigation = browser.navigation();
    let click = browser.click(selector);
    tokio::try_join!(navigation, click)?;
    Ok(())
}
