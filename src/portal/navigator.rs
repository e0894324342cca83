use std::fmt;

use thiserror::Error;

use crate::adapters::browser::{BrowserError, BrowsingContext, click_and_wait};
use crate::adapters::session_cache::{SessionCache, SessionCacheError};
use crate::domain::auth_state::{AuthState, is_login_challenge};

const USERNAME_SELECTOR: &str = "#Username";
const PASSWORD_SELECTOR: &str = "#Password";
const SIGN_IN_SUBMIT_SELECTOR: &str = "button[type=submit]";

#[derive(Debug, Error)]
pub enum NavigatorError {
    #[error("browser action failed: {0}")]
    Browser(#[from] BrowserError),
    #[error("failed to persist session token: {0}")]
    Cache(#[from] SessionCacheError),
    #[error("portal rejected the configured credentials (still at {location})")]
    AuthenticationFailed { location: String },
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationOutcome {
    pub location: String,
    pub reauthenticated: bool,
}

pub struct AuthenticatedNavigator<B> {
    browser: B,
    cache: SessionCache,
    credentials: Credentials,
    sign_in_url: String,
}

impl<B> AuthenticatedNavigator<B>
where
    B: BrowsingContext,
{
    pub fn new(
        browser: B,
        cache: SessionCache,
        credentials: Credentials,
        sign_in_url: impl Into<String>,
    ) -> Self {
        Self {
            browser,
            cache,
            credentials,
            sign_in_url: sign_in_url.into(),
        }
    }

    pub fn page(&self) -> &B {
        &self.browser
    }

    pub async fn navigate_to(&self, target: &str) -> Result<NavigationOutcome, NavigatorError> {
        if let Some(token) = self.cache.load() {
            tracing::debug!(cookies = token.len(), "applying cached session token");
            self.browser.set_cookies(&token).await?;
        }

        let mut state = AuthState::Unauthenticated;
        let mut reauthenticated = false;

        loop {
            self.browser.goto(target).await?;
            let location = self.browser.current_url().await?;
            let at_sign_in = is_login_challenge(&location, &self.sign_in_url);

            state = state
                .on_landing(at_sign_in)
                .map_err(|_| NavigatorError::AuthenticationFailed {
                    location: location.clone(),
                })?;

            if state.is_terminal() {
                tracing::debug!(%location, reauthenticated, "navigation settled");
                return Ok(NavigationOutcome {
                    location,
                    reauthenticated,
                });
            }

            tracing::info!(%target, "portal requested sign-in");
            self.sign_in().await?;
            reauthenticated = true;
        }
    }

    async fn sign_in(&self) -> Result<(), NavigatorError> {
        self.browser
            .type_text(USERNAME_SELECTOR, &self.credentials.username)
            .await?;
        self.browser
            .type_text(PASSWORD_SELECTOR, &self.credentials.password)
            .await?;
        click_and_wait(&self.browser, SIGN_IN_SUBMIT_SELECTOR).await?;

        let token = self.browser.cookies().await?;
        self.cache.save(&token)?;

        tracing::info!(
            username = %self.credentials.username,
            cookies = token.len(),
            "signed in to portal"
        );
        Ok(())
    }
}
