use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthStateError {
    #[error("sign-in page returned again after submitting credentials")]
    ChallengeAfterSignIn,
}

impl AuthState {
    /// `at_sign_in` is the only session-validity signal the portal gives.
    pub fn on_landing(self, at_sign_in: bool) -> Result<AuthState, AuthStateError> {
        match (self, at_sign_in) {
            (AuthState::Unauthenticated, true) => Ok(AuthState::Authenticating),
            (AuthState::Unauthenticated, false) => Ok(AuthState::Authenticated),
            (AuthState::Authenticating, true) => Err(AuthStateError::ChallengeAfterSignIn),
            (AuthState::Authenticating, false) => Ok(AuthState::Authenticated),
            (AuthState::Authenticated, _) => Ok(AuthState::Authenticated),
        }
    }

    pub fn is_terminal(self) -> bool {
        self == AuthState::Authenticated
    }
}

pub fn is_login_challenge(location: &str, sign_in_url: &str) -> bool {
    !sign_in_url.is_empty() && location.starts_with(sign_in_url)
}
