use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Seconds since the unix epoch; absent or negative for session cookies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

fn default_path() -> String {
    "/".to_string()
}

impl SessionCookie {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires {
            Some(expires) if expires >= 0.0 => expires <= now.timestamp() as f64,
            _ => false,
        }
    }

    pub fn applies_to(&self, host: &str, path: &str, secure_scheme: bool) -> bool {
        if self.secure && !secure_scheme {
            return false;
        }

        let domain = self.domain.trim_start_matches('.').to_ascii_lowercase();
        let host = host.to_ascii_lowercase();
        let domain_matches = host == domain || host.ends_with(&format!(".{domain}"));

        domain_matches && path_matches(&self.path, path)
    }

    fn same_slot(&self, other: &SessionCookie) -> bool {
        self.name == other.name
            && self.path == other.path
            && self.domain.trim_start_matches('.') == other.domain.trim_start_matches('.')
    }
}

fn path_matches(cookie_path: &str, request_path: &str) -> bool {
    if cookie_path.is_empty() || cookie_path == "/" || cookie_path == request_path {
        return true;
    }

    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/')
            || request_path[cookie_path.len()..].starts_with('/'))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken {
    cookies: Vec<SessionCookie>,
}

impl SessionToken {
    pub fn new(cookies: Vec<SessionCookie>) -> Self {
        let mut token = Self::default();
        for cookie in cookies {
            token.upsert(cookie);
        }
        token
    }

    pub fn cookies(&self) -> &[SessionCookie] {
        &self.cookies
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&SessionCookie> {
        self.cookies.iter().find(|cookie| cookie.name == name)
    }

    pub fn upsert(&mut self, cookie: SessionCookie) {
        match self.cookies.iter_mut().find(|existing| existing.same_slot(&cookie)) {
            Some(existing) => *existing = cookie,
            None => self.cookies.push(cookie),
        }
    }

    pub fn remove(&mut self, cookie: &SessionCookie) {
        self.cookies.retain(|existing| !existing.same_slot(cookie));
    }

    pub fn merge(&mut self, other: &SessionToken) {
        for cookie in &other.cookies {
            self.upsert(cookie.clone());
        }
    }

    pub fn header_for(
        &self,
        host: &str,
        path: &str,
        secure_scheme: bool,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|cookie| {
                !cookie.is_expired_at(now) && cookie.applies_to(host, path, secure_scheme)
            })
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }
}
