use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::session_token::SessionToken;

#[derive(Debug, Error)]
pub enum SessionCacheError {
    #[error("failed to serialize session token: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write session cache {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct SessionCache {
    path: PathBuf,
}

impl SessionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Option<SessionToken> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no cached session token");
                return None;
            }
            Err(error) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %error,
                    "failed to read cached session token"
                );
                return None;
            }
        };

        match serde_json::from_str::<SessionToken>(&content) {
            Ok(token) if token.is_empty() => None,
            Ok(token) => Some(token),
            Err(error) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %error,
                    "ignoring corrupt session cache"
                );
                None
            }
        }
    }

    pub fn save(&self, token: &SessionToken) -> Result<(), SessionCacheError> {
        let serialized = serde_json::to_string(token)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| SessionCacheError::Write {
                path: self.path.clone(),
                source,
            })?;
        }

        fs::write(&self.path, serialized).map_err(|source| SessionCacheError::Write {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!(
            path = %self.path.display(),
            cookies = token.len(),
            "session token cached"
        );

        Ok(())
    }
}
