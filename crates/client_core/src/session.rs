//! Session context: where the bearer token comes from.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ClientError;

/// Source of the bearer token attached to every backend request.
pub trait AuthTokenProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

pub struct NoToken;

impl AuthTokenProvider for NoToken {
    fn access_token(&self) -> Option<String> {
        None
    }
}

pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl AuthTokenProvider for StaticToken {
    fn access_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
}

/// Token persisted between runs in a small TOML file.
pub struct SessionStore {
    path: PathBuf,
    current: RwLock<Option<StoredSession>>,
}

impl SessionStore {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("ngo-admin")
            .join("session.toml")
    }

    /// Opens the store, reading an existing session file if there is one.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let current = match fs::read_to_string(&path) {
            Ok(raw) => {
                let session: StoredSession = toml::from_str(&raw)
                    .with_context(|| format!("failed to parse session file '{}'", path.display()))?;
                debug!(path = %path.display(), "loaded stored session");
                Some(session).filter(|s| !s.access_token.trim().is_empty())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read session file '{}'", path.display()))
            }
        };
        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session(&self) -> Option<StoredSession> {
        self.current.read().ok().and_then(|guard| guard.clone())
    }

    pub fn save(&self, session: StoredSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create session directory '{}'", parent.display())
            })?;
        }
        let raw = toml::to_string(&session).context("failed to encode session")?;
        fs::write(&self.path, raw)
            .with_context(|| format!("failed to write session file '{}'", self.path.display()))?;
        if let Ok(mut guard) = self.current.write() {
            *guard = Some(session);
        }
        info!(path = %self.path.display(), "session stored");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if let Ok(mut guard) = self.current.write() {
            *guard = None;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to remove session file '{}'", self.path.display())),
        }
    }
}

impl AuthTokenProvider for SessionStore {
    fn access_token(&self) -> Option<String> {
        self.session().map(|session| session.access_token)
    }
}

/// Route guard: screens behind it refuse to run without a token.
pub struct SessionGuard;

impl SessionGuard {
    pub fn require(provider: &dyn AuthTokenProvider) -> Result<String, ClientError> {
        provider
            .access_token()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ClientError::Unauthorized("not signed in; run `login` first".into()))
    }
}
