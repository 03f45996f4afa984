// reddit-transfer/src/auth/credentials.rs
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::oauth::TokenGrant;
use crate::config::AppCredentials;

/// Credentials cached for one account. The account password is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub username: String,
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scope: String,
}

impl StoredCredentials {
    pub fn from_grant(
        username: &str,
        app: &AppCredentials,
        grant: TokenGrant,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            username: username.to_string(),
            client_id: app.client_id.clone(),
            client_secret: app.client_secret.clone(),
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: now + Duration::seconds(grant.expires_in),
            scope: grant.scope,
        }
    }

    pub fn app(&self) -> AppCredentials {
        AppCredentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        }
    }

    /// True when the token expires within `margin` of `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at <= now + margin
    }

    /// Applies a refresh grant. Reddit may omit the refresh token on refresh.
    pub fn refreshed(mut self, grant: TokenGrant, now: DateTime<Utc>) -> Self {
        self.access_token = grant.access_token;
        if grant.refresh_token.is_some() {
            self.refresh_token = grant.refresh_token;
        }
        self.expires_at = now + Duration::seconds(grant.expires_in);
        if !grant.scope.is_empty() {
            self.scope = grant.scope;
        }
        self
    }
}

/// JSON file of cached credentials keyed by lowercased username.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

type CredentialFile = BTreeMap<String, StoredCredentials>;

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn key(username: &str) -> String {
        username.trim().to_lowercase()
    }

    fn load_all(&self) -> Result<CredentialFile> {
        if !self.path.exists() {
            return Ok(CredentialFile::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read credential cache at {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(CredentialFile::new());
        }
        serde_json::from_str(&content).with_context(|| {
            format!(
                "Failed to parse credential cache at {}",
                self.path.display()
            )
        })
    }

    pub fn load(&self, username: &str) -> Result<Option<StoredCredentials>> {
        Ok(self.load_all()?.remove(&Self::key(username)))
    }

    pub fn save(&self, credentials: &StoredCredentials) -> Result<()> {
        let mut all = self.load_all()?;
        all.insert(Self::key(&credentials.username), credentials.clone());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory {}", parent.display())
                })?;
            }
        }
        let content = serde_json::to_string_pretty(&all)?;
        let mut file = open_private(&self.path)
            .with_context(|| format!("Failed to open credential cache at {}", self.path.display()))?;
        file.write_all(content.as_bytes())
            .and_then(|()| file.sync_all())
            .with_context(|| format!("Failed to write credential cache at {}", self.path.display()))?;
        Ok(())
    }
}

/// Opens the cache for writing, owner-only before any byte is written.
#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation; an older cache may be wider.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
    File::create(path)
}
