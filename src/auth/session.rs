//! Access token and its on-disk store

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Lifetime assumed when the provider does not report one
pub const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Longest lifetime accepted from the provider, one year
pub const MAX_EXPIRES_IN: i64 = 365 * 24 * 3600;

/// A bearer token and the instant it stops being valid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// The access token
    pub access_token: String,

    /// The expiry timestamp
    #[serde(rename = "expiry_time")]
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential that expires `expires_in` seconds from now.
    /// The lifetime is clamped to `0..=MAX_EXPIRES_IN`.
    pub fn new(access_token: String, expires_in: i64) -> Self {
        let lifetime = Duration::seconds(expires_in.clamp(0, MAX_EXPIRES_IN));
        Self {
            access_token,
            expires_at: Utc::now() + lifetime,
        }
    }

    /// Check if the credential has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check if the credential is expired at the given instant
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Token exchange response
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// JSON file holding the last credential, overwritten on every refresh
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored credential. A missing or unreadable file yields `None`.
    pub fn load(&self) -> Option<Credential> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cannot read token file {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!("Ignoring malformed token file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Replace the stored credential
    pub fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(credential)?)?;
        Ok(())
    }
}
