//! Configuration for the recording downloader
//!
//! Two layers: [`Config`] is the operator's document (OAuth identifiers,
//! storage locations, date range) and [`ClientOptions`] holds the tunables of
//! the HTTP side, with defaults matching the Zoom API.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Default location of the configuration document
pub const DEFAULT_CONFIG_PATH: &str = "zoom-recording-downloader.conf";

/// Configuration options for the API clients
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL of the REST API, without trailing slash
    pub api_base_url: String,

    /// Base URL of the OAuth provider
    pub oauth_base_url: String,

    /// Page size for user and recording listings
    pub page_size: u32,

    /// Width of a recording query window in days
    pub window_days: i64,

    /// Size of the blocks a download is written and reported in
    pub chunk_size: usize,

    /// Timeout for establishing a connection
    pub connect_timeout: Option<Duration>,

    /// Timeout for a whole API request (not applied to file downloads)
    pub request_timeout: Option<Duration>,

    /// Timeout for each read while streaming a download
    pub read_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.zoom.us/v2".to_string(),
            oauth_base_url: "https://zoom.us".to_string(),
            page_size: 300,
            window_days: 30,
            chunk_size: 32 * 1024,
            connect_timeout: Some(Duration::from_secs(30)),
            request_timeout: Some(Duration::from_secs(30)),
            read_timeout: Duration::from_secs(60),
        }
    }
}

impl ClientOptions {
    /// Set the API base URL
    pub fn with_api_base_url(mut self, value: &str) -> Self {
        self.api_base_url = value.trim_end_matches('/').to_string();
        self
    }

    /// Set the OAuth base URL
    pub fn with_oauth_base_url(mut self, value: &str) -> Self {
        self.oauth_base_url = value.trim_end_matches('/').to_string();
        self
    }

    /// Set the listing page size
    pub fn with_page_size(mut self, value: u32) -> Self {
        self.page_size = value;
        self
    }

    /// Set the recording window width in days
    pub fn with_window_days(mut self, value: i64) -> Self {
        self.window_days = value;
        self
    }

    /// Set the download block size
    pub fn with_chunk_size(mut self, value: usize) -> Self {
        self.chunk_size = value.max(1);
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, value: Option<Duration>) -> Self {
        self.connect_timeout = value;
        self
    }

    /// Set the API request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the per-read download timeout
    pub fn with_read_timeout(mut self, value: Duration) -> Self {
        self.read_timeout = value;
        self
    }

    /// Build the shared HTTP client
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("zoom-recording-downloader/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

/// Server-to-server OAuth identifiers
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub account_id: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Default, Deserialize)]
struct StorageSection {
    download_dir: Option<PathBuf>,
    completed_log: Option<PathBuf>,
    token_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RecordingsSection {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    #[serde(rename = "OAuth")]
    oauth: OAuthConfig,
    #[serde(rename = "Storage", default)]
    storage: StorageSection,
    #[serde(rename = "Recordings", default)]
    recordings: RecordingsSection,
}

/// Everything a run needs to know
#[derive(Debug, Clone)]
pub struct Config {
    pub oauth: OAuthConfig,
    /// Root under which per-meeting folders are created
    pub download_dir: PathBuf,
    /// Append-only log of completed meeting UUIDs
    pub completed_log: PathBuf,
    /// Persisted access token
    pub token_file: PathBuf,
    /// First day of the recording query, inclusive
    pub start_date: NaiveDate,
    /// End of the recording query
    pub end_date: NaiveDate,
}

impl Config {
    /// Create a configuration with default storage paths and date range
    pub fn new(oauth: OAuthConfig) -> Self {
        let today = Local::now().date_naive();
        Self {
            oauth,
            download_dir: PathBuf::from("downloads"),
            completed_log: PathBuf::from("completed-downloads.log"),
            token_file: PathBuf::from("access_token.json"),
            start_date: start_of_year(today),
            end_date: today,
        }
    }

    /// Load the configuration document from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    /// Parse the configuration document, tolerating a UTF-8 byte order mark
    pub fn from_json(raw: &str) -> Result<Self> {
        let doc: ConfigDocument = serde_json::from_str(raw.trim_start_matches('\u{feff}'))?;

        for (name, value) in [
            ("account_id", &doc.oauth.account_id),
            ("client_id", &doc.oauth.client_id),
            ("client_secret", &doc.oauth.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(Error::config(format!("OAuth.{} must not be empty", name)));
            }
        }

        let mut config = Self::new(doc.oauth);
        if let Some(dir) = doc.storage.download_dir {
            config.download_dir = dir;
        }
        if let Some(log) = doc.storage.completed_log {
            config.completed_log = log;
        }
        if let Some(token) = doc.storage.token_file {
            config.token_file = token;
        }
        if let Some(end) = doc.recordings.end_date {
            config.end_date = end;
        }
        config.start_date = doc
            .recordings
            .start_date
            .unwrap_or_else(|| start_of_year(config.end_date));

        Ok(config)
    }

    /// Set the download directory
    pub fn with_download_dir<P: Into<PathBuf>>(mut self, value: P) -> Self {
        self.download_dir = value.into();
        self
    }

    /// Set the completion log path
    pub fn with_completed_log<P: Into<PathBuf>>(mut self, value: P) -> Self {
        self.completed_log = value.into();
        self
    }

    /// Set the token store path
    pub fn with_token_file<P: Into<PathBuf>>(mut self, value: P) -> Self {
        self.token_file = value.into();
        self
    }

    /// Set the recording date range
    pub fn with_date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }
}

fn start_of_year(day: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(day.year(), 1, 1).unwrap_or(day)
}
