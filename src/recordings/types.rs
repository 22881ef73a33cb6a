//! Recording records as returned by the API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel recording type for files the platform has not finished processing
pub const INCOMPLETE: &str = "incomplete";

/// File type whose recording type is taken from the file type itself
pub const TIMELINE: &str = "TIMELINE";

/// A recorded meeting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    /// Meeting UUID, the dedup key of the completion ledger
    pub uuid: String,

    /// Numeric meeting id
    #[serde(default)]
    pub id: u64,

    #[serde(default)]
    pub topic: String,

    pub start_time: DateTime<Utc>,

    /// Absent when the platform reports no files for the meeting
    #[serde(default)]
    pub recording_files: Option<Vec<RecordingFile>>,
}

/// One media or artifact file of a recording
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingFile {
    #[serde(default)]
    pub id: String,

    /// Empty while the file is still being processed
    #[serde(default)]
    pub file_type: String,

    #[serde(default)]
    pub file_extension: String,

    /// Time-limited URL, usable only together with an access token
    #[serde(default)]
    pub download_url: String,

    #[serde(default)]
    pub recording_type: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecordingPage {
    #[serde(default)]
    pub meetings: Vec<Recording>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}
