//! Turns a recording into the files to download

use std::path::{Path, PathBuf};

use url::Url;

use crate::auth::Credential;
use crate::error::{Error, Result};
use crate::recordings::{Recording, RecordingFile, INCOMPLETE, TIMELINE};

/// Characters that may not appear in a file or folder name
const RESERVED: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// A single file to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub file_id: String,
    pub recording_type: String,
    pub filename: String,
    pub folder: String,
    /// File URL as listed, without a token
    pub download_url: String,
}

impl DownloadTask {
    /// Whether the platform is still processing this file
    pub fn is_incomplete(&self) -> bool {
        self.recording_type == INCOMPLETE
    }

    /// Where the file lands under `root`
    pub fn destination(&self, root: &Path) -> PathBuf {
        root.join(&self.folder).join(&self.filename)
    }

    /// The file URL with `credential` attached as the `access_token` query
    /// pair. An unparsable URL fails this task only.
    pub fn authorized_url(&self, credential: &Credential) -> Result<String> {
        let mut url = Url::parse(&self.download_url)
            .map_err(|e| Error::download(&self.file_id, format!("invalid download url: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("access_token", &credential.access_token);
        Ok(url.into())
    }
}

/// Expands recordings into download tasks
#[derive(Debug, Default, Clone)]
pub struct DownloadPlanner;

impl DownloadPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Plan one task per recording file.
    ///
    /// Fails with [`Error::NoFiles`] when the recording has no files at all.
    /// Files still being processed are planned with the `incomplete`
    /// recording type so the caller can skip them. The token is attached
    /// later, per file, with [`DownloadTask::authorized_url`].
    pub fn plan(&self, recording: &Recording) -> Result<Vec<DownloadTask>> {
        let files = match &recording.recording_files {
            Some(files) if !files.is_empty() => files,
            _ => {
                return Err(Error::NoFiles {
                    meeting_id: recording.id.to_string(),
                })
            }
        };

        Ok(files
            .iter()
            .map(|file| self.plan_file(recording, file))
            .collect())
    }

    fn plan_file(&self, recording: &Recording, file: &RecordingFile) -> DownloadTask {
        let recording_type = if file.file_type.is_empty() {
            INCOMPLETE.to_string()
        } else if file.file_type == TIMELINE {
            file.file_type.clone()
        } else {
            file.recording_type.clone()
        };

        let (filename, folder) = format_names(recording, file, &recording_type);

        DownloadTask {
            file_id: file.id.clone(),
            recording_type,
            filename,
            folder,
            download_url: file.download_url.clone(),
        }
    }
}

/// Build `(filename, folder)` for a file, sanitised after formatting
pub fn format_names(recording: &Recording, file: &RecordingFile, recording_type: &str) -> (String, String) {
    let meeting_time = recording
        .start_time
        .format("%Y.%m.%d - %I.%M %p UTC")
        .to_string();
    let rec_type = title_case(&recording_type.replace('_', " "));

    let filename = format!(
        "{} - {} - {} - {}.{}",
        meeting_time,
        recording.topic,
        rec_type,
        file.id,
        file.file_extension.to_lowercase()
    );
    let folder = format!("{} - {}", recording.topic, meeting_time);

    (sanitize(&filename), sanitize(&folder))
}

/// Strip reserved and control characters, then trailing dots and spaces
pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control() && !RESERVED.contains(c))
        .collect();
    cleaned.trim_end_matches(['.', ' ']).to_string()
}

/// Uppercase the first letter of every word and lowercase the rest
fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut previous_is_letter = false;
    for c in value.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn file(id: &str, file_type: &str, recording_type: &str, ext: &str) -> RecordingFile {
        RecordingFile {
            id: id.into(),
            file_type: file_type.into(),
            file_extension: ext.into(),
            download_url: format!("https://zoom.us/rec/download/{}", id),
            recording_type: recording_type.into(),
        }
    }

    fn recording(topic: &str, files: Option<Vec<RecordingFile>>) -> Recording {
        Recording {
            uuid: "uuid-1==".into(),
            id: 84521,
            topic: topic.into(),
            start_time: Utc.with_ymd_and_hms(2024, 3, 7, 14, 5, 0).unwrap(),
            recording_files: files,
        }
    }

    fn token() -> Credential {
        Credential::new("tok en".into(), 3600)
    }

    #[test]
    fn test_plan_names_and_url() {
        let rec = recording(
            "Weekly Sync",
            Some(vec![file("f1", "MP4", "shared_screen_with_speaker_view", "MP4")]),
        );
        let tasks = DownloadPlanner::new().plan(&rec).unwrap();

        assert_eq!(tasks.len(), 1);
        let task = &tasks[0];
        assert_eq!(
            task.filename,
            "2024.03.07 - 02.05 PM UTC - Weekly Sync - Shared Screen With Speaker View - f1.mp4"
        );
        assert_eq!(task.folder, "Weekly Sync - 2024.03.07 - 02.05 PM UTC");
        assert_eq!(task.download_url, "https://zoom.us/rec/download/f1");
        assert_eq!(
            task.authorized_url(&token()).unwrap(),
            "https://zoom.us/rec/download/f1?access_token=tok+en"
        );
        assert_eq!(
            task.destination(Path::new("/dl")),
            Path::new("/dl")
                .join("Weekly Sync - 2024.03.07 - 02.05 PM UTC")
                .join(&task.filename)
        );
        assert!(!task.is_incomplete());
    }

    #[test]
    fn test_recording_type_derivation() {
        let rec = recording(
            "T",
            Some(vec![
                file("a", "", "audio_only", "M4A"),
                file("b", "TIMELINE", "ignored", "JSON"),
                file("c", "M4A", "audio_only", "M4A"),
            ]),
        );
        let tasks = DownloadPlanner::new().plan(&rec).unwrap();

        assert_eq!(tasks[0].recording_type, "incomplete");
        assert!(tasks[0].is_incomplete());
        assert_eq!(tasks[1].recording_type, "TIMELINE");
        assert!(tasks[1].filename.contains(" - Timeline - b.json"));
        assert_eq!(tasks[2].recording_type, "audio_only");
        assert!(tasks[2].filename.contains(" - Audio Only - c.m4a"));
    }

    #[test]
    fn test_missing_or_empty_files() {
        let planner = DownloadPlanner::new();

        let err = planner.plan(&recording("T", None)).unwrap_err();
        assert!(matches!(err, Error::NoFiles { ref meeting_id } if meeting_id == "84521"));
        assert!(!err.is_fatal());

        assert!(matches!(
            planner.plan(&recording("T", Some(vec![]))),
            Err(Error::NoFiles { .. })
        ));
    }

    #[test]
    fn test_reserved_characters_never_reach_names() {
        let topic = "Q1: <Plan>/\"Review\"\\ | why? *now*\u{0007}\t\n.";
        let rec = recording(topic, Some(vec![file("x", "MP4", "a:b", "MP4")]));
        let task = &DownloadPlanner::new().plan(&rec).unwrap()[0];

        for name in [&task.filename, &task.folder] {
            assert!(!name.chars().any(|c| RESERVED.contains(&c) || c.is_control()), "{}", name);
        }
        assert!(task.folder.starts_with("Q1 PlanReview  why now"));
    }

    #[test]
    fn test_bad_download_url_fails_only_its_task() {
        let mut broken = file("f1", "MP4", "audio_only", "MP4");
        broken.download_url = "not a url".into();
        let rec = recording("T", Some(vec![broken, file("f2", "MP4", "audio_only", "MP4")]));
        let tasks = DownloadPlanner::new().plan(&rec).unwrap();

        assert_eq!(tasks.len(), 2);
        let err = tasks[0].authorized_url(&token()).unwrap_err();
        assert!(matches!(err, Error::Download { ref target, .. } if target == "f1"));
        assert!(!err.is_fatal());
        assert!(tasks[1].authorized_url(&token()).is_ok());
    }

    #[test]
    fn test_authorized_url_uses_the_given_token() {
        let rec = recording("T", Some(vec![file("f1", "MP4", "audio_only", "MP4")]));
        let task = &DownloadPlanner::new().plan(&rec).unwrap()[0];

        let first = task.authorized_url(&Credential::new("one".into(), 3600)).unwrap();
        let second = task.authorized_url(&Credential::new("two".into(), 3600)).unwrap();
        assert!(first.ends_with("access_token=one"));
        assert!(second.ends_with("access_token=two"));
    }

    #[test]
    fn test_sanitize_trims_trailing_dots_and_spaces() {
        assert_eq!(sanitize("name. . "), "name");
        assert_eq!(sanitize("a|b"), "ab");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("shared screen"), "Shared Screen");
        assert_eq!(title_case("TIMELINE"), "Timeline");
        assert_eq!(title_case("chat file"), "Chat File");
    }
}
