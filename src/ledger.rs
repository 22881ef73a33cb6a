//! Append-only log of fully downloaded meetings

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::Result;

/// Meeting UUIDs that never need to be processed again
#[derive(Debug)]
pub struct CompletionLedger {
    path: PathBuf,
    completed: HashSet<String>,
    writer: Option<File>,
}

impl CompletionLedger {
    /// Read the ledger at `path`. A missing file is an empty ledger; the file
    /// is created on the first append.
    pub fn load<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let mut completed = HashSet::new();

        match File::open(&path) {
            Ok(file) => {
                for line in BufReader::new(file).lines() {
                    let line = line?;
                    let id = line.trim();
                    if !id.is_empty() {
                        completed.insert(id.to_string());
                    }
                }
                info!(
                    "Loaded {} completed meeting(s) from {}",
                    completed.len(),
                    path.display()
                );
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Log file not found, it will be created: {}", path.display());
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            path,
            completed,
            writer: None,
        })
    }

    pub fn contains(&self, meeting_id: &str) -> bool {
        self.completed.contains(meeting_id)
    }

    /// Record a meeting as complete. The line is flushed and synced before
    /// this returns.
    pub fn append(&mut self, meeting_id: &str) -> Result<()> {
        if self.contains(meeting_id) {
            return Ok(());
        }

        let file = match self.writer.take() {
            Some(file) => file,
            None => {
                if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                let mut file = OpenOptions::new()
                    .read(true)
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
                if missing_final_newline(&mut file)? {
                    file.write_all(b"\n")?;
                }
                file
            }
        };
        let writer = self.writer.insert(file);

        writer.write_all(format!("{}\n", meeting_id).as_bytes())?;
        writer.flush()?;
        writer.sync_data()?;

        debug!("Recorded {} as complete", meeting_id);
        self.completed.insert(meeting_id.to_string());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether a non-empty file ends without a line terminator
fn missing_final_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_and_created_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("completed-downloads.log");

        let mut ledger = CompletionLedger::load(&path).unwrap();
        assert!(ledger.is_empty());
        assert!(!path.exists());

        ledger.append("abc==").unwrap();
        assert!(ledger.contains("abc=="));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "abc==\n");
    }

    #[test]
    fn test_reload_restores_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("completed-downloads.log");
        std::fs::write(&path, "first==\n\n  second/x==  \r\n").unwrap();

        let mut ledger = CompletionLedger::load(&path).unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.contains("first=="));
        assert!(ledger.contains("second/x=="));

        ledger.append("third==").unwrap();
        ledger.append("first==").unwrap();
        drop(ledger);

        let reloaded = CompletionLedger::load(&path).unwrap();
        assert_eq!(reloaded.len(), 3);
        assert!(reloaded.contains("third=="));
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.matches("first==").count(), 1);
        assert!(raw.ends_with("third==\n"));
    }

    #[test]
    fn test_append_after_unterminated_last_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("completed-downloads.log");
        std::fs::write(&path, "old==").unwrap();

        let mut ledger = CompletionLedger::load(&path).unwrap();
        ledger.append("new==").unwrap();
        ledger.append("newer==").unwrap();
        drop(ledger);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old==\nnew==\nnewer==\n");
        let reloaded = CompletionLedger::load(&path).unwrap();
        assert!(reloaded.contains("old=="));
        assert!(reloaded.contains("new=="));
        assert_eq!(reloaded.len(), 3);
    }
}
