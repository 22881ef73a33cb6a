//! Status and progress lines for a supervising process

use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Duration;

/// Transfer progress after one block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Percent of the announced length, `None` when no length was announced
    pub percent: Option<f64>,
    /// Average throughput since the transfer started
    pub kib_per_sec: f64,
}

impl Progress {
    pub fn new(downloaded: u64, total: Option<u64>, elapsed: Duration) -> Self {
        let percent = total
            .filter(|total| *total > 0)
            .map(|total| downloaded as f64 / total as f64 * 100.0);
        let secs = elapsed.as_secs_f64();
        let kib_per_sec = if secs > 0.0 {
            downloaded as f64 / 1024.0 / secs
        } else {
            0.0
        };
        Self { percent, kib_per_sec }
    }
}

impl fmt::Display for Progress {
    /// `progress:<percent>%,<throughput>KiB/s`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.percent {
            Some(percent) => write!(f, "progress:{:.2}%,{:.2}KiB/s", percent, self.kib_per_sec),
            None => write!(f, "progress:?%,{:.2}KiB/s", self.kib_per_sec),
        }
    }
}

/// Receives the user-visible output of a run
pub trait Reporter: Send + Sync {
    /// A plain status line
    fn status(&self, line: &str);

    /// Progress of the current transfer
    fn progress(&self, progress: &Progress);

    /// A diagnostic for a failure
    fn error(&self, line: &str);
}

/// Writes everything to standard output, one line each
#[derive(Debug, Default)]
pub struct StdoutReporter;

impl StdoutReporter {
    fn write_line(&self, line: &str) {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        // the supervisor reads line by line, so flush every line
        let _ = writeln!(out, "{}", line);
        let _ = out.flush();
    }
}

impl Reporter for StdoutReporter {
    fn status(&self, line: &str) {
        self.write_line(line);
    }

    fn progress(&self, progress: &Progress) {
        self.write_line(&progress.to_string());
    }

    fn error(&self, line: &str) {
        self.write_line(&format!("### {}", line));
    }
}

/// Keeps every line in memory
#[derive(Debug, Default)]
pub struct MemoryReporter {
    lines: Mutex<Vec<String>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines written so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn push(&self, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

impl Reporter for MemoryReporter {
    fn status(&self, line: &str) {
        self.push(line.to_string());
    }

    fn progress(&self, progress: &Progress) {
        self.push(progress.to_string());
    }

    fn error(&self, line: &str) {
        self.push(format!("### {}", line));
    }
}
