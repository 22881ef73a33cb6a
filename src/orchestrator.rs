//! Drives a full run: users, then recordings, then files

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info, warn};

use crate::auth::{CredentialStore, TokenManager};
use crate::config::{ClientOptions, Config};
use crate::error::{Error, Result};
use crate::fetcher::FileFetcher;
use crate::ledger::CompletionLedger;
use crate::planner::DownloadPlanner;
use crate::recordings::{Recording, RecordingLister};
use crate::report::Reporter;
use crate::users::{User, UserEnumerator};

/// Where a meeting ended up after processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingOutcome {
    /// Already in the completion ledger
    Skipped,
    /// The recording carried no files
    NoFiles,
    /// Every file downloaded, meeting added to the ledger
    Recorded,
    /// At least one file was incomplete or failed; retried on the next run
    NotRecorded,
}

/// Counters of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub users: usize,
    /// Users whose recordings could not be listed
    pub users_failed: usize,
    pub recordings: usize,
    pub skipped: usize,
    pub no_files: usize,
    pub recorded: usize,
    pub not_recorded: usize,
    pub files_downloaded: usize,
    pub files_failed: usize,
    /// Absolute download directory
    pub save_location: PathBuf,
}

impl RunSummary {
    fn record(&mut self, outcome: MeetingOutcome) {
        match outcome {
            MeetingOutcome::Skipped => self.skipped += 1,
            MeetingOutcome::NoFiles => self.no_files += 1,
            MeetingOutcome::Recorded => self.recorded += 1,
            MeetingOutcome::NotRecorded => self.not_recorded += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} user(s), {} recording(s): {} downloaded, {} skipped, {} without files, {} incomplete or failed ({} file(s) saved, {} failed)",
            self.users,
            self.recordings,
            self.recorded,
            self.skipped,
            self.no_files,
            self.not_recorded,
            self.files_downloaded,
            self.files_failed
        )
    }
}

/// Owns every component of a run and walks users, recordings and files in turn
pub struct Orchestrator {
    config: Config,
    tokens: TokenManager,
    users: UserEnumerator,
    lister: RecordingLister,
    planner: DownloadPlanner,
    fetcher: FileFetcher,
    ledger: CompletionLedger,
    reporter: Arc<dyn Reporter>,
}

impl Orchestrator {
    /// Build the components and load the completion ledger
    pub fn new(config: Config, options: ClientOptions, reporter: Arc<dyn Reporter>) -> Result<Self> {
        let http_client = options.http_client()?;
        let ledger = CompletionLedger::load(&config.completed_log)?;
        let tokens = TokenManager::new(
            http_client.clone(),
            config.oauth.clone(),
            CredentialStore::new(&config.token_file),
            &options,
        );

        Ok(Self {
            users: UserEnumerator::new(http_client.clone(), &options),
            lister: RecordingLister::new(http_client.clone(), &options),
            planner: DownloadPlanner::new(),
            fetcher: FileFetcher::new(http_client, &options, reporter.clone()),
            config,
            tokens,
            ledger,
            reporter,
        })
    }

    /// Run to completion. Only fatal errors are returned; everything else is
    /// reported and counted in the summary.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary {
            save_location: self.save_location()?,
            ..RunSummary::default()
        };

        self.reporter.status("Getting user accounts...");
        let credential = self.tokens.get_credential().await?;
        let users = self.users.list_users(&credential).await?;
        summary.users = users.len();

        for user in &users {
            self.process_user(user, &mut summary).await?;
        }

        info!("Run finished: {}", summary);
        self.reporter.status("*** All done! ***");
        self.reporter.status(&summary.to_string());
        self.reporter.status(&format!(
            "Recordings have been saved to: {}",
            summary.save_location.display()
        ));
        Ok(summary)
    }

    async fn process_user(&mut self, user: &User, summary: &mut RunSummary) -> Result<()> {
        self.reporter
            .status(&format!("Getting recording list for {}", user.display_name()));

        let credential = self.tokens.get_credential().await?;
        let recordings = match self
            .lister
            .list_recordings(&credential, &user.id, self.config.start_date, self.config.end_date)
            .await
        {
            Ok(recordings) => recordings,
            Err(e @ Error::Auth(_)) => return Err(e),
            Err(e) => {
                error!("Listing recordings for {} failed: {}", user.id, e);
                self.reporter.error(&format!(
                    "Could not retrieve recordings for {}: {}",
                    user.email, e
                ));
                summary.users_failed += 1;
                return Ok(());
            }
        };

        let total = recordings.len();
        self.reporter.status(&format!("==> Found {} recordings", total));
        summary.recordings += total;

        for (index, recording) in recordings.iter().enumerate() {
            let outcome = self
                .process_recording(recording, index, total, summary)
                .await?;
            summary.record(outcome);
        }
        Ok(())
    }

    /// Process one meeting. Returns an error only when the run must stop.
    pub async fn process_recording(
        &mut self,
        recording: &Recording,
        index: usize,
        total: usize,
        summary: &mut RunSummary,
    ) -> Result<MeetingOutcome> {
        let meeting_id = recording.uuid.as_str();
        if self.ledger.contains(meeting_id) {
            self.reporter
                .status(&format!("==> Skipping already downloaded meeting: {}", meeting_id));
            return Ok(MeetingOutcome::Skipped);
        }

        let tasks = match self.planner.plan(recording) {
            Ok(tasks) => tasks,
            Err(e @ Error::NoFiles { .. }) => {
                warn!("{}", e);
                self.reporter.error(&e.to_string());
                return Ok(MeetingOutcome::NoFiles);
            }
            Err(e) if !e.is_fatal() => {
                warn!("Cannot plan meeting {}: {}", meeting_id, e);
                self.reporter.error(&e.to_string());
                return Ok(MeetingOutcome::NotRecorded);
            }
            Err(e) => return Err(e),
        };

        let mut all_succeeded = true;
        for task in &tasks {
            if task.is_incomplete() {
                let e = Error::IncompleteRecording {
                    file_id: task.file_id.clone(),
                };
                warn!("{} in meeting {}", e, meeting_id);
                self.reporter
                    .error(&format!("{} ({} of {})", e, index + 1, total));
                all_succeeded = false;
                continue;
            }

            self.reporter.status(&format!(
                "==> Downloading ({} of {}) as {}: {}",
                index + 1,
                total,
                task.recording_type,
                task.file_id
            ));
            // the token may expire while earlier files download
            let credential = self.tokens.get_credential().await?;
            let url = match task.authorized_url(&credential) {
                Ok(url) => url,
                Err(e) => {
                    warn!("{} in meeting {}", e, meeting_id);
                    self.reporter.error(&e.to_string());
                    summary.files_failed += 1;
                    all_succeeded = false;
                    continue;
                }
            };
            let destination = task.destination(&self.config.download_dir);
            if self.fetcher.fetch(&url, &destination).await {
                summary.files_downloaded += 1;
            } else {
                summary.files_failed += 1;
                all_succeeded = false;
            }
        }

        if !all_succeeded {
            info!("Meeting {} not recorded, it will be retried", meeting_id);
            return Ok(MeetingOutcome::NotRecorded);
        }

        match self.ledger.append(meeting_id) {
            Ok(()) => Ok(MeetingOutcome::Recorded),
            Err(e) => {
                error!("Could not append {} to {}: {}", meeting_id, self.ledger.path().display(), e);
                self.reporter.error(&format!(
                    "Could not record meeting {} as complete: {}",
                    meeting_id, e
                ));
                Ok(MeetingOutcome::NotRecorded)
            }
        }
    }

    pub fn ledger(&self) -> &CompletionLedger {
        &self.ledger
    }

    fn save_location(&self) -> Result<PathBuf> {
        let dir = &self.config.download_dir;
        if dir.is_absolute() {
            Ok(dir.clone())
        } else {
            Ok(std::env::current_dir()?.join(dir))
        }
    }
}
