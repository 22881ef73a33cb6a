//! Zoom cloud recording downloader
//!
//! Authenticates with server-to-server OAuth, walks every user of the account,
//! lists their cloud recordings in 30-day windows and downloads each recording
//! file. Meetings whose files all arrived are written to an append-only
//! completion log so that later runs skip them.
//!
//! ```no_run
//! use std::sync::Arc;
//! use zoom_recording_downloader::prelude::*;
//!
//! # async fn example() -> Result<(), Error> {
//! let config = Config::from_file("zoom-recording-downloader.conf")?;
//! let summary = zoom_recording_downloader::run(
//!     config,
//!     ClientOptions::default(),
//!     Arc::new(StdoutReporter),
//! )
//! .await?;
//! println!("saved to {}", summary.save_location.display());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod command;
pub mod config;
pub mod error;
pub mod fetch;
pub mod fetcher;
pub mod ledger;
pub mod orchestrator;
pub mod planner;
pub mod recordings;
pub mod report;
pub mod users;

use std::sync::Arc;

use crate::config::{ClientOptions, Config};
use crate::error::Result;
use crate::orchestrator::{Orchestrator, RunSummary};
use crate::report::{Reporter, StdoutReporter};

/// Run the whole download once, reporting through `reporter`
pub async fn run(
    config: Config,
    options: ClientOptions,
    reporter: Arc<dyn Reporter>,
) -> Result<RunSummary> {
    Orchestrator::new(config, options, reporter)?.run().await
}

/// Run the whole download on a single-threaded runtime, reporting to stdout
pub fn run_blocking(config: Config, options: ClientOptions) -> Result<RunSummary> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config, options, Arc::new(StdoutReporter)))
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::{ClientOptions, Config, OAuthConfig};
    pub use crate::error::Error;
    pub use crate::orchestrator::{MeetingOutcome, Orchestrator, RunSummary};
    pub use crate::report::{MemoryReporter, Reporter, StdoutReporter};
}
