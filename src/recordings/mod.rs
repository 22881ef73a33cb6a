//! Cloud recording listing across date windows

mod types;

use std::time::Duration;

use chrono::{Duration as Span, NaiveDate};
use log::{debug, info};
use reqwest::Client;
use url::Url;

use crate::auth::Credential;
use crate::config::ClientOptions;
use crate::error::{Error, Result};
use crate::fetch::Fetch;

pub use types::*;

/// Split `[start, end)` into consecutive windows of `width`.
///
/// Windows are contiguous and non-overlapping, the last one ends exactly at
/// `end`, and nothing is produced when `start >= end`. A non-positive width
/// yields the whole range as one window.
pub fn window_split(start: NaiveDate, end: NaiveDate, width: Span) -> Vec<(NaiveDate, NaiveDate)> {
    if start >= end {
        return Vec::new();
    }
    if width <= Span::zero() {
        return vec![(start, end)];
    }

    let mut windows = Vec::new();
    let mut current = start;
    while current < end {
        let next = current.checked_add_signed(width).map_or(end, |n| n.min(end));
        windows.push((current, next));
        current = next;
    }
    windows
}

/// Lists a user's recordings, one query window at a time
pub struct RecordingLister {
    base_url: String,
    http_client: Client,
    page_size: u32,
    window: Span,
    request_timeout: Option<Duration>,
}

impl RecordingLister {
    pub fn new(http_client: Client, options: &ClientOptions) -> Self {
        Self {
            base_url: options.api_base_url.clone(),
            http_client,
            page_size: options.page_size,
            window: Span::try_days(options.window_days).unwrap_or_else(Span::max_value),
            request_timeout: options.request_timeout,
        }
    }

    /// List every recording of `user_id` between `start` and `end`.
    ///
    /// Each window is paginated through `next_page_token`; results are
    /// concatenated as returned, without dedup.
    pub async fn list_recordings(
        &self,
        credential: &Credential,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Recording>> {
        let url = self.recordings_url(user_id)?;

        let mut recordings = Vec::new();
        for (from, to) in window_split(start, end, self.window) {
            let mut next_page_token: Option<String> = None;
            loop {
                let mut request = Fetch::get(&self.http_client, url.as_str())
                    .bearer_auth(&credential.access_token)
                    .query("page_size", self.page_size)
                    .query("from", from.format("%Y-%m-%d"))
                    .query("to", to.format("%Y-%m-%d"))
                    .timeout(self.request_timeout);
                if let Some(token) = &next_page_token {
                    request = request.query("next_page_token", token);
                }

                let page = request.execute::<RecordingPage>().await?;
                debug!(
                    "{} recording(s) for {} between {} and {}",
                    page.meetings.len(),
                    user_id,
                    from,
                    to
                );
                recordings.extend(page.meetings);

                match page.next_page_token.filter(|t| !t.is_empty()) {
                    Some(token) => next_page_token = Some(token),
                    None => break,
                }
            }
        }

        info!("Found {} recording(s) for {}", recordings.len(), user_id);
        Ok(recordings)
    }

    fn recordings_url(&self, user_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| Error::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push("users")
            .push(user_id)
            .push("recordings");
        Ok(url)
    }
}
