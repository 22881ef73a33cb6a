//! Streams single recording files to disk

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use futures_util::StreamExt;
use log::{debug, error, info};
use reqwest::Client;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::config::ClientOptions;
use crate::error::{Error, Result};
use crate::report::{Progress, Reporter};

/// Downloads one file at a time, reporting progress per block
pub struct FileFetcher {
    http_client: Client,
    chunk_size: usize,
    read_timeout: Duration,
    reporter: Arc<dyn Reporter>,
}

impl FileFetcher {
    pub fn new(http_client: Client, options: &ClientOptions, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            http_client,
            chunk_size: options.chunk_size.max(1),
            read_timeout: options.read_timeout,
            reporter,
        }
    }

    /// Download `url` to `destination`.
    ///
    /// Never fails outward: any network or storage problem is reported and
    /// turned into `false`, so one bad file cannot abort the run.
    pub async fn fetch(&self, url: &str, destination: &Path) -> bool {
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| destination.display().to_string());

        self.reporter.status(&format!("Starting download: {}", name));
        match self.try_fetch(url, destination).await {
            Ok(written) => {
                info!("Wrote {} bytes to {}", written, destination.display());
                self.reporter.status(&format!("Completed download: {}", name));
                true
            }
            Err(e) => {
                error!("{}", e);
                self.reporter.error(&e.to_string());
                false
            }
        }
    }

    /// Download into `<destination>.part` and move it into place once the body
    /// is complete. The partial file is removed on failure.
    pub async fn try_fetch(&self, url: &str, destination: &Path) -> Result<u64> {
        let target = destination.display().to_string();

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::download(&target, e))?;
        }

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::download(&target, e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::download(&target, format!("server answered {}", status)));
        }

        let partial = partial_path(destination);
        match self.stream_to(response, &partial).await {
            Ok(written) => {
                fs::rename(&partial, destination)
                    .await
                    .map_err(|e| Error::download(&target, e))?;
                Ok(written)
            }
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                Err(Error::download(&target, e))
            }
        }
    }

    async fn stream_to(&self, response: reqwest::Response, path: &Path) -> Result<u64> {
        let total = response.content_length();
        debug!("Streaming {:?} bytes to {}", total, path.display());

        let mut file = File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut buffer = BytesMut::with_capacity(self.chunk_size);
        let mut downloaded = 0u64;
        let started = Instant::now();

        loop {
            let next = tokio::time::timeout(self.read_timeout, stream.next())
                .await
                .map_err(|_| {
                    Error::general(format!("no data received for {}s", self.read_timeout.as_secs()))
                })?;

            match next {
                Some(chunk) => {
                    buffer.extend_from_slice(&chunk.map_err(|e| e.without_url())?);
                    while buffer.len() >= self.chunk_size {
                        let block = buffer.split_to(self.chunk_size);
                        downloaded = self.write_block(&mut file, &block, downloaded, total, started).await?;
                    }
                }
                None => break,
            }
        }

        if !buffer.is_empty() {
            downloaded = self.write_block(&mut file, &buffer, downloaded, total, started).await?;
        }

        file.flush().await?;
        file.sync_all().await?;

        if let Some(total) = total {
            if downloaded < total {
                return Err(Error::general(format!(
                    "body ended after {} of {} bytes",
                    downloaded, total
                )));
            }
        }

        Ok(downloaded)
    }

    async fn write_block(
        &self,
        file: &mut File,
        block: &[u8],
        downloaded: u64,
        total: Option<u64>,
        started: Instant,
    ) -> Result<u64> {
        file.write_all(block).await?;
        let downloaded = downloaded + block.len() as u64;
        self.reporter
            .progress(&Progress::new(downloaded, total, started.elapsed()));
        Ok(downloaded)
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("download"));
    name.push(".part");
    destination.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemoryReporter;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(chunk_size: usize, reporter: Arc<MemoryReporter>) -> FileFetcher {
        let options = ClientOptions::default().with_chunk_size(chunk_size);
        FileFetcher::new(Client::new(), &options, reporter)
    }

    #[tokio::test]
    async fn test_fetch_writes_file_in_blocks() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rec/download/f1"))
            .and(query_param("access_token", "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"0123456789".to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("Topic - 2024.01.01").join("file.mp4");
        let reporter = Arc::new(MemoryReporter::new());

        let url = format!("{}/rec/download/f1?access_token=tok", mock_server.uri());
        assert!(fetcher(4, reporter.clone()).fetch(&url, &destination).await);

        assert_eq!(std::fs::read(&destination).unwrap(), b"0123456789");
        assert!(!partial_path(&destination).exists());

        let lines = reporter.lines();
        assert_eq!(lines.first().unwrap(), "Starting download: file.mp4");
        assert_eq!(lines.last().unwrap(), "Completed download: file.mp4");
        let percents: Vec<_> = lines
            .iter()
            .filter(|l| l.starts_with("progress:"))
            .map(|l| l.split('%').next().unwrap().to_string())
            .collect();
        assert_eq!(percents, vec!["progress:40.00", "progress:80.00", "progress:100.00"]);
    }

    #[tokio::test]
    async fn test_non_ok_status_leaves_nothing_behind() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rec/download/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("m").join("gone.mp4");
        let reporter = Arc::new(MemoryReporter::new());

        let url = format!("{}/rec/download/gone", mock_server.uri());
        let fetcher = fetcher(32 * 1024, reporter.clone());
        assert!(!fetcher.fetch(&url, &destination).await);

        assert!(!destination.exists());
        assert!(!partial_path(&destination).exists());
        assert!(reporter
            .lines()
            .iter()
            .any(|l| l.starts_with("### Download failed") && l.contains("404")));

        let err = fetcher.try_fetch(&url, &destination).await.unwrap_err();
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = Arc::new(MemoryReporter::new());

        let ok = fetcher(1024, reporter.clone())
            .fetch("http://127.0.0.1:9/rec/download/x?access_token=secret", &dir.path().join("x.mp4"))
            .await;

        assert!(!ok);
        let lines = reporter.lines();
        assert!(lines.iter().any(|l| l.starts_with("### ")));
        assert!(!lines.iter().any(|l| l.contains("secret")));
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/dl/a/b.mp4")),
            PathBuf::from("/dl/a/b.mp4.part")
        );
    }
}
