//! Streaming downloads of packages and patches.

use crate::constants::REQUEST_TIMEOUT;
use crate::core::LauncherError;
use crate::progress::ProgressSink;
use anyhow::{Context, Result};
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// HTTP client that streams artifacts to disk.
///
/// A single client is shared by every download of a session. Each request
/// has the five-minute [`REQUEST_TIMEOUT`]; expiry is reported as
/// [`LauncherError::NetworkFailure`] and is not retried.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    /// Downloader with the default request timeout.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("patchlaunch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
        })
    }

    /// Fetch a small text resource.
    pub async fn fetch_text(&self, url: &str, operation: &str) -> Result<String> {
        let network = |reason: String| LauncherError::NetworkFailure {
            operation: operation.to_string(),
            reason,
        };

        let response = self.client.get(url).send().await.map_err(|e| network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(network(format!("HTTP {status} from {url}")).into());
        }
        Ok(response.text().await.map_err(|e| network(e.to_string()))?)
    }

    /// Stream `url` into `destination`, reporting received/total bytes.
    ///
    /// When the server sends no content length, only the label is reported.
    /// A failed download may leave a partial file at `destination`.
    pub async fn download_to(
        &self,
        url: &str,
        destination: &Path,
        operation: &str,
        sink: &ProgressSink,
    ) -> Result<u64> {
        let network = |reason: String| LauncherError::NetworkFailure {
            operation: operation.to_string(),
            reason,
        };

        debug!("Downloading {} to {}", url, destination.display());
        let mut response = self.client.get(url).send().await.map_err(|e| network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(network(format!("HTTP {status} from {url}")).into());
        }

        let total = response.content_length();
        let mut file = tokio::fs::File::create(destination)
            .await
            .with_context(|| format!("Failed to create {}", destination.display()))?;

        let mut received: u64 = 0;
        sink.progress(0.0);
        while let Some(chunk) = response.chunk().await.map_err(|e| network(e.to_string()))? {
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write {}", destination.display()))?;
            received += chunk.len() as u64;
            if let Some(total) = total {
                sink.ratio(received, total);
            }
        }
        file.flush().await?;
        file.sync_all().await?;
        // Close synchronously; the file may be executed right after.
        drop(file.into_std().await);

        debug!("Downloaded {} bytes from {}", received, url);
        Ok(received)
    }

    /// Stream `url` into a fresh temporary file.
    ///
    /// The file is deleted when the returned handle is dropped.
    pub async fn download_temp(
        &self,
        url: &str,
        operation: &str,
        sink: &ProgressSink,
    ) -> Result<NamedTempFile> {
        let temp = NamedTempFile::new().context("Failed to create temporary download file")?;
        self.download_to(url, temp.path(), operation, sink).await?;
        Ok(temp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::find_launcher_error;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_download_streams_body_and_reports_progress() {
        let server = MockServer::start().await;
        let body = vec![42u8; 100_000];
        Mock::given(method("GET"))
            .and(path("/13/Linux.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let (sink, mut receiver) = ProgressSink::channel();
        let temp = Downloader::new()
            .unwrap()
            .download_temp(&format!("{}/13/Linux.tar.gz", server.uri()), "download build 13", &sink)
            .await
            .unwrap();
        drop(sink);

        assert_eq!(std::fs::read(temp.path()).unwrap(), body);
        let mut last = None;
        while let Some(event) = receiver.recv().await {
            last = event.fraction.or(last);
        }
        assert_eq!(last, Some(1.0));
    }

    #[tokio::test]
    async fn test_download_http_error_is_network_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = Downloader::new()
            .unwrap()
            .download_temp(&format!("{}/13/12.patch", server.uri()), "download patch 12 -> 13", &ProgressSink::disconnected())
            .await
            .unwrap_err();

        assert!(matches!(
            find_launcher_error(&err),
            Some(LauncherError::NetworkFailure { operation, reason })
                if operation == "download patch 12 -> 13" && reason.contains("404")
        ));
    }

    #[tokio::test]
    async fn test_fetch_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/launcher/version"))
            .respond_with(ResponseTemplate::new(200).set_body_string("1.2.3\n"))
            .mount(&server)
            .await;

        let text = Downloader::new()
            .unwrap()
            .fetch_text(&format!("{}/launcher/version", server.uri()), "check launcher version")
            .await
            .unwrap();
        assert_eq!(text.trim(), "1.2.3");
    }
}
