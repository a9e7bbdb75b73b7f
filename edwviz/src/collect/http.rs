//! HTTP client abstraction so the downloader can be driven by a mock in tests.

use std::io::Write;

#[cfg(feature = "indicatif")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use tracing::debug;

use crate::collect::config::DownloaderConfig;
use crate::error::{EdwError, Result};

/// Blocking GET that streams the response body into `sink`.
pub trait HttpClient {
    /// Returns the number of bytes written. Non-success statuses are errors.
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64>;
}

impl<T: HttpClient + ?Sized> HttpClient for &T {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        (**self).fetch(url, sink)
    }
}

#[cfg(feature = "indicatif")]
fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {bytes:>10}/{total_bytes:10} {percent}% {msg}")
        .map(|style| style.progress_chars("##-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// reqwest-backed client with connect and total timeouts.
#[derive(Clone)]
pub struct ReqwestClient {
    client: Client,
    show_progress: bool,
}

impl ReqwestClient {
    pub fn new(config: &DownloaderConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| EdwError::download("<client>", format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            show_progress: true,
        })
    }

    /// Disable the terminal progress bar (it is hidden anyway when stderr is not a TTY).
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }
}

impl HttpClient for ReqwestClient {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        debug!(url, "GET");
        let response = self.client.get(url).send().map_err(|e| {
            let reason = if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            };
            EdwError::download(url, reason)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EdwError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_length = response.content_length();
        debug!(url, content_length, "response headers received");

        #[cfg(feature = "indicatif")]
        let written = {
            let pb = match content_length {
                Some(len) if self.show_progress => {
                    let pb = ProgressBar::new(len);
                    pb.set_style(progress_style());
                    pb.set_message("Downloading");
                    pb
                }
                _ => ProgressBar::hidden(),
            };
            let mut reader = pb.wrap_read(response);
            let written = std::io::copy(&mut reader, sink);
            pb.finish_and_clear();
            written
        };

        #[cfg(not(feature = "indicatif"))]
        let written = {
            let mut response = response;
            std::io::copy(&mut response, sink)
        };

        written.map_err(|e| EdwError::download(url, format!("Failed to read response body: {e}")))
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockHttpClient;
    use super::*;

    #[test]
    fn test_mock_streams_body() {
        let client = MockHttpClient::new().with_body("http://x/a.zip", b"abc".to_vec());
        let mut out = Vec::new();
        assert_eq!(client.fetch("http://x/a.zip", &mut out).unwrap(), 3);
        assert_eq!(out, b"abc");
        assert_eq!(client.call_count(), 1);
    }

    #[test]
    fn test_mock_status_error() {
        let client = MockHttpClient::new().with_status("http://x/a.zip", 503);
        let err = client.fetch("http://x/a.zip", &mut Vec::new()).unwrap_err();
        assert!(matches!(err, EdwError::HttpStatus { status: 503, .. }));
    }

    #[test]
    fn test_reqwest_client_builds() {
        assert!(ReqwestClient::new(&DownloaderConfig::default()).is_ok());
    }
}
