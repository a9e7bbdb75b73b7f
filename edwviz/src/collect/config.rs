//! Downloader configuration.
//!
//! Defaults come from [`global_variables`](super::global_variables); every
//! value can be overridden with a `with_*` setter or from the environment:
//!
//! - `EDWVIZ_DATA_DIR` root directory for extracted datasets
//! - `EDWVIZ_BASE_URL` alternative EDW mirror
//! - `EDWVIZ_TIMEOUT_SECS` total request timeout
//! - `EDWVIZ_FORCE` re-download even when a valid cache exists (`1`/`true`)

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::collect::global_variables::{
    get_data_path, CONNECT_TIMEOUT, DOWNLOAD_TIMEOUT, EDW_BASE_URL, USER_AGENT,
};

#[derive(Debug, Clone, PartialEq)]
pub struct DownloaderConfig {
    pub data_dir: PathBuf,
    pub base_url: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    /// Ignore the local cache and always fetch the archive again.
    pub force: bool,
    pub user_agent: String,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            data_dir: get_data_path(),
            base_url: EDW_BASE_URL.to_string(),
            connect_timeout: CONNECT_TIMEOUT,
            timeout: DOWNLOAD_TIMEOUT,
            force: false,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl DownloaderConfig {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self::default().with_data_dir(data_dir)
    }

    /// Defaults overlaid with the `EDWVIZ_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup("EDWVIZ_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("EDWVIZ_BASE_URL") {
            config = config.with_base_url(url);
        }
        if let Some(secs) = lookup("EDWVIZ_TIMEOUT_SECS") {
            match secs.trim().parse::<u64>() {
                Ok(secs) => config.timeout = Duration::from_secs(secs),
                Err(_) => warn!(value = %secs, "ignoring invalid EDWVIZ_TIMEOUT_SECS"),
            }
        }
        if let Some(force) = lookup("EDWVIZ_FORCE") {
            config.force = matches!(force.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        config
    }

    pub fn with_data_dir(mut self, data_dir: impl AsRef<Path>) -> Self {
        self.data_dir = data_dir.as_ref().to_path_buf();
        self
    }

    /// Relative dataset paths are joined onto this URL, so it always ends with `/`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}
