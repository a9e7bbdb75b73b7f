use std::fs;
use std::io::{self, BufReader, Seek, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info, warn};
use url::Url;

use crate::collect::archive::{ensure_geospatial, extract_zip};
use crate::collect::config::DownloaderConfig;
use crate::collect::edw::manifest::DatasetManifest;
use crate::collect::edw::registry::{self, DatasetFormat};
use crate::collect::global_variables::EDW_META_PATH;
use crate::collect::http::{HttpClient, ReqwestClient};
use crate::commons::basic_functions::{
    find_dirs_with_extension, find_files_with_extension, is_plain_file_name,
};
use crate::error::{EdwError, Result};

/// One download: which dataset, which archive flavour, and the data root to extract under.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub dataset_name: String,
    pub format: DatasetFormat,
    pub destination_directory: PathBuf,
}

impl DownloadRequest {
    pub fn new(
        dataset_name: impl Into<String>,
        format: DatasetFormat,
        destination_directory: impl AsRef<Path>,
    ) -> Self {
        Self {
            dataset_name: dataset_name.into(),
            format,
            destination_directory: destination_directory.as_ref().to_path_buf(),
        }
    }
}

/// Extracted dataset on disk. The caller owns the files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDatasetHandle {
    /// `<data_dir>/<format-subdir>/<name>`
    pub local_path: PathBuf,
    pub format: DatasetFormat,
}

impl LocalDatasetHandle {
    /// The `.shp` file or `.gdb` directory inside [`local_path`](Self::local_path).
    pub fn layer_path(&self) -> Result<PathBuf> {
        let candidates = match self.format {
            DatasetFormat::Shapefile => find_files_with_extension(&self.local_path, "shp")?,
            DatasetFormat::Geodatabase => find_dirs_with_extension(&self.local_path, "gdb")?,
        };
        candidates.into_iter().next().ok_or_else(|| {
            EdwError::Load(format!(
                "no {} found in {}",
                self.format,
                self.local_path.display()
            ))
        })
    }
}

/// Static description of a registry dataset; building it never touches the network.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub name: String,
    pub available_formats: Vec<DatasetFormat>,
    pub metadata_url: String,
    pub shapefile_url: String,
    pub geodatabase_url: String,
}

/// Writer that hashes everything passing through it.
struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Downloads EDW archives and extracts them under the configured data directory.
///
/// ```no_run
/// use edwviz::collect::edw::{DatasetFormat, EdwCollect};
/// use edwviz::collect::config::DownloaderConfig;
///
/// let edw = EdwCollect::new(DownloaderConfig::new("./data"))?;
/// let handle = edw.download_dataset("Actv_TimberHarvest", DatasetFormat::Shapefile)?;
/// println!("{}", handle.local_path.display());
/// # Ok::<(), edwviz::EdwError>(())
/// ```
pub struct EdwCollect<C = ReqwestClient> {
    config: DownloaderConfig,
    client: C,
}

impl EdwCollect<ReqwestClient> {
    pub fn new(config: DownloaderConfig) -> Result<Self> {
        let client = ReqwestClient::new(&config)?;
        Self::with_client(config, client)
    }
}

impl<C: HttpClient> EdwCollect<C> {
    /// Use a custom HTTP client; creates `shapefiles/` and `geodatabases/` under the data dir.
    pub fn with_client(config: DownloaderConfig, client: C) -> Result<Self> {
        for format in DatasetFormat::ALL {
            fs::create_dir_all(config.data_dir.join(format.subdir()))?;
        }
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    pub fn list_available_datasets(&self) -> Vec<&'static str> {
        registry::list_available()
    }

    pub fn get_dataset_info(&self, name: &str) -> Result<DatasetInfo> {
        let descriptor = registry::descriptor(name).ok_or_else(|| registry::unknown_dataset(name))?;
        let urls = registry::resolve(name, &self.config.base_url)?;

        Ok(DatasetInfo {
            name: name.to_string(),
            available_formats: descriptor.available_formats(),
            metadata_url: format!("{}{}{}.xml", self.config.base_url, EDW_META_PATH, name),
            shapefile_url: urls.shapefile_url,
            geodatabase_url: urls.geodatabase_url,
        })
    }

    /// Where `name` lands for `format` under the configured data dir.
    pub fn dataset_dir(&self, name: &str, format: DatasetFormat) -> PathBuf {
        self.config.data_dir.join(format.subdir()).join(name)
    }

    /// True when a valid cache entry exists for a registry dataset.
    pub fn is_cached(&self, name: &str, format: DatasetFormat) -> bool {
        registry::resolve(name, &self.config.base_url)
            .map(|urls| cache_is_valid(&self.dataset_dir(name, format), name, format, urls.url(format)))
            .unwrap_or(false)
    }

    /// Download a registry dataset into the configured data directory.
    pub fn download_dataset(&self, name: &str, format: DatasetFormat) -> Result<LocalDatasetHandle> {
        self.download(&DownloadRequest::new(name, format, &self.config.data_dir))
    }

    /// Download a registry dataset into `request.destination_directory`.
    pub fn download(&self, request: &DownloadRequest) -> Result<LocalDatasetHandle> {
        // Resolve first: an unknown name must fail before any network I/O.
        let urls = registry::resolve(&request.dataset_name, &self.config.base_url)?;
        let url = urls.url(request.format);
        if url.is_empty() {
            return Err(EdwError::UnsupportedFormat(format!(
                "{} is not published for '{}'",
                request.format, request.dataset_name
            )));
        }

        self.fetch_and_extract(
            url,
            &request.dataset_name,
            request.format,
            &request.destination_directory,
        )
    }

    /// Download an arbitrary ZIP archive, bypassing the registry.
    pub fn download_custom_dataset(
        &self,
        url: &str,
        output_name: &str,
        format: DatasetFormat,
    ) -> Result<LocalDatasetHandle> {
        let parsed = Url::parse(url).map_err(|e| EdwError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(EdwError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        if !is_plain_file_name(output_name) {
            return Err(EdwError::InvalidName(output_name.to_string()));
        }

        self.fetch_and_extract(url, output_name, format, &self.config.data_dir)
    }

    fn fetch_and_extract(
        &self,
        url: &str,
        name: &str,
        format: DatasetFormat,
        data_dir: &Path,
    ) -> Result<LocalDatasetHandle> {
        let parent = data_dir.join(format.subdir());
        let output_dir = parent.join(name);

        if !self.config.force && output_dir.exists() {
            if cache_is_valid(&output_dir, name, format, url) {
                info!(dataset = name, path = %output_dir.display(), "dataset already downloaded");
                return Ok(LocalDatasetHandle {
                    local_path: output_dir,
                    format,
                });
            }
            warn!(dataset = name, path = %output_dir.display(), "cached dataset is incomplete, downloading again");
        }

        fs::create_dir_all(&parent)?;

        info!(dataset = name, %format, "downloading from USDA Forest Service");
        debug!(url, "archive URL");

        // Temporary files live next to the target so the final rename stays on one filesystem.
        let archive = NamedTempFile::new_in(&parent)?;
        let mut writer = HashingWriter {
            inner: archive.as_file(),
            hasher: Sha256::new(),
        };
        let archive_bytes = self.client.fetch(url, &mut writer)?;
        writer.flush()?;
        let archive_sha256 = format!("{:x}", writer.hasher.finalize());
        info!(dataset = name, bytes = archive_bytes, "download complete, extracting");

        let mut file = archive.reopen()?;
        file.rewind()?;

        let staging = TempDir::new_in(&parent)?;
        let files = extract_zip(BufReader::new(file), staging.path())?;
        ensure_geospatial(&files)?;

        DatasetManifest {
            name: name.to_string(),
            format,
            url: url.to_string(),
            archive_sha256,
            archive_bytes,
            files,
            downloaded_at: Utc::now(),
        }
        .write(staging.path())?;

        if output_dir.exists() {
            fs::remove_dir_all(&output_dir)?;
        }
        fs::rename(staging.path(), &output_dir)?;

        info!(dataset = name, path = %output_dir.display(), "dataset extracted");
        Ok(LocalDatasetHandle {
            local_path: output_dir,
            format,
        })
    }
}

fn cache_is_valid(dir: &Path, name: &str, format: DatasetFormat, url: &str) -> bool {
    let layout_ok = match format {
        DatasetFormat::Shapefile => find_files_with_extension(dir, "shp").is_ok_and(|v| !v.is_empty()),
        DatasetFormat::Geodatabase => find_dirs_with_extension(dir, "gdb").is_ok_and(|v| !v.is_empty()),
    };
    layout_ok
        && DatasetManifest::read(dir)
            .map(|m| m.matches(dir, name, format, url))
            .unwrap_or(false)
}
