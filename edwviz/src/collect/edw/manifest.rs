//! Cache manifest written next to every extracted dataset.
//!
//! The manifest is what makes a directory count as a valid cache entry: it
//! must parse, describe the same dataset/format/URL that is being requested,
//! and every file it lists must still be present. Remote freshness is never
//! checked.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collect::edw::registry::DatasetFormat;
use crate::collect::global_variables::MANIFEST_NAME;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub name: String,
    pub format: DatasetFormat,
    pub url: String,
    pub archive_sha256: String,
    pub archive_bytes: u64,
    /// Extracted files, relative to the dataset directory.
    pub files: Vec<PathBuf>,
    pub downloaded_at: DateTime<Utc>,
}

impl DatasetManifest {
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_NAME)
    }

    pub fn read(dir: &Path) -> Result<Self> {
        let raw = fs::read_to_string(Self::path_in(dir))?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write(&self, dir: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(Self::path_in(dir), raw)?;
        Ok(())
    }

    /// Whether this manifest describes `url` for `name`/`format` and its files are all on disk.
    pub fn matches(&self, dir: &Path, name: &str, format: DatasetFormat, url: &str) -> bool {
        self.name == name
            && self.format == format
            && self.url == url
            && !self.files.is_empty()
            && self.files.iter().all(|f| dir.join(f).is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifest() -> DatasetManifest {
        DatasetManifest {
            name: "Actv_SilvTSI".to_string(),
            format: DatasetFormat::Shapefile,
            url: "http://edw/shp/Actv_SilvTSI.zip".to_string(),
            archive_sha256: "00".to_string(),
            archive_bytes: 10,
            files: vec![PathBuf::from("Actv_SilvTSI.shp")],
            downloaded_at: Utc::now(),
        }
    }

    #[test]
    fn test_write_read_and_match() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("Actv_SilvTSI.shp"), b"x").unwrap();
        let m = manifest();
        m.write(tmp.path()).unwrap();

        let read = DatasetManifest::read(tmp.path()).unwrap();
        assert_eq!(read, m);
        assert!(read.matches(tmp.path(), "Actv_SilvTSI", DatasetFormat::Shapefile, &m.url));
        assert!(!read.matches(tmp.path(), "Actv_SilvTSI", DatasetFormat::Geodatabase, &m.url));
        assert!(!read.matches(tmp.path(), "Actv_SilvTSI", DatasetFormat::Shapefile, "http://other"));
    }

    #[test]
    fn test_missing_file_invalidates() {
        let tmp = TempDir::new().unwrap();
        let m = manifest();
        m.write(tmp.path()).unwrap();
        assert!(!m.matches(tmp.path(), "Actv_SilvTSI", DatasetFormat::Shapefile, &m.url));
    }
}
