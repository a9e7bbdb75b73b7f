use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::collect::global_variables::{GEODATABASE_SUBDIR, SHAPEFILE_SUBDIR};
use crate::error::{EdwError, Result};

/// Archive flavour published by the EDW for each dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFormat {
    Shapefile,
    Geodatabase,
}

impl DatasetFormat {
    pub const ALL: [DatasetFormat; 2] = [DatasetFormat::Shapefile, DatasetFormat::Geodatabase];

    /// Directory under the data root holding datasets of this format.
    pub fn subdir(&self) -> &'static str {
        match self {
            DatasetFormat::Shapefile => SHAPEFILE_SUBDIR,
            DatasetFormat::Geodatabase => GEODATABASE_SUBDIR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetFormat::Shapefile => "shapefile",
            DatasetFormat::Geodatabase => "geodatabase",
        }
    }
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetFormat {
    type Err = EdwError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shapefile" | "shp" => Ok(DatasetFormat::Shapefile),
            "geodatabase" | "gdb" => Ok(DatasetFormat::Geodatabase),
            _ => Err(EdwError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// One row of the static dataset table. Paths are relative to the EDW base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetDescriptor {
    pub name: &'static str,
    pub shapefile_path: &'static str,
    pub geodatabase_path: &'static str,
}

impl DatasetDescriptor {
    pub fn path(&self, format: DatasetFormat) -> &'static str {
        match format {
            DatasetFormat::Shapefile => self.shapefile_path,
            DatasetFormat::Geodatabase => self.geodatabase_path,
        }
    }

    pub fn available_formats(&self) -> Vec<DatasetFormat> {
        DatasetFormat::ALL
            .into_iter()
            .filter(|f| !self.path(*f).is_empty())
            .collect()
    }
}

macro_rules! edw_dataset {
    ($name:literal) => {
        DatasetDescriptor {
            name: $name,
            shapefile_path: concat!("edw_resources/shp/", $name, ".zip"),
            geodatabase_path: concat!("edw_resources/fc/", $name, ".gdb.zip"),
        }
    };
}

/// FACTS activity layers published by the EDW.
static DATASETS: &[DatasetDescriptor] = &[
    edw_dataset!("Actv_TimberHarvest"),
    edw_dataset!("Actv_HazFuelTrt_PL"),
    edw_dataset!("Actv_HazFuelTrt_LN"),
    edw_dataset!("Actv_SilvReforest"),
    edw_dataset!("Actv_SilvTSI"),
    edw_dataset!("Actv_RngVegImprove"),
];

/// Absolute download URLs for a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrls {
    pub shapefile_url: String,
    pub geodatabase_url: String,
}

impl ResolvedUrls {
    pub fn url(&self, format: DatasetFormat) -> &str {
        match format {
            DatasetFormat::Shapefile => &self.shapefile_url,
            DatasetFormat::Geodatabase => &self.geodatabase_url,
        }
    }
}

pub fn descriptor(name: &str) -> Option<&'static DatasetDescriptor> {
    DATASETS.iter().find(|d| d.name == name)
}

/// Dataset names in table order.
pub fn list_available() -> Vec<&'static str> {
    DATASETS.iter().map(|d| d.name).collect()
}

pub(crate) fn unknown_dataset(name: &str) -> EdwError {
    EdwError::UnknownDataset {
        name: name.to_string(),
        available: list_available().into_iter().map(String::from).collect(),
    }
}

/// Resolve `name` against the EDW base URL.
pub fn resolve(name: &str, base_url: &str) -> Result<ResolvedUrls> {
    let descriptor = descriptor(name).ok_or_else(|| unknown_dataset(name))?;
    let base = Url::parse(base_url).map_err(|e| EdwError::InvalidUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;

    let join = |path: &str| -> Result<String> {
        if path.is_empty() {
            return Ok(String::new());
        }
        base.join(path)
            .map(|u| u.to_string())
            .map_err(|e| EdwError::InvalidUrl {
                url: path.to_string(),
                reason: e.to_string(),
            })
    };

    Ok(ResolvedUrls {
        shapefile_url: join(descriptor.shapefile_path)?,
        geodatabase_url: join(descriptor.geodatabase_path)?,
    })
}
