use std::path::PathBuf;
use std::time::Duration;

/// Root of the Enterprise Data Warehouse clearinghouse.
pub const EDW_BASE_URL: &str = "https://data.fs.usda.gov/geodata/edw/";

/// Metadata documents live under this path, one `<Name>.xml` per dataset.
pub const EDW_META_PATH: &str = "edw_resources/meta/";

pub const DATA_PATH: &str = "./data";

pub const SHAPEFILE_SUBDIR: &str = "shapefiles";
pub const GEODATABASE_SUBDIR: &str = "geodatabases";

/// Written next to the extracted files of every cached dataset.
pub const MANIFEST_NAME: &str = ".edwviz-manifest.json";

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// EDW archives run to several hundred MB.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

pub const USER_AGENT: &str = concat!("edwviz/", env!("CARGO_PKG_VERSION"));

pub fn get_data_path() -> PathBuf {
    PathBuf::from(DATA_PATH)
}
