//! USDA Forest Service Enterprise Data Warehouse: dataset table and downloader.

pub mod edw_collect;
pub mod manifest;
pub mod registry;

pub use edw_collect::{DatasetInfo, DownloadRequest, EdwCollect, LocalDatasetHandle};
pub use manifest::DatasetManifest;
pub use registry::{DatasetDescriptor, DatasetFormat, ResolvedUrls};
