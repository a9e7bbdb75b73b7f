//! Download, load, analyse and map datasets from the USDA Forest Service
//! Enterprise Data Warehouse (EDW).
//!
//! ```no_run
//! use edwviz::collect::config::DownloaderConfig;
//! use edwviz::collect::edw::{DatasetFormat, EdwCollect};
//! use edwviz::geometric::{analysis, loader};
//!
//! let edw = EdwCollect::new(DownloaderConfig::from_env())?;
//! let handle = edw.download_dataset("Actv_SilvTSI", DatasetFormat::Shapefile)?;
//! let treatments = loader::load_dataset(&handle)?;
//! let with_area = analysis::calculate_area(&treatments, "acres")?;
//! println!("{:#?}", analysis::get_summary_statistics(&with_area));
//! # Ok::<(), edwviz::EdwError>(())
//! ```

pub mod collect;
pub mod commons;
pub mod error;
pub mod geo_core;
pub mod geometric;
pub mod visualize;

pub use error::{EdwError, Result};
