//! Error types for edwviz.

use thiserror::Error;

/// Errors returned by the registry, downloader, loader and analysis helpers.
#[derive(Debug, Error)]
pub enum EdwError {
    /// Dataset name is not in the static registry.
    #[error("Dataset '{name}' not found. Available datasets: {}", available.join(", "))]
    UnknownDataset {
        /// Requested name.
        name: String,
        /// Names known to the registry.
        available: Vec<String>,
    },

    /// Format string is neither shapefile nor geodatabase.
    #[error("Format must be 'shapefile' or 'geodatabase', got '{0}'")]
    UnsupportedFormat(String),

    /// Transport failure, timeout, or unreadable response body.
    #[error("Failed to download {url}: {reason}")]
    Download {
        /// Requested URL.
        url: String,
        /// Underlying cause.
        reason: String,
    },

    /// Server answered with a non-success status.
    #[error("HTTP {status} when downloading {url}")]
    HttpStatus {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Archive is corrupt or does not contain what we expect.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// No recognisable shapefile / geodatabase / GeoJSON layer.
    #[error("Load failed: {0}")]
    Load(String),

    /// Layer was found but holds zero features.
    #[error("Layer '{0}' contains no features")]
    EmptyDataset(String),

    /// Unknown area unit (acres, hectares, square_meters, square_kilometers)
    /// or distance unit (meters, kilometers, miles, feet).
    #[error("Unsupported unit '{0}'")]
    UnsupportedUnit(String),

    /// CRS is missing, geographic where a projected one is needed, or reprojection failed.
    #[error("Projection error: {0}")]
    Projection(String),

    /// Attribute is not part of the collection schema.
    #[error("Field '{0}' not found in schema")]
    MissingField(String),

    /// URL could not be parsed.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// Offending input.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// Output name is empty or contains path components.
    #[error("Invalid dataset output name '{0}'")]
    InvalidName(String),

    /// Caller passed an argument that cannot be processed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest or GeoJSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EdwError {
    /// True for the error kinds that describe a failed network download.
    pub fn is_download_error(&self) -> bool {
        matches!(self, EdwError::Download { .. } | EdwError::HttpStatus { .. })
    }

    pub(crate) fn download(url: &str, reason: impl ToString) -> Self {
        EdwError::Download {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for EdwError {
    fn from(err: zip::result::ZipError) -> Self {
        EdwError::Extraction(err.to_string())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, EdwError>;
