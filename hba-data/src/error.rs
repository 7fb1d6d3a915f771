/// Error types for attribution and aggregation processing
use std::path::PathBuf;
use thiserror::Error;

/// Failure of the zonal statistics capability for one geometry/raster pair
#[derive(Error, Debug)]
pub enum ZonalError {
    #[error("Failed to read grid {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed grid {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("Grid cache unavailable: {0}")]
    Cache(String),
}

/// Main error type for hba-data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error(transparent)]
    Core(#[from] hba_core::Error),

    #[error(transparent)]
    Zonal(#[from] ZonalError),

    #[error("Failed to parse GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Column {0} not found")]
    MissingColumn(String),

    #[error("Invalid value {value:?} in column {column} at row {row}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl DataError {
    /// Whether the error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        match self {
            DataError::Core(e) => e.is_fatal(),
            _ => true,
        }
    }
}

/// Type alias for Results using DataError
pub type Result<T> = std::result::Result<T, DataError>;
