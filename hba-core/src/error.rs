/// Error types for the attribution core
use thiserror::Error;

use crate::stat::StatKind;

/// Main error type for attribution, network and rollup operations
#[derive(Error, Debug)]
pub enum Error {
    /// The source catalogue is malformed; nothing may be processed.
    #[error("Invalid source catalogue entry {file_name}: {reason}")]
    Configuration { file_name: String, reason: String },

    /// The network index has no record for a basin of the batch.
    #[error("Network index has no record for basin {0}")]
    BasinNotFound(String),

    /// The network-index store itself failed
    #[error("Network index store failed: {0}")]
    Index(String),

    /// The zonal statistics capability failed for one (unit, source) pair.
    #[error("Zonal statistics failed for unit {unit} on {file_name}: {reason}")]
    Computation {
        unit: String,
        file_name: String,
        reason: String,
    },

    /// A requested statistic was absent from a zonal result.
    #[error("Zonal result for {label} is missing the {kind} statistic")]
    MissingStatistic { label: String, kind: StatKind },

    /// Pfafstetter code is not a digit string or the level is out of range
    #[error("Invalid Pfafstetter code: {0}")]
    InvalidPfaf(String),

    /// Spatial unit could not be built from its source feature
    #[error("Invalid spatial unit: {0}")]
    InvalidUnit(String),

    /// Basin area unusable as a divisor
    #[error("Basin {id} has non-positive area {area}")]
    InvalidArea { id: String, area: f64 },

    /// Record JSON does not have the attributed-record shape
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Whether the error must abort the whole run rather than one unit.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::Computation { .. } | Error::InvalidUnit(_) | Error::InvalidArea { .. }
        )
    }
}

/// Type alias for Results using the core Error
pub type Result<T> = std::result::Result<T, Error>;
