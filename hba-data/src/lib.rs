//! Attribution, upstream aggregation and rollup pipelines for basin statistics.
//!
//! - [`attribution`] / [`batch`]: zonal attribution of units, in parallel
//! - [`network`]: upstream sums and area-weighted means
//! - [`rollup`]: Pfafstetter rollups and flat CSV output
//! - [`raster`] / [`zonal`]: ASCII grid zonal statistics
//! - [`units`]: GeoJSON unit loading

pub mod attribution;
pub mod batch;
pub mod error;
pub mod network;
pub mod raster;
pub mod rollup;
pub mod units;
pub mod zonal;

pub use attribution::BasinAttributor;
pub use batch::{attribute_batch, AttributeConfig, BatchOutcome, UnitFailure};
pub use error::{DataError, Result, ZonalError};
pub use network::{
    upstream_batch, upstream_summary, write_upstream_csv, LocalValueTable, SelfInclusion, SummaryType,
    UpstreamConfig, UpstreamSummary,
};
pub use raster::{AsciiGrid, GridHeader};
pub use rollup::{summarize, summary_prep, write_flat_csv, write_rollup_csv, ColumnKey, RollupRecord};
pub use units::{load_units, units_from_geojson, LoadedUnits, UnitFields};
pub use zonal::{GridZonalStats, ZonalStatistics};
