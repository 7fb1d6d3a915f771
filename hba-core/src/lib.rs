//! Core types for attributing landscape statistics to hydrological basins.
//!
//! - [`bounds`]: bounding boxes and the intersection gate
//! - [`stat`] and [`accumulator`]: statistic kinds and multi-source merging
//! - [`unit`], [`pfaf`]: spatial units and Pfafstetter codes
//! - [`source`]: the source catalogue
//! - [`record`]: the per-unit output record
//! - [`network`]: precomputed upstream-network records

pub mod accumulator;
pub mod bounds;
pub mod error;
pub mod network;
pub mod pfaf;
pub mod record;
pub mod source;
pub mod stat;
pub mod unit;

pub use accumulator::{AccumulatedStat, Provenance, StatAccumulator};
pub use bounds::{classify, BoundingBox, IntersectionResult};
pub use error::{Error, Result};
pub use network::{BasinId, MemoryNetworkIndex, NetworkIndex, NetworkRecord};
pub use pfaf::PfafCode;
pub use record::Record;
pub use source::{CatalogueEntry, SourceCatalogue, SourceDescriptor};
pub use stat::{StatKind, StatRequest, ZonalStats};
pub use unit::{Geometry, Polygon, SpatialUnit, UnitId};
