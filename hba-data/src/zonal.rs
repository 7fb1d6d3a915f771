//! The zonal statistics capability consumed by the attributor.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use hba_core::{Geometry, StatRequest, ZonalStats};

use crate::error::ZonalError;
use crate::raster::AsciiGrid;

/// Given a geometry and a raster, return the requested statistics.
///
/// `mean`, `min` and `max` may be `None` when no valid cell falls inside
/// the geometry. Implementations are shared between worker threads.
pub trait ZonalStatistics: Send + Sync {
    fn zonal_stats(
        &self,
        geometry: &Geometry,
        path: &Path,
        nodata: f64,
        request: &StatRequest,
    ) -> Result<ZonalStats, ZonalError>;
}

/// Zonal statistics over ESRI ASCII grids.
///
/// Grids are loaded on first use and kept read-only for the lifetime of
/// the value unless caching is disabled.
#[derive(Debug, Default)]
pub struct GridZonalStats {
    cache: Option<RwLock<HashMap<PathBuf, Arc<AsciiGrid>>>>,
}

impl GridZonalStats {
    pub fn new() -> Self {
        GridZonalStats {
            cache: Some(RwLock::new(HashMap::new())),
        }
    }

    /// Re-read the grid for every request.
    pub fn uncached() -> Self {
        GridZonalStats { cache: None }
    }

    pub fn cached_grids(&self) -> usize {
        self.cache
            .as_ref()
            .and_then(|c| c.read().ok().map(|m| m.len()))
            .unwrap_or(0)
    }

    fn grid(&self, path: &Path) -> Result<Arc<AsciiGrid>, ZonalError> {
        let cache = match &self.cache {
            Some(cache) => cache,
            None => return AsciiGrid::from_path(path).map(Arc::new),
        };

        {
            let map = cache
                .read()
                .map_err(|e| ZonalError::Cache(e.to_string()))?;
            if let Some(grid) = map.get(path) {
                return Ok(Arc::clone(grid));
            }
        }

        let grid = Arc::new(AsciiGrid::from_path(path)?);
        let mut map = cache
            .write()
            .map_err(|e| ZonalError::Cache(e.to_string()))?;
        // Another worker may have loaded it meanwhile; keep the first copy.
        let entry = map
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::clone(&grid));
        log::debug!("zonal: cached grid {}", path.display());
        Ok(Arc::clone(entry))
    }
}

impl ZonalStatistics for GridZonalStats {
    fn zonal_stats(
        &self,
        geometry: &Geometry,
        path: &Path,
        nodata: f64,
        request: &StatRequest,
    ) -> Result<ZonalStats, ZonalError> {
        let grid = self.grid(path)?;
        Ok(grid.zonal(geometry, nodata, request))
    }
}
