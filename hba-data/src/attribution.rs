//! Per-unit attribution: intersection gate, zonal statistics, accumulation.

use hba_core::{
    classify, Error, IntersectionResult, Provenance, Record, Result, SourceCatalogue, SourceDescriptor,
    SpatialUnit, StatAccumulator, ZonalStats,
};

use crate::zonal::ZonalStatistics;

/// Attributes spatial units against a read-only source catalogue.
///
/// Holds no per-unit state, so one attributor is shared by every worker.
#[derive(Debug)]
pub struct BasinAttributor<Z> {
    catalogue: SourceCatalogue,
    zonal: Z,
}

impl<Z: ZonalStatistics> BasinAttributor<Z> {
    pub fn new(catalogue: SourceCatalogue, zonal: Z) -> Self {
        let skipped = catalogue.sources().len() - catalogue.selected().count();
        if skipped > 0 {
            log::info!("attribution: {} catalogue sources are not flagged for processing", skipped);
        }
        BasinAttributor { catalogue, zonal }
    }

    pub fn catalogue(&self) -> &SourceCatalogue {
        &self.catalogue
    }

    /// Build the record for one unit.
    ///
    /// A source whose statistics cannot be computed is skipped and listed
    /// in the record's `failed_sources`; any other error is returned.
    pub fn attribute(&self, unit: &SpatialUnit) -> Result<Record> {
        let mut accumulator = StatAccumulator::new();
        let mut failed_sources = Vec::new();

        for source in self.catalogue.selected() {
            let bounds_eval = classify(&unit.bounds, &source.bounds);
            if bounds_eval == IntersectionResult::None {
                continue;
            }
            match self.compute(unit, source) {
                Ok(zonal) => {
                    let provenance = Provenance::new(source.file_name.as_str(), bounds_eval);
                    accumulator.merge(&source.label, &zonal, provenance)?;
                }
                Err(e @ Error::Computation { .. }) => {
                    log::warn!("attribution: {}", e);
                    failed_sources.push(source.file_name.clone());
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Record {
            id: unit.id.clone(),
            pfaf_id: unit.pfaf_id.clone(),
            area: unit.area,
            stats: accumulator.into_stats(),
            failed_sources,
        })
    }

    fn compute(&self, unit: &SpatialUnit, source: &SourceDescriptor) -> Result<ZonalStats> {
        let zonal = self
            .zonal
            .zonal_stats(&unit.geometry, &source.file_path, source.nodata, &source.stats)
            .map_err(|e| Error::Computation {
                unit: unit.id.to_string(),
                file_name: source.file_name.clone(),
                reason: e.to_string(),
            })?;
        if let Some(&kind) = source.stats.kinds().iter().find(|&&k| zonal.get(k).is_none()) {
            return Err(Error::MissingStatistic {
                label: source.label.clone(),
                kind,
            });
        }
        Ok(zonal.restrict(&source.stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ZonalError;
    use hba_core::{BoundingBox, Geometry, StatKind, StatRequest, UnitId};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    /// Returns canned results per raster path.
    struct Canned(HashMap<PathBuf, ZonalStats>);

    impl ZonalStatistics for Canned {
        fn zonal_stats(
            &self,
            _geometry: &Geometry,
            path: &Path,
            _nodata: f64,
            _request: &StatRequest,
        ) -> std::result::Result<ZonalStats, ZonalError> {
            self.0.get(path).cloned().ok_or_else(|| ZonalError::Format {
                path: path.to_path_buf(),
                reason: "unreadable".into(),
            })
        }
    }

    fn stats(count: f64, mean: f64) -> ZonalStats {
        ZonalStats::new()
            .with(StatKind::Count, Some(count))
            .with(StatKind::Nodata, Some(0.0))
            .with(StatKind::Mean, Some(mean))
            .with(StatKind::Max, Some(9.0))
    }

    fn source(label: &str, name: &str, bounds: BoundingBox) -> SourceDescriptor {
        SourceDescriptor {
            label: label.to_string(),
            file_name: name.to_string(),
            file_path: PathBuf::from(name),
            bounds,
            nodata: -9999.0,
            stats: StatRequest::default(),
            selected: true,
        }
    }

    fn unit() -> SpatialUnit {
        SpatialUnit::new(
            UnitId::Int(1120000010),
            Geometry::rectangle(&BoundingBox::new(2.0, 4.0, 2.0, 4.0)),
            Some("172114300100".parse().unwrap()),
            Some(24.3),
        )
        .unwrap()
    }

    #[test]
    fn test_attribute_merges_intersecting_sources() {
        let catalogue = SourceCatalogue::new(vec![
            source("lulc", "a.asc", BoundingBox::new(0.0, 10.0, 0.0, 10.0)),
            source("lulc", "b.asc", BoundingBox::new(3.0, 20.0, 0.0, 10.0)),
            source("lulc", "far.asc", BoundingBox::new(50.0, 60.0, 50.0, 60.0)),
        ]);
        let zonal = Canned(HashMap::from([
            (PathBuf::from("a.asc"), stats(100.0, 0.4)),
            (PathBuf::from("b.asc"), stats(50.0, 0.6)),
        ]));
        let record = BasinAttributor::new(catalogue, zonal).attribute(&unit()).unwrap();

        assert!(!record.partial());
        assert_eq!(record.area, Some(24.3));
        let lulc = &record.stats["lulc"];
        assert_eq!(lulc.get(StatKind::Count), Some(Some(150.0)));
        let mean = lulc.get(StatKind::Mean).flatten().unwrap();
        assert!((mean - 0.46666666).abs() < 1e-6);
        // Only the requested kinds are kept.
        assert_eq!(lulc.get(StatKind::Max), None);

        let evals: Vec<_> = lulc.src_file().iter().map(|p| (p.file_name.as_str(), p.bounds_eval)).collect();
        assert_eq!(
            evals,
            vec![("a.asc", IntersectionResult::Contained), ("b.asc", IntersectionResult::Partial)]
        );
    }

    #[test]
    fn test_failed_source_marks_record_partial() {
        let catalogue = SourceCatalogue::new(vec![
            source("lulc", "a.asc", BoundingBox::new(0.0, 10.0, 0.0, 10.0)),
            source("pop", "broken.asc", BoundingBox::new(0.0, 10.0, 0.0, 10.0)),
        ]);
        let zonal = Canned(HashMap::from([(PathBuf::from("a.asc"), stats(10.0, 1.0))]));
        let record = BasinAttributor::new(catalogue, zonal).attribute(&unit()).unwrap();

        assert!(record.partial());
        assert_eq!(record.failed_sources, vec!["broken.asc".to_string()]);
        assert!(record.stats.contains_key("lulc"));
        assert!(!record.stats.contains_key("pop"));
    }

    #[test]
    fn test_unselected_and_disjoint_sources_are_skipped() {
        let mut off = source("lulc", "off.asc", BoundingBox::new(0.0, 10.0, 0.0, 10.0));
        off.selected = false;
        let catalogue = SourceCatalogue::new(vec![
            off,
            source("lulc", "far.asc", BoundingBox::new(50.0, 60.0, 50.0, 60.0)),
        ]);
        let record = BasinAttributor::new(catalogue, Canned(HashMap::new()))
            .attribute(&unit())
            .unwrap();
        assert!(record.stats.is_empty());
        assert!(!record.partial());
    }

    #[test]
    fn test_missing_requested_statistic_is_fatal() {
        let catalogue = SourceCatalogue::new(vec![source("lulc", "a.asc", BoundingBox::new(0.0, 10.0, 0.0, 10.0))]);
        let incomplete = ZonalStats::new().with(StatKind::Count, Some(1.0));
        let zonal = Canned(HashMap::from([(PathBuf::from("a.asc"), incomplete)]));
        let err = BasinAttributor::new(catalogue, zonal).attribute(&unit()).unwrap_err();
        assert!(matches!(err, Error::MissingStatistic { kind: StatKind::Nodata, .. }));
        assert!(err.is_fatal());
    }
}
