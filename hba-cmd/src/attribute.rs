//! The attribute command: records JSON plus a manifest for gap detection.

use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;

use hba_core::SourceCatalogue;
use hba_data::{
    attribute_batch, load_units, AttributeConfig, BasinAttributor, BatchOutcome, GridZonalStats, UnitFailure,
    UnitFields,
};
use hba_utils::timing::{timestamp, Stopwatch};

/// Written next to the records so an incomplete batch is detectable.
#[derive(Debug, Serialize)]
pub struct Manifest {
    pub records_file: String,
    pub expected: usize,
    pub emitted: usize,
    pub partial: usize,
    pub complete: bool,
    pub failed: Vec<UnitFailure>,
    pub generated_at: String,
}

impl Manifest {
    pub fn new(records_file: &str, outcome: &BatchOutcome, stopwatch: &Stopwatch) -> Self {
        Manifest {
            records_file: records_file.to_string(),
            expected: outcome.expected,
            emitted: outcome.records.len(),
            partial: outcome.partial_count(),
            complete: outcome.complete(),
            failed: outcome.failures.clone(),
            generated_at: timestamp(&stopwatch.started()),
        }
    }
}

/// `out/lulc.json.gz` -> `out/lulc.manifest.json`
pub fn manifest_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = name.strip_suffix(".gz").unwrap_or(&name);
    let stem = base.strip_suffix(".json").unwrap_or(base);
    output.with_file_name(format!("{}.manifest.json", stem))
}

pub fn run_attribute(
    catalogue: &str,
    units: &str,
    output: &str,
    fields: &UnitFields,
    threads: Option<usize>,
) -> anyhow::Result<()> {
    let stopwatch = Stopwatch::start();
    let catalogue = SourceCatalogue::from_path(Path::new(catalogue))?;
    let loaded = load_units(Path::new(units), fields)?;
    let attributor = BasinAttributor::new(catalogue, GridZonalStats::new());

    let mut outcome = attribute_batch(&attributor, &loaded.units, &AttributeConfig { threads })?;
    outcome.add_skipped(&loaded.skipped);

    let output_path = Path::new(output);
    let mut writer = hba_utils::io::create_writer(output_path)?;
    serde_json::to_writer(&mut writer, &outcome.records)?;
    writer.flush()?;

    let manifest = Manifest::new(output, &outcome, &stopwatch);
    let manifest_file = manifest_path(output_path);
    std::fs::write(&manifest_file, serde_json::to_string_pretty(&manifest)?)?;

    if !manifest.complete {
        warn!(
            "{} of {} units were not attributed; see {}",
            manifest.expected - manifest.emitted,
            manifest.expected,
            manifest_file.display()
        );
    }
    info!(
        "Attribution complete. {} records ({} partial) in {:.1}s. Output: {}",
        manifest.emitted,
        manifest.partial,
        stopwatch.elapsed_seconds(),
        output
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_path() {
        assert_eq!(manifest_path(Path::new("out/lulc.json")), Path::new("out/lulc.manifest.json"));
        assert_eq!(manifest_path(Path::new("out/lulc.json.gz")), Path::new("out/lulc.manifest.json"));
        assert_eq!(manifest_path(Path::new("records")), Path::new("records.manifest.json"));
    }

    const BASIN: &str = r#"{"type": "Feature", "properties": {"HYBAS_ID": 7, "PFAF_ID": 11, "SUB_AREA": 4.0},
        "geometry": {"type": "Polygon", "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]]}}"#;

    /// Writes a 2x2 `pop` grid and its catalogue, returning the catalogue path.
    fn write_sources(dir: &Path) -> PathBuf {
        let grid = dir.join("pop.asc");
        std::fs::write(
            &grid,
            "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\nNODATA_value -1\n1 2\n3 -1\n",
        )
        .unwrap();
        let catalogue = dir.join("catalogue.json");
        std::fs::write(
            &catalogue,
            serde_json::json!([{
                "label": "pop",
                "file_name": "pop.asc",
                "file_path": grid,
                "bounds": {"xmin": 0, "xmax": 2, "ymin": 0, "ymax": 2},
                "no_data_val": -1,
                "stats": "sum count nodata"
            }])
            .to_string(),
        )
        .unwrap();
        catalogue
    }

    #[test]
    fn test_run_attribute_writes_records_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let catalogue = write_sources(dir.path());
        let units = dir.path().join("units.geojson");
        std::fs::write(
            &units,
            format!(r#"{{"type": "FeatureCollection", "features": [{}]}}"#, BASIN),
        )
        .unwrap();
        let output = dir.path().join("records.json.gz");

        run_attribute(
            catalogue.to_str().unwrap(),
            units.to_str().unwrap(),
            output.to_str().unwrap(),
            &UnitFields::default(),
            Some(1),
        )
        .unwrap();

        let text = hba_utils::io::read_to_string(&output).unwrap();
        let records: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(records[0]["pop"]["pop_sum"], serde_json::json!(6.0));
        assert_eq!(records[0]["pop"]["pop_count"], serde_json::json!(3));
        assert_eq!(records[0]["pop"]["pop_nodata"], serde_json::json!(1));

        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("records.manifest.json")).unwrap()).unwrap();
        assert_eq!(manifest["expected"], 1);
        assert_eq!(manifest["emitted"], 1);
        assert_eq!(manifest["complete"], true);
    }

    #[test]
    fn test_manifest_lists_unusable_features() {
        let dir = tempfile::tempdir().unwrap();
        let catalogue = write_sources(dir.path());
        let units = dir.path().join("units.geojson");
        std::fs::write(
            &units,
            format!(
                r#"{{"type": "FeatureCollection", "features": [{}, {}]}}"#,
                BASIN,
                r#"{"type": "Feature", "properties": {"HYBAS_ID": 8},
                    "geometry": {"type": "Polygon", "coordinates": [[]]}}"#
            ),
        )
        .unwrap();
        let output = dir.path().join("records.json");

        run_attribute(
            catalogue.to_str().unwrap(),
            units.to_str().unwrap(),
            output.to_str().unwrap(),
            &UnitFields::default(),
            Some(1),
        )
        .unwrap();

        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("records.manifest.json")).unwrap()).unwrap();
        assert_eq!(manifest["expected"], 2);
        assert_eq!(manifest["emitted"], 1);
        assert_eq!(manifest["complete"], false);
        assert_eq!(manifest["failed"][0]["id"], 8);
    }
}
