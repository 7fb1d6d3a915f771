use std::fs;
use std::path::Path;

use hba_core::{CatalogueEntry, SourceCatalogue, StatKind};
use hba_data::{
    attribute_batch, load_units, summarize, AsciiGrid, AttributeConfig, BasinAttributor, ColumnKey,
    GridZonalStats, UnitFields,
};
use serde_json::{json, Value};

/// 15 x 10 grid of 0.4 whose eastern five columns are nodata.
fn west_tile() -> String {
    let mut text = String::from("ncols 15\nnrows 10\nxllcorner 0\nyllcorner 0\ncellsize 1\nNODATA_value -9999\n");
    for _ in 0..10 {
        let row: Vec<&str> = (0..15).map(|c| if c < 10 { "0.4" } else { "-9999" }).collect();
        text.push_str(&row.join(" "));
        text.push('\n');
    }
    text
}

/// 10 x 10 grid of 0.6 starting at x = 10.
fn east_tile() -> String {
    let mut text = String::from("ncols 10\nnrows 10\nxllcorner 10\nyllcorner 0\ncellsize 1\nNODATA_value -9999\n");
    for _ in 0..10 {
        text.push_str(&vec!["0.6"; 10].join(" "));
        text.push('\n');
    }
    text
}

fn entry(path: &Path, label: &str) -> CatalogueEntry {
    let header = AsciiGrid::read_header(path).unwrap();
    let b = header.bounds();
    CatalogueEntry {
        label: Some(label.to_string()),
        file_name: Some(path.file_name().unwrap().to_string_lossy().into_owned()),
        file_path: Some(path.to_path_buf()),
        bounds: Some(json!({"xmin": b.xmin, "xmax": b.xmax, "ymin": b.ymin, "ymax": b.ymax})),
        no_data_val: header.nodata,
        ..CatalogueEntry::default()
    }
}

const UNITS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature",
     "properties": {"HYBAS_ID": 1120000010, "PFAF_ID": 172114300100, "SUB_AREA": 150.0},
     "geometry": {"type": "Polygon", "coordinates": [[[0,0],[15,0],[15,10],[0,10],[0,0]]]}},
    {"type": "Feature",
     "properties": {"HYBAS_ID": 1120000020, "PFAF_ID": 172114300200, "SUB_AREA": 50.0},
     "geometry": {"type": "Polygon", "coordinates": [[[100,100],[105,100],[105,110],[100,110],[100,100]]]}}
  ]
}"#;

#[test]
fn test_two_tiles_accumulate_into_one_record() {
    let dir = tempfile::tempdir().unwrap();
    let west = dir.path().join("lulc_west.asc");
    let east = dir.path().join("lulc_east.asc");
    fs::write(&west, west_tile()).unwrap();
    fs::write(&east, east_tile()).unwrap();
    let units_path = dir.path().join("basins.geojson");
    fs::write(&units_path, UNITS).unwrap();

    let entries = vec![entry(&west, "lulc"), entry(&east, "lulc")];
    let catalogue_path = dir.path().join("catalogue.json");
    fs::write(&catalogue_path, serde_json::to_string(&entries).unwrap()).unwrap();

    let catalogue = SourceCatalogue::from_path(&catalogue_path).unwrap();
    let loaded = load_units(&units_path, &UnitFields::default()).unwrap();
    assert!(loaded.skipped.is_empty());
    let attributor = BasinAttributor::new(catalogue, GridZonalStats::new());
    let outcome = attribute_batch(&attributor, &loaded.units, &AttributeConfig { threads: Some(2) }).unwrap();
    assert!(outcome.complete());
    assert_eq!(outcome.partial_count(), 0);

    let mut records = outcome.records;
    records.sort_by(|a, b| a.id.cmp(&b.id));
    let json: Value = serde_json::to_value(&records).unwrap();

    let basin = &json[0];
    assert_eq!(basin["id"], json!(1120000010));
    assert_eq!(basin["pfaf_id"], json!(172114300100u64));
    assert_eq!(basin["lulc"]["lulc_count"], json!(150));
    assert_eq!(basin["lulc"]["lulc_nodata"], json!(50));
    let mean = basin["lulc"]["lulc_mean"].as_f64().unwrap();
    assert!((mean - 70.0 / 150.0).abs() < 1e-9, "mean {}", mean);
    assert_eq!(
        basin["lulc"]["src_file"],
        json!([
            {"file_name": "lulc_west.asc", "bounds_eval": "contained"},
            {"file_name": "lulc_east.asc", "bounds_eval": "partial"}
        ])
    );
    assert_eq!(basin["partial"], json!(false));

    // No tile reaches the second basin.
    assert!(json[1].get("lulc").is_none());

    // Records survive a JSON round trip and roll up to level 2.
    let reread: Vec<hba_core::Record> = serde_json::from_value(json).unwrap();
    let rollup = summarize(&reread, 2).unwrap();
    assert_eq!(rollup.len(), 1);
    assert_eq!(rollup[0].area, 200.0);
    assert_eq!(rollup[0].basin_count, 2);
    let rolled = rollup[0].values[&ColumnKey::new("lulc", StatKind::Mean)];
    assert!((rolled - 70.0 / 150.0).abs() < 1e-9);
}
