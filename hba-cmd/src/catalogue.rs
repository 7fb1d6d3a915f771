//! Building the source catalogue from grid files and a user control file.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use log::{info, warn};
use serde_json::{json, Value};

use hba_core::CatalogueEntry;
use hba_data::AsciiGrid;
use hba_utils::files::{find_files, FoundFile};

/// Columns every control row must fill in.
const REQUIRED_COLUMNS: [&str; 4] = ["file_name", "label", "variable", "summary_type"];

/// Find grids, join them with the control CSV and write the catalogue.
pub fn run_catalogue(
    directory: &str,
    control: &str,
    output: &str,
    prefix: Option<&str>,
    suffix: Option<&str>,
) -> anyhow::Result<()> {
    let files = find_files(Path::new(directory), prefix, suffix)?;
    let control_rows = read_control(&std::fs::read_to_string(control)?)?;
    let entries = build_catalogue(&files, &control_rows);

    let selected = entries.iter().filter(|e| e.selected()).count();
    let mut writer = hba_utils::io::create_writer(Path::new(output))?;
    serde_json::to_writer_pretty(&mut writer, &entries)?;
    writer.flush()?;
    info!(
        "Catalogue complete. {} files, {} flagged for processing. Output: {}",
        entries.len(),
        selected,
        output
    );
    Ok(())
}

type ControlRow = HashMap<String, String>;

/// Parse the control CSV into rows keyed by trimmed column name.
pub fn read_control(csv_data: &str) -> anyhow::Result<Vec<ControlRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if !headers.iter().any(|h| h == "file_name") {
        anyhow::bail!("control file has no file_name column");
    }
    let mut rows = Vec::new();
    for result in rdr.records() {
        let r = result?;
        rows.push(
            headers
                .iter()
                .cloned()
                .zip(r.iter().map(|v| v.trim().to_string()))
                .collect(),
        );
    }
    info!("Loaded {} control rows", rows.len());
    Ok(rows)
}

/// One catalogue entry per file. Files that are unreadable, absent from
/// the control rows, listed more than once, or listed with empty required
/// fields are kept with `to_summarize = false` and a message.
pub fn build_catalogue(files: &[FoundFile], control: &[ControlRow]) -> Vec<CatalogueEntry> {
    files.iter().map(|file| catalogue_entry(file, control)).collect()
}

fn catalogue_entry(file: &FoundFile, control: &[ControlRow]) -> CatalogueEntry {
    let mut entry = CatalogueEntry {
        file_name: Some(file.file_name.clone()),
        file_path: Some(file.file_path.clone()),
        ..CatalogueEntry::default()
    };
    let mut problems: Vec<String> = Vec::new();

    match AsciiGrid::read_header(&file.file_path) {
        Ok(header) => {
            let b = header.bounds();
            entry.bounds = Some(json!({"xmin": b.xmin, "xmax": b.xmax, "ymin": b.ymin, "ymax": b.ymax}));
            entry.no_data_val = header.nodata;
            entry.pixel_size = Some(header.cellsize);
            if header.nodata.is_none() {
                problems.push(format!("{} has no NODATA_value", file.file_name));
            }
        }
        Err(e) => problems.push(e.to_string()),
    }

    let rows: Vec<&ControlRow> = control
        .iter()
        .filter(|r| r.get("file_name").map(String::as_str) == Some(file.file_name.as_str()))
        .collect();
    match rows.as_slice() {
        [] => problems.push(format!("{} is not in control_file", file.file_name)),
        [row] => {
            let missing: Vec<&str> = REQUIRED_COLUMNS
                .iter()
                .copied()
                .filter(|c| row.get(*c).map_or(true, |v| v.is_empty()))
                .collect();
            if !missing.is_empty() {
                problems.push(format!("{} has missing fields {:?}", file.file_name, missing));
            }
            let value = |key: &str| row.get(key).filter(|v| !v.is_empty()).cloned();
            entry.label = value("label");
            entry.variable = value("variable");
            entry.summary_type = value("summary_type");
            entry.stats = value("stats");
        }
        _ => problems.push(format!("{} duplicated in control_file", file.file_name)),
    }

    if problems.is_empty() {
        entry.to_summarize = Some(Value::Bool(true));
    } else {
        let message = problems.join("; ");
        warn!("Not summarizing {}: {}", file.file_name, message);
        entry.to_summarize = Some(Value::Bool(false));
        entry.message = Some(message);
    }
    entry
}
