//! Rollup and flatten commands over attributed records.

use std::io::Write;
use std::path::Path;

use log::info;

use hba_core::Record;
use hba_data::{summarize, write_flat_csv, write_rollup_csv};
use hba_utils::pfaf::{level_field, parse_level};

/// Read a records JSON array (`.gz` accepted).
pub fn read_records(path: &str) -> anyhow::Result<Vec<Record>> {
    let text = hba_utils::io::read_to_string(Path::new(path))?;
    let records: Vec<Record> = serde_json::from_str(&text)?;
    info!("Loaded {} records from {}", records.len(), path);
    Ok(records)
}

pub fn run_rollup(records: &str, level: &str, output: &str) -> anyhow::Result<()> {
    let level = parse_level(level)?;
    let records = read_records(records)?;
    let rollup = summarize(&records, level)?;

    let mut writer = hba_utils::io::create_writer(Path::new(output))?;
    write_rollup_csv(&mut writer, level, &rollup)?;
    writer.flush()?;
    info!(
        "Rollup complete. {} {} basins written to {}",
        rollup.len(),
        level_field(level),
        output
    );
    Ok(())
}

pub fn run_flatten(records: &str, output: &str) -> anyhow::Result<()> {
    let records = read_records(records)?;
    let mut writer = hba_utils::io::create_writer(Path::new(output))?;
    write_flat_csv(&mut writer, &records)?;
    writer.flush()?;
    info!("Flatten complete. Output: {}", output);
    Ok(())
}
