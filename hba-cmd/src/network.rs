//! Network index import and upstream aggregation commands.

use std::io::Write;
use std::path::Path;

use log::info;

use hba_data::{upstream_batch, write_upstream_csv, LocalValueTable, UpstreamConfig};
use hba_db::Database;

/// Load a network CSV into the (possibly new) index database.
pub fn run_network_import(input: &str, network: &str) -> anyhow::Result<()> {
    let db = Database::open(Path::new(network))?;
    let reader = hba_utils::io::open_reader(Path::new(input))?;
    let loaded = db.load_network_reader(reader)?;
    info!(
        "Network import complete. {} basins loaded, {} in index {}",
        loaded,
        db.basin_count()?,
        network
    );
    Ok(())
}

/// Upstream summaries for every basin of the local values table.
pub fn run_upstream(
    network: &str,
    local: &str,
    id_column: &str,
    columns: &[String],
    weight_column: Option<&str>,
    config: &UpstreamConfig,
    output: &str,
) -> anyhow::Result<()> {
    let network_path = Path::new(network);
    if !network_path.is_file() {
        anyhow::bail!("Network index {} not found. Run network-import first.", network);
    }
    let db = Database::open(network_path)?;
    let reader = hba_utils::io::open_reader(Path::new(local))?;
    let table = LocalValueTable::from_csv_reader(reader, id_column, columns, weight_column)?;

    let ids: Vec<_> = table.ids().collect();
    let mut summaries = upstream_batch(&db, &table, &ids, config)?;
    summaries.sort_by_key(|s| s.hybas_id);

    let mut writer = hba_utils::io::create_writer(Path::new(output))?;
    write_upstream_csv(&mut writer, table.columns(), &summaries)?;
    writer.flush()?;
    info!(
        "Upstream {} complete. {} basins written to {}",
        config.summary_type,
        summaries.len(),
        output
    );
    Ok(())
}
