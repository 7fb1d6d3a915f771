//! Loading network records into the index.
//!
//! # CSV Format
//!
//! With headers: `basin_id,area,tot_area,pfaf_id,order,up_seg_ids`, where
//! `up_seg_ids` is a list of basin ids separated by spaces or `;`.
//!
//! The store is append-only: loading a basin that is already present fails
//! and rolls back the whole load.

use rusqlite::{params, ErrorCode, Transaction};
use std::io::Read;
use std::str::FromStr;

use hba_core::{BasinId, NetworkRecord, PfafCode};

use crate::{Database, DbError, Result};

impl Database {
    /// Load network records from a CSV string. Returns the number of basins.
    pub fn load_network(&self, csv_data: &str) -> Result<usize> {
        self.load_network_reader(csv_data.as_bytes())
    }

    pub fn load_network_reader<R: Read>(&self, reader: R) -> Result<usize> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut records = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            records.push(parse_row(i + 1, &result?)?);
        }
        self.insert_records(&records)
    }

    /// Insert records in one transaction.
    pub fn insert_records(&self, records: &[NetworkRecord]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut links = 0usize;
        for record in records {
            links += insert(&tx, record)?;
        }
        tx.commit()?;
        log::info!(
            "db: loader: Loaded {} basins with {} upstream links",
            records.len(),
            links
        );
        Ok(records.len())
    }
}

fn insert(tx: &Transaction<'_>, record: &NetworkRecord) -> Result<usize> {
    tx.execute(
        "INSERT INTO basins (basin_id, area, tot_area, pfaf_id, stream_order)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.id,
            record.area,
            record.tot_area,
            record.pfaf_id.as_str(),
            record.order
        ],
    )
    .map_err(|e| match e.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => DbError::Duplicate(record.id),
        _ => DbError::from(e),
    })?;

    let mut stmt = tx.prepare_cached("INSERT OR IGNORE INTO upstream (basin_id, up_id) VALUES (?1, ?2)")?;
    let mut links = 0;
    for up in &record.up_seg_ids {
        links += stmt.execute(params![record.id, up])?;
    }
    Ok(links)
}

fn field<'r>(r: &'r csv::StringRecord, row: usize, idx: usize, name: &str) -> Result<&'r str> {
    match r.get(idx).map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DbError::InvalidRow {
            row,
            reason: format!("missing {}", name),
        }),
    }
}

fn parse_field<T: FromStr>(r: &csv::StringRecord, row: usize, idx: usize, name: &str) -> Result<T> {
    let raw = field(r, row, idx, name)?;
    raw.parse().map_err(|_| DbError::InvalidRow {
        row,
        reason: format!("{} '{}' is not a valid value", name, raw),
    })
}

fn parse_row(row: usize, r: &csv::StringRecord) -> Result<NetworkRecord> {
    let up_seg_ids = r
        .get(5)
        .unwrap_or("")
        .split(|c: char| c == ';' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<BasinId>().map_err(|_| DbError::InvalidRow {
                row,
                reason: format!("upstream id '{}' is not an integer", s),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(NetworkRecord {
        id: parse_field(r, row, 0, "basin_id")?,
        area: parse_field(r, row, 1, "area")?,
        tot_area: parse_field(r, row, 2, "tot_area")?,
        pfaf_id: parse_field::<PfafCode>(r, row, 3, "pfaf_id")?,
        order: parse_field(r, row, 4, "order")?,
        up_seg_ids,
    })
}
