//! Upstream aggregation of per-basin local values over the river network.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use rayon::prelude::*;

use hba_core::{BasinId, Error, NetworkIndex, PfafCode};
use hba_utils::timing::Stopwatch;

use crate::batch::thread_pool;
use crate::error::{DataError, Result};

/// How summed upstream values are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryType {
    /// Raw column sums.
    #[default]
    Sum,
    /// Column sums divided by the basin's cumulative drainage area.
    AreaWeightedMean,
}

impl FromStr for SummaryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "sum" => Ok(SummaryType::Sum),
            "area_weighted_mean" => Ok(SummaryType::AreaWeightedMean),
            other => Err(format!("unknown summary type '{}'", other)),
        }
    }
}

impl fmt::Display for SummaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SummaryType::Sum => "sum",
            SummaryType::AreaWeightedMean => "area_weighted_mean",
        })
    }
}

/// Whether the target basin is added to its stored upstream set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelfInclusion {
    /// Always add the basin itself.
    #[default]
    Include,
    /// Use the stored set unchanged.
    AsStored,
}

#[derive(Debug, Clone, Default)]
pub struct UpstreamConfig {
    pub summary_type: SummaryType,
    pub self_inclusion: SelfInclusion,
    /// Worker threads; all cores when unset.
    pub threads: Option<usize>,
}

/// Local (per-basin) values keyed by basin id, one column per variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalValueTable {
    columns: Vec<String>,
    rows: BTreeMap<BasinId, Vec<f64>>,
}

impl LocalValueTable {
    /// Every row must have one value per column; a repeated id is an error.
    pub fn from_rows<I>(columns: Vec<String>, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (BasinId, Vec<f64>)>,
    {
        let mut table = LocalValueTable {
            columns,
            rows: BTreeMap::new(),
        };
        for (i, (id, values)) in rows.into_iter().enumerate() {
            if values.len() != table.columns.len() {
                return Err(DataError::InvalidValue {
                    row: i + 1,
                    column: "*".to_string(),
                    value: format!("{} values for {} columns", values.len(), table.columns.len()),
                });
            }
            table.insert(i + 1, id, values)?;
        }
        Ok(table)
    }

    /// Read `id_col` and `var_cols` from CSV. With a `weight_col`, each
    /// variable is multiplied by the row's weight (area or length).
    pub fn from_csv_reader<R: Read>(
        reader: R,
        id_col: &str,
        var_cols: &[String],
        weight_col: Option<&str>,
    ) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();
        let position = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| DataError::MissingColumn(name.to_string()))
        };
        let id_idx = position(id_col)?;
        let var_idx = var_cols.iter().map(|c| position(c.as_str())).collect::<Result<Vec<_>>>()?;
        let weight_idx = weight_col.map(|w| position(w)).transpose()?;

        let mut table = LocalValueTable {
            columns: var_cols.to_vec(),
            rows: BTreeMap::new(),
        };
        for (i, row) in rdr.records().enumerate() {
            let row = row?;
            let line = i + 1;
            let cell = |idx: usize, column: &str| -> Result<f64> {
                let raw = row.get(idx).unwrap_or("").trim();
                raw.parse::<f64>().map_err(|_| DataError::InvalidValue {
                    row: line,
                    column: column.to_string(),
                    value: raw.to_string(),
                })
            };
            let id = cell(id_idx, id_col)?;
            if id.fract() != 0.0 {
                return Err(DataError::InvalidValue {
                    row: line,
                    column: id_col.to_string(),
                    value: id.to_string(),
                });
            }
            let weight = match (weight_idx, weight_col) {
                (Some(idx), Some(name)) => cell(idx, name)?,
                _ => 1.0,
            };
            let values = var_idx
                .iter()
                .zip(var_cols)
                .map(|(&idx, name)| cell(idx, name.as_str()).map(|v| v * weight))
                .collect::<Result<Vec<_>>>()?;
            table.insert(line, id as BasinId, values)?;
        }
        log::info!(
            "network: Loaded {} local rows with {} columns{}",
            table.len(),
            table.columns.len(),
            weight_col.map(|w| format!(" weighted by {}", w)).unwrap_or_default()
        );
        Ok(table)
    }

    fn insert(&mut self, row: usize, id: BasinId, values: Vec<f64>) -> Result<()> {
        if self.rows.insert(id, values).is_some() {
            return Err(DataError::InvalidValue {
                row,
                column: "id".to_string(),
                value: format!("duplicate basin {}", id),
            });
        }
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, id: BasinId) -> Option<&[f64]> {
        self.rows.get(&id).map(Vec::as_slice)
    }

    /// Basin ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = BasinId> + '_ {
        self.rows.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Upstream totals for one basin; `values` follow the table's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamSummary {
    pub hybas_id: BasinId,
    pub pfaf_id: PfafCode,
    pub values: Vec<f64>,
    /// Basins of the upstream set that had a row in the local table.
    pub matched: usize,
}

/// Sum local values over the basin's upstream network.
///
/// Fails with [`Error::BasinNotFound`] when the index has no record for
/// `basin_id`, and with [`Error::InvalidArea`] when an area-weighted mean
/// is requested for a basin without positive `tot_area`.
pub fn upstream_summary<I: NetworkIndex + ?Sized>(
    index: &I,
    table: &LocalValueTable,
    basin_id: BasinId,
    config: &UpstreamConfig,
) -> hba_core::Result<UpstreamSummary> {
    let record = index.get(basin_id)?;
    let mut upstream: BTreeSet<BasinId> = record.up_seg_ids.iter().copied().collect();
    if config.self_inclusion == SelfInclusion::Include {
        upstream.insert(record.id);
    }

    let mut values = vec![0.0; table.columns.len()];
    let mut matched = 0;
    for row in upstream.iter().filter_map(|id| table.get(*id)) {
        matched += 1;
        for (total, v) in values.iter_mut().zip(row) {
            *total += v;
        }
    }

    if config.summary_type == SummaryType::AreaWeightedMean {
        if !(record.tot_area > 0.0) {
            return Err(Error::InvalidArea {
                id: record.id.to_string(),
                area: record.tot_area,
            });
        }
        values.iter_mut().for_each(|v| *v /= record.tot_area);
    }

    Ok(UpstreamSummary {
        hybas_id: record.id,
        pfaf_id: record.pfaf_id,
        values,
        matched,
    })
}

/// Upstream summaries for many basins in parallel.
///
/// Any basin missing from the index aborts the run. Basins with unusable
/// areas are skipped with a warning.
pub fn upstream_batch<I: NetworkIndex + Sync + ?Sized>(
    index: &I,
    table: &LocalValueTable,
    basin_ids: &[BasinId],
    config: &UpstreamConfig,
) -> Result<Vec<UpstreamSummary>> {
    let stopwatch = Stopwatch::start();
    let pool = thread_pool(config.threads)?;
    let results = pool.install(|| {
        basin_ids
            .par_iter()
            .map(|&id| match upstream_summary(index, table, id, config) {
                Ok(summary) => Ok(Some(summary)),
                Err(e) if e.is_fatal() => Err(e),
                Err(e) => {
                    log::warn!("network: skipping basin {}: {}", id, e);
                    Ok(None)
                }
            })
            .collect::<hba_core::Result<Vec<_>>>()
    })?;
    let summaries: Vec<UpstreamSummary> = results.into_iter().flatten().collect();
    log::info!(
        "network: {} upstream summaries ({}) for {} basins in {:.1}s",
        summaries.len(),
        config.summary_type,
        basin_ids.len(),
        stopwatch.elapsed_seconds()
    );
    Ok(summaries)
}

/// Write `hybas_id,pfaf_id,{column}_up...` rows.
pub fn write_upstream_csv<W: Write>(writer: W, columns: &[String], summaries: &[UpstreamSummary]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec!["hybas_id".to_string(), "pfaf_id".to_string()];
    header.extend(columns.iter().map(|c| format!("{}_up", c)));
    wtr.write_record(&header)?;
    for s in summaries {
        let mut row = vec![s.hybas_id.to_string(), s.pfaf_id.to_string()];
        row.extend(s.values.iter().map(|v| v.to_string()));
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}
