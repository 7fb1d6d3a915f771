//! Pfafstetter rollups and flat tabular views of attributed records.
//!
//! Rollup rules per statistic kind:
//! - `mean`: each record's mean is multiplied by its own area, summed
//!   within the group, then divided by the summed area of the records
//!   that had a value.
//! - `min` / `max`: group minimum / maximum.
//! - `sum`, `count`, `nodata`: group sum.
//!
//! A null value excludes that record from that column only.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Write;

use hba_core::pfaf::MAX_LEVEL;
use hba_core::stat::CombineRule;
use hba_core::{Error, PfafCode, Record, StatKind};
use hba_utils::pfaf::level_field;

use crate::error::Result;

/// One output column: a label and a statistic kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnKey {
    pub label: String,
    pub kind: StatKind,
}

impl ColumnKey {
    pub fn new(label: impl Into<String>, kind: StatKind) -> Self {
        ColumnKey {
            label: label.into(),
            kind,
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kind.key(&self.label))
    }
}

/// A record staged for rollup; mean columns already hold `mean * area`.
#[derive(Debug, Clone, PartialEq)]
pub struct PrepRow {
    pub pfaf_id: PfafCode,
    /// `None` when the record has no finite area.
    pub area: Option<f64>,
    pub values: BTreeMap<ColumnKey, f64>,
}

/// Stage records for rollup. Records without a code cannot be placed and
/// are skipped with a warning. Records without an area keep every column
/// except their means, which cannot be weighted.
pub fn summary_prep(records: &[Record]) -> Vec<PrepRow> {
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let Some(pfaf_id) = record.pfaf_id.clone() else {
            log::warn!("rollup: record {} has no pfaf_id, skipping", record.id);
            continue;
        };
        let area = record.area.filter(|a| a.is_finite());
        if area.is_none() {
            log::warn!("rollup: record {} has no sub_area, its means are left out", record.id);
        }
        let values = record
            .stats
            .iter()
            .flat_map(|(label, stat)| {
                stat.values().filter_map(move |(kind, value)| {
                    let v = value?;
                    let staged = if kind == StatKind::Mean { v * area? } else { v };
                    Some((ColumnKey::new(label.as_str(), kind), staged))
                })
            })
            .collect();
        rows.push(PrepRow { pfaf_id, area, values });
    }
    rows
}

/// One basin at the target level.
#[derive(Debug, Clone, PartialEq)]
pub struct RollupRecord {
    pub pfaf_id: PfafCode,
    pub level: usize,
    /// Summed area of the records in the group that have one.
    pub area: f64,
    pub basin_count: usize,
    pub values: BTreeMap<ColumnKey, f64>,
}

#[derive(Default)]
struct Group {
    area: f64,
    basin_count: usize,
    values: BTreeMap<ColumnKey, f64>,
    /// Area behind each mean column.
    mean_area: BTreeMap<ColumnKey, f64>,
}

/// Roll records up to the codes at `level`, sorted by code.
pub fn summarize(records: &[Record], level: usize) -> Result<Vec<RollupRecord>> {
    if level == 0 || level > MAX_LEVEL {
        return Err(Error::InvalidPfaf(format!("level {} is outside 1..={}", level, MAX_LEVEL)).into());
    }
    let mut groups: BTreeMap<PfafCode, Group> = BTreeMap::new();
    for row in summary_prep(records) {
        let code = match row.pfaf_id.truncate(level) {
            Ok(code) => code,
            Err(e) => {
                log::warn!("rollup: {} cannot be rolled up to level {}: {}", row.pfaf_id, level, e);
                continue;
            }
        };
        let group = groups.entry(code).or_default();
        let area = row.area.unwrap_or(0.0);
        group.area += area;
        group.basin_count += 1;
        for (key, v) in row.values {
            if key.kind == StatKind::Mean {
                *group.mean_area.entry(key.clone()).or_insert(0.0) += area;
            }
            group
                .values
                .entry(key.clone())
                .and_modify(|current| {
                    *current = match key.kind.combine_rule() {
                        CombineRule::Minimum => current.min(v),
                        CombineRule::Maximum => current.max(v),
                        CombineRule::Add | CombineRule::CountWeighted => *current + v,
                    }
                })
                .or_insert(v);
        }
    }

    let rollup: Vec<RollupRecord> = groups
        .into_iter()
        .map(|(pfaf_id, group)| {
            let mean_area = group.mean_area;
            let values = group
                .values
                .into_iter()
                .filter_map(|(key, v)| {
                    if key.kind != StatKind::Mean {
                        return Some((key, v));
                    }
                    let area = mean_area.get(&key).copied().unwrap_or(0.0);
                    (area != 0.0).then(|| (key, v / area))
                })
                .collect();
            RollupRecord {
                pfaf_id,
                level,
                area: group.area,
                basin_count: group.basin_count,
                values,
            }
        })
        .collect();
    log::info!("rollup: {} records into {} level {} basins", records.len(), rollup.len(), level);
    Ok(rollup)
}

fn columns<'a, I>(maps: I) -> Vec<ColumnKey>
where
    I: IntoIterator<Item = &'a BTreeMap<ColumnKey, f64>>,
{
    maps.into_iter()
        .flat_map(|m| m.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn cell(value: Option<&f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write `pfaf_NN,sub_area,basin_count,{label}_{kind}...`.
pub fn write_rollup_csv<W: Write>(writer: W, level: usize, rollup: &[RollupRecord]) -> Result<()> {
    let columns = columns(rollup.iter().map(|r| &r.values));
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec![level_field(level), "sub_area".to_string(), "basin_count".to_string()];
    header.extend(columns.iter().map(ColumnKey::to_string));
    wtr.write_record(&header)?;
    for r in rollup {
        let mut row = vec![r.pfaf_id.to_string(), r.area.to_string(), r.basin_count.to_string()];
        row.extend(columns.iter().map(|c| cell(r.values.get(c))));
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write records as `id,pfaf_id,sub_area,{label}_{kind}...`, dropping
/// provenance. Null statistics become empty cells.
pub fn write_flat_csv<W: Write>(writer: W, records: &[Record]) -> Result<()> {
    let flat: Vec<BTreeMap<ColumnKey, f64>> = records
        .iter()
        .map(|r| {
            r.stats
                .iter()
                .flat_map(|(label, stat)| {
                    stat.values()
                        .filter_map(move |(kind, v)| v.map(|v| (ColumnKey::new(label.as_str(), kind), v)))
                })
                .collect()
        })
        .collect();
    let columns = columns(&flat);

    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec!["id".to_string(), "pfaf_id".to_string(), "sub_area".to_string()];
    header.extend(columns.iter().map(ColumnKey::to_string));
    wtr.write_record(&header)?;
    for (record, values) in records.iter().zip(&flat) {
        let mut row = vec![
            record.id.to_string(),
            record.pfaf_id.as_ref().map(|p| p.to_string()).unwrap_or_default(),
            cell(record.area.as_ref()),
        ];
        row.extend(columns.iter().map(|c| cell(values.get(c))));
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    log::info!("flatten: wrote {} records with {} statistic columns", records.len(), columns.len());
    Ok(())
}
