//! Statistic kinds, their combination rules and zonal results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Statistics requested from a source when its catalogue entry names none.
pub const DEFAULT_STATS: &str = "nodata count mean";

/// One kind of zonal statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKind {
    Count,
    Nodata,
    Sum,
    Mean,
    Min,
    Max,
}

/// How two values of the same kind from different sources are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineRule {
    /// Arithmetic addition.
    Add,
    /// Mean recombined by pixel count.
    CountWeighted,
    /// Keep the smaller value.
    Minimum,
    /// Keep the larger value.
    Maximum,
}

impl StatKind {
    pub const ALL: [StatKind; 6] = [
        StatKind::Count,
        StatKind::Nodata,
        StatKind::Sum,
        StatKind::Mean,
        StatKind::Min,
        StatKind::Max,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatKind::Count => "count",
            StatKind::Nodata => "nodata",
            StatKind::Sum => "sum",
            StatKind::Mean => "mean",
            StatKind::Min => "min",
            StatKind::Max => "max",
        }
    }

    pub fn combine_rule(self) -> CombineRule {
        match self {
            StatKind::Count | StatKind::Nodata | StatKind::Sum => CombineRule::Add,
            StatKind::Mean => CombineRule::CountWeighted,
            StatKind::Min => CombineRule::Minimum,
            StatKind::Max => CombineRule::Maximum,
        }
    }

    /// Column key for a label, e.g. `lulc_mean`.
    pub fn key(self, label: &str) -> String {
        format!("{}_{}", label, self.as_str())
    }

    /// Split a `{label}_{kind}` key back into its parts.
    pub fn split_key(key: &str) -> Option<(&str, StatKind)> {
        let (label, suffix) = key.rsplit_once('_')?;
        let kind = suffix.parse().ok()?;
        if label.is_empty() {
            return None;
        }
        Some((label, kind))
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "count" => Ok(StatKind::Count),
            "nodata" => Ok(StatKind::Nodata),
            "sum" => Ok(StatKind::Sum),
            "mean" => Ok(StatKind::Mean),
            "min" => Ok(StatKind::Min),
            "max" => Ok(StatKind::Max),
            other => Err(format!("unknown statistic '{}'", other)),
        }
    }
}

/// Ordered, duplicate-free set of statistic kinds requested from a source.
///
/// A request for `mean` always carries `count`, which the mean
/// recombination needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRequest(Vec<StatKind>);

impl StatRequest {
    pub fn new<I: IntoIterator<Item = StatKind>>(kinds: I) -> Self {
        let mut kinds: Vec<StatKind> = kinds.into_iter().collect();
        if kinds.contains(&StatKind::Mean) {
            kinds.push(StatKind::Count);
        }
        kinds.sort();
        kinds.dedup();
        StatRequest(kinds)
    }

    /// Parse a whitespace separated list such as `"nodata count mean"`.
    pub fn parse(s: &str) -> Result<Self, String> {
        let kinds = s
            .split_whitespace()
            .map(StatKind::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        if kinds.is_empty() {
            return Err("no statistics requested".to_string());
        }
        Ok(StatRequest::new(kinds))
    }

    pub fn kinds(&self) -> &[StatKind] {
        &self.0
    }

    pub fn contains(&self, kind: StatKind) -> bool {
        self.0.contains(&kind)
    }
}

impl Default for StatRequest {
    fn default() -> Self {
        StatRequest::new([StatKind::Nodata, StatKind::Count, StatKind::Mean])
    }
}

impl fmt::Display for StatRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|k| k.as_str()).collect();
        f.write_str(&names.join(" "))
    }
}

/// Zonal statistics for one geometry against one source.
///
/// A kind is present when it was computed; its value is `None` when it is
/// undefined, which happens for `mean`/`min`/`max` over zero valid cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZonalStats {
    values: BTreeMap<StatKind, Option<f64>>,
}

impl ZonalStats {
    pub fn new() -> Self {
        ZonalStats::default()
    }

    pub fn with(mut self, kind: StatKind, value: Option<f64>) -> Self {
        self.values.insert(kind, value);
        self
    }

    pub fn set(&mut self, kind: StatKind, value: Option<f64>) {
        self.values.insert(kind, value);
    }

    /// `None` when the kind was never computed, `Some(None)` when undefined.
    pub fn get(&self, kind: StatKind) -> Option<Option<f64>> {
        self.values.get(&kind).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StatKind, Option<f64>)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    /// Keep only the requested kinds.
    pub fn restrict(&self, request: &StatRequest) -> ZonalStats {
        ZonalStats {
            values: self
                .values
                .iter()
                .filter(|(k, _)| request.contains(**k))
                .map(|(k, v)| (*k, *v))
                .collect(),
        }
    }
}
