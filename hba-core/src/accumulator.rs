//! Per-unit accumulation of zonal statistics across source files.
//!
//! Several sources may carry the same label (tiles of one variable). The
//! first source for a label is stored verbatim; later ones are folded in
//! with the [`CombineRule`] of each statistic kind.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::bounds::IntersectionResult;
use crate::error::{Error, Result};
use crate::stat::{CombineRule, StatKind, ZonalStats};

/// Which file contributed to a statistic and how it overlapped the unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub file_name: String,
    pub bounds_eval: IntersectionResult,
}

impl Provenance {
    pub fn new(file_name: impl Into<String>, bounds_eval: IntersectionResult) -> Self {
        Provenance {
            file_name: file_name.into(),
            bounds_eval,
        }
    }
}

/// Running summary of one label for one spatial unit.
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatedStat {
    label: String,
    values: BTreeMap<StatKind, Option<f64>>,
    /// Pixel count of the sources that supplied a mean.
    mean_weight: f64,
    src_file: Vec<Provenance>,
}

/// Count behind a source's mean, zero when it supplied no mean.
fn mean_weight(zonal: &ZonalStats) -> f64 {
    match zonal.get(StatKind::Mean) {
        Some(_) => zonal.get(StatKind::Count).flatten().unwrap_or(0.0),
        None => 0.0,
    }
}

impl AccumulatedStat {
    /// Summary holding a single source's values verbatim.
    pub fn first(label: &str, zonal: &ZonalStats, provenance: Provenance) -> Self {
        AccumulatedStat {
            label: label.to_string(),
            values: zonal.iter().collect(),
            mean_weight: mean_weight(zonal),
            src_file: vec![provenance],
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// `None` when the kind was never computed, `Some(None)` when undefined.
    pub fn get(&self, kind: StatKind) -> Option<Option<f64>> {
        self.values.get(&kind).copied()
    }

    pub fn values(&self) -> impl Iterator<Item = (StatKind, Option<f64>)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    pub fn src_file(&self) -> &[Provenance] {
        &self.src_file
    }

    /// New summary with another source folded in. `self` is left untouched.
    pub fn combined(&self, zonal: &ZonalStats, provenance: Provenance) -> Result<AccumulatedStat> {
        let mut values = self.values.clone();
        for (kind, incoming) in zonal.iter() {
            let merged = match self.values.get(&kind) {
                None => incoming,
                Some(&current) => match kind.combine_rule() {
                    CombineRule::Add => add(current, incoming),
                    CombineRule::Minimum => pick(current, incoming, |a, b| b < a),
                    CombineRule::Maximum => pick(current, incoming, |a, b| b > a),
                    CombineRule::CountWeighted => {
                        let additional_count = zonal
                            .get(StatKind::Count)
                            .ok_or_else(|| self.missing(StatKind::Count))?;
                        Some(weighted_mean(self.mean_weight, current, additional_count, incoming))
                    }
                },
            };
            values.insert(kind, merged);
        }

        let mut src_file = self.src_file.clone();
        src_file.push(provenance);
        Ok(AccumulatedStat {
            label: self.label.clone(),
            values,
            mean_weight: self.mean_weight + mean_weight(zonal),
            src_file,
        })
    }

    fn missing(&self, kind: StatKind) -> Error {
        Error::MissingStatistic {
            label: self.label.clone(),
            kind,
        }
    }

    /// Rebuild from the nested object written for one label of a record.
    pub fn from_json(label: &str, value: &Value) -> Result<AccumulatedStat> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidRecord(format!("label {} is not an object", label)))?;
        let mut values = BTreeMap::new();
        let mut src_file = Vec::new();
        for (key, v) in object {
            if key == "src_file" {
                src_file = serde_json::from_value(v.clone())?;
                continue;
            }
            match StatKind::split_key(key) {
                Some((key_label, kind)) if key_label == label => {
                    values.insert(kind, v.as_f64());
                }
                _ => log::debug!("ignoring key {} under label {}", key, label),
            }
        }
        let mean_weight = match values.get(&StatKind::Mean) {
            Some(_) => values.get(&StatKind::Count).copied().flatten().unwrap_or(0.0),
            None => 0.0,
        };
        Ok(AccumulatedStat {
            label: label.to_string(),
            values,
            mean_weight,
            src_file,
        })
    }
}

impl Serialize for AccumulatedStat {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        for (kind, value) in &self.values {
            let key = kind.key(&self.label);
            match (kind, value) {
                (StatKind::Count | StatKind::Nodata, Some(v)) if v.fract() == 0.0 && *v >= 0.0 => {
                    map.serialize_entry(&key, &(*v as u64))?
                }
                _ => map.serialize_entry(&key, value)?,
            }
        }
        map.serialize_entry("src_file", &self.src_file)?;
        map.end()
    }
}

fn add(current: Option<f64>, incoming: Option<f64>) -> Option<f64> {
    match (current, incoming) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
    }
}

fn pick(current: Option<f64>, incoming: Option<f64>, replaces: impl Fn(f64, f64) -> bool) -> Option<f64> {
    match (current, incoming) {
        (Some(a), Some(b)) if replaces(a, b) => Some(b),
        (Some(a), _) => Some(a),
        (None, b) => b,
    }
}

/// Pixel-count weighted recombination of two means; undefined operands
/// count as zero and a zero combined count yields zero. `current_count`
/// only covers sources that supplied a mean.
fn weighted_mean(
    current_count: f64,
    current_mean: Option<f64>,
    additional_count: Option<f64>,
    additional_mean: Option<f64>,
) -> f64 {
    let additional_count = additional_count.unwrap_or(0.0);
    let total = current_count + additional_count;
    if total > 0.0 {
        (current_count * current_mean.unwrap_or(0.0) + additional_count * additional_mean.unwrap_or(0.0))
            / total
    } else {
        0.0
    }
}

/// Every label accumulated so far for one spatial unit.
///
/// Owned by exactly one unit's processing and consumed into its record.
#[derive(Debug, Clone, Default)]
pub struct StatAccumulator {
    stats: BTreeMap<String, AccumulatedStat>,
}

impl StatAccumulator {
    pub fn new() -> Self {
        StatAccumulator::default()
    }

    /// Fold one source's zonal result into the summary for `label`.
    pub fn merge(&mut self, label: &str, zonal: &ZonalStats, provenance: Provenance) -> Result<()> {
        let next = match self.stats.get(label) {
            Some(existing) => existing.combined(zonal, provenance)?,
            None => AccumulatedStat::first(label, zonal, provenance),
        };
        self.stats.insert(label.to_string(), next);
        Ok(())
    }

    pub fn get(&self, label: &str) -> Option<&AccumulatedStat> {
        self.stats.get(label)
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn into_stats(self) -> BTreeMap<String, AccumulatedStat> {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zonal(count: f64, mean: Option<f64>, min: Option<f64>, max: Option<f64>) -> ZonalStats {
        ZonalStats::new()
            .with(StatKind::Count, Some(count))
            .with(StatKind::Nodata, Some(2.0))
            .with(StatKind::Sum, mean.map(|m| m * count))
            .with(StatKind::Mean, mean)
            .with(StatKind::Min, min)
            .with(StatKind::Max, max)
    }

    fn provenance(name: &str) -> Provenance {
        Provenance::new(name, IntersectionResult::Partial)
    }

    fn permutations(items: &[usize]) -> Vec<Vec<usize>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn test_first_source_stored_verbatim() {
        let mut acc = StatAccumulator::new();
        let z = zonal(10.0, Some(5.0), Some(1.0), Some(9.0));
        acc.merge("lulc", &z, provenance("a.asc")).unwrap();
        let stat = acc.get("lulc").unwrap();
        assert_eq!(stat.get(StatKind::Mean), Some(Some(5.0)));
        assert_eq!(stat.src_file().len(), 1);
    }

    #[test]
    fn test_mean_combination() {
        let mut acc = StatAccumulator::new();
        acc.merge("lulc", &zonal(10.0, Some(5.0), None, None), provenance("a.asc"))
            .unwrap();
        acc.merge("lulc", &zonal(10.0, Some(7.0), None, None), provenance("b.asc"))
            .unwrap();
        let stat = acc.get("lulc").unwrap();
        assert_eq!(stat.get(StatKind::Count), Some(Some(20.0)));
        assert_eq!(stat.get(StatKind::Mean), Some(Some(6.0)));
        assert_eq!(stat.get(StatKind::Nodata), Some(Some(4.0)));
    }

    #[test]
    fn test_zero_count_source_leaves_mean_unchanged() {
        let mut acc = StatAccumulator::new();
        acc.merge("pop", &zonal(8.0, Some(3.5), Some(1.0), Some(6.0)), provenance("a.asc"))
            .unwrap();
        acc.merge("pop", &zonal(0.0, None, None, None), provenance("b.asc"))
            .unwrap();
        let stat = acc.get("pop").unwrap();
        assert_eq!(stat.get(StatKind::Mean), Some(Some(3.5)));
        assert_eq!(stat.get(StatKind::Count), Some(Some(8.0)));
        assert_eq!(stat.get(StatKind::Min), Some(Some(1.0)));
        assert_eq!(stat.get(StatKind::Max), Some(Some(6.0)));
    }

    #[test]
    fn test_undefined_first_mean_is_replaced() {
        let mut acc = StatAccumulator::new();
        acc.merge("pop", &zonal(0.0, None, None, None), provenance("a.asc"))
            .unwrap();
        acc.merge("pop", &zonal(4.0, Some(2.5), Some(2.0), Some(3.0)), provenance("b.asc"))
            .unwrap();
        let stat = acc.get("pop").unwrap();
        assert_eq!(stat.get(StatKind::Mean), Some(Some(2.5)));
        assert_eq!(stat.get(StatKind::Min), Some(Some(2.0)));
    }

    #[test]
    fn test_all_zero_counts_give_zero_mean() {
        let mut acc = StatAccumulator::new();
        acc.merge("pop", &zonal(0.0, None, None, None), provenance("a.asc"))
            .unwrap();
        acc.merge("pop", &zonal(0.0, None, None, None), provenance("b.asc"))
            .unwrap();
        assert_eq!(acc.get("pop").unwrap().get(StatKind::Mean), Some(Some(0.0)));
    }

    #[test]
    fn test_min_max_keep_extremes() {
        let mut acc = StatAccumulator::new();
        acc.merge("elev", &zonal(5.0, Some(10.0), Some(3.0), Some(20.0)), provenance("a.asc"))
            .unwrap();
        acc.merge("elev", &zonal(5.0, Some(10.0), Some(1.0), Some(15.0)), provenance("b.asc"))
            .unwrap();
        let stat = acc.get("elev").unwrap();
        assert_eq!(stat.get(StatKind::Min), Some(Some(1.0)));
        assert_eq!(stat.get(StatKind::Max), Some(Some(20.0)));
    }

    #[test]
    fn test_provenance_is_appended() {
        let mut acc = StatAccumulator::new();
        for name in ["a.asc", "b.asc", "c.asc"] {
            acc.merge("lulc", &zonal(1.0, Some(1.0), None, None), provenance(name))
                .unwrap();
        }
        let names: Vec<&str> = acc
            .get("lulc")
            .unwrap()
            .src_file()
            .iter()
            .map(|p| p.file_name.as_str())
            .collect();
        assert_eq!(names, vec!["a.asc", "b.asc", "c.asc"]);
    }

    #[test]
    fn test_labels_do_not_mix() {
        let mut acc = StatAccumulator::new();
        acc.merge("lulc", &zonal(1.0, Some(1.0), None, None), provenance("a.asc"))
            .unwrap();
        acc.merge("pop", &zonal(3.0, Some(9.0), None, None), provenance("b.asc"))
            .unwrap();
        assert_eq!(acc.len(), 2);
        assert_eq!(acc.get("lulc").unwrap().get(StatKind::Count), Some(Some(1.0)));
    }

    #[test]
    fn test_mean_without_count_is_fatal() {
        let first = ZonalStats::new().with(StatKind::Mean, Some(1.0));
        let mut acc = StatAccumulator::new();
        acc.merge("lulc", &first, provenance("a.asc")).unwrap();
        let err = acc.merge("lulc", &first, provenance("b.asc")).unwrap_err();
        assert!(matches!(err, Error::MissingStatistic { kind: StatKind::Count, .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_merge_order_invariance() {
        let sources = vec![
            zonal(100.0, Some(0.4), Some(0.1), Some(0.9)),
            zonal(50.0, Some(0.6), Some(0.2), Some(1.0)),
            zonal(0.0, None, None, None),
            zonal(25.0, Some(0.3), Some(0.05), Some(0.7)),
        ];
        let mut reference: Option<AccumulatedStat> = None;
        for order in permutations(&[0, 1, 2, 3]) {
            let mut acc = StatAccumulator::new();
            for i in &order {
                acc.merge("lulc", &sources[*i], provenance("tile.asc")).unwrap();
            }
            let stat = acc.get("lulc").unwrap().clone();
            match &reference {
                None => reference = Some(stat),
                Some(r) => {
                    for kind in [StatKind::Count, StatKind::Nodata, StatKind::Min, StatKind::Max] {
                        assert_eq!(stat.get(kind), r.get(kind), "{} differs for {:?}", kind, order);
                    }
                    let a = stat.get(StatKind::Sum).unwrap().unwrap();
                    let b = r.get(StatKind::Sum).unwrap().unwrap();
                    assert!((a - b).abs() < 1e-9);
                    let a = stat.get(StatKind::Mean).unwrap().unwrap();
                    let b = r.get(StatKind::Mean).unwrap().unwrap();
                    assert!((a - b).abs() < 1e-9, "mean differs for {:?}: {} vs {}", order, a, b);
                }
            }
        }
        let r = reference.unwrap();
        assert_eq!(r.get(StatKind::Count), Some(Some(175.0)));
        assert_eq!(r.get(StatKind::Min), Some(Some(0.05)));
        assert_eq!(r.get(StatKind::Max), Some(Some(1.0)));
    }

    #[test]
    fn test_count_only_source_does_not_weight_mean() {
        let sources = vec![
            ZonalStats::new().with(StatKind::Count, Some(5.0)),
            ZonalStats::new()
                .with(StatKind::Count, Some(10.0))
                .with(StatKind::Mean, Some(1.0)),
            ZonalStats::new()
                .with(StatKind::Count, Some(10.0))
                .with(StatKind::Mean, Some(3.0)),
        ];
        for order in permutations(&[0, 1, 2]) {
            let mut acc = StatAccumulator::new();
            for i in &order {
                acc.merge("lulc", &sources[*i], provenance("tile.asc")).unwrap();
            }
            let stat = acc.get("lulc").unwrap();
            assert_eq!(stat.get(StatKind::Count), Some(Some(25.0)));
            let mean = stat.get(StatKind::Mean).unwrap().unwrap();
            assert!((mean - 2.0).abs() < 1e-9, "mean {} for {:?}", mean, order);
        }
    }

    #[test]
    fn test_serialize_uses_label_prefixed_keys() {
        let stat = AccumulatedStat::first(
            "lulc",
            &ZonalStats::new()
                .with(StatKind::Count, Some(150.0))
                .with(StatKind::Mean, None),
            Provenance::new("lulc_a.asc", IntersectionResult::Contained),
        );
        let json = serde_json::to_value(&stat).unwrap();
        assert_eq!(json["lulc_count"], serde_json::json!(150));
        assert!(json["lulc_mean"].is_null());
        assert_eq!(json["src_file"][0]["bounds_eval"], "contained");

        let back = AccumulatedStat::from_json("lulc", &json).unwrap();
        assert_eq!(back, stat);
    }
}
