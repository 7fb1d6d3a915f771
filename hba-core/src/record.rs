//! The attributed record emitted for one spatial unit.
//!
//! Serialized flat: one nested object per label plus the unit's scalar
//! attributes, e.g.
//! ```text
//! {"lulc": {"lulc_count": 150, "lulc_mean": 0.4667, "lulc_nodata": 0,
//!           "src_file": [{"file_name": "a.asc", "bounds_eval": "contained"}]},
//!  "id": 1120000010, "pfaf_id": 172114300100, "sub_area": 24.3, "partial": false}
//! ```

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::accumulator::AccumulatedStat;
use crate::error::{Error, Result};
use crate::pfaf::PfafCode;
use crate::unit::UnitId;

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: UnitId,
    pub pfaf_id: Option<PfafCode>,
    pub area: Option<f64>,
    pub stats: BTreeMap<String, AccumulatedStat>,
    /// Sources whose statistics could not be computed for this unit.
    pub failed_sources: Vec<String>,
}

impl Record {
    /// `true` when at least one source failed and the record is incomplete.
    pub fn partial(&self) -> bool {
        !self.failed_sources.is_empty()
    }

    pub fn from_json(value: Value) -> Result<Record> {
        let mut object = match value {
            Value::Object(o) => o,
            other => return Err(Error::InvalidRecord(format!("expected object, got {}", other))),
        };
        let id: UnitId = object
            .remove("id")
            .ok_or_else(|| Error::InvalidRecord("missing id".into()))
            .and_then(|v| serde_json::from_value(v).map_err(Error::from))?;
        let pfaf_id = match object.remove("pfaf_id") {
            None | Some(Value::Null) => None,
            Some(v) => Some(serde_json::from_value(v)?),
        };
        let area = object.remove("sub_area").and_then(|v| v.as_f64());
        let failed_sources = match object.remove("failed_sources") {
            None | Some(Value::Null) => Vec::new(),
            Some(v) => serde_json::from_value(v)?,
        };
        object.remove("partial");

        let stats = object
            .iter()
            .map(|(label, v)| AccumulatedStat::from_json(label, v).map(|s| (label.clone(), s)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(Record {
            id,
            pfaf_id,
            area,
            stats,
            failed_sources,
        })
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (label, stat) in &self.stats {
            map.serialize_entry(label, stat)?;
        }
        map.serialize_entry("id", &self.id)?;
        if let Some(pfaf) = &self.pfaf_id {
            map.serialize_entry("pfaf_id", pfaf)?;
        }
        if let Some(area) = self.area {
            map.serialize_entry("sub_area", &area)?;
        }
        map.serialize_entry("partial", &self.partial())?;
        if self.partial() {
            map.serialize_entry("failed_sources", &self.failed_sources)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Record::from_json(value).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::{Provenance, StatAccumulator};
    use crate::bounds::IntersectionResult;
    use crate::stat::{StatKind, ZonalStats};

    fn sample() -> Record {
        let mut acc = StatAccumulator::new();
        acc.merge(
            "lulc",
            &ZonalStats::new()
                .with(StatKind::Count, Some(100.0))
                .with(StatKind::Nodata, Some(0.0))
                .with(StatKind::Mean, Some(0.4)),
            Provenance::new("lulc_a.asc", IntersectionResult::Contained),
        )
        .unwrap();
        Record {
            id: UnitId::Int(1120000010),
            pfaf_id: Some("172114300100".parse().unwrap()),
            area: Some(24.3),
            stats: acc.into_stats(),
            failed_sources: Vec::new(),
        }
    }

    #[test]
    fn test_flat_layout() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["id"], serde_json::json!(1120000010));
        assert_eq!(json["pfaf_id"], serde_json::json!(172114300100u64));
        assert_eq!(json["lulc"]["lulc_count"], serde_json::json!(100));
        assert_eq!(json["partial"], serde_json::json!(false));
        assert!(json.get("failed_sources").is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let record = sample();
        let text = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_partial_flag() {
        let mut record = sample();
        record.failed_sources.push("pop.asc".into());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["partial"], serde_json::json!(true));
        assert_eq!(json["failed_sources"][0], "pop.asc");
    }

    #[test]
    fn test_missing_id_rejected() {
        let err = Record::from_json(serde_json::json!({"lulc": {}})).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(_)));
    }
}
