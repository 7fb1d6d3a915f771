//! Loading spatial units from GeoJSON feature collections.

use std::path::Path;

use geojson::{Feature, GeoJson, Position, Value as GeoValue};
use serde_json::Value as JsonValue;

use hba_core::unit::Ring;
use hba_core::{Geometry, PfafCode, Polygon, SpatialUnit, UnitId};

use crate::batch::UnitFailure;
use crate::error::{DataError, Result};

/// Names of the feature properties carrying unit attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitFields {
    pub id_field: String,
    pub pfaf_field: Option<String>,
    pub area_field: Option<String>,
}

impl Default for UnitFields {
    fn default() -> Self {
        UnitFields {
            id_field: "HYBAS_ID".to_string(),
            pfaf_field: Some("PFAF_ID".to_string()),
            area_field: Some("SUB_AREA".to_string()),
        }
    }
}

/// Units read from a feature collection, plus the features that could not
/// become units. Together they account for every input feature.
#[derive(Debug, Default)]
pub struct LoadedUnits {
    pub units: Vec<SpatialUnit>,
    pub skipped: Vec<UnitFailure>,
}

impl LoadedUnits {
    /// Number of features in the input.
    pub fn feature_count(&self) -> usize {
        self.units.len() + self.skipped.len()
    }
}

/// Read units from a GeoJSON file (`.gz` accepted).
pub fn load_units(path: &Path, fields: &UnitFields) -> Result<LoadedUnits> {
    let text = hba_utils::io::read_to_string(path).map_err(|e| {
        DataError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    })?;
    let loaded = units_from_geojson(&text, fields)?;
    log::info!(
        "units: Loaded {} units from {} ({} features skipped)",
        loaded.units.len(),
        path.display(),
        loaded.skipped.len()
    );
    Ok(loaded)
}

/// Parse units from GeoJSON text.
///
/// Features without a usable (Multi)Polygon geometry are skipped with a
/// warning and listed in [`LoadedUnits::skipped`]. A feature missing the
/// id property is an error.
pub fn units_from_geojson(text: &str, fields: &UnitFields) -> Result<LoadedUnits> {
    let features = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => {
            return Err(hba_core::Error::InvalidUnit("expected features, found a bare geometry".into()).into());
        }
    };

    let mut loaded = LoadedUnits {
        units: Vec::with_capacity(features.len()),
        skipped: Vec::new(),
    };
    for (i, feature) in features.iter().enumerate() {
        let id = feature_id(feature, &fields.id_field)?;
        match unit(feature, id.clone(), fields) {
            Ok(unit) => loaded.units.push(unit),
            Err(e) if !e.is_fatal() => {
                log::warn!("units: skipping feature {} ({}): {}", i, id, e);
                loaded.skipped.push(UnitFailure {
                    id,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(loaded)
}

fn unit(feature: &Feature, id: UnitId, fields: &UnitFields) -> Result<SpatialUnit> {
    let geometry = match feature.geometry.as_ref().map(|g| &g.value) {
        Some(GeoValue::Polygon(rings)) => Geometry::new(vec![polygon(rings)?]),
        Some(GeoValue::MultiPolygon(polys)) => {
            Geometry::new(polys.iter().map(|p| polygon(p)).collect::<Result<_>>()?)
        }
        Some(other) => {
            return Err(hba_core::Error::InvalidUnit(format!("{} geometry is not a polygon", kind(other))).into())
        }
        None => return Err(hba_core::Error::InvalidUnit("feature has no geometry".into()).into()),
    };

    let pfaf_id = match &fields.pfaf_field {
        Some(field) => feature_pfaf(feature, field)?,
        None => None,
    };
    let area = fields
        .area_field
        .as_ref()
        .and_then(|field| property(feature, field))
        .and_then(number);

    Ok(SpatialUnit::new(id, geometry, pfaf_id, area)?)
}

fn property<'a>(feature: &'a Feature, field: &str) -> Option<&'a JsonValue> {
    feature.property(field).filter(|v| !v.is_null())
}

fn number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn feature_id(feature: &Feature, field: &str) -> Result<UnitId> {
    match property(feature, field) {
        Some(JsonValue::Number(n)) => match n.as_i64() {
            Some(i) => Ok(UnitId::Int(i)),
            // Shapefile exports often write integer ids as floats.
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| UnitId::Int(f as i64))
                .ok_or_else(|| invalid(field, &n.to_string())),
        },
        Some(JsonValue::String(s)) => Ok(UnitId::from(s.as_str())),
        Some(other) => Err(invalid(field, &other.to_string())),
        None => Err(DataError::MissingColumn(field.to_string())),
    }
}

fn feature_pfaf(feature: &Feature, field: &str) -> Result<Option<PfafCode>> {
    match property(feature, field) {
        None => Ok(None),
        Some(JsonValue::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
            .ok_or_else(|| invalid(field, &n.to_string()))
            .and_then(|code| Ok(Some(PfafCode::try_from(code)?))),
        Some(JsonValue::String(s)) => Ok(Some(s.parse()?)),
        Some(other) => Err(invalid(field, &other.to_string())),
    }
}

fn invalid(field: &str, value: &str) -> DataError {
    DataError::InvalidValue {
        row: 0,
        column: field.to_string(),
        value: value.to_string(),
    }
}

fn kind(value: &GeoValue) -> &'static str {
    match value {
        GeoValue::Point(_) => "Point",
        GeoValue::MultiPoint(_) => "MultiPoint",
        GeoValue::LineString(_) => "LineString",
        GeoValue::MultiLineString(_) => "MultiLineString",
        GeoValue::Polygon(_) => "Polygon",
        GeoValue::MultiPolygon(_) => "MultiPolygon",
        GeoValue::GeometryCollection(_) => "GeometryCollection",
    }
}

fn polygon(rings: &[Vec<Position>]) -> Result<Polygon> {
    let mut rings = rings.iter().map(|r| ring(r));
    let exterior = rings
        .next()
        .ok_or_else(|| hba_core::Error::InvalidUnit("polygon without exterior ring".into()))??;
    let holes = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, holes))
}

fn ring(positions: &[Position]) -> Result<Ring> {
    positions
        .iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] => Ok((*x, *y)),
            _ => Err(DataError::from(hba_core::Error::InvalidUnit(format!(
                "position {:?} has fewer than 2 coordinates",
                p
            )))),
        })
        .collect()
}
