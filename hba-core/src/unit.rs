//! Spatial units (basins, lake watersheds) and their polygon geometry.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bounds::BoundingBox;
use crate::error::{Error, Result};
use crate::pfaf::PfafCode;

/// Identifier of a spatial unit; HydroBASINS ids are integers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnitId {
    Int(i64),
    Text(String),
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitId::Int(v) => write!(f, "{}", v),
            UnitId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for UnitId {
    fn from(value: i64) -> Self {
        UnitId::Int(value)
    }
}

impl From<&str> for UnitId {
    fn from(value: &str) -> Self {
        match value.trim().parse::<i64>() {
            Ok(v) => UnitId::Int(v),
            Err(_) => UnitId::Text(value.to_string()),
        }
    }
}

/// A closed ring of (x, y) vertices.
pub type Ring = Vec<(f64, f64)>;

/// Polygon with one exterior ring and any number of holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub exterior: Ring,
    pub holes: Vec<Ring>,
}

impl Polygon {
    pub fn new(exterior: Ring, holes: Vec<Ring>) -> Self {
        Polygon { exterior, holes }
    }

    /// Even-odd point test; points inside a hole are outside the polygon.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        ring_contains(&self.exterior, x, y) && !self.holes.iter().any(|h| ring_contains(h, x, y))
    }
}

fn ring_contains(ring: &[(f64, f64)], x: f64, y: f64) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Union of polygons making up one unit's footprint.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    polygons: Vec<Polygon>,
}

impl Geometry {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Geometry { polygons }
    }

    /// Axis-aligned rectangle, handy for units known only by their box.
    pub fn rectangle(b: &BoundingBox) -> Self {
        Geometry::new(vec![Polygon::new(
            vec![
                (b.xmin, b.ymin),
                (b.xmax, b.ymin),
                (b.xmax, b.ymax),
                (b.xmin, b.ymax),
                (b.xmin, b.ymin),
            ],
            Vec::new(),
        )])
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.polygons.iter().any(|p| p.contains(x, y))
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(
            self.polygons
                .iter()
                .flat_map(|p| p.exterior.iter().copied()),
        )
    }
}

/// A basin or lake watershed to attribute.
#[derive(Debug, Clone)]
pub struct SpatialUnit {
    pub id: UnitId,
    pub bounds: BoundingBox,
    pub pfaf_id: Option<PfafCode>,
    pub area: Option<f64>,
    pub geometry: Geometry,
}

impl SpatialUnit {
    /// Build a unit whose bounds are derived from its geometry.
    pub fn new(
        id: UnitId,
        geometry: Geometry,
        pfaf_id: Option<PfafCode>,
        area: Option<f64>,
    ) -> Result<Self> {
        let bounds = geometry
            .bounds()
            .ok_or_else(|| Error::InvalidUnit(format!("unit {} has empty geometry", id)))?;
        if !bounds.is_finite() {
            return Err(Error::InvalidUnit(format!("unit {} has non-finite coordinates", id)));
        }
        Ok(SpatialUnit {
            id,
            bounds,
            pfaf_id,
            area,
            geometry,
        })
    }
}
