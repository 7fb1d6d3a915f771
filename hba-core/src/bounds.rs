//! Axis-aligned bounding boxes and the intersection gate that decides
//! whether a source is worth computing statistics for.

use serde::{Deserialize, Serialize};

/// Bounding box in the shared coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

/// Spatial relationship between a unit's box and a source's box.
///
/// Outcomes are mutually exclusive: a contained box is never reported as
/// partial even though it also overlaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntersectionResult {
    Contained,
    Partial,
    None,
}

impl IntersectionResult {
    /// `false` only for `None`; callers skip the source entirely then.
    pub fn intersects(self) -> bool {
        !matches!(self, IntersectionResult::None)
    }
}

impl BoundingBox {
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
        BoundingBox {
            xmin,
            xmax,
            ymin,
            ymax,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.xmin.is_finite() && self.xmax.is_finite() && self.ymin.is_finite() && self.ymax.is_finite()
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Smallest box covering a sequence of points, `None` when empty.
    pub fn from_points<I>(points: I) -> Option<BoundingBox>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        points.into_iter().fold(None, |acc, (x, y)| {
            Some(match acc {
                None => BoundingBox::new(x, x, y, y),
                Some(b) => BoundingBox::new(b.xmin.min(x), b.xmax.max(x), b.ymin.min(y), b.ymax.max(y)),
            })
        })
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.xmin.min(other.xmin),
            self.xmax.max(other.xmax),
            self.ymin.min(other.ymin),
            self.ymax.max(other.ymax),
        )
    }

    /// Closed-interval containment of `self` within `outer`.
    pub fn within(&self, outer: &BoundingBox) -> bool {
        self.xmin >= outer.xmin
            && self.ymin >= outer.ymin
            && self.xmax <= outer.xmax
            && self.ymax <= outer.ymax
    }

    /// Open-interval overlap on both axes; touching edges do not overlap.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        self.xmin < other.xmax
            && self.xmax > other.xmin
            && self.ymin < other.ymax
            && self.ymax > other.ymin
    }
}

/// Classify a unit's bounds against a source's bounds.
pub fn classify(unit: &BoundingBox, source: &BoundingBox) -> IntersectionResult {
    if unit.within(source) {
        IntersectionResult::Contained
    } else if unit.overlaps(source) {
        IntersectionResult::Partial
    } else {
        IntersectionResult::None
    }
}
