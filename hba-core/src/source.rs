//! Source catalogue: the raster files to attribute and their metadata.
//!
//! The catalogue is a JSON array of entries, one per file. Several files
//! may share a label when they are tiles of the same variable.
//!
//! # Example entry
//! ```text
//! {"label": "lulc", "file_name": "lulc_af.asc", "file_path": "data/var/lulc_af.asc",
//!  "bounds": {"xmin": -20.0, "xmax": 55.0, "ymin": -35.0, "ymax": 38.0},
//!  "no_data_val": -9999, "to_summarize": 1, "stats": "nodata count mean"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::bounds::BoundingBox;
use crate::error::{Error, Result};
use crate::stat::StatRequest;

/// Keys a record uses besides its labels; no label may take one of these.
pub const RESERVED_KEYS: [&str; 5] = ["id", "pfaf_id", "sub_area", "partial", "failed_sources"];

/// One catalogue entry as written on disk. Every field is optional here so
/// that incomplete entries can be reported precisely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogueEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_data_val: Option<f64>,
    /// `true`/`false` or the legacy `1`/`0`; absent means selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_summarize: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CatalogueEntry {
    pub fn selected(&self) -> bool {
        match &self.to_summarize {
            None | Some(Value::Null) => true,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
            Some(Value::String(s)) => matches!(s.trim(), "1" | "true" | "True" | "yes"),
            Some(_) => false,
        }
    }

    fn display_name(&self) -> String {
        self.file_name
            .clone()
            .or_else(|| self.file_path.as_ref().map(|p| p.display().to_string()))
            .unwrap_or_else(|| "<unnamed>".to_string())
    }
}

/// A validated source ready for attribution.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    pub label: String,
    pub file_name: String,
    pub file_path: PathBuf,
    pub bounds: BoundingBox,
    pub nodata: f64,
    pub stats: StatRequest,
    pub selected: bool,
}

impl TryFrom<&CatalogueEntry> for SourceDescriptor {
    type Error = Error;

    fn try_from(entry: &CatalogueEntry) -> Result<Self> {
        let name = entry.display_name();
        let config = |reason: String| Error::Configuration {
            file_name: name.clone(),
            reason,
        };

        let label = entry
            .label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| config("missing label".into()))?;
        if RESERVED_KEYS.contains(&label) {
            return Err(config(format!("label '{}' is reserved", label)));
        }
        let file_name = entry
            .file_name
            .clone()
            .ok_or_else(|| config("missing file_name".into()))?;
        let file_path = entry
            .file_path
            .clone()
            .ok_or_else(|| config("missing file_path".into()))?;
        let bounds = entry
            .bounds
            .as_ref()
            .ok_or_else(|| config("missing bounds".into()))
            .and_then(|b| parse_bounds(b).map_err(config))?;
        let nodata = entry
            .no_data_val
            .ok_or_else(|| config("missing no_data_val".into()))?;
        let stats = match &entry.stats {
            Some(s) => StatRequest::parse(s).map_err(config)?,
            None => StatRequest::default(),
        };

        Ok(SourceDescriptor {
            label: label.to_string(),
            file_name,
            file_path,
            bounds,
            nodata,
            stats,
            selected: entry.selected(),
        })
    }
}

/// Bounds values may be numbers or numeric strings; all four are required.
fn parse_bounds(value: &Value) -> std::result::Result<BoundingBox, String> {
    let coord = |key: &str| -> std::result::Result<f64, String> {
        let v = value
            .get(key)
            .ok_or_else(|| format!("bounds missing {}", key))?;
        let parsed = match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed {
            Some(f) if f.is_finite() => Ok(f),
            _ => Err(format!("bounds {} is not a finite number", key)),
        }
    };
    Ok(BoundingBox::new(coord("xmin")?, coord("xmax")?, coord("ymin")?, coord("ymax")?))
}

/// The full read-only set of sources handed to every worker.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalogue {
    sources: Vec<SourceDescriptor>,
}

impl SourceCatalogue {
    pub fn new(sources: Vec<SourceDescriptor>) -> Self {
        SourceCatalogue { sources }
    }

    /// Validate entries. Any selected entry with incomplete metadata makes
    /// the whole catalogue invalid; unselected incomplete entries are dropped.
    pub fn from_entries(entries: &[CatalogueEntry]) -> Result<Self> {
        let mut sources = Vec::with_capacity(entries.len());
        for entry in entries {
            match SourceDescriptor::try_from(entry) {
                Ok(source) => sources.push(source),
                Err(e) if entry.selected() => return Err(e),
                Err(e) => log::debug!("dropping unselected catalogue entry: {}", e),
            }
        }
        let catalogue = SourceCatalogue { sources };
        log::info!(
            "Catalogue has {} sources, {} selected, {} labels",
            catalogue.sources.len(),
            catalogue.selected().count(),
            catalogue.labels().len()
        );
        Ok(catalogue)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: Vec<CatalogueEntry> = serde_json::from_str(json)?;
        SourceCatalogue::from_entries(&entries)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        SourceCatalogue::from_json_str(&json)
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub fn selected(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.iter().filter(|s| s.selected)
    }

    /// Distinct labels of the selected sources, sorted.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.selected().map(|s| s.label.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }
}
