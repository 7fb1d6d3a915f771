//! ESRI ASCII grid reading and zonal statistics over polygon footprints.
//!
//! # Format
//! ```text
//! ncols         4
//! nrows         2
//! xllcorner     0.0
//! yllcorner     0.0
//! cellsize      1.0
//! NODATA_value  -9999
//! 1 2 3 4
//! 5 6 -9999 8
//! ```
//! Rows run north to south. `xllcenter`/`yllcenter` are accepted in place
//! of the corner keys.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use hba_core::{BoundingBox, Geometry, StatKind, StatRequest, ZonalStats};

use crate::error::ZonalError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridHeader {
    pub ncols: usize,
    pub nrows: usize,
    /// West edge of the grid.
    pub xllcorner: f64,
    /// South edge of the grid.
    pub yllcorner: f64,
    pub cellsize: f64,
    pub nodata: Option<f64>,
}

impl GridHeader {
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(
            self.xllcorner,
            self.xllcorner + self.ncols as f64 * self.cellsize,
            self.yllcorner,
            self.yllcorner + self.nrows as f64 * self.cellsize,
        )
    }

    fn parse(lines: &[&str], path: &Path) -> Result<GridHeader, ZonalError> {
        let malformed = |reason: String| ZonalError::Format {
            path: path.to_path_buf(),
            reason,
        };
        let mut ncols = None;
        let mut nrows = None;
        let mut xll = None;
        let mut yll = None;
        let mut x_center = false;
        let mut y_center = false;
        let mut cellsize = None;
        let mut nodata = None;

        for line in lines {
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                return Err(malformed(format!("bad header line '{}'", line)));
            };
            let number: f64 = value
                .parse()
                .map_err(|_| malformed(format!("bad header value '{}'", line)))?;
            match key.to_lowercase().as_str() {
                "ncols" => ncols = Some(number as usize),
                "nrows" => nrows = Some(number as usize),
                "xllcorner" => xll = Some(number),
                "yllcorner" => yll = Some(number),
                "xllcenter" => {
                    xll = Some(number);
                    x_center = true;
                }
                "yllcenter" => {
                    yll = Some(number);
                    y_center = true;
                }
                "cellsize" => cellsize = Some(number),
                "nodata_value" => nodata = Some(number),
                other => return Err(malformed(format!("unknown header key '{}'", other))),
            }
        }

        let missing = |key: &str| malformed(format!("header is missing {}", key));
        let cellsize = cellsize.ok_or_else(|| missing("cellsize"))?;
        if !(cellsize > 0.0) {
            return Err(malformed(format!("cellsize must be positive, got {}", cellsize)));
        }
        let mut xllcorner = xll.ok_or_else(|| missing("xllcorner"))?;
        let mut yllcorner = yll.ok_or_else(|| missing("yllcorner"))?;
        if x_center {
            xllcorner -= cellsize / 2.0;
        }
        if y_center {
            yllcorner -= cellsize / 2.0;
        }
        Ok(GridHeader {
            ncols: ncols.ok_or_else(|| missing("ncols"))?,
            nrows: nrows.ok_or_else(|| missing("nrows"))?,
            xllcorner,
            yllcorner,
            cellsize,
            nodata,
        })
    }
}

fn is_header_line(line: &str) -> bool {
    line.trim_start()
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic())
}

/// An ASCII grid held in memory, row-major from the north-west corner.
#[derive(Debug, Clone)]
pub struct AsciiGrid {
    header: GridHeader,
    values: Vec<f64>,
}

impl AsciiGrid {
    /// Read only the header, for cataloguing large files.
    pub fn read_header(path: &Path) -> Result<GridHeader, ZonalError> {
        let io = |source: std::io::Error| ZonalError::Io {
            path: path.to_path_buf(),
            source,
        };
        let reader = BufReader::new(File::open(path).map_err(io)?);
        let mut header_lines = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(io)?;
            if !is_header_line(&line) {
                break;
            }
            header_lines.push(line);
        }
        let refs: Vec<&str> = header_lines.iter().map(String::as_str).collect();
        GridHeader::parse(&refs, path)
    }

    pub fn from_path(path: &Path) -> Result<AsciiGrid, ZonalError> {
        let text = std::fs::read_to_string(path).map_err(|source| ZonalError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        AsciiGrid::parse(&text, path)
    }

    /// Parse grid text; `path` is only used in error messages.
    pub fn parse(text: &str, path: &Path) -> Result<AsciiGrid, ZonalError> {
        let lines: Vec<&str> = text.lines().collect();
        let header_len = lines.iter().take_while(|l| is_header_line(l)).count();
        let header = GridHeader::parse(&lines[..header_len], path)?;

        let expected = header.ncols.checked_mul(header.nrows).ok_or_else(|| ZonalError::Format {
            path: path.to_path_buf(),
            reason: format!("{} x {} cells overflows", header.ncols, header.nrows),
        })?;
        let mut values = Vec::new();
        for token in lines[header_len..].iter().flat_map(|l| l.split_whitespace()) {
            let v: f64 = token.parse().map_err(|_| ZonalError::Format {
                path: path.to_path_buf(),
                reason: format!("bad cell value '{}'", token),
            })?;
            values.push(v);
        }
        if values.len() != expected {
            return Err(ZonalError::Format {
                path: PathBuf::from(path),
                reason: format!("expected {} cells, found {}", expected, values.len()),
            });
        }
        Ok(AsciiGrid { header, values })
    }

    pub fn header(&self) -> &GridHeader {
        &self.header
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.header.nrows && col < self.header.ncols {
            self.values.get(row * self.header.ncols + col).copied()
        } else {
            None
        }
    }

    /// Statistics of the cells whose centres fall inside `geometry`.
    ///
    /// Cells equal to `nodata` (or NaN) are counted as nodata. `mean`,
    /// `min` and `max` are undefined when no valid cell is found.
    pub fn zonal(&self, geometry: &Geometry, nodata: f64, request: &StatRequest) -> ZonalStats {
        let h = &self.header;
        let mut count = 0u64;
        let mut nodata_count = 0u64;
        let mut sum = 0.0;
        let mut min: Option<f64> = None;
        let mut max: Option<f64> = None;

        if let Some(b) = geometry.bounds() {
            let top = h.yllcorner + h.nrows as f64 * h.cellsize;
            let clamp_col = |v: f64| v.max(0.0).min(h.ncols as f64) as usize;
            let clamp_row = |v: f64| v.max(0.0).min(h.nrows as f64) as usize;
            let c0 = clamp_col(((b.xmin - h.xllcorner) / h.cellsize).floor());
            let c1 = clamp_col(((b.xmax - h.xllcorner) / h.cellsize).ceil());
            let r0 = clamp_row(((top - b.ymax) / h.cellsize).floor());
            let r1 = clamp_row(((top - b.ymin) / h.cellsize).ceil());

            for row in r0..r1 {
                let y = top - (row as f64 + 0.5) * h.cellsize;
                for col in c0..c1 {
                    let x = h.xllcorner + (col as f64 + 0.5) * h.cellsize;
                    if !geometry.contains(x, y) {
                        continue;
                    }
                    let v = self.values[row * h.ncols + col];
                    if v.is_nan() || v == nodata {
                        nodata_count += 1;
                        continue;
                    }
                    count += 1;
                    sum += v;
                    min = Some(min.map_or(v, |m| m.min(v)));
                    max = Some(max.map_or(v, |m| m.max(v)));
                }
            }
        }

        let mut stats = ZonalStats::new();
        for &kind in request.kinds() {
            let value = match kind {
                StatKind::Count => Some(count as f64),
                StatKind::Nodata => Some(nodata_count as f64),
                StatKind::Sum => Some(sum),
                StatKind::Mean => (count > 0).then(|| sum / count as f64),
                StatKind::Min => min,
                StatKind::Max => max,
            };
            stats.set(kind, value);
        }
        stats
    }
}
