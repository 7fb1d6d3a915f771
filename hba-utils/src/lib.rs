//! Shared utility functions for HBA crates.

/// Pfafstetter level helpers
pub mod pfaf {
    use hba_core::pfaf::MAX_LEVEL;
    use hba_core::PfafCode;
    use std::collections::BTreeSet;

    /// Parse a level argument such as `"02"` or `"5"`; valid levels are 1..=12.
    pub fn parse_level(s: &str) -> anyhow::Result<usize> {
        let level: usize = s.trim().parse()?;
        if level == 0 || level > MAX_LEVEL {
            anyhow::bail!("Pfafstetter level must be between 1 and {}, got {}", MAX_LEVEL, level);
        }
        Ok(level)
    }

    /// Column name used for codes at a level, e.g. `pfaf_02`.
    pub fn level_field(level: usize) -> String {
        format!("pfaf_{:02}", level)
    }

    /// Distinct codes at `level` for a collection of finer codes, sorted.
    /// Codes shorter than `level` are skipped.
    pub fn basin_list_by_level<'a, I>(codes: I, level: usize) -> Vec<PfafCode>
    where
        I: IntoIterator<Item = &'a PfafCode>,
    {
        codes
            .into_iter()
            .filter_map(|c| c.truncate(level).ok())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_level() {
            assert_eq!(parse_level("02").unwrap(), 2);
            assert_eq!(parse_level("12").unwrap(), 12);
            assert!(parse_level("0").is_err());
            assert!(parse_level("13").is_err());
            assert!(parse_level("x").is_err());
        }

        #[test]
        fn test_level_field() {
            assert_eq!(level_field(2), "pfaf_02");
            assert_eq!(level_field(12), "pfaf_12");
        }

        #[test]
        fn test_basin_list_by_level() {
            let codes: Vec<PfafCode> = ["1721143", "1721150", "1730000", "18"]
                .iter()
                .map(|s| s.parse().unwrap())
                .collect();
            let level3: Vec<String> = basin_list_by_level(&codes, 3)
                .into_iter()
                .map(|c| c.to_string())
                .collect();
            assert_eq!(level3, vec!["172", "173"]);
        }
    }
}

/// File discovery
pub mod files {
    use std::path::{Path, PathBuf};

    /// A file found on disk: bare name plus full path.
    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
    pub struct FoundFile {
        pub file_name: String,
        pub file_path: PathBuf,
    }

    /// Recursively find files whose names start with `prefix` and end with
    /// `suffix` (either may be omitted). Results are sorted by path.
    pub fn find_files(
        directory: &Path,
        prefix: Option<&str>,
        suffix: Option<&str>,
    ) -> anyhow::Result<Vec<FoundFile>> {
        let mut found = Vec::new();
        let mut pending = vec![directory.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                if entry.file_type()?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let file_name = entry.file_name().to_string_lossy().into_owned();
                let prefix_ok = prefix.map_or(true, |p| file_name.starts_with(p));
                let suffix_ok = suffix.map_or(true, |s| file_name.ends_with(s));
                if prefix_ok && suffix_ok {
                    found.push(FoundFile {
                        file_name,
                        file_path: path,
                    });
                }
            }
        }
        found.sort();
        log::debug!("found {} files under {}", found.len(), directory.display());
        Ok(found)
    }

}

/// Gzip-aware readers and writers: paths ending in `.gz` are (de)compressed.
pub mod io {
    use flate2::read::GzDecoder;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs::File;
    use std::io::{BufReader, BufWriter, Read, Write};
    use std::path::Path;

    fn is_gzip(path: &Path) -> bool {
        path.extension().map_or(false, |e| e == "gz")
    }

    pub fn open_reader(path: &Path) -> anyhow::Result<Box<dyn Read>> {
        let file = File::open(path)
            .map_err(|e| anyhow::anyhow!("Failed to open {}: {}", path.display(), e))?;
        if is_gzip(path) {
            Ok(Box::new(BufReader::new(GzDecoder::new(file))))
        } else {
            Ok(Box::new(BufReader::new(file)))
        }
    }

    pub fn create_writer(path: &Path) -> anyhow::Result<Box<dyn Write>> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", path.display(), e))?;
        if is_gzip(path) {
            Ok(Box::new(BufWriter::new(GzEncoder::new(file, Compression::default()))))
        } else {
            Ok(Box::new(BufWriter::new(file)))
        }
    }

    pub fn read_to_string(path: &Path) -> anyhow::Result<String> {
        let mut text = String::new();
        open_reader(path)?.read_to_string(&mut text)?;
        Ok(text)
    }

}

/// Timing helpers for batch progress logs
pub mod timing {
    use chrono::{DateTime, Local};

    /// Wall-clock stopwatch started at construction.
    #[derive(Debug, Clone, Copy)]
    pub struct Stopwatch {
        started: DateTime<Local>,
    }

    impl Stopwatch {
        pub fn start() -> Self {
            Stopwatch {
                started: Local::now(),
            }
        }

        pub fn started(&self) -> DateTime<Local> {
            self.started
        }

        pub fn elapsed_seconds(&self) -> f64 {
            (Local::now() - self.started).num_milliseconds() as f64 / 1000.0
        }
    }

    impl Default for Stopwatch {
        fn default() -> Self {
            Stopwatch::start()
        }
    }

    /// Format a timestamp as RFC 3339
    pub fn timestamp(dt: &DateTime<Local>) -> String {
        dt.to_rfc3339()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_stopwatch_is_monotonic() {
            let sw = Stopwatch::start();
            assert!(sw.elapsed_seconds() >= 0.0);
            assert!(timestamp(&sw.started()).contains('T'));
        }
    }
}
