use crate::error::Result;
use crate::readers::WthReader;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Non-blank lines of the header block skipped in the appended file
const HEADER_LINES: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub merged: Vec<String>,
    pub not_updated: Vec<String>,
}

/// Appends the data of one directory of WTH files onto another
pub struct WthMerger;

impl WthMerger {
    pub fn new() -> Self {
        Self
    }

    /// For every file of `first` also present in `second`, write a copy of
    /// the first file to `output` followed by the data lines of the second.
    pub fn merge_directories(&self, first: &Path, second: &Path, output: &Path) -> Result<MergeReport> {
        fs::create_dir_all(output)?;
        let mut report = MergeReport::default();

        for path in WthReader::new().list_files(first)? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };

            let counterpart = second.join(&name);
            if !counterpart.is_file() {
                warn!(file = %name, "no counterpart in second directory, not updated");
                report.not_updated.push(name);
                continue;
            }

            let target = output.join(&name);
            fs::copy(&path, &target)?;
            self.append_data_lines(&counterpart, &target)?;
            report.merged.push(name);
        }

        info!(
            merged = report.merged.len(),
            not_updated = report.not_updated.len(),
            "merge complete"
        );
        Ok(report)
    }

    fn append_data_lines(&self, source: &Path, target: &Path) -> Result<()> {
        let appended = fs::read_to_string(source)?;
        let existing = fs::read_to_string(target)?;

        let mut file = OpenOptions::new().append(true).open(target)?;
        if !existing.is_empty() && !existing.ends_with('\n') {
            writeln!(file)?;
        }
        for line in appended.lines().filter(|l| !l.trim().is_empty()).skip(HEADER_LINES) {
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }
}

impl Default for WthMerger {
    fn default() -> Self {
        Self::new()
    }
}
