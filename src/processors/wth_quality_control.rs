use crate::error::{ProcessingError, Result};
use crate::processors::pipeline::{BatchReport, LocationFailure};
use crate::processors::{LocationQuality, QualityChecker, QualityReport, SolarRadiationRepair};
use crate::readers::WthReader;
use crate::utils::constants::WTH_MISSING;
use crate::utils::progress::ProgressReporter;
use crate::writers::WthWriter;
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

/// Re-runs the radiation repair over a directory of existing WTH files
pub struct WthQualityControl {
    max_workers: usize,
}

impl WthQualityControl {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    /// Write a corrected copy of every `.WTH` in `input_dir` to `output_dir`.
    ///
    /// Header lines are kept verbatim, and so is every data column but SRAD. A file that cannot be parsed or
    /// repaired is reported as failed and not written.
    pub fn run(&self, input_dir: &Path, output_dir: &Path, progress: Option<&ProgressReporter>) -> Result<BatchReport> {
        if input_dir == output_dir {
            return Err(ProcessingError::Config(
                "QC output directory must differ from its input directory".to_string(),
            ));
        }
        std::fs::create_dir_all(output_dir)?;

        let reader = WthReader::new();
        let files = reader.list_files(input_dir)?;
        info!(files = files.len(), dir = %input_dir.display(), "running radiation QC");
        if let Some(p) = progress {
            p.reset(files.len() as u64, &format!("Checking {} weather files...", files.len()));
        }

        let processed = AtomicUsize::new(0);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| ProcessingError::Config(e.to_string()))?;

        let outcomes: Vec<(String, Option<LocationQuality>, Result<()>)> = pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    let outcome = self.check_file(&reader, path, output_dir);
                    let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(p) = progress {
                        p.update(count as u64);
                    }
                    outcome
                })
                .collect()
        });

        let mut report = BatchReport::default();
        let mut qualities = Vec::new();
        for (name, quality, result) in outcomes {
            qualities.extend(quality);
            match result {
                Ok(()) => report.written.push(name),
                Err(e) => {
                    warn!(file = %name, error = %e, "QC failed");
                    report.failed.push(LocationFailure {
                        location_id: name,
                        error: e.to_string(),
                    });
                }
            }
        }
        report.quality = QualityReport::from_locations(qualities);
        report.sort();

        if let Some(p) = progress {
            p.finish_with_message(&format!("Corrected {} weather files", report.written.len()));
        }
        Ok(report)
    }

    fn check_file(
        &self,
        reader: &WthReader,
        path: &Path,
        output_dir: &Path,
    ) -> (String, Option<LocationQuality>, Result<()>) {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut document = match reader.read_file(path) {
            Ok(document) => document,
            Err(e) => return (name, None, Err(e)),
        };

        let mut quality = QualityChecker::new().check(&document.location_id, &document.records);
        let result = match SolarRadiationRepair::new().repair(&document.location_id, &mut document.records) {
            Ok(summary) => {
                quality.mark_repaired(&summary);
                let target = output_dir.join(path.file_name().unwrap_or_default());
                let lines: Vec<String> = document
                    .tokens
                    .iter()
                    .zip(&document.records)
                    .map(|(tokens, record)| {
                        WthWriter::format_passthrough_line(tokens, record.srad.unwrap_or(WTH_MISSING))
                    })
                    .collect();
                WthWriter::new().write_lines(&target, &document.header_lines, &lines)
            }
            Err(e) => {
                quality.mark_unrecoverable();
                Err(e)
            }
        };

        (name, Some(quality), result)
    }
}
