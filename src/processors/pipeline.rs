use crate::error::{ProcessingError, Result};
use crate::models::{DateRange, Location, RasterTable, ReanalysisCell, ReanalysisSeries};
use crate::processors::{
    LocationQuality, QualityChecker, QualityReport, RainfallMerger, RasterTableBuilder, SolarRadiationRepair,
};
use crate::readers::{LocationReader, RasterCatalog};
use crate::settings::RunConfig;
use crate::sources::ReanalysisSource;
use crate::utils::cache::JsonCache;
use crate::utils::constants::{RASTER_CACHE_PREFIX, REANALYSIS_CACHE_PREFIX};
use crate::utils::progress::ProgressReporter;
use crate::writers::{StationHeader, WthWriter};
use futures_util::stream::{self, StreamExt};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// A location that produced no output, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationFailure {
    pub location_id: String,
    pub error: String,
}

/// Outcome of a batch; failures of single locations never abort the batch
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub written: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<LocationFailure>,
    pub rejected_rows: usize,
    pub quality: QualityReport,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str("=== Batch Report ===\n");
        summary.push_str(&format!("Written: {}\n", self.written.len()));
        summary.push_str(&format!("Skipped (output exists): {}\n", self.skipped.len()));
        summary.push_str(&format!("Failed: {}\n", self.failed.len()));
        summary.push_str(&format!("Rejected input rows: {}\n", self.rejected_rows));

        if !self.failed.is_empty() {
            summary.push_str("\nFailures:\n");
            for failure in self.failed.iter().take(20) {
                summary.push_str(&format!("  {}: {}\n", failure.location_id, failure.error));
            }
            if self.failed.len() > 20 {
                summary.push_str(&format!("  ... and {} more\n", self.failed.len() - 20));
            }
        }

        summary.push('\n');
        summary.push_str(&QualityChecker::new().generate_summary(&self.quality));
        summary
    }

    pub(crate) fn sort(&mut self) {
        self.written.sort();
        self.skipped.sort();
        self.failed.sort_by(|a, b| a.location_id.cmp(&b.location_id));
    }
}

/// Why a cell has no series
#[derive(Debug, Clone)]
struct FetchFailure {
    attempts: u32,
    message: String,
}

impl From<ProcessingError> for FetchFailure {
    fn from(error: ProcessingError) -> Self {
        match error {
            ProcessingError::Fetch { attempts, message, .. } => Self { attempts, message },
            other => Self {
                attempts: 1,
                message: other.to_string(),
            },
        }
    }
}

/// Reanalysis series per cell id
type CellSeries = HashMap<String, std::result::Result<ReanalysisSeries, FetchFailure>>;

struct LocationOutcome {
    location_id: String,
    quality: Option<LocationQuality>,
    result: Result<()>,
}

/// Builds one WTH file per location from rasters and a reanalysis source
pub struct Pipeline<S: ReanalysisSource> {
    config: RunConfig,
    source: S,
    cache: JsonCache,
}

impl<S: ReanalysisSource> Pipeline<S> {
    pub fn new(config: RunConfig, source: S) -> Self {
        let cache = JsonCache::new(&config.cache_dir, config.reuse_cache);
        Self { config, source, cache }
    }

    pub async fn run(&self, progress: Option<&ProgressReporter>) -> Result<BatchReport> {
        let range = self.config.date_range()?;

        if let Some(p) = progress {
            p.set_message("Reading locations...");
        }
        let table = LocationReader::with_columns(&self.config.id_column, &self.config.cell_column)
            .read_locations(&self.config.input)?;
        info!(
            locations = table.locations.len(),
            rejected = table.rejected_rows,
            "location table read"
        );

        std::fs::create_dir_all(&self.config.output_dir)?;

        let mut report = BatchReport {
            rejected_rows: table.rejected_rows,
            ..BatchReport::default()
        };

        let (pending, skipped): (Vec<Location>, Vec<Location>) = table
            .locations
            .into_iter()
            .partition(|location| !(self.config.skip_existing && output_path(&self.config, location).exists()));
        report.skipped = skipped.into_iter().map(|l| l.id).collect();
        if !report.skipped.is_empty() {
            info!(skipped = report.skipped.len(), "existing outputs left untouched");
        }

        if pending.is_empty() {
            report.sort();
            return Ok(report);
        }

        if let Some(p) = progress {
            p.set_message("Sampling rasters and fetching reanalysis series...");
        }
        let (raster_table, series) = tokio::try_join!(
            self.raster_table(pending.clone(), range),
            self.fetch_series(&pending, range),
        )?;

        if let Some(p) = progress {
            p.reset(pending.len() as u64, &format!("Writing {} weather files...", pending.len()));
        }
        let batch = LocationBatch {
            config: self.config.clone(),
            range,
            raster_table,
            series,
        };
        let update = progress.map(ProgressReporter::updater);
        let outcomes = tokio::task::spawn_blocking(move || batch.process(&pending, update)).await??;

        let mut qualities = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            if let Some(quality) = outcome.quality {
                qualities.push(quality);
            }
            match outcome.result {
                Ok(()) => report.written.push(outcome.location_id),
                Err(e) => {
                    warn!(location = %outcome.location_id, error = %e, "location failed");
                    report.failed.push(LocationFailure {
                        location_id: outcome.location_id,
                        error: e.to_string(),
                    });
                }
            }
        }
        report.quality = QualityReport::from_locations(qualities);
        report.sort();

        if let Some(p) = progress {
            p.finish_with_message(&format!("Wrote {} weather files", report.written.len()));
        }
        Ok(report)
    }

    /// Raster samples for `locations`, built on the blocking pool
    async fn raster_table(&self, locations: Vec<Location>, range: DateRange) -> Result<RasterTable> {
        let key = self.config.raster_cache_key(&range);
        if let Some(table) = self.cache.load::<RasterTable>(RASTER_CACHE_PREFIX, &key) {
            if locations.iter().all(|l| table.lookups.contains_key(&l.id)) {
                info!(dates = table.date_count(), "raster table loaded from cache");
                return Ok(table);
            }
            debug!("cached raster table does not cover every location, rebuilding");
        }

        let files = RasterCatalog::scan(&self.config.raster_dir)?.within(&range);
        info!(rasters = files.len(), dir = %self.config.raster_dir.display(), "raster files found");

        let builder = RasterTableBuilder::new(self.config.max_workers);
        let table = tokio::task::spawn_blocking(move || builder.build(&files, &locations)).await??;

        self.cache.store(RASTER_CACHE_PREFIX, &key, &table)?;
        Ok(table)
    }

    /// One fetch per distinct cell, at most `max_workers` in flight
    async fn fetch_series(&self, locations: &[Location], range: DateRange) -> Result<CellSeries> {
        let key = self.config.reanalysis_cache_key(&range);
        let cached: HashMap<String, ReanalysisSeries> =
            self.cache.load(REANALYSIS_CACHE_PREFIX, &key).unwrap_or_default();

        let cells: BTreeMap<&str, &ReanalysisCell> = locations
            .iter()
            .map(|l| (l.cell.id.as_str(), &l.cell))
            .filter(|(id, _)| !cached.contains_key(*id))
            .collect();
        info!(
            cells = cells.len(),
            cached = cached.len(),
            "fetching reanalysis series"
        );

        let fetched: Vec<(String, Result<ReanalysisSeries>)> = stream::iter(cells.into_values())
            .map(|cell| async move {
                let result = self.source.fetch_daily_series(cell, &range).await;
                (cell.id.clone(), result)
            })
            .buffer_unordered(self.config.max_workers)
            .collect()
            .await;

        let mut series: CellSeries = HashMap::with_capacity(cached.len() + fetched.len());
        let mut to_store = cached.clone();
        for (cell_id, result) in fetched {
            match result {
                Ok(s) => {
                    to_store.insert(cell_id.clone(), s.clone());
                    series.insert(cell_id, Ok(s));
                }
                Err(e) => {
                    warn!(cell = %cell_id, error = %e, "reanalysis fetch failed");
                    series.insert(cell_id, Err(FetchFailure::from(e)));
                }
            }
        }
        for (cell_id, s) in cached {
            series.insert(cell_id, Ok(s));
        }

        self.cache.store(REANALYSIS_CACHE_PREFIX, &key, &to_store)?;
        Ok(series)
    }
}

/// Per-location work, owned so it can run on the blocking pool
struct LocationBatch {
    config: RunConfig,
    range: DateRange,
    raster_table: RasterTable,
    series: CellSeries,
}

impl LocationBatch {
    fn process<F: Fn(u64) + Sync>(&self, locations: &[Location], update: Option<F>) -> Result<Vec<LocationOutcome>> {
        let processed = AtomicUsize::new(0);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers)
            .build()
            .map_err(|e| ProcessingError::Config(e.to_string()))?;

        Ok(pool.install(|| {
            locations
                .par_iter()
                .map(|location| {
                    let outcome = match self.series.get(&location.cell.id) {
                        Some(Ok(cell_series)) => self.process_location(location, cell_series),
                        Some(Err(failure)) => LocationOutcome {
                            location_id: location.id.clone(),
                            quality: None,
                            result: Err(ProcessingError::Fetch {
                                cell_id: location.cell.id.clone(),
                                attempts: failure.attempts,
                                message: failure.message.clone(),
                            }),
                        },
                        None => LocationOutcome {
                            location_id: location.id.clone(),
                            quality: None,
                            result: Err(ProcessingError::MissingData(format!(
                                "no reanalysis series for cell {}",
                                location.cell.id
                            ))),
                        },
                    };

                    let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(update) = &update {
                        update(count as u64);
                    }
                    outcome
                })
                .collect()
        }))
    }

    /// Align, merge rainfall, repair radiation and write one location
    fn process_location(&self, location: &Location, series: &ReanalysisSeries) -> LocationOutcome {
        let aligned = series.align_to(&self.range);
        let mut merged = RainfallMerger::new().merge(location, &aligned, &self.raster_table.lookup(&location.id));

        let mut quality = QualityChecker::new().check(&location.id, &merged);
        let result = match SolarRadiationRepair::new().repair(&location.id, &mut merged) {
            Ok(summary) => {
                quality.mark_repaired(&summary);
                let header = StationHeader::for_location(location, series.elevation, &merged)
                    .with_institution(&self.config.institution)
                    .with_heights(self.config.reference_height, self.config.wind_height);
                WthWriter::new().write_file(&output_path(&self.config, location), &header, &merged)
            }
            Err(e) => {
                quality.mark_unrecoverable();
                Err(e)
            }
        };

        LocationOutcome {
            location_id: location.id.clone(),
            quality: Some(quality),
            result,
        }
    }
}

fn output_path(config: &RunConfig, location: &Location) -> PathBuf {
    config.output_dir.join(location.wth_file_name())
}
