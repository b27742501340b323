use crate::error::{ProcessingError, Result};
use crate::models::{CellValue, Location, RasterTable};
use crate::readers::raster_reader::{GeoTiffSampler, RasterFile};
use rayon::prelude::*;
use tracing::{info, warn};

/// Samples every daily raster at every location, one file per task
pub struct RasterTableBuilder {
    max_workers: usize,
}

impl RasterTableBuilder {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    /// Build the per-location lookup table.
    ///
    /// A file that cannot be opened or decoded is logged and contributes no
    /// dates, so those days fall back to reanalysis rainfall everywhere.
    pub fn build(&self, files: &[RasterFile], locations: &[Location]) -> Result<RasterTable> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| ProcessingError::Config(e.to_string()))?;

        let sampled: Vec<Option<(&RasterFile, Vec<CellValue>)>> = pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    match GeoTiffSampler::open(&file.path) {
                        Ok(mut sampler) => Some((file, sampler.sample_locations(locations))),
                        Err(e) => {
                            warn!(path = %file.path.display(), error = %e, "raster skipped");
                            None
                        }
                    }
                })
                .collect()
        });

        let mut table = RasterTable::new();
        let mut failed = 0;
        for entry in sampled {
            let Some((file, values)) = entry else {
                failed += 1;
                continue;
            };
            for (location, value) in locations.iter().zip(values) {
                table.insert(&location.id, file.date, value);
            }
        }

        info!(
            rasters = files.len() - failed,
            failed,
            locations = locations.len(),
            "raster table built"
        );
        Ok(table)
    }
}
