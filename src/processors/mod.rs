pub mod pipeline;
pub mod quality_checker;
pub mod rainfall_merger;
pub mod raster_table_builder;
pub mod solar_repair;
pub mod wth_quality_control;

pub use pipeline::{BatchReport, LocationFailure, Pipeline};
pub use quality_checker::{LocationQuality, QualityChecker, QualityReport};
pub use rainfall_merger::{RainfallMerger, RainfallSources};
pub use raster_table_builder::RasterTableBuilder;
pub use solar_repair::{find_missing_runs, MissingRun, RepairSummary, RunPosition, SolarRadiationRepair};
pub use wth_quality_control::WthQualityControl;
