pub mod daily;
pub mod date_range;
pub mod location;
pub mod raster;

pub use daily::{classify_reading, classify_solar, parse_reading, DailyRecord, ReanalysisSeries};
pub use date_range::DateRange;
pub use location::{Location, ReanalysisCell};
pub use raster::{CellValue, RasterLookup, RasterTable};
