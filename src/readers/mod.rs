pub mod location_reader;
pub mod raster_reader;
pub mod wth_reader;

pub use location_reader::{LocationReader, LocationTable};
pub use raster_reader::{GeoTiffSampler, RasterCatalog, RasterFile};
pub use wth_reader::{WthDocument, WthReader};
