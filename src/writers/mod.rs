pub mod wth_merge;
pub mod wth_writer;

pub use wth_merge::{MergeReport, WthMerger};
pub use wth_writer::{temperature_climatology, StationHeader, WthWriter};
