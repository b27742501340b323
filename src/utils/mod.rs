pub mod cache;
pub mod constants;
pub mod progress;
pub mod units;

pub use cache::JsonCache;
pub use constants::*;
pub use progress::ProgressReporter;
