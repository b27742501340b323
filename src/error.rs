use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TIFF decoding error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid coordinate format: {0}")]
    InvalidCoordinate(String),

    #[error("Malformed input row at line {line}: {message}")]
    MalformedRow { line: u64, message: String },

    #[error("Raster error in {path:?}: {message}")]
    Raster { path: PathBuf, message: String },

    #[error("Fetching reanalysis cell {cell_id} failed after {attempts} attempt(s): {message}")]
    Fetch {
        cell_id: String,
        attempts: u32,
        message: String,
    },

    #[error(
        "Location {location_id}: {length} missing solar radiation value(s) from {start} to {end} cannot be interpolated"
    )]
    UnrecoverableMissingRun {
        location_id: String,
        start: NaiveDate,
        end: NaiveDate,
        length: usize,
    },

    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
