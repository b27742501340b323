use crate::error::Result;
use crate::models::DateRange;
use crate::utils::cache::fingerprint;
use crate::utils::constants::{
    DEFAULT_CELL_COLUMN, DEFAULT_ID_COLUMN, DEFAULT_INSTITUTION, DEFAULT_MAX_RETRIES,
    DEFAULT_REFERENCE_HEIGHT, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRY_DELAY_MS,
    DEFAULT_WIND_HEIGHT, POWER_BASE_URL,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Prefix of environment variables read as settings, e.g. `WTH_MAX_WORKERS`
pub const ENV_PREFIX: &str = "WTH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReanalysisSourceKind {
    /// NASA POWER daily point service
    Power,
    /// Offline table exported from the gridded product
    Table,
}

/// Everything a build run needs, passed explicitly through the pipeline
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_run_config"))]
pub struct RunConfig {
    pub input: PathBuf,
    pub raster_dir: PathBuf,
    pub output_dir: PathBuf,
    pub start: NaiveDate,
    pub end: NaiveDate,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_reanalysis")]
    pub reanalysis: ReanalysisSourceKind,
    #[serde(default)]
    pub reanalysis_table: Option<PathBuf>,
    #[serde(default = "default_power_url")]
    pub power_url: String,

    #[serde(default = "default_id_column")]
    #[validate(length(min = 1))]
    pub id_column: String,
    #[serde(default = "default_cell_column")]
    #[validate(length(min = 1))]
    pub cell_column: String,

    #[serde(default = "default_max_workers")]
    #[validate(range(min = 1))]
    pub max_workers: usize,
    #[serde(default = "default_max_retries")]
    #[validate(range(min = 1))]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,

    #[serde(default = "default_institution")]
    #[validate(length(min = 1, max = 4))]
    pub institution: String,
    #[serde(default = "default_reference_height")]
    #[validate(range(exclusive_min = 0.0))]
    pub reference_height: f64,
    #[serde(default = "default_wind_height")]
    #[validate(range(exclusive_min = 0.0))]
    pub wind_height: f64,

    /// Leave locations whose output file already exists untouched
    #[serde(default)]
    pub skip_existing: bool,
    /// Load and store intermediate tables in `cache_dir`
    #[serde(default)]
    pub reuse_cache: bool,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".wth-cache")
}

fn default_reanalysis() -> ReanalysisSourceKind {
    ReanalysisSourceKind::Power
}

fn default_power_url() -> String {
    POWER_BASE_URL.to_string()
}

fn default_id_column() -> String {
    DEFAULT_ID_COLUMN.to_string()
}

fn default_cell_column() -> String {
    DEFAULT_CELL_COLUMN.to_string()
}

fn default_max_workers() -> usize {
    num_cpus::get()
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_institution() -> String {
    DEFAULT_INSTITUTION.to_string()
}

fn default_reference_height() -> f64 {
    DEFAULT_REFERENCE_HEIGHT
}

fn default_wind_height() -> f64 {
    DEFAULT_WIND_HEIGHT
}

fn validate_run_config(config: &RunConfig) -> std::result::Result<(), ValidationError> {
    if config.start > config.end {
        let mut error = ValidationError::new("date_order");
        error.message = Some("start date is after end date".into());
        return Err(error);
    }
    if config.reanalysis == ReanalysisSourceKind::Table && config.reanalysis_table.is_none() {
        let mut error = ValidationError::new("reanalysis_table");
        error.message = Some("the table source needs `reanalysis_table`".into());
        return Err(error);
    }
    Ok(())
}

impl RunConfig {
    /// Layer settings: defaults, optional TOML file, `WTH_*` environment
    /// variables, then explicit overrides (command line). `None` overrides
    /// leave lower layers in place.
    pub fn load(file: Option<&Path>, overrides: &[(&str, Option<String>)]) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Toml));
        }
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        for (key, value) in overrides {
            builder = builder.set_override_option(*key, value.clone())?;
        }

        let run_config: RunConfig = builder.build()?.try_deserialize()?;
        run_config.validate()?;
        Ok(run_config)
    }

    pub fn date_range(&self) -> Result<DateRange> {
        DateRange::new(self.start, self.end)
    }

    /// Cache key of the raster table: the range plus what the samples depend on
    pub fn raster_cache_key(&self, range: &DateRange) -> String {
        let raster_dir = self.raster_dir.to_string_lossy();
        let input = self.input.to_string_lossy();
        let fingerprint = fingerprint(&[raster_dir.as_ref(), input.as_ref(), self.id_column.as_str()]);
        format!("{}-{}", range.key(), fingerprint)
    }

    /// Cache key of the fetched series: the range plus the source they came from
    pub fn reanalysis_cache_key(&self, range: &DateRange) -> String {
        let (kind, source) = match self.reanalysis {
            ReanalysisSourceKind::Power => ("power", self.power_url.clone()),
            ReanalysisSourceKind::Table => (
                "table",
                self.reanalysis_table
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_default(),
            ),
        };
        let fingerprint = fingerprint(&[kind, source.as_str(), self.cell_column.as_str()]);
        format!("{}-{}", range.key(), fingerprint)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
