/// Sentinels that mark a reading as absent in reanalysis tables and WTH files
pub const MISSING_SENTINELS: [f64; 4] = [-99.0, -999.0, -9999.0, -3596.4];

/// Value written to WTH files in place of a missing reading
pub const WTH_MISSING: f64 = -99.0;
pub const WTH_MISSING_TOKEN: &str = "-99";

/// No-data value of CHIRPS rasters
pub const RASTER_NODATA: f64 = -9999.0;

/// Missing runs longer than this cannot be bridged between two valid readings
pub const MAX_INTERIOR_RUN: usize = 2;

/// Missing runs longer than this cannot be carried from the sequence edge
pub const MAX_EDGE_RUN: usize = 3;

/// Physical limits used when ingesting solar radiation (MJ/m2/day)
pub const MIN_VALID_SRAD: f64 = 0.0;
pub const MAX_VALID_SRAD: f64 = 50.0;

/// File names
pub const WTH_EXTENSION: &str = "WTH";
pub const RASTER_CACHE_PREFIX: &str = "raster_table";
pub const REANALYSIS_CACHE_PREFIX: &str = "reanalysis_series";

/// Input table column headers
pub const DEFAULT_ID_COLUMN: &str = "ID";
pub const DEFAULT_CELL_COLUMN: &str = "nasapid";
pub const LATITUDE_COLUMN: &str = "Latitude";
pub const LONGITUDE_COLUMN: &str = "Longitude";
pub const CELL_LATITUDE_COLUMN: &str = "LatNP";
pub const CELL_LONGITUDE_COLUMN: &str = "LonNP";

/// WTH header defaults
pub const DEFAULT_INSTITUTION: &str = "UFL";
pub const DEFAULT_REFERENCE_HEIGHT: f64 = 2.0;
pub const DEFAULT_WIND_HEIGHT: f64 = 2.0;

/// NASA POWER daily point service
pub const POWER_BASE_URL: &str = "https://power.larc.nasa.gov/api/temporal/daily/point";
pub const POWER_COMMUNITY: &str = "AG";
pub const POWER_PARAMETERS: &str =
    "ALLSKY_SFC_SW_DWN,T2M_MAX,T2M_MIN,T2MDEW,RH2M,PRECTOTCORR,WS2M";

/// Processing defaults
pub const DEFAULT_MAX_RETRIES: u32 = 10;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
