use crate::error::{ProcessingError, Result};
use crate::models::{classify_reading, classify_solar, DailyRecord, DateRange, ReanalysisCell, ReanalysisSeries};
use crate::sources::ReanalysisSource;
use crate::utils::units::{
    flux_to_millimetres_per_day, kelvin_to_celsius, metres_per_second_to_km_per_day,
    watts_to_megajoules_per_day,
};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

const TIME_COLUMN: &str = "time";

/// Offline reanalysis source: a table exported from the gridded product.
///
/// Values are in the product's native units (K, W/m2, kg/m2/s, m/s) and are
/// converted once on load.
#[derive(Debug, Clone, Default)]
pub struct ReanalysisTable {
    series: HashMap<String, Vec<DailyRecord>>,
}

struct TableColumns {
    cell: usize,
    time: usize,
    srad: Option<usize>,
    tmax: Option<usize>,
    tmin: Option<usize>,
    rain: Option<usize>,
    rhum: Option<usize>,
    wind: Option<usize>,
    tdew: Option<usize>,
}

impl ReanalysisTable {
    /// Load a table; `.txt` and `.tsv` files are tab-delimited
    pub fn from_path(path: &Path, cell_column: &str) -> Result<Self> {
        let tab_delimited = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("txt") || e.eq_ignore_ascii_case("tsv"));
        let delimiter = if tab_delimited { b'\t' } else { b',' };

        let table = Self::from_reader(std::fs::File::open(path)?, delimiter, cell_column)?;
        info!(path = %path.display(), cells = table.series.len(), "loaded reanalysis table");
        Ok(table)
    }

    pub fn from_reader<R: Read>(source: R, delimiter: u8, cell_column: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);

        let columns = Self::resolve_columns(reader.headers()?, cell_column)?;
        let mut series: HashMap<String, Vec<DailyRecord>> = HashMap::new();

        for (index, row) in reader.records().enumerate() {
            let row = row?;
            let field = |i: Option<usize>| i.and_then(|i| row.get(i)).and_then(|s| s.parse::<f64>().ok());

            let cell_id = row.get(columns.cell).unwrap_or("").to_string();
            let time = row.get(columns.time).unwrap_or("");
            let date = match time.get(..10).map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d")) {
                Some(Ok(date)) if !cell_id.is_empty() => date,
                _ => {
                    warn!(line = index + 2, "reanalysis row without cell id or date skipped");
                    continue;
                }
            };

            let record = DailyRecord {
                date,
                srad: field(columns.srad)
                    .and_then(classify_reading)
                    .map(watts_to_megajoules_per_day)
                    .and_then(classify_solar),
                tmax: field(columns.tmax).and_then(classify_reading).map(kelvin_to_celsius),
                tmin: field(columns.tmin).and_then(classify_reading).map(kelvin_to_celsius),
                rain: field(columns.rain)
                    .and_then(classify_reading)
                    .map(flux_to_millimetres_per_day),
                rhum: field(columns.rhum).and_then(classify_reading),
                wind: field(columns.wind)
                    .and_then(classify_reading)
                    .map(metres_per_second_to_km_per_day),
                tdew: field(columns.tdew).and_then(classify_reading).map(kelvin_to_celsius),
            };
            series.entry(cell_id).or_default().push(record);
        }

        for days in series.values_mut() {
            days.sort_by_key(|d| d.date);
        }

        Ok(Self { series })
    }

    fn resolve_columns(headers: &csv::StringRecord, cell_column: &str) -> Result<TableColumns> {
        let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

        let cell = find(cell_column)
            .or_else(|| find("ID"))
            .ok_or_else(|| ProcessingError::MissingData(format!("reanalysis table has no '{}' column", cell_column)))?;
        let time = find(TIME_COLUMN)
            .ok_or_else(|| ProcessingError::MissingData("reanalysis table has no 'time' column".to_string()))?;

        Ok(TableColumns {
            cell,
            time,
            srad: find("ALLSKY_SFC_SW_DWN"),
            tmax: find("T2M_MAX"),
            tmin: find("T2M_MIN"),
            rain: find("PRECTOTCORR"),
            rhum: find("RH2M"),
            wind: find("WS2M"),
            tdew: find("T2MDEW"),
        })
    }

    pub fn cell_count(&self) -> usize {
        self.series.len()
    }

    fn series_for(&self, cell: &ReanalysisCell, range: &DateRange) -> Result<ReanalysisSeries> {
        let days = self.series.get(&cell.id).ok_or_else(|| ProcessingError::Fetch {
            cell_id: cell.id.clone(),
            attempts: 1,
            message: "cell not present in reanalysis table".to_string(),
        })?;

        let days = days.iter().filter(|d| range.contains(d.date)).cloned().collect();
        Ok(ReanalysisSeries::new(cell.id.clone(), None, days))
    }
}

impl ReanalysisSource for ReanalysisTable {
    async fn fetch_daily_series(&self, cell: &ReanalysisCell, range: &DateRange) -> Result<ReanalysisSeries> {
        self.series_for(cell, range)
    }
}
