use crate::error::{ProcessingError, Result};
use crate::models::{classify_reading, classify_solar, DailyRecord, DateRange, ReanalysisCell, ReanalysisSeries};
use crate::sources::ReanalysisSource;
use crate::utils::constants::{POWER_COMMUNITY, POWER_PARAMETERS};
use crate::utils::units::metres_per_second_to_km_per_day;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
pub struct PowerResponse {
    #[serde(default)]
    geometry: Option<PowerGeometry>,
    properties: PowerProperties,
    #[serde(default)]
    header: Option<PowerHeader>,
    #[serde(default)]
    messages: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PowerGeometry {
    #[serde(default)]
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct PowerProperties {
    parameter: HashMap<String, BTreeMap<String, Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct PowerHeader {
    #[serde(default)]
    fill_value: Option<f64>,
}

/// Client for the NASA POWER daily point service
pub struct PowerClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl PowerClient {
    pub fn new(base_url: &str, timeout: Duration, max_retries: u32, retry_delay: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("chirps-power-wth/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            max_retries: max_retries.max(1),
            retry_delay,
        })
    }

    async fn request(&self, cell: &ReanalysisCell, range: &DateRange) -> Result<PowerResponse> {
        let start = range.start.format("%Y%m%d").to_string();
        let end = range.end.format("%Y%m%d").to_string();
        let latitude = cell.latitude.to_string();
        let longitude = cell.longitude.to_string();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("parameters", POWER_PARAMETERS),
                ("community", POWER_COMMUNITY),
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("format", "JSON"),
            ])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<PowerResponse>().await?)
    }

    /// Request with retries, doubling the delay after each failed attempt
    async fn request_with_retry(&self, cell: &ReanalysisCell, range: &DateRange) -> Result<PowerResponse> {
        let mut delay = self.retry_delay;
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries {
            match self.request(cell, range).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(cell = %cell.id, attempt, error = %e, "reanalysis request failed");
                    last_error = e.to_string();
                }
            }
            if attempt < self.max_retries {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        Err(ProcessingError::Fetch {
            cell_id: cell.id.clone(),
            attempts: self.max_retries,
            message: last_error,
        })
    }
}

impl ReanalysisSource for PowerClient {
    async fn fetch_daily_series(&self, cell: &ReanalysisCell, range: &DateRange) -> Result<ReanalysisSeries> {
        let response = self.request_with_retry(cell, range).await?;
        debug!(cell = %cell.id, "reanalysis series received");
        series_from_response(&cell.id, response)
    }
}

/// Convert a POWER response (AG community units) into a series in WTH units
pub fn series_from_response(cell_id: &str, response: PowerResponse) -> Result<ReanalysisSeries> {
    if !response.messages.is_empty() {
        warn!(cell = %cell_id, messages = ?response.messages, "service returned messages");
    }

    let fill_value = response.header.and_then(|h| h.fill_value).unwrap_or(-999.0);
    let parameters = response.properties.parameter;
    if parameters.is_empty() {
        return Err(ProcessingError::MissingData(format!(
            "response for cell {} holds no parameters",
            cell_id
        )));
    }

    let dates: BTreeSet<&String> = parameters.values().flat_map(|series| series.keys()).collect();
    let value = |name: &str, key: &str| -> Option<f64> {
        parameters
            .get(name)
            .and_then(|series| series.get(key))
            .copied()
            .flatten()
            .filter(|v| (v - fill_value).abs() > 1e-6)
    };

    let mut days = Vec::with_capacity(dates.len());
    for key in dates {
        let date = NaiveDate::parse_from_str(key, "%Y%m%d")?;
        days.push(DailyRecord {
            date,
            srad: value("ALLSKY_SFC_SW_DWN", key).and_then(classify_solar),
            tmax: value("T2M_MAX", key).and_then(classify_reading),
            tmin: value("T2M_MIN", key).and_then(classify_reading),
            rain: value("PRECTOTCORR", key).and_then(classify_reading),
            rhum: value("RH2M", key).and_then(classify_reading),
            wind: value("WS2M", key)
                .and_then(classify_reading)
                .map(metres_per_second_to_km_per_day),
            tdew: value("T2MDEW", key).and_then(classify_reading),
        });
    }

    let elevation = response
        .geometry
        .and_then(|g| g.coordinates.get(2).copied())
        .and_then(classify_reading);

    Ok(ReanalysisSeries::new(cell_id.to_string(), elevation, days))
}
