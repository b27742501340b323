use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::DateRange;
use crate::utils::constants::{MAX_VALID_SRAD, MIN_VALID_SRAD, MISSING_SENTINELS};

/// One day of weather for one location.
///
/// Units: solar radiation MJ/m2/day, temperatures degC, rainfall mm,
/// relative humidity %, wind km/day. `None` marks a missing reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub srad: Option<f64>,
    pub tmax: Option<f64>,
    pub tmin: Option<f64>,
    pub rain: Option<f64>,
    pub rhum: Option<f64>,
    pub wind: Option<f64>,
    pub tdew: Option<f64>,
}

/// A reanalysis time series for one grid cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReanalysisSeries {
    pub cell_id: String,
    pub elevation: Option<f64>,
    pub days: Vec<DailyRecord>,
}

impl DailyRecord {
    /// A day with every reading missing
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            srad: None,
            tmax: None,
            tmin: None,
            rain: None,
            rhum: None,
            wind: None,
            tdew: None,
        }
    }

    /// Daily mean temperature, when both bounds are present
    pub fn mean_temperature(&self) -> Option<f64> {
        match (self.tmax, self.tmin) {
            (Some(max), Some(min)) => Some((max + min) / 2.0),
            _ => None,
        }
    }
}

impl ReanalysisSeries {
    pub fn new(cell_id: String, elevation: Option<f64>, days: Vec<DailyRecord>) -> Self {
        Self {
            cell_id,
            elevation,
            days,
        }
    }

    /// Exactly one record per day of `range`, ascending.
    ///
    /// Days outside the range are dropped, the first of duplicated days wins
    /// and days the source never returned become all-missing records.
    pub fn align_to(&self, range: &DateRange) -> Vec<DailyRecord> {
        let mut by_date: BTreeMap<NaiveDate, &DailyRecord> = BTreeMap::new();
        for day in &self.days {
            if range.contains(day.date) {
                by_date.entry(day.date).or_insert(day);
            }
        }

        range
            .days()
            .map(|date| {
                by_date
                    .get(&date)
                    .map(|day| (*day).clone())
                    .unwrap_or_else(|| DailyRecord::empty(date))
            })
            .collect()
    }
}

/// Turn a raw numeric reading into `None` when it is a recognized sentinel
pub fn classify_reading(value: f64) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    if MISSING_SENTINELS
        .iter()
        .any(|sentinel| (value - sentinel).abs() < 1e-6)
    {
        return None;
    }
    Some(value)
}

/// Like [`classify_reading`], also rejecting physically impossible radiation
pub fn classify_solar(value: f64) -> Option<f64> {
    classify_reading(value).filter(|v| (MIN_VALID_SRAD..=MAX_VALID_SRAD).contains(v))
}

/// Parse a text token; non-numeric tokens such as `nan` are missing
pub fn parse_reading(token: &str) -> Option<f64> {
    token.trim().parse::<f64>().ok().and_then(classify_reading)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32, srad: f64) -> DailyRecord {
        DailyRecord {
            srad: Some(srad),
            ..DailyRecord::empty(NaiveDate::from_ymd_opt(2020, 10, d).unwrap())
        }
    }

    #[test]
    fn test_sentinel_classification() {
        assert_eq!(classify_reading(-99.0), None);
        assert_eq!(classify_reading(-999.0), None);
        assert_eq!(classify_reading(-9999.0), None);
        assert_eq!(classify_reading(-3596.4), None);
        assert_eq!(classify_reading(f64::NAN), None);
        assert_eq!(classify_reading(-3.5), Some(-3.5));
        assert_eq!(classify_solar(-3.5), None);
        assert_eq!(classify_solar(0.0), Some(0.0));
    }

    #[test]
    fn test_parse_reading_tokens() {
        assert_eq!(parse_reading("-99"), None);
        assert_eq!(parse_reading("-99.0"), None);
        assert_eq!(parse_reading("nan"), None);
        assert_eq!(parse_reading("-3596.4"), None);
        assert_eq!(parse_reading("abc"), None);
        assert_eq!(parse_reading(" 18.4"), Some(18.4));
    }

    #[test]
    fn test_align_fills_gaps_and_drops_duplicates() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2020, 10, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 10, 4).unwrap(),
        )
        .unwrap();
        let series = ReanalysisSeries::new(
            "7".to_string(),
            None,
            vec![day(3, 14.0), day(1, 10.0), day(1, 99.0), day(9, 1.0)],
        );

        let aligned = series.align_to(&range);
        assert_eq!(aligned.len(), 4);
        assert_eq!(aligned[0].srad, Some(10.0));
        assert_eq!(aligned[1], DailyRecord::empty(NaiveDate::from_ymd_opt(2020, 10, 2).unwrap()));
        assert_eq!(aligned[2].srad, Some(14.0));
        assert_eq!(aligned[3].srad, None);
    }

    #[test]
    fn test_mean_temperature() {
        let mut record = DailyRecord::empty(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(record.mean_temperature(), None);
        record.tmax = Some(30.0);
        record.tmin = Some(20.0);
        assert_eq!(record.mean_temperature(), Some(25.0));
    }
}
