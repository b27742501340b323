use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A value sampled from one daily raster at one location's pixel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Present(f64),
    /// Read failed, pixel outside the raster, or the pixel holds no-data
    Missing,
}

impl CellValue {
    /// Classify a raw pixel against the raster's no-data value
    pub fn from_pixel(value: f64, nodata: Option<f64>) -> Self {
        let is_nodata = nodata.is_some_and(|nd| (value - nd).abs() < 1e-6);
        if !value.is_finite() || is_nodata || value <= crate::utils::constants::RASTER_NODATA {
            CellValue::Missing
        } else {
            CellValue::Present(value)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            CellValue::Present(v) => Some(*v),
            CellValue::Missing => None,
        }
    }
}

/// Rainfall samples for one location, keyed by the raster's date.
/// Dates without a raster file are absent.
pub type RasterLookup = BTreeMap<NaiveDate, CellValue>;

/// Raster samples for all locations of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RasterTable {
    pub lookups: HashMap<String, RasterLookup>,
}

impl RasterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, location_id: &str, date: NaiveDate, value: CellValue) {
        self.lookups
            .entry(location_id.to_string())
            .or_default()
            .insert(date, value);
    }

    /// Lookup for a location; empty when no raster covered it
    pub fn lookup(&self, location_id: &str) -> RasterLookup {
        self.lookups.get(location_id).cloned().unwrap_or_default()
    }

    /// Number of distinct raster dates across all locations
    pub fn date_count(&self) -> usize {
        let mut dates: Vec<&NaiveDate> = self.lookups.values().flat_map(|l| l.keys()).collect();
        dates.sort();
        dates.dedup();
        dates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nodata_classification() {
        assert_eq!(CellValue::from_pixel(-9999.0, None), CellValue::Missing);
        assert_eq!(CellValue::from_pixel(-1.0, Some(-1.0)), CellValue::Missing);
        assert_eq!(CellValue::from_pixel(f64::NAN, None), CellValue::Missing);
        assert_eq!(CellValue::from_pixel(0.0, Some(-9999.0)), CellValue::Present(0.0));
        assert_eq!(CellValue::Present(3.2).value(), Some(3.2));
    }

    #[test]
    fn test_table_lookup() {
        let date = NaiveDate::from_ymd_opt(2020, 10, 29).unwrap();
        let mut table = RasterTable::new();
        table.insert("1", date, CellValue::Present(4.0));
        table.insert("2", date, CellValue::Missing);

        assert_eq!(table.lookup("1").get(&date), Some(&CellValue::Present(4.0)));
        assert!(table.lookup("3").is_empty());
        assert_eq!(table.date_count(), 1);
    }
}
