use crate::models::{CellValue, DailyRecord, Location, RasterLookup};
use crate::utils::units::round1;
use tracing::debug;

/// Where each day's rainfall came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RainfallSources {
    pub raster_days: usize,
    pub fallback_days: usize,
}

/// Substitutes raster rainfall into a reanalysis series
pub struct RainfallMerger;

impl RainfallMerger {
    pub fn new() -> Self {
        Self
    }

    /// Merge raster rainfall into `reanalysis`, one output record per input day.
    ///
    /// A present raster value wins, rounded to one decimal, even when it is
    /// zero. Missing or absent raster coverage falls back to the reanalysis
    /// rainfall, also rounded. Only the rainfall field is rewritten.
    pub fn merge(&self, location: &Location, reanalysis: &[DailyRecord], raster: &RasterLookup) -> Vec<DailyRecord> {
        self.merge_counted(location, reanalysis, raster).0
    }

    pub fn merge_counted(
        &self,
        location: &Location,
        reanalysis: &[DailyRecord],
        raster: &RasterLookup,
    ) -> (Vec<DailyRecord>, RainfallSources) {
        let mut sources = RainfallSources::default();

        let records = reanalysis
            .iter()
            .map(|day| {
                let rain = match raster.get(&day.date) {
                    Some(CellValue::Present(value)) => {
                        sources.raster_days += 1;
                        Some(round1(*value))
                    }
                    Some(CellValue::Missing) | None => {
                        sources.fallback_days += 1;
                        day.rain.map(round1)
                    }
                };
                DailyRecord { rain, ..day.clone() }
            })
            .collect();

        debug!(
            location = %location.id,
            raster_days = sources.raster_days,
            fallback_days = sources.fallback_days,
            "rainfall merged"
        );

        (records, sources)
    }
}

impl Default for RainfallMerger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 10, day).unwrap()
    }

    fn reanalysis(days: u32, rain: f64) -> Vec<DailyRecord> {
        (1..=days)
            .map(|d| DailyRecord {
                srad: Some(18.0),
                tmax: Some(31.234),
                tmin: Some(22.0),
                rain: Some(rain),
                rhum: Some(80.0),
                wind: Some(190.0),
                tdew: Some(21.0),
                ..DailyRecord::empty(date(d))
            })
            .collect()
    }

    fn location() -> Location {
        Location::at_point("1".to_string(), 13.69, -89.21, "501".to_string())
    }

    #[test]
    fn test_raster_wins_and_fallback_on_missing_or_absent() {
        let mut raster = RasterLookup::new();
        raster.insert(date(1), CellValue::Present(2.0));
        raster.insert(date(3), CellValue::Missing);
        raster.insert(date(5), CellValue::Present(4.0));

        let (merged, sources) = RainfallMerger::new().merge_counted(&location(), &reanalysis(5, 1.0), &raster);

        let rain: Vec<_> = merged.iter().map(|r| r.rain).collect();
        assert_eq!(rain, vec![Some(2.0), Some(1.0), Some(1.0), Some(1.0), Some(4.0)]);
        assert_eq!(
            sources,
            RainfallSources {
                raster_days: 2,
                fallback_days: 3
            }
        );
    }

    #[test]
    fn test_zero_raster_rainfall_is_not_a_fallback() {
        let mut raster = RasterLookup::new();
        raster.insert(date(1), CellValue::Present(0.0));

        let merged = RainfallMerger::new().merge(&location(), &reanalysis(2, 7.3), &raster);
        assert_eq!(merged[0].rain, Some(0.0));
        assert_eq!(merged[1].rain, Some(7.3));
    }

    #[test]
    fn test_values_are_rounded_and_other_fields_untouched() {
        let mut raster = RasterLookup::new();
        raster.insert(date(1), CellValue::Present(3.14159));
        let input = reanalysis(2, 0.06);

        let merged = RainfallMerger::new().merge(&location(), &input, &raster);

        assert_eq!(merged.len(), input.len());
        assert_eq!(merged[0].rain, Some(3.1));
        assert_eq!(merged[1].rain, Some(0.1));
        for (out, inp) in merged.iter().zip(&input) {
            assert_eq!(out.date, inp.date);
            assert_eq!(out.tmax, inp.tmax);
            assert_eq!(out.srad, inp.srad);
            assert_eq!(out.wind, inp.wind);
        }
    }

    #[test]
    fn test_rounding_ties_go_to_even() {
        let mut raster = RasterLookup::new();
        raster.insert(date(1), CellValue::Present(2.25));

        let merged = RainfallMerger::new().merge(&location(), &reanalysis(2, 0.15), &raster);
        assert_eq!(merged[0].rain, Some(2.2));
        assert_eq!(merged[1].rain, Some(0.1));
    }

    #[test]
    fn test_missing_reanalysis_rain_stays_missing() {
        let mut input = reanalysis(1, 0.0);
        input[0].rain = None;

        let merged = RainfallMerger::new().merge(&location(), &input, &RasterLookup::new());
        assert_eq!(merged[0].rain, None);
    }
}
