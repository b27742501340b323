use crate::models::DailyRecord;
use crate::processors::solar_repair::{find_missing_runs, RepairSummary};
use std::collections::BTreeMap;

/// Missing-data tallies for one location, taken before repair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationQuality {
    pub location_id: String,
    pub days: usize,
    pub srad_missing: usize,
    pub srad_repaired: usize,
    /// Run length -> number of missing radiation runs of that length
    pub srad_run_lengths: BTreeMap<usize, usize>,
    pub tmax_missing: usize,
    pub tmin_missing: usize,
    pub rain_missing: usize,
    pub unrecoverable: bool,
}

impl LocationQuality {
    pub fn mark_repaired(&mut self, summary: &RepairSummary) {
        self.srad_repaired = summary.repaired;
    }

    pub fn mark_unrecoverable(&mut self) {
        self.unrecoverable = true;
    }
}

#[derive(Debug, Clone, Default)]
pub struct QualityReport {
    pub locations: Vec<LocationQuality>,
    pub total_days: usize,
    pub srad_missing: usize,
    pub srad_repaired: usize,
    pub srad_run_lengths: BTreeMap<usize, usize>,
    pub tmax_missing: usize,
    pub tmin_missing: usize,
    pub rain_missing: usize,
    pub unrecoverable_locations: usize,
}

impl QualityReport {
    /// Aggregate per-location tallies; locations are kept sorted by id
    pub fn from_locations(mut locations: Vec<LocationQuality>) -> Self {
        locations.sort_by(|a, b| a.location_id.cmp(&b.location_id));

        let mut report = Self::default();
        for quality in &locations {
            report.total_days += quality.days;
            report.srad_missing += quality.srad_missing;
            report.srad_repaired += quality.srad_repaired;
            report.tmax_missing += quality.tmax_missing;
            report.tmin_missing += quality.tmin_missing;
            report.rain_missing += quality.rain_missing;
            if quality.unrecoverable {
                report.unrecoverable_locations += 1;
            }
            for (length, count) in &quality.srad_run_lengths {
                *report.srad_run_lengths.entry(*length).or_default() += count;
            }
        }
        report.locations = locations;
        report
    }
}

pub struct QualityChecker;

impl QualityChecker {
    pub fn new() -> Self {
        Self
    }

    /// Tally missing readings of a merged sequence
    pub fn check(&self, location_id: &str, records: &[DailyRecord]) -> LocationQuality {
        let srad: Vec<Option<f64>> = records.iter().map(|r| r.srad).collect();

        let mut srad_run_lengths = BTreeMap::new();
        for run in find_missing_runs(&srad) {
            *srad_run_lengths.entry(run.len).or_default() += 1;
        }

        LocationQuality {
            location_id: location_id.to_string(),
            days: records.len(),
            srad_missing: srad.iter().filter(|v| v.is_none()).count(),
            srad_repaired: 0,
            srad_run_lengths,
            tmax_missing: records.iter().filter(|r| r.tmax.is_none()).count(),
            tmin_missing: records.iter().filter(|r| r.tmin.is_none()).count(),
            rain_missing: records.iter().filter(|r| r.rain.is_none()).count(),
            unrecoverable: false,
        }
    }

    /// Generate a summary report
    pub fn generate_summary(&self, report: &QualityReport) -> String {
        let percent = |count: usize| {
            if report.total_days == 0 {
                0.0
            } else {
                100.0 * count as f64 / report.total_days as f64
            }
        };

        let mut summary = String::new();
        summary.push_str("=== Quality Control Report ===\n");
        summary.push_str(&format!("Locations: {}\n", report.locations.len()));
        summary.push_str(&format!("Days: {}\n", report.total_days));
        summary.push_str(&format!(
            "Missing SRAD: {} ({:.2}%), repaired: {}\n",
            report.srad_missing,
            percent(report.srad_missing),
            report.srad_repaired
        ));
        summary.push_str(&format!(
            "Missing TMAX: {} ({:.2}%)\n",
            report.tmax_missing,
            percent(report.tmax_missing)
        ));
        summary.push_str(&format!(
            "Missing TMIN: {} ({:.2}%)\n",
            report.tmin_missing,
            percent(report.tmin_missing)
        ));
        summary.push_str(&format!(
            "Missing RAIN: {} ({:.2}%)\n",
            report.rain_missing,
            percent(report.rain_missing)
        ));
        summary.push_str(&format!(
            "Locations with unrecoverable SRAD gaps: {}\n",
            report.unrecoverable_locations
        ));

        if !report.srad_run_lengths.is_empty() {
            summary.push_str("\nSRAD missing runs by length:\n");
            for (length, count) in &report.srad_run_lengths {
                summary.push_str(&format!("  {:>3} day(s): {}\n", length, count));
            }
        }

        summary
    }
}

impl Default for QualityChecker {
    fn default() -> Self {
        Self::new()
    }
}
