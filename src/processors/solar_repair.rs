//! Detection and repair of missing solar radiation readings.
//!
//! Missing days are grouped into maximal runs. Each run is filled from its
//! shape: where it sits in the sequence and how long it is.
//!
//! | position | length                 | fill                                       |
//! |----------|------------------------|--------------------------------------------|
//! | interior | 1                      | mean of both neighbours                    |
//! | interior | 2                      | linear thirds between the neighbours       |
//! | trailing | up to `max_edge_run`   | last valid reading carried forward         |
//! | leading  | up to `max_edge_run`   | first valid reading carried backward       |
//! | any other shape                   | [`ProcessingError::UnrecoverableMissingRun`] |
//!
//! Edge runs copy the adjacent valid reading into every slot, so a two-day
//! tail repeats the day just before it, not the reading two days before it.
//! Readings are rounded to one decimal (ties to even) before they anchor a fill.

use crate::error::{ProcessingError, Result};
use crate::models::DailyRecord;
use crate::utils::constants::{MAX_EDGE_RUN, MAX_INTERIOR_RUN};
use crate::utils::units::round1;

/// A maximal block of consecutive missing days, by position in the sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingRun {
    pub start: usize,
    pub len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPosition {
    /// Starts the sequence and valid readings follow
    Leading,
    /// Valid readings on both sides
    Interior,
    /// Ends the sequence and valid readings precede
    Trailing,
    /// Covers the whole sequence
    Whole,
}

impl MissingRun {
    /// Index of the last missing day in the run
    pub fn end(&self) -> usize {
        self.start + self.len - 1
    }

    pub fn position(&self, sequence_len: usize) -> RunPosition {
        let at_start = self.start == 0;
        let at_end = self.end() + 1 == sequence_len;
        match (at_start, at_end) {
            (true, true) => RunPosition::Whole,
            (true, false) => RunPosition::Leading,
            (false, true) => RunPosition::Trailing,
            (false, false) => RunPosition::Interior,
        }
    }
}

/// Group missing positions into maximal runs, in sequence order
pub fn find_missing_runs(values: &[Option<f64>]) -> Vec<MissingRun> {
    let mut runs: Vec<MissingRun> = Vec::new();
    for (index, value) in values.iter().enumerate() {
        if value.is_some() {
            continue;
        }
        match runs.last_mut() {
            Some(run) if run.end() + 1 == index => run.len += 1,
            _ => runs.push(MissingRun { start: index, len: 1 }),
        }
    }
    runs
}

/// What a repair pass found and changed in one sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairSummary {
    pub runs: Vec<MissingRun>,
    pub repaired: usize,
}

pub struct SolarRadiationRepair {
    max_interior_run: usize,
    max_edge_run: usize,
}

impl SolarRadiationRepair {
    pub fn new() -> Self {
        Self {
            max_interior_run: MAX_INTERIOR_RUN,
            max_edge_run: MAX_EDGE_RUN,
        }
    }

    /// Repaired copy of `values`, every entry rounded to one decimal.
    ///
    /// Fails with the first run whose shape has no fill rule.
    pub fn repair_values(&self, values: &[Option<f64>]) -> std::result::Result<Vec<f64>, MissingRun> {
        let readings: Vec<Option<f64>> = values.iter().map(|v| v.map(round1)).collect();
        let mut repaired: Vec<f64> = readings.iter().map(|v| v.unwrap_or(f64::NAN)).collect();

        for run in find_missing_runs(&readings) {
            let fill = self.fill_run(&readings, run).ok_or(run)?;
            repaired[run.start..=run.end()].copy_from_slice(&fill);
        }

        Ok(repaired)
    }

    /// Values for the days of `run`, or `None` when no rule applies
    fn fill_run(&self, readings: &[Option<f64>], run: MissingRun) -> Option<Vec<f64>> {
        let before = run.start.checked_sub(1).and_then(|i| readings[i]);
        let after = readings.get(run.end() + 1).copied().flatten();

        match run.position(readings.len()) {
            RunPosition::Interior if run.len == 1 => Some(vec![round1((before? + after?) / 2.0)]),
            RunPosition::Interior if run.len <= self.max_interior_run => {
                let (prev, next) = (before?, after?);
                let step = (next - prev) / (run.len + 1) as f64;
                Some((1..=run.len).map(|k| round1(prev + k as f64 * step)).collect())
            }
            RunPosition::Trailing if run.len <= self.max_edge_run => Some(vec![before?; run.len]),
            RunPosition::Leading if run.len <= self.max_edge_run => Some(vec![after?; run.len]),
            _ => None,
        }
    }

    /// Repair the radiation of a location's records in place.
    ///
    /// Other fields are left untouched. On failure the records are unchanged
    /// and the error names the location and the dates of the run.
    pub fn repair(&self, location_id: &str, records: &mut [DailyRecord]) -> Result<RepairSummary> {
        let values: Vec<Option<f64>> = records.iter().map(|r| r.srad).collect();
        let runs = find_missing_runs(&values);

        let repaired = self.repair_values(&values).map_err(|run| ProcessingError::UnrecoverableMissingRun {
            location_id: location_id.to_string(),
            start: records[run.start].date,
            end: records[run.end()].date,
            length: run.len,
        })?;

        for (record, value) in records.iter_mut().zip(repaired) {
            record.srad = Some(value);
        }

        Ok(RepairSummary {
            repaired: runs.iter().map(|r| r.len).sum(),
            runs,
        })
    }
}

impl Default for SolarRadiationRepair {
    fn default() -> Self {
        Self::new()
    }
}
