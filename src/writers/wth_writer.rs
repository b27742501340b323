use crate::error::Result;
use crate::models::{DailyRecord, Location};
use crate::utils::constants::{
    DEFAULT_INSTITUTION, DEFAULT_REFERENCE_HEIGHT, DEFAULT_WIND_HEIGHT, WTH_MISSING, WTH_MISSING_TOKEN,
};
use crate::utils::units::round_to;
use chrono::Datelike;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const TITLE_LINE: &str = "*WEATHER DATA";

/// Station metadata written in the header of a WTH file
#[derive(Debug, Clone, PartialEq)]
pub struct StationHeader {
    pub institution: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    /// Mean of the monthly mean temperatures
    pub tav: Option<f64>,
    /// Range of the monthly mean temperatures
    pub amp: Option<f64>,
    pub reference_height: f64,
    pub wind_height: f64,
}

impl StationHeader {
    pub fn for_location(location: &Location, elevation: Option<f64>, records: &[DailyRecord]) -> Self {
        let (tav, amp) = temperature_climatology(records);
        Self {
            institution: DEFAULT_INSTITUTION.to_string(),
            latitude: round_to(location.latitude, 5),
            longitude: round_to(location.longitude, 5),
            elevation,
            tav,
            amp,
            reference_height: DEFAULT_REFERENCE_HEIGHT,
            wind_height: DEFAULT_WIND_HEIGHT,
        }
    }

    pub fn with_institution(mut self, institution: &str) -> Self {
        self.institution = institution.to_string();
        self
    }

    pub fn with_heights(mut self, reference_height: f64, wind_height: f64) -> Self {
        self.reference_height = reference_height;
        self.wind_height = wind_height;
        self
    }
}

/// TAV and AMP from the monthly means of the daily mean temperature
pub fn temperature_climatology(records: &[DailyRecord]) -> (Option<f64>, Option<f64>) {
    let mut months: BTreeMap<(i32, u32), (f64, usize)> = BTreeMap::new();
    for record in records {
        if let Some(mean) = record.mean_temperature() {
            let entry = months.entry((record.date.year(), record.date.month())).or_default();
            entry.0 += mean;
            entry.1 += 1;
        }
    }

    let monthly: Vec<f64> = months.values().map(|(sum, n)| sum / *n as f64).collect();
    if monthly.is_empty() {
        return (None, None);
    }

    let tav = monthly.iter().sum::<f64>() / monthly.len() as f64;
    let max = monthly.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = monthly.iter().copied().fold(f64::INFINITY, f64::min);

    (Some(round_to(tav, 1)), Some(round_to(max - min, 1)))
}

pub struct WthWriter;

impl WthWriter {
    pub fn new() -> Self {
        Self
    }

    /// The five header lines, without line terminators
    pub fn render_header(header: &StationHeader) -> Vec<String> {
        let elevation = header
            .elevation
            .map(|e| format!("{:.0}", e))
            .unwrap_or_else(|| format!("{:.0}", WTH_MISSING));

        vec![
            TITLE_LINE.to_string(),
            String::new(),
            format!(
                "{:>6} {:>10} {:>11} {:>10} {:>5} {:>5} {:>5} {:>5}",
                "@ INSI", "LAT", "LONG", "ELEV", "TAV", "AMP", "REFHT", "WNDHT"
            ),
            format!(
                "{:>6} {:>10} {:>11} {:>10} {:>5.1} {:>5.1} {:>5.1} {:>5.1}",
                header.institution,
                header.latitude,
                header.longitude,
                elevation,
                header.tav.unwrap_or(WTH_MISSING),
                header.amp.unwrap_or(WTH_MISSING),
                header.reference_height,
                header.wind_height
            ),
            format!(
                "{:>5} {:>5} {:>5} {:>5} {:>5} {:>5} {:>6} {:>6}",
                "@DATE", "SRAD", "TMAX", "TMIN", "RAIN", "RHUM", "WIND", "TDEW"
            ),
        ]
    }

    /// One fixed-width data line; missing readings are written as -99.0
    pub fn format_data_line(record: &DailyRecord) -> String {
        let value = |v: Option<f64>| v.unwrap_or(WTH_MISSING);
        format!(
            "{:>5} {:>5.1} {:>5.1} {:>5.1} {:>5.1} {:>5.1} {:>6.1} {:>5.1}",
            record.date.format("%y%j"),
            value(record.srad),
            value(record.tmax),
            value(record.tmin),
            value(record.rain),
            value(record.rhum),
            value(record.wind),
            value(record.tdew)
        )
    }

    /// One data line rebuilt from the tokens of an existing line, with only
    /// SRAD replaced; the other columns keep their text as read
    pub fn format_passthrough_line(tokens: &[String], srad: f64) -> String {
        let token = |i: usize| tokens.get(i).map(String::as_str).unwrap_or(WTH_MISSING_TOKEN);
        format!(
            "{:>5} {:>5} {:>5} {:>5} {:>5} {:>5} {:>6} {:>5}",
            token(0),
            format!("{:.1}", srad),
            token(2),
            token(3),
            token(4),
            token(5),
            token(6),
            token(7)
        )
    }

    pub fn write_file(&self, path: &Path, header: &StationHeader, records: &[DailyRecord]) -> Result<()> {
        let lines: Vec<String> = records.iter().map(Self::format_data_line).collect();
        self.write_lines(path, &Self::render_header(header), &lines)
    }

    /// Write header and data lines, no terminators expected on either.
    ///
    /// The file is written beside its destination and renamed into place so
    /// an interrupted run never leaves a partial file behind.
    pub fn write_lines(&self, path: &Path, header_lines: &[String], data_lines: &[String]) -> Result<()> {
        let partial = path.with_extension("WTH.partial");
        {
            let mut writer = BufWriter::new(File::create(&partial)?);
            for line in header_lines.iter().chain(data_lines) {
                writeln!(writer, "{}", line)?;
            }
            writer.flush()?;
        }
        std::fs::rename(&partial, path)?;
        Ok(())
    }
}

impl Default for WthWriter {
    fn default() -> Self {
        Self::new()
    }
}
