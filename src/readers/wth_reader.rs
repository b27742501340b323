use crate::error::{ProcessingError, Result};
use crate::models::{parse_reading, DailyRecord};
use crate::utils::constants::WTH_EXTENSION;
use chrono::NaiveDate;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// A weather file as read from disk: header lines kept verbatim, data parsed
#[derive(Debug, Clone, PartialEq)]
pub struct WthDocument {
    pub location_id: String,
    pub header_lines: Vec<String>,
    pub records: Vec<DailyRecord>,
    /// Whitespace-separated fields of each data line as written, parallel to `records`
    pub tokens: Vec<Vec<String>>,
}

pub struct WthReader;

impl WthReader {
    pub fn new() -> Self {
        Self
    }

    /// Read a `.WTH` file; the location id is the file stem
    pub fn read_file(&self, path: &Path) -> Result<WthDocument> {
        let location_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ProcessingError::InvalidFormat(format!("Invalid file path: {}", path.display())))?
            .to_string();

        let reader = BufReader::new(File::open(path)?);
        let mut header_lines = Vec::new();
        let mut records = Vec::new();
        let mut tokens = Vec::new();
        let mut in_data = false;

        for (index, line_result) in reader.lines().enumerate() {
            let line = line_result?;

            if !in_data {
                in_data = line.trim_start().starts_with("@DATE");
                header_lines.push(line);
                continue;
            }

            if line.trim().is_empty() {
                continue;
            }

            let record = Self::parse_data_line(&line).map_err(|e| {
                ProcessingError::InvalidFormat(format!("{}:{}: {}", path.display(), index + 1, e))
            })?;
            records.push(record);
            tokens.push(line.split_whitespace().map(String::from).collect());
        }

        if !in_data {
            return Err(ProcessingError::InvalidFormat(format!(
                "{} has no @DATE header line",
                path.display()
            )));
        }

        Ok(WthDocument {
            location_id,
            header_lines,
            records,
            tokens,
        })
    }

    /// Parse one data line: DATE SRAD TMAX TMIN RAIN RHUM WIND TDEW
    pub fn parse_data_line(line: &str) -> Result<DailyRecord> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 5 {
            return Err(ProcessingError::InvalidFormat(format!(
                "expected at least 5 fields, found {}",
                parts.len()
            )));
        }

        let date = parse_wth_date(parts[0])?;
        let field = |i: usize| parts.get(i).and_then(|token| parse_reading(token));

        Ok(DailyRecord {
            date,
            srad: field(1),
            tmax: field(2),
            tmin: field(3),
            rain: field(4),
            rhum: field(5),
            wind: field(6),
            tdew: field(7),
        })
    }

    /// All `.WTH` files in a directory, sorted by name
    pub fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|e| e == WTH_EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl Default for WthReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a `YYDDD` date
pub fn parse_wth_date(token: &str) -> Result<NaiveDate> {
    if token.len() != 5 || !token.chars().all(|c| c.is_ascii_digit()) {
        return Err(ProcessingError::InvalidFormat(format!("Invalid date: '{}'", token)));
    }
    Ok(NaiveDate::parse_from_str(token, "%y%j")?)
}
