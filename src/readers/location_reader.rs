use crate::error::{ProcessingError, Result};
use crate::models::{Location, ReanalysisCell};
use crate::utils::constants::{
    CELL_LATITUDE_COLUMN, CELL_LONGITUDE_COLUMN, DEFAULT_CELL_COLUMN, DEFAULT_ID_COLUMN,
    LATITUDE_COLUMN, LONGITUDE_COLUMN,
};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::warn;
use validator::Validate;

/// Locations accepted from the input table, plus how many rows were rejected
#[derive(Debug, Clone, Default)]
pub struct LocationTable {
    pub locations: Vec<Location>,
    pub rejected_rows: usize,
}

struct ColumnIndices {
    id: usize,
    latitude: usize,
    longitude: usize,
    cell: usize,
    cell_latitude: Option<usize>,
    cell_longitude: Option<usize>,
}

pub struct LocationReader {
    id_column: String,
    cell_column: String,
}

impl LocationReader {
    pub fn new() -> Self {
        Self {
            id_column: DEFAULT_ID_COLUMN.to_string(),
            cell_column: DEFAULT_CELL_COLUMN.to_string(),
        }
    }

    pub fn with_columns(id_column: &str, cell_column: &str) -> Self {
        Self {
            id_column: id_column.to_string(),
            cell_column: cell_column.to_string(),
        }
    }

    /// Read the comma-separated location table
    pub fn read_locations(&self, path: &Path) -> Result<LocationTable> {
        let file = std::fs::File::open(path)?;
        self.read_from(file)
    }

    pub fn read_from<R: Read>(&self, source: R) -> Result<LocationTable> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);

        let columns = self.resolve_columns(reader.headers()?)?;
        let mut table = LocationTable::default();
        let mut seen = HashSet::new();

        for (index, row) in reader.records().enumerate() {
            // Header is line 1
            let line = index as u64 + 2;
            let parsed = row
                .map_err(ProcessingError::from)
                .and_then(|record| Self::parse_row(&record, &columns, line));

            match parsed {
                Ok(location) if seen.insert(location.id.clone()) => table.locations.push(location),
                Ok(location) => {
                    warn!(line, location = %location.id, "duplicate location id, row rejected");
                    table.rejected_rows += 1;
                }
                Err(e) => {
                    warn!(line, error = %e, "row rejected");
                    table.rejected_rows += 1;
                }
            }
        }

        Ok(table)
    }

    fn resolve_columns(&self, headers: &csv::StringRecord) -> Result<ColumnIndices> {
        let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let require = |name: &str| {
            find(name).ok_or_else(|| {
                ProcessingError::MissingData(format!("input table has no '{}' column", name))
            })
        };

        Ok(ColumnIndices {
            id: require(&self.id_column)?,
            latitude: require(LATITUDE_COLUMN)?,
            longitude: require(LONGITUDE_COLUMN)?,
            cell: require(&self.cell_column)?,
            cell_latitude: find(CELL_LATITUDE_COLUMN),
            cell_longitude: find(CELL_LONGITUDE_COLUMN),
        })
    }

    fn parse_row(record: &csv::StringRecord, columns: &ColumnIndices, line: u64) -> Result<Location> {
        let field = |index: usize| record.get(index).unwrap_or("").trim();
        let malformed = |message: String| ProcessingError::MalformedRow { line, message };

        let id = field(columns.id);
        if id.is_empty() {
            return Err(malformed("empty location id".to_string()));
        }
        let cell_id = field(columns.cell);
        if cell_id.is_empty() {
            return Err(malformed("empty reanalysis cell id".to_string()));
        }

        let latitude = parse_coordinate(field(columns.latitude)).map_err(|e| malformed(e.to_string()))?;
        let longitude = parse_coordinate(field(columns.longitude)).map_err(|e| malformed(e.to_string()))?;

        // Cell coordinates are optional; blank cells fall back to the point itself
        let optional = |index: Option<usize>| index.map(field).filter(|s| !s.is_empty());
        let cell_latitude = match optional(columns.cell_latitude) {
            Some(value) => parse_coordinate(value).map_err(|e| malformed(e.to_string()))?,
            None => latitude,
        };
        let cell_longitude = match optional(columns.cell_longitude) {
            Some(value) => parse_coordinate(value).map_err(|e| malformed(e.to_string()))?,
            None => longitude,
        };

        let cell = ReanalysisCell::new(cell_id.to_string(), cell_latitude, cell_longitude);
        let location = Location::new(id.to_string(), latitude, longitude, cell);
        location.validate().map_err(|e| malformed(e.to_string()))?;

        Ok(location)
    }
}

impl Default for LocationReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a decimal-degree coordinate
pub fn parse_coordinate(value: &str) -> Result<f64> {
    let trimmed = value.trim();
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ProcessingError::InvalidCoordinate(format!("Invalid coordinate value: '{}'", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_locations_file() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, "ID,Latitude,Longitude,nasapid,LatNP,LonNP")?;
        writeln!(temp_file, "1,13.6929,-89.2182,501,13.75,-89.25")?;
        writeln!(temp_file, "2,13.7010,-89.1900,501,13.75,-89.25")?;
        writeln!(temp_file)?;
        writeln!(temp_file, "3,13.9,-89.0,502,,")?;

        let reader = LocationReader::new();
        let table = reader.read_locations(temp_file.path())?;

        assert_eq!(table.rejected_rows, 0);
        assert_eq!(table.locations.len(), 3);
        assert_eq!(table.locations[0].id, "1");
        assert_eq!(table.locations[0].cell.id, "501");
        assert_eq!(table.locations[1].cell.latitude, 13.75);
        assert_eq!(table.locations[2].cell.latitude, 13.9);
        assert_eq!(table.locations[2].cell.longitude, -89.0);

        Ok(())
    }

    #[test]
    fn test_malformed_rows_are_counted_not_fatal() -> Result<()> {
        let data = "ID,Latitude,Longitude,nasapid\n\
                    1,13.69,-89.21,501\n\
                    2,north,-89.19,501\n\
                    3,95.0,-89.0,502\n\
                    ,13.0,-89.0,502\n\
                    1,13.0,-89.0,503\n\
                    4,13.5,-88.5,504\n";

        let table = LocationReader::new().read_from(data.as_bytes())?;

        assert_eq!(table.locations.len(), 2);
        assert_eq!(table.rejected_rows, 4);
        assert_eq!(table.locations[1].id, "4");

        Ok(())
    }

    #[test]
    fn test_custom_and_missing_columns() {
        let data = "site,Latitude,Longitude,cell\nA7,10.0,20.0,c1\n";
        let table = LocationReader::with_columns("site", "cell")
            .read_from(data.as_bytes())
            .unwrap();
        assert_eq!(table.locations[0].id, "A7");

        let result = LocationReader::new().read_from(data.as_bytes());
        assert!(matches!(result, Err(ProcessingError::MissingData(_))));
    }
}
