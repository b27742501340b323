use serde::{Deserialize, Serialize};
use validator::Validate;

/// A point for which one weather file is produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Location {
    #[validate(length(min = 1))]
    pub id: String,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    /// Reanalysis grid cell this point takes its non-rainfall weather from
    #[validate(nested)]
    pub cell: ReanalysisCell,
}

/// A reanalysis grid cell; several locations may share one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ReanalysisCell {
    #[validate(length(min = 1))]
    pub id: String,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

impl Location {
    pub fn new(id: String, latitude: f64, longitude: f64, cell: ReanalysisCell) -> Self {
        Self {
            id,
            latitude,
            longitude,
            cell,
        }
    }

    /// Location whose reanalysis cell is queried at the point itself
    pub fn at_point(id: String, latitude: f64, longitude: f64, cell_id: String) -> Self {
        let cell = ReanalysisCell::new(cell_id, latitude, longitude);
        Self::new(id, latitude, longitude, cell)
    }

    /// Output file name, e.g. `1024.WTH`
    pub fn wth_file_name(&self) -> String {
        format!("{}.{}", self.id, crate::utils::constants::WTH_EXTENSION)
    }
}

impl ReanalysisCell {
    pub fn new(id: String, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            latitude,
            longitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_validation() {
        let location = Location::at_point("1".to_string(), 13.5, -88.9, "77".to_string());
        assert!(location.validate().is_ok());
        assert_eq!(location.cell.latitude, 13.5);
        assert_eq!(location.wth_file_name(), "1.WTH");
    }

    #[test]
    fn test_invalid_coordinates() {
        let location = Location::at_point("1".to_string(), 91.0, -88.9, "77".to_string());
        assert!(location.validate().is_err());

        let cell = ReanalysisCell::new("77".to_string(), 13.5, 200.0);
        let location = Location::new("2".to_string(), 13.5, -88.9, cell);
        assert!(location.validate().is_err());
    }
}
