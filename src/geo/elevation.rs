//! Precomputed mean elevation per grid cell.

use crate::constants::geo::{SHORT_ID_RANGE, UNKNOWN_ELEVATION};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Elevation lookup keyed by the short form of a cell id.
#[derive(Debug, Clone, Default)]
pub struct ElevationTable {
    entries: HashMap<String, f64>,
}

impl ElevationTable {
    /// Load a table from a JSON object mapping short cell ids to meters.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ElevationTableRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let entries: HashMap<String, f64> =
            serde_json::from_str(&contents).map_err(|e| Error::ElevationTableParse {
                path: path.to_path_buf(),
                source: e,
            })?;
        info!(
            "Loaded {} elevation cells from {}",
            entries.len(),
            path.display()
        );
        Ok(Self { entries })
    }

    /// Number of cells with a known elevation.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Elevation for a full cell id, or the unknown sentinel.
    pub fn lookup(&self, cell_id: &str) -> f64 {
        short_cell_id(cell_id)
            .and_then(|short| self.entries.get(short))
            .copied()
            .unwrap_or(UNKNOWN_ELEVATION)
    }
}

impl From<HashMap<String, f64>> for ElevationTable {
    fn from(entries: HashMap<String, f64>) -> Self {
        Self { entries }
    }
}

/// The characters of a cell id used as the table key.
pub fn short_cell_id(cell_id: &str) -> Option<&str> {
    cell_id.get(SHORT_ID_RANGE)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_short_cell_id() {
        assert_eq!(short_cell_id("8400281ffffffff"), Some("00281"));
        assert_eq!(short_cell_id("840"), None);
    }

    #[test]
    fn test_lookup_known_and_unknown() {
        let table = ElevationTable::from(HashMap::from([("00281".to_string(), 412.5)]));
        assert_eq!(table.lookup("8400281ffffffff"), 412.5);
        assert_eq!(table.lookup("8400283ffffffff"), UNKNOWN_ELEVATION);
        assert_eq!(table.lookup("84"), UNKNOWN_ELEVATION);
    }

    #[test]
    fn test_zero_elevation_is_known() {
        let table = ElevationTable::from(HashMap::from([("00281".to_string(), 0.0)]));
        assert_eq!(table.lookup("8400281ffffffff"), 0.0);
    }

    #[test]
    fn test_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"00281": 12.0, "1f2a3": -3.5}}"#).unwrap();

        let table = ElevationTable::from_path(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup("841f2a3ffffffff"), -3.5);
    }

    #[test]
    fn test_from_path_errors() {
        let missing = ElevationTable::from_path(Path::new("/nonexistent/elevation.json"));
        assert!(matches!(missing, Err(Error::ElevationTableRead { .. })));

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[1, 2, 3]").unwrap();
        let bad = ElevationTable::from_path(file.path());
        assert!(matches!(bad, Err(Error::ElevationTableParse { .. })));
    }
}
