//! Row types shared by the extraction loop and the table writers.

use std::fmt;

/// Identifier of a grid cell, `"<row>-<column>"`.
///
/// Joins the geometry table to the value table without repeating the
/// coordinates in every measurement row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(String);

impl CellId {
    pub fn new(row: usize, col: usize) -> Self {
        CellId(format!("{}-{}", row, col))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the `Geom.Geom` table.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryRecord {
    pub id: CellId,
    pub latitude: f64,
    pub longitude: f64,
}

/// One row of the `Data.Data` table.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub id: CellId,
    pub time: f64,
    pub value: f64,
}

/// The two record sequences produced by one extraction pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedTables {
    pub geometry: Vec<GeometryRecord>,
    pub measurements: Vec<MeasurementRecord>,
    /// Number of time steps the pass walked
    pub selected_steps: usize,
}
