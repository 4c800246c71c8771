//! # Grid Reader
//!
//! Opens a gridded NetCDF dataset and exposes what the extraction loop needs:
//! the grid shape, the latitude/longitude of every cell, the value of every
//! time step and the masked measurement slice of one time step at a time.
//!
//! The dataset layout is fixed: dimensions `time`, `northing` and `easting`;
//! variables `time(time)`, `lat`/`lon` over `(northing, easting)` and a
//! measurement variable over `(time, northing, easting)`.
//!
//! [`GridSource`] is the seam between the reader and the extraction loop.
//! [`GridReader`] implements it on top of a NetCDF file, [`MemoryGrid`] on
//! top of plain vectors.

use crate::error::FileFormatError;
use crate::mask::MaskRule;
use log::debug;
use std::path::Path;

pub const TIME_DIMENSION: &str = "time";
pub const NORTHING_DIMENSION: &str = "northing";
pub const EASTING_DIMENSION: &str = "easting";

pub const TIME_VARIABLE: &str = "time";
pub const LATITUDE_VARIABLE: &str = "lat";
pub const LONGITUDE_VARIABLE: &str = "lon";
pub const DEFAULT_MEASUREMENT_VARIABLE: &str = "SMI";

/// Sizes of the three dataset dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    pub time_steps: usize,
    pub rows: usize,
    pub cols: usize,
}

impl GridShape {
    /// Number of spatial cells, `rows * cols`.
    pub fn cells(&self) -> usize {
        self.rows * self.cols
    }

    /// Row-major offset of a cell inside one time-step slice.
    ///
    /// # Panics
    ///
    /// Panics if the cell lies outside the grid.
    pub fn offset(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.rows && col < self.cols,
            "cell ({}, {}) outside {}x{} grid",
            row,
            col,
            self.rows,
            self.cols
        );
        row * self.cols + col
    }
}

/// Read access to a gridded dataset.
pub trait GridSource {
    fn shape(&self) -> GridShape;

    /// `(latitude, longitude)` of a cell.
    fn location(&self, row: usize, col: usize) -> (f64, f64);

    /// Value of the time coordinate at `step`.
    fn time_value(&self, step: usize) -> f64;

    /// Reads one time step as a row-major slice of `rows * cols` cells,
    /// `None` where the cell is masked.
    fn read_step(&self, step: usize) -> Result<Vec<Option<f64>>, FileFormatError>;
}

/// A NetCDF dataset opened for extraction.
///
/// Owns the file handle; the file stays open until [`GridReader::close`] is
/// called or the reader is dropped.
pub struct GridReader {
    path: String,
    file: netcdf::File,
    variable: String,
    shape: GridShape,
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
    times: Vec<f64>,
    mask: MaskRule,
}

impl GridReader {
    /// Opens `path` and validates its layout for the measurement `variable`.
    ///
    /// Coordinates and time values are read eagerly; measurement values are
    /// read per time step by [`GridSource::read_step`].
    ///
    /// # Errors
    ///
    /// Returns a [`FileFormatError`] if the file cannot be opened or lacks a
    /// required dimension or variable, or if a variable is indexed by the
    /// wrong dimensions.
    pub fn open<P: AsRef<Path>>(path: P, variable: &str) -> Result<Self, FileFormatError> {
        let path = path.as_ref().display().to_string();
        debug!("Opening NetCDF file: {}", path);
        let file = netcdf::open(&path).map_err(|source| FileFormatError::Open {
            path: path.clone(),
            source,
        })?;

        let shape = GridShape {
            time_steps: dimension_len(&file, TIME_DIMENSION)?,
            rows: dimension_len(&file, NORTHING_DIMENSION)?,
            cols: dimension_len(&file, EASTING_DIMENSION)?,
        };
        debug!("Grid shape: {:?}", shape);

        let mask = {
            let measurement = file
                .variable(variable)
                .ok_or_else(|| FileFormatError::MissingVariable(variable.to_string()))?;
            expect_dimensions(
                &measurement,
                &[TIME_DIMENSION, NORTHING_DIMENSION, EASTING_DIMENSION],
            )?;
            MaskRule::from_variable(&measurement)
        };

        let times = {
            let time = file
                .variable(TIME_VARIABLE)
                .ok_or_else(|| FileFormatError::MissingVariable(TIME_VARIABLE.to_string()))?;
            expect_dimensions(&time, &[TIME_DIMENSION])?;
            read_all(&time)?
        };

        let latitudes = read_coordinate(&file, LATITUDE_VARIABLE, shape)?;
        let longitudes = read_coordinate(&file, LONGITUDE_VARIABLE, shape)?;

        Ok(GridReader {
            path,
            variable: variable.to_string(),
            file,
            shape,
            latitudes,
            longitudes,
            times,
            mask,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn variable_name(&self) -> &str {
        &self.variable
    }

    pub fn mask(&self) -> &MaskRule {
        &self.mask
    }

    pub fn file(&self) -> &netcdf::File {
        &self.file
    }

    /// Releases the file handle.
    pub fn close(self) -> Result<(), FileFormatError> {
        debug!("Closing NetCDF file: {}", self.path);
        let path = self.path;
        self.file
            .close()
            .map_err(|source| FileFormatError::Close { path, source })
    }
}

impl GridSource for GridReader {
    fn shape(&self) -> GridShape {
        self.shape
    }

    fn location(&self, row: usize, col: usize) -> (f64, f64) {
        let offset = self.shape.offset(row, col);
        (self.latitudes[offset], self.longitudes[offset])
    }

    fn time_value(&self, step: usize) -> f64 {
        self.times[step]
    }

    fn read_step(&self, step: usize) -> Result<Vec<Option<f64>>, FileFormatError> {
        assert!(
            step < self.shape.time_steps,
            "time step {} outside {} time steps",
            step,
            self.shape.time_steps
        );
        let var = self
            .file
            .variable(&self.variable)
            .ok_or_else(|| FileFormatError::MissingVariable(self.variable.clone()))?;
        let raw: Vec<f64> = var
            .get_values::<f64, _>((step, .., ..))
            .map_err(|source| FileFormatError::Read {
                variable: self.variable.clone(),
                source,
            })?;
        Ok(apply_mask(&raw, &self.mask))
    }
}

/// An in-memory grid, laid out like the NetCDF dataset.
///
/// `values` holds `time_steps * rows * cols` raw values, time-major then
/// row-major, and is masked with the same [`MaskRule`] logic as file input.
#[derive(Debug, Clone)]
pub struct MemoryGrid {
    shape: GridShape,
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
    times: Vec<f64>,
    values: Vec<f64>,
    mask: MaskRule,
}

impl MemoryGrid {
    pub fn new(
        rows: usize,
        cols: usize,
        times: Vec<f64>,
        latitudes: Vec<f64>,
        longitudes: Vec<f64>,
        values: Vec<f64>,
    ) -> Result<Self, FileFormatError> {
        let shape = GridShape {
            time_steps: times.len(),
            rows,
            cols,
        };
        expect_len(LATITUDE_VARIABLE, &latitudes, shape.cells())?;
        expect_len(LONGITUDE_VARIABLE, &longitudes, shape.cells())?;
        expect_len("values", &values, shape.time_steps * shape.cells())?;

        Ok(MemoryGrid {
            shape,
            latitudes,
            longitudes,
            times,
            values,
            mask: MaskRule::default(),
        })
    }

    pub fn with_mask(mut self, mask: MaskRule) -> Self {
        self.mask = mask;
        self
    }
}

impl GridSource for MemoryGrid {
    fn shape(&self) -> GridShape {
        self.shape
    }

    fn location(&self, row: usize, col: usize) -> (f64, f64) {
        let offset = self.shape.offset(row, col);
        (self.latitudes[offset], self.longitudes[offset])
    }

    fn time_value(&self, step: usize) -> f64 {
        self.times[step]
    }

    fn read_step(&self, step: usize) -> Result<Vec<Option<f64>>, FileFormatError> {
        let cells = self.shape.cells();
        let start = step * cells;
        Ok(apply_mask(&self.values[start..start + cells], &self.mask))
    }
}

fn apply_mask(raw: &[f64], mask: &MaskRule) -> Vec<Option<f64>> {
    raw.iter().map(|&value| mask.apply(value)).collect()
}

fn expect_len(variable: &str, values: &[f64], expected: usize) -> Result<(), FileFormatError> {
    if values.len() != expected {
        return Err(FileFormatError::LengthMismatch {
            variable: variable.to_string(),
            expected,
            found: values.len(),
        });
    }
    Ok(())
}

fn dimension_len(file: &netcdf::File, name: &str) -> Result<usize, FileFormatError> {
    file.dimension(name)
        .map(|dim| dim.len())
        .ok_or_else(|| FileFormatError::MissingDimension(name.to_string()))
}

fn dimension_names(var: &netcdf::Variable) -> Vec<String> {
    var.dimensions()
        .iter()
        .map(|d| d.name().to_string())
        .collect()
}

fn expect_dimensions(var: &netcdf::Variable, expected: &[&str]) -> Result<(), FileFormatError> {
    let found = dimension_names(var);
    if found.iter().map(String::as_str).eq(expected.iter().copied()) {
        return Ok(());
    }
    Err(FileFormatError::UnexpectedDimensions {
        variable: var.name().to_string(),
        expected: expected.join(", "),
        found: found.join(", "),
    })
}

fn read_all(var: &netcdf::Variable) -> Result<Vec<f64>, FileFormatError> {
    var.get_values::<f64, _>(..)
        .map_err(|source| FileFormatError::Read {
            variable: var.name().to_string(),
            source,
        })
}

/// Reads a coordinate variable as one value per grid cell.
///
/// 2-D coordinates over `(northing, easting)` are taken as they are; 1-D
/// coordinates over `northing` or `easting` are repeated across the other
/// axis.
fn read_coordinate(
    file: &netcdf::File,
    name: &str,
    shape: GridShape,
) -> Result<Vec<f64>, FileFormatError> {
    let var = file
        .variable(name)
        .ok_or_else(|| FileFormatError::MissingVariable(name.to_string()))?;
    let dims = dimension_names(&var);
    let dims: Vec<&str> = dims.iter().map(String::as_str).collect();

    match dims.as_slice() {
        [NORTHING_DIMENSION, EASTING_DIMENSION] => read_all(&var),
        [NORTHING_DIMENSION] => {
            let values = read_all(&var)?;
            Ok(values
                .iter()
                .flat_map(|&v| std::iter::repeat_n(v, shape.cols))
                .collect())
        }
        [EASTING_DIMENSION] => {
            let values = read_all(&var)?;
            Ok((0..shape.rows)
                .flat_map(|_| values.iter().copied())
                .collect())
        }
        _ => Err(FileFormatError::UnexpectedDimensions {
            variable: name.to_string(),
            expected: format!("{}, {}", NORTHING_DIMENSION, EASTING_DIMENSION),
            found: dims.join(", "),
        }),
    }
}
