//! # Data Extraction
//!
//! This module walks the grid once per selected time step and turns it into
//! the two record sequences written by [`crate::output`].
//!
//! ## Key Components
//!
//! - [`extract_tables`]: the extraction loop over any [`GridSource`]
//! - [`progress_bar`]: the progress indicator used by the loop

use crate::error::ExtractError;
use crate::grid::GridSource;
use crate::input::TimeSteps;
use crate::records::{CellId, ExtractedTables, GeometryRecord, MeasurementRecord};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, log_enabled, Level};

/// Extracts geometry and measurement records from a grid.
///
/// For every selected time step, in ascending order, every cell is visited
/// in row-major order. Geometry records are emitted while processing the
/// first selected step only; a measurement record is emitted for every cell
/// that is not masked at that step. With an empty selection the geometry is
/// still emitted once and no measurement is read.
///
/// # Arguments
///
/// * `grid` - The dataset to read from
/// * `steps` - The time steps to extract
/// * `progress` - Advanced by one per processed time step
///
/// # Errors
///
/// Returns [`ExtractError::TimeStepOutOfRange`] before anything is read if
/// the selection does not fit the dataset, and [`ExtractError::Source`] if a
/// time-step slice cannot be read.
///
/// # Examples
///
/// ```rust
/// use indicatif::ProgressBar;
/// use smi2duckdb::extract::extract_tables;
/// use smi2duckdb::grid::MemoryGrid;
/// use smi2duckdb::input::TimeSteps;
///
/// let grid = MemoryGrid::new(1, 2, vec![100.0], vec![50.0, 50.0], vec![8.0, 9.0], vec![0.3, 0.4])?;
/// let tables = extract_tables(&grid, TimeSteps::default(), &ProgressBar::hidden())?;
/// assert_eq!(tables.geometry.len(), 2);
/// assert_eq!(tables.measurements.len(), 2);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn extract_tables<G: GridSource + ?Sized>(
    grid: &G,
    steps: TimeSteps,
    progress: &ProgressBar,
) -> Result<ExtractedTables, ExtractError> {
    let shape = grid.shape();
    let selected = steps.resolve(shape.time_steps)?;
    debug!(
        "Extracting {} of {} time steps over {}x{} cells",
        selected.len(),
        shape.time_steps,
        shape.rows,
        shape.cols
    );

    let mut tables = ExtractedTables {
        geometry: Vec::with_capacity(shape.cells()),
        measurements: Vec::new(),
        selected_steps: selected.len(),
    };

    if selected.is_empty() {
        for row in 0..shape.rows {
            for col in 0..shape.cols {
                push_geometry(grid, &mut tables.geometry, row, col);
            }
        }
        return Ok(tables);
    }

    progress.set_length(selected.len() as u64);
    for (position, &step) in selected.iter().enumerate() {
        let first_step = position == 0;
        let values = grid.read_step(step)?;
        assert_eq!(
            values.len(),
            shape.cells(),
            "time step {} slice does not match the grid",
            step
        );
        let time = grid.time_value(step);
        let before = tables.measurements.len();

        for row in 0..shape.rows {
            for col in 0..shape.cols {
                if first_step {
                    push_geometry(grid, &mut tables.geometry, row, col);
                }
                if let Some(value) = values[shape.offset(row, col)] {
                    tables.measurements.push(MeasurementRecord {
                        id: CellId::new(row, col),
                        time,
                        value,
                    });
                }
            }
        }

        debug!(
            "Time step {} (time = {}): {} valid cells",
            step,
            time,
            tables.measurements.len() - before
        );
        progress.inc(1);
    }
    progress.finish_and_clear();

    Ok(tables)
}

fn push_geometry<G: GridSource + ?Sized>(
    grid: &G,
    geometry: &mut Vec<GeometryRecord>,
    row: usize,
    col: usize,
) {
    let (latitude, longitude) = grid.location(row, col);
    geometry.push(GeometryRecord {
        id: CellId::new(row, col),
        latitude,
        longitude,
    });
}

/// Creates the time-step progress bar.
///
/// The bar is hidden unless informational logging is enabled, so quiet runs
/// and tests stay silent.
pub fn progress_bar() -> ProgressBar {
    if !log_enabled!(Level::Info) {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} time steps",
    ) {
        bar.set_style(style);
    }
    bar
}
