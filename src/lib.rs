//! # smi2duckdb
//!
//! A Rust library for turning a gridded NetCDF dataset, such as a soil
//! moisture index (SMI) grid, into two flat tables for a visualization tool:
//!
//! - `Geom.Geom(ID, Latitude, Longitude)`: one row per grid cell
//! - `Data.Data(ID, Time, Value)`: one row per unmasked cell and time step
//!
//! Both tables share the cell identifier `"<row>-<column>"`.
//!
//! ## Pipeline
//!
//! 1. [`grid::GridReader`] opens the file and validates its layout
//! 2. [`extract::extract_tables`] walks the grid for the selected time steps
//! 3. [`output::write_tables`] writes the records to DuckDB (or Parquet)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smi2duckdb::{process_grid_job, input::JobConfig};
//!
//! let config = JobConfig::new("SMI_Gesamtboden_monatlich.nc");
//! let summary = process_grid_job(&config).expect("Failed to convert grid");
//! println!("{} cells written", summary.geometry_records);
//! ```

pub mod cli;
pub mod error;
pub mod extract;
pub mod grid;
pub mod info;
pub mod input;
pub mod log;
pub mod mask;
pub mod output;
pub mod records;

#[cfg(test)]
mod tests;

use crate::error::PipelineError;
use crate::extract::{extract_tables, progress_bar};
use crate::grid::{GridReader, GridShape, GridSource};
use crate::input::JobConfig;
use crate::output::write_tables;
use std::path::PathBuf;

/// Outcome of a conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSummary {
    pub shape: GridShape,
    pub selected_steps: usize,
    pub geometry_records: usize,
    pub measurement_records: usize,
    pub output: PathBuf,
    /// `false` for dry runs
    pub written: bool,
}

/// Converts a NetCDF grid according to the provided job configuration.
///
/// This function runs the whole pipeline once:
/// 1. Opens the NetCDF file and validates dimensions and variables
/// 2. Extracts geometry and measurement records for the selected time steps
/// 3. Closes the input file
/// 4. Writes both tables to the output path, replacing any previous output
///
/// Nothing is written for a dry run, and nothing at the output path is
/// touched if reading or extraction fails.
///
/// # Errors
///
/// Returns a [`PipelineError`] naming the stage that failed.
pub fn process_grid_job(config: &JobConfig) -> Result<JobSummary, PipelineError> {
    let reader = GridReader::open(&config.input, &config.variable)?;
    if ::log::log_enabled!(::log::Level::Debug) {
        crate::log::show_grid_info(&reader);
    }

    let shape = reader.shape();
    let progress = progress_bar();
    let tables = extract_tables(&reader, config.time_steps, &progress)?;
    reader.close()?;

    let output = config.output_path();
    let mut summary = JobSummary {
        shape,
        selected_steps: tables.selected_steps,
        geometry_records: tables.geometry.len(),
        measurement_records: tables.measurements.len(),
        output,
        written: false,
    };
    ::log::info!(
        "Extracted {} geometry and {} measurement records",
        summary.geometry_records,
        summary.measurement_records
    );

    if config.dry_run {
        ::log::info!("Dry run: skipping write to {}", summary.output.display());
        return Ok(summary);
    }

    write_tables(tables, &summary.output, config.format)?;
    summary.written = true;
    Ok(summary)
}
