//! # Error Types
//!
//! Each pipeline stage has its own error enum so that a failure can always be
//! traced back to the stage that produced it. [`PipelineError`] wraps them and
//! is what [`crate::process_grid_job`] returns.

use thiserror::Error;

/// Errors raised while opening or validating the input dataset.
#[derive(Error, Debug)]
pub enum FileFormatError {
    #[error("cannot open NetCDF file '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: netcdf::Error,
    },

    #[error("missing dimension '{0}'")]
    MissingDimension(String),

    #[error("missing variable '{0}'")]
    MissingVariable(String),

    #[error("variable '{variable}' must be indexed as ({expected}), found ({found})")]
    UnexpectedDimensions {
        variable: String,
        expected: String,
        found: String,
    },

    #[error("variable '{variable}' holds {found} values, expected {expected}")]
    LengthMismatch {
        variable: String,
        expected: usize,
        found: usize,
    },

    #[error("cannot read variable '{variable}': {source}")]
    Read {
        variable: String,
        #[source]
        source: netcdf::Error,
    },

    #[error("cannot close NetCDF file '{path}': {source}")]
    Close {
        path: String,
        #[source]
        source: netcdf::Error,
    },
}

/// Errors raised by the extraction loop.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("time step {index} is out of range (dataset has {available} time steps)")]
    TimeStepOutOfRange { index: usize, available: usize },

    #[error(transparent)]
    Source(#[from] FileFormatError),
}

/// Errors raised while writing the output tables.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("cannot prepare output destination '{path}': {source}")]
    Destination {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("cannot close database '{path}': {source}")]
    Close {
        path: String,
        #[source]
        source: duckdb::Error,
    },

    #[error("parquet error: {0}")]
    Parquet(#[from] polars::prelude::PolarsError),
}

/// Errors raised while loading a job configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read configuration file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid time-step selection '{0}': expected START:END, N, 'all' or 'none'")]
    TimeSteps(String),

    #[error("no input file given")]
    MissingInput,
}

/// A failed conversion, tagged with the stage that failed.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("read stage failed: {0}")]
    Read(#[from] FileFormatError),

    #[error("extract stage failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("write stage failed: {0}")]
    Write(#[from] WriteError),
}

impl PipelineError {
    /// Name of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Read(_) => "read",
            PipelineError::Extract(_) => "extract",
            PipelineError::Write(_) => "write",
        }
    }
}

/// Formats an error and its causes on one line.
///
/// Causes whose message is already part of the preceding message are
/// skipped, so errors that embed their source are not repeated.
pub fn error_report(err: &(dyn std::error::Error + 'static)) -> String {
    let mut report = err.to_string();
    let mut parent = report.clone();
    let mut cause = err.source();
    while let Some(error) = cause {
        let message = error.to_string();
        if !parent.contains(&message) {
            report.push_str(": ");
            report.push_str(&message);
        }
        parent = message;
        cause = error.source();
    }
    report
}
