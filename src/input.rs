//! # Input Configuration Module
//!
//! This module provides configuration parsing for smi2duckdb jobs. A job names
//! the NetCDF file to read, the measurement variable to extract, which time
//! steps to process and where (and in which format) to write the two output
//! tables.
//!
//! ## Configuration Structure
//!
//! - **input**: Path to the input NetCDF file
//! - **output**: Path of the output database (optional, derived from `input`)
//! - **variable**: Measurement variable, `SMI` unless given
//! - **time_steps**: Closed range of time-step indices, `0:0` unless given
//! - **format**: `duckdb` (default) or `parquet`
//!
//! ## Example Usage
//!
//! ```rust
//! use smi2duckdb::input::{JobConfig, TimeSteps};
//!
//! let json = r#"
//! {
//!   "input": "SMI_Gesamtboden_monatlich.nc",
//!   "time_steps": "0:11"
//! }"#;
//! let config = JobConfig::from_json(json)?;
//! assert_eq!(config.variable, "SMI");
//! assert_eq!(config.time_steps, TimeSteps::Range { first: 0, last: 11 });
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::{ConfigError, ExtractError};
use crate::grid::DEFAULT_MEASUREMENT_VARIABLE;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main configuration structure for smi2duckdb jobs.
///
/// # Examples
///
/// ```rust
/// use smi2duckdb::input::{JobConfig, TableFormat};
///
/// let config = JobConfig::new("drought.nc");
/// assert_eq!(config.format, TableFormat::Duckdb);
/// assert_eq!(config.output_path().to_str(), Some("drought.duckdb"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Path to the input NetCDF file
    pub input: String,
    /// Path of the output database; derived from `input` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Name of the measurement variable, indexed (time, northing, easting)
    #[serde(default = "default_variable")]
    pub variable: String,
    /// Time steps to extract
    #[serde(default)]
    pub time_steps: TimeSteps,
    /// Output table format
    #[serde(default)]
    pub format: TableFormat,
    /// Stop after extraction without writing anything
    #[serde(default)]
    pub dry_run: bool,
}

fn default_variable() -> String {
    DEFAULT_MEASUREMENT_VARIABLE.to_string()
}

/// Output table format.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// Single DuckDB database file with `Geom.Geom` and `Data.Data`
    #[default]
    Duckdb,
    /// Directory holding `Geom.parquet` and `Data.parquet`
    Parquet,
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableFormat::Duckdb => write!(f, "duckdb"),
            TableFormat::Parquet => write!(f, "parquet"),
        }
    }
}

/// Selection of time-step indices to extract.
///
/// Textual forms: `START:END` (closed range), `N` (single index), `all` and
/// `none`. Only the first time step is selected by default, which keeps a run
/// over a large grid short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeSteps {
    /// No time step; only the geometry table is filled
    None,
    /// Closed range `first..=last`
    Range { first: usize, last: usize },
    /// Every time step in the dataset
    All,
}

impl Default for TimeSteps {
    fn default() -> Self {
        TimeSteps::Range { first: 0, last: 0 }
    }
}

impl TimeSteps {
    /// Resolves the selection against a dataset with `available` time steps,
    /// returning the indices in ascending order.
    ///
    /// ```rust
    /// use smi2duckdb::input::TimeSteps;
    ///
    /// assert_eq!(TimeSteps::All.resolve(3).unwrap(), vec![0, 1, 2]);
    /// assert!(TimeSteps::Range { first: 0, last: 3 }.resolve(3).is_err());
    /// ```
    pub fn resolve(&self, available: usize) -> Result<Vec<usize>, ExtractError> {
        match *self {
            TimeSteps::None => Ok(Vec::new()),
            TimeSteps::All => Ok((0..available).collect()),
            TimeSteps::Range { first, last } => {
                if last >= available {
                    return Err(ExtractError::TimeStepOutOfRange {
                        index: last,
                        available,
                    });
                }
                Ok((first..=last).collect())
            }
        }
    }
}

impl fmt::Display for TimeSteps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeSteps::None => write!(f, "none"),
            TimeSteps::All => write!(f, "all"),
            TimeSteps::Range { first, last } => write!(f, "{}:{}", first, last),
        }
    }
}

impl FromStr for TimeSteps {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || ConfigError::TimeSteps(s.to_string());

        match trimmed.to_ascii_lowercase().as_str() {
            "none" => return Ok(TimeSteps::None),
            "all" => return Ok(TimeSteps::All),
            _ => {}
        }

        let (first, last) = match trimmed.split_once(':') {
            Some((first, last)) => (first.trim(), last.trim()),
            None => (trimmed, trimmed),
        };
        let first: usize = first.parse().map_err(|_| invalid())?;
        let last: usize = last.parse().map_err(|_| invalid())?;
        if first > last {
            return Err(invalid());
        }
        Ok(TimeSteps::Range { first, last })
    }
}

impl TryFrom<String> for TimeSteps {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeSteps> for String {
    fn from(steps: TimeSteps) -> Self {
        steps.to_string()
    }
}

impl JobConfig {
    /// Creates a configuration with default settings for the given input.
    pub fn new(input: impl Into<String>) -> Self {
        JobConfig {
            input: input.into(),
            output: None,
            variable: default_variable(),
            time_steps: TimeSteps::default(),
            format: TableFormat::default(),
            dry_run: false,
        }
    }

    /// Loads a job configuration from a JSON or YAML file.
    ///
    /// Files ending in `.yaml` or `.yml` are parsed as YAML, everything else
    /// as JSON.
    ///
    /// ```rust,no_run
    /// use smi2duckdb::input::JobConfig;
    ///
    /// let config = JobConfig::from_file("drought.yaml")?;
    /// println!("Processing variable: {}", config.variable);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    /// Loads a job configuration from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, ConfigError> {
        let config: JobConfig = serde_json::from_str(json_str)?;
        Ok(config)
    }

    /// Loads a job configuration from a YAML string.
    pub fn from_yaml(yaml_str: &str) -> Result<Self, ConfigError> {
        let config: JobConfig = serde_yaml::from_str(yaml_str)?;
        Ok(config)
    }

    /// Returns the output path, deriving it from the input path when none
    /// was configured.
    ///
    /// DuckDB output replaces the input extension with `.duckdb`; Parquet
    /// output goes to a `<stem>_tables` directory next to the input.
    pub fn output_path(&self) -> PathBuf {
        if let Some(output) = &self.output {
            return PathBuf::from(output);
        }

        let input = Path::new(&self.input);
        match self.format {
            TableFormat::Duckdb => input.with_extension("duckdb"),
            TableFormat::Parquet => {
                let stem = input
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "output".to_string());
                input.with_file_name(format!("{}_tables", stem))
            }
        }
    }
}
