//! # CLI Module
//!
//! This module provides the command-line interface for smi2duckdb:
//! - Argument parsing with clap
//! - Configuration file loading (JSON/YAML) with command-line overrides
//! - The `convert` and `info` subcommands

use crate::error::ConfigError;
use crate::input::{JobConfig, TableFormat, TimeSteps};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Converts gridded NetCDF files into geometry/value tables
#[derive(Parser, Debug)]
#[command(name = "smi2duckdb")]
#[command(about = "Convert gridded NetCDF files into geometry and value tables")]
#[command(version)]
#[command(long_about = "
smi2duckdb reads a gridded NetCDF dataset (dimensions time, northing, easting)
and writes two tables for visualization tools into a DuckDB database:

  Geom.Geom(ID, Latitude, Longitude)   one row per grid cell
  Data.Data(ID, Time, Value)           one row per unmasked cell and time step

Rows of both tables are joined on ID, which is \"<row>-<column>\".

EXAMPLES:
  # Convert the first time step of the SMI variable
  smi2duckdb convert SMI_monthly.nc SMI_monthly.duckdb

  # Convert the first year of monthly data
  smi2duckdb convert SMI_monthly.nc --time-steps 0:11

  # Write Parquet files instead
  smi2duckdb convert SMI_monthly.nc tables/ --format parquet

  # Using a config file
  smi2duckdb --config smi.yaml convert

  # File inspection
  smi2duckdb info SMI_monthly.nc --detailed
")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode - suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file path (JSON or YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a NetCDF grid into geometry and value tables
    #[command(long_about = "
Convert a NetCDF grid into the Geom and Data tables.

Arguments given on the command line override values from --config.
The output defaults to the input path with a .duckdb extension.

EXAMPLES:
  smi2duckdb convert input.nc output.duckdb
  smi2duckdb convert input.nc -n SMI_Oberboden --time-steps all
  smi2duckdb convert input.nc --dry-run
")]
    Convert(ConvertArgs),

    /// Show information about a NetCDF file
    Info {
        /// NetCDF file path
        file: String,

        /// Show global attributes as well
        #[arg(long)]
        detailed: bool,

        /// Show only specific variable info
        #[arg(short = 'n', long)]
        variable: Option<String>,

        /// Output format for file information
        #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,
    },
}

#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct ConvertArgs {
    /// Input NetCDF file path
    #[arg(value_name = "INPUT")]
    pub input: Option<String>,

    /// Output path (DuckDB file, or directory for Parquet)
    #[arg(value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Measurement variable, indexed (time, northing, easting)
    #[arg(short = 'n', long)]
    pub variable: Option<String>,

    /// Time steps to extract: START:END, N, all or none [default: 0:0]
    #[arg(short = 't', long, value_parser = parse_time_steps)]
    pub time_steps: Option<TimeSteps>,

    /// Output table format [default: duckdb]
    #[arg(long, value_enum)]
    pub format: Option<TableFormat>,

    /// Dry run - read and extract without writing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON structured output
    Json,
    /// YAML structured output
    Yaml,
}

/// Parse time-step selection from command line argument
fn parse_time_steps(s: &str) -> Result<TimeSteps, String> {
    s.parse().map_err(|e: ConfigError| e.to_string())
}

impl ConvertArgs {
    /// Builds the job configuration.
    ///
    /// Values given on the command line take priority over values loaded
    /// from `config_file`; anything left unset falls back to the defaults.
    pub fn into_job_config(self, config_file: Option<&Path>) -> Result<JobConfig, ConfigError> {
        let base = config_file.map(JobConfig::from_file).transpose()?;

        let mut config = match (self.input, base) {
            (Some(input), Some(mut base)) => {
                base.input = input;
                base
            }
            (Some(input), None) => JobConfig::new(input),
            (None, Some(base)) => base,
            (None, None) => return Err(ConfigError::MissingInput),
        };

        if let Some(output) = self.output {
            config.output = Some(output);
        }
        if let Some(variable) = self.variable {
            config.variable = variable;
        }
        if let Some(time_steps) = self.time_steps {
            config.time_steps = time_steps;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        config.dry_run |= self.dry_run;

        Ok(config)
    }
}
