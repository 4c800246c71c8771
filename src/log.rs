use crate::grid::{GridReader, GridShape};
use crate::info::{describe_file, print_file_info_human};
use crate::input::JobConfig;
use crate::JobSummary;
use ::log::LevelFilter;
use std::time::Duration;

/// Initialises the `env_logger` backend.
///
/// `--verbose` enables debug output, `--quiet` restricts output to errors.
/// Without either flag `RUST_LOG` is honoured, falling back to `info`.
pub fn init_logging(verbose: bool, quiet: bool) {
    let mut builder = env_logger::Builder::new();
    builder.format_timestamp(None).format_target(false);

    if verbose {
        builder.filter_level(LevelFilter::Debug);
    } else if quiet {
        builder.filter_level(LevelFilter::Error);
    } else {
        builder.filter_level(LevelFilter::Info);
        builder.parse_default_env();
    }

    // A logger may already be installed, e.g. when called twice in tests
    let _ = builder.try_init();
}

pub fn show_greeting(input: &str) {
    println!("=== NetCDF to DuckDB Converter ===");
    println!("Reading grid from: {}", input);
}

pub fn config_echo(config: &JobConfig) {
    println!("\nConfiguration:");
    println!("  Input NetCDF: {}", config.input);
    println!("  Variable: {}", config.variable);
    println!("  Time steps: {}", config.time_steps);
    println!("  Output ({}): {}", config.format, config.output_path().display());
    if config.dry_run {
        println!("  Dry run: nothing will be written");
    }
}

pub fn show_grid_info(reader: &GridReader) {
    let info = describe_file(reader.file(), reader.path(), None, false);
    println!();
    print_file_info_human(&info);
    println!("  Mask rule for {}: {:?}", reader.variable_name(), reader.mask());
}

pub fn show_summary(summary: &JobSummary) {
    let GridShape { time_steps, rows, cols } = summary.shape;
    println!("\nSummary:");
    println!("  Grid: {} rows x {} columns, {} time steps", rows, cols, time_steps);
    println!("  Time steps processed: {}", summary.selected_steps);
    println!("  Geometry records: {}", summary.geometry_records);
    println!("  Measurement records: {}", summary.measurement_records);
    if summary.written {
        println!("  Written to: {}", summary.output.display());
    }
}

pub fn show_farewell_with_timing(elapsed: Duration) {
    println!("\n=== Conversion completed successfully in {:.2?}! ===", elapsed);
}
