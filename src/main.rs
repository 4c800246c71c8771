use anyhow::{Context, Result};
use clap::Parser;
use log::error;
use smi2duckdb::cli::{Cli, Commands, ConvertArgs, OutputFormat};
use smi2duckdb::error::error_report;
use smi2duckdb::info::{get_netcdf_info, print_file_info_human, print_file_info_json, print_file_info_yaml};
use smi2duckdb::log::{config_echo, init_logging, show_farewell_with_timing, show_greeting, show_summary};
use smi2duckdb::process_grid_job;
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", error_report(&*e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Convert(args) => convert(args, cli.config.as_deref(), quiet),
        Commands::Info {
            file,
            detailed,
            variable,
            format,
        } => {
            let info = get_netcdf_info(&file, variable.as_deref(), detailed)?;
            match format {
                OutputFormat::Human => print_file_info_human(&info),
                OutputFormat::Json => print_file_info_json(&info)?,
                OutputFormat::Yaml => print_file_info_yaml(&info)?,
            }
            Ok(())
        }
    }
}

fn convert(args: ConvertArgs, config_file: Option<&Path>, quiet: bool) -> Result<()> {
    let start_time = Instant::now();

    let config = args
        .into_job_config(config_file)
        .context("invalid configuration")?;

    if !quiet {
        show_greeting(&config.input);
        config_echo(&config);
    }

    let summary = process_grid_job(&config)?;

    if !quiet {
        show_summary(&summary);
        show_farewell_with_timing(start_time.elapsed());
    }
    Ok(())
}
