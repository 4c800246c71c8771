use crate::error::*;
use crate::grid::*;
use crate::input::*;
use crate::process_grid_job;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const FILL: f32 = -9999.0;

/// Latitude of a fixture cell.
fn fixture_lat(row: usize) -> f64 {
    50.0 + row as f64 * 0.5
}

/// Longitude of a fixture cell.
fn fixture_lon(col: usize) -> f64 {
    8.0 + col as f64 * 0.25
}

/// Writes a grid file laid out like the SMI datasets: `time`, `northing`,
/// `easting`, 2-D `lat`/`lon` and `SMI(time, northing, easting)` with a
/// `_FillValue`.
fn write_smi_file(
    path: &Path,
    rows: usize,
    cols: usize,
    times: &[f64],
    smi: &[f32],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = netcdf::create(path)?;
    file.add_attribute("title", "Soil moisture index test grid")?;

    file.add_dimension(TIME_DIMENSION, times.len())?;
    file.add_dimension(NORTHING_DIMENSION, rows)?;
    file.add_dimension(EASTING_DIMENSION, cols)?;

    {
        let mut time_var = file.add_variable::<f64>(TIME_VARIABLE, &[TIME_DIMENSION])?;
        time_var.put_attribute("units", "days since 1951-01-01")?;
        time_var.put_values(times, ..)?;
    }

    let lats: Vec<f64> = (0..rows * cols).map(|i| fixture_lat(i / cols)).collect();
    let lons: Vec<f64> = (0..rows * cols).map(|i| fixture_lon(i % cols)).collect();
    {
        let mut lat_var =
            file.add_variable::<f64>(LATITUDE_VARIABLE, &[NORTHING_DIMENSION, EASTING_DIMENSION])?;
        lat_var.put_attribute("units", "degrees_north")?;
        lat_var.put_values(&lats, ..)?;
    }
    {
        let mut lon_var =
            file.add_variable::<f64>(LONGITUDE_VARIABLE, &[NORTHING_DIMENSION, EASTING_DIMENSION])?;
        lon_var.put_attribute("units", "degrees_east")?;
        lon_var.put_values(&lons, ..)?;
    }
    {
        let mut smi_var = file.add_variable::<f32>(
            DEFAULT_MEASUREMENT_VARIABLE,
            &[TIME_DIMENSION, NORTHING_DIMENSION, EASTING_DIMENSION],
        )?;
        smi_var.put_attribute("_FillValue", FILL)?;
        smi_var.put_attribute("long_name", "soil moisture index")?;
        smi_var.put_values(smi, ..)?;
    }

    Ok(())
}

/// The 2x2 grid with one time step at t=100 and cell (0, 1) masked.
fn write_scenario_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    write_smi_file(path, 2, 2, &[100.0], &[1.0, FILL, 2.0, 3.0])
}

/// 3x4 grid over 3 time steps; cell (r, c) is masked at step t when
/// (r + c + t) is divisible by 3, otherwise it holds t + r/10 + c/100.
fn write_patterned_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut smi = Vec::new();
    for t in 0..3 {
        for r in 0..3 {
            for c in 0..4 {
                if (r + c + t) % 3 == 0 {
                    smi.push(FILL);
                } else {
                    smi.push(t as f32 + r as f32 / 10.0 + c as f32 / 100.0);
                }
            }
        }
    }
    write_smi_file(path, 3, 4, &[0.0, 31.0, 59.0], &smi)
}

fn job(input: &Path, output: &Path) -> JobConfig {
    let mut config = JobConfig::new(input.to_string_lossy());
    config.output = Some(output.to_string_lossy().to_string());
    config
}

fn read_geometry(path: &Path) -> Vec<(String, f64, f64)> {
    let conn = duckdb::Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare(r#"SELECT "ID", "Latitude", "Longitude" FROM "Geom"."Geom" ORDER BY "ID""#)
        .unwrap();
    let rows: Vec<(String, f64, f64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    rows
}

fn read_data(path: &Path) -> Vec<(String, f64, f64)> {
    let conn = duckdb::Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare(r#"SELECT "ID", "Time", "Value" FROM "Data"."Data" ORDER BY "Time", "ID""#)
        .unwrap();
    let rows: Vec<(String, f64, f64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    rows
}

#[cfg(test)]
mod reader_tests {
    use super::*;

    #[test]
    fn test_grid_reader_with_smi_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input = dir.path().join("patterned.nc");
        write_patterned_file(&input)?;

        let reader = GridReader::open(&input, "SMI")?;
        assert_eq!(
            reader.shape(),
            GridShape {
                time_steps: 3,
                rows: 3,
                cols: 4
            }
        );
        assert_eq!(reader.location(2, 3), (fixture_lat(2), fixture_lon(3)));
        assert_eq!(reader.time_value(1), 31.0);
        assert_eq!(reader.mask().fill_value, Some(FILL as f64));

        let step = reader.read_step(1)?;
        assert_eq!(step.len(), 12);
        // (0, 2) at t=1 is masked, (0, 1) is not
        assert_eq!(step[2], None);
        let value = step[1].unwrap();
        assert!((value - 1.01).abs() < 1e-6);

        reader.close()?;
        Ok(())
    }

    #[test]
    fn test_missing_file_is_format_error() {
        let dir = tempdir().unwrap();
        let result = GridReader::open(dir.path().join("absent.nc"), "SMI");
        assert!(matches!(result, Err(FileFormatError::Open { .. })));
    }

    #[test]
    fn test_missing_variable_is_format_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input = dir.path().join("scenario.nc");
        write_scenario_file(&input)?;

        match GridReader::open(&input, "SMI_Oberboden") {
            Err(FileFormatError::MissingVariable(name)) => assert_eq!(name, "SMI_Oberboden"),
            Err(other) => panic!("Expected MissingVariable, got {:?}", other),
            Ok(_) => panic!("Expected MissingVariable"),
        }
        Ok(())
    }

    #[test]
    fn test_wrong_dimension_order_is_format_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input = dir.path().join("transposed.nc");
        {
            let mut file = netcdf::create(&input)?;
            file.add_dimension("time", 1)?;
            file.add_dimension("northing", 2)?;
            file.add_dimension("easting", 2)?;
            let mut smi = file.add_variable::<f32>("SMI", &["time", "easting", "northing"])?;
            smi.put_values(&[0.1f32, 0.2, 0.3, 0.4], ..)?;
        }

        match GridReader::open(&input, "SMI") {
            Err(FileFormatError::UnexpectedDimensions {
                variable,
                expected,
                found,
            }) => {
                assert_eq!(variable, "SMI");
                assert_eq!(expected, "time, northing, easting");
                assert_eq!(found, "time, easting, northing");
            }
            Err(other) => panic!("Expected UnexpectedDimensions, got {:?}", other),
            Ok(_) => panic!("Expected UnexpectedDimensions"),
        }
        Ok(())
    }

    #[test]
    fn test_one_dimensional_coordinates_are_broadcast() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input = dir.path().join("regular.nc");
        {
            let mut file = netcdf::create(&input)?;
            file.add_dimension("time", 1)?;
            file.add_dimension("northing", 2)?;
            file.add_dimension("easting", 3)?;
            file.add_variable::<f64>("time", &["time"])?
                .put_values(&[0.0], ..)?;
            file.add_variable::<f64>("lat", &["northing"])?
                .put_values(&[54.0, 47.0], ..)?;
            file.add_variable::<f64>("lon", &["easting"])?
                .put_values(&[6.0, 10.0, 15.0], ..)?;
            file.add_variable::<f32>("SMI", &["time", "northing", "easting"])?
                .put_values(&[0.1f32; 6], ..)?;
        }

        let reader = GridReader::open(&input, "SMI")?;
        assert_eq!(reader.location(0, 0), (54.0, 6.0));
        assert_eq!(reader.location(0, 2), (54.0, 15.0));
        assert_eq!(reader.location(1, 1), (47.0, 10.0));
        Ok(())
    }

    #[test]
    fn test_valid_range_attribute_masks_cells() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input = dir.path().join("ranged.nc");
        {
            let mut file = netcdf::create(&input)?;
            file.add_dimension("time", 1)?;
            file.add_dimension("northing", 1)?;
            file.add_dimension("easting", 3)?;
            file.add_variable::<f64>("time", &["time"])?
                .put_values(&[0.0], ..)?;
            file.add_variable::<f64>("lat", &["northing", "easting"])?
                .put_values(&[50.0, 50.0, 50.0], ..)?;
            file.add_variable::<f64>("lon", &["northing", "easting"])?
                .put_values(&[8.0, 9.0, 10.0], ..)?;
            let mut smi = file.add_variable::<f32>("SMI", &["time", "northing", "easting"])?;
            smi.put_attribute("valid_range", vec![0.0f32, 1.0])?;
            smi.put_values(&[0.5f32, 1.5, -0.5], ..)?;
        }

        let reader = GridReader::open(&input, "SMI")?;
        assert_eq!(reader.read_step(0)?, vec![Some(0.5), None, None]);
        Ok(())
    }
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;

    #[test]
    fn test_two_by_two_scenario_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input = dir.path().join("scenario.nc");
        let output = dir.path().join("scenario.duckdb");
        write_scenario_file(&input)?;

        let summary = process_grid_job(&job(&input, &output))?;
        assert_eq!(summary.geometry_records, 4);
        assert_eq!(summary.measurement_records, 3);
        assert_eq!(summary.selected_steps, 1);
        assert!(summary.written);

        let geometry = read_geometry(&output);
        let ids: Vec<&str> = geometry.iter().map(|(id, _, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["0-0", "0-1", "1-0", "1-1"]);
        assert_eq!(geometry[3], ("1-1".to_string(), fixture_lat(1), fixture_lon(1)));

        assert_eq!(
            read_data(&output),
            vec![
                ("0-0".to_string(), 100.0, 1.0),
                ("1-0".to_string(), 100.0, 2.0),
                ("1-1".to_string(), 100.0, 3.0),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_unwritten_cells_without_fill_attribute_are_masked() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input = dir.path().join("partial.nc");
        let output = dir.path().join("partial.duckdb");
        {
            let mut file = netcdf::create(&input)?;
            file.add_dimension("time", 1)?;
            file.add_dimension("northing", 2)?;
            file.add_dimension("easting", 2)?;
            file.add_variable::<f64>("time", &["time"])?
                .put_values(&[100.0], ..)?;
            file.add_variable::<f64>("lat", &["northing", "easting"])?
                .put_values(&[50.0, 50.0, 50.5, 50.5], ..)?;
            file.add_variable::<f64>("lon", &["northing", "easting"])?
                .put_values(&[8.0, 8.25, 8.0, 8.25], ..)?;
            // Row 1 is never written and reads back as the default fill
            file.add_variable::<f32>("SMI", &["time", "northing", "easting"])?
                .put_values(&[0.1f32, 0.2], (0, 0, ..))?;
        }

        let summary = process_grid_job(&job(&input, &output))?;
        assert_eq!(summary.geometry_records, 4);
        assert_eq!(summary.measurement_records, 2);

        let ids: Vec<String> = read_data(&output).into_iter().map(|(id, _, _)| id).collect();
        assert_eq!(ids, vec!["0-0", "0-1"]);
        Ok(())
    }

    #[test]
    fn test_default_output_path_next_to_input() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input = dir.path().join("scenario.nc");
        write_scenario_file(&input)?;

        let summary = process_grid_job(&JobConfig::new(input.to_string_lossy()))?;
        let expected: PathBuf = dir.path().join("scenario.duckdb");
        assert_eq!(summary.output, expected);
        assert!(expected.exists());
        Ok(())
    }

    #[test]
    fn test_all_time_steps_emit_geometry_once() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input = dir.path().join("patterned.nc");
        let output = dir.path().join("patterned.duckdb");
        write_patterned_file(&input)?;

        let mut config = job(&input, &output);
        config.time_steps = TimeSteps::All;
        let summary = process_grid_job(&config)?;

        // 12 cells per step, 4 masked per step
        assert_eq!(summary.selected_steps, 3);
        assert_eq!(summary.geometry_records, 12);
        assert_eq!(summary.measurement_records, 24);
        assert_eq!(read_geometry(&output).len(), 12);

        let data = read_data(&output);
        assert_eq!(data.len(), 24);
        let geometry_ids: Vec<String> = read_geometry(&output).into_iter().map(|(id, _, _)| id).collect();
        assert!(data.iter().all(|(id, _, _)| geometry_ids.contains(id)));
        for time in [0.0, 31.0, 59.0] {
            assert_eq!(data.iter().filter(|(_, t, _)| *t == time).count(), 8);
        }
        Ok(())
    }

    #[test]
    fn test_empty_selection_writes_geometry_only() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input = dir.path().join("patterned.nc");
        let output = dir.path().join("geometry_only.duckdb");
        write_patterned_file(&input)?;

        let mut config = job(&input, &output);
        config.time_steps = TimeSteps::None;
        let summary = process_grid_job(&config)?;

        assert_eq!(summary.selected_steps, 0);
        assert_eq!(read_geometry(&output).len(), 12);
        assert!(read_data(&output).is_empty());
        Ok(())
    }

    #[test]
    fn test_rerun_replaces_output() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input = dir.path().join("patterned.nc");
        let output = dir.path().join("patterned.duckdb");
        write_patterned_file(&input)?;

        let mut config = job(&input, &output);
        config.time_steps = TimeSteps::Range { first: 0, last: 1 };

        process_grid_job(&config)?;
        let first = (read_geometry(&output), read_data(&output));
        process_grid_job(&config)?;
        let second = (read_geometry(&output), read_data(&output));

        assert_eq!(first, second);
        assert_eq!(second.0.len(), 12);
        assert_eq!(second.1.len(), 16);
        Ok(())
    }

    #[test]
    fn test_missing_northing_fails_before_output_is_touched() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input = dir.path().join("no_northing.nc");
        let output = dir.path().join("existing.duckdb");
        {
            let mut file = netcdf::create(&input)?;
            file.add_dimension("time", 1)?;
            file.add_dimension("y", 2)?;
            file.add_dimension("easting", 2)?;
            let mut smi = file.add_variable::<f32>("SMI", &["time", "y", "easting"])?;
            smi.put_values(&[0.1f32, 0.2, 0.3, 0.4], ..)?;
        }
        std::fs::write(&output, b"previous output")?;

        let err = process_grid_job(&job(&input, &output)).unwrap_err();
        assert_eq!(err.stage(), "read");
        match err {
            PipelineError::Read(FileFormatError::MissingDimension(name)) => assert_eq!(name, "northing"),
            other => panic!("Expected missing northing dimension, got {:?}", other),
        }
        assert_eq!(std::fs::read(&output)?, b"previous output");
        Ok(())
    }

    #[test]
    fn test_out_of_range_time_steps_fail_in_extract_stage() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input = dir.path().join("scenario.nc");
        let output = dir.path().join("scenario.duckdb");
        write_scenario_file(&input)?;

        let mut config = job(&input, &output);
        config.time_steps = TimeSteps::Range { first: 0, last: 5 };
        let err = process_grid_job(&config).unwrap_err();

        assert_eq!(err.stage(), "extract");
        assert!(err.to_string().contains("time step 5 is out of range"));
        assert!(!output.exists());
        Ok(())
    }

    #[test]
    fn test_unwritable_output_fails_then_rerun_succeeds() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input = dir.path().join("scenario.nc");
        let output = dir.path().join("blocked.duckdb");
        write_scenario_file(&input)?;

        // A directory in place of the database file cannot be replaced
        std::fs::create_dir(&output)?;
        let err = process_grid_job(&job(&input, &output)).unwrap_err();
        assert_eq!(err.stage(), "write");
        assert!(matches!(err, PipelineError::Write(WriteError::Destination { .. })));

        std::fs::remove_dir(&output)?;
        let summary = process_grid_job(&job(&input, &output))?;
        assert!(summary.written);
        assert_eq!(read_geometry(&output).len(), 4);
        Ok(())
    }

    #[test]
    fn test_dry_run_writes_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input = dir.path().join("scenario.nc");
        let output = dir.path().join("dry.duckdb");
        write_scenario_file(&input)?;

        let mut config = job(&input, &output);
        config.dry_run = true;
        let summary = process_grid_job(&config)?;

        assert!(!summary.written);
        assert_eq!(summary.measurement_records, 3);
        assert!(!output.exists());
        Ok(())
    }

    #[test]
    fn test_parquet_format_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
        use polars::prelude::*;

        let dir = tempdir()?;
        let input = dir.path().join("scenario.nc");
        let output = dir.path().join("tables");
        write_scenario_file(&input)?;

        let mut config = job(&input, &output);
        config.format = TableFormat::Parquet;
        process_grid_job(&config)?;

        let geometry = ParquetReader::new(std::fs::File::open(output.join("Geom.parquet"))?).finish()?;
        let data = ParquetReader::new(std::fs::File::open(output.join("Data.parquet"))?).finish()?;
        assert_eq!(geometry.height(), 4);
        assert_eq!(data.height(), 3);
        Ok(())
    }
}

#[cfg(test)]
mod info_tests {
    use super::*;
    use crate::info::get_netcdf_info;

    #[test]
    fn test_info_lists_grid_structure() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input = dir.path().join("scenario.nc");
        write_scenario_file(&input)?;

        let info = get_netcdf_info(&input.to_string_lossy(), None, true)?;
        assert_eq!(info.total_dimensions, 3);
        assert_eq!(info.total_variables, 4);
        assert!(info.file_size.is_some());
        assert_eq!(
            info.global_attributes.get("title").map(String::as_str),
            Some("Soil moisture index test grid")
        );

        let smi = info.variables.iter().find(|v| v.name == "SMI").unwrap();
        assert_eq!(smi.dimensions, vec!["time", "northing", "easting"]);
        assert_eq!(smi.shape, vec![1, 2, 2]);
        assert!(smi.attributes.contains_key("_FillValue"));
        Ok(())
    }

    #[test]
    fn test_info_single_variable() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input = dir.path().join("scenario.nc");
        write_scenario_file(&input)?;

        let info = get_netcdf_info(&input.to_string_lossy(), Some("lat"), false)?;
        assert_eq!(info.total_variables, 1);
        assert_eq!(info.variables[0].name, "lat");
        assert!(info.global_attributes.is_empty());
        Ok(())
    }
}
