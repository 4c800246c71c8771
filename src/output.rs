//! # Table Output Module
//!
//! This module writes the extracted records into the tables a visualization
//! tool reads. Two sinks are available behind the [`TableSink`] trait:
//!
//! - [`DuckDbSink`]: a single DuckDB database file holding
//!   `Geom.Geom(ID, Latitude, Longitude)` and `Data.Data(ID, Time, Value)`
//! - [`ParquetSink`]: a directory holding `Geom.parquet` and `Data.parquet`
//!   with the same columns
//!
//! Both sinks replace existing output instead of appending to it.

use crate::error::WriteError;
use crate::input::TableFormat;
use crate::records::ExtractedTables;
use duckdb::{params, Connection};
use log::{debug, warn};
use polars::prelude::*;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const GEOMETRY_SCHEMA: &str = "Geom";
pub const GEOMETRY_TABLE: &str = "Geom";
pub const DATA_SCHEMA: &str = "Data";
pub const DATA_TABLE: &str = "Data";

const CREATE_TABLES_SQL: &str = r#"
CREATE SCHEMA "Data";
CREATE SCHEMA "Geom";
CREATE TABLE "Geom"."Geom" ("ID" VARCHAR, "Latitude" DOUBLE, "Longitude" DOUBLE);
CREATE TABLE "Data"."Data" ("ID" VARCHAR, "Time" DOUBLE, "Value" DOUBLE);
"#;

/// A destination for the geometry and measurement tables.
pub trait TableSink {
    /// Writes both tables to `destination`, replacing whatever is there.
    fn write_tables(&self, tables: &ExtractedTables, destination: &Path) -> Result<(), WriteError>;
}

/// Returns the sink for an output format.
pub fn sink_for(format: TableFormat) -> Box<dyn TableSink> {
    match format {
        TableFormat::Duckdb => Box::new(DuckDbSink),
        TableFormat::Parquet => Box::new(ParquetSink),
    }
}

/// Writes the extracted tables in the given format.
///
/// Takes ownership of the records; they are released once written.
///
/// # Errors
///
/// This function will return an error if:
/// - The destination cannot be removed or created
/// - The database rejects a statement or a row
/// - A Parquet file cannot be written
pub fn write_tables(
    tables: ExtractedTables,
    destination: &Path,
    format: TableFormat,
) -> Result<(), WriteError> {
    debug!(
        "Writing {} geometry and {} measurement records to {} ({})",
        tables.geometry.len(),
        tables.measurements.len(),
        destination.display(),
        format
    );
    sink_for(format).write_tables(&tables, destination)
}

/// DuckDB database sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuckDbSink;

impl TableSink for DuckDbSink {
    fn write_tables(&self, tables: &ExtractedTables, destination: &Path) -> Result<(), WriteError> {
        remove_database(destination)?;

        let mut conn = Connection::open(destination)?;
        {
            // Rolled back on drop unless committed
            let tx = conn.transaction()?;
            tx.execute_batch(CREATE_TABLES_SQL)?;

            {
                let mut appender = tx.appender_to_db(GEOMETRY_TABLE, GEOMETRY_SCHEMA)?;
                for record in &tables.geometry {
                    appender.append_row(params![
                        record.id.as_str(),
                        record.latitude,
                        record.longitude
                    ])?;
                }
                appender.flush()?;
            }

            {
                let mut appender = tx.appender_to_db(DATA_TABLE, DATA_SCHEMA)?;
                for record in &tables.measurements {
                    appender.append_row(params![record.id.as_str(), record.time, record.value])?;
                }
                appender.flush()?;
            }

            tx.commit()?;
        }

        conn.close().map_err(|(_, source)| WriteError::Close {
            path: destination.display().to_string(),
            source,
        })?;
        debug!("Successfully wrote database: {}", destination.display());
        Ok(())
    }
}

/// Removes a previous database and its write-ahead log.
fn remove_database(destination: &Path) -> Result<(), WriteError> {
    let mut wal = destination.as_os_str().to_owned();
    wal.push(".wal");

    for path in [destination.to_path_buf(), PathBuf::from(wal)] {
        match fs::remove_file(&path) {
            Ok(()) => debug!("Removed existing output: {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(WriteError::Destination {
                    path: path.display().to_string(),
                    source,
                });
            }
        }
    }
    Ok(())
}

/// Parquet sink; `destination` is a directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetSink;

impl TableSink for ParquetSink {
    fn write_tables(&self, tables: &ExtractedTables, destination: &Path) -> Result<(), WriteError> {
        fs::create_dir_all(destination).map_err(|source| WriteError::Destination {
            path: destination.display().to_string(),
            source,
        })?;

        let ids: Vec<&str> = tables.geometry.iter().map(|r| r.id.as_str()).collect();
        let latitudes: Vec<f64> = tables.geometry.iter().map(|r| r.latitude).collect();
        let longitudes: Vec<f64> = tables.geometry.iter().map(|r| r.longitude).collect();
        let mut geometry = DataFrame::new(vec![
            Series::new("ID".into(), ids).into(),
            Series::new("Latitude".into(), latitudes).into(),
            Series::new("Longitude".into(), longitudes).into(),
        ])?;
        write_parquet(&mut geometry, &destination.join(format!("{}.parquet", GEOMETRY_TABLE)))?;

        let ids: Vec<&str> = tables.measurements.iter().map(|r| r.id.as_str()).collect();
        let times: Vec<f64> = tables.measurements.iter().map(|r| r.time).collect();
        let values: Vec<f64> = tables.measurements.iter().map(|r| r.value).collect();
        let mut data = DataFrame::new(vec![
            Series::new("ID".into(), ids).into(),
            Series::new("Time".into(), times).into(),
            Series::new("Value".into(), values).into(),
        ])?;
        write_parquet(&mut data, &destination.join(format!("{}.parquet", DATA_TABLE)))?;

        Ok(())
    }
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), WriteError> {
    debug!("DataFrame shape: {:?}", df.shape());
    debug!("DataFrame schema:\n{:?}", df.schema());

    let file = File::create(path).map_err(|source| WriteError::Destination {
        path: path.display().to_string(),
        source,
    })?;
    match ParquetWriter::new(file).finish(df) {
        Ok(_) => {
            debug!("Successfully wrote parquet file: {}", path.display());
            Ok(())
        }
        Err(e) => {
            warn!("Parquet writing failed for {}: {}", path.display(), e);
            Err(WriteError::Parquet(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{CellId, GeometryRecord, MeasurementRecord};
    use tempfile::tempdir;

    fn sample_tables() -> ExtractedTables {
        ExtractedTables {
            geometry: vec![
                GeometryRecord { id: CellId::new(0, 0), latitude: 52.5, longitude: 13.4 },
                GeometryRecord { id: CellId::new(0, 1), latitude: 52.5, longitude: 13.5 },
            ],
            measurements: vec![MeasurementRecord {
                id: CellId::new(0, 1),
                time: 42.0,
                value: 0.17,
            }],
            selected_steps: 1,
        }
    }

    fn count_rows(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_duckdb_sink_creates_both_tables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.duckdb");

        DuckDbSink.write_tables(&sample_tables(), &path).unwrap();

        let conn = Connection::open(&path).unwrap();
        assert_eq!(count_rows(&conn, r#""Geom"."Geom""#), 2);
        assert_eq!(count_rows(&conn, r#""Data"."Data""#), 1);

        let (id, time, value): (String, f64, f64) = conn
            .query_row(r#"SELECT "ID", "Time", "Value" FROM "Data"."Data""#, [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .unwrap();
        assert_eq!(id, "0-1");
        assert_eq!(time, 42.0);
        assert_eq!(value, 0.17);
    }

    #[test]
    fn test_duckdb_sink_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.duckdb");
        fs::write(&path, b"not a database").unwrap();

        DuckDbSink.write_tables(&sample_tables(), &path).unwrap();
        DuckDbSink.write_tables(&sample_tables(), &path).unwrap();

        let conn = Connection::open(&path).unwrap();
        assert_eq!(count_rows(&conn, r#""Geom"."Geom""#), 2);
        assert_eq!(count_rows(&conn, r#""Data"."Data""#), 1);
    }

    #[test]
    fn test_duckdb_sink_writes_empty_tables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.duckdb");

        DuckDbSink.write_tables(&ExtractedTables::default(), &path).unwrap();

        let conn = Connection::open(&path).unwrap();
        assert_eq!(count_rows(&conn, r#""Geom"."Geom""#), 0);
        assert_eq!(count_rows(&conn, r#""Data"."Data""#), 0);
    }

    #[test]
    fn test_duckdb_sink_fails_when_destination_is_a_directory() {
        let dir = tempdir().unwrap();
        let result = DuckDbSink.write_tables(&sample_tables(), dir.path());
        assert!(matches!(result, Err(WriteError::Destination { .. })));
    }

    #[test]
    fn test_parquet_sink_writes_two_files() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("tables");

        ParquetSink.write_tables(&sample_tables(), &out).unwrap();

        let geometry = ParquetReader::new(File::open(out.join("Geom.parquet")).unwrap())
            .finish()
            .unwrap();
        let data = ParquetReader::new(File::open(out.join("Data.parquet")).unwrap())
            .finish()
            .unwrap();
        assert_eq!(geometry.shape(), (2, 3));
        assert_eq!(data.shape(), (1, 3));
        assert_eq!(
            data.get_column_names_str(),
            vec!["ID", "Time", "Value"]
        );
    }
}
