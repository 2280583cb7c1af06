use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::Path,
};

use derive_more::{Display, Error, From};
use serde_json::Value;
use tracing::info;

use super::{
    super::metrics::TimeSeries,
    world_report::WorldReport,
};

/// Top level keys every report must have
const REQUIRED_FIELDS: [&str; 5] = ["metadata", "civilizations", "time_series", "events", "snapshots"];
/// Keys the report metadata must have
const REQUIRED_METADATA: [&str; 2] = ["turn", "turns_analyzed"];

/// Something wrong with the shape of a report file
#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[display("missing required field: {}", _0)]
    MissingField(#[error(not(source))] &'static str),
    #[display("missing required metadata field: {}", _0)]
    MissingMetadata(#[error(not(source))] &'static str),
    #[display("'{}' must be {}", _0, _1)]
    WrongType(&'static str, &'static str),
}

/// An error that occurred while reading or writing report data
#[derive(Debug, From, Display, Error)]
pub enum ReportIoError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    SchemaError(SchemaError),
}

/// Checks that the value looks like a report, before we try to deserialize
/// it.
pub fn validate_schema(data: &Value) -> Result<(), SchemaError> {
    let Some(root) = data.as_object() else {
        return Err(SchemaError::WrongType("report", "an object"));
    };
    for field in REQUIRED_FIELDS {
        if !root.contains_key(field) {
            return Err(SchemaError::MissingField(field));
        }
    }
    for field in REQUIRED_METADATA {
        if root["metadata"].get(field).is_none() {
            return Err(SchemaError::MissingMetadata(field));
        }
    }
    for field in ["civilizations", "time_series", "snapshots"] {
        if !root[field].is_object() {
            return Err(SchemaError::WrongType(field, "a dictionary"));
        }
    }
    if !root["events"].is_array() {
        return Err(SchemaError::WrongType("events", "a list"));
    }
    Ok(())
}

/// Writes the report as pretty printed JSON, creating the parent
/// directories.
pub fn write_world_data<P: AsRef<Path>>(report: &WorldReport, path: P) -> Result<(), ReportIoError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush()?;
    let size = fs::metadata(path)?.len();
    info!(
        "written {} ({:.2} MB)",
        path.display(),
        size as f64 / (1024.0 * 1024.0)
    );
    Ok(())
}

/// Reads a report written by [write_world_data], validating its structure.
pub fn read_world_data<P: AsRef<Path>>(path: P) -> Result<WorldReport, ReportIoError> {
    let reader = BufReader::new(File::open(path)?);
    let value: Value = serde_json::from_reader(reader)?;
    validate_schema(&value)?;
    Ok(serde_json::from_value(value)?)
}

/// Writes the time series as `metric,turn,player_id,value` rows.
pub fn write_time_series_csv<P: AsRef<Path>>(
    time_series: &TimeSeries,
    path: P,
) -> Result<(), ReportIoError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["metric", "turn", "player_id", "value"])?;
    for (metric, turns) in time_series {
        for (turn, players) in turns {
            for (player, value) in players {
                writer.write_record([
                    metric.name().to_owned(),
                    turn.to_string(),
                    player.to_string(),
                    value.to_string(),
                ])?;
            }
        }
    }
    writer.flush()?;
    info!("written {}", path.display());
    Ok(())
}
