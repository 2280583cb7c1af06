/// A submodule for the report configuration and its validation
mod config;
pub use config::{
    username_from_recording_dir, ConfigError, Format, ReportConfig, DEFAULT_CONTAINER,
    RULESET_FILE, SAVE_CACHE_DIR,
};

/// A submodule defining the structure of a finished report
mod world_report;
pub use world_report::{Metadata, TerritorySnapshots, WorldReport};

/// A submodule for reading and writing reports
mod json_io;
pub use json_io::{
    read_world_data, validate_schema, write_time_series_csv, write_world_data, ReportIoError,
    SchemaError,
};

/// A submodule generating the reports of a whole recording
mod generator;
pub use generator::{ReportError, ReportGenerator};
