use std::{
    fmt::{self, Display},
    path::{Component, Path, PathBuf},
    str::FromStr,
};

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

use super::super::{game_data::RulesetError, state::StateError, types::Turn};

/// The container the game server runs in by default
pub const DEFAULT_CONTAINER: &str = "freeciv-web";

/// Name of the directory inside the recording holding downloaded saves
pub const SAVE_CACHE_DIR: &str = "savegames";
/// Name of the ruleset file looked for inside the recording
pub const RULESET_FILE: &str = "ruleset.json";

/// The directory recordings are grouped under, the next component is the
/// username
const RECORDINGS_DIR: &str = "recordings";

/// A mistake in the configuration. These are raised before any work starts.
#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("no report turns were given")]
    NoReportTurns,
    #[display("report turns must be positive, got {}", _0)]
    InvalidTurn(#[error(not(source))] Turn),
    #[display("unknown output format {:?}", _0)]
    UnknownFormat(#[error(not(source))] String),
    #[display("no output formats were given")]
    NoFormats,
    #[display("turn {} is beyond the last recorded turn {}", _0, _1)]
    TurnOutOfRange(#[error(not(source))] Turn, #[error(not(source))] Turn),
    StateError(StateError),
    RulesetError(RulesetError),
}

impl From<StateError> for ConfigError {
    fn from(e: StateError) -> Self {
        ConfigError::StateError(e)
    }
}

impl From<RulesetError> for ConfigError {
    fn from(e: RulesetError) -> Self {
        ConfigError::RulesetError(e)
    }
}

/// The file formats a report can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Csv,
}

impl Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => f.write_str("json"),
            Format::Csv => f.write_str("csv"),
        }
    }
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "csv" => Ok(Format::Csv),
            _ => Err(ConfigError::UnknownFormat(s.to_owned())),
        }
    }
}

/// Guesses the username from a recording directory.
///
/// Recordings live under `.../recordings/<username>/...`, failing that the
/// last path component is used.
pub fn username_from_recording_dir(dir: &Path) -> String {
    let components: Vec<&str> = dir
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => name.to_str(),
            _ => None,
        })
        .collect();
    components
        .iter()
        .position(|c| *c == RECORDINGS_DIR)
        .and_then(|i| components.get(i + 1))
        .or_else(|| components.last())
        .map_or_else(|| "unknown".to_owned(), |c| (*c).to_owned())
}

/// Everything needed to generate reports for a recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub recording_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Every turn gets its own report covering turns `0..=turn`
    pub report_turns: Vec<Turn>,
    pub formats: Vec<Format>,
    pub username: Option<String>,
    pub ruleset: Option<PathBuf>,
    pub save_cache: Option<PathBuf>,
    /// Container to fetch missing saves from, `None` disables fetching
    pub container: Option<String>,
}

impl ReportConfig {
    /// A config with JSON output, default paths and fetching from the
    /// default container.
    pub fn new<P: AsRef<Path>, O: AsRef<Path>>(
        recording_dir: P,
        output_dir: O,
        report_turns: Vec<Turn>,
    ) -> Self {
        ReportConfig {
            recording_dir: recording_dir.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
            report_turns,
            formats: vec![Format::Json],
            username: None,
            ruleset: None,
            save_cache: None,
            container: Some(DEFAULT_CONTAINER.to_owned()),
        }
    }

    /// Checks the parts of the config that don't need to look at the data.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.report_turns.is_empty() {
            return Err(ConfigError::NoReportTurns);
        }
        if let Some(turn) = self.report_turns.iter().find(|t| **t == 0) {
            return Err(ConfigError::InvalidTurn(*turn));
        }
        if self.formats.is_empty() {
            return Err(ConfigError::NoFormats);
        }
        if !self.recording_dir.is_dir() {
            return Err(StateError::MissingDirectory(self.recording_dir.clone()).into());
        }
        Ok(())
    }

    pub fn username(&self) -> String {
        self.username
            .clone()
            .unwrap_or_else(|| username_from_recording_dir(&self.recording_dir))
    }

    pub fn save_cache_dir(&self) -> PathBuf {
        self.save_cache
            .clone()
            .unwrap_or_else(|| self.recording_dir.join(SAVE_CACHE_DIR))
    }

    /// The explicitly given ruleset, or the one in the recording if it
    /// exists.
    pub fn ruleset_path(&self) -> Option<PathBuf> {
        match &self.ruleset {
            Some(path) => Some(path.clone()),
            None => {
                let path = self.recording_dir.join(RULESET_FILE);
                path.is_file().then_some(path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_username() {
        assert_eq!(
            username_from_recording_dir(Path::new("logs/recordings/alice/run1")),
            "alice"
        );
        assert_eq!(
            username_from_recording_dir(Path::new("/data/bob/")),
            "bob"
        );
        assert_eq!(username_from_recording_dir(Path::new("/")), "unknown");
    }

    #[test]
    fn test_format() {
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert_eq!(" CSV".parse::<Format>().unwrap(), Format::Csv);
        assert!(matches!(
            "pdf".parse::<Format>(),
            Err(ConfigError::UnknownFormat(_))
        ));
        assert_eq!(Format::Csv.to_string(), "csv");
    }

    #[test]
    fn test_validate() {
        let dir = TempDir::new().unwrap();
        let config = ReportConfig::new(dir.path(), dir.path(), vec![10, 25]);
        assert!(config.validate().is_ok());

        let empty = ReportConfig::new(dir.path(), dir.path(), vec![]);
        assert!(matches!(empty.validate(), Err(ConfigError::NoReportTurns)));

        let zero = ReportConfig::new(dir.path(), dir.path(), vec![3, 0]);
        assert!(matches!(zero.validate(), Err(ConfigError::InvalidTurn(0))));

        let mut no_formats = config.clone();
        no_formats.formats.clear();
        assert!(matches!(no_formats.validate(), Err(ConfigError::NoFormats)));

        let missing = ReportConfig::new(dir.path().join("nope"), dir.path(), vec![1]);
        assert!(matches!(
            missing.validate(),
            Err(ConfigError::StateError(StateError::MissingDirectory(_)))
        ));
    }

    #[test]
    fn test_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ReportConfig::new(dir.path(), dir.path(), vec![1]);
        assert_eq!(config.save_cache_dir(), dir.path().join(SAVE_CACHE_DIR));
        assert_eq!(config.ruleset_path(), None);
        std::fs::write(dir.path().join(RULESET_FILE), "{}").unwrap();
        assert_eq!(config.ruleset_path(), Some(dir.path().join(RULESET_FILE)));
    }
}
