use clap_derive::Parser;
use derive_more::Display;
use dialoguer::{Input, Select};

use std::{
    error,
    fmt::Debug,
    path::{Path, PathBuf},
};

use freeciv_history_extractor::{
    report::{Format, ReportConfig, DEFAULT_CONTAINER},
    types::Turn,
};

/// The output format choices offered in the interactive prompt.
const FORMAT_CHOICES: [&str; 3] = ["json", "csv", "json and csv"];

#[derive(Debug, Display)]
enum InvalidPath {
    #[display("invalid path (does not exist)")]
    InvalidPath,
    #[display("not a directory")]
    NotADir,
}

impl error::Error for InvalidPath {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        None
    }
}

/// A function to validate the path input.
fn validate_dir_path(input: &String) -> Result<(), InvalidPath> {
    if input.is_empty() {
        return Ok(());
    }
    let p = Path::new(input);
    if p.exists() {
        if p.is_dir() {
            return Ok(());
        } else {
            return Err(InvalidPath::NotADir);
        }
    } else {
        return Err(InvalidPath::InvalidPath);
    }
}

/// A function to parse a comma separated list of turns.
fn parse_turn_list(input: &str) -> Result<Vec<Turn>, &'static str> {
    let turns = input
        .split(',')
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .map(|x| x.parse::<Turn>().map_err(|_| "Turns must be positive numbers"))
        .collect::<Result<Vec<_>, _>>()?;
    if turns.is_empty() {
        Err("At least one turn is required")
    } else {
        Ok(turns)
    }
}

/// A function to parse the format argument.
fn parse_format_arg(input: &str) -> Result<Format, &'static str> {
    input.parse().map_err(|_| "Invalid format, expected json or csv")
}

/// A function to parse the path argument.
fn parse_path_arg(input: &str) -> Result<PathBuf, &'static str> {
    let p = PathBuf::from(input);
    if p.exists() {
        Ok(p)
    } else {
        Err("Invalid path")
    }
}

/// The arguments to the program.
#[derive(Parser)]
pub struct Args {
    #[arg(value_parser = parse_path_arg)]
    /// The directory holding the `turn_<N>_step_<M>_state.json` recordings.
    pub recording_dir: PathBuf,
    #[arg(short, long, default_value = ".")]
    /// The output path for the reports.
    pub output: PathBuf,
    #[arg(short, long, required = true, value_delimiter = ',')]
    /// The turns to generate a report for, each covering the turns up to it.
    pub turns: Vec<Turn>,
    #[arg(short, long, default_value = None)]
    /// The player the saves are named after. Guessed from the recording path if not given.
    pub username: Option<String>,
    #[arg(short, long, default_value = None, value_parser = parse_path_arg)]
    /// The path to a JSON ruleset with the nation names.
    pub ruleset: Option<PathBuf>,
    #[arg(long, default_value = None)]
    /// The directory downloaded save files are kept in.
    pub save_cache: Option<PathBuf>,
    #[arg(short, long, default_value_t = DEFAULT_CONTAINER.to_owned())]
    /// The container missing save files are fetched from.
    pub container: String,
    #[arg(long, default_value_t = false)]
    /// A flag that tells the program to only use save files that are already cached.
    pub no_fetch: bool,
    #[arg(short, long, default_value = "json", value_delimiter = ',', value_parser = parse_format_arg)]
    /// The formats to write the reports in.
    pub format: Vec<Format>,
    #[arg(short, long, default_value_t = false)]
    /// A flag that tells the program not to interact with the user.
    pub no_interaction: bool,
}

impl Args {
    /// Create the object based on user input.
    pub fn get_from_user() -> Self {
        println!("Welcome to the Freeciv history extractor!\nArrows cycle through possible options and enter confirms the selection.");
        let recording_dir = PathBuf::from(
            Input::<String>::new()
                .with_prompt("Enter the recording directory")
                .validate_with(|input: &String| -> Result<(), InvalidPath> {
                    if input.is_empty() {
                        return Err(InvalidPath::InvalidPath);
                    }
                    validate_dir_path(input)
                })
                .interact_text()
                .unwrap(),
        );
        let turns = Input::<String>::new()
            .with_prompt("Enter the report turns separated by a coma")
            .validate_with(|input: &String| -> Result<(), &str> {
                parse_turn_list(input).map(|_| ())
            })
            .interact_text()
            .map(|x| parse_turn_list(&x).unwrap_or_default())
            .unwrap();
        let format = match Select::new()
            .with_prompt("Choose the output format")
            .items(&FORMAT_CHOICES)
            .default(0)
            .interact()
            .unwrap()
        {
            0 => vec![Format::Json],
            1 => vec![Format::Csv],
            _ => vec![Format::Json, Format::Csv],
        };
        let output = Input::<String>::new()
            .with_prompt("Enter the output path [empty for cwd]")
            .allow_empty(true)
            .validate_with(validate_dir_path)
            .interact_text()
            .map(|x| {
                if x.is_empty() {
                    PathBuf::from(".")
                } else {
                    PathBuf::from(x)
                }
            })
            .unwrap();
        Args {
            recording_dir,
            output,
            turns,
            username: None,
            ruleset: None,
            save_cache: None,
            container: DEFAULT_CONTAINER.to_owned(),
            no_fetch: false,
            format,
            no_interaction: false,
        }
    }

    /// Turns the arguments into the library configuration.
    pub fn into_config(self) -> ReportConfig {
        let mut config = ReportConfig::new(self.recording_dir, self.output, self.turns);
        config.formats = self.format;
        config.username = self.username;
        config.ruleset = self.ruleset;
        config.save_cache = self.save_cache;
        config.container = if self.no_fetch {
            None
        } else {
            Some(self.container)
        };
        config
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_parse_turn_list() {
        assert_eq!(parse_turn_list("10, 20,30"), Ok(vec![10, 20, 30]));
        assert!(parse_turn_list("").is_err());
        assert!(parse_turn_list("5,x").is_err());
        assert!(parse_turn_list("-1").is_err());
    }

    #[test]
    fn test_args() {
        let dir = TempDir::new().unwrap();
        let recording = dir.path().to_str().unwrap();
        let args = Args::try_parse_from([
            "freeciv_history_extractor",
            recording,
            "--turns",
            "10,20",
            "-t",
            "30",
            "--format",
            "json,csv",
            "--no-fetch",
        ])
        .unwrap();
        assert_eq!(args.turns, vec![10, 20, 30]);
        let config = args.into_config();
        assert_eq!(config.formats, vec![Format::Json, Format::Csv]);
        assert_eq!(config.container, None);
        assert_eq!(config.output_dir, PathBuf::from("."));

        let args = Args::try_parse_from(["freeciv_history_extractor", recording, "-t", "5"]).unwrap();
        let config = args.into_config();
        assert_eq!(config.formats, vec![Format::Json]);
        assert_eq!(config.container.as_deref(), Some(DEFAULT_CONTAINER));

        assert!(Args::try_parse_from(["freeciv_history_extractor", recording]).is_err());
        assert!(
            Args::try_parse_from(["freeciv_history_extractor", recording, "-t", "5", "-f", "pdf"])
                .is_err()
        );
    }
}
