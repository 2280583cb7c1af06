use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufReader},
    path::Path,
};

use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};

/// An error that occurred while loading a ruleset
#[derive(Debug, From, Display, Error)]
pub enum RulesetError {
    IoError(io::Error),
    JsonError(serde_json::Error),
}

/// A nation defined by the ruleset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nation {
    #[serde(default)]
    pub adjective: String,
    #[serde(default)]
    pub rule_name: String,
}

impl Nation {
    /// The name we display, the adjective if there is one
    pub fn display_name(&self) -> Option<&str> {
        if !self.adjective.is_empty() {
            Some(&self.adjective)
        } else if !self.rule_name.is_empty() {
            Some(&self.rule_name)
        } else {
            None
        }
    }
}

/// The parts of the game ruleset we use, namely the nation table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ruleset {
    /// Nations keyed by their numeric id, in textual form
    #[serde(default)]
    nations: BTreeMap<String, Nation>,
}

impl Ruleset {
    /// Loads a ruleset from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RulesetError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn is_empty(&self) -> bool {
        self.nations.is_empty()
    }

    pub fn nation(&self, id: i64) -> Option<&Nation> {
        self.nations.get(&id.to_string())
    }

    /// Looks up the display name of a nation by its numeric id
    pub fn nation_name(&self, id: i64) -> Option<&str> {
        self.nation(id)?.display_name()
    }

    /// Resolves a nation identifier as written in a save file.
    /// It is tried as a numeric id first, and then as a rule name.
    pub fn nation_name_from_identifier(&self, identifier: &str) -> Option<&str> {
        let identifier = identifier.trim().trim_matches('"');
        if let Ok(id) = identifier.parse::<i64>() {
            if let Some(name) = self.nation_name(id) {
                return Some(name);
            }
        }
        self.nations
            .values()
            .find(|n| n.rule_name == identifier)
            .and_then(Nation::display_name)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const RULESET: &str = r#"{
        "nations": {
            "3": {"adjective": "Babylonian", "rule_name": "babylonian"},
            "7": {"adjective": "", "rule_name": "Roman"},
            "9": {"plural": "Celts"}
        },
        "terrain": {}
    }"#;

    fn ruleset() -> Ruleset {
        serde_json::from_str(RULESET).unwrap()
    }

    #[test]
    fn test_nation_name() {
        let ruleset = ruleset();
        assert_eq!(ruleset.nation_name(3), Some("Babylonian"));
        assert_eq!(ruleset.nation_name(7), Some("Roman"));
        assert_eq!(ruleset.nation_name(9), None);
        assert_eq!(ruleset.nation_name(1), None);
    }

    #[test]
    fn test_from_identifier() {
        let ruleset = ruleset();
        assert_eq!(ruleset.nation_name_from_identifier("3"), Some("Babylonian"));
        assert_eq!(
            ruleset.nation_name_from_identifier("\"babylonian\""),
            Some("Babylonian")
        );
        assert_eq!(ruleset.nation_name_from_identifier("Roman"), Some("Roman"));
        assert_eq!(ruleset.nation_name_from_identifier("Martian"), None);
    }

    #[test]
    fn test_load() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(RULESET.as_bytes()).unwrap();
        let ruleset = Ruleset::load(file.path()).unwrap();
        assert!(!ruleset.is_empty());
        assert!(matches!(
            Ruleset::load("/does/not/exist.json"),
            Err(RulesetError::IoError(_))
        ));
    }
}
