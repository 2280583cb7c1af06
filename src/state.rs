use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    fs::{self, File},
    io::{self, BufReader},
    path::{Path, PathBuf},
    rc::Rc,
};

use derive_more::{Display, Error, From};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use super::types::{Snapshot, SnapshotError, Turn};

/// Matches the names of the per step state recordings.
static STATE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^turn_(\d+)_step_(\d+)_state\.json$").unwrap());

/// An error that occurred while indexing or reading a recording.
#[derive(Debug, From, Display, Error)]
pub enum StateError {
    /// The recording directory doesn't exist
    #[display("recording directory not found: {}", _0.display())]
    MissingDirectory(#[error(not(source))] PathBuf),
    IoError(io::Error),
    ParseError(SnapshotError),
}

/// Summary of what a recording contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnSummary {
    pub recording_dir: PathBuf,
    pub total_turns: usize,
    pub total_files: usize,
    pub turn_range: (Turn, Turn),
}

/// Indexed access to a directory of per turn, per step snapshot recordings.
///
/// Snapshots are loaded lazily and memoised, the returned [Rc]s all point
/// to the same immutable snapshot.
pub struct StateAccessor {
    recording_dir: PathBuf,
    /// turn -> [(step, path)] sorted by step
    index: BTreeMap<Turn, Vec<(u32, PathBuf)>>,
    loaded: RefCell<HashMap<PathBuf, Rc<Snapshot>>>,
}

impl StateAccessor {
    /// Scans the directory for `turn_<N>_step_<M>_state.json` files.
    pub fn index<P: AsRef<Path>>(recording_dir: P) -> Result<Self, StateError> {
        let recording_dir = recording_dir.as_ref().to_path_buf();
        if !recording_dir.is_dir() {
            return Err(StateError::MissingDirectory(recording_dir));
        }
        let mut index: BTreeMap<Turn, Vec<(u32, PathBuf)>> = BTreeMap::new();
        for entry in fs::read_dir(&recording_dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(captures) = STATE_FILE.captures(name) else {
                continue;
            };
            // the regex guarantees digits, but they may still overflow
            let (Ok(turn), Ok(step)) = (captures[1].parse::<Turn>(), captures[2].parse::<u32>())
            else {
                debug!("ignoring out of range recording {}", name);
                continue;
            };
            index.entry(turn).or_default().push((step, path));
        }
        for steps in index.values_mut() {
            steps.sort_by_key(|(step, _)| *step);
        }
        Ok(StateAccessor {
            recording_dir,
            index,
            loaded: RefCell::new(HashMap::new()),
        })
    }

    pub fn recording_dir(&self) -> &Path {
        &self.recording_dir
    }

    /// All turns that have at least one recording, ascending.
    pub fn available_turns(&self) -> Vec<Turn> {
        self.index.keys().copied().collect()
    }

    /// The highest recorded turn, 0 for an empty recording.
    pub fn max_turn(&self) -> Turn {
        self.index.keys().next_back().copied().unwrap_or(0)
    }

    pub fn summary(&self) -> TurnSummary {
        TurnSummary {
            recording_dir: self.recording_dir.clone(),
            total_turns: self.index.len(),
            total_files: self.index.values().map(Vec::len).sum(),
            turn_range: match (self.index.keys().next(), self.index.keys().next_back()) {
                (Some(min), Some(max)) => (*min, *max),
                _ => (0, 0),
            },
        }
    }

    /// Reads and memoises a single snapshot file.
    fn load(&self, path: &Path) -> Result<Rc<Snapshot>, StateError> {
        if let Some(snapshot) = self.loaded.borrow().get(path) {
            return Ok(snapshot.clone());
        }
        let reader = BufReader::new(File::open(path)?);
        let value = serde_json::from_reader(reader).map_err(SnapshotError::from)?;
        let snapshot = Rc::new(Snapshot::from_value(value)?);
        self.loaded
            .borrow_mut()
            .insert(path.to_path_buf(), snapshot.clone());
        Ok(snapshot)
    }

    /// Like [StateAccessor::load], but a broken file is logged and treated
    /// as missing.
    fn load_or_warn(&self, path: &Path) -> Option<Rc<Snapshot>> {
        match self.load(path) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("failed to load {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Returns the snapshot of the given step, or of the lowest step if
    /// none is given. Never fails for a missing turn or step.
    pub fn get(&self, turn: Turn, step: Option<u32>) -> Option<Rc<Snapshot>> {
        let steps = self.index.get(&turn)?;
        let path = match step {
            None => &steps.first()?.1,
            Some(step) => &steps.iter().find(|(s, _)| *s == step)?.1,
        };
        self.load_or_warn(path)
    }

    /// Returns all the turns within `[start, end]` that have data, gaps are
    /// skipped.
    pub fn get_range(&self, start: Turn, end: Turn) -> BTreeMap<Turn, Rc<Snapshot>> {
        let mut states = BTreeMap::new();
        if start > end {
            return states;
        }
        for turn in self.index.range(start..=end).map(|(t, _)| *t) {
            if let Some(state) = self.get(turn, None) {
                states.insert(turn, state);
            }
        }
        states
    }

    /// Every recorded step of a single turn.
    pub fn get_all_steps(&self, turn: Turn) -> BTreeMap<u32, Rc<Snapshot>> {
        let mut out = BTreeMap::new();
        if let Some(steps) = self.index.get(&turn) {
            for (step, path) in steps {
                if let Some(state) = self.load_or_warn(path) {
                    out.insert(*step, state);
                }
            }
        }
        out
    }
}
