use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use glob::{glob, Pattern};
use tracing::{debug, info, warn};

use super::{
    super::types::Turn,
    record::SaveFileRecord,
    save_file::SaveFile,
    source::{save_order, save_prefix, SaveFileSource},
};

/// Anything that can provide parsed save file data for a turn.
/// Missing data is never an error, just `None`.
pub trait SaveDataProvider {
    fn record_for_turn(&self, turn: Turn) -> Option<Rc<SaveFileRecord>>;
}

/// A provider that never has any save data.
pub struct NoSaveData;

impl SaveDataProvider for NoSaveData {
    fn record_for_turn(&self, _turn: Turn) -> Option<Rc<SaveFileRecord>> {
        None
    }
}

impl SaveDataProvider for BTreeMap<Turn, Rc<SaveFileRecord>> {
    fn record_for_turn(&self, turn: Turn) -> Option<Rc<SaveFileRecord>> {
        self.get(&turn).cloned()
    }
}

/// A local directory of downloaded saves, filled from an optional external
/// source on a miss.
///
/// The engine sometimes labels the save written at the end of a turn with
/// the next turn number, so `turn + 1` is probed after `turn`.
pub struct SaveFileCache {
    dir: PathBuf,
    username: String,
    source: Option<Box<dyn SaveFileSource>>,
    parsed: RefCell<HashMap<Turn, Option<Rc<SaveFileRecord>>>>,
}

impl SaveFileCache {
    pub fn new<P: AsRef<Path>>(dir: P, username: impl Into<String>) -> Self {
        SaveFileCache {
            dir: dir.as_ref().to_path_buf(),
            username: username.into(),
            source: None,
            parsed: RefCell::new(HashMap::new()),
        }
    }

    /// Sets the source used to fill cache misses.
    pub fn with_source(mut self, source: Box<dyn SaveFileSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Finds the newest cached save labelled with `turn`.
    fn find_cached(&self, turn: Turn) -> Option<PathBuf> {
        let prefix = save_prefix(&self.username, turn);
        let pattern = self.dir.join(format!("{}*", Pattern::escape(&prefix)));
        let pattern = pattern.to_str()?;
        let paths = match glob(pattern) {
            Ok(paths) => paths,
            Err(e) => {
                warn!("invalid cache pattern {}: {}", pattern, e);
                return None;
            }
        };
        paths.filter_map(Result::ok).max_by(|a, b| {
            let a = a.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            let b = b.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            save_order(&a, &prefix).cmp(&save_order(&b, &prefix))
        })
    }

    /// Asks the source for the save and stores it in the cache.
    fn fetch(&self, turn: Turn) -> Option<PathBuf> {
        let source = self.source.as_ref()?;
        let fetched = match source.fetch(&self.username, turn) {
            Ok(Some(fetched)) => fetched,
            Ok(None) => return None,
            Err(e) => {
                warn!(
                    "failed to fetch save of {} for turn {}, using snapshot data only: {}",
                    self.username, turn, e
                );
                return None;
            }
        };
        // never let a remote name escape the cache directory
        let Some(filename) = Path::new(&fetched.filename).file_name() else {
            warn!("refusing to store save named {:?}", fetched.filename);
            return None;
        };
        let path = self.dir.join(filename);
        if let Err(e) = fs::create_dir_all(&self.dir).and_then(|_| fs::write(&path, &fetched.contents)) {
            warn!("failed to store {}: {}", path.display(), e);
            return None;
        }
        info!("cached {} ({} bytes)", path.display(), fetched.contents.len());
        Some(path)
    }

    fn load(&self, turn: Turn) -> Option<Rc<SaveFileRecord>> {
        let candidates = [turn, turn.saturating_add(1)];
        let path = candidates
            .iter()
            .find_map(|t| self.find_cached(*t))
            .or_else(|| candidates.iter().find_map(|t| self.fetch(*t)))?;
        match SaveFile::open(&path) {
            Ok(save) => {
                debug!("parsing {} for turn {}", path.display(), turn);
                Some(Rc::new(save.parse()))
            }
            Err(e) => {
                warn!("failed to open {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl SaveDataProvider for SaveFileCache {
    fn record_for_turn(&self, turn: Turn) -> Option<Rc<SaveFileRecord>> {
        if let Some(record) = self.parsed.borrow().get(&turn) {
            return record.clone();
        }
        let record = self.load(turn);
        self.parsed.borrow_mut().insert(turn, record.clone());
        record
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use tempfile::TempDir;

    use super::{super::source::{FetchError, FetchedSave}, *};

    const SAVE: &str = "[player0]\nrates.science=40\n";

    struct CountingSource {
        turn: Turn,
        calls: Rc<Cell<usize>>,
    }

    impl SaveFileSource for CountingSource {
        fn fetch(&self, username: &str, turn: Turn) -> Result<Option<FetchedSave>, FetchError> {
            self.calls.set(self.calls.get() + 1);
            if turn != self.turn {
                return Ok(None);
            }
            Ok(Some(FetchedSave {
                filename: format!("{}1.sav", save_prefix(username, turn)),
                contents: SAVE.as_bytes().to_vec(),
            }))
        }
    }

    struct FailingSource;

    impl SaveFileSource for FailingSource {
        fn fetch(&self, _: &str, turn: Turn) -> Result<Option<FetchedSave>, FetchError> {
            Err(FetchError::CommandFailed(format!("fetch {}", turn), "boom".to_owned()))
        }
    }

    #[test]
    fn test_cached() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("alice_T5_2.sav"), "[player0]\nrates.science=10\n").unwrap();
        fs::write(dir.path().join("alice_T5_10.sav"), SAVE).unwrap();
        fs::write(dir.path().join("alice_T50_1.sav"), "").unwrap();
        let cache = SaveFileCache::new(dir.path(), "alice");
        let record = cache.record_for_turn(5).unwrap();
        assert_eq!(record.science[&0].science_per_turn, 40);
        assert!(cache.record_for_turn(7).is_none());
    }

    #[test]
    fn test_next_turn_label() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("alice_T8_1.sav"), SAVE).unwrap();
        let cache = SaveFileCache::new(dir.path(), "alice");
        assert!(cache.record_for_turn(7).is_some());
    }

    #[test]
    fn test_fetch_and_store() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("savegames");
        let calls = Rc::new(Cell::new(0));
        let cache = SaveFileCache::new(&cache_dir, "alice").with_source(Box::new(CountingSource {
            turn: 3,
            calls: calls.clone(),
        }));
        let record = cache.record_for_turn(3).unwrap();
        assert_eq!(record.science[&0].science_per_turn, 40);
        assert!(cache_dir.join("alice_T3_1.sav").exists());
        // memoised, the source is not asked again
        let again = cache.record_for_turn(3).unwrap();
        assert!(Rc::ptr_eq(&record, &again));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_fetch_failure() {
        let dir = TempDir::new().unwrap();
        let cache = SaveFileCache::new(dir.path(), "alice").with_source(Box::new(FailingSource));
        assert!(cache.record_for_turn(3).is_none());
    }

    #[test]
    fn test_no_save_data() {
        assert!(NoSaveData.record_for_turn(1).is_none());
        let mut map = BTreeMap::new();
        map.insert(2, Rc::new(SaveFileRecord::default()));
        assert!(map.record_for_turn(2).is_some());
        assert!(map.record_for_turn(3).is_none());
    }
}
