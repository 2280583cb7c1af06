use std::{
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
};

use chrono::Local;
use derive_more::{Display, Error};
use indicatif::ProgressBar;
use tracing::{debug, info};

use super::{
    super::{
        events::{detect_all_events, GameEvent, SeenTechs},
        game_data::Ruleset,
        report::{Metadata, TerritorySnapshots, WorldReport},
        save_file::SaveDataProvider,
        selector::SnapshotSelector,
        state::StateAccessor,
        types::{EntityMapping, PlayerId, Snapshot, Turn},
    },
    apply_save_file, collect_civilizations, collect_diplomacy, collect_standings,
    enforce_monotonic, snapshot_metrics, Metric, TimeSeries,
};

const TERRITORY_NOTE: &str = "Territory maps are generated during rendering from state files";

/// An error that stops a report from being generated at all
#[derive(Debug, Display, Error)]
pub enum PipelineError {
    #[display("no snapshots between turns {} and {}", _0, _1)]
    NoStates(#[error(not(source))] Turn, #[error(not(source))] Turn),
}

/// Reconstructs the history of a turn range out of the recorded snapshots
/// and, where available, the save files.
///
/// Turns are always processed in ascending order, the technology
/// deduplication and monotonic counts depend on it.
pub struct MetricsPipeline<'a> {
    accessor: &'a StateAccessor,
    saves: &'a dyn SaveDataProvider,
    ruleset: &'a Ruleset,
    username: String,
    selector: SnapshotSelector,
    progress: Option<ProgressBar>,
}

impl<'a> MetricsPipeline<'a> {
    pub fn new(
        accessor: &'a StateAccessor,
        saves: &'a dyn SaveDataProvider,
        ruleset: &'a Ruleset,
        username: impl Into<String>,
    ) -> Self {
        MetricsPipeline {
            accessor,
            saves,
            ruleset,
            username: username.into(),
            selector: SnapshotSelector::default(),
            progress: None,
        }
    }

    pub fn with_selector(mut self, selector: SnapshotSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Reports the per turn progress on the given bar
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Builds the report for `[start, end]`. Turns without snapshots are
    /// skipped, but at least one turn must have data.
    pub fn collect(&self, start: Turn, end: Turn) -> Result<WorldReport, PipelineError> {
        let states = self.accessor.get_range(start, end);
        if states.is_empty() {
            return Err(PipelineError::NoStates(start, end));
        }
        info!(
            "collecting turns {} to {}, {} with data",
            start,
            end,
            states.len()
        );
        Ok(self.collect_states(&states))
    }

    /// Builds the report out of already loaded, non empty states.
    fn collect_states(&self, states: &BTreeMap<Turn, Rc<Snapshot>>) -> WorldReport {
        let turns: Vec<Turn> = states.keys().copied().collect();
        let (max_turn, last) = match states.last_key_value() {
            Some((turn, state)) => (*turn, state.clone()),
            None => (0, Rc::new(Snapshot::default())),
        };

        let civilizations = collect_civilizations(states, self.saves, self.ruleset);
        let roster: BTreeSet<PlayerId> = civilizations.keys().copied().collect();
        debug!("{} civilizations", civilizations.len());

        let time_series = self.collect_time_series(states, &roster);
        let events = self.collect_events(states);
        let snapshots = BTreeMap::from([(max_turn, collect_standings(&last))]);
        let diplomacy = collect_diplomacy(&turns, self.saves, &roster);
        let map = last.map();

        WorldReport {
            metadata: Metadata {
                turn: max_turn,
                turns_analyzed: turns,
                generated_at: Local::now().to_rfc3339(),
                username: self.username.clone(),
                map_size: [
                    map.get_int("xsize").unwrap_or(0),
                    map.get_int("ysize").unwrap_or(0),
                ],
                num_civilizations: civilizations.len(),
            },
            civilizations,
            time_series,
            events,
            snapshots,
            territory_snapshots: TerritorySnapshots {
                turns: self.selector.select(max_turn),
                note: TERRITORY_NOTE.to_owned(),
            },
            diplomacy,
        }
    }

    /// Computes every metric for every turn, overriding snapshot values with
    /// save file values where there are any, then fixes up technology counts
    /// that went down.
    fn collect_time_series(
        &self,
        states: &BTreeMap<Turn, Rc<Snapshot>>,
        roster: &BTreeSet<PlayerId>,
    ) -> TimeSeries {
        if let Some(progress) = &self.progress {
            progress.set_length(states.len() as u64);
            progress.set_position(0);
        }
        let mut time_series = TimeSeries::new();
        for (turn, state) in states {
            let mut values = snapshot_metrics(state, roster);
            if let Some(record) = self.saves.record_for_turn(*turn) {
                apply_save_file(&mut values, &record, roster);
            }
            for (metric, players) in values {
                time_series.entry(metric).or_default().insert(*turn, players);
            }
            if let Some(progress) = &self.progress {
                progress.inc(1);
            }
        }
        if let Some(techs) = time_series.get_mut(&Metric::TechsKnown) {
            enforce_monotonic(techs);
        }
        time_series
    }

    /// Runs the event detection over consecutive states.
    fn collect_events(&self, states: &BTreeMap<Turn, Rc<Snapshot>>) -> Vec<GameEvent> {
        let mut seen = SeenTechs::new();
        let mut events = Vec::new();
        let mut prev: Option<&Rc<Snapshot>> = None;
        for (turn, state) in states {
            let save = self.saves.record_for_turn(*turn);
            events.extend(detect_all_events(
                prev.map(|p| p.as_ref()),
                state,
                *turn,
                save.as_deref(),
                &mut seen,
            ));
            prev = Some(state);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use std::fs::write;

    use serde_json::{json, Value};
    use tempfile::TempDir;

    use super::{
        super::super::{
            events::EventType,
            save_file::{NoSaveData, SaveFileRecord, Science},
        },
        *,
    };

    fn write_state(dir: &TempDir, turn: Turn, value: Value) {
        write(
            dir.path().join(format!("turn_{}_step_0_state.json", turn)),
            value.to_string(),
        )
        .unwrap();
    }

    fn player(techs: &[u32], gold: i64) -> Value {
        let mut player = json!({"name": "Hammurabi", "gold": gold, "score": gold});
        for tech in techs {
            player[format!("tech_{}", tech)] = json!(18);
        }
        player
    }

    /// Three turns, the technology count of player 1 drops at turn 2
    fn recording() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_state(
            &dir,
            1,
            json!({
                "player": {"1": player(&[1, 2], 10), "2": {"name": "Caesar"}},
                "city": {"10": {"owner": 1, "size": 2, "name": "Ur"}},
                "map": {"xsize": 4, "ysize": 2, "tile_owner": [1, 1, 2, null], "terrain": [5, 0, 6, 6]}
            }),
        );
        write_state(
            &dir,
            2,
            json!({
                "player": {"1": player(&[1], 20), "2": {"name": "Caesar"}},
                "city": {"10": {"owner": 1, "size": 3, "name": "Ur"}, "11": {"owner": 2, "name": "Rome"}},
                "map": {"xsize": 4, "ysize": 2}
            }),
        );
        write_state(
            &dir,
            4,
            json!({
                "player": {"1": player(&[1, 2, 3], 30), "2": {"name": "Caesar"}},
                "city": {"11": {"owner": 2, "name": "Rome"}},
                "map": {"xsize": 4, "ysize": 2}
            }),
        );
        dir
    }

    fn techs_of(report: &WorldReport, player: PlayerId) -> Vec<f64> {
        report.time_series[&Metric::TechsKnown]
            .values()
            .filter_map(|v| v.get(&player).copied())
            .collect()
    }

    #[test]
    fn test_collect() {
        let dir = recording();
        let accessor = StateAccessor::index(dir.path()).unwrap();
        let ruleset = Ruleset::default();
        let pipeline = MetricsPipeline::new(&accessor, &NoSaveData, &ruleset, "alice");
        let report = pipeline.collect(0, 10).unwrap();
        assert_eq!(report.metadata.turn, 4);
        assert_eq!(report.metadata.turns_analyzed, vec![1, 2, 4]);
        assert_eq!(report.metadata.map_size, [4, 2]);
        assert_eq!(report.metadata.num_civilizations, 2);
        assert_eq!(report.metadata.username, "alice");
        assert_eq!(report.civilizations[&1].name, "Hammurabi");
        assert_eq!(report.time_series.len(), Metric::ALL.len());
        assert_eq!(report.time_series[&Metric::Treasury][&2][&1], 20.0);
        assert_eq!(report.time_series[&Metric::TerritorySize][&1][&1], 2.0);
        assert_eq!(report.time_series[&Metric::ArableLand][&1][&2], 1.0);
        assert!(report.snapshots.contains_key(&4));
        assert_eq!(report.territory_snapshots.turns, Vec::<Turn>::new());
        assert!(report.diplomacy.relations.is_empty());

        let founded = report
            .events
            .iter()
            .filter(|e| e.event_type == EventType::CityFounded)
            .count();
        assert_eq!(founded, 2);
        let destroyed: Vec<_> = report
            .events
            .iter()
            .filter(|e| e.event_type == EventType::CityDestroyed)
            .collect();
        assert_eq!(destroyed.len(), 1);
        assert_eq!(destroyed[0].turn, 4);
    }

    #[test]
    fn test_techs_monotonic() {
        let dir = recording();
        let accessor = StateAccessor::index(dir.path()).unwrap();
        let ruleset = Ruleset::default();
        let report = MetricsPipeline::new(&accessor, &NoSaveData, &ruleset, "alice")
            .collect(0, 10)
            .unwrap();
        let techs = techs_of(&report, 1);
        assert_eq!(techs, vec![2.0, 2.0, 3.0]);
        assert!(techs.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_save_file_override() {
        let dir = recording();
        let accessor = StateAccessor::index(dir.path()).unwrap();
        let ruleset = Ruleset::default();
        let mut record = SaveFileRecord::default();
        // lower than the snapshot's 2 techs, higher science
        record.science.insert(
            1,
            Science {
                science_per_turn: 70,
                techs_known: 1,
                ..Default::default()
            },
        );
        record.science.insert(
            2,
            Science {
                techs_known: 5,
                ..Default::default()
            },
        );
        record
            .technologies
            .insert(1, ["1", "2"].iter().map(|s| s.to_string()).collect());
        let saves = BTreeMap::from([(1, Rc::new(record))]);
        let report = MetricsPipeline::new(&accessor, &saves, &ruleset, "alice")
            .collect(0, 10)
            .unwrap();
        assert_eq!(report.time_series[&Metric::Science][&1][&1], 70.0);
        assert_eq!(techs_of(&report, 1), vec![2.0, 2.0, 3.0]);
        assert_eq!(techs_of(&report, 2), vec![5.0, 5.0, 5.0]);
        // techs 1 and 2 from the save file at turn 1, tech 3 from the flags at turn 4
        let techs: Vec<_> = report
            .events
            .iter()
            .filter(|e| e.event_type == EventType::TechDiscovered)
            .map(|e| (e.turn, e.metadata["tech_id"].clone()))
            .collect();
        assert_eq!(
            techs,
            vec![(1, json!("1")), (1, json!("2")), (4, json!("3"))]
        );
    }

    #[test]
    fn test_idempotent() {
        let dir = recording();
        let accessor = StateAccessor::index(dir.path()).unwrap();
        let ruleset = Ruleset::default();
        let pipeline = MetricsPipeline::new(&accessor, &NoSaveData, &ruleset, "alice");
        let mut first = pipeline.collect(0, 10).unwrap();
        let mut second = pipeline.collect(0, 10).unwrap();
        first.metadata.generated_at = String::new();
        second.metadata.generated_at = String::new();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_selector_and_progress() {
        let dir = recording();
        let accessor = StateAccessor::index(dir.path()).unwrap();
        let ruleset = Ruleset::default();
        let progress = ProgressBar::hidden();
        let selector = SnapshotSelector {
            max_snapshots: 3,
            min_turn: 1,
            min_spacing: 1,
        };
        let report = MetricsPipeline::new(&accessor, &NoSaveData, &ruleset, "alice")
            .with_selector(selector)
            .with_progress(progress.clone())
            .collect(0, 10)
            .unwrap();
        assert_eq!(report.territory_snapshots.turns, vec![2, 3, 4]);
        assert_eq!(progress.length(), Some(3));
        assert_eq!(progress.position(), 3);
    }

    #[test]
    fn test_no_states() {
        let dir = recording();
        let accessor = StateAccessor::index(dir.path()).unwrap();
        let ruleset = Ruleset::default();
        let pipeline = MetricsPipeline::new(&accessor, &NoSaveData, &ruleset, "alice");
        assert!(matches!(
            pipeline.collect(5, 9),
            Err(PipelineError::NoStates(5, 9))
        ));
    }
}
