use std::{collections::BTreeMap, rc::Rc};

use serde::{Deserialize, Serialize};

use super::super::{
    game_data::Ruleset,
    save_file::SaveDataProvider,
    types::{EntityMapping, PlayerId, Snapshot, Turn},
};

/// A player of the game, as presented in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Civilization {
    pub name: String,
    pub adjective: String,
    pub nation_id: i64,
}

/// Looks through the save files, newest first, for a nation name.
fn name_from_save_files(
    player: PlayerId,
    turns: &[Turn],
    saves: &dyn SaveDataProvider,
    ruleset: &Ruleset,
) -> Option<String> {
    turns.iter().rev().find_map(|turn| {
        let record = saves.record_for_turn(*turn)?;
        let identifier = record.nations.get(&player)?;
        ruleset
            .nation_name_from_identifier(identifier)
            .map(str::to_owned)
    })
}

/// Builds the roster of every player seen in any of the states, including
/// those that joined late or died early.
///
/// The name of a civilization is, in order of preference, the ruleset name
/// of its nation, the ruleset name of the nation the save files give it,
/// the player's own name or `Player <id>`.
pub fn collect_civilizations(
    states: &BTreeMap<Turn, Rc<Snapshot>>,
    saves: &dyn SaveDataProvider,
    ruleset: &Ruleset,
) -> BTreeMap<PlayerId, Civilization> {
    let turns: Vec<Turn> = states.keys().copied().collect();
    let mut civilizations = BTreeMap::new();
    // newest state first, so the latest information wins
    for state in states.values().rev() {
        for (id, player) in state.players() {
            if civilizations.contains_key(id) {
                continue;
            }
            let nation_id = player.get_int("nation");
            let name = nation_id
                .and_then(|n| ruleset.nation_name(n))
                .map(str::to_owned)
                .or_else(|| name_from_save_files(*id, &turns, saves, ruleset))
                .or_else(|| player.get_string("name").map(str::to_owned))
                .unwrap_or_else(|| format!("Player {}", id));
            civilizations.insert(
                *id,
                Civilization {
                    adjective: name.clone(),
                    name,
                    nation_id: nation_id.unwrap_or(0),
                },
            );
        }
    }
    civilizations
}
