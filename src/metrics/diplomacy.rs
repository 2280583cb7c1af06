use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::super::{
    save_file::{Relation, SaveDataProvider},
    types::{PlayerId, Turn},
};

/// How one player feels about another, derived from the AI love value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attitude {
    Genocidal,
    Belligerent,
    Hostile,
    Uncooperative,
    Uneasy,
    Neutral,
    Respectful,
    Helpful,
    Enthusiastic,
    Admiring,
    Worshipful,
}

/// Love range is -1000..=1000, split into 11 tiers.
/// Each tier is the lowest love value it starts at, highest first.
const THRESHOLDS: [(Attitude, i64); 11] = [
    (Attitude::Worshipful, 820),
    (Attitude::Admiring, 640),
    (Attitude::Enthusiastic, 460),
    (Attitude::Helpful, 280),
    (Attitude::Respectful, 100),
    (Attitude::Neutral, -100),
    (Attitude::Uneasy, -280),
    (Attitude::Uncooperative, -460),
    (Attitude::Hostile, -640),
    (Attitude::Belligerent, -820),
    (Attitude::Genocidal, -1000),
];

impl Attitude {
    pub fn from_love(love: i64) -> Self {
        THRESHOLDS
            .iter()
            .find(|(_, min)| love >= *min)
            .map_or(Attitude::Genocidal, |(attitude, _)| *attitude)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Attitude::Genocidal => "genocidal",
            Attitude::Belligerent => "belligerent",
            Attitude::Hostile => "hostile",
            Attitude::Uncooperative => "uncooperative",
            Attitude::Uneasy => "uneasy",
            Attitude::Neutral => "neutral",
            Attitude::Respectful => "respectful",
            Attitude::Helpful => "helpful",
            Attitude::Enthusiastic => "enthusiastic",
            Attitude::Admiring => "admiring",
            Attitude::Worshipful => "worshipful",
        }
    }
}

/// The attitude tier names mapped to the love value they start at
pub fn attitude_thresholds() -> BTreeMap<String, i64> {
    THRESHOLDS
        .iter()
        .map(|(attitude, min)| (attitude.name().to_owned(), *min))
        .collect()
}

/// One direction of a relationship at a single turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEntry {
    pub state: String,
    pub love: i64,
    pub first_contact_turn: i64,
    pub embassy: bool,
    pub shared_vision: bool,
    pub attitude: Attitude,
}

impl From<&Relation> for RelationEntry {
    fn from(relation: &Relation) -> Self {
        let love = relation.love.unwrap_or(0);
        RelationEntry {
            state: relation
                .state
                .clone()
                .unwrap_or_else(|| "Unknown".to_owned()),
            love,
            first_contact_turn: relation.first_contact_turn.unwrap_or(0),
            embassy: relation.embassy,
            shared_vision: relation.shared_vision,
            attitude: Attitude::from_love(love),
        }
    }
}

/// The diplomacy history of a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diplomacy {
    /// `"<from>_<to>"` -> turn -> relation
    pub relations: BTreeMap<String, BTreeMap<Turn, RelationEntry>>,
    pub attitude_thresholds: BTreeMap<String, i64>,
}

/// Gathers the relations between roster players out of the save files of
/// the given turns. Turns without a save file contribute nothing, the
/// directions of a relationship are kept apart.
pub fn collect_diplomacy(
    turns: &[Turn],
    saves: &dyn SaveDataProvider,
    roster: &BTreeSet<PlayerId>,
) -> Diplomacy {
    let mut relations: BTreeMap<String, BTreeMap<Turn, RelationEntry>> = BTreeMap::new();
    for turn in turns {
        let Some(record) = saves.record_for_turn(*turn) else {
            continue;
        };
        for (from, targets) in &record.diplomacy {
            if !roster.contains(from) {
                continue;
            }
            for (to, relation) in targets {
                if from == to || !roster.contains(to) {
                    continue;
                }
                relations
                    .entry(format!("{}_{}", from, to))
                    .or_default()
                    .insert(*turn, relation.into());
            }
        }
    }
    Diplomacy {
        relations,
        attitude_thresholds: attitude_thresholds(),
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::{super::super::save_file::SaveFileRecord, *};

    #[test]
    fn test_from_love() {
        assert_eq!(Attitude::from_love(1000), Attitude::Worshipful);
        assert_eq!(Attitude::from_love(820), Attitude::Worshipful);
        assert_eq!(Attitude::from_love(819), Attitude::Admiring);
        assert_eq!(Attitude::from_love(0), Attitude::Neutral);
        assert_eq!(Attitude::from_love(-100), Attitude::Neutral);
        assert_eq!(Attitude::from_love(-101), Attitude::Uneasy);
        assert_eq!(Attitude::from_love(-820), Attitude::Belligerent);
        assert_eq!(Attitude::from_love(-821), Attitude::Genocidal);
        assert_eq!(Attitude::from_love(-5000), Attitude::Genocidal);
    }

    #[test]
    fn test_thresholds() {
        let thresholds = attitude_thresholds();
        assert_eq!(thresholds.len(), 11);
        assert_eq!(thresholds["worshipful"], 820);
        assert_eq!(thresholds["genocidal"], -1000);
    }

    #[test]
    fn test_collect_diplomacy() {
        let mut record = SaveFileRecord::default();
        record.diplomacy.insert(
            1,
            BTreeMap::from([
                (
                    2,
                    Relation {
                        state: Some("War".to_owned()),
                        love: Some(-500),
                        ..Default::default()
                    },
                ),
                (9, Relation::default()),
            ]),
        );
        record.diplomacy.insert(
            2,
            BTreeMap::from([(
                1,
                Relation {
                    state: Some("War".to_owned()),
                    love: Some(150),
                    embassy: true,
                    ..Default::default()
                },
            )]),
        );
        let saves = BTreeMap::from([(4, Rc::new(record))]);
        let diplomacy = collect_diplomacy(&[3, 4], &saves, &BTreeSet::from([1, 2]));
        assert_eq!(diplomacy.relations.len(), 2);
        let one_two = &diplomacy.relations["1_2"][&4];
        assert_eq!(one_two.attitude, Attitude::Hostile);
        assert_eq!(one_two.state, "War");
        let two_one = &diplomacy.relations["2_1"][&4];
        assert_eq!(two_one.attitude, Attitude::Respectful);
        assert!(two_one.embassy);
        assert!(!diplomacy.relations["1_2"].contains_key(&3));
    }

    #[test]
    fn test_defaults() {
        let entry = RelationEntry::from(&Relation::default());
        assert_eq!(entry.state, "Unknown");
        assert_eq!(entry.attitude, Attitude::Neutral);
    }
}
