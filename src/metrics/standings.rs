use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{
    super::types::{EntityMapping, PlayerId, Snapshot},
    snapshot_metrics::{is_military, owner_totals},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub rank: usize,
    pub player_id: PlayerId,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldTotals {
    pub total_cities: usize,
    pub total_units: usize,
    pub total_military_units: usize,
    pub total_population: f64,
}

/// Scores, rankings and counts at a single turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Standings {
    pub scores: BTreeMap<PlayerId, f64>,
    pub rankings: Vec<Ranking>,
    pub cities_count: BTreeMap<PlayerId, usize>,
    pub units_count: BTreeMap<PlayerId, usize>,
    pub military_units_count: BTreeMap<PlayerId, usize>,
    pub world_totals: WorldTotals,
}

/// Computes the standings of every player in the snapshot.
/// Rankings are by score descending, ties broken by player id.
pub fn collect_standings(snapshot: &Snapshot) -> Standings {
    let mut standings = Standings::default();
    let totals = owner_totals(snapshot);
    for (id, player) in snapshot.players() {
        standings
            .scores
            .insert(*id, player.get_real("score").unwrap_or(0.0));
        let owned = totals.get(id);
        standings
            .cities_count
            .insert(*id, owned.map_or(0, |o| o.cities));
        standings.units_count.insert(*id, owned.map_or(0, |o| o.units));
        standings
            .military_units_count
            .insert(*id, owned.map_or(0, |o| o.military_units));
    }
    let mut order: Vec<(PlayerId, f64)> = standings.scores.iter().map(|(p, s)| (*p, *s)).collect();
    order.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    standings.rankings = order
        .into_iter()
        .enumerate()
        .map(|(i, (player_id, score))| Ranking {
            rank: i + 1,
            player_id,
            score,
        })
        .collect();
    standings.world_totals = WorldTotals {
        total_cities: snapshot.cities().len(),
        total_units: snapshot.units().len(),
        total_military_units: snapshot.units().values().filter(|u| is_military(u)).count(),
        total_population: snapshot
            .cities()
            .values()
            .filter_map(|c| c.get_real("size"))
            .sum(),
    };
    standings
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_standings() {
        let snapshot = Snapshot::from_value(json!({
            "player": {"1": {"score": 20}, "2": {"score": 35}, "3": {"score": 20}, "4": {}},
            "city": {
                "10": {"owner": 1, "size": 3},
                "11": {"owner": 2, "size": 5},
                "12": {"owner": 7, "size": 1}
            },
            "unit": {
                "100": {"owner": 2, "type_attack_strength": 2},
                "101": {"owner": 2},
                "102": {"owner": 8, "type_attack_strength": 1}
            }
        }))
        .unwrap();
        let standings = collect_standings(&snapshot);
        let order: Vec<_> = standings.rankings.iter().map(|r| r.player_id).collect();
        assert_eq!(order, vec![2, 1, 3, 4]);
        assert_eq!(standings.rankings[0].rank, 1);
        assert_eq!(standings.rankings[3].score, 0.0);
        assert_eq!(standings.cities_count[&1], 1);
        assert_eq!(standings.units_count[&2], 2);
        assert_eq!(standings.military_units_count[&2], 1);
        assert_eq!(standings.units_count[&4], 0);
        assert_eq!(
            standings.world_totals,
            WorldTotals {
                total_cities: 3,
                total_units: 3,
                total_military_units: 2,
                total_population: 9.0,
            }
        );
    }
}
