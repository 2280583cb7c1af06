use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use super::{
    super::{
        game_data::is_arable,
        types::{Entity, EntityMapping, PlayerId, Snapshot},
    },
    Metric, TurnValues,
};

/// Flattens a possibly nested array of tiles into a flat list.
/// Tiles that aren't integers (unowned tiles are null) become `None`.
fn flatten_tiles(value: Option<&Value>) -> Vec<Option<i64>> {
    let mut out = Vec::new();
    let mut stack: Vec<&Value> = value.into_iter().collect();
    while let Some(value) = stack.pop() {
        match value {
            Value::Array(items) => stack.extend(items.iter().rev()),
            other => out.push(other.as_i64()),
        }
    }
    out
}

/// Owned and owned arable tile counts per player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileCounts {
    territory: BTreeMap<PlayerId, usize>,
    arable: BTreeMap<PlayerId, usize>,
}

impl TileCounts {
    /// Counts the tiles of a snapshot's `map` category.
    /// The map holds a `tile_owner` and a `terrain` grid of the same shape.
    pub fn from_map(map: &Entity) -> Self {
        let mut counts = TileCounts::default();
        let owners = flatten_tiles(map.get("tile_owner"));
        let terrain = flatten_tiles(map.get("terrain"));
        for (i, owner) in owners.into_iter().enumerate() {
            let Some(owner) = owner else {
                continue;
            };
            *counts.territory.entry(owner).or_default() += 1;
            if terrain.get(i).copied().flatten().is_some_and(is_arable) {
                *counts.arable.entry(owner).or_default() += 1;
            }
        }
        counts
    }

    pub fn territory(&self, player: PlayerId) -> usize {
        self.territory.get(&player).copied().unwrap_or(0)
    }

    pub fn arable(&self, player: PlayerId) -> usize {
        self.arable.get(&player).copied().unwrap_or(0)
    }
}

/// What a player owns in a snapshot, summed over cities and units.
#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct OwnerTotals {
    pub population: f64,
    pub food: f64,
    pub shields: f64,
    pub trade: f64,
    pub cities: usize,
    pub units: usize,
    pub military_units: usize,
}

/// Negative values mean the recording couldn't see the value
fn non_negative(value: Option<f64>) -> f64 {
    value.filter(|v| *v >= 0.0).unwrap_or(0.0)
}

pub(super) fn is_military(unit: &Entity) -> bool {
    unit.get_real("type_attack_strength").unwrap_or(0.0) > 0.0
}

pub(super) fn owner_totals(snapshot: &Snapshot) -> BTreeMap<PlayerId, OwnerTotals> {
    let mut totals: BTreeMap<PlayerId, OwnerTotals> = BTreeMap::new();
    for city in snapshot.cities().values() {
        let Some(owner) = city.get_owner() else {
            continue;
        };
        let entry = totals.entry(owner).or_default();
        entry.cities += 1;
        entry.population += non_negative(city.get_real("size"));
        entry.food += non_negative(city.get_real("prod_food"));
        entry.shields += non_negative(city.get_real("prod_shield"));
        entry.trade += non_negative(city.get_real("prod_trade"));
    }
    for unit in snapshot.units().values() {
        let Some(owner) = unit.get_owner() else {
            continue;
        };
        let entry = totals.entry(owner).or_default();
        entry.units += 1;
        if is_military(unit) {
            entry.military_units += 1;
        }
    }
    totals
}

/// Computes every metric the snapshot can tell us for the players in the
/// roster. Every metric has an entry, even if no player has a value.
pub fn snapshot_metrics(snapshot: &Snapshot, roster: &BTreeSet<PlayerId>) -> TurnValues {
    let mut values: TurnValues = Metric::ALL.iter().map(|m| (*m, BTreeMap::new())).collect();
    let totals = owner_totals(snapshot);
    let tiles = TileCounts::from_map(snapshot.map());
    let empty = OwnerTotals::default();
    for (id, player) in snapshot.players() {
        if !roster.contains(id) {
            continue;
        }
        let owned = totals.get(id).unwrap_or(&empty);
        let row = [
            (Metric::Treasury, player.get_real("gold").unwrap_or(0.0)),
            (Metric::Science, player.get_real("science").unwrap_or(0.0)),
            (Metric::Culture, player.get_real("culture").unwrap_or(0.0)),
            (Metric::TechsKnown, player.known_techs().len() as f64),
            (Metric::Population, owned.population),
            (Metric::FoodProduction, owned.food),
            (Metric::ShieldProduction, owned.shields),
            (Metric::TradeProduction, owned.trade),
            (Metric::TerritorySize, tiles.territory(*id) as f64),
            (Metric::ArableLand, tiles.arable(*id) as f64),
            (Metric::CitiesCount, owned.cities as f64),
            (Metric::UnitsCount, owned.units as f64),
            (Metric::MilitaryUnitsCount, owned.military_units as f64),
        ];
        for (metric, value) in row {
            values.entry(metric).or_default().insert(*id, value);
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn snapshot() -> Snapshot {
        Snapshot::from_value(json!({
            "player": {
                "1": {"gold": 50, "science": 6, "culture": 3, "tech_1": 18, "tech_2": 18},
                "2": {"gold": "12"},
                "9": {"gold": 999}
            },
            "city": {
                "10": {"owner": 1, "size": 4, "prod_food": 5, "prod_shield": 2, "prod_trade": -1},
                "11": {"owner": "1", "size": 2, "prod_food": 1, "prod_shield": 3, "prod_trade": 4},
                "12": {"owner": 2, "size": 1}
            },
            "unit": {
                "100": {"owner": 1, "type_attack_strength": 1},
                "101": {"owner": 1, "type_attack_strength": 0},
                "102": {"owner": 2}
            },
            "map": {
                "tile_owner": [[1, 1, null], [2, 1, 255]],
                "terrain": [[5, 1, 5], [6, 11, 5]]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_tiles() {
        let tiles = TileCounts::from_map(snapshot().map());
        assert_eq!(tiles.territory(1), 3);
        assert_eq!(tiles.arable(1), 2);
        assert_eq!(tiles.territory(2), 1);
        assert_eq!(tiles.arable(2), 1);
        assert_eq!(tiles.territory(3), 0);
        assert_eq!(TileCounts::from_map(&Entity::new()), TileCounts::default());
    }

    #[test]
    fn test_snapshot_metrics() {
        let roster = BTreeSet::from([1, 2]);
        let values = snapshot_metrics(&snapshot(), &roster);
        assert_eq!(values.len(), Metric::ALL.len());
        assert_eq!(values[&Metric::Treasury][&1], 50.0);
        assert_eq!(values[&Metric::Treasury][&2], 12.0);
        // not in the roster
        assert!(!values[&Metric::Treasury].contains_key(&9));
        assert_eq!(values[&Metric::TechsKnown][&1], 2.0);
        assert_eq!(values[&Metric::Population][&1], 6.0);
        assert_eq!(values[&Metric::FoodProduction][&1], 6.0);
        assert_eq!(values[&Metric::ShieldProduction][&1], 5.0);
        // the -1 is ignored
        assert_eq!(values[&Metric::TradeProduction][&1], 4.0);
        assert_eq!(values[&Metric::CitiesCount][&1], 2.0);
        assert_eq!(values[&Metric::UnitsCount][&1], 2.0);
        assert_eq!(values[&Metric::MilitaryUnitsCount][&1], 1.0);
        assert_eq!(values[&Metric::MilitaryUnitsCount][&2], 0.0);
        assert_eq!(values[&Metric::Science][&2], 0.0);
    }
}
