use std::collections::{BTreeMap, BTreeSet};

use super::{
    super::{
        save_file::SaveFileRecord,
        types::{PlayerId, Turn},
    },
    Metric, TurnValues,
};

/// How a save file value combines with the value taken from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    /// The save file is ground truth and always replaces the snapshot value
    SaveFileWins,
    /// The save file value replaces the snapshot value unless it is lower.
    /// Snapshots can lag behind the save file but never lead it.
    NeverRegress,
}

impl Precedence {
    /// The precedence rule for a metric family
    pub fn for_metric(metric: Metric) -> Self {
        match metric {
            Metric::TechsKnown => Precedence::NeverRegress,
            _ => Precedence::SaveFileWins,
        }
    }
}

/// Combines a snapshot value with a save file value.
pub fn merge_value(snapshot: Option<f64>, save: f64, precedence: Precedence) -> f64 {
    match (precedence, snapshot) {
        (Precedence::NeverRegress, Some(current)) if save < current => current,
        _ => save,
    }
}

fn merge_into(values: &mut TurnValues, metric: Metric, player: PlayerId, save: f64) {
    let series = values.entry(metric).or_default();
    let merged = merge_value(series.get(&player).copied(), save, Precedence::for_metric(metric));
    series.insert(player, merged);
}

/// Overrides the production, science and technology count values of a turn
/// with save file data. Only players in the roster are touched.
pub fn apply_save_file(values: &mut TurnValues, record: &SaveFileRecord, roster: &BTreeSet<PlayerId>) {
    for (player, production) in &record.production {
        if !roster.contains(player) {
            continue;
        }
        merge_into(values, Metric::FoodProduction, *player, production.food);
        merge_into(values, Metric::ShieldProduction, *player, production.shields);
        merge_into(values, Metric::TradeProduction, *player, production.trade);
    }
    for (player, science) in &record.science {
        if !roster.contains(player) {
            continue;
        }
        merge_into(values, Metric::Science, *player, science.science_per_turn as f64);
        merge_into(values, Metric::TechsKnown, *player, science.techs_known as f64);
    }
}

/// Replaces every value lower than the running maximum of its player with
/// that maximum, walking the turns in order.
pub fn enforce_monotonic(series: &mut BTreeMap<Turn, BTreeMap<PlayerId, f64>>) {
    let mut max_seen: BTreeMap<PlayerId, f64> = BTreeMap::new();
    for values in series.values_mut() {
        for (player, value) in values.iter_mut() {
            let max = max_seen.entry(*player).or_insert(*value);
            if *value < *max {
                *value = *max;
            } else {
                *max = *value;
            }
        }
    }
}
