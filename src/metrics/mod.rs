use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{PlayerId, Turn};

/// A submodule computing per player metrics out of a single snapshot
mod snapshot_metrics;
pub use snapshot_metrics::{snapshot_metrics, TileCounts};

/// A submodule holding the rules for combining snapshot and save file values
mod merge;
pub use merge::{apply_save_file, enforce_monotonic, merge_value, Precedence};

/// A submodule resolving the player roster and display names
mod civilizations;
pub use civilizations::{collect_civilizations, Civilization};

/// A submodule for the end of range standings
mod standings;
pub use standings::{collect_standings, Ranking, Standings, WorldTotals};

/// A submodule assembling the diplomacy history
mod diplomacy;
pub use diplomacy::{attitude_thresholds, collect_diplomacy, Attitude, Diplomacy, RelationEntry};

/// The submodule tying it all together
mod pipeline;
pub use pipeline::{MetricsPipeline, PipelineError};

/// A per player time series metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Treasury,
    Population,
    Science,
    TerritorySize,
    ArableLand,
    FoodProduction,
    ShieldProduction,
    TradeProduction,
    Culture,
    TechsKnown,
    CitiesCount,
    UnitsCount,
    MilitaryUnitsCount,
}

impl Metric {
    pub const ALL: [Metric; 13] = [
        Metric::Treasury,
        Metric::Population,
        Metric::Science,
        Metric::TerritorySize,
        Metric::ArableLand,
        Metric::FoodProduction,
        Metric::ShieldProduction,
        Metric::TradeProduction,
        Metric::Culture,
        Metric::TechsKnown,
        Metric::CitiesCount,
        Metric::UnitsCount,
        Metric::MilitaryUnitsCount,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Treasury => "treasury",
            Metric::Population => "population",
            Metric::Science => "science",
            Metric::TerritorySize => "territory_size",
            Metric::ArableLand => "arable_land",
            Metric::FoodProduction => "food_production",
            Metric::ShieldProduction => "shield_production",
            Metric::TradeProduction => "trade_production",
            Metric::Culture => "culture",
            Metric::TechsKnown => "techs_known",
            Metric::CitiesCount => "cities_count",
            Metric::UnitsCount => "units_count",
            Metric::MilitaryUnitsCount => "military_units_count",
        }
    }
}

/// Values of every metric for a single turn, metric -> player -> value
pub type TurnValues = BTreeMap<Metric, BTreeMap<PlayerId, f64>>;

/// metric -> turn -> player -> value
pub type TimeSeries = BTreeMap<Metric, BTreeMap<Turn, BTreeMap<PlayerId, f64>>>;
