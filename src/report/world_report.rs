use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::super::{
    events::GameEvent,
    metrics::{Civilization, Diplomacy, Standings, TimeSeries},
    types::{PlayerId, Turn},
};

/// What a report covers and when it was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// The last turn analyzed
    pub turn: Turn,
    pub turns_analyzed: Vec<Turn>,
    /// The only field that differs between two runs over the same data
    pub generated_at: String,
    pub username: String,
    /// `[xsize, ysize]`
    pub map_size: [i64; 2],
    pub num_civilizations: usize,
}

/// The turns a renderer should draw territory maps for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerritorySnapshots {
    pub turns: Vec<Turn>,
    #[serde(default)]
    pub note: String,
}

/// The complete reconstructed history of a world, ready to be rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldReport {
    pub metadata: Metadata,
    pub civilizations: BTreeMap<PlayerId, Civilization>,
    pub time_series: TimeSeries,
    pub events: Vec<GameEvent>,
    pub snapshots: BTreeMap<Turn, Standings>,
    pub territory_snapshots: TerritorySnapshots,
    pub diplomacy: Diplomacy,
}
