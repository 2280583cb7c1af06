use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::super::types::{PlayerId, TechId};

/// Aggregated city production of a single player.
///
/// Only `shields` is exact engine accounting, `food` and `trade` are
/// estimated from city sizes and must be presented as such.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Production {
    /// Estimated, [FOOD_PER_CITIZEN] per citizen
    pub food: f64,
    /// Exact, summed `last_turns_shield_surplus`
    pub shields: f64,
    /// Estimated, [TRADE_PER_CITIZEN] per citizen
    pub trade: f64,
}

/// Food a citizen is assumed to produce.
pub const FOOD_PER_CITIZEN: f64 = 2.0;
/// Trade a citizen is assumed to produce.
pub const TRADE_PER_CITIZEN: f64 = 1.0;

impl Production {
    /// Accounts for one city.
    pub fn add_city(&mut self, size: i64, shield_surplus: i64) {
        self.shields += shield_surplus as f64;
        self.food += size as f64 * FOOD_PER_CITIZEN;
        self.trade += size as f64 * TRADE_PER_CITIZEN;
    }
}

/// Research state of a single player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Science {
    /// The science rate (`rates.science`)
    pub science_per_turn: i64,
    /// `research.bulbs_last_turn`
    pub bulbs_last_turn: i64,
    /// Number of known technologies, from the research table
    pub techs_known: i64,
    /// Name of the technology currently being researched
    pub researching: Option<String>,
}

/// One direction of a diplomatic relationship, as stored by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub state: Option<String>,
    pub love: Option<i64>,
    pub first_contact_turn: Option<i64>,
    pub embassy: bool,
    pub shared_vision: bool,
}

/// Everything we extract from a single save file.
/// Unlike the recordings, this covers all players without fog of war.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveFileRecord {
    pub production: BTreeMap<PlayerId, Production>,
    pub science: BTreeMap<PlayerId, Science>,
    /// Nation identifier as written in the save, a rule name or a number
    pub nations: BTreeMap<PlayerId, String>,
    /// Complete set of known technologies
    pub technologies: BTreeMap<PlayerId, BTreeSet<TechId>>,
    /// from -> to -> relation
    pub diplomacy: BTreeMap<PlayerId, BTreeMap<PlayerId, Relation>>,
}
